// パス: src/interpreter/iter.rs
// 役割: 反復子プロトコルとジェネレータの実行を実装する
// 意図: for-of・スプレッド・分割代入が同じ `IteratorRecord` を通して値を取り出せるようにする
// 関連ファイル: src/interpreter/eval.rs, src/interpreter/function.rs, src/interpreter/builtins/mod.rs
//! 反復子とジェネレータ
//!
//! ジェネレータは `next()` のたびに次の `yield` まで本体を進める（`generator.rs`）。
//! `next(v)` の引数は中断していた `yield` 式の値になる。

use runtime_heap::{ObjectId, ObjectKind, PropertyKey, Value};

use super::generator::{GeneratorBody, Resume, Suspension};
use super::{Abrupt, Interpreter, JsResult};

pub(crate) enum GeneratorState {
    /// 中断中。まだ一度も進めていない場合を含む。
    Suspended {
        function: ObjectId,
        strict: bool,
        body: Box<GeneratorBody>,
    },
    Running,
    Done,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum IterKind {
    Keys,
    Values,
    Entries,
}

/// 組み込み反復子の内部状態。オブジェクト本体は空の通常オブジェクト。
pub(crate) enum IterState {
    /// 配列風オブジェクトを添字で辿る（長さは毎回読み直す）。
    List {
        target: Value,
        index: usize,
        kind: IterKind,
    },
    /// 作成時点で確定した値の列（Map・Set・文字列）。
    Values { values: Vec<Value>, index: usize },
}

/// 反復中の反復子。
pub(crate) struct IteratorRecord {
    pub iterator: Value,
    pub next: Value,
    pub done: bool,
}

impl Interpreter {
    /// `%IteratorPrototype%` とジェネレータのプロトタイプを登録する。
    pub(crate) fn install_iterators(&mut self) {
        let symbol_iterator = self.well_known.iterator;
        let symbol_async_iterator = self.well_known.async_iterator;

        let iterator_proto = self.new_prototype("Iterator", ObjectKind::Ordinary);
        self.define_symbol_method(iterator_proto, symbol_iterator, "[Symbol.iterator]", |_, this, _| {
            Ok(this)
        });
        self.define_method(iterator_proto, "next", 0, |interp, this, _| {
            let Value::Object(id) = this else {
                return Err(interp.type_error("next called on a non-iterator"));
            };
            interp.builtin_iterator_next(id)
        });

        let generator_proto = self.new_prototype("Generator", ObjectKind::Ordinary);
        self.heap.object_mut(generator_proto).prototype = Some(iterator_proto);
        self.define_method(generator_proto, "next", 1, |interp, this, args| {
            let id = interp.this_generator(&this, false)?;
            interp.generator_resume(id, Resume::Next(super::arg(args, 0)))
        });
        self.define_method(generator_proto, "return", 1, |interp, this, args| {
            let id = interp.this_generator(&this, false)?;
            interp.generator_resume(id, Resume::Return(super::arg(args, 0)))
        });
        self.define_method(generator_proto, "throw", 1, |interp, this, args| {
            let id = interp.this_generator(&this, false)?;
            interp.generator_resume(id, Resume::Throw(super::arg(args, 0)))
        });

        let async_proto = self.new_prototype("AsyncGenerator", ObjectKind::Ordinary);
        self.define_symbol_method(async_proto, symbol_async_iterator, "[Symbol.asyncIterator]", |_, this, _| {
            Ok(this)
        });
        self.define_method(async_proto, "next", 1, |interp, this, args| {
            interp.async_generator_resume(&this, Resume::Next(super::arg(args, 0)))
        });
        self.define_method(async_proto, "return", 1, |interp, this, args| {
            interp.async_generator_resume(&this, Resume::Return(super::arg(args, 0)))
        });
        self.define_method(async_proto, "throw", 1, |interp, this, args| {
            interp.async_generator_resume(&this, Resume::Throw(super::arg(args, 0)))
        });
    }

    /// 非同期ジェネレータの再開。結果は Promise で返す。
    fn async_generator_resume(&mut self, this: &Value, resume: Resume) -> JsResult<Value> {
        let promise = self.new_promise();
        let outcome = self
            .this_generator(this, true)
            .and_then(|id| self.generator_resume(id, resume));
        self.settle_with(promise, outcome)?;
        Ok(Value::Object(promise))
    }

    fn this_generator(&mut self, this: &Value, is_async: bool) -> JsResult<ObjectId> {
        let kind_ok = |kind: &ObjectKind| {
            if is_async {
                matches!(kind, ObjectKind::AsyncGenerator)
            } else {
                matches!(kind, ObjectKind::Generator)
            }
        };
        match this {
            Value::Object(id) if kind_ok(self.heap.kind(*id)) => Ok(*id),
            _ => {
                let expected = if is_async { "AsyncGenerator" } else { "Generator" };
                Err(self.type_error(format!("Not an object of type {}", expected)))
            }
        }
    }

    /// ジェネレータを次の `yield` まで進め、反復結果オブジェクトを返す。
    fn generator_resume(&mut self, id: ObjectId, resume: Resume) -> JsResult<Value> {
        let state = self
            .generators
            .insert(id, GeneratorState::Running)
            .unwrap_or(GeneratorState::Done);
        let (function, strict, mut body) = match state {
            GeneratorState::Suspended {
                function,
                strict,
                body,
            } => (function, strict, body),
            GeneratorState::Running => return Err(self.type_error("Generator is already running")),
            GeneratorState::Done => return self.finished_generator(id, resume),
        };
        if !body.started() && !matches!(resume, Resume::Next(_)) {
            // 開始前の return / throw は本体を実行せずに終わらせる
            return self.finished_generator(id, resume);
        }
        if let Err(e) = self.enter_frame(function) {
            self.generators.insert(
                id,
                GeneratorState::Suspended {
                    function,
                    strict,
                    body,
                },
            );
            return Err(e);
        }
        let saved_strict = std::mem::replace(&mut self.strict, strict);
        let outcome = body.resume(self, resume);
        self.strict = saved_strict;
        self.call_stack.pop();
        match outcome {
            Ok(Suspension::Yielded(v)) => {
                self.generators.insert(
                    id,
                    GeneratorState::Suspended {
                        function,
                        strict,
                        body,
                    },
                );
                Ok(self.create_iter_result(v, false))
            }
            Ok(Suspension::Returned(v)) => {
                self.generators.insert(id, GeneratorState::Done);
                Ok(self.create_iter_result(v, true))
            }
            Err(e) => {
                self.generators.insert(id, GeneratorState::Done);
                Err(e)
            }
        }
    }

    fn finished_generator(&mut self, id: ObjectId, resume: Resume) -> JsResult<Value> {
        self.generators.insert(id, GeneratorState::Done);
        match resume {
            Resume::Next(_) => Ok(self.create_iter_result(Value::Undefined, true)),
            Resume::Return(v) => Ok(self.create_iter_result(v, true)),
            Resume::Throw(e) => Err(Abrupt::Throw(e)),
        }
    }

    /// `{ value, done }` を作る。
    pub(crate) fn create_iter_result(&mut self, value: Value, done: bool) -> Value {
        let id = self.heap.alloc_ordinary();
        self.create_data_property(id, PropertyKey::from("value"), value);
        self.create_data_property(id, PropertyKey::from("done"), Value::Boolean(done));
        Value::Object(id)
    }

    /// 配列風オブジェクトの反復子（`keys` / `values` / `entries`）。
    pub(crate) fn create_list_iterator(&mut self, target: Value, kind: IterKind) -> Value {
        self.alloc_iterator(IterState::List {
            target,
            index: 0,
            kind,
        })
    }

    /// 値の列をそのまま返す反復子。
    pub(crate) fn create_values_iterator(&mut self, values: Vec<Value>) -> Value {
        self.alloc_iterator(IterState::Values { values, index: 0 })
    }

    fn alloc_iterator(&mut self, state: IterState) -> Value {
        let proto = self.prototype("Iterator");
        let id = self.heap.alloc(ObjectKind::Ordinary, Some(proto));
        self.iterators.insert(id, state);
        Value::Object(id)
    }

    fn builtin_iterator_next(&mut self, id: ObjectId) -> JsResult<Value> {
        let Some(state) = self.iterators.remove(&id) else {
            return Ok(self.create_iter_result(Value::Undefined, true));
        };
        match state {
            IterState::List {
                target,
                index,
                kind,
            } => {
                let len = self.length_of(&target)?;
                if index >= len {
                    return Ok(self.create_iter_result(Value::Undefined, true));
                }
                let key_value = Value::Number(index as f64);
                let value = match kind {
                    IterKind::Keys => key_value,
                    IterKind::Values => self.get(&target, &PropertyKey::string(index.to_string()))?,
                    IterKind::Entries => {
                        let v = self.get(&target, &PropertyKey::string(index.to_string()))?;
                        Value::Object(self.create_array(vec![key_value, v]))
                    }
                };
                self.iterators.insert(
                    id,
                    IterState::List {
                        target,
                        index: index + 1,
                        kind,
                    },
                );
                Ok(self.create_iter_result(value, false))
            }
            IterState::Values { values, index } => match values.get(index).cloned() {
                Some(v) => {
                    self.iterators.insert(
                        id,
                        IterState::Values {
                            values,
                            index: index + 1,
                        },
                    );
                    Ok(self.create_iter_result(v, false))
                }
                None => Ok(self.create_iter_result(Value::Undefined, true)),
            },
        }
    }

    // ---- 反復子プロトコル ----

    pub(crate) fn get_iterator(&mut self, value: &Value) -> JsResult<IteratorRecord> {
        let key = PropertyKey::Symbol(self.well_known.iterator);
        let method = if value.is_nullish() {
            None
        } else {
            self.get_method(value, &key)?
        };
        let Some(method) = method else {
            let shown = self.heap.display_string(value);
            return Err(self.type_error(format!("{} is not iterable", shown)));
        };
        let iterator = self.call(&method, value.clone(), &[])?;
        if !iterator.is_object() {
            return Err(self.type_error("Iterator is not an object"));
        }
        let next = self.get_named(&iterator, "next")?;
        Ok(IteratorRecord {
            iterator,
            next,
            done: false,
        })
    }

    /// 次の値。尽きたら `None`。
    pub(crate) fn iterator_step(&mut self, record: &mut IteratorRecord) -> JsResult<Option<Value>> {
        if record.done {
            return Ok(None);
        }
        let result = match self.call(&record.next, record.iterator.clone(), &[]) {
            Ok(r) => r,
            Err(e) => {
                record.done = true;
                return Err(e);
            }
        };
        if !result.is_object() {
            record.done = true;
            return Err(self.type_error("Iterator result is not an object"));
        }
        let done = self.get_named(&result, "done")?;
        if self.to_boolean(&done) {
            record.done = true;
            return Ok(None);
        }
        self.get_named(&result, "value").map(Some)
    }

    /// 途中で抜けるときに `return()` を呼ぶ。
    pub(crate) fn iterator_close(&mut self, record: &IteratorRecord) -> JsResult<()> {
        if record.done {
            return Ok(());
        }
        if let Some(ret) = self.get_method(&record.iterator, &PropertyKey::from("return"))? {
            self.call(&ret, record.iterator.clone(), &[])?;
        }
        Ok(())
    }

    /// 反復可能な値をすべて取り出す。
    pub(crate) fn iterate_to_vec(&mut self, value: &Value) -> JsResult<Vec<Value>> {
        let mut record = self.get_iterator(value)?;
        let mut out = Vec::new();
        while let Some(v) = self.iterator_step(&mut record)? {
            out.push(v);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// ジェネレータは yield した順に値を返し、最後に戻り値で終わる。
    fn generator_sequence() {
        assert_eq!(
            eval_display("function* g() { yield 1; yield 2; return 3; } const it = g(); [it.next().value, it.next().value, it.next().value, it.next().done].join()"),
            "1,2,3,true"
        );
        assert_eq!(eval_display("function* g() { yield* [4, 5]; } [...g()].join()"), "4,5");
    }

    #[test]
    /// 無限ジェネレータも要求された分だけ進む。
    fn infinite_generator_is_lazy() {
        assert_eq!(
            eval_display("function* g() { let i = 0; while (true) yield i++; } const it = g(); it.next(); it.next().value"),
            "1"
        );
    }

    #[test]
    /// 本体は最初の yield までしか実行されない。
    fn body_runs_only_to_the_next_yield() {
        assert_eq!(
            eval_display("const log = []; function* g() { log.push('a'); yield 1; log.push('b'); yield 2; } const it = g(); const before = log.length; it.next(); `${before} ${log}`"),
            "0 a"
        );
    }

    #[test]
    /// next(v) の引数が中断していた yield 式の値になる。
    fn next_argument_becomes_yield_value() {
        assert_eq!(
            eval_display("function* g() { const x = yield 1; let y; y = yield x * 2; return x + y; } const it = g(); it.next(); const a = it.next(21).value; const b = it.next(100); `${a} ${b.value} ${b.done}`"),
            "42 121 true"
        );
    }

    #[test]
    /// return() は finally を実行し、throw() は本体の catch で受け取れる。
    fn return_and_throw_resume_inside_the_body() {
        assert_eq!(
            eval_display("const log = []; function* g() { try { yield 1; yield 2; } finally { log.push('cleanup'); } } const it = g(); it.next(); const r = it.return(7); `${r.value} ${r.done} ${log} ${it.next().done}`"),
            "7 true cleanup true"
        );
        assert_eq!(
            eval_display("function* g() { while (true) { try { yield 1; } catch (e) { yield 'caught ' + e; } } } const it = g(); it.next(); it.throw('boom').value"),
            "caught boom"
        );
        assert_eq!(
            eval_display("function* g() { yield 1; } const it = g(); it.throw(new Error('early'))"),
            "throw Error: early"
        );
    }

    #[test]
    /// for-of の break で中断中のジェネレータが閉じられる。
    fn break_closes_a_suspended_generator() {
        assert_eq!(
            eval_display("const log = []; function* g() { try { for (let i = 0; ; i++) yield i; } finally { log.push('closed'); } } let s = 0; for (const v of g()) { if (v == 3) break; s += v; } `${s} ${log}`"),
            "3 closed"
        );
    }

    #[test]
    /// yield* は内側のジェネレータへ next の値を渡し、その戻り値を受け取る。
    fn delegation_forwards_values() {
        assert_eq!(
            eval_display("function* inner() { const x = yield 'a'; return x + '!'; } function* outer() { const r = yield* inner(); yield r; } const it = outer(); const first = it.next().value; `${first} ${it.next('back').value}`"),
            "a back!"
        );
    }

    #[test]
    /// 短絡評価の右辺の yield は実行時に SyntaxError になる。
    fn unsupported_yield_position_is_reported() {
        assert_eq!(
            eval_display("function* g() { const a = 0; return a || (yield 1); } g().next()"),
            "throw SyntaxError: yield is not supported in the right side of a logical operator"
        );
    }

    #[test]
    /// 独自の反復子も for-of で回せ、break で return() が呼ばれる。
    fn custom_iterator_and_close() {
        assert_eq!(
            eval_display(
                "let closed = false; const it = { i: 0, [Symbol.iterator]() { return this; }, next() { return { value: this.i++, done: false }; }, return() { closed = true; return {}; } };
                 let s = 0; for (const v of it) { if (v > 3) break; s += v; } `${s} ${closed}`"
            ),
            "6 true"
        );
    }

    #[test]
    /// 反復不可能な値のスプレッドは TypeError。
    fn spread_of_non_iterable() {
        assert_eq!(eval_display("[...5]"), "throw TypeError: 5 is not iterable");
    }

    #[test]
    /// 配列の entries と Map の反復。
    fn builtin_iterators() {
        assert_eq!(eval_display("[...['a', 'b'].entries()].join(';')"), "0,a;1,b");
        assert_eq!(eval_display("const m = new Map([[1, 'x'], [2, 'y']]); [...m.keys()].join()"), "1,2");
    }
}
