// パス: src/interpreter/builtins/promise.rs
// 役割: Promise コンストラクタ・then/catch/finally・組み合わせ関数
// 意図: 状態遷移とジョブ投入は src/interpreter/promise.rs に任せ、ここは公開 API の形だけを作る
// 関連ファイル: src/interpreter/promise.rs

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use runtime_heap::{ObjectId, ObjectKind, PropertyKey, Value};

use super::{define_global, require_new};
use crate::interpreter::{arg, Abrupt, ErrorKind, Interpreter, JsResult};

fn this_promise(interp: &mut Interpreter, this: &Value, method: &str) -> JsResult<ObjectId> {
    match this {
        Value::Object(id) if matches!(interp.heap.kind(*id), ObjectKind::Promise(_)) => Ok(*id),
        _ => {
            let shown = interp.heap.display_string(this);
            Err(interp.type_error(format!("Method Promise.prototype.{} called on incompatible receiver {}", method, shown)))
        }
    }
}

fn callable_or_undefined(interp: &Interpreter, value: Value) -> Value {
    if interp.heap.is_callable(&value) {
        value
    } else {
        Value::Undefined
    }
}

/// 組み合わせ関数の集計先。要素ごとの結果と残り件数を持つ。
struct Aggregate {
    values: RefCell<Vec<Value>>,
    remaining: Cell<usize>,
}

impl Aggregate {
    fn new(len: usize) -> Rc<Self> {
        Rc::new(Self {
            values: RefCell::new(vec![Value::Undefined; len]),
            // 全要素の登録が終わるまで 0 にならないよう 1 つ多く数える
            remaining: Cell::new(len + 1),
        })
    }

    /// 1 件確定させ、全件そろったら `true`。
    fn store(&self, index: usize, value: Value) -> bool {
        if let Some(slot) = self.values.borrow_mut().get_mut(index) {
            *slot = value;
        }
        self.finish_one()
    }

    fn finish_one(&self) -> bool {
        let left = self.remaining.get().saturating_sub(1);
        self.remaining.set(left);
        left == 0
    }
}

#[derive(Clone, Copy)]
enum Combinator {
    All,
    AllSettled,
    Any,
}

fn settled_record(interp: &mut Interpreter, fulfilled: bool, value: Value) -> Value {
    let id = interp.heap.alloc_ordinary();
    let (status, field) = if fulfilled {
        ("fulfilled", "value")
    } else {
        ("rejected", "reason")
    };
    interp.create_data_property(id, PropertyKey::from("status"), Value::string(status));
    interp.create_data_property(id, PropertyKey::from(field), value);
    Value::Object(id)
}

fn aggregate_error(interp: &mut Interpreter, errors: Vec<Value>) -> Value {
    let error = interp.make_error(ErrorKind::Error, "All promises were rejected");
    let list = interp.create_array(errors);
    if let Value::Object(id) = error {
        interp.define_value(id, "name", Value::string("AggregateError"));
        interp.define_value(id, "errors", Value::Object(list));
    }
    error
}

/// 要素 1 つ分のハンドラ。1 度しか効かない。
fn element_handler(
    interp: &mut Interpreter,
    combinator: Combinator,
    fulfilled: bool,
    index: usize,
    aggregate: Rc<Aggregate>,
    result: ObjectId,
) -> Value {
    let called = Cell::new(false);
    let f = interp.native_function("", 1, move |interp, _, args| {
        if called.replace(true) {
            return Ok(Value::Undefined);
        }
        let value = arg(args, 0);
        let stored = match combinator {
            Combinator::AllSettled => settled_record(interp, fulfilled, value),
            _ => value,
        };
        if aggregate.store(index, stored) {
            let values = aggregate.values.borrow().clone();
            if matches!(combinator, Combinator::Any) {
                let error = aggregate_error(interp, values);
                interp.reject_promise(result, error);
            } else {
                let array = interp.create_array(values);
                interp.resolve_promise(result, Value::Object(array))?;
            }
        }
        Ok(Value::Undefined)
    });
    Value::Object(f)
}

fn combine(interp: &mut Interpreter, combinator: Combinator, iterable: &Value) -> JsResult<Value> {
    let result = interp.new_promise();
    let outcome = (|| -> JsResult<()> {
        let items = interp.iterate_to_vec(iterable)?;
        let aggregate = Aggregate::new(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let promise = interp.promise_resolve(item)?;
            let (on_fulfilled, on_rejected) = match combinator {
                Combinator::All => (
                    element_handler(interp, combinator, true, index, aggregate.clone(), result),
                    first_settler(interp, result, false),
                ),
                Combinator::AllSettled => (
                    element_handler(interp, combinator, true, index, aggregate.clone(), result),
                    element_handler(interp, combinator, false, index, aggregate.clone(), result),
                ),
                Combinator::Any => (
                    first_settler(interp, result, true),
                    element_handler(interp, combinator, false, index, aggregate.clone(), result),
                ),
            };
            interp.perform_then(promise, on_fulfilled, on_rejected, None);
        }
        if aggregate.finish_one() {
            let values = aggregate.values.borrow().clone();
            if matches!(combinator, Combinator::Any) {
                let error = aggregate_error(interp, values);
                interp.reject_promise(result, error);
            } else {
                let array = interp.create_array(values);
                interp.resolve_promise(result, Value::Object(array))?;
            }
        }
        Ok(())
    })();
    reject_on_throw(interp, result, outcome)?;
    Ok(Value::Object(result))
}

/// 反復中の例外は結果 Promise の拒否に変える。
fn reject_on_throw(interp: &mut Interpreter, result: ObjectId, outcome: JsResult<()>) -> JsResult<()> {
    match outcome {
        Err(Abrupt::Throw(reason)) => {
            interp.reject_promise(result, reason);
            Ok(())
        }
        other => other,
    }
}

/// 最初の確定で結果 Promise を解決（または拒否）する関数。
fn first_settler(interp: &mut Interpreter, result: ObjectId, fulfill: bool) -> Value {
    let f = interp.native_function("", 1, move |interp, _, args| {
        if fulfill {
            interp.resolve_promise(result, arg(args, 0))?;
        } else {
            interp.reject_promise(result, arg(args, 0));
        }
        Ok(Value::Undefined)
    });
    Value::Object(f)
}

pub(super) fn install(interp: &mut Interpreter) {
    let proto = interp.new_prototype("Promise", ObjectKind::Ordinary);
    let ctor = interp.native_constructor("Promise", 1, proto, |interp, _, args| {
        require_new(interp, "Promise")?;
        let executor = arg(args, 0);
        if !interp.heap.is_callable(&executor) {
            let shown = interp.heap.display_string(&executor);
            return Err(interp.type_error(format!("Promise resolver {} is not a function", shown)));
        }
        let proto = interp.constructing_prototype("Promise");
        let promise = interp.new_promise_with_proto(proto);
        let (resolve, reject) = interp.create_resolving_functions(promise);
        match interp.call(&executor, Value::Undefined, &[Value::Object(resolve), Value::Object(reject)]) {
            Ok(_) => {}
            Err(Abrupt::Throw(e)) => {
                interp.call(&Value::Object(reject), Value::Undefined, &[e])?;
            }
            Err(exit) => return Err(exit),
        }
        Ok(Value::Object(promise))
    });
    define_global(interp, "Promise", Value::Object(ctor));
    let tag = interp.well_known.to_string_tag;
    interp.heap.object_mut(proto).define(
        PropertyKey::Symbol(tag),
        runtime_heap::Property::data(Value::string("Promise"), runtime_heap::Attributes::CONFIGURABLE),
    );

    interp.define_method(proto, "then", 2, |interp, this, args| {
        let promise = this_promise(interp, &this, "then")?;
        let derived = interp.new_promise();
        let on_fulfilled = callable_or_undefined(interp, arg(args, 0));
        let on_rejected = callable_or_undefined(interp, arg(args, 1));
        interp.perform_then(promise, on_fulfilled, on_rejected, Some(derived));
        Ok(Value::Object(derived))
    });
    interp.define_method(proto, "catch", 1, |interp, this, args| {
        interp.invoke(&this, "then", &[Value::Undefined, arg(args, 0)])
    });
    interp.define_method(proto, "finally", 1, |interp, this, args| {
        let on_finally = arg(args, 0);
        if !interp.heap.is_callable(&on_finally) {
            return interp.invoke(&this, "then", &[on_finally.clone(), on_finally]);
        }
        let callback = on_finally.clone();
        let then_finally = interp.native_function("", 1, move |interp, _, args| {
            let value = arg(args, 0);
            let outcome = interp.call(&callback, Value::Undefined, &[])?;
            let settled = interp.promise_resolve(outcome)?;
            let pass = interp.native_function("", 0, move |_, _, _| Ok(value.clone()));
            interp.invoke(&Value::Object(settled), "then", &[Value::Object(pass)])
        });
        let catch_finally = interp.native_function("", 1, move |interp, _, args| {
            let reason = arg(args, 0);
            let outcome = interp.call(&on_finally, Value::Undefined, &[])?;
            let settled = interp.promise_resolve(outcome)?;
            let rethrow = interp.native_function("", 0, move |_, _, _| Err(Abrupt::Throw(reason.clone())));
            interp.invoke(&Value::Object(settled), "then", &[Value::Object(rethrow)])
        });
        interp.invoke(&this, "then", &[Value::Object(then_finally), Value::Object(catch_finally)])
    });

    interp.define_method(ctor, "resolve", 1, |interp, _, args| {
        Ok(Value::Object(interp.promise_resolve(arg(args, 0))?))
    });
    interp.define_method(ctor, "reject", 1, |interp, _, args| {
        let promise = interp.new_promise();
        interp.reject_promise(promise, arg(args, 0));
        Ok(Value::Object(promise))
    });
    interp.define_method(ctor, "withResolvers", 0, |interp, _, _| {
        let promise = interp.new_promise();
        let (resolve, reject) = interp.create_resolving_functions(promise);
        let id = interp.heap.alloc_ordinary();
        interp.create_data_property(id, PropertyKey::from("promise"), Value::Object(promise));
        interp.create_data_property(id, PropertyKey::from("resolve"), Value::Object(resolve));
        interp.create_data_property(id, PropertyKey::from("reject"), Value::Object(reject));
        Ok(Value::Object(id))
    });
    interp.define_method(ctor, "all", 1, |interp, _, args| combine(interp, Combinator::All, &arg(args, 0)));
    interp.define_method(ctor, "allSettled", 1, |interp, _, args| {
        combine(interp, Combinator::AllSettled, &arg(args, 0))
    });
    interp.define_method(ctor, "any", 1, |interp, _, args| combine(interp, Combinator::Any, &arg(args, 0)));
    interp.define_method(ctor, "race", 1, |interp, _, args| {
        let result = interp.new_promise();
        let outcome = (|| -> JsResult<()> {
            for item in interp.iterate_to_vec(&arg(args, 0))? {
                let promise = interp.promise_resolve(item)?;
                let resolve = first_settler(interp, result, true);
                let reject = first_settler(interp, result, false);
                interp.perform_then(promise, resolve, reject, None);
            }
            Ok(())
        })();
        reject_on_throw(interp, result, outcome)?;
        Ok(Value::Object(result))
    });
}

#[cfg(test)]
mod tests {
    use crate::interpreter::test_util::{eval, eval_display};
    use crate::interpreter::Interpreter;

    /// ジョブ消化後のグローバル変数 `r` を表示する。
    fn settled(src: &str) -> String {
        let mut interp = Interpreter::headless();
        eval(&mut interp, src).ok();
        interp
            .global_binding("r")
            .map(|v| interp.heap.display_string(&v))
            .unwrap_or_default()
    }

    #[test]
    /// executor の resolve と then の連鎖。
    fn constructor_and_chain() {
        assert_eq!(settled("var r; new Promise(res => res(2)).then(v => v * 5).then(v => { r = v; });"), "10");
        assert_eq!(settled("var r; new Promise(() => { throw 'boom'; }).catch(e => { r = e; });"), "boom");
    }

    #[test]
    /// finally は値を素通しする。
    fn finally_passes_value() {
        assert_eq!(settled("var r, hit = false; Promise.resolve(3).finally(() => { hit = true; }).then(v => { r = v + ':' + hit; });"), "3:true");
        assert_eq!(settled("var r; Promise.reject(1).finally(() => {}).catch(e => { r = 'caught ' + e; });"), "caught 1");
    }

    #[test]
    /// all / allSettled / any / race。
    fn combinators() {
        assert_eq!(settled("var r; Promise.all([1, Promise.resolve(2), 3]).then(v => { r = v.join(); });"), "1,2,3");
        assert_eq!(settled("var r; Promise.all([]).then(v => { r = v.length; });"), "0");
        assert_eq!(settled("var r; Promise.all([1, Promise.reject('x')]).catch(e => { r = e; });"), "x");
        assert_eq!(
            settled("var r; Promise.allSettled([1, Promise.reject(2)]).then(v => { r = v.map(x => x.status).join(); });"),
            "fulfilled,rejected"
        );
        assert_eq!(settled("var r; Promise.any([Promise.reject(1), 2]).then(v => { r = v; });"), "2");
        assert_eq!(
            settled("var r; Promise.any([Promise.reject(1)]).catch(e => { r = e.name + ' ' + e.errors.join(); });"),
            "AggregateError 1"
        );
        assert_eq!(settled("var r; Promise.race([new Promise(() => {}), 7]).then(v => { r = v; });"), "7");
    }

    #[test]
    /// executor が関数でなければ TypeError。
    fn executor_required() {
        assert_eq!(eval_display("new Promise(1)"), "throw TypeError: Promise resolver 1 is not a function");
    }
}
