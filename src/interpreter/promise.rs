// パス: src/interpreter/promise.rs
// 役割: Promise の状態遷移・リアクションのジョブ化・await を実装する
// 意図: マイクロタスクを `Job` のキューで表し、REPL が入力ごとにまとめて消化できるようにする
// 関連ファイル: src/interpreter/builtins/promise.rs, src/interpreter/host.rs

use std::cell::Cell;
use std::rc::Rc;

use runtime_heap::{ObjectId, ObjectKind, PromiseReaction, PromiseState, ReactionKind, Value};

use super::{Abrupt, ErrorKind, Interpreter, JsResult, RejectionEvent};

/// ジョブキューの要素。
pub(crate) enum Job {
    /// `then` のハンドラを結果値で呼ぶ。
    Reaction {
        reaction: PromiseReaction,
        argument: Value,
    },
    /// thenable の `then` を呼んで Promise を追従させる。
    Thenable {
        promise: ObjectId,
        thenable: Value,
        then: Value,
    },
}

impl Interpreter {
    pub(crate) fn new_promise(&mut self) -> ObjectId {
        let proto = self.prototype("Promise");
        self.new_promise_with_proto(proto)
    }

    pub(crate) fn new_promise_with_proto(&mut self, proto: ObjectId) -> ObjectId {
        self.heap.alloc(
            ObjectKind::Promise(runtime_heap::PromiseData::pending()),
            Some(proto),
        )
    }

    pub(crate) fn is_promise(&self, value: &Value) -> bool {
        matches!(value, Value::Object(id) if matches!(self.heap.kind(*id), ObjectKind::Promise(_)))
    }

    fn promise_state(&self, id: ObjectId) -> Option<(PromiseState, Value, bool)> {
        match self.heap.kind(id) {
            ObjectKind::Promise(data) => Some((data.state, data.result.clone(), data.is_handled)),
            _ => None,
        }
    }

    /// 1 度だけ効く resolve / reject 関数の組を作る。
    pub(crate) fn create_resolving_functions(&mut self, promise: ObjectId) -> (ObjectId, ObjectId) {
        let already = Rc::new(Cell::new(false));
        let flag = already.clone();
        let resolve = self.native_function("", 1, move |interp, _, args| {
            if !flag.replace(true) {
                interp.resolve_promise(promise, super::arg(args, 0))?;
            }
            Ok(Value::Undefined)
        });
        let reject = self.native_function("", 1, move |interp, _, args| {
            if !already.replace(true) {
                interp.reject_promise(promise, super::arg(args, 0));
            }
            Ok(Value::Undefined)
        });
        (resolve, reject)
    }

    /// 値で Promise を解決する。thenable なら追従する。
    pub(crate) fn resolve_promise(&mut self, promise: ObjectId, value: Value) -> JsResult<()> {
        let Value::Object(target) = value else {
            self.fulfill_promise(promise, value);
            return Ok(());
        };
        if target == promise {
            let error = self.make_error(ErrorKind::TypeError, "Cannot resolve a promise with itself");
            self.reject_promise(promise, error);
            return Ok(());
        }
        let then = match self.get_named(&value, "then") {
            Ok(t) => t,
            Err(Abrupt::Throw(e)) => {
                self.reject_promise(promise, e);
                return Ok(());
            }
            Err(exit) => return Err(exit),
        };
        if self.heap.is_callable(&then) {
            self.jobs.push_back(Job::Thenable {
                promise,
                thenable: value,
                then,
            });
        } else {
            self.fulfill_promise(promise, value);
        }
        Ok(())
    }

    fn fulfill_promise(&mut self, promise: ObjectId, value: Value) {
        let reactions = match &mut self.heap.object_mut(promise).kind {
            ObjectKind::Promise(data) if data.state == PromiseState::Pending => {
                data.state = PromiseState::Fulfilled;
                data.result = value.clone();
                data.reject_reactions.clear();
                std::mem::take(&mut data.fulfill_reactions)
            }
            _ => return,
        };
        for reaction in reactions {
            self.jobs.push_back(Job::Reaction {
                reaction,
                argument: value.clone(),
            });
        }
    }

    /// Promise を拒否する。ハンドラが 1 つもなければホストへ通知する。
    pub(crate) fn reject_promise(&mut self, promise: ObjectId, reason: Value) {
        let (reactions, handled) = match &mut self.heap.object_mut(promise).kind {
            ObjectKind::Promise(data) if data.state == PromiseState::Pending => {
                data.state = PromiseState::Rejected;
                data.result = reason.clone();
                data.fulfill_reactions.clear();
                (std::mem::take(&mut data.reject_reactions), data.is_handled)
            }
            _ => return,
        };
        if !handled {
            let shown = self.rejection_display(&reason);
            self.host.promise_rejection(RejectionEvent::Unhandled, &shown);
        }
        for reaction in reactions {
            self.jobs.push_back(Job::Reaction {
                reaction,
                argument: reason.clone(),
            });
        }
    }

    /// 評価結果で Promise を確定させる（`Exit` はそのまま伝播）。
    pub(crate) fn settle_with(&mut self, promise: ObjectId, outcome: JsResult<Value>) -> JsResult<()> {
        match outcome {
            Ok(v) => self.resolve_promise(promise, v),
            Err(Abrupt::Throw(e)) => {
                self.reject_promise(promise, e);
                Ok(())
            }
            Err(exit) => Err(exit),
        }
    }

    fn rejection_display(&self, reason: &Value) -> String {
        match reason {
            Value::Object(id) if matches!(self.heap.kind(*id), ObjectKind::Error { .. }) => {
                self.describe_error(reason)
            }
            other => self.heap.display_string(other),
        }
    }

    /// `promise.then(on_fulfilled, on_rejected)` の中核。`derived` がハンドラの結果を受け取る。
    pub(crate) fn perform_then(
        &mut self,
        promise: ObjectId,
        on_fulfilled: Value,
        on_rejected: Value,
        derived: Option<ObjectId>,
    ) {
        let fulfill = PromiseReaction {
            kind: ReactionKind::Fulfill,
            handler: on_fulfilled,
            derived,
        };
        let reject = PromiseReaction {
            kind: ReactionKind::Reject,
            handler: on_rejected,
            derived,
        };
        let Some((state, result, handled)) = self.promise_state(promise) else {
            return;
        };
        match state {
            PromiseState::Pending => {
                if let ObjectKind::Promise(data) = &mut self.heap.object_mut(promise).kind {
                    data.fulfill_reactions.push(fulfill);
                    data.reject_reactions.push(reject);
                }
            }
            PromiseState::Fulfilled => self.jobs.push_back(Job::Reaction {
                reaction: fulfill,
                argument: result,
            }),
            PromiseState::Rejected => {
                if !handled {
                    let shown = self.rejection_display(&result);
                    self.host.promise_rejection(RejectionEvent::HandledLate, &shown);
                }
                self.jobs.push_back(Job::Reaction {
                    reaction: reject,
                    argument: result,
                });
            }
        }
        if let ObjectKind::Promise(data) = &mut self.heap.object_mut(promise).kind {
            data.is_handled = true;
        }
    }

    /// ジョブを 1 つ実行する。キューが空なら `false`。
    pub(crate) fn run_one_job(&mut self) -> JsResult<bool> {
        let Some(job) = self.jobs.pop_front() else {
            return Ok(false);
        };
        match job {
            Job::Reaction { reaction, argument } => {
                let outcome = if self.heap.is_callable(&reaction.handler) {
                    self.call(&reaction.handler, Value::Undefined, &[argument])
                } else {
                    match reaction.kind {
                        ReactionKind::Fulfill => Ok(argument),
                        ReactionKind::Reject => Err(Abrupt::Throw(argument)),
                    }
                };
                match (reaction.derived, outcome) {
                    (Some(derived), outcome) => self.settle_with(derived, outcome)?,
                    (None, Err(Abrupt::Exit(code))) => return Err(Abrupt::Exit(code)),
                    (None, _) => {}
                }
            }
            Job::Thenable {
                promise,
                thenable,
                then,
            } => {
                let (resolve, reject) = self.create_resolving_functions(promise);
                let outcome = self.call(
                    &then,
                    thenable,
                    &[Value::Object(resolve), Value::Object(reject)],
                );
                match outcome {
                    Ok(_) => {}
                    Err(Abrupt::Throw(e)) => {
                        self.call(&Value::Object(reject), Value::Undefined, &[e])?;
                    }
                    Err(exit) => return Err(exit),
                }
            }
        }
        Ok(true)
    }

    /// 値を Promise に包む（既に Promise ならそのまま）。
    pub(crate) fn promise_resolve(&mut self, value: Value) -> JsResult<ObjectId> {
        if let Value::Object(id) = value {
            if matches!(self.heap.kind(id), ObjectKind::Promise(_)) {
                return Ok(id);
            }
        }
        let promise = self.new_promise();
        self.resolve_promise(promise, value)?;
        Ok(promise)
    }

    /// `await v`。Promise が確定するまでジョブを消化する。
    pub(crate) fn await_value(&mut self, value: Value) -> JsResult<Value> {
        let promise = self.promise_resolve(value)?;
        loop {
            let Some((state, result, handled)) = self.promise_state(promise) else {
                return Ok(Value::Undefined);
            };
            match state {
                PromiseState::Fulfilled => return Ok(result),
                PromiseState::Rejected => {
                    if !handled {
                        let shown = self.rejection_display(&result);
                        self.host.promise_rejection(RejectionEvent::HandledLate, &shown);
                        if let ObjectKind::Promise(data) = &mut self.heap.object_mut(promise).kind {
                            data.is_handled = true;
                        }
                    }
                    return Err(Abrupt::Throw(result));
                }
                PromiseState::Pending => {
                    if !self.run_one_job()? {
                        return Err(self.throw(
                            ErrorKind::InternalError,
                            "Awaited promise can never settle",
                        ));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::interpreter::test_util::{eval, eval_display};
    use crate::interpreter::{CaptureHost, Interpreter};

    #[test]
    /// then のハンドラはジョブとして後から実行される。
    fn reactions_run_as_jobs() {
        assert_eq!(
            eval_display("const log = []; Promise.resolve(1).then(v => log.push(v)); log.push(0); log.length"),
            "1"
        );
        assert_eq!(
            eval_display("var out = []; Promise.resolve(1).then(v => v + 1).then(v => out.push(v)); 0"),
            "0"
        );
    }

    #[test]
    /// await は Promise の値を取り出し、拒否は例外になる。
    fn await_unwraps() {
        assert_eq!(
            eval_display("async function f() { const a = await Promise.resolve(2); return a * 3; } var r; f().then(v => r = v); 0"),
            "0"
        );
        let mut interp = Interpreter::headless();
        eval(
            &mut interp,
            "var caught; async function g() { try { await Promise.reject(new TypeError('no')); } catch (e) { caught = e.message; } } g();",
        )
        .ok();
        assert_eq!(
            interp.global_binding("caught").map(|v| interp.heap.display_string(&v)),
            Some("no".to_string())
        );
        let mut interp = Interpreter::headless();
        eval(&mut interp, "var r; (async () => { r = (await Promise.resolve(2)) * 3; })();").ok();
        assert_eq!(
            interp.global_binding("r").map(|v| interp.heap.display_string(&v)),
            Some("6".to_string())
        );
    }

    #[test]
    /// ハンドラのない拒否と、後からのハンドラ追加がホストへ通知される。
    fn rejection_tracking() {
        let host = Rc::new(CaptureHost::new());
        let mut interp = Interpreter::new(host.clone());
        eval(&mut interp, "const p = Promise.reject(5); p.catch(() => {});").ok();
        assert_eq!(host.lines(), vec!["unhandled rejection: 5", "late handler: 5"]);
    }

    #[test]
    /// 非同期関数の例外は拒否された Promise になる。
    fn async_function_rejects() {
        let mut interp = Interpreter::headless();
        eval(&mut interp, "var msg; (async () => { throw new Error('bad'); })().catch(e => { msg = e.message; });").ok();
        assert_eq!(
            interp.global_binding("msg").map(|v| interp.heap.display_string(&v)),
            Some("bad".to_string())
        );
    }
}
