// パス: src/interpreter/generator.rs
// 役割: ジェネレータ本体を yield ごとに中断・再開できる形で実行する
// 意図: yield を含む文だけを明示的なフレームで実行し、それ以外は通常の評価器に任せる
// 関連ファイル: src/interpreter/iter.rs, src/interpreter/eval.rs, src/interpreter/function.rs
//! ジェネレータ本体の実行
//!
//! 中断中の状態はフレームの列（文の並びの位置、ループの反復子、try の段階）と
//! 各フレームのスコープで表す。`yield` を含まない文は `exec_stmt` がそのまま実行する。
//!
//! 式の中の `yield` は評価順に取り出して一時束縛 `%yield0`, `%yield1` … に置き換え、
//! すべての `yield` が値を受け取ってから残りの式を評価する。したがって
//! `f(a(), yield b)` の `a()` は再開後に呼ばれる。短絡評価の右辺や条件演算子の枝、
//! `?.` の連鎖、代入先のパターンに現れる `yield` は SyntaxError とする。

use std::rc::Rc;

use runtime_heap::{PropertyKey, Value};

use super::eval::{Binder, Flow};
use super::iter::IteratorRecord;
use super::scope::{self, Lookup, Scope, ScopeRef};
use super::{Abrupt, ErrorKind, Interpreter, JsResult};
use crate::ast::{
    Argument, ArrayElement, AssignOp, Expr, ForHead, ForInit, FunctionBody, FunctionDef, MemberProp,
    Pattern, PropDef, PropKey, Stmt, SwitchCase, VarDeclarator, VarKind,
};

/// 中断中のジェネレータへの入力（`next` / `throw` / `return`）。
#[derive(Debug)]
pub(crate) enum Resume {
    Next(Value),
    Throw(Value),
    Return(Value),
}

/// 1 回の再開の結果。
#[derive(Debug)]
pub(crate) enum Suspension {
    Yielded(Value),
    Returned(Value),
}

/// フレームの間を伝わる完了。
enum Signal {
    Normal,
    Break(Option<String>),
    Continue(Option<String>),
    Return(Value),
    Throw(Value),
}

impl From<Flow> for Signal {
    fn from(flow: Flow) -> Self {
        match flow {
            Flow::Normal(_) => Signal::Normal,
            Flow::Return(v) => Signal::Return(v),
            Flow::Break(label) => Signal::Break(label),
            Flow::Continue(label) => Signal::Continue(label),
        }
    }
}

/// フレームに届くもの。
enum Incoming {
    /// 積んだ子フレームの完了。
    Child(Signal),
    /// 値フレームが求めた値。
    Value(Value),
    Resume(Resume),
}

enum Step {
    Again,
    Push(Frame),
    Replace(Frame),
    Complete(Signal),
    Deliver(Value),
    Yield(Value),
}

/// 中断できるジェネレータ本体。
pub(crate) struct GeneratorBody {
    frames: Vec<Frame>,
    started: bool,
}

impl GeneratorBody {
    /// 引数の束縛と巻き上げを済ませた関数スコープから本体を用意する。
    pub(crate) fn new(def: &FunctionDef, scope: ScopeRef) -> Self {
        let body: Rc<[Stmt]> = match &def.body {
            FunctionBody::Block(body) => Rc::from(body.as_slice()),
            FunctionBody::Expr(expr) => Rc::from(vec![Stmt::Return(Some((**expr).clone()))]),
        };
        GeneratorBody {
            frames: vec![Frame::Seq(Seq {
                body,
                next: 0,
                scope,
            })],
            started: false,
        }
    }

    pub(crate) fn started(&self) -> bool {
        self.started
    }

    /// 次の `yield` か本体の終わりまで進める。
    pub(crate) fn resume(&mut self, interp: &mut Interpreter, resume: Resume) -> JsResult<Suspension> {
        let mut incoming = if self.started {
            Some(Incoming::Resume(resume))
        } else {
            self.started = true;
            None
        };
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Ok(Suspension::Returned(Value::Undefined));
            };
            let step = match frame.advance(interp, incoming.take()) {
                Ok(step) => step,
                Err(Abrupt::Throw(e)) => Step::Complete(Signal::Throw(e)),
                Err(exit) => {
                    self.frames.clear();
                    return Err(exit);
                }
            };
            match step {
                Step::Again => {}
                Step::Push(child) => self.frames.push(child),
                Step::Replace(next) => {
                    if let Some(top) = self.frames.last_mut() {
                        *top = next;
                    }
                }
                Step::Complete(signal) => {
                    self.frames.pop();
                    if self.frames.is_empty() {
                        return match signal {
                            Signal::Return(v) => Ok(Suspension::Returned(v)),
                            Signal::Throw(e) => Err(Abrupt::Throw(e)),
                            _ => Ok(Suspension::Returned(Value::Undefined)),
                        };
                    }
                    incoming = Some(Incoming::Child(signal));
                }
                Step::Deliver(value) => {
                    self.frames.pop();
                    incoming = Some(Incoming::Value(value));
                }
                Step::Yield(value) => return Ok(Suspension::Yielded(value)),
            }
        }
    }
}

// ---- フレーム ----

enum Frame {
    /// 文の並び。
    Seq(Seq),
    /// `yield` を含む式。値は下のフレームへ渡す。
    Value(ValueFrame),
    /// 式の値で完了する文（式文・return・throw）。
    Then { then: Then, value: Option<ValueFrame> },
    Var(VarFrame),
    /// 条件に `yield` を含む if。
    Branch {
        test: Option<ValueFrame>,
        consequent: Body,
        alternate: Option<Body>,
        scope: ScopeRef,
    },
    Loop(Box<LoopFrame>),
    /// ラベル付き文と switch。該当する break を通常完了に変える。
    Breakable {
        labels: Vec<String>,
        unlabeled: bool,
        inner: Option<Box<Frame>>,
    },
    Try(Box<TryFrame>),
}

enum Then {
    Discard,
    Return,
    Throw,
}

impl Frame {
    fn advance(&mut self, interp: &mut Interpreter, incoming: Option<Incoming>) -> JsResult<Step> {
        match self {
            Frame::Seq(seq) => seq.advance(interp, incoming),
            Frame::Value(frame) => frame.advance(interp, incoming),
            Frame::Then { then, value } => match incoming {
                Some(Incoming::Value(v)) => Ok(Step::Complete(match then {
                    Then::Discard => Signal::Normal,
                    Then::Return => Signal::Return(v),
                    Then::Throw => Signal::Throw(v),
                })),
                Some(Incoming::Child(signal)) => Ok(Step::Complete(signal)),
                _ => Ok(push_value(value.take())),
            },
            Frame::Var(frame) => frame.advance(interp, incoming),
            Frame::Branch {
                test,
                consequent,
                alternate,
                scope,
            } => match incoming {
                Some(Incoming::Value(t)) => {
                    let chosen = if interp.to_boolean(&t) {
                        Some(&*consequent)
                    } else {
                        alternate.as_ref()
                    };
                    match chosen {
                        Some(body) => Ok(Step::Replace(body.enter(interp, scope)?)),
                        None => Ok(Step::Complete(Signal::Normal)),
                    }
                }
                Some(Incoming::Child(signal)) => Ok(Step::Complete(signal)),
                _ => Ok(push_value(test.take())),
            },
            Frame::Loop(frame) => frame.advance(interp, incoming),
            Frame::Breakable {
                labels,
                unlabeled,
                inner,
            } => match incoming {
                Some(Incoming::Child(signal)) => Ok(Step::Complete(match signal {
                    Signal::Break(None) if *unlabeled => Signal::Normal,
                    Signal::Break(Some(label)) if labels.contains(&label) => Signal::Normal,
                    other => other,
                })),
                _ => Ok(match inner.take() {
                    Some(frame) => Step::Push(*frame),
                    None => Step::Complete(Signal::Normal),
                }),
            },
            Frame::Try(frame) => frame.advance(interp, incoming),
        }
    }
}

fn push_value(frame: Option<ValueFrame>) -> Step {
    match frame {
        Some(frame) => Step::Push(Frame::Value(frame)),
        None => Step::Complete(Signal::Normal),
    }
}

struct Seq {
    body: Rc<[Stmt]>,
    next: usize,
    scope: ScopeRef,
}

impl Seq {
    fn advance(&mut self, interp: &mut Interpreter, incoming: Option<Incoming>) -> JsResult<Step> {
        if let Some(Incoming::Child(signal)) = incoming {
            if !matches!(signal, Signal::Normal) {
                return Ok(Step::Complete(signal));
            }
        }
        let body = self.body.clone();
        let Some(stmt) = body.get(self.next) else {
            return Ok(Step::Complete(Signal::Normal));
        };
        self.next += 1;
        if stmt_yields(stmt) {
            return Ok(Step::Push(frame_for(interp, stmt, &self.scope)?));
        }
        match interp.exec_stmt(stmt, &self.scope)? {
            Flow::Normal(_) => Ok(Step::Again),
            other => Ok(Step::Complete(other.into())),
        }
    }
}

/// 繰り返し入る文。ブロックなら入るたびに新しいブロックスコープを作る。
#[derive(Clone)]
struct Body {
    stmts: Rc<[Stmt]>,
    block: bool,
}

impl Body {
    fn of(stmt: &Stmt) -> Body {
        match stmt {
            Stmt::Block(body) => Body::block(body),
            other => Body {
                stmts: Rc::from(std::slice::from_ref(other)),
                block: false,
            },
        }
    }

    fn block(stmts: &[Stmt]) -> Body {
        Body {
            stmts: Rc::from(stmts),
            block: true,
        }
    }

    fn enter(&self, interp: &mut Interpreter, scope: &ScopeRef) -> JsResult<Frame> {
        let scope = if self.block {
            let block = Scope::new_block(scope);
            interp.hoist_declarations(&self.stmts, &block, false)?;
            block
        } else {
            scope.clone()
        };
        Ok(Frame::Seq(Seq {
            body: self.stmts.clone(),
            next: 0,
            scope,
        }))
    }
}

/// `yield` を取り出した式と、取り出した `yield` の列。
struct YieldPlan {
    steps: Vec<YieldStep>,
    result: Expr,
}

struct YieldStep {
    arg: Option<Expr>,
    delegate: bool,
}

fn temp_name(index: usize) -> String {
    format!("%yield{}", index)
}

struct ValueFrame {
    plan: YieldPlan,
    next: usize,
    /// 一時束縛を置くスコープ。
    scope: ScopeRef,
    /// `yield*` で委譲中の反復子。
    delegate: Option<IteratorRecord>,
}

impl ValueFrame {
    fn new(interp: &mut Interpreter, expr: &Expr, scope: &ScopeRef) -> JsResult<ValueFrame> {
        let plan = Hoister::plan(expr).map_err(|place| unsupported(interp, place))?;
        Ok(ValueFrame {
            plan,
            next: 0,
            scope: Scope::new_block(scope),
            delegate: None,
        })
    }

    fn store(&mut self, value: Value) {
        self.scope
            .borrow_mut()
            .declare(&temp_name(self.next), Some(value), false);
        self.next += 1;
    }

    fn advance(&mut self, interp: &mut Interpreter, incoming: Option<Incoming>) -> JsResult<Step> {
        if let Some(Incoming::Resume(resume)) = incoming {
            if let Some(record) = self.delegate.take() {
                return self.resume_delegate(interp, record, resume);
            }
            match resume {
                Resume::Next(v) => self.store(v),
                Resume::Throw(e) => return Ok(Step::Complete(Signal::Throw(e))),
                Resume::Return(v) => return Ok(Step::Complete(Signal::Return(v))),
            }
        }
        let Some(step) = self.plan.steps.get(self.next) else {
            let value = interp.eval_expr(&self.plan.result, &self.scope)?;
            return Ok(Step::Deliver(value));
        };
        let delegate = step.delegate;
        let value = match &step.arg {
            Some(arg) => interp.eval_expr(arg, &self.scope)?,
            None => Value::Undefined,
        };
        if !delegate {
            return Ok(Step::Yield(value));
        }
        let record = interp.get_iterator(&value)?;
        let result = interp.call(&record.next, record.iterator.clone(), &[Value::Undefined])?;
        self.delegate_result(interp, record, result)
    }

    fn delegate_result(
        &mut self,
        interp: &mut Interpreter,
        record: IteratorRecord,
        result: Value,
    ) -> JsResult<Step> {
        if !result.is_object() {
            return Err(interp.type_error("Iterator result is not an object"));
        }
        let done = interp.get_named(&result, "done")?;
        let value = interp.get_named(&result, "value")?;
        if interp.to_boolean(&done) {
            self.store(value);
            Ok(Step::Again)
        } else {
            self.delegate = Some(record);
            Ok(Step::Yield(value))
        }
    }

    fn resume_delegate(
        &mut self,
        interp: &mut Interpreter,
        record: IteratorRecord,
        resume: Resume,
    ) -> JsResult<Step> {
        match resume {
            Resume::Next(v) => {
                let result = interp.call(&record.next, record.iterator.clone(), &[v])?;
                self.delegate_result(interp, record, result)
            }
            Resume::Throw(e) => match interp.get_method(&record.iterator, &PropertyKey::from("throw"))? {
                Some(throw) => {
                    let result = interp.call(&throw, record.iterator.clone(), &[e])?;
                    self.delegate_result(interp, record, result)
                }
                None => {
                    interp.iterator_close(&record)?;
                    Err(interp.type_error("The iterator does not provide a 'throw' method"))
                }
            },
            Resume::Return(v) => match interp.get_method(&record.iterator, &PropertyKey::from("return"))? {
                Some(ret) => {
                    let result = interp.call(&ret, record.iterator.clone(), &[v])?;
                    if !result.is_object() {
                        return Err(interp.type_error("Iterator result is not an object"));
                    }
                    let done = interp.get_named(&result, "done")?;
                    let value = interp.get_named(&result, "value")?;
                    if interp.to_boolean(&done) {
                        Ok(Step::Complete(Signal::Return(value)))
                    } else {
                        self.delegate = Some(record);
                        Ok(Step::Yield(value))
                    }
                }
                None => Ok(Step::Complete(Signal::Return(v))),
            },
        }
    }
}

struct VarFrame {
    kind: VarKind,
    decls: Rc<[VarDeclarator]>,
    next: usize,
    scope: ScopeRef,
}

impl VarFrame {
    fn bind(&self, interp: &mut Interpreter, target: &Pattern, value: Value) -> JsResult<()> {
        let binder = if self.kind == VarKind::Var {
            Binder::Assign
        } else {
            Binder::Initialize
        };
        interp.bind_pattern(target, value, &self.scope, binder)
    }

    fn advance(&mut self, interp: &mut Interpreter, incoming: Option<Incoming>) -> JsResult<Step> {
        let decls = self.decls.clone();
        match incoming {
            Some(Incoming::Value(value)) => {
                if let Some(decl) = decls.get(self.next) {
                    self.bind(interp, &decl.target, value)?;
                }
                self.next += 1;
            }
            Some(Incoming::Child(signal)) => return Ok(Step::Complete(signal)),
            _ => {}
        }
        while let Some(decl) = decls.get(self.next) {
            match &decl.init {
                Some(init) if expr_yields(init) => {
                    let frame = ValueFrame::new(interp, init, &self.scope)?;
                    return Ok(Step::Push(Frame::Value(frame)));
                }
                Some(init) => {
                    let value = interp.eval_named(init, &self.scope, &decl.target)?;
                    self.bind(interp, &decl.target, value)?;
                }
                None if self.kind == VarKind::Var => {}
                None => interp.bind_pattern(&decl.target, Value::Undefined, &self.scope, Binder::Initialize)?,
            }
            self.next += 1;
        }
        Ok(Step::Complete(Signal::Normal))
    }
}

enum LoopKind {
    While {
        test: Expr,
    },
    DoWhile {
        test: Expr,
    },
    For {
        test: Option<Expr>,
        update: Option<Expr>,
        iter_scope: ScopeRef,
        per_iteration: Vec<String>,
    },
    ForIn {
        head: ForHead,
        keys: std::vec::IntoIter<Rc<str>>,
    },
    ForOf {
        head: ForHead,
        record: IteratorRecord,
    },
}

struct LoopFrame {
    kind: LoopKind,
    labels: Vec<String>,
    body: Body,
    scope: ScopeRef,
    started: bool,
}

impl LoopFrame {
    fn advance(&mut self, interp: &mut Interpreter, incoming: Option<Incoming>) -> JsResult<Step> {
        match incoming {
            Some(Incoming::Value(test)) => {
                if interp.to_boolean(&test) {
                    Ok(Step::Push(self.body.enter(interp, &self.scope)?))
                } else {
                    Ok(Step::Complete(Signal::Normal))
                }
            }
            Some(Incoming::Child(signal)) => self.after_body(interp, signal),
            _ => {
                let first = !self.started;
                self.started = true;
                self.begin_iteration(interp, first)
            }
        }
    }

    fn begin_iteration(&mut self, interp: &mut Interpreter, first: bool) -> JsResult<Step> {
        let outer = self.scope.clone();
        let body_scope = match &mut self.kind {
            LoopKind::While { test } => return test_then_body(interp, test, &outer, &self.body),
            LoopKind::DoWhile { test } => {
                if !first {
                    return test_then_body(interp, test, &outer, &self.body);
                }
                outer
            }
            LoopKind::For {
                test,
                update,
                iter_scope,
                per_iteration,
            } => {
                if !first {
                    if !per_iteration.is_empty() {
                        let next = Scope::new_block(&outer);
                        for name in per_iteration.iter() {
                            let value = match scope::lookup(iter_scope, name) {
                                Lookup::Found(v) => Some(v),
                                _ => None,
                            };
                            next.borrow_mut().declare(name, value, true);
                        }
                        *iter_scope = next;
                    }
                    if let Some(update) = update {
                        interp.eval_expr(update, iter_scope)?;
                    }
                }
                if let Some(test) = test {
                    let t = interp.eval_expr(test, iter_scope)?;
                    if !interp.to_boolean(&t) {
                        return Ok(Step::Complete(Signal::Normal));
                    }
                }
                iter_scope.clone()
            }
            LoopKind::ForIn { head, keys } => {
                let Some(key) = keys.next() else {
                    return Ok(Step::Complete(Signal::Normal));
                };
                let iter_scope = Scope::new_block(&outer);
                interp.bind_for_head(head, Value::String(key), &iter_scope)?;
                iter_scope
            }
            LoopKind::ForOf { head, record } => {
                let Some(item) = interp.iterator_step(record)? else {
                    return Ok(Step::Complete(Signal::Normal));
                };
                let iter_scope = Scope::new_block(&outer);
                if let Err(e) = interp.bind_for_head(head, item, &iter_scope) {
                    interp.iterator_close(record)?;
                    return Err(e);
                }
                iter_scope
            }
        };
        Ok(Step::Push(self.body.enter(interp, &body_scope)?))
    }

    fn after_body(&mut self, interp: &mut Interpreter, signal: Signal) -> JsResult<Step> {
        let exit = match signal {
            Signal::Normal | Signal::Continue(None) => return Ok(Step::Again),
            Signal::Continue(Some(label)) if self.labels.contains(&label) => return Ok(Step::Again),
            Signal::Break(None) => Signal::Normal,
            Signal::Break(Some(label)) if self.labels.contains(&label) => Signal::Normal,
            other => other,
        };
        if let LoopKind::ForOf { record, .. } = &self.kind {
            if matches!(exit, Signal::Throw(_)) {
                let _ = interp.iterator_close(record);
            } else {
                interp.iterator_close(record)?;
            }
        }
        Ok(Step::Complete(exit))
    }
}

/// 条件が真なら本体へ入る。条件に `yield` があれば値フレームを先に積む。
fn test_then_body(interp: &mut Interpreter, test: &Expr, scope: &ScopeRef, body: &Body) -> JsResult<Step> {
    if expr_yields(test) {
        return Ok(Step::Push(Frame::Value(ValueFrame::new(interp, test, scope)?)));
    }
    let t = interp.eval_expr(test, scope)?;
    if interp.to_boolean(&t) {
        Ok(Step::Push(body.enter(interp, scope)?))
    } else {
        Ok(Step::Complete(Signal::Normal))
    }
}

enum TryPhase {
    Start,
    Block,
    Catch,
    Finally(Signal),
}

struct TryFrame {
    block: Body,
    handler: Option<(Option<Pattern>, Body)>,
    finalizer: Option<Body>,
    scope: ScopeRef,
    phase: TryPhase,
}

impl TryFrame {
    fn advance(&mut self, interp: &mut Interpreter, incoming: Option<Incoming>) -> JsResult<Step> {
        let signal = match incoming {
            Some(Incoming::Child(signal)) => signal,
            _ => {
                self.phase = TryPhase::Block;
                return Ok(Step::Push(self.block.enter(interp, &self.scope)?));
            }
        };
        match std::mem::replace(&mut self.phase, TryPhase::Start) {
            TryPhase::Block => {
                let (thrown, (param, body)) = match (signal, self.handler.clone()) {
                    (Signal::Throw(thrown), Some(handler)) => (thrown, handler),
                    (signal, _) => return self.finish(interp, signal),
                };
                self.phase = TryPhase::Catch;
                let catch_scope = Scope::new_block(&self.scope);
                if let Some(param) = param {
                    match interp.bind_pattern(&param, thrown, &catch_scope, Binder::Declare { mutable: true }) {
                        Ok(()) => {}
                        Err(Abrupt::Throw(e)) => return self.finish(interp, Signal::Throw(e)),
                        Err(exit) => return Err(exit),
                    }
                }
                Ok(Step::Push(body.enter(interp, &catch_scope)?))
            }
            TryPhase::Catch => self.finish(interp, signal),
            TryPhase::Finally(saved) => Ok(Step::Complete(match signal {
                Signal::Normal => saved,
                abrupt => abrupt,
            })),
            TryPhase::Start => Ok(Step::Complete(signal)),
        }
    }

    fn finish(&mut self, interp: &mut Interpreter, signal: Signal) -> JsResult<Step> {
        match &self.finalizer {
            Some(finalizer) => {
                let frame = finalizer.enter(interp, &self.scope)?;
                self.phase = TryPhase::Finally(signal);
                Ok(Step::Push(frame))
            }
            None => Ok(Step::Complete(signal)),
        }
    }
}

// ---- 文からフレームへ ----

fn unsupported(interp: &mut Interpreter, place: &str) -> Abrupt {
    interp.throw(
        ErrorKind::SyntaxError,
        format!("yield is not supported in {}", place),
    )
}

fn is_loop(stmt: &Stmt) -> bool {
    matches!(
        stmt,
        Stmt::While { .. } | Stmt::DoWhile { .. } | Stmt::For { .. } | Stmt::ForIn { .. } | Stmt::ForOf { .. }
    )
}

/// `yield` を含む文のフレームを作る。
fn frame_for(interp: &mut Interpreter, stmt: &Stmt, scope: &ScopeRef) -> JsResult<Frame> {
    let complete_with = |interp: &mut Interpreter, then: Then, expr: &Expr| -> JsResult<Frame> {
        Ok(Frame::Then {
            then,
            value: Some(ValueFrame::new(interp, expr, scope)?),
        })
    };
    match stmt {
        Stmt::Block(body) => Body::block(body).enter(interp, scope),
        Stmt::Expr(expr) => complete_with(interp, Then::Discard, expr),
        Stmt::Return(Some(expr)) => complete_with(interp, Then::Return, expr),
        Stmt::Throw(expr) => complete_with(interp, Then::Throw, expr),
        Stmt::Var { kind, decls } => Ok(Frame::Var(VarFrame {
            kind: *kind,
            decls: Rc::from(decls.as_slice()),
            next: 0,
            scope: scope.clone(),
        })),
        Stmt::If {
            test,
            consequent,
            alternate,
        } => {
            let consequent = Body::of(consequent);
            let alternate = alternate.as_deref().map(Body::of);
            if expr_yields(test) {
                return Ok(Frame::Branch {
                    test: Some(ValueFrame::new(interp, test, scope)?),
                    consequent,
                    alternate,
                    scope: scope.clone(),
                });
            }
            let t = interp.eval_expr(test, scope)?;
            match (interp.to_boolean(&t), alternate) {
                (true, _) => consequent.enter(interp, scope),
                (false, Some(alternate)) => alternate.enter(interp, scope),
                (false, None) => Ok(Frame::Seq(Seq {
                    body: Rc::from(Vec::new()),
                    next: 0,
                    scope: scope.clone(),
                })),
            }
        }
        Stmt::Labeled { .. } => {
            let mut labels = Vec::new();
            let mut inner = stmt;
            while let Stmt::Labeled { label, body } = inner {
                labels.push(label.clone());
                inner = body;
            }
            let frame = if is_loop(inner) {
                loop_frame(interp, inner, scope, labels.clone())?
            } else {
                frame_for(interp, inner, scope)?
            };
            Ok(Frame::Breakable {
                labels,
                unlabeled: false,
                inner: Some(Box::new(frame)),
            })
        }
        Stmt::Switch {
            discriminant,
            cases,
        } => switch_frame(interp, discriminant, cases, scope),
        Stmt::Try {
            block,
            handler,
            finalizer,
        } => Ok(Frame::Try(Box::new(TryFrame {
            block: Body::block(block),
            handler: handler
                .as_ref()
                .map(|h| (h.param.clone(), Body::block(&h.body))),
            finalizer: finalizer.as_deref().map(Body::block),
            scope: scope.clone(),
            phase: TryPhase::Start,
        }))),
        Stmt::Export(inner) => frame_for(interp, inner, scope),
        stmt if is_loop(stmt) => loop_frame(interp, stmt, scope, Vec::new()),
        _ => Err(unsupported(interp, "this statement")),
    }
}

fn loop_frame(interp: &mut Interpreter, stmt: &Stmt, scope: &ScopeRef, labels: Vec<String>) -> JsResult<Frame> {
    let (kind, body) = match stmt {
        Stmt::While { test, body } => (LoopKind::While { test: test.clone() }, body),
        Stmt::DoWhile { body, test } => (LoopKind::DoWhile { test: test.clone() }, body),
        Stmt::For {
            init,
            test,
            update,
            body,
        } => {
            let header_yields = match init {
                Some(ForInit::Var { decls, .. }) => decls.iter().any(declarator_yields),
                Some(ForInit::Expr(e)) => expr_yields(e),
                None => false,
            } || test.as_ref().is_some_and(expr_yields)
                || update.as_ref().is_some_and(expr_yields);
            if header_yields {
                return Err(unsupported(interp, "a for loop header"));
            }
            let iter_scope = Scope::new_block(scope);
            let mut per_iteration = Vec::new();
            match init {
                Some(ForInit::Var { kind, decls }) => {
                    let decl_stmt = Stmt::Var {
                        kind: *kind,
                        decls: decls.clone(),
                    };
                    if *kind != VarKind::Var {
                        interp.hoist_declarations(std::slice::from_ref(&decl_stmt), &iter_scope, false)?;
                        for decl in decls {
                            decl.target.bound_names(&mut per_iteration);
                        }
                    }
                    interp.exec_stmt(&decl_stmt, &iter_scope)?;
                }
                Some(ForInit::Expr(e)) => {
                    interp.eval_expr(e, &iter_scope)?;
                }
                None => {}
            }
            (
                LoopKind::For {
                    test: test.clone(),
                    update: update.clone(),
                    iter_scope,
                    per_iteration,
                },
                body,
            )
        }
        Stmt::ForIn { head, object, body } => {
            if head_yields(head) || expr_yields(object) {
                return Err(unsupported(interp, "a for-in header"));
            }
            let target = interp.eval_expr(object, scope)?;
            let keys = if target.is_nullish() {
                Vec::new()
            } else {
                let id = interp.to_object(&target)?;
                interp.for_in_keys(id)
            };
            (
                LoopKind::ForIn {
                    head: head.clone(),
                    keys: keys.into_iter(),
                },
                body,
            )
        }
        Stmt::ForOf {
            head,
            iterable,
            body,
        } => {
            if head_yields(head) || expr_yields(iterable) {
                return Err(unsupported(interp, "a for-of header"));
            }
            let source = interp.eval_expr(iterable, scope)?;
            let record = interp.get_iterator(&source)?;
            (
                LoopKind::ForOf {
                    head: head.clone(),
                    record,
                },
                body,
            )
        }
        other => return frame_for(interp, other, scope),
    };
    Ok(Frame::Loop(Box::new(LoopFrame {
        kind,
        labels,
        body: Body::of(body),
        scope: scope.clone(),
        started: false,
    })))
}

fn switch_frame(
    interp: &mut Interpreter,
    discriminant: &Expr,
    cases: &[SwitchCase],
    scope: &ScopeRef,
) -> JsResult<Frame> {
    if expr_yields(discriminant) || cases.iter().any(|c| c.test.as_ref().is_some_and(expr_yields)) {
        return Err(unsupported(interp, "a switch test"));
    }
    let value = interp.eval_expr(discriminant, scope)?;
    let block = Scope::new_block(scope);
    let all: Vec<Stmt> = cases.iter().flat_map(|c| c.body.iter().cloned()).collect();
    interp.hoist_declarations(&all, &block, false)?;
    let mut start = None;
    for (i, case) in cases.iter().enumerate() {
        if let Some(test) = &case.test {
            let t = interp.eval_expr(test, &block)?;
            if t.strict_equals(&value) {
                start = Some(i);
                break;
            }
        }
    }
    let start = start.or_else(|| cases.iter().position(|c| c.test.is_none()));
    let body: Vec<Stmt> = match start {
        Some(start) => cases[start..].iter().flat_map(|c| c.body.iter().cloned()).collect(),
        None => Vec::new(),
    };
    Ok(Frame::Breakable {
        labels: Vec::new(),
        unlabeled: true,
        inner: Some(Box::new(Frame::Seq(Seq {
            body: Rc::from(body),
            next: 0,
            scope: block,
        }))),
    })
}

// ---- yield の検出と取り出し ----

/// 文が（入れ子の関数を除いて）`yield` を含むか。
fn stmt_yields(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Var { decls, .. } => decls.iter().any(declarator_yields),
        Stmt::Function(_)
        | Stmt::Break(_)
        | Stmt::Continue(_)
        | Stmt::Empty
        | Stmt::Debugger
        | Stmt::Import { .. } => false,
        Stmt::Return(expr) => expr.as_ref().is_some_and(expr_yields),
        Stmt::If {
            test,
            consequent,
            alternate,
        } => expr_yields(test) || stmt_yields(consequent) || alternate.as_deref().is_some_and(stmt_yields),
        Stmt::While { test, body } | Stmt::DoWhile { body, test } => expr_yields(test) || stmt_yields(body),
        Stmt::For {
            init,
            test,
            update,
            body,
        } => {
            let init_yields = match init {
                Some(ForInit::Var { decls, .. }) => decls.iter().any(declarator_yields),
                Some(ForInit::Expr(e)) => expr_yields(e),
                None => false,
            };
            init_yields
                || test.as_ref().is_some_and(expr_yields)
                || update.as_ref().is_some_and(expr_yields)
                || stmt_yields(body)
        }
        Stmt::ForIn {
            head,
            object: source,
            body,
        }
        | Stmt::ForOf {
            head,
            iterable: source,
            body,
        } => head_yields(head) || expr_yields(source) || stmt_yields(body),
        Stmt::Labeled { body, .. } => stmt_yields(body),
        Stmt::Switch {
            discriminant,
            cases,
        } => {
            expr_yields(discriminant)
                || cases
                    .iter()
                    .any(|c| c.test.as_ref().is_some_and(expr_yields) || c.body.iter().any(stmt_yields))
        }
        Stmt::Throw(e) | Stmt::Expr(e) => expr_yields(e),
        Stmt::Try {
            block,
            handler,
            finalizer,
        } => {
            block.iter().any(stmt_yields)
                || handler.as_ref().is_some_and(|h| {
                    h.param.as_ref().is_some_and(pattern_yields) || h.body.iter().any(stmt_yields)
                })
                || finalizer.as_ref().is_some_and(|f| f.iter().any(stmt_yields))
        }
        Stmt::Block(body) => body.iter().any(stmt_yields),
        Stmt::Export(inner) => stmt_yields(inner),
    }
}

fn declarator_yields(decl: &VarDeclarator) -> bool {
    pattern_yields(&decl.target) || decl.init.as_ref().is_some_and(expr_yields)
}

fn head_yields(head: &ForHead) -> bool {
    match head {
        ForHead::Var { target, .. } | ForHead::Target(target) => pattern_yields(target),
    }
}

fn key_yields(key: &PropKey) -> bool {
    matches!(key, PropKey::Computed(e) if expr_yields(e))
}

fn pattern_yields(pattern: &Pattern) -> bool {
    match pattern {
        Pattern::Ident(_) => false,
        Pattern::Member(e) => expr_yields(e),
        Pattern::Object { props, rest } => {
            props.iter().any(|p| {
                key_yields(&p.key) || pattern_yields(&p.target) || p.default.as_ref().is_some_and(expr_yields)
            }) || rest.as_deref().is_some_and(pattern_yields)
        }
        Pattern::Array { elements, rest } => {
            elements
                .iter()
                .flatten()
                .any(|e| pattern_yields(&e.target) || e.default.as_ref().is_some_and(expr_yields))
                || rest.as_deref().is_some_and(pattern_yields)
        }
    }
}

fn expr_yields(expr: &Expr) -> bool {
    match expr {
        Expr::Yield { .. } => true,
        Expr::Number(_)
        | Expr::BigInt(_)
        | Expr::String(_)
        | Expr::Regex { .. }
        | Expr::Bool(_)
        | Expr::Null
        | Expr::Ident(_)
        | Expr::This
        | Expr::Function(_) => false,
        Expr::Template { exprs, .. } | Expr::Sequence(exprs) => exprs.iter().any(expr_yields),
        Expr::Array(elements) => elements.iter().any(|e| match e {
            ArrayElement::Hole => false,
            ArrayElement::Item(e) | ArrayElement::Spread(e) => expr_yields(e),
        }),
        Expr::Object(props) => props.iter().any(|p| match p {
            PropDef::KeyValue(key, value) => key_yields(key) || expr_yields(value),
            PropDef::Shorthand(_) => false,
            PropDef::Method(key, _) | PropDef::Getter(key, _) | PropDef::Setter(key, _) => key_yields(key),
            PropDef::Spread(e) => expr_yields(e),
        }),
        Expr::Member { object, property, .. } => {
            expr_yields(object) || matches!(property, MemberProp::Computed(e) if expr_yields(e))
        }
        Expr::Call { callee, args, .. } | Expr::New { callee, args } => {
            expr_yields(callee) || args.iter().any(argument_yields)
        }
        Expr::OptionalChain(inner) | Expr::Await(inner) => expr_yields(inner),
        Expr::Unary { arg, .. } => expr_yields(arg),
        Expr::Update { target, .. } => expr_yields(target),
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            expr_yields(left) || expr_yields(right)
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => expr_yields(test) || expr_yields(consequent) || expr_yields(alternate),
        Expr::Assign { target, value, .. } => pattern_yields(target) || expr_yields(value),
    }
}

fn argument_yields(arg: &Argument) -> bool {
    match arg {
        Argument::Item(e) | Argument::Spread(e) => expr_yields(e),
    }
}

type Hoisted<T> = Result<T, &'static str>;

/// 式から `yield` を評価順に取り出し、一時束縛の参照に置き換える。
struct Hoister {
    steps: Vec<YieldStep>,
}

impl Hoister {
    fn plan(expr: &Expr) -> Hoisted<YieldPlan> {
        let mut hoister = Hoister { steps: Vec::new() };
        let result = hoister.expr(expr)?;
        Ok(YieldPlan {
            steps: hoister.steps,
            result,
        })
    }

    fn boxed(&mut self, expr: &Expr) -> Hoisted<Box<Expr>> {
        self.expr(expr).map(Box::new)
    }

    fn list(&mut self, exprs: &[Expr]) -> Hoisted<Vec<Expr>> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn key(&mut self, key: &PropKey) -> Hoisted<PropKey> {
        Ok(match key {
            PropKey::Computed(e) => PropKey::Computed(self.boxed(e)?),
            name => name.clone(),
        })
    }

    fn arguments(&mut self, args: &[Argument]) -> Hoisted<Vec<Argument>> {
        args.iter()
            .map(|a| {
                Ok(match a {
                    Argument::Item(e) => Argument::Item(self.expr(e)?),
                    Argument::Spread(e) => Argument::Spread(self.expr(e)?),
                })
            })
            .collect()
    }

    fn expr(&mut self, expr: &Expr) -> Hoisted<Expr> {
        if !expr_yields(expr) {
            return Ok(expr.clone());
        }
        Ok(match expr {
            Expr::Yield { arg, delegate } => {
                let arg = match arg {
                    Some(a) => Some(self.expr(a)?),
                    None => None,
                };
                self.steps.push(YieldStep {
                    arg,
                    delegate: *delegate,
                });
                Expr::Ident(temp_name(self.steps.len() - 1))
            }
            Expr::Template { quasis, exprs } => Expr::Template {
                quasis: quasis.clone(),
                exprs: self.list(exprs)?,
            },
            Expr::Sequence(exprs) => Expr::Sequence(self.list(exprs)?),
            Expr::Array(elements) => Expr::Array(
                elements
                    .iter()
                    .map(|e| {
                        Ok(match e {
                            ArrayElement::Hole => ArrayElement::Hole,
                            ArrayElement::Item(e) => ArrayElement::Item(self.expr(e)?),
                            ArrayElement::Spread(e) => ArrayElement::Spread(self.expr(e)?),
                        })
                    })
                    .collect::<Hoisted<_>>()?,
            ),
            Expr::Object(props) => Expr::Object(
                props
                    .iter()
                    .map(|p| {
                        Ok(match p {
                            PropDef::KeyValue(key, value) => PropDef::KeyValue(self.key(key)?, self.expr(value)?),
                            PropDef::Method(key, f) => PropDef::Method(self.key(key)?, f.clone()),
                            PropDef::Getter(key, f) => PropDef::Getter(self.key(key)?, f.clone()),
                            PropDef::Setter(key, f) => PropDef::Setter(self.key(key)?, f.clone()),
                            PropDef::Spread(e) => PropDef::Spread(self.expr(e)?),
                            shorthand => shorthand.clone(),
                        })
                    })
                    .collect::<Hoisted<_>>()?,
            ),
            Expr::Member {
                object,
                property,
                optional,
            } => Expr::Member {
                object: self.boxed(object)?,
                property: match property {
                    MemberProp::Computed(e) => MemberProp::Computed(self.boxed(e)?),
                    name => name.clone(),
                },
                optional: *optional,
            },
            Expr::Call {
                callee,
                args,
                optional,
            } => Expr::Call {
                callee: self.boxed(callee)?,
                args: self.arguments(args)?,
                optional: *optional,
            },
            Expr::New { callee, args } => Expr::New {
                callee: self.boxed(callee)?,
                args: self.arguments(args)?,
            },
            Expr::OptionalChain(_) => return Err("an optional chain"),
            Expr::Await(arg) => Expr::Await(self.boxed(arg)?),
            Expr::Unary { op, arg } => Expr::Unary {
                op: *op,
                arg: self.boxed(arg)?,
            },
            Expr::Update { op, prefix, target } => Expr::Update {
                op: *op,
                prefix: *prefix,
                target: self.boxed(target)?,
            },
            Expr::Binary { op, left, right } => Expr::Binary {
                op: *op,
                left: self.boxed(left)?,
                right: self.boxed(right)?,
            },
            Expr::Logical { op, left, right } => {
                if expr_yields(right) {
                    return Err("the right side of a logical operator");
                }
                Expr::Logical {
                    op: *op,
                    left: self.boxed(left)?,
                    right: right.clone(),
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if expr_yields(consequent) || expr_yields(alternate) {
                    return Err("a conditional branch");
                }
                Expr::Conditional {
                    test: self.boxed(test)?,
                    consequent: consequent.clone(),
                    alternate: alternate.clone(),
                }
            }
            Expr::Assign { op, target, value } => {
                if pattern_yields(target) {
                    return Err("an assignment target");
                }
                if matches!(op, AssignOp::Logical(_)) {
                    return Err("a logical assignment");
                }
                Expr::Assign {
                    op: *op,
                    target: target.clone(),
                    value: self.boxed(value)?,
                }
            }
            other => other.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_program, ParseMode};

    fn first_expr(src: &str) -> Expr {
        let program = parse_program(&format!("function* g() {{ {} }}", src), ParseMode::Script).expect("parse");
        let Some(Stmt::Function(def)) = program.body.first() else {
            panic!("not a function");
        };
        match &def.body {
            FunctionBody::Block(body) => match body.first() {
                Some(Stmt::Expr(e)) => e.clone(),
                other => panic!("unexpected {:?}", other),
            },
            FunctionBody::Expr(e) => (**e).clone(),
        }
    }

    #[test]
    /// 入れ子の yield は内側から順に取り出される。
    fn nested_yields_are_hoisted_inside_out() {
        let plan = Hoister::plan(&first_expr("f(yield (yield 1))")).expect("plan");
        assert_eq!(plan.steps.len(), 2);
        assert!(matches!(&plan.steps[1].arg, Some(Expr::Ident(name)) if name == "%yield0"));
        assert!(matches!(&plan.result, Expr::Call { args, .. }
            if matches!(args.first(), Some(Argument::Item(Expr::Ident(name))) if name == "%yield1")));
    }

    #[test]
    fn short_circuit_positions_are_rejected() {
        assert!(Hoister::plan(&first_expr("a || (yield 1)")).is_err());
        assert!(Hoister::plan(&first_expr("a ? yield 1 : 2")).is_err());
        assert!(Hoister::plan(&first_expr("(yield 1) || a")).is_ok());
    }

    #[test]
    /// 入れ子の関数の中の yield は数えない。
    fn nested_functions_are_opaque() {
        assert!(!expr_yields(&first_expr("(function* inner() { yield 1 })")));
        assert!(expr_yields(&first_expr("[1, ...(yield)]")));
    }
}
