// パス: src/interpreter/eval.rs
// 役割: 文と式の評価（ツリー評価器の本体）
// 意図: AST の各ノードを JavaScript の評価規則に沿って実行し、制御フローを `Flow` で表す
// 関連ファイル: src/interpreter/function.rs, src/interpreter/ops.rs, src/ast.rs

use num_bigint::BigInt;
use num_traits::One;
use runtime_heap::{Attributes, ObjectId, Property, PropertyKey, Slot, Value};

use super::ops::to_int32;
use super::scope::{self, AssignResult, Lookup, Scope, ScopeRef};
use super::{Abrupt, ErrorKind, Interpreter, JsResult};
use crate::ast::{
    Argument, ArrayElement, AssignOp, Expr, ForHead, ForInit, LogicalOp, MemberProp,
    Pattern, PropDef, PropKey, Stmt, UnaryOp, UpdateOp, VarKind,
};

/// 文の実行結果（完了の種類）。
#[derive(Debug)]
pub(crate) enum Flow {
    /// 通常完了。式文なら値を持つ。
    Normal(Option<Value>),
    Return(Value),
    Break(Option<String>),
    Continue(Option<String>),
}

impl Flow {
    pub(crate) fn completion(self) -> Option<Value> {
        match self {
            Flow::Normal(v) => v,
            Flow::Return(v) => Some(v),
            _ => None,
        }
    }
}

/// パターン束縛の方法。
#[derive(Clone, Copy, Debug)]
pub(crate) enum Binder {
    /// 指定スコープに新しい束縛を作る（仮引数・catch 節・ループ変数）。
    Declare { mutable: bool },
    /// 巻き上げ済みの let / const を初期化する。
    Initialize,
    /// 通常の代入（`var` を含む）。
    Assign,
}

/// 代入先の参照。
enum Reference {
    Binding(String),
    Property { base: Value, key: PropertyKey },
}

enum LoopAction {
    Next(Option<Value>),
    Exit(Option<Value>),
    Propagate(Flow),
}

fn loop_action(flow: Flow, labels: &[String]) -> LoopAction {
    match flow {
        Flow::Normal(v) => LoopAction::Next(v),
        Flow::Continue(None) => LoopAction::Next(None),
        Flow::Continue(Some(l)) if labels.contains(&l) => LoopAction::Next(None),
        Flow::Break(None) => LoopAction::Exit(None),
        Flow::Break(Some(l)) if labels.contains(&l) => LoopAction::Exit(None),
        other => LoopAction::Propagate(other),
    }
}

/// 式が無名関数なら、代入先の名前を関数名として推論する。
fn inferred_name(target: &Pattern) -> Option<&str> {
    match target {
        Pattern::Ident(name) => Some(name),
        _ => None,
    }
}

impl Interpreter {
    // ---- 文 ----

    pub(crate) fn exec_block_body(&mut self, body: &[Stmt], scope: &ScopeRef) -> JsResult<Flow> {
        let mut last = None;
        for stmt in body {
            match self.exec_stmt(stmt, scope)? {
                Flow::Normal(Some(v)) => last = Some(v),
                Flow::Normal(None) => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal(last))
    }

    fn exec_block(&mut self, body: &[Stmt], scope: &ScopeRef) -> JsResult<Flow> {
        let block = Scope::new_block(scope);
        self.hoist_declarations(body, &block, false)?;
        self.exec_block_body(body, &block)
    }

    pub(crate) fn exec_stmt(&mut self, stmt: &Stmt, scope: &ScopeRef) -> JsResult<Flow> {
        match stmt {
            Stmt::Var { kind, decls } => {
                for decl in decls {
                    match (&decl.init, kind) {
                        (None, VarKind::Var) => {}
                        (None, _) => {
                            self.bind_pattern(&decl.target, Value::Undefined, scope, Binder::Initialize)?
                        }
                        (Some(init), _) => {
                            let value = self.eval_named(init, scope, &decl.target)?;
                            let binder = if *kind == VarKind::Var {
                                Binder::Assign
                            } else {
                                Binder::Initialize
                            };
                            self.bind_pattern(&decl.target, value, scope, binder)?;
                        }
                    }
                }
                Ok(Flow::Normal(None))
            }
            Stmt::Function(_) | Stmt::Empty | Stmt::Debugger => Ok(Flow::Normal(None)),
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(e) => self.eval_expr(e, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                let t = self.eval_expr(test, scope)?;
                if self.to_boolean(&t) {
                    self.exec_stmt(consequent, scope)
                } else if let Some(alt) = alternate {
                    self.exec_stmt(alt, scope)
                } else {
                    Ok(Flow::Normal(None))
                }
            }
            Stmt::While { .. }
            | Stmt::DoWhile { .. }
            | Stmt::For { .. }
            | Stmt::ForIn { .. }
            | Stmt::ForOf { .. } => self.exec_loop(stmt, scope, &[]),
            Stmt::Break(label) => Ok(Flow::Break(label.clone())),
            Stmt::Continue(label) => Ok(Flow::Continue(label.clone())),
            Stmt::Labeled { .. } => {
                let mut labels = Vec::new();
                let mut inner = stmt;
                while let Stmt::Labeled { label, body } = inner {
                    labels.push(label.clone());
                    inner = body;
                }
                let flow = match inner {
                    Stmt::While { .. }
                    | Stmt::DoWhile { .. }
                    | Stmt::For { .. }
                    | Stmt::ForIn { .. }
                    | Stmt::ForOf { .. } => self.exec_loop(inner, scope, &labels)?,
                    other => self.exec_stmt(other, scope)?,
                };
                match flow {
                    Flow::Break(Some(l)) if labels.contains(&l) => Ok(Flow::Normal(None)),
                    other => Ok(other),
                }
            }
            Stmt::Switch {
                discriminant,
                cases,
            } => {
                let value = self.eval_expr(discriminant, scope)?;
                let block = Scope::new_block(scope);
                let all: Vec<Stmt> = cases.iter().flat_map(|c| c.body.iter().cloned()).collect();
                self.hoist_declarations(&all, &block, false)?;
                let mut start = None;
                for (i, case) in cases.iter().enumerate() {
                    if let Some(test) = &case.test {
                        let t = self.eval_expr(test, &block)?;
                        if t.strict_equals(&value) {
                            start = Some(i);
                            break;
                        }
                    }
                }
                let start = start.or_else(|| cases.iter().position(|c| c.test.is_none()));
                let mut last = None;
                if let Some(start) = start {
                    for case in &cases[start..] {
                        match self.exec_block_body(&case.body, &block)? {
                            Flow::Normal(v) => last = v.or(last),
                            Flow::Break(None) => return Ok(Flow::Normal(last)),
                            other => return Ok(other),
                        }
                    }
                }
                Ok(Flow::Normal(last))
            }
            Stmt::Throw(expr) => {
                let value = self.eval_expr(expr, scope)?;
                Err(Abrupt::Throw(value))
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                let mut result = self.exec_block(block, scope);
                if let (Err(Abrupt::Throw(thrown)), Some(handler)) = (&result, handler) {
                    let thrown = thrown.clone();
                    let catch_scope = Scope::new_block(scope);
                    result = match &handler.param {
                        Some(param) => self
                            .bind_pattern(param, thrown, &catch_scope, Binder::Declare { mutable: true })
                            .and_then(|_| self.exec_block(&handler.body, &catch_scope)),
                        None => self.exec_block(&handler.body, &catch_scope),
                    };
                }
                if let Err(Abrupt::Exit(_)) = result {
                    return result;
                }
                if let Some(finalizer) = finalizer {
                    match self.exec_block(finalizer, scope)? {
                        Flow::Normal(_) => {}
                        abrupt => return Ok(abrupt),
                    }
                }
                result
            }
            Stmt::Block(body) => self.exec_block(body, scope),
            Stmt::Expr(expr) => Ok(Flow::Normal(Some(self.eval_expr(expr, scope)?))),
            Stmt::Import { source, .. } => Err(self.throw(
                ErrorKind::Error,
                format!("Cannot load module '{}': module loading is not available", source),
            )),
            Stmt::Export(inner) => self.exec_stmt(inner, scope),
        }
    }

    fn exec_loop(&mut self, stmt: &Stmt, scope: &ScopeRef, labels: &[String]) -> JsResult<Flow> {
        let mut last = None;
        match stmt {
            Stmt::While { test, body } => loop {
                let t = self.eval_expr(test, scope)?;
                if !self.to_boolean(&t) {
                    break;
                }
                match loop_action(self.exec_stmt(body, scope)?, labels) {
                    LoopAction::Next(v) => last = v.or(last),
                    LoopAction::Exit(v) => {
                        last = v.or(last);
                        break;
                    }
                    LoopAction::Propagate(flow) => return Ok(flow),
                }
            },
            Stmt::DoWhile { body, test } => loop {
                match loop_action(self.exec_stmt(body, scope)?, labels) {
                    LoopAction::Next(v) => last = v.or(last),
                    LoopAction::Exit(v) => {
                        last = v.or(last);
                        break;
                    }
                    LoopAction::Propagate(flow) => return Ok(flow),
                }
                let t = self.eval_expr(test, scope)?;
                if !self.to_boolean(&t) {
                    break;
                }
            },
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let mut iter_scope = Scope::new_block(scope);
                let mut per_iteration = Vec::new();
                match init {
                    Some(ForInit::Var { kind, decls }) => {
                        let decl_stmt = Stmt::Var {
                            kind: *kind,
                            decls: decls.clone(),
                        };
                        if *kind != VarKind::Var {
                            self.hoist_declarations(std::slice::from_ref(&decl_stmt), &iter_scope, false)?;
                            for decl in decls {
                                decl.target.bound_names(&mut per_iteration);
                            }
                        }
                        self.exec_stmt(&decl_stmt, &iter_scope)?;
                    }
                    Some(ForInit::Expr(e)) => {
                        self.eval_expr(e, &iter_scope)?;
                    }
                    None => {}
                }
                loop {
                        if let Some(test) = test {
                        let t = self.eval_expr(test, &iter_scope)?;
                        if !self.to_boolean(&t) {
                            break;
                        }
                    }
                    match loop_action(self.exec_stmt(body, &iter_scope)?, labels) {
                        LoopAction::Next(v) => last = v.or(last),
                        LoopAction::Exit(v) => {
                            last = v.or(last);
                            break;
                        }
                        LoopAction::Propagate(flow) => return Ok(flow),
                    }
                    if !per_iteration.is_empty() {
                        // 周回ごとに let 束縛を複製し、クロージャが周回ごとの値を捕捉できるようにする
                        let next = Scope::new_block(scope);
                        for name in &per_iteration {
                            let value = match scope::lookup(&iter_scope, name) {
                                Lookup::Found(v) => Some(v),
                                _ => None,
                            };
                            next.borrow_mut().declare(name, value, true);
                        }
                        iter_scope = next;
                    }
                    if let Some(update) = update {
                        self.eval_expr(update, &iter_scope)?;
                    }
                }
            }
            Stmt::ForIn { head, object, body } => {
                let target = self.eval_expr(object, scope)?;
                if target.is_nullish() {
                    return Ok(Flow::Normal(None));
                }
                let id = self.to_object(&target)?;
                for key in self.for_in_keys(id) {
                        let iter_scope = Scope::new_block(scope);
                    self.bind_for_head(head, Value::String(key), &iter_scope)?;
                    match loop_action(self.exec_stmt(body, &iter_scope)?, labels) {
                        LoopAction::Next(v) => last = v.or(last),
                        LoopAction::Exit(v) => {
                            last = v.or(last);
                            break;
                        }
                        LoopAction::Propagate(flow) => return Ok(flow),
                    }
                }
            }
            Stmt::ForOf {
                head,
                iterable,
                body,
            } => {
                let source = self.eval_expr(iterable, scope)?;
                let mut record = self.get_iterator(&source)?;
                while let Some(item) = self.iterator_step(&mut record)? {
                    let iter_scope = Scope::new_block(scope);
                    if let Err(e) = self.bind_for_head(head, item, &iter_scope) {
                        self.iterator_close(&record)?;
                        return Err(e);
                    }
                    let flow = match self.exec_stmt(body, &iter_scope) {
                        Ok(flow) => flow,
                        Err(e) => {
                            if matches!(e, Abrupt::Throw(_)) {
                                let _ = self.iterator_close(&record);
                            }
                            return Err(e);
                        }
                    };
                    match loop_action(flow, labels) {
                        LoopAction::Next(v) => last = v.or(last),
                        LoopAction::Exit(v) => {
                            last = v.or(last);
                            self.iterator_close(&record)?;
                            break;
                        }
                        LoopAction::Propagate(flow) => {
                            self.iterator_close(&record)?;
                            return Ok(flow);
                        }
                    }
                }
            }
            other => return self.exec_stmt(other, scope),
        }
        Ok(Flow::Normal(last))
    }

    pub(crate) fn bind_for_head(&mut self, head: &ForHead, value: Value, scope: &ScopeRef) -> JsResult<()> {
        match head {
            ForHead::Var {
                kind: VarKind::Var,
                target,
            } => self.bind_pattern(target, value, scope, Binder::Assign),
            ForHead::Var { kind, target } => self.bind_pattern(
                target,
                value,
                scope,
                Binder::Declare {
                    mutable: *kind == VarKind::Let,
                },
            ),
            ForHead::Target(target) => self.bind_pattern(target, value, scope, Binder::Assign),
        }
    }

    // ---- 束縛 ----

    pub(crate) fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Value,
        scope: &ScopeRef,
        binder: Binder,
    ) -> JsResult<()> {
        match pattern {
            Pattern::Ident(name) => self.bind_name(name, value, scope, binder),
            Pattern::Member(expr) => {
                let reference = self.eval_reference(expr, scope)?;
                self.put_reference(&reference, value, scope)
            }
            Pattern::Object { props, rest } => {
                if value.is_nullish() {
                    let shown = self.heap.display_string(&value);
                    return Err(self.type_error(format!(
                        "Cannot destructure '{}' as it is {}.",
                        shown, shown
                    )));
                }
                let mut used = Vec::new();
                for prop in props {
                    let key = self.eval_prop_key(&prop.key, scope)?;
                    let mut v = self.get(&value, &key)?;
                    if v.is_undefined() {
                        if let Some(default) = &prop.default {
                            v = self.eval_named(default, scope, &prop.target)?;
                        }
                    }
                    used.push(key);
                    self.bind_pattern(&prop.target, v, scope, binder)?;
                }
                if let Some(rest) = rest {
                    let rest_obj = self.heap.alloc_ordinary();
                    if let Value::Object(source) = &value {
                        for key in self.own_enumerable_keys(*source) {
                            let key = PropertyKey::String(key);
                            if used.contains(&key) {
                                continue;
                            }
                            let v = self.get(&value, &key)?;
                            self.create_data_property(rest_obj, key, v);
                        }
                    }
                    self.bind_pattern(rest, Value::Object(rest_obj), scope, binder)?;
                }
                Ok(())
            }
            Pattern::Array { elements, rest } => {
                let mut record = self.get_iterator(&value)?;
                for element in elements {
                    let item = self.iterator_step(&mut record)?;
                    let Some(element) = element else {
                        continue;
                    };
                    let mut v = item.unwrap_or(Value::Undefined);
                    if v.is_undefined() {
                        if let Some(default) = &element.default {
                            v = self.eval_named(default, scope, &element.target)?;
                        }
                    }
                    self.bind_pattern(&element.target, v, scope, binder)?;
                }
                if let Some(rest) = rest {
                    let mut items = Vec::new();
                    while let Some(item) = self.iterator_step(&mut record)? {
                        items.push(item);
                    }
                    let array = self.create_array(items);
                    self.bind_pattern(rest, Value::Object(array), scope, binder)?;
                } else if !record.done {
                    self.iterator_close(&record)?;
                }
                Ok(())
            }
        }
    }

    fn bind_name(&mut self, name: &str, value: Value, scope: &ScopeRef, binder: Binder) -> JsResult<()> {
        match binder {
            Binder::Declare { mutable } => {
                scope.borrow_mut().declare(name, Some(value), mutable);
                Ok(())
            }
            Binder::Initialize => {
                // 巻き上げ済みの束縛を内側から探して初期化する
                let mut current = Some(scope.clone());
                while let Some(s) = current {
                    if s.borrow().has_own(name) {
                        s.borrow_mut().initialize(name, value);
                        return Ok(());
                    }
                    current = s.borrow().parent();
                }
                scope.borrow_mut().declare(name, Some(value), true);
                Ok(())
            }
            Binder::Assign => self.assign_identifier(name, value, scope),
        }
    }

    pub(crate) fn assign_identifier(&mut self, name: &str, value: Value, scope: &ScopeRef) -> JsResult<()> {
        match scope::assign(scope, name, value.clone()) {
            AssignResult::Done => Ok(()),
            AssignResult::Const => Err(self.type_error(format!("Invalid assignment to const '{}'", name))),
            AssignResult::Uninitialized => Err(self.throw(
                ErrorKind::ReferenceError,
                format!("Cannot access '{}' before initialization", name),
            )),
            AssignResult::Missing => {
                let key = PropertyKey::from(name);
                let global = self.global;
                if self.strict && !self.has_property(global, &key)? {
                    return Err(self.throw(
                        ErrorKind::ReferenceError,
                        format!("'{}' is not defined", name),
                    ));
                }
                self.set(&Value::Object(global), key, value)
            }
        }
    }

    pub(crate) fn lookup_identifier(&mut self, name: &str, scope: &ScopeRef) -> JsResult<Option<Value>> {
        match scope::lookup(scope, name) {
            Lookup::Found(v) => Ok(Some(v)),
            Lookup::Uninitialized => Err(self.throw(
                ErrorKind::ReferenceError,
                format!("Cannot access '{}' before initialization", name),
            )),
            Lookup::Missing => {
                let key = PropertyKey::from(name);
                let global = self.global;
                if self.has_property(global, &key)? {
                    Ok(Some(self.get(&Value::Object(global), &key)?))
                } else {
                    Ok(None)
                }
            }
        }
    }

    // ---- 式 ----

    /// 無名関数の初期化子なら代入先の名前を付けて評価する。
    pub(crate) fn eval_named(&mut self, expr: &Expr, scope: &ScopeRef, target: &Pattern) -> JsResult<Value> {
        if let (Expr::Function(def), Some(name)) = (expr, inferred_name(target)) {
            if def.name.is_none() {
                return Ok(Value::Object(self.make_function_expression(def, scope, Some(name))));
            }
        }
        self.eval_expr(expr, scope)
    }

    pub(crate) fn eval_expr(&mut self, expr: &Expr, scope: &ScopeRef) -> JsResult<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::BigInt(digits) => match digits.parse::<BigInt>() {
                Ok(b) => Ok(Value::bigint(b)),
                Err(_) => Err(self.throw(ErrorKind::SyntaxError, "Invalid BigInt literal")),
            },
            Expr::String(s) => Ok(Value::string(s)),
            Expr::Template { quasis, exprs } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(e) = exprs.get(i) {
                        let v = self.eval_expr(e, scope)?;
                        out.push_str(&self.to_string(&v)?);
                    }
                }
                Ok(Value::string(out))
            }
            Expr::Regex { pattern, flags } => self.regexp_create(pattern, flags),
            Expr::Bool(b) => Ok(Value::Boolean(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Ident(name) => match self.lookup_identifier(name, scope)? {
                Some(v) => Ok(v),
                None => Err(self.throw(
                    ErrorKind::ReferenceError,
                    format!("'{}' is not defined", name),
                )),
            },
            Expr::This => Ok(scope::this_value(scope)),
            Expr::Array(elements) => {
                let mut values = Vec::new();
                let mut holes = Vec::new();
                for element in elements {
                    match element {
                        ArrayElement::Hole => {
                            holes.push(values.len());
                            values.push(Value::Undefined);
                        }
                        ArrayElement::Item(e) => values.push(self.eval_expr(e, scope)?),
                        ArrayElement::Spread(e) => {
                            let source = self.eval_expr(e, scope)?;
                            values.extend(self.iterate_to_vec(&source)?);
                        }
                    }
                }
                let array = self.create_array(values);
                for index in holes {
                    self.heap
                        .object_mut(array)
                        .remove(&PropertyKey::string(index.to_string()));
                }
                Ok(Value::Object(array))
            }
            Expr::Object(props) => self.eval_object_literal(props, scope),
            Expr::Function(def) => Ok(Value::Object(self.make_function_expression(def, scope, None))),
            Expr::Member { .. } | Expr::Call { .. } => Ok(self
                .eval_chain(expr, scope)?
                .map(|(_, v)| v)
                .unwrap_or(Value::Undefined)),
            Expr::OptionalChain(inner) => Ok(self
                .eval_chain(inner, scope)?
                .map(|(_, v)| v)
                .unwrap_or(Value::Undefined)),
            Expr::New { callee, args } => {
                let ctor = self.eval_expr(callee, scope)?;
                let args = self.eval_arguments(args, scope)?;
                if !self.is_constructor(&ctor) {
                    return Err(self.type_error(format!(
                        "{} is not a constructor",
                        describe_callee(callee)
                    )));
                }
                self.construct(&ctor, &args)
            }
            Expr::Unary { op, arg } => self.eval_unary(*op, arg, scope),
            Expr::Update { op, prefix, target } => {
                let reference = self.eval_reference(target, scope)?;
                let old = self.get_reference(&reference, scope)?;
                let old = self.to_numeric(&old)?;
                let new = match (&old, op) {
                    (Value::BigInt(b), UpdateOp::Increment) => Value::bigint(&**b + BigInt::one()),
                    (Value::BigInt(b), UpdateOp::Decrement) => Value::bigint(&**b - BigInt::one()),
                    (v, UpdateOp::Increment) => Value::Number(v.as_number().unwrap_or(f64::NAN) + 1.0),
                    (v, UpdateOp::Decrement) => Value::Number(v.as_number().unwrap_or(f64::NAN) - 1.0),
                };
                self.put_reference(&reference, new.clone(), scope)?;
                Ok(if *prefix { new } else { old })
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval_expr(left, scope)?;
                let r = self.eval_expr(right, scope)?;
                self.binary_op(*op, &l, &r)
            }
            Expr::Logical { op, left, right } => {
                let l = self.eval_expr(left, scope)?;
                let short = match op {
                    LogicalOp::And => !self.to_boolean(&l),
                    LogicalOp::Or => self.to_boolean(&l),
                    LogicalOp::Nullish => !l.is_nullish(),
                };
                if short {
                    Ok(l)
                } else {
                    self.eval_expr(right, scope)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let t = self.eval_expr(test, scope)?;
                if self.to_boolean(&t) {
                    self.eval_expr(consequent, scope)
                } else {
                    self.eval_expr(alternate, scope)
                }
            }
            Expr::Assign { op, target, value } => self.eval_assign(*op, target, value, scope),
            Expr::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for e in exprs {
                    last = self.eval_expr(e, scope)?;
                }
                Ok(last)
            }
            Expr::Await(arg) => {
                let v = self.eval_expr(arg, scope)?;
                self.await_value(v)
            }
            // ジェネレータ本体の yield は generator.rs が取り出してから評価する
            Expr::Yield { .. } => Err(self.throw(
                ErrorKind::SyntaxError,
                "yield is not supported in this position",
            )),
        }
    }

    /// メンバー参照・呼び出しの連鎖を評価する。`?.` で短絡したら `None`。
    /// 戻り値は (this 候補, 値)。
    fn eval_chain(&mut self, expr: &Expr, scope: &ScopeRef) -> JsResult<Option<(Value, Value)>> {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let Some(base) = self.eval_chain_base(object, scope)? else {
                    return Ok(None);
                };
                if *optional && base.is_nullish() {
                    return Ok(None);
                }
                let key = self.eval_member_key(property, scope)?;
                let value = self.get(&base, &key)?;
                Ok(Some((base, value)))
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => {
                let (this, func) = match callee.as_ref() {
                    Expr::Member { .. } | Expr::Call { .. } => match self.eval_chain(callee, scope)? {
                        Some(pair) => pair,
                        None => return Ok(None),
                    },
                    other => (Value::Undefined, self.eval_expr(other, scope)?),
                };
                if *optional && func.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_arguments(args, scope)?;
                if !self.heap.is_callable(&func) {
                    return Err(self.type_error(format!("{} is not a function", describe_callee(callee))));
                }
                let result = self.call(&func, this, &args)?;
                Ok(Some((Value::Undefined, result)))
            }
            other => Ok(Some((Value::Undefined, self.eval_expr(other, scope)?))),
        }
    }

    fn eval_chain_base(&mut self, object: &Expr, scope: &ScopeRef) -> JsResult<Option<Value>> {
        match object {
            Expr::Member { .. } | Expr::Call { .. } => {
                Ok(self.eval_chain(object, scope)?.map(|(_, v)| v))
            }
            other => Ok(Some(self.eval_expr(other, scope)?)),
        }
    }

    fn eval_member_key(&mut self, property: &MemberProp, scope: &ScopeRef) -> JsResult<PropertyKey> {
        match property {
            MemberProp::Name(name) => Ok(PropertyKey::from(name.as_str())),
            MemberProp::Computed(e) => {
                let v = self.eval_expr(e, scope)?;
                self.to_property_key(&v)
            }
        }
    }

    fn eval_prop_key(&mut self, key: &PropKey, scope: &ScopeRef) -> JsResult<PropertyKey> {
        match key {
            PropKey::Name(name) => Ok(PropertyKey::from(name.as_str())),
            PropKey::Computed(e) => {
                let v = self.eval_expr(e, scope)?;
                self.to_property_key(&v)
            }
        }
    }

    pub(crate) fn eval_arguments(&mut self, args: &[Argument], scope: &ScopeRef) -> JsResult<Vec<Value>> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Argument::Item(e) => out.push(self.eval_expr(e, scope)?),
                Argument::Spread(e) => {
                    let source = self.eval_expr(e, scope)?;
                    out.extend(self.iterate_to_vec(&source)?);
                }
            }
        }
        Ok(out)
    }

    fn eval_object_literal(&mut self, props: &[PropDef], scope: &ScopeRef) -> JsResult<Value> {
        let id = self.heap.alloc_ordinary();
        let this_obj = Value::Object(id);
        for prop in props {
            match prop {
                PropDef::KeyValue(PropKey::Name(name), value) if name == "__proto__" => {
                    match self.eval_expr(value, scope)? {
                        Value::Object(p) => self.heap.object_mut(id).prototype = Some(p),
                        Value::Null => self.heap.object_mut(id).prototype = None,
                        _ => {}
                    }
                }
                PropDef::KeyValue(key, value) => {
                    let key = self.eval_prop_key(key, scope)?;
                    let v = match value {
                        Expr::Function(def) if def.name.is_none() => {
                            let name = self.heap.key_display(&key);
                            Value::Object(self.make_function_expression(def, scope, Some(&name)))
                        }
                        other => self.eval_expr(other, scope)?,
                    };
                    self.create_data_property(id, key, v);
                }
                PropDef::Shorthand(name) => {
                    let v = self.eval_expr(&Expr::Ident(name.clone()), scope)?;
                    self.create_data_property(id, PropertyKey::from(name.as_str()), v);
                }
                PropDef::Method(key, def) => {
                    let key = self.eval_prop_key(key, scope)?;
                    let name = self.heap.key_display(&key);
                    let f = self.make_closure(def, scope, &name);
                    self.create_data_property(id, key, Value::Object(f));
                }
                PropDef::Getter(key, def) | PropDef::Setter(key, def) => {
                    let key = self.eval_prop_key(key, scope)?;
                    let is_getter = matches!(prop, PropDef::Getter(..));
                    let prefix = if is_getter { "get" } else { "set" };
                    let name = format!("{} {}", prefix, self.heap.key_display(&key));
                    let f = self.make_closure(def, scope, &name);
                    let (mut getter, mut setter) = match self.heap.object(id).own_property(&key) {
                        Some(Property {
                            slot: Slot::Accessor { getter, setter },
                            ..
                        }) => (*getter, *setter),
                        _ => (None, None),
                    };
                    if is_getter {
                        getter = Some(f);
                    } else {
                        setter = Some(f);
                    }
                    self.heap.object_mut(id).define(
                        key,
                        Property::accessor(getter, setter, Attributes::ENUMERABLE | Attributes::CONFIGURABLE),
                    );
                }
                PropDef::Spread(e) => {
                    let source = self.eval_expr(e, scope)?;
                    self.copy_data_properties(id, &source)?;
                }
            }
        }
        Ok(this_obj)
    }

    /// `{...source}` と `Object.assign` の共通部分。
    pub(crate) fn copy_data_properties(&mut self, target: ObjectId, source: &Value) -> JsResult<()> {
        if source.is_nullish() {
            return Ok(());
        }
        let from = self.to_object(source)?;
        for key in self.own_enumerable_keys(from) {
            let key = PropertyKey::String(key);
            let v = self.get(&Value::Object(from), &key)?;
            self.create_data_property(target, key, v);
        }
        Ok(())
    }

    fn eval_unary(&mut self, op: UnaryOp, arg: &Expr, scope: &ScopeRef) -> JsResult<Value> {
        match op {
            UnaryOp::Typeof => {
                if let Expr::Ident(name) = arg {
                    return match self.lookup_identifier(name, scope)? {
                        Some(v) => Ok(Value::string(self.typeof_value(&v))),
                        None => Ok(Value::string("undefined")),
                    };
                }
                let v = self.eval_expr(arg, scope)?;
                Ok(Value::string(self.typeof_value(&v)))
            }
            UnaryOp::Delete => match arg {
                Expr::Member { object, property, .. } => {
                    let base = self.eval_expr(object, scope)?;
                    let key = self.eval_member_key(property, scope)?;
                    let id = self.to_object(&base)?;
                    Ok(Value::Boolean(self.delete_property(id, &key)?))
                }
                Expr::Ident(_) => Ok(Value::Boolean(false)),
                other => {
                    self.eval_expr(other, scope)?;
                    Ok(Value::Boolean(true))
                }
            },
            other => {
                let v = self.eval_expr(arg, scope)?;
                self.unary_value(other, v)
            }
        }
    }

    /// 評価済みの値に単項演算を適用する。`delete` は呼び出し側で扱う。
    pub(crate) fn unary_value(&mut self, op: UnaryOp, v: Value) -> JsResult<Value> {
        match op {
            UnaryOp::Typeof => Ok(Value::string(self.typeof_value(&v))),
            UnaryOp::Delete => Ok(Value::Boolean(true)),
            UnaryOp::Void => Ok(Value::Undefined),
            UnaryOp::Not => Ok(Value::Boolean(!self.to_boolean(&v))),
            UnaryOp::Plus => Ok(Value::Number(self.to_number(&v)?)),
            UnaryOp::Minus => match self.to_numeric(&v)? {
                Value::BigInt(b) => Ok(Value::bigint(-(*b).clone())),
                other => Ok(Value::Number(-other.as_number().unwrap_or(f64::NAN))),
            },
            UnaryOp::BitNot => match self.to_numeric(&v)? {
                Value::BigInt(b) => Ok(Value::bigint(!(*b).clone())),
                other => Ok(Value::Number(!to_int32(other.as_number().unwrap_or(0.0)) as f64)),
            },
        }
    }

    fn eval_assign(&mut self, op: AssignOp, target: &Pattern, value: &Expr, scope: &ScopeRef) -> JsResult<Value> {
        match op {
            AssignOp::Assign => match target {
                Pattern::Ident(_) | Pattern::Member(_) => {
                    let reference = self.pattern_reference(target, scope)?;
                    let v = self.eval_named(value, scope, target)?;
                    self.put_reference(&reference, v.clone(), scope)?;
                    Ok(v)
                }
                _ => {
                    let v = self.eval_expr(value, scope)?;
                    self.bind_pattern(target, v.clone(), scope, Binder::Assign)?;
                    Ok(v)
                }
            },
            AssignOp::Compound(bin) => {
                let reference = self.pattern_reference(target, scope)?;
                let old = self.get_reference(&reference, scope)?;
                let rhs = self.eval_expr(value, scope)?;
                let result = self.binary_op(bin, &old, &rhs)?;
                self.put_reference(&reference, result.clone(), scope)?;
                Ok(result)
            }
            AssignOp::Logical(logical) => {
                let reference = self.pattern_reference(target, scope)?;
                let old = self.get_reference(&reference, scope)?;
                let keep = match logical {
                    LogicalOp::And => !self.to_boolean(&old),
                    LogicalOp::Or => self.to_boolean(&old),
                    LogicalOp::Nullish => !old.is_nullish(),
                };
                if keep {
                    return Ok(old);
                }
                let v = self.eval_named(value, scope, target)?;
                self.put_reference(&reference, v.clone(), scope)?;
                Ok(v)
            }
        }
    }

    fn pattern_reference(&mut self, target: &Pattern, scope: &ScopeRef) -> JsResult<Reference> {
        match target {
            Pattern::Ident(name) => Ok(Reference::Binding(name.clone())),
            Pattern::Member(expr) => self.eval_reference(expr, scope),
            _ => Err(self.throw(ErrorKind::SyntaxError, "Invalid assignment target")),
        }
    }

    fn eval_reference(&mut self, expr: &Expr, scope: &ScopeRef) -> JsResult<Reference> {
        match expr {
            Expr::Ident(name) => Ok(Reference::Binding(name.clone())),
            Expr::Member { object, property, .. } => {
                let base = self.eval_expr(object, scope)?;
                let key = self.eval_member_key(property, scope)?;
                Ok(Reference::Property { base, key })
            }
            _ => Err(self.throw(ErrorKind::SyntaxError, "Invalid left-hand side in assignment")),
        }
    }

    fn get_reference(&mut self, reference: &Reference, scope: &ScopeRef) -> JsResult<Value> {
        match reference {
            Reference::Binding(name) => match self.lookup_identifier(name, scope)? {
                Some(v) => Ok(v),
                None => Err(self.throw(
                    ErrorKind::ReferenceError,
                    format!("'{}' is not defined", name),
                )),
            },
            Reference::Property { base, key } => self.get(base, key),
        }
    }

    fn put_reference(&mut self, reference: &Reference, value: Value, scope: &ScopeRef) -> JsResult<()> {
        match reference {
            Reference::Binding(name) => self.assign_identifier(name, value, scope),
            Reference::Property { base, key } => self.set(base, key.clone(), value),
        }
    }
}

/// エラーメッセージ用に呼び出し先の式を短く表す。
pub(crate) fn describe_callee(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::This => "this".into(),
        Expr::Member {
            object, property, ..
        } => match property {
            MemberProp::Name(name) => format!("{}.{}", describe_callee(object), name),
            MemberProp::Computed(inner) => {
                format!("{}[{}]", describe_callee(object), describe_callee(inner))
            }
        },
        Expr::Call { callee, .. } => format!("{}(...)", describe_callee(callee)),
        Expr::String(s) => format!("\"{}\"", s),
        Expr::Number(n) => runtime_heap::number_to_string(*n),
        _ => "expression".into(),
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// 分割代入（既定値・残余・入れ子）。
    fn destructuring() {
        assert_eq!(
            eval_display("const { a, b: [c, d = 4], ...r } = { a: 1, b: [3], x: 9, y: 8 }; a + c + d + Object.keys(r).length"),
            "10"
        );
        assert_eq!(eval_display("let [p, , q = 5, ...z] = [1, 2, undefined, 7, 8]; p + q + z.length"), "8");
        assert_eq!(eval_display("let m, n; [m, n] = [n, 2]; n"), "2");
    }

    #[test]
    /// ラベル付き break / continue。
    fn labeled_loops() {
        assert_eq!(
            eval_display("let s = 0; outer: for (let i = 0; i < 5; i++) { for (let j = 0; j < 5; j++) { if (j == 2) continue outer; if (i == 3) break outer; s++; } } s"),
            "6"
        );
    }

    #[test]
    /// for ループの let は周回ごとに別の束縛になる。
    fn per_iteration_bindings() {
        assert_eq!(
            eval_display("const fs = []; for (let i = 0; i < 3; i++) fs.push(() => i); fs.map(f => f()).join()"),
            "0,1,2"
        );
    }

    #[test]
    /// switch のフォールスルーと default。
    fn switch_fallthrough() {
        assert_eq!(
            eval_display("let r = ''; switch (2) { case 1: r += 'a'; case 2: r += 'b'; case 3: r += 'c'; break; default: r += 'd'; } r"),
            "bc"
        );
        assert_eq!(eval_display("let r = 0; switch ('x') { case 'y': r = 1; break; default: r = 2; } r"), "2");
    }

    #[test]
    /// try / catch / finally の順序。
    fn try_catch_finally() {
        assert_eq!(
            eval_display("let log = []; try { log.push(1); throw new Error('boom'); } catch (e) { log.push(e.message); } finally { log.push(3); } log.join()"),
            "1,boom,3"
        );
        assert_eq!(
            eval_display("function f() { try { return 1; } finally { return 2; } } f()"),
            "2"
        );
    }

    #[test]
    /// オプショナルチェーンは途中で短絡する。
    fn optional_chaining() {
        assert_eq!(eval_display("const o = null; o?.a.b.c"), "undefined");
        assert_eq!(eval_display("const o = { f() { return 3; } }; o.g?.() ?? o.f?.()"), "3");
    }

    #[test]
    /// 呼び出せない値の呼び出しは式の形を含むメッセージになる。
    fn not_a_function_message() {
        assert_eq!(
            eval_display("const o = {}; o.missing()"),
            "throw TypeError: o.missing is not a function"
        );
    }

    #[test]
    /// 完了値は最後に評価された式文の値。
    fn completion_value() {
        assert_eq!(eval_display("1; let x = 2;"), "1");
        assert_eq!(eval_display("if (true) { 'yes' } else { 'no' }"), "yes");
        assert_eq!(eval_display("let y = 5"), "undefined");
    }

    #[test]
    /// for..in は列挙可能なキーを継承分も含めて返す。
    fn for_in_keys() {
        assert_eq!(
            eval_display("const p = { inherited: 1 }; const o = Object.create(p); o.own = 2; const ks = []; for (const k in o) ks.push(k); ks.join()"),
            "own,inherited"
        );
    }

    #[test]
    /// テンプレートリテラルと typeof。
    fn templates_and_typeof() {
        assert_eq!(eval_display("const n = 3; `n=${n + 1}!`"), "n=4!");
        assert_eq!(eval_display("typeof undeclared"), "undefined");
        assert_eq!(eval_display("typeof (() => 1)"), "function");
    }
}
