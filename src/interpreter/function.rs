// パス: src/interpreter/function.rs
// 役割: 関数オブジェクトの生成・呼び出し・構築（new）と宣言の巻き上げを実装する
// 意図: ネイティブ関数とスクリプト関数の呼び出し規約を 1 か所で揃え、呼び出し履歴を正しく積む
// 関連ファイル: src/interpreter/mod.rs, src/interpreter/eval.rs, src/interpreter/iter.rs

use std::rc::Rc;

use runtime_heap::{
    Attributes, FunctionCode, FunctionData, FunctionKind, ObjectId, ObjectKind, Property,
    PropertyKey, Value,
};

use super::eval::{Binder, Flow};
use super::generator::GeneratorBody;
use super::iter::GeneratorState;
use super::scope::{Scope, ScopeRef};
use super::{Abrupt, Closure, ErrorKind, Interpreter, JsResult};
use crate::ast::{FunctionBody, FunctionDef, FunctionFlavor, Stmt, VarKind};

impl Interpreter {
    /// スクリプト関数の関数オブジェクトを作る。
    pub(crate) fn make_closure(
        &mut self,
        def: &Rc<FunctionDef>,
        scope: &ScopeRef,
        name: &str,
    ) -> ObjectId {
        self.closures.push(Closure {
            def: def.clone(),
            scope: scope.clone(),
            strict: self.strict,
        });
        let index = (self.closures.len() - 1) as u32;
        let kind = match def.flavor {
            FunctionFlavor::Normal => FunctionKind::Normal,
            FunctionFlavor::Generator => FunctionKind::Generator,
            FunctionFlavor::Async => FunctionKind::Async,
            FunctionFlavor::AsyncGenerator => FunctionKind::AsyncGenerator,
        };
        let is_constructor = def.flavor == FunctionFlavor::Normal && !def.is_arrow;
        let proto = self.heap.intrinsics().function_prototype;
        let id = self.heap.alloc(
            ObjectKind::Function(FunctionData {
                name: Rc::from(name),
                kind,
                code: FunctionCode::Script(index),
                is_constructor,
            }),
            Some(proto),
        );
        let length = def
            .params
            .iter()
            .take_while(|p| p.default.is_none() && !p.rest)
            .count();
        let object = self.heap.object_mut(id);
        object.define(
            PropertyKey::from("length"),
            Property::data(Value::Number(length as f64), Attributes::CONFIGURABLE),
        );
        object.define(
            PropertyKey::from("name"),
            Property::data(Value::string(name), Attributes::CONFIGURABLE),
        );
        if is_constructor {
            let prototype = self.heap.alloc_ordinary();
            self.heap.object_mut(prototype).define(
                PropertyKey::from("constructor"),
                Property::data(Value::Object(id), Attributes::BUILTIN),
            );
            self.heap.object_mut(id).define(
                PropertyKey::from("prototype"),
                Property::data(Value::Object(prototype), Attributes::WRITABLE),
            );
        }
        id
    }

    fn function_name(&self, id: ObjectId) -> Rc<str> {
        match self.heap.kind(id) {
            ObjectKind::Function(data) => data.name.clone(),
            _ => Rc::from(""),
        }
    }

    pub(crate) fn enter_frame(&mut self, id: ObjectId) -> JsResult<()> {
        if self.call_stack.len() >= self.max_call_depth {
            return Err(self.range_error("Maximum call stack size exceeded"));
        }
        let name = self.function_name(id);
        self.call_stack.push(name);
        Ok(())
    }

    /// `func(...args)` を `this` 付きで呼ぶ。
    pub fn call(&mut self, func: &Value, this: Value, args: &[Value]) -> JsResult<Value> {
        let Value::Object(id) = func else {
            let msg = format!("{} is not a function", self.heap.display_string(func));
            return Err(self.type_error(msg));
        };
        let id = *id;
        match self.heap.kind(id).clone() {
            ObjectKind::Function(data) => {
                self.enter_frame(id)?;
                let saved_target = self.new_target.take();
                let result = match data.code {
                    FunctionCode::Native(index) => self.call_native(index, this, args),
                    FunctionCode::Script(index) => self.call_script(id, index, this, args),
                };
                self.new_target = saved_target;
                self.call_stack.pop();
                result
            }
            ObjectKind::BoundFunction {
                target,
                bound_this,
                bound_args,
            } => {
                let mut all = bound_args;
                all.extend_from_slice(args);
                self.call(&Value::Object(target), bound_this, &all)
            }
            _ => {
                let msg = format!("{} is not a function", self.heap.display_string(func));
                Err(self.type_error(msg))
            }
        }
    }

    fn call_native(&mut self, index: u32, this: Value, args: &[Value]) -> JsResult<Value> {
        let Some(native) = self.natives.get(index as usize).cloned() else {
            return Ok(Value::Undefined);
        };
        native(self, this, args)
    }

    fn call_script(
        &mut self,
        func: ObjectId,
        index: u32,
        this: Value,
        args: &[Value],
    ) -> JsResult<Value> {
        let flavor = self.closures[index as usize].def.flavor;
        match flavor {
            FunctionFlavor::Normal => self.run_function_body(index, this, args),
            FunctionFlavor::Async => {
                let promise = self.new_promise();
                match self.run_function_body(index, this, args) {
                    Ok(v) => self.resolve_promise(promise, v)?,
                    Err(Abrupt::Throw(e)) => self.reject_promise(promise, e),
                    Err(exit) => return Err(exit),
                }
                Ok(Value::Object(promise))
            }
            FunctionFlavor::Generator | FunctionFlavor::AsyncGenerator => {
                let is_async = flavor == FunctionFlavor::AsyncGenerator;
                let (kind, proto_name) = if is_async {
                    (ObjectKind::AsyncGenerator, "AsyncGenerator")
                } else {
                    (ObjectKind::Generator, "Generator")
                };
                // 引数の束縛は呼び出し時に済ませ、本体は最初の next() まで実行しない
                let strict = self.closures[index as usize].strict;
                let saved_strict = std::mem::replace(&mut self.strict, strict);
                let prepared = self.function_scope(index, this, args);
                self.strict = saved_strict;
                let (def, fscope) = prepared?;
                let proto = self.prototype(proto_name);
                let generator = self.heap.alloc(kind, Some(proto));
                self.generators.insert(
                    generator,
                    GeneratorState::Suspended {
                        function: func,
                        strict,
                        body: Box::new(GeneratorBody::new(&def, fscope)),
                    },
                );
                Ok(Value::Object(generator))
            }
        }
    }

    /// 関数本体を評価する。
    pub(crate) fn run_function_body(
        &mut self,
        index: u32,
        this: Value,
        args: &[Value],
    ) -> JsResult<Value> {
        let strict = self.closures[index as usize].strict;
        let saved_strict = std::mem::replace(&mut self.strict, strict);
        let result = self
            .function_scope(index, this, args)
            .and_then(|(def, fscope)| match &def.body {
                FunctionBody::Expr(expr) => self.eval_expr(expr, &fscope),
                FunctionBody::Block(body) => match self.exec_block_body(body, &fscope)? {
                    Flow::Return(v) => Ok(v),
                    _ => Ok(Value::Undefined),
                },
            });
        self.strict = saved_strict;
        result
    }

    /// 関数スコープを作り、引数の束縛と宣言の巻き上げまでを行う。
    pub(crate) fn function_scope(
        &mut self,
        index: u32,
        this: Value,
        args: &[Value],
    ) -> JsResult<(Rc<FunctionDef>, ScopeRef)> {
        let (def, parent, strict) = {
            let closure = &self.closures[index as usize];
            (closure.def.clone(), closure.scope.clone(), closure.strict)
        };
        let this_binding = if def.is_arrow {
            None
        } else if strict || this.is_object() {
            Some(this)
        } else if this.is_nullish() {
            Some(Value::Object(self.global))
        } else {
            Some(this)
        };
        let fscope = Scope::new_function(&parent, this_binding);
        if !def.is_arrow {
            let arguments = self.create_array(args.to_vec());
            fscope
                .borrow_mut()
                .declare("arguments", Some(Value::Object(arguments)), true);
        }
        for (i, param) in def.params.iter().enumerate() {
            let value = if param.rest {
                let rest = args.get(i..).map(<[Value]>::to_vec).unwrap_or_default();
                Value::Object(self.create_array(rest))
            } else {
                let mut v = args.get(i).cloned().unwrap_or(Value::Undefined);
                if v.is_undefined() {
                    if let Some(default) = &param.default {
                        v = self.eval_named(default, &fscope, &param.target)?;
                    }
                }
                v
            };
            self.bind_pattern(&param.target, value, &fscope, Binder::Declare { mutable: true })?;
        }
        if let FunctionBody::Block(body) = &def.body {
            self.hoist_declarations(body, &fscope, true)?;
        }
        Ok((def, fscope))
    }

    /// `new func(...args)`。
    pub fn construct(&mut self, func: &Value, args: &[Value]) -> JsResult<Value> {
        let not_constructor = |interp: &mut Interpreter| {
            let msg = format!("{} is not a constructor", interp.heap.display_string(func));
            Err(interp.type_error(msg))
        };
        let Value::Object(id) = func else {
            return not_constructor(self);
        };
        let id = *id;
        match self.heap.kind(id).clone() {
            ObjectKind::Function(data) if data.is_constructor => match data.code {
                FunctionCode::Native(index) => {
                    self.enter_frame(id)?;
                    let saved = self.new_target.replace(id);
                    let result = self.call_native(index, Value::Undefined, args);
                    self.new_target = saved;
                    self.call_stack.pop();
                    result
                }
                FunctionCode::Script(index) => {
                    let proto = match self.get_named(func, "prototype")? {
                        Value::Object(p) => p,
                        _ => self.heap.intrinsics().object_prototype,
                    };
                    let this_obj = self.heap.alloc(ObjectKind::Ordinary, Some(proto));
                    self.enter_frame(id)?;
                    let saved = self.new_target.replace(id);
                    let result = self.run_function_body(index, Value::Object(this_obj), args);
                    self.new_target = saved;
                    self.call_stack.pop();
                    match result? {
                        v @ Value::Object(_) => Ok(v),
                        _ => Ok(Value::Object(this_obj)),
                    }
                }
            },
            ObjectKind::BoundFunction {
                target, bound_args, ..
            } => {
                let mut all = bound_args;
                all.extend_from_slice(args);
                self.construct(&Value::Object(target), &all)
            }
            _ => not_constructor(self),
        }
    }

    /// 文の並びに現れる宣言を巻き上げる。
    ///
    /// `function_level` のとき `var` 宣言も受け持つ（関数本体・トップレベル）。
    pub(crate) fn hoist_declarations(
        &mut self,
        body: &[Stmt],
        scope: &ScopeRef,
        function_level: bool,
    ) -> JsResult<()> {
        let is_global = Rc::ptr_eq(scope, &self.global_scope);
        if function_level {
            let mut names = Vec::new();
            for stmt in body {
                collect_var_names(stmt, &mut names);
            }
            for name in names {
                if is_global {
                    let key = PropertyKey::from(name.as_str());
                    let global = self.global;
                    if !self.has_own_property(global, &key) {
                        self.create_data_property(global, key, Value::Undefined);
                    }
                } else if !scope.borrow().has_own(&name) {
                    scope
                        .borrow_mut()
                        .declare(&name, Some(Value::Undefined), true);
                }
            }
        }
        for stmt in body {
            let stmt = match stmt {
                Stmt::Export(inner) => inner.as_ref(),
                other => other,
            };
            match stmt {
                Stmt::Var {
                    kind: kind @ (VarKind::Let | VarKind::Const),
                    decls,
                } => {
                    let mut names = Vec::new();
                    for decl in decls {
                        decl.target.bound_names(&mut names);
                    }
                    for name in names {
                        if scope.borrow().has_own(&name) {
                            return Err(self.throw(
                                ErrorKind::SyntaxError,
                                format!("Identifier '{}' has already been declared", name),
                            ));
                        }
                        scope
                            .borrow_mut()
                            .declare(&name, None, *kind == VarKind::Let);
                    }
                }
                Stmt::Function(def) => {
                    let name = def.name.clone().unwrap_or_default();
                    let closure = self.make_closure(def, scope, &name);
                    if is_global && function_level {
                        let global = self.global;
                        self.create_data_property(
                            global,
                            PropertyKey::from(name.as_str()),
                            Value::Object(closure),
                        );
                    } else {
                        scope
                            .borrow_mut()
                            .declare(&name, Some(Value::Object(closure)), true);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// 名前付き関数式のために自身の名前だけを持つスコープを挟む。
    pub(crate) fn make_function_expression(
        &mut self,
        def: &Rc<FunctionDef>,
        scope: &ScopeRef,
        inferred: Option<&str>,
    ) -> ObjectId {
        match (&def.name, def.is_arrow) {
            (Some(name), false) => {
                let named = Scope::new_block(scope);
                let id = self.make_closure(def, &named, name);
                named
                    .borrow_mut()
                    .declare(name, Some(Value::Object(id)), false);
                id
            }
            _ => self.make_closure(def, scope, inferred.unwrap_or("")),
        }
    }

    pub(crate) fn is_constructor(&self, value: &Value) -> bool {
        let Value::Object(id) = value else {
            return false;
        };
        match self.heap.kind(*id) {
            ObjectKind::Function(data) => data.is_constructor,
            ObjectKind::BoundFunction { target, .. } => self.is_constructor(&Value::Object(*target)),
            _ => false,
        }
    }
}

/// `var` 宣言の名前を関数境界を越えずに集める。
fn collect_var_names(stmt: &Stmt, out: &mut Vec<String>) {
    match stmt {
        Stmt::Var {
            kind: VarKind::Var,
            decls,
        } => {
            for decl in decls {
                decl.target.bound_names(out);
            }
        }
        Stmt::If {
            consequent,
            alternate,
            ..
        } => {
            collect_var_names(consequent, out);
            if let Some(alt) = alternate {
                collect_var_names(alt, out);
            }
        }
        Stmt::While { body, .. } | Stmt::DoWhile { body, .. } | Stmt::Labeled { body, .. } => {
            collect_var_names(body, out)
        }
        Stmt::For { init, body, .. } => {
            if let Some(crate::ast::ForInit::Var {
                kind: VarKind::Var,
                decls,
            }) = init
            {
                for decl in decls {
                    decl.target.bound_names(out);
                }
            }
            collect_var_names(body, out);
        }
        Stmt::ForIn { head, body, .. } | Stmt::ForOf { head, body, .. } => {
            if let crate::ast::ForHead::Var {
                kind: VarKind::Var,
                target,
            } = head
            {
                target.bound_names(out);
            }
            collect_var_names(body, out);
        }
        Stmt::Switch { cases, .. } => {
            for case in cases {
                for s in &case.body {
                    collect_var_names(s, out);
                }
            }
        }
        Stmt::Try {
            block,
            handler,
            finalizer,
        } => {
            for s in block {
                collect_var_names(s, out);
            }
            if let Some(h) = handler {
                for s in &h.body {
                    collect_var_names(s, out);
                }
            }
            if let Some(f) = finalizer {
                for s in f {
                    collect_var_names(s, out);
                }
            }
        }
        Stmt::Block(stmts) => {
            for s in stmts {
                collect_var_names(s, out);
            }
        }
        Stmt::Export(inner) => collect_var_names(inner, out),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// var と関数宣言は巻き上げられる。
    fn hoisting() {
        assert_eq!(eval_display("const r = f(); function f() { return 7; } r"), "7");
        assert_eq!(eval_display("typeof v; var v = 1; v"), "1");
    }

    #[test]
    /// TDZ 中の let 参照は ReferenceError。
    fn temporal_dead_zone() {
        assert_eq!(
            eval_display("{ x; let x = 1; }"),
            "throw ReferenceError: Cannot access 'x' before initialization"
        );
    }

    #[test]
    /// 既定値・残余引数・new による構築。
    fn params_and_construct() {
        assert_eq!(eval_display("function f(a, b = a + 1, ...r) { return a + b + r.length; } f(1)"), "3");
        assert_eq!(
            eval_display("function P(x) { this.x = x; } P.prototype.get = function () { return this.x; }; new P(5).get()"),
            "5"
        );
        assert_eq!(
            eval_display("const a = () => 1; new a()"),
            "throw TypeError: a is not a constructor"
        );
    }

    #[test]
    /// bind で this と先頭引数が固定される。
    fn bound_functions() {
        assert_eq!(
            eval_display("function f(a, b) { return this.k + a + b; } const g = f.bind({ k: 1 }, 2); g(3)"),
            "6"
        );
    }

    #[test]
    /// 同じ let を 2 度宣言すると SyntaxError。
    fn redeclaration_is_rejected() {
        assert_eq!(
            eval_display("let q = 1; { } let q = 2;"),
            "throw SyntaxError: Identifier 'q' has already been declared"
        );
    }
}
