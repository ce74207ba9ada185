// パス: src/bytecode/vm.rs
// 役割: 命令列をツリー評価器と同じ realm 上で実行する
// 意図: 値の演算・プロパティ操作・関数呼び出しは Interpreter の操作をそのまま使い、意味の二重実装を避ける
// 関連ファイル: src/bytecode/mod.rs, src/interpreter/mod.rs

use num_bigint::BigInt;
use num_traits::One;
use runtime_heap::{ObjectId, ObjectKind, PropertyKey, Value};

use super::{Constant, Executable, Op};
use crate::ast::Program;
use crate::interpreter::{Abrupt, ErrorKind, Interpreter, JsResult, ScopeRef};

struct Machine<'a> {
    interp: &'a mut Interpreter,
    exe: &'a Executable,
    stack: Vec<Value>,
    scope: ScopeRef,
    /// 結果レジスタ 0。
    result: Value,
}

/// `exe` を実行し、結果レジスタ 0 の値を返す。
/// 宣言の巻き上げには変換元の `program` を使う。
pub fn run(interp: &mut Interpreter, program: &Program, exe: &Executable) -> JsResult<Value> {
    let (scope, previous_strict) = interp.enter_program(program)?;
    let mut machine = Machine {
        interp,
        exe,
        stack: Vec::new(),
        scope,
        result: Value::Undefined,
    };
    let outcome = machine.execute();
    machine.interp.leave_program(previous_strict);
    outcome.map(|()| machine.result)
}

impl Machine<'_> {
    fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or(Value::Undefined)
    }

    fn peek(&self) -> Value {
        self.stack.last().cloned().unwrap_or(Value::Undefined)
    }

    fn pop_n(&mut self, n: usize) -> Vec<Value> {
        let at = self.stack.len().saturating_sub(n);
        self.stack.split_off(at)
    }

    fn name(&self, index: u32) -> String {
        self.exe.name(index).to_string()
    }

    fn pop_key(&mut self) -> JsResult<PropertyKey> {
        let key = self.pop();
        self.interp.to_property_key(&key)
    }

    fn top_object(&mut self) -> JsResult<ObjectId> {
        match self.stack.last() {
            Some(Value::Object(id)) => Ok(*id),
            _ => Err(self.interp.throw(ErrorKind::InternalError, "bytecode stack is corrupted")),
        }
    }

    fn constant(&mut self, index: u32) -> JsResult<Value> {
        match self.exe.constants.get(index as usize) {
            Some(Constant::Number(n)) => Ok(Value::Number(*n)),
            Some(Constant::String(s)) => Ok(Value::String(s.clone())),
            Some(Constant::BigInt(digits)) => match digits.parse::<BigInt>() {
                Ok(b) => Ok(Value::bigint(b)),
                Err(_) => Err(self.interp.throw(ErrorKind::SyntaxError, "Invalid BigInt literal")),
            },
            _ => Err(self.interp.throw(ErrorKind::InternalError, "bad constant reference")),
        }
    }

    fn call(&mut self, this: Value, func: Value, args: &[Value], callee: u32) -> JsResult<Value> {
        if !self.interp.heap.is_callable(&func) {
            let description = self.name(callee);
            return Err(self.interp.type_error(format!("{} is not a function", description)));
        }
        self.interp.call(&func, this, args)
    }

    fn construct(&mut self, ctor: Value, args: &[Value], callee: u32) -> JsResult<Value> {
        if !self.interp.is_constructor(&ctor) {
            let description = self.name(callee);
            return Err(self.interp.type_error(format!("{} is not a constructor", description)));
        }
        self.interp.construct(&ctor, args)
    }

    fn step(&mut self, value: Value, delta: i8) -> Value {
        match value {
            Value::BigInt(b) => {
                let one = BigInt::one();
                Value::bigint(if delta > 0 { &*b + one } else { &*b - one })
            }
            other => Value::Number(other.as_number().unwrap_or(f64::NAN) + f64::from(delta)),
        }
    }

    fn execute(&mut self) -> JsResult<()> {
        let mut pc = 0usize;
        while let Some(op) = self.exe.code.get(pc).copied() {
            pc += 1;
            match op {
                Op::Nop => {}
                Op::Const(i) => {
                    let v = self.constant(i)?;
                    self.stack.push(v);
                }
                Op::Undefined => self.stack.push(Value::Undefined),
                Op::Null => self.stack.push(Value::Null),
                Op::True => self.stack.push(Value::Boolean(true)),
                Op::False => self.stack.push(Value::Boolean(false)),
                Op::This => {
                    let this = self.interp.this_of(&self.scope);
                    self.stack.push(this);
                }
                Op::Pop => {
                    self.pop();
                }
                Op::Dup => {
                    let v = self.peek();
                    self.stack.push(v);
                }
                Op::Dup2 => {
                    let pair = self.pop_n(2);
                    self.stack.extend(pair.iter().cloned());
                    self.stack.extend(pair);
                }
                Op::Swap => {
                    let len = self.stack.len();
                    if len >= 2 {
                        self.stack.swap(len - 1, len - 2);
                    }
                }
                Op::Bury(n) => {
                    let v = self.pop();
                    let at = self.stack.len().saturating_sub(n as usize);
                    self.stack.insert(at, v);
                }
                Op::LoadName(i) => {
                    let name = self.name(i);
                    match self.interp.lookup_identifier(&name, &self.scope)? {
                        Some(v) => self.stack.push(v),
                        None => {
                            return Err(self
                                .interp
                                .throw(ErrorKind::ReferenceError, format!("'{}' is not defined", name)))
                        }
                    }
                }
                Op::StoreName(i) => {
                    let name = self.name(i);
                    let v = self.peek();
                    self.interp.assign_identifier(&name, v, &self.scope)?;
                }
                Op::InitName(i) => {
                    let name = self.name(i);
                    let v = self.pop();
                    self.interp.initialize_binding(&name, v, &self.scope)?;
                }
                Op::TypeofName(i) => {
                    let name = self.name(i);
                    let kind = match self.interp.lookup_identifier(&name, &self.scope)? {
                        Some(v) => self.interp.typeof_value(&v),
                        None => "undefined",
                    };
                    self.stack.push(Value::string(kind));
                }
                Op::EnterBlock(b) => {
                    let decls = self.exe.blocks.get(b as usize).map(Vec::as_slice).unwrap_or(&[]);
                    self.scope = self.interp.enter_block(&self.scope, decls)?;
                }
                Op::RenewBlock => self.scope = self.interp.renew_block(&self.scope),
                Op::ExitBlock => self.scope = self.interp.scope_parent(&self.scope),
                Op::GetProp(i) => {
                    let base = self.pop();
                    let key = PropertyKey::from(self.name(i).as_str());
                    let v = self.interp.get(&base, &key)?;
                    self.stack.push(v);
                }
                Op::SetProp(i) => {
                    let v = self.pop();
                    let base = self.pop();
                    let key = PropertyKey::from(self.name(i).as_str());
                    self.interp.set(&base, key, v.clone())?;
                    self.stack.push(v);
                }
                Op::GetElem => {
                    let key = self.pop_key()?;
                    let base = self.pop();
                    let v = self.interp.get(&base, &key)?;
                    self.stack.push(v);
                }
                Op::SetElem => {
                    let v = self.pop();
                    let key = self.pop_key()?;
                    let base = self.pop();
                    self.interp.set(&base, key, v.clone())?;
                    self.stack.push(v);
                }
                Op::DeleteProp(i) => {
                    let base = self.pop();
                    let id = self.interp.to_object(&base)?;
                    let key = PropertyKey::from(self.name(i).as_str());
                    let deleted = self.interp.delete_property(id, &key)?;
                    self.stack.push(Value::Boolean(deleted));
                }
                Op::DeleteElem => {
                    let key = self.pop_key()?;
                    let base = self.pop();
                    let id = self.interp.to_object(&base)?;
                    let deleted = self.interp.delete_property(id, &key)?;
                    self.stack.push(Value::Boolean(deleted));
                }
                Op::Call { argc, callee } => {
                    let args = self.pop_n(argc as usize);
                    let func = self.pop();
                    let this = self.pop();
                    let v = self.call(this, func, &args, callee)?;
                    self.stack.push(v);
                }
                Op::CallSpread { callee } => {
                    let list = self.pop();
                    let args = self.interp.array_like_to_vec(&list)?;
                    let func = self.pop();
                    let this = self.pop();
                    let v = self.call(this, func, &args, callee)?;
                    self.stack.push(v);
                }
                Op::New { argc, callee } => {
                    let args = self.pop_n(argc as usize);
                    let ctor = self.pop();
                    let v = self.construct(ctor, &args, callee)?;
                    self.stack.push(v);
                }
                Op::NewSpread { callee } => {
                    let list = self.pop();
                    let args = self.interp.array_like_to_vec(&list)?;
                    let ctor = self.pop();
                    let v = self.construct(ctor, &args, callee)?;
                    self.stack.push(v);
                }
                Op::Unary(op) => {
                    let v = self.pop();
                    let r = self.interp.unary_value(op, v)?;
                    self.stack.push(r);
                }
                Op::Binary(op) => {
                    let r = self.pop();
                    let l = self.pop();
                    let v = self.interp.binary_op(op, &l, &r)?;
                    self.stack.push(v);
                }
                Op::ToNumeric => {
                    let v = self.pop();
                    let n = self.interp.to_numeric(&v)?;
                    self.stack.push(n);
                }
                Op::Inc | Op::Dec => {
                    let v = self.pop();
                    let stepped = self.step(v, if op == Op::Inc { 1 } else { -1 });
                    self.stack.push(stepped);
                }
                Op::ToPropertyKey => {
                    let key = self.pop_key()?;
                    self.stack.push(Interpreter::key_value(&key));
                }
                Op::Stringify => {
                    let v = self.pop();
                    let s = self.interp.to_string(&v)?;
                    self.stack.push(Value::String(s));
                }
                Op::Concat(n) => {
                    let parts = self.pop_n(n as usize);
                    let mut out = String::new();
                    for part in parts {
                        if let Value::String(s) = part {
                            out.push_str(&s);
                        }
                    }
                    self.stack.push(Value::string(out));
                }
                Op::NewArray => {
                    let array = self.interp.create_array(Vec::new());
                    self.stack.push(Value::Object(array));
                }
                Op::ArrayPush => {
                    let v = self.pop();
                    let array = self.top_object()?;
                    self.append(array, vec![v]);
                }
                Op::ArraySpread => {
                    let source = self.pop();
                    let items = self.interp.iterate_to_vec(&source)?;
                    let array = self.top_object()?;
                    self.append(array, items);
                }
                Op::ArrayHole => {
                    let array = self.top_object()?;
                    if let ObjectKind::Array { length } = &mut self.interp.heap.object_mut(array).kind {
                        *length += 1;
                    }
                }
                Op::NewObject => {
                    let object = self.interp.heap.alloc_ordinary();
                    self.stack.push(Value::Object(object));
                }
                Op::DefineField(i) => {
                    let v = self.pop();
                    let object = self.top_object()?;
                    let name = self.name(i);
                    if name == "__proto__" {
                        match v {
                            Value::Object(p) => self.interp.heap.object_mut(object).prototype = Some(p),
                            Value::Null => self.interp.heap.object_mut(object).prototype = None,
                            _ => {}
                        }
                    } else {
                        self.interp.create_data_property(object, PropertyKey::from(name.as_str()), v);
                    }
                }
                Op::DefineComputed => {
                    let v = self.pop();
                    let key = self.pop_key()?;
                    let object = self.top_object()?;
                    self.interp.create_data_property(object, key, v);
                }
                Op::CopyData => {
                    let source = self.pop();
                    let object = self.top_object()?;
                    self.interp.copy_data_properties(object, &source)?;
                }
                Op::Closure { func, name } => {
                    let Some(Constant::Function(def)) = self.exe.constants.get(func as usize) else {
                        return Err(self.interp.throw(ErrorKind::InternalError, "bad function reference"));
                    };
                    let inferred = name.map(|n| self.name(n));
                    let id = self
                        .interp
                        .make_function_expression(def, &self.scope, inferred.as_deref());
                    self.stack.push(Value::Object(id));
                }
                Op::Regex(i) => {
                    let Some(Constant::Regex { pattern, flags }) = self.exe.constants.get(i as usize) else {
                        return Err(self.interp.throw(ErrorKind::InternalError, "bad regex reference"));
                    };
                    let v = self.interp.regexp_create(pattern, flags)?;
                    self.stack.push(v);
                }
                Op::Jump(t) => pc = t as usize,
                Op::JumpIfFalse(t) => {
                    let v = self.pop();
                    if !self.interp.to_boolean(&v) {
                        pc = t as usize;
                    }
                }
                Op::JumpIfTrue(t) => {
                    let v = self.pop();
                    if self.interp.to_boolean(&v) {
                        pc = t as usize;
                    }
                }
                Op::JumpIfFalseKeep(t) => {
                    if !self.interp.to_boolean(&self.peek()) {
                        pc = t as usize;
                    } else {
                        self.pop();
                    }
                }
                Op::JumpIfTrueKeep(t) => {
                    if self.interp.to_boolean(&self.peek()) {
                        pc = t as usize;
                    } else {
                        self.pop();
                    }
                }
                Op::JumpIfNotNullishKeep(t) => {
                    if !self.peek().is_nullish() {
                        pc = t as usize;
                    } else {
                        self.pop();
                    }
                }
                Op::Throw => {
                    let v = self.pop();
                    return Err(Abrupt::Throw(v));
                }
                Op::SetResult => self.result = self.pop(),
                Op::Halt => return Ok(()),
            }
        }
        Ok(())
    }

    fn append(&mut self, array: ObjectId, items: Vec<Value>) {
        let start = match self.interp.heap.kind(array) {
            ObjectKind::Array { length } => *length,
            _ => 0,
        };
        for (offset, v) in items.into_iter().enumerate() {
            let key = PropertyKey::string((start as usize + offset).to_string());
            self.interp.create_data_property(array, key, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::bytecode::{lower, optimize, run};
    use crate::interpreter::{Abrupt, Interpreter};
    use crate::parser::{parse_program, ParseMode};

    fn run_src(interp: &mut Interpreter, src: &str, optimized: bool) -> String {
        let program = parse_program(src, ParseMode::Script).expect("parse");
        let mut exe = lower(&program).expect("lower");
        if optimized {
            optimize(&mut exe);
        }
        match run(interp, &program, &exe) {
            Ok(v) => interp.heap.display_string(&v),
            Err(Abrupt::Throw(v)) => format!("throw {}", interp.describe_error(&v)),
            Err(Abrupt::Exit(code)) => format!("exit {}", code),
        }
    }

    fn both(src: &str) -> String {
        let plain = run_src(&mut Interpreter::headless(), src, false);
        let optimized = run_src(&mut Interpreter::headless(), src, true);
        assert_eq!(plain, optimized, "optimisation changed the result of {}", src);
        plain
    }

    #[test]
    /// 結果レジスタには最後に評価された式文の値が残る。
    fn result_register_holds_last_expression() {
        assert_eq!(both("let a = 2; const b = 3; a * b + 1"), "7");
        assert_eq!(both("var s = 'x'; s + 1"), "x1");
        assert_eq!(both("1; if (false) 2;"), "1");
    }

    #[test]
    /// ループと break / continue、周回ごとの let 束縛。
    fn loops_and_block_scopes() {
        assert_eq!(
            both("let t = 0; for (let i = 0; i < 10; i++) { if (i % 2) continue; if (i > 6) break; t += i; } t"),
            "12"
        );
        assert_eq!(
            both("const fs = []; for (let i = 0; i < 3; i++) { fs.push(() => i); } fs.map(f => f()).join()"),
            "0,1,2"
        );
        assert_eq!(both("let n = 0; do { n++; } while (n < 5); n"), "5");
    }

    #[test]
    /// 関数・オブジェクト・配列・更新演算子。
    fn functions_objects_and_updates() {
        assert_eq!(both("function sq(x) { return x * x } sq(7)"), "49");
        assert_eq!(both("const o = {a: 1, ['b' + 1]: 2, ...{c: 3}}; o.a++; o['b1'] += 5; [o.a, o.b1, o.c].join()"), "2,7,3");
        assert_eq!(both("const xs = [1, , ...[2, 3]]; xs.length + ':' + xs[3]"), "4:3");
        assert_eq!(both("let v = null; v ??= 'd'; v"), "d");
        assert_eq!(both("const f = () => 1; f.name"), "f");
        assert_eq!(both("`a${1 + 1}b`"), "a2b");
    }

    #[test]
    /// 実行時エラーは木評価器と同じメッセージで投げられる。
    fn runtime_errors_match_tree_walker() {
        assert_eq!(both("nope"), "throw ReferenceError: 'nope' is not defined");
        assert_eq!(both("const o = {}; o.m()"), "throw TypeError: o.m is not a function");
        assert_eq!(both("throw new RangeError('r')"), "throw RangeError: r");
    }

    #[test]
    /// 宣言は同じ realm に残り、次の単位から見える。
    fn declarations_persist_in_realm() {
        let mut interp = Interpreter::headless();
        assert_eq!(run_src(&mut interp, "let kept = 41", true), "undefined");
        assert_eq!(run_src(&mut interp, "kept + 1", true), "42");
        assert_eq!(interp.global_binding("kept").map(|v| interp.heap.display_string(&v)).as_deref(), Some("41"));
    }
}
