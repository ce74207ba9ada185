// パス: src/interpreter/mod.rs
// 役割: AST を直接評価するツリー評価器と、その実行環境（realm）を定義する
// 意図: ヒープ・グローバル環境・関数表・ジョブキューを 1 つの構造体に集約し、REPL から駆動できるようにする
// 関連ファイル: src/interpreter/eval.rs, src/interpreter/builtins/mod.rs, runtime_heap/src/heap.rs
//! インタプリタ
//!
//! - スクリプト関数は `closures` 表、ネイティブ関数は `natives` 表の添字で参照する。
//! - スクリプトの例外は `Abrupt::Throw(Value)` として Rust 側を伝播する。
//! - Promise のジョブは `run_jobs` でまとめて消化する（マイクロタスクのチェックポイント）。

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use fancy_regex::Regex;
use runtime_heap::{
    Attributes, FunctionCode, FunctionData, FunctionKind, Heap, ObjectId, ObjectKind, Property,
    PropertyKey, SymbolId, TracebackFrame, Value,
};

use crate::ast::{FunctionDef, Program};

mod builtins;
mod eval;
mod function;
mod generator;
mod host;
mod iter;
mod ops;
mod promise;
mod property;
mod scope;
pub(crate) mod text;

pub use host::{CaptureHost, ConsoleHost, LogLevel, NullHost, RejectionEvent};
pub use scope::ScopeRef;
pub(crate) use builtins::date_to_string;
pub(crate) use eval::describe_callee;
pub(crate) use ops::number_op;

use iter::{GeneratorState, IterState};
use promise::Job;
use scope::Scope;

/// 評価の中断理由。スクリプトの例外と、ホストからの終了要求。
#[derive(Clone, Debug)]
pub enum Abrupt {
    Throw(Value),
    Exit(i32),
}

pub type JsResult<T> = Result<T, Abrupt>;

/// ネイティブ関数の実体。引数は (インタプリタ, this, 引数列)。
pub type NativeFn = Rc<dyn Fn(&mut Interpreter, Value, &[Value]) -> JsResult<Value>>;

/// 組み込みのエラー種別。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    SyntaxError,
    ReferenceError,
    EvalError,
    UriError,
    InternalError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::Error,
        ErrorKind::TypeError,
        ErrorKind::RangeError,
        ErrorKind::SyntaxError,
        ErrorKind::ReferenceError,
        ErrorKind::EvalError,
        ErrorKind::UriError,
        ErrorKind::InternalError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::EvalError => "EvalError",
            ErrorKind::UriError => "URIError",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

/// 組み込みのシンボル。
#[derive(Clone, Copy, Debug)]
pub struct WellKnownSymbols {
    pub iterator: SymbolId,
    pub async_iterator: SymbolId,
    pub to_string_tag: SymbolId,
    pub has_instance: SymbolId,
}

/// スクリプト関数の実体。
pub(crate) struct Closure {
    pub def: Rc<FunctionDef>,
    pub scope: ScopeRef,
    pub strict: bool,
}

const DEFAULT_MAX_CALL_DEPTH: usize = 400;

pub struct Interpreter {
    pub heap: Heap,
    global: ObjectId,
    global_scope: ScopeRef,
    natives: Vec<NativeFn>,
    closures: Vec<Closure>,
    call_stack: Vec<Rc<str>>,
    new_target: Option<ObjectId>,
    jobs: VecDeque<Job>,
    host: Rc<dyn ConsoleHost>,
    regex_cache: HashMap<ObjectId, Rc<Regex>>,
    generators: HashMap<ObjectId, GeneratorState>,
    iterators: HashMap<ObjectId, IterState>,
    well_known: WellKnownSymbols,
    strict: bool,
    max_call_depth: usize,
    rng_state: Cell<u64>,
    /// ShadowRealm ごとの独立した realm。
    realms: HashMap<ObjectId, Interpreter>,
}

impl Interpreter {
    /// 組み込みを登録済みの realm を作る。
    pub fn new(host: Rc<dyn ConsoleHost>) -> Self {
        let mut heap = Heap::new();
        let well_known = WellKnownSymbols {
            iterator: heap.new_symbol(Some("Symbol.iterator")),
            async_iterator: heap.new_symbol(Some("Symbol.asyncIterator")),
            to_string_tag: heap.new_symbol(Some("Symbol.toStringTag")),
            has_instance: heap.new_symbol(Some("Symbol.hasInstance")),
        };
        let global = heap.alloc_ordinary();
        let global_scope = Scope::new_global(Value::Object(global));
        let seed = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0x2545_f491) as u64;
        let mut interp = Self {
            heap,
            global,
            global_scope,
            natives: Vec::new(),
            closures: Vec::new(),
            call_stack: Vec::new(),
            new_target: None,
            jobs: VecDeque::new(),
            host,
            regex_cache: HashMap::new(),
            generators: HashMap::new(),
            iterators: HashMap::new(),
            well_known,
            strict: false,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            rng_state: Cell::new(seed | 1),
            realms: HashMap::new(),
        };
        builtins::install(&mut interp);
        interp
    }

    /// 既定（何も出力しない）ホストで作る。
    pub fn headless() -> Self {
        Self::new(Rc::new(NullHost))
    }

    pub fn global_object(&self) -> ObjectId {
        self.global
    }

    pub fn well_known(&self) -> WellKnownSymbols {
        self.well_known
    }

    pub(crate) fn host(&self) -> Rc<dyn ConsoleHost> {
        self.host.clone()
    }

    pub fn set_max_call_depth(&mut self, depth: usize) {
        self.max_call_depth = depth;
    }

    /// プログラムを評価し、最後に評価された式文の値を返す。
    pub fn run_program(&mut self, program: &Program) -> JsResult<Value> {
        let previous_strict = self.strict;
        self.strict = program.is_module;
        let scope = if program.is_module {
            Scope::new_function(&self.global_scope, Some(Value::Undefined))
        } else {
            self.global_scope.clone()
        };
        let result = self.run_top_level(&program.body, &scope);
        self.strict = previous_strict;
        result
    }

    fn run_top_level(&mut self, body: &[crate::ast::Stmt], scope: &ScopeRef) -> JsResult<Value> {
        self.hoist_declarations(body, scope, true)?;
        let flow = self.exec_block_body(body, scope)?;
        Ok(flow.completion().unwrap_or(Value::Undefined))
    }

    /// キューに積まれた Promise ジョブをすべて消化する。
    pub fn run_jobs(&mut self) -> JsResult<()> {
        while self.run_one_job()? {}
        Ok(())
    }

    /// グローバル環境（宣言的束縛 → グローバルオブジェクト）から名前を引く。
    /// ゲッターは呼ばない。
    pub fn global_binding(&self, name: &str) -> Option<Value> {
        if let scope::Lookup::Found(v) = scope::lookup(&self.global_scope, name) {
            return Some(v);
        }
        self.heap
            .get_without_side_effects(self.global, &PropertyKey::from(name))
            .ok()
            .flatten()
    }

    /// グローバルの宣言的束縛（let / const）の名前を宣言順に返す。
    pub fn global_binding_names(&self) -> Vec<String> {
        self.global_scope
            .borrow()
            .names()
            .map(str::to_string)
            .collect()
    }

    /// グローバルオブジェクトにネイティブ関数を登録する。
    pub fn define_global_function(
        &mut self,
        name: &str,
        length: u32,
        f: impl Fn(&mut Interpreter, Value, &[Value]) -> JsResult<Value> + 'static,
    ) {
        let global = self.global;
        self.define_method(global, name, length, f);
    }

    /// グローバルオブジェクトにアクセサを登録する（列挙可能・再定義可能）。
    pub fn define_global_accessor(
        &mut self,
        name: &str,
        getter: impl Fn(&mut Interpreter, Value, &[Value]) -> JsResult<Value> + 'static,
        setter: impl Fn(&mut Interpreter, Value, &[Value]) -> JsResult<Value> + 'static,
    ) {
        let get = self.native_function(name, 0, getter);
        let set = self.native_function(name, 1, setter);
        let global = self.global;
        self.heap.object_mut(global).define(
            PropertyKey::from(name),
            Property::accessor(
                Some(get),
                Some(set),
                Attributes::ENUMERABLE | Attributes::CONFIGURABLE,
            ),
        );
    }

    pub fn define_global_value(&mut self, name: &str, value: Value) {
        let global = self.global;
        self.heap
            .object_mut(global)
            .define(PropertyKey::from(name), Property::data(value, Attributes::DEFAULT));
    }

    // ---- 関数オブジェクトの生成 ----

    fn register_native(
        &mut self,
        f: impl Fn(&mut Interpreter, Value, &[Value]) -> JsResult<Value> + 'static,
    ) -> u32 {
        self.natives.push(Rc::new(f));
        (self.natives.len() - 1) as u32
    }

    fn alloc_native(
        &mut self,
        name: &str,
        length: u32,
        is_constructor: bool,
        f: impl Fn(&mut Interpreter, Value, &[Value]) -> JsResult<Value> + 'static,
    ) -> ObjectId {
        let index = self.register_native(f);
        let proto = self.heap.intrinsics().function_prototype;
        let id = self.heap.alloc(
            ObjectKind::Function(FunctionData {
                name: Rc::from(name),
                kind: FunctionKind::Normal,
                code: FunctionCode::Native(index),
                is_constructor,
            }),
            Some(proto),
        );
        let object = self.heap.object_mut(id);
        object.define(
            PropertyKey::from("length"),
            Property::data(Value::Number(length as f64), Attributes::CONFIGURABLE),
        );
        object.define(
            PropertyKey::from("name"),
            Property::data(Value::string(name), Attributes::CONFIGURABLE),
        );
        id
    }

    /// 構築不可能なネイティブ関数を作る。
    pub fn native_function(
        &mut self,
        name: &str,
        length: u32,
        f: impl Fn(&mut Interpreter, Value, &[Value]) -> JsResult<Value> + 'static,
    ) -> ObjectId {
        self.alloc_native(name, length, false, f)
    }

    /// `new` 可能なネイティブ関数を作り、`prototype` と `constructor` を相互に結ぶ。
    pub(crate) fn native_constructor(
        &mut self,
        name: &str,
        length: u32,
        prototype: ObjectId,
        f: impl Fn(&mut Interpreter, Value, &[Value]) -> JsResult<Value> + 'static,
    ) -> ObjectId {
        let ctor = self.alloc_native(name, length, true, f);
        self.heap.object_mut(ctor).define(
            PropertyKey::from("prototype"),
            Property::data(Value::Object(prototype), Attributes::NONE),
        );
        self.heap.object_mut(prototype).define(
            PropertyKey::from("constructor"),
            Property::data(Value::Object(ctor), Attributes::BUILTIN),
        );
        ctor
    }

    pub(crate) fn define_method(
        &mut self,
        target: ObjectId,
        name: &str,
        length: u32,
        f: impl Fn(&mut Interpreter, Value, &[Value]) -> JsResult<Value> + 'static,
    ) -> ObjectId {
        let func = self.native_function(name, length, f);
        self.heap.object_mut(target).define(
            PropertyKey::from(name),
            Property::data(Value::Object(func), Attributes::BUILTIN),
        );
        func
    }

    pub(crate) fn define_symbol_method(
        &mut self,
        target: ObjectId,
        symbol: SymbolId,
        name: &str,
        f: impl Fn(&mut Interpreter, Value, &[Value]) -> JsResult<Value> + 'static,
    ) {
        let func = self.native_function(name, 0, f);
        self.heap.object_mut(target).define(
            PropertyKey::Symbol(symbol),
            Property::data(Value::Object(func), Attributes::BUILTIN),
        );
    }

    pub(crate) fn define_getter(
        &mut self,
        target: ObjectId,
        name: &str,
        f: impl Fn(&mut Interpreter, Value, &[Value]) -> JsResult<Value> + 'static,
    ) {
        let func = self.native_function(&format!("get {}", name), 0, f);
        self.heap.object_mut(target).define(
            PropertyKey::from(name),
            Property::accessor(Some(func), None, Attributes::CONFIGURABLE),
        );
    }

    pub(crate) fn define_value(&mut self, target: ObjectId, name: &str, value: Value) {
        self.heap
            .object_mut(target)
            .define(PropertyKey::from(name), Property::data(value, Attributes::BUILTIN));
    }

    /// 組み込みプロトタイプを確保して名前で登録する。
    pub(crate) fn new_prototype(&mut self, name: &'static str, kind: ObjectKind) -> ObjectId {
        let proto = self.heap.intrinsics().object_prototype;
        let id = self.heap.alloc(kind, Some(proto));
        self.heap.register_prototype(name, id);
        id
    }

    pub(crate) fn prototype(&self, name: &str) -> ObjectId {
        self.heap
            .intrinsics()
            .prototype(name)
            .unwrap_or(self.heap.intrinsics().object_prototype)
    }

    // ---- 例外 ----

    /// エラーオブジェクトを作る。現在の呼び出し履歴をトレースとして記録する。
    pub fn make_error(&mut self, kind: ErrorKind, message: &str) -> Value {
        let proto = self.prototype(kind.name());
        let traceback = self.current_traceback();
        let id = self
            .heap
            .alloc(ObjectKind::Error { traceback }, Some(proto));
        if !message.is_empty() {
            self.heap.object_mut(id).define(
                PropertyKey::from("message"),
                Property::data(Value::string(message), Attributes::BUILTIN),
            );
        }
        Value::Object(id)
    }

    pub(crate) fn throw(&mut self, kind: ErrorKind, message: impl AsRef<str>) -> Abrupt {
        Abrupt::Throw(self.make_error(kind, message.as_ref()))
    }

    pub(crate) fn type_error(&mut self, message: impl AsRef<str>) -> Abrupt {
        self.throw(ErrorKind::TypeError, message)
    }

    pub(crate) fn range_error(&mut self, message: impl AsRef<str>) -> Abrupt {
        self.throw(ErrorKind::RangeError, message)
    }

    /// 内側から外側の順の呼び出しフレーム。最外はトップレベル。
    pub(crate) fn current_traceback(&self) -> Vec<TracebackFrame> {
        let mut frames: Vec<TracebackFrame> = self
            .call_stack
            .iter()
            .rev()
            .map(|name| TracebackFrame {
                function_name: if name.is_empty() {
                    "(anonymous)".to_string()
                } else {
                    name.to_string()
                },
            })
            .collect();
        frames.push(TracebackFrame {
            function_name: "(global)".to_string(),
        });
        frames
    }

    /// `console.trace` 用の関数名（内側から）。
    pub(crate) fn stack_names(&self) -> Vec<String> {
        self.current_traceback()
            .into_iter()
            .map(|f| f.function_name)
            .collect()
    }

    pub(crate) fn is_constructing(&self) -> bool {
        self.new_target.is_some()
    }

    /// `new` 呼び出し中なら new.target の `prototype`、そうでなければ既定のプロトタイプ。
    pub(crate) fn constructing_prototype(&mut self, fallback: &str) -> ObjectId {
        let fallback_id = self.prototype(fallback);
        let Some(target) = self.new_target else {
            return fallback_id;
        };
        match self
            .heap
            .get_without_side_effects(target, &PropertyKey::from("prototype"))
        {
            Ok(Some(Value::Object(p))) => p,
            _ => fallback_id,
        }
    }

    // ---- バイトコード VM の入口 ----

    /// トップレベル単位の実行準備。strict の切り替えと宣言の巻き上げを行い、直前の strict を返す。
    pub(crate) fn enter_program(&mut self, program: &Program) -> JsResult<(ScopeRef, bool)> {
        let previous_strict = self.strict;
        self.strict = program.is_module;
        let scope = if program.is_module {
            Scope::new_function(&self.global_scope, Some(Value::Undefined))
        } else {
            self.global_scope.clone()
        };
        if let Err(e) = self.hoist_declarations(&program.body, &scope, true) {
            self.strict = previous_strict;
            return Err(e);
        }
        Ok((scope, previous_strict))
    }

    pub(crate) fn leave_program(&mut self, previous_strict: bool) {
        self.strict = previous_strict;
    }

    /// ブロックスコープを作り、ブロック内の let / const / 関数宣言を巻き上げる。
    pub(crate) fn enter_block(&mut self, parent: &ScopeRef, decls: &[crate::ast::Stmt]) -> JsResult<ScopeRef> {
        let block = Scope::new_block(parent);
        self.hoist_declarations(decls, &block, false)?;
        Ok(block)
    }

    /// ループの周回ごとに束縛を複製した新しいブロックへ差し替える。
    pub(crate) fn renew_block(&self, scope: &ScopeRef) -> ScopeRef {
        let current = scope.borrow();
        let parent = current.parent().unwrap_or_else(|| self.global_scope.clone());
        let fresh = Scope::new_block(&parent);
        for name in current.names() {
            if let Some(binding) = current.binding(name) {
                fresh
                    .borrow_mut()
                    .declare(name, binding.value.clone(), binding.mutable);
            }
        }
        fresh
    }

    pub(crate) fn scope_parent(&self, scope: &ScopeRef) -> ScopeRef {
        scope.borrow().parent().unwrap_or_else(|| self.global_scope.clone())
    }

    pub(crate) fn this_of(&self, scope: &ScopeRef) -> Value {
        scope::this_value(scope)
    }

    /// 巻き上げ済みの let / const を初期化する。
    pub(crate) fn initialize_binding(&mut self, name: &str, value: Value, scope: &ScopeRef) -> JsResult<()> {
        self.bind_pattern(
            &crate::ast::Pattern::Ident(name.to_string()),
            value,
            scope,
            eval::Binder::Initialize,
        )
    }

    /// 0 以上 1 未満の擬似乱数（xorshift64*）。
    pub(crate) fn next_random(&self) -> f64 {
        let mut x = self.rng_state.get();
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.rng_state.set(x);
        let bits = x.wrapping_mul(0x2545_f491_4f6c_dd1d) >> 11;
        bits as f64 / (1u64 << 53) as f64
    }
}

/// 引数列の n 番目（なければ undefined）。
pub(crate) fn arg(args: &[Value], n: usize) -> Value {
    args.get(n).cloned().unwrap_or(Value::Undefined)
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::parser::{parse_program, ParseMode};

    pub fn eval(interp: &mut Interpreter, src: &str) -> JsResult<Value> {
        let program = parse_program(src, ParseMode::Script).expect("parse");
        let value = interp.run_program(&program)?;
        interp.run_jobs()?;
        Ok(value)
    }

    /// 評価結果をゲッターなしで文字列化する。
    pub fn eval_display(src: &str) -> String {
        let mut interp = Interpreter::headless();
        match eval(&mut interp, src) {
            Ok(v) => interp.heap.display_string(&v),
            Err(Abrupt::Throw(v)) => format!("throw {}", interp.describe_error(&v)),
            Err(Abrupt::Exit(code)) => format!("exit {}", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::eval_display;

    #[test]
    /// 基本的な算術と変数宣言。
    fn arithmetic_and_bindings() {
        assert_eq!(eval_display("let a = 2; const b = 3; a * b + 1"), "7");
        assert_eq!(eval_display("var s = 'x'; s + 1"), "x1");
        assert_eq!(eval_display("0.1 + 0.2"), "0.30000000000000004");
    }

    #[test]
    /// 未定義の変数参照は ReferenceError。
    fn undefined_variable_throws() {
        assert_eq!(
            eval_display("nope + 1"),
            "throw ReferenceError: 'nope' is not defined"
        );
    }

    #[test]
    /// 再帰関数とクロージャ。
    fn recursion_and_closures() {
        assert_eq!(
            eval_display("function fact(n) { return n <= 1 ? 1 : n * fact(n - 1); } fact(10)"),
            "3628800"
        );
        assert_eq!(
            eval_display("const mk = () => { let c = 0; return () => ++c; }; const f = mk(); f(); f(); f()"),
            "3"
        );
    }

    #[test]
    /// 呼び出しの深さ制限は RangeError になる。
    fn call_depth_limit() {
        let mut interp = super::Interpreter::headless();
        interp.set_max_call_depth(20);
        let result = super::test_util::eval(&mut interp, "function f() { return f(); } f()");
        match result {
            Err(super::Abrupt::Throw(v)) => assert_eq!(
                interp.describe_error(&v),
                "RangeError: Maximum call stack size exceeded"
            ),
            other => panic!("unexpected {:?}", other),
        }
    }
}
