// パス: src/interpreter/builtins/function.rs
// 役割: Function コンストラクタと Function.prototype（call / apply / bind / toString）
// 関連ファイル: src/interpreter/function.rs

use runtime_heap::{Attributes, FunctionCode, ObjectKind, Property, PropertyKey, Value};

use super::{define_global, require_callable};
use crate::ast::{Expr, FunctionDef, FunctionFlavor, Stmt};
use crate::interpreter::{arg, ErrorKind, Interpreter, JsResult};
use crate::parser::{parse_program, ParseMode};

pub(super) fn install(interp: &mut Interpreter) {
    let proto = interp.heap.intrinsics().function_prototype;

    interp.define_method(proto, "call", 1, |interp, this, args| {
        let func = require_callable(interp, &this)?;
        let rest = args.get(1..).unwrap_or_default();
        interp.call(&func, arg(args, 0), rest)
    });
    interp.define_method(proto, "apply", 2, |interp, this, args| {
        let func = require_callable(interp, &this)?;
        let list = match arg(args, 1) {
            v if v.is_nullish() => Vec::new(),
            v => interp.array_like_to_vec(&v)?,
        };
        interp.call(&func, arg(args, 0), &list)
    });
    interp.define_method(proto, "bind", 1, |interp, this, args| {
        let Value::Object(target) = require_callable(interp, &this)? else {
            return Ok(Value::Undefined);
        };
        let bound_args: Vec<Value> = args.get(1..).unwrap_or_default().to_vec();
        let target_len = match interp.get_named(&this, "length")? {
            Value::Number(n) => n,
            _ => 0.0,
        };
        let target_name = match interp.get_named(&this, "name")? {
            Value::String(s) => s.to_string(),
            _ => String::new(),
        };
        let length = (target_len - bound_args.len() as f64).max(0.0);
        let proto = interp.heap.prototype_of(target);
        let id = interp.heap.alloc(
            ObjectKind::BoundFunction {
                target,
                bound_this: arg(args, 0),
                bound_args,
            },
            proto,
        );
        let object = interp.heap.object_mut(id);
        object.define(
            PropertyKey::from("length"),
            Property::data(Value::Number(length), Attributes::CONFIGURABLE),
        );
        object.define(
            PropertyKey::from("name"),
            Property::data(Value::string(format!("bound {}", target_name)), Attributes::CONFIGURABLE),
        );
        Ok(Value::Object(id))
    });
    interp.define_method(proto, "toString", 0, |interp, this, _| {
        let Value::Object(id) = this else {
            return Err(interp.type_error("Function.prototype.toString called on a non-function"));
        };
        let text = match interp.heap.kind(id) {
            ObjectKind::Function(data) => match data.code {
                FunctionCode::Native(_) => {
                    format!("function {}() {{\n    [native code]\n}}", data.name)
                }
                FunctionCode::Script(index) => {
                    let def = interp.closures[index as usize].def.clone();
                    script_function_text(&def, &data.name)
                }
            },
            ObjectKind::BoundFunction { .. } => "function () {\n    [native code]\n}".to_string(),
            _ => return Err(interp.type_error("Function.prototype.toString called on a non-function")),
        };
        Ok(Value::string(text))
    });
    let has_instance = interp.well_known.has_instance;
    interp.define_symbol_method(proto, has_instance, "[Symbol.hasInstance]", |interp, this, args| {
        if !interp.heap.is_callable(&this) {
            return Ok(Value::Boolean(false));
        }
        interp.instance_of(&arg(args, 0), &this).map(Value::Boolean)
    });

    let ctor = interp.native_constructor("Function", 1, proto, |interp, _, args| {
        let (params, body) = match args.split_last() {
            Some((body, params)) => {
                let mut names = Vec::with_capacity(params.len());
                for p in params {
                    names.push(interp.to_string(p)?.to_string());
                }
                (names.join(","), interp.to_string(body)?.to_string())
            }
            None => (String::new(), String::new()),
        };
        let source = format!("(function anonymous({}\n) {{\n{}\n}})", params, body);
        let program = match parse_program(&source, ParseMode::Script) {
            Ok(p) => p,
            Err(e) => return Err(interp.throw(ErrorKind::SyntaxError, e.0.msg.clone())),
        };
        match program.body.first() {
            Some(Stmt::Expr(Expr::Function(def))) => {
                let scope = interp.global_scope.clone();
                Ok(Value::Object(interp.make_closure(def, &scope, "anonymous")))
            }
            _ => Err(interp.throw(ErrorKind::SyntaxError, "Invalid function body")),
        }
    });
    define_global(interp, "Function", Value::Object(ctor));
}

/// スクリプト関数の概形（本体は省略する）。
fn script_function_text(def: &FunctionDef, name: &str) -> String {
    let mut params = Vec::new();
    for p in &def.params {
        let mut names = Vec::new();
        p.target.bound_names(&mut names);
        let joined = names.join(", ");
        params.push(if p.rest { format!("...{}", joined) } else { joined });
    }
    let params = params.join(", ");
    if def.is_arrow {
        return format!("({}) => {{ [script code] }}", params);
    }
    let prefix = match def.flavor {
        FunctionFlavor::Normal => "function",
        FunctionFlavor::Generator => "function*",
        FunctionFlavor::Async => "async function",
        FunctionFlavor::AsyncGenerator => "async function*",
    };
    format!("{} {}({}) {{ [script code] }}", prefix, name, params)
}

#[cfg(test)]
mod tests {
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// call / apply は this と引数を渡す。
    fn call_and_apply() {
        assert_eq!(eval_display("function f(a, b) { return this.k + a + b; } f.call({ k: 1 }, 2, 3)"), "6");
        assert_eq!(eval_display("Math.max.apply(null, [3, 9, 2])"), "9");
    }

    #[test]
    /// bind の名前と長さ。
    fn bind_metadata() {
        assert_eq!(eval_display("function add(a, b) { return a + b; } const g = add.bind(null, 1); `${g.name} ${g.length} ${g(4)}`"), "bound add 1 5");
    }

    #[test]
    /// Function コンストラクタで関数を作れる。
    fn function_constructor() {
        assert_eq!(eval_display("new Function('a', 'b', 'return a * b')(6, 7)"), "42");
        assert_eq!(eval_display("Function('return 1 +')()").starts_with("throw SyntaxError"), true);
    }
}
