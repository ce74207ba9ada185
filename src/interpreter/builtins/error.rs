// パス: src/interpreter/builtins/error.rs
// 役割: Error と派生エラーのコンストラクタ・プロトタイプ

use runtime_heap::{Attributes, ObjectKind, Property, PropertyKey, Value};

use super::define_global;
use crate::interpreter::{arg, ErrorKind, Interpreter, JsResult};

fn construct_error(interp: &mut Interpreter, kind: ErrorKind, args: &[Value]) -> JsResult<Value> {
    let proto = interp.constructing_prototype(kind.name());
    // 先頭はコンストラクタ自身のフレーム
    let traceback = interp.current_traceback().into_iter().skip(1).collect();
    let id = interp.heap.alloc(ObjectKind::Error { traceback }, Some(proto));
    let message = arg(args, 0);
    if !message.is_undefined() {
        let text = interp.to_string(&message)?;
        interp.heap.object_mut(id).define(
            PropertyKey::from("message"),
            Property::data(Value::String(text), Attributes::BUILTIN),
        );
    }
    let options = arg(args, 1);
    if let Value::Object(opts) = options {
        let key = PropertyKey::from("cause");
        if interp.has_property(opts, &key)? {
            let cause = interp.get(&options, &key)?;
            interp
                .heap
                .object_mut(id)
                .define(key, Property::data(cause, Attributes::BUILTIN));
        }
    }
    Ok(Value::Object(id))
}

pub(super) fn install(interp: &mut Interpreter) {
    let error_proto = interp.heap.intrinsics().error_prototype;
    let mut error_ctor = None;
    for kind in ErrorKind::ALL {
        let proto = if kind == ErrorKind::Error {
            error_proto
        } else {
            let p = interp.new_prototype(kind.name(), ObjectKind::Ordinary);
            interp.heap.object_mut(p).prototype = Some(error_proto);
            p
        };
        interp.define_value(proto, "name", Value::string(kind.name()));
        interp.define_value(proto, "message", Value::string(""));
        let ctor = interp.native_constructor(kind.name(), 1, proto, move |interp, _, args| {
            construct_error(interp, kind, args)
        });
        if let Some(base) = error_ctor {
            interp.heap.object_mut(ctor).prototype = Some(base);
        } else {
            error_ctor = Some(ctor);
        }
        define_global(interp, kind.name(), Value::Object(ctor));
    }

    interp.define_method(error_proto, "toString", 0, |interp, this, _| {
        if !this.is_object() {
            return Err(interp.type_error("Error.prototype.toString called on a non-object"));
        }
        let name = match interp.get_named(&this, "name")? {
            Value::Undefined => "Error".to_string(),
            v => interp.to_string(&v)?.to_string(),
        };
        let message = match interp.get_named(&this, "message")? {
            Value::Undefined => String::new(),
            v => interp.to_string(&v)?.to_string(),
        };
        Ok(Value::string(match (name.is_empty(), message.is_empty()) {
            (_, true) => name,
            (true, false) => message,
            (false, false) => format!("{}: {}", name, message),
        }))
    });
}

#[cfg(test)]
mod tests {
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// 派生エラーは Error を継承する。
    fn hierarchy() {
        assert_eq!(eval_display("new TypeError('x') instanceof Error"), "true");
        assert_eq!(eval_display("Object.getPrototypeOf(RangeError) === Error"), "true");
        assert_eq!(eval_display("URIError.name + ' ' + new URIError().name"), "URIError URIError");
    }

    #[test]
    /// toString と cause。
    fn to_string_and_cause() {
        assert_eq!(eval_display("String(new Error('boom'))"), "Error: boom");
        assert_eq!(eval_display("String(new SyntaxError())"), "SyntaxError");
        assert_eq!(eval_display("new Error('a', { cause: 42 }).cause"), "42");
    }

    #[test]
    /// new なしでも呼べる。
    fn callable_without_new() {
        assert_eq!(eval_display("Error('plain').message"), "plain");
    }

    #[test]
    /// 関数内で投げたエラーがトップレベルまで伝わる。
    fn thrown_from_function() {
        assert_eq!(eval_display("function inner() { throw new Error('deep'); } inner()"), "throw Error: deep");
    }
}
