// パス: src/interpreter/builtins/proxy.rs
// 役割: Proxy・Reflect・ShadowRealm
// 意図: トラップの呼び出し自体は property.rs 側が担い、ここでは生成と公開 API だけを扱う
// 関連ファイル: src/interpreter/property.rs, src/interpreter/builtins/object.rs

use runtime_heap::{Attributes, ObjectKind, Property, PropertyKey, Value};

use super::object::define_from_descriptor;
use super::{define_global, install_constructor, require_callable, require_new, require_object};
use crate::interpreter::{arg, Abrupt, Interpreter, JsResult};
use crate::parser::{parse_program, ParseMode};

fn install_proxy(interp: &mut Interpreter) {
    let ctor = interp.alloc_native("Proxy", 2, true, |interp, _, args| {
        require_new(interp, "Proxy")?;
        let (Value::Object(target), Value::Object(handler)) = (arg(args, 0), arg(args, 1)) else {
            return Err(interp.type_error("Cannot create proxy with a non-object as target or handler"));
        };
        Ok(Value::Object(interp.heap.alloc(ObjectKind::Proxy { target, handler }, None)))
    });
    define_global(interp, "Proxy", Value::Object(ctor));
}

fn install_reflect(interp: &mut Interpreter) {
    let reflect = interp.heap.alloc_ordinary();
    interp.define_method(reflect, "get", 2, |interp, _, args| {
        let target = require_object(interp, &arg(args, 0))?;
        let key = interp.to_property_key(&arg(args, 1))?;
        let receiver = if args.len() > 2 { arg(args, 2) } else { Value::Object(target) };
        interp.get_from(target, &key, &receiver)
    });
    interp.define_method(reflect, "set", 3, |interp, _, args| {
        let target = require_object(interp, &arg(args, 0))?;
        let key = interp.to_property_key(&arg(args, 1))?;
        match interp.set(&Value::Object(target), key, arg(args, 2)) {
            Ok(()) => Ok(Value::Boolean(true)),
            Err(Abrupt::Throw(_)) if !interp.heap.object(target).extensible => Ok(Value::Boolean(false)),
            Err(e) => Err(e),
        }
    });
    interp.define_method(reflect, "has", 2, |interp, _, args| {
        let target = require_object(interp, &arg(args, 0))?;
        let key = interp.to_property_key(&arg(args, 1))?;
        Ok(Value::Boolean(interp.has_property(target, &key)?))
    });
    interp.define_method(reflect, "deleteProperty", 2, |interp, _, args| {
        let target = require_object(interp, &arg(args, 0))?;
        let key = interp.to_property_key(&arg(args, 1))?;
        Ok(Value::Boolean(interp.delete_property(target, &key)?))
    });
    interp.define_method(reflect, "ownKeys", 1, |interp, _, args| {
        let target = require_object(interp, &arg(args, 0))?;
        let keys: Vec<Value> = interp
            .heap
            .object(target)
            .own_keys()
            .iter()
            .map(Interpreter::key_value)
            .collect();
        Ok(Value::Object(interp.create_array(keys)))
    });
    interp.define_method(reflect, "getPrototypeOf", 1, |interp, _, args| {
        let target = require_object(interp, &arg(args, 0))?;
        Ok(interp.heap.prototype_of(target).map(Value::Object).unwrap_or(Value::Null))
    });
    interp.define_method(reflect, "defineProperty", 3, |interp, _, args| {
        let target = require_object(interp, &arg(args, 0))?;
        let key = interp.to_property_key(&arg(args, 1))?;
        define_from_descriptor(interp, target, key, &arg(args, 2))?;
        Ok(Value::Boolean(true))
    });
    interp.define_method(reflect, "apply", 3, |interp, _, args| {
        let func = require_callable(interp, &arg(args, 0))?;
        let list = interp.array_like_to_vec(&arg(args, 2))?;
        interp.call(&func, arg(args, 1), &list)
    });
    interp.define_method(reflect, "construct", 2, |interp, _, args| {
        let func = arg(args, 0);
        if !interp.is_constructor(&func) {
            let shown = interp.heap.display_string(&func);
            return Err(interp.type_error(format!("{} is not a constructor", shown)));
        }
        let list = interp.array_like_to_vec(&arg(args, 1))?;
        interp.construct(&func, &list)
    });
    let tag = interp.well_known.to_string_tag;
    interp.heap.object_mut(reflect).define(
        PropertyKey::Symbol(tag),
        Property::data(Value::string("Reflect"), Attributes::CONFIGURABLE),
    );
    define_global(interp, "Reflect", Value::Object(reflect));
}

/// realm 境界を越えられるのはプリミティブだけ。シンボルは realm ごとに別物。
fn cross_realm(interp: &mut Interpreter, value: Value) -> JsResult<Value> {
    match value {
        Value::Object(_) | Value::Symbol(_) => {
            Err(interp.type_error("ShadowRealm.prototype.evaluate result must be a primitive value"))
        }
        Value::Empty => Ok(Value::Undefined),
        other => Ok(other),
    }
}

impl Interpreter {
    /// 独立した realm で `source` を評価する。realm はオブジェクトごとに保持する。
    fn shadow_realm_evaluate(&mut self, realm: runtime_heap::ObjectId, source: &str) -> JsResult<Value> {
        let program = match parse_program(source, ParseMode::Script) {
            Ok(program) => program,
            Err(e) => return Err(self.throw(crate::interpreter::ErrorKind::SyntaxError, &e.0.msg)),
        };
        let mut inner = match self.realms.remove(&realm) {
            Some(inner) => inner,
            None => Interpreter::new(self.host()),
        };
        let outcome = inner.run_program(&program).and_then(|v| inner.run_jobs().map(|()| v));
        let result = match outcome {
            Ok(v) => cross_realm(self, v),
            Err(Abrupt::Throw(thrown)) => {
                let shown = inner.describe_error(&thrown);
                Err(self.type_error(format!("ShadowRealm evaluation threw: {}", shown)))
            }
            Err(exit) => Err(exit),
        };
        self.realms.insert(realm, inner);
        result
    }
}

fn install_shadow_realm(interp: &mut Interpreter) {
    let proto = interp.new_prototype("ShadowRealm", ObjectKind::Ordinary);
    install_constructor(interp, "ShadowRealm", 0, proto, |interp, _, _| {
        require_new(interp, "ShadowRealm")?;
        let proto = interp.constructing_prototype("ShadowRealm");
        Ok(Value::Object(interp.heap.alloc(ObjectKind::ShadowRealm, Some(proto))))
    });
    interp.define_method(proto, "evaluate", 1, |interp, this, args| {
        let realm = match this {
            Value::Object(id) if matches!(interp.heap.kind(id), ObjectKind::ShadowRealm) => id,
            _ => return Err(interp.type_error("this is not a ShadowRealm")),
        };
        let Value::String(source) = arg(args, 0) else {
            return Err(interp.type_error("ShadowRealm.prototype.evaluate expects a string"));
        };
        interp.shadow_realm_evaluate(realm, &source)
    });
    let tag = interp.well_known.to_string_tag;
    interp.heap.object_mut(proto).define(
        PropertyKey::Symbol(tag),
        Property::data(Value::string("ShadowRealm"), Attributes::CONFIGURABLE),
    );
}

pub(super) fn install(interp: &mut Interpreter) {
    install_proxy(interp);
    install_reflect(interp);
    install_shadow_realm(interp);
}

#[cfg(test)]
mod tests {
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// get・has トラップと、トラップのない操作の素通し。
    fn proxy_traps() {
        assert_eq!(
            eval_display("const p = new Proxy({a: 1}, { get: (t, k) => k in t ? t[k] : 'none' }); p.a + p.b"),
            "1none"
        );
        assert_eq!(eval_display("const p = new Proxy({}, { has: () => true }); 'x' in p"), "true");
        assert_eq!(eval_display("const t = {}; const p = new Proxy(t, {}); p.v = 3; t.v"), "3");
        assert_eq!(
            eval_display("new Proxy(1, {})"),
            "throw TypeError: Cannot create proxy with a non-object as target or handler"
        );
    }

    #[test]
    /// Reflect の基本操作。
    fn reflect_operations() {
        assert_eq!(eval_display("Reflect.ownKeys({a: 1, b: 2}).join()"), "a,b");
        assert_eq!(eval_display("Reflect.apply(Math.max, null, [1, 3, 2])"), "3");
        assert_eq!(eval_display("Reflect.construct(Date, [0]).getTime()"), "0");
        assert_eq!(eval_display("const o = {x: 1}; Reflect.deleteProperty(o, 'x'); 'x' in o"), "false");
    }

    #[test]
    /// ShadowRealm の束縛は外から見えず、評価間で保たれる。
    fn shadow_realm_isolation() {
        assert_eq!(
            eval_display("var leaked = 1; const r = new ShadowRealm(); r.evaluate('var leaked = 5; leaked * 2')"),
            "10"
        );
        assert_eq!(
            eval_display("const r = new ShadowRealm(); r.evaluate('var n = 2'); r.evaluate('n + 1')"),
            "3"
        );
        assert_eq!(
            eval_display("new ShadowRealm().evaluate('({})')"),
            "throw TypeError: ShadowRealm.prototype.evaluate result must be a primitive value"
        );
    }
}
