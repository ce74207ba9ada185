// パス: src/interpreter/builtins/object.rs
// 役割: Object コンストラクタと Object.prototype のメソッド
// 関連ファイル: src/interpreter/property.rs

use runtime_heap::{Attributes, ObjectId, ObjectKind, Property, PropertyKey, Slot, Value};

use super::{install_constructor, require_object};
use crate::interpreter::{arg, Interpreter, JsResult};

pub(super) fn install(interp: &mut Interpreter) {
    let proto = interp.heap.intrinsics().object_prototype;

    interp.define_method(proto, "hasOwnProperty", 1, |interp, this, args| {
        let key = interp.to_property_key(&arg(args, 0))?;
        let id = interp.to_object(&this)?;
        Ok(Value::Boolean(interp.has_own_property(id, &key)))
    });
    interp.define_method(proto, "isPrototypeOf", 1, |interp, this, args| {
        let Value::Object(mut current) = arg(args, 0) else {
            return Ok(Value::Boolean(false));
        };
        let id = interp.to_object(&this)?;
        while let Some(p) = interp.heap.prototype_of(current) {
            if p == id {
                return Ok(Value::Boolean(true));
            }
            current = p;
        }
        Ok(Value::Boolean(false))
    });
    interp.define_method(proto, "propertyIsEnumerable", 1, |interp, this, args| {
        let key = interp.to_property_key(&arg(args, 0))?;
        let id = interp.to_object(&this)?;
        let enumerable = interp
            .heap
            .object(id)
            .own_property(&key)
            .map(|p| p.attributes.enumerable())
            .unwrap_or_else(|| interp.has_own_property(id, &key));
        Ok(Value::Boolean(enumerable))
    });
    interp.define_method(proto, "toString", 0, |interp, this, _| {
        object_to_string(interp, &this).map(Value::string)
    });
    interp.define_method(proto, "toLocaleString", 0, |interp, this, _| {
        interp.invoke(&this, "toString", &[])
    });
    interp.define_method(proto, "valueOf", 0, |interp, this, _| {
        Ok(Value::Object(interp.to_object(&this)?))
    });

    let ctor = install_constructor(interp, "Object", 1, proto, |interp, _, args| {
        let value = arg(args, 0);
        if value.is_nullish() {
            let proto = interp.constructing_prototype("Object");
            return Ok(Value::Object(interp.heap.alloc(ObjectKind::Ordinary, Some(proto))));
        }
        Ok(Value::Object(interp.to_object(&value)?))
    });

    interp.define_method(ctor, "keys", 1, |interp, _, args| {
        let id = interp.to_object(&arg(args, 0))?;
        let keys = interp
            .own_enumerable_keys(id)
            .into_iter()
            .map(Value::String)
            .collect();
        Ok(Value::Object(interp.create_array(keys)))
    });
    interp.define_method(ctor, "values", 1, |interp, _, args| {
        let id = interp.to_object(&arg(args, 0))?;
        let mut values = Vec::new();
        for key in interp.own_enumerable_keys(id) {
            values.push(interp.get(&Value::Object(id), &PropertyKey::String(key))?);
        }
        Ok(Value::Object(interp.create_array(values)))
    });
    interp.define_method(ctor, "entries", 1, |interp, _, args| {
        let id = interp.to_object(&arg(args, 0))?;
        let mut entries = Vec::new();
        for key in interp.own_enumerable_keys(id) {
            let v = interp.get(&Value::Object(id), &PropertyKey::String(key.clone()))?;
            entries.push(Value::Object(interp.create_array(vec![Value::String(key), v])));
        }
        Ok(Value::Object(interp.create_array(entries)))
    });
    interp.define_method(ctor, "fromEntries", 1, |interp, _, args| {
        let target = interp.heap.alloc_ordinary();
        for entry in interp.iterate_to_vec(&arg(args, 0))? {
            let key = interp.get(&entry, &PropertyKey::from("0"))?;
            let value = interp.get(&entry, &PropertyKey::from("1"))?;
            let key = interp.to_property_key(&key)?;
            interp.create_data_property(target, key, value);
        }
        Ok(Value::Object(target))
    });
    interp.define_method(ctor, "assign", 2, |interp, _, args| {
        let target = interp.to_object(&arg(args, 0))?;
        for source in args.iter().skip(1) {
            if source.is_nullish() {
                continue;
            }
            let from = interp.to_object(source)?;
            for key in interp.own_enumerable_keys(from) {
                let key = PropertyKey::String(key);
                let v = interp.get(&Value::Object(from), &key)?;
                interp.set(&Value::Object(target), key, v)?;
            }
        }
        Ok(Value::Object(target))
    });
    interp.define_method(ctor, "create", 2, |interp, _, args| {
        let proto = match arg(args, 0) {
            Value::Object(p) => Some(p),
            Value::Null => None,
            other => {
                let shown = interp.heap.display_string(&other);
                return Err(interp.type_error(format!("Object prototype may only be an Object or null: {}", shown)));
            }
        };
        let id = interp.heap.alloc(ObjectKind::Ordinary, proto);
        let props = arg(args, 1);
        if !props.is_undefined() {
            define_properties(interp, id, &props)?;
        }
        Ok(Value::Object(id))
    });
    interp.define_method(ctor, "getPrototypeOf", 1, |interp, _, args| {
        let id = interp.to_object(&arg(args, 0))?;
        Ok(interp
            .heap
            .prototype_of(id)
            .map(Value::Object)
            .unwrap_or(Value::Null))
    });
    interp.define_method(ctor, "setPrototypeOf", 2, |interp, _, args| {
        let target = arg(args, 0);
        let proto = match arg(args, 1) {
            Value::Object(p) => Some(p),
            Value::Null => None,
            _ => return Err(interp.type_error("Object prototype may only be an Object or null")),
        };
        if let Value::Object(id) = target {
            let mut walk = proto;
            while let Some(p) = walk {
                if p == id {
                    return Err(interp.type_error("Cyclic __proto__ value"));
                }
                walk = interp.heap.prototype_of(p);
            }
            interp.heap.object_mut(id).prototype = proto;
        }
        Ok(target)
    });
    interp.define_method(ctor, "defineProperty", 3, |interp, _, args| {
        let target = require_object(interp, &arg(args, 0))?;
        let key = interp.to_property_key(&arg(args, 1))?;
        define_from_descriptor(interp, target, key, &arg(args, 2))?;
        Ok(Value::Object(target))
    });
    interp.define_method(ctor, "defineProperties", 2, |interp, _, args| {
        let target = require_object(interp, &arg(args, 0))?;
        define_properties(interp, target, &arg(args, 1))?;
        Ok(Value::Object(target))
    });
    interp.define_method(ctor, "getOwnPropertyNames", 1, |interp, _, args| {
        let id = interp.to_object(&arg(args, 0))?;
        let mut names: Vec<Value> = Vec::new();
        if let ObjectKind::StringObject(s) = interp.heap.kind(id) {
            let len = crate::interpreter::text::len(s);
            names.extend((0..len).map(|i| Value::string(i.to_string())));
        }
        names.extend(interp.heap.own_string_keys(id).into_iter().map(Value::String));
        if matches!(interp.heap.kind(id), ObjectKind::Array { .. } | ObjectKind::StringObject(_)) {
            names.push(Value::string("length"));
        }
        Ok(Value::Object(interp.create_array(names)))
    });
    interp.define_method(ctor, "getOwnPropertySymbols", 1, |interp, _, args| {
        let id = interp.to_object(&arg(args, 0))?;
        let symbols = interp
            .heap
            .object(id)
            .own_keys()
            .into_iter()
            .filter_map(|k| match k {
                PropertyKey::Symbol(s) => Some(Value::Symbol(s)),
                PropertyKey::String(_) => None,
            })
            .collect();
        Ok(Value::Object(interp.create_array(symbols)))
    });
    interp.define_method(ctor, "getOwnPropertyDescriptor", 2, |interp, _, args| {
        let id = interp.to_object(&arg(args, 0))?;
        let key = interp.to_property_key(&arg(args, 1))?;
        from_property_descriptor(interp, id, &key)
    });
    interp.define_method(ctor, "is", 2, |_, _, args| {
        Ok(Value::Boolean(arg(args, 0).same_value(&arg(args, 1))))
    });
    interp.define_method(ctor, "freeze", 1, |interp, _, args| {
        if let Value::Object(id) = arg(args, 0) {
            set_integrity(interp, id, true);
        }
        Ok(arg(args, 0))
    });
    interp.define_method(ctor, "seal", 1, |interp, _, args| {
        if let Value::Object(id) = arg(args, 0) {
            set_integrity(interp, id, false);
        }
        Ok(arg(args, 0))
    });
    interp.define_method(ctor, "preventExtensions", 1, |interp, _, args| {
        if let Value::Object(id) = arg(args, 0) {
            interp.heap.object_mut(id).extensible = false;
        }
        Ok(arg(args, 0))
    });
    interp.define_method(ctor, "isFrozen", 1, |interp, _, args| {
        Ok(Value::Boolean(test_integrity(interp, &arg(args, 0), true)))
    });
    interp.define_method(ctor, "isSealed", 1, |interp, _, args| {
        Ok(Value::Boolean(test_integrity(interp, &arg(args, 0), false)))
    });
    interp.define_method(ctor, "isExtensible", 1, |interp, _, args| {
        Ok(Value::Boolean(match arg(args, 0) {
            Value::Object(id) => interp.heap.object(id).extensible,
            _ => false,
        }))
    });
}

/// `Object.prototype.toString` の "[object Tag]"。
pub(super) fn object_to_string(interp: &mut Interpreter, this: &Value) -> JsResult<String> {
    match this {
        Value::Undefined | Value::Empty => return Ok("[object Undefined]".into()),
        Value::Null => return Ok("[object Null]".into()),
        _ => {}
    }
    let id = interp.to_object(this)?;
    let builtin_tag = match interp.heap.kind(id) {
        ObjectKind::Array { .. } => "Array",
        ObjectKind::Function(_) | ObjectKind::BoundFunction { .. } => "Function",
        ObjectKind::Error { .. } => "Error",
        ObjectKind::BooleanObject(_) => "Boolean",
        ObjectKind::NumberObject(_) => "Number",
        ObjectKind::StringObject(_) => "String",
        ObjectKind::Date(_) => "Date",
        ObjectKind::RegExp { .. } => "RegExp",
        _ => "Object",
    };
    let tag_key = PropertyKey::Symbol(interp.well_known.to_string_tag);
    let tag = match interp.get(&Value::Object(id), &tag_key)? {
        Value::String(s) => s.to_string(),
        _ => builtin_tag.to_string(),
    };
    Ok(format!("[object {}]", tag))
}

fn define_properties(interp: &mut Interpreter, target: ObjectId, props: &Value) -> JsResult<()> {
    let source = interp.to_object(props)?;
    for key in interp.own_enumerable_keys(source) {
        let key = PropertyKey::String(key);
        let desc = interp.get(&Value::Object(source), &key)?;
        define_from_descriptor(interp, target, key, &desc)?;
    }
    Ok(())
}

/// 記述子オブジェクトの 1 フィールド（存在しなければ `None`）。
fn descriptor_field(interp: &mut Interpreter, desc: ObjectId, name: &str) -> JsResult<Option<Value>> {
    let key = PropertyKey::from(name);
    if interp.has_property(desc, &key)? {
        Ok(Some(interp.get(&Value::Object(desc), &key)?))
    } else {
        Ok(None)
    }
}

/// `Object.defineProperty` の本体。
pub(super) fn define_from_descriptor(
    interp: &mut Interpreter,
    target: ObjectId,
    key: PropertyKey,
    desc: &Value,
) -> JsResult<()> {
    let desc = require_object(interp, desc)?;
    let value = descriptor_field(interp, desc, "value")?;
    let writable = descriptor_field(interp, desc, "writable")?.map(|v| interp.to_boolean(&v));
    let enumerable = descriptor_field(interp, desc, "enumerable")?.map(|v| interp.to_boolean(&v));
    let configurable = descriptor_field(interp, desc, "configurable")?.map(|v| interp.to_boolean(&v));
    let getter = descriptor_field(interp, desc, "get")?;
    let setter = descriptor_field(interp, desc, "set")?;
    let is_accessor = getter.is_some() || setter.is_some();
    if is_accessor && (value.is_some() || writable.is_some()) {
        return Err(interp.type_error("Accessor property descriptor cannot specify a value or writable key"));
    }
    let as_function = |interp: &mut Interpreter, v: Option<Value>| -> JsResult<Option<Option<ObjectId>>> {
        match v {
            None => Ok(None),
            Some(Value::Undefined) => Ok(Some(None)),
            Some(f) if interp.heap.is_callable(&f) => Ok(Some(f.as_object())),
            Some(_) => Err(interp.type_error("Accessor must be a function")),
        }
    };
    let getter = as_function(interp, getter)?;
    let setter = as_function(interp, setter)?;

    if let (ObjectKind::Array { .. }, Some("length")) = (interp.heap.kind(target), key.as_str()) {
        if let Some(v) = value {
            interp.set(&Value::Object(target), key, v)?;
        }
        return Ok(());
    }

    let existing = interp.heap.object(target).own_property(&key).cloned();
    let property = match existing {
        None => {
            if !interp.heap.object(target).extensible {
                let shown = interp.heap.key_display(&key);
                return Err(interp.type_error(format!("Cannot define property {}, object is not extensible", shown)));
            }
            let mut attributes = Attributes::NONE;
            attributes = attributes.with(Attributes::ENUMERABLE, enumerable.unwrap_or(false));
            attributes = attributes.with(Attributes::CONFIGURABLE, configurable.unwrap_or(false));
            if is_accessor {
                Property::accessor(getter.flatten(), setter.flatten(), attributes)
            } else {
                attributes = attributes.with(Attributes::WRITABLE, writable.unwrap_or(false));
                Property::data(value.unwrap_or(Value::Undefined), attributes)
            }
        }
        Some(current) => {
            if !current.attributes.configurable() {
                let changes_shape = configurable == Some(true)
                    || enumerable.is_some_and(|e| e != current.attributes.enumerable())
                    || is_accessor != current.is_accessor() && (is_accessor || value.is_some() || writable.is_some());
                let writes_readonly = !current.is_accessor()
                    && !current.attributes.writable()
                    && (writable == Some(true)
                        || value
                            .as_ref()
                            .zip(current.data_value())
                            .is_some_and(|(new, old)| !new.same_value(old)));
                if changes_shape || writes_readonly || (current.is_accessor() && is_accessor) {
                    let shown = interp.heap.key_display(&key);
                    return Err(interp.type_error(format!("Cannot redefine property: {}", shown)));
                }
            }
            let mut attributes = current.attributes;
            if let Some(e) = enumerable {
                attributes = attributes.with(Attributes::ENUMERABLE, e);
            }
            if let Some(c) = configurable {
                attributes = attributes.with(Attributes::CONFIGURABLE, c);
            }
            if is_accessor {
                let (old_get, old_set) = match current.slot {
                    Slot::Accessor { getter, setter } => (getter, setter),
                    Slot::Data(_) => (None, None),
                };
                Property::accessor(
                    getter.unwrap_or(old_get),
                    setter.unwrap_or(old_set),
                    attributes.with(Attributes::WRITABLE, false),
                )
            } else {
                if let Some(w) = writable {
                    attributes = attributes.with(Attributes::WRITABLE, w);
                }
                let old = current.data_value().cloned().unwrap_or(Value::Undefined);
                Property::data(value.unwrap_or(old), attributes)
            }
        }
    };
    interp.heap.object_mut(target).define(key, property);
    Ok(())
}

fn from_property_descriptor(interp: &mut Interpreter, id: ObjectId, key: &PropertyKey) -> JsResult<Value> {
    let property = match interp.heap.object(id).own_property(key).cloned() {
        Some(p) => p,
        None => match interp.heap.exotic_own_value(id, key) {
            Ok(Some(v)) => {
                let writable = matches!(interp.heap.kind(id), ObjectKind::Array { .. } | ObjectKind::TypedArray { .. });
                let enumerable = key.as_index().is_some();
                let attributes = Attributes::NONE
                    .with(Attributes::WRITABLE, writable)
                    .with(Attributes::ENUMERABLE, enumerable);
                Property::data(v, attributes)
            }
            _ => return Ok(Value::Undefined),
        },
    };
    let desc = interp.heap.alloc_ordinary();
    match property.slot {
        Slot::Data(v) => {
            interp.create_data_property(desc, PropertyKey::from("value"), v);
            interp.create_data_property(
                desc,
                PropertyKey::from("writable"),
                Value::Boolean(property.attributes.writable()),
            );
        }
        Slot::Accessor { getter, setter } => {
            let as_value = |f: Option<ObjectId>| f.map(Value::Object).unwrap_or(Value::Undefined);
            interp.create_data_property(desc, PropertyKey::from("get"), as_value(getter));
            interp.create_data_property(desc, PropertyKey::from("set"), as_value(setter));
        }
    }
    interp.create_data_property(
        desc,
        PropertyKey::from("enumerable"),
        Value::Boolean(property.attributes.enumerable()),
    );
    interp.create_data_property(
        desc,
        PropertyKey::from("configurable"),
        Value::Boolean(property.attributes.configurable()),
    );
    Ok(Value::Object(desc))
}

/// freeze（`frozen`）と seal の共通部分。
fn set_integrity(interp: &mut Interpreter, id: ObjectId, frozen: bool) {
    let object = interp.heap.object_mut(id);
    object.extensible = false;
    for key in object.own_keys() {
        if let Some(p) = object.own_property_mut(&key) {
            let mut attributes = p.attributes.with(Attributes::CONFIGURABLE, false);
            if frozen && !p.is_accessor() {
                attributes = attributes.with(Attributes::WRITABLE, false);
            }
            p.attributes = attributes;
        }
    }
}

fn test_integrity(interp: &Interpreter, value: &Value, frozen: bool) -> bool {
    let Value::Object(id) = value else {
        return true;
    };
    let object = interp.heap.object(*id);
    if object.extensible {
        return false;
    }
    object.own_keys().iter().all(|key| {
        object.own_property(key).is_some_and(|p| {
            !p.attributes.configurable() && (!frozen || p.is_accessor() || !p.attributes.writable())
        })
    })
}

#[cfg(test)]
mod tests {
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// keys / values / entries と assign。
    fn enumeration_helpers() {
        assert_eq!(eval_display("Object.keys({ b: 1, a: 2, 1: 3 }).join()"), "1,b,a");
        assert_eq!(eval_display("Object.entries({ x: 1 })[0].join('=')"), "x=1");
        assert_eq!(eval_display("Object.assign({ a: 1 }, { b: 2 }, null).b"), "2");
    }

    #[test]
    /// defineProperty で作ったプロパティは既定で列挙も書き込みもできない。
    fn define_property_defaults() {
        assert_eq!(
            eval_display("const o = {}; Object.defineProperty(o, 'x', { value: 1 }); o.x = 2; `${o.x} ${Object.keys(o).length}`"),
            "1 0"
        );
        assert_eq!(
            eval_display("const o = {}; Object.defineProperty(o, 'x', { value: 1 }); Object.defineProperty(o, 'x', { value: 2 })"),
            "throw TypeError: Cannot redefine property: x"
        );
    }

    #[test]
    /// getter を defineProperty で定義できる。
    fn define_accessor() {
        assert_eq!(
            eval_display("const o = { n: 2 }; Object.defineProperty(o, 'd', { get() { return this.n * 2; } }); o.d"),
            "4"
        );
    }

    #[test]
    /// Object.prototype.toString のタグ。
    fn to_string_tags() {
        assert_eq!(eval_display("Object.prototype.toString.call([])"), "[object Array]");
        assert_eq!(eval_display("Object.prototype.toString.call(null)"), "[object Null]");
        assert_eq!(eval_display("String({})"), "[object Object]");
    }

    #[test]
    /// freeze 後の書き込みは無視される。
    fn freeze() {
        assert_eq!(eval_display("const o = Object.freeze({ a: 1 }); o.a = 5; o.b = 1; `${o.a} ${o.b} ${Object.isFrozen(o)}`"), "1 undefined true");
    }
}
