// パス: src/interpreter/builtins/collections.rs
// 役割: Map / Set / WeakMap / WeakSet / WeakRef
// 意図: キーは MapKey（SameValueZero）で同一視し、挿入順は IndexMap が保つ
// 関連ファイル: runtime_heap/src/object.rs, src/interpreter/iter.rs

use indexmap::IndexMap;
use runtime_heap::{Attributes, MapKey, ObjectId, ObjectKind, Property, PropertyKey, Value};

use super::{install_constructor, require_callable, require_new};
use crate::interpreter::{arg, Interpreter, JsResult};

/// 格納するキー値。-0 は +0 に揃える。
fn normalize_key(value: Value) -> Value {
    match value {
        Value::Number(n) if n == 0.0 => Value::Number(0.0),
        other => other,
    }
}

fn set_tag(interp: &mut Interpreter, proto: ObjectId, name: &str) {
    let tag = interp.well_known.to_string_tag;
    interp.heap.object_mut(proto).define(
        PropertyKey::Symbol(tag),
        Property::data(Value::string(name), Attributes::CONFIGURABLE),
    );
}

fn incompatible(interp: &mut Interpreter, method: &str, this: &Value) -> crate::interpreter::Abrupt {
    let shown = interp.heap.display_string(this);
    interp.type_error(format!("Method {} called on incompatible receiver {}", method, shown))
}

fn this_map(interp: &mut Interpreter, this: &Value, method: &str) -> JsResult<ObjectId> {
    match this {
        Value::Object(id) if matches!(interp.heap.kind(*id), ObjectKind::Map(_)) => Ok(*id),
        _ => Err(incompatible(interp, method, this)),
    }
}

fn this_set(interp: &mut Interpreter, this: &Value, method: &str) -> JsResult<ObjectId> {
    match this {
        Value::Object(id) if matches!(interp.heap.kind(*id), ObjectKind::Set(_)) => Ok(*id),
        _ => Err(incompatible(interp, method, this)),
    }
}

fn map_entries(interp: &Interpreter, id: ObjectId) -> Vec<(Value, Value)> {
    match interp.heap.kind(id) {
        ObjectKind::Map(m) => m.values().cloned().collect(),
        _ => Vec::new(),
    }
}

fn set_values(interp: &Interpreter, id: ObjectId) -> Vec<Value> {
    match interp.heap.kind(id) {
        ObjectKind::Set(s) => s.values().cloned().collect(),
        _ => Vec::new(),
    }
}

fn map_insert(interp: &mut Interpreter, id: ObjectId, key: Value, value: Value) {
    let key = normalize_key(key);
    if let ObjectKind::Map(m) = &mut interp.heap.object_mut(id).kind {
        m.insert(MapKey::from_value(&key), (key, value));
    }
}

fn set_insert(interp: &mut Interpreter, id: ObjectId, value: Value) {
    let value = normalize_key(value);
    if let ObjectKind::Set(s) = &mut interp.heap.object_mut(id).kind {
        s.insert(MapKey::from_value(&value), value);
    }
}

/// 弱参照コレクションのキーはオブジェクトに限る。
fn weak_key(interp: &mut Interpreter, value: &Value, what: &str) -> JsResult<ObjectId> {
    match value {
        Value::Object(id) => Ok(*id),
        other => {
            let shown = interp.heap.display_string(other);
            Err(interp.type_error(format!("Invalid value used {}: {}", what, shown)))
        }
    }
}

fn install_map(interp: &mut Interpreter) {
    let proto = interp.new_prototype("Map", ObjectKind::Ordinary);
    let ctor = install_constructor(interp, "Map", 0, proto, |interp, _, args| {
        require_new(interp, "Map")?;
        let proto = interp.constructing_prototype("Map");
        let id = interp.heap.alloc(ObjectKind::Map(IndexMap::new()), Some(proto));
        let iterable = arg(args, 0);
        if !iterable.is_nullish() {
            for entry in interp.iterate_to_vec(&iterable)? {
                if !entry.is_object() {
                    let shown = interp.heap.display_string(&entry);
                    return Err(interp.type_error(format!("Iterator value {} is not an entry object", shown)));
                }
                let key = interp.get(&entry, &PropertyKey::from("0"))?;
                let value = interp.get(&entry, &PropertyKey::from("1"))?;
                map_insert(interp, id, key, value);
            }
        }
        Ok(Value::Object(id))
    });
    interp.define_method(ctor, "groupBy", 2, |interp, _, args| {
        let callback = require_callable(interp, &arg(args, 1))?;
        let proto = interp.prototype("Map");
        let map = interp.heap.alloc(ObjectKind::Map(IndexMap::new()), Some(proto));
        for (i, item) in interp.iterate_to_vec(&arg(args, 0))?.into_iter().enumerate() {
            let key = interp.call(&callback, Value::Undefined, &[item.clone(), Value::Number(i as f64)])?;
            let key = normalize_key(key);
            let existing = match interp.heap.kind(map) {
                ObjectKind::Map(m) => m.get(&MapKey::from_value(&key)).map(|(_, v)| v.clone()),
                _ => None,
            };
            let group = match existing {
                Some(Value::Object(g)) => g,
                _ => {
                    let g = interp.create_array(Vec::new());
                    map_insert(interp, map, key, Value::Object(g));
                    g
                }
            };
            interp.invoke(&Value::Object(group), "push", &[item])?;
        }
        Ok(Value::Object(map))
    });

    interp.define_method(proto, "get", 1, |interp, this, args| {
        let id = this_map(interp, &this, "Map.prototype.get")?;
        let key = MapKey::from_value(&arg(args, 0));
        Ok(match interp.heap.kind(id) {
            ObjectKind::Map(m) => m.get(&key).map(|(_, v)| v.clone()).unwrap_or(Value::Undefined),
            _ => Value::Undefined,
        })
    });
    interp.define_method(proto, "set", 2, |interp, this, args| {
        let id = this_map(interp, &this, "Map.prototype.set")?;
        map_insert(interp, id, arg(args, 0), arg(args, 1));
        Ok(this)
    });
    interp.define_method(proto, "has", 1, |interp, this, args| {
        let id = this_map(interp, &this, "Map.prototype.has")?;
        let key = MapKey::from_value(&arg(args, 0));
        Ok(Value::Boolean(matches!(interp.heap.kind(id), ObjectKind::Map(m) if m.contains_key(&key))))
    });
    interp.define_method(proto, "delete", 1, |interp, this, args| {
        let id = this_map(interp, &this, "Map.prototype.delete")?;
        let key = MapKey::from_value(&arg(args, 0));
        let removed = match &mut interp.heap.object_mut(id).kind {
            ObjectKind::Map(m) => m.shift_remove(&key).is_some(),
            _ => false,
        };
        Ok(Value::Boolean(removed))
    });
    interp.define_method(proto, "clear", 0, |interp, this, _| {
        let id = this_map(interp, &this, "Map.prototype.clear")?;
        if let ObjectKind::Map(m) = &mut interp.heap.object_mut(id).kind {
            m.clear();
        }
        Ok(Value::Undefined)
    });
    interp.define_getter(proto, "size", |interp, this, _| {
        let id = this_map(interp, &this, "get Map.prototype.size")?;
        Ok(match interp.heap.kind(id) {
            ObjectKind::Map(m) => Value::Number(m.len() as f64),
            _ => Value::Undefined,
        })
    });
    interp.define_method(proto, "forEach", 1, |interp, this, args| {
        let id = this_map(interp, &this, "Map.prototype.forEach")?;
        let callback = require_callable(interp, &arg(args, 0))?;
        let this_arg = arg(args, 1);
        // 走査中の追加も拾うため毎回添字で引き直す
        let mut index = 0;
        loop {
            let entry = match interp.heap.kind(id) {
                ObjectKind::Map(m) => m.get_index(index).map(|(_, e)| e.clone()),
                _ => None,
            };
            let Some((key, value)) = entry else { break };
            interp.call(&callback, this_arg.clone(), &[value, key, this.clone()])?;
            index += 1;
        }
        Ok(Value::Undefined)
    });
    interp.define_method(proto, "keys", 0, |interp, this, _| {
        let id = this_map(interp, &this, "Map.prototype.keys")?;
        let keys = map_entries(interp, id).into_iter().map(|(k, _)| k).collect();
        Ok(interp.create_values_iterator(keys))
    });
    interp.define_method(proto, "values", 0, |interp, this, _| {
        let id = this_map(interp, &this, "Map.prototype.values")?;
        let values = map_entries(interp, id).into_iter().map(|(_, v)| v).collect();
        Ok(interp.create_values_iterator(values))
    });
    let entries = interp.define_method(proto, "entries", 0, |interp, this, _| {
        let id = this_map(interp, &this, "Map.prototype.entries")?;
        let pairs = map_entries(interp, id)
            .into_iter()
            .map(|(k, v)| Value::Object(interp.create_array(vec![k, v])))
            .collect();
        Ok(interp.create_values_iterator(pairs))
    });
    let iterator = interp.well_known.iterator;
    interp.heap.object_mut(proto).define(
        PropertyKey::Symbol(iterator),
        Property::data(Value::Object(entries), Attributes::BUILTIN),
    );
    set_tag(interp, proto, "Map");
}

fn install_set(interp: &mut Interpreter) {
    let proto = interp.new_prototype("Set", ObjectKind::Ordinary);
    install_constructor(interp, "Set", 0, proto, |interp, _, args| {
        require_new(interp, "Set")?;
        let proto = interp.constructing_prototype("Set");
        let id = interp.heap.alloc(ObjectKind::Set(IndexMap::new()), Some(proto));
        let iterable = arg(args, 0);
        if !iterable.is_nullish() {
            for value in interp.iterate_to_vec(&iterable)? {
                set_insert(interp, id, value);
            }
        }
        Ok(Value::Object(id))
    });

    interp.define_method(proto, "add", 1, |interp, this, args| {
        let id = this_set(interp, &this, "Set.prototype.add")?;
        set_insert(interp, id, arg(args, 0));
        Ok(this)
    });
    interp.define_method(proto, "has", 1, |interp, this, args| {
        let id = this_set(interp, &this, "Set.prototype.has")?;
        let key = MapKey::from_value(&arg(args, 0));
        Ok(Value::Boolean(matches!(interp.heap.kind(id), ObjectKind::Set(s) if s.contains_key(&key))))
    });
    interp.define_method(proto, "delete", 1, |interp, this, args| {
        let id = this_set(interp, &this, "Set.prototype.delete")?;
        let key = MapKey::from_value(&arg(args, 0));
        let removed = match &mut interp.heap.object_mut(id).kind {
            ObjectKind::Set(s) => s.shift_remove(&key).is_some(),
            _ => false,
        };
        Ok(Value::Boolean(removed))
    });
    interp.define_method(proto, "clear", 0, |interp, this, _| {
        let id = this_set(interp, &this, "Set.prototype.clear")?;
        if let ObjectKind::Set(s) = &mut interp.heap.object_mut(id).kind {
            s.clear();
        }
        Ok(Value::Undefined)
    });
    interp.define_getter(proto, "size", |interp, this, _| {
        let id = this_set(interp, &this, "get Set.prototype.size")?;
        Ok(match interp.heap.kind(id) {
            ObjectKind::Set(s) => Value::Number(s.len() as f64),
            _ => Value::Undefined,
        })
    });
    interp.define_method(proto, "forEach", 1, |interp, this, args| {
        let id = this_set(interp, &this, "Set.prototype.forEach")?;
        let callback = require_callable(interp, &arg(args, 0))?;
        let this_arg = arg(args, 1);
        let mut index = 0;
        loop {
            let value = match interp.heap.kind(id) {
                ObjectKind::Set(s) => s.get_index(index).map(|(_, v)| v.clone()),
                _ => None,
            };
            let Some(value) = value else { break };
            interp.call(&callback, this_arg.clone(), &[value.clone(), value, this.clone()])?;
            index += 1;
        }
        Ok(Value::Undefined)
    });
    let values = interp.define_method(proto, "values", 0, |interp, this, _| {
        let id = this_set(interp, &this, "Set.prototype.values")?;
        let values = set_values(interp, id);
        Ok(interp.create_values_iterator(values))
    });
    interp.define_method(proto, "entries", 0, |interp, this, _| {
        let id = this_set(interp, &this, "Set.prototype.entries")?;
        let pairs = set_values(interp, id)
            .into_iter()
            .map(|v| Value::Object(interp.create_array(vec![v.clone(), v])))
            .collect();
        Ok(interp.create_values_iterator(pairs))
    });
    let iterator = interp.well_known.iterator;
    for key in [PropertyKey::from("keys"), PropertyKey::Symbol(iterator)] {
        interp
            .heap
            .object_mut(proto)
            .define(key, Property::data(Value::Object(values), Attributes::BUILTIN));
    }
    set_tag(interp, proto, "Set");
}

fn install_weak(interp: &mut Interpreter) {
    let weak_map = interp.new_prototype("WeakMap", ObjectKind::Ordinary);
    install_constructor(interp, "WeakMap", 0, weak_map, |interp, _, args| {
        require_new(interp, "WeakMap")?;
        let proto = interp.constructing_prototype("WeakMap");
        let id = interp.heap.alloc(ObjectKind::WeakMap(Default::default()), Some(proto));
        let iterable = arg(args, 0);
        if !iterable.is_nullish() {
            for entry in interp.iterate_to_vec(&iterable)? {
                let key = interp.get(&entry, &PropertyKey::from("0"))?;
                let value = interp.get(&entry, &PropertyKey::from("1"))?;
                let key = weak_key(interp, &key, "as weak map key")?;
                if let ObjectKind::WeakMap(m) = &mut interp.heap.object_mut(id).kind {
                    m.insert(key, value);
                }
            }
        }
        Ok(Value::Object(id))
    });
    interp.define_method(weak_map, "get", 1, |interp, this, args| {
        let Value::Object(id) = this else {
            return Err(incompatible(interp, "WeakMap.prototype.get", &this));
        };
        let Value::Object(key) = arg(args, 0) else {
            return Ok(Value::Undefined);
        };
        match interp.heap.kind(id) {
            ObjectKind::WeakMap(m) => Ok(m.get(&key).cloned().unwrap_or(Value::Undefined)),
            _ => Err(incompatible(interp, "WeakMap.prototype.get", &this)),
        }
    });
    interp.define_method(weak_map, "set", 2, |interp, this, args| {
        let key = weak_key(interp, &arg(args, 0), "as weak map key")?;
        let stored = match &this {
            Value::Object(id) => match &mut interp.heap.object_mut(*id).kind {
                ObjectKind::WeakMap(m) => {
                    m.insert(key, arg(args, 1));
                    true
                }
                _ => false,
            },
            _ => false,
        };
        if !stored {
            return Err(incompatible(interp, "WeakMap.prototype.set", &this));
        }
        Ok(this)
    });
    interp.define_method(weak_map, "has", 1, |interp, this, args| {
        let Value::Object(key) = arg(args, 0) else {
            return Ok(Value::Boolean(false));
        };
        match &this {
            Value::Object(id) => match interp.heap.kind(*id) {
                ObjectKind::WeakMap(m) => Ok(Value::Boolean(m.contains_key(&key))),
                _ => Err(incompatible(interp, "WeakMap.prototype.has", &this)),
            },
            _ => Err(incompatible(interp, "WeakMap.prototype.has", &this)),
        }
    });
    interp.define_method(weak_map, "delete", 1, |interp, this, args| {
        let Value::Object(key) = arg(args, 0) else {
            return Ok(Value::Boolean(false));
        };
        let removed = match &this {
            Value::Object(id) => match &mut interp.heap.object_mut(*id).kind {
                ObjectKind::WeakMap(m) => Some(m.remove(&key).is_some()),
                _ => None,
            },
            _ => None,
        };
        match removed {
            Some(r) => Ok(Value::Boolean(r)),
            None => Err(incompatible(interp, "WeakMap.prototype.delete", &this)),
        }
    });
    set_tag(interp, weak_map, "WeakMap");

    let weak_set = interp.new_prototype("WeakSet", ObjectKind::Ordinary);
    install_constructor(interp, "WeakSet", 0, weak_set, |interp, _, args| {
        require_new(interp, "WeakSet")?;
        let proto = interp.constructing_prototype("WeakSet");
        let id = interp.heap.alloc(ObjectKind::WeakSet(Default::default()), Some(proto));
        let iterable = arg(args, 0);
        if !iterable.is_nullish() {
            for value in interp.iterate_to_vec(&iterable)? {
                let member = weak_key(interp, &value, "in weak set")?;
                if let ObjectKind::WeakSet(s) = &mut interp.heap.object_mut(id).kind {
                    s.insert(member);
                }
            }
        }
        Ok(Value::Object(id))
    });
    interp.define_method(weak_set, "add", 1, |interp, this, args| {
        let member = weak_key(interp, &arg(args, 0), "in weak set")?;
        let added = match &this {
            Value::Object(id) => match &mut interp.heap.object_mut(*id).kind {
                ObjectKind::WeakSet(s) => {
                    s.insert(member);
                    true
                }
                _ => false,
            },
            _ => false,
        };
        if !added {
            return Err(incompatible(interp, "WeakSet.prototype.add", &this));
        }
        Ok(this)
    });
    interp.define_method(weak_set, "has", 1, |interp, this, args| {
        let Value::Object(member) = arg(args, 0) else {
            return Ok(Value::Boolean(false));
        };
        match &this {
            Value::Object(id) => match interp.heap.kind(*id) {
                ObjectKind::WeakSet(s) => Ok(Value::Boolean(s.contains(&member))),
                _ => Err(incompatible(interp, "WeakSet.prototype.has", &this)),
            },
            _ => Err(incompatible(interp, "WeakSet.prototype.has", &this)),
        }
    });
    interp.define_method(weak_set, "delete", 1, |interp, this, args| {
        let Value::Object(member) = arg(args, 0) else {
            return Ok(Value::Boolean(false));
        };
        let removed = match &this {
            Value::Object(id) => match &mut interp.heap.object_mut(*id).kind {
                ObjectKind::WeakSet(s) => Some(s.remove(&member)),
                _ => None,
            },
            _ => None,
        };
        match removed {
            Some(r) => Ok(Value::Boolean(r)),
            None => Err(incompatible(interp, "WeakSet.prototype.delete", &this)),
        }
    });
    set_tag(interp, weak_set, "WeakSet");

    let weak_ref = interp.new_prototype("WeakRef", ObjectKind::Ordinary);
    install_constructor(interp, "WeakRef", 1, weak_ref, |interp, _, args| {
        require_new(interp, "WeakRef")?;
        let target = weak_key(interp, &arg(args, 0), "as WeakRef target")?;
        let proto = interp.constructing_prototype("WeakRef");
        Ok(Value::Object(interp.heap.alloc(ObjectKind::WeakRef(Some(target)), Some(proto))))
    });
    interp.define_method(weak_ref, "deref", 0, |interp, this, _| {
        if let Value::Object(id) = this {
            if let ObjectKind::WeakRef(target) = interp.heap.kind(id) {
                return Ok(target.map(Value::Object).unwrap_or(Value::Undefined));
            }
        }
        Err(incompatible(interp, "WeakRef.prototype.deref", &this))
    });
    set_tag(interp, weak_ref, "WeakRef");
}

pub(super) fn install(interp: &mut Interpreter) {
    install_map(interp);
    install_set(interp);
    install_weak(interp);
}

#[cfg(test)]
mod tests {
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// キーは SameValueZero で比較され、挿入順が保たれる。
    fn map_keys_and_order() {
        assert_eq!(eval_display("const m = new Map(); m.set(NaN, 1).set(-0, 2).set('a', 3); [m.get(NaN), m.get(0), m.size].join()"), "1,2,3");
        assert_eq!(eval_display("const m = new Map([['b', 1], ['a', 2]]); m.set('b', 3); [...m].join(';')"), "b,3;a,2");
        assert_eq!(eval_display("const m = new Map([[1, 1]]); [m.delete(1), m.delete(1), m.has(1)].join()"), "true,false,false");
    }

    #[test]
    /// Set の重複排除と forEach。
    fn set_basics() {
        assert_eq!(eval_display("const s = new Set([1, 2, 2, 3]); s.size"), "3");
        assert_eq!(eval_display("let out = []; new Set(['x', 'y']).forEach((v, k) => out.push(v + k)); out.join()"), "xx,yy");
        assert_eq!(eval_display("[...new Set('aba').entries()].join(';')"), "a,a;b,b");
    }

    #[test]
    /// new なしの呼び出しは TypeError。
    fn requires_new() {
        assert_eq!(eval_display("Map()"), "throw TypeError: Map constructor must be called with 'new'");
    }

    #[test]
    /// 弱参照コレクションはオブジェクトのみ受け付ける。
    fn weak_collections() {
        assert_eq!(eval_display("const k = {}; const w = new WeakMap([[k, 5]]); [w.get(k), w.has({})].join()"), "5,false");
        assert!(eval_display("new WeakSet().add(1)").starts_with("throw TypeError: Invalid value used in weak set"));
        assert_eq!(eval_display("const o = { v: 7 }; new WeakRef(o).deref().v"), "7");
    }

    #[test]
    /// groupBy はキーごとに配列へ振り分ける。
    fn group_by() {
        assert_eq!(eval_display("const g = Map.groupBy([1, 2, 3, 4], x => x % 2); g.get(1).join() + '|' + g.get(0).join()"), "1,3|2,4");
    }
}
