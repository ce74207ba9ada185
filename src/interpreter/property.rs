// パス: src/interpreter/property.rs
// 役割: 副作用を伴うプロパティ操作（ゲッター・セッター・プロキシのトラップ呼び出し）を実装する
// 意図: 副作用なしの読み出しはヒープ側、スクリプトの意味論に従う読み書きはこちら、と責務を分ける
// 関連ファイル: runtime_heap/src/heap.rs, src/interpreter/eval.rs

use std::collections::HashSet;
use std::rc::Rc;

use runtime_heap::{
    Attributes, ElementValue, ObjectId, ObjectKind, Property, PropertyKey, Slot, Value,
};

use super::{text, Interpreter, JsResult};

/// プロトタイプ鎖を辿る上限（循環した鎖の保険）。
const MAX_CHAIN: usize = 10_000;

/// 直接の値か、呼び出すべきゲッターか。
enum Found {
    Value(Value),
    Getter(Option<ObjectId>),
    Proxy { target: ObjectId, handler: ObjectId },
    Missing,
}

impl Interpreter {
    pub(crate) fn key_value(key: &PropertyKey) -> Value {
        match key {
            PropertyKey::String(s) => Value::String(s.clone()),
            PropertyKey::Symbol(s) => Value::Symbol(*s),
        }
    }

    /// `target[key]` を読む。プリミティブは対応するプロトタイプから探す。
    pub(crate) fn get(&mut self, target: &Value, key: &PropertyKey) -> JsResult<Value> {
        let start = match target {
            Value::Object(id) => *id,
            Value::String(s) => {
                if key.as_str() == Some("length") {
                    return Ok(Value::Number(text::len(s) as f64));
                }
                if let Some(idx) = key.as_index() {
                    let units = text::units(s);
                    return Ok(match units.get(idx as usize) {
                        Some(u) => Value::string(text::from_units(&[*u])),
                        None => Value::Undefined,
                    });
                }
                self.prototype("String")
            }
            Value::Number(_) => self.prototype("Number"),
            Value::Boolean(_) => self.prototype("Boolean"),
            Value::BigInt(_) => self.prototype("BigInt"),
            Value::Symbol(_) => self.prototype("Symbol"),
            Value::Empty | Value::Undefined | Value::Null => {
                let msg = format!(
                    "Cannot read property '{}' of {}",
                    self.heap.key_display(key),
                    self.heap.display_string(target)
                );
                return Err(self.type_error(msg));
            }
        };
        self.get_from(start, key, target)
    }

    pub(crate) fn get_named(&mut self, target: &Value, name: &str) -> JsResult<Value> {
        self.get(target, &PropertyKey::from(name))
    }

    /// `start` から鎖を辿って読む。ゲッターは `receiver` を this にして呼ぶ。
    pub(crate) fn get_from(
        &mut self,
        start: ObjectId,
        key: &PropertyKey,
        receiver: &Value,
    ) -> JsResult<Value> {
        match self.find_property(start, key) {
            Found::Value(v) => Ok(v),
            Found::Getter(Some(getter)) => self.call(&Value::Object(getter), receiver.clone(), &[]),
            Found::Getter(None) | Found::Missing => Ok(Value::Undefined),
            Found::Proxy { target, handler } => {
                let trap = self.get_named(&Value::Object(handler), "get")?;
                if self.heap.is_callable(&trap) {
                    let args = [Value::Object(target), Self::key_value(key), receiver.clone()];
                    self.call(&trap, Value::Object(handler), &args)
                } else {
                    self.get_from(target, key, receiver)
                }
            }
        }
    }

    fn find_property(&self, start: ObjectId, key: &PropertyKey) -> Found {
        let mut visited = HashSet::new();
        let mut current = Some(start);
        while let Some(id) = current {
            if !visited.insert(id) || visited.len() > MAX_CHAIN {
                break;
            }
            if let ObjectKind::Proxy { target, handler } = self.heap.kind(id) {
                return Found::Proxy {
                    target: *target,
                    handler: *handler,
                };
            }
            if let Ok(Some(v)) = self.heap.exotic_own_value(id, key) {
                return Found::Value(v);
            }
            let object = self.heap.object(id);
            if let Some(prop) = object.own_property(key) {
                return match &prop.slot {
                    Slot::Data(v) => Found::Value(v.clone()),
                    Slot::Accessor { getter, .. } => Found::Getter(*getter),
                };
            }
            current = object.prototype;
        }
        Found::Missing
    }

    /// 呼び出し可能なメソッドを取り出す。未定義なら `None`。
    pub(crate) fn get_method(&mut self, target: &Value, key: &PropertyKey) -> JsResult<Option<Value>> {
        let method = self.get(target, key)?;
        if method.is_nullish() {
            return Ok(None);
        }
        if !self.heap.is_callable(&method) {
            let msg = format!("{} is not a function", self.heap.key_display(key));
            return Err(self.type_error(msg));
        }
        Ok(Some(method))
    }

    pub(crate) fn invoke(&mut self, target: &Value, name: &str, args: &[Value]) -> JsResult<Value> {
        let method = self.get_named(target, name)?;
        if !self.heap.is_callable(&method) {
            return Err(self.type_error(format!("{} is not a function", name)));
        }
        self.call(&method, target.clone(), args)
    }

    /// `target[key] = value`。
    pub(crate) fn set(&mut self, target: &Value, key: PropertyKey, value: Value) -> JsResult<()> {
        match target {
            Value::Object(id) => self.set_on(*id, key, value, *id),
            Value::Empty | Value::Undefined | Value::Null => {
                let msg = format!(
                    "Cannot set property '{}' of {}",
                    self.heap.key_display(&key),
                    self.heap.display_string(target)
                );
                Err(self.type_error(msg))
            }
            _ if self.strict => {
                let msg = format!(
                    "Cannot create property '{}' on primitive",
                    self.heap.key_display(&key)
                );
                Err(self.type_error(msg))
            }
            _ => Ok(()),
        }
    }

    fn set_on(
        &mut self,
        start: ObjectId,
        key: PropertyKey,
        value: Value,
        receiver: ObjectId,
    ) -> JsResult<()> {
        if let ObjectKind::Proxy { target, handler } = *self.heap.kind(start) {
            let trap = self.get_named(&Value::Object(handler), "set")?;
            if self.heap.is_callable(&trap) {
                let args = [
                    Value::Object(target),
                    Self::key_value(&key),
                    value,
                    Value::Object(receiver),
                ];
                let ok = self.call(&trap, Value::Object(handler), &args)?;
                if !self.to_boolean(&ok) && self.strict {
                    return Err(self.type_error("Proxy set trap returned falsish"));
                }
                return Ok(());
            }
            return self.set_on(target, key, value, target);
        }
        if start == receiver {
            if self.set_exotic(receiver, &key, &value)? {
                return Ok(());
            }
        }
        let mut visited = HashSet::new();
        let mut current = Some(start);
        while let Some(id) = current {
            if !visited.insert(id) || visited.len() > MAX_CHAIN {
                break;
            }
            if id != start && matches!(self.heap.kind(id), ObjectKind::Proxy { .. }) {
                break;
            }
            let object = self.heap.object(id);
            let found = object
                .own_property(&key)
                .map(|p| (p.slot.clone(), p.attributes));
            let prototype = object.prototype;
            if let Some((slot, attributes)) = found {
                match slot {
                    Slot::Accessor { setter, .. } => {
                        return match setter {
                            Some(setter) => self
                                .call(&Value::Object(setter), Value::Object(receiver), &[value])
                                .map(|_| ()),
                            None if self.strict => {
                                let msg = format!(
                                    "Cannot set property '{}' which has only a getter",
                                    self.heap.key_display(&key)
                                );
                                Err(self.type_error(msg))
                            }
                            None => Ok(()),
                        };
                    }
                    Slot::Data(_) if !attributes.writable() => {
                        if self.strict {
                            let msg = format!(
                                "Cannot assign to read-only property '{}'",
                                self.heap.key_display(&key)
                            );
                            return Err(self.type_error(msg));
                        }
                        return Ok(());
                    }
                    Slot::Data(_) if id == receiver => {
                        if let Some(p) = self.heap.object_mut(id).own_property_mut(&key) {
                            p.slot = Slot::Data(value);
                        }
                        return Ok(());
                    }
                    Slot::Data(_) => break,
                }
            }
            current = prototype;
        }
        if !self.heap.object(receiver).extensible {
            if self.strict {
                let msg = format!(
                    "Cannot add property '{}', object is not extensible",
                    self.heap.key_display(&key)
                );
                return Err(self.type_error(msg));
            }
            return Ok(());
        }
        self.heap
            .object_mut(receiver)
            .define(key, Property::data(value, Attributes::DEFAULT));
        Ok(())
    }

    /// 内部スロットに直結したプロパティへの書き込み。処理した場合は `true`。
    fn set_exotic(
        &mut self,
        id: ObjectId,
        key: &PropertyKey,
        value: &Value,
    ) -> JsResult<bool> {
        match self.heap.kind(id).clone() {
            ObjectKind::Array { length } if key.as_str() == Some("length") => {
                let n = self.to_number(value)?;
                if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
                    return Err(self.range_error("Invalid array length"));
                }
                let new_len = n as u32;
                let object = self.heap.object_mut(id);
                if new_len < length {
                    object.truncate_indexed(new_len);
                } else if let ObjectKind::Array { length } = &mut object.kind {
                    *length = new_len;
                }
                Ok(true)
            }
            ObjectKind::TypedArray { kind, .. } => {
                let Some(idx) = key.as_index() else {
                    return Ok(false);
                };
                let element = if kind.is_bigint() {
                    ElementValue::BigInt(self.to_bigint(value)?)
                } else {
                    ElementValue::Number(self.to_number(value)?)
                };
                self.heap.set_typed_array_element(id, idx as usize, element);
                Ok(true)
            }
            ObjectKind::StringObject(_)
                if key.as_str() == Some("length") || key.as_index().is_some() =>
            {
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// 通常のデータプロパティとして定義する（リテラル生成・配列構築用）。
    pub(crate) fn create_data_property(&mut self, id: ObjectId, key: PropertyKey, value: Value) {
        self.heap
            .object_mut(id)
            .define(key, Property::data(value, Attributes::DEFAULT));
    }

    pub(crate) fn has_property(&mut self, start: ObjectId, key: &PropertyKey) -> JsResult<bool> {
        let mut visited = HashSet::new();
        let mut current = Some(start);
        while let Some(id) = current {
            if !visited.insert(id) || visited.len() > MAX_CHAIN {
                break;
            }
            if let ObjectKind::Proxy { target, handler } = *self.heap.kind(id) {
                let trap = self.get_named(&Value::Object(handler), "has")?;
                if self.heap.is_callable(&trap) {
                    let args = [Value::Object(target), Self::key_value(key)];
                    let result = self.call(&trap, Value::Object(handler), &args)?;
                    return Ok(self.to_boolean(&result));
                }
                current = Some(target);
                continue;
            }
            if let Ok(Some(_)) = self.heap.exotic_own_value(id, key) {
                return Ok(true);
            }
            if self.has_exotic_own_key(id, key) {
                return Ok(true);
            }
            let object = self.heap.object(id);
            if object.own_property(key).is_some() {
                return Ok(true);
            }
            current = object.prototype;
        }
        Ok(false)
    }

    fn has_exotic_own_key(&self, id: ObjectId, key: &PropertyKey) -> bool {
        match self.heap.kind(id) {
            ObjectKind::TypedArray { length, .. } => {
                key.as_index().is_some_and(|i| (i as usize) < *length)
            }
            _ => false,
        }
    }

    pub(crate) fn has_own_property(&self, id: ObjectId, key: &PropertyKey) -> bool {
        matches!(self.heap.exotic_own_value(id, key), Ok(Some(_)))
            || self.has_exotic_own_key(id, key)
            || self.heap.object(id).own_property(key).is_some()
    }

    pub(crate) fn delete_property(&mut self, id: ObjectId, key: &PropertyKey) -> JsResult<bool> {
        if let ObjectKind::Proxy { target, handler } = *self.heap.kind(id) {
            let trap = self.get_named(&Value::Object(handler), "deleteProperty")?;
            if self.heap.is_callable(&trap) {
                let args = [Value::Object(target), Self::key_value(key)];
                let result = self.call(&trap, Value::Object(handler), &args)?;
                return Ok(self.to_boolean(&result));
            }
            return self.delete_property(target, key);
        }
        let configurable = match self.heap.object(id).own_property(key) {
            Some(prop) => prop.attributes.configurable(),
            None => return Ok(true),
        };
        if !configurable {
            if self.strict {
                let msg = format!("Cannot delete property '{}'", self.heap.key_display(key));
                return Err(self.type_error(msg));
            }
            return Ok(false);
        }
        self.heap.object_mut(id).remove(key);
        Ok(true)
    }

    /// 自身の列挙可能な文字列キー（添字昇順 → 定義順）。
    pub(crate) fn own_enumerable_keys(&self, id: ObjectId) -> Vec<Rc<str>> {
        let mut target = id;
        let mut guard = 0;
        while let ObjectKind::Proxy { target: t, .. } = self.heap.kind(target) {
            target = *t;
            guard += 1;
            if guard > MAX_CHAIN {
                return Vec::new();
            }
        }
        let mut keys: Vec<Rc<str>> = Vec::new();
        match self.heap.kind(target) {
            ObjectKind::StringObject(s) => {
                keys.extend((0..text::len(s)).map(|i| Rc::from(i.to_string())));
            }
            ObjectKind::TypedArray { length, .. } => {
                keys.extend((0..*length).map(|i| Rc::from(i.to_string())));
            }
            _ => {}
        }
        let object = self.heap.object(target);
        keys.extend(
            object
                .indexed_entries()
                .filter(|(_, p)| p.attributes.enumerable())
                .map(|(i, _)| Rc::from(i.to_string())),
        );
        keys.extend(object.named_entries().filter_map(|(k, p)| match k {
            PropertyKey::String(s) if p.attributes.enumerable() => Some(s.clone()),
            _ => None,
        }));
        keys
    }

    /// `for..in` の列挙キー（プロトタイプ鎖を含み、重複を除く）。
    pub(crate) fn for_in_keys(&self, id: ObjectId) -> Vec<Rc<str>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(id);
        while let Some(obj) = current {
            if !visited.insert(obj) || visited.len() > MAX_CHAIN {
                break;
            }
            for key in self.own_enumerable_keys(obj) {
                if seen.insert(key.clone()) {
                    out.push(key);
                }
            }
            // 列挙不可のプロパティも後続の同名キーを隠す
            for key in self.heap.own_string_keys(obj) {
                seen.insert(key);
            }
            current = self.heap.prototype_of(obj);
        }
        out
    }

    /// 値の列から配列を作る。
    pub(crate) fn create_array(&mut self, values: Vec<Value>) -> ObjectId {
        let proto = self.prototype("Array");
        let id = self.heap.alloc(ObjectKind::Array { length: 0 }, Some(proto));
        let object = self.heap.object_mut(id);
        for (i, v) in values.into_iter().enumerate() {
            object.define_index(i as u32, Property::data(v, Attributes::DEFAULT));
        }
        id
    }

    /// ToLength(target.length)。
    pub(crate) fn length_of(&mut self, target: &Value) -> JsResult<usize> {
        let len = self.get_named(target, "length")?;
        let n = self.to_integer(&len)?;
        Ok(n.clamp(0.0, 9_007_199_254_740_991.0) as usize)
    }

    /// 配列風オブジェクトの要素を順に取り出す。
    pub(crate) fn array_like_to_vec(&mut self, target: &Value) -> JsResult<Vec<Value>> {
        let len = self.length_of(target)?;
        let mut out = Vec::with_capacity(len.min(1 << 16));
        for i in 0..len {
            out.push(self.get(target, &PropertyKey::string(i.to_string()))?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// ゲッター・セッターがレシーバを this にして呼ばれる。
    fn accessors_use_receiver() {
        assert_eq!(
            eval_display(
                "const o = { _v: 1, get v() { return this._v * 10; }, set v(x) { this._v = x; } }; o.v = 4; o.v"
            ),
            "40"
        );
    }

    #[test]
    /// 配列の length を縮めると要素が消える。
    fn array_length_truncates() {
        assert_eq!(eval_display("const a = [1,2,3,4]; a.length = 2; a.join('-')"), "1-2");
        assert_eq!(eval_display("const a = []; a[5] = 1; a.length"), "6");
    }

    #[test]
    /// プロキシの get / has トラップが呼ばれる。
    fn proxy_traps() {
        assert_eq!(
            eval_display("const p = new Proxy({}, { get: (t, k) => k + '!' }); p.hello"),
            "hello!"
        );
        assert_eq!(
            eval_display("const p = new Proxy({}, { has: () => true }); 'x' in p"),
            "true"
        );
    }

    #[test]
    /// undefined のプロパティ読み出しは TypeError。
    fn read_from_undefined() {
        assert_eq!(
            eval_display("let u; u.x"),
            "throw TypeError: Cannot read property 'x' of undefined"
        );
    }
}
