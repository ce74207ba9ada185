// パス: src/interpreter/builtins/json.rs
// 役割: JSON.parse / JSON.stringify
// 意図: 構文解析は serde_json に任せ、出力は toJSON・replacer・インデントを扱う独自の書き出しで行う
// 関連ファイル: src/repl/globals.rs（loadJSON も同じ変換を使う）

use std::collections::HashSet;
use std::rc::Rc;

use runtime_heap::{number_to_string, Attributes, ObjectId, ObjectKind, Property, PropertyKey, Value};

use super::define_global;
use crate::interpreter::{arg, ErrorKind, Interpreter, JsResult};

impl Interpreter {
    /// serde_json の値をスクリプトの値へ変換する（キー順は保たれる）。
    pub(crate) fn json_to_value(&mut self, json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::string(s),
            serde_json::Value::Array(items) => {
                let values = items.iter().map(|item| self.json_to_value(item)).collect();
                Value::Object(self.create_array(values))
            }
            serde_json::Value::Object(map) => {
                let id = self.heap.alloc_ordinary();
                for (key, item) in map {
                    let v = self.json_to_value(item);
                    self.create_data_property(id, PropertyKey::string(key), v);
                }
                Value::Object(id)
            }
        }
    }

    /// JSON テキストを解釈する。構文エラーは SyntaxError として投げる。
    pub(crate) fn parse_json(&mut self, text: &str) -> JsResult<Value> {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(json) => Ok(self.json_to_value(&json)),
            Err(e) => Err(self.throw(ErrorKind::SyntaxError, format!("JSON.parse: {}", e))),
        }
    }
}

/// reviver を葉から順に適用する。
fn internalize(interp: &mut Interpreter, holder: ObjectId, key: PropertyKey, reviver: &Value) -> JsResult<Value> {
    let value = interp.get(&Value::Object(holder), &key)?;
    if let Value::Object(id) = value {
        let keys: Vec<Rc<str>> = match interp.heap.kind(id) {
            ObjectKind::Array { length } => (0..*length).map(|i| Rc::from(i.to_string())).collect(),
            _ => interp.own_enumerable_keys(id),
        };
        for k in keys {
            let child_key = PropertyKey::String(k);
            let revived = internalize(interp, id, child_key.clone(), reviver)?;
            if revived.is_undefined() {
                interp.delete_property(id, &child_key)?;
            } else {
                interp.create_data_property(id, child_key, revived);
            }
        }
    }
    let key_value = Interpreter::key_value(&key);
    interp.call(reviver, Value::Object(holder), &[key_value, value])
}

struct Stringifier {
    replacer: Option<Value>,
    allow_list: Option<Vec<Rc<str>>>,
    gap: String,
    stack: HashSet<ObjectId>,
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

impl Stringifier {
    fn serialize_property(
        &mut self,
        interp: &mut Interpreter,
        holder: ObjectId,
        key: &str,
        indent: &str,
    ) -> JsResult<Option<String>> {
        let mut value = interp.get(&Value::Object(holder), &PropertyKey::from(key))?;
        if value.is_object() || matches!(value, Value::BigInt(_)) {
            let to_json = interp.get_named(&value, "toJSON")?;
            if interp.heap.is_callable(&to_json) {
                value = interp.call(&to_json, value, &[Value::string(key)])?;
            }
        }
        if let Some(replacer) = self.replacer.clone() {
            value = interp.call(&replacer, Value::Object(holder), &[Value::string(key), value])?;
        }
        if let Value::Object(id) = value {
            let unwrapped = match interp.heap.kind(id) {
                ObjectKind::NumberObject(n) => Some(Value::Number(*n)),
                ObjectKind::StringObject(s) => Some(Value::String(s.clone())),
                ObjectKind::BooleanObject(b) => Some(Value::Boolean(*b)),
                _ => None,
            };
            if let Some(primitive) = unwrapped {
                value = primitive;
            }
        }
        match &value {
            Value::Null => Ok(Some("null".into())),
            Value::Boolean(b) => Ok(Some(b.to_string())),
            Value::String(s) => Ok(Some(quote(s))),
            Value::Number(n) if n.is_finite() => Ok(Some(number_to_string(*n))),
            Value::Number(_) => Ok(Some("null".into())),
            Value::BigInt(_) => Err(interp.type_error("Cannot serialize BigInt value to JSON")),
            Value::Object(id) if !interp.heap.is_callable(&value) => {
                let id = *id;
                if !self.stack.insert(id) {
                    return Err(interp.type_error("Converting circular structure to JSON"));
                }
                let inner = format!("{}{}", indent, self.gap);
                let result = if matches!(interp.heap.kind(id), ObjectKind::Array { .. }) {
                    self.serialize_array(interp, id, indent, &inner)
                } else {
                    self.serialize_object(interp, id, indent, &inner)
                };
                self.stack.remove(&id);
                result.map(Some)
            }
            _ => Ok(None),
        }
    }

    fn wrap(&self, open: char, close: char, parts: Vec<String>, indent: &str, inner: &str) -> String {
        if parts.is_empty() {
            return format!("{}{}", open, close);
        }
        if self.gap.is_empty() {
            return format!("{}{}{}", open, parts.join(","), close);
        }
        let sep = format!(",\n{}", inner);
        format!("{}\n{}{}\n{}{}", open, inner, parts.join(&sep), indent, close)
    }

    fn serialize_array(&mut self, interp: &mut Interpreter, id: ObjectId, indent: &str, inner: &str) -> JsResult<String> {
        let len = interp.length_of(&Value::Object(id))?;
        let mut parts = Vec::with_capacity(len);
        for i in 0..len {
            let item = self.serialize_property(interp, id, &i.to_string(), inner)?;
            parts.push(item.unwrap_or_else(|| "null".into()));
        }
        Ok(self.wrap('[', ']', parts, indent, inner))
    }

    fn serialize_object(&mut self, interp: &mut Interpreter, id: ObjectId, indent: &str, inner: &str) -> JsResult<String> {
        let keys = match &self.allow_list {
            Some(list) => list.clone(),
            None => interp.own_enumerable_keys(id),
        };
        let colon = if self.gap.is_empty() { ":" } else { ": " };
        let mut parts = Vec::new();
        for key in keys {
            if let Some(text) = self.serialize_property(interp, id, &key, inner)? {
                parts.push(format!("{}{}{}", quote(&key), colon, text));
            }
        }
        Ok(self.wrap('{', '}', parts, indent, inner))
    }
}

/// `JSON.stringify(value, replacer, space)` の本体。値が表現できなければ `None`。
fn stringify(interp: &mut Interpreter, value: Value, replacer: &Value, space: &Value) -> JsResult<Option<String>> {
    let mut stringifier = Stringifier {
        replacer: None,
        allow_list: None,
        gap: String::new(),
        stack: HashSet::new(),
    };
    if interp.heap.is_callable(replacer) {
        stringifier.replacer = Some(replacer.clone());
    } else if let Value::Object(id) = replacer {
        if matches!(interp.heap.kind(*id), ObjectKind::Array { .. }) {
            let mut list: Vec<Rc<str>> = Vec::new();
            for item in interp.array_like_to_vec(replacer)? {
                if matches!(item, Value::String(_) | Value::Number(_)) {
                    let s = interp.to_string(&item)?;
                    if !list.contains(&s) {
                        list.push(s);
                    }
                }
            }
            stringifier.allow_list = Some(list);
        }
    }
    stringifier.gap = match space {
        Value::Number(n) => " ".repeat(n.clamp(0.0, 10.0) as usize),
        Value::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    let wrapper = interp.heap.alloc_ordinary();
    interp
        .heap
        .object_mut(wrapper)
        .define(PropertyKey::from(""), Property::data(value, Attributes::DEFAULT));
    stringifier.serialize_property(interp, wrapper, "", "")
}

pub(super) fn install(interp: &mut Interpreter) {
    let json = interp.heap.alloc_ordinary();
    define_global(interp, "JSON", Value::Object(json));
    let tag = interp.well_known.to_string_tag;
    interp.heap.object_mut(json).define(
        PropertyKey::Symbol(tag),
        Property::data(Value::string("JSON"), Attributes::CONFIGURABLE),
    );

    interp.define_method(json, "parse", 2, |interp, _, args| {
        let text = interp.to_string(&arg(args, 0))?;
        let value = interp.parse_json(&text)?;
        let reviver = arg(args, 1);
        if !interp.heap.is_callable(&reviver) {
            return Ok(value);
        }
        let root = interp.heap.alloc_ordinary();
        interp.create_data_property(root, PropertyKey::from(""), value);
        internalize(interp, root, PropertyKey::from(""), &reviver)
    });
    interp.define_method(json, "stringify", 3, |interp, _, args| {
        let out = stringify(interp, arg(args, 0), &arg(args, 1), &arg(args, 2))?;
        Ok(out.map(Value::string).unwrap_or(Value::Undefined))
    });
}

#[cfg(test)]
mod tests {
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// キーの順序を保ったまま往復する。
    fn parse_preserves_order() {
        assert_eq!(eval_display("Object.keys(JSON.parse('{\"b\":1,\"a\":[1,2]}')).join()"), "b,a");
        assert_eq!(eval_display("JSON.stringify(JSON.parse('{\"b\":1,\"a\":[1,null,\"x\"]}'))"), "{\"b\":1,\"a\":[1,null,\"x\"]}");
    }

    #[test]
    /// 不正な JSON は SyntaxError。
    fn parse_errors() {
        assert!(eval_display("JSON.parse('{')").starts_with("throw SyntaxError: JSON.parse:"));
    }

    #[test]
    /// undefined と関数は省略され、配列中では null になる。
    fn omitted_values() {
        assert_eq!(eval_display("JSON.stringify({ a: undefined, b: () => 1, c: 2 })"), "{\"c\":2}");
        assert_eq!(eval_display("JSON.stringify([undefined, NaN])"), "[null,null]");
        assert_eq!(eval_display("JSON.stringify(undefined)"), "undefined");
    }

    #[test]
    /// インデント・replacer・toJSON。
    fn formatting_options() {
        assert_eq!(eval_display("JSON.stringify({ a: [1] }, null, 2)"), "{\n  \"a\": [\n    1\n  ]\n}");
        assert_eq!(eval_display("JSON.stringify({ a: 1, b: 2 }, ['b'])"), "{\"b\":2}");
        assert_eq!(eval_display("JSON.stringify({ toJSON() { return 'x'; } })"), "\"x\"");
        assert_eq!(eval_display("JSON.stringify({ n: 1 }, (k, v) => typeof v === 'number' ? v * 2 : v)"), "{\"n\":2}");
    }

    #[test]
    /// 循環参照は TypeError。
    fn circular() {
        assert_eq!(
            eval_display("const o = {}; o.o = o; JSON.stringify(o)"),
            "throw TypeError: Converting circular structure to JSON"
        );
    }

    #[test]
    /// reviver が葉から適用される。
    fn reviver() {
        assert_eq!(eval_display("JSON.parse('[1,2]', (k, v) => typeof v === 'number' ? v + 1 : v).join()"), "2,3");
    }
}
