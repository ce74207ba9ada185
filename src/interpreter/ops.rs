// パス: src/interpreter/ops.rs
// 役割: 型変換（ToPrimitive / ToNumber / ToString など）と二項演算子の意味論を実装する
// 意図: 評価器・組み込み関数・バイトコード VM が同じ変換規則を共有できるようにする
// 関連ファイル: src/interpreter/eval.rs, src/bytecode/vm.rs

use std::cmp::Ordering;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use runtime_heap::{number_to_string, ObjectId, ObjectKind, PropertyKey, Value};

use super::{Interpreter, JsResult};
use crate::ast::BinaryOp;

/// ToPrimitive のヒント。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Hint {
    Default,
    Number,
    String,
}

impl Interpreter {
    pub(crate) fn to_boolean(&self, value: &Value) -> bool {
        match value {
            Value::Empty | Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => !(n.is_nan() || *n == 0.0),
            Value::BigInt(b) => !b.is_zero(),
            Value::String(s) => !s.is_empty(),
            Value::Symbol(_) | Value::Object(_) => true,
        }
    }

    pub(crate) fn to_primitive(&mut self, value: Value, hint: Hint) -> JsResult<Value> {
        let Value::Object(id) = value else {
            return Ok(value);
        };
        let hint = match (hint, self.heap.kind(id)) {
            (Hint::Default, ObjectKind::Date(_)) => Hint::String,
            (h, _) => h,
        };
        let order: [&str; 2] = if hint == Hint::String {
            ["toString", "valueOf"]
        } else {
            ["valueOf", "toString"]
        };
        for name in order {
            let method = self.get(&Value::Object(id), &PropertyKey::from(name))?;
            if self.heap.is_callable(&method) {
                let result = self.call(&method, Value::Object(id), &[])?;
                if !result.is_object() {
                    return Ok(result);
                }
            }
        }
        Err(self.type_error("Cannot convert object to primitive value"))
    }

    pub(crate) fn to_number(&mut self, value: &Value) -> JsResult<f64> {
        match value {
            Value::Empty | Value::Undefined => Ok(f64::NAN),
            Value::Null => Ok(0.0),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => Ok(*n),
            Value::String(s) => Ok(string_to_number(s)),
            Value::BigInt(_) => Err(self.type_error("Cannot convert BigInt to number")),
            Value::Symbol(_) => Err(self.type_error("Cannot convert symbol to number")),
            Value::Object(_) => {
                let prim = self.to_primitive(value.clone(), Hint::Number)?;
                self.to_number(&prim)
            }
        }
    }

    /// 数値か BigInt のどちらかへ変換する。
    pub(crate) fn to_numeric(&mut self, value: &Value) -> JsResult<Value> {
        let prim = self.to_primitive(value.clone(), Hint::Number)?;
        if let Value::BigInt(_) = prim {
            return Ok(prim);
        }
        Ok(Value::Number(self.to_number(&prim)?))
    }

    /// ToIntegerOrInfinity。
    pub(crate) fn to_integer(&mut self, value: &Value) -> JsResult<f64> {
        let n = self.to_number(value)?;
        if n.is_nan() {
            return Ok(0.0);
        }
        Ok(n.trunc())
    }

    /// ToBigInt。数値からの暗黙変換は許さない。
    pub(crate) fn to_bigint(&mut self, value: &Value) -> JsResult<BigInt> {
        let prim = self.to_primitive(value.clone(), Hint::Number)?;
        match &prim {
            Value::BigInt(b) => Ok((**b).clone()),
            Value::Boolean(b) => Ok(BigInt::from(*b as u8)),
            Value::String(s) => match string_to_bigint(s) {
                Some(b) => Ok(b),
                None => Err(self.throw(
                    super::ErrorKind::SyntaxError,
                    format!("Cannot convert {} to a BigInt", s),
                )),
            },
            other => {
                let msg = format!("Cannot convert {} to a BigInt", self.heap.display_string(other));
                Err(self.type_error(msg))
            }
        }
    }

    pub(crate) fn to_string(&mut self, value: &Value) -> JsResult<Rc<str>> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Symbol(_) => Err(self.type_error("Cannot convert a Symbol value to a string")),
            Value::Object(_) => {
                let prim = self.to_primitive(value.clone(), Hint::String)?;
                self.to_string(&prim)
            }
            other => Ok(Rc::from(self.heap.display_string(other))),
        }
    }

    pub(crate) fn to_object(&mut self, value: &Value) -> JsResult<ObjectId> {
        let (kind, proto) = match value {
            Value::Object(id) => return Ok(*id),
            Value::Empty | Value::Undefined | Value::Null => {
                return Err(self.type_error(format!(
                    "ToObject on null or undefined ({})",
                    self.heap.display_string(value)
                )))
            }
            Value::Boolean(b) => (ObjectKind::BooleanObject(*b), "Boolean"),
            Value::Number(n) => (ObjectKind::NumberObject(*n), "Number"),
            Value::String(s) => (ObjectKind::StringObject(s.clone()), "String"),
            Value::BigInt(_) => (ObjectKind::Ordinary, "BigInt"),
            Value::Symbol(_) => (ObjectKind::Ordinary, "Symbol"),
        };
        let proto = self.prototype(proto);
        Ok(self.heap.alloc(kind, Some(proto)))
    }

    pub(crate) fn to_property_key(&mut self, value: &Value) -> JsResult<PropertyKey> {
        match value {
            Value::Symbol(s) => Ok(PropertyKey::Symbol(*s)),
            Value::String(s) => Ok(PropertyKey::String(s.clone())),
            Value::Number(n) => Ok(PropertyKey::string(number_to_string(*n))),
            other => {
                let prim = self.to_primitive(other.clone(), Hint::String)?;
                if let Value::Symbol(s) = prim {
                    return Ok(PropertyKey::Symbol(s));
                }
                Ok(PropertyKey::String(self.to_string(&prim)?))
            }
        }
    }

    pub(crate) fn typeof_value(&self, value: &Value) -> &'static str {
        match value {
            Value::Empty | Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Object(_) if self.heap.is_callable(value) => "function",
            Value::Object(_) => "object",
        }
    }

    pub(crate) fn loose_equals(&mut self, a: &Value, b: &Value) -> JsResult<bool> {
        use Value::*;
        Ok(match (a, b) {
            (Undefined | Null | Empty, Undefined | Null | Empty) => true,
            (Undefined | Null | Empty, _) | (_, Undefined | Null | Empty) => false,
            (Number(x), String(s)) | (String(s), Number(x)) => *x == string_to_number(s),
            (BigInt(x), String(s)) | (String(s), BigInt(x)) => {
                string_to_bigint(s).is_some_and(|y| **x == y)
            }
            (BigInt(x), Number(y)) | (Number(y), BigInt(x)) => {
                y.fract() == 0.0 && y.is_finite() && x.to_f64() == Some(*y)
            }
            (Boolean(x), other) | (other, Boolean(x)) => {
                let n = Number(if *x { 1.0 } else { 0.0 });
                let other = other.clone();
                return self.loose_equals(&n, &other);
            }
            (Object(_), Object(_)) => a.strict_equals(b),
            (Object(_), _) => {
                let prim = self.to_primitive(a.clone(), Hint::Default)?;
                return self.loose_equals(&prim, b);
            }
            (_, Object(_)) => {
                let prim = self.to_primitive(b.clone(), Hint::Default)?;
                return self.loose_equals(a, &prim);
            }
            _ => a.strict_equals(b),
        })
    }

    /// 抽象関係比較。`None` は比較不能（NaN を含む）。
    fn compare(&mut self, a: &Value, b: &Value) -> JsResult<Option<Ordering>> {
        let pa = self.to_primitive(a.clone(), Hint::Number)?;
        let pb = self.to_primitive(b.clone(), Hint::Number)?;
        if let (Value::String(x), Value::String(y)) = (&pa, &pb) {
            return Ok(Some(x.encode_utf16().cmp(y.encode_utf16())));
        }
        let na = self.to_numeric(&pa)?;
        let nb = self.to_numeric(&pb)?;
        Ok(match (&na, &nb) {
            (Value::BigInt(x), Value::BigInt(y)) => Some(x.cmp(y)),
            (Value::BigInt(x), Value::Number(y)) => x.to_f64().and_then(|x| x.partial_cmp(y)),
            (Value::Number(x), Value::BigInt(y)) => y.to_f64().and_then(|y| x.partial_cmp(&y)),
            (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
            _ => None,
        })
    }

    pub(crate) fn binary_op(&mut self, op: BinaryOp, a: &Value, b: &Value) -> JsResult<Value> {
        match op {
            BinaryOp::Add => {
                let pa = self.to_primitive(a.clone(), Hint::Default)?;
                let pb = self.to_primitive(b.clone(), Hint::Default)?;
                if matches!(pa, Value::String(_)) || matches!(pb, Value::String(_)) {
                    let sa = self.to_string(&pa)?;
                    let sb = self.to_string(&pb)?;
                    let mut out = String::with_capacity(sa.len() + sb.len());
                    out.push_str(&sa);
                    out.push_str(&sb);
                    return Ok(Value::string(out));
                }
                self.numeric_op(op, &pa, &pb)
            }
            BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Mod
            | BinaryOp::Exp
            | BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::BitXor
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::UShr => self.numeric_op(op, a, b),
            BinaryOp::Eq => Ok(Value::Boolean(self.loose_equals(a, b)?)),
            BinaryOp::NotEq => Ok(Value::Boolean(!self.loose_equals(a, b)?)),
            BinaryOp::StrictEq => Ok(Value::Boolean(a.strict_equals(b))),
            BinaryOp::StrictNotEq => Ok(Value::Boolean(!a.strict_equals(b))),
            BinaryOp::Lt => Ok(Value::Boolean(self.compare(a, b)? == Some(Ordering::Less))),
            BinaryOp::Gt => Ok(Value::Boolean(self.compare(a, b)? == Some(Ordering::Greater))),
            BinaryOp::LtEq => Ok(Value::Boolean(matches!(
                self.compare(a, b)?,
                Some(Ordering::Less | Ordering::Equal)
            ))),
            BinaryOp::GtEq => Ok(Value::Boolean(matches!(
                self.compare(a, b)?,
                Some(Ordering::Greater | Ordering::Equal)
            ))),
            BinaryOp::In => {
                let Value::Object(target) = b else {
                    return Err(self.type_error(format!(
                        "'in' operator must be used on an object, got {}",
                        self.heap.display_string(b)
                    )));
                };
                let key = self.to_property_key(a)?;
                Ok(Value::Boolean(self.has_property(*target, &key)?))
            }
            BinaryOp::Instanceof => Ok(Value::Boolean(self.instance_of(a, b)?)),
        }
    }

    fn numeric_op(&mut self, op: BinaryOp, a: &Value, b: &Value) -> JsResult<Value> {
        let na = self.to_numeric(a)?;
        let nb = self.to_numeric(b)?;
        match (&na, &nb) {
            (Value::Number(x), Value::Number(y)) => Ok(Value::Number(number_op(op, *x, *y))),
            (Value::BigInt(x), Value::BigInt(y)) => self.bigint_op(op, x, y),
            _ => Err(self.type_error("Cannot mix BigInt and other types, use explicit conversions")),
        }
    }

    fn bigint_op(&mut self, op: BinaryOp, x: &BigInt, y: &BigInt) -> JsResult<Value> {
        let result = match op {
            BinaryOp::Add => x + y,
            BinaryOp::Sub => x - y,
            BinaryOp::Mul => x * y,
            BinaryOp::Div | BinaryOp::Mod if y.is_zero() => {
                return Err(self.range_error("Division by zero"))
            }
            BinaryOp::Div => x / y,
            BinaryOp::Mod => x % y,
            BinaryOp::Exp => {
                if y.is_negative() {
                    return Err(self.range_error("Exponent must be positive"));
                }
                let Some(exp) = y.to_u32() else {
                    return Err(self.range_error("Maximum BigInt size exceeded"));
                };
                num_traits::pow(x.clone(), exp as usize)
            }
            BinaryOp::BitAnd => x & y,
            BinaryOp::BitOr => x | y,
            BinaryOp::BitXor => x ^ y,
            BinaryOp::Shl | BinaryOp::Shr => {
                let Some(mut shift) = y.to_i64() else {
                    return Err(self.range_error("Maximum BigInt size exceeded"));
                };
                if op == BinaryOp::Shr {
                    shift = -shift;
                }
                if shift >= 0 {
                    x << (shift as usize)
                } else {
                    x >> ((-shift) as usize)
                }
            }
            BinaryOp::UShr => {
                return Err(self.type_error("Cannot use unsigned right shift on BigInt"))
            }
            _ => return Err(self.type_error("Invalid BigInt operation")),
        };
        Ok(Value::bigint(result))
    }

    pub(crate) fn instance_of(&mut self, value: &Value, target: &Value) -> JsResult<bool> {
        let Value::Object(mut ctor) = target else {
            return Err(self.type_error(format!(
                "Right-hand side of 'instanceof' is not an object ({})",
                self.heap.display_string(target)
            )));
        };
        if !self.heap.is_callable(target) {
            return Err(self.type_error("Right-hand side of 'instanceof' is not callable"));
        }
        if let ObjectKind::BoundFunction { target, .. } = self.heap.kind(ctor) {
            ctor = *target;
        }
        let Value::Object(mut current) = value else {
            return Ok(false);
        };
        let proto = self.get(&Value::Object(ctor), &PropertyKey::from("prototype"))?;
        let Value::Object(proto) = proto else {
            return Err(self.type_error("Function has non-object prototype in instanceof check"));
        };
        let mut steps = 0;
        while let Some(p) = self.heap.prototype_of(current) {
            if p == proto {
                return Ok(true);
            }
            current = p;
            steps += 1;
            if steps > 10_000 {
                break;
            }
        }
        Ok(false)
    }

    /// 例外値を「名前: メッセージ」の形で説明する（ゲッターは呼ばない）。
    pub fn describe_error(&self, value: &Value) -> String {
        let Value::Object(id) = value else {
            return self.heap.display_string(value);
        };
        let read = |key: &str| {
            self.heap
                .get_without_side_effects(*id, &PropertyKey::from(key))
                .ok()
                .flatten()
                .map(|v| self.heap.display_string(&v))
                .unwrap_or_default()
        };
        let name = read("name");
        let message = read("message");
        match (name.is_empty(), message.is_empty()) {
            (_, true) if name.is_empty() => self.heap.display_string(value),
            (_, true) => name,
            (true, false) => message,
            (false, false) => format!("{}: {}", name, message),
        }
    }
}

pub(crate) fn number_op(op: BinaryOp, x: f64, y: f64) -> f64 {
    match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::Mod => x % y,
        BinaryOp::Exp => {
            if y.is_nan() || (x.abs() == 1.0 && y.is_infinite()) {
                f64::NAN
            } else {
                x.powf(y)
            }
        }
        BinaryOp::BitAnd => (to_int32(x) & to_int32(y)) as f64,
        BinaryOp::BitOr => (to_int32(x) | to_int32(y)) as f64,
        BinaryOp::BitXor => (to_int32(x) ^ to_int32(y)) as f64,
        BinaryOp::Shl => to_int32(x).wrapping_shl(to_uint32(y) & 31) as f64,
        BinaryOp::Shr => (to_int32(x) >> (to_uint32(y) & 31)) as f64,
        BinaryOp::UShr => (to_uint32(x) >> (to_uint32(y) & 31)) as f64,
        _ => f64::NAN,
    }
}

pub(crate) fn to_uint32(x: f64) -> u32 {
    if !x.is_finite() {
        return 0;
    }
    x.trunc().rem_euclid(4294967296.0) as u32
}

pub(crate) fn to_int32(x: f64) -> i32 {
    to_uint32(x) as i32
}

/// 文字列から数値への変換（StringToNumber）。
pub(crate) fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    let radix = |prefix: &[&str], radix: u32| -> Option<f64> {
        for p in prefix {
            if let Some(rest) = t.strip_prefix(p) {
                return Some(
                    u64::from_str_radix(rest, radix)
                        .map(|v| v as f64)
                        .unwrap_or(f64::NAN),
                );
            }
        }
        None
    };
    if let Some(v) = radix(&["0x", "0X"], 16)
        .or_else(|| radix(&["0o", "0O"], 8))
        .or_else(|| radix(&["0b", "0B"], 2))
    {
        return v;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if !t
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

pub(crate) fn string_to_bigint(s: &str) -> Option<BigInt> {
    let t = s.trim();
    if t.is_empty() {
        return Some(BigInt::zero());
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(rest) = t.strip_prefix(prefix) {
            return BigInt::parse_bytes(rest.as_bytes(), radix);
        }
    }
    t.parse::<BigInt>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// 文字列からの数値変換規則。
    fn string_number_conversion() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x1f"), 31.0);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("12px").is_nan());
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
    }

    #[test]
    /// 32 ビット整数への切り詰め。
    fn int32_wraps() {
        assert_eq!(to_int32(4294967297.0), 1);
        assert_eq!(to_int32(-1.0), -1);
        assert_eq!(to_uint32(-1.0), 4294967295);
    }

    #[test]
    /// 緩い等価と加算の型変換。
    fn loose_equality_and_addition() {
        assert_eq!(eval_display("1 == '1'"), "true");
        assert_eq!(eval_display("null == undefined"), "true");
        assert_eq!(eval_display("null == 0"), "false");
        assert_eq!(eval_display("[1,2] + ''"), "1,2");
        assert_eq!(eval_display("1n + 2n"), "3");
        assert_eq!(
            eval_display("1n + 1"),
            "throw TypeError: Cannot mix BigInt and other types, use explicit conversions"
        );
    }

    #[test]
    /// 文字列の大小比較はコード単位順。
    fn string_comparison() {
        assert_eq!(eval_display("'a' < 'b'"), "true");
        assert_eq!(eval_display("'10' < '9'"), "true");
        assert_eq!(eval_display("10 < 9"), "false");
    }
}
