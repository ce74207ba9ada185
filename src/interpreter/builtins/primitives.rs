// パス: src/interpreter/builtins/primitives.rs
// 役割: Number / Boolean / BigInt / Symbol のコンストラクタとプロトタイプ
// 関連ファイル: src/interpreter/ops.rs, runtime_heap/src/value.rs

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::{One, ToPrimitive, Zero};
use runtime_heap::{
    number_to_string, number_to_string_radix, ObjectKind, PropertyKey, SymbolId, Value,
};

use super::{define_constant, define_global, install_constructor};
use crate::interpreter::{arg, Interpreter, JsResult};

fn this_number(interp: &mut Interpreter, this: &Value, method: &str) -> JsResult<f64> {
    match this {
        Value::Number(n) => Ok(*n),
        Value::Object(id) => match interp.heap.kind(*id) {
            ObjectKind::NumberObject(n) => Ok(*n),
            _ => Err(interp.type_error(format!("Number.prototype.{} requires that 'this' be a Number", method))),
        },
        _ => Err(interp.type_error(format!("Number.prototype.{} requires that 'this' be a Number", method))),
    }
}

fn this_boolean(interp: &mut Interpreter, this: &Value, method: &str) -> JsResult<bool> {
    match this {
        Value::Boolean(b) => Ok(*b),
        Value::Object(id) => match interp.heap.kind(*id) {
            ObjectKind::BooleanObject(b) => Ok(*b),
            _ => Err(interp.type_error(format!("Boolean.prototype.{} requires that 'this' be a Boolean", method))),
        },
        _ => Err(interp.type_error(format!("Boolean.prototype.{} requires that 'this' be a Boolean", method))),
    }
}

fn radix_argument(interp: &mut Interpreter, value: &Value) -> JsResult<u32> {
    if value.is_undefined() {
        return Ok(10);
    }
    let radix = interp.to_integer(value)?;
    if !(2.0..=36.0).contains(&radix) {
        return Err(interp.range_error("toString() radix must be between 2 and 36"));
    }
    Ok(radix as u32)
}

/// `digits` 桁の固定小数点表記。
pub(crate) fn to_fixed(x: f64, digits: usize) -> String {
    if !x.is_finite() || x.abs() >= 1e21 {
        return number_to_string(x);
    }
    let s = format!("{:.*}", digits, x);
    if s.starts_with('-') && s[1..].chars().all(|c| c == '0' || c == '.') {
        return s[1..].to_string();
    }
    s
}

/// `{:e}` の指数部を JS 形式（`e+2` / `e-7`）へ直す。
fn js_exponent(formatted: &str) -> String {
    match formatted.split_once('e') {
        Some((mantissa, exp)) if exp.starts_with('-') => format!("{}e{}", mantissa, exp),
        Some((mantissa, exp)) => format!("{}e+{}", mantissa, exp),
        None => formatted.to_string(),
    }
}

fn to_precision(x: f64, precision: usize) -> String {
    if !x.is_finite() {
        return number_to_string(x);
    }
    if x == 0.0 {
        return to_fixed(0.0, precision - 1);
    }
    let sci = format!("{:.*e}", precision - 1, x);
    let exponent: i32 = sci
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);
    if exponent < -6 || exponent >= precision as i32 {
        return js_exponent(&sci);
    }
    to_fixed(x, (precision as i32 - 1 - exponent).max(0) as usize)
}

/// 先頭の空白を除いた文字列から整数を読む。
pub(super) fn parse_int(input: &str, radix: f64) -> f64 {
    let s = input.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut radix = if radix.is_nan() { 0 } else { radix as i64 };
    let mut digits = s;
    if radix == 0 || radix == 16 {
        if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            digits = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let mut value = 0.0f64;
    let mut any = false;
    for c in digits.chars() {
        let Some(d) = c.to_digit(radix as u32) else {
            break;
        };
        value = value * radix as f64 + d as f64;
        any = true;
    }
    if !any {
        return f64::NAN;
    }
    if negative {
        -value
    } else {
        value
    }
}

/// 先頭から読める最長の 10 進数リテラルを解釈する。
pub(super) fn parse_float(input: &str) -> f64 {
    let s = input.trim_start();
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    if body.starts_with("Infinity") {
        return if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut has_digits = end > int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut e = frac_start;
        while bytes.get(e).is_some_and(u8::is_ascii_digit) {
            e += 1;
        }
        if e > frac_start || has_digits {
            has_digits = true;
            end = e;
        }
    }
    if !has_digits {
        return f64::NAN;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut e = end + 1;
        if matches!(bytes.get(e), Some(b'+' | b'-')) {
            e += 1;
        }
        let exp_start = e;
        while bytes.get(e).is_some_and(u8::is_ascii_digit) {
            e += 1;
        }
        if e > exp_start {
            end = e;
        }
    }
    s[..end].parse().unwrap_or(f64::NAN)
}

fn number_to_bigint(interp: &mut Interpreter, n: f64) -> JsResult<BigInt> {
    if n.fract() != 0.0 || !n.is_finite() {
        return Err(interp.range_error(format!(
            "{} cannot be converted to a BigInt because it is not an integer",
            number_to_string(n)
        )));
    }
    Ok(BigInt::from(n as i128))
}

fn install_number(interp: &mut Interpreter) {
    let proto = interp.new_prototype("Number", ObjectKind::NumberObject(0.0));
    let ctor = install_constructor(interp, "Number", 1, proto, |interp, _, args| {
        let n = match args.first() {
            None => 0.0,
            Some(v) => match interp.to_numeric(v)? {
                Value::BigInt(b) => b.to_f64().unwrap_or(f64::NAN),
                other => interp.to_number(&other)?,
            },
        };
        if interp.is_constructing() {
            let proto = interp.constructing_prototype("Number");
            return Ok(Value::Object(interp.heap.alloc(ObjectKind::NumberObject(n), Some(proto))));
        }
        Ok(Value::Number(n))
    });

    define_constant(interp, ctor, "MAX_SAFE_INTEGER", Value::Number(9_007_199_254_740_991.0));
    define_constant(interp, ctor, "MIN_SAFE_INTEGER", Value::Number(-9_007_199_254_740_991.0));
    define_constant(interp, ctor, "EPSILON", Value::Number(f64::EPSILON));
    define_constant(interp, ctor, "MAX_VALUE", Value::Number(f64::MAX));
    define_constant(interp, ctor, "MIN_VALUE", Value::Number(5e-324));
    define_constant(interp, ctor, "POSITIVE_INFINITY", Value::Number(f64::INFINITY));
    define_constant(interp, ctor, "NEGATIVE_INFINITY", Value::Number(f64::NEG_INFINITY));
    define_constant(interp, ctor, "NaN", Value::Number(f64::NAN));

    interp.define_method(ctor, "isInteger", 1, |_, _, args| {
        Ok(Value::Boolean(matches!(arg(args, 0), Value::Number(n) if n.is_finite() && n.fract() == 0.0)))
    });
    interp.define_method(ctor, "isSafeInteger", 1, |_, _, args| {
        Ok(Value::Boolean(matches!(
            arg(args, 0),
            Value::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() <= 9_007_199_254_740_991.0
        )))
    });
    interp.define_method(ctor, "isFinite", 1, |_, _, args| {
        Ok(Value::Boolean(matches!(arg(args, 0), Value::Number(n) if n.is_finite())))
    });
    interp.define_method(ctor, "isNaN", 1, |_, _, args| {
        Ok(Value::Boolean(matches!(arg(args, 0), Value::Number(n) if n.is_nan())))
    });
    let parse_int_fn = interp.define_method(ctor, "parseInt", 2, |interp, _, args| {
        let s = interp.to_string(&arg(args, 0))?;
        let radix = match arg(args, 1) {
            Value::Undefined => 0.0,
            r => interp.to_integer(&r)?,
        };
        Ok(Value::Number(parse_int(&s, radix)))
    });
    let parse_float_fn = interp.define_method(ctor, "parseFloat", 1, |interp, _, args| {
        let s = interp.to_string(&arg(args, 0))?;
        Ok(Value::Number(parse_float(&s)))
    });
    define_global(interp, "parseInt", Value::Object(parse_int_fn));
    define_global(interp, "parseFloat", Value::Object(parse_float_fn));

    interp.define_method(proto, "toString", 1, |interp, this, args| {
        let n = this_number(interp, &this, "toString")?;
        let radix = radix_argument(interp, &arg(args, 0))?;
        Ok(Value::string(number_to_string_radix(n, radix)))
    });
    interp.define_method(proto, "toLocaleString", 0, |interp, this, _| {
        let n = this_number(interp, &this, "toLocaleString")?;
        Ok(Value::string(number_to_string(n)))
    });
    interp.define_method(proto, "valueOf", 0, |interp, this, _| {
        this_number(interp, &this, "valueOf").map(Value::Number)
    });
    interp.define_method(proto, "toFixed", 1, |interp, this, args| {
        let n = this_number(interp, &this, "toFixed")?;
        let digits = interp.to_integer(&arg(args, 0))?;
        if !(0.0..=100.0).contains(&digits) {
            return Err(interp.range_error("toFixed() digits argument must be between 0 and 100"));
        }
        Ok(Value::string(to_fixed(n, digits as usize)))
    });
    interp.define_method(proto, "toPrecision", 1, |interp, this, args| {
        let n = this_number(interp, &this, "toPrecision")?;
        if arg(args, 0).is_undefined() {
            return Ok(Value::string(number_to_string(n)));
        }
        let p = interp.to_integer(&arg(args, 0))?;
        if !(1.0..=100.0).contains(&p) {
            return Err(interp.range_error("toPrecision() argument must be between 1 and 100"));
        }
        Ok(Value::string(to_precision(n, p as usize)))
    });
    interp.define_method(proto, "toExponential", 1, |interp, this, args| {
        let n = this_number(interp, &this, "toExponential")?;
        if !n.is_finite() {
            return Ok(Value::string(number_to_string(n)));
        }
        let formatted = match arg(args, 0) {
            Value::Undefined => format!("{:e}", n),
            d => {
                let d = interp.to_integer(&d)?;
                if !(0.0..=100.0).contains(&d) {
                    return Err(interp.range_error("toExponential() argument must be between 0 and 100"));
                }
                format!("{:.*e}", d as usize, n)
            }
        };
        Ok(Value::string(js_exponent(&formatted)))
    });
}

fn install_boolean(interp: &mut Interpreter) {
    let proto = interp.new_prototype("Boolean", ObjectKind::BooleanObject(false));
    install_constructor(interp, "Boolean", 1, proto, |interp, _, args| {
        let b = interp.to_boolean(&arg(args, 0));
        if interp.is_constructing() {
            let proto = interp.constructing_prototype("Boolean");
            return Ok(Value::Object(interp.heap.alloc(ObjectKind::BooleanObject(b), Some(proto))));
        }
        Ok(Value::Boolean(b))
    });
    interp.define_method(proto, "toString", 0, |interp, this, _| {
        Ok(Value::string(this_boolean(interp, &this, "toString")?.to_string()))
    });
    interp.define_method(proto, "valueOf", 0, |interp, this, _| {
        this_boolean(interp, &this, "valueOf").map(Value::Boolean)
    });
}

fn install_bigint(interp: &mut Interpreter) {
    let proto = interp.new_prototype("BigInt", ObjectKind::Ordinary);
    let ctor = install_constructor(interp, "BigInt", 1, proto, |interp, _, args| {
        if interp.is_constructing() {
            return Err(interp.type_error("BigInt is not a constructor"));
        }
        let prim = interp.to_primitive(arg(args, 0), crate::interpreter::ops::Hint::Number)?;
        match prim {
            Value::Number(n) => number_to_bigint(interp, n).map(Value::bigint),
            other => interp.to_bigint(&other).map(Value::bigint),
        }
    });
    interp.define_method(ctor, "asIntN", 2, |interp, _, args| {
        let bits = interp.to_integer(&arg(args, 0))?.max(0.0) as u32;
        let n = interp.to_bigint(&arg(args, 1))?;
        if bits == 0 {
            return Ok(Value::bigint(BigInt::zero()));
        }
        let modulus = BigInt::one() << bits;
        let mut r = ((n % &modulus) + &modulus) % &modulus;
        if r >= (BigInt::one() << (bits - 1)) {
            r -= modulus;
        }
        Ok(Value::bigint(r))
    });
    interp.define_method(ctor, "asUintN", 2, |interp, _, args| {
        let bits = interp.to_integer(&arg(args, 0))?.max(0.0) as u32;
        let n = interp.to_bigint(&arg(args, 1))?;
        let modulus = BigInt::one() << bits;
        Ok(Value::bigint(((n % &modulus) + &modulus) % &modulus))
    });
    interp.define_method(proto, "toString", 0, |interp, this, args| {
        let Value::BigInt(b) = this else {
            return Err(interp.type_error("BigInt.prototype.toString requires that 'this' be a BigInt"));
        };
        let radix = radix_argument(interp, &arg(args, 0))?;
        Ok(Value::string(b.to_str_radix(radix)))
    });
    interp.define_method(proto, "valueOf", 0, |interp, this, _| match this {
        Value::BigInt(_) => Ok(this),
        _ => Err(interp.type_error("BigInt.prototype.valueOf requires that 'this' be a BigInt")),
    });
    interp.define_method(proto, "toLocaleString", 0, |interp, this, _| match &this {
        Value::BigInt(b) => Ok(Value::string(b.to_string())),
        _ => Err(interp.type_error("BigInt.prototype.toLocaleString requires that 'this' be a BigInt")),
    });
}

fn install_symbol(interp: &mut Interpreter) {
    let proto = interp.new_prototype("Symbol", ObjectKind::Ordinary);
    let ctor = interp.native_function("Symbol", 0, |interp, _, args| {
        let description = match arg(args, 0) {
            Value::Undefined => None,
            v => Some(interp.to_string(&v)?),
        };
        Ok(Value::Symbol(interp.heap.new_symbol(description.as_deref())))
    });
    interp.define_value(ctor, "prototype", Value::Object(proto));
    interp.define_value(proto, "constructor", Value::Object(ctor));
    define_global(interp, "Symbol", Value::Object(ctor));

    let well_known = interp.well_known;
    for (name, id) in [
        ("iterator", well_known.iterator),
        ("asyncIterator", well_known.async_iterator),
        ("toStringTag", well_known.to_string_tag),
        ("hasInstance", well_known.has_instance),
    ] {
        define_constant(interp, ctor, name, Value::Symbol(id));
    }

    let registry: Rc<RefCell<HashMap<String, SymbolId>>> = Rc::default();
    let for_registry = registry.clone();
    interp.define_method(ctor, "for", 1, move |interp, _, args| {
        let key = interp.to_string(&arg(args, 0))?.to_string();
        if let Some(id) = for_registry.borrow().get(&key) {
            return Ok(Value::Symbol(*id));
        }
        let id = interp.heap.new_symbol(Some(&key));
        for_registry.borrow_mut().insert(key, id);
        Ok(Value::Symbol(id))
    });
    interp.define_method(ctor, "keyFor", 1, move |interp, _, args| {
        let Value::Symbol(id) = arg(args, 0) else {
            let shown = interp.heap.display_string(&arg(args, 0));
            return Err(interp.type_error(format!("{} is not a symbol", shown)));
        };
        let found = registry
            .borrow()
            .iter()
            .find(|(_, v)| **v == id)
            .map(|(k, _)| Value::string(k));
        Ok(found.unwrap_or(Value::Undefined))
    });

    interp.define_method(proto, "toString", 0, |interp, this, _| match this {
        Value::Symbol(id) => Ok(Value::string(interp.heap.key_display(&PropertyKey::Symbol(id)))),
        _ => Err(interp.type_error("Symbol.prototype.toString requires that 'this' be a Symbol")),
    });
    interp.define_method(proto, "valueOf", 0, |interp, this, _| match this {
        Value::Symbol(_) => Ok(this),
        _ => Err(interp.type_error("Symbol.prototype.valueOf requires that 'this' be a Symbol")),
    });
    interp.define_getter(proto, "description", |interp, this, _| match this {
        Value::Symbol(id) => Ok(interp
            .heap
            .symbol_description(id)
            .map(Value::string)
            .unwrap_or(Value::Undefined)),
        _ => Err(interp.type_error("Symbol.prototype.description requires that 'this' be a Symbol")),
    });
    let tag = well_known.to_string_tag;
    interp.heap.object_mut(proto).define(
        PropertyKey::Symbol(tag),
        runtime_heap::Property::data(Value::string("Symbol"), runtime_heap::Attributes::CONFIGURABLE),
    );
}

pub(super) fn install(interp: &mut Interpreter) {
    install_number(interp);
    install_boolean(interp);
    install_bigint(interp);
    install_symbol(interp);
}

#[cfg(test)]
mod tests {
    use super::{parse_float, parse_int, to_fixed, to_precision};
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// parseInt / parseFloat の接頭辞解釈。
    fn parsing_prefixes() {
        assert_eq!(parse_int("  42px", 0.0), 42.0);
        assert_eq!(parse_int("0x1f", 0.0), 31.0);
        assert_eq!(parse_int("-101", 2.0), -5.0);
        assert!(parse_int("zz", 10.0).is_nan());
        assert_eq!(parse_float("3.5e2abc"), 350.0);
        assert_eq!(parse_float(".5"), 0.5);
        assert_eq!(parse_float("-Infinityx"), f64::NEG_INFINITY);
        assert!(parse_float("e5").is_nan());
    }

    #[test]
    /// 固定小数点と有効桁数の書式。
    fn fixed_and_precision() {
        assert_eq!(to_fixed(3.14159, 2), "3.14");
        assert_eq!(to_fixed(-0.0001, 2), "0.00");
        assert_eq!(to_precision(123.456, 4), "123.5");
        assert_eq!(to_precision(0.000001234, 2), "0.0000012");
        assert_eq!(to_precision(123456.0, 2), "1.2e+5");
    }

    #[test]
    /// 基数付き toString と BigInt 変換。
    fn radix_and_bigint() {
        assert_eq!(eval_display("(255).toString(16)"), "ff");
        assert_eq!(eval_display("BigInt(10) * 3n"), "30");
        assert_eq!(
            eval_display("BigInt(1.5)"),
            "throw RangeError: 1.5 cannot be converted to a BigInt because it is not an integer"
        );
        assert_eq!(eval_display("BigInt.asUintN(8, 257n)"), "1");
    }

    #[test]
    /// Symbol.for は同じキーに同じシンボルを返す。
    fn symbol_registry() {
        assert_eq!(eval_display("Symbol.for('k') === Symbol.for('k')"), "true");
        assert_eq!(eval_display("Symbol('a') === Symbol('a')"), "false");
        assert_eq!(eval_display("Symbol.keyFor(Symbol.for('z'))"), "z");
        assert_eq!(eval_display("Symbol('d').description"), "d");
    }

    #[test]
    /// ラッパオブジェクトの valueOf。
    fn wrappers() {
        assert_eq!(eval_display("new Number(5) + 1"), "6");
        assert_eq!(eval_display("typeof new Boolean(false)"), "object");
        assert_eq!(eval_display("Number('  12  ') + Number(true)"), "13");
    }
}
