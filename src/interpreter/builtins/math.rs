// パス: src/interpreter/builtins/math.rs
// 役割: Math 名前空間オブジェクト

use runtime_heap::{Attributes, Property, PropertyKey, Value};

use super::{define_constant, define_global};
use crate::interpreter::ops::{to_int32, to_uint32};
use crate::interpreter::{arg, Interpreter, JsResult};

fn unary(interp: &mut Interpreter, target: runtime_heap::ObjectId, name: &str, f: fn(f64) -> f64) {
    interp.define_method(target, name, 1, move |interp, _, args| {
        let x = interp.to_number(&arg(args, 0))?;
        Ok(Value::Number(f(x)))
    });
}

fn numbers(interp: &mut Interpreter, args: &[Value]) -> JsResult<Vec<f64>> {
    let mut out = Vec::with_capacity(args.len());
    for a in args {
        out.push(interp.to_number(a)?);
    }
    Ok(out)
}

/// 0.5 ちょうどは正の無限大方向へ丸める。
fn js_round(x: f64) -> f64 {
    if !x.is_finite() || x.fract() == 0.0 {
        return x;
    }
    let r = (x + 0.5).floor();
    if r == 0.0 && x < 0.0 {
        -0.0
    } else {
        r
    }
}

pub(super) fn install(interp: &mut Interpreter) {
    let math = interp.heap.alloc_ordinary();
    define_global(interp, "Math", Value::Object(math));

    for (name, value) in [
        ("PI", std::f64::consts::PI),
        ("E", std::f64::consts::E),
        ("LN2", std::f64::consts::LN_2),
        ("LN10", std::f64::consts::LN_10),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("SQRT2", std::f64::consts::SQRT_2),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
    ] {
        define_constant(interp, math, name, Value::Number(value));
    }
    let tag = interp.well_known.to_string_tag;
    interp.heap.object_mut(math).define(
        PropertyKey::Symbol(tag),
        Property::data(Value::string("Math"), Attributes::CONFIGURABLE),
    );

    let table: [(&str, fn(f64) -> f64); 26] = [
        ("abs", f64::abs),
        ("floor", f64::floor),
        ("ceil", f64::ceil),
        ("trunc", f64::trunc),
        ("round", js_round),
        ("sign", |x| if x.is_nan() || x == 0.0 { x } else { x.signum() }),
        ("sqrt", f64::sqrt),
        ("cbrt", f64::cbrt),
        ("exp", f64::exp),
        ("expm1", f64::exp_m1),
        ("log", f64::ln),
        ("log2", f64::log2),
        ("log10", f64::log10),
        ("log1p", f64::ln_1p),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("acos", f64::acos),
        ("atan", f64::atan),
        ("sinh", f64::sinh),
        ("cosh", f64::cosh),
        ("tanh", f64::tanh),
        ("asinh", f64::asinh),
        ("acosh", f64::acosh),
        ("atanh", f64::atanh),
    ];
    for (name, f) in table {
        unary(interp, math, name, f);
    }
    unary(interp, math, "fround", |x| x as f32 as f64);
    unary(interp, math, "clz32", |x| to_uint32(x).leading_zeros() as f64);

    interp.define_method(math, "atan2", 2, |interp, _, args| {
        let y = interp.to_number(&arg(args, 0))?;
        let x = interp.to_number(&arg(args, 1))?;
        Ok(Value::Number(y.atan2(x)))
    });
    interp.define_method(math, "pow", 2, |interp, _, args| {
        let x = interp.to_number(&arg(args, 0))?;
        let y = interp.to_number(&arg(args, 1))?;
        Ok(Value::Number(crate::interpreter::ops::number_op(crate::ast::BinaryOp::Exp, x, y)))
    });
    interp.define_method(math, "imul", 2, |interp, _, args| {
        let a = to_int32(interp.to_number(&arg(args, 0))?);
        let b = to_int32(interp.to_number(&arg(args, 1))?);
        Ok(Value::Number(a.wrapping_mul(b) as f64))
    });
    interp.define_method(math, "max", 2, |interp, _, args| {
        let mut best = f64::NEG_INFINITY;
        for x in numbers(interp, args)? {
            if x.is_nan() {
                return Ok(Value::Number(f64::NAN));
            }
            if x > best || (x == 0.0 && best == 0.0 && best.is_sign_negative()) {
                best = x;
            }
        }
        Ok(Value::Number(best))
    });
    interp.define_method(math, "min", 2, |interp, _, args| {
        let mut best = f64::INFINITY;
        for x in numbers(interp, args)? {
            if x.is_nan() {
                return Ok(Value::Number(f64::NAN));
            }
            if x < best || (x == 0.0 && best == 0.0 && x.is_sign_negative()) {
                best = x;
            }
        }
        Ok(Value::Number(best))
    });
    interp.define_method(math, "hypot", 2, |interp, _, args| {
        let xs = numbers(interp, args)?;
        if xs.iter().any(|x| x.is_infinite()) {
            return Ok(Value::Number(f64::INFINITY));
        }
        Ok(Value::Number(xs.iter().map(|x| x * x).sum::<f64>().sqrt()))
    });
    interp.define_method(math, "random", 0, |interp, _, _| {
        Ok(Value::Number(interp.next_random()))
    });
}

#[cfg(test)]
mod tests {
    use super::js_round;
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// round は .5 を正方向へ丸める。
    fn rounding() {
        assert_eq!(js_round(2.5), 3.0);
        assert_eq!(js_round(-2.5), -2.0);
        assert!(js_round(-0.4).is_sign_negative());
    }

    #[test]
    /// max / min と NaN。
    fn extremes() {
        assert_eq!(eval_display("Math.max(1, 5, 3)"), "5");
        assert_eq!(eval_display("Math.min()"), "Infinity");
        assert_eq!(eval_display("Math.max(1, NaN)"), "NaN");
    }

    #[test]
    /// random は [0, 1) に収まる。
    fn random_range() {
        assert_eq!(eval_display("let ok = true; for (let i = 0; i < 100; i++) { const r = Math.random(); if (r < 0 || r >= 1) ok = false; } ok"), "true");
    }

    #[test]
    /// 整数演算系。
    fn integer_helpers() {
        assert_eq!(eval_display("Math.imul(0xffffffff, 5)"), "-5");
        assert_eq!(eval_display("Math.clz32(1)"), "31");
        assert_eq!(eval_display("Math.hypot(3, 4)"), "5");
    }
}
