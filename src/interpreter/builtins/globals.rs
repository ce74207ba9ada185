// パス: src/interpreter/builtins/globals.rs
// 役割: グローバルの値プロパティと URI 関数

use runtime_heap::{Attributes, Property, PropertyKey, Value};

use super::define_global;
use crate::interpreter::{arg, ErrorKind, Interpreter};

/// encodeURIComponent でそのまま残す記号。
const COMPONENT_UNRESERVED: &str = "-_.!~*'()";
/// encodeURI はさらに予約文字も残す。
const URI_RESERVED: &str = ";/?:@&=+$,#";

fn encode(input: &str, keep: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || keep.contains(c) {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02X}", b));
            }
        }
    }
    out
}

/// `%XX` 列を UTF-8 として戻す。`preserve` に含まれる文字になる列はそのまま残す。
fn decode(input: &str, preserve: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let hex = input.get(i + 1..i + 3)?;
        let b = u8::from_str_radix(hex, 16).ok()?;
        if b.is_ascii() && preserve.contains(b as char) {
            out.extend_from_slice(&bytes[i..i + 3]);
        } else {
            out.push(b);
        }
        i += 3;
    }
    String::from_utf8(out).ok()
}

fn install_uri_functions(interp: &mut Interpreter) {
    let table: [(&str, bool, bool); 4] = [
        ("encodeURIComponent", true, false),
        ("encodeURI", true, true),
        ("decodeURIComponent", false, false),
        ("decodeURI", false, true),
    ];
    for (name, encoding, whole_uri) in table {
        let func = interp.native_function(name, 1, move |interp, _, args| {
            let input = interp.to_string(&arg(args, 0))?;
            if encoding {
                let keep = if whole_uri {
                    format!("{}{}", COMPONENT_UNRESERVED, URI_RESERVED)
                } else {
                    COMPONENT_UNRESERVED.to_string()
                };
                Ok(Value::string(encode(&input, &keep)))
            } else {
                let preserve = if whole_uri { URI_RESERVED } else { "" };
                match decode(&input, preserve) {
                    Some(text) => Ok(Value::string(text)),
                    None => Err(interp.throw(ErrorKind::UriError, "URI malformed")),
                }
            }
        });
        define_global(interp, name, Value::Object(func));
    }
}

pub(super) fn install(interp: &mut Interpreter) {
    let global = interp.global;
    for (name, value) in [
        ("NaN", Value::Number(f64::NAN)),
        ("Infinity", Value::Number(f64::INFINITY)),
        ("undefined", Value::Undefined),
    ] {
        interp
            .heap
            .object_mut(global)
            .define(PropertyKey::from(name), Property::data(value, Attributes::NONE));
    }
    define_global(interp, "globalThis", Value::Object(global));

    let is_nan = interp.native_function("isNaN", 1, |interp, _, args| {
        Ok(Value::Boolean(interp.to_number(&arg(args, 0))?.is_nan()))
    });
    define_global(interp, "isNaN", Value::Object(is_nan));
    let is_finite = interp.native_function("isFinite", 1, |interp, _, args| {
        Ok(Value::Boolean(interp.to_number(&arg(args, 0))?.is_finite()))
    });
    define_global(interp, "isFinite", Value::Object(is_finite));

    install_uri_functions(interp);
}

#[cfg(test)]
mod tests {
    use super::{decode, encode, COMPONENT_UNRESERVED};
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// 非 ASCII は UTF-8 バイト単位でエスケープされる。
    fn percent_encoding() {
        assert_eq!(encode("a b&é", COMPONENT_UNRESERVED), "a%20b%26%C3%A9");
        assert_eq!(decode("a%20b%26%C3%A9", "").as_deref(), Some("a b&é"));
        assert_eq!(decode("%2F", "/").as_deref(), Some("%2F"));
        assert_eq!(decode("%E0%A4%A", ""), None);
    }

    #[test]
    /// 値プロパティと型変換つきの判定関数。
    fn global_values() {
        assert_eq!(eval_display("globalThis.Infinity === Infinity"), "true");
        assert_eq!(eval_display("isNaN('abc')"), "true");
        assert_eq!(eval_display("isFinite('12')"), "true");
        assert_eq!(eval_display("decodeURIComponent('%')"), "throw URIError: URI malformed");
        assert_eq!(eval_display("encodeURI('http://x.y/a b?q=1')"), "http://x.y/a%20b?q=1");
    }
}
