// パス: src/interpreter/builtins/string.rs
// 役割: String コンストラクタと String.prototype のメソッド
// 意図: 添字と長さは UTF-16 コード単位で数える
// 関連ファイル: src/interpreter/text.rs, src/interpreter/builtins/regexp.rs

use std::rc::Rc;

use runtime_heap::{ObjectKind, Value};

use super::{install_constructor, regexp};
use crate::interpreter::ops::to_uint32;
use crate::interpreter::{arg, text, Interpreter, JsResult};

/// this を文字列として取り出す（ラッパは中身を使う）。
fn this_string(interp: &mut Interpreter, this: &Value, method: &str) -> JsResult<Rc<str>> {
    match this {
        Value::String(s) => Ok(s.clone()),
        Value::Undefined | Value::Null | Value::Empty => Err(interp.type_error(format!(
            "String.prototype.{} called on null or undefined",
            method
        ))),
        Value::Object(id) => match interp.heap.kind(*id) {
            ObjectKind::StringObject(s) => Ok(s.clone()),
            _ => interp.to_string(this),
        },
        other => interp.to_string(other),
    }
}

fn is_regexp(interp: &Interpreter, value: &Value) -> bool {
    matches!(value, Value::Object(id) if matches!(interp.heap.kind(*id), ObjectKind::RegExp { .. }))
}

/// `$&` `$1` などの置換パターンを展開する。`position` はコード単位。
pub(super) fn expand_replacement(
    template: &str,
    matched: &str,
    position: usize,
    subject: &str,
    captures: &[Option<String>],
) -> String {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('&') => {
                chars.next();
                out.push_str(matched);
            }
            Some('`') => {
                chars.next();
                out.push_str(&text::slice(subject, 0, position));
            }
            Some('\'') => {
                chars.next();
                let end = position + text::len(matched);
                out.push_str(&text::slice(subject, end, text::len(subject)));
            }
            Some(d) if d.is_ascii_digit() => {
                chars.next();
                let mut index = d.to_digit(10).unwrap_or(0) as usize;
                if let Some(next) = chars.peek().and_then(|n| n.to_digit(10)) {
                    let two = index * 10 + next as usize;
                    if two >= 1 && two <= captures.len() {
                        chars.next();
                        index = two;
                    }
                }
                if index >= 1 && index <= captures.len() {
                    out.push_str(captures[index - 1].as_deref().unwrap_or(""));
                } else {
                    out.push('$');
                    out.push(d);
                }
            }
            _ => out.push('$'),
        }
    }
    out
}

/// 文字列パターンでの置換（`all` なら全出現）。
fn replace_string(
    interp: &mut Interpreter,
    subject: &str,
    pattern: &str,
    replacement: &Value,
    all: bool,
) -> JsResult<String> {
    let mut positions = Vec::new();
    let mut from = 0;
    let pattern_len = text::len(pattern);
    while let Some(pos) = text::index_of(subject, pattern, from) {
        positions.push(pos);
        if !all {
            break;
        }
        from = pos + pattern_len.max(1);
        if from > text::len(subject) {
            break;
        }
    }
    let mut out = String::new();
    let mut last = 0;
    for pos in positions {
        out.push_str(&text::slice(subject, last, pos));
        let piece = if interp.heap.is_callable(replacement) {
            let r = interp.call(
                replacement,
                Value::Undefined,
                &[Value::string(pattern), Value::Number(pos as f64), Value::string(subject)],
            )?;
            interp.to_string(&r)?.to_string()
        } else {
            let template = interp.to_string(replacement)?;
            expand_replacement(&template, pattern, pos, subject, &[])
        };
        out.push_str(&piece);
        last = pos + pattern_len;
    }
    out.push_str(&text::slice(subject, last, text::len(subject)));
    Ok(out)
}

fn pad(interp: &mut Interpreter, this: &Value, args: &[Value], at_start: bool) -> JsResult<Value> {
    let s = this_string(interp, this, if at_start { "padStart" } else { "padEnd" })?;
    let target = interp.to_integer(&arg(args, 0))?.max(0.0) as usize;
    let filler = match arg(args, 1) {
        Value::Undefined => " ".to_string(),
        v => interp.to_string(&v)?.to_string(),
    };
    let len = text::len(&s);
    if target <= len || filler.is_empty() {
        return Ok(Value::String(s));
    }
    let needed = target - len;
    let filler_units = text::units(&filler);
    let padding: Vec<u16> = filler_units.iter().copied().cycle().take(needed).collect();
    let padding = text::from_units(&padding);
    Ok(Value::string(if at_start {
        format!("{}{}", padding, s)
    } else {
        format!("{}{}", s, padding)
    }))
}

pub(super) fn install(interp: &mut Interpreter) {
    let proto = interp.new_prototype("String", ObjectKind::StringObject(Rc::from("")));
    let ctor = install_constructor(interp, "String", 1, proto, |interp, _, args| {
        let s: Rc<str> = match args.first() {
            None => Rc::from(""),
            Some(Value::Symbol(id)) if !interp.is_constructing() => {
                Rc::from(interp.heap.key_display(&runtime_heap::PropertyKey::Symbol(*id)))
            }
            Some(v) => interp.to_string(v)?,
        };
        if interp.is_constructing() {
            let proto = interp.constructing_prototype("String");
            return Ok(Value::Object(interp.heap.alloc(ObjectKind::StringObject(s), Some(proto))));
        }
        Ok(Value::String(s))
    });

    interp.define_method(ctor, "fromCharCode", 1, |interp, _, args| {
        let mut units = Vec::with_capacity(args.len());
        for a in args {
            units.push(to_uint32(interp.to_number(a)?) as u16);
        }
        Ok(Value::string(text::from_units(&units)))
    });
    interp.define_method(ctor, "fromCodePoint", 1, |interp, _, args| {
        let mut out = String::new();
        for a in args {
            let n = interp.to_number(a)?;
            match (n.fract() == 0.0).then(|| char::from_u32(n as u32)).flatten() {
                Some(c) if n >= 0.0 => out.push(c),
                _ => {
                    let shown = interp.heap.display_string(a);
                    return Err(interp.range_error(format!("Invalid code point {}", shown)));
                }
            }
        }
        Ok(Value::string(out))
    });

    interp.define_method(proto, "toString", 0, |interp, this, _| {
        this_string(interp, &this, "toString").map(Value::String)
    });
    interp.define_method(proto, "valueOf", 0, |interp, this, _| {
        this_string(interp, &this, "valueOf").map(Value::String)
    });
    interp.define_method(proto, "charAt", 1, |interp, this, args| {
        let s = this_string(interp, &this, "charAt")?;
        let i = interp.to_integer(&arg(args, 0))?;
        if i < 0.0 {
            return Ok(Value::string(""));
        }
        Ok(Value::string(text::slice(&s, i as usize, i as usize + 1)))
    });
    interp.define_method(proto, "charCodeAt", 1, |interp, this, args| {
        let s = this_string(interp, &this, "charCodeAt")?;
        let i = interp.to_integer(&arg(args, 0))?;
        let units = text::units(&s);
        Ok(Value::Number(if i < 0.0 {
            f64::NAN
        } else {
            units.get(i as usize).map(|u| *u as f64).unwrap_or(f64::NAN)
        }))
    });
    interp.define_method(proto, "codePointAt", 1, |interp, this, args| {
        let s = this_string(interp, &this, "codePointAt")?;
        let i = interp.to_integer(&arg(args, 0))?;
        let units = text::units(&s);
        if i < 0.0 || i as usize >= units.len() {
            return Ok(Value::Undefined);
        }
        let i = i as usize;
        let decoded = char::decode_utf16(units[i..].iter().copied()).next();
        Ok(Value::Number(match decoded {
            Some(Ok(c)) => c as u32 as f64,
            _ => units[i] as f64,
        }))
    });
    interp.define_method(proto, "at", 1, |interp, this, args| {
        let s = this_string(interp, &this, "at")?;
        let len = text::len(&s) as f64;
        let n = interp.to_integer(&arg(args, 0))?;
        let i = if n < 0.0 { len + n } else { n };
        if i < 0.0 || i >= len {
            return Ok(Value::Undefined);
        }
        Ok(Value::string(text::slice(&s, i as usize, i as usize + 1)))
    });
    interp.define_method(proto, "indexOf", 1, |interp, this, args| {
        let s = this_string(interp, &this, "indexOf")?;
        let needle = interp.to_string(&arg(args, 0))?;
        let from = interp.to_integer(&arg(args, 1))?.max(0.0) as usize;
        Ok(Value::Number(
            text::index_of(&s, &needle, from).map(|i| i as f64).unwrap_or(-1.0),
        ))
    });
    interp.define_method(proto, "lastIndexOf", 1, |interp, this, args| {
        let s = this_string(interp, &this, "lastIndexOf")?;
        let needle = interp.to_string(&arg(args, 0))?;
        Ok(Value::Number(
            text::last_index_of(&s, &needle).map(|i| i as f64).unwrap_or(-1.0),
        ))
    });
    interp.define_method(proto, "includes", 1, |interp, this, args| {
        let s = this_string(interp, &this, "includes")?;
        if is_regexp(interp, &arg(args, 0)) {
            return Err(interp.type_error("First argument to String.prototype.includes must not be a regular expression"));
        }
        let needle = interp.to_string(&arg(args, 0))?;
        let from = interp.to_integer(&arg(args, 1))?.max(0.0) as usize;
        Ok(Value::Boolean(text::index_of(&s, &needle, from).is_some()))
    });
    interp.define_method(proto, "startsWith", 1, |interp, this, args| {
        let s = this_string(interp, &this, "startsWith")?;
        let needle = interp.to_string(&arg(args, 0))?;
        let from = interp.to_integer(&arg(args, 1))?.max(0.0) as usize;
        let tail = text::slice(&s, from, text::len(&s));
        Ok(Value::Boolean(tail.starts_with(&*needle)))
    });
    interp.define_method(proto, "endsWith", 1, |interp, this, args| {
        let s = this_string(interp, &this, "endsWith")?;
        let needle = interp.to_string(&arg(args, 0))?;
        let end = match arg(args, 1) {
            Value::Undefined => text::len(&s),
            v => interp.to_integer(&v)?.max(0.0) as usize,
        };
        let head = text::slice(&s, 0, end);
        Ok(Value::Boolean(head.ends_with(&*needle)))
    });
    interp.define_method(proto, "slice", 2, |interp, this, args| {
        let s = this_string(interp, &this, "slice")?;
        let len = text::len(&s);
        let start = text::relative_index(interp.to_integer(&arg(args, 0))?, len);
        let end = match arg(args, 1) {
            Value::Undefined => len,
            v => text::relative_index(interp.to_integer(&v)?, len),
        };
        Ok(Value::string(text::slice(&s, start, end)))
    });
    interp.define_method(proto, "substring", 2, |interp, this, args| {
        let s = this_string(interp, &this, "substring")?;
        let len = text::len(&s) as f64;
        let a = interp.to_integer(&arg(args, 0))?.clamp(0.0, len) as usize;
        let b = match arg(args, 1) {
            Value::Undefined => len as usize,
            v => interp.to_integer(&v)?.clamp(0.0, len) as usize,
        };
        Ok(Value::string(text::slice(&s, a.min(b), a.max(b))))
    });
    interp.define_method(proto, "substr", 2, |interp, this, args| {
        let s = this_string(interp, &this, "substr")?;
        let len = text::len(&s);
        let start = text::relative_index(interp.to_integer(&arg(args, 0))?, len);
        let count = match arg(args, 1) {
            Value::Undefined => len,
            v => interp.to_integer(&v)?.max(0.0) as usize,
        };
        Ok(Value::string(text::slice(&s, start, start.saturating_add(count))))
    });
    interp.define_method(proto, "toUpperCase", 0, |interp, this, _| {
        Ok(Value::string(this_string(interp, &this, "toUpperCase")?.to_uppercase()))
    });
    interp.define_method(proto, "toLowerCase", 0, |interp, this, _| {
        Ok(Value::string(this_string(interp, &this, "toLowerCase")?.to_lowercase()))
    });
    interp.define_method(proto, "toLocaleUpperCase", 0, |interp, this, _| {
        Ok(Value::string(this_string(interp, &this, "toLocaleUpperCase")?.to_uppercase()))
    });
    interp.define_method(proto, "toLocaleLowerCase", 0, |interp, this, _| {
        Ok(Value::string(this_string(interp, &this, "toLocaleLowerCase")?.to_lowercase()))
    });
    interp.define_method(proto, "trim", 0, |interp, this, _| {
        Ok(Value::string(this_string(interp, &this, "trim")?.trim()))
    });
    interp.define_method(proto, "trimStart", 0, |interp, this, _| {
        Ok(Value::string(this_string(interp, &this, "trimStart")?.trim_start()))
    });
    interp.define_method(proto, "trimEnd", 0, |interp, this, _| {
        Ok(Value::string(this_string(interp, &this, "trimEnd")?.trim_end()))
    });
    interp.define_method(proto, "padStart", 2, |interp, this, args| pad(interp, &this, args, true));
    interp.define_method(proto, "padEnd", 2, |interp, this, args| pad(interp, &this, args, false));
    interp.define_method(proto, "repeat", 1, |interp, this, args| {
        let s = this_string(interp, &this, "repeat")?;
        let n = interp.to_integer(&arg(args, 0))?;
        if n < 0.0 || n.is_infinite() {
            return Err(interp.range_error(format!("Invalid count value: {}", runtime_heap::number_to_string(n))));
        }
        if (n as usize).saturating_mul(s.len()) > (1 << 28) {
            return Err(interp.range_error("Invalid string length"));
        }
        Ok(Value::string(s.repeat(n as usize)))
    });
    interp.define_method(proto, "concat", 1, |interp, this, args| {
        let mut out = this_string(interp, &this, "concat")?.to_string();
        for a in args {
            out.push_str(&interp.to_string(a)?);
        }
        Ok(Value::string(out))
    });
    interp.define_method(proto, "split", 2, |interp, this, args| {
        let s = this_string(interp, &this, "split")?;
        let limit = match arg(args, 1) {
            Value::Undefined => usize::MAX,
            v => to_uint32(interp.to_number(&v)?) as usize,
        };
        let separator = arg(args, 0);
        let parts: Vec<Value> = if let Value::Object(rx) = separator.clone().filter_regexp(interp) {
            regexp::split(interp, rx, &s)?
        } else if separator.is_undefined() {
            vec![Value::String(s.clone())]
        } else {
            let sep = interp.to_string(&separator)?;
            if sep.is_empty() {
                text::units(&s)
                    .into_iter()
                    .map(|u| Value::string(text::from_units(&[u])))
                    .collect()
            } else {
                s.split(&*sep).map(Value::string).collect()
            }
        };
        let parts = parts.into_iter().take(limit).collect();
        Ok(Value::Object(interp.create_array(parts)))
    });
    interp.define_method(proto, "replace", 2, |interp, this, args| {
        let s = this_string(interp, &this, "replace")?;
        let pattern = arg(args, 0);
        if let Value::Object(rx) = pattern.clone().filter_regexp(interp) {
            return regexp::replace(interp, rx, &s, &arg(args, 1), false).map(Value::string);
        }
        let pattern = interp.to_string(&pattern)?;
        replace_string(interp, &s, &pattern, &arg(args, 1), false).map(Value::string)
    });
    interp.define_method(proto, "replaceAll", 2, |interp, this, args| {
        let s = this_string(interp, &this, "replaceAll")?;
        let pattern = arg(args, 0);
        if let Value::Object(rx) = pattern.clone().filter_regexp(interp) {
            if !regexp::is_global(interp, rx) {
                return Err(interp.type_error("replaceAll must be called with a global RegExp"));
            }
            return regexp::replace(interp, rx, &s, &arg(args, 1), true).map(Value::string);
        }
        let pattern = interp.to_string(&pattern)?;
        replace_string(interp, &s, &pattern, &arg(args, 1), true).map(Value::string)
    });
    interp.define_method(proto, "match", 1, |interp, this, args| {
        let s = this_string(interp, &this, "match")?;
        let rx = match arg(args, 0).filter_regexp(interp) {
            Value::Object(rx) => rx,
            other => {
                let source = if other.is_undefined() {
                    String::new()
                } else {
                    interp.to_string(&other)?.to_string()
                };
                match interp.regexp_create(&source, "")? {
                    Value::Object(rx) => rx,
                    _ => return Ok(Value::Null),
                }
            }
        };
        regexp::match_all_or_first(interp, rx, &s)
    });
    interp.define_method(proto, "search", 1, |interp, this, args| {
        let s = this_string(interp, &this, "search")?;
        let rx = match arg(args, 0).filter_regexp(interp) {
            Value::Object(rx) => rx,
            other => {
                let source = interp.to_string(&other)?.to_string();
                match interp.regexp_create(&source, "")? {
                    Value::Object(rx) => rx,
                    _ => return Ok(Value::Number(-1.0)),
                }
            }
        };
        regexp::search(interp, rx, &s)
    });
    interp.define_method(proto, "localeCompare", 1, |interp, this, args| {
        let s = this_string(interp, &this, "localeCompare")?;
        let other = interp.to_string(&arg(args, 0))?;
        Ok(Value::Number(match s.cmp(&other) {
            std::cmp::Ordering::Less => -1.0,
            std::cmp::Ordering::Equal => 0.0,
            std::cmp::Ordering::Greater => 1.0,
        }))
    });
    interp.define_method(proto, "normalize", 0, |interp, this, _| {
        this_string(interp, &this, "normalize").map(Value::String)
    });
    let iterator = interp.well_known.iterator;
    interp.define_symbol_method(proto, iterator, "[Symbol.iterator]", |interp, this, _| {
        let s = this_string(interp, &this, "[Symbol.iterator]")?;
        let chars = s.chars().map(|c| Value::string(c.to_string())).collect();
        Ok(interp.create_values_iterator(chars))
    });
}

trait FilterRegExp {
    /// RegExp オブジェクトならそのまま、それ以外は `undefined`。
    fn filter_regexp(self, interp: &Interpreter) -> Value;
}

impl FilterRegExp for Value {
    fn filter_regexp(self, interp: &Interpreter) -> Value {
        if is_regexp(interp, &self) {
            self
        } else {
            Value::Undefined
        }
    }
}

#[cfg(test)]
mod tests {
    use super::expand_replacement;
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// 置換パターンの展開。
    fn replacement_patterns() {
        let caps = vec![Some("b".to_string())];
        assert_eq!(expand_replacement("[$&|$1|$$|$`|$']", "ab", 1, "xabz", &caps), "[ab|b|$|x|z]");
        assert_eq!(expand_replacement("$2", "a", 0, "a", &caps), "$2");
    }

    #[test]
    /// 基本的な文字列メソッド。
    fn basic_methods() {
        assert_eq!(eval_display("'Hello'.toUpperCase() + 'World'.slice(-3)"), "HELLOrld");
        assert_eq!(eval_display("'  pad '.trim().padStart(5, '*')"), "**pad");
        assert_eq!(eval_display("'a,b,,c'.split(',').length"), "4");
        assert_eq!(eval_display("'abc'.at(-1) + 'abc'.charAt(1)"), "cb");
    }

    #[test]
    /// 文字列パターンでの置換と関数置換。
    fn replace_with_strings() {
        assert_eq!(eval_display("'aXbXc'.replace('X', '-')"), "a-bXc");
        assert_eq!(eval_display("'aXbXc'.replaceAll('X', (m, i) => i)"), "a1b3c");
    }

    #[test]
    /// 長さはサロゲートペアを 2 と数え、反復はコードポイント単位。
    fn code_units_and_points() {
        assert_eq!(eval_display("'a\\u{1F600}'.length"), "3");
        assert_eq!(eval_display("[...'a\\u{1F600}'].length"), "2");
    }

    #[test]
    /// null を this にすると TypeError。
    fn null_this() {
        assert_eq!(
            eval_display("String.prototype.trim.call(null)"),
            "throw TypeError: String.prototype.trim called on null or undefined"
        );
    }
}
