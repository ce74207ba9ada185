// パス: src/interpreter/builtins/regexp.rs
// 役割: RegExp オブジェクトと、String.prototype の正規表現版メソッドが使う照合処理
// 意図: パターンは fancy-regex の構文へ書き換えてからコンパイルし、オブジェクトごとにキャッシュする。
//       位置は内部ではバイト、外へ出すときは UTF-16 コード単位に直す
// 関連ファイル: src/interpreter/builtins/string.rs, src/interpreter/text.rs

use std::rc::Rc;

use fancy_regex::{Captures, Regex};
use runtime_heap::{Attributes, ObjectId, ObjectKind, Property, PropertyKey, Value};

use super::{install_constructor, string::expand_replacement};
use crate::interpreter::{arg, text, ErrorKind, Interpreter, JsResult};

const VALID_FLAGS: &str = "dgimsuyv";

/// `{n}` `{n,}` `{n,m}` の量指定子なら、`{` の後ろから `}` までの文字数。
fn quantifier_end(rest: &[char]) -> Option<usize> {
    let mut i = 0;
    while i < rest.len() && rest[i].is_ascii_digit() {
        i += 1;
    }
    if i == 0 {
        return None;
    }
    if rest.get(i) == Some(&',') {
        i += 1;
        while i < rest.len() && rest[i].is_ascii_digit() {
            i += 1;
        }
    }
    (rest.get(i) == Some(&'}')).then_some(i + 1)
}

/// 正規表現リテラルの本体を fancy-regex が受け付ける形へ書き換える。
fn translate(source: &str, flags: &str) -> String {
    let mut out = String::new();
    for (flag, inline) in [('i', "(?i)"), ('m', "(?m)"), ('s', "(?s)")] {
        if flags.contains(flag) {
            out.push_str(inline);
        }
    }
    let chars: Vec<char> = source.chars().collect();
    let mut in_class = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '\\' => {
                let Some(&e) = chars.get(i) else {
                    out.push_str("\\\\");
                    break;
                };
                i += 1;
                match e {
                    'd' if in_class => out.push_str("0-9"),
                    'w' if in_class => out.push_str("A-Za-z0-9_"),
                    'd' => out.push_str("[0-9]"),
                    'D' => out.push_str(if in_class { "\\D" } else { "[^0-9]" }),
                    'w' => out.push_str("[A-Za-z0-9_]"),
                    'W' => out.push_str(if in_class { "\\W" } else { "[^A-Za-z0-9_]" }),
                    'b' if in_class => out.push_str("\\x08"),
                    '0' => out.push_str("\\x00"),
                    'u' if chars.get(i) == Some(&'{') => {
                        let end = chars[i..].iter().position(|&ch| ch == '}').map(|p| i + p);
                        match end {
                            Some(end) => {
                                let hex: String = chars[i + 1..end].iter().collect();
                                out.push_str(&format!("\\x{{{}}}", hex));
                                i = end + 1;
                            }
                            None => out.push('u'),
                        }
                    }
                    'u' if i + 4 <= chars.len() && chars[i..i + 4].iter().all(|ch| ch.is_ascii_hexdigit()) => {
                        let hex: String = chars[i..i + 4].iter().collect();
                        out.push_str(&format!("\\x{{{}}}", hex));
                        i += 4;
                    }
                    'c' if chars.get(i).is_some_and(|ch| ch.is_ascii_alphabetic()) => {
                        let code = (chars[i] as u32) % 32;
                        out.push_str(&format!("\\x{{{:x}}}", code));
                        i += 1;
                    }
                    's' | 'S' | 'b' | 'B' | 'n' | 'r' | 't' | 'f' | 'v' | 'x' | 'k' => {
                        out.push('\\');
                        out.push(e);
                    }
                    '1'..='9' => {
                        out.push('\\');
                        out.push(e);
                    }
                    '/' => out.push('/'),
                    e if "\\.+*?()|[]{}^$#&-~".contains(e) => {
                        out.push('\\');
                        out.push(e);
                    }
                    e => out.push(e),
                }
            }
            '[' if in_class => out.push_str("\\["),
            '&' | '~' if in_class => {
                out.push('\\');
                out.push(c);
            }
            '[' => {
                if chars.get(i) == Some(&'^') && chars.get(i + 1) == Some(&']') {
                    out.push_str("[\\s\\S]");
                    i += 2;
                } else if chars.get(i) == Some(&']') {
                    out.push_str("[^\\s\\S]");
                    i += 1;
                } else {
                    in_class = true;
                    out.push('[');
                    if chars.get(i) == Some(&'^') {
                        out.push('^');
                        i += 1;
                    }
                }
            }
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            '(' if !in_class
                && chars.get(i) == Some(&'?')
                && chars.get(i + 1) == Some(&'<')
                && !matches!(chars.get(i + 2), Some('=') | Some('!')) =>
            {
                out.push_str("(?P<");
                i += 2;
            }
            '{' if !in_class => match quantifier_end(&chars[i..]) {
                Some(len) => {
                    out.push('{');
                    out.extend(&chars[i..i + len]);
                    i += len;
                }
                None => out.push_str("\\{"),
            },
            '}' if !in_class => out.push_str("\\}"),
            c => out.push(c),
        }
    }
    out
}

fn compile(source: &str, flags: &str) -> Result<Regex, String> {
    Regex::new(&translate(source, flags)).map_err(|e| e.to_string())
}

impl Interpreter {
    /// `/source/flags` に相当する RegExp オブジェクトを作る。
    pub(crate) fn regexp_create(&mut self, source: &str, flags: &str) -> JsResult<Value> {
        let proto = self.prototype("RegExp");
        self.regexp_alloc(source, flags, proto)
    }

    fn regexp_alloc(&mut self, source: &str, flags: &str, proto: ObjectId) -> JsResult<Value> {
        let mut seen = String::new();
        for f in flags.chars() {
            if !VALID_FLAGS.contains(f) || seen.contains(f) {
                return Err(self.throw(
                    ErrorKind::SyntaxError,
                    format!("Invalid regular expression flags '{}'", flags),
                ));
            }
            seen.push(f);
        }
        let regex = match compile(source, flags) {
            Ok(r) => r,
            Err(e) => {
                return Err(self.throw(
                    ErrorKind::SyntaxError,
                    format!("Invalid regular expression: /{}/{}: {}", source, flags, e),
                ))
            }
        };
        let shown_source = if source.is_empty() { "(?:)" } else { source };
        let id = self.heap.alloc(
            ObjectKind::RegExp {
                source: Rc::from(shown_source),
                flags: Rc::from(flags),
            },
            Some(proto),
        );
        self.heap.object_mut(id).define(
            PropertyKey::from("lastIndex"),
            Property::data(Value::Number(0.0), Attributes::WRITABLE),
        );
        self.regex_cache.insert(id, Rc::new(regex));
        Ok(Value::Object(id))
    }

    fn compiled_regex(&mut self, rx: ObjectId) -> JsResult<Rc<Regex>> {
        if let Some(r) = self.regex_cache.get(&rx) {
            return Ok(r.clone());
        }
        let (source, flags) = regexp_parts(self, rx);
        match compile(&source, &flags) {
            Ok(r) => {
                let r = Rc::new(r);
                self.regex_cache.insert(rx, r.clone());
                Ok(r)
            }
            Err(e) => Err(self.throw(ErrorKind::SyntaxError, format!("Invalid regular expression: {}", e))),
        }
    }
}

fn regexp_parts(interp: &Interpreter, rx: ObjectId) -> (Rc<str>, Rc<str>) {
    match interp.heap.kind(rx) {
        ObjectKind::RegExp { source, flags } => (source.clone(), flags.clone()),
        _ => (Rc::from("(?:)"), Rc::from("")),
    }
}

fn has_flag(interp: &Interpreter, rx: ObjectId, flag: char) -> bool {
    regexp_parts(interp, rx).1.contains(flag)
}

pub(super) fn is_global(interp: &Interpreter, rx: ObjectId) -> bool {
    has_flag(interp, rx, 'g')
}

/// 1 回分の照合結果。位置はバイト単位。
struct MatchData {
    start: usize,
    end: usize,
    groups: Vec<Option<(usize, usize)>>,
    names: Vec<Option<String>>,
}

impl MatchData {
    fn from_captures(caps: &Captures<'_>, regex: &Regex) -> Option<MatchData> {
        let whole = caps.get(0)?;
        Some(MatchData {
            start: whole.start(),
            end: whole.end(),
            groups: (1..caps.len()).map(|i| caps.get(i).map(|m| (m.start(), m.end()))).collect(),
            names: regex.capture_names().skip(1).map(|n| n.map(str::to_string)).collect(),
        })
    }

    fn captures(&self, s: &str) -> Vec<Option<String>> {
        self.groups
            .iter()
            .map(|g| g.map(|(a, b)| s[a..b].to_string()))
            .collect()
    }
}

fn find_at(interp: &mut Interpreter, regex: &Regex, s: &str, byte: usize) -> JsResult<Option<MatchData>> {
    match regex.captures_from_pos(s, byte) {
        Ok(Some(caps)) => Ok(MatchData::from_captures(&caps, regex)),
        Ok(None) => Ok(None),
        Err(e) => Err(interp.throw(ErrorKind::InternalError, format!("regular expression failed: {}", e))),
    }
}

/// 次の文字境界（空一致のあとに進める位置）。
fn advance(s: &str, byte: usize) -> usize {
    s[byte..].chars().next().map(|c| byte + c.len_utf8()).unwrap_or(s.len() + 1)
}

fn set_last_index(interp: &mut Interpreter, rx: ObjectId, units: usize) -> JsResult<()> {
    interp.set(&Value::Object(rx), PropertyKey::from("lastIndex"), Value::Number(units as f64))
}

/// RegExpBuiltinExec。`g` / `y` のときは lastIndex を読み書きする。
fn exec_raw(interp: &mut Interpreter, rx: ObjectId, s: &str) -> JsResult<Option<MatchData>> {
    let regex = interp.compiled_regex(rx)?;
    let global = has_flag(interp, rx, 'g');
    let sticky = has_flag(interp, rx, 'y');
    let uses_last_index = global || sticky;
    let start_units = if uses_last_index {
        let v = interp.get(&Value::Object(rx), &PropertyKey::from("lastIndex"))?;
        interp.to_integer(&v)?.max(0.0) as usize
    } else {
        0
    };
    if start_units > text::len(s) {
        if uses_last_index {
            set_last_index(interp, rx, 0)?;
        }
        return Ok(None);
    }
    let byte = text::unit_to_byte_offset(s, start_units);
    let found = find_at(interp, &regex, s, byte)?.filter(|m| !sticky || m.start == byte);
    match found {
        Some(m) => {
            if uses_last_index {
                set_last_index(interp, rx, text::byte_to_unit_offset(s, m.end))?;
            }
            Ok(Some(m))
        }
        None => {
            if uses_last_index {
                set_last_index(interp, rx, 0)?;
            }
            Ok(None)
        }
    }
}

/// exec が返す配列（index / input / groups 付き）。
fn match_array(interp: &mut Interpreter, m: &MatchData, s: &str, with_indices: bool) -> Value {
    let mut items = vec![Value::string(&s[m.start..m.end])];
    items.extend(
        m.captures(s)
            .into_iter()
            .map(|c| c.map(Value::string).unwrap_or(Value::Undefined)),
    );
    let array = interp.create_array(items);
    interp.create_data_property(
        array,
        PropertyKey::from("index"),
        Value::Number(text::byte_to_unit_offset(s, m.start) as f64),
    );
    interp.create_data_property(array, PropertyKey::from("input"), Value::string(s));
    let groups = if m.names.iter().any(Option::is_some) {
        let g = interp.heap.alloc_ordinary();
        for (name, span) in m.names.iter().zip(&m.groups) {
            if let Some(name) = name {
                let v = span.map(|(a, b)| Value::string(&s[a..b])).unwrap_or(Value::Undefined);
                interp.create_data_property(g, PropertyKey::string(name), v);
            }
        }
        Value::Object(g)
    } else {
        Value::Undefined
    };
    interp.create_data_property(array, PropertyKey::from("groups"), groups);
    if with_indices {
        let mut pairs = vec![(m.start, m.end)];
        pairs.extend(m.groups.iter().map(|g| g.unwrap_or((usize::MAX, usize::MAX))));
        let values: Vec<Value> = pairs
            .into_iter()
            .map(|(a, b)| {
                if a == usize::MAX {
                    return Value::Undefined;
                }
                let pair = vec![
                    Value::Number(text::byte_to_unit_offset(s, a) as f64),
                    Value::Number(text::byte_to_unit_offset(s, b) as f64),
                ];
                Value::Object(interp.create_array(pair))
            })
            .collect();
        let indices = interp.create_array(values);
        interp.create_data_property(array, PropertyKey::from("indices"), Value::Object(indices));
    }
    Value::Object(array)
}

/// lastIndex に関係なく、先頭から全一致を集める。
fn all_matches(interp: &mut Interpreter, rx: ObjectId, s: &str) -> JsResult<Vec<MatchData>> {
    let regex = interp.compiled_regex(rx)?;
    let mut out = Vec::new();
    let mut pos = 0;
    while pos <= s.len() {
        let Some(m) = find_at(interp, &regex, s, pos)? else { break };
        pos = if m.end == m.start { advance(s, m.end) } else { m.end };
        out.push(m);
    }
    Ok(out)
}

pub(super) fn split(interp: &mut Interpreter, rx: ObjectId, s: &str) -> JsResult<Vec<Value>> {
    let regex = interp.compiled_regex(rx)?;
    if s.is_empty() {
        return Ok(match find_at(interp, &regex, s, 0)? {
            Some(_) => Vec::new(),
            None => vec![Value::string("")],
        });
    }
    let mut parts = Vec::new();
    let mut last = 0;
    let mut pos = 0;
    while pos < s.len() {
        let Some(m) = find_at(interp, &regex, s, pos)? else { break };
        if m.start >= s.len() {
            break;
        }
        if m.end == last {
            pos = advance(s, pos.max(m.start));
            continue;
        }
        parts.push(Value::string(&s[last..m.start]));
        parts.extend(
            m.captures(s)
                .into_iter()
                .map(|c| c.map(Value::string).unwrap_or(Value::Undefined)),
        );
        last = m.end;
        pos = if m.end == m.start { advance(s, m.end) } else { m.end };
    }
    parts.push(Value::string(&s[last..]));
    Ok(parts)
}

pub(super) fn replace(
    interp: &mut Interpreter,
    rx: ObjectId,
    s: &str,
    replacement: &Value,
    all: bool,
) -> JsResult<String> {
    let global = all || is_global(interp, rx);
    let matches = if global {
        set_last_index(interp, rx, 0)?;
        all_matches(interp, rx, s)?
    } else {
        exec_raw(interp, rx, s)?.into_iter().collect()
    };
    let functional = interp.heap.is_callable(replacement);
    let template = if functional {
        None
    } else {
        Some(interp.to_string(replacement)?)
    };
    let mut out = String::new();
    let mut last = 0;
    for m in matches {
        let matched = &s[m.start..m.end];
        let captures = m.captures(s);
        let position = text::byte_to_unit_offset(s, m.start);
        let piece = match &template {
            Some(t) => expand_replacement(t, matched, position, s, &captures),
            None => {
                let mut call_args = vec![Value::string(matched)];
                call_args.extend(captures.into_iter().map(|c| c.map(Value::string).unwrap_or(Value::Undefined)));
                call_args.push(Value::Number(position as f64));
                call_args.push(Value::string(s));
                let result = interp.call(replacement, Value::Undefined, &call_args)?;
                interp.to_string(&result)?.to_string()
            }
        };
        out.push_str(&s[last..m.start]);
        out.push_str(&piece);
        last = m.end;
    }
    out.push_str(&s[last..]);
    Ok(out)
}

/// `String.prototype.match`。`g` なら一致文字列の配列、そうでなければ exec と同じ。
pub(super) fn match_all_or_first(interp: &mut Interpreter, rx: ObjectId, s: &str) -> JsResult<Value> {
    if !is_global(interp, rx) {
        let with_indices = has_flag(interp, rx, 'd');
        return Ok(match exec_raw(interp, rx, s)? {
            Some(m) => match_array(interp, &m, s, with_indices),
            None => Value::Null,
        });
    }
    set_last_index(interp, rx, 0)?;
    let found: Vec<Value> = all_matches(interp, rx, s)?
        .into_iter()
        .map(|m| Value::string(&s[m.start..m.end]))
        .collect();
    if found.is_empty() {
        return Ok(Value::Null);
    }
    Ok(Value::Object(interp.create_array(found)))
}

pub(super) fn search(interp: &mut Interpreter, rx: ObjectId, s: &str) -> JsResult<Value> {
    let regex = interp.compiled_regex(rx)?;
    Ok(Value::Number(match find_at(interp, &regex, s, 0)? {
        Some(m) => text::byte_to_unit_offset(s, m.start) as f64,
        None => -1.0,
    }))
}

fn this_regexp(interp: &mut Interpreter, this: &Value, method: &str) -> JsResult<ObjectId> {
    match this {
        Value::Object(id) if matches!(interp.heap.kind(*id), ObjectKind::RegExp { .. }) => Ok(*id),
        _ => {
            let shown = interp.heap.display_string(this);
            Err(interp.type_error(format!("RegExp.prototype.{} requires that 'this' be a RegExp object, got {}", method, shown)))
        }
    }
}

pub(super) fn install(interp: &mut Interpreter) {
    let proto = interp.new_prototype("RegExp", ObjectKind::Ordinary);
    install_constructor(interp, "RegExp", 2, proto, |interp, _, args| {
        let pattern = arg(args, 0);
        let flags_arg = arg(args, 1);
        let existing = match &pattern {
            Value::Object(id) => match interp.heap.kind(*id) {
                ObjectKind::RegExp { source, flags } => Some((source.to_string(), flags.to_string())),
                _ => None,
            },
            _ => None,
        };
        // new なしで RegExp を渡され、flags も省略されたときは同じオブジェクトを返す
        if existing.is_some() && flags_arg.is_undefined() && !interp.is_constructing() {
            return Ok(pattern);
        }
        let (source, inherited) = match existing {
            Some(parts) => parts,
            None if pattern.is_undefined() => (String::new(), String::new()),
            None => (interp.to_string(&pattern)?.to_string(), String::new()),
        };
        let flags = match flags_arg {
            Value::Undefined => inherited,
            v => interp.to_string(&v)?.to_string(),
        };
        let proto = interp.constructing_prototype("RegExp");
        interp.regexp_alloc(&source, &flags, proto)
    });

    interp.define_method(proto, "exec", 1, |interp, this, args| {
        let rx = this_regexp(interp, &this, "exec")?;
        let s = interp.to_string(&arg(args, 0))?;
        let with_indices = has_flag(interp, rx, 'd');
        Ok(match exec_raw(interp, rx, &s)? {
            Some(m) => match_array(interp, &m, &s, with_indices),
            None => Value::Null,
        })
    });
    interp.define_method(proto, "test", 1, |interp, this, args| {
        let rx = this_regexp(interp, &this, "test")?;
        let s = interp.to_string(&arg(args, 0))?;
        Ok(Value::Boolean(exec_raw(interp, rx, &s)?.is_some()))
    });
    interp.define_method(proto, "toString", 0, |interp, this, _| {
        let source = interp.get_named(&this, "source")?;
        let flags = interp.get_named(&this, "flags")?;
        let source = interp.to_string(&source)?;
        let flags = interp.to_string(&flags)?;
        Ok(Value::string(format!("/{}/{}", source, flags)))
    });
    interp.define_getter(proto, "source", |interp, this, _| {
        let rx = this_regexp(interp, &this, "source")?;
        Ok(Value::String(regexp_parts(interp, rx).0))
    });
    interp.define_getter(proto, "flags", |interp, this, _| {
        let rx = this_regexp(interp, &this, "flags")?;
        let flags = regexp_parts(interp, rx).1;
        // 正準順に並べ直す
        let ordered: String = "dgimsuvy".chars().filter(|f| flags.contains(*f)).collect();
        Ok(Value::string(ordered))
    });
    for (name, flag) in [
        ("hasIndices", 'd'),
        ("global", 'g'),
        ("ignoreCase", 'i'),
        ("multiline", 'm'),
        ("dotAll", 's'),
        ("unicode", 'u'),
        ("unicodeSets", 'v'),
        ("sticky", 'y'),
    ] {
        interp.define_getter(proto, name, move |interp, this, _| {
            let rx = this_regexp(interp, &this, name)?;
            Ok(Value::Boolean(has_flag(interp, rx, flag)))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::translate;
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// 構文の書き換え。
    fn translation() {
        assert_eq!(translate("a{", ""), "a\\{");
        assert_eq!(translate("a{2,3}", "i"), "(?i)a{2,3}");
        assert_eq!(translate("(?<year>\\d+)", ""), "(?P<year>[0-9]+)");
        assert_eq!(translate("(?<=x)y", ""), "(?<=x)y");
        assert_eq!(translate("[^]\\/", ""), "[\\s\\S]/");
        assert_eq!(translate("\\u0041", ""), "\\x{0041}");
    }

    #[test]
    /// exec の配列とグループ。
    fn exec_results() {
        assert_eq!(eval_display("const m = /(\\d+)-(\\d+)/.exec('tel 12-34'); [m[0], m[1], m[2], m.index].join()"), "12-34,12,34,4");
        assert_eq!(eval_display("/(?<y>\\d{4})/.exec('in 2024').groups.y"), "2024");
        assert_eq!(eval_display("/x/.exec('abc')"), "null");
    }

    #[test]
    /// g フラグでは lastIndex が進む。
    fn global_last_index() {
        assert_eq!(eval_display("const r = /a/g; r.test('aa'); r.test('aa'); const t = r.test('aa'); [t, r.lastIndex].join()"), "false,0");
        assert_eq!(eval_display("const r = /o/y; r.lastIndex = 1; r.test('foo')"), "true");
    }

    #[test]
    /// 文字列メソッドとの連携。
    fn string_integration() {
        assert_eq!(eval_display("'a1b22c'.split(/\\d+/).join('|')"), "a|b|c");
        assert_eq!(eval_display("'abc'.split(/(b)/).join('|')"), "a|b|c");
        assert_eq!(eval_display("'x-y-z'.replace(/-/g, '+')"), "x+y+z");
        assert_eq!(eval_display("'John Smith'.replace(/(\\w+) (\\w+)/, '$2, $1')"), "Smith, John");
        assert_eq!(eval_display("'aaa'.replace(/a/g, (m, i) => i)"), "012");
        assert_eq!(eval_display("'a1b2'.match(/\\d/g).join()"), "1,2");
        assert_eq!(eval_display("'hello'.search(/l+/)"), "2");
        assert_eq!(eval_display("'ab'.replace(/(?=b)/, '-')"), "a-b");
    }

    #[test]
    /// 表示と不正なパターン。
    fn source_and_errors() {
        assert_eq!(eval_display("String(/a\\/b/gi)"), "/a\\/b/gi");
        assert_eq!(eval_display("new RegExp('').source"), "(?:)");
        assert!(eval_display("new RegExp('(')").starts_with("throw SyntaxError: Invalid regular expression: /(/:"));
        assert_eq!(eval_display("new RegExp('a', 'gg')"), "throw SyntaxError: Invalid regular expression flags 'gg'");
    }
}
