// パス: src/repl/printer/mod.rs
// 役割: 実行結果の値を ANSI 装飾付きの文字列へ描画する表示器とヘルプ文
// 意図: 値の種類ごとの分岐を固定順で一箇所にまとめ、副作用なしの読み出しだけで描画する
// 関連ファイル: src/repl/printer/temporal.rs, src/repl/printer/intl.rs, runtime_heap/src/heap.rs
//! 値表示器
//!
//! - 1 回の描画ごとに新しい既出集合を使い、循環参照は `<already printed Object #N>` で止める。
//! - オブジェクトの読み出しは `get_without_side_effects` 系のみ。ゲッターやプロキシは起動しない。
//! - 要素の読み出しに失敗したら、その複合値の描画をそこで打ち切る（閉じ括弧も出さない）。

mod intl;
mod temporal;

use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::{self, Write};

use runtime_heap::{Heap, ObjectId, ObjectKind, PromiseState, PropertyKey, ReadError, Slot, Value};

use crate::interpreter::date_to_string;

const HELP_TEXT: &str = concat!(
    "REPL commands:\n",
    "    exit(code): exit the REPL with specified code. Defaults to 0.\n",
    "    help(): display this menu\n",
    "    loadINI(file): load the given file as INI.\n",
    "    loadJSON(file): load the given file as JSON.\n",
    "    print(value): pretty-print the given JS value.\n",
    "    save(file): write REPL input history to the given file. For example: save(\"foo.txt\")\n",
);

/// REPL 専用関数の一覧を任意のライターへ描画する。
pub(crate) fn render_help<W: Write>(out: &mut W) -> io::Result<()> {
    out.write_all(HELP_TEXT.as_bytes())
}

/// 値を 1 回分描画する。既出集合は呼び出しごとに空から始まる。
pub fn render(heap: &Heap, value: &Value) -> String {
    let mut printer = Printer::new(heap);
    printer.value(value);
    printer.out
}

pub(crate) struct Printer<'h> {
    heap: &'h Heap,
    seen: HashSet<ObjectId>,
    out: String,
}

impl<'h> Printer<'h> {
    fn new(heap: &'h Heap) -> Self {
        Self {
            heap,
            seen: HashSet::new(),
            out: String::new(),
        }
    }

    fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn type_tag(&mut self, name: &str) {
        let _ = write!(self.out, "[\x1b[36;1m{}\x1b[0m]", name);
    }

    fn separator(&mut self, first: &mut bool) {
        self.push(if *first { " " } else { ", " });
        *first = false;
    }

    /// `\n  name: ` に続けて値を描画する。
    fn field(&mut self, name: &str, value: &Value) {
        let _ = write!(self.out, "\n  {}: ", name);
        self.value(value);
    }

    fn string_field(&mut self, name: &str, text: &str) {
        self.field(name, &Value::string(text));
    }

    fn optional_string_field(&mut self, name: &str, text: Option<&str>) {
        if let Some(text) = text {
            self.string_field(name, text);
        }
    }

    fn number_field(&mut self, name: &str, n: f64) {
        self.field(name, &Value::Number(n));
    }

    fn optional_number_field(&mut self, name: &str, n: Option<u32>) {
        if let Some(n) = n {
            self.number_field(name, n as f64);
        }
    }

    pub(crate) fn value(&mut self, value: &Value) {
        match value {
            Value::Empty => self.push("\x1b[34;1m<empty>\x1b[0m"),
            Value::Object(id) => {
                if !self.seen.insert(*id) {
                    let _ = write!(self.out, "<already printed Object #{}>", id.index());
                    return;
                }
                self.object(*id);
            }
            primitive => self.primitive(primitive),
        }
    }

    fn primitive(&mut self, value: &Value) {
        let color = match value {
            Value::String(_) => "\x1b[32;1m",
            Value::Number(_) | Value::BigInt(_) => "\x1b[35;1m",
            Value::Boolean(_) | Value::Null => "\x1b[33;1m",
            Value::Undefined => "\x1b[34;1m",
            _ => "",
        };
        self.push(color);
        let text = self.heap.display_string(value);
        if let Value::String(_) = value {
            let _ = write!(self.out, "\"{}\"", text);
        } else {
            if value.is_negative_zero() {
                self.push("-");
            }
            self.push(&text);
        }
        self.push("\x1b[0m");
    }

    fn object(&mut self, id: ObjectId) {
        let heap = self.heap;
        match &heap.kind(id) {
            ObjectKind::Array { .. } => self.array(id),
            ObjectKind::Function(data) => {
                self.type_tag(data.type_name());
                let _ = write!(self.out, " {}", data.name);
            }
            ObjectKind::BoundFunction { .. } => self.type_tag("BoundFunction"),
            ObjectKind::Date(t) => {
                self.type_tag("Date");
                let _ = write!(self.out, " \x1b[34;1m{}\x1b[0m", date_to_string(*t));
            }
            ObjectKind::Error { .. } => self.error(id),
            _ if self.inherits_error_prototype(id) => self.error(id),
            ObjectKind::RegExp { source, flags } => {
                self.type_tag("RegExp");
                let _ = write!(self.out, " \x1b[34;1m/{}/{}\x1b[0m", source, flags);
            }
            ObjectKind::Map(entries) => {
                self.type_tag("Map");
                self.push(" {");
                let mut first = true;
                for (key, value) in entries.values() {
                    self.separator(&mut first);
                    self.value(key);
                    self.push(" => ");
                    self.value(value);
                }
                self.close(first, "}");
            }
            ObjectKind::Set(entries) => {
                self.type_tag("Set");
                self.push(" {");
                let mut first = true;
                for value in entries.values() {
                    self.separator(&mut first);
                    self.value(value);
                }
                self.close(first, "}");
            }
            ObjectKind::WeakMap(entries) => {
                self.type_tag("WeakMap");
                let _ = write!(self.out, " ({})", entries.len());
            }
            ObjectKind::WeakSet(entries) => {
                self.type_tag("WeakSet");
                let _ = write!(self.out, " ({})", entries.len());
            }
            ObjectKind::WeakRef(target) => {
                self.type_tag("WeakRef");
                self.push(" ");
                let target = target.map(Value::Object).unwrap_or(Value::Undefined);
                self.value(&target);
            }
            ObjectKind::DataView {
                buffer,
                byte_offset,
                byte_length,
            } => {
                self.type_tag("DataView");
                self.number_field("byteLength", *byte_length as f64);
                self.number_field("byteOffset", *byte_offset as f64);
                self.push("\n  buffer: ");
                self.type_tag("ArrayBuffer");
                let _ = write!(self.out, " @ #{}", buffer.index());
            }
            ObjectKind::Proxy { target, handler } => {
                self.type_tag("Proxy");
                self.field("target", &Value::Object(*target));
                self.field("handler", &Value::Object(*handler));
            }
            ObjectKind::Promise(promise) => {
                self.type_tag("Promise");
                self.push("\n  state: ");
                match promise.state {
                    PromiseState::Pending => self.push("\x1b[36;1mPending\x1b[0m"),
                    PromiseState::Fulfilled => {
                        self.push("\x1b[32;1mFulfilled\x1b[0m");
                        self.field("result", &promise.result);
                    }
                    PromiseState::Rejected => {
                        self.push("\x1b[31;1mRejected\x1b[0m");
                        self.field("result", &promise.result);
                    }
                }
            }
            ObjectKind::ArrayBuffer(bytes) => {
                self.type_tag("ArrayBuffer");
                let bytes = bytes.as_deref().unwrap_or(&[]);
                self.number_field("byteLength", bytes.len() as f64);
                self.hex_dump(bytes);
            }
            ObjectKind::ShadowRealm => self.type_tag("ShadowRealm"),
            ObjectKind::Generator => self.type_tag("Generator"),
            ObjectKind::AsyncGenerator => self.type_tag("AsyncGenerator"),
            ObjectKind::TypedArray { .. } => self.typed_array(id),
            ObjectKind::Temporal(temporal) => self.temporal(temporal),
            ObjectKind::Intl(intl) => self.intl(intl),
            ObjectKind::BooleanObject(b) => {
                self.type_tag("Boolean");
                self.push(" ");
                self.value(&Value::Boolean(*b));
            }
            ObjectKind::NumberObject(n) => {
                self.type_tag("Number");
                self.push(" ");
                self.value(&Value::Number(*n));
            }
            ObjectKind::StringObject(s) => {
                self.type_tag("String");
                self.push(" ");
                self.value(&Value::String(s.clone()));
            }
            ObjectKind::Ordinary => self.generic(id),
        }
    }

    /// 空でなければ閉じ括弧の前に空白を 1 つ入れる。
    fn close(&mut self, first: bool, bracket: &str) {
        if !first {
            self.push(" ");
        }
        self.push(bracket);
    }

    fn inherits_error_prototype(&self, id: ObjectId) -> bool {
        let error_prototype = self.heap.intrinsics().error_prototype;
        let mut visited = HashSet::new();
        let mut current = self.heap.prototype_of(id);
        while let Some(proto) = current {
            if proto == error_prototype {
                return true;
            }
            if !visited.insert(proto) {
                break;
            }
            current = self.heap.prototype_of(proto);
        }
        false
    }

    fn array(&mut self, id: ObjectId) {
        let heap = self.heap;
        self.push("[");
        let mut first = true;
        let indices: Vec<u32> = heap.object(id).indexed_entries().map(|(i, _)| i).collect();
        for index in indices {
            self.separator(&mut first);
            match heap.element_without_side_effects(id, index) {
                Ok(value) => self.value(&value),
                Err(_) => return,
            }
        }
        self.close(first, "]");
    }

    fn generic(&mut self, id: ObjectId) {
        let heap = self.heap;
        let object = heap.object(id);
        self.push("{");
        let mut first = true;
        let indices: Vec<u32> = object.indexed_entries().map(|(i, _)| i).collect();
        for index in indices {
            self.separator(&mut first);
            let _ = write!(self.out, "\"\x1b[33;1m{}\x1b[0m\": ", index);
            match heap.element_without_side_effects(id, index) {
                Ok(value) => self.value(&value),
                Err(_) => return,
            }
        }
        for (key, property) in object.named_entries() {
            let Slot::Data(value) = &property.slot else {
                continue;
            };
            self.separator(&mut first);
            match key {
                PropertyKey::String(name) => {
                    let _ = write!(self.out, "\"\x1b[33;1m{}\x1b[0m\": ", name);
                }
                PropertyKey::Symbol(_) => {
                    let _ = write!(self.out, "[\x1b[33;1m{}\x1b[0m]: ", heap.key_display(key));
                }
            }
            self.value(value);
        }
        self.close(first, "}");
    }

    /// `name` / `message` がアクセサなら通常のオブジェクトとして描画する。
    fn error(&mut self, id: ObjectId) {
        let heap = self.heap;
        let read = |key: &str| -> Result<Value, ReadError> {
            Ok(heap
                .get_without_side_effects(id, &PropertyKey::from(key))?
                .unwrap_or(Value::Undefined))
        };
        match (read("name"), read("message")) {
            (Ok(name), Ok(message)) => {
                let name = heap.display_string(&name);
                let message = heap.display_string(&message);
                self.type_tag(&name);
                if !message.is_empty() {
                    let _ = write!(self.out, " \x1b[31;1m{}\x1b[0m", message);
                }
            }
            _ => self.generic(id),
        }
    }

    /// 16 バイトごとに 2 つの空白、32 バイトごとに改行を入れる。
    fn hex_dump(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.push("\n");
        for (i, byte) in bytes.iter().enumerate() {
            let _ = write!(self.out, "{:02x}", byte);
            let next = i + 1;
            if next < bytes.len() {
                if next % 32 == 0 {
                    self.push("\n");
                } else if next % 16 == 0 {
                    self.push("  ");
                } else {
                    self.push(" ");
                }
            }
        }
    }

    fn typed_array(&mut self, id: ObjectId) {
        let heap = self.heap;
        let ObjectKind::TypedArray {
            kind,
            buffer,
            length,
            ..
        } = heap.kind(id)
        else {
            return;
        };
        let detached = heap.array_buffer_bytes(*buffer).is_none();
        self.type_tag(kind.class_name());
        self.number_field("length", *length as f64);
        let byte_length = if detached { 0 } else { length * kind.element_size() };
        self.number_field("byteLength", byte_length as f64);
        self.push("\n  buffer: ");
        self.type_tag("ArrayBuffer");
        if detached {
            self.push(" (detached)");
        }
        let _ = write!(self.out, " @ #{}", buffer.index());
        if *length == 0 || detached {
            return;
        }
        self.push("\n[ ");
        for index in 0..*length {
            if index > 0 {
                self.push(", ");
            }
            match heap.typed_array_element(id, index) {
                Ok(Some(element)) => {
                    let _ = write!(self.out, "\x1b[35;1m{}\x1b[0m", heap.display_string(&element));
                }
                Ok(None) | Err(_) => return,
            }
        }
        self.push(" ]");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Interpreter;
    use crate::repl::util::strip_ansi;

    fn eval(src: &str) -> (Interpreter, Value) {
        let mut interp = Interpreter::headless();
        let value = crate::interpreter::test_util::eval(&mut interp, src).expect("eval");
        (interp, value)
    }

    fn shown(src: &str) -> String {
        let (interp, value) = eval(src);
        strip_ansi(&render(&interp.heap, &value))
    }

    fn raw(src: &str) -> String {
        let (interp, value) = eval(src);
        render(&interp.heap, &value)
    }

    #[test]
    fn render_help_outputs_expected_text() {
        let mut buf = Vec::new();
        render_help(&mut buf).unwrap();
        let rendered = String::from_utf8(buf).unwrap();
        assert_eq!(rendered, HELP_TEXT);
        assert!(rendered.starts_with("REPL commands:\n"));
    }

    #[test]
    /// プリミティブは種類ごとの色で描画され、文字列は引用符で囲まれる。
    fn primitives_carry_colors() {
        assert_eq!(raw("'s'"), "\x1b[32;1m\"s\"\x1b[0m");
        assert_eq!(raw("1.5"), "\x1b[35;1m1.5\x1b[0m");
        assert_eq!(raw("10n"), "\x1b[35;1m10\x1b[0m");
        assert_eq!(raw("true"), "\x1b[33;1mtrue\x1b[0m");
        assert_eq!(raw("null"), "\x1b[33;1mnull\x1b[0m");
        assert_eq!(raw("undefined"), "\x1b[34;1mundefined\x1b[0m");
        assert_eq!(shown("-0"), "-0");
    }

    #[test]
    fn empty_sentinel_has_marker() {
        let interp = Interpreter::headless();
        assert_eq!(render(&interp.heap, &Value::Empty), "\x1b[34;1m<empty>\x1b[0m");
    }

    #[test]
    /// 空の複合値は内側に空白を持たず、空でなければ前後に 1 つずつ入る。
    fn empty_and_filled_composites() {
        assert_eq!(shown("[]"), "[]");
        assert_eq!(shown("({})"), "{}");
        assert_eq!(shown("[1, 2]"), "[ 1, 2 ]");
        assert_eq!(shown("({a: 1, b: 'x'})"), "{ \"a\": 1, \"b\": \"x\" }");
        assert_eq!(shown("({2: true, z: null, 1: 0})"), "{ \"1\": 0, \"2\": true, \"z\": null }");
    }

    #[test]
    fn array_holes_are_skipped() {
        assert_eq!(shown("[1, , 3]"), "[ 1, 3 ]");
    }

    #[test]
    /// 循環参照は既出マーカーで止まり、同じ構造の再描画は同一になる。
    fn cycles_terminate_and_rendering_is_repeatable() {
        let (interp, value) = eval("let a = {}; a.self = a; a");
        let Value::Object(id) = value else {
            panic!("object expected");
        };
        let text = strip_ansi(&render(&interp.heap, &value));
        assert_eq!(
            text,
            format!("{{ \"self\": <already printed Object #{}> }}", id.index())
        );
        assert_eq!(render(&interp.heap, &value), render(&interp.heap, &value));
    }

    #[test]
    /// 要素の読み出しに失敗した複合値だけが打ち切られ、外側の描画は続く。
    fn unreadable_element_cuts_only_its_composite() {
        assert_eq!(
            shown("const a = [1]; Object.defineProperty(a, '1', { get() { return 2 } }); [a, 'after']"),
            "[ [ 1, , \"after\" ]"
        );
    }

    #[test]
    fn functions_report_their_kind() {
        assert_eq!(shown("(function foo() {})"), "[Function] foo");
        assert_eq!(shown("(function* gen() {})"), "[GeneratorFunction] gen");
        assert_eq!(shown("(async function af() {})"), "[AsyncFunction] af");
        assert_eq!(shown("(async function* ag() {})"), "[AsyncGeneratorFunction] ag");
        assert_eq!(shown("parseInt"), "[NativeFunction] parseInt");
        assert_eq!(shown("[].push"), "[NativeFunction] push");
    }

    #[test]
    /// Error は名前とメッセージだけ、プロトタイプ継承でも同様に描画する。
    fn errors_show_name_and_message() {
        assert_eq!(raw("new TypeError('bad')"), "[\x1b[36;1mTypeError\x1b[0m] \x1b[31;1mbad\x1b[0m");
        assert_eq!(shown("new Error()"), "[Error]");
        assert_eq!(
            shown("let e = Object.create(Error.prototype); e.message = 'm'; e"),
            "[Error] m"
        );
    }

    #[test]
    fn error_with_accessor_falls_back_to_object() {
        let text = shown(
            "let e = Object.create(Error.prototype); Object.defineProperty(e, 'message', { get() { throw 1 } }); e.x = 1; e",
        );
        assert_eq!(text, "{ \"x\": 1 }");
    }

    #[test]
    fn collections_render_entries() {
        assert_eq!(shown("new Map([[1, 'a'], ['k', {}]])"), "[Map] { 1 => \"a\", \"k\" => {} }");
        assert_eq!(shown("new Set([1, 2])"), "[Set] { 1, 2 }");
        assert_eq!(shown("new Set()"), "[Set] {}");
        assert_eq!(shown("let k = {}; let w = new WeakMap(); w.set(k, 1); w"), "[WeakMap] (1)");
        assert_eq!(shown("new WeakSet()"), "[WeakSet] (0)");
        assert_eq!(shown("new WeakRef({})"), "[WeakRef] {}");
    }

    #[test]
    fn regexp_and_boxed_values() {
        assert_eq!(shown("/ab+c/gi"), "[RegExp] /ab+c/gi");
        assert_eq!(shown("new Boolean(false)"), "[Boolean] false");
        assert_eq!(shown("new Number(-0)"), "[Number] -0");
        assert_eq!(shown("new String('hi')"), "[String] \"hi\"");
    }

    #[test]
    fn promises_show_state_and_result() {
        assert_eq!(shown("Promise.resolve(3)"), "[Promise]\n  state: Fulfilled\n  result: 3");
        assert_eq!(shown("new Promise(() => {})"), "[Promise]\n  state: Pending");
    }

    #[test]
    /// 16 バイトで 2 空白、32 バイトで改行。
    fn array_buffer_hex_dump_wraps() {
        let text = shown("let b = new ArrayBuffer(33); new Uint8Array(b)[0] = 255; b");
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("[ArrayBuffer]"));
        assert_eq!(lines.next(), Some("  byteLength: 33"));
        let first = lines.next().unwrap();
        assert!(first.starts_with("ff 00"));
        assert_eq!(first.matches("  ").count(), 1);
        assert_eq!(lines.next(), Some("00"));
        assert_eq!(shown("new ArrayBuffer(0)"), "[ArrayBuffer]\n  byteLength: 0");
    }

    #[test]
    fn typed_arrays_list_elements() {
        let (interp, value) = eval("let t = new Int16Array(2); t[1] = -4; t");
        let text = strip_ansi(&render(&interp.heap, &value));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[Int16Array]");
        assert_eq!(lines[1], "  length: 2");
        assert_eq!(lines[2], "  byteLength: 4");
        assert!(lines[3].starts_with("  buffer: [ArrayBuffer] @ #"));
        assert_eq!(lines[4], "[ 0, -4 ]");
    }

    #[test]
    fn proxy_shows_target_and_handler() {
        assert_eq!(
            shown("new Proxy({a: 1}, {})"),
            "[Proxy]\n  target: { \"a\": 1 }\n  handler: {}"
        );
    }

    #[test]
    /// 表示のためにゲッターが呼ばれることはない。
    fn rendering_does_not_run_getters() {
        let (mut interp, value) = eval("let hits = 0; ({ get g() { hits++; return 1 }, v: 2 })");
        assert_eq!(strip_ansi(&render(&interp.heap, &value)), "{ \"v\": 2 }");
        let hits = crate::interpreter::test_util::eval(&mut interp, "hits").expect("eval");
        assert!(matches!(hits, Value::Number(n) if n == 0.0));
    }
}
