// パス: tests/value_printer.rs
// 役割: 値表示器の統合テスト
// 意図: 循環・冪等性・空の複合値・副作用なし読み出しを利用者目線で確認する
// 関連ファイル: src/repl/printer/mod.rs, src/repl/util.rs
#[path = "test_support.rs"]
mod support;

use jsrepl::interpreter::Interpreter;
use jsrepl::repl::printer::render;
use jsrepl::repl::util::strip_ansi;
use support::{eval, shown};

#[test]
/// 自己参照は「既出」の印になり、再帰しない。
fn cyclic_object_terminates() {
    let text = shown("let a = {}; a.self = a; a");
    assert!(text.starts_with("{ \"self\": <already printed Object #"), "{}", text);
    assert!(text.ends_with("> }"), "{}", text);
}

#[test]
/// 非循環の構造は描画のたびに同じ文字列になる。
fn rendering_is_idempotent() {
    let mut interp = Interpreter::headless();
    let value = eval(&mut interp, "({ list: [1, 'two', { deep: null }], flag: true })");
    let first = render(&interp.heap, &value);
    let second = render(&interp.heap, &value);
    assert_eq!(first, second);
    assert_eq!(
        strip_ansi(&first),
        "{ \"list\": [ 1, \"two\", { \"deep\": null } ], \"flag\": true }"
    );
}

#[test]
/// 空の複合値は内側に空白を持たない。
fn empty_composites_have_no_padding() {
    assert_eq!(shown("({})"), "{}");
    assert_eq!(shown("[]"), "[]");
    assert_eq!(shown("[[], {}]"), "[ [], {} ]");
}

#[test]
/// 同じオブジェクトへの 2 度目の参照も既出扱いになる。
fn repeated_reference_is_collapsed() {
    let text = shown("const o = {}; [o, o]");
    assert!(text.starts_with("[ {}, <already printed Object #"), "{}", text);
}

#[test]
fn primitives() {
    assert_eq!(shown("-0"), "-0");
    assert_eq!(shown("'s'"), "\"s\"");
    assert_eq!(shown("10n"), "10");
    assert_eq!(shown("undefined"), "undefined");
    assert_eq!(shown("null"), "null");
}

#[test]
/// 添字付きの項目が名前付きの項目より先に並ぶ。
fn indexed_entries_come_first() {
    assert_eq!(
        shown("({ b: 1, 1: 'x', a: 2, 0: 'y' })"),
        "{ \"0\": \"y\", \"1\": \"x\", \"b\": 1, \"a\": 2 }"
    );
}

#[test]
/// 表示でゲッターやプロキシのトラップが走らない。
fn rendering_has_no_side_effects() {
    let mut interp = Interpreter::headless();
    let value = eval(
        &mut interp,
        "globalThis.hits = 0; const p = new Proxy({}, { get() { hits++; return 1 } }); \
         ({ get g() { hits++; return 2 }, p })",
    );
    render(&interp.heap, &value);
    let hits = eval(&mut interp, "hits");
    assert_eq!(interp.heap.display_string(&hits), "0");
}

#[test]
fn error_values_show_name_and_message() {
    assert_eq!(shown("new RangeError('too far')"), "[RangeError] too far");
    assert_eq!(
        shown("function MyError(m) { this.message = m } MyError.prototype = Object.create(Error.prototype); new MyError('m')"),
        "[Error] m"
    );
}

#[test]
fn collections_and_buffers() {
    assert_eq!(shown("new Map([[1, 'a']])"), "[Map] { 1 => \"a\" }");
    assert_eq!(shown("new Set([1, 2])"), "[Set] { 1, 2 }");
    let text = shown("new Uint8Array([1, 255])");
    assert!(text.starts_with("[Uint8Array]\n  length: 2\n  byteLength: 2"), "{}", text);
    assert!(text.ends_with("\n[ 1, 255 ]"), "{}", text);
}

#[test]
/// 色付き出力は除去すると色なし出力と一致する。
fn ansi_stripping_is_exact() {
    assert_eq!(strip_ansi("\x1b[31;1mX\x1b[0m"), "X");
    let mut interp = Interpreter::headless();
    let value = eval(&mut interp, "[1, 'a', true]");
    let colored = render(&interp.heap, &value);
    assert!(colored.contains("\x1b[35;1m") || colored.contains("\x1b[35m"), "{:?}", colored);
    assert_eq!(strip_ansi(&colored), "[ 1, \"a\", true ]");
}
