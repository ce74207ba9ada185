// パス: tests/completion.rs
// 役割: 対話セッションで定義した名前が補完に現れるかを確認する
// 関連ファイル: src/repl/completion.rs, src/repl/cmd.rs
#[path = "test_support.rs"]
mod support;

use jsrepl::repl::completion::complete;
use support::session;

fn texts(session: &jsrepl::repl::ReplSession, line: &str) -> Vec<String> {
    complete(session.interpreter(), line, line.len())
        .into_iter()
        .map(|c| c.text)
        .collect()
}

#[test]
/// プロンプトで入力した定義がそのまま補完対象になる。
fn definitions_from_earlier_units_are_completed() {
    let (mut session, _buffer) = session();
    session.evaluate("var obj = { foo: 1, fooBar: 2, bar: 3 }\n");
    let got = complete(session.interpreter(), "obj.fo", 6);
    let names: Vec<&str> = got.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(names, vec!["foo", "fooBar"]);
    assert!(got.iter().all(|c| c.invariant_offset == 2));
}

#[test]
fn lexical_bindings_are_offered_once() {
    let (mut session, _buffer) = session();
    session.evaluate("let uniqueCounter = 0\n");
    session.evaluate("uniqueCounter++\n");
    assert_eq!(texts(&session, "uniqueC"), vec!["uniqueCounter"]);
}

#[test]
/// 組み込みのプロトタイプ鎖も辿る。
fn builtin_prototype_members() {
    let (mut session, _buffer) = session();
    session.evaluate("const list = [3, 1, 2]\n");
    let names = texts(&session, "list.so");
    assert!(names.iter().any(|n| n == "sort"), "{:?}", names);
    assert!(names.iter().any(|n| n == "some"), "{:?}", names);
    assert!(names.iter().all(|n| n.starts_with("so")), "{:?}", names);
}

#[test]
fn no_candidates_inside_unrelated_context() {
    let (mut session, _buffer) = session();
    session.evaluate("var obj = { foo: 1 }\n");
    assert!(texts(&session, "obj.foo ").is_empty());
    assert!(texts(&session, "(").is_empty());
}
