// パス: tests/repl_session.rs
// 役割: 対話セッションを通した入力→実行→表示の流れを確認する
// 意図: REPL 専用グローバル（_ / save / loadJSON / loadINI / exit）を実ファイルで試す
// 関連ファイル: src/repl/cmd.rs, src/repl/globals.rs, src/repl/driver.rs
#[path = "test_support.rs"]
mod support;

use std::fs;

use jsrepl::repl::driver::ExecutionOutcome;
use jsrepl::repl::ReplOptions;
use support::{js_string, session, session_with, transcript};

#[test]
/// 各単位の値が 1 行ずつ表示される。
fn transcript_of_simple_units() {
    let out = transcript(&["1 + 1\n", "let s = 'hi'\n", "s + '!'\n"]);
    assert_eq!(out, "2\nundefined\n\"hi!\"\n");
}

#[test]
fn underscore_holds_previous_value() {
    let out = transcript(&["[1, 2]\n", "_.length\n", "_ + 1\n"]);
    assert_eq!(out, "[ 1, 2 ]\n2\n3\n");
}

#[test]
/// `_` に代入すると通常の変数に戻り、以後は自動更新されない。
fn assigning_underscore_disables_tracking() {
    let out = transcript(&["_ = 5\n", "10\n", "_\n"]);
    assert_eq!(out, "Disable writing last value to '_'\n5\n10\n5\n");
}

#[test]
fn uncaught_errors_keep_the_session_alive() {
    let (mut session, buffer) = session();
    let outcome = session.evaluate("throw new TypeError('bad')\n");
    assert!(matches!(outcome, ExecutionOutcome::Thrown(_)));
    assert!(buffer.take().starts_with("Uncaught exception: [TypeError] bad"));
    session.evaluate("40 + 2\n");
    assert_eq!(buffer.take(), "42\n");
}

#[test]
/// 構文エラーはヒント行の後にメッセージと例外表示が続く。
fn syntax_errors_are_reported_with_hint() {
    let (mut session, buffer) = session();
    let outcome = session.evaluate("let x = ;\n");
    assert!(matches!(outcome, ExecutionOutcome::SyntaxError { .. }));
    let out = buffer.take();
    let lines: Vec<&str> = out.lines().collect();
    assert!(lines.len() >= 3, "{:?}", lines);
    assert!(lines.last().is_some_and(|l| l.starts_with("Uncaught exception: [SyntaxError]")));
    assert!(out.contains("(line: 1, column:"), "{}", out);
}

#[test]
fn hints_can_be_disabled() {
    let options = ReplOptions {
        disable_source_location_hints: true,
        ..ReplOptions::default()
    };
    let (mut session, buffer) = session_with(options);
    session.evaluate("let x = ;\n");
    assert_eq!(buffer.take().lines().count(), 2);
}

#[test]
/// `save` は自分自身を呼んだ単位を除いた履歴を書く。
fn save_writes_previous_units() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.js");
    let (mut session, buffer) = session();
    session.evaluate("let a = 1\n");
    session.evaluate("a + 1\n");
    session.evaluate(&format!("save({})\n", js_string(&path.to_string_lossy())));
    assert!(buffer.take().ends_with("true\n"));
    assert_eq!(fs::read_to_string(&path).expect("read"), "let a = 1\na + 1\n");
    assert_eq!(session.statements().len(), 3);
}

#[test]
fn save_reports_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("missing").join("out.js");
    let (mut session, buffer) = session();
    session.evaluate(&format!("save({})\n", js_string(&path.to_string_lossy())));
    assert_eq!(buffer.take(), "false\n");
}

#[test]
fn load_json_and_ini_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let json = dir.path().join("data.json");
    fs::write(&json, r#"{"name": "box", "sizes": [1, 2]}"#).expect("write json");
    let ini = dir.path().join("conf.ini");
    fs::write(&ini, "; comment\n[server]\nport = 8080\nhost=localhost\n").expect("write ini");

    let (mut session, buffer) = session();
    session.evaluate(&format!("loadJSON({}).sizes\n", js_string(&json.to_string_lossy())));
    assert_eq!(buffer.take(), "[ 1, 2 ]\n");
    session.evaluate(&format!("loadINI({}).server\n", js_string(&ini.to_string_lossy())));
    assert_eq!(buffer.take(), "{ \"port\": \"8080\", \"host\": \"localhost\" }\n");
}

#[test]
/// 壊れた JSON は SyntaxError として投げられる。
fn malformed_json_throws() {
    let dir = tempfile::tempdir().expect("tempdir");
    let json = dir.path().join("bad.json");
    fs::write(&json, "{ nope").expect("write");
    let (mut session, buffer) = session();
    session.evaluate(&format!("loadJSON({})\n", js_string(&json.to_string_lossy())));
    assert!(buffer
        .take()
        .starts_with("Uncaught exception: [SyntaxError] Malformed JSON string"));
}

#[test]
fn exit_ends_with_code() {
    let (mut session, _buffer) = session();
    assert!(matches!(session.evaluate("exit(3)\n"), ExecutionOutcome::Exit(3)));
    assert!(matches!(session.evaluate("exit()\n"), ExecutionOutcome::Exit(0)));
}

#[test]
/// 連続する同名フレームは省略されて表示される。
fn deep_recursion_trace_is_compressed() {
    let (mut session, buffer) = session();
    session.evaluate("function down(n) { if (n == 0) throw new Error('bottom'); down(n - 1) }\n");
    buffer.take();
    session.evaluate("down(7)\n");
    let out = buffer.take();
    assert!(out.starts_with("Uncaught exception: [Error] bottom\n"), "{}", out);
    assert!(out.contains(" -> down\n"), "{}", out);
    assert!(out.contains(" more calls\n"), "{}", out);
    assert!(out.ends_with(" -> (global)\n"), "{}", out);
}
