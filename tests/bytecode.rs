// パス: tests/bytecode.rs
// 役割: -d / -b / -p の組み合わせでセッションの出力が変わらないことを確認する
// 関連ファイル: src/bytecode/mod.rs, src/bytecode/passes.rs, src/repl/driver.rs
#[path = "test_support.rs"]
mod support;

use jsrepl::bytecode::{lower, optimize};
use jsrepl::repl::driver::ExecutionOutcome;
use jsrepl::repl::ReplOptions;
use jsrepl::{parse_program, ParseMode};
use support::session_with;

const UNITS: &[&str] = &[
    "let total = 0\n",
    "for (let i = 1; i <= 4; i++) { total += i * 2 } total\n",
    "function pair(a, b) { return [a, b] }\n",
    "pair('x', 2 + 3)\n",
    "({ k: total > 10 ? 'big' : 'small' })\n",
];

fn run_all(options: ReplOptions) -> String {
    let (mut session, buffer) = session_with(options);
    for unit in UNITS {
        session.evaluate(unit);
    }
    buffer.take()
}

#[test]
/// 木評価・バイトコード・最適化済みバイトコードで同じ表示になる。
fn all_execution_paths_agree() {
    let tree = run_all(ReplOptions::default());
    let bytecode = run_all(ReplOptions {
        run_bytecode: true,
        ..ReplOptions::default()
    });
    let optimized = run_all(ReplOptions {
        run_bytecode: true,
        optimize_bytecode: true,
        ..ReplOptions::default()
    });
    assert_eq!(tree, "undefined\n20\nundefined\n[ \"x\", 5 ]\n{ \"k\": \"big\" }\n");
    assert_eq!(bytecode, tree);
    assert_eq!(optimized, tree);
}

#[test]
/// 表示だけのときは実行せず、束縛も作られない。
fn dump_without_run_does_not_execute() {
    let (mut session, buffer) = session_with(ReplOptions {
        dump_bytecode: true,
        ..ReplOptions::default()
    });
    let outcome = session.evaluate("var dumped = 1 + 2\n");
    assert!(matches!(outcome, ExecutionOutcome::NotExecuted));
    let out = buffer.take();
    assert!(out.starts_with("constants:\n"), "{}", out);
    assert!(out.contains("code:\n"), "{}", out);
    assert!(session.interpreter().global_binding("dumped").is_none());
}

#[test]
/// 最適化で命令数は増えず、畳み込まれた定数が表に現れる。
fn optimizer_shrinks_constant_expressions() {
    let program = parse_program("(2 + 3) * 4", ParseMode::Script).expect("parse");
    let plain = lower(&program).expect("lower");
    let mut folded = plain.clone();
    optimize(&mut folded);
    assert!(folded.code.len() < plain.code.len(), "{}\n{}", plain, folded);
    assert!(folded.to_string().contains("; 20"), "{}", folded);
}

#[test]
/// 変換できない構文は内部エラーとして報告され、セッションは続く。
fn unsupported_constructs_become_internal_errors() {
    let (mut session, buffer) = session_with(ReplOptions {
        run_bytecode: true,
        ..ReplOptions::default()
    });
    let outcome = session.evaluate("try { 1 } catch { 2 }\n");
    assert!(matches!(outcome, ExecutionOutcome::InternalError(_)));
    assert!(buffer.take().starts_with("Uncaught exception: [InternalError]"));
    session.evaluate("1 + 1\n");
    assert_eq!(buffer.take(), "2\n");
}
