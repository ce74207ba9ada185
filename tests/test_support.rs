// パス: tests/test_support.rs
// 役割: 統合テスト共通の補助関数を提供する
// 意図: 評価・表示・セッション操作の繰り返しを一元化しテストを簡潔に保つ
// 関連ファイル: tests/value_printer.rs, tests/repl_session.rs, tests/completion.rs
#![allow(dead_code)]
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use jsrepl::interpreter::{Abrupt, Interpreter};
use jsrepl::parser::{parse_program, ParseMode};
use jsrepl::repl::printer::render;
use jsrepl::repl::util::{strip_ansi, Output, SharedBuffer};
use jsrepl::repl::{ReplOptions, ReplSession};
use runtime_heap::Value;

/// ソースを実行し、ジョブキューも消化した値を返す。
pub fn eval(interp: &mut Interpreter, src: &str) -> Value {
    let program = parse_program(src, ParseMode::Script).expect("parse");
    let value = match interp.run_program(&program) {
        Ok(value) => value,
        Err(Abrupt::Throw(err)) => panic!("uncaught: {}", interp.describe_error(&err)),
        Err(Abrupt::Exit(code)) => panic!("exit({})", code),
    };
    if let Err(Abrupt::Throw(err)) = interp.run_jobs() {
        panic!("uncaught in job: {}", interp.describe_error(&err));
    }
    value
}

/// 新しい realm で評価した値の色なし表示。
pub fn shown(src: &str) -> String {
    let mut interp = Interpreter::headless();
    let value = eval(&mut interp, src);
    strip_ansi(&render(&interp.heap, &value))
}

/// 出力を溜める対話セッション（色なし）。
pub fn session() -> (ReplSession, SharedBuffer) {
    session_with(ReplOptions::default())
}

pub fn session_with(options: ReplOptions) -> (ReplSession, SharedBuffer) {
    let buffer = SharedBuffer::new();
    let output: Rc<Output> = Output::new(Box::new(buffer.clone()), true);
    let session = ReplSession::new(options, output, Arc::new(AtomicBool::new(false)));
    (session, buffer)
}

/// 単位を順に評価し、出力全体を返す。
pub fn transcript(units: &[&str]) -> String {
    let (mut session, buffer) = session();
    for unit in units {
        session.evaluate(unit);
    }
    buffer.take()
}

/// JS の文字列リテラルとして埋め込める形にする。
pub fn js_string(text: &str) -> String {
    serde_json::to_string(text).expect("quote")
}
