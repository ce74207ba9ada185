// パス: src/repl/driver.rs
// 役割: 完成した入力単位を解析・（任意で）下位表現へ変換・実行し、結果を呼び出し側へ返す
// 意図: 実行戦略の選択と診断出力をここに閉じ込め、表示は `report` に分けてループを単純に保つ
// 関連ファイル: src/parser/mod.rs, src/bytecode/mod.rs, src/interpreter/mod.rs, src/repl/printer/mod.rs
//! 実行ドライバ

use runtime_heap::{ObjectKind, Value};
use tracing::debug;

use crate::bytecode;
use crate::interpreter::{Abrupt, ErrorKind, Interpreter, JsResult};
use crate::parser::{parse_program, ParseMode};
use crate::repl::printer;
use crate::repl::util::Output;
use crate::repl::ReplOptions;

/// 1 単位の実行結果。
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Completed(Value),
    Thrown(Value),
    SyntaxError {
        message: String,
        hint: Option<String>,
    },
    InternalError(String),
    /// バイトコードを表示しただけで実行しなかった。
    NotExecuted,
    /// `exit()` が呼ばれた。
    Exit(i32),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ExecutionOutcome::Completed(_) | ExecutionOutcome::NotExecuted
        )
    }
}

/// `source` を `mode` で解析して実行する。
///
/// `--dump-ast` / `--dump-bytecode` の出力だけは `output` に直接書く。
pub fn run(
    interp: &mut Interpreter,
    options: &ReplOptions,
    output: &Output,
    source: &str,
    source_name: &str,
    mode: ParseMode,
) -> ExecutionOutcome {
    let _span = tracing::debug_span!("run", source = source_name).entered();

    let program = match parse_program(source, mode) {
        Ok(program) => program,
        Err(err) => {
            return ExecutionOutcome::SyntaxError {
                message: err.to_string(),
                hint: err.source_location_hint(),
            }
        }
    };

    if options.dump_ast {
        match serde_json::to_string_pretty(&program) {
            Ok(text) => output.line(&text),
            Err(err) => tracing::warn!("AST を JSON にできません: {}", err),
        }
    }

    let result = if options.dump_bytecode || options.run_bytecode {
        let mut executable = match bytecode::lower(&program) {
            Ok(executable) => executable,
            Err(err) => return ExecutionOutcome::InternalError(err.to_string()),
        };
        if options.optimize_bytecode {
            bytecode::optimize(&mut executable);
        }
        if options.dump_bytecode {
            output.write(&executable.to_string());
        }
        if !options.run_bytecode {
            return ExecutionOutcome::NotExecuted;
        }
        debug!(ops = executable.code.len(), "running bytecode");
        bytecode::run(interp, &program, &executable)
    } else {
        interp.run_program(&program)
    };

    match settle(interp, result) {
        Ok(value) => ExecutionOutcome::Completed(value),
        Err(Abrupt::Throw(value)) => ExecutionOutcome::Thrown(value),
        Err(Abrupt::Exit(code)) => ExecutionOutcome::Exit(code),
    }
}

/// 実行後にジョブキューを空にする。ジョブ中の例外も単位の結果になる。
fn settle(interp: &mut Interpreter, result: JsResult<Value>) -> JsResult<Value> {
    let value = result?;
    interp.run_jobs()?;
    Ok(value)
}

/// 結果を表示する。構文エラーと内部エラーも SyntaxError / InternalError として
/// 「Uncaught exception」の形で表示する。
pub fn report(
    interp: &mut Interpreter,
    options: &ReplOptions,
    output: &Output,
    outcome: &ExecutionOutcome,
) {
    match outcome {
        ExecutionOutcome::Completed(value) => {
            if options.print_last_result {
                output.line(&printer::render(&interp.heap, value));
            }
        }
        ExecutionOutcome::Thrown(value) => uncaught(interp, output, value),
        ExecutionOutcome::SyntaxError { message, hint } => {
            if !options.disable_source_location_hints {
                if let Some(hint) = hint.as_deref().filter(|h| !h.is_empty()) {
                    output.line(hint);
                }
            }
            output.line(message);
            let error = interp.make_error(ErrorKind::SyntaxError, message);
            uncaught(interp, output, &error);
        }
        ExecutionOutcome::InternalError(message) => {
            let error = interp.make_error(ErrorKind::InternalError, message);
            uncaught(interp, output, &error);
        }
        ExecutionOutcome::NotExecuted | ExecutionOutcome::Exit(_) => {}
    }
}

fn uncaught(interp: &Interpreter, output: &Output, value: &Value) {
    output.line(&format!(
        "Uncaught exception: {}",
        printer::render(&interp.heap, value)
    ));
    let Value::Object(id) = value else {
        return;
    };
    if let ObjectKind::Error { traceback } = interp.heap.kind(*id) {
        let names: Vec<String> = traceback.iter().map(|f| f.function_name.clone()).collect();
        for line in compress_trace(&names) {
            output.line(&line);
        }
    }
}

/// 呼び出し履歴の行。同名フレームが 4 回を超えて続いたら 1 行と回数にまとめる。
/// フレームが 1 つ以下なら何も出さない。
pub fn compress_trace(frames: &[String]) -> Vec<String> {
    let mut lines = Vec::new();
    if frames.len() <= 1 {
        return lines;
    }
    let mut repetitions = 0usize;
    for (i, frame) in frames.iter().enumerate() {
        if frames.get(i + 1) == Some(frame) {
            repetitions += 1;
            continue;
        }
        if repetitions > 4 {
            lines.push(format!(" -> {}", frame));
            lines.push(format!(" {} more calls", repetitions));
        } else {
            for _ in 0..=repetitions {
                lines.push(format!(" -> {}", frame));
            }
        }
        repetitions = 0;
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Interpreter;
    use crate::repl::util::SharedBuffer;

    fn frames(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn setup(options: ReplOptions) -> (Interpreter, std::rc::Rc<Output>, SharedBuffer, ReplOptions) {
        let buffer = SharedBuffer::new();
        let output = Output::new(Box::new(buffer.clone()), true);
        (Interpreter::headless(), output, buffer, options)
    }

    fn printing() -> ReplOptions {
        ReplOptions {
            print_last_result: true,
            ..ReplOptions::default()
        }
    }

    #[test]
    /// 6 連続の同名フレームは 1 行と「5 more calls」になる。
    fn six_identical_frames_collapse() {
        let lines = compress_trace(&frames(&["f", "f", "f", "f", "f", "f", "(global)"]));
        assert_eq!(lines, vec![" -> f", " 5 more calls", " -> (global)"]);
    }

    #[test]
    /// 閾値以下の繰り返しはそのまま並べる。
    fn short_runs_are_listed() {
        let lines = compress_trace(&frames(&["g", "f", "f", "f", "f", "f", "(global)"]));
        assert_eq!(lines.len(), 7);
        assert!(lines[1..6].iter().all(|l| l == " -> f"));
    }

    #[test]
    fn single_frame_prints_nothing() {
        assert!(compress_trace(&frames(&["(global)"])).is_empty());
        assert!(compress_trace(&[]).is_empty());
    }

    #[test]
    fn completed_value_is_printed_when_requested() {
        let (mut interp, output, buffer, options) = setup(printing());
        let outcome = run(&mut interp, &options, &output, "1 + 2", "test", ParseMode::Script);
        assert!(matches!(outcome, ExecutionOutcome::Completed(Value::Number(n)) if n == 3.0));
        report(&mut interp, &options, &output, &outcome);
        assert_eq!(buffer.take(), "3\n");
    }

    #[test]
    /// 構文エラーはヒント・メッセージ・例外表示の順に出る。
    fn syntax_error_shows_hint_then_uncaught() {
        let (mut interp, output, buffer, options) = setup(printing());
        let outcome = run(&mut interp, &options, &output, "let x = ;", "test", ParseMode::Script);
        let ExecutionOutcome::SyntaxError { message, hint } = &outcome else {
            panic!("expected syntax error, got {:?}", outcome);
        };
        assert!(hint.as_deref().is_some_and(|h| h.contains('^')));
        report(&mut interp, &options, &output, &outcome);
        let text = buffer.take();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "let x = ;");
        assert_eq!(lines[2], message.as_str());
        assert!(lines[3].starts_with("Uncaught exception: [SyntaxError]"), "{}", text);
    }

    #[test]
    fn hints_can_be_disabled() {
        let options = ReplOptions {
            disable_source_location_hints: true,
            ..printing()
        };
        let (mut interp, output, buffer, options) = setup(options);
        let outcome = run(&mut interp, &options, &output, "let x = ;", "test", ParseMode::Script);
        report(&mut interp, &options, &output, &outcome);
        let text = buffer.take();
        assert!(!text.contains('^'), "{}", text);
    }

    #[test]
    /// 深い再帰の例外は履歴を圧縮して表示する。
    fn thrown_error_prints_compressed_trace() {
        let (mut interp, output, buffer, options) = setup(printing());
        let outcome = run(
            &mut interp,
            &options,
            &output,
            "function down(n) { if (n == 0) throw new Error('bottom'); down(n - 1) } down(7)",
            "test",
            ParseMode::Script,
        );
        assert!(matches!(outcome, ExecutionOutcome::Thrown(_)));
        report(&mut interp, &options, &output, &outcome);
        let text = buffer.take();
        assert!(text.starts_with("Uncaught exception: [Error]"), "{}", text);
        assert!(text.contains("\n -> down\n 7 more calls\n -> (global)\n"), "{}", text);
    }

    #[test]
    fn thrown_primitive_has_no_trace() {
        let (mut interp, output, buffer, options) = setup(printing());
        let outcome = run(&mut interp, &options, &output, "throw 'x'", "test", ParseMode::Script);
        report(&mut interp, &options, &output, &outcome);
        assert_eq!(buffer.take(), "Uncaught exception: \"x\"\n");
    }

    #[test]
    /// バイトコードの表示だけなら実行しない。
    fn dump_without_run_skips_execution() {
        let options = ReplOptions {
            dump_bytecode: true,
            ..printing()
        };
        let (mut interp, output, buffer, options) = setup(options);
        let outcome = run(&mut interp, &options, &output, "var hit = 1", "test", ParseMode::Script);
        assert!(matches!(outcome, ExecutionOutcome::NotExecuted));
        assert!(!buffer.take().is_empty());
        assert!(interp.global_binding("hit").map_or(true, |v| v.is_undefined()));
    }

    #[test]
    /// どちらの実行戦略でも同じ結果になる。
    fn bytecode_and_tree_walker_agree() {
        let src = "let total = 0; for (let i = 1; i <= 4; i++) total += i; total";
        let (mut a, output, _buffer, tree) = setup(ReplOptions::default());
        let bytecode_options = ReplOptions {
            run_bytecode: true,
            optimize_bytecode: true,
            ..ReplOptions::default()
        };
        let mut b = Interpreter::headless();
        let x = run(&mut a, &tree, &output, src, "test", ParseMode::Script);
        let y = run(&mut b, &bytecode_options, &output, src, "test", ParseMode::Script);
        match (x, y) {
            (ExecutionOutcome::Completed(Value::Number(x)), ExecutionOutcome::Completed(Value::Number(y))) => {
                assert_eq!(x, 10.0);
                assert_eq!(y, 10.0);
            }
            other => panic!("unexpected outcomes: {:?}", other),
        }
    }

    #[test]
    fn dump_ast_prints_json() {
        let options = ReplOptions {
            dump_ast: true,
            ..ReplOptions::default()
        };
        let (mut interp, output, buffer, options) = setup(options);
        run(&mut interp, &options, &output, "1", "test", ParseMode::Script);
        let text = buffer.take();
        let parsed: serde_json::Value = serde_json::from_str(text.trim()).expect("json");
        assert_eq!(parsed["is_module"], serde_json::Value::Bool(false));
    }

    #[test]
    fn success_classification() {
        assert!(ExecutionOutcome::NotExecuted.is_success());
        assert!(ExecutionOutcome::Completed(Value::Undefined).is_success());
        assert!(!ExecutionOutcome::Thrown(Value::Undefined).is_success());
        assert!(!ExecutionOutcome::InternalError(String::new()).is_success());
    }
}
