// パス: src/repl/cmd.rs
// 役割: 読み取り → 継続判定 → 実行 → 表示のループと、スクリプトモードの入口
// 意図: セッション状態を `ReplSession` にまとめ、行入力の実装をトレイトで差し替え可能にする
// 関連ファイル: src/repl/driver.rs, src/repl/continuation.rs, src/repl/line_editor.rs, src/repl/globals.rs
//! REPL のメインループとセッション状態。

use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use runtime_heap::Value;
use tracing::{debug, warn};

use crate::errors::ReplError;
use crate::interpreter::Interpreter;
use crate::parser::ParseMode;

use super::completion::{complete, CompletionCandidate};
use super::console::ReplConsole;
use super::continuation::{classify, DepthState};
use super::driver::{self, ExecutionOutcome};
use super::globals::{install_repl_globals, install_script_globals, SharedState};
use super::highlight::{live_prompt, paint, prompt_for, stylize};
use super::interrupt;
use super::line_editor::{EditorHooks, LineEditor, ReadResult};
use super::util::Output;
use super::ReplOptions;

/// 対話セッションを開始し、終了コードを返す。
///
/// # Examples
/// ```no_run
/// let code = jsrepl::repl::run_repl(jsrepl::repl::ReplOptions::default());
/// std::process::exit(code);
/// ```
pub fn run_repl(options: ReplOptions) -> i32 {
    let output = Output::stdout(options.strip_ansi);
    let mut session = ReplSession::new(options, output, interrupt::install());
    let mut editor = LineEditor::new();
    run_repl_with(&mut editor, &mut session)
}

/// スクリプトモード: `source` を 1 度だけ実行し、終了コードを返す。
pub fn run_script(options: ReplOptions, source: &str, source_name: &str) -> i32 {
    let output = Output::stdout(options.strip_ansi);
    let mut interp = Interpreter::new(Rc::new(ReplConsole::new(Rc::clone(&output))));
    install_script_globals(&mut interp, &output);
    let outcome = driver::run(
        &mut interp,
        &options,
        &output,
        source,
        source_name,
        options.parse_mode(),
    );
    driver::report(&mut interp, &options, &output, &outcome);
    match outcome {
        ExecutionOutcome::Exit(code) => code,
        outcome if outcome.is_success() => 0,
        _ => 1,
    }
}

/// 行入力の供給元。端末エディタとテスト用の台本を差し替える。
pub(crate) trait ReplLineSource {
    fn read_line(&mut self, prompt: &str, hooks: &dyn EditorHooks) -> Result<ReadResult, ReplError>;
    fn add_history(&mut self, entry: &str);
    fn save_history(&mut self) -> Result<(), ReplError>;
}

impl ReplLineSource for LineEditor {
    fn read_line(&mut self, prompt: &str, hooks: &dyn EditorHooks) -> Result<ReadResult, ReplError> {
        LineEditor::read_line(self, prompt, hooks)
    }

    fn add_history(&mut self, entry: &str) {
        LineEditor::add_history(self, entry);
    }

    fn save_history(&mut self) -> Result<(), ReplError> {
        LineEditor::save_history(self)
    }
}

/// 1 単位ぶんの読み取り結果。
enum Piece {
    Unit(String),
    Interrupted,
    Eof,
}

/// ループが読み終えるまで回し、終了コードを返す。履歴の保存失敗は警告だけ。
pub(crate) fn run_repl_with<S: ReplLineSource>(source: &mut S, session: &mut ReplSession) -> i32 {
    let mut exit_code = 0;
    loop {
        // 前の単位の実行中に届いた中断はここで受け取る。単位そのものは最後まで走っている
        if interrupt::take(&session.interrupt) {
            debug!("interrupt observed between units");
            session.depth.reset();
        }
        let piece = match session.read_piece(source) {
            Ok(Piece::Unit(piece)) => piece,
            Ok(Piece::Interrupted) => continue,
            Ok(Piece::Eof) => break,
            Err(err) => {
                warn!("{}", err);
                break;
            }
        };
        if interrupt::take(&session.interrupt) {
            debug!("input unit discarded after interrupt");
            session.depth.reset();
            continue;
        }
        if piece.trim().is_empty() {
            continue;
        }
        if let ExecutionOutcome::Exit(code) = session.evaluate(&piece) {
            exit_code = code;
            break;
        }
    }
    if let Err(err) = source.save_history() {
        warn!("{}", err);
    }
    exit_code
}

/// 対話セッションの状態。グローバルな可変状態の代わりにループへ渡す。
pub struct ReplSession {
    interp: Interpreter,
    options: ReplOptions,
    output: Rc<Output>,
    depth: DepthState,
    shared: SharedState,
    interrupt: Arc<AtomicBool>,
}

impl ReplSession {
    /// REPL 用グローバルを登録した realm を作る。対話モードでは結果を常に表示する。
    pub fn new(mut options: ReplOptions, output: Rc<Output>, interrupt: Arc<AtomicBool>) -> Self {
        options.print_last_result = true;
        let mut interp = Interpreter::new(Rc::new(ReplConsole::new(Rc::clone(&output))));
        let shared = SharedState::default();
        install_repl_globals(&mut interp, &output, &shared);
        Self {
            interp,
            options,
            output,
            depth: DepthState::new(),
            shared,
            interrupt,
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interp
    }

    /// 直前に正常終了した単位の値。
    pub fn last_value(&self) -> Value {
        self.shared.last_value.borrow().clone()
    }

    /// 受け付けた入力単位（末尾の改行は除く）。
    pub fn statements(&self) -> Vec<String> {
        self.shared.statements.borrow().clone()
    }

    /// 深さが 0 に戻るまで行を集める。各行はその場で履歴に入る。
    fn read_piece<S: ReplLineSource>(&mut self, source: &mut S) -> Result<Piece, ReplError> {
        let mut piece = String::new();
        loop {
            let prompt = prompt_for(self.depth.depth);
            let hooks = SessionHooks {
                interp: &self.interp,
                level: self.depth.depth,
                highlight: !self.options.no_syntax_highlight,
            };
            let line = match source.read_line(&prompt, &hooks)? {
                ReadResult::Line(line) => line,
                ReadResult::Interrupted => {
                    debug!("input unit discarded");
                    self.depth.reset();
                    return Ok(Piece::Interrupted);
                }
                ReadResult::Eof => return Ok(Piece::Eof),
            };
            source.add_history(&line);
            piece.push_str(&line);
            piece.push('\n');
            if !classify(&line, &mut self.depth) {
                return Ok(Piece::Unit(piece));
            }
        }
    }

    /// 単位を記録して実行し、結果を表示する。
    pub fn evaluate(&mut self, piece: &str) -> ExecutionOutcome {
        self.shared
            .statements
            .borrow_mut()
            .push(piece.trim_end_matches('\n').to_string());
        let outcome = driver::run(
            &mut self.interp,
            &self.options,
            &self.output,
            piece,
            "REPL",
            self.options.parse_mode(),
        );
        if let ExecutionOutcome::Completed(value) = &outcome {
            *self.shared.last_value.borrow_mut() = value.clone();
        }
        driver::report(&mut self.interp, &self.options, &self.output, &outcome);
        outcome
    }
}

/// 行エディタに渡すフック。入力中の行から補完とプロンプトを計算する。
struct SessionHooks<'a> {
    interp: &'a Interpreter,
    level: i32,
    highlight: bool,
}

impl EditorHooks for SessionHooks<'_> {
    fn prompt(&self, line: &str) -> String {
        live_prompt(self.level, line)
    }

    fn highlight(&self, line: &str) -> String {
        if self.highlight {
            paint(line, &stylize(line))
        } else {
            line.to_string()
        }
    }

    fn complete(&self, line: &str, cursor: usize) -> Vec<CompletionCandidate> {
        complete(self.interp, line, cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repl::util::{strip_ansi, SharedBuffer};
    use std::collections::VecDeque;
    use std::sync::atomic::Ordering;

    enum ScriptEvent {
        Line(&'static str),
        Interrupt,
        /// 行を返す前に SIGINT ハンドラと同じようにフラグを立てる。
        Signal(&'static str),
        Eof,
    }

    /// 台本どおりに行を返すテスト用の供給元。プロンプトと補完結果も記録する。
    struct ScriptedLineSource {
        events: VecDeque<ScriptEvent>,
        prompts: Vec<String>,
        history: Vec<String>,
        completions: Vec<Vec<String>>,
        saved: bool,
        flag: Arc<AtomicBool>,
    }

    impl ScriptedLineSource {
        fn new(events: impl IntoIterator<Item = ScriptEvent>, flag: Arc<AtomicBool>) -> Self {
            Self {
                events: events.into_iter().collect(),
                prompts: Vec::new(),
                history: Vec::new(),
                completions: Vec::new(),
                saved: false,
                flag,
            }
        }
    }

    impl ReplLineSource for ScriptedLineSource {
        fn read_line(&mut self, prompt: &str, hooks: &dyn EditorHooks) -> Result<ReadResult, ReplError> {
            self.prompts.push(prompt.to_string());
            Ok(match self.events.pop_front().unwrap_or(ScriptEvent::Eof) {
                ScriptEvent::Line(s) => {
                    let found = hooks.complete(s, s.len());
                    self.completions.push(found.into_iter().map(|c| c.text).collect());
                    ReadResult::Line(s.to_string())
                }
                ScriptEvent::Interrupt => ReadResult::Interrupted,
                ScriptEvent::Signal(s) => {
                    self.flag.store(true, Ordering::SeqCst);
                    ReadResult::Line(s.to_string())
                }
                ScriptEvent::Eof => ReadResult::Eof,
            })
        }

        fn add_history(&mut self, entry: &str) {
            self.history.push(entry.to_string());
        }

        fn save_history(&mut self) -> Result<(), ReplError> {
            self.saved = true;
            Ok(())
        }
    }

    fn session_with_flag(flag: Arc<AtomicBool>) -> (ReplSession, SharedBuffer) {
        let buffer = SharedBuffer::new();
        let output = Output::new(Box::new(buffer.clone()), true);
        let session = ReplSession::new(ReplOptions::default(), output, flag);
        (session, buffer)
    }

    fn session() -> (ReplSession, SharedBuffer) {
        session_with_flag(Arc::new(AtomicBool::new(false)))
    }

    fn drive(events: Vec<ScriptEvent>) -> (ScriptedLineSource, ReplSession, String, i32) {
        let flag = Arc::new(AtomicBool::new(false));
        let (mut session, buffer) = session_with_flag(Arc::clone(&flag));
        let mut source = ScriptedLineSource::new(events, flag);
        let code = run_repl_with(&mut source, &mut session);
        (source, session, strip_ansi(&buffer.take()), code)
    }

    #[test]
    /// 値は単位ごとに表示され、履歴は保存される。
    fn prints_each_result() {
        let (source, _, out, code) = drive(vec![
            ScriptEvent::Line("let a = 2"),
            ScriptEvent::Line("a * 21"),
        ]);
        assert_eq!(out, "undefined\n42\n");
        assert_eq!(code, 0);
        assert!(source.saved);
        assert_eq!(source.history, vec!["let a = 2", "a * 21"]);
    }

    #[test]
    /// 複数行の単位はプロンプトが深さに応じて伸びる。
    fn multi_line_unit_uses_nested_prompts() {
        let (source, session, out, _) = drive(vec![
            ScriptEvent::Line("function f(x) {"),
            ScriptEvent::Line("  return x + 1"),
            ScriptEvent::Line("}"),
            ScriptEvent::Line("f(1)"),
        ]);
        assert_eq!(source.prompts[..4], ["> ", ">     ", ">     ", "> "]);
        assert!(out.ends_with("2\n"), "{}", out);
        assert_eq!(
            session.statements(),
            vec!["function f(x) {\n  return x + 1\n}", "f(1)"]
        );
    }

    #[test]
    /// 中断すると組み立て中の単位を捨てて深さを戻す。
    fn interrupt_discards_partial_unit() {
        let (source, session, out, _) = drive(vec![
            ScriptEvent::Line("[1,"),
            ScriptEvent::Interrupt,
            ScriptEvent::Line("3"),
        ]);
        assert_eq!(source.prompts[2], "> ");
        assert_eq!(out, "3\n");
        assert_eq!(session.statements(), vec!["3"]);
    }

    #[test]
    /// 入力中に届いた中断はその単位を捨てさせ、次の単位は普通に動く。
    fn signal_while_reading_discards_the_unit() {
        let (_, session, out, _) = drive(vec![
            ScriptEvent::Signal("never()"),
            ScriptEvent::Line("1 + 1"),
        ]);
        assert_eq!(out, "2\n");
        assert_eq!(session.statements(), vec!["1 + 1"]);
    }

    #[test]
    /// 中断フラグが立っていても実行中の単位は最後まで走る。
    fn pending_interrupt_does_not_abort_a_running_unit() {
        let flag = Arc::new(AtomicBool::new(true));
        let (mut session, buffer) = session_with_flag(Arc::clone(&flag));
        session.evaluate("let i = 0; while (i < 3) i++; i\n");
        assert_eq!(strip_ansi(&buffer.take()), "3\n");
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn exit_stops_the_loop_with_code() {
        let (source, _, _, code) = drive(vec![
            ScriptEvent::Line("exit(7)"),
            ScriptEvent::Line("never()"),
        ]);
        assert_eq!(code, 7);
        assert!(source.saved);
        assert_eq!(source.history, vec!["exit(7)"]);
    }

    #[test]
    /// 例外の後もループは続き、`_` は直前の成功値を指す。
    fn errors_do_not_end_the_session() {
        let (_, session, out, _) = drive(vec![
            ScriptEvent::Line("10"),
            ScriptEvent::Line("throw new TypeError('bad')"),
            ScriptEvent::Line("_ + 1"),
        ]);
        assert!(out.contains("Uncaught exception: [TypeError] bad\n"), "{}", out);
        assert!(out.ends_with("11\n"), "{}", out);
        assert!(matches!(session.last_value(), Value::Number(n) if n == 11.0));
    }

    #[test]
    fn syntax_errors_are_reported_and_skipped() {
        let (_, _, out, _) = drive(vec![ScriptEvent::Line("let x = ;"), ScriptEvent::Line("1")]);
        assert!(out.contains("Uncaught exception: [SyntaxError]"), "{}", out);
        assert!(out.ends_with("1\n"), "{}", out);
    }

    #[test]
    fn blank_lines_are_ignored() {
        let (_, session, out, _) = drive(vec![ScriptEvent::Line("   "), ScriptEvent::Line("1")]);
        assert_eq!(out, "1\n");
        assert_eq!(session.statements(), vec!["1"]);
    }

    #[test]
    /// フックの補完は実行済みの束縛を見る。
    fn hooks_complete_against_live_realm() {
        let (source, _, _, _) = drive(vec![
            ScriptEvent::Line("var config = {port: 1, path: 2}"),
            ScriptEvent::Line("config.po"),
        ]);
        assert_eq!(source.completions[1], vec!["port"]);
    }

    #[test]
    fn hooks_prompt_and_highlight() {
        let (session, _) = session();
        let hooks = SessionHooks {
            interp: session.interpreter(),
            level: 2,
            highlight: true,
        };
        assert_eq!(hooks.prompt("}"), ">     ");
        assert_eq!(strip_ansi(&hooks.highlight("let a")), "let a");
        assert_ne!(hooks.highlight("let a"), "let a");
        let plain = SessionHooks { highlight: false, ..hooks };
        assert_eq!(plain.highlight("let a"), "let a");
    }

    #[test]
    fn script_mode_exit_status() {
        let options = ReplOptions {
            strip_ansi: true,
            ..ReplOptions::default()
        };
        assert_eq!(run_script(options.clone(), "1 + 1", "eval"), 0);
        assert_eq!(run_script(options.clone(), "throw 1", "eval"), 1);
        assert_eq!(run_script(options, "let = = 1", "eval"), 1);
    }
}
