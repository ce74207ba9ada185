// パス: src/repl/continuation.rs
// 役割: 入力行ごとに括弧の深さを数え、トップレベルの単位が閉じたかを判定する
// 意図: 構文解析せずに字句だけで「続きの行が要るか」を決め、本当の構文エラーは後段に任せる
// 関連ファイル: src/lexer.rs, src/repl/cmd.rs, src/repl/highlight.rs
//! 継続行の判定

use crate::lexer::{lex, TokenKind};

/// セッションを通じて持ち越す括弧の深さ。負にもなりうる（補正しない）。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DepthState {
    pub depth: i32,
}

impl DepthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 中断時など、入力単位を捨てるときに戻す。
    pub fn reset(&mut self) {
        self.depth = 0;
    }
}

/// ラベル / オブジェクトキーらしさの状態。行ごとに初期化する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelState {
    Neutral,
    Candidate,
    Confirmed,
}

/// 1 行を字句解析して深さを更新し、続きの行が要るなら `true` を返す。
///
/// 行末が `識別子:` / `"キー":` で終わる場合は深さを変えずにもう 1 行求める。
/// 不正なトークンがあっても行は数える（プロンプトが止まらないように）。
pub fn classify(line: &str, state: &mut DepthState) -> bool {
    let mut label = LabelState::Neutral;
    for token in lex(line) {
        match token.kind {
            TokenKind::Eof => break,
            TokenKind::BracketOpen | TokenKind::CurlyOpen | TokenKind::ParenOpen => {
                label = LabelState::Neutral;
                state.depth += 1;
            }
            TokenKind::BracketClose | TokenKind::CurlyClose | TokenKind::ParenClose => {
                label = LabelState::Neutral;
                state.depth -= 1;
            }
            TokenKind::Identifier | TokenKind::StringLiteral => {
                label = match label {
                    LabelState::Neutral => LabelState::Candidate,
                    _ => LabelState::Neutral,
                };
            }
            TokenKind::Colon => {
                label = match label {
                    LabelState::Candidate => LabelState::Confirmed,
                    _ => LabelState::Neutral,
                };
            }
            _ => {}
        }
    }
    let pending = i32::from(label == LabelState::Confirmed);
    state.depth + pending > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(lines: &[&str]) -> Vec<bool> {
        let mut state = DepthState::new();
        lines.iter().map(|line| classify(line, &mut state)).collect()
    }

    #[test]
    fn balanced_line_completes_immediately() {
        assert_eq!(feed(&["let a = [1, (2), {b: 3}];"]), vec![false]);
        assert_eq!(feed(&["1 + 2"]), vec![false]);
    }

    #[test]
    /// 深さが 0 に戻った行で単位が閉じる。
    fn nested_blocks_span_lines() {
        assert_eq!(
            feed(&["function f() {", "  if (x) {", "  }", "}"]),
            vec![true, true, true, false]
        );
    }

    #[test]
    /// 行末のキーとコロンは深さを変えずに続きを求める。
    fn trailing_key_requests_another_line() {
        assert_eq!(feed(&["{a:", "1}"]), vec![true, false]);
        let mut state = DepthState::new();
        assert!(classify("label:", &mut state));
        assert_eq!(state.depth, 0);
        assert!(!classify("x", &mut state));
    }

    #[test]
    fn two_identifiers_do_not_form_a_label() {
        let mut state = DepthState::new();
        assert!(!classify("a b:", &mut state));
        assert!(classify("case 'k':", &mut state));
        assert_eq!(state.depth, 0);
    }

    #[test]
    /// 閉じ過ぎた入力は負の深さのまま後段へ渡す。
    fn negative_depth_is_not_clamped() {
        let mut state = DepthState::new();
        assert!(!classify("}", &mut state));
        assert_eq!(state.depth, -1);
    }

    #[test]
    /// 閉じていない文字列でも判定は止まらない。
    fn tokenizer_errors_do_not_block() {
        let mut state = DepthState::new();
        assert!(classify("foo(\"abc", &mut state));
        assert_eq!(state.depth, 1);
        assert!(!classify(")", &mut state));
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        assert_eq!(feed(&["'{' + \"[\""]), vec![false]);
    }
}
