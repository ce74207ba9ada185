//! エラー型の定義（共通フォーマット: \[CODE\] メッセージ (line: L, column: C)）。
//!
//! スクリプト側の例外は値（`Value`）として扱い、ここには含めない。
//! ここで定義するのは構文解析・下位表現への変換・REPL 周辺の入出力の失敗のみ。

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub msg: String,
    pub pos: Option<usize>,      // バイトオフセット（任意）
    pub line: Option<usize>,     // 1-origin（任意）
    pub col: Option<usize>,      // 1-origin（任意）
    pub snippet: Option<String>, // エラー行のスニペット（任意）
}

impl ErrorInfo {
    pub fn new(code: &'static str, msg: impl Into<String>, pos: Option<usize>) -> Self {
        Self {
            code,
            msg: msg.into(),
            pos,
            line: None,
            col: None,
            snippet: None,
        }
    }
    pub fn at(
        code: &'static str,
        msg: impl Into<String>,
        pos: Option<usize>,
        line: Option<usize>,
        col: Option<usize>,
    ) -> Self {
        Self {
            code,
            msg: msg.into(),
            pos,
            line,
            col,
            snippet: None,
        }
    }
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    /// 問題の行とキャレット行からなる位置ヒント。スニペットか列がなければ `None`。
    pub fn source_location_hint(&self) -> Option<String> {
        let (Some(s), Some(c)) = (&self.snippet, self.col) else {
            return None;
        };
        let caret = " ".repeat(c.saturating_sub(1)) + "^";
        Some(format!("{}\n{}", s, caret))
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (self.line, self.col) {
            (Some(l), Some(c)) => write!(f, "{} (line: {}, column: {})", self.msg, l, c),
            _ => write!(f, "{}", self.msg),
        }
    }
}

/// 構文エラー。位置ヒントを計算できる場合はスニペットを持つ。
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ParseError(pub ErrorInfo);

impl ParseError {
    pub fn new(code: &'static str, msg: impl Into<String>, pos: Option<usize>) -> Self {
        Self(ErrorInfo::new(code, msg, pos))
    }
    pub fn at(
        code: &'static str,
        msg: impl Into<String>,
        pos: Option<usize>,
        line: Option<usize>,
        col: Option<usize>,
    ) -> Self {
        Self(ErrorInfo::at(code, msg, pos, line, col))
    }
    pub fn at_with_snippet(
        code: &'static str,
        msg: impl Into<String>,
        pos: Option<usize>,
        line: Option<usize>,
        col: Option<usize>,
        snippet: impl Into<String>,
    ) -> Self {
        Self(ErrorInfo::at(code, msg, pos, line, col).with_snippet(snippet))
    }

    pub fn code(&self) -> &'static str {
        self.0.code
    }

    pub fn source_location_hint(&self) -> Option<String> {
        self.0.source_location_hint()
    }
}

/// 下位表現（バイトコード）への変換の失敗。
#[derive(Debug, Clone, Error)]
pub enum LoweringError {
    #[error("Unsupported construct in bytecode: {0}")]
    Unsupported(&'static str),
    #[error("Too many registers or constants in executable")]
    TooLarge,
    #[error("'{0}' outside of a loop")]
    StrayJump(&'static str),
}

/// REPL 周辺（履歴・ファイル読み込み）の入出力エラー。致命的ではない。
#[derive(Debug, Error)]
pub enum ReplError {
    #[error("履歴ファイル '{path}' を扱えません: {source}")]
    History {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("ファイル '{path}' を読み込めません: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("端末の設定に失敗しました: {0}")]
    Terminal(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// 位置ヒントはスニペット行の下にキャレットを揃えて表示する。
    fn hint_places_caret_under_column() {
        let err = ParseError::at_with_snippet("PAR001", "Unexpected token", Some(4), Some(1), Some(5), "let = 1");
        assert_eq!(err.source_location_hint().as_deref(), Some("let = 1\n    ^"));
        assert_eq!(err.to_string(), "Unexpected token (line: 1, column: 5)");
    }

    #[test]
    /// 位置情報がない場合はメッセージのみでヒントもない。
    fn message_without_position() {
        let err = ParseError::new("PAR900", "Unexpected end of input", None);
        assert!(err.source_location_hint().is_none());
        assert_eq!(err.to_string(), "Unexpected end of input");
    }
}
