// パス: src/parser/mod.rs
// 役割: トークン列から AST を生成する再帰下降パーサのエントリポイント
// 意図: 文・式・パターンの解析を分割し、共通のトークン操作と診断生成をここに集約する
// 関連ファイル: src/parser/program.rs, src/parser/expr.rs, src/parser/pattern.rs
//! 構文解析モジュール
//!
//! - スクリプトとモジュールの 2 つのモードで文を解析する。
//! - 自動セミコロン挿入は「`;` / `}` / 入力末尾 / 改行」の規則で行う。
//! - 診断には問題の行のスニペットを付け、REPL が位置ヒントを表示できるようにする。

use crate::ast::Program;
use crate::errors::ParseError;
use crate::lexer::{lex, LineMap, Token, TokenKind};

mod expr;
mod pattern;
mod program;

/// 解析の対象（トップレベルのスクリプトかモジュールか）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseMode {
    Script,
    Module,
}

/// 関数本体の文脈。`yield` / `await` / `return` の可否を決める。
#[derive(Clone, Copy, Debug, Default)]
pub(super) struct FunctionContext {
    pub in_function: bool,
    pub in_generator: bool,
    pub in_async: bool,
}

pub struct Parser {
    ts: Vec<Token>,
    i: usize,
    src: String,
    line_map: LineMap,
    mode: ParseMode,
    pub(super) ctx: FunctionContext,
    /// `for (a in b)` の初期化部では `in` を二項演算子として扱わない。
    pub(super) no_in: bool,
}

impl Parser {
    /// ソースを字句解析してパーサを構築する。
    pub fn new(src: &str, mode: ParseMode) -> Self {
        Self {
            ts: lex(src),
            i: 0,
            src: src.to_string(),
            line_map: LineMap::new(src),
            mode,
            ctx: FunctionContext::default(),
            no_in: false,
        }
    }

    pub(super) fn peek(&self) -> &Token {
        &self.ts[self.i.min(self.ts.len() - 1)]
    }

    pub(super) fn peek_kind(&self, offset: usize) -> TokenKind {
        self.ts
            .get(self.i + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    pub(super) fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.ts.get(self.i + offset)
    }

    pub(super) fn pop_any(&mut self) -> Token {
        let t = self.peek().clone();
        if self.i < self.ts.len() - 1 {
            self.i += 1;
        }
        t
    }

    pub(super) fn is(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    /// 文脈依存キーワード（`of`, `async`, `get` など）の判定。
    pub(super) fn is_contextual(&self, word: &str) -> bool {
        let t = self.peek();
        t.kind == TokenKind::Identifier && t.value == word
    }

    pub(super) fn pop(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.peek().kind != kind {
            return Err(self.unexpected(expected));
        }
        Ok(self.pop_any())
    }

    pub(super) fn accept(&mut self, kind: TokenKind) -> Option<Token> {
        if self.peek().kind == kind {
            Some(self.pop_any())
        } else {
            None
        }
    }

    /// 次のトークンの前に改行があるか。
    pub(super) fn newline_before(&self) -> bool {
        self.peek().trivia.contains('\n')
    }

    /// 文末のセミコロン（自動挿入を含む）を消費する。
    pub(super) fn consume_semicolon(&mut self) -> Result<(), ParseError> {
        if self.accept(TokenKind::Semicolon).is_some() {
            return Ok(());
        }
        if matches!(self.peek().kind, TokenKind::CurlyClose | TokenKind::Eof) || self.newline_before() {
            return Ok(());
        }
        Err(self.unexpected("';'"))
    }

    pub(super) fn unexpected(&self, expected: &str) -> ParseError {
        let t = self.peek().clone();
        let msg = match t.kind {
            TokenKind::Eof => format!("Unexpected end of input. Expected {}", expected),
            TokenKind::UnterminatedStringLiteral => "Unterminated string literal".to_string(),
            TokenKind::UnterminatedTemplateLiteral => "Unterminated template literal".to_string(),
            TokenKind::UnterminatedRegexLiteral => {
                "Unterminated regular expression literal".to_string()
            }
            _ => format!("Unexpected token {}. Expected {}", t.value, expected),
        };
        self.error_at(&t, "PAR001", msg)
    }

    pub(super) fn error_at(&self, token: &Token, code: &'static str, msg: impl Into<String>) -> ParseError {
        ParseError::at_with_snippet(
            code,
            msg,
            Some(token.pos),
            Some(token.line),
            Some(token.col),
            self.line_map.line_text(&self.src, token.line).to_string(),
        )
    }

    pub(super) fn error_here(&self, code: &'static str, msg: impl Into<String>) -> ParseError {
        let t = self.peek().clone();
        self.error_at(&t, code, msg)
    }

    pub(super) fn mode(&self) -> ParseMode {
        self.mode
    }
}

/// ソース全体をプログラムとして解析する。
pub fn parse_program(src: &str, mode: ParseMode) -> Result<Program, ParseError> {
    let mut parser = Parser::new(src, mode);
    parser.parse_program()
}

/// 式のみを解析する（テンプレートの置換部などで使う）。
pub fn parse_expression(src: &str) -> Result<crate::ast::Expr, ParseError> {
    let mut parser = Parser::new(src, ParseMode::Script);
    let expr = parser.parse_expression()?;
    if !parser.is(TokenKind::Eof) {
        return Err(parser.unexpected("end of expression"));
    }
    Ok(expr)
}

/// 文字列リテラルの中身（引用符を除いた部分）のエスケープを展開する。
pub(crate) fn decode_escapes(body: &str) -> Result<String, String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let Some(e) = chars.next() else {
            return Err("Unterminated escape sequence".into());
        };
        match e {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !chars.peek().is_some_and(|c| c.is_ascii_digit()) => out.push('\0'),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| "Malformed hexadecimal escape sequence".to_string())?;
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            'u' => {
                let code = if chars.peek() == Some(&'{') {
                    chars.next();
                    let hex: String = chars.by_ref().take_while(|c| *c != '}').collect();
                    u32::from_str_radix(&hex, 16)
                } else {
                    let hex: String = chars.by_ref().take(4).collect();
                    u32::from_str_radix(&hex, 16)
                }
                .map_err(|_| "Malformed unicode escape sequence".to_string())?;
                // サロゲートペアの上位なら下位を続けて読む
                if (0xd800..0xdc00).contains(&code) {
                    let mut lookahead = chars.clone();
                    if lookahead.next() == Some('\\') && lookahead.next() == Some('u') {
                        let hex: String = lookahead.by_ref().take(4).collect();
                        if let Ok(low) = u32::from_str_radix(&hex, 16) {
                            if (0xdc00..0xe000).contains(&low) {
                                let combined = 0x10000 + ((code - 0xd800) << 10) + (low - 0xdc00);
                                out.push(char::from_u32(combined).unwrap_or('\u{fffd}'));
                                chars = lookahead;
                                continue;
                            }
                        }
                    }
                }
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::decode_escapes;

    #[test]
    /// 文字列リテラルの基本的なエスケープをテストする。
    fn decode_basic_escapes() {
        assert_eq!(decode_escapes("a\\n").unwrap(), "a\n");
        assert_eq!(decode_escapes("\\t\\\"").unwrap(), "\t\"");
        assert_eq!(decode_escapes("\\\\").unwrap(), "\\");
        assert_eq!(decode_escapes("\\x41\\u0042\\u{43}").unwrap(), "ABC");
    }

    #[test]
    /// サロゲートペアのエスケープが 1 文字に結合される。
    fn decode_surrogate_pair() {
        assert_eq!(decode_escapes("\\ud83d\\ude00").unwrap(), "\u{1F600}");
    }

    #[test]
    /// 壊れた 16 進エスケープはエラーになる。
    fn malformed_hex_escape() {
        assert!(decode_escapes("\\xZZ").is_err());
    }
}
