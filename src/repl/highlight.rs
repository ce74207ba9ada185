// パス: src/repl/highlight.rs
// 役割: 入力中の行に付ける強調表示の範囲と、ネストに応じたプロンプトを計算する
// 意図: 端末描画（line_editor）から字句の知識を切り離し、範囲の列として渡す
// 関連ファイル: src/lexer.rs, src/repl/line_editor.rs, src/repl/continuation.rs

use crate::lexer::{lex, TokenCategory, TokenKind};

/// 強調の種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// 不正なトークン（赤・下線）
    Invalid,
    Number,
    String,
    /// true / false / null
    Literal,
    Keyword,
    ControlKeyword,
    Identifier,
}

impl Style {
    pub fn sgr(self) -> &'static str {
        match self {
            Style::Invalid => "\x1b[31;4m",
            Style::Number => "\x1b[35m",
            Style::String => "\x1b[32;1m",
            Style::Literal => "\x1b[33;1m",
            Style::Keyword => "\x1b[34;1m",
            Style::ControlKeyword => "\x1b[36;3m",
            Style::Identifier => "\x1b[37;1m",
        }
    }
}

/// 文字（コードポイント）単位の半開区間。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub style: Style,
}

pub fn stylize(line: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    for token in lex(line) {
        if token.kind == TokenKind::Eof {
            break;
        }
        let style = match token.category() {
            TokenCategory::Invalid => Style::Invalid,
            TokenCategory::Number => Style::Number,
            TokenCategory::String => Style::String,
            TokenCategory::Keyword => match token.kind {
                TokenKind::True | TokenKind::False | TokenKind::Null => Style::Literal,
                _ => Style::Keyword,
            },
            TokenCategory::ControlKeyword => Style::ControlKeyword,
            TokenCategory::Identifier => Style::Identifier,
            TokenCategory::Punctuation | TokenCategory::Operator | TokenCategory::Trivia => continue,
        };
        let start = line[..token.pos].chars().count();
        let end = start + token.value.chars().count();
        spans.push(Span { start, end, style });
    }
    spans
}

/// `"> "` の後にネスト 1 段につき空白 4 つ。
pub fn prompt_for(level: i32) -> String {
    let mut prompt = String::from("> ");
    for _ in 0..level.max(0) {
        prompt.push_str("    ");
    }
    prompt
}

/// 入力中の行の先頭に並ぶ閉じ括弧の数だけ段を下げたプロンプト。
pub fn live_prompt(level: i32, line: &str) -> String {
    let closers = lex(line)
        .iter()
        .take_while(|t| {
            matches!(
                t.kind,
                TokenKind::ParenClose | TokenKind::BracketClose | TokenKind::CurlyClose
            )
        })
        .count() as i32;
    prompt_for(level - closers)
}

/// 区間に従って SGR を埋め込んだ文字列を作る。
pub fn paint(line: &str, spans: &[Span]) -> String {
    let mut out = String::with_capacity(line.len() * 2);
    let mut spans = spans.iter().peekable();
    let mut open: Option<&Span> = None;
    for (i, ch) in line.chars().enumerate() {
        if let Some(span) = open {
            if i >= span.end {
                out.push_str("\x1b[0m");
                open = None;
            }
        }
        if open.is_none() {
            while spans.peek().is_some_and(|s| s.end <= i) {
                spans.next();
            }
            if let Some(span) = spans.peek().filter(|s| s.start == i) {
                out.push_str(span.style.sgr());
                open = spans.next();
            }
        }
        out.push(ch);
    }
    if open.is_some() {
        out.push_str("\x1b[0m");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repl::util::strip_ansi;

    #[test]
    fn categories_map_to_styles() {
        let spans = stylize("if (x) return 1 + 'a' || null");
        let styles: Vec<Style> = spans.iter().map(|s| s.style).collect();
        assert_eq!(
            styles,
            vec![
                Style::ControlKeyword,
                Style::Identifier,
                Style::ControlKeyword,
                Style::Number,
                Style::String,
                Style::Literal,
            ]
        );
        assert_eq!(spans[0], Span { start: 0, end: 2, style: Style::ControlKeyword });
    }

    #[test]
    /// 範囲は文字単位で数える。
    fn spans_count_code_points() {
        let spans = stylize("'é' + x");
        assert_eq!(spans[0], Span { start: 0, end: 3, style: Style::String });
        assert_eq!(spans[1].start, 6);
    }

    #[test]
    fn invalid_tokens_are_marked() {
        let spans = stylize("\"open");
        assert_eq!(spans[0].style, Style::Invalid);
    }

    #[test]
    fn prompt_grows_with_level_and_shrinks_for_leading_closers() {
        assert_eq!(prompt_for(0), "> ");
        assert_eq!(prompt_for(2), ">         ");
        assert_eq!(live_prompt(2, "}"), ">     ");
        assert_eq!(live_prompt(2, "})"), "> ");
        assert_eq!(live_prompt(1, "x }"), ">     ");
    }

    #[test]
    fn painting_keeps_text() {
        let line = "let s = 'x' // c";
        let painted = paint(line, &stylize(line));
        assert_eq!(strip_ansi(&painted), line);
        assert!(painted.starts_with("\x1b[34;1mlet\x1b[0m"));
    }
}
