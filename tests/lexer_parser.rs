// パス: tests/lexer_parser.rs
// 役割: 字句解析と構文解析を公開 API 越しに確認する
// 意図: 強調表示・補完・継続判定が頼る分類と、エラー位置表示を固定する
// 関連ファイル: src/lexer.rs, src/parser/mod.rs, src/errors.rs
use jsrepl::lexer::{lex, TokenCategory, TokenKind};
use jsrepl::{parse_program, ParseMode};

fn categories(src: &str) -> Vec<TokenCategory> {
    lex(src)
        .iter()
        .filter(|t| t.kind != TokenKind::Eof)
        .map(|t| t.category())
        .collect()
}

#[test]
/// 代表的な入力の大分類をテーブルで確かめる。
fn token_categories() {
    use TokenCategory::*;
    let cases: &[(&str, &[TokenCategory])] = &[
        ("let x = 1", &[Keyword, Identifier, Operator, Number]),
        ("if (a) return 'b'", &[ControlKeyword, Punctuation, Identifier, Punctuation, ControlKeyword, String]),
        ("o?.p", &[Identifier, Punctuation, Identifier]),
        ("/ab+c/g.test(s)", &[String, Punctuation, Identifier, Punctuation, Identifier, Punctuation]),
        ("`a${b}c` + 10n", &[String, Operator, Number]),
        ("'open", &[Invalid]),
    ];
    for (src, expected) in cases {
        assert_eq!(categories(src), expected.to_vec(), "{}", src);
    }
}

#[test]
/// 空白と注釈は次のトークンの前置きとして保持される。
fn trivia_is_attached_to_the_following_token() {
    let tokens = lex("a /* c */ b // tail");
    assert_eq!(tokens[1].value, "b");
    assert_eq!(tokens[1].trivia, " /* c */ ");
    let eof = tokens.last().expect("eof");
    assert_eq!(eof.kind, TokenKind::Eof);
    assert_eq!(eof.trivia, " // tail");
}

#[test]
fn division_versus_regex() {
    let kinds: Vec<TokenKind> = lex("a / b / c").iter().map(|t| t.kind).collect();
    assert!(!kinds.contains(&TokenKind::RegexLiteral));
    assert!(lex("x = /b/").iter().any(|t| t.kind == TokenKind::RegexLiteral));
}

#[test]
fn token_positions_are_one_based() {
    let tokens = lex("a\n  bb");
    assert_eq!((tokens[1].line, tokens[1].col), (2, 3));
    assert_eq!(tokens[1].end(), 6);
}

#[test]
fn programs_parse_in_both_modes() {
    parse_program("function f(a, ...rest) { return [a, ...rest] }", ParseMode::Script).expect("script");
    parse_program("export const answer = 42", ParseMode::Module).expect("module");
    assert!(parse_program("export const answer = 42", ParseMode::Script).is_err());
}

#[test]
/// エラー表示は行・列を含み、ヒントは該当行とキャレットの 2 行。
fn syntax_error_display_and_hint() {
    let err = parse_program("1;\nlet x = ;", ParseMode::Script).expect_err("syntax error");
    let text = err.to_string();
    assert!(text.contains("(line: 2, column:"), "{}", text);
    let hint = err.source_location_hint().expect("hint");
    let mut lines = hint.lines();
    assert_eq!(lines.next(), Some("let x = ;"));
    assert!(lines.next().is_some_and(|caret| caret.trim_start() == "^"));
}
