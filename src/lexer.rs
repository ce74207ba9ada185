// パス: src/lexer.rs
// 役割: スクリプト言語の字句解析器とトークン定義を提供する
// 意図: 未完成の入力でも失敗せずにトークン列を返し、継続判定・補完・強調表示で共有できるようにする
// 関連ファイル: src/parser/mod.rs, src/repl/continuation.rs, src/repl/completion.rs, src/repl/highlight.rs
//! 字句解析モジュール
//!
//! - 不正な入力はエラーにせず `Invalid` 系のトークンとして返す。
//! - 各トークンは直前の空白・コメント（trivia）を保持する。末尾の trivia は `Eof` が持つ。
//! - すべてのトークンに行・列・バイト位置を記録し、診断情報と連携させる。

#[derive(Debug, Clone, PartialEq, Eq)]
/// 生成されたトークンとその位置情報を保持するレコード。
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub trivia: String,
    pub pos: usize,
    pub line: usize,
    pub col: usize,
}

impl Token {
    pub fn category(&self) -> TokenCategory {
        self.kind.category()
    }

    /// 識別子名（キーワードを含む）として扱えるか。プロパティ名の位置で使う。
    pub fn is_identifier_name(&self) -> bool {
        self.kind == TokenKind::Identifier || self.kind.is_keyword()
    }

    /// 末尾位置（バイト）。
    pub fn end(&self) -> usize {
        self.pos + self.value.len()
    }
}

/// 強調表示や補完で使う大分類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCategory {
    Invalid,
    Trivia,
    Number,
    String,
    Punctuation,
    Operator,
    Keyword,
    ControlKeyword,
    Identifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// 字句解析で識別されるトークンの分類。
pub enum TokenKind {
    Eof,
    Invalid,
    UnterminatedStringLiteral,
    UnterminatedTemplateLiteral,
    UnterminatedRegexLiteral,
    // リテラル
    NumericLiteral,
    BigIntLiteral,
    StringLiteral,
    TemplateLiteral,
    RegexLiteral,
    Identifier,
    // キーワード
    Await,
    Break,
    Case,
    Catch,
    Class,
    Const,
    Continue,
    Debugger,
    Default,
    Delete,
    Do,
    Else,
    Export,
    Extends,
    False,
    Finally,
    For,
    Function,
    If,
    Import,
    In,
    Instanceof,
    Let,
    New,
    Null,
    Return,
    Super,
    Switch,
    This,
    Throw,
    True,
    Try,
    Typeof,
    Var,
    Void,
    While,
    With,
    Yield,
    // 区切り記号
    CurlyOpen,
    CurlyClose,
    ParenOpen,
    ParenClose,
    BracketOpen,
    BracketClose,
    Semicolon,
    Comma,
    Period,
    TripleDot,
    QuestionMarkPeriod,
    Colon,
    QuestionMark,
    Arrow,
    // 演算子
    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    DoubleAsterisk,
    PlusPlus,
    MinusMinus,
    Equals,
    PlusEquals,
    MinusEquals,
    AsteriskEquals,
    SlashEquals,
    PercentEquals,
    DoubleAsteriskEquals,
    AmpersandEquals,
    PipeEquals,
    CaretEquals,
    ShiftLeftEquals,
    ShiftRightEquals,
    UnsignedShiftRightEquals,
    DoubleAmpersandEquals,
    DoublePipeEquals,
    DoubleQuestionMarkEquals,
    EqualsEquals,
    EqualsEqualsEquals,
    ExclamationMarkEquals,
    ExclamationMarkEqualsEquals,
    LessThan,
    LessThanEquals,
    GreaterThan,
    GreaterThanEquals,
    ShiftLeft,
    ShiftRight,
    UnsignedShiftRight,
    Ampersand,
    Pipe,
    Caret,
    Tilde,
    ExclamationMark,
    DoubleAmpersand,
    DoublePipe,
    DoubleQuestionMark,
}

impl TokenKind {
    pub fn category(self) -> TokenCategory {
        use TokenKind::*;
        match self {
            Eof => TokenCategory::Trivia,
            Invalid | UnterminatedStringLiteral | UnterminatedTemplateLiteral
            | UnterminatedRegexLiteral => TokenCategory::Invalid,
            NumericLiteral | BigIntLiteral => TokenCategory::Number,
            StringLiteral | TemplateLiteral | RegexLiteral => TokenCategory::String,
            Identifier => TokenCategory::Identifier,
            Await | Break | Case | Catch | Continue | Default | Do | Else | Finally | For | If
            | Return | Switch | Throw | Try | While | Yield => TokenCategory::ControlKeyword,
            Class | Const | Debugger | Delete | Export | Extends | False | Function | Import
            | In | Instanceof | Let | New | Null | Super | This | True | Typeof | Var | Void
            | With => TokenCategory::Keyword,
            CurlyOpen | CurlyClose | ParenOpen | ParenClose | BracketOpen | BracketClose
            | Semicolon | Comma | Period | TripleDot | QuestionMarkPeriod | Colon
            | QuestionMark | Arrow => TokenCategory::Punctuation,
            _ => TokenCategory::Operator,
        }
    }

    pub fn is_keyword(self) -> bool {
        matches!(
            self.category(),
            TokenCategory::Keyword | TokenCategory::ControlKeyword
        )
    }

    /// 直後の `/` を除算とみなすか（正規表現リテラルと区別する）。
    fn ends_expression(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Identifier
                | NumericLiteral
                | BigIntLiteral
                | StringLiteral
                | TemplateLiteral
                | RegexLiteral
                | ParenClose
                | BracketClose
                | CurlyClose
                | PlusPlus
                | MinusMinus
                | This
                | Super
                | True
                | False
                | Null
        )
    }
}

fn keyword(text: &str) -> Option<TokenKind> {
    use TokenKind::*;
    Some(match text {
        "await" => Await,
        "break" => Break,
        "case" => Case,
        "catch" => Catch,
        "class" => Class,
        "const" => Const,
        "continue" => Continue,
        "debugger" => Debugger,
        "default" => Default,
        "delete" => Delete,
        "do" => Do,
        "else" => Else,
        "export" => Export,
        "extends" => Extends,
        "false" => False,
        "finally" => Finally,
        "for" => For,
        "function" => Function,
        "if" => If,
        "import" => Import,
        "in" => In,
        "instanceof" => Instanceof,
        "let" => Let,
        "new" => New,
        "null" => Null,
        "return" => Return,
        "super" => Super,
        "switch" => Switch,
        "this" => This,
        "throw" => Throw,
        "true" => True,
        "try" => Try,
        "typeof" => Typeof,
        "var" => Var,
        "void" => Void,
        "while" => While,
        "with" => With,
        "yield" => Yield,
        _ => return None,
    })
}

/// 記号トークン（長いものから順に照合する）。
const PUNCTUATORS: &[(&str, TokenKind)] = &[
    (">>>=", TokenKind::UnsignedShiftRightEquals),
    ("...", TokenKind::TripleDot),
    ("===", TokenKind::EqualsEqualsEquals),
    ("!==", TokenKind::ExclamationMarkEqualsEquals),
    ("**=", TokenKind::DoubleAsteriskEquals),
    ("<<=", TokenKind::ShiftLeftEquals),
    (">>=", TokenKind::ShiftRightEquals),
    (">>>", TokenKind::UnsignedShiftRight),
    ("&&=", TokenKind::DoubleAmpersandEquals),
    ("||=", TokenKind::DoublePipeEquals),
    ("??=", TokenKind::DoubleQuestionMarkEquals),
    ("=>", TokenKind::Arrow),
    ("==", TokenKind::EqualsEquals),
    ("!=", TokenKind::ExclamationMarkEquals),
    ("<=", TokenKind::LessThanEquals),
    (">=", TokenKind::GreaterThanEquals),
    ("<<", TokenKind::ShiftLeft),
    (">>", TokenKind::ShiftRight),
    ("**", TokenKind::DoubleAsterisk),
    ("++", TokenKind::PlusPlus),
    ("--", TokenKind::MinusMinus),
    ("+=", TokenKind::PlusEquals),
    ("-=", TokenKind::MinusEquals),
    ("*=", TokenKind::AsteriskEquals),
    ("/=", TokenKind::SlashEquals),
    ("%=", TokenKind::PercentEquals),
    ("&=", TokenKind::AmpersandEquals),
    ("|=", TokenKind::PipeEquals),
    ("^=", TokenKind::CaretEquals),
    ("&&", TokenKind::DoubleAmpersand),
    ("||", TokenKind::DoublePipe),
    ("??", TokenKind::DoubleQuestionMark),
    ("{", TokenKind::CurlyOpen),
    ("}", TokenKind::CurlyClose),
    ("(", TokenKind::ParenOpen),
    (")", TokenKind::ParenClose),
    ("[", TokenKind::BracketOpen),
    ("]", TokenKind::BracketClose),
    (";", TokenKind::Semicolon),
    (",", TokenKind::Comma),
    (".", TokenKind::Period),
    (":", TokenKind::Colon),
    ("?", TokenKind::QuestionMark),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Asterisk),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    ("=", TokenKind::Equals),
    ("<", TokenKind::LessThan),
    (">", TokenKind::GreaterThan),
    ("&", TokenKind::Ampersand),
    ("|", TokenKind::Pipe),
    ("^", TokenKind::Caret),
    ("~", TokenKind::Tilde),
    ("!", TokenKind::ExclamationMark),
];

#[derive(Debug)]
/// 行頭オフセットを事前計算し、行・列情報を素早く算出するヘルパ。
pub struct LineMap {
    starts: Vec<usize>,
}

impl LineMap {
    /// 入力全体を 1 度だけ走査して行頭インデックスを収集する。
    pub fn new(src: &str) -> Self {
        let mut starts = vec![0];
        for (idx, ch) in src.char_indices() {
            if ch == '\n' {
                starts.push(idx + 1);
            }
        }
        Self { starts }
    }

    /// 指定バイト位置の行番号と桁位置を返す。
    pub fn locate(&self, src: &str, pos: usize) -> (usize, usize) {
        let idx = match self.starts.binary_search(&pos) {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) => i - 1,
        };
        let start = self.starts[idx];
        let end = pos.min(src.len());
        let col = src.get(start..end).map(|s| s.chars().count()).unwrap_or(0) + 1;
        (idx + 1, col)
    }

    /// 指定行に対応するテキスト断片を返す（改行は除去する）。
    pub fn line_text<'a>(&self, src: &'a str, line: usize) -> &'a str {
        if line == 0 || line > self.starts.len() {
            return "";
        }
        let start = self.starts[line - 1];
        let end = self.starts.get(line).copied().unwrap_or(src.len());
        let slice = &src[start..end];
        let slice = slice.strip_suffix('\n').unwrap_or(slice);
        slice.strip_suffix('\r').unwrap_or(slice)
    }
}

fn is_whitespace(c: char) -> bool {
    matches!(
        c,
        ' ' | '\t' | '\r' | '\n' | '\u{0b}' | '\u{0c}' | '\u{a0}' | '\u{feff}' | '\u{2028}' | '\u{2029}'
    )
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_rest(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '\u{200c}' || c == '\u{200d}'
}

/// テンプレートリテラルの終端（閉じバッククォートの直後）を探す。置換部の入れ子も辿る。
fn template_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return Some(i + 1),
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                i = substitution_end(bytes, i + 2)?;
            }
            _ => i += 1,
        }
    }
    None
}

/// `${` の直後から対応する `}` の直後までを読み飛ばす。
fn substitution_end(bytes: &[u8], mut i: usize) -> Option<usize> {
    let mut depth = 1usize;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            b'`' => {
                i = template_end(bytes, i)?;
                continue;
            }
            q @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != q {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// テンプレートリテラルの構成要素。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    /// 未加工の文字列部分（エスケープ未処理）。
    Quasi(String),
    /// `${ ... }` の中身のソース。
    Substitution(String),
}

/// 完結したテンプレートリテラル（両端のバッククォートを含む）を文字列部分と置換部に分ける。
pub fn split_template(raw: &str) -> Option<Vec<TemplatePart>> {
    let bytes = raw.as_bytes();
    if template_end(bytes, 0)? != bytes.len() {
        return None;
    }
    let mut parts = Vec::new();
    let mut quasi_start = 1;
    let mut i = 1;
    let last = bytes.len() - 1;
    while i < last {
        match bytes[i] {
            b'\\' => i += 2,
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                parts.push(TemplatePart::Quasi(raw[quasi_start..i].to_string()));
                let end = substitution_end(bytes, i + 2)?;
                parts.push(TemplatePart::Substitution(raw[i + 2..end - 1].to_string()));
                i = end;
                quasi_start = end;
            }
            _ => i += 1,
        }
    }
    parts.push(TemplatePart::Quasi(raw[quasi_start..last].to_string()));
    Some(parts)
}

struct Lexer<'a> {
    src: &'a str,
    cursor: usize,
    line_map: LineMap,
    tokens: Vec<Token>,
    pending_trivia_start: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            cursor: 0,
            line_map: LineMap::new(src),
            tokens: Vec::new(),
            pending_trivia_start: 0,
        }
    }

    fn run(mut self) -> Vec<Token> {
        loop {
            self.pending_trivia_start = self.cursor;
            self.consume_trivia();
            if self.cursor >= self.src.len() {
                break;
            }
            self.lex_token();
        }
        let end = self.src.len();
        self.push(TokenKind::Eof, end, end);
        self.tokens
    }

    fn consume_trivia(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if is_whitespace(c) => {
                    self.advance_char();
                }
                Some('/') if self.starts_with("//") => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance_char();
                    }
                }
                Some('/') if self.starts_with("/*") => {
                    match self.src[self.cursor + 2..].find("*/") {
                        Some(offset) => self.cursor += 2 + offset + 2,
                        // 閉じていないコメントは入力末尾までを trivia とする
                        None => self.cursor = self.src.len(),
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_token(&mut self) {
        let start = self.cursor;
        let Some(ch) = self.peek_char() else {
            return;
        };
        if ch == '"' || ch == '\'' {
            return self.lex_string(ch);
        }
        if ch == '`' {
            let kind = match template_end(self.src.as_bytes(), start) {
                Some(end) => {
                    self.cursor = end;
                    TokenKind::TemplateLiteral
                }
                None => {
                    self.cursor = self.src.len();
                    TokenKind::UnterminatedTemplateLiteral
                }
            };
            return self.push(kind, start, self.cursor);
        }
        if ch.is_ascii_digit() || (ch == '.' && self.peek_second_char().is_some_and(|c| c.is_ascii_digit())) {
            return self.lex_number();
        }
        if is_ident_start(ch) || ch == '\\' {
            return self.lex_identifier_or_keyword();
        }
        if ch == '/' && !self.previous_ends_expression() {
            return self.lex_regex();
        }
        for (text, kind) in PUNCTUATORS {
            if self.starts_with(text) {
                // `?.` の直後が数字なら条件演算子と小数
                if *kind == TokenKind::QuestionMark
                    && self.src[start..].starts_with("?.")
                    && !self.src[start + 2..].starts_with(|c: char| c.is_ascii_digit())
                {
                    self.cursor += 2;
                    return self.push(TokenKind::QuestionMarkPeriod, start, self.cursor);
                }
                self.cursor += text.len();
                return self.push(*kind, start, self.cursor);
            }
        }
        self.advance_char();
        self.push(TokenKind::Invalid, start, self.cursor);
    }

    fn previous_ends_expression(&self) -> bool {
        self.tokens
            .last()
            .is_some_and(|t| t.kind.ends_expression())
    }

    fn lex_string(&mut self, quote: char) {
        let start = self.cursor;
        self.advance_char();
        let mut escaped = false;
        while let Some(ch) = self.peek_char() {
            if escaped {
                escaped = false;
                self.advance_char();
                continue;
            }
            if ch == '\\' {
                escaped = true;
                self.advance_char();
                continue;
            }
            if ch == '\n' {
                break;
            }
            self.advance_char();
            if ch == quote {
                return self.push(TokenKind::StringLiteral, start, self.cursor);
            }
        }
        self.push(TokenKind::UnterminatedStringLiteral, start, self.cursor);
    }

    fn lex_number(&mut self) {
        let start = self.cursor;
        let radix_prefix = ["0x", "0X", "0o", "0O", "0b", "0B"]
            .iter()
            .any(|p| self.starts_with(p));
        if radix_prefix {
            self.cursor += 2;
            while let Some(c) = self.peek_char() {
                if c.is_ascii_hexdigit() || c == '_' {
                    self.advance_char();
                } else {
                    break;
                }
            }
        } else {
            self.consume_digits();
            if self.peek_char() == Some('.') {
                self.advance_char();
                self.consume_digits();
            }
            if let Some('e' | 'E') = self.peek_char() {
                let mut idx = self.cursor + 1;
                if let Some(b'+' | b'-') = self.src.as_bytes().get(idx) {
                    idx += 1;
                }
                if self.src.as_bytes().get(idx).is_some_and(|b| b.is_ascii_digit()) {
                    self.cursor = idx;
                    self.consume_digits();
                }
            }
        }
        let kind = if self.peek_char() == Some('n') {
            self.advance_char();
            TokenKind::BigIntLiteral
        } else {
            TokenKind::NumericLiteral
        };
        // 数値の直後に識別子文字が続くのは不正
        if self.peek_char().is_some_and(is_ident_start) {
            while self.peek_char().is_some_and(is_ident_rest) {
                self.advance_char();
            }
            return self.push(TokenKind::Invalid, start, self.cursor);
        }
        self.push(kind, start, self.cursor);
    }

    fn consume_digits(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || c == '_' {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn lex_identifier_or_keyword(&mut self) {
        let start = self.cursor;
        while let Some(c) = self.peek_char() {
            if is_ident_rest(c) {
                self.advance_char();
            } else if c == '\\' && self.starts_with("\\u") {
                // \uXXXX エスケープは識別子の一部として読み飛ばす
                self.cursor = (self.cursor + 6).min(self.src.len());
            } else {
                break;
            }
        }
        if self.cursor == start {
            self.advance_char();
            return self.push(TokenKind::Invalid, start, self.cursor);
        }
        let text = &self.src[start..self.cursor];
        let kind = keyword(text).unwrap_or(TokenKind::Identifier);
        self.push(kind, start, self.cursor);
    }

    fn lex_regex(&mut self) {
        let start = self.cursor;
        self.advance_char();
        let mut in_class = false;
        let mut escaped = false;
        loop {
            let Some(c) = self.peek_char() else {
                return self.push(TokenKind::UnterminatedRegexLiteral, start, self.cursor);
            };
            if c == '\n' {
                return self.push(TokenKind::UnterminatedRegexLiteral, start, self.cursor);
            }
            self.advance_char();
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' => escaped = true,
                '[' => in_class = true,
                ']' => in_class = false,
                '/' if !in_class => break,
                _ => {}
            }
        }
        while self.peek_char().is_some_and(is_ident_rest) {
            self.advance_char();
        }
        self.push(TokenKind::RegexLiteral, start, self.cursor);
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize) {
        let (line, col) = self.line_map.locate(self.src, start);
        let trivia_end = start.max(self.pending_trivia_start);
        self.tokens.push(Token {
            kind,
            value: self.src[start..end].to_string(),
            trivia: self.src[self.pending_trivia_start..trivia_end].to_string(),
            pos: start,
            line,
            col,
        });
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.cursor..].chars().next()
    }

    fn peek_second_char(&self) -> Option<char> {
        let mut iter = self.src[self.cursor..].chars();
        iter.next()?;
        iter.next()
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.cursor += ch.len_utf8();
        Some(ch)
    }

    fn starts_with(&self, pattern: &str) -> bool {
        self.src[self.cursor..].starts_with(pattern)
    }
}

/// ソース全体をトークン列へ変換する。最後の要素は必ず `Eof`。
pub fn lex(src: &str) -> Vec<Token> {
    Lexer::new(src).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    /// 文脈によって `/` が除算と正規表現に振り分けられる。
    fn slash_is_division_or_regex_by_context() {
        assert_eq!(
            kinds("a / b"),
            vec![
                TokenKind::Identifier,
                TokenKind::Slash,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("x = /a[/]b/gi"),
            vec![
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::RegexLiteral,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    /// 閉じていない文字列やテンプレートはエラーではなく専用トークンになる。
    fn unterminated_literals_become_tokens() {
        assert_eq!(
            kinds("'abc"),
            vec![TokenKind::UnterminatedStringLiteral, TokenKind::Eof]
        );
        assert_eq!(
            kinds("`a ${ b"),
            vec![TokenKind::UnterminatedTemplateLiteral, TokenKind::Eof]
        );
        assert_eq!(kinds("#"), vec![TokenKind::Invalid, TokenKind::Eof]);
    }

    #[test]
    /// 入れ子の置換部を含むテンプレートが 1 トークンにまとまる。
    fn template_with_nested_substitution() {
        let tokens = lex("`a${ {b:`c${d}`}.b }e` + 1");
        assert_eq!(tokens[0].kind, TokenKind::TemplateLiteral);
        assert_eq!(tokens[0].value, "`a${ {b:`c${d}`}.b }e`");
        assert_eq!(tokens[1].kind, TokenKind::Plus);
    }

    #[test]
    /// テンプレートが文字列部分と置換部に分割される。
    fn split_template_parts() {
        let parts = split_template("`a${x + `${y}`}b`").unwrap();
        assert_eq!(
            parts,
            vec![
                TemplatePart::Quasi("a".into()),
                TemplatePart::Substitution("x + `${y}`".into()),
                TemplatePart::Quasi("b".into()),
            ]
        );
    }

    #[test]
    /// 直前の空白・コメントが trivia として保持され、末尾分は Eof が持つ。
    fn trivia_is_attached_to_following_token() {
        let tokens = lex("  a /* c */ b ");
        assert_eq!(tokens[0].trivia, "  ");
        assert_eq!(tokens[1].trivia, " /* c */ ");
        assert_eq!(tokens[2].kind, TokenKind::Eof);
        assert_eq!(tokens[2].trivia, " ");
    }

    #[test]
    /// 数値・BigInt・オプショナルチェーンの境界を確認する。
    fn numbers_and_optional_chaining() {
        assert_eq!(
            kinds("1.5e3 10n 0xff a?.b c?.5:1"),
            vec![
                TokenKind::NumericLiteral,
                TokenKind::BigIntLiteral,
                TokenKind::NumericLiteral,
                TokenKind::Identifier,
                TokenKind::QuestionMarkPeriod,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::QuestionMark,
                TokenKind::NumericLiteral,
                TokenKind::Colon,
                TokenKind::NumericLiteral,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    /// キーワードは識別子名として扱え、分類も区別される。
    fn keyword_categories() {
        let tokens = lex("if null foo");
        assert_eq!(tokens[0].category(), TokenCategory::ControlKeyword);
        assert_eq!(tokens[1].category(), TokenCategory::Keyword);
        assert!(tokens[1].is_identifier_name());
        assert_eq!(tokens[2].category(), TokenCategory::Identifier);
    }
}
