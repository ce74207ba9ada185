// パス: src/parser/expr.rs
// 役割: 式（代入・二項演算・単項・呼び出し・リテラル）の構文解析を実装する
// 意図: 優先順位表に基づく二項演算の解析と、アロー関数などの先読み判定をまとめる
// 関連ファイル: src/parser/mod.rs, src/parser/pattern.rs, src/ast.rs

use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::Num;

use super::*;
use crate::ast::{
    Argument, ArrayElement, AssignOp, BinaryOp, Expr, FunctionBody, FunctionDef, FunctionFlavor,
    LogicalOp, MemberProp, Param, Pattern, PropDef, PropKey, UnaryOp, UpdateOp,
};
use crate::lexer::{split_template, TemplatePart};

/// 二項演算子の優先順位（大きいほど強く結合する）。
enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn infix_of(kind: TokenKind) -> Option<(u8, Infix)> {
    use TokenKind::*;
    Some(match kind {
        DoubleQuestionMark => (1, Infix::Logical(LogicalOp::Nullish)),
        DoublePipe => (1, Infix::Logical(LogicalOp::Or)),
        DoubleAmpersand => (2, Infix::Logical(LogicalOp::And)),
        Pipe => (3, Infix::Binary(BinaryOp::BitOr)),
        Caret => (4, Infix::Binary(BinaryOp::BitXor)),
        Ampersand => (5, Infix::Binary(BinaryOp::BitAnd)),
        EqualsEquals => (6, Infix::Binary(BinaryOp::Eq)),
        ExclamationMarkEquals => (6, Infix::Binary(BinaryOp::NotEq)),
        EqualsEqualsEquals => (6, Infix::Binary(BinaryOp::StrictEq)),
        ExclamationMarkEqualsEquals => (6, Infix::Binary(BinaryOp::StrictNotEq)),
        LessThan => (7, Infix::Binary(BinaryOp::Lt)),
        LessThanEquals => (7, Infix::Binary(BinaryOp::LtEq)),
        GreaterThan => (7, Infix::Binary(BinaryOp::Gt)),
        GreaterThanEquals => (7, Infix::Binary(BinaryOp::GtEq)),
        Instanceof => (7, Infix::Binary(BinaryOp::Instanceof)),
        In => (7, Infix::Binary(BinaryOp::In)),
        ShiftLeft => (8, Infix::Binary(BinaryOp::Shl)),
        ShiftRight => (8, Infix::Binary(BinaryOp::Shr)),
        UnsignedShiftRight => (8, Infix::Binary(BinaryOp::UShr)),
        Plus => (9, Infix::Binary(BinaryOp::Add)),
        Minus => (9, Infix::Binary(BinaryOp::Sub)),
        Asterisk => (10, Infix::Binary(BinaryOp::Mul)),
        Slash => (10, Infix::Binary(BinaryOp::Div)),
        Percent => (10, Infix::Binary(BinaryOp::Mod)),
        DoubleAsterisk => (11, Infix::Binary(BinaryOp::Exp)),
        _ => return None,
    })
}

fn assign_op_of(kind: TokenKind) -> Option<AssignOp> {
    use TokenKind::*;
    Some(match kind {
        Equals => AssignOp::Assign,
        PlusEquals => AssignOp::Compound(BinaryOp::Add),
        MinusEquals => AssignOp::Compound(BinaryOp::Sub),
        AsteriskEquals => AssignOp::Compound(BinaryOp::Mul),
        SlashEquals => AssignOp::Compound(BinaryOp::Div),
        PercentEquals => AssignOp::Compound(BinaryOp::Mod),
        DoubleAsteriskEquals => AssignOp::Compound(BinaryOp::Exp),
        AmpersandEquals => AssignOp::Compound(BinaryOp::BitAnd),
        PipeEquals => AssignOp::Compound(BinaryOp::BitOr),
        CaretEquals => AssignOp::Compound(BinaryOp::BitXor),
        ShiftLeftEquals => AssignOp::Compound(BinaryOp::Shl),
        ShiftRightEquals => AssignOp::Compound(BinaryOp::Shr),
        UnsignedShiftRightEquals => AssignOp::Compound(BinaryOp::UShr),
        DoubleAmpersandEquals => AssignOp::Logical(LogicalOp::And),
        DoublePipeEquals => AssignOp::Logical(LogicalOp::Or),
        DoubleQuestionMarkEquals => AssignOp::Logical(LogicalOp::Nullish),
        _ => return None,
    })
}

/// 数値リテラルの文字列を f64 に変換する（区切り `_` と基数接頭辞に対応）。
pub(crate) fn parse_numeric_literal(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();
    let radix = if lower.starts_with("0x") {
        16
    } else if lower.starts_with("0o") {
        8
    } else if lower.starts_with("0b") {
        2
    } else {
        return cleaned.parse::<f64>().ok();
    };
    let digits = &cleaned[2..];
    if digits.is_empty() {
        return None;
    }
    let mut value = 0f64;
    for c in digits.chars() {
        value = value * radix as f64 + c.to_digit(radix)? as f64;
    }
    Some(value)
}

/// BigInt リテラル（末尾 `n` を除いた部分）を 10 進文字列へ正規化する。
fn parse_bigint_literal(text: &str) -> Option<String> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();
    let (radix, digits) = match lower.get(..2) {
        Some("0x") => (16, &cleaned[2..]),
        Some("0o") => (8, &cleaned[2..]),
        Some("0b") => (2, &cleaned[2..]),
        _ => (10, cleaned.as_str()),
    };
    BigInt::from_str_radix(digits, radix).ok().map(|n| n.to_string())
}

impl Parser {
    /// カンマ区切りの式（Expression）。
    pub(super) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_assignment()?;
        if !self.is(TokenKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.accept(TokenKind::Comma).is_some() {
            items.push(self.parse_assignment()?);
        }
        Ok(Expr::Sequence(items))
    }

    /// 代入式（AssignmentExpression）。アロー関数と yield もここで扱う。
    pub(super) fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        if let Some(arrow) = self.try_parse_arrow()? {
            return Ok(arrow);
        }
        if self.is(TokenKind::Yield) && self.ctx.in_generator {
            return self.parse_yield();
        }
        let start = self.peek().clone();
        let left = self.parse_conditional()?;
        let Some(op) = assign_op_of(self.peek().kind) else {
            return Ok(left);
        };
        let target = match op {
            AssignOp::Assign => self.expr_to_pattern(left)?,
            _ => match left {
                Expr::Ident(name) => Pattern::Ident(name),
                member @ Expr::Member { optional: false, .. } => Pattern::Member(Box::new(member)),
                _ => {
                    return Err(self.error_at(&start, "PAR050", "Invalid left-hand side in assignment"))
                }
            },
        };
        self.pop_any();
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn parse_yield(&mut self) -> Result<Expr, ParseError> {
        self.pop_any();
        let delegate = !self.newline_before() && self.accept(TokenKind::Asterisk).is_some();
        let ends = matches!(
            self.peek().kind,
            TokenKind::ParenClose
                | TokenKind::BracketClose
                | TokenKind::CurlyClose
                | TokenKind::Comma
                | TokenKind::Semicolon
                | TokenKind::Colon
                | TokenKind::Eof
        ) || (self.newline_before() && !delegate);
        let arg = if ends {
            None
        } else {
            Some(Box::new(self.parse_assignment()?))
        };
        Ok(Expr::Yield { arg, delegate })
    }

    /// `(` から対応する `)` までを走査し、直後が `=>` かどうかを判定する。
    fn paren_is_arrow_params(&self, offset: usize) -> bool {
        let mut depth = 0usize;
        let mut j = self.i + offset;
        while let Some(t) = self.ts.get(j) {
            match t.kind {
                TokenKind::ParenOpen | TokenKind::BracketOpen | TokenKind::CurlyOpen => depth += 1,
                TokenKind::ParenClose | TokenKind::BracketClose | TokenKind::CurlyClose => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return self
                            .ts
                            .get(j + 1)
                            .is_some_and(|n| n.kind == TokenKind::Arrow && !n.trivia.contains('\n'));
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            j += 1;
        }
        false
    }

    fn try_parse_arrow(&mut self) -> Result<Option<Expr>, ParseError> {
        let t = self.peek().clone();
        let is_async_prefix = t.kind == TokenKind::Identifier
            && t.value == "async"
            && self.peek_at(1).is_some_and(|n| !n.trivia.contains('\n'));
        let ident_like = |k: TokenKind| matches!(k, TokenKind::Identifier | TokenKind::Yield | TokenKind::Await);

        // async x => ... / async (a, b) => ...
        if is_async_prefix {
            if ident_like(self.peek_kind(1)) && self.peek_kind(2) == TokenKind::Arrow {
                self.pop_any();
                let name = self.pop_any().value;
                return self.parse_arrow_body(vec![simple_param(name)], true).map(Some);
            }
            if self.peek_kind(1) == TokenKind::ParenOpen && self.paren_is_arrow_params(1) {
                self.pop_any();
                let params = self.parse_arrow_params(true)?;
                return self.parse_arrow_body(params, true).map(Some);
            }
        }
        if ident_like(t.kind) && self.peek_kind(1) == TokenKind::Arrow {
            let name = self.pop_any().value;
            return self.parse_arrow_body(vec![simple_param(name)], false).map(Some);
        }
        if t.kind == TokenKind::ParenOpen && self.paren_is_arrow_params(0) {
            let params = self.parse_arrow_params(false)?;
            return self.parse_arrow_body(params, false).map(Some);
        }
        Ok(None)
    }

    fn parse_arrow_params(&mut self, is_async: bool) -> Result<Vec<Param>, ParseError> {
        let saved = self.ctx;
        self.ctx.in_async = is_async;
        let params = self.parse_params();
        self.ctx = saved;
        params
    }

    fn parse_arrow_body(&mut self, params: Vec<Param>, is_async: bool) -> Result<Expr, ParseError> {
        self.pop(TokenKind::Arrow, "'=>'")?;
        let saved = self.ctx;
        self.ctx = FunctionContext {
            in_function: true,
            in_generator: false,
            in_async: is_async,
        };
        let body = if self.is(TokenKind::CurlyOpen) {
            let saved_no_in = self.no_in;
            self.no_in = false;
            let block = self.parse_block();
            self.no_in = saved_no_in;
            block.map(FunctionBody::Block)
        } else {
            self.parse_assignment().map(|e| FunctionBody::Expr(Box::new(e)))
        };
        self.ctx = saved;
        Ok(Expr::Function(Rc::new(FunctionDef {
            name: None,
            params,
            body: body?,
            flavor: if is_async {
                FunctionFlavor::Async
            } else {
                FunctionFlavor::Normal
            },
            is_arrow: true,
        })))
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let test = self.parse_binary(0)?;
        if self.accept(TokenKind::QuestionMark).is_none() {
            return Ok(test);
        }
        let saved_no_in = self.no_in;
        self.no_in = false;
        let consequent = self.parse_assignment();
        self.no_in = saved_no_in;
        let consequent = consequent?;
        self.pop(TokenKind::Colon, "':'")?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    /// 優先順位上昇法による二項演算の解析。
    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let kind = self.peek().kind;
            if kind == TokenKind::In && self.no_in {
                break;
            }
            let Some((prec, infix)) = infix_of(kind) else {
                break;
            };
            if prec <= min_prec {
                break;
            }
            self.pop_any();
            // `**` は右結合
            let right = if prec == 11 {
                self.parse_binary(prec - 1)?
            } else {
                self.parse_binary(prec)?
            };
            left = match infix {
                Infix::Binary(op) => Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                Infix::Logical(op) => Expr::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let t = self.peek().clone();
        let op = match t.kind {
            TokenKind::ExclamationMark => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Typeof => Some(UnaryOp::Typeof),
            TokenKind::Void => Some(UnaryOp::Void),
            TokenKind::Delete => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.pop_any();
            let arg = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                arg: Box::new(arg),
            });
        }
        if matches!(t.kind, TokenKind::PlusPlus | TokenKind::MinusMinus) {
            self.pop_any();
            let target = self.parse_unary()?;
            self.check_update_target(&t, &target)?;
            return Ok(Expr::Update {
                op: if t.kind == TokenKind::PlusPlus {
                    UpdateOp::Increment
                } else {
                    UpdateOp::Decrement
                },
                prefix: true,
                target: Box::new(target),
            });
        }
        if t.kind == TokenKind::Await {
            if !(self.ctx.in_async || (self.mode() == ParseMode::Module && !self.ctx.in_function)) {
                return Err(self.error_at(&t, "PAR051", "'await' is only valid in async functions and modules"));
            }
            self.pop_any();
            let arg = self.parse_unary()?;
            return Ok(Expr::Await(Box::new(arg)));
        }
        self.parse_postfix()
    }

    fn check_update_target(&self, at: &Token, target: &Expr) -> Result<(), ParseError> {
        match target {
            Expr::Ident(_) | Expr::Member { optional: false, .. } => Ok(()),
            _ => Err(self.error_at(at, "PAR052", "Invalid left-hand side expression in update operation")),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let start = self.peek().clone();
        let expr = self.parse_left_hand_side()?;
        let t = self.peek().clone();
        if matches!(t.kind, TokenKind::PlusPlus | TokenKind::MinusMinus) && !self.newline_before() {
            self.check_update_target(&start, &expr)?;
            self.pop_any();
            return Ok(Expr::Update {
                op: if t.kind == TokenKind::PlusPlus {
                    UpdateOp::Increment
                } else {
                    UpdateOp::Decrement
                },
                prefix: false,
                target: Box::new(expr),
            });
        }
        Ok(expr)
    }

    /// 呼び出し・メンバーアクセス・`new` を含む左辺式。
    fn parse_left_hand_side(&mut self) -> Result<Expr, ParseError> {
        let mut expr = if self.is(TokenKind::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        let mut has_optional = false;
        loop {
            match self.peek().kind {
                TokenKind::Period => {
                    self.pop_any();
                    let name = self.pop_any();
                    if !name.is_identifier_name() {
                        return Err(self.error_at(&name, "PAR053", format!("Unexpected token {}. Expected property name", name.value)));
                    }
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: MemberProp::Name(name.value),
                        optional: false,
                    };
                }
                TokenKind::QuestionMarkPeriod => {
                    self.pop_any();
                    has_optional = true;
                    expr = match self.peek().kind {
                        TokenKind::ParenOpen => Expr::Call {
                            callee: Box::new(expr),
                            args: self.parse_arguments()?,
                            optional: true,
                        },
                        TokenKind::BracketOpen => {
                            self.pop_any();
                            let prop = self.parse_expression()?;
                            self.pop(TokenKind::BracketClose, "']'")?;
                            Expr::Member {
                                object: Box::new(expr),
                                property: MemberProp::Computed(Box::new(prop)),
                                optional: true,
                            }
                        }
                        _ => {
                            let name = self.pop_any();
                            if !name.is_identifier_name() {
                                return Err(self.error_at(&name, "PAR053", format!("Unexpected token {}. Expected property name", name.value)));
                            }
                            Expr::Member {
                                object: Box::new(expr),
                                property: MemberProp::Name(name.value),
                                optional: true,
                            }
                        }
                    };
                }
                TokenKind::BracketOpen => {
                    self.pop_any();
                    let saved_no_in = self.no_in;
                    self.no_in = false;
                    let prop = self.parse_expression();
                    self.no_in = saved_no_in;
                    let prop = prop?;
                    self.pop(TokenKind::BracketClose, "']'")?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: MemberProp::Computed(Box::new(prop)),
                        optional: false,
                    };
                }
                TokenKind::ParenOpen => {
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args: self.parse_arguments()?,
                        optional: false,
                    };
                }
                TokenKind::TemplateLiteral if !has_optional => {
                    return Err(self.error_here("PAR054", "Tagged templates are not supported"));
                }
                _ => break,
            }
        }
        if has_optional {
            expr = Expr::OptionalChain(Box::new(expr));
        }
        Ok(expr)
    }

    fn parse_new(&mut self) -> Result<Expr, ParseError> {
        self.pop(TokenKind::New, "'new'")?;
        let mut callee = if self.is(TokenKind::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        // new の対象はメンバーアクセスまで（呼び出しは含まない）
        loop {
            match self.peek().kind {
                TokenKind::Period => {
                    self.pop_any();
                    let name = self.pop_any();
                    callee = Expr::Member {
                        object: Box::new(callee),
                        property: MemberProp::Name(name.value),
                        optional: false,
                    };
                }
                TokenKind::BracketOpen => {
                    self.pop_any();
                    let prop = self.parse_expression()?;
                    self.pop(TokenKind::BracketClose, "']'")?;
                    callee = Expr::Member {
                        object: Box::new(callee),
                        property: MemberProp::Computed(Box::new(prop)),
                        optional: false,
                    };
                }
                _ => break,
            }
        }
        let args = if self.is(TokenKind::ParenOpen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
        })
    }

    fn parse_arguments(&mut self) -> Result<Vec<Argument>, ParseError> {
        self.pop(TokenKind::ParenOpen, "'('")?;
        let saved_no_in = self.no_in;
        self.no_in = false;
        let mut args = Vec::new();
        let result = (|| {
            while !self.is(TokenKind::ParenClose) {
                if self.accept(TokenKind::TripleDot).is_some() {
                    args.push(Argument::Spread(self.parse_assignment()?));
                } else {
                    args.push(Argument::Item(self.parse_assignment()?));
                }
                if self.accept(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.pop(TokenKind::ParenClose, "')'").map(|_| ())
        })();
        self.no_in = saved_no_in;
        result?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let t = self.peek().clone();
        match t.kind {
            TokenKind::NumericLiteral => {
                self.pop_any();
                parse_numeric_literal(&t.value)
                    .map(Expr::Number)
                    .ok_or_else(|| self.error_at(&t, "PAR060", "Invalid numeric literal"))
            }
            TokenKind::BigIntLiteral => {
                self.pop_any();
                parse_bigint_literal(&t.value[..t.value.len() - 1])
                    .map(Expr::BigInt)
                    .ok_or_else(|| self.error_at(&t, "PAR061", "Invalid BigInt literal"))
            }
            TokenKind::StringLiteral => {
                self.pop_any();
                Ok(Expr::String(self.string_value(&t)?))
            }
            TokenKind::TemplateLiteral => {
                self.pop_any();
                self.parse_template(&t)
            }
            TokenKind::RegexLiteral => {
                self.pop_any();
                let end = t.value.rfind('/').unwrap_or(0);
                Ok(Expr::Regex {
                    pattern: t.value[1..end.max(1)].to_string(),
                    flags: t.value[end + 1..].to_string(),
                })
            }
            TokenKind::True | TokenKind::False => {
                self.pop_any();
                Ok(Expr::Bool(t.kind == TokenKind::True))
            }
            TokenKind::Null => {
                self.pop_any();
                Ok(Expr::Null)
            }
            TokenKind::This => {
                self.pop_any();
                Ok(Expr::This)
            }
            TokenKind::Identifier => {
                if t.value == "async"
                    && self.peek_kind(1) == TokenKind::Function
                    && !self.peek_at(1).is_some_and(|n| n.trivia.contains('\n'))
                {
                    self.pop_any();
                    return Ok(Expr::Function(self.parse_function(true, false)?));
                }
                self.pop_any();
                Ok(Expr::Ident(t.value))
            }
            TokenKind::Yield if !self.ctx.in_generator => {
                self.pop_any();
                Ok(Expr::Ident(t.value))
            }
            TokenKind::Await if !self.ctx.in_async => {
                self.pop_any();
                Ok(Expr::Ident(t.value))
            }
            TokenKind::Function => Ok(Expr::Function(self.parse_function(false, false)?)),
            TokenKind::ParenOpen => {
                self.pop_any();
                let saved_no_in = self.no_in;
                self.no_in = false;
                let inner = self.parse_expression();
                self.no_in = saved_no_in;
                let inner = inner?;
                self.pop(TokenKind::ParenClose, "')'")?;
                Ok(inner)
            }
            TokenKind::BracketOpen => self.parse_array_literal(),
            TokenKind::CurlyOpen => self.parse_object_literal(),
            TokenKind::Class => Err(self.error_at(&t, "PAR012", "Class expressions are not supported")),
            _ => Err(self.unexpected("expression")),
        }
    }

    /// 文字列リテラルトークンの値（引用符とエスケープを処理済み）。
    pub(super) fn string_value(&self, t: &Token) -> Result<String, ParseError> {
        let body = &t.value[1..t.value.len().saturating_sub(1).max(1)];
        decode_escapes(body).map_err(|msg| self.error_at(t, "PAR062", msg))
    }

    fn parse_template(&mut self, t: &Token) -> Result<Expr, ParseError> {
        let parts = split_template(&t.value)
            .ok_or_else(|| self.error_at(t, "PAR063", "Unterminated template literal"))?;
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        for part in parts {
            match part {
                TemplatePart::Quasi(raw) => {
                    quasis.push(decode_escapes(&raw).map_err(|msg| self.error_at(t, "PAR062", msg))?)
                }
                TemplatePart::Substitution(src) => {
                    let mut sub = Parser::new(&src, self.mode());
                    sub.ctx = self.ctx;
                    let expr = sub.parse_expression().map_err(|e| {
                        self.error_at(t, "PAR064", format!("In template substitution: {}", e.0.msg))
                    })?;
                    if !sub.is(TokenKind::Eof) {
                        return Err(self.error_at(t, "PAR064", "Unexpected token in template substitution"));
                    }
                    exprs.push(expr);
                }
            }
        }
        Ok(Expr::Template { quasis, exprs })
    }

    fn parse_array_literal(&mut self) -> Result<Expr, ParseError> {
        self.pop(TokenKind::BracketOpen, "'['")?;
        let saved_no_in = self.no_in;
        self.no_in = false;
        let mut elements = Vec::new();
        let result = (|| {
            loop {
                match self.peek().kind {
                    TokenKind::BracketClose => break,
                    TokenKind::Comma => {
                        self.pop_any();
                        elements.push(ArrayElement::Hole);
                        continue;
                    }
                    TokenKind::TripleDot => {
                        self.pop_any();
                        elements.push(ArrayElement::Spread(self.parse_assignment()?));
                    }
                    _ => elements.push(ArrayElement::Item(self.parse_assignment()?)),
                }
                if self.accept(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.pop(TokenKind::BracketClose, "']'").map(|_| ())
        })();
        self.no_in = saved_no_in;
        result?;
        Ok(Expr::Array(elements))
    }

    /// プロパティ名（識別子名・文字列・数値・計算キー）。
    pub(super) fn parse_property_key(&mut self) -> Result<PropKey, ParseError> {
        let t = self.peek().clone();
        match t.kind {
            TokenKind::StringLiteral => {
                self.pop_any();
                Ok(PropKey::Name(self.string_value(&t)?))
            }
            TokenKind::NumericLiteral => {
                self.pop_any();
                let n = parse_numeric_literal(&t.value)
                    .ok_or_else(|| self.error_at(&t, "PAR060", "Invalid numeric literal"))?;
                Ok(PropKey::Name(runtime_heap::number_to_string(n)))
            }
            TokenKind::BigIntLiteral => {
                self.pop_any();
                parse_bigint_literal(&t.value[..t.value.len() - 1])
                    .map(PropKey::Name)
                    .ok_or_else(|| self.error_at(&t, "PAR061", "Invalid BigInt literal"))
            }
            TokenKind::BracketOpen => {
                self.pop_any();
                let expr = self.parse_assignment()?;
                self.pop(TokenKind::BracketClose, "']'")?;
                Ok(PropKey::Computed(Box::new(expr)))
            }
            _ if t.is_identifier_name() => {
                self.pop_any();
                Ok(PropKey::Name(t.value))
            }
            _ => Err(self.unexpected("property name")),
        }
    }

    fn parse_object_literal(&mut self) -> Result<Expr, ParseError> {
        self.pop(TokenKind::CurlyOpen, "'{'")?;
        let saved_no_in = self.no_in;
        self.no_in = false;
        let mut props = Vec::new();
        let result = (|| {
            while !self.is(TokenKind::CurlyClose) {
                props.push(self.parse_object_member()?);
                if self.accept(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.pop(TokenKind::CurlyClose, "'}'").map(|_| ())
        })();
        self.no_in = saved_no_in;
        result?;
        Ok(Expr::Object(props))
    }

    fn parse_object_member(&mut self) -> Result<PropDef, ParseError> {
        if self.accept(TokenKind::TripleDot).is_some() {
            return Ok(PropDef::Spread(self.parse_assignment()?));
        }
        let t = self.peek().clone();
        let next = self.peek_kind(1);
        let is_plain_key_follow = matches!(
            next,
            TokenKind::Colon | TokenKind::ParenOpen | TokenKind::Comma | TokenKind::CurlyClose | TokenKind::Equals
        );

        // get / set アクセサ
        if t.kind == TokenKind::Identifier && (t.value == "get" || t.value == "set") && !is_plain_key_follow {
            self.pop_any();
            let key = self.parse_property_key()?;
            let func = self.parse_function_rest(key_name(&key), FunctionFlavor::Normal)?;
            return Ok(if t.value == "get" {
                PropDef::Getter(key, func)
            } else {
                PropDef::Setter(key, func)
            });
        }

        // async / ジェネレータのメソッド
        let mut is_async = false;
        if t.kind == TokenKind::Identifier && t.value == "async" && !is_plain_key_follow {
            self.pop_any();
            is_async = true;
        }
        let is_generator = self.accept(TokenKind::Asterisk).is_some();
        if is_async || is_generator {
            let key = self.parse_property_key()?;
            let flavor = match (is_async, is_generator) {
                (true, true) => FunctionFlavor::AsyncGenerator,
                (true, false) => FunctionFlavor::Async,
                _ => FunctionFlavor::Generator,
            };
            let func = self.parse_function_rest(key_name(&key), flavor)?;
            return Ok(PropDef::Method(key, func));
        }

        let key = self.parse_property_key()?;
        match self.peek().kind {
            TokenKind::Colon => {
                self.pop_any();
                Ok(PropDef::KeyValue(key, self.parse_assignment()?))
            }
            TokenKind::ParenOpen => {
                let func = self.parse_function_rest(key_name(&key), FunctionFlavor::Normal)?;
                Ok(PropDef::Method(key, func))
            }
            _ => {
                let PropKey::Name(name) = key else {
                    return Err(self.unexpected("':'"));
                };
                if t.kind != TokenKind::Identifier {
                    return Err(self.error_at(&t, "PAR065", format!("Unexpected token {}. Expected ':'", t.value)));
                }
                // `{ a = 1 } = obj` の形（分割代入でのみ有効）
                if self.accept(TokenKind::Equals).is_some() {
                    let default = self.parse_assignment()?;
                    return Ok(PropDef::KeyValue(
                        PropKey::Name(name.clone()),
                        Expr::Assign {
                            op: AssignOp::Assign,
                            target: Box::new(Pattern::Ident(name)),
                            value: Box::new(default),
                        },
                    ));
                }
                Ok(PropDef::Shorthand(name))
            }
        }
    }
}

fn simple_param(name: String) -> Param {
    Param {
        target: Pattern::Ident(name),
        default: None,
        rest: false,
    }
}

fn key_name(key: &PropKey) -> Option<String> {
    match key {
        PropKey::Name(name) => Some(name.clone()),
        PropKey::Computed(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse_expression;
    use super::parse_numeric_literal;
    use crate::ast::{BinaryOp, Expr};

    #[test]
    /// 乗算が加算より強く結合する。
    fn precedence_mul_over_add() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        match expr {
            Expr::Binary { op: BinaryOp::Add, right, .. } => {
                assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    /// `**` は右結合になる。
    fn exponent_is_right_associative() {
        let expr = parse_expression("2 ** 3 ** 2").unwrap();
        match expr {
            Expr::Binary { op: BinaryOp::Exp, left, right } => {
                assert!(matches!(*left, Expr::Number(n) if n == 2.0));
                assert!(matches!(*right, Expr::Binary { op: BinaryOp::Exp, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    /// 括弧の後に `=>` が続けばアロー関数として解析する。
    fn arrow_function_detection() {
        assert!(matches!(parse_expression("(a, b) => a + b").unwrap(), Expr::Function(f) if f.is_arrow && f.params.len() == 2));
        assert!(matches!(parse_expression("(a, b)").unwrap(), Expr::Sequence(_)));
        assert!(matches!(parse_expression("x => x").unwrap(), Expr::Function(_)));
    }

    #[test]
    /// オプショナルチェーンは連鎖全体を包む。
    fn optional_chain_wraps_whole_chain() {
        assert!(matches!(parse_expression("a?.b.c()").unwrap(), Expr::OptionalChain(_)));
    }

    #[test]
    /// 数値リテラルの基数と区切り文字を解釈する。
    fn numeric_literal_forms() {
        assert_eq!(parse_numeric_literal("0xff"), Some(255.0));
        assert_eq!(parse_numeric_literal("0b101"), Some(5.0));
        assert_eq!(parse_numeric_literal("1_000"), Some(1000.0));
        assert_eq!(parse_numeric_literal(".5"), Some(0.5));
        assert_eq!(parse_numeric_literal("0x"), None);
    }

    #[test]
    /// テンプレートの置換部が式として解析される。
    fn template_substitutions_are_parsed() {
        match parse_expression("`a${1 + 1}b`").unwrap() {
            Expr::Template { quasis, exprs } => {
                assert_eq!(quasis, vec!["a".to_string(), "b".to_string()]);
                assert_eq!(exprs.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    /// オブジェクトリテラルのメソッド・アクセサ・スプレッドを解析できる。
    fn object_literal_members() {
        let expr = parse_expression("({ a, b: 1, [c]: 2, m() {}, get g() { return 1 }, ...d })").unwrap();
        assert!(matches!(expr, Expr::Object(props) if props.len() == 6));
    }
}
