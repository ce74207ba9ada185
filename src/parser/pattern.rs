// パス: src/parser/pattern.rs
// 役割: 束縛パターン（分割代入を含む）の解析と、式から代入先パターンへの変換を実装する
// 意図: 宣言・仮引数・catch 節・代入式の左辺を同じ `Pattern` 表現に揃える
// 関連ファイル: src/parser/expr.rs, src/parser/program.rs, src/ast.rs

use super::*;
use crate::ast::{
    ArrayElement, AssignOp, Expr, ObjectPatternProp, Pattern, PatternElement, PropDef, PropKey,
};

impl Parser {
    /// 宣言で使う束縛先（識別子・配列パターン・オブジェクトパターン）。
    pub(super) fn parse_binding_target(&mut self) -> Result<Pattern, ParseError> {
        let t = self.peek().clone();
        match t.kind {
            TokenKind::Identifier => {
                self.pop_any();
                Ok(Pattern::Ident(t.value))
            }
            TokenKind::Yield if !self.ctx.in_generator => {
                self.pop_any();
                Ok(Pattern::Ident(t.value))
            }
            TokenKind::Await if !self.ctx.in_async => {
                self.pop_any();
                Ok(Pattern::Ident(t.value))
            }
            TokenKind::BracketOpen => self.parse_array_binding(),
            TokenKind::CurlyOpen => self.parse_object_binding(),
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn parse_binding_default(&mut self) -> Result<Option<Expr>, ParseError> {
        if self.accept(TokenKind::Equals).is_some() {
            Ok(Some(self.parse_assignment()?))
        } else {
            Ok(None)
        }
    }

    fn parse_array_binding(&mut self) -> Result<Pattern, ParseError> {
        self.pop(TokenKind::BracketOpen, "'['")?;
        let mut elements = Vec::new();
        let mut rest = None;
        loop {
            match self.peek().kind {
                TokenKind::BracketClose => break,
                TokenKind::Comma => {
                    self.pop_any();
                    elements.push(None);
                    continue;
                }
                TokenKind::TripleDot => {
                    self.pop_any();
                    rest = Some(Box::new(self.parse_binding_target()?));
                    break;
                }
                _ => {
                    let target = self.parse_binding_target()?;
                    let default = self.parse_binding_default()?;
                    elements.push(Some(PatternElement { target, default }));
                }
            }
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.pop(TokenKind::BracketClose, "']'")?;
        Ok(Pattern::Array { elements, rest })
    }

    fn parse_object_binding(&mut self) -> Result<Pattern, ParseError> {
        self.pop(TokenKind::CurlyOpen, "'{'")?;
        let mut props = Vec::new();
        let mut rest = None;
        while !self.is(TokenKind::CurlyClose) {
            if self.accept(TokenKind::TripleDot).is_some() {
                let name = self.pop(TokenKind::Identifier, "identifier")?;
                rest = Some(Box::new(Pattern::Ident(name.value)));
                break;
            }
            let key_token = self.peek().clone();
            let key = self.parse_property_key()?;
            let target = if self.accept(TokenKind::Colon).is_some() {
                self.parse_binding_target()?
            } else {
                match &key {
                    PropKey::Name(name) if key_token.kind == TokenKind::Identifier => {
                        Pattern::Ident(name.clone())
                    }
                    _ => return Err(self.unexpected("':'")),
                }
            };
            let default = self.parse_binding_default()?;
            props.push(ObjectPatternProp {
                key,
                target,
                default,
            });
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.pop(TokenKind::CurlyClose, "'}'")?;
        Ok(Pattern::Object { props, rest })
    }

    /// 代入式の左辺として解析済みの式をパターンへ変換する。
    pub(super) fn expr_to_pattern(&self, expr: Expr) -> Result<Pattern, ParseError> {
        match expr {
            Expr::Ident(name) => Ok(Pattern::Ident(name)),
            member @ Expr::Member {
                optional: false, ..
            } => Ok(Pattern::Member(Box::new(member))),
            Expr::Array(items) => {
                let mut elements = Vec::new();
                let mut rest = None;
                let count = items.len();
                for (idx, item) in items.into_iter().enumerate() {
                    match item {
                        ArrayElement::Hole => elements.push(None),
                        ArrayElement::Item(e) => elements.push(Some(self.element_from_expr(e)?)),
                        ArrayElement::Spread(e) if idx + 1 == count => {
                            rest = Some(Box::new(self.expr_to_pattern(e)?));
                        }
                        ArrayElement::Spread(_) => {
                            return Err(self.error_here("PAR070", "Rest element must be last element"))
                        }
                    }
                }
                Ok(Pattern::Array { elements, rest })
            }
            Expr::Object(defs) => {
                let mut props = Vec::new();
                let mut rest = None;
                let count = defs.len();
                for (idx, def) in defs.into_iter().enumerate() {
                    match def {
                        PropDef::Shorthand(name) => props.push(ObjectPatternProp {
                            key: PropKey::Name(name.clone()),
                            target: Pattern::Ident(name),
                            default: None,
                        }),
                        PropDef::KeyValue(key, value) => {
                            let element = self.element_from_expr(value)?;
                            props.push(ObjectPatternProp {
                                key,
                                target: element.target,
                                default: element.default,
                            });
                        }
                        PropDef::Spread(e) if idx + 1 == count => {
                            rest = Some(Box::new(self.expr_to_pattern(e)?));
                        }
                        _ => {
                            return Err(self.error_here("PAR071", "Invalid destructuring assignment target"))
                        }
                    }
                }
                Ok(Pattern::Object { props, rest })
            }
            _ => Err(self.error_here("PAR050", "Invalid left-hand side in assignment")),
        }
    }

    /// `a = 1` の形の要素を「代入先 + 既定値」に分解する。
    fn element_from_expr(&self, expr: Expr) -> Result<PatternElement, ParseError> {
        match expr {
            Expr::Assign {
                op: AssignOp::Assign,
                target,
                value,
            } => Ok(PatternElement {
                target: *target,
                default: Some(*value),
            }),
            other => Ok(PatternElement {
                target: self.expr_to_pattern(other)?,
                default: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{parse_expression, parse_program, ParseMode};
    use crate::ast::{Expr, Pattern, Stmt};

    #[test]
    /// 配列リテラルの左辺が配列パターンに変換される。
    fn array_assignment_becomes_pattern() {
        match parse_expression("[a, , b = 2, ...rest] = xs").unwrap() {
            Expr::Assign { target, .. } => match *target {
                Pattern::Array { elements, rest } => {
                    assert_eq!(elements.len(), 3);
                    assert!(elements[1].is_none());
                    assert!(elements[2].as_ref().is_some_and(|e| e.default.is_some()));
                    assert!(rest.is_some());
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    /// オブジェクトの分割宣言で束縛名が出現順に得られる。
    fn object_binding_names() {
        let program = parse_program("let { a, b: [c, d], ...e } = obj;", ParseMode::Script).unwrap();
        let Stmt::Var { decls, .. } = &program.body[0] else {
            panic!("expected var");
        };
        let mut names = Vec::new();
        decls[0].target.bound_names(&mut names);
        assert_eq!(names, vec!["a", "c", "d", "e"]);
    }

    #[test]
    /// 呼び出し式への代入は構文エラーになる。
    fn call_is_not_assignable() {
        assert!(parse_expression("f() = 1").is_err());
    }
}
