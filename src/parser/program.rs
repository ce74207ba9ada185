// パス: src/parser/program.rs
// 役割: 文・宣言・モジュール項目の構文解析ルーチンを実装する
// 意図: 文レベルの解析ロジックを式解析から分離し可読性を高める
// 関連ファイル: src/parser/expr.rs, src/parser/pattern.rs, src/parser/mod.rs

use std::rc::Rc;

use super::*;
use crate::ast::{
    CatchClause, Expr, ForHead, ForInit, FunctionBody, FunctionDef, FunctionFlavor, Param,
    Pattern, Stmt, SwitchCase, VarDeclarator, VarKind,
};

impl Parser {
    pub(super) fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut body = Vec::new();
        while !self.is(TokenKind::Eof) {
            body.push(self.parse_statement()?);
        }
        Ok(Program {
            body,
            is_module: self.mode() == ParseMode::Module,
        })
    }

    pub(super) fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let t = self.peek().clone();
        match t.kind {
            TokenKind::CurlyOpen => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::Semicolon => {
                self.pop_any();
                Ok(Stmt::Empty)
            }
            TokenKind::Var | TokenKind::Let | TokenKind::Const => {
                let stmt = self.parse_variable_statement()?;
                self.consume_semicolon()?;
                Ok(stmt)
            }
            TokenKind::Function => Ok(Stmt::Function(self.parse_function(false, true)?)),
            TokenKind::Identifier
                if t.value == "async"
                    && self.peek_kind(1) == TokenKind::Function
                    && !self.peek_at(1).is_some_and(|n| n.trivia.contains('\n')) =>
            {
                self.pop_any();
                Ok(Stmt::Function(self.parse_function(true, true)?))
            }
            TokenKind::Identifier if self.peek_kind(1) == TokenKind::Colon => {
                let label = self.pop_any().value;
                self.pop_any();
                let body = self.parse_statement()?;
                Ok(Stmt::Labeled {
                    label,
                    body: Box::new(body),
                })
            }
            TokenKind::If => self.parse_if(),
            TokenKind::While => {
                self.pop_any();
                let test = self.parse_paren_expression()?;
                let body = self.parse_statement()?;
                Ok(Stmt::While {
                    test,
                    body: Box::new(body),
                })
            }
            TokenKind::Do => {
                self.pop_any();
                let body = self.parse_statement()?;
                self.pop(TokenKind::While, "'while'")?;
                let test = self.parse_paren_expression()?;
                self.accept(TokenKind::Semicolon);
                Ok(Stmt::DoWhile {
                    body: Box::new(body),
                    test,
                })
            }
            TokenKind::For => self.parse_for(),
            TokenKind::Break | TokenKind::Continue => {
                self.pop_any();
                let label = if self.is(TokenKind::Identifier) && !self.newline_before() {
                    Some(self.pop_any().value)
                } else {
                    None
                };
                self.consume_semicolon()?;
                Ok(if t.kind == TokenKind::Break {
                    Stmt::Break(label)
                } else {
                    Stmt::Continue(label)
                })
            }
            TokenKind::Return => {
                if !self.ctx.in_function {
                    return Err(self.error_here("PAR010", "'return' not in a function"));
                }
                self.pop_any();
                let arg = if matches!(
                    self.peek().kind,
                    TokenKind::Semicolon | TokenKind::CurlyClose | TokenKind::Eof
                ) || self.newline_before()
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_semicolon()?;
                Ok(Stmt::Return(arg))
            }
            TokenKind::Throw => {
                self.pop_any();
                if self.newline_before() {
                    return Err(self.error_here("PAR011", "No line break is allowed after 'throw'"));
                }
                let arg = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Throw(arg))
            }
            TokenKind::Try => self.parse_try(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Debugger => {
                self.pop_any();
                self.consume_semicolon()?;
                Ok(Stmt::Debugger)
            }
            TokenKind::Class => Err(self.error_here("PAR012", "Class declarations are not supported")),
            TokenKind::With => Err(self.error_here("PAR013", "'with' statement is not supported")),
            TokenKind::Import if self.peek_kind(1) != TokenKind::ParenOpen => self.parse_import(),
            TokenKind::Export => self.parse_export(),
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    pub(super) fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.pop(TokenKind::CurlyOpen, "'{'")?;
        let mut body = Vec::new();
        while !self.is(TokenKind::CurlyClose) {
            if self.is(TokenKind::Eof) {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.parse_statement()?);
        }
        self.pop_any();
        Ok(body)
    }

    fn parse_paren_expression(&mut self) -> Result<Expr, ParseError> {
        self.pop(TokenKind::ParenOpen, "'('")?;
        let expr = self.parse_expression()?;
        self.pop(TokenKind::ParenClose, "')'")?;
        Ok(expr)
    }

    fn var_kind(&mut self) -> Result<VarKind, ParseError> {
        let t = self.pop_any();
        Ok(match t.kind {
            TokenKind::Var => VarKind::Var,
            TokenKind::Let => VarKind::Let,
            TokenKind::Const => VarKind::Const,
            _ => return Err(self.error_at(&t, "PAR020", "Expected variable declaration")),
        })
    }

    /// `var` / `let` / `const` 宣言（末尾のセミコロンは呼び出し側で扱う）。
    fn parse_variable_statement(&mut self) -> Result<Stmt, ParseError> {
        let kind = self.var_kind()?;
        let decls = self.parse_declarators(kind)?;
        Ok(Stmt::Var { kind, decls })
    }

    fn parse_declarators(&mut self, kind: VarKind) -> Result<Vec<VarDeclarator>, ParseError> {
        let mut decls = Vec::new();
        loop {
            let at = self.peek().clone();
            let target = self.parse_binding_target()?;
            let init = if self.accept(TokenKind::Equals).is_some() {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            if init.is_none() && !self.no_in {
                if kind == VarKind::Const {
                    return Err(self.error_at(&at, "PAR021", "Missing initializer in const declaration"));
                }
                if !matches!(target, Pattern::Ident(_)) {
                    return Err(self.error_at(&at, "PAR022", "Missing initializer in destructuring declaration"));
                }
            }
            decls.push(VarDeclarator { target, init });
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        Ok(decls)
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.pop_any();
        let test = self.parse_paren_expression()?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.accept(TokenKind::Else).is_some() {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        self.pop_any();
        if self.is(TokenKind::Await) {
            return Err(self.error_here("PAR030", "'for await' is not supported"));
        }
        self.pop(TokenKind::ParenOpen, "'('")?;

        let mut init = None;
        if matches!(
            self.peek().kind,
            TokenKind::Var | TokenKind::Let | TokenKind::Const
        ) {
            let kind = self.var_kind()?;
            self.no_in = true;
            let decls = self.parse_declarators(kind);
            self.no_in = false;
            let mut decls = decls?;
            if decls.len() == 1 && decls[0].init.is_none() {
                if let Some(stmt) = self.parse_for_in_of_tail(|| ForHead::Var {
                    kind,
                    target: decls[0].target.clone(),
                })? {
                    return Ok(stmt);
                }
            }
            if kind == VarKind::Const && decls.iter().any(|d| d.init.is_none()) {
                return Err(self.error_here("PAR021", "Missing initializer in const declaration"));
            }
            init = Some(ForInit::Var {
                kind,
                decls: std::mem::take(&mut decls),
            });
        } else if !self.is(TokenKind::Semicolon) {
            self.no_in = true;
            let expr = self.parse_expression();
            self.no_in = false;
            let expr = expr?;
            if self.is(TokenKind::In) || self.is_contextual("of") {
                let target = self.expr_to_pattern(expr.clone())?;
                if let Some(stmt) = self.parse_for_in_of_tail(|| ForHead::Target(target.clone()))? {
                    return Ok(stmt);
                }
            }
            init = Some(ForInit::Expr(expr));
        }

        self.pop(TokenKind::Semicolon, "';'")?;
        let test = if self.is(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.pop(TokenKind::Semicolon, "';'")?;
        let update = if self.is(TokenKind::ParenClose) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.pop(TokenKind::ParenClose, "')'")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    /// `in` / `of` が続く場合に for-in / for-of の残りを解析する。
    fn parse_for_in_of_tail(
        &mut self,
        head: impl FnOnce() -> ForHead,
    ) -> Result<Option<Stmt>, ParseError> {
        if self.accept(TokenKind::In).is_some() {
            let object = self.parse_expression()?;
            self.pop(TokenKind::ParenClose, "')'")?;
            let body = Box::new(self.parse_statement()?);
            return Ok(Some(Stmt::ForIn {
                head: head(),
                object,
                body,
            }));
        }
        if self.is_contextual("of") {
            self.pop_any();
            let iterable = self.parse_assignment()?;
            self.pop(TokenKind::ParenClose, "')'")?;
            let body = Box::new(self.parse_statement()?);
            return Ok(Some(Stmt::ForOf {
                head: head(),
                iterable,
                body,
            }));
        }
        Ok(None)
    }

    fn parse_try(&mut self) -> Result<Stmt, ParseError> {
        self.pop_any();
        let block = self.parse_block()?;
        let handler = if self.accept(TokenKind::Catch).is_some() {
            let param = if self.accept(TokenKind::ParenOpen).is_some() {
                let p = self.parse_binding_target()?;
                self.pop(TokenKind::ParenClose, "')'")?;
                Some(p)
            } else {
                None
            };
            Some(CatchClause {
                param,
                body: self.parse_block()?,
            })
        } else {
            None
        };
        let finalizer = if self.accept(TokenKind::Finally).is_some() {
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.unexpected("'catch' or 'finally'"));
        }
        Ok(Stmt::Try {
            block,
            handler,
            finalizer,
        })
    }

    fn parse_switch(&mut self) -> Result<Stmt, ParseError> {
        self.pop_any();
        let discriminant = self.parse_paren_expression()?;
        self.pop(TokenKind::CurlyOpen, "'{'")?;
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.is(TokenKind::CurlyClose) {
            let test = if self.accept(TokenKind::Case).is_some() {
                Some(self.parse_expression()?)
            } else if self.is(TokenKind::Default) {
                if seen_default {
                    return Err(self.error_here("PAR031", "Multiple 'default' clauses in switch statement"));
                }
                seen_default = true;
                self.pop_any();
                None
            } else {
                return Err(self.unexpected("'case', 'default' or '}'"));
            };
            self.pop(TokenKind::Colon, "':'")?;
            let mut body = Vec::new();
            while !matches!(
                self.peek().kind,
                TokenKind::Case | TokenKind::Default | TokenKind::CurlyClose | TokenKind::Eof
            ) {
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        self.pop_any();
        Ok(Stmt::Switch {
            discriminant,
            cases,
        })
    }

    fn parse_import(&mut self) -> Result<Stmt, ParseError> {
        if self.mode() != ParseMode::Module {
            return Err(self.error_here("PAR040", "Import statements are only allowed in modules"));
        }
        self.pop_any();
        let mut bindings = Vec::new();
        if !self.is(TokenKind::StringLiteral) {
            if self.is(TokenKind::Identifier) {
                bindings.push(self.pop_any().value);
                self.accept(TokenKind::Comma);
            }
            if self.accept(TokenKind::Asterisk).is_some() {
                if !self.is_contextual("as") {
                    return Err(self.unexpected("'as'"));
                }
                self.pop_any();
                bindings.push(self.pop(TokenKind::Identifier, "identifier")?.value);
            } else if self.accept(TokenKind::CurlyOpen).is_some() {
                while !self.is(TokenKind::CurlyClose) {
                    let name = self.pop_any();
                    if !name.is_identifier_name() && name.kind != TokenKind::StringLiteral {
                        return Err(self.error_at(&name, "PAR041", format!("Unexpected token {}. Expected import name", name.value)));
                    }
                    let local = if self.is_contextual("as") {
                        self.pop_any();
                        self.pop(TokenKind::Identifier, "identifier")?.value
                    } else {
                        name.value
                    };
                    bindings.push(local);
                    if self.accept(TokenKind::Comma).is_none() {
                        break;
                    }
                }
                self.pop(TokenKind::CurlyClose, "'}'")?;
            }
            if !self.is_contextual("from") {
                return Err(self.unexpected("'from'"));
            }
            self.pop_any();
        }
        let source = self.pop(TokenKind::StringLiteral, "module specifier")?;
        self.consume_semicolon()?;
        let source = self.string_value(&source)?;
        Ok(Stmt::Import { bindings, source })
    }

    fn parse_export(&mut self) -> Result<Stmt, ParseError> {
        if self.mode() != ParseMode::Module {
            return Err(self.error_here("PAR042", "Export statements are only allowed in modules"));
        }
        self.pop_any();
        if self.accept(TokenKind::Default).is_some() {
            let stmt = if self.is(TokenKind::Function) {
                Stmt::Function(self.parse_function(false, false)?)
            } else {
                let expr = self.parse_assignment()?;
                self.consume_semicolon()?;
                Stmt::Var {
                    kind: VarKind::Const,
                    decls: vec![VarDeclarator {
                        target: Pattern::Ident("*default*".into()),
                        init: Some(expr),
                    }],
                }
            };
            return Ok(Stmt::Export(Box::new(stmt)));
        }
        match self.peek().kind {
            TokenKind::Var | TokenKind::Let | TokenKind::Const | TokenKind::Function => {
                Ok(Stmt::Export(Box::new(self.parse_statement()?)))
            }
            TokenKind::Identifier if self.is_contextual("async") => {
                Ok(Stmt::Export(Box::new(self.parse_statement()?)))
            }
            _ => Err(self.error_here("PAR043", "Only declarations can be exported")),
        }
    }

    /// `function` キーワードから関数定義を解析する（`async` は呼び出し側で消費済み）。
    pub(super) fn parse_function(
        &mut self,
        is_async: bool,
        require_name: bool,
    ) -> Result<Rc<FunctionDef>, ParseError> {
        self.pop(TokenKind::Function, "'function'")?;
        let is_generator = self.accept(TokenKind::Asterisk).is_some();
        let name = if self.is(TokenKind::Identifier)
            || (self.is(TokenKind::Yield) && !is_generator)
            || (self.is(TokenKind::Await) && !is_async)
        {
            Some(self.pop_any().value)
        } else if require_name {
            return Err(self.unexpected("function name"));
        } else {
            None
        };
        let flavor = match (is_async, is_generator) {
            (false, false) => FunctionFlavor::Normal,
            (false, true) => FunctionFlavor::Generator,
            (true, false) => FunctionFlavor::Async,
            (true, true) => FunctionFlavor::AsyncGenerator,
        };
        self.parse_function_rest(name, flavor)
    }

    /// 仮引数リストと本体を解析する。
    pub(super) fn parse_function_rest(
        &mut self,
        name: Option<String>,
        flavor: FunctionFlavor,
    ) -> Result<Rc<FunctionDef>, ParseError> {
        let saved = self.ctx;
        let saved_no_in = self.no_in;
        self.ctx = FunctionContext {
            in_function: true,
            in_generator: matches!(
                flavor,
                FunctionFlavor::Generator | FunctionFlavor::AsyncGenerator
            ),
            in_async: matches!(flavor, FunctionFlavor::Async | FunctionFlavor::AsyncGenerator),
        };
        self.no_in = false;
        let result: Result<_, ParseError> = (|| {
            let params = self.parse_params()?;
            let body = self.parse_block()?;
            Ok((params, body))
        })();
        self.ctx = saved;
        self.no_in = saved_no_in;
        let (params, body) = result?;
        Ok(Rc::new(FunctionDef {
            name,
            params,
            body: FunctionBody::Block(body),
            flavor,
            is_arrow: false,
        }))
    }

    pub(super) fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.pop(TokenKind::ParenOpen, "'('")?;
        let mut params = Vec::new();
        while !self.is(TokenKind::ParenClose) {
            let rest = self.accept(TokenKind::TripleDot).is_some();
            let target = self.parse_binding_target()?;
            let default = if !rest && self.accept(TokenKind::Equals).is_some() {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            params.push(Param {
                target,
                default,
                rest,
            });
            if rest || self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.pop(TokenKind::ParenClose, "')'")?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{parse_program, ParseMode};
    use crate::ast::Stmt;

    #[test]
    /// 改行による自動セミコロン挿入で 2 文に分かれる。
    fn asi_splits_statements_on_newline() {
        let program = parse_program("let a = 1\na + 1", ParseMode::Script).unwrap();
        assert_eq!(program.body.len(), 2);
    }

    #[test]
    /// 同一行の 2 式はセミコロンがなければエラーになる。
    fn missing_semicolon_on_same_line_is_error() {
        let err = parse_program("a b", ParseMode::Script).unwrap_err();
        assert!(err.to_string().contains("Unexpected token b"), "{}", err);
    }

    #[test]
    /// スクリプトでは import が拒否され、モジュールでは受理される。
    fn import_requires_module_mode() {
        assert!(parse_program("import { a } from 'm';", ParseMode::Script).is_err());
        let program = parse_program("import { a as b } from 'm';", ParseMode::Module).unwrap();
        assert!(matches!(&program.body[0], Stmt::Import { bindings, source } if bindings == &["b"] && source == "m"));
    }

    #[test]
    /// for-of と分割束縛の組み合わせを解析できる。
    fn for_of_with_destructuring() {
        let program = parse_program("for (const [k, v] of m) {}", ParseMode::Script).unwrap();
        assert!(matches!(program.body[0], Stmt::ForOf { .. }));
    }

    #[test]
    /// ラベル付き文と switch を解析できる。
    fn labels_and_switch() {
        let src = "outer: for (;;) { switch (x) { case 1: break outer; default: continue outer; } }";
        let program = parse_program(src, ParseMode::Script).unwrap();
        assert!(matches!(program.body[0], Stmt::Labeled { .. }));
    }

    #[test]
    /// 関数外の return は構文エラーになる。
    fn return_outside_function_is_error() {
        assert!(parse_program("return 1", ParseMode::Script).is_err());
    }
}
