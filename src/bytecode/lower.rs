// パス: src/bytecode/lower.rs
// 役割: AST のトップレベル単位をスタックマシンの命令列へ変換する
// 意図: 例外処理・switch・ラベル・for-in/of など制御の複雑な構文は扱わず、失敗として呼び出し側に返す
// 関連ファイル: src/bytecode/mod.rs, src/ast.rs

use std::rc::Rc;

use tracing::debug;

use super::{Constant, Executable, Op};
use crate::ast::{
    Argument, ArrayElement, AssignOp, Expr, ForInit, LogicalOp, MemberProp, Pattern, Program, PropDef, PropKey,
    Stmt, UnaryOp, UpdateOp, VarKind,
};
use crate::errors::LoweringError;
use crate::interpreter::describe_callee;

type Lowered = Result<(), LoweringError>;

/// break / continue の飛び先を後から埋めるためのループ文脈。
struct LoopContext {
    breaks: Vec<usize>,
    continues: Vec<usize>,
    /// ループ開始時点で開いていたブロック数。
    block_depth: usize,
}

struct Lowerer {
    exe: Executable,
    loops: Vec<LoopContext>,
    block_depth: usize,
}

/// プログラムを命令列へ変換する。
pub fn lower(program: &Program) -> Result<Executable, LoweringError> {
    let mut lowerer = Lowerer {
        exe: Executable::default(),
        loops: Vec::new(),
        block_depth: 0,
    };
    for stmt in &program.body {
        lowerer.stmt(stmt)?;
    }
    lowerer.emit(Op::Halt);
    if lowerer.exe.code.len() > u32::MAX as usize || lowerer.exe.constants.len() > u32::MAX as usize {
        return Err(LoweringError::TooLarge);
    }
    debug!(
        instructions = lowerer.exe.code.len(),
        constants = lowerer.exe.constants.len(),
        "lowered top-level unit"
    );
    Ok(lowerer.exe)
}

/// ブロック内で巻き上げが必要な宣言だけを抜き出す。
fn block_declarations(body: &[Stmt]) -> Vec<Stmt> {
    body.iter()
        .filter(|s| {
            matches!(
                s,
                Stmt::Function(_)
                    | Stmt::Var {
                        kind: VarKind::Let | VarKind::Const,
                        ..
                    }
            )
        })
        .cloned()
        .collect()
}

impl Lowerer {
    fn emit(&mut self, op: Op) -> usize {
        self.exe.code.push(op);
        self.exe.code.len() - 1
    }

    fn here(&self) -> u32 {
        self.exe.code.len() as u32
    }

    fn patch(&mut self, at: usize) {
        let target = self.here();
        self.exe.code[at].set_jump_target(target);
    }

    fn name(&mut self, name: &str) -> u32 {
        self.exe.add_constant(Constant::String(Rc::from(name)))
    }

    fn string(&mut self, s: &str) -> u32 {
        self.name(s)
    }

    // ---- 文 ----

    fn stmt(&mut self, stmt: &Stmt) -> Lowered {
        match stmt {
            Stmt::Var { kind, decls } => {
                for decl in decls {
                    let Pattern::Ident(name) = &decl.target else {
                        return Err(LoweringError::Unsupported("destructuring declaration"));
                    };
                    let slot = self.name(name);
                    match (&decl.init, kind) {
                        (None, VarKind::Var) => {}
                        (None, _) => {
                            self.emit(Op::Undefined);
                            self.emit(Op::InitName(slot));
                        }
                        (Some(init), VarKind::Var) => {
                            self.named_expr(init, name)?;
                            self.emit(Op::StoreName(slot));
                            self.emit(Op::Pop);
                        }
                        (Some(init), _) => {
                            self.named_expr(init, name)?;
                            self.emit(Op::InitName(slot));
                        }
                    }
                }
                Ok(())
            }
            Stmt::Function(_) | Stmt::Empty | Stmt::Debugger => Ok(()),
            Stmt::Expr(expr) => {
                self.expr(expr)?;
                self.emit(Op::SetResult);
                Ok(())
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test)?;
                let to_else = self.emit(Op::JumpIfFalse(0));
                self.stmt(consequent)?;
                match alternate {
                    Some(alt) => {
                        let to_end = self.emit(Op::Jump(0));
                        self.patch(to_else);
                        self.stmt(alt)?;
                        self.patch(to_end);
                    }
                    None => self.patch(to_else),
                }
                Ok(())
            }
            Stmt::While { test, body } => {
                let start = self.here();
                self.expr(test)?;
                let exit = self.emit(Op::JumpIfFalse(0));
                self.push_loop();
                self.stmt(body)?;
                self.emit(Op::Jump(start));
                self.patch(exit);
                self.finish_loop(start);
                Ok(())
            }
            Stmt::DoWhile { body, test } => {
                let start = self.here();
                self.push_loop();
                self.stmt(body)?;
                let test_at = self.here();
                self.expr(test)?;
                self.emit(Op::JumpIfTrue(start));
                self.finish_loop(test_at);
                Ok(())
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => self.for_loop(init.as_ref(), test.as_ref(), update.as_ref(), body),
            Stmt::Break(None) => self.jump_out(true),
            Stmt::Continue(None) => self.jump_out(false),
            Stmt::Break(Some(_)) | Stmt::Continue(Some(_)) | Stmt::Labeled { .. } => {
                Err(LoweringError::Unsupported("labeled statement"))
            }
            Stmt::Throw(expr) => {
                self.expr(expr)?;
                self.emit(Op::Throw);
                Ok(())
            }
            Stmt::Block(body) => {
                let decls = block_declarations(body);
                if decls.is_empty() {
                    for s in body {
                        self.stmt(s)?;
                    }
                    return Ok(());
                }
                self.enter_block(decls);
                for s in body {
                    self.stmt(s)?;
                }
                self.exit_block();
                Ok(())
            }
            Stmt::Return(_) => Err(LoweringError::Unsupported("return")),
            Stmt::ForIn { .. } => Err(LoweringError::Unsupported("for-in")),
            Stmt::ForOf { .. } => Err(LoweringError::Unsupported("for-of")),
            Stmt::Switch { .. } => Err(LoweringError::Unsupported("switch")),
            Stmt::Try { .. } => Err(LoweringError::Unsupported("try")),
            Stmt::Import { .. } => Err(LoweringError::Unsupported("import")),
            Stmt::Export(_) => Err(LoweringError::Unsupported("export")),
        }
    }

    fn enter_block(&mut self, decls: Vec<Stmt>) {
        self.exe.blocks.push(decls);
        let index = (self.exe.blocks.len() - 1) as u32;
        self.emit(Op::EnterBlock(index));
        self.block_depth += 1;
    }

    fn exit_block(&mut self) {
        self.emit(Op::ExitBlock);
        self.block_depth -= 1;
    }

    fn push_loop(&mut self) {
        self.loops.push(LoopContext {
            breaks: Vec::new(),
            continues: Vec::new(),
            block_depth: self.block_depth,
        });
    }

    /// break を現在位置へ、continue を `continue_to` へ結ぶ。
    fn finish_loop(&mut self, continue_to: u32) {
        let Some(context) = self.loops.pop() else {
            return;
        };
        for at in context.continues {
            self.exe.code[at].set_jump_target(continue_to);
        }
        for at in context.breaks {
            self.patch(at);
        }
    }

    fn jump_out(&mut self, is_break: bool) -> Lowered {
        let keyword = if is_break { "break" } else { "continue" };
        let Some(depth) = self.loops.last().map(|l| l.block_depth) else {
            return Err(LoweringError::StrayJump(keyword));
        };
        for _ in depth..self.block_depth {
            self.emit(Op::ExitBlock);
        }
        let at = self.emit(Op::Jump(0));
        if let Some(context) = self.loops.last_mut() {
            if is_break {
                context.breaks.push(at);
            } else {
                context.continues.push(at);
            }
        }
        Ok(())
    }

    fn for_loop(
        &mut self,
        init: Option<&ForInit>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
    ) -> Lowered {
        let lexical = match init {
            Some(ForInit::Var {
                kind: kind @ (VarKind::Let | VarKind::Const),
                decls,
            }) => {
                let decl = Stmt::Var {
                    kind: *kind,
                    decls: decls.clone(),
                };
                self.enter_block(vec![decl.clone()]);
                self.stmt(&decl)?;
                true
            }
            Some(ForInit::Var { kind, decls }) => {
                self.stmt(&Stmt::Var {
                    kind: *kind,
                    decls: decls.clone(),
                })?;
                false
            }
            Some(ForInit::Expr(e)) => {
                self.expr(e)?;
                self.emit(Op::Pop);
                false
            }
            None => false,
        };
        let start = self.here();
        let exit = match test {
            Some(test) => {
                self.expr(test)?;
                Some(self.emit(Op::JumpIfFalse(0)))
            }
            None => None,
        };
        self.push_loop();
        self.stmt(body)?;
        let update_at = self.here();
        if lexical {
            // クロージャが周回ごとの束縛を掴めるよう複製する
            self.emit(Op::RenewBlock);
        }
        if let Some(update) = update {
            self.expr(update)?;
            self.emit(Op::Pop);
        }
        self.emit(Op::Jump(start));
        if let Some(exit) = exit {
            self.patch(exit);
        }
        self.finish_loop(update_at);
        if lexical {
            self.exit_block();
        }
        Ok(())
    }

    // ---- 式 ----

    /// 無名関数なら代入先の名前を付けて生成する。
    fn named_expr(&mut self, expr: &Expr, name: &str) -> Lowered {
        if let Expr::Function(def) = expr {
            if def.name.is_none() {
                let func = self.exe.add_constant(Constant::Function(def.clone()));
                let name = self.name(name);
                self.emit(Op::Closure { func, name: Some(name) });
                return Ok(());
            }
        }
        self.expr(expr)
    }

    fn expr(&mut self, expr: &Expr) -> Lowered {
        match expr {
            Expr::Number(n) => {
                let c = self.exe.add_constant(Constant::Number(*n));
                self.emit(Op::Const(c));
            }
            Expr::BigInt(digits) => {
                let c = self.exe.add_constant(Constant::BigInt(digits.clone()));
                self.emit(Op::Const(c));
            }
            Expr::String(s) => {
                let c = self.string(s);
                self.emit(Op::Const(c));
            }
            Expr::Template { quasis, exprs } => {
                let mut parts = 0;
                for (i, quasi) in quasis.iter().enumerate() {
                    let c = self.string(quasi);
                    self.emit(Op::Const(c));
                    parts += 1;
                    if let Some(e) = exprs.get(i) {
                        self.expr(e)?;
                        self.emit(Op::Stringify);
                        parts += 1;
                    }
                }
                self.emit(Op::Concat(parts));
            }
            Expr::Regex { pattern, flags } => {
                let c = self.exe.add_constant(Constant::Regex {
                    pattern: pattern.clone(),
                    flags: flags.clone(),
                });
                self.emit(Op::Regex(c));
            }
            Expr::Bool(true) => {
                self.emit(Op::True);
            }
            Expr::Bool(false) => {
                self.emit(Op::False);
            }
            Expr::Null => {
                self.emit(Op::Null);
            }
            Expr::Ident(name) if name == "undefined" => {
                self.emit(Op::Undefined);
            }
            Expr::Ident(name) => {
                let slot = self.name(name);
                self.emit(Op::LoadName(slot));
            }
            Expr::This => {
                self.emit(Op::This);
            }
            Expr::Array(elements) => {
                self.emit(Op::NewArray);
                for element in elements {
                    match element {
                        ArrayElement::Hole => {
                            self.emit(Op::ArrayHole);
                        }
                        ArrayElement::Item(e) => {
                            self.expr(e)?;
                            self.emit(Op::ArrayPush);
                        }
                        ArrayElement::Spread(e) => {
                            self.expr(e)?;
                            self.emit(Op::ArraySpread);
                        }
                    }
                }
            }
            Expr::Object(props) => self.object_literal(props)?,
            Expr::Function(def) => {
                let func = self.exe.add_constant(Constant::Function(def.clone()));
                self.emit(Op::Closure { func, name: None });
            }
            Expr::Member {
                object,
                property,
                optional: false,
            } => {
                self.expr(object)?;
                self.member_get(property)?;
            }
            Expr::Call {
                callee,
                args,
                optional: false,
            } => self.call(callee, args)?,
            Expr::Member { .. } | Expr::Call { .. } | Expr::OptionalChain(_) => {
                return Err(LoweringError::Unsupported("optional chaining"));
            }
            Expr::New { callee, args } => {
                self.expr(callee)?;
                let description = self.string(&describe_callee(callee));
                match self.arguments(args)? {
                    Some(argc) => self.emit(Op::New {
                        argc,
                        callee: description,
                    }),
                    None => self.emit(Op::NewSpread { callee: description }),
                };
            }
            Expr::Unary { op, arg } => self.unary(*op, arg)?,
            Expr::Update { op, prefix, target } => self.update(*op, *prefix, target)?,
            Expr::Binary { op, left, right } => {
                self.expr(left)?;
                self.expr(right)?;
                self.emit(Op::Binary(*op));
            }
            Expr::Logical { op, left, right } => {
                self.expr(left)?;
                let skip = self.emit(short_circuit(*op));
                self.expr(right)?;
                self.patch(skip);
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test)?;
                let to_else = self.emit(Op::JumpIfFalse(0));
                self.expr(consequent)?;
                let to_end = self.emit(Op::Jump(0));
                self.patch(to_else);
                self.expr(alternate)?;
                self.patch(to_end);
            }
            Expr::Assign { op, target, value } => self.assign(*op, target, value)?,
            Expr::Sequence(exprs) => {
                for (i, e) in exprs.iter().enumerate() {
                    self.expr(e)?;
                    if i + 1 < exprs.len() {
                        self.emit(Op::Pop);
                    }
                }
                if exprs.is_empty() {
                    self.emit(Op::Undefined);
                }
            }
            Expr::Await(_) => return Err(LoweringError::Unsupported("await")),
            Expr::Yield { .. } => return Err(LoweringError::Unsupported("yield")),
        }
        Ok(())
    }

    fn member_get(&mut self, property: &MemberProp) -> Lowered {
        match property {
            MemberProp::Name(name) => {
                let slot = self.name(name);
                self.emit(Op::GetProp(slot));
            }
            MemberProp::Computed(key) => {
                self.expr(key)?;
                self.emit(Op::ToPropertyKey);
                self.emit(Op::GetElem);
            }
        }
        Ok(())
    }

    /// 引数を積む。スプレッドを含む場合は配列 1 つにまとめて `None` を返す。
    fn arguments(&mut self, args: &[Argument]) -> Result<Option<u32>, LoweringError> {
        if args.iter().any(|a| matches!(a, Argument::Spread(_))) {
            self.emit(Op::NewArray);
            for arg in args {
                match arg {
                    Argument::Item(e) => {
                        self.expr(e)?;
                        self.emit(Op::ArrayPush);
                    }
                    Argument::Spread(e) => {
                        self.expr(e)?;
                        self.emit(Op::ArraySpread);
                    }
                }
            }
            return Ok(None);
        }
        for arg in args {
            if let Argument::Item(e) = arg {
                self.expr(e)?;
            }
        }
        Ok(Some(args.len() as u32))
    }

    fn call(&mut self, callee: &Expr, args: &[Argument]) -> Lowered {
        match callee {
            Expr::Member {
                object,
                property,
                optional: false,
            } => {
                self.expr(object)?;
                self.emit(Op::Dup);
                self.member_get(property)?;
            }
            Expr::Member { .. } => return Err(LoweringError::Unsupported("optional chaining")),
            other => {
                self.emit(Op::Undefined);
                self.expr(other)?;
            }
        }
        let description = self.string(&describe_callee(callee));
        match self.arguments(args)? {
            Some(argc) => self.emit(Op::Call {
                argc,
                callee: description,
            }),
            None => self.emit(Op::CallSpread { callee: description }),
        };
        Ok(())
    }

    fn object_literal(&mut self, props: &[PropDef]) -> Lowered {
        self.emit(Op::NewObject);
        for prop in props {
            match prop {
                PropDef::KeyValue(PropKey::Name(name), value) => {
                    self.named_expr(value, name)?;
                    let slot = self.name(name);
                    self.emit(Op::DefineField(slot));
                }
                PropDef::KeyValue(PropKey::Computed(key), value) => {
                    self.expr(key)?;
                    self.emit(Op::ToPropertyKey);
                    self.expr(value)?;
                    self.emit(Op::DefineComputed);
                }
                PropDef::Shorthand(name) => {
                    let slot = self.name(name);
                    self.emit(Op::LoadName(slot));
                    self.emit(Op::DefineField(slot));
                }
                PropDef::Method(PropKey::Name(name), def) => {
                    let func = self.exe.add_constant(Constant::Function(def.clone()));
                    let slot = self.name(name);
                    self.emit(Op::Closure { func, name: Some(slot) });
                    self.emit(Op::DefineField(slot));
                }
                PropDef::Spread(source) => {
                    self.expr(source)?;
                    self.emit(Op::CopyData);
                }
                PropDef::Method(PropKey::Computed(_), _) => {
                    return Err(LoweringError::Unsupported("computed method"));
                }
                PropDef::Getter(..) | PropDef::Setter(..) => {
                    return Err(LoweringError::Unsupported("accessor property"));
                }
            }
        }
        Ok(())
    }

    fn unary(&mut self, op: UnaryOp, arg: &Expr) -> Lowered {
        match (op, arg) {
            (UnaryOp::Typeof, Expr::Ident(name)) => {
                let slot = self.name(name);
                self.emit(Op::TypeofName(slot));
            }
            (UnaryOp::Delete, Expr::Member { object, property, optional: false }) => {
                self.expr(object)?;
                match property {
                    MemberProp::Name(name) => {
                        let slot = self.name(name);
                        self.emit(Op::DeleteProp(slot));
                    }
                    MemberProp::Computed(key) => {
                        self.expr(key)?;
                        self.emit(Op::ToPropertyKey);
                        self.emit(Op::DeleteElem);
                    }
                }
            }
            (UnaryOp::Delete, Expr::Ident(_) | Expr::Member { .. } | Expr::OptionalChain(_)) => {
                return Err(LoweringError::Unsupported("delete of a binding"));
            }
            (UnaryOp::Delete, other) => {
                self.expr(other)?;
                self.emit(Op::Pop);
                self.emit(Op::True);
            }
            (op, arg) => {
                self.expr(arg)?;
                self.emit(Op::Unary(op));
            }
        }
        Ok(())
    }

    fn update(&mut self, op: UpdateOp, prefix: bool, target: &Expr) -> Lowered {
        let step = match op {
            UpdateOp::Increment => Op::Inc,
            UpdateOp::Decrement => Op::Dec,
        };
        match target {
            Expr::Ident(name) => {
                let slot = self.name(name);
                self.emit(Op::LoadName(slot));
                self.emit(Op::ToNumeric);
                if prefix {
                    self.emit(step);
                    self.emit(Op::StoreName(slot));
                } else {
                    self.emit(Op::Dup);
                    self.emit(step);
                    self.emit(Op::StoreName(slot));
                    self.emit(Op::Pop);
                }
            }
            Expr::Member {
                object,
                property,
                optional: false,
            } => {
                self.expr(object)?;
                let name = match property {
                    MemberProp::Name(name) => {
                        let slot = self.name(name);
                        self.emit(Op::Dup);
                        self.emit(Op::GetProp(slot));
                        Some(slot)
                    }
                    MemberProp::Computed(key) => {
                        self.expr(key)?;
                        self.emit(Op::ToPropertyKey);
                        self.emit(Op::Dup2);
                        self.emit(Op::GetElem);
                        None
                    }
                };
                self.emit(Op::ToNumeric);
                let depth = if name.is_some() { 2 } else { 3 };
                if !prefix {
                    // 旧値を参照の下へ退避する
                    self.emit(Op::Dup);
                    self.emit(Op::Bury(depth));
                }
                self.emit(step);
                match name {
                    Some(slot) => self.emit(Op::SetProp(slot)),
                    None => self.emit(Op::SetElem),
                };
                if !prefix {
                    self.emit(Op::Pop);
                }
            }
            _ => return Err(LoweringError::Unsupported("update target")),
        }
        Ok(())
    }

    fn assign(&mut self, op: AssignOp, target: &Pattern, value: &Expr) -> Lowered {
        match target {
            Pattern::Ident(name) => {
                let slot = self.name(name);
                match op {
                    AssignOp::Assign => self.named_expr(value, name)?,
                    AssignOp::Compound(bin) => {
                        self.emit(Op::LoadName(slot));
                        self.expr(value)?;
                        self.emit(Op::Binary(bin));
                    }
                    AssignOp::Logical(logical) => {
                        self.emit(Op::LoadName(slot));
                        let skip = self.emit(short_circuit(logical));
                        self.named_expr(value, name)?;
                        self.emit(Op::StoreName(slot));
                        self.patch(skip);
                        return Ok(());
                    }
                }
                self.emit(Op::StoreName(slot));
                Ok(())
            }
            Pattern::Member(expr) => {
                let Expr::Member {
                    object,
                    property,
                    optional: false,
                } = expr.as_ref()
                else {
                    return Err(LoweringError::Unsupported("assignment target"));
                };
                self.expr(object)?;
                let name = match property {
                    MemberProp::Name(name) => Some(self.name(name)),
                    MemberProp::Computed(key) => {
                        self.expr(key)?;
                        self.emit(Op::ToPropertyKey);
                        None
                    }
                };
                let store = match name {
                    Some(slot) => Op::SetProp(slot),
                    None => Op::SetElem,
                };
                let read = |lowerer: &mut Lowerer| match name {
                    Some(slot) => {
                        lowerer.emit(Op::Dup);
                        lowerer.emit(Op::GetProp(slot));
                    }
                    None => {
                        lowerer.emit(Op::Dup2);
                        lowerer.emit(Op::GetElem);
                    }
                };
                match op {
                    AssignOp::Assign => {
                        self.expr(value)?;
                        self.emit(store);
                    }
                    AssignOp::Compound(bin) => {
                        read(self);
                        self.expr(value)?;
                        self.emit(Op::Binary(bin));
                        self.emit(store);
                    }
                    AssignOp::Logical(logical) => {
                        read(self);
                        let skip = self.emit(short_circuit(logical));
                        self.expr(value)?;
                        self.emit(store);
                        let to_end = self.emit(Op::Jump(0));
                        self.patch(skip);
                        // 短絡時は [参照.., 現在値] から参照を取り除く
                        let refs = if name.is_some() { 1 } else { 2 };
                        for _ in 0..refs {
                            self.emit(Op::Swap);
                            self.emit(Op::Pop);
                        }
                        self.patch(to_end);
                    }
                }
                Ok(())
            }
            Pattern::Object { .. } | Pattern::Array { .. } => {
                Err(LoweringError::Unsupported("destructuring assignment"))
            }
        }
    }
}

/// 論理演算の短絡ジャンプ。左辺の値を残して飛ぶ。
fn short_circuit(op: LogicalOp) -> Op {
    match op {
        LogicalOp::And => Op::JumpIfFalseKeep(0),
        LogicalOp::Or => Op::JumpIfTrueKeep(0),
        LogicalOp::Nullish => Op::JumpIfNotNullishKeep(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_program, ParseMode};

    fn lower_src(src: &str) -> Result<Executable, LoweringError> {
        let program = parse_program(src, ParseMode::Script).expect("parse");
        lower(&program)
    }

    #[test]
    /// 式文は結果レジスタへ保存され、末尾に停止命令が付く。
    fn expression_statement_sets_result() {
        let exe = lower_src("1 + 2").expect("lower");
        assert_eq!(
            exe.code,
            vec![Op::Const(0), Op::Const(1), Op::Binary(crate::ast::BinaryOp::Add), Op::SetResult, Op::Halt]
        );
    }

    #[test]
    /// 制御の複雑な構文は変換失敗になる。
    fn unsupported_constructs_fail() {
        for src in ["try { 1 } catch (e) {}", "switch (1) {}", "for (const x of []) {}", "a: while (1) {}"] {
            assert!(matches!(lower_src(src), Err(LoweringError::Unsupported(_))), "{}", src);
        }
    }

    #[test]
    /// ループの外の break は飛び先がない。
    fn stray_break_is_rejected() {
        assert!(matches!(lower_src("if (1) { break; }"), Err(LoweringError::StrayJump("break"))));
    }

    #[test]
    /// while の break は終了位置、continue は条件式の先頭へ飛ぶ。
    fn loop_jumps_are_patched() {
        let exe = lower_src("while (x) { if (y) break; continue; }").expect("lower");
        let end = (exe.code.len() - 1) as u32;
        let jumps: Vec<u32> = exe.code.iter().filter_map(|op| match op {
            Op::Jump(t) => Some(*t),
            _ => None,
        }).collect();
        assert!(jumps.contains(&end), "{:?}", exe.code);
        assert!(jumps.contains(&0), "{:?}", exe.code);
    }
}
