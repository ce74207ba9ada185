// パス: src/bytecode/mod.rs
// 役割: トップレベル単位を実行するスタックマシンの命令列
// 意図: AST と VM の間の中間表現。`--dump-bytecode` 用に Display を持つ
// 関連ファイル: src/bytecode/lower.rs, src/bytecode/passes.rs, src/bytecode/vm.rs
//! バイトコード
//!
//! - 値はオペランドスタックに積み、式文の値は結果レジスタ 0 に保存する。
//! - 名前・定数は `constants` 表の添字で参照する。
//! - ジャンプ先は命令列の絶対位置。

use std::fmt;
use std::rc::Rc;

use crate::ast::{BinaryOp, FunctionDef, Stmt, UnaryOp};

pub mod lower;
pub mod passes;
pub mod vm;

pub use lower::lower;
pub use passes::optimize;
pub use vm::run;

/// 定数表の要素。
#[derive(Clone, Debug)]
pub enum Constant {
    Number(f64),
    String(Rc<str>),
    BigInt(String),
    Function(Rc<FunctionDef>),
    Regex { pattern: String, flags: String },
}

impl Constant {
    /// 同値な定数を再利用するための比較。関数は常に別物。
    fn same(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Number(a), Constant::Number(b)) => a.to_bits() == b.to_bits(),
            (Constant::String(a), Constant::String(b)) => a == b,
            (Constant::BigInt(a), Constant::BigInt(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Number(n) => write!(f, "{}", runtime_heap::number_to_string(*n)),
            Constant::String(s) => write!(f, "{:?}", s),
            Constant::BigInt(digits) => write!(f, "{}n", digits),
            Constant::Function(def) => write!(f, "<function {}>", def.name.as_deref().unwrap_or("(anonymous)")),
            Constant::Regex { pattern, flags } => write!(f, "/{}/{}", pattern, flags),
        }
    }
}

/// 命令。`u32` の引数は特記なければ定数表の添字。
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Op {
    Nop,
    Const(u32),
    Undefined,
    Null,
    True,
    False,
    This,
    Pop,
    Dup,
    /// 上 2 つを複製する。
    Dup2,
    Swap,
    /// 先頭を n 個下へ沈める。
    Bury(u32),
    LoadName(u32),
    /// 先頭を代入する（スタックには残す）。
    StoreName(u32),
    /// let / const の初期化（先頭を取り除く）。
    InitName(u32),
    TypeofName(u32),
    /// 添字はブロック宣言表。
    EnterBlock(u32),
    RenewBlock,
    ExitBlock,
    GetProp(u32),
    /// [obj, v] -> v
    SetProp(u32),
    GetElem,
    /// [obj, key, v] -> v
    SetElem,
    DeleteProp(u32),
    DeleteElem,
    /// [this, f, args..] -> result。`callee` は TypeError 用の説明文字列。
    Call { argc: u32, callee: u32 },
    /// [this, f, array] -> result
    CallSpread { callee: u32 },
    New { argc: u32, callee: u32 },
    NewSpread { callee: u32 },
    Unary(UnaryOp),
    Binary(BinaryOp),
    ToNumeric,
    Inc,
    Dec,
    ToPropertyKey,
    /// テンプレートの置換部分。
    Stringify,
    Concat(u32),
    NewArray,
    ArrayPush,
    ArraySpread,
    ArrayHole,
    NewObject,
    /// [obj, v] -> obj
    DefineField(u32),
    /// [obj, key, v] -> obj
    DefineComputed,
    /// [obj, source] -> obj
    CopyData,
    /// `name` は推論された関数名（定数表の添字）。
    Closure { func: u32, name: Option<u32> },
    Regex(u32),
    Jump(u32),
    JumpIfFalse(u32),
    JumpIfTrue(u32),
    /// 偽なら値を残して跳ぶ。真なら値を捨てて続く。
    JumpIfFalseKeep(u32),
    JumpIfTrueKeep(u32),
    JumpIfNotNullishKeep(u32),
    Throw,
    SetResult,
    Halt,
}

impl Op {
    pub fn jump_target(&self) -> Option<u32> {
        match *self {
            Op::Jump(t)
            | Op::JumpIfFalse(t)
            | Op::JumpIfTrue(t)
            | Op::JumpIfFalseKeep(t)
            | Op::JumpIfTrueKeep(t)
            | Op::JumpIfNotNullishKeep(t) => Some(t),
            _ => None,
        }
    }

    pub(crate) fn set_jump_target(&mut self, target: u32) {
        match self {
            Op::Jump(t)
            | Op::JumpIfFalse(t)
            | Op::JumpIfTrue(t)
            | Op::JumpIfFalseKeep(t)
            | Op::JumpIfTrueKeep(t)
            | Op::JumpIfNotNullishKeep(t) => *t = target,
            _ => {}
        }
    }

    /// 次の命令へ制御が落ちない命令。
    pub fn is_terminator(&self) -> bool {
        matches!(self, Op::Jump(_) | Op::Throw | Op::Halt)
    }
}

/// 変換済みのトップレベル単位。
#[derive(Clone, Debug, Default)]
pub struct Executable {
    pub code: Vec<Op>,
    pub constants: Vec<Constant>,
    /// `EnterBlock` ごとの巻き上げ対象（let / const / 関数宣言）。
    pub blocks: Vec<Vec<Stmt>>,
}

impl Executable {
    pub(crate) fn add_constant(&mut self, constant: Constant) -> u32 {
        if let Some(i) = self.constants.iter().position(|c| c.same(&constant)) {
            return i as u32;
        }
        self.constants.push(constant);
        (self.constants.len() - 1) as u32
    }

    pub(crate) fn name(&self, index: u32) -> Rc<str> {
        match self.constants.get(index as usize) {
            Some(Constant::String(s)) => s.clone(),
            _ => Rc::from(""),
        }
    }
}

fn mnemonic(op: &Op, exe: &Executable, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let c = |i: u32| {
        exe.constants
            .get(i as usize)
            .map(|c| c.to_string())
            .unwrap_or_else(|| "?".into())
    };
    let n = |i: u32| exe.name(i);
    match op {
        Op::Const(i) => write!(f, "const #{}  ; {}", i, c(*i)),
        Op::Bury(k) => write!(f, "bury {}", k),
        Op::LoadName(i) => write!(f, "load_name {}", n(*i)),
        Op::StoreName(i) => write!(f, "store_name {}", n(*i)),
        Op::InitName(i) => write!(f, "init_name {}", n(*i)),
        Op::TypeofName(i) => write!(f, "typeof_name {}", n(*i)),
        Op::EnterBlock(b) => write!(f, "enter_block {}", b),
        Op::GetProp(i) => write!(f, "get_prop .{}", n(*i)),
        Op::SetProp(i) => write!(f, "set_prop .{}", n(*i)),
        Op::DeleteProp(i) => write!(f, "delete_prop .{}", n(*i)),
        Op::Call { argc, .. } => write!(f, "call {}", argc),
        Op::New { argc, .. } => write!(f, "new {}", argc),
        Op::CallSpread { .. } => write!(f, "call_spread"),
        Op::NewSpread { .. } => write!(f, "new_spread"),
        Op::Unary(op) => write!(f, "unary {:?}", op),
        Op::Binary(op) => write!(f, "binary {}", op.symbol()),
        Op::Concat(k) => write!(f, "concat {}", k),
        Op::DefineField(i) => write!(f, "define_field {}", n(*i)),
        Op::Closure { func, name } => match name {
            Some(name) => write!(f, "closure #{} as {}", func, n(*name)),
            None => write!(f, "closure #{}", func),
        },
        Op::Regex(i) => write!(f, "regex {}", c(*i)),
        Op::Jump(t) => write!(f, "jump {:04}", t),
        Op::JumpIfFalse(t) => write!(f, "jump_if_false {:04}", t),
        Op::JumpIfTrue(t) => write!(f, "jump_if_true {:04}", t),
        Op::JumpIfFalseKeep(t) => write!(f, "jump_if_false_keep {:04}", t),
        Op::JumpIfTrueKeep(t) => write!(f, "jump_if_true_keep {:04}", t),
        Op::JumpIfNotNullishKeep(t) => write!(f, "jump_if_not_nullish_keep {:04}", t),
        other => {
            // 引数のない命令は型名を snake_case にして表示する
            let name = format!("{:?}", other);
            let mut out = String::new();
            for (i, ch) in name.chars().enumerate() {
                if ch.is_ascii_uppercase() && i > 0 {
                    out.push('_');
                }
                out.push(ch.to_ascii_lowercase());
            }
            f.write_str(&out)
        }
    }
}

struct Line<'a>(&'a Op, &'a Executable);

impl fmt::Display for Line<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        mnemonic(self.0, self.1, f)
    }
}

impl fmt::Display for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "constants:")?;
        for (i, constant) in self.constants.iter().enumerate() {
            writeln!(f, "  #{} = {}", i, constant)?;
        }
        writeln!(f, "code:")?;
        for (pc, op) in self.code.iter().enumerate() {
            writeln!(f, "  {:04}  {}", pc, Line(op, self))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// 同じ数値・文字列の定数は表の中で共有される。
    fn constants_are_deduplicated() {
        let mut exe = Executable::default();
        let a = exe.add_constant(Constant::Number(1.0));
        let b = exe.add_constant(Constant::String(Rc::from("x")));
        assert_eq!(exe.add_constant(Constant::Number(1.0)), a);
        assert_eq!(exe.add_constant(Constant::String(Rc::from("x"))), b);
        assert_eq!(exe.constants.len(), 2);
    }

    #[test]
    /// 逆アセンブル表示は定数表と命令列を番号付きで並べる。
    fn display_lists_constants_and_code() {
        let mut exe = Executable::default();
        let one = exe.add_constant(Constant::Number(1.0));
        let x = exe.add_constant(Constant::String(Rc::from("x")));
        exe.code = vec![Op::Const(one), Op::StoreName(x), Op::SetResult, Op::Halt];
        let text = exe.to_string();
        assert_eq!(
            text,
            "constants:\n  #0 = 1\n  #1 = \"x\"\ncode:\n  0000  const #0  ; 1\n  0001  store_name x\n  0002  set_result\n  0003  halt\n"
        );
    }
}
