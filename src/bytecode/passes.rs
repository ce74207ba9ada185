// パス: src/bytecode/passes.rs
// 役割: 命令列の最適化（定数畳み込み・ジャンプの短絡・到達不能コードの除去）
// 意図: 各パスは命令を Nop に置き換えるだけにして、最後の詰め直しでジャンプ先をまとめて付け替える
// 関連ファイル: src/bytecode/mod.rs

use std::collections::HashSet;
use std::rc::Rc;
use std::time::Instant;

use tracing::debug;

use super::{Constant, Executable, Op};
use crate::ast::{BinaryOp, UnaryOp};
use crate::interpreter::number_op;

/// 最適化パイプライン全体。所要時間は debug ログに出す。
pub fn optimize(exe: &mut Executable) {
    let started = Instant::now();
    let before = exe.code.len();
    fold_constants(exe);
    thread_jumps(exe);
    remove_unreachable(exe);
    compact(exe);
    debug!(
        before,
        after = exe.code.len(),
        elapsed = ?started.elapsed(),
        "optimized bytecode"
    );
}

fn jump_targets(code: &[Op]) -> HashSet<usize> {
    code.iter()
        .filter_map(|op| op.jump_target().map(|t| t as usize))
        .collect()
}

fn number_of(exe: &Executable, op: &Op) -> Option<f64> {
    match op {
        Op::Const(i) => match exe.constants.get(*i as usize) {
            Some(Constant::Number(n)) => Some(*n),
            _ => None,
        },
        _ => None,
    }
}

fn string_of(exe: &Executable, op: &Op) -> Option<Rc<str>> {
    match op {
        Op::Const(i) => match exe.constants.get(*i as usize) {
            Some(Constant::String(s)) => Some(s.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// 数値同士の算術・比較と、文字列同士の連結を畳み込む。
/// 途中の命令がジャンプ先なら畳み込まない。
fn fold_constants(exe: &mut Executable) {
    let mut changed = true;
    while changed {
        changed = false;
        let targets = jump_targets(&exe.code);
        let live: Vec<usize> = (0..exe.code.len()).filter(|&i| exe.code[i] != Op::Nop).collect();
        for w in 0..live.len() {
            // 単項: [const, unary]
            if w + 1 < live.len() {
                let (a, u) = (live[w], live[w + 1]);
                if !targets.contains(&u) {
                    if let (Some(x), Op::Unary(op)) = (number_of(exe, &exe.code[a]), exe.code[u]) {
                        let folded = match op {
                            UnaryOp::Minus => Some(Op::Const(exe.add_constant(Constant::Number(-x)))),
                            UnaryOp::Plus => Some(exe.code[a]),
                            UnaryOp::Not => Some(if x == 0.0 || x.is_nan() { Op::True } else { Op::False }),
                            _ => None,
                        };
                        if let Some(folded) = folded {
                            exe.code[a] = folded;
                            exe.code[u] = Op::Nop;
                            changed = true;
                            break;
                        }
                    }
                }
            }
            // 二項: [const, const, binary]
            if w + 2 < live.len() {
                let (a, b, o) = (live[w], live[w + 1], live[w + 2]);
                if targets.contains(&b) || targets.contains(&o) {
                    continue;
                }
                let Op::Binary(op) = exe.code[o] else {
                    continue;
                };
                let folded = match (number_of(exe, &exe.code[a]), number_of(exe, &exe.code[b])) {
                    (Some(x), Some(y)) => fold_numbers(exe, op, x, y),
                    _ => match (string_of(exe, &exe.code[a]), string_of(exe, &exe.code[b]), op) {
                        (Some(x), Some(y), BinaryOp::Add) => {
                            let joined = format!("{}{}", x, y);
                            Some(Op::Const(exe.add_constant(Constant::String(Rc::from(joined)))))
                        }
                        _ => None,
                    },
                };
                if let Some(folded) = folded {
                    exe.code[a] = folded;
                    exe.code[b] = Op::Nop;
                    exe.code[o] = Op::Nop;
                    changed = true;
                    break;
                }
            }
        }
    }
}

fn fold_numbers(exe: &mut Executable, op: BinaryOp, x: f64, y: f64) -> Option<Op> {
    let boolean = |b: bool| Some(if b { Op::True } else { Op::False });
    match op {
        BinaryOp::Add
        | BinaryOp::Sub
        | BinaryOp::Mul
        | BinaryOp::Div
        | BinaryOp::Mod
        | BinaryOp::Exp
        | BinaryOp::BitAnd
        | BinaryOp::BitOr
        | BinaryOp::BitXor
        | BinaryOp::Shl
        | BinaryOp::Shr
        | BinaryOp::UShr => Some(Op::Const(exe.add_constant(Constant::Number(number_op(op, x, y))))),
        BinaryOp::Lt => boolean(x < y),
        BinaryOp::LtEq => boolean(x <= y),
        BinaryOp::Gt => boolean(x > y),
        BinaryOp::GtEq => boolean(x >= y),
        BinaryOp::Eq | BinaryOp::StrictEq => boolean(x == y),
        BinaryOp::NotEq | BinaryOp::StrictNotEq => boolean(x != y),
        BinaryOp::In | BinaryOp::Instanceof => None,
    }
}

/// ジャンプ先が無条件ジャンプなら最終的な飛び先へ直接向ける。
/// 定数条件の分岐は無条件ジャンプか素通りにする。
fn thread_jumps(exe: &mut Executable) {
    let len = exe.code.len();
    let resolve = |code: &[Op], mut target: usize| {
        let mut seen = HashSet::new();
        while let Some(Op::Jump(next)) = code.get(target) {
            if !seen.insert(target) {
                break;
            }
            target = *next as usize;
        }
        target
    };
    for i in 0..len {
        if let Some(t) = exe.code[i].jump_target() {
            let final_target = resolve(&exe.code, t as usize);
            exe.code[i].set_jump_target(final_target as u32);
        }
    }
    let targets = jump_targets(&exe.code);
    for i in 0..len.saturating_sub(1) {
        if targets.contains(&(i + 1)) {
            continue;
        }
        match (exe.code[i], exe.code[i + 1]) {
            (Op::True, Op::JumpIfFalse(_)) | (Op::False, Op::JumpIfTrue(_)) => {
                exe.code[i] = Op::Nop;
                exe.code[i + 1] = Op::Nop;
            }
            (Op::False, Op::JumpIfFalse(t)) | (Op::True, Op::JumpIfTrue(t)) => {
                exe.code[i] = Op::Nop;
                exe.code[i + 1] = Op::Jump(t);
            }
            _ => {}
        }
    }
}

/// 先頭から到達できない命令を Nop にする。
fn remove_unreachable(exe: &mut Executable) {
    let len = exe.code.len();
    let mut reachable = vec![false; len];
    let mut worklist = vec![0usize];
    while let Some(pc) = worklist.pop() {
        if pc >= len || reachable[pc] {
            continue;
        }
        reachable[pc] = true;
        let op = exe.code[pc];
        if let Some(t) = op.jump_target() {
            worklist.push(t as usize);
        }
        if !op.is_terminator() {
            worklist.push(pc + 1);
        }
    }
    for (pc, live) in reachable.iter().enumerate() {
        if !live {
            exe.code[pc] = Op::Nop;
        }
    }
}

/// Nop を取り除き、ジャンプ先を新しい位置へ付け替える。
fn compact(exe: &mut Executable) {
    let mut new_index = Vec::with_capacity(exe.code.len() + 1);
    let mut next = 0u32;
    for op in &exe.code {
        new_index.push(next);
        if *op != Op::Nop {
            next += 1;
        }
    }
    // 末尾を指すジャンプのため
    new_index.push(next);
    let mut code: Vec<Op> = exe.code.iter().copied().filter(|op| *op != Op::Nop).collect();
    for op in &mut code {
        if let Some(t) = op.jump_target() {
            op.set_jump_target(new_index[t as usize]);
        }
    }
    if code.last().map_or(true, |op| !op.is_terminator()) {
        code.push(Op::Halt);
    }
    exe.code = code;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::lower;
    use crate::parser::{parse_program, ParseMode};

    fn optimized(src: &str) -> Executable {
        let program = parse_program(src, ParseMode::Script).expect("parse");
        let mut exe = lower(&program).expect("lower");
        optimize(&mut exe);
        exe
    }

    #[test]
    /// 定数式は 1 つの定数に畳み込まれる。
    fn folds_arithmetic_and_concatenation() {
        let exe = optimized("1 + 2 * 3");
        assert_eq!(exe.code.len(), 3, "{}", exe);
        assert!(matches!(exe.constants[exe.code_const(0)], Constant::Number(n) if n == 7.0));
        let exe = optimized("'a' + 'b'");
        assert!(matches!(&exe.constants[exe.code_const(0)], Constant::String(s) if &**s == "ab"));
    }

    #[test]
    /// 偽の定数条件の本体は到達不能として消える。
    fn removes_dead_branch() {
        let exe = optimized("if (false) { x = 1 } y");
        assert!(!exe.to_string().contains("store_name x"), "{}", exe);
        assert!(exe.to_string().contains("load_name y"), "{}", exe);
    }

    #[test]
    /// ジャンプの連鎖は最終的な飛び先に直結される。
    fn threads_jump_chains() {
        let mut exe = Executable {
            code: vec![Op::Jump(2), Op::Halt, Op::Jump(4), Op::Halt, Op::Undefined, Op::SetResult, Op::Halt],
            ..Executable::default()
        };
        optimize(&mut exe);
        assert_eq!(exe.code, vec![Op::Jump(1), Op::Undefined, Op::SetResult, Op::Halt]);
    }

    impl Executable {
        fn code_const(&self, pc: usize) -> usize {
            match self.code[pc] {
                Op::Const(i) => i as usize,
                other => panic!("not a constant: {:?}", other),
            }
        }
    }
}
