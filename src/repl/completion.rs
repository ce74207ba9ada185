// パス: src/repl/completion.rs
// 役割: カーソル手前の入力から補完候補（変数名・プロパティ名）を集める
// 意図: 字句だけで文脈を分類し、実行中の realm の束縛とプロトタイプ鎖を副作用なしで読む
// 関連ファイル: src/lexer.rs, src/interpreter/mod.rs, src/repl/line_editor.rs
//! 補完エンジン
//!
//! - `名前` の途中なら、グローバルオブジェクト（とその鎖）と宣言済みの束縛から探す。
//! - `名前.` / `名前.途中` なら、その値の自身のプロパティ、続いてプロトタイプ鎖から探す。
//! - 候補は発見順で、同じ表示文字列は最初の 1 つだけ残す。

use std::collections::HashSet;

use runtime_heap::{Heap, ObjectId, PropertyKey, Value};

use crate::interpreter::Interpreter;
use crate::lexer::{lex, TokenKind};

/// 補完候補。`invariant_offset` は既に入力済みの接頭辞の長さ（置き換え不要な部分）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionCandidate {
    pub text: String,
    pub invariant_offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Initial,
    HaveVariable,
    HaveDot,
    HaveProperty,
}

/// 重複を除きつつ発見順に候補を溜める。
struct Collector {
    prefix_len: usize,
    seen: HashSet<String>,
    out: Vec<CompletionCandidate>,
}

impl Collector {
    fn new(prefix: &str) -> Self {
        Self {
            prefix_len: prefix.len(),
            seen: HashSet::new(),
            out: Vec::new(),
        }
    }

    fn offer(&mut self, name: &str) {
        if self.seen.insert(name.to_string()) {
            self.out.push(CompletionCandidate {
                text: name.to_string(),
                invariant_offset: self.prefix_len,
            });
        }
    }

    /// 自身の名前付きプロパティから鎖の終端まで、文字列キーだけを拾う。
    fn properties_along_chain(&mut self, heap: &Heap, start: ObjectId, prefix: &str) {
        let mut visited = HashSet::new();
        let mut current = Some(start);
        while let Some(id) = current {
            if !visited.insert(id) {
                break;
            }
            let object = heap.object(id);
            for (key, _) in object.named_entries() {
                if let PropertyKey::String(name) = key {
                    if name.starts_with(prefix) {
                        self.offer(name);
                    }
                }
            }
            current = object.prototype;
        }
    }
}

/// `line` の `cursor`（バイト位置）までを見て候補を返す。
pub fn complete(interp: &Interpreter, line: &str, cursor: usize) -> Vec<CompletionCandidate> {
    let mut end = cursor.min(line.len());
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    let tokens = lex(&line[..end]);

    let mut mode = Mode::Initial;
    let mut variable = String::new();
    let mut property = String::new();
    let mut trailing_trivia = false;
    for token in &tokens {
        if token.kind == TokenKind::Eof {
            trailing_trivia = !token.trivia.is_empty();
            break;
        }
        mode = match mode {
            Mode::HaveVariable if token.kind == TokenKind::Period => Mode::HaveDot,
            Mode::HaveVariable => Mode::Initial,
            Mode::HaveDot if token.is_identifier_name() => {
                property = token.value.clone();
                Mode::HaveProperty
            }
            Mode::HaveDot => Mode::Initial,
            Mode::Initial | Mode::HaveProperty if token.kind == TokenKind::Identifier => {
                variable = token.value.clone();
                Mode::HaveVariable
            }
            Mode::Initial | Mode::HaveProperty => Mode::Initial,
        };
    }

    // `名前.` の直後は空の接頭辞でプロパティを補完する
    if mode == Mode::HaveDot {
        mode = Mode::HaveProperty;
        property.clear();
        trailing_trivia = false;
    }
    if mode == Mode::Initial || trailing_trivia {
        return Vec::new();
    }

    let heap = &interp.heap;
    match mode {
        Mode::HaveProperty => {
            let Some(Value::Object(id)) = interp.global_binding(&variable) else {
                return Vec::new();
            };
            let mut collector = Collector::new(&property);
            collector.properties_along_chain(heap, id, &property);
            collector.out
        }
        Mode::HaveVariable => {
            let mut collector = Collector::new(&variable);
            collector.properties_along_chain(heap, interp.global_object(), &variable);
            for name in interp.global_binding_names() {
                if name.starts_with(variable.as_str()) {
                    collector.offer(&name);
                }
            }
            collector.out
        }
        Mode::Initial | Mode::HaveDot => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::test_util;

    fn realm(src: &str) -> Interpreter {
        let mut interp = Interpreter::headless();
        test_util::eval(&mut interp, src).expect("eval");
        interp
    }

    fn texts(candidates: &[CompletionCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    /// 自身のプロパティが発見順に並び、接頭辞の長さが記録される。
    fn property_prefix_matches_in_order() {
        let interp = realm("var obj = {foo: 1, fooBar: 2, bar: 3}");
        let got = complete(&interp, "obj.fo", 6);
        assert_eq!(texts(&got), vec!["foo", "fooBar"]);
        assert!(got.iter().all(|c| c.invariant_offset == 2));
    }

    #[test]
    /// プロトタイプ側の同名プロパティは重複しない。
    fn shadowed_prototype_names_are_suppressed() {
        let interp = realm("const proto = {foo: 0, fizz: 1}; var obj = Object.create(proto); obj.foo = 2; obj.fooBar = 3;");
        let got = complete(&interp, "obj.f", 5);
        assert_eq!(texts(&got), vec!["foo", "fooBar", "fizz"]);
    }

    #[test]
    fn dot_without_name_lists_everything() {
        let interp = realm("let point = {x: 1, y: 2}");
        let got = complete(&interp, "point.", 6);
        let names = texts(&got);
        assert_eq!(&names[..2], &["x", "y"]);
        assert!(names.contains(&"hasOwnProperty"), "{:?}", names);
        assert!(got.iter().all(|c| c.invariant_offset == 0));
    }

    #[test]
    /// 変数名は、グローバルオブジェクトのプロパティ → 宣言済み束縛の順。
    fn variables_come_from_global_object_and_bindings() {
        let interp = realm("var zetaVar = 1; let zetaLet = 2;");
        let got = complete(&interp, "zeta", 4);
        assert_eq!(texts(&got), vec!["zetaVar", "zetaLet"]);
        assert!(got.iter().all(|c| c.invariant_offset == 4));
    }

    #[test]
    fn trailing_whitespace_disables_completion() {
        let interp = realm("var obj = {foo: 1}");
        assert!(complete(&interp, "obj ", 4).is_empty());
        assert!(complete(&interp, "obj.fo ", 7).is_empty());
        assert!(!complete(&interp, "obj. ", 4).is_empty());
    }

    #[test]
    fn primitives_and_unknown_names_give_nothing() {
        let interp = realm("var s = 'text'");
        assert!(complete(&interp, "s.le", 4).is_empty());
        assert!(complete(&interp, "missing.a", 9).is_empty());
        assert!(complete(&interp, "1 +", 3).is_empty());
    }

    #[test]
    /// カーソルより後ろは無視する。
    fn only_text_before_cursor_counts() {
        let interp = realm("var obj = {alpha: 1, beta: 2}");
        let got = complete(&interp, "obj.al + 1", 6);
        assert_eq!(texts(&got), vec!["alpha"]);
    }

    #[test]
    fn keyword_property_names_are_completed() {
        let interp = realm("var o = {default: 1, delta: 2}");
        assert_eq!(texts(&complete(&interp, "o.default", 9)), vec!["default"]);
    }
}
