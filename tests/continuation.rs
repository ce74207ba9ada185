// パス: tests/continuation.rs
// 役割: 継続行判定の統合テスト
// 意図: 括弧の深さとキー/ラベル行末の扱いを実際の入力例で確認する
// 関連ファイル: src/repl/continuation.rs, src/lexer.rs
use jsrepl::repl::continuation::{classify, DepthState};

fn needs_more(lines: &[&str]) -> Vec<bool> {
    let mut state = DepthState::new();
    lines.iter().map(|line| classify(line, &mut state)).collect()
}

#[test]
/// 括弧が釣り合う入力は深さが 0 に戻った行でちょうど閉じる。
fn completes_exactly_when_depth_returns_to_zero() {
    let cases: &[(&[&str], &[bool])] = &[
        (&["1 + 1"], &[false]),
        (&["[", "1,", "2", "]"], &[true, true, true, false]),
        (&["if (a) {", "} else {", "}"], &[true, true, false]),
        (&["f(function () {", "  return [1, 2]", "})"], &[true, true, false]),
        (&["({", "  a: [", "  ],", "})"], &[true, true, true, false]),
    ];
    for (lines, expected) in cases {
        assert_eq!(needs_more(lines), expected.to_vec(), "{:?}", lines);
    }
}

#[test]
fn object_key_at_end_of_line_waits_for_value() {
    assert_eq!(needs_more(&["{a:", "1}"]), vec![true, false]);
    assert_eq!(needs_more(&["\"quoted\":"]), vec![true]);
}

#[test]
/// `case X:` の後は深さを変えずにもう 1 行求める。
fn switch_case_lines() {
    let mut state = DepthState::new();
    assert!(classify("switch (x) {", &mut state));
    assert!(classify("case y:", &mut state));
    assert_eq!(state.depth, 1);
    assert!(classify("  break", &mut state));
    assert!(!classify("}", &mut state));
}

#[test]
/// 演算子の後のコロンはラベルにならない。
fn ternary_colon_is_not_a_label() {
    assert_eq!(needs_more(&["a ? b : c"]), vec![false]);
    assert_eq!(needs_more(&["x = a ?"]), vec![false]);
}

#[test]
/// コメントと文字列の中の括弧は数えない。
fn brackets_in_trivia_and_literals() {
    assert_eq!(needs_more(&["1 // {"]), vec![false]);
    assert_eq!(needs_more(&["`${'{'}`"]), vec![false]);
}

#[test]
/// 状態はセッションを通じて持ち越され、明示的に戻すまで残る。
fn state_persists_until_reset() {
    let mut state = DepthState::new();
    assert!(classify("((", &mut state));
    assert_eq!(state.depth, 2);
    state.reset();
    assert!(!classify("1", &mut state));
}
