// パス: src/lib.rs
// 役割: Crate root wiring modules and exports
// 意図: 字句解析からインタプリタ・REPL までを 1 つのライブラリとして公開する
// 関連ファイル: src/lexer.rs, src/parser/mod.rs, src/interpreter/mod.rs, src/repl/mod.rs
//! jsrepl ルートモジュール
//!
//! 目的:
//! - 小さなスクリプト言語処理系の上に、対話的な読み取り・評価・表示ループを提供する。
//!
//! 方針:
//! - コメント/ドキュメントは日本語、識別子は英語。
//! - 値・オブジェクトモデルは `runtime_heap` crate に分離する。
//! - ライブラリ側ではログの購読者を初期化しない（バイナリの責務）。

pub mod ast;
pub mod bytecode;
pub mod errors;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod repl;

// 便利な再エクスポート
pub use crate::errors::*;
pub use crate::parser::{parse_program, ParseMode};
