// パス: src/repl/mod.rs
// 役割: REPL を構成するモジュール群と実行オプションをまとめるファサード
// 意図: 対話モード / スクリプトモードの入口だけを公開し、部品は役割ごとに分ける
// 関連ファイル: src/repl/cmd.rs, src/repl/driver.rs, src/bin/jsrepl.rs
//! 対話環境
//!
//! - `continuation`: 行ごとの括弧の深さから、入力単位が閉じたかを判定する
//! - `driver`: 単位の解析・実行と結果の表示
//! - `printer`: 値の表示（循環参照を検出し、副作用なしで読む）
//! - `completion`: 変数名・プロパティ名の補完
//! - `cmd`: メインループとセッション状態

pub mod cmd;
pub mod completion;
mod console;
pub mod continuation;
pub mod driver;
mod globals;
mod highlight;
mod interrupt;
mod line_editor;
pub mod printer;
pub mod util;

use crate::parser::ParseMode;

pub use cmd::{run_repl, run_script, ReplSession};
pub use console::ReplConsole;

/// コマンドラインから集めた実行オプション。
#[derive(Debug, Clone, Default)]
pub struct ReplOptions {
    pub dump_ast: bool,
    pub dump_bytecode: bool,
    pub run_bytecode: bool,
    pub optimize_bytecode: bool,
    pub as_module: bool,
    pub print_last_result: bool,
    pub strip_ansi: bool,
    pub disable_source_location_hints: bool,
    pub no_syntax_highlight: bool,
}

impl ReplOptions {
    pub fn parse_mode(&self) -> ParseMode {
        if self.as_module {
            ParseMode::Module
        } else {
            ParseMode::Script
        }
    }
}
