// パス: runtime_heap/src/error.rs
// 役割: 副作用なし読み出しが失敗したときのエラー種別を定義する
// 意図: 表示器や補完器が「読めなかった」ことを判別し、局所的に縮退できるようにする
// 関連ファイル: runtime_heap/src/heap.rs, src/repl/printer/mod.rs

use thiserror::Error;

/// ゲッターやプロキシを起動せずには値を得られない場合のエラー。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("プロパティ '{0}' はアクセサのため副作用なしでは読めません")]
    Accessor(String),
    #[error("プロキシ経由の読み出しは副作用を伴います")]
    Proxy,
    #[error("ArrayBuffer は切り離し済みです")]
    Detached,
}
