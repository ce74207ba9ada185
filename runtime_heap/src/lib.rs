//! スクリプト実行時の値・オブジェクトモデル crate
//!
//! この crate はインタプリタ・値表示器・補完器が共有するオブジェクトグラフを提供する。
//! 値の種類、プロパティ表、プロトタイプ鎖、そして「副作用なしの読み出し」を
//! 個別モジュールに分割し、利用側から見える API を明確にしている。

mod error;
mod heap;
pub mod intl;
mod object;
pub mod temporal;
mod value;

pub use error::*;
pub use heap::*;
pub use object::*;
pub use value::*;
