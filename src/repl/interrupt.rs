//! SIGINT を協調的な中断フラグに変換する。
//!
//! ハンドラはフラグを立てるだけ。REPL のループが単位と単位の間でだけ確認し、
//! 実行中の単位は最後まで走らせる。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;

static FLAG: OnceCell<Arc<AtomicBool>> = OnceCell::new();

/// プロセス共有のフラグを返し、初回だけ SIGINT ハンドラを登録する。
pub fn install() -> Arc<AtomicBool> {
    let mut first = false;
    let flag = FLAG.get_or_init(|| {
        first = true;
        Arc::new(AtomicBool::new(false))
    });
    if first {
        register_handler();
    }
    Arc::clone(flag)
}

#[cfg(unix)]
fn register_handler() {
    let handler = on_sigint as extern "C" fn(libc::c_int);
    // SAFETY: ハンドラはアトミックな書き込みしか行わない
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn register_handler() {}

#[cfg(unix)]
extern "C" fn on_sigint(_signal: libc::c_int) {
    if let Some(flag) = FLAG.get() {
        flag.store(true, Ordering::SeqCst);
    }
}

/// 中断要求を受け取って下ろす。立っていれば `true`。
pub fn take(flag: &AtomicBool) -> bool {
    flag.swap(false, Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// 何度呼んでも同じフラグを共有する。
    fn install_returns_shared_flag() {
        let a = install();
        let b = install();
        assert!(Arc::ptr_eq(&a, &b));
        a.store(true, Ordering::SeqCst);
        assert!(take(&b));
        assert!(!take(&a));
    }
}
