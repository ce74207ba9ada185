//! 埋め込み側（REPL やテスト）へ出力を委ねるためのフック。
//!
//! `console.*` の出力と Promise の未処理拒否の通知は、すべて文字列化を済ませた
//! 状態でここを通る。表示や装飾はホストの責務とする。

use std::cell::RefCell;

use runtime_heap::{Heap, Value};

/// `console` のログレベル。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
    Trace,
}

/// Promise の拒否追跡イベント。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectionEvent {
    /// ハンドラのない Promise が拒否された。
    Unhandled,
    /// 拒否済みの Promise に後からハンドラが付いた。
    HandledLate,
}

pub trait ConsoleHost {
    fn print(&self, level: LogLevel, message: &str);
    fn group(&self, label: &str);
    fn group_end(&self);
    /// `frames` は内側から外側の順。
    fn trace(&self, message: &str, frames: &[String]);
    fn clear(&self);
    fn promise_rejection(&self, event: RejectionEvent, result: &str);
    /// オブジェクト引数の表示。`None` なら `[object Class]` 形式になる。
    fn inspect(&self, _heap: &Heap, _value: &Value) -> Option<String> {
        None
    }
}

/// 何も出力しないホスト。
#[derive(Debug, Default)]
pub struct NullHost;

impl ConsoleHost for NullHost {
    fn print(&self, _level: LogLevel, _message: &str) {}
    fn group(&self, _label: &str) {}
    fn group_end(&self) {}
    fn trace(&self, _message: &str, _frames: &[String]) {}
    fn clear(&self) {}
    fn promise_rejection(&self, _event: RejectionEvent, _result: &str) {}
}

/// 出力を行単位で溜めるホスト（テストや埋め込み用）。
#[derive(Debug, Default)]
pub struct CaptureHost {
    lines: RefCell<Vec<String>>,
}

impl CaptureHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.borrow_mut())
    }
}

impl ConsoleHost for CaptureHost {
    fn print(&self, _level: LogLevel, message: &str) {
        self.lines.borrow_mut().push(message.to_string());
    }
    fn group(&self, label: &str) {
        self.lines.borrow_mut().push(label.to_string());
    }
    fn group_end(&self) {}
    fn trace(&self, message: &str, frames: &[String]) {
        let mut lines = self.lines.borrow_mut();
        lines.push(message.to_string());
        lines.extend(frames.iter().map(|f| format!("-> {}", f)));
    }
    fn clear(&self) {}
    fn promise_rejection(&self, event: RejectionEvent, result: &str) {
        let text = match event {
            RejectionEvent::Unhandled => format!("unhandled rejection: {}", result),
            RejectionEvent::HandledLate => format!("late handler: {}", result),
        };
        self.lines.borrow_mut().push(text);
    }
}
