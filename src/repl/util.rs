//! REPL 内部ユーティリティ（出力先と ANSI エスケープの除去）

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

/// `\x1B[ ... m` 形式のエスケープを取り除く。それ以外のバイトはそのまま残す。
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            for skipped in chars.by_ref() {
                if skipped == 'm' {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// セッションの出力先。色を無効にしている場合は書き込み前にエスケープを除去する。
///
/// コンソールクライアントと REPL ループの両方から書き込むため `Rc` で共有する。
pub struct Output {
    sink: RefCell<Box<dyn Write>>,
    strip_ansi: bool,
}

impl Output {
    pub fn new(sink: Box<dyn Write>, strip_ansi: bool) -> Rc<Self> {
        Rc::new(Self {
            sink: RefCell::new(sink),
            strip_ansi,
        })
    }

    pub fn stdout(strip_ansi: bool) -> Rc<Self> {
        Self::new(Box::new(io::stdout()), strip_ansi)
    }

    pub fn write(&self, text: &str) {
        let text = if self.strip_ansi {
            strip_ansi(text)
        } else {
            text.to_string()
        };
        let mut sink = self.sink.borrow_mut();
        // 出力先が閉じていても対話は続ける
        let _ = sink.write_all(text.as_bytes());
        let _ = sink.flush();
    }

    pub fn line(&self, text: &str) {
        self.write(&format!("{}\n", text));
    }
}

/// テストや埋め込み用に書き込まれたバイト列を溜める出力先。
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.0.borrow_mut());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_color_sequences_exactly() {
        assert_eq!(strip_ansi("\x1b[31;1mX\x1b[0m"), "X");
        assert_eq!(strip_ansi("a\x1b[0mb"), "ab");
        assert_eq!(strip_ansi("plain [text] é"), "plain [text] é");
        assert_eq!(strip_ansi(""), "");
    }

    #[test]
    /// 単独の ESC や `[` を伴わない ESC は残す。
    fn keeps_lone_escape() {
        assert_eq!(strip_ansi("\x1b"), "\x1b");
        assert_eq!(strip_ansi("x\x1bY"), "x\x1bY");
    }

    #[test]
    fn output_strips_when_configured() {
        let buffer = SharedBuffer::new();
        let out = Output::new(Box::new(buffer.clone()), true);
        out.line("\x1b[32;1m\"s\"\x1b[0m");
        assert_eq!(buffer.take(), "\"s\"\n");

        let colored = Output::new(Box::new(buffer.clone()), false);
        colored.write("\x1b[0m");
        assert_eq!(buffer.contents(), "\x1b[0m");
    }
}
