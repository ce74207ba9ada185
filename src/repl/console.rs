//! `console.*` と Promise 拒否通知の出力先（REPL 用の装飾付き）

use std::cell::Cell;
use std::rc::Rc;

use runtime_heap::{Heap, Value};

use crate::interpreter::{ConsoleHost, LogLevel, RejectionEvent};
use crate::repl::printer;
use crate::repl::util::Output;

/// グループの深さ 1 段につき空白 2 つで字下げする。
pub struct ReplConsole {
    output: Rc<Output>,
    group_level: Cell<usize>,
}

impl ReplConsole {
    pub fn new(output: Rc<Output>) -> Self {
        Self {
            output,
            group_level: Cell::new(0),
        }
    }

    fn indent(&self) -> String {
        "  ".repeat(self.group_level.get())
    }
}

impl ConsoleHost for ReplConsole {
    fn print(&self, level: LogLevel, message: &str) {
        let indent = self.indent();
        let line = match level {
            LogLevel::Debug => format!("{}\x1b[36;1m{}\x1b[0m", indent, message),
            LogLevel::Error => format!("{}\x1b[31;1m{}\x1b[0m", indent, message),
            LogLevel::Info => format!("{}(i) {}", indent, message),
            LogLevel::Warn => format!("{}\x1b[33;1m{}\x1b[0m", indent, message),
            LogLevel::Log | LogLevel::Trace => format!("{}{}", indent, message),
        };
        self.output.line(&line);
    }

    fn group(&self, label: &str) {
        self.output
            .line(&format!("{}\x1b[36;1m{}\x1b[0m", self.indent(), label));
        self.group_level.set(self.group_level.get() + 1);
    }

    fn group_end(&self) {
        self.group_level.set(self.group_level.get().saturating_sub(1));
    }

    fn trace(&self, message: &str, frames: &[String]) {
        let indent = self.indent();
        let mut text = String::new();
        if !message.is_empty() {
            text.push_str(&format!("{}\x1b[36;1m{}\x1b[0m\n", indent, message));
        }
        for frame in frames {
            text.push_str(&format!("{}-> {}\n", indent, frame));
        }
        self.output.write(&text);
    }

    fn clear(&self) {
        self.output.write("\x1b[3J\x1b[H\x1b[2J");
        self.group_level.set(0);
    }

    fn promise_rejection(&self, event: RejectionEvent, result: &str) {
        let text = match event {
            RejectionEvent::Unhandled => "A promise was rejected without any handlers",
            RejectionEvent::HandledLate => "A handler was added to an already rejected promise",
        };
        self.output
            .line(&format!("WARNING: {} (result: {})", text, result));
    }

    fn inspect(&self, heap: &Heap, value: &Value) -> Option<String> {
        Some(printer::render(heap, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::{test_util, Interpreter};
    use crate::repl::util::SharedBuffer;

    fn session() -> (Interpreter, SharedBuffer) {
        let buffer = SharedBuffer::new();
        let output = Output::new(Box::new(buffer.clone()), true);
        let interp = Interpreter::new(Rc::new(ReplConsole::new(output)));
        (interp, buffer)
    }

    #[test]
    fn levels_are_decorated() {
        let (mut interp, buffer) = session();
        test_util::eval(
            &mut interp,
            "console.log('a', 1); console.info('i'); console.warn('w'); console.error('e'); console.debug('d')",
        )
        .expect("eval");
        assert_eq!(buffer.take(), "a 1\n(i) i\nw\ne\nd\n");
    }

    #[test]
    /// グループの中は 2 空白ずつ字下げされ、clear で戻る。
    fn groups_indent_until_cleared() {
        let (mut interp, buffer) = session();
        test_util::eval(
            &mut interp,
            "console.group('g'); console.group('h'); console.log('x'); console.groupEnd(); console.log('y'); console.clear(); console.log('z')",
        )
        .expect("eval");
        // 画面消去の列は色なし出力では取り除かれる
        assert_eq!(buffer.take(), "g\n  h\n    x\n  y\nz\n");
    }

    #[test]
    fn objects_are_printed_with_the_value_printer() {
        let (mut interp, buffer) = session();
        test_util::eval(&mut interp, "console.log({a: [1]})").expect("eval");
        assert_eq!(buffer.take(), "{ \"a\": [ 1 ] }\n");
    }

    #[test]
    fn trace_lists_frames() {
        let (mut interp, buffer) = session();
        test_util::eval(&mut interp, "function inner() { console.trace('here') } inner()").expect("eval");
        let text = buffer.take();
        assert!(text.starts_with("here\n-> inner\n"), "{:?}", text);
    }

    #[test]
    fn unhandled_rejection_warns() {
        let (mut interp, buffer) = session();
        test_util::eval(&mut interp, "Promise.reject(1)").expect("eval");
        assert_eq!(
            buffer.take(),
            "WARNING: A promise was rejected without any handlers (result: 1)\n"
        );
    }
}
