// パス: src/interpreter/builtins/console.rs
// 役割: console オブジェクト（ログ出力・グループ・カウンタ・タイマ・トレース）
// 意図: 引数の整形まではここで行い、装飾と出力先はホスト（ConsoleHost）に任せる
// 関連ファイル: src/interpreter/host.rs, src/repl/console.rs

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use indexmap::IndexMap;
use runtime_heap::{ObjectKind, Value};

use super::define_global;
use crate::interpreter::{arg, Interpreter, JsResult, LogLevel};

#[derive(Default)]
struct ConsoleState {
    counters: IndexMap<String, u64>,
    timers: HashMap<String, Instant>,
}

/// 1 つの引数を表示用に整形する。
fn format_value(interp: &Interpreter, value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        Value::Object(id) if matches!(interp.heap.kind(*id), ObjectKind::Error { .. }) => {
            interp.describe_error(value)
        }
        Value::Object(_) => interp
            .host()
            .inspect(&interp.heap, value)
            .unwrap_or_else(|| interp.heap.display_string(value)),
        other => interp.heap.display_string(other),
    }
}

/// `%s` などの書式指定を展開し、残りの引数を空白区切りで連結する。
fn format_arguments(interp: &mut Interpreter, args: &[Value]) -> JsResult<String> {
    let Some((Value::String(first), rest)) = args.split_first().map(|(f, r)| (f.clone(), r)) else {
        let parts: Vec<String> = args.iter().map(|a| format_value(interp, a)).collect();
        return Ok(parts.join(" "));
    };
    let mut out = String::new();
    let mut remaining = rest.iter();
    let mut chars = first.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(spec) = chars.peek().copied() else {
            out.push('%');
            break;
        };
        match spec {
            '%' => {
                chars.next();
                out.push('%');
            }
            's' | 'd' | 'i' | 'f' | 'o' | 'O' | 'c' => {
                chars.next();
                let Some(value) = remaining.next() else {
                    out.push('%');
                    out.push(spec);
                    continue;
                };
                match spec {
                    's' => out.push_str(&format_value(interp, value)),
                    'd' | 'i' => {
                        let n = interp.to_number(value)?;
                        out.push_str(&runtime_heap::number_to_string(n.trunc()));
                    }
                    'f' => {
                        let n = interp.to_number(value)?;
                        out.push_str(&runtime_heap::number_to_string(n));
                    }
                    'c' => {}
                    _ => out.push_str(&format_value(interp, value)),
                }
            }
            _ => out.push('%'),
        }
    }
    for value in remaining {
        out.push(' ');
        out.push_str(&format_value(interp, value));
    }
    Ok(out)
}

fn label_of(interp: &mut Interpreter, args: &[Value]) -> JsResult<String> {
    match arg(args, 0) {
        Value::Undefined => Ok("default".to_string()),
        v => Ok(interp.to_string(&v)?.to_string()),
    }
}

fn elapsed_ms(start: &Instant) -> String {
    let ms = start.elapsed().as_secs_f64() * 1000.0;
    format!("{:.3}ms", ms)
}

fn print_method(interp: &mut Interpreter, console: runtime_heap::ObjectId, name: &str, level: LogLevel) {
    interp.define_method(console, name, 0, move |interp, _, args| {
        let message = format_arguments(interp, args)?;
        interp.host().print(level, &message);
        Ok(Value::Undefined)
    });
}

pub(super) fn install(interp: &mut Interpreter) {
    let console = interp.heap.alloc_ordinary();
    define_global(interp, "console", Value::Object(console));
    let state: Rc<RefCell<ConsoleState>> = Rc::default();

    print_method(interp, console, "log", LogLevel::Log);
    print_method(interp, console, "info", LogLevel::Info);
    print_method(interp, console, "warn", LogLevel::Warn);
    print_method(interp, console, "error", LogLevel::Error);
    print_method(interp, console, "debug", LogLevel::Debug);

    interp.define_method(console, "trace", 0, |interp, _, args| {
        let message = format_arguments(interp, args)?;
        // 先頭は trace 自身のフレーム
        let frames: Vec<String> = interp.stack_names().into_iter().skip(1).collect();
        interp.host().trace(&message, &frames);
        Ok(Value::Undefined)
    });
    for name in ["group", "groupCollapsed"] {
        interp.define_method(console, name, 0, |interp, _, args| {
            let label = if args.is_empty() {
                "Group".to_string()
            } else {
                format_arguments(interp, args)?
            };
            interp.host().group(&label);
            Ok(Value::Undefined)
        });
    }
    interp.define_method(console, "groupEnd", 0, |interp, _, _| {
        interp.host().group_end();
        Ok(Value::Undefined)
    });
    interp.define_method(console, "clear", 0, |interp, _, _| {
        interp.host().clear();
        Ok(Value::Undefined)
    });
    interp.define_method(console, "assert", 0, |interp, _, args| {
        if interp.to_boolean(&arg(args, 0)) {
            return Ok(Value::Undefined);
        }
        let rest = args.get(1..).unwrap_or_default();
        let message = if rest.is_empty() {
            "Assertion failed".to_string()
        } else {
            format!("Assertion failed: {}", format_arguments(interp, rest)?)
        };
        interp.host().print(LogLevel::Error, &message);
        Ok(Value::Undefined)
    });

    let counters = state.clone();
    interp.define_method(console, "count", 0, move |interp, _, args| {
        let label = label_of(interp, args)?;
        let count = {
            let mut state = counters.borrow_mut();
            let entry = state.counters.entry(label.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        interp.host().print(LogLevel::Log, &format!("{}: {}", label, count));
        Ok(Value::Undefined)
    });
    let counters = state.clone();
    interp.define_method(console, "countReset", 0, move |interp, _, args| {
        let label = label_of(interp, args)?;
        let existed = counters
            .borrow_mut()
            .counters
            .get_mut(&label)
            .map(|c| *c = 0)
            .is_some();
        if !existed {
            let message = format!("\"{}\" doesn't have a count", label);
            interp.host().print(LogLevel::Warn, &message);
        }
        Ok(Value::Undefined)
    });

    let timers = state.clone();
    interp.define_method(console, "time", 0, move |interp, _, args| {
        let label = label_of(interp, args)?;
        let started = {
            let mut state = timers.borrow_mut();
            if state.timers.contains_key(&label) {
                false
            } else {
                state.timers.insert(label.clone(), Instant::now());
                true
            }
        };
        if !started {
            let message = format!("Timer '{}' already exists", label);
            interp.host().print(LogLevel::Warn, &message);
        }
        Ok(Value::Undefined)
    });
    let timers = state.clone();
    interp.define_method(console, "timeLog", 0, move |interp, _, args| {
        let label = label_of(interp, args)?;
        let elapsed = timers.borrow().timers.get(&label).map(elapsed_ms);
        let Some(elapsed) = elapsed else {
            let message = format!("Timer '{}' does not exist", label);
            interp.host().print(LogLevel::Warn, &message);
            return Ok(Value::Undefined);
        };
        let mut message = format!("{}: {}", label, elapsed);
        let extra = args.get(1..).unwrap_or_default();
        if !extra.is_empty() {
            message.push(' ');
            message.push_str(&format_arguments(interp, extra)?);
        }
        interp.host().print(LogLevel::Log, &message);
        Ok(Value::Undefined)
    });
    interp.define_method(console, "timeEnd", 0, move |interp, _, args| {
        let label = label_of(interp, args)?;
        let removed = state.borrow_mut().timers.remove(&label);
        let message = match removed {
            Some(start) => format!("{}: {}", label, elapsed_ms(&start)),
            None => {
                let message = format!("Timer '{}' does not exist", label);
                interp.host().print(LogLevel::Warn, &message);
                return Ok(Value::Undefined);
            }
        };
        interp.host().print(LogLevel::Log, &message);
        Ok(Value::Undefined)
    });
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::interpreter::test_util::eval;
    use crate::interpreter::{CaptureHost, Interpreter};

    fn capture(src: &str) -> Vec<String> {
        let host = Rc::new(CaptureHost::new());
        let mut interp = Interpreter::new(host.clone());
        eval(&mut interp, src).ok();
        host.lines()
    }

    #[test]
    /// 書式指定の展開と余りの引数。
    fn format_specifiers() {
        assert_eq!(capture("console.log('%s is %d years', 'Ann', 42.7, 'extra')"), vec!["Ann is 42 years extra"]);
        assert_eq!(capture("console.log('100%%', '%c', 'x')"), vec!["100% %c x"]);
        assert_eq!(capture("console.log(1, 'two', null)"), vec!["1 two null"]);
    }

    #[test]
    /// エラー引数は「名前: メッセージ」で表示する。
    fn error_arguments() {
        assert_eq!(capture("console.error(new TypeError('bad'))"), vec!["TypeError: bad"]);
    }

    #[test]
    /// カウンタとリセット。
    fn counters() {
        assert_eq!(
            capture("console.count(); console.count(); console.count('x'); console.countReset('nope'); console.countReset(); console.count()"),
            vec!["default: 1", "default: 2", "x: 1", "\"nope\" doesn't have a count", "default: 1"]
        );
    }

    #[test]
    /// assert は偽のときだけ出力する。
    fn assertions() {
        assert_eq!(capture("console.assert(true, 'no'); console.assert(0, 'yes', 1)"), vec!["Assertion failed: yes 1"]);
    }

    #[test]
    /// trace は呼び出し元の関数名を内側から並べる。
    fn trace_frames() {
        assert_eq!(
            capture("function outer() { inner(); } function inner() { console.trace('here'); } outer()"),
            vec!["here", "-> inner", "-> outer", "-> (global)"]
        );
    }

    #[test]
    /// 存在しないタイマ。
    fn missing_timer() {
        assert_eq!(capture("console.timeEnd('t')"), vec!["Timer 't' does not exist"]);
    }
}
