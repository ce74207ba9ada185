// パス: src/repl/globals.rs
// 役割: 対話モード / スクリプトモードで追加するグローバル関数（exit, help, save, loadINI, loadJSON, print, `_`）
// 意図: REPL 固有の状態（入力履歴・直前の値）を `Rc` で共有し、ネイティブ関数から参照できるようにする
// 関連ファイル: src/repl/cmd.rs, src/repl/printer/mod.rs, src/interpreter/builtins/json.rs

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use indexmap::IndexMap;
use runtime_heap::{PropertyKey, Value};
use tracing::debug;

use crate::interpreter::{arg, Abrupt, ErrorKind, Interpreter, JsResult};
use crate::repl::printer;
use crate::repl::util::Output;

/// 対話セッションとネイティブ関数が共有する状態。
#[derive(Clone)]
pub struct SharedState {
    /// 受け付けた入力単位（実行前に追加する）。
    pub statements: Rc<RefCell<Vec<String>>>,
    /// 直前に正常終了した単位の値。
    pub last_value: Rc<RefCell<Value>>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            statements: Rc::default(),
            last_value: Rc::new(RefCell::new(Value::Undefined)),
        }
    }
}

/// スクリプトモードのグローバル: `global`, `loadINI`, `loadJSON`, `print`。
pub fn install_script_globals(interp: &mut Interpreter, output: &Rc<Output>) {
    let global = interp.global_object();
    interp.define_global_value("global", Value::Object(global));
    interp.define_global_function("loadINI", 1, load_ini);
    interp.define_global_function("loadJSON", 1, load_json);
    let out = Rc::clone(output);
    interp.define_global_function("print", 1, move |interp, _this, args| {
        out.line(&printer::render(&interp.heap, &arg(args, 0)));
        Ok(Value::Undefined)
    });
}

/// 対話モードのグローバル。スクリプトモードの分に `exit`, `help`, `save`, `_` を加える。
pub fn install_repl_globals(interp: &mut Interpreter, output: &Rc<Output>, state: &SharedState) {
    install_script_globals(interp, output);

    interp.define_global_function("exit", 0, |interp, _this, args| {
        if args.is_empty() {
            return Err(Abrupt::Exit(0));
        }
        let code = interp.to_number(&args[0])?;
        Err(Abrupt::Exit(code as i32))
    });

    let out = Rc::clone(output);
    interp.define_global_function("help", 0, move |_interp, _this, _args| {
        let mut text = Vec::new();
        if printer::render_help(&mut text).is_ok() {
            out.write(&String::from_utf8_lossy(&text));
        }
        Ok(Value::Undefined)
    });

    let statements = Rc::clone(&state.statements);
    interp.define_global_function("save", 1, move |interp, _this, args| {
        let Some(path) = args.first() else {
            return Ok(Value::Boolean(false));
        };
        let path = interp.heap.display_string(path);
        let saved = match write_statements(Path::new(&path), &statements.borrow()) {
            Ok(()) => true,
            Err(err) => {
                debug!(%path, "save failed: {}", err);
                false
            }
        };
        Ok(Value::Boolean(saved))
    });

    let last_value = Rc::clone(&state.last_value);
    let out = Rc::clone(output);
    interp.define_global_accessor(
        "_",
        move |_interp, _this, _args| Ok(last_value.borrow().clone()),
        move |interp, _this, args| {
            out.line("Disable writing last value to '_'");
            let value = arg(args, 0);
            let global = interp.global_object();
            interp.delete_property(global, &PropertyKey::from("_"))?;
            interp.define_global_value("_", value.clone());
            Ok(value)
        },
    );
}

/// 最後の単位（`save(...)` を呼んだ単位自身）を除いて 1 行ずつ書き出す。
fn write_statements(path: &Path, statements: &[String]) -> std::io::Result<()> {
    let kept = statements.len().saturating_sub(1);
    let mut text = String::new();
    for statement in &statements[..kept] {
        text.push_str(statement);
        text.push('\n');
    }
    fs::write(path, text)
}

fn read_source_file(interp: &mut Interpreter, args: &[Value]) -> JsResult<String> {
    let filename = interp.to_string(&arg(args, 0))?;
    fs::read_to_string(&*filename).map_err(|err| {
        interp.throw(
            ErrorKind::Error,
            format!("Failed to open '{}': {}", filename, err),
        )
    })
}

fn load_ini(interp: &mut Interpreter, _this: Value, args: &[Value]) -> JsResult<Value> {
    let text = read_source_file(interp, args)?;
    let object = interp.heap.alloc_ordinary();
    for (group, entries) in parse_ini(&text) {
        let group_object = interp.heap.alloc_ordinary();
        for (key, value) in entries {
            interp.create_data_property(group_object, PropertyKey::string(&key), Value::string(&value));
        }
        interp.create_data_property(object, PropertyKey::string(&group), Value::Object(group_object));
    }
    Ok(Value::Object(object))
}

fn load_json(interp: &mut Interpreter, _this: Value, args: &[Value]) -> JsResult<Value> {
    let text = read_source_file(interp, args)?;
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => Ok(interp.json_to_value(&json)),
        Err(err) => {
            debug!("loadJSON: {}", err);
            Err(interp.throw(ErrorKind::SyntaxError, "Malformed JSON string"))
        }
    }
}

/// `[group]` と `key=value` の行を読む。`#` / `;` で始まる行は注釈。
/// 最初のグループより前のキーは名前が空のグループに入る。
fn parse_ini(text: &str) -> IndexMap<String, IndexMap<String, String>> {
    let mut groups: IndexMap<String, IndexMap<String, String>> = IndexMap::new();
    let mut current = String::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            current = name.trim().to_string();
            groups.entry(current.clone()).or_default();
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            groups
                .entry(current.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::test_util;
    use crate::repl::util::{strip_ansi, SharedBuffer};

    fn repl_realm() -> (Interpreter, SharedState, SharedBuffer) {
        let buffer = SharedBuffer::new();
        let output = Output::new(Box::new(buffer.clone()), true);
        let state = SharedState::default();
        let mut interp = Interpreter::headless();
        install_repl_globals(&mut interp, &output, &state);
        (interp, state, buffer)
    }

    #[test]
    fn ini_groups_and_comments() {
        let parsed = parse_ini("top=1\n# note\n[net]\n host = example \n;x\nport=80\n[empty]\n");
        assert_eq!(parsed[""]["top"], "1");
        assert_eq!(parsed["net"]["host"], "example");
        assert_eq!(parsed["net"]["port"], "80");
        assert!(parsed["empty"].is_empty());
        assert_eq!(parsed.keys().collect::<Vec<_>>(), vec!["", "net", "empty"]);
    }

    #[test]
    /// 書き出しは最後の単位を含めない。
    fn save_skips_the_current_unit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.js");
        write_statements(&path, &["let a = 1".into(), "a + 1".into(), "save('x')".into()]).expect("write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "let a = 1\na + 1\n");
    }

    #[test]
    fn exit_requests_termination_with_code() {
        let (mut interp, _, _) = repl_realm();
        assert!(matches!(test_util::eval(&mut interp, "exit()"), Err(Abrupt::Exit(0))));
        assert!(matches!(test_util::eval(&mut interp, "exit(4)"), Err(Abrupt::Exit(4))));
    }

    #[test]
    fn underscore_tracks_last_value_until_assigned() {
        let (mut interp, state, buffer) = repl_realm();
        *state.last_value.borrow_mut() = Value::Number(42.0);
        let value = test_util::eval(&mut interp, "_ + 1").expect("eval");
        assert!(matches!(value, Value::Number(n) if n == 43.0));

        test_util::eval(&mut interp, "_ = 'mine'").expect("eval");
        assert_eq!(buffer.take(), "Disable writing last value to '_'\n");
        *state.last_value.borrow_mut() = Value::Number(0.0);
        let value = test_util::eval(&mut interp, "_").expect("eval");
        assert_eq!(interp.heap.display_string(&value), "mine");
    }

    #[test]
    fn print_and_help_write_to_output() {
        let (mut interp, _, buffer) = repl_realm();
        test_util::eval(&mut interp, "print([1, 'a'])").expect("eval");
        assert_eq!(buffer.take(), "[ 1, \"a\" ]\n");
        test_util::eval(&mut interp, "help()").expect("eval");
        assert!(strip_ansi(&buffer.take()).starts_with("REPL commands:\n"));
    }

    #[test]
    fn load_json_reads_file_and_rejects_garbage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let good = dir.path().join("good.json");
        let bad = dir.path().join("bad.json");
        fs::write(&good, r#"{"name": "x", "list": [1, 2]}"#).expect("write");
        fs::write(&bad, "{nope").expect("write");
        let (mut interp, _, _) = repl_realm();
        interp.define_global_value("goodPath", Value::string(good.to_string_lossy().as_ref()));
        interp.define_global_value("badPath", Value::string(bad.to_string_lossy().as_ref()));

        let value = test_util::eval(&mut interp, "const j = loadJSON(goodPath); j.name + j.list.length").expect("eval");
        assert_eq!(interp.heap.display_string(&value), "x2");

        let Err(Abrupt::Throw(err)) = test_util::eval(&mut interp, "loadJSON(badPath)") else {
            panic!("expected a throw");
        };
        assert_eq!(interp.describe_error(&err), "SyntaxError: Malformed JSON string");
    }

    #[test]
    fn load_ini_builds_nested_objects() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("conf.ini");
        fs::write(&path, "[server]\nport=8080\n").expect("write");
        let (mut interp, _, _) = repl_realm();
        interp.define_global_value("iniPath", Value::string(path.to_string_lossy().as_ref()));
        let value = test_util::eval(&mut interp, "loadINI(iniPath).server.port").expect("eval");
        assert_eq!(interp.heap.display_string(&value), "8080");
    }

    #[test]
    fn missing_file_throws_plain_error() {
        let (mut interp, _, _) = repl_realm();
        let Err(Abrupt::Throw(err)) = test_util::eval(&mut interp, "loadINI('/nonexistent/dir/x.ini')") else {
            panic!("expected a throw");
        };
        assert!(interp
            .describe_error(&err)
            .starts_with("Error: Failed to open '/nonexistent/dir/x.ini': "));
    }

    #[test]
    fn script_globals_omit_repl_helpers() {
        let buffer = SharedBuffer::new();
        let output = Output::new(Box::new(buffer), true);
        let mut interp = Interpreter::headless();
        install_script_globals(&mut interp, &output);
        let value = test_util::eval(&mut interp, "[typeof exit, typeof print, global === globalThis].join()").expect("eval");
        assert_eq!(interp.heap.display_string(&value), "undefined,function,true");
    }
}
