// パス: src/interpreter/builtins/mod.rs
// 役割: 組み込みオブジェクト群をグローバル環境へ登録する
// 意図: 種類ごとにファイルを分け、登録順（プロトタイプの依存関係）をここで一元管理する
// 関連ファイル: src/interpreter/mod.rs, src/interpreter/builtins/*.rs

use runtime_heap::{Attributes, ObjectId, Property, PropertyKey, Value};

use super::{Interpreter, JsResult};

mod array;
mod buffer;
mod collections;
mod console;
mod date;
mod error;
mod function;
mod globals;
mod intl;
mod json;
mod math;
mod object;
mod primitives;
mod promise;
mod proxy;
mod regexp;
mod string;
mod temporal;

pub(crate) use date::full_string as date_to_string;

/// realm の組み込みをすべて登録する。
pub(super) fn install(interp: &mut Interpreter) {
    object::install(interp);
    function::install(interp);
    interp.install_iterators();
    array::install(interp);
    string::install(interp);
    primitives::install(interp);
    math::install(interp);
    error::install(interp);
    json::install(interp);
    console::install(interp);
    collections::install(interp);
    promise::install(interp);
    date::install(interp);
    regexp::install(interp);
    buffer::install(interp);
    proxy::install(interp);
    temporal::install(interp);
    intl::install(interp);
    globals::install(interp);
}

/// グローバルオブジェクトへ列挙不可の値として置く。
fn define_global(interp: &mut Interpreter, name: &str, value: Value) {
    let global = interp.global;
    interp.define_value(global, name, value);
}

/// 書き換え不可の定数プロパティ（`Math.PI` など）。
fn define_constant(interp: &mut Interpreter, target: ObjectId, name: &str, value: Value) {
    interp
        .heap
        .object_mut(target)
        .define(PropertyKey::from(name), Property::data(value, Attributes::NONE));
}

/// コンストラクタを作ってグローバルに置く。
fn install_constructor(
    interp: &mut Interpreter,
    name: &str,
    length: u32,
    prototype: ObjectId,
    f: impl Fn(&mut Interpreter, Value, &[Value]) -> JsResult<Value> + 'static,
) -> ObjectId {
    let ctor = interp.native_constructor(name, length, prototype, f);
    define_global(interp, name, Value::Object(ctor));
    ctor
}

/// 呼び出し可能でなければ TypeError。
fn require_callable(interp: &mut Interpreter, value: &Value) -> JsResult<Value> {
    if interp.heap.is_callable(value) {
        Ok(value.clone())
    } else {
        let shown = interp.heap.display_string(value);
        Err(interp.type_error(format!("{} is not a function", shown)))
    }
}

/// オブジェクトでなければ TypeError。
fn require_object(interp: &mut Interpreter, value: &Value) -> JsResult<ObjectId> {
    match value {
        Value::Object(id) => Ok(*id),
        other => {
            let shown = interp.heap.display_string(other);
            Err(interp.type_error(format!("{} is not an object", shown)))
        }
    }
}

/// `new` なしの呼び出しを拒否する。
fn require_new(interp: &mut Interpreter, name: &str) -> JsResult<()> {
    if interp.is_constructing() {
        Ok(())
    } else {
        Err(interp.type_error(format!("{} constructor must be called with 'new'", name)))
    }
}

/// オプション引数の文字列プロパティ（未指定なら `None`）。
fn option_string(interp: &mut Interpreter, options: &Value, name: &str) -> JsResult<Option<String>> {
    if !options.is_object() {
        return Ok(None);
    }
    let v = interp.get(options, &PropertyKey::from(name))?;
    if v.is_undefined() {
        return Ok(None);
    }
    Ok(Some(interp.to_string(&v)?.to_string()))
}

/// 許可された値のいずれかであることを確かめる。
fn option_choice(
    interp: &mut Interpreter,
    options: &Value,
    name: &str,
    allowed: &[&str],
    fallback: Option<&str>,
) -> JsResult<Option<String>> {
    match option_string(interp, options, name)? {
        Some(v) if allowed.contains(&v.as_str()) => Ok(Some(v)),
        Some(v) => Err(interp.range_error(format!("{} is not a valid value for option {}", v, name))),
        None => Ok(fallback.map(str::to_string)),
    }
}

fn option_bool(interp: &mut Interpreter, options: &Value, name: &str) -> JsResult<Option<bool>> {
    if !options.is_object() {
        return Ok(None);
    }
    let v = interp.get(options, &PropertyKey::from(name))?;
    if v.is_undefined() {
        return Ok(None);
    }
    Ok(Some(interp.to_boolean(&v)))
}

fn option_number(
    interp: &mut Interpreter,
    options: &Value,
    name: &str,
    min: f64,
    max: f64,
) -> JsResult<Option<f64>> {
    if !options.is_object() {
        return Ok(None);
    }
    let v = interp.get(options, &PropertyKey::from(name))?;
    if v.is_undefined() {
        return Ok(None);
    }
    let n = interp.to_number(&v)?;
    if n.is_nan() || n < min || n > max {
        return Err(interp.range_error(format!("{} value is out of range", name)));
    }
    Ok(Some(n.floor()))
}
