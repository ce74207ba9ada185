// パス: src/interpreter/builtins/array.rs
// 役割: Array コンストラクタと Array.prototype のメソッド
// 意図: 汎用メソッドは配列風オブジェクト（length と添字）に対して動くようにする
// 関連ファイル: src/interpreter/property.rs, src/interpreter/iter.rs

use std::cmp::Ordering;

use runtime_heap::{Attributes, ObjectId, ObjectKind, Property, PropertyKey, Value};

use super::{install_constructor, require_callable};
use crate::interpreter::iter::IterKind;
use crate::interpreter::{arg, text, Interpreter, JsResult};

fn index_key(i: usize) -> PropertyKey {
    PropertyKey::string(i.to_string())
}

/// 配列なら添字ストレージを直接置き換え、それ以外は length と添字へ書き込む。
fn write_elements(interp: &mut Interpreter, target: &Value, values: Vec<Value>) -> JsResult<()> {
    if let Value::Object(id) = target {
        if matches!(interp.heap.kind(*id), ObjectKind::Array { .. }) {
            let object = interp.heap.object_mut(*id);
            object.truncate_indexed(0);
            let len = values.len() as u32;
            for (i, v) in values.into_iter().enumerate() {
                object.define_index(i as u32, Property::data(v, Attributes::DEFAULT));
            }
            if let ObjectKind::Array { length } = &mut object.kind {
                *length = len;
            }
            return Ok(());
        }
    }
    let old_len = interp.length_of(target)?;
    let new_len = values.len();
    for (i, v) in values.into_iter().enumerate() {
        interp.set(target, index_key(i), v)?;
    }
    if let Value::Object(id) = target {
        for i in new_len..old_len {
            interp.delete_property(*id, &index_key(i))?;
        }
    }
    interp.set(target, PropertyKey::from("length"), Value::Number(new_len as f64))
}

/// 穴を飛ばしつつコールバックへ (要素, 添字, 配列) を渡す走査。
fn for_each_present(
    interp: &mut Interpreter,
    this: &Value,
    mut f: impl FnMut(&mut Interpreter, usize, Value) -> JsResult<bool>,
) -> JsResult<()> {
    let id = interp.to_object(this)?;
    let target = Value::Object(id);
    let len = interp.length_of(&target)?;
    for i in 0..len {
        let key = index_key(i);
        if !interp.has_property(id, &key)? {
            continue;
        }
        let v = interp.get(&target, &key)?;
        if !f(interp, i, v)? {
            break;
        }
    }
    Ok(())
}

/// 比較関数が例外を投げうるため、自前のマージソートで並べる。
fn merge_sort(
    interp: &mut Interpreter,
    values: Vec<Value>,
    cmp: &mut dyn FnMut(&mut Interpreter, &Value, &Value) -> JsResult<Ordering>,
) -> JsResult<Vec<Value>> {
    if values.len() <= 1 {
        return Ok(values);
    }
    let mut left = values;
    let right = left.split_off(left.len() / 2);
    let left = merge_sort(interp, left, cmp)?;
    let right = merge_sort(interp, right, cmp)?;
    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut l = left.into_iter().peekable();
    let mut r = right.into_iter().peekable();
    while let (Some(a), Some(b)) = (l.peek(), r.peek()) {
        if cmp(interp, a, b)? == Ordering::Greater {
            out.extend(r.next());
        } else {
            out.extend(l.next());
        }
    }
    out.extend(l);
    out.extend(r);
    Ok(out)
}

fn sort_values(interp: &mut Interpreter, values: Vec<Value>, comparator: &Value) -> JsResult<Vec<Value>> {
    let (mut present, undefined): (Vec<Value>, Vec<Value>) =
        values.into_iter().partition(|v| !v.is_undefined());
    let comparator = comparator.clone();
    let mut cmp = |interp: &mut Interpreter, a: &Value, b: &Value| -> JsResult<Ordering> {
        if comparator.is_undefined() {
            let x = interp.to_string(a)?;
            let y = interp.to_string(b)?;
            return Ok(text::units(&x).cmp(&text::units(&y)));
        }
        let r = interp.call(&comparator, Value::Undefined, &[a.clone(), b.clone()])?;
        let n = interp.to_number(&r)?;
        Ok(if n < 0.0 {
            Ordering::Less
        } else if n > 0.0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        })
    };
    present = merge_sort(interp, present, &mut cmp)?;
    present.extend(undefined);
    Ok(present)
}

fn join(interp: &mut Interpreter, this: &Value, separator: &str) -> JsResult<String> {
    let items = interp.array_like_to_vec(this)?;
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        parts.push(if item.is_nullish() {
            String::new()
        } else {
            interp.to_string(&item)?.to_string()
        });
    }
    Ok(parts.join(separator))
}

fn flatten_into(interp: &mut Interpreter, out: &mut Vec<Value>, source: Vec<Value>, depth: f64) -> JsResult<()> {
    for item in source {
        let is_array = matches!(&item, Value::Object(id) if matches!(interp.heap.kind(*id), ObjectKind::Array { .. }));
        if is_array && depth >= 1.0 {
            let inner = interp.array_like_to_vec(&item)?;
            flatten_into(interp, out, inner, depth - 1.0)?;
        } else {
            out.push(item);
        }
    }
    Ok(())
}

/// 開始・終了位置の引数を [0, len] に収める。
fn relative(interp: &mut Interpreter, value: &Value, len: usize, default: usize) -> JsResult<usize> {
    if value.is_undefined() {
        return Ok(default);
    }
    let n = interp.to_integer(value)?;
    Ok(text::relative_index(n, len))
}

fn find_by(
    interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
    from_end: bool,
) -> JsResult<Option<(usize, Value)>> {
    let callback = require_callable(interp, &arg(args, 0))?;
    let items = interp.array_like_to_vec(this)?;
    let order: Vec<usize> = if from_end {
        (0..items.len()).rev().collect()
    } else {
        (0..items.len()).collect()
    };
    for i in order {
        let v = items[i].clone();
        let hit = interp.call(&callback, arg(args, 1), &[v.clone(), Value::Number(i as f64), this.clone()])?;
        if interp.to_boolean(&hit) {
            return Ok(Some((i, v)));
        }
    }
    Ok(None)
}

pub(super) fn install(interp: &mut Interpreter) {
    let proto = interp.new_prototype("Array", ObjectKind::Array { length: 0 });
    let ctor = install_constructor(interp, "Array", 1, proto, |interp, _, args| {
        let proto = interp.constructing_prototype("Array");
        let values = match args {
            [Value::Number(n)] => {
                if *n < 0.0 || n.fract() != 0.0 || *n > u32::MAX as f64 {
                    return Err(interp.range_error("Invalid array length"));
                }
                let id = interp.heap.alloc(ObjectKind::Array { length: *n as u32 }, Some(proto));
                return Ok(Value::Object(id));
            }
            other => other.to_vec(),
        };
        let id = interp.create_array(values);
        interp.heap.object_mut(id).prototype = Some(proto);
        Ok(Value::Object(id))
    });

    interp.define_method(ctor, "isArray", 1, |interp, _, args| {
        Ok(Value::Boolean(matches!(arg(args, 0), Value::Object(id) if matches!(interp.heap.kind(id), ObjectKind::Array { .. }))))
    });
    interp.define_method(ctor, "of", 0, |interp, _, args| {
        Ok(Value::Object(interp.create_array(args.to_vec())))
    });
    interp.define_method(ctor, "from", 1, |interp, _, args| {
        let source = arg(args, 0);
        let iterator_key = PropertyKey::Symbol(interp.well_known.iterator);
        let items = if source.is_nullish() {
            let shown = interp.heap.display_string(&source);
            return Err(interp.type_error(format!("{} is not iterable", shown)));
        } else if interp.get_method(&source, &iterator_key)?.is_some() {
            interp.iterate_to_vec(&source)?
        } else {
            interp.array_like_to_vec(&source)?
        };
        let mapper = arg(args, 1);
        let items = if mapper.is_undefined() {
            items
        } else {
            let mapper = require_callable(interp, &mapper)?;
            let mut mapped = Vec::with_capacity(items.len());
            for (i, v) in items.into_iter().enumerate() {
                mapped.push(interp.call(&mapper, arg(args, 2), &[v, Value::Number(i as f64)])?);
            }
            mapped
        };
        Ok(Value::Object(interp.create_array(items)))
    });

    interp.define_method(proto, "push", 1, |interp, this, args| {
        let len = interp.length_of(&this)?;
        for (i, v) in args.iter().enumerate() {
            interp.set(&this, index_key(len + i), v.clone())?;
        }
        let new_len = Value::Number((len + args.len()) as f64);
        interp.set(&this, PropertyKey::from("length"), new_len.clone())?;
        Ok(new_len)
    });
    interp.define_method(proto, "pop", 0, |interp, this, _| {
        let len = interp.length_of(&this)?;
        if len == 0 {
            interp.set(&this, PropertyKey::from("length"), Value::Number(0.0))?;
            return Ok(Value::Undefined);
        }
        let last = interp.get(&this, &index_key(len - 1))?;
        let id = interp.to_object(&this)?;
        interp.delete_property(id, &index_key(len - 1))?;
        interp.set(&this, PropertyKey::from("length"), Value::Number((len - 1) as f64))?;
        Ok(last)
    });
    interp.define_method(proto, "shift", 0, |interp, this, _| {
        let mut items = interp.array_like_to_vec(&this)?;
        if items.is_empty() {
            return Ok(Value::Undefined);
        }
        let first = items.remove(0);
        write_elements(interp, &this, items)?;
        Ok(first)
    });
    interp.define_method(proto, "unshift", 1, |interp, this, args| {
        let mut items = args.to_vec();
        items.extend(interp.array_like_to_vec(&this)?);
        let len = items.len();
        write_elements(interp, &this, items)?;
        Ok(Value::Number(len as f64))
    });
    interp.define_method(proto, "splice", 2, |interp, this, args| {
        let mut items = interp.array_like_to_vec(&this)?;
        let len = items.len();
        let start = relative(interp, &arg(args, 0), len, 0)?;
        let delete_count = match args.len() {
            0 => 0,
            1 => len - start,
            _ => (interp.to_integer(&args[1])?.max(0.0) as usize).min(len - start),
        };
        let inserted = args.get(2..).unwrap_or_default().to_vec();
        let removed: Vec<Value> = items.splice(start..start + delete_count, inserted).collect();
        write_elements(interp, &this, items)?;
        Ok(Value::Object(interp.create_array(removed)))
    });
    interp.define_method(proto, "slice", 2, |interp, this, args| {
        let items = interp.array_like_to_vec(&this)?;
        let len = items.len();
        let start = relative(interp, &arg(args, 0), len, 0)?;
        let end = relative(interp, &arg(args, 1), len, len)?;
        let slice = items.get(start..end.max(start)).unwrap_or_default().to_vec();
        Ok(Value::Object(interp.create_array(slice)))
    });
    interp.define_method(proto, "concat", 1, |interp, this, args| {
        let mut out = interp.array_like_to_vec(&this)?;
        for a in args {
            let spreadable = matches!(a, Value::Object(id) if matches!(interp.heap.kind(*id), ObjectKind::Array { .. }));
            if spreadable {
                out.extend(interp.array_like_to_vec(a)?);
            } else {
                out.push(a.clone());
            }
        }
        Ok(Value::Object(interp.create_array(out)))
    });
    interp.define_method(proto, "join", 1, |interp, this, args| {
        let sep = match arg(args, 0) {
            Value::Undefined => ",".to_string(),
            other => interp.to_string(&other)?.to_string(),
        };
        join(interp, &this, &sep).map(Value::string)
    });
    interp.define_method(proto, "toString", 0, |interp, this, _| {
        join(interp, &this, ",").map(Value::string)
    });
    interp.define_method(proto, "toLocaleString", 0, |interp, this, _| {
        join(interp, &this, ",").map(Value::string)
    });
    interp.define_method(proto, "reverse", 0, |interp, this, _| {
        let mut items = interp.array_like_to_vec(&this)?;
        items.reverse();
        write_elements(interp, &this, items)?;
        Ok(this)
    });
    interp.define_method(proto, "indexOf", 1, |interp, this, args| {
        let items = interp.array_like_to_vec(&this)?;
        let from = relative(interp, &arg(args, 1), items.len(), 0)?;
        let target = arg(args, 0);
        let found = items.iter().skip(from).position(|v| v.strict_equals(&target));
        Ok(Value::Number(found.map(|i| (i + from) as f64).unwrap_or(-1.0)))
    });
    interp.define_method(proto, "lastIndexOf", 1, |interp, this, args| {
        let items = interp.array_like_to_vec(&this)?;
        let target = arg(args, 0);
        let found = items.iter().rposition(|v| v.strict_equals(&target));
        Ok(Value::Number(found.map(|i| i as f64).unwrap_or(-1.0)))
    });
    interp.define_method(proto, "includes", 1, |interp, this, args| {
        let items = interp.array_like_to_vec(&this)?;
        let from = relative(interp, &arg(args, 1), items.len(), 0)?;
        let target = arg(args, 0);
        let same_value_zero = |v: &Value| match (v, &target) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => v.strict_equals(&target),
        };
        Ok(Value::Boolean(items.iter().skip(from).any(same_value_zero)))
    });
    interp.define_method(proto, "find", 1, |interp, this, args| {
        Ok(find_by(interp, &this, args, false)?.map(|(_, v)| v).unwrap_or(Value::Undefined))
    });
    interp.define_method(proto, "findIndex", 1, |interp, this, args| {
        Ok(Value::Number(find_by(interp, &this, args, false)?.map(|(i, _)| i as f64).unwrap_or(-1.0)))
    });
    interp.define_method(proto, "findLast", 1, |interp, this, args| {
        Ok(find_by(interp, &this, args, true)?.map(|(_, v)| v).unwrap_or(Value::Undefined))
    });
    interp.define_method(proto, "findLastIndex", 1, |interp, this, args| {
        Ok(Value::Number(find_by(interp, &this, args, true)?.map(|(i, _)| i as f64).unwrap_or(-1.0)))
    });
    interp.define_method(proto, "forEach", 1, |interp, this, args| {
        let callback = require_callable(interp, &arg(args, 0))?;
        let this_arg = arg(args, 1);
        for_each_present(interp, &this, |interp, i, v| {
            interp.call(&callback, this_arg.clone(), &[v, Value::Number(i as f64), this.clone()])?;
            Ok(true)
        })?;
        Ok(Value::Undefined)
    });
    interp.define_method(proto, "map", 1, |interp, this, args| {
        let callback = require_callable(interp, &arg(args, 0))?;
        let this_arg = arg(args, 1);
        let len = interp.length_of(&this)?;
        let out = interp.create_array(Vec::new());
        if let ObjectKind::Array { length } = &mut interp.heap.object_mut(out).kind {
            *length = len as u32;
        }
        for_each_present(interp, &this, |interp, i, v| {
            let mapped = interp.call(&callback, this_arg.clone(), &[v, Value::Number(i as f64), this.clone()])?;
            interp.create_data_property(out, index_key(i), mapped);
            Ok(true)
        })?;
        Ok(Value::Object(out))
    });
    interp.define_method(proto, "filter", 1, |interp, this, args| {
        let callback = require_callable(interp, &arg(args, 0))?;
        let this_arg = arg(args, 1);
        let mut kept = Vec::new();
        for_each_present(interp, &this, |interp, i, v| {
            let keep = interp.call(&callback, this_arg.clone(), &[v.clone(), Value::Number(i as f64), this.clone()])?;
            if interp.to_boolean(&keep) {
                kept.push(v);
            }
            Ok(true)
        })?;
        Ok(Value::Object(interp.create_array(kept)))
    });
    interp.define_method(proto, "some", 1, |interp, this, args| {
        let callback = require_callable(interp, &arg(args, 0))?;
        let this_arg = arg(args, 1);
        let mut found = false;
        for_each_present(interp, &this, |interp, i, v| {
            let r = interp.call(&callback, this_arg.clone(), &[v, Value::Number(i as f64), this.clone()])?;
            found = interp.to_boolean(&r);
            Ok(!found)
        })?;
        Ok(Value::Boolean(found))
    });
    interp.define_method(proto, "every", 1, |interp, this, args| {
        let callback = require_callable(interp, &arg(args, 0))?;
        let this_arg = arg(args, 1);
        let mut all = true;
        for_each_present(interp, &this, |interp, i, v| {
            let r = interp.call(&callback, this_arg.clone(), &[v, Value::Number(i as f64), this.clone()])?;
            all = interp.to_boolean(&r);
            Ok(all)
        })?;
        Ok(Value::Boolean(all))
    });
    interp.define_method(proto, "reduce", 1, |interp, this, args| {
        let callback = require_callable(interp, &arg(args, 0))?;
        let mut acc = args.get(1).cloned();
        for_each_present(interp, &this, |interp, i, v| {
            acc = Some(match acc.take() {
                None => v,
                Some(a) => interp.call(&callback, Value::Undefined, &[a, v, Value::Number(i as f64), this.clone()])?,
            });
            Ok(true)
        })?;
        match acc {
            Some(v) => Ok(v),
            None => Err(interp.type_error("Reduce of empty array with no initial value")),
        }
    });
    interp.define_method(proto, "reduceRight", 1, |interp, this, args| {
        let callback = require_callable(interp, &arg(args, 0))?;
        let items = interp.array_like_to_vec(&this)?;
        let mut acc = args.get(1).cloned();
        for (i, v) in items.into_iter().enumerate().rev() {
            acc = Some(match acc.take() {
                None => v,
                Some(a) => interp.call(&callback, Value::Undefined, &[a, v, Value::Number(i as f64), this.clone()])?,
            });
        }
        match acc {
            Some(v) => Ok(v),
            None => Err(interp.type_error("Reduce of empty array with no initial value")),
        }
    });
    interp.define_method(proto, "sort", 1, |interp, this, args| {
        let comparator = arg(args, 0);
        if !comparator.is_undefined() {
            require_callable(interp, &comparator)?;
        }
        let items = interp.array_like_to_vec(&this)?;
        let sorted = sort_values(interp, items, &comparator)?;
        write_elements(interp, &this, sorted)?;
        Ok(this)
    });
    interp.define_method(proto, "toSorted", 1, |interp, this, args| {
        let items = interp.array_like_to_vec(&this)?;
        let sorted = sort_values(interp, items, &arg(args, 0))?;
        Ok(Value::Object(interp.create_array(sorted)))
    });
    interp.define_method(proto, "toReversed", 0, |interp, this, _| {
        let mut items = interp.array_like_to_vec(&this)?;
        items.reverse();
        Ok(Value::Object(interp.create_array(items)))
    });
    interp.define_method(proto, "flat", 0, |interp, this, args| {
        let depth = match arg(args, 0) {
            Value::Undefined => 1.0,
            d => interp.to_integer(&d)?,
        };
        let items = interp.array_like_to_vec(&this)?;
        let mut out = Vec::new();
        flatten_into(interp, &mut out, items, depth)?;
        Ok(Value::Object(interp.create_array(out)))
    });
    interp.define_method(proto, "flatMap", 1, |interp, this, args| {
        let callback = require_callable(interp, &arg(args, 0))?;
        let items = interp.array_like_to_vec(&this)?;
        let mut mapped = Vec::with_capacity(items.len());
        for (i, v) in items.into_iter().enumerate() {
            mapped.push(interp.call(&callback, arg(args, 1), &[v, Value::Number(i as f64), this.clone()])?);
        }
        let mut out = Vec::new();
        flatten_into(interp, &mut out, mapped, 1.0)?;
        Ok(Value::Object(interp.create_array(out)))
    });
    interp.define_method(proto, "fill", 1, |interp, this, args| {
        let len = interp.length_of(&this)?;
        let start = relative(interp, &arg(args, 1), len, 0)?;
        let end = relative(interp, &arg(args, 2), len, len)?;
        for i in start..end {
            interp.set(&this, index_key(i), arg(args, 0))?;
        }
        Ok(this)
    });
    interp.define_method(proto, "at", 1, |interp, this, args| {
        let len = interp.length_of(&this)? as f64;
        let n = interp.to_integer(&arg(args, 0))?;
        let index = if n < 0.0 { len + n } else { n };
        if index < 0.0 || index >= len {
            return Ok(Value::Undefined);
        }
        interp.get(&this, &index_key(index as usize))
    });
    interp.define_method(proto, "keys", 0, |interp, this, _| {
        let target = Value::Object(interp.to_object(&this)?);
        Ok(interp.create_list_iterator(target, IterKind::Keys))
    });
    interp.define_method(proto, "entries", 0, |interp, this, _| {
        let target = Value::Object(interp.to_object(&this)?);
        Ok(interp.create_list_iterator(target, IterKind::Entries))
    });
    let values = interp.define_method(proto, "values", 0, |interp, this, _| {
        let target = Value::Object(interp.to_object(&this)?);
        Ok(interp.create_list_iterator(target, IterKind::Values))
    });
    let iterator = interp.well_known.iterator;
    interp.heap.object_mut(proto).define(
        PropertyKey::Symbol(iterator),
        Property::data(Value::Object(values), Attributes::BUILTIN),
    );
}

/// 型付き配列など、配列と同じ添字走査を使う組み込みのための共有口。
pub(super) fn list_values_function(interp: &Interpreter) -> Option<ObjectId> {
    let proto = interp.prototype("Array");
    match interp.heap.get_without_side_effects(proto, &PropertyKey::from("values")) {
        Ok(Some(Value::Object(f))) => Some(f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// push / pop / shift / unshift と length。
    fn stack_and_queue() {
        assert_eq!(eval_display("const a = [1, 2]; a.push(3, 4); a.pop(); a.shift(); a.unshift(0); a.join()"), "0,2,3");
        assert_eq!(eval_display("const a = []; a.push(1)"), "1");
    }

    #[test]
    /// map / filter / reduce の組み合わせ。
    fn higher_order() {
        assert_eq!(eval_display("[1, 2, 3, 4].map(x => x * x).filter(x => x % 2 == 0).reduce((a, b) => a + b, 0)"), "20");
        assert_eq!(eval_display("[].reduce((a, b) => a + b)"), "throw TypeError: Reduce of empty array with no initial value");
    }

    #[test]
    /// sort は既定で文字列順、比較関数があればそれに従う。
    fn sorting() {
        assert_eq!(eval_display("[10, 9, 1, 100].sort().join()"), "1,10,100,9");
        assert_eq!(eval_display("[10, 9, 1, 100].sort((a, b) => a - b).join()"), "1,9,10,100");
        assert_eq!(eval_display("[3, undefined, 1].sort().length"), "3");
    }

    #[test]
    /// splice と slice の境界。
    fn splice_and_slice() {
        assert_eq!(eval_display("const a = [1, 2, 3, 4, 5]; const r = a.splice(1, 2, 'x'); `${a} | ${r}`"), "1,x,4,5 | 2,3");
        assert_eq!(eval_display("[1, 2, 3].slice(-2).join()"), "2,3");
    }

    #[test]
    /// includes は NaN を見つけ、indexOf は見つけない。
    fn nan_search() {
        assert_eq!(eval_display("`${[NaN].includes(NaN)} ${[NaN].indexOf(NaN)}`"), "true -1");
    }

    #[test]
    /// Array.from は反復可能と配列風の両方を受ける。
    fn array_from() {
        assert_eq!(eval_display("Array.from('abc').join('-')"), "a-b-c");
        assert_eq!(eval_display("Array.from({ length: 3 }, (_, i) => i * 2).join()"), "0,2,4");
    }

    #[test]
    /// flat は指定の深さまで展開する。
    fn flat() {
        assert_eq!(eval_display("[1, [2, [3, [4]]]].flat(2).length"), "4");
    }
}
