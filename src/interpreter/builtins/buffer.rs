// パス: src/interpreter/builtins/buffer.rs
// 役割: ArrayBuffer・型付き配列 11 種・DataView
// 意図: バイト列は ArrayBuffer が唯一の所有者で、ビューは (buffer, offset, length) の参照だけを持つ
// 関連ファイル: runtime_heap/src/heap.rs（要素の符号化）

use runtime_heap::{
    decode_element, encode_element, Attributes, ElementValue, ObjectId, ObjectKind, Property, PropertyKey,
    TypedArrayKind, Value,
};

use super::{define_constant, define_global, install_constructor, require_callable, require_new};
use crate::interpreter::iter::IterKind;
use crate::interpreter::{arg, text, Interpreter, JsResult};

const MAX_BYTE_LENGTH: f64 = 2_147_483_648.0;

/// ToIndex。負数や大きすぎる値は RangeError。
fn to_index(interp: &mut Interpreter, value: &Value, message: &str) -> JsResult<usize> {
    if value.is_undefined() {
        return Ok(0);
    }
    let n = interp.to_integer(value)?;
    if !(0.0..=MAX_BYTE_LENGTH).contains(&n) {
        return Err(interp.range_error(message));
    }
    Ok(n as usize)
}

fn alloc_buffer(interp: &mut Interpreter, bytes: Vec<u8>) -> ObjectId {
    let proto = interp.prototype("ArrayBuffer");
    interp.heap.alloc(ObjectKind::ArrayBuffer(Some(bytes)), Some(proto))
}

fn this_buffer(interp: &mut Interpreter, this: &Value, method: &str) -> JsResult<ObjectId> {
    match this {
        Value::Object(id) if matches!(interp.heap.kind(*id), ObjectKind::ArrayBuffer(_)) => Ok(*id),
        _ => Err(interp.type_error(format!("Method ArrayBuffer.prototype.{} called on incompatible receiver", method))),
    }
}

fn buffer_len(interp: &Interpreter, buffer: ObjectId) -> usize {
    interp.heap.array_buffer_bytes(buffer).map(<[u8]>::len).unwrap_or(0)
}

fn install_array_buffer(interp: &mut Interpreter) {
    let proto = interp.new_prototype("ArrayBuffer", ObjectKind::Ordinary);
    let ctor = install_constructor(interp, "ArrayBuffer", 1, proto, |interp, _, args| {
        require_new(interp, "ArrayBuffer")?;
        let len = to_index(interp, &arg(args, 0), "Invalid array buffer length")?;
        let proto = interp.constructing_prototype("ArrayBuffer");
        Ok(Value::Object(interp.heap.alloc(ObjectKind::ArrayBuffer(Some(vec![0; len])), Some(proto))))
    });
    interp.define_method(ctor, "isView", 1, |interp, _, args| {
        Ok(Value::Boolean(matches!(
            arg(args, 0),
            Value::Object(id) if matches!(interp.heap.kind(id), ObjectKind::TypedArray { .. } | ObjectKind::DataView { .. })
        )))
    });
    interp.define_getter(proto, "byteLength", |interp, this, _| {
        let id = this_buffer(interp, &this, "byteLength")?;
        Ok(Value::Number(buffer_len(interp, id) as f64))
    });
    interp.define_getter(proto, "detached", |interp, this, _| {
        let id = this_buffer(interp, &this, "detached")?;
        Ok(Value::Boolean(interp.heap.array_buffer_bytes(id).is_none()))
    });
    interp.define_method(proto, "slice", 2, |interp, this, args| {
        let id = this_buffer(interp, &this, "slice")?;
        let Some(len) = interp.heap.array_buffer_bytes(id).map(<[u8]>::len) else {
            return Err(interp.type_error("Cannot perform ArrayBuffer.prototype.slice on a detached ArrayBuffer"));
        };
        let start = text::relative_index(interp.to_integer(&arg(args, 0))?, len);
        let end = match arg(args, 1) {
            Value::Undefined => len,
            v => text::relative_index(interp.to_integer(&v)?, len),
        };
        let bytes = interp
            .heap
            .array_buffer_bytes(id)
            .and_then(|b| b.get(start..end.max(start)))
            .map(<[u8]>::to_vec)
            .unwrap_or_default();
        Ok(Value::Object(alloc_buffer(interp, bytes)))
    });
    interp.define_method(proto, "transfer", 0, |interp, this, args| {
        let id = this_buffer(interp, &this, "transfer")?;
        let taken = match &mut interp.heap.object_mut(id).kind {
            ObjectKind::ArrayBuffer(bytes) => bytes.take(),
            _ => None,
        };
        let Some(mut bytes) = taken else {
            return Err(interp.type_error("Cannot perform ArrayBuffer.prototype.transfer on a detached ArrayBuffer"));
        };
        if let Value::Number(_) = arg(args, 0) {
            let len = to_index(interp, &arg(args, 0), "Invalid array buffer length")?;
            bytes.resize(len, 0);
        }
        Ok(Value::Object(alloc_buffer(interp, bytes)))
    });
    let tag = interp.well_known.to_string_tag;
    interp.heap.object_mut(proto).define(
        PropertyKey::Symbol(tag),
        Property::data(Value::string("ArrayBuffer"), Attributes::CONFIGURABLE),
    );
}

/// 型付き配列の内部スロット。
#[derive(Clone, Copy)]
struct View {
    id: ObjectId,
    kind: TypedArrayKind,
    buffer: ObjectId,
    byte_offset: usize,
    length: usize,
}

fn this_typed(interp: &mut Interpreter, this: &Value, method: &str) -> JsResult<View> {
    if let Value::Object(id) = this {
        if let ObjectKind::TypedArray {
            kind,
            buffer,
            byte_offset,
            length,
        } = interp.heap.kind(*id)
        {
            return Ok(View {
                id: *id,
                kind: *kind,
                buffer: *buffer,
                byte_offset: *byte_offset,
                length: *length,
            });
        }
    }
    Err(interp.type_error(format!("this is not a typed array (in {})", method)))
}

fn to_element(interp: &mut Interpreter, kind: TypedArrayKind, value: &Value) -> JsResult<ElementValue> {
    if kind.is_bigint() {
        Ok(ElementValue::BigInt(interp.to_bigint(value)?))
    } else {
        Ok(ElementValue::Number(interp.to_number(value)?))
    }
}

fn element(interp: &Interpreter, view: &View, index: usize) -> Value {
    interp
        .heap
        .typed_array_element(view.id, index)
        .ok()
        .flatten()
        .unwrap_or(Value::Undefined)
}

fn elements(interp: &Interpreter, view: &View) -> Vec<Value> {
    (0..view.length).map(|i| element(interp, view, i)).collect()
}

fn alloc_typed(
    interp: &mut Interpreter,
    kind: TypedArrayKind,
    buffer: ObjectId,
    byte_offset: usize,
    length: usize,
    proto: ObjectId,
) -> ObjectId {
    interp.heap.alloc(
        ObjectKind::TypedArray {
            kind,
            buffer,
            byte_offset,
            length,
        },
        Some(proto),
    )
}

/// 新しいバッファに値を詰めた型付き配列を作る。
fn typed_from_values(
    interp: &mut Interpreter,
    kind: TypedArrayKind,
    values: &[Value],
    proto: ObjectId,
) -> JsResult<ObjectId> {
    let buffer = alloc_buffer(interp, vec![0; values.len() * kind.element_size()]);
    let id = alloc_typed(interp, kind, buffer, 0, values.len(), proto);
    for (i, v) in values.iter().enumerate() {
        let e = to_element(interp, kind, v)?;
        interp.heap.set_typed_array_element(id, i, e);
    }
    Ok(id)
}

fn construct_typed(interp: &mut Interpreter, kind: TypedArrayKind, args: &[Value]) -> JsResult<Value> {
    let name = kind.class_name();
    require_new(interp, name)?;
    let proto = interp.constructing_prototype(name);
    let size = kind.element_size();
    let first = arg(args, 0);
    let Value::Object(source) = first else {
        let message = format!("Invalid typed array length: {}", interp.heap.display_string(&first));
        let length = to_index(interp, &first, &message)?;
        let buffer = alloc_buffer(interp, vec![0; length * size]);
        return Ok(Value::Object(alloc_typed(interp, kind, buffer, 0, length, proto)));
    };
    if matches!(interp.heap.kind(source), ObjectKind::ArrayBuffer(_)) {
        let Some(buffer_len) = interp.heap.array_buffer_bytes(source).map(<[u8]>::len) else {
            return Err(interp.type_error("Cannot construct a typed array on a detached ArrayBuffer"));
        };
        let offset = to_index(interp, &arg(args, 1), "Start offset is out of bounds")?;
        if offset % size != 0 {
            return Err(interp.range_error(format!("start offset of {} should be a multiple of {}", name, size)));
        }
        let length = match arg(args, 2) {
            Value::Undefined => {
                if buffer_len % size != 0 {
                    return Err(interp.range_error(format!("byte length of {} should be a multiple of {}", name, size)));
                }
                if offset > buffer_len {
                    return Err(interp.range_error(format!("Start offset {} is outside the bounds of the buffer", offset)));
                }
                (buffer_len - offset) / size
            }
            v => {
                let length = to_index(interp, &v, "Invalid typed array length")?;
                if offset + length * size > buffer_len {
                    return Err(interp.range_error(format!("Invalid typed array length: {}", length)));
                }
                length
            }
        };
        return Ok(Value::Object(alloc_typed(interp, kind, source, offset, length, proto)));
    }
    let values = if matches!(interp.heap.kind(source), ObjectKind::TypedArray { .. }) {
        let view = this_typed(interp, &first, name)?;
        let values = elements(interp, &view);
        if kind.is_bigint() != view.kind.is_bigint() {
            return Err(interp.type_error(format!("Cannot mix BigInt and other types, use explicit conversions ({})", name)));
        }
        values
    } else {
        let iterator = PropertyKey::Symbol(interp.well_known.iterator);
        if interp.get_method(&first, &iterator)?.is_some() {
            interp.iterate_to_vec(&first)?
        } else {
            interp.array_like_to_vec(&first)?
        }
    };
    Ok(Value::Object(typed_from_values(interp, kind, &values, proto)?))
}

fn install_typed_arrays(interp: &mut Interpreter) {
    let base_proto = interp.new_prototype("TypedArray", ObjectKind::Ordinary);
    let base_ctor = interp.native_constructor("TypedArray", 0, base_proto, |interp, _, _| {
        Err(interp.type_error("Abstract class TypedArray not directly constructable"))
    });

    interp.define_getter(base_proto, "length", |interp, this, _| {
        Ok(Value::Number(this_typed(interp, &this, "length")?.length as f64))
    });
    interp.define_getter(base_proto, "byteLength", |interp, this, _| {
        let view = this_typed(interp, &this, "byteLength")?;
        Ok(Value::Number((view.length * view.kind.element_size()) as f64))
    });
    interp.define_getter(base_proto, "byteOffset", |interp, this, _| {
        Ok(Value::Number(this_typed(interp, &this, "byteOffset")?.byte_offset as f64))
    });
    interp.define_getter(base_proto, "buffer", |interp, this, _| {
        Ok(Value::Object(this_typed(interp, &this, "buffer")?.buffer))
    });
    let tag = interp.well_known.to_string_tag;
    interp.define_symbol_method(base_proto, tag, "get [Symbol.toStringTag]", |interp, this, _| {
        Ok(match &this {
            Value::Object(id) => match interp.heap.kind(*id) {
                ObjectKind::TypedArray { kind, .. } => Value::string(kind.class_name()),
                _ => Value::Undefined,
            },
            _ => Value::Undefined,
        })
    });
    if let Some(getter) = interp
        .heap
        .object(base_proto)
        .own_property(&PropertyKey::Symbol(tag))
        .and_then(|p| p.data_value().and_then(Value::as_object))
    {
        interp.heap.object_mut(base_proto).define(
            PropertyKey::Symbol(tag),
            Property::accessor(Some(getter), None, Attributes::CONFIGURABLE),
        );
    }

    interp.define_method(base_proto, "at", 1, |interp, this, args| {
        let view = this_typed(interp, &this, "at")?;
        let rel = interp.to_integer(&arg(args, 0))?;
        let index = if rel < 0.0 { view.length as f64 + rel } else { rel };
        if index < 0.0 || index >= view.length as f64 {
            return Ok(Value::Undefined);
        }
        Ok(element(interp, &view, index as usize))
    });
    interp.define_method(base_proto, "fill", 1, |interp, this, args| {
        let view = this_typed(interp, &this, "fill")?;
        let value = to_element(interp, view.kind, &arg(args, 0))?;
        let start = text::relative_index(interp.to_integer(&arg(args, 1))?, view.length);
        let end = match arg(args, 2) {
            Value::Undefined => view.length,
            v => text::relative_index(interp.to_integer(&v)?, view.length),
        };
        for i in start..end {
            interp.heap.set_typed_array_element(view.id, i, value.clone());
        }
        Ok(this)
    });
    interp.define_method(base_proto, "set", 1, |interp, this, args| {
        let view = this_typed(interp, &this, "set")?;
        let source = arg(args, 0);
        let values = match &source {
            Value::Object(id) if matches!(interp.heap.kind(*id), ObjectKind::TypedArray { .. }) => {
                let src = this_typed(interp, &source, "set")?;
                elements(interp, &src)
            }
            _ => interp.array_like_to_vec(&source)?,
        };
        let offset = to_index(interp, &arg(args, 1), "offset is out of bounds")?;
        if offset + values.len() > view.length {
            return Err(interp.range_error("offset is out of bounds"));
        }
        for (i, v) in values.iter().enumerate() {
            let e = to_element(interp, view.kind, v)?;
            interp.heap.set_typed_array_element(view.id, offset + i, e);
        }
        Ok(Value::Undefined)
    });
    interp.define_method(base_proto, "subarray", 2, |interp, this, args| {
        let view = this_typed(interp, &this, "subarray")?;
        let start = text::relative_index(interp.to_integer(&arg(args, 0))?, view.length);
        let end = match arg(args, 1) {
            Value::Undefined => view.length,
            v => text::relative_index(interp.to_integer(&v)?, view.length),
        };
        let proto = interp.prototype(view.kind.class_name());
        let offset = view.byte_offset + start * view.kind.element_size();
        Ok(Value::Object(alloc_typed(interp, view.kind, view.buffer, offset, end.saturating_sub(start), proto)))
    });
    interp.define_method(base_proto, "slice", 2, |interp, this, args| {
        let view = this_typed(interp, &this, "slice")?;
        let start = text::relative_index(interp.to_integer(&arg(args, 0))?, view.length);
        let end = match arg(args, 1) {
            Value::Undefined => view.length,
            v => text::relative_index(interp.to_integer(&v)?, view.length),
        };
        let values: Vec<Value> = (start..end.max(start)).map(|i| element(interp, &view, i)).collect();
        let proto = interp.prototype(view.kind.class_name());
        Ok(Value::Object(typed_from_values(interp, view.kind, &values, proto)?))
    });
    interp.define_method(base_proto, "reverse", 0, |interp, this, _| {
        let view = this_typed(interp, &this, "reverse")?;
        let values = elements(interp, &view);
        for (i, v) in values.into_iter().rev().enumerate() {
            let e = to_element(interp, view.kind, &v)?;
            interp.heap.set_typed_array_element(view.id, i, e);
        }
        Ok(this)
    });
    interp.define_method(base_proto, "join", 1, |interp, this, args| {
        let view = this_typed(interp, &this, "join")?;
        let sep = match arg(args, 0) {
            Value::Undefined => ",".into(),
            v => interp.to_string(&v)?,
        };
        let parts: Vec<String> = elements(interp, &view)
            .iter()
            .map(|v| interp.heap.display_string(v))
            .collect();
        Ok(Value::string(parts.join(&*sep)))
    });
    interp.define_method(base_proto, "toString", 0, |interp, this, _| interp.invoke(&this, "join", &[]));
    interp.define_method(base_proto, "indexOf", 1, |interp, this, args| {
        let view = this_typed(interp, &this, "indexOf")?;
        let needle = arg(args, 0);
        let found = elements(interp, &view).iter().position(|v| v.strict_equals(&needle));
        Ok(Value::Number(found.map(|i| i as f64).unwrap_or(-1.0)))
    });
    interp.define_method(base_proto, "includes", 1, |interp, this, args| {
        let view = this_typed(interp, &this, "includes")?;
        let needle = arg(args, 0);
        let found = elements(interp, &view)
            .iter()
            .any(|v| v.strict_equals(&needle) || (v.as_number().is_some_and(f64::is_nan) && needle.as_number().is_some_and(f64::is_nan)));
        Ok(Value::Boolean(found))
    });
    interp.define_method(base_proto, "forEach", 1, |interp, this, args| {
        let view = this_typed(interp, &this, "forEach")?;
        let callback = require_callable(interp, &arg(args, 0))?;
        for (i, v) in elements(interp, &view).into_iter().enumerate() {
            interp.call(&callback, arg(args, 1), &[v, Value::Number(i as f64), this.clone()])?;
        }
        Ok(Value::Undefined)
    });
    interp.define_method(base_proto, "map", 1, |interp, this, args| {
        let view = this_typed(interp, &this, "map")?;
        let callback = require_callable(interp, &arg(args, 0))?;
        let mut mapped = Vec::with_capacity(view.length);
        for (i, v) in elements(interp, &view).into_iter().enumerate() {
            mapped.push(interp.call(&callback, arg(args, 1), &[v, Value::Number(i as f64), this.clone()])?);
        }
        let proto = interp.prototype(view.kind.class_name());
        Ok(Value::Object(typed_from_values(interp, view.kind, &mapped, proto)?))
    });
    interp.define_method(base_proto, "reduce", 1, |interp, this, args| {
        let view = this_typed(interp, &this, "reduce")?;
        let callback = require_callable(interp, &arg(args, 0))?;
        let mut values = elements(interp, &view).into_iter().enumerate();
        let mut acc = if args.len() > 1 {
            arg(args, 1)
        } else {
            match values.next() {
                Some((_, v)) => v,
                None => return Err(interp.type_error("Reduce of empty array with no initial value")),
            }
        };
        for (i, v) in values {
            acc = interp.call(&callback, Value::Undefined, &[acc, v, Value::Number(i as f64), this.clone()])?;
        }
        Ok(acc)
    });
    for (name, kind) in [("keys", IterKind::Keys), ("entries", IterKind::Entries)] {
        interp.define_method(base_proto, name, 0, move |interp, this, _| {
            this_typed(interp, &this, name)?;
            Ok(interp.create_list_iterator(this, kind))
        });
    }
    let values = interp.define_method(base_proto, "values", 0, |interp, this, _| {
        this_typed(interp, &this, "values")?;
        Ok(interp.create_list_iterator(this, IterKind::Values))
    });
    let iterator = interp.well_known.iterator;
    interp.heap.object_mut(base_proto).define(
        PropertyKey::Symbol(iterator),
        Property::data(Value::Object(values), Attributes::BUILTIN),
    );

    for kind in TypedArrayKind::ALL {
        let name = kind.class_name();
        let proto = interp.new_prototype(name, ObjectKind::Ordinary);
        interp.heap.object_mut(proto).prototype = Some(base_proto);
        let ctor = interp.native_constructor(name, 3, proto, move |interp, _, args| construct_typed(interp, kind, args));
        interp.heap.object_mut(ctor).prototype = Some(base_ctor);
        let size = Value::Number(kind.element_size() as f64);
        define_constant(interp, ctor, "BYTES_PER_ELEMENT", size.clone());
        define_constant(interp, proto, "BYTES_PER_ELEMENT", size);
        interp.define_method(ctor, "from", 1, move |interp, _, args| {
            let mut values = interp.iterate_to_vec(&arg(args, 0))?;
            let mapper = arg(args, 1);
            if !mapper.is_undefined() {
                let mapper = require_callable(interp, &mapper)?;
                for (i, v) in values.iter_mut().enumerate() {
                    *v = interp.call(&mapper, Value::Undefined, &[v.clone(), Value::Number(i as f64)])?;
                }
            }
            let proto = interp.prototype(kind.class_name());
            Ok(Value::Object(typed_from_values(interp, kind, &values, proto)?))
        });
        interp.define_method(ctor, "of", 0, move |interp, _, args| {
            let proto = interp.prototype(kind.class_name());
            Ok(Value::Object(typed_from_values(interp, kind, args, proto)?))
        });
        define_global(interp, name, Value::Object(ctor));
    }
}

/// DataView の内部スロット。
fn this_view(interp: &mut Interpreter, this: &Value) -> JsResult<(ObjectId, usize, usize)> {
    if let Value::Object(id) = this {
        if let ObjectKind::DataView {
            buffer,
            byte_offset,
            byte_length,
        } = interp.heap.kind(*id)
        {
            return Ok((*buffer, *byte_offset, *byte_length));
        }
    }
    Err(interp.type_error("Receiver is not a DataView"))
}

/// 読み書き位置を検査し、バッファ内の開始バイトを返す。
fn view_position(interp: &mut Interpreter, this: &Value, index: &Value, size: usize) -> JsResult<(ObjectId, usize)> {
    let (buffer, byte_offset, byte_length) = this_view(interp, this)?;
    let index = to_index(interp, index, "Offset is outside the bounds of the DataView")?;
    if interp.heap.array_buffer_bytes(buffer).is_none() {
        return Err(interp.type_error("Cannot perform DataView access on a detached ArrayBuffer"));
    }
    if index + size > byte_length {
        return Err(interp.range_error("Offset is outside the bounds of the DataView"));
    }
    Ok((buffer, byte_offset + index))
}

fn install_data_view(interp: &mut Interpreter) {
    let proto = interp.new_prototype("DataView", ObjectKind::Ordinary);
    install_constructor(interp, "DataView", 1, proto, |interp, _, args| {
        require_new(interp, "DataView")?;
        let buffer = match arg(args, 0) {
            Value::Object(id) if matches!(interp.heap.kind(id), ObjectKind::ArrayBuffer(_)) => id,
            _ => return Err(interp.type_error("First argument to DataView constructor must be an ArrayBuffer")),
        };
        let total = buffer_len(interp, buffer);
        let byte_offset = to_index(interp, &arg(args, 1), "Start offset is outside the bounds of the buffer")?;
        if byte_offset > total {
            return Err(interp.range_error(format!("Start offset {} is outside the bounds of the buffer", byte_offset)));
        }
        let byte_length = match arg(args, 2) {
            Value::Undefined => total - byte_offset,
            v => {
                let len = to_index(interp, &v, "Invalid DataView length")?;
                if byte_offset + len > total {
                    return Err(interp.range_error(format!("Invalid DataView length {}", len)));
                }
                len
            }
        };
        let proto = interp.constructing_prototype("DataView");
        Ok(Value::Object(interp.heap.alloc(
            ObjectKind::DataView {
                buffer,
                byte_offset,
                byte_length,
            },
            Some(proto),
        )))
    });
    interp.define_getter(proto, "buffer", |interp, this, _| Ok(Value::Object(this_view(interp, &this)?.0)));
    interp.define_getter(proto, "byteOffset", |interp, this, _| {
        Ok(Value::Number(this_view(interp, &this)?.1 as f64))
    });
    interp.define_getter(proto, "byteLength", |interp, this, _| {
        Ok(Value::Number(this_view(interp, &this)?.2 as f64))
    });

    for kind in TypedArrayKind::ALL {
        if kind == TypedArrayKind::Uint8Clamped {
            continue;
        }
        let suffix = kind.class_name().trim_end_matches("Array");
        let size = kind.element_size();
        interp.define_method(proto, &format!("get{}", suffix), 1, move |interp, this, args| {
            let (buffer, start) = view_position(interp, &this, &arg(args, 0), size)?;
            let little = interp.to_boolean(&arg(args, 1));
            let mut raw = interp
                .heap
                .array_buffer_bytes(buffer)
                .and_then(|b| b.get(start..start + size))
                .map(<[u8]>::to_vec)
                .unwrap_or_else(|| vec![0; size]);
            if !little {
                raw.reverse();
            }
            Ok(decode_element(kind, &raw))
        });
        interp.define_method(proto, &format!("set{}", suffix), 2, move |interp, this, args| {
            let value = to_element(interp, kind, &arg(args, 1))?;
            let (buffer, start) = view_position(interp, &this, &arg(args, 0), size)?;
            let little = interp.to_boolean(&arg(args, 2));
            let mut raw = encode_element(kind, &value);
            if !little {
                raw.reverse();
            }
            if let Some(slot) = interp
                .heap
                .array_buffer_bytes_mut(buffer)
                .and_then(|b| b.get_mut(start..start + size))
            {
                slot.copy_from_slice(&raw);
            }
            Ok(Value::Undefined)
        });
    }
    let tag = interp.well_known.to_string_tag;
    interp.heap.object_mut(proto).define(
        PropertyKey::Symbol(tag),
        Property::data(Value::string("DataView"), Attributes::CONFIGURABLE),
    );
}

pub(super) fn install(interp: &mut Interpreter) {
    install_array_buffer(interp);
    install_typed_arrays(interp);
    install_data_view(interp);
}

#[cfg(test)]
mod tests {
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// 型付き配列は要素型に合わせて値を丸める。
    fn element_conversion() {
        assert_eq!(eval_display("new Uint8Array([256, -1, 1.7]).join()"), "0,255,1");
        assert_eq!(eval_display("new Int8Array([200]).join()"), "-56");
        assert_eq!(eval_display("new Uint8ClampedArray([300, -5, 1.5]).join()"), "255,0,2");
        assert_eq!(eval_display("new BigInt64Array([-1n])[0] === -1n"), "true");
    }

    #[test]
    /// 同じバッファを共有するビュー。
    fn shared_buffer() {
        assert_eq!(
            eval_display("const b = new ArrayBuffer(4); const u = new Uint8Array(b); new Uint32Array(b)[0] = 0x01020304; u.join()"),
            "4,3,2,1"
        );
        assert_eq!(eval_display("const a = new Int16Array([1, 2, 3, 4]); const s = a.subarray(1, 3); s[0] = 9; a.join()"), "1,9,3,4");
        assert_eq!(eval_display("new Float64Array(3).byteLength"), "24");
    }

    #[test]
    /// 位置の検査。
    fn range_checks() {
        assert_eq!(
            eval_display("new Int32Array(new ArrayBuffer(8), 2)"),
            "throw RangeError: start offset of Int32Array should be a multiple of 4"
        );
        assert_eq!(
            eval_display("new DataView(new ArrayBuffer(2)).getInt32(0)"),
            "throw RangeError: Offset is outside the bounds of the DataView"
        );
    }

    #[test]
    /// DataView はエンディアンを指定できる。
    fn data_view_endianness() {
        assert_eq!(
            eval_display("const v = new DataView(new ArrayBuffer(2)); v.setUint16(0, 0x1234); [v.getUint8(0), v.getUint16(0, true)].join()"),
            "18,13330"
        );
    }

    #[test]
    /// transfer は元のバッファを切り離す。
    fn transfer_detaches() {
        assert_eq!(eval_display("const a = new ArrayBuffer(3); const b = a.transfer(); [a.detached, a.byteLength, b.byteLength].join()"), "true,0,3");
    }

    #[test]
    /// 反復と静的メソッド。
    fn iteration_and_statics() {
        assert_eq!(eval_display("[...Uint8Array.from([1, 2], x => x * 2)].join()"), "2,4");
        assert_eq!(eval_display("Int8Array.of(1, 2).length"), "2");
        assert_eq!(eval_display("Object.prototype.toString.call(new Float32Array(1))"), "[object Float32Array]");
    }
}
