// パス: runtime_heap/tests/heap.rs
// 役割: ヒープの副作用なし読み出しとプロトタイプ探索を検証する
// 意図: 表示器・補完器が前提とする読み出し規則を固定する
// 関連ファイル: runtime_heap/src/heap.rs, runtime_heap/src/object.rs

use runtime_heap::{
    Attributes, ElementValue, Heap, ObjectKind, Property, PropertyKey, ReadError, TypedArrayKind,
    Value,
};

fn define(heap: &mut Heap, id: runtime_heap::ObjectId, key: &str, value: Value) {
    heap.object_mut(id)
        .define(PropertyKey::from(key), Property::data(value, Attributes::DEFAULT));
}

#[test]
/// 自身にないプロパティはプロトタイプ鎖から読まれる。
fn reads_follow_prototype_chain() {
    let mut heap = Heap::new();
    let proto = heap.alloc_ordinary();
    define(&mut heap, proto, "inherited", Value::Number(1.0));
    let obj = heap.alloc(ObjectKind::Ordinary, Some(proto));
    define(&mut heap, obj, "own", Value::Number(2.0));

    let own = heap
        .get_without_side_effects(obj, &PropertyKey::from("own"))
        .unwrap();
    let inherited = heap
        .get_without_side_effects(obj, &PropertyKey::from("inherited"))
        .unwrap();
    let missing = heap
        .get_without_side_effects(obj, &PropertyKey::from("missing"))
        .unwrap();
    assert!(matches!(own, Some(Value::Number(n)) if n == 2.0));
    assert!(matches!(inherited, Some(Value::Number(n)) if n == 1.0));
    assert!(missing.is_none());
}

#[test]
/// アクセサに当たった読み出しはエラーになり、ゲッターは呼ばれない。
fn accessor_reads_are_refused() {
    let mut heap = Heap::new();
    let obj = heap.alloc_ordinary();
    heap.object_mut(obj).define(
        PropertyKey::from("x"),
        Property::accessor(None, None, Attributes::DEFAULT),
    );
    let err = heap
        .get_without_side_effects(obj, &PropertyKey::from("x"))
        .unwrap_err();
    assert_eq!(err, ReadError::Accessor("x".into()));
}

#[test]
/// プロキシを経由する読み出しは拒否される。
fn proxy_reads_are_refused() {
    let mut heap = Heap::new();
    let target = heap.alloc_ordinary();
    let handler = heap.alloc_ordinary();
    let proxy = heap.alloc(ObjectKind::Proxy { target, handler }, None);
    let err = heap
        .get_without_side_effects(proxy, &PropertyKey::from("a"))
        .unwrap_err();
    assert_eq!(err, ReadError::Proxy);
}

#[test]
/// 循環したプロトタイプ鎖でも探索が停止する。
fn cyclic_prototype_chain_terminates() {
    let mut heap = Heap::new();
    let a = heap.alloc(ObjectKind::Ordinary, None);
    let b = heap.alloc(ObjectKind::Ordinary, Some(a));
    heap.object_mut(a).prototype = Some(b);
    let result = heap
        .get_without_side_effects(a, &PropertyKey::from("nothing"))
        .unwrap();
    assert!(result.is_none());
}

#[test]
/// 配列の穴は undefined として読まれ、length は内部スロットから得られる。
fn array_holes_read_as_undefined() {
    let mut heap = Heap::new();
    let arr = heap.alloc(ObjectKind::Array { length: 0 }, None);
    heap.object_mut(arr)
        .define_index(2, Property::data(Value::Number(7.0), Attributes::DEFAULT));
    assert!(matches!(
        heap.element_without_side_effects(arr, 0).unwrap(),
        Value::Undefined
    ));
    assert!(matches!(
        heap.get_without_side_effects(arr, &PropertyKey::from("length")).unwrap(),
        Some(Value::Number(n)) if n == 3.0
    ));
}

#[test]
/// 型付き配列はリトルエンディアンでバッファへ読み書きする。
fn typed_array_elements_are_little_endian() {
    let mut heap = Heap::new();
    let buffer = heap.alloc(ObjectKind::ArrayBuffer(Some(vec![0; 8])), None);
    let view = heap.alloc(
        ObjectKind::TypedArray {
            kind: TypedArrayKind::Uint16,
            buffer,
            byte_offset: 0,
            length: 4,
        },
        None,
    );
    heap.set_typed_array_element(view, 1, ElementValue::Number(258.0));
    heap.set_typed_array_element(view, 2, ElementValue::Number(-1.0));
    assert_eq!(
        heap.array_buffer_bytes(buffer).unwrap(),
        &[0, 0, 2, 1, 0xff, 0xff, 0, 0]
    );
    assert!(matches!(
        heap.typed_array_element(view, 1).unwrap(),
        Some(Value::Number(n)) if n == 258.0
    ));
    assert!(heap.typed_array_element(view, 9).unwrap().is_none());
}

#[test]
/// 切り離し済みバッファの要素は読めない。
fn detached_buffer_reports_error() {
    let mut heap = Heap::new();
    let buffer = heap.alloc(ObjectKind::ArrayBuffer(None), None);
    let view = heap.alloc(
        ObjectKind::TypedArray {
            kind: TypedArrayKind::Uint8,
            buffer,
            byte_offset: 0,
            length: 1,
        },
        None,
    );
    assert_eq!(
        heap.typed_array_element(view, 0).unwrap_err(),
        ReadError::Detached
    );
}

#[test]
/// 副作用なし文字列化はオブジェクトをクラス名で表す。
fn display_string_uses_class_name() {
    let mut heap = Heap::new();
    let arr = heap.alloc(ObjectKind::Array { length: 0 }, None);
    let sym = heap.new_symbol(Some("tag"));
    assert_eq!(heap.display_string(&Value::Object(arr)), "[object Array]");
    assert_eq!(heap.display_string(&Value::Symbol(sym)), "Symbol(tag)");
    assert_eq!(heap.display_string(&Value::Number(0.5)), "0.5");
}
