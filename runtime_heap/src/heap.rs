// パス: runtime_heap/src/heap.rs
// 役割: オブジェクトを保持するアリーナと、副作用なしの読み出し・プロトタイプ探索を提供する
// 意図: インタプリタ以外（表示器・補完器）が安全にオブジェクトグラフを観察できるようにする
// 関連ファイル: runtime_heap/src/object.rs, runtime_heap/src/value.rs, runtime_heap/src/error.rs

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::error::ReadError;
use crate::object::{Object, ObjectKind, Property, Slot, TypedArrayKind};
use crate::value::{number_to_string, ObjectId, PropertyKey, SymbolId, Value};

/// 実行環境の既知オブジェクト（組み込みプロトタイプ）。
#[derive(Clone, Debug)]
pub struct Intrinsics {
    pub object_prototype: ObjectId,
    pub function_prototype: ObjectId,
    pub error_prototype: ObjectId,
    named: HashMap<&'static str, ObjectId>,
}

impl Intrinsics {
    /// 名前で登録済みのプロトタイプを引く（例: "Array", "Temporal.PlainDate"）。
    pub fn prototype(&self, name: &str) -> Option<ObjectId> {
        self.named.get(name).copied()
    }
}

/// 型付き配列へ書き込む値（数値か BigInt のどちらか）。
#[derive(Clone, Debug)]
pub enum ElementValue {
    Number(f64),
    BigInt(BigInt),
}

#[derive(Debug)]
pub struct Heap {
    objects: Vec<Object>,
    symbols: Vec<Option<Rc<str>>>,
    intrinsics: Intrinsics,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    /// 基本プロトタイプ（Object / Function / Error）を確保した空のヒープを作る。
    pub fn new() -> Self {
        let mut objects = Vec::new();
        objects.push(Object::new(ObjectKind::Ordinary, None));
        let object_prototype = ObjectId(0);
        objects.push(Object::new(
            ObjectKind::Function(crate::object::FunctionData {
                name: Rc::from(""),
                kind: crate::object::FunctionKind::Normal,
                code: crate::object::FunctionCode::Native(u32::MAX),
                is_constructor: false,
            }),
            Some(object_prototype),
        ));
        let function_prototype = ObjectId(1);
        objects.push(Object::new(ObjectKind::Ordinary, Some(object_prototype)));
        let error_prototype = ObjectId(2);
        let mut named = HashMap::new();
        named.insert("Object", object_prototype);
        named.insert("Function", function_prototype);
        named.insert("Error", error_prototype);
        Self {
            objects,
            symbols: Vec::new(),
            intrinsics: Intrinsics {
                object_prototype,
                function_prototype,
                error_prototype,
                named,
            },
        }
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    /// 組み込みプロトタイプを名前付きで登録する。
    pub fn register_prototype(&mut self, name: &'static str, id: ObjectId) {
        self.intrinsics.named.insert(name, id);
    }

    /// 新しいオブジェクトを確保する。
    pub fn alloc(&mut self, kind: ObjectKind, prototype: Option<ObjectId>) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(Object::new(kind, prototype));
        id
    }

    /// `Object.prototype` を持つ通常オブジェクトを確保する。
    pub fn alloc_ordinary(&mut self) -> ObjectId {
        let proto = self.intrinsics.object_prototype;
        self.alloc(ObjectKind::Ordinary, Some(proto))
    }

    pub fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id.index()]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut Object {
        &mut self.objects[id.index()]
    }

    pub fn kind(&self, id: ObjectId) -> &ObjectKind {
        &self.objects[id.index()].kind
    }

    pub fn prototype_of(&self, id: ObjectId) -> Option<ObjectId> {
        self.objects[id.index()].prototype
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn new_symbol(&mut self, description: Option<&str>) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(description.map(Rc::from));
        id
    }

    pub fn symbol_description(&self, id: SymbolId) -> Option<&str> {
        self.symbols
            .get(id.0 as usize)
            .and_then(|d| d.as_ref())
            .map(|d| d.as_ref())
    }

    pub fn is_callable(&self, value: &Value) -> bool {
        match value {
            Value::Object(id) => self.kind(*id).is_callable(),
            _ => false,
        }
    }

    /// プロトタイプ鎖を辿ってプロパティを探す。循環した鎖でも停止する。
    pub fn lookup_property(&self, id: ObjectId, key: &PropertyKey) -> Option<(ObjectId, &Property)> {
        let mut visited = HashSet::new();
        let mut current = Some(id);
        while let Some(obj_id) = current {
            if !visited.insert(obj_id) {
                break;
            }
            let object = self.object(obj_id);
            if let Some(prop) = object.own_property(key) {
                return Some((obj_id, prop));
            }
            current = object.prototype;
        }
        None
    }

    /// 副作用なしでプロパティを読む。
    ///
    /// - 見つからなければ `Ok(None)`
    /// - アクセサに当たった、あるいはプロキシを経由する場合は `Err`
    pub fn get_without_side_effects(
        &self,
        id: ObjectId,
        key: &PropertyKey,
    ) -> Result<Option<Value>, ReadError> {
        let mut visited = HashSet::new();
        let mut current = Some(id);
        while let Some(obj_id) = current {
            if !visited.insert(obj_id) {
                break;
            }
            let object = self.object(obj_id);
            if let ObjectKind::Proxy { .. } = object.kind {
                return Err(ReadError::Proxy);
            }
            if let Some(value) = self.exotic_own_value(obj_id, key)? {
                return Ok(Some(value));
            }
            if let Some(prop) = object.own_property(key) {
                return match &prop.slot {
                    Slot::Data(v) => Ok(Some(v.clone())),
                    Slot::Accessor { .. } => Err(ReadError::Accessor(self.key_display(key))),
                };
            }
            current = object.prototype;
        }
        Ok(None)
    }

    /// 添字アクセスを副作用なしで行う。穴は `undefined` として返す。
    pub fn element_without_side_effects(
        &self,
        id: ObjectId,
        index: u32,
    ) -> Result<Value, ReadError> {
        let key = PropertyKey::String(Rc::from(index.to_string()));
        Ok(self
            .get_without_side_effects(id, &key)?
            .unwrap_or(Value::Undefined))
    }

    /// 内部スロットから直接導かれる自身のプロパティ（配列長・文字列ラッパの添字など）。
    pub fn exotic_own_value(&self, id: ObjectId, key: &PropertyKey) -> Result<Option<Value>, ReadError> {
        match &self.object(id).kind {
            ObjectKind::Array { length } => {
                if key.as_str() == Some("length") {
                    return Ok(Some(Value::Number(*length as f64)));
                }
            }
            ObjectKind::StringObject(s) => {
                if key.as_str() == Some("length") {
                    return Ok(Some(Value::Number(s.encode_utf16().count() as f64)));
                }
                if let Some(idx) = key.as_index() {
                    let units: Vec<u16> = s.encode_utf16().collect();
                    if let Some(unit) = units.get(idx as usize) {
                        return Ok(Some(Value::string(String::from_utf16_lossy(&[*unit]))));
                    }
                }
            }
            ObjectKind::TypedArray { .. } => {
                if let Some(idx) = key.as_index() {
                    return match self.typed_array_element(id, idx as usize) {
                        Ok(v) => Ok(v),
                        Err(ReadError::Detached) => Ok(None),
                        Err(e) => Err(e),
                    };
                }
            }
            _ => {}
        }
        Ok(None)
    }

    /// 自身の文字列キーを列挙順（添字 → 名前の定義順）で返す。
    pub fn own_string_keys(&self, id: ObjectId) -> Vec<Rc<str>> {
        self.object(id)
            .own_keys()
            .into_iter()
            .filter_map(|k| match k {
                PropertyKey::String(s) => Some(s),
                PropertyKey::Symbol(_) => None,
            })
            .collect()
    }

    /// ArrayBuffer のバイト列。切り離し済みなら `None`。
    pub fn array_buffer_bytes(&self, id: ObjectId) -> Option<&[u8]> {
        match &self.object(id).kind {
            ObjectKind::ArrayBuffer(Some(bytes)) => Some(bytes.as_slice()),
            _ => None,
        }
    }

    pub fn array_buffer_bytes_mut(&mut self, id: ObjectId) -> Option<&mut Vec<u8>> {
        match &mut self.object_mut(id).kind {
            ObjectKind::ArrayBuffer(Some(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// 型付き配列の要素を読む。範囲外なら `Ok(None)`。
    pub fn typed_array_element(&self, id: ObjectId, index: usize) -> Result<Option<Value>, ReadError> {
        let ObjectKind::TypedArray {
            kind,
            buffer,
            byte_offset,
            length,
        } = &self.object(id).kind
        else {
            return Ok(None);
        };
        if index >= *length {
            return Ok(None);
        }
        let bytes = self.array_buffer_bytes(*buffer).ok_or(ReadError::Detached)?;
        let size = kind.element_size();
        let start = byte_offset + index * size;
        let Some(raw) = bytes.get(start..start + size) else {
            return Ok(None);
        };
        Ok(Some(decode_element(*kind, raw)))
    }

    /// 型付き配列の要素へ書き込む（範囲外・切り離し済みは無視）。
    pub fn set_typed_array_element(&mut self, id: ObjectId, index: usize, value: ElementValue) {
        let (kind, buffer, byte_offset, length) = match &self.object(id).kind {
            ObjectKind::TypedArray {
                kind,
                buffer,
                byte_offset,
                length,
            } => (*kind, *buffer, *byte_offset, *length),
            _ => return,
        };
        if index >= length {
            return;
        }
        let encoded = encode_element(kind, &value);
        let start = byte_offset + index * kind.element_size();
        if let Some(bytes) = self.array_buffer_bytes_mut(buffer) {
            if let Some(slot) = bytes.get_mut(start..start + encoded.len()) {
                slot.copy_from_slice(&encoded);
            }
        }
    }

    /// プロパティキーを表示用文字列にする。
    pub fn key_display(&self, key: &PropertyKey) -> String {
        match key {
            PropertyKey::String(s) => s.to_string(),
            PropertyKey::Symbol(id) => self.symbol_display(*id),
        }
    }

    fn symbol_display(&self, id: SymbolId) -> String {
        format!("Symbol({})", self.symbol_description(id).unwrap_or(""))
    }

    /// ゲッターや `toString` を呼ばずに値を文字列化する。
    pub fn display_string(&self, value: &Value) -> String {
        match value {
            Value::Empty => "<empty>".into(),
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::BigInt(b) => b.to_string(),
            Value::String(s) => s.to_string(),
            Value::Symbol(id) => self.symbol_display(*id),
            Value::Object(id) => format!("[object {}]", self.kind(*id).class_name()),
        }
    }
}

/// リトルエンディアンのバイト列を要素値へ戻す。
pub fn decode_element(kind: TypedArrayKind, raw: &[u8]) -> Value {
    let mut buf = [0u8; 8];
    buf[..raw.len()].copy_from_slice(raw);
    match kind {
        TypedArrayKind::Int8 => Value::Number(raw[0] as i8 as f64),
        TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => Value::Number(raw[0] as f64),
        TypedArrayKind::Int16 => Value::Number(i16::from_le_bytes([buf[0], buf[1]]) as f64),
        TypedArrayKind::Uint16 => Value::Number(u16::from_le_bytes([buf[0], buf[1]]) as f64),
        TypedArrayKind::Int32 => {
            Value::Number(i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64)
        }
        TypedArrayKind::Uint32 => {
            Value::Number(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64)
        }
        TypedArrayKind::Float32 => {
            Value::Number(f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64)
        }
        TypedArrayKind::Float64 => Value::Number(f64::from_le_bytes(buf)),
        TypedArrayKind::BigInt64 => Value::bigint(BigInt::from(i64::from_le_bytes(buf))),
        TypedArrayKind::BigUint64 => Value::bigint(BigInt::from(u64::from_le_bytes(buf))),
    }
}

/// 数値を 2^bits を法とする整数へ丸める（ToInt8 / ToUint32 などの共通部分）。
fn wrap_to_bits(x: f64, bits: i32) -> u64 {
    if !x.is_finite() {
        return 0;
    }
    let modulus = 2f64.powi(bits);
    x.trunc().rem_euclid(modulus) as u64
}

/// 要素値をリトルエンディアンのバイト列にする。
pub fn encode_element(kind: TypedArrayKind, value: &ElementValue) -> Vec<u8> {
    let number = match value {
        ElementValue::Number(n) => *n,
        ElementValue::BigInt(b) => b.to_f64().unwrap_or(0.0),
    };
    match kind {
        TypedArrayKind::Int8 | TypedArrayKind::Uint8 => vec![wrap_to_bits(number, 8) as u8],
        TypedArrayKind::Uint8Clamped => {
            let clamped = if number.is_nan() {
                0.0
            } else {
                number.clamp(0.0, 255.0)
            };
            // 偶数丸め
            let rounded = {
                let f = clamped.floor();
                let diff = clamped - f;
                if diff > 0.5 || (diff == 0.5 && f % 2.0 != 0.0) {
                    f + 1.0
                } else {
                    f
                }
            };
            vec![rounded as u8]
        }
        TypedArrayKind::Int16 | TypedArrayKind::Uint16 => {
            (wrap_to_bits(number, 16) as u16).to_le_bytes().to_vec()
        }
        TypedArrayKind::Int32 | TypedArrayKind::Uint32 => {
            (wrap_to_bits(number, 32) as u32).to_le_bytes().to_vec()
        }
        TypedArrayKind::Float32 => (number as f32).to_le_bytes().to_vec(),
        TypedArrayKind::Float64 => number.to_le_bytes().to_vec(),
        TypedArrayKind::BigInt64 | TypedArrayKind::BigUint64 => {
            let big = match value {
                ElementValue::BigInt(b) => b.clone(),
                ElementValue::Number(n) => BigInt::from(*n as i64),
            };
            let modulus = BigInt::from(1u8) << 64;
            let wrapped: BigInt = ((big % &modulus) + &modulus) % &modulus;
            wrapped.to_u64().unwrap_or(0).to_le_bytes().to_vec()
        }
    }
}
