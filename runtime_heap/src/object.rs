// パス: runtime_heap/src/object.rs
// 役割: オブジェクト本体・プロパティ記述子・オブジェクト種別（内部スロット）を定義する
// 意図: 値の種類ごとの分岐を閉じた列挙として表現し、表示器が網羅的に扱えるようにする
// 関連ファイル: runtime_heap/src/heap.rs, runtime_heap/src/temporal.rs, runtime_heap/src/intl.rs

use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use indexmap::IndexMap;
use num_bigint::BigInt;

use crate::intl::IntlObject;
use crate::temporal::TemporalObject;
use crate::value::{ObjectId, PropertyKey, SymbolId, Value};

/// プロパティ属性のビット集合。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attributes(u8);

impl Attributes {
    pub const WRITABLE: Attributes = Attributes(0b001);
    pub const ENUMERABLE: Attributes = Attributes(0b010);
    pub const CONFIGURABLE: Attributes = Attributes(0b100);
    /// 通常の代入で作られるプロパティの既定属性。
    pub const DEFAULT: Attributes = Attributes(0b111);
    /// 組み込みメソッドの既定属性（列挙不可）。
    pub const BUILTIN: Attributes = Attributes(0b101);
    pub const NONE: Attributes = Attributes(0);

    pub fn writable(self) -> bool {
        self.0 & Self::WRITABLE.0 != 0
    }
    pub fn enumerable(self) -> bool {
        self.0 & Self::ENUMERABLE.0 != 0
    }
    pub fn configurable(self) -> bool {
        self.0 & Self::CONFIGURABLE.0 != 0
    }

    pub fn with(self, other: Attributes, on: bool) -> Attributes {
        if on {
            Attributes(self.0 | other.0)
        } else {
            Attributes(self.0 & !other.0)
        }
    }
}

impl std::ops::BitOr for Attributes {
    type Output = Attributes;
    fn bitor(self, rhs: Attributes) -> Attributes {
        Attributes(self.0 | rhs.0)
    }
}

/// データプロパティかアクセサプロパティかの区別。
#[derive(Clone, Debug)]
pub enum Slot {
    Data(Value),
    Accessor {
        getter: Option<ObjectId>,
        setter: Option<ObjectId>,
    },
}

#[derive(Clone, Debug)]
pub struct Property {
    pub slot: Slot,
    pub attributes: Attributes,
}

impl Property {
    pub fn data(value: Value, attributes: Attributes) -> Self {
        Self {
            slot: Slot::Data(value),
            attributes,
        }
    }

    pub fn accessor(
        getter: Option<ObjectId>,
        setter: Option<ObjectId>,
        attributes: Attributes,
    ) -> Self {
        Self {
            slot: Slot::Accessor { getter, setter },
            attributes,
        }
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self.slot, Slot::Accessor { .. })
    }

    pub fn data_value(&self) -> Option<&Value> {
        match &self.slot {
            Slot::Data(v) => Some(v),
            Slot::Accessor { .. } => None,
        }
    }
}

/// 関数本体の種類。表示時の型名を決める。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionKind {
    Normal,
    Generator,
    Async,
    AsyncGenerator,
}

/// 関数の実体がどこにあるか。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionCode {
    /// ホスト側のネイティブ関数テーブルの添字。
    Native(u32),
    /// インタプリタが保持するスクリプト関数（クロージャ）テーブルの添字。
    Script(u32),
}

#[derive(Clone, Debug)]
pub struct FunctionData {
    pub name: Rc<str>,
    pub kind: FunctionKind,
    pub code: FunctionCode,
    pub is_constructor: bool,
}

impl FunctionData {
    pub fn is_native(&self) -> bool {
        matches!(self.code, FunctionCode::Native(_))
    }

    /// 表示用の型名。ネイティブ関数は本体の種類によらず `NativeFunction`。
    pub fn type_name(&self) -> &'static str {
        if self.is_native() {
            return "NativeFunction";
        }
        match self.kind {
            FunctionKind::Normal => "Function",
            FunctionKind::Generator => "GeneratorFunction",
            FunctionKind::Async => "AsyncFunction",
            FunctionKind::AsyncGenerator => "AsyncGeneratorFunction",
        }
    }
}

/// 例外オブジェクトが捕捉した呼び出しフレーム。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TracebackFrame {
    pub function_name: String,
}

/// `Map` / `Set` のキー（SameValueZero で同一視する）。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MapKey {
    Undefined,
    Null,
    Boolean(bool),
    Number(u64),
    BigInt(Rc<BigInt>),
    String(Rc<str>),
    Symbol(SymbolId),
    Object(ObjectId),
}

impl MapKey {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Empty | Value::Undefined => MapKey::Undefined,
            Value::Null => MapKey::Null,
            Value::Boolean(b) => MapKey::Boolean(*b),
            Value::Number(n) => {
                let normalized = if n.is_nan() {
                    f64::NAN
                } else if *n == 0.0 {
                    0.0
                } else {
                    *n
                };
                MapKey::Number(normalized.to_bits())
            }
            Value::BigInt(b) => MapKey::BigInt(b.clone()),
            Value::String(s) => MapKey::String(s.clone()),
            Value::Symbol(s) => MapKey::Symbol(*s),
            Value::Object(o) => MapKey::Object(*o),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Rejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReactionKind {
    Fulfill,
    Reject,
}

/// `then` で登録されたハンドラと派生 Promise。
#[derive(Clone, Debug)]
pub struct PromiseReaction {
    pub kind: ReactionKind,
    pub handler: Value,
    pub derived: Option<ObjectId>,
}

#[derive(Clone, Debug)]
pub struct PromiseData {
    pub state: PromiseState,
    pub result: Value,
    pub fulfill_reactions: Vec<PromiseReaction>,
    pub reject_reactions: Vec<PromiseReaction>,
    pub is_handled: bool,
}

impl PromiseData {
    pub fn pending() -> Self {
        Self {
            state: PromiseState::Pending,
            result: Value::Undefined,
            fulfill_reactions: Vec::new(),
            reject_reactions: Vec::new(),
            is_handled: false,
        }
    }
}

/// 固定幅の型付き配列の要素型。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypedArrayKind {
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
    BigInt64,
    BigUint64,
}

impl TypedArrayKind {
    pub const ALL: [TypedArrayKind; 11] = [
        TypedArrayKind::Int8,
        TypedArrayKind::Uint8,
        TypedArrayKind::Uint8Clamped,
        TypedArrayKind::Int16,
        TypedArrayKind::Uint16,
        TypedArrayKind::Int32,
        TypedArrayKind::Uint32,
        TypedArrayKind::Float32,
        TypedArrayKind::Float64,
        TypedArrayKind::BigInt64,
        TypedArrayKind::BigUint64,
    ];

    pub fn class_name(self) -> &'static str {
        match self {
            TypedArrayKind::Int8 => "Int8Array",
            TypedArrayKind::Uint8 => "Uint8Array",
            TypedArrayKind::Uint8Clamped => "Uint8ClampedArray",
            TypedArrayKind::Int16 => "Int16Array",
            TypedArrayKind::Uint16 => "Uint16Array",
            TypedArrayKind::Int32 => "Int32Array",
            TypedArrayKind::Uint32 => "Uint32Array",
            TypedArrayKind::Float32 => "Float32Array",
            TypedArrayKind::Float64 => "Float64Array",
            TypedArrayKind::BigInt64 => "BigInt64Array",
            TypedArrayKind::BigUint64 => "BigUint64Array",
        }
    }

    pub fn element_size(self) -> usize {
        match self {
            TypedArrayKind::Int8 | TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => 1,
            TypedArrayKind::Int16 | TypedArrayKind::Uint16 => 2,
            TypedArrayKind::Int32 | TypedArrayKind::Uint32 | TypedArrayKind::Float32 => 4,
            TypedArrayKind::Float64 | TypedArrayKind::BigInt64 | TypedArrayKind::BigUint64 => 8,
        }
    }

    pub fn is_bigint(self) -> bool {
        matches!(self, TypedArrayKind::BigInt64 | TypedArrayKind::BigUint64)
    }
}

/// オブジェクトの内部スロット。表示器の分岐はこの列挙に従う。
#[derive(Clone, Debug)]
pub enum ObjectKind {
    Ordinary,
    Array {
        length: u32,
    },
    Function(FunctionData),
    BoundFunction {
        target: ObjectId,
        bound_this: Value,
        bound_args: Vec<Value>,
    },
    Date(f64),
    Error {
        traceback: Vec<TracebackFrame>,
    },
    RegExp {
        source: Rc<str>,
        flags: Rc<str>,
    },
    Map(IndexMap<MapKey, (Value, Value)>),
    Set(IndexMap<MapKey, Value>),
    WeakMap(HashMap<ObjectId, Value>),
    WeakSet(HashSet<ObjectId>),
    WeakRef(Option<ObjectId>),
    DataView {
        buffer: ObjectId,
        byte_offset: usize,
        byte_length: usize,
    },
    Proxy {
        target: ObjectId,
        handler: ObjectId,
    },
    Promise(PromiseData),
    /// `None` は切り離し（detached）済みのバッファ。
    ArrayBuffer(Option<Vec<u8>>),
    ShadowRealm,
    Generator,
    AsyncGenerator,
    TypedArray {
        kind: TypedArrayKind,
        buffer: ObjectId,
        byte_offset: usize,
        length: usize,
    },
    BooleanObject(bool),
    NumberObject(f64),
    StringObject(Rc<str>),
    Temporal(TemporalObject),
    Intl(IntlObject),
}

impl ObjectKind {
    /// `Object.prototype.toString` などで使うクラス名。
    pub fn class_name(&self) -> &'static str {
        match self {
            ObjectKind::Ordinary => "Object",
            ObjectKind::Array { .. } => "Array",
            ObjectKind::Function(_) => "Function",
            ObjectKind::BoundFunction { .. } => "BoundFunction",
            ObjectKind::Date(_) => "Date",
            ObjectKind::Error { .. } => "Error",
            ObjectKind::RegExp { .. } => "RegExp",
            ObjectKind::Map(_) => "Map",
            ObjectKind::Set(_) => "Set",
            ObjectKind::WeakMap(_) => "WeakMap",
            ObjectKind::WeakSet(_) => "WeakSet",
            ObjectKind::WeakRef(_) => "WeakRef",
            ObjectKind::DataView { .. } => "DataView",
            ObjectKind::Proxy { .. } => "Proxy",
            ObjectKind::Promise(_) => "Promise",
            ObjectKind::ArrayBuffer(_) => "ArrayBuffer",
            ObjectKind::ShadowRealm => "ShadowRealm",
            ObjectKind::Generator => "Generator",
            ObjectKind::AsyncGenerator => "AsyncGenerator",
            ObjectKind::TypedArray { kind, .. } => kind.class_name(),
            ObjectKind::BooleanObject(_) => "Boolean",
            ObjectKind::NumberObject(_) => "Number",
            ObjectKind::StringObject(_) => "String",
            ObjectKind::Temporal(t) => t.class_name(),
            ObjectKind::Intl(i) => i.class_name(),
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            ObjectKind::Function(_) | ObjectKind::BoundFunction { .. }
        )
    }
}

/// ヒープに格納されるオブジェクト本体。
#[derive(Clone, Debug)]
pub struct Object {
    pub prototype: Option<ObjectId>,
    pub kind: ObjectKind,
    pub extensible: bool,
    indexed: BTreeMap<u32, Property>,
    named: IndexMap<PropertyKey, Property>,
}

impl Object {
    pub fn new(kind: ObjectKind, prototype: Option<ObjectId>) -> Self {
        Self {
            prototype,
            kind,
            extensible: true,
            indexed: BTreeMap::new(),
            named: IndexMap::new(),
        }
    }

    /// 自身のプロパティを取得する（アクセサは呼び出さない）。
    pub fn own_property(&self, key: &PropertyKey) -> Option<&Property> {
        match key.as_index() {
            Some(idx) => self.indexed.get(&idx),
            None => self.named.get(key),
        }
    }

    pub fn own_property_mut(&mut self, key: &PropertyKey) -> Option<&mut Property> {
        match key.as_index() {
            Some(idx) => self.indexed.get_mut(&idx),
            None => self.named.get_mut(key),
        }
    }

    pub fn indexed_property(&self, index: u32) -> Option<&Property> {
        self.indexed.get(&index)
    }

    /// プロパティを定義（上書き）する。配列の長さは必要に応じて伸長する。
    pub fn define(&mut self, key: PropertyKey, property: Property) {
        match key.as_index() {
            Some(idx) => {
                if let ObjectKind::Array { length } = &mut self.kind {
                    if idx >= *length {
                        *length = idx + 1;
                    }
                }
                self.indexed.insert(idx, property);
            }
            None => {
                self.named.insert(key, property);
            }
        }
    }

    pub fn define_index(&mut self, index: u32, property: Property) {
        if let ObjectKind::Array { length } = &mut self.kind {
            if index >= *length {
                *length = index + 1;
            }
        }
        self.indexed.insert(index, property);
    }

    /// プロパティを削除する。挿入順は保たれる。
    pub fn remove(&mut self, key: &PropertyKey) -> Option<Property> {
        match key.as_index() {
            Some(idx) => self.indexed.remove(&idx),
            None => self.named.shift_remove(key),
        }
    }

    /// 添字付きエントリを昇順で返す。
    pub fn indexed_entries(&self) -> impl Iterator<Item = (u32, &Property)> {
        self.indexed.iter().map(|(k, v)| (*k, v))
    }

    /// 名前付きエントリを定義順で返す。
    pub fn named_entries(&self) -> impl Iterator<Item = (&PropertyKey, &Property)> {
        self.named.iter()
    }

    pub fn indexed_len(&self) -> usize {
        self.indexed.len()
    }

    pub fn named_len(&self) -> usize {
        self.named.len()
    }

    /// 配列長を縮めたときに範囲外の添字を捨てる。
    pub fn truncate_indexed(&mut self, new_length: u32) {
        let _ = self.indexed.split_off(&new_length);
        if let ObjectKind::Array { length } = &mut self.kind {
            *length = new_length;
        }
    }

    /// 自身のキーを「添字昇順 → 名前の定義順」で返す。
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let mut keys: Vec<PropertyKey> = self
            .indexed
            .keys()
            .map(|k| PropertyKey::String(Rc::from(k.to_string())))
            .collect();
        keys.extend(self.named.keys().cloned());
        keys
    }
}
