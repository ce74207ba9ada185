// パス: runtime_heap/src/value.rs
// 役割: スクリプト値 `Value` とプロパティキー、数値の正準文字列化を定義する
// 意図: インタプリタ・表示器・補完器が同じ値表現を共有できるようにする
// 関連ファイル: runtime_heap/src/object.rs, runtime_heap/src/heap.rs

use std::fmt;
use std::rc::Rc;

use num_bigint::BigInt;

/// ヒープ上のオブジェクトを指す不透明なハンドル。
///
/// 同一性の比較（表示時の既出判定など）はこのハンドルの等値性で行う。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u32);

impl ObjectId {
    /// アリーナ内のインデックスを返す。
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 実アドレスは存在しないため、アリーナ位置からそれらしい識別子を作る
        write!(f, "0x{:012x}", 0x1000_0000_u64 + (self.0 as u64) * 0x40)
    }
}

/// シンボル値の識別子。説明文字列はヒープ側で保持する。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub(crate) u32);

/// ランタイムが扱うすべての値。
#[derive(Clone, Debug)]
pub enum Value {
    /// 未初期化スロットを表す番兵。ユーザーコードからは観測されない。
    Empty,
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    BigInt(Rc<BigInt>),
    String(Rc<str>),
    Symbol(SymbolId),
    Object(ObjectId),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn bigint(n: BigInt) -> Self {
        Value::BigInt(Rc::new(n))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// 値が -0 かどうか。表示時に符号を明示するために使う。
    pub fn is_negative_zero(&self) -> bool {
        matches!(self, Value::Number(n) if *n == 0.0 && n.is_sign_negative())
    }

    /// `typeof` 演算子が返す型名（関数判定はヒープが必要なため呼び出し側で補正する）。
    pub fn primitive_type_name(&self) -> &'static str {
        match self {
            Value::Empty | Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Object(_) => "object",
        }
    }

    /// SameValue 比較（`Object.is` 相当）。
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    return true;
                }
                a == b && a.is_sign_negative() == b.is_sign_negative()
            }
            _ => self.strict_equals(other),
        }
    }

    /// 厳密等価（`===`）。
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Empty, Value::Empty) => true,
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Object(id)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

/// オブジェクトの名前付きプロパティキー。
///
/// 配列インデックスに相当する文字列は `Object` 側で添字ストレージへ振り分ける。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(Rc<str>),
    Symbol(SymbolId),
}

impl PropertyKey {
    pub fn string(s: impl AsRef<str>) -> Self {
        PropertyKey::String(Rc::from(s.as_ref()))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, PropertyKey::String(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyKey::String(s) => Some(s),
            PropertyKey::Symbol(_) => None,
        }
    }

    /// 正準的な配列インデックス（"0", "1", ... 2^32-2）であれば数値を返す。
    pub fn as_index(&self) -> Option<u32> {
        match self {
            PropertyKey::String(s) => canonical_index(s),
            PropertyKey::Symbol(_) => None,
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::string(s)
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        PropertyKey::String(Rc::from(s))
    }
}

/// 文字列が配列インデックスの正準表現なら値を返す。
pub fn canonical_index(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > 10 {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u64 = s.parse().ok()?;
    if n >= u32::MAX as u64 {
        return None;
    }
    Some(n as u32)
}

/// Number 値を ECMAScript の Number::toString 規則で文字列化する。
pub fn number_to_string(x: f64) -> String {
    if x.is_nan() {
        return "NaN".into();
    }
    if x == 0.0 {
        return "0".into();
    }
    if x.is_infinite() {
        return if x > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }
    if x < 0.0 {
        return format!("-{}", number_to_string(-x));
    }
    // `{:e}` は往復可能な最短桁を指数表記で返す
    let sci = format!("{:e}", x);
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let n = exponent + 1;

    if k <= n && n <= 21 {
        let mut out = digits;
        out.push_str(&"0".repeat((n - k) as usize));
        out
    } else if 0 < n && n <= 21 {
        let (int_part, frac_part) = digits.split_at(n as usize);
        format!("{}.{}", int_part, frac_part)
    } else if -6 < n && n <= 0 {
        format!("0.{}{}", "0".repeat((-n) as usize), digits)
    } else {
        let e = n - 1;
        let sign = if e >= 0 { '+' } else { '-' };
        if k == 1 {
            format!("{}e{}{}", digits, sign, e.abs())
        } else {
            format!("{}.{}e{}{}", &digits[..1], &digits[1..], sign, e.abs())
        }
    }
}

/// 基数付きの数値文字列化（`Number.prototype.toString(radix)`）。
pub fn number_to_string_radix(x: f64, radix: u32) -> String {
    if radix == 10 || !x.is_finite() {
        return number_to_string(x);
    }
    let negative = x < 0.0;
    let mut value = x.abs();
    let mut int_part = value.trunc();
    value -= int_part;

    let mut int_digits = Vec::new();
    if int_part == 0.0 {
        int_digits.push('0');
    }
    while int_part >= 1.0 {
        let digit = (int_part % radix as f64) as u32;
        int_digits.push(std::char::from_digit(digit, radix).unwrap_or('0'));
        int_part = (int_part / radix as f64).trunc();
    }
    int_digits.reverse();

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.extend(int_digits);
    if value > 0.0 {
        out.push('.');
        // 小数部は 52 桁で打ち切る（それ以上は f64 の精度を超える）
        for _ in 0..52 {
            value *= radix as f64;
            let digit = value.trunc() as u32;
            out.push(std::char::from_digit(digit, radix).unwrap_or('0'));
            value -= digit as f64;
            if value == 0.0 {
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// 整数・小数・指数表記の境界で JS と同じ文字列になるか確認する。
    fn number_to_string_matches_script_rules() {
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(1.5), "1.5");
        assert_eq!(number_to_string(0.1), "0.1");
        assert_eq!(number_to_string(123456789.0), "123456789");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(1.5e-7), "1.5e-7");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    /// 基数指定の文字列化が代表値で一致するか検証する。
    fn number_to_string_radix_basic() {
        assert_eq!(number_to_string_radix(255.0, 16), "ff");
        assert_eq!(number_to_string_radix(-8.0, 2), "-1000");
        assert_eq!(number_to_string_radix(0.5, 2), "0.1");
    }

    #[test]
    /// 配列インデックスの正準表現のみが添字として扱われることを確かめる。
    fn canonical_index_rejects_non_canonical() {
        assert_eq!(canonical_index("0"), Some(0));
        assert_eq!(canonical_index("42"), Some(42));
        assert_eq!(canonical_index("01"), None);
        assert_eq!(canonical_index("-1"), None);
        assert_eq!(canonical_index("4294967295"), None);
        assert_eq!(canonical_index("x"), None);
    }

    #[test]
    /// SameValue が NaN と符号付きゼロを区別することを確認する。
    fn same_value_distinguishes_zero_sign() {
        assert!(Value::Number(f64::NAN).same_value(&Value::Number(f64::NAN)));
        assert!(!Value::Number(0.0).same_value(&Value::Number(-0.0)));
        assert!(Value::Number(0.0).strict_equals(&Value::Number(-0.0)));
        assert!(Value::Number(-0.0).is_negative_zero());
    }
}
