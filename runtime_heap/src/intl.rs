// パス: runtime_heap/src/intl.rs
// 役割: Intl 系フォーマッタの解決済みオプションを保持する内部スロットを定義する
// 意図: 「未設定」を Option の None で表し、表示器がフィールドを省略できるようにする
// 関連ファイル: runtime_heap/src/object.rs, src/repl/printer/intl.rs

use crate::value::ObjectId;

#[derive(Clone, Debug, Default)]
pub struct DisplayNamesSlots {
    pub locale: String,
    pub type_: String,
    pub style: String,
    pub fallback: String,
    pub language_display: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LocaleSlots {
    pub locale: String,
    pub calendar: Option<String>,
    pub case_first: Option<String>,
    pub collation: Option<String>,
    pub hour_cycle: Option<String>,
    pub numbering_system: Option<String>,
    pub numeric: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ListFormatSlots {
    pub locale: String,
    pub type_: String,
    pub style: String,
}

/// `useGrouping` は文字列か `false` のどちらか。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UseGrouping {
    Mode(String),
    False,
}

impl Default for UseGrouping {
    fn default() -> Self {
        UseGrouping::Mode("auto".into())
    }
}

#[derive(Clone, Debug, Default)]
pub struct NumberFormatSlots {
    pub locale: String,
    pub data_locale: String,
    pub numbering_system: String,
    pub style: String,
    pub currency: Option<String>,
    pub currency_display: Option<String>,
    pub currency_sign: Option<String>,
    pub unit: Option<String>,
    pub unit_display: Option<String>,
    pub min_integer_digits: u32,
    pub min_fraction_digits: Option<u32>,
    pub max_fraction_digits: Option<u32>,
    pub min_significant_digits: Option<u32>,
    pub max_significant_digits: Option<u32>,
    pub use_grouping: UseGrouping,
    pub rounding_type: String,
    pub rounding_mode: String,
    pub rounding_increment: u32,
    pub notation: String,
    pub compact_display: Option<String>,
    pub sign_display: String,
    pub trailing_zero_display: String,
}

/// `Intl.DateTimeFormat` の暦フィールド値。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CalendarField {
    Style(String),
    Digits(u32),
}

#[derive(Clone, Debug, Default)]
pub struct DateTimeFormatSlots {
    pub locale: String,
    pub pattern: String,
    pub calendar: String,
    pub numbering_system: String,
    pub hour_cycle: Option<String>,
    pub time_zone: String,
    pub date_style: Option<String>,
    pub time_style: Option<String>,
    /// weekday, era, year ... の順で並ぶ暦フィールド。値がなければ未設定。
    pub calendar_fields: Vec<(&'static str, Option<CalendarField>)>,
}

/// 暦フィールドの表示順。
pub const CALENDAR_FIELD_NAMES: [&str; 11] = [
    "weekday",
    "era",
    "year",
    "month",
    "day",
    "dayPeriod",
    "hour",
    "minute",
    "second",
    "fractionalSecondDigits",
    "timeZoneName",
];

#[derive(Clone, Debug, Default)]
pub struct RelativeTimeFormatSlots {
    pub locale: String,
    pub numbering_system: String,
    pub style: String,
    pub numeric: String,
}

#[derive(Clone, Debug, Default)]
pub struct PluralRulesSlots {
    pub locale: String,
    pub type_: String,
    pub min_integer_digits: u32,
    pub min_fraction_digits: Option<u32>,
    pub max_fraction_digits: Option<u32>,
    pub min_significant_digits: Option<u32>,
    pub max_significant_digits: Option<u32>,
    pub rounding_type: String,
}

#[derive(Clone, Debug, Default)]
pub struct CollatorSlots {
    pub locale: String,
    pub usage: String,
    pub sensitivity: String,
    pub case_first: String,
    pub collation: String,
    pub ignore_punctuation: bool,
    pub numeric: bool,
}

#[derive(Clone, Debug, Default)]
pub struct SegmenterSlots {
    pub locale: String,
    pub granularity: String,
}

/// 期間の単位ごとのスタイルと表示方法。
#[derive(Clone, Debug, Default)]
pub struct DurationUnitOptions {
    pub style: String,
    pub display: String,
}

/// `Intl.DurationFormat` の単位名（表示順）。
pub const DURATION_UNIT_NAMES: [&str; 10] = [
    "years",
    "months",
    "weeks",
    "days",
    "hours",
    "minutes",
    "seconds",
    "milliseconds",
    "microseconds",
    "nanoseconds",
];

#[derive(Clone, Debug, Default)]
pub struct DurationFormatSlots {
    pub locale: String,
    pub data_locale: String,
    pub numbering_system: String,
    pub style: String,
    pub units: Vec<DurationUnitOptions>,
    pub fractional_digits: Option<u32>,
}

#[derive(Clone, Debug)]
pub enum IntlObject {
    DisplayNames(DisplayNamesSlots),
    Locale(LocaleSlots),
    ListFormat(ListFormatSlots),
    NumberFormat(Box<NumberFormatSlots>),
    DateTimeFormat(Box<DateTimeFormatSlots>),
    RelativeTimeFormat(RelativeTimeFormatSlots),
    PluralRules(PluralRulesSlots),
    Collator(CollatorSlots),
    Segmenter(SegmenterSlots),
    Segments { string: String, segmenter: ObjectId },
    DurationFormat(Box<DurationFormatSlots>),
}

impl IntlObject {
    pub fn class_name(&self) -> &'static str {
        match self {
            IntlObject::DisplayNames(_) => "Intl.DisplayNames",
            IntlObject::Locale(_) => "Intl.Locale",
            IntlObject::ListFormat(_) => "Intl.ListFormat",
            IntlObject::NumberFormat(_) => "Intl.NumberFormat",
            IntlObject::DateTimeFormat(_) => "Intl.DateTimeFormat",
            IntlObject::RelativeTimeFormat(_) => "Intl.RelativeTimeFormat",
            IntlObject::PluralRules(_) => "Intl.PluralRules",
            IntlObject::Collator(_) => "Intl.Collator",
            IntlObject::Segmenter(_) => "Intl.Segmenter",
            IntlObject::Segments { .. } => "Segments",
            IntlObject::DurationFormat(_) => "Intl.DurationFormat",
        }
    }
}
