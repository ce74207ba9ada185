// パス: runtime_heap/src/temporal.rs
// 役割: Temporal 系オブジェクト（暦・期間・時刻・タイムゾーン）の内部スロットを定義する
// 意図: 表示器が固定順のフィールド列を取り出せるよう、値をそのまま保持する
// 関連ファイル: runtime_heap/src/object.rs, src/repl/printer/temporal.rs

use std::rc::Rc;

use num_bigint::BigInt;

use crate::value::ObjectId;

/// `Temporal.Duration` の 10 要素。
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DurationRecord {
    pub years: f64,
    pub months: f64,
    pub weeks: f64,
    pub days: f64,
    pub hours: f64,
    pub minutes: f64,
    pub seconds: f64,
    pub milliseconds: f64,
    pub microseconds: f64,
    pub nanoseconds: f64,
}

/// ISO 暦の日付部分。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IsoDate {
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

/// ISO の時刻部分（ナノ秒精度）。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IsoTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u16,
    pub microsecond: u16,
    pub nanosecond: u16,
}

#[derive(Clone, Debug)]
pub enum TemporalObject {
    Calendar {
        identifier: Rc<str>,
    },
    Duration(DurationRecord),
    Instant {
        nanoseconds: Rc<BigInt>,
    },
    PlainDate {
        date: IsoDate,
        calendar: ObjectId,
    },
    PlainDateTime {
        date: IsoDate,
        time: IsoTime,
        calendar: ObjectId,
    },
    PlainMonthDay {
        reference_year: i32,
        month: u8,
        day: u8,
        calendar: ObjectId,
    },
    PlainTime {
        time: IsoTime,
        calendar: ObjectId,
    },
    PlainYearMonth {
        year: i32,
        month: u8,
        reference_day: u8,
        calendar: ObjectId,
    },
    TimeZone {
        identifier: Rc<str>,
        offset_nanoseconds: Option<f64>,
    },
    ZonedDateTime {
        nanoseconds: Rc<BigInt>,
        time_zone: ObjectId,
        calendar: ObjectId,
    },
}

impl TemporalObject {
    pub fn class_name(&self) -> &'static str {
        match self {
            TemporalObject::Calendar { .. } => "Temporal.Calendar",
            TemporalObject::Duration(_) => "Temporal.Duration",
            TemporalObject::Instant { .. } => "Temporal.Instant",
            TemporalObject::PlainDate { .. } => "Temporal.PlainDate",
            TemporalObject::PlainDateTime { .. } => "Temporal.PlainDateTime",
            TemporalObject::PlainMonthDay { .. } => "Temporal.PlainMonthDay",
            TemporalObject::PlainTime { .. } => "Temporal.PlainTime",
            TemporalObject::PlainYearMonth { .. } => "Temporal.PlainYearMonth",
            TemporalObject::TimeZone { .. } => "Temporal.TimeZone",
            TemporalObject::ZonedDateTime { .. } => "Temporal.ZonedDateTime",
        }
    }
}
