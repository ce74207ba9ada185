// パス: src/interpreter/builtins/temporal.rs
// 役割: Temporal 名前空間（暦・期間・日付・時刻・タイムゾーン）
// 意図: 引数を検証して内部スロットに格納し、ISO 形式の文字列化と基本的なゲッターだけを提供する
// 関連ファイル: runtime_heap/src/temporal.rs, src/repl/printer/temporal.rs

use std::rc::Rc;

use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat};
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use runtime_heap::temporal::{DurationRecord, IsoDate, IsoTime, TemporalObject};
use runtime_heap::{Attributes, ObjectId, ObjectKind, Property, PropertyKey, Value};

use super::{define_global, require_new};
use crate::interpreter::{arg, Interpreter, JsResult};

const NS_PER_SECOND: i64 = 1_000_000_000;
const NS_PER_DAY: i64 = 86_400 * NS_PER_SECOND;

/// エポックからの上限（±1 億日）。
fn max_epoch_nanoseconds() -> BigInt {
    BigInt::from(100_000_000i64) * BigInt::from(NS_PER_DAY)
}

type Getter = fn(&TemporalObject) -> Option<Value>;

fn temporal_of(interp: &mut Interpreter, this: &Value, class: &str) -> JsResult<TemporalObject> {
    if let Value::Object(id) = this {
        if let ObjectKind::Temporal(t) = interp.heap.kind(*id) {
            if t.class_name() == class {
                return Ok(t.clone());
            }
        }
    }
    Err(interp.type_error(format!("this is not a {}", class)))
}

fn alloc_temporal(interp: &mut Interpreter, class: &'static str, object: TemporalObject) -> ObjectId {
    let proto = interp.constructing_prototype(class);
    interp.heap.alloc(ObjectKind::Temporal(object), Some(proto))
}

/// ToIntegerWithTruncation。無限大は RangeError。
fn integer_arg(interp: &mut Interpreter, args: &[Value], n: usize, default: f64) -> JsResult<f64> {
    let v = arg(args, n);
    if v.is_undefined() {
        return Ok(default);
    }
    let x = interp.to_number(&v)?;
    if !x.is_finite() {
        return Err(interp.range_error("value must be finite"));
    }
    Ok(x.trunc() + 0.0)
}

fn iso_date(interp: &mut Interpreter, year: f64, month: f64, day: f64) -> JsResult<IsoDate> {
    let valid = (1.0..=12.0).contains(&month)
        && day >= 1.0
        && year.abs() <= 275_760.0
        && NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32).is_some();
    if !valid {
        return Err(interp.range_error("Invalid plain date"));
    }
    Ok(IsoDate {
        year: year as i32,
        month: month as u8,
        day: day as u8,
    })
}

fn iso_time(interp: &mut Interpreter, args: &[Value], first: usize) -> JsResult<IsoTime> {
    let mut parts = [0.0; 6];
    for (i, part) in parts.iter_mut().enumerate() {
        *part = integer_arg(interp, args, first + i, 0.0)?;
    }
    let limits = [23.0, 59.0, 59.0, 999.0, 999.0, 999.0];
    if parts.iter().zip(limits).any(|(v, max)| *v < 0.0 || *v > max) {
        return Err(interp.range_error("Invalid plain time"));
    }
    Ok(IsoTime {
        hour: parts[0] as u8,
        minute: parts[1] as u8,
        second: parts[2] as u8,
        millisecond: parts[3] as u16,
        microsecond: parts[4] as u16,
        nanosecond: parts[5] as u16,
    })
}

fn new_calendar(interp: &mut Interpreter, identifier: &str) -> JsResult<ObjectId> {
    let lowered = identifier.to_ascii_lowercase();
    if lowered != "iso8601" {
        return Err(interp.range_error(format!("Invalid calendar identifier '{}'", identifier)));
    }
    let proto = interp.prototype("Temporal.Calendar");
    Ok(interp.heap.alloc(
        ObjectKind::Temporal(TemporalObject::Calendar {
            identifier: Rc::from(lowered),
        }),
        Some(proto),
    ))
}

/// 暦引数。省略時は ISO 暦、Calendar オブジェクトはそのまま使う。
fn to_calendar(interp: &mut Interpreter, value: &Value) -> JsResult<ObjectId> {
    match value {
        Value::Undefined => new_calendar(interp, "iso8601"),
        Value::Object(id) if matches!(interp.heap.kind(*id), ObjectKind::Temporal(TemporalObject::Calendar { .. })) => {
            Ok(*id)
        }
        other => {
            let identifier = interp.to_string(other)?;
            new_calendar(interp, &identifier)
        }
    }
}

/// `±HH`, `±HH:MM`, `±HH:MM:SS` のオフセットをナノ秒へ。
fn parse_offset(text: &str) -> Option<f64> {
    let sign = match text.as_bytes().first()? {
        b'+' => 1.0,
        b'-' => -1.0,
        _ => return None,
    };
    let mut total = 0.0;
    let mut scale = 3600.0;
    for part in text[1..].split(':') {
        if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_digit()) || scale < 1.0 {
            return None;
        }
        let n: f64 = part.parse().ok()?;
        if (scale == 3600.0 && n > 23.0) || (scale < 3600.0 && n > 59.0) {
            return None;
        }
        total += n * scale;
        scale /= 60.0;
    }
    Some(sign * total * NS_PER_SECOND as f64)
}

fn new_time_zone(interp: &mut Interpreter, identifier: &str) -> JsResult<ObjectId> {
    let (identifier, offset) = if identifier.eq_ignore_ascii_case("utc") {
        ("UTC".to_string(), None)
    } else if let Some(ns) = parse_offset(identifier) {
        (identifier.to_string(), Some(ns))
    } else {
        return Err(interp.range_error(format!("Invalid time zone name '{}'", identifier)));
    };
    let proto = interp.prototype("Temporal.TimeZone");
    Ok(interp.heap.alloc(
        ObjectKind::Temporal(TemporalObject::TimeZone {
            identifier: Rc::from(identifier),
            offset_nanoseconds: offset,
        }),
        Some(proto),
    ))
}

fn to_time_zone(interp: &mut Interpreter, value: &Value) -> JsResult<ObjectId> {
    match value {
        Value::Object(id) if matches!(interp.heap.kind(*id), ObjectKind::Temporal(TemporalObject::TimeZone { .. })) => {
            Ok(*id)
        }
        Value::Undefined => Err(interp.type_error("Temporal.ZonedDateTime requires a time zone")),
        other => {
            let identifier = interp.to_string(other)?;
            new_time_zone(interp, &identifier)
        }
    }
}

fn epoch_nanoseconds(interp: &mut Interpreter, value: &Value) -> JsResult<Rc<BigInt>> {
    let ns = interp.to_bigint(value)?;
    let limit = max_epoch_nanoseconds();
    if ns > limit || ns < -limit {
        return Err(interp.range_error("Invalid epoch nanoseconds"));
    }
    Ok(Rc::new(ns))
}

fn duration_record(interp: &mut Interpreter, args: &[Value]) -> JsResult<DurationRecord> {
    let mut fields = [0.0; 10];
    for (i, field) in fields.iter_mut().enumerate() {
        *field = integer_arg(interp, args, i, 0.0)?;
    }
    let positive = fields.iter().any(|v| *v > 0.0);
    let negative = fields.iter().any(|v| *v < 0.0);
    if positive && negative {
        return Err(interp.range_error("Invalid duration: mixed signs"));
    }
    let [years, months, weeks, days, hours, minutes, seconds, milliseconds, microseconds, nanoseconds] = fields;
    Ok(DurationRecord {
        years,
        months,
        weeks,
        days,
        hours,
        minutes,
        seconds,
        milliseconds,
        microseconds,
        nanoseconds,
    })
}

fn calendar_id(interp: &Interpreter, calendar: ObjectId) -> String {
    match interp.heap.kind(calendar) {
        ObjectKind::Temporal(TemporalObject::Calendar { identifier }) => identifier.to_string(),
        _ => "iso8601".into(),
    }
}

/// 小数秒の末尾ゼロを落とす（全部ゼロなら空）。
fn fraction(time: &IsoTime) -> String {
    let ns = time.millisecond as u32 * 1_000_000 + time.microsecond as u32 * 1_000 + time.nanosecond as u32;
    if ns == 0 {
        return String::new();
    }
    let digits = format!("{:09}", ns);
    format!(".{}", digits.trim_end_matches('0'))
}

fn date_string(date: &IsoDate) -> String {
    if (0..=9999).contains(&date.year) {
        format!("{:04}-{:02}-{:02}", date.year, date.month, date.day)
    } else {
        let sign = if date.year < 0 { '-' } else { '+' };
        format!("{}{:06}-{:02}-{:02}", sign, date.year.unsigned_abs(), date.month, date.day)
    }
}

fn time_string(time: &IsoTime) -> String {
    format!("{:02}:{:02}:{:02}{}", time.hour, time.minute, time.second, fraction(time))
}

fn duration_string(d: &DurationRecord) -> String {
    let values = [
        d.years, d.months, d.weeks, d.days, d.hours, d.minutes, d.seconds, d.milliseconds, d.microseconds,
        d.nanoseconds,
    ];
    let sign = if values.iter().any(|v| *v < 0.0) { "-" } else { "" };
    let mut out = format!("{}P", sign);
    for (value, unit) in [(d.years, 'Y'), (d.months, 'M'), (d.weeks, 'W'), (d.days, 'D')] {
        if value != 0.0 {
            out.push_str(&format!("{}{}", value.abs(), unit));
        }
    }
    let sub_second = d.milliseconds.abs() * 1e6 + d.microseconds.abs() * 1e3 + d.nanoseconds.abs();
    let seconds = d.seconds.abs() + (sub_second / 1e9).trunc();
    let nanos = sub_second % 1e9;
    let mut time = String::new();
    for (value, unit) in [(d.hours, 'H'), (d.minutes, 'M')] {
        if value != 0.0 {
            time.push_str(&format!("{}{}", value.abs(), unit));
        }
    }
    if seconds != 0.0 || nanos != 0.0 || (time.is_empty() && out.len() == sign.len() + 1) {
        let frac = if nanos == 0.0 {
            String::new()
        } else {
            format!(".{}", format!("{:09}", nanos as u64).trim_end_matches('0'))
        };
        time.push_str(&format!("{}{}S", seconds, frac));
    }
    if !time.is_empty() {
        out.push('T');
        out.push_str(&time);
    }
    out
}

/// エポックナノ秒を (日付, 時刻) へ分解する。
fn split_epoch(ns: &BigInt, offset_ns: f64) -> Option<(IsoDate, IsoTime)> {
    let shifted = ns + BigInt::from(offset_ns as i64);
    let day_ns = BigInt::from(NS_PER_DAY);
    let mut days = &shifted / &day_ns;
    let mut rem = &shifted % &day_ns;
    if rem < BigInt::zero() {
        rem += &day_ns;
        days -= 1;
    }
    let days = days.to_i64()?;
    let rem = rem.to_i64()?;
    let date = NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(days))?;
    let secs = rem / NS_PER_SECOND;
    let sub = rem % NS_PER_SECOND;
    Some((
        IsoDate {
            year: date.year(),
            month: date.month() as u8,
            day: date.day() as u8,
        },
        IsoTime {
            hour: (secs / 3600) as u8,
            minute: (secs / 60 % 60) as u8,
            second: (secs % 60) as u8,
            millisecond: (sub / 1_000_000) as u16,
            microsecond: (sub / 1_000 % 1_000) as u16,
            nanosecond: (sub % 1_000) as u16,
        },
    ))
}

fn instant_string(ns: &BigInt) -> String {
    let secs = ns.to_i64().map(|n| n.div_euclid(NS_PER_SECOND));
    let nanos = ns.to_i64().map(|n| n.rem_euclid(NS_PER_SECOND) as u32);
    match (secs, nanos) {
        (Some(secs), Some(nanos)) => DateTime::from_timestamp(secs, nanos)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .unwrap_or_else(|| ns.to_string()),
        _ => ns.to_string(),
    }
}

fn offset_string(offset_ns: f64) -> String {
    let total = (offset_ns / NS_PER_SECOND as f64) as i64;
    let sign = if total < 0 { '-' } else { '+' };
    let total = total.abs();
    format!("{}{:02}:{:02}", sign, total / 3600, total / 60 % 60)
}

impl Interpreter {
    /// `toString` の本体。暦やタイムゾーンの名前を引くためにヒープを読む。
    fn temporal_to_string(&self, object: &TemporalObject) -> String {
        match object {
            TemporalObject::Calendar { identifier } => identifier.to_string(),
            TemporalObject::Duration(d) => duration_string(d),
            TemporalObject::Instant { nanoseconds } => instant_string(nanoseconds),
            TemporalObject::PlainDate { date, .. } => date_string(date),
            TemporalObject::PlainDateTime { date, time, .. } => {
                format!("{}T{}", date_string(date), time_string(time))
            }
            TemporalObject::PlainMonthDay { month, day, .. } => format!("{:02}-{:02}", month, day),
            TemporalObject::PlainTime { time, .. } => time_string(time),
            TemporalObject::PlainYearMonth { year, month, .. } => format!("{:04}-{:02}", year, month),
            TemporalObject::TimeZone { identifier, .. } => identifier.to_string(),
            TemporalObject::ZonedDateTime {
                nanoseconds,
                time_zone,
                ..
            } => {
                let (name, offset) = match self.heap.kind(*time_zone) {
                    ObjectKind::Temporal(TemporalObject::TimeZone {
                        identifier,
                        offset_nanoseconds,
                    }) => (identifier.to_string(), offset_nanoseconds.unwrap_or(0.0)),
                    _ => ("UTC".to_string(), 0.0),
                };
                match split_epoch(nanoseconds, offset) {
                    Some((date, time)) => format!(
                        "{}T{}{}[{}]",
                        date_string(&date),
                        time_string(&time),
                        offset_string(offset),
                        name
                    ),
                    None => nanoseconds.to_string(),
                }
            }
        }
    }
}

fn number(x: f64) -> Option<Value> {
    Some(Value::Number(x))
}

fn date_of(object: &TemporalObject) -> Option<&IsoDate> {
    match object {
        TemporalObject::PlainDate { date, .. } | TemporalObject::PlainDateTime { date, .. } => Some(date),
        _ => None,
    }
}

fn time_of(object: &TemporalObject) -> Option<&IsoTime> {
    match object {
        TemporalObject::PlainTime { time, .. } | TemporalObject::PlainDateTime { time, .. } => Some(time),
        _ => None,
    }
}

const DATE_GETTERS: [(&str, Getter); 4] = [
    ("year", |o| date_of(o).and_then(|d| number(d.year as f64))),
    ("month", |o| date_of(o).and_then(|d| number(d.month as f64))),
    ("day", |o| date_of(o).and_then(|d| number(d.day as f64))),
    ("dayOfWeek", |o| {
        date_of(o)
            .and_then(|d| NaiveDate::from_ymd_opt(d.year, d.month as u32, d.day as u32))
            .and_then(|d| number(d.weekday().number_from_monday() as f64))
    }),
];

const TIME_GETTERS: [(&str, Getter); 6] = [
    ("hour", |o| time_of(o).and_then(|t| number(t.hour as f64))),
    ("minute", |o| time_of(o).and_then(|t| number(t.minute as f64))),
    ("second", |o| time_of(o).and_then(|t| number(t.second as f64))),
    ("millisecond", |o| time_of(o).and_then(|t| number(t.millisecond as f64))),
    ("microsecond", |o| time_of(o).and_then(|t| number(t.microsecond as f64))),
    ("nanosecond", |o| time_of(o).and_then(|t| number(t.nanosecond as f64))),
];

fn duration_of(object: &TemporalObject) -> Option<&DurationRecord> {
    match object {
        TemporalObject::Duration(d) => Some(d),
        _ => None,
    }
}

const DURATION_GETTERS: [(&str, Getter); 12] = [
    ("years", |o| duration_of(o).and_then(|d| number(d.years))),
    ("months", |o| duration_of(o).and_then(|d| number(d.months))),
    ("weeks", |o| duration_of(o).and_then(|d| number(d.weeks))),
    ("days", |o| duration_of(o).and_then(|d| number(d.days))),
    ("hours", |o| duration_of(o).and_then(|d| number(d.hours))),
    ("minutes", |o| duration_of(o).and_then(|d| number(d.minutes))),
    ("seconds", |o| duration_of(o).and_then(|d| number(d.seconds))),
    ("milliseconds", |o| duration_of(o).and_then(|d| number(d.milliseconds))),
    ("microseconds", |o| duration_of(o).and_then(|d| number(d.microseconds))),
    ("nanoseconds", |o| duration_of(o).and_then(|d| number(d.nanoseconds))),
    ("sign", |o| {
        duration_of(o).and_then(|d| {
            let all = [
                d.years, d.months, d.weeks, d.days, d.hours, d.minutes, d.seconds, d.milliseconds,
                d.microseconds, d.nanoseconds,
            ];
            let sign = all.iter().find(|v| **v != 0.0).map(|v| v.signum()).unwrap_or(0.0);
            number(sign)
        })
    }),
    ("blank", |o| {
        duration_of(o).map(|d| Value::Boolean(duration_string(d).trim_start_matches('-') == "PT0S"))
    }),
];

const EPOCH_GETTERS: [(&str, Getter); 2] = [
    ("epochNanoseconds", |o| match o {
        TemporalObject::Instant { nanoseconds } | TemporalObject::ZonedDateTime { nanoseconds, .. } => {
            Some(Value::bigint((**nanoseconds).clone()))
        }
        _ => None,
    }),
    ("epochMilliseconds", |o| match o {
        TemporalObject::Instant { nanoseconds } | TemporalObject::ZonedDateTime { nanoseconds, .. } => {
            let ms: BigInt = &**nanoseconds / BigInt::from(1_000_000);
            ms.to_f64().map(Value::Number)
        }
        _ => None,
    }),
];

const ID_GETTERS: [(&str, Getter); 1] = [("id", |o| match o {
    TemporalObject::Calendar { identifier } | TemporalObject::TimeZone { identifier, .. } => {
        Some(Value::String(identifier.clone()))
    }
    _ => None,
})];

/// `Temporal.X` のプロトタイプとコンストラクタを作り、名前空間に置く。
fn define_class(
    interp: &mut Interpreter,
    namespace: ObjectId,
    class: &'static str,
    length: u32,
    getters: &[&[(&'static str, Getter)]],
    f: impl Fn(&mut Interpreter, Value, &[Value]) -> JsResult<Value> + 'static,
) -> ObjectId {
    let short = class.trim_start_matches("Temporal.");
    let proto = interp.new_prototype(class, ObjectKind::Ordinary);
    let ctor = interp.native_constructor(short, length, proto, f);
    interp.define_value(namespace, short, Value::Object(ctor));
    for group in getters {
        for &(name, getter) in *group {
            interp.define_getter(proto, name, move |interp, this, _| {
                let object = temporal_of(interp, &this, class)?;
                Ok(getter(&object).unwrap_or(Value::Undefined))
            });
        }
    }
    interp.define_method(proto, "toString", 0, move |interp, this, _| {
        let object = temporal_of(interp, &this, class)?;
        Ok(Value::string(interp.temporal_to_string(&object)))
    });
    interp.define_method(proto, "toJSON", 0, move |interp, this, _| {
        let object = temporal_of(interp, &this, class)?;
        Ok(Value::string(interp.temporal_to_string(&object)))
    });
    interp.define_method(proto, "valueOf", 0, move |interp, _, _| {
        Err(interp.type_error(format!("Cannot convert {} to a primitive value", class)))
    });
    if !matches!(class, "Temporal.Calendar" | "Temporal.TimeZone" | "Temporal.Instant" | "Temporal.Duration") {
        interp.define_getter(proto, "calendarId", move |interp, this, _| {
            let calendar = match temporal_of(interp, &this, class)? {
                TemporalObject::PlainDate { calendar, .. }
                | TemporalObject::PlainDateTime { calendar, .. }
                | TemporalObject::PlainMonthDay { calendar, .. }
                | TemporalObject::PlainTime { calendar, .. }
                | TemporalObject::PlainYearMonth { calendar, .. }
                | TemporalObject::ZonedDateTime { calendar, .. } => calendar,
                _ => return Ok(Value::Undefined),
            };
            Ok(Value::string(calendar_id(interp, calendar)))
        });
    }
    let tag = interp.well_known.to_string_tag;
    interp.heap.object_mut(proto).define(
        PropertyKey::Symbol(tag),
        Property::data(Value::string(class), Attributes::CONFIGURABLE),
    );
    ctor
}

pub(super) fn install(interp: &mut Interpreter) {
    let temporal = interp.heap.alloc_ordinary();
    define_global(interp, "Temporal", Value::Object(temporal));
    let tag = interp.well_known.to_string_tag;
    interp.heap.object_mut(temporal).define(
        PropertyKey::Symbol(tag),
        Property::data(Value::string("Temporal"), Attributes::CONFIGURABLE),
    );

    define_class(interp, temporal, "Temporal.Calendar", 1, &[&ID_GETTERS], |interp, _, args| {
        require_new(interp, "Temporal.Calendar")?;
        let identifier = interp.to_string(&arg(args, 0))?;
        let id = new_calendar(interp, &identifier)?;
        let proto = interp.constructing_prototype("Temporal.Calendar");
        interp.heap.object_mut(id).prototype = Some(proto);
        Ok(Value::Object(id))
    });
    define_class(interp, temporal, "Temporal.Duration", 0, &[&DURATION_GETTERS], |interp, _, args| {
        require_new(interp, "Temporal.Duration")?;
        let record = duration_record(interp, args)?;
        Ok(Value::Object(alloc_temporal(interp, "Temporal.Duration", TemporalObject::Duration(record))))
    });
    let instant = define_class(interp, temporal, "Temporal.Instant", 1, &[&EPOCH_GETTERS], |interp, _, args| {
        require_new(interp, "Temporal.Instant")?;
        let nanoseconds = epoch_nanoseconds(interp, &arg(args, 0))?;
        Ok(Value::Object(alloc_temporal(interp, "Temporal.Instant", TemporalObject::Instant { nanoseconds })))
    });
    interp.define_method(instant, "fromEpochMilliseconds", 1, |interp, _, args| {
        let ms = interp.to_number(&arg(args, 0))?;
        if !ms.is_finite() || ms.fract() != 0.0 {
            return Err(interp.range_error("Invalid epoch milliseconds"));
        }
        let ns = BigInt::from(ms as i64) * BigInt::from(1_000_000);
        let nanoseconds = epoch_nanoseconds(interp, &Value::bigint(ns))?;
        let proto = interp.prototype("Temporal.Instant");
        Ok(Value::Object(interp.heap.alloc(
            ObjectKind::Temporal(TemporalObject::Instant { nanoseconds }),
            Some(proto),
        )))
    });
    define_class(interp, temporal, "Temporal.PlainDate", 3, &[&DATE_GETTERS], |interp, _, args| {
        require_new(interp, "Temporal.PlainDate")?;
        let year = integer_arg(interp, args, 0, f64::NAN)?;
        let month = integer_arg(interp, args, 1, f64::NAN)?;
        let day = integer_arg(interp, args, 2, f64::NAN)?;
        let date = iso_date(interp, year, month, day)?;
        let calendar = to_calendar(interp, &arg(args, 3))?;
        Ok(Value::Object(alloc_temporal(interp, "Temporal.PlainDate", TemporalObject::PlainDate { date, calendar })))
    });
    define_class(
        interp,
        temporal,
        "Temporal.PlainDateTime",
        3,
        &[&DATE_GETTERS, &TIME_GETTERS],
        |interp, _, args| {
            require_new(interp, "Temporal.PlainDateTime")?;
            let year = integer_arg(interp, args, 0, f64::NAN)?;
            let month = integer_arg(interp, args, 1, f64::NAN)?;
            let day = integer_arg(interp, args, 2, f64::NAN)?;
            let date = iso_date(interp, year, month, day)?;
            let time = iso_time(interp, args, 3)?;
            let calendar = to_calendar(interp, &arg(args, 9))?;
            Ok(Value::Object(alloc_temporal(
                interp,
                "Temporal.PlainDateTime",
                TemporalObject::PlainDateTime { date, time, calendar },
            )))
        },
    );
    define_class(interp, temporal, "Temporal.PlainMonthDay", 2, &[], |interp, _, args| {
        require_new(interp, "Temporal.PlainMonthDay")?;
        let month = integer_arg(interp, args, 0, f64::NAN)?;
        let day = integer_arg(interp, args, 1, f64::NAN)?;
        let calendar = to_calendar(interp, &arg(args, 2))?;
        let reference_year = integer_arg(interp, args, 3, 1972.0)?;
        let date = iso_date(interp, reference_year, month, day)?;
        Ok(Value::Object(alloc_temporal(
            interp,
            "Temporal.PlainMonthDay",
            TemporalObject::PlainMonthDay {
                reference_year: date.year,
                month: date.month,
                day: date.day,
                calendar,
            },
        )))
    });
    define_class(interp, temporal, "Temporal.PlainTime", 0, &[&TIME_GETTERS], |interp, _, args| {
        require_new(interp, "Temporal.PlainTime")?;
        let time = iso_time(interp, args, 0)?;
        let calendar = new_calendar(interp, "iso8601")?;
        Ok(Value::Object(alloc_temporal(interp, "Temporal.PlainTime", TemporalObject::PlainTime { time, calendar })))
    });
    define_class(interp, temporal, "Temporal.PlainYearMonth", 2, &[], |interp, _, args| {
        require_new(interp, "Temporal.PlainYearMonth")?;
        let year = integer_arg(interp, args, 0, f64::NAN)?;
        let month = integer_arg(interp, args, 1, f64::NAN)?;
        let calendar = to_calendar(interp, &arg(args, 2))?;
        let reference_day = integer_arg(interp, args, 3, 1.0)?;
        let date = iso_date(interp, year, month, reference_day)?;
        Ok(Value::Object(alloc_temporal(
            interp,
            "Temporal.PlainYearMonth",
            TemporalObject::PlainYearMonth {
                year: date.year,
                month: date.month,
                reference_day: date.day,
                calendar,
            },
        )))
    });
    define_class(interp, temporal, "Temporal.TimeZone", 1, &[&ID_GETTERS], |interp, _, args| {
        require_new(interp, "Temporal.TimeZone")?;
        let identifier = interp.to_string(&arg(args, 0))?;
        let id = new_time_zone(interp, &identifier)?;
        let proto = interp.constructing_prototype("Temporal.TimeZone");
        interp.heap.object_mut(id).prototype = Some(proto);
        Ok(Value::Object(id))
    });
    define_class(interp, temporal, "Temporal.ZonedDateTime", 2, &[&EPOCH_GETTERS], |interp, _, args| {
        require_new(interp, "Temporal.ZonedDateTime")?;
        let nanoseconds = epoch_nanoseconds(interp, &arg(args, 0))?;
        let time_zone = to_time_zone(interp, &arg(args, 1))?;
        let calendar = to_calendar(interp, &arg(args, 2))?;
        Ok(Value::Object(alloc_temporal(
            interp,
            "Temporal.ZonedDateTime",
            TemporalObject::ZonedDateTime {
                nanoseconds,
                time_zone,
                calendar,
            },
        )))
    });

    let now = interp.heap.alloc_ordinary();
    interp.define_value(temporal, "Now", Value::Object(now));
    interp.define_method(now, "instant", 0, |interp, _, _| {
        let ns = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0);
        let proto = interp.prototype("Temporal.Instant");
        Ok(Value::Object(interp.heap.alloc(
            ObjectKind::Temporal(TemporalObject::Instant {
                nanoseconds: Rc::new(BigInt::from(ns)),
            }),
            Some(proto),
        )))
    });
    interp.define_method(now, "timeZoneId", 0, |_, _, _| Ok(Value::string("UTC")));
}

#[cfg(test)]
mod tests {
    use super::{duration_string, parse_offset};
    use crate::interpreter::test_util::eval_display;
    use runtime_heap::temporal::DurationRecord;

    #[test]
    /// ISO 8601 の期間表記。
    fn duration_format() {
        let d = DurationRecord {
            years: 1.0,
            days: 2.0,
            hours: 3.0,
            milliseconds: 500.0,
            ..DurationRecord::default()
        };
        assert_eq!(duration_string(&d), "P1Y2DT3H0.5S");
        assert_eq!(duration_string(&DurationRecord::default()), "PT0S");
        assert_eq!(
            duration_string(&DurationRecord {
                minutes: -5.0,
                ..DurationRecord::default()
            }),
            "-PT5M"
        );
    }

    #[test]
    /// オフセット文字列の解析。
    fn offsets() {
        assert_eq!(parse_offset("+01:30"), Some(5_400_000_000_000.0));
        assert_eq!(parse_offset("-05"), Some(-18_000_000_000_000.0));
        assert_eq!(parse_offset("+24:00"), None);
        assert_eq!(parse_offset("Europe/Paris"), None);
    }

    #[test]
    /// コンストラクタの検証と文字列化。
    fn constructors() {
        assert_eq!(eval_display("new Temporal.PlainDate(2024, 2, 29).toString()"), "2024-02-29");
        assert_eq!(
            eval_display("new Temporal.PlainDate(2023, 2, 29)"),
            "throw RangeError: Invalid plain date"
        );
        assert_eq!(eval_display("new Temporal.PlainTime(13, 5, 0, 250).toString()"), "13:05:00.25");
        assert_eq!(
            eval_display("new Temporal.Duration(1, -1)"),
            "throw RangeError: Invalid duration: mixed signs"
        );
        assert_eq!(eval_display("new Temporal.PlainDate(2024, 1, 1).calendarId"), "iso8601");
    }

    #[test]
    /// 瞬間とタイムゾーン付き日時。
    fn instants() {
        assert_eq!(eval_display("new Temporal.Instant(0n).toString()"), "1970-01-01T00:00:00Z");
        assert_eq!(
            eval_display("new Temporal.ZonedDateTime(3600000000000n, '+01:00').toString()"),
            "1970-01-01T02:00:00+01:00[+01:00]"
        );
        assert_eq!(eval_display("Temporal.Instant.fromEpochMilliseconds(5).epochNanoseconds === 5000000n"), "true");
    }
}
