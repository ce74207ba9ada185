// パス: src/interpreter/builtins/date.rs
// 役割: Date コンストラクタと Date.prototype
// 意図: 時刻値はエポックからのミリ秒（f64）で持ち、暦計算と書式は chrono に任せる。地方時は UTC とみなす
// 関連ファイル: runtime_heap/src/object.rs

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};
use runtime_heap::{Attributes, ObjectId, ObjectKind, Property, PropertyKey, Value};

use super::install_constructor;
use crate::interpreter::{arg, Interpreter, JsResult};

const MS_PER_DAY: f64 = 86_400_000.0;
const MAX_TIME: f64 = 8.64e15;

/// TimeClip。範囲外は NaN。
fn time_clip(t: f64) -> f64 {
    if !t.is_finite() || t.abs() > MAX_TIME {
        f64::NAN
    } else {
        t.trunc() + 0.0
    }
}

fn now_ms() -> f64 {
    Utc::now().timestamp_millis() as f64
}

fn to_datetime(t: f64) -> Option<DateTime<Utc>> {
    if t.is_nan() {
        return None;
    }
    DateTime::from_timestamp_millis(t as i64)
}

/// 年・月（0 始まり、はみ出し可）・日から、エポックからの日数を求める。
fn make_day(year: f64, month: f64, date: f64) -> f64 {
    if !(year.is_finite() && month.is_finite() && date.is_finite()) {
        return f64::NAN;
    }
    let y = year.trunc() + (month.trunc() / 12.0).floor();
    let m = month.trunc().rem_euclid(12.0);
    if y.abs() > 400_000.0 {
        return f64::NAN;
    }
    let Some(first) = NaiveDate::from_ymd_opt(y as i32, m as u32 + 1, 1) else {
        return f64::NAN;
    };
    let Some(midnight) = first.and_hms_opt(0, 0, 0) else {
        return f64::NAN;
    };
    (midnight.and_utc().timestamp() / 86_400) as f64 + date.trunc() - 1.0
}

fn make_time(h: f64, m: f64, s: f64, ms: f64) -> f64 {
    if !(h.is_finite() && m.is_finite() && s.is_finite() && ms.is_finite()) {
        return f64::NAN;
    }
    h.trunc() * 3_600_000.0 + m.trunc() * 60_000.0 + s.trunc() * 1000.0 + ms.trunc()
}

fn make_date(day: f64, time: f64) -> f64 {
    day * MS_PER_DAY + time
}

/// 時刻値を分解した各フィールド。
#[derive(Clone, Copy)]
struct Fields {
    year: f64,
    month: f64,
    date: f64,
    hours: f64,
    minutes: f64,
    seconds: f64,
    ms: f64,
}

impl Fields {
    fn of(t: f64) -> Option<Fields> {
        let dt = to_datetime(t)?;
        Some(Fields {
            year: dt.year() as f64,
            month: dt.month0() as f64,
            date: dt.day() as f64,
            hours: dt.hour() as f64,
            minutes: dt.minute() as f64,
            seconds: dt.second() as f64,
            ms: (t as i64).rem_euclid(1000) as f64,
        })
    }

    fn time_value(&self) -> f64 {
        time_clip(make_date(
            make_day(self.year, self.month, self.date),
            make_time(self.hours, self.minutes, self.seconds, self.ms),
        ))
    }
}

/// ISO 8601 形式と、toString / toUTCString が出す形式を読む。
fn parse_date(text: &str) -> f64 {
    let s = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.timestamp_millis() as f64;
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return dt.and_utc().timestamp_millis() as f64;
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis() as f64).unwrap_or(f64::NAN);
    }
    if let Some((year, month)) = s.split_once('-') {
        if let (Ok(y), Ok(m)) = (year.parse::<i32>(), month.parse::<u32>()) {
            if year.len() == 4 && month.len() == 2 && (1..=12).contains(&m) {
                return make_date(make_day(y as f64, (m - 1) as f64, 1.0), 0.0);
            }
        }
    }
    if s.len() == 4 {
        if let Ok(y) = s.parse::<i32>() {
            return make_date(make_day(y as f64, 0.0, 1.0), 0.0);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return dt.timestamp_millis() as f64;
    }
    // "Tue Mar 05 2024 10:00:00 GMT+0000 (...)"
    let head = s.split(" (").next().unwrap_or(s);
    if let Ok(dt) = DateTime::parse_from_str(head, "%a %b %d %Y %H:%M:%S GMT%z") {
        return dt.timestamp_millis() as f64;
    }
    f64::NAN
}

fn iso_string(t: f64) -> Option<String> {
    let f = Fields::of(t)?;
    let year = if (0.0..=9999.0).contains(&f.year) {
        format!("{:04}", f.year)
    } else if f.year < 0.0 {
        format!("-{:06}", -f.year)
    } else {
        format!("+{:06}", f.year)
    };
    Some(format!(
        "{}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        year,
        f.month + 1.0,
        f.date,
        f.hours,
        f.minutes,
        f.seconds,
        f.ms
    ))
}

fn formatted(t: f64, pattern: &str) -> String {
    match to_datetime(t) {
        Some(dt) => dt.format(pattern).to_string(),
        None => "Invalid Date".to_string(),
    }
}

fn date_string(t: f64) -> String {
    formatted(t, "%a %b %d %Y")
}

fn time_string(t: f64) -> String {
    if t.is_nan() {
        return "Invalid Date".to_string();
    }
    format!("{} GMT+0000 (Coordinated Universal Time)", formatted(t, "%H:%M:%S"))
}

/// `Date.prototype.toString` の書式。REPL の表示器も使う。
pub(crate) fn full_string(t: f64) -> String {
    if t.is_nan() {
        return "Invalid Date".to_string();
    }
    format!("{} {}", date_string(t), time_string(t))
}

fn this_time(interp: &mut Interpreter, this: &Value) -> JsResult<(ObjectId, f64)> {
    if let Value::Object(id) = this {
        if let ObjectKind::Date(t) = interp.heap.kind(*id) {
            return Ok((*id, *t));
        }
    }
    Err(interp.type_error("this is not a Date object."))
}

fn store_time(interp: &mut Interpreter, id: ObjectId, t: f64) -> Value {
    if let ObjectKind::Date(slot) = &mut interp.heap.object_mut(id).kind {
        *slot = t;
    }
    Value::Number(t)
}

fn numbers(interp: &mut Interpreter, args: &[Value]) -> JsResult<Vec<f64>> {
    let mut out = Vec::with_capacity(args.len());
    for a in args {
        out.push(interp.to_number(a)?);
    }
    Ok(out)
}

/// `Date.UTC` と複数引数の `new Date` が共有するフィールド合成。
fn from_components(values: &[f64]) -> f64 {
    let get = |i: usize, default: f64| values.get(i).copied().unwrap_or(default);
    let mut year = get(0, f64::NAN);
    if year.is_finite() {
        let y = year.trunc();
        if (0.0..=99.0).contains(&y) {
            year = 1900.0 + y;
        }
    }
    time_clip(make_date(
        make_day(year, get(1, 0.0), get(2, 1.0)),
        make_time(get(3, 0.0), get(4, 0.0), get(5, 0.0), get(6, 0.0)),
    ))
}

type Getter = fn(&Fields) -> f64;
type Setter = fn(&mut Fields, &[f64]);

fn install_getters(interp: &mut Interpreter, proto: ObjectId) {
    let getters: [(&str, Getter); 8] = [
        ("FullYear", |f| f.year),
        ("Month", |f| f.month),
        ("Date", |f| f.date),
        ("Hours", |f| f.hours),
        ("Minutes", |f| f.minutes),
        ("Seconds", |f| f.seconds),
        ("Milliseconds", |f| f.ms),
        ("Day", |f| (make_day(f.year, f.month, f.date) + 4.0).rem_euclid(7.0)),
    ];
    for (field, getter) in getters {
        for prefix in ["get", "getUTC"] {
            interp.define_method(proto, &format!("{}{}", prefix, field), 0, move |interp, this, _| {
                let (_, t) = this_time(interp, &this)?;
                Ok(Value::Number(Fields::of(t).map(|f| getter(&f)).unwrap_or(f64::NAN)))
            });
        }
    }

    let setters: [(&str, u32, Setter); 7] = [
        ("FullYear", 3, |f, v| {
            f.year = v[0];
            if let Some(m) = v.get(1) {
                f.month = *m;
            }
            if let Some(d) = v.get(2) {
                f.date = *d;
            }
        }),
        ("Month", 2, |f, v| {
            f.month = v[0];
            if let Some(d) = v.get(1) {
                f.date = *d;
            }
        }),
        ("Date", 1, |f, v| f.date = v[0]),
        ("Hours", 4, |f, v| {
            f.hours = v[0];
            if let Some(m) = v.get(1) {
                f.minutes = *m;
            }
            if let Some(s) = v.get(2) {
                f.seconds = *s;
            }
            if let Some(ms) = v.get(3) {
                f.ms = *ms;
            }
        }),
        ("Minutes", 3, |f, v| {
            f.minutes = v[0];
            if let Some(s) = v.get(1) {
                f.seconds = *s;
            }
            if let Some(ms) = v.get(2) {
                f.ms = *ms;
            }
        }),
        ("Seconds", 2, |f, v| {
            f.seconds = v[0];
            if let Some(ms) = v.get(1) {
                f.ms = *ms;
            }
        }),
        ("Milliseconds", 1, |f, v| f.ms = v[0]),
    ];
    for (field, length, setter) in setters {
        for prefix in ["set", "setUTC"] {
            let is_year = field == "FullYear";
            interp.define_method(proto, &format!("{}{}", prefix, field), length, move |interp, this, args| {
                let (id, t) = this_time(interp, &this)?;
                let mut values = numbers(interp, &args[..args.len().min(length as usize)])?;
                if values.is_empty() {
                    values.push(f64::NAN);
                }
                // 不正な日付でも setFullYear だけは +0 から組み立て直せる
                let base = match Fields::of(t) {
                    Some(f) => f,
                    None if is_year => Fields::of(0.0).unwrap_or(Fields {
                        year: 1970.0,
                        month: 0.0,
                        date: 1.0,
                        hours: 0.0,
                        minutes: 0.0,
                        seconds: 0.0,
                        ms: 0.0,
                    }),
                    None => return Ok(Value::Number(f64::NAN)),
                };
                let mut fields = base;
                setter(&mut fields, &values);
                Ok(store_time(interp, id, fields.time_value()))
            });
        }
    }
}

pub(super) fn install(interp: &mut Interpreter) {
    let proto = interp.new_prototype("Date", ObjectKind::Ordinary);
    let ctor = install_constructor(interp, "Date", 7, proto, |interp, _, args| {
        if !interp.is_constructing() {
            return Ok(Value::string(full_string(now_ms())));
        }
        let t = match args {
            [] => now_ms(),
            [single] => {
                let from_date = match single {
                    Value::Object(id) => match interp.heap.kind(*id) {
                        ObjectKind::Date(t) => Some(*t),
                        _ => None,
                    },
                    _ => None,
                };
                match from_date {
                    Some(t) => t,
                    None => {
                        let prim = interp.to_primitive(single.clone(), crate::interpreter::ops::Hint::Default)?;
                        match prim {
                            Value::String(s) => parse_date(&s),
                            other => time_clip(interp.to_number(&other)?),
                        }
                    }
                }
            }
            many => {
                let values = numbers(interp, many)?;
                from_components(&values)
            }
        };
        let proto = interp.constructing_prototype("Date");
        Ok(Value::Object(interp.heap.alloc(ObjectKind::Date(t), Some(proto))))
    });

    interp.define_method(ctor, "now", 0, |_, _, _| Ok(Value::Number(now_ms())));
    interp.define_method(ctor, "parse", 1, |interp, _, args| {
        let s = interp.to_string(&arg(args, 0))?;
        Ok(Value::Number(parse_date(&s)))
    });
    interp.define_method(ctor, "UTC", 7, |interp, _, args| {
        let values = numbers(interp, args)?;
        Ok(Value::Number(from_components(&values)))
    });

    for name in ["getTime", "valueOf"] {
        interp.define_method(proto, name, 0, |interp, this, _| {
            let (_, t) = this_time(interp, &this)?;
            Ok(Value::Number(t))
        });
    }
    interp.define_method(proto, "setTime", 1, |interp, this, args| {
        let (id, _) = this_time(interp, &this)?;
        let t = time_clip(interp.to_number(&arg(args, 0))?);
        Ok(store_time(interp, id, t))
    });
    interp.define_method(proto, "getTimezoneOffset", 0, |interp, this, _| {
        let (_, t) = this_time(interp, &this)?;
        Ok(Value::Number(if t.is_nan() { f64::NAN } else { 0.0 }))
    });
    install_getters(interp, proto);

    interp.define_method(proto, "toISOString", 0, |interp, this, _| {
        let (_, t) = this_time(interp, &this)?;
        match iso_string(t) {
            Some(s) => Ok(Value::string(s)),
            None => Err(interp.range_error("Invalid time value")),
        }
    });
    interp.define_method(proto, "toJSON", 1, |interp, this, _| {
        let prim = interp.to_primitive(this.clone(), crate::interpreter::ops::Hint::Number)?;
        if let Value::Number(n) = prim {
            if !n.is_finite() {
                return Ok(Value::Null);
            }
        }
        interp.invoke(&this, "toISOString", &[])
    });
    let formats: [(&str, fn(f64) -> String); 7] = [
        ("toString", full_string),
        ("toDateString", date_string),
        ("toTimeString", time_string),
        ("toUTCString", |t| formatted(t, "%a, %d %b %Y %H:%M:%S GMT")),
        ("toLocaleString", |t| formatted(t, "%-m/%-d/%Y, %-I:%M:%S %p")),
        ("toLocaleDateString", |t| formatted(t, "%-m/%-d/%Y")),
        ("toLocaleTimeString", |t| formatted(t, "%-I:%M:%S %p")),
    ];
    for (name, format) in formats {
        let method = interp.define_method(proto, name, 0, move |interp, this, _| {
            let (_, t) = this_time(interp, &this)?;
            Ok(Value::string(format(t)))
        });
        if name == "toUTCString" {
            interp
                .heap
                .object_mut(proto)
                .define(PropertyKey::from("toGMTString"), Property::data(Value::Object(method), Attributes::BUILTIN));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{make_day, parse_date};
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// 月のはみ出しは年へ繰り上がる。
    fn day_arithmetic() {
        assert_eq!(make_day(1970.0, 0.0, 1.0), 0.0);
        assert_eq!(make_day(1969.0, 12.0, 1.0), 0.0);
        assert_eq!(make_day(2000.0, 1.0, 29.0), 11016.0);
    }

    #[test]
    /// ISO 形式の解析と書き出し。
    fn iso_round_trip() {
        assert_eq!(parse_date("1970-01-02"), 86_400_000.0);
        assert!(parse_date("not a date").is_nan());
        assert_eq!(eval_display("new Date(Date.UTC(2024, 2, 5, 10)).toISOString()"), "2024-03-05T10:00:00.000Z");
        assert_eq!(eval_display("new Date('2024-03-05T10:00:00Z').getTime()"), "1709632800000");
    }

    #[test]
    /// 文字列化。
    fn string_forms() {
        assert_eq!(
            eval_display("String(new Date(0))"),
            "Thu Jan 01 1970 00:00:00 GMT+0000 (Coordinated Universal Time)"
        );
        assert_eq!(eval_display("new Date(0).toUTCString()"), "Thu, 01 Jan 1970 00:00:00 GMT");
        assert_eq!(eval_display("String(new Date(NaN))"), "Invalid Date");
        assert_eq!(eval_display("new Date(NaN).toISOString()"), "throw RangeError: Invalid time value");
    }

    #[test]
    /// setter は正規化した時刻値を返す。
    fn setters() {
        assert_eq!(eval_display("const d = new Date(0); d.setMonth(13); d.toISOString()"), "1971-02-01T00:00:00.000Z");
        assert_eq!(eval_display("const d = new Date(0); d.setHours(25, 30); [d.getDate(), d.getMinutes(), d.getDay()].join()"), "2,30,5");
    }

    #[test]
    /// JSON 化は toISOString を使う。
    fn to_json() {
        assert_eq!(eval_display("JSON.stringify({ d: new Date(0) })"), "{\"d\":\"1970-01-01T00:00:00.000Z\"}");
    }
}
