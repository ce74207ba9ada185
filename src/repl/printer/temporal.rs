//! Temporal 系オブジェクトの描画。暦やタイムゾーンは参照先のオブジェクトを再帰的に描画する。

use std::fmt::Write as _;

use runtime_heap::number_to_string;
use runtime_heap::temporal::{IsoTime, TemporalObject};
use runtime_heap::Value;

use super::Printer;

fn clock(time: &IsoTime) -> String {
    format!(
        "{:02}:{:02}:{:02}.{:03}{:03}{:03}",
        time.hour, time.minute, time.second, time.millisecond, time.microsecond, time.nanosecond
    )
}

impl Printer<'_> {
    fn highlighted(&mut self, text: &str) {
        let _ = write!(self.out, " \x1b[34;1m{}\x1b[0m", text);
    }

    pub(super) fn temporal(&mut self, object: &TemporalObject) {
        self.type_tag(object.class_name());
        match object {
            TemporalObject::Calendar { identifier } => {
                self.push(" ");
                self.value(&Value::String(identifier.clone()));
            }
            TemporalObject::Duration(d) => {
                let parts = [
                    (d.years, "y"),
                    (d.months, "M"),
                    (d.weeks, "w"),
                    (d.days, "d"),
                    (d.hours, "h"),
                    (d.minutes, "m"),
                    (d.seconds, "s"),
                    (d.milliseconds, "ms"),
                    (d.microseconds, "us"),
                    (d.nanoseconds, "ns"),
                ];
                let text = parts
                    .iter()
                    .map(|(value, unit)| format!("{} {}", number_to_string(*value), unit))
                    .collect::<Vec<_>>()
                    .join(", ");
                self.highlighted(&text);
            }
            TemporalObject::Instant { nanoseconds } => {
                self.push(" ");
                self.value(&Value::BigInt(nanoseconds.clone()));
            }
            TemporalObject::PlainDate { date, calendar } => {
                self.highlighted(&format!("{:04}-{:02}-{:02}", date.year, date.month, date.day));
                self.field("calendar", &Value::Object(*calendar));
            }
            TemporalObject::PlainDateTime {
                date,
                time,
                calendar,
            } => {
                self.highlighted(&format!(
                    "{:04}-{:02}-{:02} {}",
                    date.year,
                    date.month,
                    date.day,
                    clock(time)
                ));
                self.field("calendar", &Value::Object(*calendar));
            }
            TemporalObject::PlainMonthDay {
                month,
                day,
                calendar,
                ..
            } => {
                // 基準年は表示しない
                self.highlighted(&format!("{:02}-{:02}", month, day));
                self.field("calendar", &Value::Object(*calendar));
            }
            TemporalObject::PlainTime { time, calendar } => {
                self.highlighted(&clock(time));
                self.field("calendar", &Value::Object(*calendar));
            }
            TemporalObject::PlainYearMonth {
                year,
                month,
                calendar,
                ..
            } => {
                self.highlighted(&format!("{:04}-{:02}", year, month));
                self.field("calendar", &Value::Object(*calendar));
            }
            TemporalObject::TimeZone {
                identifier,
                offset_nanoseconds,
            } => {
                self.push(" ");
                self.value(&Value::String(identifier.clone()));
                if let Some(offset) = offset_nanoseconds {
                    self.number_field("offset (ns)", *offset);
                }
            }
            TemporalObject::ZonedDateTime {
                nanoseconds,
                time_zone,
                calendar,
            } => {
                self.field("epochNanoseconds", &Value::BigInt(nanoseconds.clone()));
                self.field("timeZone", &Value::Object(*time_zone));
                self.field("calendar", &Value::Object(*calendar));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::{test_util, Interpreter};
    use crate::repl::printer::render;
    use crate::repl::util::strip_ansi;

    fn shown(src: &str) -> String {
        let mut interp = Interpreter::headless();
        let value = test_util::eval(&mut interp, src).expect("eval");
        strip_ansi(&render(&interp.heap, &value))
    }

    #[test]
    fn plain_date_shows_iso_fields_and_calendar() {
        assert_eq!(
            shown("new Temporal.PlainDate(2021, 7, 6)"),
            "[Temporal.PlainDate] 2021-07-06\n  calendar: [Temporal.Calendar] \"iso8601\""
        );
    }

    #[test]
    fn duration_lists_every_unit() {
        assert_eq!(
            shown("new Temporal.Duration(1, 2, 0, 0, 0, 0, 0, 0, 0, 5)"),
            "[Temporal.Duration] 1 y, 2 M, 0 w, 0 d, 0 h, 0 m, 0 s, 0 ms, 0 us, 5 ns"
        );
    }

    #[test]
    fn plain_time_pads_subsecond_fields() {
        assert_eq!(
            shown("new Temporal.PlainTime(1, 2, 3, 4, 5, 6)"),
            "[Temporal.PlainTime] 01:02:03.004005006\n  calendar: [Temporal.Calendar] \"iso8601\""
        );
    }

    #[test]
    fn zoned_date_time_lists_components() {
        let text = shown("new Temporal.ZonedDateTime(0n, new Temporal.TimeZone('UTC'))");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[Temporal.ZonedDateTime]");
        assert_eq!(lines[1], "  epochNanoseconds: 0");
        assert!(lines[2].starts_with("  timeZone: [Temporal.TimeZone] \"UTC\""), "{}", text);
        assert!(text.contains("calendar: [Temporal.Calendar] \"iso8601\""), "{}", text);
    }
}
