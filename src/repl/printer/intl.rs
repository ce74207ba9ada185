//! Intl 系フォーマッタの描画。未設定（`None`）のスロットは行ごと省略する。

use runtime_heap::intl::{CalendarField, IntlObject, UseGrouping, DURATION_UNIT_NAMES};
use runtime_heap::Value;

use super::Printer;

impl Printer<'_> {
    pub(super) fn intl(&mut self, object: &IntlObject) {
        self.type_tag(object.class_name());
        match object {
            IntlObject::DisplayNames(s) => {
                self.string_field("locale", &s.locale);
                self.string_field("type", &s.type_);
                self.string_field("style", &s.style);
                self.string_field("fallback", &s.fallback);
                self.optional_string_field("languageDisplay", s.language_display.as_deref());
            }
            IntlObject::Locale(s) => {
                self.string_field("locale", &s.locale);
                self.optional_string_field("calendar", s.calendar.as_deref());
                self.optional_string_field("caseFirst", s.case_first.as_deref());
                self.optional_string_field("collation", s.collation.as_deref());
                self.optional_string_field("hourCycle", s.hour_cycle.as_deref());
                self.optional_string_field("numberingSystem", s.numbering_system.as_deref());
                self.field("numeric", &Value::Boolean(s.numeric));
            }
            IntlObject::ListFormat(s) => {
                self.string_field("locale", &s.locale);
                self.string_field("type", &s.type_);
                self.string_field("style", &s.style);
            }
            IntlObject::NumberFormat(s) => {
                self.string_field("locale", &s.locale);
                self.string_field("dataLocale", &s.data_locale);
                self.string_field("numberingSystem", &s.numbering_system);
                self.string_field("style", &s.style);
                self.optional_string_field("currency", s.currency.as_deref());
                self.optional_string_field("currencyDisplay", s.currency_display.as_deref());
                self.optional_string_field("currencySign", s.currency_sign.as_deref());
                self.optional_string_field("unit", s.unit.as_deref());
                self.optional_string_field("unitDisplay", s.unit_display.as_deref());
                self.number_field("minimumIntegerDigits", s.min_integer_digits as f64);
                self.optional_number_field("minimumFractionDigits", s.min_fraction_digits);
                self.optional_number_field("maximumFractionDigits", s.max_fraction_digits);
                self.optional_number_field("minimumSignificantDigits", s.min_significant_digits);
                self.optional_number_field("maximumSignificantDigits", s.max_significant_digits);
                let grouping = match &s.use_grouping {
                    UseGrouping::Mode(mode) => Value::string(mode),
                    UseGrouping::False => Value::Boolean(false),
                };
                self.field("useGrouping", &grouping);
                self.string_field("roundingType", &s.rounding_type);
                self.string_field("roundingMode", &s.rounding_mode);
                self.number_field("roundingIncrement", s.rounding_increment as f64);
                self.string_field("notation", &s.notation);
                self.optional_string_field("compactDisplay", s.compact_display.as_deref());
                self.string_field("signDisplay", &s.sign_display);
                self.string_field("trailingZeroDisplay", &s.trailing_zero_display);
            }
            IntlObject::DateTimeFormat(s) => {
                self.string_field("locale", &s.locale);
                self.string_field("pattern", &s.pattern);
                self.string_field("calendar", &s.calendar);
                self.string_field("numberingSystem", &s.numbering_system);
                self.optional_string_field("hourCycle", s.hour_cycle.as_deref());
                self.string_field("timeZone", &s.time_zone);
                self.optional_string_field("dateStyle", s.date_style.as_deref());
                self.optional_string_field("timeStyle", s.time_style.as_deref());
                for (name, field) in &s.calendar_fields {
                    match field {
                        Some(CalendarField::Style(style)) => self.string_field(name, style),
                        Some(CalendarField::Digits(n)) => self.number_field(name, *n as f64),
                        None => {}
                    }
                }
            }
            IntlObject::RelativeTimeFormat(s) => {
                self.string_field("locale", &s.locale);
                self.string_field("numberingSystem", &s.numbering_system);
                self.string_field("style", &s.style);
                self.string_field("numeric", &s.numeric);
            }
            IntlObject::PluralRules(s) => {
                self.string_field("locale", &s.locale);
                self.string_field("type", &s.type_);
                self.number_field("minimumIntegerDigits", s.min_integer_digits as f64);
                self.optional_number_field("minimumFractionDigits", s.min_fraction_digits);
                self.optional_number_field("maximumFractionDigits", s.max_fraction_digits);
                self.optional_number_field("minimumSignificantDigits", s.min_significant_digits);
                self.optional_number_field("maximumSignificantDigits", s.max_significant_digits);
                self.string_field("roundingType", &s.rounding_type);
            }
            IntlObject::Collator(s) => {
                self.string_field("locale", &s.locale);
                self.string_field("usage", &s.usage);
                self.string_field("sensitivity", &s.sensitivity);
                self.string_field("caseFirst", &s.case_first);
                self.string_field("collation", &s.collation);
                self.field("ignorePunctuation", &Value::Boolean(s.ignore_punctuation));
                self.field("numeric", &Value::Boolean(s.numeric));
            }
            IntlObject::Segmenter(s) => {
                self.string_field("locale", &s.locale);
                self.string_field("granularity", &s.granularity);
            }
            IntlObject::Segments { string, segmenter } => {
                self.string_field("string", string);
                self.field("segmenter", &Value::Object(*segmenter));
            }
            IntlObject::DurationFormat(s) => {
                self.string_field("locale", &s.locale);
                self.string_field("dataLocale", &s.data_locale);
                self.string_field("numberingSystem", &s.numbering_system);
                self.string_field("style", &s.style);
                for (name, unit) in DURATION_UNIT_NAMES.iter().zip(&s.units) {
                    self.string_field(name, &unit.style);
                    self.string_field(&format!("{}Display", name), &unit.display);
                }
                self.optional_number_field("fractionalDigits", s.fractional_digits);
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
    fn list_format_shows_resolved_options() {
        assert_eq!(
            shown("new Intl.ListFormat('en', { type: 'disjunction' })"),
            "[Intl.ListFormat]\n  locale: \"en\"\n  type: \"disjunction\"\n  style: \"long\""
        );
    }

    #[test]
    /// 未設定の項目は行ごと出ない。
    fn unset_fields_are_omitted() {
        let text = shown("new Intl.NumberFormat('en')");
        assert!(text.contains("\n  minimumIntegerDigits: 1"), "{}", text);
        assert!(!text.contains("currency"), "{}", text);
        assert!(!text.contains("compactDisplay"), "{}", text);

        let text = shown("new Intl.Locale('en-US')");
        assert!(text.starts_with("[Intl.Locale]\n  locale: \"en-US\""), "{}", text);
        assert!(!text.contains("calendar"), "{}", text);
        assert!(text.ends_with("numeric: false"), "{}", text);
    }

    #[test]
    fn segmenter_fields() {
        assert_eq!(
            shown("new Intl.Segmenter('en', { granularity: 'word' })"),
            "[Intl.Segmenter]\n  locale: \"en\"\n  granularity: \"word\""
        );
    }
}
