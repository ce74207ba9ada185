// パス: src/interpreter/builtins/intl.rs
// 役割: Intl 名前空間のフォーマッタ群
// 意図: ロケールデータは持たず、オプションを既定値込みで解決して内部スロットに保持する。整形は英語の規則だけ
// 関連ファイル: runtime_heap/src/intl.rs, src/repl/printer/intl.rs

use runtime_heap::intl::{
    CalendarField, CollatorSlots, DateTimeFormatSlots, DisplayNamesSlots, DurationFormatSlots, DurationUnitOptions,
    IntlObject, ListFormatSlots, LocaleSlots, NumberFormatSlots, PluralRulesSlots, RelativeTimeFormatSlots,
    SegmenterSlots, UseGrouping, CALENDAR_FIELD_NAMES, DURATION_UNIT_NAMES,
};
use runtime_heap::{Attributes, ObjectId, ObjectKind, Property, PropertyKey, Value};

use super::{define_global, option_bool, option_choice, option_number, option_string, require_new};
use crate::interpreter::{arg, Interpreter, JsResult};

const DEFAULT_LOCALE: &str = "en-US";

/// BCP 47 タグの大文字小文字を正規化する。形式が崩れていれば `None`。
fn canonicalize_tag(tag: &str) -> Option<String> {
    let mut out: Vec<String> = Vec::new();
    for (i, part) in tag.split(['-', '_']).enumerate() {
        if part.is_empty() || part.len() > 8 || !part.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }
        let canonical = if i == 0 {
            if !(2..=3).contains(&part.len()) && !(5..=8).contains(&part.len()) {
                return None;
            }
            if !part.bytes().all(|b| b.is_ascii_alphabetic()) {
                return None;
            }
            part.to_ascii_lowercase()
        } else if part.len() == 4 && part.bytes().all(|b| b.is_ascii_alphabetic()) && out.len() == 1 {
            let lower = part.to_ascii_lowercase();
            lower[..1].to_ascii_uppercase() + &lower[1..]
        } else if part.len() == 2 && part.bytes().all(|b| b.is_ascii_alphabetic()) {
            part.to_ascii_uppercase()
        } else {
            part.to_ascii_lowercase()
        };
        out.push(canonical);
    }
    Some(out.join("-"))
}

fn canonical_or_throw(interp: &mut Interpreter, tag: &str) -> JsResult<String> {
    match canonicalize_tag(tag) {
        Some(tag) => Ok(tag),
        None => Err(interp.range_error(format!("{} is not a structurally valid language tag", tag))),
    }
}

/// ロケール引数（文字列・配列・省略）を 1 つのタグへ解決する。
fn resolve_locale(interp: &mut Interpreter, locales: &Value) -> JsResult<String> {
    match locales {
        Value::Undefined => Ok(DEFAULT_LOCALE.into()),
        Value::String(s) => canonical_or_throw(interp, s),
        Value::Object(id) => {
            if let ObjectKind::Intl(IntlObject::Locale(slots)) = interp.heap.kind(*id) {
                return Ok(slots.locale.clone());
            }
            let list = interp.array_like_to_vec(locales)?;
            match list.first() {
                Some(first) => {
                    let tag = interp.to_string(first)?;
                    canonical_or_throw(interp, &tag)
                }
                None => Ok(DEFAULT_LOCALE.into()),
            }
        }
        _ => Err(interp.type_error("Incorrect locale information provided")),
    }
}

fn options_object(interp: &mut Interpreter, options: &Value) -> JsResult<Value> {
    match options {
        Value::Undefined | Value::Object(_) => Ok(options.clone()),
        other => {
            let shown = interp.heap.display_string(other);
            Err(interp.type_error(format!("Options argument {} is not an object", shown)))
        }
    }
}

fn choice(
    interp: &mut Interpreter,
    options: &Value,
    name: &str,
    allowed: &[&str],
    fallback: &str,
) -> JsResult<String> {
    Ok(option_choice(interp, options, name, allowed, Some(fallback))?.unwrap_or_else(|| fallback.to_string()))
}

fn digits(interp: &mut Interpreter, options: &Value, name: &str, min: f64, max: f64) -> JsResult<Option<u32>> {
    Ok(option_number(interp, options, name, min, max)?.map(|n| n as u32))
}

fn slots_of(interp: &mut Interpreter, this: &Value, class: &str) -> JsResult<IntlObject> {
    if let Value::Object(id) = this {
        if let ObjectKind::Intl(object) = interp.heap.kind(*id) {
            if object.class_name() == class {
                return Ok(object.clone());
            }
        }
    }
    Err(interp.type_error(format!("this is not an {}", class)))
}

fn alloc_intl(interp: &mut Interpreter, class: &'static str, object: IntlObject) -> Value {
    let proto = interp.constructing_prototype(class);
    Value::Object(interp.heap.alloc(ObjectKind::Intl(object), Some(proto)))
}

/// `Intl.X` のプロトタイプとコンストラクタを作り、名前空間に置く。
fn define_class(
    interp: &mut Interpreter,
    namespace: ObjectId,
    class: &'static str,
    f: impl Fn(&mut Interpreter, Value, &[Value]) -> JsResult<Value> + 'static,
) -> ObjectId {
    let short = class.trim_start_matches("Intl.");
    let proto = interp.new_prototype(class, ObjectKind::Ordinary);
    let ctor = interp.native_constructor(short, 0, proto, move |interp, this, args| {
        require_new(interp, class)?;
        f(interp, this, args)
    });
    interp.define_value(namespace, short, Value::Object(ctor));
    let tag = interp.well_known.to_string_tag;
    interp.heap.object_mut(proto).define(
        PropertyKey::Symbol(tag),
        Property::data(Value::string(class), Attributes::CONFIGURABLE),
    );
    proto
}

fn display_names(interp: &mut Interpreter, args: &[Value]) -> JsResult<Value> {
    let locale = resolve_locale(interp, &arg(args, 0))?;
    let options = options_object(interp, &arg(args, 1))?;
    let style = choice(interp, &options, "style", &["narrow", "short", "long"], "long")?;
    let type_ = option_choice(
        interp,
        &options,
        "type",
        &["language", "region", "script", "currency", "calendar", "dateTimeField"],
        None,
    )?;
    let Some(type_) = type_ else {
        return Err(interp.type_error("Required option type is missing"));
    };
    let fallback = choice(interp, &options, "fallback", &["code", "none"], "code")?;
    let language_display = if type_ == "language" {
        Some(choice(interp, &options, "languageDisplay", &["dialect", "standard"], "dialect")?)
    } else {
        None
    };
    Ok(alloc_intl(
        interp,
        "Intl.DisplayNames",
        IntlObject::DisplayNames(DisplayNamesSlots {
            locale,
            type_,
            style,
            fallback,
            language_display,
        }),
    ))
}

fn locale(interp: &mut Interpreter, args: &[Value]) -> JsResult<Value> {
    let tag = match arg(args, 0) {
        Value::String(s) => s.to_string(),
        Value::Object(id) => match interp.heap.kind(id) {
            ObjectKind::Intl(IntlObject::Locale(slots)) => slots.locale.clone(),
            _ => interp.to_string(&Value::Object(id))?.to_string(),
        },
        _ => return Err(interp.type_error("First argument to Intl.Locale constructor can't be empty or missing")),
    };
    let locale = canonical_or_throw(interp, &tag)?;
    let options = options_object(interp, &arg(args, 1))?;
    let calendar = option_string(interp, &options, "calendar")?;
    let case_first = option_choice(interp, &options, "caseFirst", &["upper", "lower", "false"], None)?;
    let collation = option_string(interp, &options, "collation")?;
    let hour_cycle = option_choice(interp, &options, "hourCycle", &["h11", "h12", "h23", "h24"], None)?;
    let numbering_system = option_string(interp, &options, "numberingSystem")?;
    let numeric = option_bool(interp, &options, "numeric")?.unwrap_or(false);
    Ok(alloc_intl(
        interp,
        "Intl.Locale",
        IntlObject::Locale(LocaleSlots {
            locale,
            calendar,
            case_first,
            collation,
            hour_cycle,
            numbering_system,
            numeric,
        }),
    ))
}

fn list_format(interp: &mut Interpreter, args: &[Value]) -> JsResult<Value> {
    let locale = resolve_locale(interp, &arg(args, 0))?;
    let options = options_object(interp, &arg(args, 1))?;
    let type_ = choice(interp, &options, "type", &["conjunction", "disjunction", "unit"], "conjunction")?;
    let style = choice(interp, &options, "style", &["long", "short", "narrow"], "long")?;
    Ok(alloc_intl(
        interp,
        "Intl.ListFormat",
        IntlObject::ListFormat(ListFormatSlots { locale, type_, style }),
    ))
}

/// 英語の列挙。`a, b, and c` / `a, b, or c` / `a, b, c`。
fn join_list(slots: &ListFormatSlots, items: &[String]) -> String {
    let word = match (slots.type_.as_str(), slots.style.as_str()) {
        ("conjunction", "long") => Some("and"),
        ("conjunction", _) => Some("&"),
        ("disjunction", _) => Some("or"),
        _ => None,
    };
    let separator = if slots.type_ == "unit" && slots.style == "narrow" { " " } else { ", " };
    match (items, word) {
        ([], _) => String::new(),
        ([only], _) => only.clone(),
        ([a, b], Some(w)) => format!("{} {} {}", a, w, b),
        ([init @ .., last], Some(w)) => format!("{}, {} {}", init.join(", "), w, last),
        (all, None) => all.join(separator),
    }
}

fn number_format(interp: &mut Interpreter, args: &[Value]) -> JsResult<Value> {
    let locale = resolve_locale(interp, &arg(args, 0))?;
    let options = options_object(interp, &arg(args, 1))?;
    let numbering_system = option_string(interp, &options, "numberingSystem")?.unwrap_or_else(|| "latn".into());
    let style = choice(interp, &options, "style", &["decimal", "percent", "currency", "unit"], "decimal")?;
    let currency = option_string(interp, &options, "currency")?.map(|c| c.to_ascii_uppercase());
    if let Some(code) = &currency {
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(interp.range_error(format!("Invalid currency code : {}", code)));
        }
    }
    let unit = option_string(interp, &options, "unit")?;
    let (currency, currency_display, currency_sign) = if style == "currency" {
        let Some(code) = currency else {
            return Err(interp.type_error("Option currency must be present when style is currency"));
        };
        let display = choice(interp, &options, "currencyDisplay", &["code", "symbol", "narrowSymbol", "name"], "symbol")?;
        let sign = choice(interp, &options, "currencySign", &["standard", "accounting"], "standard")?;
        (Some(code), Some(display), Some(sign))
    } else {
        (None, None, None)
    };
    let (unit, unit_display) = if style == "unit" {
        let Some(unit) = unit else {
            return Err(interp.type_error("Option unit must be present when style is unit"));
        };
        let display = choice(interp, &options, "unitDisplay", &["short", "narrow", "long"], "short")?;
        (Some(unit), Some(display))
    } else {
        (None, None)
    };
    let notation = choice(interp, &options, "notation", &["standard", "scientific", "engineering", "compact"], "standard")?;
    let min_integer_digits = digits(interp, &options, "minimumIntegerDigits", 1.0, 21.0)?.unwrap_or(1);
    let min_fraction = digits(interp, &options, "minimumFractionDigits", 0.0, 100.0)?;
    let max_fraction = digits(interp, &options, "maximumFractionDigits", 0.0, 100.0)?;
    let min_significant = digits(interp, &options, "minimumSignificantDigits", 1.0, 21.0)?;
    let max_significant = digits(interp, &options, "maximumSignificantDigits", 1.0, 21.0)?;
    let significant = min_significant.is_some() || max_significant.is_some();
    let (default_min, default_max) = match style.as_str() {
        "currency" => (2, 2),
        "percent" => (0, 0),
        _ => (0, 3),
    };
    let (min_fraction_digits, max_fraction_digits, min_significant_digits, max_significant_digits) = if significant {
        let min = min_significant.unwrap_or(1);
        let max = max_significant.unwrap_or(21);
        if min > max {
            return Err(interp.range_error("maximumSignificantDigits value is out of range"));
        }
        (None, None, Some(min), Some(max))
    } else if notation == "compact" && min_fraction.is_none() && max_fraction.is_none() {
        (None, None, None, None)
    } else {
        let min = min_fraction.unwrap_or(default_min.min(max_fraction.unwrap_or(default_min)));
        let max = max_fraction.unwrap_or(default_max.max(min));
        if min > max {
            return Err(interp.range_error("maximumFractionDigits value is out of range"));
        }
        (Some(min), Some(max), None, None)
    };
    let rounding_type = if significant {
        "significantDigits"
    } else if notation == "compact" && min_fraction_digits.is_none() {
        "compactRounding"
    } else {
        "fractionDigits"
    };
    let compact_display = if notation == "compact" {
        Some(choice(interp, &options, "compactDisplay", &["short", "long"], "short")?)
    } else {
        None
    };
    let use_grouping = match options.is_object() {
        true => {
            let v = interp.get_named(&options, "useGrouping")?;
            match v {
                Value::Undefined if notation == "compact" => UseGrouping::Mode("min2".into()),
                Value::Undefined => UseGrouping::default(),
                Value::Boolean(false) => UseGrouping::False,
                Value::Boolean(true) => UseGrouping::Mode("always".into()),
                other => {
                    let mode = interp.to_string(&other)?.to_string();
                    if !["always", "auto", "min2"].contains(&mode.as_str()) {
                        return Err(interp.range_error(format!("{} is not a valid value for option useGrouping", mode)));
                    }
                    UseGrouping::Mode(mode)
                }
            }
        }
        false => UseGrouping::default(),
    };
    let rounding_mode = choice(
        interp,
        &options,
        "roundingMode",
        &["ceil", "floor", "expand", "trunc", "halfCeil", "halfFloor", "halfExpand", "halfTrunc", "halfEven"],
        "halfExpand",
    )?;
    let sign_display = choice(interp, &options, "signDisplay", &["auto", "never", "always", "exceptZero", "negative"], "auto")?;
    let trailing_zero_display = choice(interp, &options, "trailingZeroDisplay", &["auto", "stripIfInteger"], "auto")?;
    Ok(alloc_intl(
        interp,
        "Intl.NumberFormat",
        IntlObject::NumberFormat(Box::new(NumberFormatSlots {
            data_locale: locale.clone(),
            locale,
            numbering_system,
            style,
            currency,
            currency_display,
            currency_sign,
            unit,
            unit_display,
            min_integer_digits,
            min_fraction_digits,
            max_fraction_digits,
            min_significant_digits,
            max_significant_digits,
            use_grouping,
            rounding_type: rounding_type.into(),
            rounding_mode,
            rounding_increment: 1,
            notation,
            compact_display,
            sign_display,
            trailing_zero_display,
        })),
    ))
}

/// 整数部に 3 桁ごとのカンマを入れる。
fn group_thousands(integer: &str) -> String {
    let mut out = String::new();
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn format_number(slots: &NumberFormatSlots, x: f64) -> String {
    if x.is_nan() {
        return "NaN".into();
    }
    let scaled = if slots.style == "percent" { x * 100.0 } else { x };
    let body = if scaled.is_infinite() {
        "∞".to_string()
    } else if let (Some(_), Some(max)) = (slots.min_significant_digits, slots.max_significant_digits) {
        let magnitude = if scaled == 0.0 { 0 } else { scaled.abs().log10().floor() as i32 };
        let decimals = (max as i32 - 1 - magnitude).max(0) as usize;
        let rounded = format!("{:.*}", decimals, scaled.abs());
        if rounded.contains('.') {
            rounded.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            rounded
        }
    } else {
        let max = slots.max_fraction_digits.unwrap_or(0) as usize;
        let min = slots.min_fraction_digits.unwrap_or(0) as usize;
        let mut text = format!("{:.*}", max, scaled.abs());
        if let Some(dot) = text.find('.') {
            while text.len() - dot - 1 > min && text.ends_with('0') {
                text.pop();
            }
            if text.ends_with('.') {
                text.pop();
            }
        }
        text
    };
    let (integer, fraction) = match body.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (body, None),
    };
    let integer = format!("{:0>width$}", integer, width = slots.min_integer_digits as usize);
    let grouping = match &slots.use_grouping {
        UseGrouping::False => false,
        UseGrouping::Mode(mode) if mode == "min2" => integer.len() >= 5,
        UseGrouping::Mode(_) => true,
    };
    let mut digits = if grouping && integer.bytes().all(|b| b.is_ascii_digit()) {
        group_thousands(&integer)
    } else {
        integer
    };
    if let Some(fraction) = fraction {
        digits.push('.');
        digits.push_str(&fraction);
    }
    let negative = x < 0.0 || (x == 0.0 && x.is_sign_negative() && slots.sign_display != "auto");
    let sign = match (slots.sign_display.as_str(), negative) {
        ("never", _) => "",
        (_, true) => "-",
        ("always", false) => "+",
        ("exceptZero", false) if x != 0.0 => "+",
        _ => "",
    };
    match slots.style.as_str() {
        "percent" => format!("{}{}%", sign, digits),
        "currency" => {
            let code = slots.currency.as_deref().unwrap_or("");
            let symbol = match (code, slots.currency_display.as_deref()) {
                ("USD", Some("symbol" | "narrowSymbol")) => "$".to_string(),
                ("EUR", Some("symbol" | "narrowSymbol")) => "€".to_string(),
                ("JPY", Some("symbol" | "narrowSymbol")) => "¥".to_string(),
                (code, _) => format!("{}\u{a0}", code),
            };
            format!("{}{}{}", sign, symbol, digits)
        }
        "unit" => format!("{}{} {}", sign, digits, slots.unit.as_deref().unwrap_or("")),
        _ => format!("{}{}", sign, digits),
    }
}

fn date_time_format(interp: &mut Interpreter, args: &[Value]) -> JsResult<Value> {
    let locale = resolve_locale(interp, &arg(args, 0))?;
    let options = options_object(interp, &arg(args, 1))?;
    let calendar = option_string(interp, &options, "calendar")?.unwrap_or_else(|| "gregory".into());
    let numbering_system = option_string(interp, &options, "numberingSystem")?.unwrap_or_else(|| "latn".into());
    let hour12 = option_bool(interp, &options, "hour12")?;
    let hour_cycle_option = option_choice(interp, &options, "hourCycle", &["h11", "h12", "h23", "h24"], None)?;
    let time_zone = match option_string(interp, &options, "timeZone")? {
        None => "UTC".to_string(),
        Some(tz) if tz.eq_ignore_ascii_case("utc") => "UTC".to_string(),
        Some(tz) if tz.contains('/') => tz,
        Some(tz) => return Err(interp.range_error(format!("{} is not a valid value for option timeZone", tz))),
    };
    let styles = ["full", "long", "medium", "short"];
    let date_style = option_choice(interp, &options, "dateStyle", &styles, None)?;
    let time_style = option_choice(interp, &options, "timeStyle", &styles, None)?;

    let mut calendar_fields: Vec<(&'static str, Option<CalendarField>)> = Vec::new();
    for name in CALENDAR_FIELD_NAMES {
        let field = match name {
            "fractionalSecondDigits" => digits(interp, &options, name, 1.0, 3.0)?.map(CalendarField::Digits),
            "weekday" | "era" | "dayPeriod" => {
                option_choice(interp, &options, name, &["narrow", "short", "long"], None)?.map(CalendarField::Style)
            }
            "month" => option_choice(interp, &options, name, &["numeric", "2-digit", "narrow", "short", "long"], None)?
                .map(CalendarField::Style),
            "timeZoneName" => option_choice(
                interp,
                &options,
                name,
                &["short", "long", "shortOffset", "longOffset", "shortGeneric", "longGeneric"],
                None,
            )?
            .map(CalendarField::Style),
            _ => option_choice(interp, &options, name, &["numeric", "2-digit"], None)?.map(CalendarField::Style),
        };
        calendar_fields.push((name, field));
    }
    let explicit = calendar_fields.iter().any(|(_, f)| f.is_some());
    if explicit && (date_style.is_some() || time_style.is_some()) {
        return Err(interp.type_error("Can't set option dateStyle or timeStyle when other date/time options are present"));
    }
    if !explicit && date_style.is_none() && time_style.is_none() {
        for (name, field) in calendar_fields.iter_mut() {
            if matches!(*name, "year" | "month" | "day") {
                *field = Some(CalendarField::Style("numeric".into()));
            }
        }
    }
    let has_hour = time_style.is_some() || calendar_fields.iter().any(|(n, f)| *n == "hour" && f.is_some());
    let hour_cycle = if has_hour {
        Some(match (hour12, hour_cycle_option) {
            (Some(true), _) => "h12".to_string(),
            (Some(false), _) => "h23".to_string(),
            (None, Some(cycle)) => cycle,
            (None, None) => "h12".to_string(),
        })
    } else {
        None
    };
    let pattern = date_time_pattern(&calendar_fields, date_style.as_deref(), time_style.as_deref(), hour_cycle.as_deref());
    Ok(alloc_intl(
        interp,
        "Intl.DateTimeFormat",
        IntlObject::DateTimeFormat(Box::new(DateTimeFormatSlots {
            locale,
            pattern,
            calendar,
            numbering_system,
            hour_cycle,
            time_zone,
            date_style,
            time_style,
            calendar_fields,
        })),
    ))
}

/// 解決済みフィールドから `{month}/{day}/{year}, {hour}:{minute}` 形式のパターンを作る。
fn date_time_pattern(
    fields: &[(&'static str, Option<CalendarField>)],
    date_style: Option<&str>,
    time_style: Option<&str>,
    hour_cycle: Option<&str>,
) -> String {
    let has = |name: &str| fields.iter().any(|(n, f)| *n == name && f.is_some());
    let mut date: Vec<&str> = Vec::new();
    match date_style {
        Some("full") => date.push("{weekday}, {month} {day}, {year}"),
        Some("long") => date.push("{month} {day}, {year}"),
        Some("medium") => date.push("{month} {day}, {year}"),
        Some(_) => date.push("{month}/{day}/{year}"),
        None => {
            for name in ["month", "day", "year"] {
                if has(name) {
                    date.push(match name {
                        "month" => "{month}",
                        "day" => "{day}",
                        _ => "{year}",
                    });
                }
            }
        }
    }
    let mut time: Vec<&str> = Vec::new();
    match time_style {
        Some("short") => time.extend(["{hour}", "{minute}"]),
        Some(_) => time.extend(["{hour}", "{minute}", "{second}"]),
        None => {
            for (name, placeholder) in [("hour", "{hour}"), ("minute", "{minute}"), ("second", "{second}")] {
                if has(name) {
                    time.push(placeholder);
                }
            }
        }
    }
    let date_text = if date_style.is_some() { date.concat() } else { date.join("/") };
    let mut time_text = time.join(":");
    if !time_text.is_empty() && matches!(hour_cycle, Some("h11" | "h12")) {
        time_text.push_str(" {ampm}");
    }
    match (date_text.is_empty(), time_text.is_empty()) {
        (false, false) => format!("{}, {}", date_text, time_text),
        (false, true) => date_text,
        (true, _) => time_text,
    }
}

fn format_date(slots: &DateTimeFormatSlots, time_value: f64) -> Option<String> {
    use chrono::{Datelike, Timelike};
    let dt = chrono::DateTime::from_timestamp_millis(time_value as i64)?;
    let twelve = matches!(slots.hour_cycle.as_deref(), Some("h11" | "h12"));
    let hour = if twelve {
        match dt.hour() % 12 {
            0 if slots.hour_cycle.as_deref() == Some("h12") => 12,
            h => h,
        }
    } else {
        dt.hour()
    };
    let month_style = slots
        .calendar_fields
        .iter()
        .find(|(n, _)| *n == "month")
        .and_then(|(_, f)| f.clone());
    let month = match (month_style, slots.date_style.as_deref()) {
        (Some(CalendarField::Style(s)), _) if s == "long" => dt.format("%B").to_string(),
        (Some(CalendarField::Style(s)), _) if s == "short" => dt.format("%b").to_string(),
        (Some(CalendarField::Style(s)), _) if s == "2-digit" => format!("{:02}", dt.month()),
        (_, Some("full" | "long")) => dt.format("%B").to_string(),
        (_, Some("medium")) => dt.format("%b").to_string(),
        _ => dt.month().to_string(),
    };
    let replacements = [
        ("{weekday}", dt.format("%A").to_string()),
        ("{month}", month),
        ("{day}", dt.day().to_string()),
        ("{year}", dt.year().to_string()),
        ("{hour}", hour.to_string()),
        ("{minute}", format!("{:02}", dt.minute())),
        ("{second}", format!("{:02}", dt.second())),
        ("{ampm}", if dt.hour() < 12 { "AM".into() } else { "PM".into() }),
    ];
    let mut out = slots.pattern.clone();
    for (placeholder, value) in replacements {
        out = out.replace(placeholder, &value);
    }
    Some(out)
}

fn relative_time_format(interp: &mut Interpreter, args: &[Value]) -> JsResult<Value> {
    let locale = resolve_locale(interp, &arg(args, 0))?;
    let options = options_object(interp, &arg(args, 1))?;
    let numbering_system = option_string(interp, &options, "numberingSystem")?.unwrap_or_else(|| "latn".into());
    let style = choice(interp, &options, "style", &["long", "short", "narrow"], "long")?;
    let numeric = choice(interp, &options, "numeric", &["always", "auto"], "always")?;
    Ok(alloc_intl(
        interp,
        "Intl.RelativeTimeFormat",
        IntlObject::RelativeTimeFormat(RelativeTimeFormatSlots {
            locale,
            numbering_system,
            style,
            numeric,
        }),
    ))
}

fn format_relative(slots: &RelativeTimeFormatSlots, value: f64, unit: &str) -> Option<String> {
    let singular = unit.trim_end_matches('s');
    if !["second", "minute", "hour", "day", "week", "month", "quarter", "year"].contains(&singular) {
        return None;
    }
    if slots.numeric == "auto" {
        let phrase = match (singular, value) {
            ("day", v) if v == 0.0 => Some("today".to_string()),
            ("day", v) if v == 1.0 => Some("tomorrow".to_string()),
            ("day", v) if v == -1.0 => Some("yesterday".to_string()),
            ("second", v) if v == 0.0 => Some("now".to_string()),
            (u, v) if v == 0.0 => Some(format!("this {}", u)),
            (u, v) if v == 1.0 => Some(format!("next {}", u)),
            (u, v) if v == -1.0 => Some(format!("last {}", u)),
            _ => None,
        };
        if phrase.is_some() {
            return phrase;
        }
    }
    let amount = value.abs();
    let shown = runtime_heap::number_to_string(amount);
    let noun = if amount == 1.0 {
        singular.to_string()
    } else {
        format!("{}s", singular)
    };
    if value < 0.0 || (value == 0.0 && value.is_sign_negative()) {
        Some(format!("{} {} ago", shown, noun))
    } else {
        Some(format!("in {} {}", shown, noun))
    }
}

fn plural_rules(interp: &mut Interpreter, args: &[Value]) -> JsResult<Value> {
    let locale = resolve_locale(interp, &arg(args, 0))?;
    let options = options_object(interp, &arg(args, 1))?;
    let type_ = choice(interp, &options, "type", &["cardinal", "ordinal"], "cardinal")?;
    let min_integer_digits = digits(interp, &options, "minimumIntegerDigits", 1.0, 21.0)?.unwrap_or(1);
    let min_significant = digits(interp, &options, "minimumSignificantDigits", 1.0, 21.0)?;
    let max_significant = digits(interp, &options, "maximumSignificantDigits", 1.0, 21.0)?;
    let significant = min_significant.is_some() || max_significant.is_some();
    let slots = if significant {
        PluralRulesSlots {
            locale,
            type_,
            min_integer_digits,
            min_fraction_digits: None,
            max_fraction_digits: None,
            min_significant_digits: Some(min_significant.unwrap_or(1)),
            max_significant_digits: Some(max_significant.unwrap_or(21)),
            rounding_type: "significantDigits".into(),
        }
    } else {
        let min = digits(interp, &options, "minimumFractionDigits", 0.0, 100.0)?.unwrap_or(0);
        let max = digits(interp, &options, "maximumFractionDigits", 0.0, 100.0)?.unwrap_or(min.max(3));
        PluralRulesSlots {
            locale,
            type_,
            min_integer_digits,
            min_fraction_digits: Some(min),
            max_fraction_digits: Some(max),
            min_significant_digits: None,
            max_significant_digits: None,
            rounding_type: "fractionDigits".into(),
        }
    };
    Ok(alloc_intl(interp, "Intl.PluralRules", IntlObject::PluralRules(slots)))
}

/// 英語の複数形カテゴリ。
fn plural_category(slots: &PluralRulesSlots, n: f64) -> &'static str {
    if slots.type_ == "ordinal" {
        if n.fract() != 0.0 || !n.is_finite() {
            return "other";
        }
        let i = n.abs() as u64;
        return match (i % 10, i % 100) {
            (1, r) if r != 11 => "one",
            (2, r) if r != 12 => "two",
            (3, r) if r != 13 => "few",
            _ => "other",
        };
    }
    if n.abs() == 1.0 {
        "one"
    } else {
        "other"
    }
}

fn collator(interp: &mut Interpreter, args: &[Value]) -> JsResult<Value> {
    let locale = resolve_locale(interp, &arg(args, 0))?;
    let options = options_object(interp, &arg(args, 1))?;
    let usage = choice(interp, &options, "usage", &["sort", "search"], "sort")?;
    let sensitivity = choice(interp, &options, "sensitivity", &["base", "accent", "case", "variant"], "variant")?;
    let case_first = choice(interp, &options, "caseFirst", &["upper", "lower", "false"], "false")?;
    let collation = option_string(interp, &options, "collation")?.unwrap_or_else(|| "default".into());
    let ignore_punctuation = option_bool(interp, &options, "ignorePunctuation")?.unwrap_or(false);
    let numeric = option_bool(interp, &options, "numeric")?.unwrap_or(false);
    Ok(alloc_intl(
        interp,
        "Intl.Collator",
        IntlObject::Collator(CollatorSlots {
            locale,
            usage,
            sensitivity,
            case_first,
            collation,
            ignore_punctuation,
            numeric,
        }),
    ))
}

/// 数字列を数値として比べる分割。
fn collation_key(slots: &CollatorSlots, s: &str) -> Vec<(bool, String)> {
    let mut chunks: Vec<(bool, String)> = Vec::new();
    for c in s.chars() {
        if slots.ignore_punctuation && c.is_ascii_punctuation() {
            continue;
        }
        let c = if matches!(slots.sensitivity.as_str(), "base" | "accent") {
            c.to_lowercase().next().unwrap_or(c)
        } else {
            c
        };
        let digit = slots.numeric && c.is_ascii_digit();
        match chunks.last_mut() {
            Some((true, text)) if digit => text.push(c),
            _ => chunks.push((digit, c.to_string())),
        }
    }
    chunks
}

fn compare_strings(slots: &CollatorSlots, a: &str, b: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    let (ka, kb) = (collation_key(slots, a), collation_key(slots, b));
    for (x, y) in ka.iter().zip(kb.iter()) {
        let ord = match (x, y) {
            ((true, m), (true, n)) => {
                let (m, n) = (m.trim_start_matches('0'), n.trim_start_matches('0'));
                m.len().cmp(&n.len()).then_with(|| m.cmp(n))
            }
            ((_, m), (_, n)) => m
                .to_lowercase()
                .cmp(&n.to_lowercase())
                .then_with(|| match slots.case_first.as_str() {
                    "upper" => m.cmp(n),
                    _ => m.cmp(n).reverse(),
                }),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    ka.len().cmp(&kb.len())
}

fn segmenter(interp: &mut Interpreter, args: &[Value]) -> JsResult<Value> {
    let locale = resolve_locale(interp, &arg(args, 0))?;
    let options = options_object(interp, &arg(args, 1))?;
    let granularity = choice(interp, &options, "granularity", &["grapheme", "word", "sentence"], "grapheme")?;
    Ok(alloc_intl(
        interp,
        "Intl.Segmenter",
        IntlObject::Segmenter(SegmenterSlots { locale, granularity }),
    ))
}

/// 粒度ごとに (開始位置, 部分文字列, 単語らしいか) を返す。位置はバイト単位。
fn split_segments(granularity: &str, text: &str) -> Vec<(usize, String, bool)> {
    let mut out: Vec<(usize, String, bool)> = Vec::new();
    match granularity {
        "word" => {
            let mut start = 0;
            let mut current: Option<bool> = None;
            for (i, c) in text.char_indices() {
                let wordlike = c.is_alphanumeric() || c == '_' || c == '\'';
                match current {
                    Some(prev) if prev == wordlike && wordlike => {}
                    Some(prev) => {
                        out.push((start, text[start..i].to_string(), prev));
                        start = i;
                    }
                    None => {}
                }
                current = Some(wordlike);
            }
            if let Some(prev) = current {
                out.push((start, text[start..].to_string(), prev));
            }
        }
        "sentence" => {
            let mut start = 0;
            let chars: Vec<(usize, char)> = text.char_indices().collect();
            for (n, (i, c)) in chars.iter().enumerate() {
                let boundary = matches!(c, '.' | '!' | '?') && chars.get(n + 1).is_some_and(|(_, next)| next.is_whitespace());
                if boundary {
                    let mut end = i + c.len_utf8();
                    let mut k = n + 1;
                    while let Some((j, w)) = chars.get(k).filter(|(_, w)| w.is_whitespace()) {
                        end = j + w.len_utf8();
                        k += 1;
                    }
                    if end > start {
                        out.push((start, text[start..end].to_string(), false));
                        start = end;
                    }
                }
            }
            if start < text.len() {
                out.push((start, text[start..].to_string(), false));
            }
        }
        _ => {
            for (i, c) in text.char_indices() {
                out.push((i, c.to_string(), false));
            }
        }
    }
    out
}

fn duration_format(interp: &mut Interpreter, args: &[Value]) -> JsResult<Value> {
    let locale = resolve_locale(interp, &arg(args, 0))?;
    let options = options_object(interp, &arg(args, 1))?;
    let numbering_system = option_string(interp, &options, "numberingSystem")?.unwrap_or_else(|| "latn".into());
    let style = choice(interp, &options, "style", &["long", "short", "narrow", "digital"], "short")?;
    let mut units = Vec::with_capacity(DURATION_UNIT_NAMES.len());
    for (i, name) in DURATION_UNIT_NAMES.iter().enumerate() {
        let (allowed, digital_default): (&[&str], &str) = match i {
            0..=3 => (&["long", "short", "narrow"], "short"),
            4 => (&["long", "short", "narrow", "numeric", "2-digit"], "numeric"),
            5 | 6 => (&["long", "short", "narrow", "numeric", "2-digit"], "2-digit"),
            _ => (&["long", "short", "narrow", "numeric"], "numeric"),
        };
        let base = if style == "digital" { digital_default } else { style.as_str() };
        let unit_style = choice(interp, &options, name, allowed, base)?;
        let numeric_like = matches!(unit_style.as_str(), "numeric" | "2-digit");
        let display_default = if numeric_like && (4..=6).contains(&i) { "always" } else { "auto" };
        let display = choice(interp, &options, &format!("{}Display", name), &["auto", "always"], display_default)?;
        units.push(DurationUnitOptions {
            style: unit_style,
            display,
        });
    }
    let fractional_digits = digits(interp, &options, "fractionalDigits", 0.0, 9.0)?;
    Ok(alloc_intl(
        interp,
        "Intl.DurationFormat",
        IntlObject::DurationFormat(Box::new(DurationFormatSlots {
            data_locale: locale.clone(),
            locale,
            numbering_system,
            style,
            units,
            fractional_digits,
        })),
    ))
}

fn install_methods(interp: &mut Interpreter, protos: &[(&'static str, ObjectId)]) {
    let proto = |name: &str| protos.iter().find(|(n, _)| *n == name).map(|(_, id)| *id);

    if let Some(p) = proto("Intl.ListFormat") {
        interp.define_method(p, "format", 1, |interp, this, args| {
            let IntlObject::ListFormat(slots) = slots_of(interp, &this, "Intl.ListFormat")? else {
                return Ok(Value::Undefined);
            };
            let mut items = Vec::new();
            for v in interp.iterate_to_vec(&arg(args, 0))? {
                let Value::String(s) = v else {
                    return Err(interp.type_error("Iterable yielded a non-string value"));
                };
                items.push(s.to_string());
            }
            Ok(Value::string(join_list(&slots, &items)))
        });
    }
    if let Some(p) = proto("Intl.NumberFormat") {
        interp.define_method(p, "format", 1, |interp, this, args| {
            let IntlObject::NumberFormat(slots) = slots_of(interp, &this, "Intl.NumberFormat")? else {
                return Ok(Value::Undefined);
            };
            let x = interp.to_number(&arg(args, 0))?;
            Ok(Value::string(format_number(&slots, x)))
        });
    }
    if let Some(p) = proto("Intl.DateTimeFormat") {
        interp.define_method(p, "format", 1, |interp, this, args| {
            let IntlObject::DateTimeFormat(slots) = slots_of(interp, &this, "Intl.DateTimeFormat")? else {
                return Ok(Value::Undefined);
            };
            let time_value = match arg(args, 0) {
                Value::Undefined => chrono::Utc::now().timestamp_millis() as f64,
                Value::Object(id) => match interp.heap.kind(id) {
                    ObjectKind::Date(t) => *t,
                    _ => interp.to_number(&Value::Object(id))?,
                },
                other => interp.to_number(&other)?,
            };
            match format_date(&slots, time_value) {
                Some(text) => Ok(Value::string(text)),
                None => Err(interp.range_error("Invalid time value")),
            }
        });
    }
    if let Some(p) = proto("Intl.RelativeTimeFormat") {
        interp.define_method(p, "format", 2, |interp, this, args| {
            let IntlObject::RelativeTimeFormat(slots) = slots_of(interp, &this, "Intl.RelativeTimeFormat")? else {
                return Ok(Value::Undefined);
            };
            let value = interp.to_number(&arg(args, 0))?;
            let unit = interp.to_string(&arg(args, 1))?;
            if !value.is_finite() {
                return Err(interp.range_error("Value need to be finite number for Intl.RelativeTimeFormat.prototype.format()"));
            }
            match format_relative(&slots, value, &unit) {
                Some(text) => Ok(Value::string(text)),
                None => Err(interp.range_error(format!("Invalid unit argument for format() '{}'", unit))),
            }
        });
    }
    if let Some(p) = proto("Intl.PluralRules") {
        interp.define_method(p, "select", 1, |interp, this, args| {
            let IntlObject::PluralRules(slots) = slots_of(interp, &this, "Intl.PluralRules")? else {
                return Ok(Value::Undefined);
            };
            let n = interp.to_number(&arg(args, 0))?;
            Ok(Value::string(plural_category(&slots, n)))
        });
    }
    if let Some(p) = proto("Intl.Collator") {
        interp.define_getter(p, "compare", |interp, this, _| {
            let IntlObject::Collator(slots) = slots_of(interp, &this, "Intl.Collator")? else {
                return Ok(Value::Undefined);
            };
            let compare = interp.native_function("", 2, move |interp, _, args| {
                let a = interp.to_string(&arg(args, 0))?;
                let b = interp.to_string(&arg(args, 1))?;
                Ok(Value::Number(match compare_strings(&slots, &a, &b) {
                    std::cmp::Ordering::Less => -1.0,
                    std::cmp::Ordering::Equal => 0.0,
                    std::cmp::Ordering::Greater => 1.0,
                }))
            });
            Ok(Value::Object(compare))
        });
    }
    if let Some(p) = proto("Intl.Segmenter") {
        interp.define_method(p, "segment", 1, |interp, this, args| {
            let segmenter = match &this {
                Value::Object(id) => *id,
                _ => return Err(interp.type_error("this is not an Intl.Segmenter")),
            };
            slots_of(interp, &this, "Intl.Segmenter")?;
            let string = interp.to_string(&arg(args, 0))?.to_string();
            let proto = interp.prototype("Segments");
            Ok(Value::Object(interp.heap.alloc(
                ObjectKind::Intl(IntlObject::Segments { string, segmenter }),
                Some(proto),
            )))
        });
    }
    if let Some(p) = proto("Segments") {
        let iterator = interp.well_known.iterator;
        interp.define_symbol_method(p, iterator, "[Symbol.iterator]", |interp, this, _| {
            let IntlObject::Segments { string, segmenter } = slots_of(interp, &this, "Segments")? else {
                return Ok(Value::Undefined);
            };
            let granularity = match interp.heap.kind(segmenter) {
                ObjectKind::Intl(IntlObject::Segmenter(slots)) => slots.granularity.clone(),
                _ => "grapheme".into(),
            };
            let mut values = Vec::new();
            for (start, segment, wordlike) in split_segments(&granularity, &string) {
                let record = interp.heap.alloc_ordinary();
                let index = crate::interpreter::text::byte_to_unit_offset(&string, start);
                interp.create_data_property(record, PropertyKey::from("segment"), Value::string(segment));
                interp.create_data_property(record, PropertyKey::from("index"), Value::Number(index as f64));
                interp.create_data_property(record, PropertyKey::from("input"), Value::string(&string));
                if granularity == "word" {
                    interp.create_data_property(record, PropertyKey::from("isWordLike"), Value::Boolean(wordlike));
                }
                values.push(Value::Object(record));
            }
            Ok(interp.create_values_iterator(values))
        });
    }
    if let Some(p) = proto("Intl.Locale") {
        interp.define_method(p, "toString", 0, |interp, this, _| {
            let IntlObject::Locale(slots) = slots_of(interp, &this, "Intl.Locale")? else {
                return Ok(Value::Undefined);
            };
            Ok(Value::string(slots.locale))
        });
        interp.define_getter(p, "baseName", |interp, this, _| {
            let IntlObject::Locale(slots) = slots_of(interp, &this, "Intl.Locale")? else {
                return Ok(Value::Undefined);
            };
            Ok(Value::string(slots.locale))
        });
        interp.define_getter(p, "language", |interp, this, _| {
            let IntlObject::Locale(slots) = slots_of(interp, &this, "Intl.Locale")? else {
                return Ok(Value::Undefined);
            };
            Ok(Value::string(slots.locale.split('-').next().unwrap_or_default()))
        });
    }
}

pub(super) fn install(interp: &mut Interpreter) {
    let intl = interp.heap.alloc_ordinary();
    define_global(interp, "Intl", Value::Object(intl));
    let tag = interp.well_known.to_string_tag;
    interp.heap.object_mut(intl).define(
        PropertyKey::Symbol(tag),
        Property::data(Value::string("Intl"), Attributes::CONFIGURABLE),
    );

    type Ctor = fn(&mut Interpreter, &[Value]) -> JsResult<Value>;
    let classes: [(&'static str, Ctor); 10] = [
        ("Intl.DisplayNames", display_names),
        ("Intl.Locale", locale),
        ("Intl.ListFormat", list_format),
        ("Intl.NumberFormat", number_format),
        ("Intl.DateTimeFormat", date_time_format),
        ("Intl.RelativeTimeFormat", relative_time_format),
        ("Intl.PluralRules", plural_rules),
        ("Intl.Collator", collator),
        ("Intl.Segmenter", segmenter),
        ("Intl.DurationFormat", duration_format),
    ];
    let mut protos = Vec::with_capacity(classes.len() + 1);
    for (class, ctor) in classes {
        let proto = define_class(interp, intl, class, move |interp, _, args| ctor(interp, args));
        protos.push((class, proto));
    }
    protos.push(("Segments", interp.new_prototype("Segments", ObjectKind::Ordinary)));
    install_methods(interp, &protos);

    interp.define_method(intl, "getCanonicalLocales", 1, |interp, _, args| {
        let list = match arg(args, 0) {
            Value::Undefined => Vec::new(),
            Value::String(s) => vec![Value::String(s)],
            other => interp.array_like_to_vec(&other)?,
        };
        let mut out: Vec<Value> = Vec::new();
        for v in list {
            let tag = interp.to_string(&v)?;
            let canonical = Value::string(canonical_or_throw(interp, &tag)?);
            if !out.iter().any(|seen| seen.strict_equals(&canonical)) {
                out.push(canonical);
            }
        }
        Ok(Value::Object(interp.create_array(out)))
    });
}

#[cfg(test)]
mod tests {
    use super::canonicalize_tag;
    use crate::interpreter::test_util::eval_display;

    #[test]
    /// タグの正規化。
    fn canonical_tags() {
        assert_eq!(canonicalize_tag("EN-us").as_deref(), Some("en-US"));
        assert_eq!(canonicalize_tag("zh-hant-tw").as_deref(), Some("zh-Hant-TW"));
        assert_eq!(canonicalize_tag("e"), None);
        assert_eq!(canonicalize_tag("en--US"), None);
    }

    #[test]
    /// 必須オプションと選択肢の検証。
    fn option_validation() {
        assert_eq!(
            eval_display("new Intl.DisplayNames('en', {})"),
            "throw TypeError: Required option type is missing"
        );
        assert_eq!(
            eval_display("new Intl.NumberFormat('en', { style: 'currency' })"),
            "throw TypeError: Option currency must be present when style is currency"
        );
        assert_eq!(
            eval_display("new Intl.ListFormat('en', { type: 'both' })"),
            "throw RangeError: both is not a valid value for option type"
        );
        assert_eq!(eval_display("Intl.NumberFormat('en')"), "throw TypeError: Intl.NumberFormat constructor must be called with 'new'");
    }

    #[test]
    /// 英語での整形。
    fn english_formatting() {
        assert_eq!(eval_display("new Intl.NumberFormat().format(1234567.891)"), "1,234,567.891");
        assert_eq!(eval_display("new Intl.NumberFormat('en', { style: 'percent' }).format(0.256)"), "26%");
        assert_eq!(
            eval_display("new Intl.NumberFormat('en', { style: 'currency', currency: 'usd' }).format(3.5)"),
            "$3.50"
        );
        assert_eq!(eval_display("new Intl.ListFormat('en').format(['a', 'b', 'c'])"), "a, b, and c");
        assert_eq!(eval_display("new Intl.RelativeTimeFormat('en', { numeric: 'auto' }).format(-1, 'day')"), "yesterday");
        assert_eq!(eval_display("new Intl.RelativeTimeFormat().format(3, 'hours')"), "in 3 hours");
        assert_eq!(eval_display("new Intl.PluralRules('en', { type: 'ordinal' }).select(22)"), "two");
    }

    #[test]
    /// 照合と分割。
    fn collation_and_segments() {
        assert_eq!(
            eval_display("['b10', 'b9', 'a'].sort(new Intl.Collator('en', { numeric: true }).compare).join()"),
            "a,b9,b10"
        );
        assert_eq!(
            eval_display("[...new Intl.Segmenter('en', { granularity: 'word' }).segment('hi there')].filter(s => s.isWordLike).map(s => s.segment).join('|')"),
            "hi|there"
        );
    }

    #[test]
    /// 日時書式のパターン。
    fn date_time_patterns() {
        assert_eq!(eval_display("new Intl.DateTimeFormat().format(new Date(0))"), "1/1/1970");
        assert_eq!(
            eval_display("new Intl.DateTimeFormat('en', { hour: 'numeric', minute: '2-digit' }).format(new Date(0))"),
            "12:00 AM"
        );
    }
}
