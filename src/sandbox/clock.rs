//! The `time.star` capability: calendar values without a live clock.
//!
//! `now()` always answers [`MOCK_NOW`], so examples that stamp data with the
//! current time still produce the same result on every run. Layouts use the
//! reference-time notation (`2006-01-02T15:04:05Z07:00`).

use std::fmt::Write;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Timelike, Utc};
use indexmap::IndexMap;

use crate::script::{Args, Interpreter, Module, ScriptError, Value};
use crate::script_err;

/// Instant returned by the mocked `time.now()`.
pub const MOCK_NOW: &str = "2009-11-10T23:00:00Z";

/// Reference-time layout tokens and their strftime equivalents, longest first.
const LAYOUT_TOKENS: [(&str, &str); 22] = [
    ("January", "%B"),
    ("Monday", "%A"),
    ("Z07:00", "%:z"),
    ("-07:00", "%:z"),
    ("-0700", "%z"),
    ("2006", "%Y"),
    ("Jan", "%b"),
    ("Mon", "%a"),
    ("MST", "%Z"),
    (".000", "%.3f"),
    ("01", "%m"),
    ("02", "%d"),
    ("_2", "%e"),
    ("15", "%H"),
    ("03", "%I"),
    ("04", "%M"),
    ("05", "%S"),
    ("06", "%y"),
    ("PM", "%p"),
    ("2", "%-d"),
    ("1", "%-m"),
    ("%", "%%"),
];

pub fn time_module() -> Module {
    let mut fields = IndexMap::new();
    fields.insert(
        "now".to_string(),
        Value::builtin("now", |_, args| {
            args.check("now", 0, 0)?;
            Ok(time_value(mock_now()?))
        }),
    );
    fields.insert(
        "from_timestamp".to_string(),
        Value::builtin("from_timestamp", |_, args| {
            args.check("from_timestamp", 1, 1)?;
            let secs = args.int_at("from_timestamp", 0)?;
            DateTime::<Utc>::from_timestamp(secs, 0)
                .map(time_value)
                .ok_or_else(|| ScriptError::new("from_timestamp: timestamp out of range"))
        }),
    );
    fields.insert(
        "parse_time".to_string(),
        Value::builtin("parse_time", |_, mut args| {
            let layout = take_layout(&mut args, "parse_time")?;
            args.check("parse_time", 1, 1)?;
            let text = args.str_at("parse_time", 0)?;
            parse_time(&text, layout.as_deref()).map(time_value)
        }),
    );
    fields.insert("time".to_string(), Value::builtin("time", build_time));

    let mut module = Module::new();
    module.insert("time".to_string(), Value::structure("struct", fields));
    module
}

fn mock_now() -> Result<DateTime<Utc>, ScriptError> {
    DateTime::parse_from_rfc3339(MOCK_NOW)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ScriptError::new(format!("now: {}", e)))
}

/// `time(year=, month=, day=, hour=, minute=, second=, nanosecond=)`; omitted
/// parts default to 1970-01-01T00:00:00Z.
fn build_time(_: &mut Interpreter<'_>, mut args: Args) -> Result<Value, ScriptError> {
    let mut part = |name: &str, default: i64| -> Result<i64, ScriptError> {
        match args.take_named(name) {
            None => Ok(default),
            Some(Value::Int(n)) => Ok(n),
            Some(other) => script_err!(
                "time: for parameter {}: got {}, want int",
                name,
                other.type_name()
            ),
        }
    };
    let year = part("year", 1970)?;
    let month = part("month", 1)?;
    let day = part("day", 1)?;
    let hour = part("hour", 0)?;
    let minute = part("minute", 0)?;
    let second = part("second", 0)?;
    let nanosecond = part("nanosecond", 0)?;
    args.check("time", 0, 0)?;

    let component = |n: i64| u32::try_from(n).ok();
    let built = i32::try_from(year).ok().and_then(|year| {
        Utc.with_ymd_and_hms(
            year,
            component(month)?,
            component(day)?,
            component(hour)?,
            component(minute)?,
            component(second)?,
        )
        .single()?
        .with_nanosecond(component(nanosecond)?)
    });
    built
        .map(time_value)
        .ok_or_else(|| ScriptError::new("time: invalid date or time"))
}

fn take_layout(args: &mut Args, name: &str) -> Result<Option<String>, ScriptError> {
    match args.take_named("format") {
        None | Some(Value::None) => Ok(None),
        Some(Value::Str(layout)) => Ok(Some(layout)),
        Some(other) => script_err!(
            "{}: for parameter format: got {}, want string",
            name,
            other.type_name()
        ),
    }
}

/// Translates a reference-time layout into a strftime pattern.
pub fn strftime_pattern(layout: &str) -> String {
    let mut pattern = String::new();
    let mut rest = layout;
    'scan: while let Some(c) = rest.chars().next() {
        for (token, spec) in LAYOUT_TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                pattern.push_str(spec);
                rest = tail;
                continue 'scan;
            }
        }
        pattern.push(c);
        rest = &rest[c.len_utf8()..];
    }
    pattern
}

/// Parses `text` as RFC 3339, or with `layout` when one is given. Layouts
/// without a zone are read as UTC; layouts without a clock as midnight.
pub fn parse_time(text: &str, layout: Option<&str>) -> Result<DateTime<Utc>, ScriptError> {
    let Some(layout) = layout else {
        return DateTime::parse_from_rfc3339(text)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| ScriptError::new(format!("parse_time: {:?}: {}", text, e)));
    };
    let pattern = strftime_pattern(layout);
    if let Ok(t) = DateTime::parse_from_str(text, &pattern) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(text, &pattern) {
        return Ok(t.and_utc());
    }
    NaiveDate::parse_from_str(text, &pattern)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .ok_or_else(|| {
            ScriptError::new(format!(
                "parse_time: cannot parse {:?} as {:?}",
                text, layout
            ))
        })
}

fn format_time(t: &DateTime<Utc>, layout: Option<&str>) -> Result<String, ScriptError> {
    let Some(layout) = layout else {
        return Ok(t.to_rfc3339_opts(SecondsFormat::AutoSi, true));
    };
    let mut out = String::new();
    write!(out, "{}", t.format(&strftime_pattern(layout)))
        .map_err(|_| ScriptError::new(format!("format: invalid layout {:?}", layout)))?;
    Ok(out)
}

fn time_value(t: DateTime<Utc>) -> Value {
    let mut fields = IndexMap::new();
    fields.insert("year".to_string(), Value::Int(i64::from(t.year())));
    fields.insert("month".to_string(), Value::Int(i64::from(t.month())));
    fields.insert("day".to_string(), Value::Int(i64::from(t.day())));
    fields.insert("hour".to_string(), Value::Int(i64::from(t.hour())));
    fields.insert("minute".to_string(), Value::Int(i64::from(t.minute())));
    fields.insert("second".to_string(), Value::Int(i64::from(t.second())));
    fields.insert(
        "nanosecond".to_string(),
        Value::Int(i64::from(t.nanosecond())),
    );
    fields.insert("unix".to_string(), Value::Int(t.timestamp()));
    fields.insert(
        "unix_nano".to_string(),
        t.timestamp_nanos_opt().map(Value::Int).unwrap_or(Value::None),
    );
    fields.insert(
        "format".to_string(),
        Value::builtin("format", move |_, args| {
            args.check("format", 0, 1)?;
            let layout = match args.get(0) {
                Some(_) => Some(args.str_at("format", 0)?),
                None => None,
            };
            format_time(&t, layout.as_deref()).map(Value::Str)
        }),
    );
    Value::structure("time", fields)
}
