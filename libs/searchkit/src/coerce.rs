//! Raw value coercion (wire input -> typed [`Value`]).
//!
//! Raw values arrive as JSON scalars. Strings are BOM-stripped and NFC
//! normalized before parsing. Temporal parsing accepts ISO 8601 with a `T` or
//! space separator, optional fractional seconds and optional offset, plus a
//! short list of locale-agnostic fallback formats.

use chrono::{
    DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use rust_decimal::Decimal;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::errors::ParseError;
use crate::kind::FieldKind;
use crate::value::Value;

/// Position of a raw value inside a BETWEEN range, if any.
///
/// Date-only input against a date-time target widens to the start or end of
/// the day depending on this position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangePosition {
    Single,
    RangeStart,
    RangeEnd,
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%Y%m%d"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H%M%S"];

/// Coerce a raw JSON value into a typed [`Value`] for the given target kind.
///
/// Returns `Ok(None)` for *absent* input: JSON null, empty or whitespace-only
/// strings, and the literal `null` / `NULL` tokens.
///
/// # Errors
/// Returns [`ParseError`] (without a field name; attach one with
/// [`ParseError::for_field`]) when the raw value cannot be represented in the
/// target kind.
pub fn coerce(
    raw: &serde_json::Value,
    kind: FieldKind,
    pos: RangePosition,
) -> Result<Option<Value>, ParseError> {
    match raw {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Bool(b) => match kind {
            FieldKind::Bool => Ok(Some(Value::Bool(*b))),
            _ => Err(ParseError::new(b.to_string(), kind, "unexpected boolean value")),
        },
        serde_json::Value::Number(n) => coerce_number(n, kind).map(Some),
        serde_json::Value::String(s) => {
            let s = normalize(s);
            if is_absent(&s) {
                return Ok(None);
            }
            coerce_str(&s, kind, pos).map(Some)
        }
        other => Err(ParseError::new(
            other.to_string(),
            kind,
            "expected a scalar value",
        )),
    }
}

/// Strip a leading BOM and apply Unicode NFC normalization.
#[must_use]
pub fn normalize(s: &str) -> String {
    s.strip_prefix('\u{feff}').unwrap_or(s).nfc().collect()
}

fn is_absent(s: &str) -> bool {
    let t = s.trim();
    t.is_empty() || t.eq_ignore_ascii_case("null")
}

fn coerce_number(n: &serde_json::Number, kind: FieldKind) -> Result<Value, ParseError> {
    let raw = n.to_string();
    match kind {
        FieldKind::I16 | FieldKind::I32 | FieldKind::I64 | FieldKind::Year => {
            let v = n
                .as_i64()
                .ok_or_else(|| ParseError::new(&raw, kind, "not an integer"))?;
            check_int_width(v, kind, &raw)
        }
        FieldKind::F32 | FieldKind::F64 => {
            let v = n
                .as_f64()
                .ok_or_else(|| ParseError::new(&raw, kind, "not a float"))?;
            Ok(Value::F64(v))
        }
        FieldKind::Decimal => raw
            .parse::<Decimal>()
            .map(Value::Decimal)
            .map_err(|e| ParseError::new(&raw, kind, e.to_string())),
        FieldKind::Bool => match n.as_i64() {
            Some(0) => Ok(Value::Bool(false)),
            Some(1) => Ok(Value::Bool(true)),
            _ => Err(ParseError::new(&raw, kind, "expected 0 or 1")),
        },
        _ => Err(ParseError::new(&raw, kind, "unexpected numeric value")),
    }
}

/// Coerce an already-normalized, non-absent string.
///
/// # Errors
/// Returns [`ParseError`] when the text does not parse as the target kind.
pub fn coerce_str(s: &str, kind: FieldKind, pos: RangePosition) -> Result<Value, ParseError> {
    let t = s.trim();
    match kind {
        FieldKind::String => Ok(Value::String(s.to_owned())),
        FieldKind::Char => {
            let mut chars = t.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(ParseError::new(t, kind, "expected a single character")),
            }
        }
        FieldKind::Bool => parse_bool(t).ok_or_else(|| {
            ParseError::new(t, kind, "expected one of true/false/1/0/yes/no/y/n/on/off")
        }),
        FieldKind::I16 | FieldKind::I32 | FieldKind::I64 | FieldKind::Year => {
            let digits = strip_grouping(t);
            let v = digits
                .parse::<i64>()
                .map_err(|e| ParseError::new(t, kind, e.to_string()))?;
            check_int_width(v, kind, t)
        }
        FieldKind::F32 | FieldKind::F64 => t
            .parse::<f64>()
            .map(Value::F64)
            .map_err(|e| ParseError::new(t, kind, e.to_string())),
        FieldKind::Decimal => t
            .parse::<Decimal>()
            .map(Value::Decimal)
            .map_err(|e| ParseError::new(t, kind, e.to_string())),
        FieldKind::Uuid => Uuid::parse_str(t)
            .map(Value::Uuid)
            .map_err(|e| ParseError::new(t, kind, e.to_string())),
        FieldKind::Enum(variants) => variants
            .iter()
            .find(|v| v.eq_ignore_ascii_case(t))
            .map(|v| Value::String((*v).to_owned()))
            .ok_or_else(|| ParseError::new(t, kind, "unknown enum value")),
        FieldKind::Date => parse_date(t)
            .map(Value::Date)
            .ok_or_else(|| ParseError::new(t, kind, "unrecognized date")),
        FieldKind::Time => parse_time(t)
            .map(Value::Time)
            .ok_or_else(|| ParseError::new(t, kind, "unrecognized time")),
        FieldKind::YearMonth => parse_year_month(t)
            .map(Value::Date)
            .ok_or_else(|| ParseError::new(t, kind, "expected yyyy-MM")),
        FieldKind::DateTime | FieldKind::DateTimeUtc | FieldKind::DateTimeFixed => {
            coerce_temporal(t, kind, pos)
        }
    }
}

fn check_int_width(v: i64, kind: FieldKind, raw: &str) -> Result<Value, ParseError> {
    let ok = match kind {
        FieldKind::I16 => i16::try_from(v).is_ok(),
        FieldKind::I32 => i32::try_from(v).is_ok(),
        _ => true,
    };
    if ok {
        Ok(Value::I64(v))
    } else {
        Err(ParseError::new(raw, kind, "value out of range"))
    }
}

/// Strip ASCII grouping characters (comma, space) before integer parsing.
fn strip_grouping(s: &str) -> String {
    s.chars().filter(|c| *c != ',' && *c != ' ').collect()
}

fn parse_bool(s: &str) -> Option<Value> {
    if ["true", "1", "yes", "y", "on"]
        .iter()
        .any(|t| s.eq_ignore_ascii_case(t))
    {
        return Some(Value::Bool(true));
    }
    if ["false", "0", "no", "n", "off"]
        .iter()
        .any(|t| s.eq_ignore_ascii_case(t))
    {
        return Some(Value::Bool(false));
    }
    None
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

fn parse_year_month(s: &str) -> Option<NaiveDate> {
    let (y, m) = s.split_once('-')?;
    let y: i32 = y.trim().parse().ok()?;
    let m: u32 = m.trim().parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, 1)
}

/// Outcome of parsing a date-time-ish string, before target adaptation.
enum ParsedTemporal {
    /// Full date-time with an explicit offset.
    WithOffset(DateTime<FixedOffset>),
    /// Full date-time without zone information.
    Naive(NaiveDateTime),
    /// Date-only input; the time component is decided by the range position.
    DateOnly(NaiveDate),
}

fn parse_temporal(s: &str) -> Option<ParsedTemporal> {
    // Accept a space separator by normalizing it to `T` first.
    let normalized = normalize_separator(s);

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(ParsedTemporal::WithOffset(dt));
    }
    // Offsets without a colon (e.g. +0900) fall outside RFC 3339.
    if let Ok(dt) = DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(ParsedTemporal::WithOffset(dt));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ParsedTemporal::Naive(dt));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y%m%d%H%M%S") {
        return Some(ParsedTemporal::Naive(dt));
    }
    parse_date(s).map(ParsedTemporal::DateOnly)
}

fn normalize_separator(s: &str) -> String {
    match s.split_once(' ') {
        Some((date, rest)) if !rest.is_empty() => format!("{date}T{rest}"),
        _ => s.to_owned(),
    }
}

fn end_of_day(date: NaiveDate, kind: FieldKind, raw: &str) -> Result<NaiveDateTime, ParseError> {
    date.and_hms_nano_opt(23, 59, 59, 999_999_999)
        .ok_or_else(|| ParseError::new(raw, kind, "invalid end-of-day timestamp"))
}

fn widen_date(
    date: NaiveDate,
    pos: RangePosition,
    kind: FieldKind,
    raw: &str,
) -> Result<NaiveDateTime, ParseError> {
    match pos {
        RangePosition::RangeEnd => end_of_day(date, kind, raw),
        RangePosition::Single | RangePosition::RangeStart => Ok(date.and_time(NaiveTime::MIN)),
    }
}

fn local_from_naive(ndt: NaiveDateTime, kind: FieldKind, raw: &str) -> Result<DateTime<Local>, ParseError> {
    Local
        .from_local_datetime(&ndt)
        .earliest()
        .ok_or_else(|| ParseError::new(raw, kind, "timestamp does not exist in the local zone"))
}

fn coerce_temporal(s: &str, kind: FieldKind, pos: RangePosition) -> Result<Value, ParseError> {
    let parsed =
        parse_temporal(s).ok_or_else(|| ParseError::new(s, kind, "unrecognized date-time"))?;

    match kind {
        FieldKind::DateTime => {
            // Naive target: explicit offsets are converted to the local zone.
            let ndt = match parsed {
                ParsedTemporal::WithOffset(dt) => dt.with_timezone(&Local).naive_local(),
                ParsedTemporal::Naive(ndt) => ndt,
                ParsedTemporal::DateOnly(d) => widen_date(d, pos, kind, s)?,
            };
            Ok(Value::DateTime(ndt))
        }
        FieldKind::DateTimeUtc => {
            let dt = match parsed {
                ParsedTemporal::WithOffset(dt) => dt.with_timezone(&Utc),
                ParsedTemporal::Naive(ndt) => local_from_naive(ndt, kind, s)?.with_timezone(&Utc),
                ParsedTemporal::DateOnly(d) => {
                    local_from_naive(widen_date(d, pos, kind, s)?, kind, s)?.with_timezone(&Utc)
                }
            };
            Ok(Value::DateTimeUtc(dt))
        }
        FieldKind::DateTimeFixed => {
            let dt: DateTime<FixedOffset> = match parsed {
                ParsedTemporal::WithOffset(dt) => dt,
                ParsedTemporal::Naive(ndt) => local_from_naive(ndt, kind, s)?.fixed_offset(),
                ParsedTemporal::DateOnly(d) => {
                    local_from_naive(widen_date(d, pos, kind, s)?, kind, s)?.fixed_offset()
                }
            };
            Ok(Value::DateTimeFixed(dt))
        }
        _ => Err(ParseError::new(s, kind, "not a date-time kind")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn one(raw: &serde_json::Value, kind: FieldKind) -> Value {
        coerce(raw, kind, RangePosition::Single).unwrap().unwrap()
    }

    #[test]
    fn null_like_inputs_are_absent() {
        for raw in [json!(null), json!(""), json!("   "), json!("null"), json!("NULL")] {
            assert_eq!(coerce(&raw, FieldKind::String, RangePosition::Single).unwrap(), None);
        }
    }

    #[test]
    fn integer_grouping_characters_are_stripped() {
        assert_eq!(one(&json!("1,234,567"), FieldKind::I64), Value::I64(1_234_567));
        assert_eq!(one(&json!("12 345"), FieldKind::I32), Value::I64(12_345));
    }

    #[test]
    fn integer_overflow_fails() {
        let err = coerce(&json!("70000"), FieldKind::I16, RangePosition::Single).unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert!(coerce(&json!("99999999999999999999"), FieldKind::I64, RangePosition::Single).is_err());
    }

    #[test]
    fn boolean_token_sets() {
        for raw in ["true", "1", "yes", "Y", "ON"] {
            assert_eq!(one(&json!(raw), FieldKind::Bool), Value::Bool(true));
        }
        for raw in ["false", "0", "no", "N", "off"] {
            assert_eq!(one(&json!(raw), FieldKind::Bool), Value::Bool(false));
        }
        assert!(coerce(&json!("maybe"), FieldKind::Bool, RangePosition::Single).is_err());
    }

    #[test]
    fn enum_matches_case_insensitively_and_canonicalizes() {
        let kind = FieldKind::Enum(&["ACTIVE", "SUSPENDED"]);
        assert_eq!(one(&json!("active"), kind), Value::String("ACTIVE".into()));
        assert!(coerce(&json!("gone"), kind, RangePosition::Single).is_err());
    }

    #[test]
    fn date_fallback_formats() {
        let expected = Value::Date(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        for raw in ["2024-12-31", "2024/12/31", "31-12-2024", "20241231"] {
            assert_eq!(one(&json!(raw), FieldKind::Date), expected);
        }
    }

    #[test]
    fn time_fallback_formats() {
        let expected = Value::Time(NaiveTime::from_hms_opt(13, 5, 9).unwrap());
        assert_eq!(one(&json!("13:05:09"), FieldKind::Time), expected);
        assert_eq!(one(&json!("130509"), FieldKind::Time), expected);
    }

    #[test]
    fn datetime_accepts_space_and_t_separators() {
        let expected = Value::DateTime(
            NaiveDate::from_ymd_opt(2024, 12, 31)
                .unwrap()
                .and_hms_opt(15, 30, 45)
                .unwrap(),
        );
        assert_eq!(one(&json!("2024-12-31T15:30:45"), FieldKind::DateTime), expected);
        assert_eq!(one(&json!("2024-12-31 15:30:45"), FieldKind::DateTime), expected);
    }

    #[test]
    fn utc_target_preserves_explicit_offset() {
        let v = one(&json!("2024-12-31T12:00:00+02:00"), FieldKind::DateTimeUtc);
        let Value::DateTimeUtc(dt) = v else {
            panic!("expected utc value")
        };
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 12, 31, 10, 0, 0).unwrap());
    }

    #[test]
    fn fixed_target_keeps_the_offset() {
        let v = one(&json!("2024-12-31T12:00:00+0230"), FieldKind::DateTimeFixed);
        let Value::DateTimeFixed(dt) = v else {
            panic!("expected fixed-offset value")
        };
        assert_eq!(dt.offset().local_minus_utc(), 2 * 3600 + 30 * 60);
    }

    #[test]
    fn date_only_between_widens_to_day_bounds() {
        let start = coerce(&json!("2024-12-31"), FieldKind::DateTime, RangePosition::RangeStart)
            .unwrap()
            .unwrap();
        let end = coerce(&json!("2024-12-31"), FieldKind::DateTime, RangePosition::RangeEnd)
            .unwrap()
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(start, Value::DateTime(date.and_time(NaiveTime::MIN)));
        assert_eq!(
            end,
            Value::DateTime(date.and_hms_nano_opt(23, 59, 59, 999_999_999).unwrap())
        );
    }

    #[test]
    fn datetime_input_used_verbatim_in_ranges() {
        let v = coerce(
            &json!("2024-12-31T10:11:12"),
            FieldKind::DateTime,
            RangePosition::RangeEnd,
        )
        .unwrap()
        .unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 12, 31)
            .unwrap()
            .and_hms_opt(10, 11, 12)
            .unwrap();
        assert_eq!(v, Value::DateTime(expected));
    }

    #[test]
    fn bom_is_stripped_and_nfc_applied() {
        // U+0065 U+0301 (e + combining acute) normalizes to U+00E9.
        assert_eq!(
            one(&json!("\u{feff}caf\u{0065}\u{0301}"), FieldKind::String),
            Value::String("caf\u{e9}".into())
        );
    }

    #[test]
    fn json_numbers_coerce_directly() {
        assert_eq!(one(&json!(42), FieldKind::I64), Value::I64(42));
        assert_eq!(one(&json!(2.5), FieldKind::F64), Value::F64(2.5));
        assert_eq!(one(&json!(1), FieldKind::Bool), Value::Bool(true));
        assert_eq!(
            one(&json!(19.99), FieldKind::Decimal),
            Value::Decimal("19.99".parse().unwrap())
        );
    }

    #[test]
    fn year_and_year_month() {
        assert_eq!(one(&json!("2024"), FieldKind::Year), Value::I64(2024));
        assert_eq!(
            one(&json!("2024-05"), FieldKind::YearMonth),
            Value::Date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
        );
    }

    #[test]
    fn uuid_and_char() {
        let id = "8f14e45f-ceea-4e7a-9d3b-111111111111";
        assert_eq!(one(&json!(id), FieldKind::Uuid), Value::Uuid(id.parse().unwrap()));
        assert_eq!(one(&json!("x"), FieldKind::Char), Value::Char('x'));
        assert!(coerce(&json!("xy"), FieldKind::Char, RangePosition::Single).is_err());
    }

    #[test]
    fn arrays_are_rejected_as_scalars() {
        assert!(coerce(&json!([1, 2]), FieldKind::I64, RangePosition::Single).is_err());
    }
}
