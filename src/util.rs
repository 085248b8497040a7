use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Rounds to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn month_label(month: u32) -> String {
    match month {
        1..=12 => MONTH_LABELS[(month - 1) as usize].to_string(),
        other => format!("Month {other}"),
    }
}

/// Accepts RFC 3339 instants plus the naive forms spreadsheet exports produce.
/// Naive values are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn value_as_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number_as_string(number)),
        _ => None,
    }
}

/// Integral floats such as `101.0` render without the fraction.
fn number_as_string(number: &serde_json::Number) -> String {
    if let Some(int) = number.as_i64() {
        return int.to_string();
    }
    match number.as_f64() {
        Some(float) if float.fract() == 0.0 && float.abs() < 1e15 => format!("{float:.0}"),
        _ => number.to_string(),
    }
}

// Lenient field readers for rows coming back from the record store, which
// stores everything as spreadsheet cells.

/// Number, numeric string, or nothing. Anything unreadable counts as zero.
pub fn de_lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64).unwrap_or(0.0))
}

/// Month numbers arrive as numbers or strings; unreadable months become 0 and
/// never match a quarter.
pub fn de_lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(value_as_f64)
        .filter(|number| number.fract() == 0.0 && *number >= 0.0 && *number <= u32::MAX as f64)
        .map(|number| number as u32)
        .unwrap_or(0))
}

pub fn de_lenient_opt_i32<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(value_as_f64)
        .filter(|number| number.fract() == 0.0)
        .map(|number| number as i32))
}

pub fn de_lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_string))
}

/// Serialized JSON fragment. Some exports hand back the decoded array instead
/// of its text, so both are accepted and kept as text.
pub fn de_json_fragment<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

pub fn de_lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => parse_timestamp(&text),
        Some(Value::Number(millis)) => millis
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(19.0 / 3.0), 6.33);
        assert_eq!(round2(6.666_666), 6.67);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn month_labels_cover_the_calendar() {
        assert_eq!(month_label(1), "Jan");
        assert_eq!(month_label(12), "Dec");
        assert_eq!(month_label(13), "Month 13");
    }

    #[test]
    fn parses_common_timestamp_shapes() {
        let expected = Utc.with_ymd_and_hms(2026, 2, 3, 10, 15, 0).unwrap();
        assert_eq!(parse_timestamp("2026-02-03T10:15:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2026-02-03T07:15:00-03:00"), Some(expected));
        assert_eq!(parse_timestamp("2026-02-03 10:15:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2026-02-03"),
            Some(Utc.with_ymd_and_hms(2026, 2, 3, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn numeric_strings_are_read_as_numbers() {
        assert_eq!(value_as_f64(&Value::from("7.5")), Some(7.5));
        assert_eq!(value_as_f64(&Value::from(3)), Some(3.0));
        assert_eq!(value_as_f64(&Value::from("n/a")), None);
        assert_eq!(value_as_f64(&Value::Null), None);
        assert_eq!(value_as_f64(&Value::from("NaN")), None);
        assert_eq!(value_as_f64(&Value::from("inf")), None);
    }

    #[test]
    fn integral_numbers_render_as_codes() {
        assert_eq!(value_as_string(&serde_json::json!(101.0)).as_deref(), Some("101"));
        assert_eq!(value_as_string(&serde_json::json!(101)).as_deref(), Some("101"));
        assert_eq!(value_as_string(&serde_json::json!(10.5)).as_deref(), Some("10.5"));
        assert_eq!(value_as_string(&Value::from("A-7")).as_deref(), Some("A-7"));
    }
}
