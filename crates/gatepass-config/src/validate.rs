//! Validation helpers and parsing utilities for configuration values.
//!
//! Every helper takes the environment variable name so failures point at the
//! exact setting that needs fixing.

use std::time::Duration;

use chrono_tz::Tz;
use gatepass_core::FieldMap;
use serde_json::Value;
use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::TriggerTime;

const TRIGGER_FIELD: &str = "GATEPASS_TRIGGER_AT";

/// Parse `HH:MM`, `HH:MM:SS`, or `HH:MM:SS.fff` (one to three fractional digits).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the shape or a component is invalid.
pub fn parse_trigger_time(value: &str) -> ConfigResult<TriggerTime> {
    let trimmed = value.trim();
    let (clock, fraction) = match trimmed.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (trimmed, None),
    };

    let parts: Vec<&str> = clock.split(':').collect();
    if !(2..=3).contains(&parts.len()) || (fraction.is_some() && parts.len() != 3) {
        return Err(ConfigError::invalid(TRIGGER_FIELD, value, "expected_hh_mm_ss"));
    }

    let component = |raw: &str, max: u32| -> ConfigResult<u32> {
        if raw.len() != 2 || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(ConfigError::invalid(TRIGGER_FIELD, value, "expected_two_digits"));
        }
        raw.parse::<u32>()
            .ok()
            .filter(|parsed| *parsed <= max)
            .ok_or_else(|| ConfigError::invalid(TRIGGER_FIELD, value, "out_of_range"))
    };

    let hour = component(parts[0], 23)?;
    let minute = component(parts[1], 59)?;
    let second = parts.get(2).map_or(Ok(0), |raw| component(raw, 59))?;
    let millis = match fraction {
        None => 0,
        Some(digits)
            if (1..=3).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) =>
        {
            let padded = format!("{digits:0<3}");
            padded
                .parse::<u32>()
                .map_err(|_| ConfigError::invalid(TRIGGER_FIELD, value, "invalid_millis"))?
        }
        Some(_) => return Err(ConfigError::invalid(TRIGGER_FIELD, value, "invalid_millis")),
    };

    Ok(TriggerTime::new(hour, minute, second, millis))
}

/// Parse an IANA timezone name.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the zone is unknown.
pub fn parse_timezone(field: &'static str, value: &str) -> ConfigResult<Tz> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|_| ConfigError::invalid(field, value, "unknown_timezone"))
}

/// Parse an absolute `http`/`https` URL.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for malformed or non-HTTP URLs.
pub fn parse_url(field: &'static str, value: &str) -> ConfigResult<Url> {
    let url =
        Url::parse(value.trim()).map_err(|_| ConfigError::invalid(field, value, "invalid_url"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ConfigError::invalid(field, value, "unsupported_scheme")),
    }
}

/// Parse a strictly positive integer.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for non-numeric or zero values.
pub fn parse_positive(field: &'static str, value: &str) -> ConfigResult<u64> {
    let parsed = value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(field, value, "expected_integer"))?;
    if parsed == 0 {
        return Err(ConfigError::invalid(field, value, "must_be_positive"));
    }
    Ok(parsed)
}

/// Parse a positive millisecond count into a duration.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for non-numeric or zero values.
pub fn parse_millis(field: &'static str, value: &str) -> ConfigResult<Duration> {
    parse_positive(field, value).map(Duration::from_millis)
}

/// Split a comma-separated list, dropping blank entries.
#[must_use]
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a JSON object of field defaults; scalar values are stringified.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the document is not an object of
/// scalars or a field name is blank.
pub fn parse_field_map(field: &'static str, value: &str) -> ConfigResult<FieldMap> {
    let document: Value = serde_json::from_str(value).map_err(|source| ConfigError::Json {
        operation: field,
        source,
    })?;
    let Value::Object(entries) = document else {
        return Err(ConfigError::invalid(field, value, "expected_object"));
    };

    let mut fields = FieldMap::new();
    for (name, entry) in entries {
        if name.trim().is_empty() {
            return Err(ConfigError::invalid(field, value, "blank_field_name"));
        }
        let text = scalar_text(&entry)
            .ok_or_else(|| ConfigError::invalid(field, value, "non_scalar_value"))?;
        fields.insert(name, text);
    }
    Ok(fields)
}

/// Render a JSON scalar as form text; `null` becomes empty.
#[must_use]
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(err: &ConfigError) -> Option<&'static str> {
        match err {
            ConfigError::InvalidField { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    #[test]
    fn trigger_time_accepts_all_shapes() -> ConfigResult<()> {
        assert_eq!(parse_trigger_time("06:59")?, TriggerTime::new(6, 59, 0, 0));
        assert_eq!(parse_trigger_time("06:59:59")?, TriggerTime::new(6, 59, 59, 0));
        assert_eq!(
            parse_trigger_time("06:59:59.990")?,
            TriggerTime::new(6, 59, 59, 990)
        );
        assert_eq!(
            parse_trigger_time(" 23:00:00.5 ")?,
            TriggerTime::new(23, 0, 0, 500)
        );
        Ok(())
    }

    #[test]
    fn trigger_time_rejects_malformed_values() {
        for (input, expected) in [
            ("6:59", "expected_two_digits"),
            ("24:00", "out_of_range"),
            ("06:60:00", "out_of_range"),
            ("06:59.5", "expected_hh_mm_ss"),
            ("06", "expected_hh_mm_ss"),
            ("06:59:59.1234", "invalid_millis"),
            ("06:59:59.", "invalid_millis"),
            ("06:59:59.x", "invalid_millis"),
        ] {
            let err = parse_trigger_time(input).err();
            assert_eq!(err.as_ref().and_then(reason), Some(expected), "{input}");
        }
    }

    #[test]
    fn timezone_and_url_validation() {
        assert!(parse_timezone("TZ", "Asia/Kolkata").is_ok());
        assert_eq!(
            parse_timezone("TZ", "Mars/Olympus").err().as_ref().and_then(reason),
            Some("unknown_timezone")
        );
        assert!(parse_url("URL", "https://portal.example/gatepass.php").is_ok());
        assert_eq!(
            parse_url("URL", "ftp://portal.example").err().as_ref().and_then(reason),
            Some("unsupported_scheme")
        );
        assert_eq!(
            parse_url("URL", "not a url").err().as_ref().and_then(reason),
            Some("invalid_url")
        );
    }

    #[test]
    fn numbers_must_be_positive() {
        assert_eq!(parse_positive("N", "8").ok(), Some(8));
        assert_eq!(
            parse_positive("N", "0").err().as_ref().and_then(reason),
            Some("must_be_positive")
        );
        assert_eq!(
            parse_millis("N", "-5").err().as_ref().and_then(reason),
            Some("expected_integer")
        );
        assert_eq!(parse_millis("N", "250").ok(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn lists_drop_blank_entries() {
        assert_eq!(
            parse_list(" vehicle_no1, ,csrf_token,"),
            vec!["vehicle_no1".to_string(), "csrf_token".to_string()]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn field_map_stringifies_scalars() -> ConfigResult<()> {
        let fields = parse_field_map(
            "DEFAULTS",
            r#"{"tps":"BTPS","silo_no":3,"generate_flyash_gatepass":true,"vehicle_no":null}"#,
        )?;
        assert_eq!(fields.get("tps").map(String::as_str), Some("BTPS"));
        assert_eq!(fields.get("silo_no").map(String::as_str), Some("3"));
        assert_eq!(
            fields.get("generate_flyash_gatepass").map(String::as_str),
            Some("true")
        );
        assert_eq!(fields.get("vehicle_no").map(String::as_str), Some(""));

        assert_eq!(
            parse_field_map("DEFAULTS", r#"{"a":[1]}"#).err().as_ref().and_then(reason),
            Some("non_scalar_value")
        );
        assert_eq!(
            parse_field_map("DEFAULTS", "[]").err().as_ref().and_then(reason),
            Some("expected_object")
        );
        assert!(matches!(
            parse_field_map("DEFAULTS", "{"),
            Err(ConfigError::Json { .. })
        ));
        Ok(())
    }
}
