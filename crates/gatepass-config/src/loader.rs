//! Environment-backed configuration loading.
//!
//! # Design
//! - `load_from_env` is a thin wrapper; all logic lives in `load_from_lookup`
//!   so tests can feed a map instead of mutating the process environment.
//! - Blank values are treated as unset.

use std::path::PathBuf;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    EndpointConfig, HttpConfig, ProfileSourceConfig, ScheduleConfig, ServiceConfig, WaitTuning,
};
use crate::validate::{
    parse_field_map, parse_list, parse_millis, parse_positive, parse_timezone, parse_trigger_time,
    parse_url,
};

const FORM_URL: &str = "GATEPASS_FORM_URL";
const SUBMIT_URL: &str = "GATEPASS_SUBMIT_URL";
const FORM_ACTION: &str = "GATEPASS_FORM_ACTION";
const LOGIN_MARKERS: &str = "GATEPASS_LOGIN_MARKERS";
const CRITICAL_FIELDS: &str = "GATEPASS_CRITICAL_FIELDS";
const FIELD_DEFAULTS: &str = "GATEPASS_FIELD_DEFAULTS";
const TIMEZONE: &str = "GATEPASS_TIMEZONE";
const TRIGGER_AT: &str = "GATEPASS_TRIGGER_AT";
const MAX_CONCURRENCY: &str = "GATEPASS_MAX_CONCURRENCY";
const MAX_LATENESS_MS: &str = "GATEPASS_MAX_LATENESS_MS";
const FETCH_TIMEOUT_MS: &str = "GATEPASS_FETCH_TIMEOUT_MS";
const SUBMIT_TIMEOUT_MS: &str = "GATEPASS_SUBMIT_TIMEOUT_MS";
const FETCH_ATTEMPTS: &str = "GATEPASS_FETCH_ATTEMPTS";
const FETCH_BACKOFF_MS: &str = "GATEPASS_FETCH_BACKOFF_MS";
const EXCERPT_LIMIT: &str = "GATEPASS_EXCERPT_LIMIT";
const MAX_PAGE_BYTES: &str = "GATEPASS_MAX_PAGE_BYTES";
const PROFILES: &str = "GATEPASS_PROFILES";
const PROFILES_JSON: &str = "GATEPASS_PROFILES_JSON";
const OUTCOME_LOG: &str = "GATEPASS_OUTCOME_LOG";

/// Load configuration from the process environment.
///
/// # Errors
///
/// See [`load_from_lookup`].
pub fn load_from_env() -> ConfigResult<ServiceConfig> {
    load_from_lookup(|name| std::env::var(name).ok())
}

/// Load configuration through `lookup`, which maps a variable name to its value.
///
/// # Errors
///
/// Returns [`ConfigError::MissingEnv`] when a required variable is absent and
/// [`ConfigError::InvalidField`] or [`ConfigError::Json`] when a value fails
/// validation.
pub fn load_from_lookup<F>(lookup: F) -> ConfigResult<ServiceConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
    let require = |name: &'static str| get(name).ok_or(ConfigError::MissingEnv { name });

    let endpoints = EndpointConfig {
        form_url: parse_url(FORM_URL, &require(FORM_URL)?)?,
        submit_url: parse_url(SUBMIT_URL, &require(SUBMIT_URL)?)?,
        form_action: get(FORM_ACTION).map(|value| value.trim().to_string()),
        login_markers: get(LOGIN_MARKERS).map_or_else(
            || vec![defaults::LOGIN_MARKER.to_string()],
            |value| parse_list(&value),
        ),
        critical_fields: get(CRITICAL_FIELDS)
            .map(|value| parse_list(&value))
            .unwrap_or_default(),
        field_defaults: get(FIELD_DEFAULTS)
            .map(|value| parse_field_map(FIELD_DEFAULTS, &value))
            .transpose()?
            .unwrap_or_default(),
    };

    let schedule = ScheduleConfig {
        timezone: parse_timezone(
            TIMEZONE,
            &get(TIMEZONE).unwrap_or_else(|| defaults::TIMEZONE.to_string()),
        )?,
        trigger: parse_trigger_time(
            &get(TRIGGER_AT).unwrap_or_else(|| defaults::TRIGGER_AT.to_string()),
        )?,
        max_concurrency: get(MAX_CONCURRENCY)
            .map(|value| parse_concurrency(&value))
            .transpose()?
            .unwrap_or(defaults::MAX_CONCURRENCY),
        max_lateness: get(MAX_LATENESS_MS)
            .map(|value| parse_millis(MAX_LATENESS_MS, &value))
            .transpose()?
            .unwrap_or(defaults::MAX_LATENESS),
        wait: WaitTuning::default(),
    };

    let http = HttpConfig {
        fetch_timeout: get(FETCH_TIMEOUT_MS)
            .map(|value| parse_millis(FETCH_TIMEOUT_MS, &value))
            .transpose()?
            .unwrap_or(defaults::FETCH_TIMEOUT),
        submit_timeout: get(SUBMIT_TIMEOUT_MS)
            .map(|value| parse_millis(SUBMIT_TIMEOUT_MS, &value))
            .transpose()?
            .unwrap_or(defaults::SUBMIT_TIMEOUT),
        fetch_attempts: get(FETCH_ATTEMPTS)
            .map(|value| {
                parse_positive(FETCH_ATTEMPTS, &value).and_then(|parsed| {
                    u32::try_from(parsed)
                        .map_err(|_| ConfigError::invalid(FETCH_ATTEMPTS, value, "out_of_range"))
                })
            })
            .transpose()?
            .unwrap_or(defaults::FETCH_ATTEMPTS),
        fetch_backoff: get(FETCH_BACKOFF_MS)
            .map(|value| parse_millis(FETCH_BACKOFF_MS, &value))
            .transpose()?
            .unwrap_or(defaults::FETCH_BACKOFF),
        excerpt_limit: get(EXCERPT_LIMIT)
            .map(|value| parse_count(EXCERPT_LIMIT, &value))
            .transpose()?
            .unwrap_or(defaults::EXCERPT_LIMIT),
        max_page_bytes: get(MAX_PAGE_BYTES)
            .map(|value| parse_count(MAX_PAGE_BYTES, &value))
            .transpose()?
            .unwrap_or(defaults::MAX_PAGE_BYTES),
    };

    let profiles = get(PROFILES_JSON).map_or_else(
        || {
            ProfileSourceConfig::File(PathBuf::from(
                get(PROFILES).unwrap_or_else(|| defaults::PROFILES_PATH.to_string()),
            ))
        },
        ProfileSourceConfig::Inline,
    );

    Ok(ServiceConfig {
        endpoints,
        schedule,
        http,
        profiles,
        outcome_log: get(OUTCOME_LOG).map(PathBuf::from),
    })
}

fn parse_count(field: &'static str, value: &str) -> ConfigResult<usize> {
    let parsed = parse_positive(field, value)?;
    usize::try_from(parsed).map_err(|_| ConfigError::invalid(field, value, "out_of_range"))
}

fn parse_concurrency(value: &str) -> ConfigResult<usize> {
    let parsed = parse_count(MAX_CONCURRENCY, value)?;
    if parsed > defaults::MAX_CONCURRENCY_LIMIT {
        return Err(ConfigError::invalid(MAX_CONCURRENCY, value, "out_of_range"));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TriggerTime;
    use chrono_tz::Tz;
    use std::collections::HashMap;
    use std::time::Duration;

    fn load(pairs: &[(&str, &str)]) -> ConfigResult<ServiceConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        load_from_lookup(|name| env.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        (FORM_URL, "https://portal.example/user/gatepass.php"),
        (SUBMIT_URL, "https://portal.example/user/gatepass_submit.php"),
    ];

    #[test]
    fn defaults_apply_when_only_endpoints_are_set() -> ConfigResult<()> {
        let config = load(&REQUIRED)?;
        assert_eq!(config.schedule.timezone, Tz::Asia__Kolkata);
        assert_eq!(config.schedule.trigger, TriggerTime::new(6, 59, 59, 990));
        assert_eq!(config.schedule.max_concurrency, 8);
        assert_eq!(config.schedule.max_lateness, Duration::from_secs(1));
        assert_eq!(config.http, HttpConfig::default());
        assert_eq!(config.endpoints.login_markers, vec!["login".to_string()]);
        assert!(config.endpoints.critical_fields.is_empty());
        assert!(config.endpoints.field_defaults.is_empty());
        assert_eq!(
            config.profiles,
            ProfileSourceConfig::File(PathBuf::from("users.json"))
        );
        assert!(config.outcome_log.is_none());
        Ok(())
    }

    #[test]
    fn missing_required_endpoint_is_named() {
        let result = load(&[REQUIRED[0]]);
        assert!(matches!(
            result,
            Err(ConfigError::MissingEnv { name: SUBMIT_URL })
        ));
        let blank = load(&[(FORM_URL, "  "), REQUIRED[1]]);
        assert!(matches!(blank, Err(ConfigError::MissingEnv { name: FORM_URL })));
    }

    #[test]
    fn overrides_are_parsed() -> ConfigResult<()> {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            (FORM_ACTION, "gatepass_submit"),
            (LOGIN_MARKERS, "login, session_expired"),
            (CRITICAL_FIELDS, "vehicle_no1,csrf_token"),
            (FIELD_DEFAULTS, r#"{"tps":"BTPS"}"#),
            (TIMEZONE, "UTC"),
            (TRIGGER_AT, "01:29:59.5"),
            (MAX_CONCURRENCY, "2"),
            (MAX_LATENESS_MS, "250"),
            (FETCH_TIMEOUT_MS, "5000"),
            (SUBMIT_TIMEOUT_MS, "7000"),
            (FETCH_ATTEMPTS, "1"),
            (FETCH_BACKOFF_MS, "50"),
            (EXCERPT_LIMIT, "200"),
            (MAX_PAGE_BYTES, "4096"),
            (PROFILES_JSON, "[]"),
            (PROFILES, "ignored.json"),
            (OUTCOME_LOG, "/var/log/gatepass/outcomes.jsonl"),
        ]);
        let config = load(&pairs)?;

        assert_eq!(config.endpoints.form_action.as_deref(), Some("gatepass_submit"));
        assert_eq!(
            config.endpoints.login_markers,
            vec!["login".to_string(), "session_expired".to_string()]
        );
        assert_eq!(config.endpoints.critical_fields.len(), 2);
        assert_eq!(
            config.endpoints.field_defaults.get("tps").map(String::as_str),
            Some("BTPS")
        );
        assert_eq!(config.schedule.timezone, Tz::UTC);
        assert_eq!(config.schedule.trigger, TriggerTime::new(1, 29, 59, 500));
        assert_eq!(config.schedule.max_concurrency, 2);
        assert_eq!(config.schedule.max_lateness, Duration::from_millis(250));
        assert_eq!(config.http.fetch_timeout, Duration::from_secs(5));
        assert_eq!(config.http.submit_timeout, Duration::from_secs(7));
        assert_eq!(config.http.fetch_attempts, 1);
        assert_eq!(config.http.fetch_backoff, Duration::from_millis(50));
        assert_eq!(config.http.excerpt_limit, 200);
        assert_eq!(config.http.max_page_bytes, 4096);
        assert_eq!(config.profiles, ProfileSourceConfig::Inline("[]".to_string()));
        assert_eq!(
            config.outcome_log,
            Some(PathBuf::from("/var/log/gatepass/outcomes.jsonl"))
        );
        Ok(())
    }

    #[test]
    fn concurrency_limit_is_bounded() -> ConfigResult<()> {
        let mut pairs = REQUIRED.to_vec();
        pairs.push((MAX_CONCURRENCY, "1024"));
        assert_eq!(load(&pairs)?.schedule.max_concurrency, 1024);

        pairs.pop();
        pairs.push((MAX_CONCURRENCY, "18446744073709551615"));
        assert!(matches!(
            load(&pairs),
            Err(ConfigError::InvalidField {
                field: MAX_CONCURRENCY,
                reason: "out_of_range",
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (name, value) in [
            (MAX_CONCURRENCY, "0"),
            (MAX_CONCURRENCY, "1025"),
            (MAX_CONCURRENCY, "18446744073709551615"),
            (TIMEZONE, "Nowhere/Special"),
            (TRIGGER_AT, "7am"),
            (FETCH_ATTEMPTS, "many"),
            (FORM_URL, "portal.example"),
        ] {
            let mut pairs = REQUIRED.to_vec();
            pairs.retain(|(existing, _)| *existing != name);
            pairs.push((name, value));
            assert!(
                matches!(
                    load(&pairs),
                    Err(ConfigError::InvalidField { field, .. }) if field == name
                ),
                "{name}={value}"
            );
        }
    }
}
