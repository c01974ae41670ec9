//! Profile records and the sources that produce them.
//!
//! # Design
//! - A document is either a bare array of records or an object with a `users`
//!   array; both shapes are in circulation.
//! - `username` and `user_form_data` are accepted as aliases of `user_id` and
//!   `overrides`.
//! - Validation is all-or-nothing: one bad record fails the whole load, so a
//!   firing never runs against a silently shortened user list.
//! - File and inline sources re-read their document on every `load`, letting
//!   operators rotate cookies between firings without a restart.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use gatepass_core::{FieldMap, ProfileLoadError, ProfileSource, SessionContext, UserProfile};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::ProfileSourceConfig;
use crate::validate::scalar_text;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProfileDocument {
    Bare(Vec<ProfileRecord>),
    Wrapped { users: Vec<ProfileRecord> },
}

#[derive(Debug, Deserialize)]
struct ProfileRecord {
    #[serde(default, alias = "username")]
    user_id: Option<String>,
    #[serde(default)]
    cookies: BTreeMap<String, Value>,
    #[serde(default, alias = "user_form_data")]
    overrides: BTreeMap<String, Value>,
    #[serde(default)]
    critical_fields: Vec<String>,
}

/// Parse and validate a profile document.
///
/// # Errors
///
/// Returns [`ConfigError::Json`] for malformed documents,
/// [`ConfigError::InvalidProfile`] for a record failing validation, and
/// [`ConfigError::DuplicateProfile`] when a user id repeats.
pub fn parse_profiles(document: &str) -> ConfigResult<Vec<UserProfile>> {
    let parsed: ProfileDocument =
        serde_json::from_str(document).map_err(|source| ConfigError::Json {
            operation: "profiles.parse",
            source,
        })?;
    let records = match parsed {
        ProfileDocument::Bare(records) | ProfileDocument::Wrapped { users: records } => records,
    };

    let mut seen = BTreeSet::new();
    let mut profiles = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let profile = validate_record(index, record)?;
        if !seen.insert(profile.user_id.clone()) {
            return Err(ConfigError::DuplicateProfile {
                user_id: profile.user_id,
            });
        }
        profiles.push(profile);
    }
    Ok(profiles)
}

fn validate_record(index: usize, record: ProfileRecord) -> ConfigResult<UserProfile> {
    let user_id = record
        .user_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ConfigError::invalid_profile(index, "user_id", "blank"))?;

    if record.cookies.is_empty() {
        return Err(ConfigError::invalid_profile(index, "cookies", "empty"));
    }
    let cookies = text_map(index, "cookies", record.cookies)?;
    check_cookies(index, &cookies)?;
    let overrides = text_map(index, "overrides", record.overrides)?;

    if record
        .critical_fields
        .iter()
        .any(|field| field.trim().is_empty())
    {
        return Err(ConfigError::invalid_profile(
            index,
            "critical_fields",
            "blank_name",
        ));
    }

    Ok(UserProfile::new(
        SessionContext::new(user_id, cookies),
        overrides,
        record.critical_fields,
    ))
}

fn check_cookies(index: usize, cookies: &FieldMap) -> ConfigResult<()> {
    for (name, value) in cookies {
        if !name.bytes().all(is_cookie_name_byte) {
            return Err(ConfigError::invalid_profile(index, "cookies", "invalid_name"));
        }
        if !value.bytes().all(is_cookie_value_byte) {
            return Err(ConfigError::invalid_profile(index, "cookies", "invalid_value"));
        }
    }
    Ok(())
}

const fn is_cookie_name_byte(byte: u8) -> bool {
    byte.is_ascii_graphic() && !matches!(byte, b'=' | b';' | b',')
}

// Spaces are tolerated inside values; separators and control bytes would
// split or break the header.
const fn is_cookie_value_byte(byte: u8) -> bool {
    !byte.is_ascii_control() && byte != b';'
}

fn text_map(
    index: usize,
    field: &'static str,
    entries: BTreeMap<String, Value>,
) -> ConfigResult<FieldMap> {
    let mut mapped = FieldMap::new();
    for (name, value) in entries {
        if name.trim().is_empty() {
            return Err(ConfigError::invalid_profile(index, field, "blank_name"));
        }
        let text = scalar_text(&value)
            .ok_or_else(|| ConfigError::invalid_profile(index, field, "non_scalar_value"))?;
        mapped.insert(name, text);
    }
    Ok(mapped)
}

/// Profiles read from a JSON file at every load.
#[derive(Debug, Clone)]
pub struct FileProfileSource {
    path: PathBuf,
}

impl FileProfileSource {
    /// Source reading `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read and validate the file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise the
    /// errors of [`parse_profiles`].
    pub async fn read(&self) -> ConfigResult<Vec<UserProfile>> {
        let document =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|source| ConfigError::Io {
                    operation: "profiles.read",
                    path: self.path.clone(),
                    source,
                })?;
        let profiles = parse_profiles(&document)?;
        debug!(path = %self.path.display(), count = profiles.len(), "profiles loaded from file");
        Ok(profiles)
    }
}

#[async_trait]
impl ProfileSource for FileProfileSource {
    async fn load(&self) -> Result<Vec<UserProfile>, ProfileLoadError> {
        self.read()
            .await
            .map_err(|err| ProfileLoadError::unavailable("file", err))
    }
}

/// Profiles parsed from a JSON document held in memory.
#[derive(Debug, Clone)]
pub struct InlineProfileSource {
    document: String,
}

impl InlineProfileSource {
    /// Source parsing `document` at every load.
    #[must_use]
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
        }
    }
}

#[async_trait]
impl ProfileSource for InlineProfileSource {
    async fn load(&self) -> Result<Vec<UserProfile>, ProfileLoadError> {
        parse_profiles(&self.document).map_err(|err| ProfileLoadError::unavailable("inline", err))
    }
}

/// Fixed, already-validated profile list.
#[derive(Debug, Clone, Default)]
pub struct StaticProfileSource {
    profiles: Vec<UserProfile>,
}

impl StaticProfileSource {
    /// Source always yielding `profiles`.
    #[must_use]
    pub const fn new(profiles: Vec<UserProfile>) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl ProfileSource for StaticProfileSource {
    async fn load(&self) -> Result<Vec<UserProfile>, ProfileLoadError> {
        Ok(self.profiles.clone())
    }
}

/// Build the source described by `config`.
#[must_use]
pub fn profile_source(config: &ProfileSourceConfig) -> Arc<dyn ProfileSource> {
    match config {
        ProfileSourceConfig::File(path) => Arc::new(FileProfileSource::new(path.clone())),
        ProfileSourceConfig::Inline(document) => {
            Arc::new(InlineProfileSource::new(document.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LEGACY: &str = r#"[
        {
            "username": "alice",
            "cookies": {"PHPSESSID": "abc123"},
            "user_form_data": {"vehicle_no1": "KA01AB1234", "silo_no": 3}
        },
        {
            "user_id": "bob",
            "cookies": {"PHPSESSID": "def456", "remember": "1"},
            "critical_fields": ["vehicle_no1"]
        }
    ]"#;

    fn invalid(err: &ConfigError) -> Option<(usize, &'static str, &'static str)> {
        match err {
            ConfigError::InvalidProfile {
                index,
                field,
                reason,
            } => Some((*index, *field, *reason)),
            _ => None,
        }
    }

    #[test]
    fn legacy_field_names_are_accepted() -> ConfigResult<()> {
        let profiles = parse_profiles(LEGACY)?;
        assert_eq!(profiles.len(), 2);

        let alice = &profiles[0];
        assert_eq!(alice.user_id, "alice");
        assert_eq!(
            alice.session.cookie_header().as_deref(),
            Some("PHPSESSID=abc123")
        );
        assert_eq!(
            alice.overrides.get("silo_no").map(String::as_str),
            Some("3")
        );

        let bob = &profiles[1];
        assert!(bob.overrides.is_empty());
        assert_eq!(bob.critical_fields, vec!["vehicle_no1".to_string()]);
        Ok(())
    }

    #[test]
    fn wrapped_document_is_accepted() -> ConfigResult<()> {
        let profiles =
            parse_profiles(r#"{"users":[{"user_id":"carol","cookies":{"sid":"x"}}]}"#)?;
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].user_id, "carol");
        Ok(())
    }

    #[test]
    fn one_bad_record_fails_the_whole_load() {
        let cases = [
            (r#"[{"cookies":{"sid":"x"}}]"#, (0, "user_id", "blank")),
            (r#"[{"user_id":"  ","cookies":{"sid":"x"}}]"#, (0, "user_id", "blank")),
            (
                r#"[{"user_id":"a","cookies":{"sid":"x"}},{"user_id":"b","cookies":{}}]"#,
                (1, "cookies", "empty"),
            ),
            (
                r#"[{"user_id":"a","cookies":{" ":"x"}}]"#,
                (0, "cookies", "blank_name"),
            ),
            (
                r#"[{"user_id":"a","cookies":{"sid":"x; admin=1"}}]"#,
                (0, "cookies", "invalid_value"),
            ),
            (
                r#"[{"user_id":"a","cookies":{"sid":"x\r\nX-Injected: 1"}}]"#,
                (0, "cookies", "invalid_value"),
            ),
            (
                r#"[{"user_id":"a","cookies":{"sid=1":"x"}}]"#,
                (0, "cookies", "invalid_name"),
            ),
            (
                r#"[{"user_id":"a","cookies":{"sid":"x"},"overrides":{"v":{"n":1}}}]"#,
                (0, "overrides", "non_scalar_value"),
            ),
            (
                r#"[{"user_id":"a","cookies":{"sid":"x"},"critical_fields":[""]}]"#,
                (0, "critical_fields", "blank_name"),
            ),
        ];
        for (document, expected) in cases {
            let err = parse_profiles(document).err();
            assert_eq!(err.as_ref().and_then(invalid), Some(expected), "{document}");
        }
    }

    #[tokio::test]
    async fn header_breaking_cookie_fails_the_source_load() {
        let inline = InlineProfileSource::new(r#"[{"user_id":"a","cookies":{"sid":"x\ny"}}]"#);
        let Some(ProfileLoadError::Unavailable {
            source_name,
            source,
        }) = inline.load().await.err()
        else {
            panic!("expected the inline load to fail");
        };
        assert_eq!(source_name, "inline");
        let cause = source.downcast_ref::<ConfigError>().and_then(invalid);
        assert_eq!(cause, Some((0, "cookies", "invalid_value")));
    }

    #[test]
    fn duplicate_user_ids_are_rejected() {
        let err = parse_profiles(
            r#"[{"user_id":"a","cookies":{"s":"1"}},{"username":"a","cookies":{"s":"2"}}]"#,
        );
        assert!(matches!(
            err,
            Err(ConfigError::DuplicateProfile { ref user_id }) if user_id == "a"
        ));
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(
            parse_profiles("{not json"),
            Err(ConfigError::Json { .. })
        ));
        assert!(matches!(
            parse_profiles(r#"{"accounts":[]}"#),
            Err(ConfigError::Json { .. })
        ));
    }

    #[tokio::test]
    async fn file_source_rereads_on_every_load() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, r#"[{{"user_id":"a","cookies":{{"s":"1"}}}}]"#)?;
        let source = FileProfileSource::new(file.path());
        assert_eq!(source.load().await?.len(), 1);

        std::fs::write(
            file.path(),
            r#"[{"user_id":"a","cookies":{"s":"1"}},{"user_id":"b","cookies":{"s":"2"}}]"#,
        )?;
        assert_eq!(source.load().await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().ok();
        let path = dir
            .as_ref()
            .map_or_else(|| PathBuf::from("/nonexistent"), |dir| dir.path().join("users.json"));
        let result = FileProfileSource::new(path).load().await;
        assert!(matches!(
            result,
            Err(ProfileLoadError::Unavailable {
                source_name: "file",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn configured_sources_are_built() -> anyhow::Result<()> {
        let inline = profile_source(&ProfileSourceConfig::Inline(
            r#"[{"user_id":"a","cookies":{"s":"1"}}]"#.to_string(),
        ));
        assert_eq!(inline.load().await?.len(), 1);

        let fixed = StaticProfileSource::new(inline.load().await?);
        assert_eq!(fixed.load().await?[0].user_id, "a");
        Ok(())
    }
}
