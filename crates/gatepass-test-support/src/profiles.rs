//! Session and profile builders.

use gatepass_core::{FieldMap, SessionContext, UserProfile};

/// Session for `user_id` carrying `cookies`.
#[must_use]
pub fn session(user_id: &str, cookies: &[(&str, &str)]) -> SessionContext {
    SessionContext::new(user_id, pairs(cookies))
}

/// Field map from literal pairs.
#[must_use]
pub fn fields(entries: &[(&str, &str)]) -> FieldMap {
    pairs(entries)
}

fn pairs(entries: &[(&str, &str)]) -> FieldMap {
    entries
        .iter()
        .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
        .collect()
}

/// Fluent [`UserProfile`] builder; every profile gets a session cookie by default.
#[derive(Debug, Clone)]
pub struct ProfileBuilder {
    user_id: String,
    cookies: FieldMap,
    overrides: FieldMap,
    critical_fields: Vec<String>,
}

impl ProfileBuilder {
    /// Builder for `user_id` with a `PHPSESSID` cookie derived from the id.
    #[must_use]
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            cookies: pairs(&[("PHPSESSID", &format!("sess-{user_id}"))]),
            overrides: FieldMap::new(),
            critical_fields: Vec::new(),
        }
    }

    /// Add or replace a cookie.
    #[must_use]
    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.insert(name.to_string(), value.to_string());
        self
    }

    /// Add or replace an override.
    #[must_use]
    pub fn override_field(mut self, name: &str, value: &str) -> Self {
        self.overrides.insert(name.to_string(), value.to_string());
        self
    }

    /// Mark `name` as critical for this user.
    #[must_use]
    pub fn critical(mut self, name: &str) -> Self {
        self.critical_fields.push(name.to_string());
        self
    }

    /// Finish the profile.
    #[must_use]
    pub fn build(self) -> UserProfile {
        UserProfile::new(
            SessionContext::new(self.user_id, self.cookies),
            self.overrides,
            self.critical_fields,
        )
    }
}

/// Profiles `user-0` .. `user-{count-1}` with default cookies.
#[must_use]
pub fn numbered_profiles(count: usize) -> Vec<UserProfile> {
    (0..count)
        .map(|index| ProfileBuilder::new(&format!("user-{index}")).build())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_assembles_profile() {
        let profile = ProfileBuilder::new("alice")
            .cookie("remember", "1")
            .override_field("vehicle_no1", "KA01AB1234")
            .critical("vehicle_no1")
            .build();
        assert_eq!(profile.user_id, "alice");
        assert_eq!(
            profile.session.cookie_header().as_deref(),
            Some("PHPSESSID=sess-alice; remember=1")
        );
        assert_eq!(
            profile.overrides.get("vehicle_no1").map(String::as_str),
            Some("KA01AB1234")
        );
        assert_eq!(profile.critical_fields, vec!["vehicle_no1".to_string()]);
    }

    #[test]
    fn numbered_profiles_are_unique() {
        let profiles = numbered_profiles(3);
        let ids: Vec<&str> = profiles.iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(ids, ["user-0", "user-1", "user-2"]);
    }
}
