//! Live form page retrieval.
//!
//! # Design
//! - One GET per call; the pipeline decides whether a failure is worth
//!   another attempt via [`gatepass_core::FetchError::is_retryable`].
//! - Session expiry shows up three ways on this portal: a redirect to the
//!   login page, a 401/403, or a 200 page without the gatepass form. All three
//!   map to the unauthenticated network error so callers never retry them.
//! - Configured field defaults fill gaps in the snapshot only; live values win.

use async_trait::async_trait;
use gatepass_config::{EndpointConfig, HttpConfig};
use gatepass_core::{
    FetchError, FetchResult, FormSnapshot, FormSource, NetworkErrorKind, SessionContext,
    extract_fields,
};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use crate::body::read_bounded;
use crate::client::{build_client, classify, describe, with_session};
use crate::error::HttpResult;

/// [`FormSource`] backed by the portal's form page.
#[derive(Debug, Clone)]
pub struct PortalFormSource {
    client: Client,
    endpoints: EndpointConfig,
    max_page_bytes: usize,
}

impl PortalFormSource {
    /// Fetcher using the endpoint settings and the fetch timeout and page bound of `http`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HttpError::ClientBuild`] when the HTTP client cannot be built.
    pub fn new(endpoints: &EndpointConfig, http: &HttpConfig) -> HttpResult<Self> {
        Ok(Self {
            client: build_client("fetcher", http.fetch_timeout)?,
            endpoints: endpoints.clone(),
            max_page_bytes: http.max_page_bytes,
        })
    }

    fn is_login_redirect(&self, final_url: &url::Url) -> bool {
        final_url != &self.endpoints.form_url && self.endpoints.is_login_url(final_url)
    }
}

#[async_trait]
impl FormSource for PortalFormSource {
    #[instrument(name = "fetch", skip_all, fields(user_id = %session.user_id()))]
    async fn fetch(&self, session: &SessionContext) -> FetchResult<FormSnapshot> {
        let request = with_session(self.client.get(self.endpoints.form_url.clone()), session);
        let response = request.send().await.map_err(|err| {
            FetchError::network(classify(&err), err.status().map(|s| s.as_u16()), describe(&err))
        })?;

        let status = response.status();
        if self.is_login_redirect(response.url()) {
            return Err(FetchError::unauthenticated(format!(
                "redirected to login page {}",
                response.url().path()
            )));
        }
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(FetchError::network(
                NetworkErrorKind::Unauthenticated,
                Some(status.as_u16()),
                "form page refused the session",
            ));
        }
        if !status.is_success() {
            return Err(FetchError::network(
                NetworkErrorKind::UnexpectedStatus,
                Some(status.as_u16()),
                format!("form page answered {status}"),
            ));
        }

        let body = read_bounded(response, self.max_page_bytes)
            .await
            .map_err(|err| FetchError::network(classify(&err), None, describe(&err)))?;
        if body.truncated {
            return Err(FetchError::PageTooLarge {
                limit: self.max_page_bytes,
            });
        }

        let markup = String::from_utf8_lossy(&body.bytes);
        let extracted = extract_fields(&markup, self.endpoints.form_action.as_deref())?;
        if !extracted.form_found {
            return Err(FetchError::unauthenticated(
                "form page did not contain the gatepass form",
            ));
        }

        let mut fields = extracted.fields;
        let live = fields.len();
        for (name, value) in &self.endpoints.field_defaults {
            fields
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        debug!(
            live_fields = live,
            defaulted_fields = fields.len() - live,
            "form snapshot captured"
        );
        Ok(FormSnapshot::now(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatepass_core::{FieldMap, RunStatus};
    use gatepass_test_support::fixtures::{FORM_ACTION, GATEPASS_PAGE, LOGIN_PAGE};
    use gatepass_test_support::profiles::session;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn endpoints(server: &MockServer) -> anyhow::Result<EndpointConfig> {
        Ok(EndpointConfig {
            form_url: server.url("/user/gatepass.php").parse()?,
            submit_url: server.url("/user/gatepass_submit.php").parse()?,
            form_action: Some(FORM_ACTION.to_string()),
            login_markers: vec!["login".to_string()],
            critical_fields: Vec::new(),
            field_defaults: FieldMap::new(),
        })
    }

    fn fetcher(endpoints: &EndpointConfig, timeout: Duration) -> anyhow::Result<PortalFormSource> {
        let http = HttpConfig {
            fetch_timeout: timeout,
            max_page_bytes: 64 * 1024,
            ..HttpConfig::default()
        };
        Ok(PortalFormSource::new(endpoints, &http)?)
    }

    fn kind(err: &FetchError) -> Option<NetworkErrorKind> {
        match err.status() {
            RunStatus::NetworkError { kind } => Some(kind),
            _ => None,
        }
    }

    #[tokio::test]
    async fn fetch_sends_cookies_and_extracts_fields() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/user/gatepass.php")
                .header("cookie", "PHPSESSID=abc123");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body(GATEPASS_PAGE);
        });

        let snapshot = fetcher(&endpoints(&server)?, Duration::from_secs(5))?
            .fetch(&session("alice", &[("PHPSESSID", "abc123")]))
            .await?;

        mock.assert();
        assert_eq!(
            snapshot.fields.get("csrf_token").map(String::as_str),
            Some("tok&123")
        );
        assert_eq!(snapshot.fields.get("silo_name").map(String::as_str), Some("SILO-B"));
        Ok(())
    }

    #[tokio::test]
    async fn field_defaults_fill_only_missing_fields() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/user/gatepass.php");
            then.status(200).body(GATEPASS_PAGE);
        });
        let mut config = endpoints(&server)?;
        config.field_defaults = [
            ("tps".to_string(), "RTPS".to_string()),
            ("generate_flyash_gatepass".to_string(), "1".to_string()),
        ]
        .into_iter()
        .collect();

        let snapshot = fetcher(&config, Duration::from_secs(5))?
            .fetch(&session("alice", &[("sid", "1")]))
            .await?;

        assert_eq!(snapshot.fields.get("tps").map(String::as_str), Some("BTPS"));
        assert_eq!(
            snapshot.fields.get("generate_flyash_gatepass").map(String::as_str),
            Some("1")
        );
        Ok(())
    }

    #[tokio::test]
    async fn login_redirect_is_unauthenticated() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/user/gatepass.php");
            then.status(302).header("location", "/login.php?expired=1");
        });
        server.mock(|when, then| {
            when.method(GET).path("/login.php");
            then.status(200).body(LOGIN_PAGE);
        });

        let err = fetcher(&endpoints(&server)?, Duration::from_secs(5))?
            .fetch(&session("alice", &[("sid", "stale")]))
            .await
            .err();

        let err = err.ok_or_else(|| anyhow::anyhow!("expected failure"))?;
        assert_eq!(kind(&err), Some(NetworkErrorKind::Unauthenticated));
        assert!(!err.is_retryable());
        Ok(())
    }

    #[tokio::test]
    async fn missing_form_is_unauthenticated() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/user/gatepass.php");
            then.status(200).body(LOGIN_PAGE);
        });

        let err = fetcher(&endpoints(&server)?, Duration::from_secs(5))?
            .fetch(&session("alice", &[("sid", "stale")]))
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected failure"))?;
        assert_eq!(kind(&err), Some(NetworkErrorKind::Unauthenticated));
        Ok(())
    }

    #[tokio::test]
    async fn status_codes_are_classified() -> anyhow::Result<()> {
        for (code, expected, retryable) in [
            (401, NetworkErrorKind::Unauthenticated, false),
            (403, NetworkErrorKind::Unauthenticated, false),
            (404, NetworkErrorKind::UnexpectedStatus, false),
            (503, NetworkErrorKind::UnexpectedStatus, true),
        ] {
            let server = MockServer::start_async().await;
            server.mock(|when, then| {
                when.method(GET).path("/user/gatepass.php");
                then.status(code).body("nope");
            });
            let err = fetcher(&endpoints(&server)?, Duration::from_secs(5))?
                .fetch(&session("alice", &[("sid", "1")]))
                .await
                .err()
                .ok_or_else(|| anyhow::anyhow!("expected failure for {code}"))?;
            assert_eq!(kind(&err), Some(expected), "{code}");
            assert_eq!(err.is_retryable(), retryable, "{code}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn non_markup_body_is_a_parse_error() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/user/gatepass.php");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"error":"maintenance"}"#);
        });

        let err = fetcher(&endpoints(&server)?, Duration::from_secs(5))?
            .fetch(&session("alice", &[("sid", "1")]))
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected failure"))?;
        assert_eq!(err.status(), RunStatus::ParseError);
        assert!(!err.is_retryable());
        Ok(())
    }

    #[tokio::test]
    async fn oversized_page_is_rejected() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let huge = format!("<html>{}</html>", "x".repeat(128 * 1024));
        server.mock(move |when, then| {
            when.method(GET).path("/user/gatepass.php");
            then.status(200).body(huge.as_str());
        });

        let err = fetcher(&endpoints(&server)?, Duration::from_secs(5))?
            .fetch(&session("alice", &[("sid", "1")]))
            .await
            .err();
        assert!(matches!(err, Some(FetchError::PageTooLarge { limit: 65_536 })));
        Ok(())
    }

    #[tokio::test]
    async fn slow_page_times_out_and_is_retryable() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/user/gatepass.php");
            then.status(200)
                .delay(Duration::from_millis(800))
                .body(GATEPASS_PAGE);
        });

        let err = fetcher(&endpoints(&server)?, Duration::from_millis(100))?
            .fetch(&session("alice", &[("sid", "1")]))
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected timeout"))?;
        assert_eq!(kind(&err), Some(NetworkErrorKind::Timeout));
        assert!(err.is_retryable());
        Ok(())
    }
}
