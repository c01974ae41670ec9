//! Shared `reqwest` client construction and transport error classification.
#![allow(clippy::redundant_pub_crate)]

use std::time::Duration;

use gatepass_core::{NetworkErrorKind, SessionContext};
use reqwest::header::COOKIE;
use reqwest::{Client, RequestBuilder};

use crate::error::{HttpError, HttpResult};

/// Build a client with a total request timeout and no default headers.
///
/// No user agent is configured, so requests carry only the headers each
/// adapter sets explicitly plus what the transport itself requires.
pub(crate) fn build_client(operation: &'static str, timeout: Duration) -> HttpResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|source| HttpError::ClientBuild { operation, source })
}

/// Attach the session's cookies as a single `Cookie` header.
pub(crate) fn with_session(builder: RequestBuilder, session: &SessionContext) -> RequestBuilder {
    match session.cookie_header() {
        Some(cookies) => builder.header(COOKIE, cookies),
        None => builder,
    }
}

/// Map a transport-level failure to the network error taxonomy.
pub(crate) fn classify(err: &reqwest::Error) -> NetworkErrorKind {
    if err.is_timeout() {
        NetworkErrorKind::Timeout
    } else if err.is_connect() {
        NetworkErrorKind::Connect
    } else {
        NetworkErrorKind::Transport
    }
}

/// Error text without query strings, which may carry session tokens.
pub(crate) fn describe(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    if let Some(url) = err.url() {
        let mut redacted = url.clone();
        redacted.set_query(None);
        text = text.replace(url.as_str(), redacted.as_str());
    }
    text
}
