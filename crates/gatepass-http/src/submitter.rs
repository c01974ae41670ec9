//! Submission of reconciled payloads.
//!
//! # Design
//! - Exactly one POST per call; the portal is not idempotent, so nothing here
//!   retries.
//! - Redirects are followed the way a browser would after a form post. A
//!   chain that ends on the login page is an expired session, not a success.
//! - Every failure is folded into a [`SubmitOutcome`]; the caller always gets
//!   a status to record.

use async_trait::async_trait;
use gatepass_config::{EndpointConfig, HttpConfig};
use gatepass_core::{
    FormSubmitter, NetworkErrorKind, RunStatus, SessionContext, SubmissionPayload, SubmitOutcome,
};
use reqwest::Client;
use tracing::{debug, instrument, warn};

use crate::body::{BoundedBody, excerpt, read_bounded};
use crate::client::{build_client, classify, describe, with_session};
use crate::error::HttpResult;

/// [`FormSubmitter`] posting URL-encoded payloads to the portal.
#[derive(Debug, Clone)]
pub struct PortalSubmitter {
    client: Client,
    endpoints: EndpointConfig,
    excerpt_limit: usize,
}

impl PortalSubmitter {
    /// Submitter using the endpoint settings and the submit timeout and excerpt bound of `http`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HttpError::ClientBuild`] when the HTTP client cannot be built.
    pub fn new(endpoints: &EndpointConfig, http: &HttpConfig) -> HttpResult<Self> {
        Ok(Self {
            client: build_client("submitter", http.submit_timeout)?,
            endpoints: endpoints.clone(),
            excerpt_limit: http.excerpt_limit,
        })
    }

    const fn network_failure(kind: NetworkErrorKind, detail: String) -> SubmitOutcome {
        SubmitOutcome {
            status: RunStatus::NetworkError { kind },
            response_excerpt: None,
            detail: Some(detail),
        }
    }
}

#[async_trait]
impl FormSubmitter for PortalSubmitter {
    #[instrument(name = "submit", skip_all, fields(user_id = %session.user_id()))]
    async fn submit(&self, payload: &SubmissionPayload, session: &SessionContext) -> SubmitOutcome {
        let mut request = self
            .client
            .post(self.endpoints.submit_url.clone())
            .form(&payload.fields);
        for (name, value) in &payload.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let request = with_session(request, session);

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                let kind = classify(&err);
                warn!(kind = kind.as_str(), "submission did not complete");
                return Self::network_failure(kind, describe(&err));
            }
        };

        let status = response.status();
        let final_url = response.url().clone();
        let redirected_to_login = final_url != self.endpoints.submit_url
            && self.endpoints.is_login_url(&final_url);

        let body = match read_bounded(response, self.excerpt_limit).await {
            Ok(body) => body,
            Err(err) if status.is_success() && !redirected_to_login => {
                debug!(error = %describe(&err), "submission accepted; response body unreadable");
                BoundedBody::default()
            }
            Err(err) => return Self::network_failure(classify(&err), describe(&err)),
        };
        let response_excerpt = excerpt(&body.bytes);

        if redirected_to_login {
            return SubmitOutcome {
                status: RunStatus::NetworkError {
                    kind: NetworkErrorKind::Unauthenticated,
                },
                response_excerpt,
                detail: Some(format!("redirected to login page {}", final_url.path())),
            };
        }

        if status.is_success() {
            debug!(code = status.as_u16(), "submission accepted");
            return SubmitOutcome {
                status: RunStatus::Success,
                response_excerpt,
                detail: None,
            };
        }

        SubmitOutcome {
            status: RunStatus::HttpError {
                code: status.as_u16(),
            },
            response_excerpt,
            detail: body
                .truncated
                .then(|| format!("response body truncated to {} bytes", self.excerpt_limit)),
        }
    }
}
