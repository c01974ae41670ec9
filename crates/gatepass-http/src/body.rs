//! Bounded response body reads.
//!
//! # Design
//! - Bodies are streamed chunk by chunk so an oversized page never lands in
//!   memory in full.
//! - Excerpts are cut on a UTF-8 boundary; invalid bytes inside the kept
//!   prefix are replaced, never dropped silently.
#![allow(clippy::redundant_pub_crate)]

use reqwest::Response;

/// Body prefix read from a response.
#[derive(Debug, Default)]
pub(crate) struct BoundedBody {
    pub(crate) bytes: Vec<u8>,
    pub(crate) truncated: bool,
}

/// Read at most `limit` bytes of `response`.
pub(crate) async fn read_bounded(
    mut response: Response,
    limit: usize,
) -> Result<BoundedBody, reqwest::Error> {
    let mut body = BoundedBody::default();
    while let Some(chunk) = response.chunk().await? {
        let room = limit.saturating_sub(body.bytes.len());
        if chunk.len() > room {
            body.bytes.extend_from_slice(&chunk[..room]);
            body.truncated = true;
            break;
        }
        body.bytes.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Text excerpt of `bytes`, trimmed of surrounding whitespace; `None` when empty.
pub(crate) fn excerpt(bytes: &[u8]) -> Option<String> {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(err) if err.error_len().is_none() => {
            String::from_utf8_lossy(&bytes[..err.valid_up_to()]).into_owned()
        }
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
