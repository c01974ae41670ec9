#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! HTTP adapters for the gatepass portal.
//!
//! Layout: `client.rs` (client construction and transport classification),
//! `body.rs` (bounded body reads and excerpts), `fetcher.rs` (`FormSource`
//! over the live form page), `submitter.rs` (`FormSubmitter` for the
//! submission endpoint), `error.rs`.

mod body;
mod client;
pub mod error;
pub mod fetcher;
pub mod submitter;

pub use error::{HttpError, HttpResult};
pub use fetcher::PortalFormSource;
pub use submitter::PortalSubmitter;
