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
#![allow(clippy::redundant_pub_crate)]

//! Gatepass application wiring.
//!
//! Layout:
//! - `cli.rs`: argument parsing, logging setup, and command dispatch
//! - `bootstrap.rs`: service construction from configuration and the daemon loop
//! - `reporter.rs`: outcome sinks (log, JSON lines, metrics, fan-out)
//! - `error.rs`: application error type and exit codes

pub(crate) mod bootstrap;
pub(crate) mod cli;
pub mod error;
pub mod reporter;

pub use cli::run;
pub use error::{AppError, AppResult};
