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
#![allow(clippy::module_name_repetitions)]

//! Engine-agnostic gatepass domain: sessions, profiles, snapshots, payloads and outcomes.
//!
//! Layout: `model/` (domain types), `markup/` (pure markup → field mapping),
//! `reconcile.rs` (snapshot + overrides → payload), `service/` (async seams
//! implemented by the HTTP, config, and reporting layers), `error.rs`.

pub mod error;
pub mod markup;
pub mod model;
pub mod reconcile;
pub mod service;

pub use error::{FetchError, FetchResult, ProfileLoadError, ReconcileError, ReconcileResult};
pub use markup::{ExtractedForm, MarkupError, extract_fields};
pub use model::{
    FieldMap, FiringReport, FiringVerdict, FormSnapshot, NetworkErrorKind, RunOutcome, RunStatus,
    SessionContext, SkipReason, SubmissionPayload, UserProfile,
};
pub use reconcile::{FieldReconciler, REFERER_HEADER};
pub use service::{FormSource, FormSubmitter, OutcomeReporter, ProfileSource, SubmitOutcome};
