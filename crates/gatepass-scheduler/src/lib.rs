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

//! Daily precision scheduler for gatepass submissions.
//!
//! Layout: `trigger.rs` (next local trigger instant), `wait.rs` (narrowing
//! wait towards an instant), `pipeline.rs` (fetch, reconcile, submit for one
//! profile), `scheduler.rs` (Idle/Armed/Firing loop and fan-out), `clock.rs`,
//! `error.rs`.

pub mod clock;
pub mod error;
pub mod pipeline;
pub mod scheduler;
pub mod trigger;
pub mod wait;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{SchedulerError, SchedulerResult};
pub use pipeline::{FetchRetry, Pipeline, Prepared, StageFailure};
pub use scheduler::{PrecisionScheduler, SchedulerState};
pub use trigger::next_trigger;
pub use wait::{WaitOutcome, WaitStep, next_step, wait_until};
