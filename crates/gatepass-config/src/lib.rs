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

//! Environment-driven configuration for the gatepass scheduler.
//!
//! Layout: `model.rs` (typed configuration), `validate.rs` (parsing helpers),
//! `loader.rs` (environment lookup), `profiles.rs` (profile record parsing and
//! `ProfileSource` implementations), `defaults.rs`, `error.rs`.

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod profiles;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_from_env, load_from_lookup};
pub use model::{
    EndpointConfig, HttpConfig, ProfileSourceConfig, ScheduleConfig, ServiceConfig, TriggerTime,
    WaitTuning,
};
pub use profiles::{
    FileProfileSource, InlineProfileSource, StaticProfileSource, parse_profiles, profile_source,
};
