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

//! Binary entrypoint for the gatepass daemon and operator commands.

/// Parse arguments, run the command, and exit with its code.
#[tokio::main]
async fn main() {
    std::process::exit(gatepass_app::run().await);
}
