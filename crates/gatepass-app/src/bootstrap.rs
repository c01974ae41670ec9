//! Service construction and the daemon loop.
//!
//! # Design
//! - Configuration is read once; every command builds its services from the
//!   same [`ServiceConfig`].
//! - The daemon loads profiles before arming, so a broken profile source
//!   fails start-up loudly instead of skipping the first firing.
//! - Shutdown signals stop the armed wait; a running firing finishes first.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gatepass_config::{ServiceConfig, load_from_lookup, profile_source};
use gatepass_core::{
    FieldReconciler, FiringReport, FormSource, FormSubmitter, OutcomeReporter, SubmissionPayload,
    UserProfile,
};
use gatepass_http::{PortalFormSource, PortalSubmitter};
use gatepass_scheduler::{FetchRetry, Pipeline, PrecisionScheduler, next_trigger};
use gatepass_telemetry::Metrics;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::reporter::{CompositeReporter, JsonlReporter, MetricsReporter, TracingReporter};

/// Configuration and shared registries every command starts from.
pub(crate) struct BootstrapDependencies {
    pub(crate) config: ServiceConfig,
    pub(crate) metrics: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the process environment.
    pub(crate) fn from_env() -> AppResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config =
            load_from_lookup(lookup).map_err(|err| AppError::config("config.load", err))?;
        let metrics =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self { config, metrics })
    }
}

/// Summary printed by `gatepass check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CheckSummary {
    pub(crate) users: Vec<String>,
    pub(crate) next_fire: DateTime<Utc>,
}

pub(crate) fn build_pipeline(config: &ServiceConfig) -> AppResult<Pipeline> {
    let source = PortalFormSource::new(&config.endpoints, &config.http)
        .map_err(|err| AppError::http("fetcher.new", err))?;
    let submitter = PortalSubmitter::new(&config.endpoints, &config.http)
        .map_err(|err| AppError::http("submitter.new", err))?;
    let reconciler = FieldReconciler::new(
        config.endpoints.form_url.as_str(),
        config.endpoints.critical_fields.clone(),
    );
    Ok(Pipeline::new(
        Arc::new(source) as Arc<dyn FormSource>,
        Arc::new(submitter) as Arc<dyn FormSubmitter>,
        reconciler,
        FetchRetry::from_http(&config.http),
    ))
}

pub(crate) async fn build_reporter(
    config: &ServiceConfig,
    metrics: &Metrics,
) -> AppResult<CompositeReporter> {
    let mut reporter = CompositeReporter::new()
        .with(Arc::new(TracingReporter))
        .with(Arc::new(MetricsReporter::new(metrics.clone())));
    if let Some(path) = &config.outcome_log {
        let jsonl = JsonlReporter::open(path.clone()).await?;
        info!(path = %jsonl.path().display(), "appending outcomes to file");
        reporter = reporter.with(Arc::new(jsonl));
    }
    Ok(reporter)
}

pub(crate) async fn build_scheduler(deps: &BootstrapDependencies) -> AppResult<PrecisionScheduler> {
    let pipeline = build_pipeline(&deps.config)?;
    let reporter = build_reporter(&deps.config, &deps.metrics).await?;
    PrecisionScheduler::new(
        deps.config.schedule.clone(),
        pipeline,
        profile_source(&deps.config.profiles),
        Arc::new(reporter) as Arc<dyn OutcomeReporter>,
    )
    .map(|scheduler| scheduler.with_metrics(deps.metrics.clone()))
    .map_err(|err| AppError::scheduler("scheduler.new", err))
}

pub(crate) async fn load_profiles(config: &ServiceConfig) -> AppResult<Vec<UserProfile>> {
    profile_source(&config.profiles)
        .load()
        .await
        .map_err(|err| AppError::profiles("profiles.load", err))
}

/// Run the scheduler until a shutdown signal arrives.
pub(crate) async fn run_daemon(deps: BootstrapDependencies) -> AppResult<()> {
    let profiles = load_profiles(&deps.config).await?;
    info!(profiles = profiles.len(), "profiles loaded");
    let scheduler = build_scheduler(&deps).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signals = tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let result = scheduler.run(shutdown_rx).await;
    signals.abort();
    result.map_err(|err| AppError::scheduler("scheduler.run", err))?;
    info!("scheduler stopped");
    Ok(())
}

/// Fire once, now.
pub(crate) async fn fire_once(deps: &BootstrapDependencies) -> AppResult<FiringReport> {
    let scheduler = build_scheduler(deps).await?;
    scheduler
        .fire_now()
        .await
        .map_err(|reason| AppError::FiringSkipped {
            reason: reason.label(),
        })
}

/// Fetch and reconcile `user_id`'s payload without submitting it.
pub(crate) async fn preview(config: &ServiceConfig, user_id: &str) -> AppResult<SubmissionPayload> {
    let profile = load_profiles(config)
        .await?
        .into_iter()
        .find(|profile| profile.user_id == user_id)
        .ok_or_else(|| AppError::UnknownUser {
            user_id: user_id.to_string(),
        })?;
    build_pipeline(config)?
        .prepare(&profile)
        .await
        .map(|prepared| prepared.payload)
        .map_err(|failure| AppError::PreviewFailed {
            user_id: user_id.to_string(),
            status: failure.status.label(),
            detail: failure.detail,
        })
}

/// Validate profiles and HTTP client construction; report what would run.
pub(crate) async fn check(config: &ServiceConfig, now: DateTime<Utc>) -> AppResult<CheckSummary> {
    let profiles = load_profiles(config).await?;
    build_pipeline(config)?;
    let next_fire = next_fire_times(config, now, 1)?
        .into_iter()
        .next()
        .unwrap_or(now);
    Ok(CheckSummary {
        users: profiles.into_iter().map(|profile| profile.user_id).collect(),
        next_fire,
    })
}

/// The next `count` trigger instants after `now`.
pub(crate) fn next_fire_times(
    config: &ServiceConfig,
    now: DateTime<Utc>,
    count: usize,
) -> AppResult<Vec<DateTime<Utc>>> {
    let trigger = config
        .schedule
        .trigger
        .to_naive_time()
        .map_err(|err| AppError::config("schedule.trigger", err))?;
    let mut instants = Vec::with_capacity(count);
    let mut after = now;
    for _ in 0..count {
        after = next_trigger(after, trigger, config.schedule.timezone)
            .map_err(|err| AppError::scheduler("schedule.next_trigger", err))?;
        instants.push(after);
    }
    Ok(instants)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    () = ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable; listening for ctrl-c only");
                ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}
