//! Idle/Armed/Firing loop and per-firing fan-out.
//!
//! # Design
//! - One loop arms for the next trigger, waits, fires, reports, and re-arms.
//!   Firings are serialised by a lock, so a manual firing never overlaps a
//!   scheduled one.
//! - The next trigger is always strictly in the future, so a start-up after
//!   today's instant arms for tomorrow instead of firing late.
//! - A wake-up later than `max_lateness` is skipped and reported, never fired.
//! - Profiles are loaded once per firing and passed by value to the
//!   pipelines; a failed load skips the whole firing.
//! - Pipelines run on a `JoinSet` bounded by a semaphore. The firing
//!   completes when every profile has an outcome.
//! - Shutdown interrupts the armed wait only; an in-progress firing runs to
//!   completion.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use gatepass_config::ScheduleConfig;
use gatepass_core::{
    FiringReport, NetworkErrorKind, OutcomeReporter, ProfileSource, RunOutcome, RunStatus,
    SkipReason, UserProfile,
};
use gatepass_telemetry::Metrics;
use tokio::sync::{Mutex, Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{SchedulerError, SchedulerResult, render_chain};
use crate::pipeline::Pipeline;
use crate::trigger::next_trigger;
use crate::wait::{WaitOutcome, wait_until};

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not waiting and not firing.
    Idle,
    /// Waiting for the next trigger.
    Armed {
        /// Instant the scheduler is waiting for.
        scheduled_for: DateTime<Utc>,
    },
    /// Running pipelines.
    Firing {
        /// Identifier of the running firing.
        run_id: Uuid,
        /// Instant the firing was scheduled for.
        scheduled_for: DateTime<Utc>,
    },
}

impl SchedulerState {
    /// Machine-friendly label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Armed { .. } => "armed",
            Self::Firing { .. } => "firing",
        }
    }
}

/// Daily scheduler firing every profile's pipeline at a precise local instant.
pub struct PrecisionScheduler {
    schedule: ScheduleConfig,
    trigger: NaiveTime,
    pipeline: Pipeline,
    profiles: Arc<dyn ProfileSource>,
    reporter: Arc<dyn OutcomeReporter>,
    clock: Arc<dyn Clock>,
    metrics: Option<Metrics>,
    state: watch::Sender<SchedulerState>,
    firing: Mutex<()>,
}

impl PrecisionScheduler {
    /// Scheduler over the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Trigger`] when the configured trigger is not
    /// a valid wall-clock time.
    pub fn new(
        schedule: ScheduleConfig,
        pipeline: Pipeline,
        profiles: Arc<dyn ProfileSource>,
        reporter: Arc<dyn OutcomeReporter>,
    ) -> SchedulerResult<Self> {
        let trigger = schedule
            .trigger
            .to_naive_time()
            .map_err(|source| SchedulerError::Trigger { source })?;
        let (state, _) = watch::channel(SchedulerState::Idle);
        Ok(Self {
            schedule,
            trigger,
            pipeline,
            profiles,
            reporter,
            clock: Arc::new(SystemClock),
            metrics: None,
            state,
            firing: Mutex::new(()),
        })
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Record wake lateness into `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Receiver observing every state transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Next trigger instant strictly after the clock's current reading.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NoValidInstant`] when the trigger has no
    /// valid local instant in the coming week.
    pub fn next_fire_time(&self) -> SchedulerResult<DateTime<Utc>> {
        next_trigger(self.clock.now(), self.trigger, self.schedule.timezone)
    }

    /// Drive the daily cycle until `shutdown` turns `true` or closes.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NoValidInstant`] when no next trigger can be
    /// computed. Firing failures never end the loop.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> SchedulerResult<()> {
        let mut last_scheduled: Option<DateTime<Utc>> = None;
        loop {
            let now = self.clock.now();
            let after = last_scheduled.map_or(now, |last| now.max(last));
            let scheduled_for = next_trigger(after, self.trigger, self.schedule.timezone)?;
            self.transition(SchedulerState::Armed { scheduled_for });
            info!(
                scheduled_for = %scheduled_for,
                local = %scheduled_for.with_timezone(&self.schedule.timezone),
                in_ms = (scheduled_for - now).num_milliseconds(),
                "armed for next firing"
            );

            let waited = wait_until(
                self.clock.as_ref(),
                scheduled_for,
                self.schedule.wait,
                &mut shutdown,
            )
            .await;
            if waited == WaitOutcome::Cancelled {
                self.transition(SchedulerState::Idle);
                info!("shutdown requested while armed");
                return Ok(());
            }

            if let Err(reason) = self.fire_scheduled(scheduled_for).await {
                debug!(reason = reason.label(), "firing skipped; re-arming");
            }
            last_scheduled = Some(scheduled_for);
            self.transition(SchedulerState::Idle);

            if *shutdown.borrow() {
                info!("shutdown requested after firing");
                return Ok(());
            }
        }
    }

    /// Fire for `scheduled_for` unless the clock is already past it by more
    /// than the configured lateness bound.
    ///
    /// # Errors
    ///
    /// Returns the [`SkipReason`] when the firing was skipped; the reporter
    /// has already been told.
    pub async fn fire_scheduled(
        &self,
        scheduled_for: DateTime<Utc>,
    ) -> Result<FiringReport, SkipReason> {
        let woke_at = self.clock.now();
        let lateness = woke_at - scheduled_for;
        if let Some(metrics) = &self.metrics {
            metrics.observe_wake_lateness(lateness.to_std().unwrap_or_default());
        }

        if lateness
            .to_std()
            .is_ok_and(|late| late > self.schedule.max_lateness)
        {
            let reason = SkipReason::MissedWake {
                lateness_ms: lateness.num_milliseconds(),
            };
            warn!(
                scheduled_for = %scheduled_for,
                lateness_ms = lateness.num_milliseconds(),
                "woke too late; skipping firing"
            );
            self.reporter.firing_skipped(scheduled_for, &reason).await;
            return Err(reason);
        }
        self.fire(scheduled_for, woke_at).await
    }

    /// Fire immediately, outside the daily schedule.
    ///
    /// # Errors
    ///
    /// Returns [`SkipReason::ProfilesUnavailable`] when profiles cannot be loaded.
    pub async fn fire_now(&self) -> Result<FiringReport, SkipReason> {
        let now = self.clock.now();
        let report = self.fire(now, now).await;
        self.transition(SchedulerState::Idle);
        report
    }

    async fn fire(
        &self,
        scheduled_for: DateTime<Utc>,
        fired_at: DateTime<Utc>,
    ) -> Result<FiringReport, SkipReason> {
        let _serialised = self.firing.lock().await;
        let run_id = Uuid::new_v4();
        self.transition(SchedulerState::Firing {
            run_id,
            scheduled_for,
        });
        info!(
            run_id = %run_id,
            lateness_ms = (fired_at - scheduled_for).num_milliseconds(),
            "firing"
        );

        let profiles = match self.profiles.load().await {
            Ok(profiles) => profiles,
            Err(err) => {
                let reason = SkipReason::ProfilesUnavailable {
                    detail: render_chain(&err),
                };
                error!(
                    run_id = %run_id,
                    error = %render_chain(&err),
                    "profiles unavailable; skipping firing"
                );
                self.reporter.firing_skipped(scheduled_for, &reason).await;
                return Err(reason);
            }
        };

        let outcomes = self.fan_out(run_id, profiles).await;
        let report = FiringReport {
            run_id,
            scheduled_for,
            fired_at,
            completed_at: self.clock.now().max(fired_at),
            outcomes,
        };
        self.reporter.firing_completed(&report).await;
        info!(
            run_id = %run_id,
            users = report.outcomes.len(),
            succeeded = report.success_count(),
            failed = report.failure_count(),
            elapsed_ms = (report.completed_at - report.fired_at).num_milliseconds(),
            "firing complete"
        );
        Ok(report)
    }

    async fn fan_out(&self, run_id: Uuid, profiles: Vec<UserProfile>) -> Vec<RunOutcome> {
        let permits = self
            .schedule
            .max_concurrency
            .clamp(1, Semaphore::MAX_PERMITS);
        let limiter = Arc::new(Semaphore::new(permits));
        let mut tasks = JoinSet::new();
        let mut owners = HashMap::with_capacity(profiles.len());
        let mut slots: Vec<Option<RunOutcome>> = vec![None; profiles.len()];

        for (index, profile) in profiles.into_iter().enumerate() {
            let pipeline = self.pipeline.clone();
            let reporter = Arc::clone(&self.reporter);
            let limiter = Arc::clone(&limiter);
            let user_id = profile.user_id.clone();
            let handle = tasks.spawn(async move {
                let _permit = limiter.acquire_owned().await.ok();
                let outcome = pipeline.run(run_id, &profile).await;
                reporter.record(&outcome).await;
                (index, outcome)
            });
            owners.insert(handle.id(), (index, user_id));
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, (index, outcome))) => slots[index] = Some(outcome),
                Err(err) => {
                    let Some((index, user_id)) = owners.remove(&err.id()) else {
                        error!(run_id = %run_id, error = %err, "unknown pipeline task failed");
                        continue;
                    };
                    error!(
                        run_id = %run_id,
                        user_id = %user_id,
                        error = %err,
                        "pipeline task aborted"
                    );
                    let now = self.clock.now();
                    let outcome = RunOutcome {
                        run_id,
                        user_id,
                        started_at: now,
                        finished_at: now,
                        status: RunStatus::NetworkError {
                            kind: NetworkErrorKind::Transport,
                        },
                        response_excerpt: None,
                        detail: Some(format!("pipeline task aborted: {err}")),
                        fetch_attempts: 0,
                    };
                    self.reporter.record(&outcome).await;
                    slots[index] = Some(outcome);
                }
            }
        }
        slots.into_iter().flatten().collect()
    }

    fn transition(&self, next: SchedulerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = previous.label(), to = next.label(), "scheduler state changed");
        }
    }
}
