//! The Idle/Armed/Firing loop against the real clock.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Timelike, Utc};
use chrono_tz::Tz;
use gatepass_config::{ScheduleConfig, StaticProfileSource, TriggerTime};
use gatepass_core::{FieldReconciler, FormSource, FormSubmitter, OutcomeReporter};
use gatepass_scheduler::{FetchRetry, Pipeline, PrecisionScheduler, SchedulerState};
use gatepass_test_support::mocks::{RecordingReporter, RecordingSubmitter, ScriptedSource};
use gatepass_test_support::profiles::{fields, numbered_profiles};
use tokio::sync::watch;

fn scheduler(
    trigger: TriggerTime,
    reporter: &Arc<RecordingReporter>,
) -> anyhow::Result<PrecisionScheduler> {
    let pipeline = Pipeline::new(
        Arc::new(ScriptedSource::new(fields(&[("csrf_token", "t")]))) as Arc<dyn FormSource>,
        Arc::new(RecordingSubmitter::new()) as Arc<dyn FormSubmitter>,
        FieldReconciler::new("https://portal.example/user/gatepass.php", Vec::new()),
        FetchRetry::none(),
    );
    Ok(PrecisionScheduler::new(
        ScheduleConfig {
            timezone: Tz::UTC,
            trigger,
            ..ScheduleConfig::default()
        },
        pipeline,
        Arc::new(StaticProfileSource::new(numbered_profiles(2))),
        Arc::clone(reporter) as Arc<dyn OutcomeReporter>,
    )?)
}

fn trigger_in(delay: TimeDelta) -> TriggerTime {
    let at = (Utc::now() + delay).time();
    TriggerTime::new(at.hour(), at.minute(), at.second(), at.nanosecond() / 1_000_000 % 1000)
}

#[tokio::test]
async fn fires_at_the_trigger_then_rearms_for_the_next_day() -> anyhow::Result<()> {
    let reporter = Arc::new(RecordingReporter::new());
    let scheduler = Arc::new(scheduler(trigger_in(TimeDelta::milliseconds(400)), &reporter)?);
    let mut states = scheduler.subscribe();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let runner = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run(shutdown_rx).await })
    };

    let first = *tokio::time::timeout(
        Duration::from_secs(5),
        states.wait_for(|state| matches!(state, SchedulerState::Armed { .. })),
    )
    .await??;
    let SchedulerState::Armed {
        scheduled_for: first_target,
    } = first
    else {
        anyhow::bail!("scheduler was not armed");
    };

    tokio::time::timeout(
        Duration::from_secs(5),
        states.wait_for(|state| {
            matches!(
                state,
                SchedulerState::Armed { scheduled_for } if *scheduled_for > first_target
            )
        }),
    )
    .await??;

    let reports = reporter.reports();
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.scheduled_for, first_target);
    assert!(report.fired_at >= first_target);
    assert!(report.lateness_ms() < 100, "late by {}ms", report.lateness_ms());
    assert_eq!(report.outcomes.len(), 2);

    if let SchedulerState::Armed { scheduled_for } = scheduler.state() {
        assert_eq!(scheduled_for - first_target, TimeDelta::days(1));
    }

    shutdown_tx.send(true)?;
    tokio::time::timeout(Duration::from_secs(5), runner).await???;
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    Ok(())
}

#[tokio::test]
async fn shutdown_interrupts_the_armed_wait() -> anyhow::Result<()> {
    let reporter = Arc::new(RecordingReporter::new());
    let scheduler = Arc::new(scheduler(trigger_in(TimeDelta::hours(3)), &reporter)?);
    let mut states = scheduler.subscribe();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let runner = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run(shutdown_rx).await })
    };
    tokio::time::timeout(
        Duration::from_secs(5),
        states.wait_for(|state| matches!(state, SchedulerState::Armed { .. })),
    )
    .await??;

    shutdown_tx.send(true)?;
    tokio::time::timeout(Duration::from_secs(2), runner).await???;

    assert!(reporter.reports().is_empty());
    assert!(reporter.skips().is_empty());
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    Ok(())
}
