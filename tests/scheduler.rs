//! Integration tests for the scheduler's run policies. These are timing
//! based; margins are kept wide so they stay stable under load.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use nodewatch::{context::Metrics, scheduler::Scheduler};

const EVERY_SECOND: &str = "* * * * * *";

#[tokio::test]
async fn overlapping_ticks_are_skipped() {
    let metrics = Metrics::new();
    let mut scheduler =
        Scheduler::new(Duration::from_secs(30), Duration::from_secs(5), metrics.clone());

    let runs = Arc::new(AtomicU64::new(0));
    let runs_in_job = Arc::clone(&runs);
    scheduler
        .add_job("slow job", EVERY_SECOND, move |_cancel| {
            let runs = Arc::clone(&runs_in_job);
            Box::pin(async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2500)).await;
                Ok(())
            })
        })
        .unwrap();

    scheduler.start();
    tokio::time::sleep(Duration::from_millis(3600)).await;
    scheduler.stop().await;

    // With a ~2.5s body on a 1s cadence, at least one tick overlaps a run.
    let snapshot = metrics.snapshot();
    assert!(snapshot.jobs_skipped >= 1, "expected skipped ticks, got {snapshot:?}");
    assert!(runs.load(Ordering::SeqCst) <= 2, "overlapping runs were not suppressed");
}

#[tokio::test]
async fn deadline_cancels_the_job_context_and_later_ticks_still_run() {
    let metrics = Metrics::new();
    let mut scheduler =
        Scheduler::new(Duration::from_millis(200), Duration::from_secs(5), metrics.clone());

    let runs = Arc::new(AtomicU64::new(0));
    let runs_in_job = Arc::clone(&runs);
    scheduler
        .add_job("cooperative job", EVERY_SECOND, move |cancel| {
            let runs = Arc::clone(&runs_in_job);
            Box::pin(async move {
                runs.fetch_add(1, Ordering::SeqCst);
                // Wait for the deadline-driven cancellation, then return.
                cancel.cancelled().await;
                Ok(())
            })
        })
        .unwrap();

    scheduler.start();
    tokio::time::sleep(Duration::from_millis(3600)).await;
    scheduler.stop().await;

    let snapshot = metrics.snapshot();
    assert!(
        snapshot.jobs_deadline_exceeded >= 1,
        "expected a deadline, got {snapshot:?}",
    );
    // Deadline only cancels the in-flight run; it does not skip future ticks.
    assert!(runs.load(Ordering::SeqCst) >= 2, "later ticks should still have run");
}

#[tokio::test]
async fn a_panicking_job_does_not_take_down_its_neighbors() {
    let metrics = Metrics::new();
    let mut scheduler =
        Scheduler::new(Duration::from_secs(30), Duration::from_secs(5), metrics.clone());

    scheduler
        .add_job("panicking job", EVERY_SECOND, |_cancel| {
            Box::pin(async { panic!("boom") })
        })
        .unwrap();

    let healthy_runs = Arc::new(AtomicU64::new(0));
    let runs_in_job = Arc::clone(&healthy_runs);
    scheduler
        .add_job("healthy job", EVERY_SECOND, move |_cancel| {
            let runs = Arc::clone(&runs_in_job);
            Box::pin(async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .unwrap();

    scheduler.start();
    tokio::time::sleep(Duration::from_millis(2600)).await;
    scheduler.stop().await;

    let snapshot = metrics.snapshot();
    assert!(snapshot.jobs_panicked >= 1, "expected contained panics, got {snapshot:?}");
    assert!(healthy_runs.load(Ordering::SeqCst) >= 2, "healthy job should keep running");
}

#[tokio::test]
async fn stop_returns_within_the_drain_deadline_even_if_a_job_hangs() {
    let metrics = Metrics::new();
    let mut scheduler =
        Scheduler::new(Duration::from_secs(30), Duration::from_millis(300), metrics);

    scheduler
        .add_job("hanging job", EVERY_SECOND, |_cancel| {
            // Ignores its cancellation token entirely.
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
        })
        .unwrap();

    scheduler.start();
    // Let one run start.
    tokio::time::sleep(Duration::from_millis(1600)).await;

    let started = Instant::now();
    scheduler.stop().await;
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "stop took {:?}",
        started.elapsed(),
    );
}

#[tokio::test]
async fn cooperative_jobs_drain_cleanly_on_stop() {
    let metrics = Metrics::new();
    let mut scheduler =
        Scheduler::new(Duration::from_secs(30), Duration::from_secs(5), metrics.clone());

    scheduler
        .add_job("cooperative job", EVERY_SECOND, |cancel| {
            Box::pin(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(Duration::from_secs(60)) => {}
                }
                Ok(())
            })
        })
        .unwrap();

    scheduler.start();
    tokio::time::sleep(Duration::from_millis(1600)).await;

    let started = Instant::now();
    scheduler.stop().await;
    // Cancellation propagates into the run, so the drain is immediate.
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(metrics.snapshot().jobs_completed >= 1);
}
