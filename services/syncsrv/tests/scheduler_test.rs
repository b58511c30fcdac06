//! Scheduler cadence tests under a paused clock

#![allow(clippy::disallowed_methods)] // Integration test - unwrap is acceptable

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use syncsrv::orchestrator::SyncKind;
use syncsrv::scheduler::PollScheduler;

#[tokio::test(start_paused = true)]
async fn test_independent_cadences_stay_independent() {
    let scheduler = PollScheduler::new();

    let fast_runs = Arc::new(AtomicUsize::new(0));
    let fast_counter = fast_runs.clone();
    let fast = scheduler.register("fast", Duration::from_millis(1), move || {
        let counter = fast_counter.clone();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    });

    let slow_runs = Arc::new(AtomicUsize::new(0));
    let slow_counter = slow_runs.clone();
    let slow = scheduler.register("slow", Duration::from_millis(1000), move || {
        let counter = slow_counter.clone();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    });

    scheduler.start(&fast);
    scheduler.start(&slow);

    tokio::time::sleep(Duration::from_millis(5000)).await;
    scheduler.stop_all().await;

    let fast_total = fast_runs.load(Ordering::SeqCst);
    let slow_total = slow_runs.load(Ordering::SeqCst);
    assert!(
        (4999..=5001).contains(&fast_total),
        "fast task ran {fast_total} times, expected ~5000"
    );
    assert!(
        (4..=6).contains(&slow_total),
        "slow task ran {slow_total} times, expected ~5"
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_iteration_delays_only_its_own_task() {
    let scheduler = PollScheduler::new();

    let fast_runs = Arc::new(AtomicUsize::new(0));
    let fast_counter = fast_runs.clone();
    let fast = scheduler.register("fast", Duration::from_millis(10), move || {
        let counter = fast_counter.clone();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    });

    // every run hangs for 300ms before finishing
    let stuck_runs = Arc::new(AtomicUsize::new(0));
    let stuck_counter = stuck_runs.clone();
    let stuck = scheduler.register("stuck", Duration::from_millis(100), move || {
        let counter = stuck_counter.clone();
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    });

    scheduler.start(&fast);
    scheduler.start(&stuck);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    scheduler.stop_all().await;

    // stuck completes every 400ms (300 work + 100 delay): t=300,700
    let stuck_total = stuck_runs.load(Ordering::SeqCst);
    assert!(
        (2..=3).contains(&stuck_total),
        "stuck task ran {stuck_total} times"
    );

    // the fast task never waits for the stuck one
    let fast_total = fast_runs.load(Ordering::SeqCst);
    assert!(
        (99..=101).contains(&fast_total),
        "fast task ran {fast_total} times, expected ~100"
    );
}

#[tokio::test(start_paused = true)]
async fn test_no_self_overlap_with_work_longer_than_interval() {
    let scheduler = PollScheduler::new();

    let active = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let active_in_work = active.clone();
    let overlaps_in_work = overlaps.clone();
    let task = scheduler.register("overlap_probe", Duration::from_millis(5), move || {
        let active = active_in_work.clone();
        let overlaps = overlaps_in_work.clone();
        Box::pin(async move {
            if active.fetch_add(1, Ordering::SeqCst) > 0 {
                overlaps.fetch_add(1, Ordering::SeqCst);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
    });

    scheduler.start(&task);
    tokio::time::sleep(Duration::from_millis(500)).await;
    scheduler.stop(&task).await;

    assert_eq!(overlaps.load(Ordering::SeqCst), 0, "task overlapped itself");
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_sync_skips_while_manual_refresh_runs() {
    let env = TestEnv::create();
    let alarms_query = env.query(SyncKind::ActiveAlarms);
    env.mock.set_sticky_payload(&alarms_query, payload(&[alarm_row(1, 10, 5)]));
    env.mock.set_delay(Duration::from_millis(40));

    // polling task fires every 10ms while a slow manual refresh is in flight
    env.state.start_sync_tasks();
    env.state
        .scheduler
        .set_interval(SyncKind::ActiveAlarms.as_str(), Duration::from_millis(10));

    env.state
        .orchestrator
        .refresh(SyncKind::ActiveAlarms)
        .await
        .unwrap();
    env.state.scheduler.stop_all().await;

    assert!(env.state.orchestrator.skip_count() > 0);
}
