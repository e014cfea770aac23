//! Periodic scheduling integration tests.
//!
//! Tests fixed-rate timing, non-overlap, period units, and what happens to
//! periodic tasks when the scheduler stops.

use crate::common::Harness;
use chronopool::testing::ProbeWork;
use chronopool::{Event, Lifecycle, TimeUnit};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_periodic_fires_at_fixed_rate_without_overlap() {
    let h = Harness::new(1);
    let probe = ProbeWork::new();
    let start = tokio::time::Instant::now();

    h.scheduler
        .schedule_periodic(probe.clone(), h.after(100), 100, Some(TimeUnit::Milliseconds))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(650)).await;

    let count = probe.fire_count();
    assert!((5..=7).contains(&count), "fired {} times", count);
    assert_eq!(probe.max_concurrency(), 1);

    let first = start + Duration::from_millis(100);
    for (k, fired) in probe.fire_times().into_iter().enumerate() {
        assert!(fired >= first + Duration::from_millis(100) * k as u32);
    }
    h.scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn test_overrunning_firings_run_back_to_back() {
    let h = Harness::new(1);
    // Each firing overruns its 100ms period
    let probe = ProbeWork::with_duration(Duration::from_millis(130));
    let start = tokio::time::Instant::now();

    h.scheduler
        .schedule_periodic(probe.clone(), h.after(100), 100, Some(TimeUnit::Milliseconds))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1000)).await;
    h.scheduler.stop_now();

    let times = probe.fire_times();
    assert_eq!(probe.max_concurrency(), 1);
    // Firings start back to back at 100, 230, 360, ... since each overruns
    for pair in times.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::from_millis(130));
    }
    assert!(times[0] >= start + Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_missing_unit_uses_default_seconds() {
    let h = Harness::new(1);
    assert_eq!(h.scheduler.time_unit(), TimeUnit::Seconds);
    let probe = ProbeWork::new();
    let first = h.after(100);

    let task_id = h
        .scheduler
        .schedule_periodic(probe.clone(), first, 2, None)
        .unwrap();

    assert_eq!(
        h.sink.events(),
        vec![Event::periodic_scheduled(task_id, first, Duration::from_secs(2))]
    );

    tokio::time::sleep(Duration::from_millis(2200)).await;
    assert_eq!(probe.fire_count(), 2);

    let times = probe.fire_times();
    assert_eq!(times[1] - times[0], Duration::from_secs(2));
    h.scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn test_time_unit_round_trip() {
    let h = Harness::new(1);
    for unit in TimeUnit::ALL {
        h.scheduler.set_time_unit(unit);
        assert_eq!(h.scheduler.time_unit(), unit);
    }
}

#[tokio::test(start_paused = true)]
async fn test_sub_millisecond_period_is_truncated() {
    let h = Harness::new(1);
    let probe = ProbeWork::new();

    let task_id = h
        .scheduler
        .schedule_periodic(probe.clone(), h.after(10), 2_500, Some(TimeUnit::Microseconds))
        .unwrap();

    match h.sink.events().as_slice() {
        [Event::PeriodicScheduled { task_id: id, period, .. }] => {
            assert_eq!(*id, task_id);
            assert_eq!(*period, Duration::from_millis(2));
        }
        other => panic!("unexpected events: {:?}", other),
    }
    h.scheduler.stop();
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_periodic_tasks() {
    let h = Harness::new(1);
    h.scheduler.set_continue_periodic_after_stop(false);
    let probe = ProbeWork::new();

    h.scheduler
        .schedule_periodic(probe.clone(), h.after(50), 50, Some(TimeUnit::Milliseconds))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(75)).await;
    h.scheduler.stop();
    let at_stop = probe.fire_count();
    assert_eq!(at_stop, 1);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(probe.fire_count(), at_stop);
    assert_eq!(h.scheduler.state(), Lifecycle::Terminated);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_continues_after_stop_until_forced() {
    let h = Harness::new(1);
    h.scheduler.set_continue_periodic_after_stop(true);
    let probe = ProbeWork::new();

    h.scheduler
        .schedule_periodic(probe.clone(), h.after(50), 50, Some(TimeUnit::Milliseconds))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(75)).await;
    h.scheduler.stop();
    assert!(!h.scheduler.is_working());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(probe.fire_count(), 5);
    assert_eq!(h.scheduler.state(), Lifecycle::ShuttingDown);

    h.scheduler.stop_now();
    assert!(h.scheduler.await_termination(Duration::from_millis(10)).await);
    let at_halt = probe.fire_count();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(probe.fire_count(), at_halt);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_firing_does_not_end_periodic_task() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    let h = Harness::new(1);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let item = chronopool::work_fn(move || {
        let counter = Arc::clone(&counter);
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first firing fails");
            }
        }
    });

    h.scheduler
        .schedule_periodic(item, h.after(10), 10, Some(TimeUnit::Milliseconds))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(45)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    h.scheduler.stop();
}
