//! One-shot scheduling integration tests.
//!
//! Tests firing order, the capacity bound, and the order in which admission
//! errors are reported.

use crate::common::{Harness, order_log};
use chronopool::testing::ProbeWork;
use chronopool::{Lifecycle, SchedulerError, work_fn};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_one_shot_fires_once_and_frees_worker() {
    let h = Harness::new(2);
    let probe = ProbeWork::new();

    h.scheduler
        .schedule_one_shot(probe.clone(), h.after(200))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(probe.fire_count(), 1);
    assert!(!h.scheduler.is_full());
    assert!(h.scheduler.is_working());
}

#[tokio::test(start_paused = true)]
async fn test_firing_order_follows_target_instants() {
    let h = Harness::new(1);
    let log = order_log();

    // Submitted out of order on purpose
    for label in [3usize, 0, 4, 1, 2] {
        let log = Arc::clone(&log);
        let item = work_fn(move || {
            let log = Arc::clone(&log);
            async move { log.lock().unwrap().push(label) }
        });
        h.scheduler
            .schedule_one_shot(item, h.after(50 * (label as i64 + 1)))
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_running_count_never_exceeds_capacity() {
    let h = Harness::new(2);
    let probe = ProbeWork::with_duration(Duration::from_millis(100));

    for _ in 0..6 {
        h.scheduler
            .schedule_one_shot(probe.clone(), h.after(10))
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.scheduler.running_count(), 2);
    assert!(h.scheduler.is_full());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(probe.fire_count(), 6);
    assert_eq!(probe.max_concurrency(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_saturated_scheduler_rejects_next_submission() {
    let capacity = 3;
    let h = Harness::new(capacity);
    let busy = ProbeWork::forever();

    for _ in 0..capacity {
        h.scheduler
            .schedule_one_shot(busy.clone(), h.after(10))
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(busy.max_concurrency(), capacity);

    let err = h
        .scheduler
        .schedule_one_shot(ProbeWork::new(), h.after(10))
        .unwrap_err();
    assert_eq!(
        err,
        SchedulerError::Rejected {
            running: capacity,
            capacity
        }
    );

    let err = h
        .scheduler
        .schedule_periodic(ProbeWork::new(), h.after(10), 1, None)
        .unwrap_err();
    assert!(err.is_rejected());
}

#[tokio::test(start_paused = true)]
async fn test_boundary_instants_are_invalid() {
    let h = Harness::new(1);

    let at_now = h.scheduler.schedule_one_shot(ProbeWork::new(), h.after(0));
    assert!(at_now.unwrap_err().is_past_instant());

    let just_before = h.scheduler.schedule_one_shot(ProbeWork::new(), h.after(-1));
    assert!(just_before.unwrap_err().is_past_instant());

    let periodic = h
        .scheduler
        .schedule_periodic(ProbeWork::new(), h.after(0), 1, None);
    assert!(periodic.unwrap_err().is_past_instant());

    assert_eq!(h.scheduler.task_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_past_instant_on_saturated_scheduler_is_invalid_argument() {
    let h = Harness::new(1);
    h.scheduler
        .schedule_one_shot(ProbeWork::forever(), h.after(10))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.scheduler.is_full());

    let err = h
        .scheduler
        .schedule_one_shot(ProbeWork::new(), h.after(-1000))
        .unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidArgument(_)));
    assert!(!err.is_rejected());
}

#[tokio::test(start_paused = true)]
async fn test_replace_pool_leaves_no_pending_work() {
    let h = Harness::new(2);
    let one_shot = ProbeWork::new();
    let periodic = ProbeWork::new();

    h.scheduler
        .schedule_one_shot(one_shot.clone(), h.after(100))
        .unwrap();
    h.scheduler
        .schedule_periodic(periodic.clone(), h.after(100), 50, None)
        .unwrap();

    h.scheduler.replace_pool(5).unwrap();
    assert_eq!(h.scheduler.capacity(), 5);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(one_shot.fire_count(), 0);
    assert_eq!(periodic.fire_count(), 0);

    // The fresh pool accepts work as usual
    let fresh = ProbeWork::new();
    h.scheduler
        .schedule_one_shot(fresh.clone(), h.after(10))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(fresh.fire_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shrinking_waits_for_running_work() {
    let h = Harness::new(3);
    let probe = ProbeWork::with_duration(Duration::from_millis(100));

    for _ in 0..3 {
        h.scheduler
            .schedule_one_shot(probe.clone(), h.after(10))
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.scheduler.running_count(), 3);

    h.scheduler.resize(1).unwrap();
    assert_eq!(h.scheduler.running_count(), 3);

    let later = ProbeWork::new();
    h.scheduler
        .schedule_one_shot(later.clone(), h.after(100))
        .unwrap_err();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(probe.completed_count(), 3);
    assert!(!h.scheduler.is_full());

    h.scheduler
        .schedule_one_shot(later.clone(), h.after(10))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(later.fire_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_twice_is_stop_once() {
    let h = Harness::new(1);
    let probe = ProbeWork::new();
    h.scheduler
        .schedule_one_shot(probe.clone(), h.after(100))
        .unwrap();

    h.scheduler.stop();
    let after_first = h.scheduler.state();
    h.scheduler.stop();
    assert_eq!(h.scheduler.state(), after_first);
    assert_eq!(after_first, Lifecycle::ShuttingDown);

    assert!(h.scheduler.await_termination(Duration::from_secs(1)).await);
    assert_eq!(probe.fire_count(), 1);
    assert_eq!(h.scheduler.state(), Lifecycle::Terminated);
    assert_eq!(
        h.scheduler.schedule_one_shot(ProbeWork::new(), h.after(10)),
        Err(SchedulerError::NotRunning)
    );
}

#[tokio::test(start_paused = true)]
async fn test_panicking_item_does_not_block_others() {
    let h = Harness::new(1);
    let probe = ProbeWork::new();

    h.scheduler
        .schedule_one_shot(work_fn(|| async { panic!("scheduled failure") }), h.after(10))
        .unwrap();
    h.scheduler
        .schedule_one_shot(probe.clone(), h.after(20))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(probe.fire_count(), 1);
    assert_eq!(h.scheduler.running_count(), 0);
}
