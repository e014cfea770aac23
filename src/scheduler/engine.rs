//! Scheduler engine implementation.
//!
//! The scheduler is responsible for:
//! - Admitting one-shot and periodic tasks against a bounded pool
//! - Firing each task at its wall-clock target via a monotonic deadline
//! - Replacing or resizing the pool while running
//! - The stop policy for periodic tasks

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::SchedulerConfig;
use crate::core::clock::{Clock, SystemClock};
use crate::core::time_unit::TimeUnit;
use crate::core::types::{Lifecycle, TaskId};
use crate::core::work::SharedWork;
use crate::events::{Event, EventSink, default_sink};
use crate::execution::slots::WorkerSlots;

use super::task::{self, Firing, deadline_after};
use super::types::{DEFAULT_SCHEDULER_CAPACITY, SchedulerError};

/// One generation of the execution pool.
///
/// `discard` drops every pending task of this generation; `periodic` is its
/// child and drops only periodic ones.
struct Pool {
    slots: Arc<WorkerSlots>,
    discard: CancellationToken,
    periodic: CancellationToken,
}

impl Pool {
    fn new(capacity: usize, halt: &CancellationToken) -> Self {
        let discard = halt.child_token();
        let periodic = discard.child_token();
        Self {
            slots: WorkerSlots::new(capacity),
            discard,
            periodic,
        }
    }
}

struct Core {
    pool: Pool,
    time_unit: TimeUnit,
    continue_periodic_after_stop: bool,
    stopped: bool,
}

/// Builder for [`Scheduler`].
pub struct SchedulerBuilder {
    capacity: usize,
    time_unit: TimeUnit,
    continue_periodic_after_stop: bool,
    announce_periodic: bool,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    runtime: Option<Handle>,
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_SCHEDULER_CAPACITY,
            time_unit: TimeUnit::default(),
            continue_periodic_after_stop: false,
            announce_periodic: true,
            clock: Arc::new(SystemClock),
            events: default_sink(),
            runtime: None,
        }
    }
}

impl SchedulerBuilder {
    /// Set the number of concurrent executions.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the unit applied to periods given without one.
    pub fn time_unit(mut self, unit: TimeUnit) -> Self {
        self.time_unit = unit;
        self
    }

    /// Keep periodic tasks firing after [`Scheduler::stop`].
    pub fn continue_periodic_after_stop(mut self, flag: bool) -> Self {
        self.continue_periodic_after_stop = flag;
        self
    }

    /// Emit a `PeriodicScheduled` event for each accepted periodic task.
    pub fn announce_periodic(mut self, flag: bool) -> Self {
        self.announce_periodic = flag;
        self
    }

    /// Read "now" from the given clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the sink for diagnostic events.
    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Run tasks on the given runtime instead of the current one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        if self.capacity == 0 {
            return Err(SchedulerError::zero_capacity());
        }
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?,
        };

        let halt = CancellationToken::new();
        let core = Core {
            pool: Pool::new(self.capacity, &halt),
            time_unit: self.time_unit,
            continue_periodic_after_stop: self.continue_periodic_after_stop,
            stopped: false,
        };

        tracing::info!(
            capacity = self.capacity,
            time_unit = %self.time_unit,
            continue_periodic_after_stop = self.continue_periodic_after_stop,
            "Scheduler started"
        );

        Ok(Scheduler {
            core: Mutex::new(core),
            tasks: TaskTracker::new(),
            halt,
            runtime,
            clock: self.clock,
            events: self.events,
            announce_periodic: self.announce_periodic,
        })
    }
}

/// Time-based dispatcher of one-shot and periodic work.
///
/// Submission is synchronous and never blocks on the work itself. Accepted
/// tasks run on the tokio runtime captured at construction.
pub struct Scheduler {
    core: Mutex<Core>,
    tasks: TaskTracker,
    /// Cancelled by `stop_now` and on drop. Interrupts running items.
    halt: CancellationToken,
    runtime: Handle,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    announce_periodic: bool,
}

impl Scheduler {
    /// Create a scheduler with `capacity` concurrent executions on the
    /// current runtime.
    pub fn new(capacity: usize) -> Result<Self, SchedulerError> {
        Self::builder().capacity(capacity).build()
    }

    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::default()
    }

    /// Create a scheduler from configuration.
    pub fn from_config(config: &SchedulerConfig) -> Result<Self, SchedulerError> {
        Self::builder()
            .capacity(config.capacity)
            .time_unit(config.time_unit)
            .continue_periodic_after_stop(config.continue_periodic_after_stop)
            .announce_periodic(config.announce_periodic)
            .build()
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedule `item` to run once at `target`.
    ///
    /// `target` must be strictly after the clock's current time. The task is
    /// rejected if every worker is busy at the moment of submission.
    pub fn schedule_one_shot(
        &self,
        item: SharedWork,
        target: DateTime<Utc>,
    ) -> Result<TaskId, SchedulerError> {
        let core = self.core();
        let delay = self.delay_until(target)?;
        Self::admit(&core)?;

        let task_id = TaskId::new();
        let firing = self.firing(task_id, item, &core.pool, core.pool.discard.clone());
        self.tasks
            .spawn_on(task::run_one_shot(firing, deadline_after(delay)), &self.runtime);
        drop(core);

        tracing::debug!(task_id = %task_id, fire_at = %target, delay = ?delay, "Scheduled one-shot task");
        Ok(task_id)
    }

    /// Schedule `item` to run at `first` and every `period` after it.
    ///
    /// `period` is read in `unit`, or in the scheduler's time unit when `unit`
    /// is `None`, and truncated to whole milliseconds. Firings are fixed-rate:
    /// the k-th firing is due at `first + k * period` regardless of how long
    /// earlier firings took, and firings of one task never overlap.
    pub fn schedule_periodic(
        &self,
        item: SharedWork,
        first: DateTime<Utc>,
        period: u64,
        unit: Option<TimeUnit>,
    ) -> Result<TaskId, SchedulerError> {
        let core = self.core();
        let delay = self.delay_until(first)?;
        let unit = unit.unwrap_or(core.time_unit);
        Self::admit(&core)?;

        let period_ms = unit.to_millis(period);
        if period_ms == 0 {
            return Err(SchedulerError::InvalidArgument(format!(
                "period of {} {} is shorter than one millisecond",
                period, unit
            )));
        }
        let every = Duration::from_millis(period_ms);
        if unit.is_sub_millisecond() && unit.to_duration(period) != every {
            tracing::warn!(
                period,
                unit = %unit,
                truncated = ?every,
                "Period truncated to whole milliseconds"
            );
        }

        let task_id = TaskId::new();
        let firing = self.firing(task_id, item, &core.pool, core.pool.periodic.clone());
        self.tasks.spawn_on(
            task::run_periodic(firing, deadline_after(delay), every),
            &self.runtime,
        );
        drop(core);

        tracing::debug!(task_id = %task_id, first_fire = %first, period = ?every, "Scheduled periodic task");
        if self.announce_periodic {
            self.events
                .emit(&Event::periodic_scheduled(task_id, first, every));
        }
        Ok(task_id)
    }

    fn delay_until(&self, target: DateTime<Utc>) -> Result<Duration, SchedulerError> {
        let now = self.clock.now();
        if target <= now {
            return Err(SchedulerError::past_instant(target, now));
        }
        Ok((target - now).to_std().unwrap_or(Duration::ZERO))
    }

    fn admit(core: &Core) -> Result<(), SchedulerError> {
        let slots = &core.pool.slots;
        if slots.is_saturated() {
            return Err(SchedulerError::Rejected {
                running: slots.active(),
                capacity: slots.capacity(),
            });
        }
        if core.stopped {
            return Err(SchedulerError::NotRunning);
        }
        Ok(())
    }

    fn firing(
        &self,
        task_id: TaskId,
        item: SharedWork,
        pool: &Pool,
        pending: CancellationToken,
    ) -> Firing {
        Firing {
            task_id,
            item,
            slots: Arc::clone(&pool.slots),
            pending,
            halt: self.halt.clone(),
            runtime: self.runtime.clone(),
        }
    }

    /// Discard every pending task and install a fresh pool of `capacity`.
    ///
    /// Executions already running finish normally but do not count against
    /// the new pool. A periodic task that is running does not fire again.
    pub fn replace_pool(&self, capacity: usize) -> Result<(), SchedulerError> {
        if capacity == 0 {
            return Err(SchedulerError::zero_capacity());
        }
        let mut core = self.core();
        if core.stopped {
            return Err(SchedulerError::NotRunning);
        }

        let old = std::mem::replace(&mut core.pool, Pool::new(capacity, &self.halt));
        old.discard.cancel();

        tracing::info!(
            previous_capacity = old.slots.capacity(),
            capacity,
            still_running = old.slots.active(),
            "Replaced scheduler pool, pending tasks discarded"
        );
        Ok(())
    }

    /// Change the capacity of the current pool, keeping pending work.
    ///
    /// When shrinking, running executions finish and no new one starts until
    /// the running count is below the new capacity.
    pub fn resize(&self, capacity: usize) -> Result<(), SchedulerError> {
        if capacity == 0 {
            return Err(SchedulerError::zero_capacity());
        }
        let core = self.core();
        let previous = core.pool.slots.capacity();
        core.pool.slots.set_capacity(capacity);
        tracing::info!(previous_capacity = previous, capacity, "Resized scheduler pool");
        Ok(())
    }

    /// Unit applied to periods given without one.
    pub fn time_unit(&self) -> TimeUnit {
        self.core().time_unit
    }

    pub fn set_time_unit(&self, unit: TimeUnit) {
        self.core().time_unit = unit;
    }

    /// Whether periodic tasks keep firing after [`stop`](Self::stop).
    pub fn continue_periodic_after_stop(&self) -> bool {
        self.core().continue_periodic_after_stop
    }

    /// Set the stop policy for periodic tasks.
    ///
    /// Clearing the flag after `stop` cancels periodic tasks that were kept
    /// alive by it.
    pub fn set_continue_periodic_after_stop(&self, flag: bool) {
        let mut core = self.core();
        core.continue_periodic_after_stop = flag;
        if core.stopped && !flag && !core.pool.periodic.is_cancelled() {
            core.pool.periodic.cancel();
            tracing::info!("Cancelled periodic tasks kept alive after stop");
        }
    }

    /// Stop accepting work.
    ///
    /// Pending one-shot tasks still fire. Periodic tasks are cancelled unless
    /// the continue-after-stop flag is set. Calling it again has no effect.
    pub fn stop(&self) {
        let mut core = self.core();
        if core.stopped {
            return;
        }
        core.stopped = true;
        if !core.continue_periodic_after_stop {
            core.pool.periodic.cancel();
        }
        self.tasks.close();

        tracing::info!(
            tasks = self.tasks.len(),
            keep_periodic = core.continue_periodic_after_stop,
            "Scheduler stopped"
        );
    }

    /// Stop accepting work, discard all pending tasks, and cancel running
    /// items at their next await point.
    ///
    /// Items that are not interruptible, such as [`blocking_fn`] work, keep
    /// their worker until they return.
    ///
    /// [`blocking_fn`]: crate::core::work::blocking_fn
    pub fn stop_now(&self) {
        {
            let mut core = self.core();
            core.stopped = true;
            self.tasks.close();
        }
        self.halt.cancel();
        tracing::info!(tasks = self.tasks.len(), "Scheduler halted");
    }

    /// Check if every worker is busy.
    pub fn is_full(&self) -> bool {
        self.core().pool.slots.is_saturated()
    }

    /// Check if the scheduler still accepts work.
    pub fn is_working(&self) -> bool {
        self.state() == Lifecycle::Running
    }

    /// Check if the scheduler has stopped and every task has finished.
    pub fn is_terminated(&self) -> bool {
        self.state() == Lifecycle::Terminated
    }

    pub fn state(&self) -> Lifecycle {
        if !self.core().stopped {
            Lifecycle::Running
        } else if self.tasks.is_empty() {
            Lifecycle::Terminated
        } else {
            Lifecycle::ShuttingDown
        }
    }

    /// Capacity of the current pool.
    pub fn capacity(&self) -> usize {
        self.core().pool.slots.capacity()
    }

    /// Executions currently running in the current pool.
    pub fn running_count(&self) -> usize {
        self.core().pool.slots.active()
    }

    /// Tasks that are pending or running.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Wait up to `timeout` for the scheduler to terminate.
    ///
    /// Returns false straight after the timeout if it was never stopped.
    pub async fn await_termination(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.tasks.wait())
            .await
            .is_ok()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.halt.cancel();
    }
}
