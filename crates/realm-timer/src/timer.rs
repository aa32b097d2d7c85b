//! The game clock and its job queue.
//!
//! One background thread per running [`Timer`] polls the wall clock and
//! runs a tick whenever a full tick interval has elapsed. A tick:
//!
//! 1. drains pending insertions, stamping each with the current time,
//! 2. increments the clock,
//! 3. walks the queue in insertion order, reaping jobs with no executions
//!    left and running the ones that are due.
//!
//! The queue, the clock counter and the pending-insert channel are the only
//! shared state. The clock counter lives in an atomic so that
//! [`Timer::time`] never waits on a running tick.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use chrono::{DateTime, Utc};
use realm_types::JobId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    Executions, JobCatalog, JobContext, JobRegistry, Schedule, TimerConfig, TimerError, TimerJob,
};

/// Name given to the clock thread.
const THREAD_NAME: &str = "realm-timer";

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Persisted state of a [`Timer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    /// Whether the clock was running.
    pub active: bool,
    /// Current tick.
    pub time: u64,
    /// Real-time milliseconds per tick.
    pub tick_interval_ms: u64,
    /// Wall-clock time of the most recent tick, if any.
    #[serde(default)]
    pub last_tick_time: Option<DateTime<Utc>>,
    /// Poll interval of the clock thread in milliseconds.
    pub job_thread_sleep_ms: u64,
    /// Queued jobs in insertion order.
    #[serde(default)]
    pub jobs: Vec<JobSnapshot>,
}

/// Persisted state of one queued job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Registered kind name.
    pub kind: String,
    /// Ticks between runs.
    pub interval: u64,
    /// Runs left; `-1` on the wire means infinite.
    pub executions: Executions,
    /// Ticks after insertion before the first run.
    pub start_time: u64,
    /// Tick on which the job was inserted.
    #[serde(default)]
    pub init_time: u64,
    /// Kind-specific parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Queue entries
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ScheduledJob {
    id: JobId,
    schedule: Schedule,
    job: Box<dyn TimerJob>,
}

impl ScheduledJob {
    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            kind: self.job.kind().to_owned(),
            interval: self.schedule.interval(),
            executions: self.schedule.executions(),
            start_time: self.schedule.start_time(),
            init_time: self.schedule.init_time(),
            params: self.job.params(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// TimerHandle
// ---------------------------------------------------------------------------

/// Cloneable endpoint for inserting jobs into a [`Timer`].
///
/// Safe to use from any thread, including from inside a running job.
/// Insertions are queued and picked up at the start of the next tick.
#[derive(Clone)]
pub struct TimerHandle {
    inbox: Sender<ScheduledJob>,
    clock: Arc<AtomicU64>,
    catalog: Option<Arc<dyn JobCatalog>>,
}

impl TimerHandle {
    /// Queue `job` for insertion on `schedule`.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::UnregisteredJobKind`] if the timer was built
    /// with a catalog that does not know the job's kind, or
    /// [`TimerError::TimerGone`] if the timer has been dropped.
    pub fn insert_job(
        &self,
        job: Box<dyn TimerJob>,
        schedule: Schedule,
    ) -> Result<JobId, TimerError> {
        let kind = job.kind();
        if let Some(catalog) = &self.catalog {
            if !catalog.is_registered(kind) {
                return Err(TimerError::UnregisteredJobKind {
                    kind: kind.to_owned(),
                });
            }
        }

        let id = JobId::new();
        self.inbox
            .send(ScheduledJob { id, schedule, job })
            .map_err(|_| TimerError::TimerGone)?;
        debug!(job_id = %id, kind, interval = schedule.interval(), "Timer job queued");
        Ok(id)
    }

    /// Current game time.
    pub fn time(&self) -> u64 {
        self.clock.load(Ordering::Acquire)
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("time", &self.time())
            .field("has_catalog", &self.catalog.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct Shared {
    clock: Arc<AtomicU64>,
    active: AtomicBool,
    /// Bumped for every spawned clock thread; a thread exits once it no
    /// longer holds the latest value.
    generation: AtomicU64,
    queue: Mutex<Vec<ScheduledJob>>,
    inbox: Mutex<Receiver<ScheduledJob>>,
    last_tick: Mutex<Option<DateTime<Utc>>>,
    config: TimerConfig,
}

impl Shared {
    /// Move pending insertions into the queue. Caller holds the queue lock.
    fn drain_inbox(&self, queue: &mut Vec<ScheduledJob>) {
        let inbox = lock(&self.inbox);
        let now = self.clock.load(Ordering::Acquire);
        while let Ok(mut pending) = inbox.try_recv() {
            pending.schedule.stamp(now);
            queue.push(pending);
        }
    }

    fn locked_queue(&self) -> MutexGuard<'_, Vec<ScheduledJob>> {
        let mut queue = lock(&self.queue);
        self.drain_inbox(&mut queue);
        queue
    }

    fn tick(&self, handle: &TimerHandle) -> Result<u64, TimerError> {
        let mut queue = self.locked_queue();

        let now = self
            .clock
            .load(Ordering::Acquire)
            .checked_add(1)
            .ok_or(TimerError::ClockOverflow)?;
        self.clock.store(now, Ordering::Release);

        queue.retain_mut(|entry| {
            if entry.schedule.executions().is_exhausted() {
                debug!(job_id = %entry.id, kind = entry.job.kind(), tick = now, "Timer job reaped");
                return false;
            }

            if entry.schedule.is_due(now) {
                debug!(job_id = %entry.id, kind = entry.job.kind(), tick = now, "Running timer job");
                let mut ctx = JobContext {
                    time: now,
                    id: entry.id,
                    schedule: &mut entry.schedule,
                    timer: handle,
                };
                entry.job.execute(&mut ctx);
                entry.schedule.count_run();
            }
            true
        });

        *lock(&self.last_tick) = Some(Utc::now());
        Ok(now)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.active.load(Ordering::Acquire)
            && self.generation.load(Ordering::Acquire) == generation
    }

    fn run(&self, handle: &TimerHandle, generation: u64) {
        let tick_interval = self.config.tick_interval();
        let poll_interval = self.config.poll_interval();
        let mut last_tick = Instant::now();

        loop {
            thread::sleep(poll_interval);
            if !self.is_current(generation) {
                break;
            }

            let elapsed = last_tick.elapsed();
            if elapsed < tick_interval {
                continue;
            }
            if elapsed >= tick_interval.saturating_mul(2) {
                warn!(
                    elapsed_ms = elapsed.as_millis(),
                    tick_interval_ms = self.config.tick_interval_ms,
                    "Timer tick running late"
                );
            }

            if let Err(e) = self.tick(handle) {
                warn!(error = %e, "Timer tick failed, stopping clock");
                self.active.store(false, Ordering::Release);
                break;
            }
            last_tick = Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// The game clock.
///
/// Starts stopped at time 0. Dropping a running timer stops it and joins
/// the clock thread.
pub struct Timer {
    shared: Arc<Shared>,
    handle: TimerHandle,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Timer {
    /// Create a stopped timer that accepts any job kind.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: TimerConfig) -> Result<Self, TimerError> {
        Self::build(config, None)
    }

    /// Create a stopped timer that only accepts job kinds known to
    /// `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidConfig`] if `config` does not validate.
    pub fn with_catalog(
        config: TimerConfig,
        catalog: Arc<dyn JobCatalog>,
    ) -> Result<Self, TimerError> {
        Self::build(config, Some(catalog))
    }

    fn build(
        config: TimerConfig,
        catalog: Option<Arc<dyn JobCatalog>>,
    ) -> Result<Self, TimerError> {
        config.validate()?;

        let (sender, receiver) = mpsc::channel();
        let clock = Arc::new(AtomicU64::new(0));
        let shared = Arc::new(Shared {
            clock: Arc::clone(&clock),
            active: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            queue: Mutex::new(Vec::new()),
            inbox: Mutex::new(receiver),
            last_tick: Mutex::new(None),
            config,
        });
        let handle = TimerHandle {
            inbox: sender,
            clock,
            catalog,
        };

        Ok(Self {
            shared,
            handle,
            worker: Mutex::new(None),
        })
    }

    /// A cloneable insertion endpoint for this timer.
    pub fn handle(&self) -> TimerHandle {
        self.handle.clone()
    }

    /// Pacing configuration.
    pub fn config(&self) -> &TimerConfig {
        &self.shared.config
    }

    /// Current game time.
    pub fn time(&self) -> u64 {
        self.shared.clock.load(Ordering::Acquire)
    }

    /// Whether the clock thread is running.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Wall-clock time of the most recent tick.
    pub fn last_tick_time(&self) -> Option<DateTime<Utc>> {
        *lock(&self.shared.last_tick)
    }

    /// Start the clock thread. Does nothing if already running.
    ///
    /// A clock thread left over from a stop issued inside a job is joined
    /// before the new one spawns, without holding the worker lock, so the
    /// old thread may still call back into the timer while it winds down.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::ThreadSpawn`] if the thread cannot be created;
    /// the timer stays stopped.
    pub fn start(&self) -> Result<(), TimerError> {
        let previous = {
            let mut worker = lock(&self.worker);
            if self.is_active() {
                return Ok(());
            }
            match worker.take() {
                // A job stopped and restarted the clock from the clock
                // thread itself: that thread is still looping.
                Some(own) if own.thread().id() == thread::current().id() => {
                    *worker = Some(own);
                    self.shared.active.store(true, Ordering::Release);
                    info!(time = self.time(), "Timer restarted");
                    return Ok(());
                }
                other => other,
            }
        };

        if let Some(previous) = previous {
            if previous.join().is_err() {
                warn!("Previous timer thread panicked");
            }
        }

        let mut worker = lock(&self.worker);
        if self.is_active() {
            // Started by someone else while the old thread wound down.
            return Ok(());
        }

        let generation = self
            .shared
            .generation
            .fetch_add(1, Ordering::AcqRel)
            .wrapping_add(1);
        self.shared.active.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let handle = self.handle.clone();
        let spawned = thread::Builder::new()
            .name(THREAD_NAME.to_owned())
            .spawn(move || shared.run(&handle, generation));

        match spawned {
            Ok(join) => {
                // Any handle still stored belongs to a superseded thread,
                // which exits on its next poll.
                *worker = Some(join);
                info!(
                    time = self.time(),
                    tick_interval_ms = self.shared.config.tick_interval_ms,
                    "Timer started"
                );
                Ok(())
            }
            Err(source) => {
                self.shared.active.store(false, Ordering::Release);
                Err(TimerError::ThreadSpawn { source })
            }
        }
    }

    /// Stop the clock thread and wait for it to exit.
    ///
    /// Called from the clock thread itself (from inside a job), this only
    /// deactivates the clock; the thread exits after the current tick.
    pub fn stop(&self) {
        let join = {
            let mut worker = lock(&self.worker);
            if !self.shared.active.swap(false, Ordering::AcqRel) {
                return;
            }
            match worker.take() {
                Some(own) if own.thread().id() == thread::current().id() => {
                    *worker = Some(own);
                    None
                }
                other => other,
            }
        };

        if let Some(join) = join {
            if join.join().is_err() {
                warn!("Timer thread panicked");
            }
        }
        info!(time = self.time(), "Timer stopped");
    }

    /// Zero the clock and drop every queued and pending job. Running state
    /// is unchanged.
    pub fn reset(&self) {
        let mut queue = self.shared.locked_queue();
        let dropped = queue.len();
        queue.clear();
        self.shared.clock.store(0, Ordering::Release);
        info!(dropped_jobs = dropped, "Timer reset");
    }

    /// Run one tick by hand on a stopped timer, as the clock thread would.
    ///
    /// Only built for tests (`test-util` feature). Outside of it the clock
    /// advances solely while the timer is running.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::ClockRunning`] if the clock thread is active and
    /// [`TimerError::ClockOverflow`] if the clock is at `u64::MAX`.
    #[cfg(any(test, feature = "test-util"))]
    pub fn step(&self) -> Result<u64, TimerError> {
        if self.is_active() {
            return Err(TimerError::ClockRunning);
        }
        self.shared.tick(&self.handle)
    }

    /// Queue `job` for insertion on `schedule`. See
    /// [`TimerHandle::insert_job`].
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::UnregisteredJobKind`] if the kind is unknown
    /// to this timer's catalog.
    pub fn insert_job(
        &self,
        job: Box<dyn TimerJob>,
        schedule: Schedule,
    ) -> Result<JobId, TimerError> {
        self.handle.insert_job(job, schedule)
    }

    /// Remove a job. Returns whether it was found.
    ///
    /// Must not be called from inside a running job: the tick holds the
    /// queue lock. A job cancels itself with [`JobContext::cancel`].
    pub fn remove_job(&self, id: JobId) -> bool {
        let mut queue = self.shared.locked_queue();
        let before = queue.len();
        queue.retain(|entry| entry.id != id);
        let removed = queue.len() < before;
        if removed {
            debug!(job_id = %id, "Timer job removed");
        }
        removed
    }

    /// Number of queued jobs, including pending insertions.
    pub fn job_count(&self) -> usize {
        self.shared.locked_queue().len()
    }

    /// Whether a job is queued.
    pub fn contains_job(&self, id: JobId) -> bool {
        self.shared.locked_queue().iter().any(|entry| entry.id == id)
    }

    /// Schedule of a queued job.
    pub fn schedule_of(&self, id: JobId) -> Option<Schedule> {
        self.shared
            .locked_queue()
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.schedule)
    }

    /// Capture the clock and queue.
    pub fn snapshot(&self) -> TimerSnapshot {
        let queue = self.shared.locked_queue();
        TimerSnapshot {
            active: self.is_active(),
            time: self.time(),
            tick_interval_ms: self.shared.config.tick_interval_ms,
            last_tick_time: self.last_tick_time(),
            job_thread_sleep_ms: self.shared.config.poll_interval_ms,
            jobs: queue.iter().map(ScheduledJob::snapshot).collect(),
        }
    }

    /// Replace the clock and queue with the contents of `snapshot`,
    /// rebuilding each job through `registry`.
    ///
    /// Pacing stays as configured on this timer. Running state is not
    /// changed; the caller decides whether to start the clock based on
    /// [`TimerSnapshot::active`].
    ///
    /// # Errors
    ///
    /// Returns the first error raised while rebuilding a job; the timer is
    /// left untouched in that case.
    pub fn restore<C>(
        &self,
        snapshot: &TimerSnapshot,
        registry: &JobRegistry<C>,
        ctx: &C,
    ) -> Result<(), TimerError> {
        let mut rebuilt = Vec::with_capacity(snapshot.jobs.len());
        for saved in &snapshot.jobs {
            let job = registry.instantiate(&saved.kind, &saved.params, ctx)?;
            let mut schedule = Schedule::new(saved.interval, saved.executions, saved.start_time)?;
            schedule.stamp(saved.init_time);
            rebuilt.push(ScheduledJob {
                id: JobId::new(),
                schedule,
                job,
            });
        }

        let mut queue = self.shared.locked_queue();
        *queue = rebuilt;
        self.shared.clock.store(snapshot.time, Ordering::Release);
        *lock(&self.shared.last_tick) = snapshot.last_tick_time;
        info!(
            time = snapshot.time,
            jobs = queue.len(),
            "Timer restored from snapshot"
        );
        Ok(())
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("time", &self.time())
            .field("active", &self.is_active())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}
