//! Jobs and their schedules.
//!
//! A job runs on tick `t` when `t - init_time >= start_time` and
//! `(t - init_time - start_time) % interval == 0`. After each run its
//! remaining execution count drops by one unless it is infinite; a job with
//! zero executions left is reaped on the following tick without running.

use std::fmt;

use realm_types::JobId;
use serde::{Deserialize, Serialize};

use crate::{TimerError, TimerHandle};

// ---------------------------------------------------------------------------
// Executions
// ---------------------------------------------------------------------------

/// How many more times a job will run.
///
/// Persisted as a signed integer where `-1` means "forever".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Executions {
    /// Run on every due tick until removed.
    Infinite,
    /// Run this many more times, then get reaped.
    Remaining(u64),
}

impl Executions {
    /// A job that should run exactly once.
    pub const ONCE: Self = Self::Remaining(1);

    /// Whether the job has no runs left.
    pub const fn is_exhausted(self) -> bool {
        matches!(self, Self::Remaining(0))
    }

    /// Count one run. Infinite stays infinite and zero stays zero.
    #[must_use]
    pub const fn decremented(self) -> Self {
        match self {
            Self::Infinite => Self::Infinite,
            Self::Remaining(n) => Self::Remaining(n.saturating_sub(1)),
        }
    }
}

impl From<Executions> for i64 {
    fn from(executions: Executions) -> Self {
        match executions {
            Executions::Infinite => -1,
            Executions::Remaining(n) => Self::try_from(n).unwrap_or(Self::MAX),
        }
    }
}

impl TryFrom<i64> for Executions {
    type Error = TimerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value == -1 {
            return Ok(Self::Infinite);
        }
        u64::try_from(value)
            .map(Self::Remaining)
            .map_err(|_| TimerError::InvalidExecutions { value })
    }
}

impl fmt::Display for Executions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infinite => write!(f, "infinite"),
            Self::Remaining(n) => write!(f, "{n}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// When a job runs, relative to the tick it was inserted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    init_time: u64,
    start_time: u64,
    interval: u64,
    executions: Executions,
}

impl Schedule {
    /// Build a schedule. `init_time` is stamped by the timer on insertion.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidInterval`] if `interval` is zero.
    pub const fn new(
        interval: u64,
        executions: Executions,
        start_time: u64,
    ) -> Result<Self, TimerError> {
        if interval < 1 {
            return Err(TimerError::InvalidInterval { interval });
        }
        Ok(Self {
            init_time: 0,
            start_time,
            interval,
            executions,
        })
    }

    /// Run every `interval` ticks forever, starting immediately.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidInterval`] if `interval` is zero.
    pub const fn every(interval: u64) -> Result<Self, TimerError> {
        Self::new(interval, Executions::Infinite, 0)
    }

    /// Run once, `delay` ticks after insertion.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidInterval`] if `delay` is zero.
    pub const fn once_after(delay: u64) -> Result<Self, TimerError> {
        Self::new(delay, Executions::ONCE, delay)
    }

    /// Tick on which the job was inserted.
    pub const fn init_time(&self) -> u64 {
        self.init_time
    }

    /// Ticks after insertion before the first run.
    pub const fn start_time(&self) -> u64 {
        self.start_time
    }

    /// Ticks between runs.
    pub const fn interval(&self) -> u64 {
        self.interval
    }

    /// Runs left.
    pub const fn executions(&self) -> Executions {
        self.executions
    }

    /// Change the delay before the first run.
    pub const fn set_start_time(&mut self, start_time: u64) {
        self.start_time = start_time;
    }

    /// Change the number of runs left. Setting zero cancels the job.
    pub const fn set_executions(&mut self, executions: Executions) {
        self.executions = executions;
    }

    /// Change the run interval.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidInterval`] if `interval` is zero; the
    /// schedule is left unchanged.
    pub const fn set_interval(&mut self, interval: u64) -> Result<(), TimerError> {
        if interval < 1 {
            return Err(TimerError::InvalidInterval { interval });
        }
        self.interval = interval;
        Ok(())
    }

    pub(crate) const fn stamp(&mut self, init_time: u64) {
        self.init_time = init_time;
    }

    pub(crate) const fn count_run(&mut self) {
        self.executions = self.executions.decremented();
    }

    /// Whether a job on this schedule runs at tick `time`.
    pub const fn is_due(&self, time: u64) -> bool {
        let Some(elapsed) = time.checked_sub(self.init_time) else {
            return false;
        };
        let Some(since_start) = elapsed.checked_sub(self.start_time) else {
            return false;
        };
        match since_start.checked_rem(self.interval) {
            Some(rem) => rem == 0,
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// A unit of scheduled work.
///
/// Jobs run on the timer thread while the queue is locked. They may insert
/// new jobs through [`JobContext::timer`] and may cancel or reshape
/// themselves through [`JobContext::schedule_mut`], but must never call
/// [`Timer::remove_job`](crate::Timer::remove_job) or any other `Timer`
/// method that inspects the queue.
pub trait TimerJob: Send + fmt::Debug {
    /// Registered kind name, used to rebuild the job from a snapshot.
    fn kind(&self) -> &'static str;

    /// Do the work for this tick.
    fn execute(&mut self, ctx: &mut JobContext<'_>);

    /// Kind-specific state to persist. `Null` if the job has none.
    fn params(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// What a running job can see and change.
#[derive(Debug)]
pub struct JobContext<'a> {
    pub(crate) time: u64,
    pub(crate) id: JobId,
    pub(crate) schedule: &'a mut Schedule,
    pub(crate) timer: &'a TimerHandle,
}

impl JobContext<'_> {
    /// Current game time, already incremented for this tick.
    pub const fn time(&self) -> u64 {
        self.time
    }

    /// Identifier of the running job.
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// The running job's schedule.
    pub const fn schedule(&self) -> &Schedule {
        self.schedule
    }

    /// Mutable access to the running job's schedule.
    pub const fn schedule_mut(&mut self) -> &mut Schedule {
        self.schedule
    }

    /// Cancel the running job after this run.
    pub const fn cancel(&mut self) {
        self.schedule.set_executions(Executions::Remaining(0));
    }

    /// Handle for inserting follow-up jobs.
    pub const fn timer(&self) -> &TimerHandle {
        self.timer
    }
}
