//! Discrete game clock and job scheduler for the Realm world engine.
//!
//! A [`Timer`] owns a tick counter and a queue of [`TimerJob`]s. Once
//! started, a dedicated background thread advances the clock every
//! configured tick interval and runs the jobs that are due, in insertion
//! order. Jobs are scheduled relative to the tick they were inserted on, so
//! a job inserted mid-run is phase-aligned to its own insertion tick.
//!
//! # Modules
//!
//! - [`config`] -- [`TimerConfig`]: tick and poll intervals.
//! - [`job`] -- [`Schedule`], [`Executions`], the [`TimerJob`] trait and the
//!   [`JobContext`] handed to running jobs.
//! - [`timer`] -- [`Timer`], the cloneable insertion endpoint
//!   [`TimerHandle`], and the persisted [`TimerSnapshot`] shape.
//! - [`registry`] -- [`JobRegistry`]: kind name to factory.
//!
//! # Inserting from inside a job
//!
//! A tick holds the queue lock while jobs run. Insertions therefore never
//! touch the queue directly: [`TimerHandle::insert_job`] sends the job over
//! a channel, and the scheduler drains that channel at the start of the
//! next tick (or whenever the queue is next inspected from outside).

pub mod config;
pub mod job;
pub mod registry;
pub mod timer;

pub use config::TimerConfig;
pub use job::{Executions, JobContext, Schedule, TimerJob};
pub use registry::{JobCatalog, JobFactory, JobRegistry};
pub use timer::{JobSnapshot, Timer, TimerHandle, TimerSnapshot};

/// Errors raised by misuse of the scheduler.
///
/// These are programming or configuration errors; correct callers never
/// see them.
#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    /// A job interval must be at least one tick.
    #[error("cannot set a timer job interval less than 1 (got {interval})")]
    InvalidInterval {
        /// The rejected interval.
        interval: u64,
    },

    /// Execution counts are `-1` (infinite) or non-negative.
    #[error("invalid timer job execution count: {value}")]
    InvalidExecutions {
        /// The rejected count.
        value: i64,
    },

    /// The job's kind has no registered factory.
    #[error("timer job kind '{kind}' has not been registered")]
    UnregisteredJobKind {
        /// The unknown kind name.
        kind: String,
    },

    /// A factory rejected the persisted parameters of a job.
    #[error("invalid parameters for timer job kind '{kind}': {reason}")]
    InvalidJobParams {
        /// The kind whose factory failed.
        kind: String,
        /// Why the parameters were rejected.
        reason: String,
    },

    /// The timer configuration is unusable.
    #[error("invalid timer configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },

    /// The clock thread could not be spawned.
    #[error("failed to start the timer thread: {source}")]
    ThreadSpawn {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    ClockOverflow,

    /// A manual step was requested while the clock thread is running.
    #[error("cannot step the clock by hand while it is running")]
    ClockRunning,

    /// The timer that owned this handle has been dropped.
    #[error("the timer this handle belongs to no longer exists")]
    TimerGone,
}
