//! Clock-thread behavior of the timer: interval fidelity against the real
//! wall clock, reaping, and start/stop/reset transitions.

#![allow(clippy::unwrap_used)]

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use realm_timer::{
    Executions, JobContext, JobRegistry, Schedule, Timer, TimerConfig, TimerJob,
};

/// Records how often it ran and the last tick it saw.
#[derive(Debug)]
struct Tally {
    runs: Arc<AtomicUsize>,
    last_tick: Arc<AtomicU64>,
}

impl TimerJob for Tally {
    fn kind(&self) -> &'static str {
        "tally"
    }

    fn execute(&mut self, ctx: &mut JobContext<'_>) {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.last_tick.store(ctx.time(), Ordering::SeqCst);
    }
}

fn tally() -> (Box<Tally>, Arc<AtomicUsize>, Arc<AtomicU64>) {
    let runs = Arc::new(AtomicUsize::new(0));
    let last_tick = Arc::new(AtomicU64::new(0));
    let job = Box::new(Tally {
        runs: Arc::clone(&runs),
        last_tick: Arc::clone(&last_tick),
    });
    (job, runs, last_tick)
}

/// Stops the clock from inside its own tick, lets another thread restart
/// it, then restarts it as well before the tick ends.
#[derive(Debug)]
struct Restarter {
    timer: Weak<Timer>,
    stopped: Sender<()>,
    restarted: Sender<()>,
}

impl TimerJob for Restarter {
    fn kind(&self) -> &'static str {
        "restarter"
    }

    fn execute(&mut self, ctx: &mut JobContext<'_>) {
        let Some(timer) = self.timer.upgrade() else {
            return;
        };
        timer.stop();
        self.stopped.send(()).unwrap();
        thread::sleep(Duration::from_millis(20));
        timer.start().unwrap();
        self.restarted.send(()).unwrap();
        ctx.cancel();
    }
}

fn fast_timer() -> Timer {
    Timer::new(TimerConfig::with_tick_interval_ms(5)).unwrap()
}

#[test]
fn interval_job_runs_once_every_five_ticks() {
    let timer = fast_timer();
    let (job, runs, _) = tally();
    timer
        .insert_job(job, Schedule::new(5, Executions::Infinite, 0).unwrap())
        .unwrap();

    timer.start().unwrap();
    thread::sleep(Duration::from_millis(80));
    timer.stop();

    let time = timer.time();
    assert!(time >= 6, "clock only reached tick {time}");
    // Inserted at tick 0, so it ran on ticks 5, 10, 15, ...
    let expected = usize::try_from(time / 5).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), expected);
}

#[test]
fn clock_is_frozen_while_stopped() {
    let timer = fast_timer();
    timer.start().unwrap();
    thread::sleep(Duration::from_millis(30));
    timer.stop();
    assert!(!timer.is_active());

    let frozen = timer.time();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(timer.time(), frozen);
}

#[test]
fn stopped_clock_never_advances_on_its_own() {
    let timer = fast_timer();
    let (job, runs, _) = tally();
    timer.insert_job(job, Schedule::every(1).unwrap()).unwrap();

    thread::sleep(Duration::from_millis(40));
    assert_eq!(timer.time(), 0);
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(timer.job_count(), 1);
}

#[test]
fn single_execution_job_is_reaped_after_its_run() {
    let timer = fast_timer();
    let (job, runs, last_tick) = tally();
    let id = timer
        .insert_job(job, Schedule::new(1, Executions::ONCE, 2).unwrap())
        .unwrap();

    timer.start().unwrap();
    thread::sleep(Duration::from_millis(80));
    timer.stop();

    let time = timer.time();
    assert!(time >= 3, "clock only reached tick {time}");
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(last_tick.load(Ordering::SeqCst), 2);
    assert!(!timer.contains_job(id));
}

#[test]
fn reset_keeps_a_running_clock_running() {
    let timer = fast_timer();
    let (job, runs, _) = tally();
    timer.insert_job(job, Schedule::every(1).unwrap()).unwrap();

    timer.start().unwrap();
    thread::sleep(Duration::from_millis(30));
    timer.reset();
    let after_reset = runs.load(Ordering::SeqCst);
    assert!(timer.is_active());
    assert_eq!(timer.job_count(), 0);

    thread::sleep(Duration::from_millis(30));
    timer.stop();
    assert_eq!(runs.load(Ordering::SeqCst), after_reset);
}

#[test]
fn start_and_stop_are_idempotent() {
    let timer = fast_timer();
    timer.stop();
    timer.start().unwrap();
    timer.start().unwrap();
    assert!(timer.is_active());
    timer.stop();
    timer.stop();
    assert!(!timer.is_active());

    timer.start().unwrap();
    assert!(timer.is_active());
}

#[test]
fn jobs_inserted_from_other_threads_are_stamped_on_arrival() {
    let timer = fast_timer();
    let mut saved = timer.snapshot();
    saved.time = 3;
    timer.restore(&saved, &JobRegistry::new(), &()).unwrap();

    let handle = timer.handle();
    let (job, _, _) = tally();
    let id = thread::spawn(move || handle.insert_job(job, Schedule::every(2).unwrap()))
        .join()
        .unwrap()
        .unwrap();

    assert_eq!(timer.schedule_of(id).unwrap().init_time(), 3);
}

#[test]
fn restart_races_a_job_that_stopped_the_clock() {
    let timer = Arc::new(fast_timer());
    let (stopped, on_stop) = mpsc::channel();
    let (restarted, on_restart) = mpsc::channel();
    timer
        .insert_job(
            Box::new(Restarter {
                timer: Arc::downgrade(&timer),
                stopped,
                restarted,
            }),
            Schedule::new(1, Executions::ONCE, 1).unwrap(),
        )
        .unwrap();

    timer.start().unwrap();
    on_stop.recv_timeout(Duration::from_secs(2)).unwrap();
    timer.start().unwrap();
    on_restart.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(timer.is_active());

    let resumed = timer.time();
    thread::sleep(Duration::from_millis(60));
    assert!(timer.time() > resumed);
    timer.stop();
    assert!(!timer.is_active());
}
