//! Background reminder poll loop.
//!
//! # Responsibility
//! - Wake once per interval, ask the matcher for due tasks and hand each
//!   notifiable one to the notification sink.
//! - Run on a dedicated thread that can be stopped from its handle.
//!
//! # Invariants
//! - State is `Idle` between ticks and `Firing` only while a tick runs.
//! - Matcher and sink failures are logged and swallowed; a failing task never
//!   prevents dispatch to the remaining tasks or the next tick.
//! - Delivery is at-least-once: nothing is marked after notifying.

use crate::clock::Clock;
use crate::reminder::matcher::{DueTask, DueTaskSource};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default wake-up interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

const POLL_THREAD_NAME: &str = "agenda-poll";

/// Failure reported by a notification sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationError(String);

impl NotificationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl Display for NotificationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification failed: {}", self.0)
    }
}

impl Error for NotificationError {}

/// Fire-and-forget notification capability provided by the front-end.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, message: &str) -> Result<(), NotificationError>;
}

impl<F> NotificationSink for F
where
    F: Fn(&str, &str) -> Result<(), NotificationError> + Send + Sync,
{
    fn notify(&self, title: &str, message: &str) -> Result<(), NotificationError> {
        self(title, message)
    }
}

/// Poll loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Firing,
}

/// Outcome counters of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tasks returned by the matcher.
    pub due: usize,
    /// Tasks delivered to the sink.
    pub notified: usize,
    /// Tasks whose dispatch failed.
    pub failed: usize,
    /// Due tasks with notifications switched off.
    pub skipped: usize,
}

/// Periodic matcher-and-dispatch loop.
pub struct PollLoop {
    source: Arc<dyn DueTaskSource>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    firing: AtomicBool,
}

impl PollLoop {
    pub fn new(
        source: Arc<dyn DueTaskSource>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            sink,
            clock,
            interval: DEFAULT_POLL_INTERVAL,
            firing: AtomicBool::new(false),
        }
    }

    /// Overrides the wake-up interval (zero is bumped to one second).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_secs(1));
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> PollState {
        if self.firing.load(Ordering::Acquire) {
            PollState::Firing
        } else {
            PollState::Idle
        }
    }

    /// Runs one Idle -> Firing -> Idle cycle at the clock's current time.
    pub fn tick(&self) -> TickReport {
        self.firing.store(true, Ordering::Release);
        let now = self.clock.now();

        let report = match self.source.due_at(now) {
            Ok(due) => self.dispatch(&due),
            Err(err) => {
                error!("event=poll_tick module=reminder status=error error_code=match_failed error={err}");
                TickReport::default()
            }
        };

        self.firing.store(false, Ordering::Release);
        if report.due > 0 {
            info!(
                "event=poll_tick module=reminder status=ok due={} notified={} failed={} skipped={}",
                report.due, report.notified, report.failed, report.skipped
            );
        }
        report
    }

    /// Starts the loop on a background thread.
    ///
    /// The first tick happens one interval after spawning.
    pub fn spawn(self) -> std::io::Result<PollHandle> {
        let poll = Arc::new(self);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let worker = Arc::clone(&poll);
        let join = thread::Builder::new()
            .name(POLL_THREAD_NAME.to_string())
            .spawn(move || worker.run(stop_rx))?;

        Ok(PollHandle {
            poll,
            stop_tx: Some(stop_tx),
            join: Some(join),
        })
    }

    fn run(&self, stop_rx: mpsc::Receiver<()>) {
        info!(
            "event=poll_start module=reminder status=ok interval_secs={}",
            self.interval.as_secs()
        );
        loop {
            match stop_rx.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {
                    self.tick();
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("event=poll_stop module=reminder status=ok");
    }

    fn dispatch(&self, due: &[DueTask]) -> TickReport {
        let mut report = TickReport {
            due: due.len(),
            ..TickReport::default()
        };

        for task in due {
            if !task.notify {
                report.skipped += 1;
                continue;
            }

            let message = task.notification_message();
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                self.sink.notify(&task.title, &message)
            }));
            match outcome {
                Ok(Ok(())) => report.notified += 1,
                Ok(Err(err)) => {
                    warn!(
                        "event=notify module=reminder status=error task_id={} error={err}",
                        task.id
                    );
                    report.failed += 1;
                }
                Err(_) => {
                    warn!(
                        "event=notify module=reminder status=error task_id={} error_code=sink_panicked",
                        task.id
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }
}

/// Handle to a running poll loop.
///
/// Dropping the handle stops the loop and joins its thread.
pub struct PollHandle {
    poll: Arc<PollLoop>,
    stop_tx: Option<mpsc::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn state(&self) -> PollState {
        self.poll.state()
    }

    /// Signals the loop and waits for an in-flight tick to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Blocks until the loop exits; it only exits on a panic.
    pub fn wait(mut self) {
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!("event=poll_stop module=reminder status=error error_code=thread_panicked");
            }
        }
    }

    fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!("event=poll_stop module=reminder status=error error_code=thread_panicked");
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
