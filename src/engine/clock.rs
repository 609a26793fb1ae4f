//! Playhead clock
//!
//! A display-rate ticker that republishes the engine's project time to a UI
//! callback and to a shared [`PlayheadHandle`] that edit gestures read.
//!
//! Ticks run while holding the task lock, and `cancel` takes the same lock,
//! so once `cancel` returns no tick can fire.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::engine::context::SharedGraph;
use crate::error::Result;

/// Hardware time / project time pair captured when playback was scheduled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub context_time: f64,
    pub project_offset: f64,
}

impl Anchor {
    /// Project time at context time `now`
    pub fn project_time(&self, now: f64) -> f64 {
        self.project_offset + (now - self.context_time)
    }
}

/// Last published playhead position, readable from any thread
#[derive(Debug, Clone, Default)]
pub struct PlayheadHandle(Arc<AtomicU64>);

impl PlayheadHandle {
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, secs: f64) {
        self.0.store(secs.to_bits(), Ordering::Release);
    }
}

struct TaskShared {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

/// Cancellable background ticker
pub struct PeriodicTask {
    shared: Arc<TaskShared>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn a thread calling `tick` immediately and then every `interval`
    pub fn spawn<F>(name: &str, interval: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let shared = Arc::new(TaskShared {
            cancelled: Mutex::new(false),
            wake: Condvar::new(),
        });
        let worker = Arc::clone(&shared);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut cancelled = worker.cancelled.lock();
                while !*cancelled {
                    tick();
                    let deadline = Instant::now() + interval;
                    while !*cancelled {
                        if worker.wake.wait_until(&mut cancelled, deadline).timed_out() {
                            break;
                        }
                    }
                }
            })?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    pub fn is_active(&self) -> bool {
        !*self.shared.cancelled.lock()
    }

    /// Stop ticking. Blocks until any in-flight tick has finished.
    pub fn cancel(&mut self) {
        {
            let mut cancelled = self.shared.cancelled.lock();
            *cancelled = true;
            self.shared.wake.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            // A tick cancelling its own task must not join itself
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                tracing::warn!("playhead ticker panicked");
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub type TickCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Publishes anchored project time while playback runs
pub struct PlayheadClock {
    interval: Duration,
    callback: Option<TickCallback>,
    handle: PlayheadHandle,
    task: Option<PeriodicTask>,
}

impl PlayheadClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            callback: None,
            handle: PlayheadHandle::default(),
            task: None,
        }
    }

    /// Register the UI callback; takes effect on the next `start`
    pub fn on_tick(&mut self, callback: impl Fn(f64) + Send + Sync + 'static) {
        self.callback = Some(Arc::new(callback));
    }

    pub fn handle(&self) -> PlayheadHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| t.is_active())
    }

    /// Start ticking from `anchor`, replacing any running task
    pub fn start(&mut self, graph: SharedGraph, anchor: Anchor) -> Result<()> {
        self.stop();

        let handle = self.handle.clone();
        let callback = self.callback.clone();
        handle.set(anchor.project_offset);

        let task = PeriodicTask::spawn("playhead-clock", self.interval, move || {
            let now = graph.lock().current_time();
            let position = anchor.project_time(now);
            handle.set(position);
            if let Some(callback) = &callback {
                callback(position);
            }
        })?;
        self.task = Some(task);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.cancel();
        }
    }
}

impl Drop for PlayheadClock {
    fn drop(&mut self) {
        self.stop();
    }
}
