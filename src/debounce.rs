//! Debounce scheduler
//!
//! Delays a callback until a quiet period has elapsed. Every call to
//! [`Debouncer::schedule`] cancels the pending timer and re-arms it, so only
//! the most recent callback of a burst ever runs.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

/// Single-slot debounce timer. Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `callback` after the configured quiet period
    pub fn schedule<F, Fut>(&mut self, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.schedule_after(self.delay, callback);
    }

    /// Run `callback` after `delay`, replacing any pending callback.
    ///
    /// The callback always runs on a separate task, even for a zero delay.
    pub fn schedule_after<F, Fut>(&mut self, delay: Duration, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if let Some(previous) = self.pending.take() {
            if !previous.is_finished() {
                trace!("re-arming debounce timer");
            }
            previous.abort();
        }

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detach so a later schedule() cannot abort a callback that
            // already started.
            tokio::spawn(callback());
        }));
    }

    /// Cancel the pending callback, if any
    pub fn cancel(&mut self) {
        if let Some(previous) = self.pending.take() {
            previous.abort();
        }
    }

    /// Whether a callback is still waiting for its quiet period
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
