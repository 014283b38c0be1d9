// src/scheduler.rs
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// One periodic timer. The first tick fires immediately; each tick's work
/// runs to completion before the next tick is awaited.
///
/// `start` on a running timer and `stop` on a stopped one are no-ops.
#[derive(Debug)]
pub struct TimerHandle {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl TimerHandle {
    pub fn new(name: &'static str) -> Self {
        Self { name, handle: None }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Returns `false` when the timer was already running.
    pub fn start<F, Fut>(&mut self, period: Duration, mut tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_running() {
            return false;
        }
        let name = self.name;
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tracing::trace!(target: "scheduler", timer = name, "tick");
                tick().await;
            }
        }));
        tracing::info!(target: "scheduler", timer = name, period_ms = period.as_millis() as u64, "timer started");
        true
    }

    /// Returns `false` when there was nothing to stop.
    pub fn stop(&mut self) -> bool {
        match self.handle.take() {
            Some(h) => {
                h.abort();
                tracing::info!(target: "scheduler", timer = self.name, "timer stopped");
                true
            }
            None => false,
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(h) = self.handle.take() {
            h.abort();
        }
    }
}

/// Run `work` once after `delay`, detached.
pub fn spawn_delayed<Fut>(delay: Duration, work: Fut) -> JoinHandle<()>
where
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        work.await;
    })
}
