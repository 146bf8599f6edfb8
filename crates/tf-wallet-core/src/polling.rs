use anyhow::Result;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

pub type PollCallback = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Whether the wallet surface is currently shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Runs every registered callback on a fixed cadence while the surface is
/// visible. Hiding cancels the timer; showing runs one cycle right away and
/// restarts it.
pub struct PollingScheduler {
    inner: Arc<SchedulerInner>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

struct SchedulerInner {
    interval: Duration,
    callbacks: Mutex<Vec<(String, PollCallback)>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    cycles: AtomicU64,
}

impl PollingScheduler {
    /// Must be called from within a tokio runtime.
    pub fn spawn(interval: Duration, mut visibility: watch::Receiver<Visibility>) -> Self {
        let inner = Arc::new(SchedulerInner {
            interval,
            callbacks: Mutex::new(Vec::new()),
            timer: Mutex::new(None),
            cycles: AtomicU64::new(0),
        });

        let mut current = *visibility.borrow_and_update();
        if current == Visibility::Visible {
            inner.start_timer();
        }

        let watched = inner.clone();
        let watcher = tokio::spawn(async move {
            while visibility.changed().await.is_ok() {
                let next = *visibility.borrow_and_update();
                if next == current {
                    continue;
                }
                current = next;
                match next {
                    Visibility::Hidden => {
                        debug!("surface hidden, pausing polling");
                        watched.stop_timer();
                    }
                    Visibility::Visible => {
                        debug!("surface visible, polling now");
                        watched.run_cycle().await;
                        watched.start_timer();
                    }
                }
            }
        });

        Self {
            inner,
            watcher: Mutex::new(Some(watcher)),
        }
    }

    /// Inserts or replaces the callback under `id`. A replacement keeps the
    /// original position in the cycle.
    pub fn register<F, Fut>(&self, id: impl Into<String>, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let id = id.into();
        let callback: PollCallback = Arc::new(move || callback().boxed());
        let mut callbacks = self
            .inner
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match callbacks.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = callback,
            None => callbacks.push((id, callback)),
        }
    }

    pub fn unregister(&self, id: &str) {
        self.inner
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(existing, _)| existing != id);
    }

    pub fn registered_ids(&self) -> Vec<String> {
        self.inner
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Runs one full cycle now, regardless of timer or visibility.
    pub async fn force_refresh(&self) {
        self.inner.run_cycle().await;
    }

    /// Starts a cycle in the background without waiting for it.
    pub fn trigger_refresh(&self) {
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.run_cycle().await });
    }

    pub fn cycle_count(&self) -> u64 {
        self.inner.cycles.load(Ordering::Relaxed)
    }

    pub fn is_timer_running(&self) -> bool {
        self.inner
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn shutdown(&self) {
        self.inner.stop_timer();
        if let Some(watcher) = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            watcher.abort();
        }
    }
}

impl SchedulerInner {
    fn start_timer(self: &Arc<Self>) {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let inner = self.clone();
        *timer = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + inner.interval, inner.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                inner.run_cycle().await;
            }
        }));
    }

    fn stop_timer(&self) {
        if let Some(handle) = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }

    async fn run_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        let callbacks = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (id, callback) in callbacks {
            match AssertUnwindSafe(async move { callback().await })
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(callback = %id, error = %err, "poll callback failed"),
                Err(_) => warn!(callback = %id, "poll callback panicked"),
            }
        }
    }
}
