//! Cancellable transition scheduler.
//!
//! Simulated lifecycle transitions are tokio tasks that sleep for the
//! configured delay and then run their settle action. Each cloud-PC has at
//! most one pending transition: scheduling a new one aborts the old task,
//! and `cancel` aborts it outright, so a record deleted or superseded
//! mid-transition never sees a stale timer fire.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::cache::lock::mutex_lock;

const SOURCE: &str = "application::lifecycle";

struct PendingTransition {
    token: Uuid,
    handle: JoinHandle<()>,
}

pub struct TransitionScheduler {
    delay: Duration,
    pending: Mutex<HashMap<Uuid, PendingTransition>>,
}

impl TransitionScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `action` to run after the configured delay, replacing any
    /// transition already pending for this id.
    pub fn schedule<F, Fut>(self: &Arc<Self>, id: Uuid, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        // Token distinguishes this scheduling from a later one for the same
        // id, so task-completion cleanup cannot remove a successor's handle.
        let token = Uuid::new_v4();
        let scheduler = Arc::clone(self);
        let delay = self.delay;

        // The lock is held across the spawn so the task's own cleanup cannot
        // observe the map before its entry exists.
        let mut pending = mutex_lock(&self.pending, SOURCE, "schedule");
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action().await;
            scheduler.finish(id, token);
        });
        if let Some(previous) = pending.insert(id, PendingTransition { token, handle }) {
            previous.handle.abort();
            debug!(%id, "superseded pending transition");
        }
    }

    /// Abort the pending transition for this id, if any. Returns whether
    /// one was cancelled.
    pub fn cancel(&self, id: Uuid) -> bool {
        let removed = mutex_lock(&self.pending, SOURCE, "cancel").remove(&id);
        match removed {
            Some(transition) => {
                transition.handle.abort();
                debug!(%id, "cancelled pending transition");
                true
            }
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        mutex_lock(&self.pending, SOURCE, "pending_count").len()
    }

    fn finish(&self, id: Uuid, token: Uuid) {
        let mut pending = mutex_lock(&self.pending, SOURCE, "finish");
        if pending.get(&id).is_some_and(|t| t.token == token) {
            pending.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter_action(counter: Arc<AtomicUsize>) -> impl FnOnce() -> futures::future::Ready<()> {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(())
        }
    }

    #[tokio::test]
    async fn scheduled_action_fires_after_delay() {
        let scheduler = Arc::new(TransitionScheduler::new(Duration::from_millis(20)));
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(Uuid::new_v4(), counter_action(fired.clone()));
        assert_eq!(scheduler.pending_count(), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn cancel_prevents_the_action() {
        let scheduler = Arc::new(TransitionScheduler::new(Duration::from_millis(30)));
        let fired = Arc::new(AtomicUsize::new(0));
        let id = Uuid::new_v4();

        scheduler.schedule(id, counter_action(fired.clone()));
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn rescheduling_supersedes_the_previous_transition() {
        let scheduler = Arc::new(TransitionScheduler::new(Duration::from_millis(30)));
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let id = Uuid::new_v4();

        scheduler.schedule(id, counter_action(first.clone()));
        scheduler.schedule(id, counter_action(second.clone()));
        assert_eq!(scheduler.pending_count(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn independent_ids_do_not_interfere() {
        let scheduler = Arc::new(TransitionScheduler::new(Duration::from_millis(20)));
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(Uuid::new_v4(), counter_action(fired.clone()));
        scheduler.schedule(Uuid::new_v4(), counter_action(fired.clone()));
        assert_eq!(scheduler.pending_count(), 2);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
