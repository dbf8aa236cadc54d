//! Keyed trailing-edge debounce on tokio timers.

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use tokio::task::JoinHandle;

struct PendingTask {
    generation: u64,
    handle: JoinHandle<()>,
}

type PendingTasks = Arc<Mutex<HashMap<String, PendingTask>>>;

/// Runs a task once per key after `delay` has passed without another call for
/// that key. A new call cancels the pending timer and restarts the window.
pub struct Debouncer {
    delay: Duration,
    pending: PendingTasks,
    next_generation: AtomicU64,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `task` for `key`, replacing any pending task for the same key.
    ///
    /// Must be called from within a tokio runtime.
    pub fn debounce<F, Fut>(&self, key: &str, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let delay = self.delay;
        let pending = Arc::clone(&self.pending);
        let timer_key = key.to_string();

        let mut tasks = lock_pending(&self.pending);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !take_if_current(&pending, &timer_key, generation) {
                return;
            }
            task().await;
        });
        let replaced = tasks.insert(key.to_string(), PendingTask { generation, handle });
        if let Some(previous) = replaced {
            previous.handle.abort();
            tracing::debug!(key, "debounce window restarted");
        }
    }

    /// Cancels the pending task for `key` without running it.
    pub fn cancel(&self, key: &str) -> bool {
        match lock_pending(&self.pending).remove(key) {
            Some(previous) => {
                previous.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancels every pending task without running any of them.
    pub fn cancel_all(&self) -> usize {
        let drained = lock_pending(&self.pending)
            .drain()
            .map(|(_, task)| task)
            .collect::<Vec<_>>();
        for task in &drained {
            task.handle.abort();
        }
        drained.len()
    }

    pub fn is_pending(&self, key: &str) -> bool {
        lock_pending(&self.pending).contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        lock_pending(&self.pending).len()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

fn lock_pending(
    pending: &Mutex<HashMap<String, PendingTask>>,
) -> MutexGuard<'_, HashMap<String, PendingTask>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes the pending entry when it still belongs to `generation`. A timer
/// that woke up after being superseded finds a newer generation and bails.
fn take_if_current(
    pending: &Mutex<HashMap<String, PendingTask>>,
    key: &str,
    generation: u64,
) -> bool {
    let mut tasks = lock_pending(pending);
    match tasks.get(key) {
        Some(task) if task.generation == generation => {
            tasks.remove(key);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use tokio::time::Instant;

    use super::Debouncer;

    type Fired = Arc<Mutex<Vec<(String, Duration)>>>;

    fn record(
        fired: &Fired,
        started: Instant,
        label: &str,
    ) -> impl FnOnce() -> std::future::Ready<()> {
        let fired = Arc::clone(fired);
        let label = label.to_string();
        move || {
            fired
                .lock()
                .expect("fired lock")
                .push((label, started.elapsed()));
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn functional_repeated_calls_fire_once_relative_to_last_call() {
        let debouncer = Debouncer::new(Duration::from_millis(3_000));
        let fired: Fired = Arc::default();
        let started = Instant::now();

        debouncer.debounce("U1", record(&fired, started, "first"));
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        debouncer.debounce("U1", record(&fired, started, "second"));
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        debouncer.debounce("U1", record(&fired, started, "third"));
        assert!(fired.lock().expect("fired lock").is_empty());

        tokio::time::sleep(Duration::from_millis(2_999)).await;
        assert!(fired.lock().expect("fired lock").is_empty());
        assert!(debouncer.is_pending("U1"));

        tokio::time::sleep(Duration::from_millis(2)).await;
        let fired = fired.lock().expect("fired lock").clone();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].0, "third");
        assert_eq!(fired[0].1, Duration::from_millis(6_500));
        assert!(!debouncer.is_pending("U1"));
    }

    #[tokio::test(start_paused = true)]
    async fn functional_keys_are_independent() {
        let debouncer = Debouncer::new(Duration::from_millis(3_000));
        let fired: Fired = Arc::default();
        let started = Instant::now();

        debouncer.debounce("A", record(&fired, started, "A"));
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        debouncer.debounce("B", record(&fired, started, "B"));
        assert_eq!(debouncer.pending_count(), 2);

        tokio::time::sleep(Duration::from_millis(4_000)).await;
        let fired = fired.lock().expect("fired lock").clone();
        assert_eq!(
            fired,
            vec![
                ("A".to_string(), Duration::from_millis(3_000)),
                ("B".to_string(), Duration::from_millis(5_000)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn functional_cancel_all_stops_timers_without_side_effects() {
        let debouncer = Debouncer::new(Duration::from_millis(3_000));
        let fired: Fired = Arc::default();
        let started = Instant::now();

        debouncer.debounce("A", record(&fired, started, "A"));
        debouncer.debounce("B", record(&fired, started, "B"));
        assert_eq!(debouncer.cancel_all(), 2);
        assert_eq!(debouncer.pending_count(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(fired.lock().expect("fired lock").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unit_cancel_removes_only_the_named_key() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let fired: Fired = Arc::default();
        let started = Instant::now();

        debouncer.debounce("A", record(&fired, started, "A"));
        debouncer.debounce("B", record(&fired, started, "B"));
        assert!(debouncer.cancel("A"));
        assert!(!debouncer.cancel("A"));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let labels = fired
            .lock()
            .expect("fired lock")
            .iter()
            .map(|(label, _)| label.clone())
            .collect::<Vec<_>>();
        assert_eq!(labels, vec!["B".to_string()]);
    }
}
