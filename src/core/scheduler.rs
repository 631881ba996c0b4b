use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Fire-once delayed tasks that can all be called off together.
///
/// Every task runs under a child of one parent token; `cancel_all` cancels the
/// parent and starts a fresh generation, so tasks scheduled afterwards are not
/// affected. Dropping the scheduler cancels whatever is still pending.
pub struct DelayedTasks {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl DelayedTasks {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Runs `task` after `delay` unless cancelled first.
    pub fn schedule<F>(&mut self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.retain(|handle| !handle.is_finished());

        let token = self.token.child_token();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => task.await,
            }
        });

        self.handles.push(handle);
    }

    pub fn cancel_all(&mut self) {
        self.token.cancel();
        self.token = CancellationToken::new();
        self.handles.clear();
    }

    /// Number of tasks that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        self.handles.iter().filter(|handle| !handle.is_finished()).count()
    }
}

impl Default for DelayedTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DelayedTasks {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_task_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut tasks = DelayedTasks::new();

        let counter = fired.clone();
        tasks.schedule(Duration::from_millis(1000), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_only_affects_earlier_tasks() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut tasks = DelayedTasks::new();

        let counter = fired.clone();
        tasks.schedule(Duration::from_millis(100), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tasks.cancel_all();

        let counter = fired.clone();
        tasks.schedule(Duration::from_millis(100), async move {
            counter.fetch_add(10, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending() {
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let mut tasks = DelayedTasks::new();
            let counter = fired.clone();
            tasks.schedule(Duration::from_millis(50), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(tasks.pending(), 1);
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
