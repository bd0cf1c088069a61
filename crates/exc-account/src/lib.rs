//! Account Lock Manager.
//!
//! Provides `run_on_account(account_id, task)`. Tasks submitted with the same
//! `account_id` execute in FIFO submission order; distinct accounts proceed
//! in parallel up to a global concurrency cap. One bounded concurrent worker
//! per account plus a global semaphore: FIFO dispatch is enforced through an
//! explicit per-account queue, never left to a work-stealing pool that could
//! reorder same-account submissions.

use std::future::Future;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use exc_core::AccountId;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, Semaphore};
use tracing::{debug, trace, warn};

/// Errors returned by `run_on_account`.
#[derive(Debug, Error)]
pub enum AccountError<E> {
    /// The task itself failed; the inner error is surfaced unchanged.
    #[error("task failed")]
    Task(#[source] E),
    /// The task ran past its configured per-task timeout.
    #[error("task timed out after {0:?}")]
    Timeout(Duration),
    /// The task panicked while executing.
    #[error("task panicked")]
    Panicked,
    /// The manager has been stopped; no new tasks are accepted.
    #[error("account lock manager stopped")]
    Stopped,
}

/// Configuration for the Account Lock Manager.
#[derive(Debug, Clone)]
pub struct AccountLockConfig {
    /// Maximum total in-flight tasks across all accounts.
    pub max_concurrent_global: usize,
    /// Per-task timeout; a task that overruns this counts as a failure.
    pub task_timeout: Duration,
    /// Idle queues older than this are eligible for reaping.
    pub idle_reap_after: Duration,
}

impl Default for AccountLockConfig {
    fn default() -> Self {
        Self {
            max_concurrent_global: 20,
            task_timeout: Duration::from_millis(30_000),
            idle_reap_after: Duration::from_secs(300),
        }
    }
}

/// Per-account FIFO queue. The `tokio::sync::Mutex` itself provides FIFO
/// ordering among waiters (it queues acquirers in arrival order), which is
/// the ordering guarantee this manager needs: within one account, task
/// submissions are observed in the order callers enqueued them.
struct AccountQueue {
    mutex: Arc<Mutex<()>>,
    /// Count of callers currently holding or waiting for this queue's lock.
    /// The idle reaper only removes a queue when this reaches zero, avoiding
    /// a race where a reap drops a queue a waiting caller is about to use.
    waiters: AtomicU32,
    last_used_ms: AtomicI64,
}

impl AccountQueue {
    fn new(now_ms: i64) -> Self {
        Self {
            mutex: Arc::new(Mutex::new(())),
            waiters: AtomicU32::new(0),
            last_used_ms: AtomicI64::new(now_ms),
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Serializes submissions per account while bounding total concurrency.
pub struct AccountLockManager {
    config: AccountLockConfig,
    queues: Arc<DashMap<AccountId, Arc<AccountQueue>>>,
    global: Arc<Semaphore>,
    stopped: Arc<std::sync::atomic::AtomicBool>,
}

impl AccountLockManager {
    #[must_use]
    pub fn new(config: AccountLockConfig) -> Self {
        let global = Arc::new(Semaphore::new(config.max_concurrent_global));
        Self {
            config,
            queues: Arc::new(DashMap::new()),
            global,
            stopped: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Atomic get-or-create of an account's queue: `DashMap::entry` locks the
    /// shard for the duration of the closure, so the first caller creates
    /// the queue and later concurrent callers observe the one it created.
    fn get_or_create_queue(&self, account_id: &AccountId) -> Arc<AccountQueue> {
        self.queues
            .entry(account_id.clone())
            .or_insert_with(|| Arc::new(AccountQueue::new(now_ms())))
            .clone()
    }

    /// Run `task` serialized with respect to other tasks on the same
    /// account, bounded globally by `max_concurrent_global`.
    ///
    /// Failure semantics: if `task` fails, times out, or panics, the queue
    /// advances to the next task and the caller receives the failure. The
    /// panic is caught via `tokio::spawn`/`JoinHandle` rather than
    /// propagated, so a panicking task never poisons the queue.
    pub async fn run_on_account<F, Fut, T, E>(
        &self,
        account_id: AccountId,
        task: F,
    ) -> Result<T, AccountError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        if self.stopped.load(Ordering::Acquire) {
            return Err(AccountError::Stopped);
        }

        let queue = self.get_or_create_queue(&account_id);
        queue.waiters.fetch_add(1, Ordering::AcqRel);

        let result = self.run_locked(&queue, task).await;

        queue.last_used_ms.store(now_ms(), Ordering::Release);
        queue.waiters.fetch_sub(1, Ordering::AcqRel);
        result
    }

    async fn run_locked<F, Fut, T, E>(
        &self,
        queue: &Arc<AccountQueue>,
        task: F,
    ) -> Result<T, AccountError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        // Global cap first: a caller waiting on the global permit does not
        // hold the account's FIFO slot, so it never blocks other accounts.
        let _permit = self
            .global
            .acquire()
            .await
            .expect("semaphore never closed while manager is alive");

        let guard: OwnedMutexGuard<()> = Arc::clone(&queue.mutex).lock_owned().await;
        trace!("account lock acquired");

        let timeout = self.config.task_timeout;
        let handle = tokio::spawn(async move { task().await });

        let outcome = tokio::time::timeout(timeout, handle).await;
        drop(guard);

        match outcome {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(task_err))) => Err(AccountError::Task(task_err)),
            Ok(Err(_join_err)) => {
                warn!("account task panicked");
                Err(AccountError::Panicked)
            }
            Err(_elapsed) => {
                debug!(?timeout, "account task timed out");
                Err(AccountError::Timeout(timeout))
            }
        }
    }

    /// Remove idle queues (zero active waiters, unused for
    /// `idle_reap_after`). Intended to be called periodically from a
    /// background task; see `spawn_idle_reaper`.
    pub fn reap_idle(&self) -> usize {
        let cutoff = now_ms() - self.config.idle_reap_after.as_millis() as i64;
        let mut removed = 0;
        self.queues.retain(|_account, queue| {
            let idle = queue.waiters.load(Ordering::Acquire) == 0
                && queue.last_used_ms.load(Ordering::Acquire) < cutoff;
            if idle {
                removed += 1;
            }
            !idle
        });
        removed
    }

    /// Spawn a background task that reaps idle queues on `interval`.
    pub fn spawn_idle_reaper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if this.stopped.load(Ordering::Acquire) {
                    return;
                }
                let removed = this.reap_idle();
                if removed > 0 {
                    debug!(removed, "reaped idle account queues");
                }
            }
        })
    }

    /// Stop accepting new tasks. In-flight `run_on_account` calls already
    /// past the stopped check are allowed to run to completion; no new
    /// tasks are accepted afterward.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn active_account_count(&self) -> usize {
        self.queues.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    fn manager(max_global: usize) -> AccountLockManager {
        AccountLockManager::new(AccountLockConfig {
            max_concurrent_global: max_global,
            task_timeout: Duration::from_millis(500),
            idle_reap_after: Duration::from_millis(50),
        })
    }

    #[tokio::test]
    async fn same_account_tasks_run_in_fifo_order() {
        let manager = Arc::new(manager(20));
        let order = Arc::new(StdMutex::new(Vec::<u32>::new()));

        let mut handles = Vec::new();
        for i in 0..10u32 {
            let manager = Arc::clone(&manager);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                manager
                    .run_on_account(AccountId::from("acct-1"), move || {
                        let order = Arc::clone(&order);
                        async move {
                            order.lock().unwrap().push(i);
                            Ok::<_, ()>(())
                        }
                    })
                    .await
                    .unwrap();
            }));
            // Ensure enqueue order matches spawn order.
            tokio::task::yield_now().await;
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn distinct_accounts_run_concurrently() {
        let manager = Arc::new(manager(20));
        let start = std::time::Instant::now();

        let a = manager.run_on_account(AccountId::from("a"), || async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, ()>(())
        });
        let b = manager.run_on_account(AccountId::from("b"), || async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, ()>(())
        });

        let (ra, rb) = tokio::join!(a, b);
        ra.unwrap();
        rb.unwrap();

        // If serialized globally this would take ~200ms; concurrent accounts
        // should finish close to 100ms.
        assert!(start.elapsed() < Duration::from_millis(180));
    }

    #[tokio::test]
    async fn failing_task_does_not_block_the_queue() {
        let manager = Arc::new(manager(20));

        let first = manager
            .run_on_account(AccountId::from("acct"), || async { Err::<(), _>("boom") })
            .await;
        assert!(matches!(first, Err(AccountError::Task("boom"))));

        let second = manager
            .run_on_account(AccountId::from("acct"), || async { Ok::<_, &str>(42) })
            .await;
        assert_eq!(second.unwrap(), 42);
    }

    #[tokio::test]
    async fn timed_out_task_releases_its_slot() {
        let manager = Arc::new(manager(20));

        let timed_out = manager
            .run_on_account(AccountId::from("acct"), || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, ()>(())
            })
            .await;
        assert!(matches!(timed_out, Err(AccountError::Timeout(_))));

        let next = manager
            .run_on_account(AccountId::from("acct"), || async { Ok::<_, ()>(1) })
            .await;
        assert_eq!(next.unwrap(), 1);
    }

    #[tokio::test]
    async fn panicking_task_is_caught_as_an_error() {
        let manager = Arc::new(manager(20));

        let panicked = manager
            .run_on_account(AccountId::from("acct"), || async {
                panic!("boom");
                #[allow(unreachable_code)]
                Ok::<(), ()>(())
            })
            .await;
        assert!(matches!(panicked, Err(AccountError::Panicked)));

        let next = manager
            .run_on_account(AccountId::from("acct"), || async { Ok::<_, ()>(()) })
            .await;
        assert!(next.is_ok());
    }

    #[tokio::test]
    async fn global_cap_bounds_concurrency() {
        let manager = Arc::new(manager(1));
        let concurrent = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let max_seen = Arc::new(std::sync::atomic::AtomicU32::new(0));

        let mut handles = Vec::new();
        for i in 0..5 {
            let manager = Arc::clone(&manager);
            let concurrent = Arc::clone(&concurrent);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                manager
                    .run_on_account(AccountId::from(format!("acct-{i}").as_str()), move || {
                        let concurrent = Arc::clone(&concurrent);
                        let max_seen = Arc::clone(&max_seen);
                        async move {
                            let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            concurrent.fetch_sub(1, Ordering::SeqCst);
                            Ok::<_, ()>(())
                        }
                    })
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn idle_reaper_removes_unused_queues() {
        let manager = Arc::new(manager(20));
        manager
            .run_on_account(AccountId::from("acct"), || async { Ok::<_, ()>(()) })
            .await
            .unwrap();
        assert_eq!(manager.active_account_count(), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        let removed = manager.reap_idle();
        assert_eq!(removed, 1);
        assert_eq!(manager.active_account_count(), 0);
    }

    #[tokio::test]
    async fn stopped_manager_rejects_new_tasks() {
        let manager = Arc::new(manager(20));
        manager.stop();
        let result = manager
            .run_on_account(AccountId::from("acct"), || async { Ok::<_, ()>(()) })
            .await;
        assert!(matches!(result, Err(AccountError::Stopped)));
    }
}
