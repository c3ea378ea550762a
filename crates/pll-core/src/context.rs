//! Execution Context
//!
//! Owns the worker pool PLL computations run on, allocates PLL identifiers
//! and turns per-partition work into progress-reporting handles.
//!
//! The unit of parallel work is one partition. Results are always collected
//! in partition order, whatever order the workers finish in.

use crate::error::{PllError, Result};
use crate::in_memory::InMemoryPll;
use crate::pll::{Element, PllId};
use crate::progress::ProgressingFuture;
use rayon::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Default thread name prefix for pool workers
const DEFAULT_THREAD_PREFIX: &str = "pll-worker";

/// Settings for an execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Number of worker threads (0 = one per available CPU)
    pub workers: usize,
    /// Partition count used by `parallelize` (0 = one per worker)
    pub default_partitions: usize,
    /// Prefix for worker thread names
    pub thread_name_prefix: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            default_partitions: 0,
            thread_name_prefix: DEFAULT_THREAD_PREFIX.to_string(),
        }
    }
}

impl ContextConfig {
    /// Set the number of worker threads
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the default partition count
    pub fn with_default_partitions(mut self, partitions: usize) -> Self {
        self.default_partitions = partitions;
        self
    }
}

/// Execution context shared by every PLL it creates.
pub struct PllContext {
    pool: rayon::ThreadPool,
    config: ContextConfig,
    next_id: AtomicU64,
}

impl PllContext {
    /// Create a context with its own worker pool.
    pub fn new(config: ContextConfig) -> Result<Arc<Self>> {
        let prefix = config.thread_name_prefix.clone();
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(move |i| format!("{}-{}", prefix, i))
            .panic_handler(|_| error!("partition task panicked"));
        if config.workers > 0 {
            builder = builder.num_threads(config.workers);
        }
        let pool = builder.build()?;

        debug!(
            workers = pool.current_num_threads(),
            default_partitions = config.default_partitions,
            "created execution context"
        );

        Ok(Arc::new(Self {
            pool,
            config,
            next_id: AtomicU64::new(0),
        }))
    }

    /// Create a context with default settings
    pub fn with_defaults() -> Result<Arc<Self>> {
        Self::new(ContextConfig::default())
    }

    /// The configuration this context was built with
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Number of worker threads
    pub fn parallelism(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Partition count used when none is requested explicitly
    pub fn default_partitions(&self) -> usize {
        if self.config.default_partitions == 0 {
            self.parallelism()
        } else {
            self.config.default_partitions
        }
    }

    /// Allocate a fresh PLL identifier
    pub fn next_id(&self) -> PllId {
        PllId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Run a closure inside the worker pool, so nested parallel iterators
    /// use this context's workers.
    pub fn install<R, F>(&self, f: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.pool.install(f)
    }

    /// Load resident elements into a leaf PLL with the default partition count.
    pub fn parallelize<T, I>(self: &Arc<Self>, elements: I) -> Result<Arc<InMemoryPll<T>>>
    where
        T: Element,
        I: IntoIterator<Item = T>,
    {
        let partitions = i64::try_from(self.default_partitions())
            .map_err(|_| PllError::invalid_argument("default partition count is too large"))?;
        InMemoryPll::new(self, elements, partitions)
    }

    /// Load resident elements into a leaf PLL with `nb_partitions` partitions.
    pub fn parallelize_with<T, I>(
        self: &Arc<Self>,
        elements: I,
        nb_partitions: i64,
    ) -> Result<Arc<InMemoryPll<T>>>
    where
        T: Element,
        I: IntoIterator<Item = T>,
    {
        InMemoryPll::new(self, elements, nb_partitions)
    }

    /// Run `task` for every partition index on the worker pool.
    ///
    /// Returns immediately. Once every task succeeded, `finish` receives the
    /// results in partition order and its outcome resolves the handle.
    /// Cancelling the handle stops new tasks from starting; `finish` is then
    /// never called and the handle resolves as cancelled.
    ///
    /// Waiting on the returned handle from inside this context's pool can
    /// starve it; wait from outside the pool.
    pub fn submit_partition_work<R, O, F, C>(
        &self,
        label: &str,
        partitions: usize,
        task: F,
        finish: C,
    ) -> ProgressingFuture<O>
    where
        R: Send + 'static,
        O: Send + 'static,
        F: Fn(usize) -> Result<R> + Send + Sync + 'static,
        C: FnOnce(Vec<R>) -> Result<O> + Send + 'static,
    {
        let (future, completer) = ProgressingFuture::pending();

        if partitions == 0 {
            completer.complete(finish(Vec::new()));
            return future;
        }

        let label = label.to_string();
        debug!(label = %label, partitions, "submitting partition work");

        self.pool.spawn(move || {
            let reporter = completer.reporter();
            let completed = AtomicUsize::new(0);

            let results = (0..partitions)
                .into_par_iter()
                .map(|index| {
                    if reporter.is_cancelled() {
                        return Err(PllError::Cancelled);
                    }
                    let value = task(index)?;
                    let done = completed.fetch_add(1, Ordering::AcqRel) + 1;
                    // 100% is reserved for successful completion
                    reporter.report((done * 99 / partitions) as u8);
                    Ok(value)
                })
                .collect::<Result<Vec<R>>>();

            let outcome = match results {
                Ok(_) if reporter.is_cancelled() => Err(PllError::Cancelled),
                Ok(values) => finish(values),
                Err(e) => Err(e),
            };

            match &outcome {
                Ok(_) => debug!(label = %label, "partition work completed"),
                Err(e) if e.is_cancellation() => debug!(label = %label, "partition work cancelled"),
                Err(e) => warn!(label = %label, error = %e, "partition work failed"),
            }

            completer.complete(outcome);
        });

        future
    }
}

impl fmt::Debug for PllContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PllContext")
            .field("workers", &self.parallelism())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::FutureStatus;
    use std::sync::{Condvar, Mutex};

    fn context(workers: usize) -> Arc<PllContext> {
        PllContext::new(ContextConfig::default().with_workers(workers)).unwrap()
    }

    #[test]
    fn test_default_partitions_follow_workers() {
        let ctx = context(3);
        assert_eq!(ctx.parallelism(), 3);
        assert_eq!(ctx.default_partitions(), 3);

        let ctx = PllContext::new(
            ContextConfig::default()
                .with_workers(2)
                .with_default_partitions(8),
        )
        .unwrap();
        assert_eq!(ctx.default_partitions(), 8);
    }

    #[test]
    fn test_ids_are_unique() {
        let ctx = context(1);
        let a = ctx.next_id();
        let b = ctx.next_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_results_in_partition_order() {
        let ctx = context(4);
        let future = ctx.submit_partition_work(
            "squares",
            16,
            |i| Ok(i * i),
            |values: Vec<usize>| Ok(values),
        );
        let values = future.wait().unwrap();
        assert_eq!(values, (0..16).map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_partitions_finishes_immediately() {
        let ctx = context(1);
        let future = ctx.submit_partition_work(
            "empty",
            0,
            |_| Ok(()),
            |values: Vec<()>| Ok(values.len()),
        );
        assert!(future.is_done());
        assert_eq!(future.wait().unwrap(), 0);
    }

    #[test]
    fn test_task_failure_skips_finish() {
        let ctx = context(2);
        let future = ctx.submit_partition_work(
            "failing",
            4,
            |i| {
                if i == 2 {
                    Err(PllError::transform(i, "bad partition"))
                } else {
                    Ok(i)
                }
            },
            |_values: Vec<usize>| -> Result<()> { panic!("finish must not run") },
        );
        let err = future.wait().unwrap_err();
        assert!(matches!(err, PllError::Transform { index: 2, .. }));
    }

    #[test]
    fn test_cancellation_stops_new_work() {
        let ctx = context(1);
        let gate = Arc::new((Mutex::new(false), Condvar::new()));
        let started = Arc::new(AtomicUsize::new(0));

        let task_gate = gate.clone();
        let task_started = started.clone();
        let future = ctx.submit_partition_work(
            "gated",
            4,
            move |i| {
                task_started.fetch_add(1, Ordering::SeqCst);
                let (lock, cvar) = &*task_gate;
                let mut open = lock.lock().unwrap();
                while !*open {
                    open = cvar.wait(open).unwrap();
                }
                Ok(i)
            },
            |values: Vec<usize>| Ok(values),
        );

        assert!(future.cancel());
        {
            let (lock, cvar) = &*gate;
            *lock.lock().unwrap() = true;
            cvar.notify_all();
        }

        let status = future.wait_timeout(std::time::Duration::from_secs(10));
        assert_eq!(status, FutureStatus::Cancelled);
        assert!(started.load(Ordering::SeqCst) <= 1);
        assert!(matches!(future.wait(), Err(PllError::Cancelled)));
    }

    #[test]
    fn test_install_runs_in_pool() {
        let ctx = context(2);
        let threads = ctx.install(rayon::current_num_threads);
        assert_eq!(threads, 2);
    }
}
