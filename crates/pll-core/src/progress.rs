//! Progress-reporting asynchronous handles
//!
//! A [`ProgressingFuture`] is returned by operations that run on the
//! execution context's workers (most notably `cache_async`). The producing
//! side holds a [`Completer`], which resolves the handle exactly once, and
//! hands [`ProgressReporter`]s to the workers.
//!
//! Thread-safe via parking_lot::{Mutex, Condvar}; progress and cancellation
//! are plain atomics so workers never contend with waiters.

use crate::error::{PllError, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of an asynchronous operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureStatus {
    /// Still in progress
    Running,
    /// Completed with a value
    Succeeded,
    /// Completed with an error
    Failed,
    /// Stopped after a cancellation request
    Cancelled,
}

type Callback = Box<dyn FnOnce(FutureStatus) + Send>;

/// Progress and cancellation flags shared with workers
#[derive(Debug, Default)]
struct ProgressState {
    percent: AtomicU8,
    cancelled: AtomicBool,
}

/// Completion state (protected by Mutex)
struct CompletionState<T> {
    status: FutureStatus,
    result: Option<Result<T>>,
    callbacks: Vec<Callback>,
}

struct Completion<T> {
    state: Mutex<CompletionState<T>>,
    ready: Condvar,
}

impl<T> Completion<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(CompletionState {
                status: FutureStatus::Running,
                result: None,
                callbacks: Vec::new(),
            }),
            ready: Condvar::new(),
        }
    }

    fn resolve(&self, progress: &ProgressState, result: Result<T>) {
        let status = match &result {
            Ok(_) => FutureStatus::Succeeded,
            Err(PllError::Cancelled) => FutureStatus::Cancelled,
            Err(_) => FutureStatus::Failed,
        };

        let callbacks = {
            let mut state = self.state.lock();
            if state.status != FutureStatus::Running {
                return;
            }
            if status == FutureStatus::Succeeded {
                progress.percent.store(100, Ordering::Release);
            }
            state.status = status;
            state.result = Some(result);
            std::mem::take(&mut state.callbacks)
        };
        self.ready.notify_all();

        // Run callbacks outside the lock so they may inspect the handle
        for callback in callbacks {
            callback(status);
        }
    }
}

/// Handle on an asynchronous, cancellable, progress-reporting operation.
pub struct ProgressingFuture<T> {
    progress: Arc<ProgressState>,
    completion: Arc<Completion<T>>,
}

impl<T> ProgressingFuture<T> {
    /// Create a pending handle together with the completer that resolves it.
    pub fn pending() -> (Self, Completer<T>) {
        let progress = Arc::new(ProgressState::default());
        let completion = Arc::new(Completion::new());
        let completer = Completer {
            progress: progress.clone(),
            completion: completion.clone(),
            resolved: false,
        };
        (
            Self {
                progress,
                completion,
            },
            completer,
        )
    }

    /// An already-completed handle, used for no-op operations.
    pub fn immediate(value: T) -> Self {
        let (future, completer) = Self::pending();
        completer.complete(Ok(value));
        future
    }

    /// An already-failed handle.
    pub fn failed(error: PllError) -> Self {
        let (future, completer) = Self::pending();
        completer.complete(Err(error));
        future
    }

    /// Completion percentage (0 - 100)
    pub fn progress(&self) -> u8 {
        self.progress.percent.load(Ordering::Acquire)
    }

    /// Current status of the operation
    pub fn status(&self) -> FutureStatus {
        self.completion.state.lock().status
    }

    /// Whether the operation has finished, in any way
    pub fn is_done(&self) -> bool {
        self.status() != FutureStatus::Running
    }

    /// Request cancellation.
    ///
    /// Workers stop picking up new work; work already in flight may finish.
    /// Returns false if the operation had already completed.
    pub fn cancel(&self) -> bool {
        let state = self.completion.state.lock();
        if state.status != FutureStatus::Running {
            return false;
        }
        self.progress.cancelled.store(true, Ordering::Release);
        true
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.progress.cancelled.load(Ordering::Acquire)
    }

    /// Register a completion callback.
    ///
    /// Called immediately (on the current thread) if the operation is done.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(FutureStatus) + Send + 'static,
    {
        let status = {
            let mut state = self.completion.state.lock();
            if state.status == FutureStatus::Running {
                state.callbacks.push(Box::new(callback));
                return;
            }
            state.status
        };
        callback(status);
    }

    /// Block until the operation completes and return its result.
    pub fn wait(self) -> Result<T> {
        let mut state = self.completion.state.lock();
        while state.status == FutureStatus::Running {
            self.completion.ready.wait(&mut state);
        }
        state.result.take().unwrap_or(Err(PllError::Abandoned))
    }

    /// Block for at most `timeout`, returning the status afterwards.
    pub fn wait_timeout(&self, timeout: Duration) -> FutureStatus {
        let mut state = self.completion.state.lock();
        if state.status == FutureStatus::Running {
            self.completion.ready.wait_for(&mut state, timeout);
        }
        state.status
    }
}

impl<T> fmt::Debug for ProgressingFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressingFuture")
            .field("status", &self.status())
            .field("progress", &self.progress())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Producing side of a [`ProgressingFuture`].
///
/// Dropping a completer without calling [`Completer::complete`] resolves the
/// handle with [`PllError::Abandoned`].
pub struct Completer<T> {
    progress: Arc<ProgressState>,
    completion: Arc<Completion<T>>,
    resolved: bool,
}

impl<T> Completer<T> {
    /// A reporter for workers contributing to this operation
    pub fn reporter(&self) -> ProgressReporter {
        ProgressReporter {
            state: self.progress.clone(),
        }
    }

    /// Resolve the handle.
    pub fn complete(mut self, result: Result<T>) {
        self.resolved = true;
        self.completion.resolve(&self.progress, result);
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if !self.resolved {
            self.completion
                .resolve(&self.progress, Err(PllError::Abandoned));
        }
    }
}

impl<T> fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("resolved", &self.resolved)
            .finish()
    }
}

/// Worker-side view of a running operation.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    state: Arc<ProgressState>,
}

impl ProgressReporter {
    /// Report completion percentage. Progress never goes backwards.
    pub fn report(&self, percent: u8) {
        self.state
            .percent
            .fetch_max(percent.min(100), Ordering::AcqRel);
    }

    /// Whether the consumer asked for cancellation
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_immediate_is_complete() {
        let future = ProgressingFuture::immediate(42);
        assert!(future.is_done());
        assert_eq!(future.status(), FutureStatus::Succeeded);
        assert_eq!(future.progress(), 100);
        assert!(!future.cancel());
        assert_eq!(future.wait().unwrap(), 42);
    }

    #[test]
    fn test_failed_handle() {
        let future: ProgressingFuture<()> =
            ProgressingFuture::failed(PllError::transform(0, "boom"));
        assert_eq!(future.status(), FutureStatus::Failed);
        assert!(matches!(future.wait(), Err(PllError::Transform { .. })));
    }

    #[test]
    fn test_progress_is_monotonic() {
        let (future, completer) = ProgressingFuture::<()>::pending();
        let reporter = completer.reporter();

        reporter.report(40);
        reporter.report(10);
        assert_eq!(future.progress(), 40);

        reporter.report(250);
        assert_eq!(future.progress(), 100);
        completer.complete(Ok(()));
    }

    #[test]
    fn test_wait_across_threads() {
        let (future, completer) = ProgressingFuture::pending();
        let handle = std::thread::spawn(move || {
            completer.reporter().report(50);
            completer.complete(Ok("done"));
        });
        assert_eq!(future.wait().unwrap(), "done");
        handle.join().unwrap();
    }

    #[test]
    fn test_cancel_sets_flag_until_resolved() {
        let (future, completer) = ProgressingFuture::<()>::pending();
        let reporter = completer.reporter();

        assert!(future.cancel());
        assert!(future.is_cancelled());
        assert!(reporter.is_cancelled());
        assert_eq!(future.status(), FutureStatus::Running);

        completer.complete(Err(PllError::Cancelled));
        assert_eq!(future.status(), FutureStatus::Cancelled);
        assert!(matches!(future.wait(), Err(PllError::Cancelled)));
    }

    #[test]
    fn test_dropped_completer_abandons() {
        let (future, completer) = ProgressingFuture::<u32>::pending();
        drop(completer);
        assert_eq!(future.status(), FutureStatus::Failed);
        assert!(matches!(future.wait(), Err(PllError::Abandoned)));
    }

    #[test]
    fn test_on_complete_callbacks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (future, completer) = ProgressingFuture::<()>::pending();

        let c = calls.clone();
        future.on_complete(move |status| {
            assert_eq!(status, FutureStatus::Succeeded);
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        completer.complete(Ok(()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Registered after completion: runs right away
        let c = calls.clone();
        future.on_complete(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_wait_timeout_while_running() {
        let (future, completer) = ProgressingFuture::<()>::pending();
        assert_eq!(
            future.wait_timeout(Duration::from_millis(10)),
            FutureStatus::Running
        );
        completer.complete(Ok(()));
        assert_eq!(
            future.wait_timeout(Duration::from_millis(10)),
            FutureStatus::Succeeded
        );
    }
}
