//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio::{task, time};
use tracing::Instrument;

/// A handle which can be used to manipulate the task created by the
/// [`Task::spawn`] function.
///
/// Dropping this handle cancels the task.
#[derive(Debug)]
pub struct Task<T> {
    join_handle: task::JoinHandle<T>,
}

/// A handle for a one-shot timer task created by [`TimeoutTask::new`].
///
/// Dropping this handle cancels the timeout task.
#[derive(Debug)]
pub struct TimeoutTask {
    #[cfg(not(feature = "testing"))]
    _task: Task<()>,
}

/// A handle for a periodic timer task created by [`IntervalTask::new`].
///
/// Dropping this handle cancels the interval task.
#[derive(Debug)]
pub struct IntervalTask {
    #[cfg(not(feature = "testing"))]
    _task: Task<()>,
}

// ===== impl Task =====

impl<T> Task<T> {
    /// Spawns a new asynchronous task, returning a handle for it.
    pub fn spawn<Fut>(future: Fut) -> Task<T>
    where
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        Task {
            join_handle: task::spawn(future),
        }
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        self.join_handle.abort();
    }
}

// ===== impl TimeoutTask =====

impl TimeoutTask {
    /// Spawns a new task that will call the provided async closure when the
    /// specified timeout expires.
    #[cfg(not(feature = "testing"))]
    pub fn new<F, Fut>(timeout: Duration, cb: F) -> TimeoutTask
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let task = Task::spawn(
            async move {
                time::sleep(timeout).await;
                (cb)().await;
            }
            .in_current_span(),
        );

        TimeoutTask { _task: task }
    }
}

// ===== impl IntervalTask =====

impl IntervalTask {
    /// Spawns a new task that will call the provided async closure whenever
    /// the specified interval timer ticks.
    #[cfg(not(feature = "testing"))]
    pub fn new<F, Fut>(
        interval: Duration,
        tick_on_start: bool,
        mut cb: F,
    ) -> IntervalTask
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let task = Task::spawn(
            async move {
                let mut interval_fut = if tick_on_start {
                    time::interval(interval)
                } else {
                    time::interval_at(Instant::now() + interval, interval)
                };

                loop {
                    interval_fut.tick().await;
                    (cb)().await;
                }
            }
            .in_current_span(),
        );

        IntervalTask { _task: task }
    }
}
