//! Cancellable delayed task.
//!
//! `ScheduledTask` owns at most one pending callback. Scheduling a new one
//! cancels the previous, which is what gives debounce its coalescing, and
//! dropping the handle cancels whatever is pending.
//!
//! On native targets the callback runs on the ambient tokio runtime; on
//! wasm32 it runs on the browser event loop via `spawn_local`.

use std::time::Duration;

#[derive(Default)]
pub struct ScheduledTask {
    inner: Option<imp::Handle>,
}

impl ScheduledTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` after `delay`, replacing any pending callback.
    pub fn schedule<F>(&mut self, delay: Duration, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        self.inner = imp::spawn(delay, f);
    }

    /// Cancel the pending callback, if any. A callback already running is
    /// left to finish.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.inner.take() {
            handle.cancel();
        }
    }

    /// Whether a callback is scheduled and has not run yet.
    pub fn is_pending(&self) -> bool {
        self.inner.as_ref().is_some_and(imp::Handle::is_pending)
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod imp {
    use std::time::Duration;

    use tokio::runtime::Handle as RuntimeHandle;
    use tokio::task::JoinHandle;

    pub struct Handle(JoinHandle<()>);

    impl Handle {
        pub fn cancel(self) {
            self.0.abort();
        }

        pub fn is_pending(&self) -> bool {
            !self.0.is_finished()
        }
    }

    pub fn spawn<F>(delay: Duration, f: F) -> Option<Handle>
    where
        F: FnOnce() + Send + 'static,
    {
        let Ok(runtime) = RuntimeHandle::try_current() else {
            tracing::warn!("No async runtime available, scheduled task skipped");
            return None;
        };

        Some(Handle(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        })))
    }
}

#[cfg(target_arch = "wasm32")]
mod imp {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use gloo_timers::future::TimeoutFuture;

    #[derive(Default)]
    struct Flags {
        cancelled: AtomicBool,
        finished: AtomicBool,
    }

    pub struct Handle(Arc<Flags>);

    impl Handle {
        pub fn cancel(self) {
            self.0.cancelled.store(true, Ordering::SeqCst);
        }

        pub fn is_pending(&self) -> bool {
            !self.0.cancelled.load(Ordering::SeqCst) && !self.0.finished.load(Ordering::SeqCst)
        }
    }

    pub fn spawn<F>(delay: Duration, f: F) -> Option<Handle>
    where
        F: FnOnce() + Send + 'static,
    {
        let flags = Arc::new(Flags::default());
        let task_flags = Arc::clone(&flags);
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);

        wasm_bindgen_futures::spawn_local(async move {
            TimeoutFuture::new(millis).await;
            if !task_flags.cancelled.load(Ordering::SeqCst) {
                f();
            }
            task_flags.finished.store(true, Ordering::SeqCst);
        });

        Some(Handle(flags))
    }
}
