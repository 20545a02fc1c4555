use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use crosswind_core::prelude::{CancelHandle, CancelledError};
use tokio::runtime::Runtime;

/// Bridge between the synchronous engine worker threads and the async
/// driver.
///
/// Workers own no runtime of their own. Every async operation funnels through
/// here and races against run cancellation, so a cancelled run interrupts
/// in-flight navigations and waits instead of letting them run out their
/// timeouts.
pub(crate) struct Executor {
    runtime: Runtime,
    cancel: CancelHandle,
}

impl Executor {
    pub(crate) fn new(cancel: CancelHandle) -> anyhow::Result<Self> {
        let runtime = Runtime::new().context("Failed to create Tokio runtime")?;
        Ok(Self { runtime, cancel })
    }

    /// Run a future to completion on the current thread, racing it against
    /// run cancellation. Cancellation wins as a [`CancelledError`].
    pub(crate) fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let mut listener = self.cancel.new_listener();
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => result,
                _ = listener.cancelled() => Err(anyhow::Error::new(CancelledError::default())),
            }
        })
    }

    /// Run a future even on a cancelled run, bounded by a grace period.
    ///
    /// Used for cleanup such as closing sessions and taking failure
    /// screenshots, which must still happen while the run winds down.
    pub(crate) fn execute_with_grace<T>(
        &self,
        grace: Duration,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        self.runtime.block_on(async move {
            tokio::time::timeout(grace, fut)
                .await
                .with_context(|| format!("Cleanup did not finish within {grace:?}"))?
        })
    }

    /// Spawn a background task on the shared runtime.
    pub(crate) fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(fut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_futures_return_their_value() {
        let executor = Executor::new(CancelHandle::new()).unwrap();
        let value = executor.execute_in_place(async { Ok(7) }).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn cancellation_interrupts_a_pending_future() {
        let cancel = CancelHandle::new();
        let executor = Executor::new(cancel.clone()).unwrap();

        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            cancel.cancel();
        });

        let result: anyhow::Result<()> = executor.execute_in_place(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        });

        canceller.join().unwrap();
        assert!(result.unwrap_err().is::<CancelledError>());
    }

    #[test]
    fn grace_execution_ignores_cancellation() {
        let cancel = CancelHandle::new();
        let executor = Executor::new(cancel.clone()).unwrap();
        cancel.cancel();

        let value = executor
            .execute_with_grace(Duration::from_secs(1), async { Ok(3) })
            .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn grace_period_bounds_cleanup() {
        let executor = Executor::new(CancelHandle::new()).unwrap();

        let result: anyhow::Result<()> = executor.execute_with_grace(
            Duration::from_millis(20),
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            },
        );
        assert!(result.is_err());
    }
}
