use tokio::sync::watch;

/// Latched cancellation state for one run.
///
/// A run is cancelled when its global timeout elapses or when an external
/// abort signal arrives. Cancellation is sticky: once set it stays set, and a
/// listener created after the fact still observes it. Every bounded wait in
/// the runner races against a listener created from this handle, so in-flight
/// work stops cooperatively rather than being torn down mid-operation.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        Self {
            sender: watch::channel(false).0,
        }
    }

    pub fn cancel(&self) {
        // send_replace delivers even when no listener currently exists, so
        // the latch holds for listeners subscribing later.
        if !self.sender.send_replace(true) {
            log::debug!("Run cancellation requested");
        }
    }

    pub fn new_listener(&self) -> CancelListener {
        CancelListener {
            receiver: self.sender.subscribe(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CancelListener {
    receiver: watch::Receiver<bool>,
}

impl CancelListener {
    /// Point in time check for cancellation. Once this returns true it keeps
    /// returning true; callers must stop picking up new work so that the run
    /// can wind down.
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait for cancellation. Safe to race against another future so the
    /// signal can interrupt work in progress. Resolves immediately when the
    /// run is already cancelled.
    pub async fn cancelled(&mut self) {
        // A dropped handle counts as cancellation so that it cannot leave
        // waiters hanging.
        let _ = self.receiver.wait_for(|cancelled| *cancelled).await;
    }
}

/// Returned from any bounded wait that was interrupted by run cancellation.
///
/// The runner reports the affected case as skipped, never as failed.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct CancelledError {
    msg: String,
}

impl Default for CancelledError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by run abort signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listener_sees_cancellation() {
        let handle = CancelHandle::new();
        let listener = handle.new_listener();

        assert!(!listener.is_cancelled());
        handle.cancel();
        assert!(listener.is_cancelled());
    }

    #[tokio::test]
    async fn cancellation_is_latched() {
        let handle = CancelHandle::new();
        let listener = handle.new_listener();

        handle.cancel();
        // Repeated checks must all see the cancellation, not just the first.
        assert!(listener.is_cancelled());
        assert!(listener.is_cancelled());
        assert!(listener.is_cancelled());
    }

    #[tokio::test]
    async fn late_listener_observes_prior_cancellation() {
        let handle = CancelHandle::new();
        handle.cancel();

        let mut listener = handle.new_listener();
        assert!(listener.is_cancelled());
        // And the future form resolves immediately rather than hanging.
        listener.cancelled().await;
    }

    #[tokio::test]
    async fn cancelled_future_resolves() {
        let handle = CancelHandle::new();
        let mut listener = handle.new_listener();

        let waiter = tokio::spawn(async move {
            listener.cancelled().await;
        });
        handle.cancel();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_handle_releases_waiters() {
        let handle = CancelHandle::new();
        let mut listener = handle.new_listener();

        let waiter = tokio::spawn(async move {
            listener.cancelled().await;
        });
        drop(handle);
        waiter.await.unwrap();
    }
}
