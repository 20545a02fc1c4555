use crosswind_core::prelude::CancelHandle;

use crate::executor::Executor;

/// Turn Ctrl-C into run cancellation, so an interrupted run still reports
/// its remaining cases as skipped instead of dying mid-write.
pub(crate) fn listen_for_interrupt(executor: &Executor, handle: CancelHandle) {
    executor.spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Interrupt received, cancelling run");
                handle.cancel();
            }
            Err(e) => {
                log::warn!("Failed to install interrupt handler: {e}");
            }
        }
    });
}
