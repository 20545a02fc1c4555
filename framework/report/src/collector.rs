use std::thread::JoinHandle;

use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use crate::record::CaseResult;

/// Single-writer aggregation of case results.
///
/// Engine workers are unaware of report-level invariants, so they never touch
/// the report directly. They send records over a channel and one collector
/// thread owns the accumulating state.
pub struct ReportCollector {
    handle: JoinHandle<Vec<CaseResult>>,
}

impl ReportCollector {
    pub fn start() -> (UnboundedSender<CaseResult>, Self) {
        let (sender, mut receiver) = unbounded_channel::<CaseResult>();

        let handle = std::thread::Builder::new()
            .name("report-collector".to_string())
            .spawn(move || {
                let mut results = Vec::new();
                while let Some(result) = receiver.blocking_recv() {
                    log::debug!(
                        "Recorded case '{}' on engine '{}': {:?}",
                        result.case,
                        result.engine,
                        result.status
                    );
                    results.push(result);
                }
                results
            })
            .expect("Failed to start report collector thread");

        (sender, Self { handle })
    }

    /// Wait for all senders to finish and return the records in declared
    /// (engine, case) order.
    pub fn finalize(self) -> Vec<CaseResult> {
        let mut results = self
            .handle
            .join()
            .expect("Report collector thread panicked");
        results.sort_by_key(|r| (r.engine_index, r.case_index));
        results
    }
}
