/// An observed condition that never matched its expectation within the
/// assertion timeout.
///
/// Carries the expected and last-observed values so that a report reader can
/// see what the page actually looked like, not just that a check failed.
#[derive(derive_more::Error, derive_more::Display, Debug, Clone)]
#[display("{check}: expected {expected}, observed {observed} after waiting {waited_ms}ms")]
pub struct AssertionFailure {
    pub check: String,
    pub expected: String,
    pub observed: String,
    pub waited_ms: u64,
}

/// A navigation or interaction that did not complete within the action
/// timeout. Distinct from [AssertionFailure] so reports can separate "the page
/// never satisfied the check" from "the browser never finished the action".
#[derive(derive_more::Error, derive_more::Display, Debug, Clone)]
#[display("action '{action}' did not complete within {timeout_ms}ms")]
pub struct ActionTimeout {
    pub action: String,
    pub timeout_ms: u64,
}
