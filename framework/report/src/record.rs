use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Final status of one (engine, case) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    Failed,
    /// Passed only after at least one failed attempt within the retry budget.
    Flaky,
    /// Never started, or interrupted by run cancellation.
    Skipped,
}

/// Outcome of a single execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Passed,
    Failed,
    Skipped,
}

/// Which part of the error taxonomy an attempt failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Observed state never matched the expectation within its timeout.
    Assertion,
    /// A navigation or interaction did not complete within its timeout.
    Action,
    /// The browser session could not be created or maintained.
    Infrastructure,
    /// A step failed for a reason outside the taxonomy above.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub index: u32,
    pub status: AttemptStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDetail>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub artifacts: Vec<PathBuf>,
}

/// One record per (engine, case). The engine/case index pair preserves the
/// declared ordering so reports are deterministic across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub engine: String,
    pub engine_index: usize,
    pub case: String,
    pub case_index: usize,
    pub status: CaseStatus,
    pub duration_ms: u64,
    pub attempts: Vec<AttemptRecord>,
}

impl CaseResult {
    /// Classify a sequence of attempts into a final case status.
    ///
    /// Passed on any passing attempt, flaky when an earlier attempt failed
    /// first. A case whose last attempt was cancelled counts as skipped, never
    /// failed, regardless of earlier attempts.
    pub fn from_attempts(
        engine: &str,
        engine_index: usize,
        case: &str,
        case_index: usize,
        attempts: Vec<AttemptRecord>,
    ) -> Self {
        let any_passed = attempts
            .iter()
            .any(|a| a.status == AttemptStatus::Passed);
        let any_failed = attempts
            .iter()
            .any(|a| a.status == AttemptStatus::Failed);
        let last_skipped = attempts
            .last()
            .is_some_and(|a| a.status == AttemptStatus::Skipped);

        let status = if any_passed {
            if any_failed {
                CaseStatus::Flaky
            } else {
                CaseStatus::Passed
            }
        } else if last_skipped || attempts.is_empty() {
            CaseStatus::Skipped
        } else {
            CaseStatus::Failed
        };

        let duration_ms = attempts.iter().map(|a| a.duration_ms).sum();

        Self {
            engine: engine.to_string(),
            engine_index,
            case: case.to_string(),
            case_index,
            status,
            duration_ms,
            attempts,
        }
    }

    /// A case that was never executed because its engine worker aborted.
    pub fn infrastructure_failure(
        engine: &str,
        engine_index: usize,
        case: &str,
        case_index: usize,
        message: &str,
    ) -> Self {
        Self {
            engine: engine.to_string(),
            engine_index,
            case: case.to_string(),
            case_index,
            status: CaseStatus::Failed,
            duration_ms: 0,
            attempts: vec![AttemptRecord {
                index: 0,
                status: AttemptStatus::Failed,
                duration_ms: 0,
                failure: Some(FailureDetail {
                    kind: FailureKind::Infrastructure,
                    message: message.to_string(),
                }),
                artifacts: Vec::new(),
            }],
        }
    }

    /// A case that was never started because the run was cancelled.
    pub fn skipped(engine: &str, engine_index: usize, case: &str, case_index: usize) -> Self {
        Self {
            engine: engine.to_string(),
            engine_index,
            case: case.to_string(),
            case_index,
            status: CaseStatus::Skipped,
            duration_ms: 0,
            attempts: Vec::new(),
        }
    }

    /// The failure that decided the case outcome, if any.
    pub fn failure(&self) -> Option<&FailureDetail> {
        if self.status != CaseStatus::Failed {
            return None;
        }
        self.attempts
            .iter()
            .rev()
            .find_map(|a| a.failure.as_ref())
    }

    pub fn is_infrastructure_failure(&self) -> bool {
        self.failure()
            .is_some_and(|f| f.kind == FailureKind::Infrastructure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(index: u32, status: AttemptStatus, kind: Option<FailureKind>) -> AttemptRecord {
        AttemptRecord {
            index,
            status,
            duration_ms: 10,
            failure: kind.map(|kind| FailureDetail {
                kind,
                message: "boom".to_string(),
            }),
            artifacts: Vec::new(),
        }
    }

    #[test]
    fn single_passing_attempt_is_passed() {
        let result = CaseResult::from_attempts(
            "chromium",
            0,
            "title",
            0,
            vec![attempt(0, AttemptStatus::Passed, None)],
        );
        assert_eq!(result.status, CaseStatus::Passed);
        assert!(result.failure().is_none());
    }

    #[test]
    fn pass_after_failures_is_flaky_not_failed() {
        let result = CaseResult::from_attempts(
            "chromium",
            0,
            "title",
            0,
            vec![
                attempt(0, AttemptStatus::Failed, Some(FailureKind::Assertion)),
                attempt(1, AttemptStatus::Failed, Some(FailureKind::Assertion)),
                attempt(2, AttemptStatus::Passed, None),
            ],
        );
        assert_eq!(result.status, CaseStatus::Flaky);
    }

    #[test]
    fn all_failing_attempts_is_failed() {
        let result = CaseResult::from_attempts(
            "chromium",
            0,
            "title",
            0,
            vec![
                attempt(0, AttemptStatus::Failed, Some(FailureKind::Assertion)),
                attempt(1, AttemptStatus::Failed, Some(FailureKind::Action)),
            ],
        );
        assert_eq!(result.status, CaseStatus::Failed);
        // The deciding failure is the last one recorded.
        assert_eq!(result.failure().unwrap().kind, FailureKind::Action);
    }

    #[test]
    fn cancelled_final_attempt_is_skipped_not_failed() {
        let result = CaseResult::from_attempts(
            "chromium",
            0,
            "title",
            0,
            vec![
                attempt(0, AttemptStatus::Failed, Some(FailureKind::Assertion)),
                attempt(1, AttemptStatus::Skipped, None),
            ],
        );
        assert_eq!(result.status, CaseStatus::Skipped);
    }

    #[test]
    fn no_attempts_is_skipped() {
        let result = CaseResult::from_attempts("chromium", 0, "title", 0, Vec::new());
        assert_eq!(result.status, CaseStatus::Skipped);
    }

    #[test]
    fn statuses_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&CaseStatus::Flaky).unwrap(),
            r#""flaky""#
        );
        assert_eq!(
            serde_json::to_string(&FailureKind::Infrastructure).unwrap(),
            r#""infrastructure""#
        );
    }

    #[test]
    fn durations_accumulate_across_attempts() {
        let result = CaseResult::from_attempts(
            "chromium",
            0,
            "title",
            0,
            vec![
                attempt(0, AttemptStatus::Failed, Some(FailureKind::Assertion)),
                attempt(1, AttemptStatus::Passed, None),
            ],
        );
        assert_eq!(result.duration_ms, 20);
    }
}
