mod collector;
mod record;
mod summary;

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use collector::ReportCollector;
pub use record::{
    AttemptRecord, AttemptStatus, CaseResult, CaseStatus, FailureDetail, FailureKind,
};
pub use summary::print_summary;

/// Process exit codes, with infrastructure problems kept distinct from test
/// failures so CI can tell "the page is broken" from "the run never got off
/// the ground".
pub mod exit_code {
    pub const OK: i32 = 0;
    pub const TEST_FAILURE: i32 = 1;
    pub const INFRASTRUCTURE_FAILURE: i32 = 2;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub passed: usize,
    pub flaky: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// The aggregated, machine-parseable result of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub suite: String,
    pub base_url: String,
    pub started_at: String,
    pub finished_at: String,
    pub results: Vec<CaseResult>,
}

impl RunReport {
    pub fn totals(&self) -> Totals {
        let mut totals = Totals::default();
        for result in &self.results {
            match result.status {
                CaseStatus::Passed => totals.passed += 1,
                CaseStatus::Flaky => totals.flaky += 1,
                CaseStatus::Failed => totals.failed += 1,
                CaseStatus::Skipped => totals.skipped += 1,
            }
        }
        totals
    }

    pub fn has_infrastructure_failure(&self) -> bool {
        self.results
            .iter()
            .any(CaseResult::is_infrastructure_failure)
    }

    /// Exit code for the whole run. Flaky cases count as passed; skipped
    /// cases mean the run did not complete and cannot report success.
    pub fn exit_code(&self) -> i32 {
        if self.has_infrastructure_failure() {
            return exit_code::INFRASTRUCTURE_FAILURE;
        }
        let totals = self.totals();
        if totals.failed > 0 || totals.skipped > 0 {
            return exit_code::TEST_FAILURE;
        }
        exit_code::OK
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory {parent:?}"))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {path:?}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with(results: Vec<CaseResult>) -> RunReport {
        RunReport {
            run_id: "test-run".to_string(),
            suite: "suite".to_string(),
            base_url: "http://localhost:5173/".to_string(),
            started_at: "2026-01-01T00:00:00+00:00".to_string(),
            finished_at: "2026-01-01T00:01:00+00:00".to_string(),
            results,
        }
    }

    fn passed(case_index: usize) -> CaseResult {
        CaseResult::from_attempts(
            "chromium",
            0,
            "case",
            case_index,
            vec![AttemptRecord {
                index: 0,
                status: AttemptStatus::Passed,
                duration_ms: 5,
                failure: None,
                artifacts: Vec::new(),
            }],
        )
    }

    fn failed(case_index: usize, kind: FailureKind) -> CaseResult {
        CaseResult::from_attempts(
            "chromium",
            0,
            "case",
            case_index,
            vec![AttemptRecord {
                index: 0,
                status: AttemptStatus::Failed,
                duration_ms: 5,
                failure: Some(FailureDetail {
                    kind,
                    message: "boom".to_string(),
                }),
                artifacts: Vec::new(),
            }],
        )
    }

    #[test]
    fn all_passed_exits_zero() {
        let report = report_with(vec![passed(0), passed(1)]);
        assert_eq!(report.exit_code(), exit_code::OK);
    }

    #[test]
    fn assertion_failures_exit_one() {
        let report = report_with(vec![passed(0), failed(1, FailureKind::Assertion)]);
        assert_eq!(report.exit_code(), exit_code::TEST_FAILURE);
    }

    #[test]
    fn infrastructure_failures_take_precedence() {
        let report = report_with(vec![
            failed(0, FailureKind::Assertion),
            failed(1, FailureKind::Infrastructure),
        ]);
        assert_eq!(report.exit_code(), exit_code::INFRASTRUCTURE_FAILURE);
    }

    #[test]
    fn skipped_cases_are_not_success() {
        let report = report_with(vec![passed(0), CaseResult::skipped("chromium", 0, "c", 1)]);
        assert_eq!(report.exit_code(), exit_code::TEST_FAILURE);
    }

    #[test]
    fn report_round_trips_through_json() {
        let report = report_with(vec![passed(0), failed(1, FailureKind::Action)]);
        let json = serde_json::to_string(&report).unwrap();
        let parsed: RunReport = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[1].failure().unwrap().kind, FailureKind::Action);
    }

    #[test]
    fn write_json_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/report.json");

        report_with(vec![passed(0)]).write_json(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"run_id\""));
    }
}
