use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::record::{CaseResult, CaseStatus};
use crate::RunReport;

#[derive(Tabled)]
struct SummaryRow {
    engine: String,
    case: String,
    status: String,
    attempts: usize,
    duration_ms: u64,
    failure: String,
}

impl From<&CaseResult> for SummaryRow {
    fn from(result: &CaseResult) -> Self {
        Self {
            engine: result.engine.clone(),
            case: result.case.clone(),
            status: match result.status {
                CaseStatus::Passed => "passed".to_string(),
                CaseStatus::Failed => "failed".to_string(),
                CaseStatus::Flaky => "flaky".to_string(),
                CaseStatus::Skipped => "skipped".to_string(),
            },
            attempts: result.attempts.len(),
            duration_ms: result.duration_ms,
            failure: result
                .failure()
                .map(|f| format!("[{:?}] {}", f.kind, f.message))
                .unwrap_or_default(),
        }
    }
}

/// Print the human-readable run summary to stdout.
pub fn print_summary(report: &RunReport) {
    println!("\nRun {} against {}", report.run_id, report.base_url);

    let rows: Vec<SummaryRow> = report.results.iter().map(SummaryRow::from).collect();
    let mut table = Table::new(&rows);
    table.with(Style::modern());
    println!("{table}");

    let totals = report.totals();
    println!(
        "{} passed, {} flaky, {} failed, {} skipped",
        totals.passed, totals.flaky, totals.failed, totals.skipped
    );
}
