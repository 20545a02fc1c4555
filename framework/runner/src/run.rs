use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use crosswind_core::prelude::{
    ActionTimeout, AssertionFailure, CancelHandle, CancelListener, CancelledError,
};
use crosswind_driver::{Driver, DriverError, EngineProfile};
use crosswind_report::{
    print_summary, AttemptRecord, AttemptStatus, CaseResult, FailureDetail, FailureKind,
    ReportCollector, RunReport,
};
use indicatif::ProgressBar;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::RunConfig;
use crate::context::CaseContext;
use crate::executor::Executor;
use crate::progress::start_progress;
use crate::signal::listen_for_interrupt;
use crate::suite::{Case, StepFn, Suite};

/// Cancelled runs still get this long per session to shut the browser down.
const SESSION_CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Execute the selected cases of `suite` on every configured engine.
///
/// Engines run concurrently on their own worker threads; cases within one
/// engine run sequentially in declaration order. The returned report carries
/// every selected (engine, case) pair exactly once, whatever happened to it.
pub fn run(
    config: RunConfig,
    suite: Suite,
    driver: Arc<dyn Driver>,
) -> anyhow::Result<RunReport> {
    let run_id = nanoid::nanoid!(10);
    let started_at = chrono::Utc::now();
    let selected = Arc::new(suite.select(&config.filter));
    log::info!(
        "Run {} of suite '{}': {} of {} cases on {} engine(s)",
        run_id,
        suite.name,
        selected.len(),
        suite.cases.len(),
        config.engines.len()
    );

    let cancel = CancelHandle::new();
    let executor = Arc::new(Executor::new(cancel.clone())?);
    listen_for_interrupt(&executor, cancel.clone());
    {
        let handle = cancel.clone();
        let ceiling = config.global_timeout;
        executor.spawn(async move {
            tokio::time::sleep(ceiling).await;
            log::warn!("Global timeout of {ceiling:?} reached, aborting remaining cases");
            handle.cancel();
        });
    }

    let (sender, collector) = ReportCollector::start();
    let progress = start_progress(
        (config.engines.len() * selected.len()) as u64,
        config.no_progress,
    );

    let config = Arc::new(config);
    let suite = Arc::new(suite);
    let mut workers = Vec::new();
    for (engine_index, engine) in config.engines.iter().enumerate() {
        let worker = EngineWorker {
            engine: engine.clone(),
            engine_index,
            config: config.clone(),
            suite: suite.clone(),
            selected: selected.clone(),
            driver: driver.clone(),
            executor: executor.clone(),
            cancel: cancel.new_listener(),
            sender: sender.clone(),
            progress: progress.clone(),
            run_id: run_id.clone(),
        };
        let handle = std::thread::Builder::new()
            .name(engine.name.clone())
            .spawn(move || worker.run())
            .context("Failed to spawn engine worker thread")?;
        workers.push(handle);
    }
    drop(sender);

    for handle in workers {
        handle
            .join()
            .map_err(|e| anyhow::anyhow!("Engine worker panicked: {e:?}"))?;
    }

    // The timeout task and interrupt listener die with the runtime when the
    // executor is dropped at the end of this function.
    progress.finish_and_clear();

    let report = RunReport {
        run_id,
        suite: suite.name.clone(),
        base_url: config.base_url.to_string(),
        started_at: started_at.to_rfc3339(),
        finished_at: chrono::Utc::now().to_rfc3339(),
        results: collector.finalize(),
    };

    print_summary(&report);
    if let Some(path) = &config.report_path {
        report.write_json(path)?;
        log::info!("Report written to {path:?}");
    }

    Ok(report)
}

struct EngineWorker {
    engine: EngineProfile,
    engine_index: usize,
    config: Arc<RunConfig>,
    suite: Arc<Suite>,
    selected: Arc<Vec<usize>>,
    driver: Arc<dyn Driver>,
    executor: Arc<Executor>,
    cancel: CancelListener,
    sender: UnboundedSender<CaseResult>,
    progress: ProgressBar,
    run_id: String,
}

impl EngineWorker {
    fn run(self) {
        log::debug!("Engine worker '{}' starting", self.engine.name);
        // Once the engine proves unable to provide sessions, everything
        // after that point is reported as an infrastructure failure without
        // burning its retry budget.
        let mut engine_down: Option<String> = None;

        for &case_index in self.selected.iter() {
            let case = &self.suite.cases[case_index];

            let result = if let Some(reason) = &engine_down {
                CaseResult::infrastructure_failure(
                    &self.engine.name,
                    self.engine_index,
                    &case.name,
                    case_index,
                    reason,
                )
            } else if self.cancel.is_cancelled() {
                CaseResult::skipped(&self.engine.name, self.engine_index, &case.name, case_index)
            } else {
                self.run_case(case, case_index, &mut engine_down)
            };

            if self.sender.send(result).is_err() {
                log::warn!("Report collector is gone, dropping result");
            }
            self.progress.inc(1);
        }
        log::debug!("Engine worker '{}' finished", self.engine.name);
    }

    fn run_case(
        &self,
        case: &Case,
        case_index: usize,
        engine_down: &mut Option<String>,
    ) -> CaseResult {
        let mut attempts = Vec::new();

        for attempt in 0..=self.config.retries {
            let record = self.run_attempt(case, attempt);
            let stop = match record.status {
                AttemptStatus::Passed | AttemptStatus::Skipped => true,
                AttemptStatus::Failed => {
                    let infra = record
                        .failure
                        .as_ref()
                        .is_some_and(|f| f.kind == FailureKind::Infrastructure);
                    if infra {
                        *engine_down = record.failure.as_ref().map(|f| f.message.clone());
                        log::error!(
                            "Engine '{}' is down, remaining cases will not run: {}",
                            self.engine.name,
                            engine_down.as_deref().unwrap_or_default()
                        );
                    }
                    infra
                }
            };
            attempts.push(record);
            if stop {
                break;
            }
        }

        CaseResult::from_attempts(
            &self.engine.name,
            self.engine_index,
            &case.name,
            case_index,
            attempts,
        )
    }

    /// One attempt against one fresh session. Every exit path releases the
    /// session.
    fn run_attempt(&self, case: &Case, attempt: u32) -> AttemptRecord {
        let started = Instant::now();
        log::debug!(
            "Attempt {} of case '{}' on engine '{}'",
            attempt + 1,
            case.name,
            self.engine.name
        );

        let session = self.executor.execute_in_place(async {
            self.driver
                .new_session(&self.engine)
                .await
                .map_err(anyhow::Error::new)
        });
        let session = match session {
            Ok(session) => session,
            Err(e) => {
                let (status, failure) = match classify(&e) {
                    AttemptFailure::Skipped => (AttemptStatus::Skipped, None),
                    AttemptFailure::Failed(mut detail) => {
                        // A session that cannot be created is an
                        // infrastructure problem whatever the error type.
                        detail.kind = FailureKind::Infrastructure;
                        (AttemptStatus::Failed, Some(detail))
                    }
                };
                return AttemptRecord {
                    index: attempt,
                    status,
                    duration_ms: started.elapsed().as_millis() as u64,
                    failure,
                    artifacts: Vec::new(),
                };
            }
        };

        let mut ctx = CaseContext::new(
            &self.engine,
            &case.name,
            attempt,
            &self.config,
            &self.executor,
            session,
        );

        let mut first_error: Option<anyhow::Error> = None;
        if let Some(hook) = self.suite.before_each {
            run_step(&mut ctx, "before_each", hook, &mut first_error);
        }
        if first_error.is_none() {
            for step in &case.steps {
                ctx.begin_step(&step.name);
                run_step(&mut ctx, &step.name, step.run, &mut first_error);
                if first_error.is_some() {
                    let cancelled = first_error
                        .as_ref()
                        .is_some_and(|e| e.is::<CancelledError>());
                    if !case.continue_on_failure || cancelled {
                        break;
                    }
                }
            }
        }

        let outcome = first_error.as_ref().map(classify);
        let artifacts = match &outcome {
            Some(AttemptFailure::Failed(_)) => ctx.capture_failure_artifacts(&self.run_id),
            _ => Vec::new(),
        };

        if let Some(teardown) = case.teardown {
            if let Err(e) = teardown(&mut ctx) {
                log::error!("Teardown of case '{}' failed: {e:#}", case.name);
            }
        }

        let mut session = ctx.into_session();
        let closed = self
            .executor
            .execute_with_grace(SESSION_CLOSE_GRACE, async {
                session.close().await.map_err(anyhow::Error::new)
            });
        if let Err(e) = closed {
            log::warn!(
                "Failed to close session for case '{}' on engine '{}': {e:#}",
                case.name,
                self.engine.name
            );
        }

        let (status, failure) = match outcome {
            None => (AttemptStatus::Passed, None),
            Some(AttemptFailure::Skipped) => (AttemptStatus::Skipped, None),
            Some(AttemptFailure::Failed(detail)) => (AttemptStatus::Failed, Some(detail)),
        };
        AttemptRecord {
            index: attempt,
            status,
            duration_ms: started.elapsed().as_millis() as u64,
            failure,
            artifacts,
        }
    }
}

fn run_step(
    ctx: &mut CaseContext,
    name: &str,
    step: StepFn,
    first_error: &mut Option<anyhow::Error>,
) {
    if let Err(e) = step(ctx) {
        log::debug!("Step '{name}' failed: {e:#}");
        if first_error.is_none() {
            *first_error = Some(e);
        }
    }
}

enum AttemptFailure {
    Skipped,
    Failed(FailureDetail),
}

/// Map an error chain onto the failure taxonomy.
fn classify(error: &anyhow::Error) -> AttemptFailure {
    if error.is::<CancelledError>() {
        return AttemptFailure::Skipped;
    }
    let kind = if error.is::<AssertionFailure>() {
        FailureKind::Assertion
    } else if error.is::<ActionTimeout>() {
        FailureKind::Action
    } else if error.is::<DriverError>() {
        FailureKind::Infrastructure
    } else {
        FailureKind::Error
    };
    AttemptFailure::Failed(FailureDetail {
        kind,
        message: format!("{error:#}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed_session_error() -> anyhow::Error {
        anyhow::Error::new(DriverError::Launch {
            engine: "chromium".to_string(),
            message: "no executable".to_string(),
        })
    }

    #[test]
    fn driver_errors_classify_as_infrastructure() {
        match classify(&failed_session_error()) {
            AttemptFailure::Failed(detail) => {
                assert_eq!(detail.kind, FailureKind::Infrastructure)
            }
            AttemptFailure::Skipped => panic!("not a skip"),
        }
    }

    #[test]
    fn assertion_failures_keep_their_kind_through_context() {
        let error = anyhow::Error::new(AssertionFailure {
            check: "hero is visible".to_string(),
            expected: "visible".to_string(),
            observed: "present but hidden".to_string(),
            waited_ms: 5000,
        })
        .context("case 'hero renders'");

        match classify(&error) {
            AttemptFailure::Failed(detail) => {
                assert_eq!(detail.kind, FailureKind::Assertion);
                assert!(detail.message.contains("hero is visible"));
            }
            AttemptFailure::Skipped => panic!("not a skip"),
        }
    }

    #[test]
    fn cancellation_is_a_skip_not_a_failure() {
        let error = anyhow::Error::new(CancelledError::default());
        assert!(matches!(classify(&error), AttemptFailure::Skipped));
    }

    #[test]
    fn unknown_errors_fall_back_to_error_kind() {
        let error = anyhow::anyhow!("step panicked over its own state");
        match classify(&error) {
            AttemptFailure::Failed(detail) => assert_eq!(detail.kind, FailureKind::Error),
            AttemptFailure::Skipped => panic!("not a skip"),
        }
    }
}
