use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use crosswind_core::prelude::{
    wait_until, ActionTimeout, AssertionFailure, Observation, Probe, WaitError,
};
use crosswind_driver::{DriverError, EngineProfile, Session, Viewport};
use serde::Serialize;
use serde_json::Value;

use crate::artifacts::{slug, write_artifact};
use crate::config::RunConfig;
use crate::dom::{self, Target};
use crate::executor::Executor;

/// Cleanup operations on a cancelled run still get this long to finish.
const ARTIFACT_GRACE: Duration = Duration::from_secs(5);

/// One line in the step trace, timed relative to the start of the attempt.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct TraceEntry {
    at_ms: u64,
    entry: String,
}

/// The API a step sees: one live session plus the configured timeouts.
///
/// Single-shot operations (navigation, viewport, hover) are bounded by the
/// action timeout. Assertions sample the page repeatedly and resolve as soon
/// as the condition holds, failing only when the assertion timeout elapses.
/// Everything races against run cancellation through the executor.
pub struct CaseContext<'run> {
    engine: &'run EngineProfile,
    case_name: &'run str,
    attempt: u32,
    config: &'run RunConfig,
    executor: &'run Executor,
    session: Box<dyn Session>,
    started: Instant,
    trace: Vec<TraceEntry>,
    last_navigation: Option<Duration>,
}

async fn bounded<T>(
    action: String,
    timeout: Duration,
    fut: impl Future<Output = Result<T, DriverError>>,
) -> anyhow::Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(anyhow::Error::new(e)),
        Err(_) => Err(anyhow::Error::new(ActionTimeout {
            action,
            timeout_ms: timeout.as_millis() as u64,
        })),
    }
}

impl<'run> CaseContext<'run> {
    pub(crate) fn new(
        engine: &'run EngineProfile,
        case_name: &'run str,
        attempt: u32,
        config: &'run RunConfig,
        executor: &'run Executor,
        session: Box<dyn Session>,
    ) -> Self {
        Self {
            engine,
            case_name,
            attempt,
            config,
            executor,
            session,
            started: Instant::now(),
            trace: Vec::new(),
            last_navigation: None,
        }
    }

    pub fn engine(&self) -> &EngineProfile {
        self.engine
    }

    /// Zero-based attempt number, 0 for the first attempt of a case.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Wall-clock duration of the most recent navigation.
    pub fn last_navigation_ms(&self) -> Option<u64> {
        self.last_navigation.map(|d| d.as_millis() as u64)
    }

    fn record(&mut self, entry: String) {
        self.trace.push(TraceEntry {
            at_ms: self.started.elapsed().as_millis() as u64,
            entry,
        });
    }

    pub(crate) fn begin_step(&mut self, name: &str) {
        self.record(format!("step: {name}"));
    }

    /// Note something in the log and the attempt trace without asserting.
    pub fn log(&mut self, message: &str) {
        log::info!("[{}] {}", self.engine.name, message);
        self.record(message.to_string());
    }

    /// Navigate relative to the configured base URL and wait for the load to
    /// settle. The navigation duration is kept for [Self::assert_loaded_within].
    pub fn goto(&mut self, path: &str) -> anyhow::Result<()> {
        let url = self
            .config
            .base_url
            .join(path)
            .with_context(|| format!("Invalid navigation target '{path}'"))?;
        let executor = self.executor;
        let timeout = self.config.action_timeout;
        let started = Instant::now();
        {
            let fut = self.session.goto(url.as_str());
            executor.execute_in_place(bounded(format!("goto {url}"), timeout, fut))?;
        }
        let elapsed = started.elapsed();
        self.last_navigation = Some(elapsed);
        self.record(format!("goto {url} in {}ms", elapsed.as_millis()));
        Ok(())
    }

    /// Assert that the most recent navigation settled within a wall-clock
    /// budget. Fails immediately when no navigation has happened yet.
    pub fn assert_loaded_within(&mut self, limit_ms: u64) -> anyhow::Result<()> {
        let check = format!("page loads within {limit_ms}ms");
        match self.last_navigation_ms() {
            Some(took) if took <= limit_ms => {
                self.record(format!("PASS {check}: took {took}ms"));
                Ok(())
            }
            Some(took) => self.fail_now(check, format!("at most {limit_ms}ms"), format!("{took}ms")),
            None => self.fail_now(check, format!("at most {limit_ms}ms"), "no navigation yet".to_string()),
        }
    }

    /// Evaluate a script in the page, bounded by the action timeout.
    pub fn evaluate(&mut self, script: &str) -> anyhow::Result<Value> {
        let executor = self.executor;
        let timeout = self.config.action_timeout;
        let fut = self.session.evaluate(script);
        executor.execute_in_place(bounded("evaluate".to_string(), timeout, fut))
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        let executor = self.executor;
        let timeout = self.config.action_timeout;
        {
            let fut = self.session.set_viewport(Viewport { width, height });
            executor.execute_in_place(bounded(
                format!("set viewport to {width}x{height}"),
                timeout,
                fut,
            ))?;
        }
        self.record(format!("viewport {width}x{height}"));
        Ok(())
    }

    /// Block network requests matching the given URL patterns for the rest of
    /// the session. `*` wildcards are allowed.
    pub fn block_requests(&mut self, patterns: &[&str]) -> anyhow::Result<()> {
        let owned: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        let executor = self.executor;
        let timeout = self.config.action_timeout;
        {
            let fut = self.session.block_urls(&owned);
            executor.execute_in_place(bounded(
                format!("block requests {patterns:?}"),
                timeout,
                fut,
            ))?;
        }
        self.record(format!("blocking {patterns:?}"));
        Ok(())
    }

    /// Move the pointer over the target. Fails as an action when the target
    /// cannot be found at all.
    pub fn hover(&mut self, target: &Target) -> anyhow::Result<()> {
        let marked = self.evaluate(&dom::mark_target(target))?;
        if marked != Value::Bool(true) {
            anyhow::bail!("Cannot hover {}: no matching element", target.describe());
        }
        let executor = self.executor;
        let timeout = self.config.action_timeout;
        {
            let fut = self.session.hover(dom::MARKED_SELECTOR);
            executor.execute_in_place(bounded(
                format!("hover {}", target.describe()),
                timeout,
                fut,
            ))?;
        }
        self.record(format!("hover {}", target.describe()));
        Ok(())
    }

    pub fn scroll_into_view(&mut self, target: &Target) -> anyhow::Result<()> {
        let found = self.evaluate(&dom::scroll_into_view(target))?;
        if found != Value::Bool(true) {
            anyhow::bail!("Cannot scroll to {}: no matching element", target.describe());
        }
        self.record(format!("scrolled to {}", target.describe()));
        Ok(())
    }

    /// Sleep, still interruptible by run cancellation.
    pub fn pause(&mut self, duration: Duration) -> anyhow::Result<()> {
        let executor = self.executor;
        executor.execute_in_place(async move {
            tokio::time::sleep(duration).await;
            Ok(())
        })?;
        self.record(format!("paused {}ms", duration.as_millis()));
        Ok(())
    }

    /// Read one resolved style property of the target right now.
    pub fn computed_style(&mut self, target: &Target, property: &str) -> anyhow::Result<String> {
        let value = self.evaluate(&dom::computed_style(target, property))?;
        match value {
            Value::String(style) => Ok(style),
            Value::Null => anyhow::bail!(
                "Cannot read '{property}' of {}: no matching element",
                target.describe()
            ),
            other => anyhow::bail!("Unexpected style value {other} for {}", target.describe()),
        }
    }

    /// Collect one attribute from every element matching a selector.
    pub fn collect_attributes(
        &mut self,
        selector: &str,
        attribute: &str,
    ) -> anyhow::Result<Vec<String>> {
        let value = self.evaluate(&dom::collect_attributes(selector, attribute))?;
        as_string_list(value)
    }

    /// Collect the trimmed text of every element matching a selector.
    pub fn collect_texts(&mut self, selector: &str) -> anyhow::Result<Vec<String>> {
        let value = self.evaluate(&dom::collect_texts(selector))?;
        as_string_list(value)
    }

    /// Record a check the step has already decided, without polling.
    pub fn expect(
        &mut self,
        check: &str,
        expected: &str,
        observed: &str,
        ok: bool,
    ) -> anyhow::Result<()> {
        if ok {
            self.record(format!("PASS {check}: {observed}"));
            Ok(())
        } else {
            self.fail_now(check.to_string(), expected.to_string(), observed.to_string())
        }
    }

    pub fn assert_visible(&mut self, target: &Target) -> anyhow::Result<()> {
        self.poll_assert(
            format!("{} is visible", target.describe()),
            "visible".to_string(),
            dom::probe_element(target),
            |value| {
                if !flag(value, "found") {
                    Observation::pending("no matching element".to_string())
                } else if flag(value, "visible") {
                    Observation::satisfied("visible".to_string())
                } else {
                    Observation::pending("present but hidden".to_string())
                }
            },
        )?;
        Ok(())
    }

    pub fn assert_text_visible(&mut self, text: &str) -> anyhow::Result<()> {
        self.assert_visible(&Target::text(text))
    }

    pub fn assert_enabled(&mut self, target: &Target) -> anyhow::Result<()> {
        self.poll_assert(
            format!("{} is enabled", target.describe()),
            "enabled".to_string(),
            dom::probe_element(target),
            |value| {
                if !flag(value, "found") {
                    Observation::pending("no matching element".to_string())
                } else if flag(value, "enabled") {
                    Observation::satisfied("enabled".to_string())
                } else {
                    Observation::pending("present but disabled".to_string())
                }
            },
        )?;
        Ok(())
    }

    /// Assert the target carries a class token, returning the full class
    /// attribute that was observed.
    pub fn assert_class_contains(
        &mut self,
        target: &Target,
        token: &str,
    ) -> anyhow::Result<String> {
        let wanted = token.to_string();
        self.poll_assert(
            format!("{} has class '{token}'", target.describe()),
            format!("class list containing '{token}'"),
            dom::probe_element(target),
            move |value| {
                if !flag(value, "found") {
                    return Observation::pending("no matching element".to_string());
                }
                let class = value
                    .get("class")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if class.split_whitespace().any(|c| c == wanted) {
                    Observation::satisfied(class)
                } else if class.is_empty() {
                    Observation::pending("(no class attribute)".to_string())
                } else {
                    Observation::pending(class)
                }
            },
        )
    }

    /// Assert an exact number of matches for a CSS selector.
    pub fn assert_count(&mut self, selector: &str, expected: usize) -> anyhow::Result<()> {
        self.poll_assert(
            format!("'{selector}' matches {expected} elements"),
            expected.to_string(),
            dom::count_matches(selector),
            move |value| {
                let count = value.as_u64().unwrap_or(0) as usize;
                if count == expected {
                    Observation::satisfied(count.to_string())
                } else {
                    Observation::pending(count.to_string())
                }
            },
        )?;
        Ok(())
    }

    /// Assert an image target has finished loading with real pixel data.
    pub fn assert_image_loaded(&mut self, target: &Target) -> anyhow::Result<()> {
        self.poll_assert(
            format!("{} is loaded", target.describe()),
            "loaded image".to_string(),
            dom::image_loaded(target),
            |value| {
                if !flag(value, "found") {
                    Observation::pending("no matching element".to_string())
                } else if flag(value, "loaded") {
                    Observation::satisfied("loaded".to_string())
                } else {
                    Observation::pending("present but not loaded".to_string())
                }
            },
        )?;
        Ok(())
    }

    /// Assert a resolved style property contains a fragment, returning the
    /// observed value.
    pub fn assert_style_contains(
        &mut self,
        target: &Target,
        property: &str,
        fragment: &str,
    ) -> anyhow::Result<String> {
        let wanted = fragment.to_string();
        self.poll_assert(
            format!("{} has {property} containing '{fragment}'", target.describe()),
            format!("{property} containing '{fragment}'"),
            dom::computed_style(target, property),
            move |value| match value {
                Value::String(style) if style.contains(&wanted) => {
                    Observation::satisfied(style.clone())
                }
                Value::String(style) => Observation::pending(style.clone()),
                _ => Observation::pending("no matching element".to_string()),
            },
        )
    }

    fn fail_now(
        &mut self,
        check: String,
        expected: String,
        observed: String,
    ) -> anyhow::Result<()> {
        let failure = AssertionFailure {
            check,
            expected,
            observed,
            waited_ms: 0,
        };
        self.record(format!("FAIL {failure}"));
        Err(anyhow::Error::new(failure))
    }

    /// Sample the page with `script` until `extract` reports a satisfied
    /// observation, bounded by the assertion timeout.
    fn poll_assert<F>(
        &mut self,
        check: String,
        expected: String,
        script: String,
        extract: F,
    ) -> anyhow::Result<String>
    where
        F: Fn(&Value) -> Observation<String> + Send + Sync,
    {
        struct EvalProbe<'a, F> {
            session: &'a mut dyn Session,
            script: &'a str,
            extract: &'a F,
        }

        #[async_trait::async_trait]
        impl<F> Probe for EvalProbe<'_, F>
        where
            F: Fn(&Value) -> Observation<String> + Send + Sync,
        {
            type Value = String;

            async fn observe(&mut self) -> anyhow::Result<Observation<String>> {
                let value = self.session.evaluate(self.script).await?;
                Ok((self.extract)(&value))
            }
        }

        let executor = self.executor;
        let timeout = self.config.assertion_timeout;
        let interval = self.config.poll_interval;
        let outcome = {
            let mut probe = EvalProbe {
                session: self.session.as_mut(),
                script: &script,
                extract: &extract,
            };
            executor
                .execute_in_place(async move { Ok(wait_until(&mut probe, timeout, interval).await) })?
        };

        match outcome {
            Ok((observed, waited)) => {
                self.record(format!(
                    "PASS {check}: {observed} after {}ms",
                    waited.as_millis()
                ));
                Ok(observed)
            }
            Err(WaitError::TimedOut(timed_out)) => {
                let failure = AssertionFailure {
                    check,
                    expected,
                    observed: timed_out
                        .last_observed
                        .unwrap_or_else(|| "nothing observed".to_string()),
                    waited_ms: timed_out.waited.as_millis() as u64,
                };
                self.record(format!("FAIL {failure}"));
                Err(anyhow::Error::new(failure))
            }
            Err(WaitError::Probe(e)) => Err(e),
        }
    }

    /// Store the configured artifacts for a failed attempt, best effort.
    /// Capture problems are logged, never escalated.
    pub(crate) fn capture_failure_artifacts(&mut self, run_id: &str) -> Vec<PathBuf> {
        let policy = &self.config.artifacts;
        let dir = policy.dir.join(run_id).join(slug(&self.engine.name));
        let stem = format!("{}-attempt-{}", slug(self.case_name), self.attempt);
        let mut captured = Vec::new();

        if policy.screenshot.applies(self.attempt) {
            let executor = self.executor;
            let shot = {
                let fut = self.session.screenshot();
                executor.execute_with_grace(ARTIFACT_GRACE, async move {
                    fut.await.map_err(anyhow::Error::new)
                })
            };
            match shot {
                Ok(bytes) => match write_artifact(&dir, &format!("{stem}.png"), &bytes) {
                    Ok(path) => captured.push(path),
                    Err(e) => log::warn!("Failed to store screenshot: {e:#}"),
                },
                Err(e) => log::warn!("Failed to capture screenshot: {e:#}"),
            }
        }

        if policy.trace.applies(self.attempt) {
            match serde_json::to_vec_pretty(&self.trace) {
                Ok(bytes) => match write_artifact(&dir, &format!("{stem}.trace.json"), &bytes) {
                    Ok(path) => captured.push(path),
                    Err(e) => log::warn!("Failed to store trace: {e:#}"),
                },
                Err(e) => log::warn!("Failed to serialize trace: {e:#}"),
            }
        }

        captured
    }

    pub(crate) fn into_session(self) -> Box<dyn Session> {
        self.session
    }
}

fn flag(value: &Value, field: &str) -> bool {
    value.get(field).and_then(Value::as_bool).unwrap_or(false)
}

fn as_string_list(value: Value) -> anyhow::Result<Vec<String>> {
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect()),
        other => anyhow::bail!("Expected an array of strings, got {other}"),
    }
}
