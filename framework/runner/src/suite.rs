use std::collections::HashSet;

use crate::config::CaseFilter;
use crate::context::CaseContext;

/// The outcome of running one step or hook against a live session.
pub type StepResult = anyhow::Result<()>;

/// Steps and hooks are plain functions so cases can be declared as static
/// suite code and shared freely across engine worker threads.
pub type StepFn = fn(&mut CaseContext) -> StepResult;

pub struct Step {
    pub(crate) name: String,
    pub(crate) run: StepFn,
}

/// A named sequence of steps, executed in order against a fresh session.
pub struct Case {
    pub(crate) name: String,
    pub(crate) tags: Vec<String>,
    pub(crate) steps: Vec<Step>,
    pub(crate) continue_on_failure: bool,
    pub(crate) teardown: Option<StepFn>,
}

impl Case {
    pub fn builder(name: &str) -> CaseBuilder {
        CaseBuilder {
            name: name.to_string(),
            tags: Vec::new(),
            steps: Vec::new(),
            continue_on_failure: false,
            teardown: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

pub struct CaseBuilder {
    name: String,
    tags: Vec<String>,
    steps: Vec<Step>,
    continue_on_failure: bool,
    teardown: Option<StepFn>,
}

impl CaseBuilder {
    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    /// Add a named step. Steps run in declaration order.
    pub fn step(mut self, name: &str, run: StepFn) -> Self {
        if self.steps.iter().any(|s| s.name == name) {
            panic!(
                "Step '{}' already registered for case '{}'",
                name, self.name
            );
        }
        self.steps.push(Step {
            name: name.to_string(),
            run,
        });
        self
    }

    /// Keep running later steps after a step fails. The first failure still
    /// decides the attempt outcome.
    pub fn continue_on_failure(mut self) -> Self {
        self.continue_on_failure = true;
        self
    }

    /// Hook that runs after the steps, whether they passed or not. Errors
    /// from teardown are logged but never change the attempt outcome.
    pub fn use_teardown(mut self, run: StepFn) -> Self {
        self.teardown = Some(run);
        self
    }

    pub fn build(self) -> Case {
        if self.steps.is_empty() {
            panic!("Case '{}' has no steps", self.name);
        }
        Case {
            name: self.name,
            tags: self.tags,
            steps: self.steps,
            continue_on_failure: self.continue_on_failure,
            teardown: self.teardown,
        }
    }
}

/// An ordered collection of cases plus suite-level hooks.
pub struct Suite {
    pub(crate) name: String,
    pub(crate) before_each: Option<StepFn>,
    pub(crate) cases: Vec<Case>,
}

impl Suite {
    pub fn builder(name: &str) -> SuiteBuilder {
        SuiteBuilder {
            name: name.to_string(),
            before_each: None,
            cases: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    /// Indexes of the cases matching the filter, in declaration order.
    ///
    /// Name filters match on substring, tag filters on exact tag. Within each
    /// group any match is enough; an empty group matches everything.
    pub fn select(&self, filter: &CaseFilter) -> Vec<usize> {
        self.cases
            .iter()
            .enumerate()
            .filter(|(_, case)| {
                let name_match = filter.names.is_empty()
                    || filter.names.iter().any(|n| case.name.contains(n.as_str()));
                let tag_match = filter.tags.is_empty()
                    || filter.tags.iter().any(|t| case.tags.contains(t));
                name_match && tag_match
            })
            .map(|(index, _)| index)
            .collect()
    }
}

pub struct SuiteBuilder {
    name: String,
    before_each: Option<StepFn>,
    cases: Vec<Case>,
}

impl SuiteBuilder {
    /// Hook that runs at the start of every attempt, before the case steps.
    pub fn use_before_each(mut self, run: StepFn) -> Self {
        self.before_each = Some(run);
        self
    }

    pub fn register_case(mut self, case: Case) -> Self {
        if self.cases.iter().any(|c| c.name == case.name) {
            panic!("Case '{}' already registered", case.name);
        }
        self.cases.push(case);
        self
    }

    pub fn build(self) -> Suite {
        let mut seen = HashSet::new();
        for case in &self.cases {
            for tag in &case.tags {
                seen.insert(tag.clone());
            }
        }
        log::debug!(
            "Suite '{}' built with {} cases, tags: {:?}",
            self.name,
            self.cases.len(),
            seen
        );
        Suite {
            name: self.name,
            before_each: self.before_each,
            cases: self.cases,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_ctx: &mut CaseContext) -> StepResult {
        Ok(())
    }

    fn suite() -> Suite {
        Suite::builder("demo")
            .register_case(
                Case::builder("hero renders")
                    .tag("smoke")
                    .step("check", noop)
                    .build(),
            )
            .register_case(
                Case::builder("hero responds to resize")
                    .tag("responsive")
                    .step("check", noop)
                    .build(),
            )
            .register_case(
                Case::builder("footer links")
                    .tag("smoke")
                    .tag("a11y")
                    .step("check", noop)
                    .build(),
            )
            .build()
    }

    #[test]
    fn empty_filter_selects_everything() {
        assert_eq!(suite().select(&CaseFilter::default()), vec![0, 1, 2]);
    }

    #[test]
    fn name_filter_matches_substring() {
        let filter = CaseFilter {
            names: vec!["hero".to_string()],
            tags: Vec::new(),
        };
        assert_eq!(suite().select(&filter), vec![0, 1]);
    }

    #[test]
    fn tag_filter_matches_exact_tag() {
        let filter = CaseFilter {
            names: Vec::new(),
            tags: vec!["smoke".to_string()],
        };
        assert_eq!(suite().select(&filter), vec![0, 2]);
    }

    #[test]
    fn name_and_tag_filters_intersect() {
        let filter = CaseFilter {
            names: vec!["hero".to_string()],
            tags: vec!["smoke".to_string()],
        };
        assert_eq!(suite().select(&filter), vec![0]);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_case_names_panic() {
        Suite::builder("demo")
            .register_case(Case::builder("same").step("a", noop).build())
            .register_case(Case::builder("same").step("a", noop).build())
            .build();
    }

    #[test]
    #[should_panic(expected = "has no steps")]
    fn case_without_steps_panics() {
        Case::builder("empty").build();
    }
}
