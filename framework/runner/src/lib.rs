//! The Crosswind orchestrator: suite declaration, configuration, engine
//! workers and the run loop.

mod artifacts;
mod cli;
mod config;
mod context;
mod dom;
mod executor;
mod progress;
mod run;
mod signal;
mod suite;

pub use cli::{init, CrosswindCli};
pub use config::{ArtifactConfig, ArtifactPolicy, CaseFilter, ConfigError, RunConfig};
pub use context::CaseContext;
pub use dom::Target;
pub use run::run;
pub use suite::{Case, CaseBuilder, StepFn, StepResult, Suite, SuiteBuilder};

/// Everything a suite binary needs.
pub mod prelude {
    pub use crate::cli::{init, CrosswindCli};
    pub use crate::config::{ConfigError, RunConfig};
    pub use crate::context::CaseContext;
    pub use crate::dom::Target;
    pub use crate::run::run;
    pub use crate::suite::{Case, StepResult, Suite};
    pub use crosswind_driver::{ChromeDriver, Driver};
    pub use crosswind_report::{exit_code, RunReport};
}
