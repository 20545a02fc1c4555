use std::path::PathBuf;

use clap::Parser;

/// Command line arguments for a Crosswind run. Anything set here overrides
/// the corresponding value from the TOML configuration file.
#[derive(Parser, Debug, Default)]
#[command(name = "crosswind")]
pub struct CrosswindCli {
    /// Path to a TOML run configuration file
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Base URL of the application under test
    #[clap(long)]
    pub base_url: Option<String>,

    /// Run only cases whose name contains one of these values
    #[clap(short, long = "filter")]
    pub filter: Vec<String>,

    /// Run only cases carrying one of these tags
    #[clap(short, long = "tag")]
    pub tag: Vec<String>,

    /// Run only these engines from the configured set
    #[clap(short, long = "engine")]
    pub engine: Vec<String>,

    /// Number of retries per case after a failed attempt
    #[clap(long)]
    pub retries: Option<u32>,

    /// Abort the whole run after this many seconds
    #[clap(long)]
    pub global_timeout: Option<u64>,

    /// Write the machine-parseable JSON report to this path
    #[clap(long)]
    pub report: Option<PathBuf>,

    /// Directory for failure artifacts (screenshots and traces)
    #[clap(long)]
    pub artifacts_dir: Option<PathBuf>,

    /// Do not render a progress bar, recommended when logging to a file
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// Print the cases that would run and exit
    #[clap(long, default_value = "false")]
    pub list: bool,
}

/// Parse the command line and initialise logging.
///
/// Call this before anything that logs. Respects `RUST_LOG`.
pub fn init() -> CrosswindCli {
    env_logger::init();
    CrosswindCli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_filters_accumulate() {
        let cli = CrosswindCli::parse_from([
            "crosswind",
            "--filter",
            "hero",
            "--filter",
            "footer",
            "--tag",
            "smoke",
        ]);
        assert_eq!(cli.filter, vec!["hero", "footer"]);
        assert_eq!(cli.tag, vec!["smoke"]);
    }

    #[test]
    fn defaults_leave_overrides_unset() {
        let cli = CrosswindCli::parse_from(["crosswind"]);
        assert!(cli.config.is_none());
        assert!(cli.retries.is_none());
        assert!(!cli.no_progress);
        assert!(!cli.list);
    }
}
