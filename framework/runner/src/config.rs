use std::path::{Path, PathBuf};
use std::time::Duration;

use crosswind_driver::EngineProfile;
use serde::Deserialize;
use url::Url;

use crate::cli::CrosswindCli;

const DEFAULT_RETRIES: u32 = 2;
const DEFAULT_GLOBAL_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_millis(10_000);
const DEFAULT_ASSERTION_TIMEOUT: Duration = Duration::from_millis(5_000);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Problems with the run configuration. These are fatal before any case
/// starts, so they surface as the infrastructure exit code rather than a
/// test failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No base URL configured, pass --base-url or set base_url in the config file")]
    MissingBaseUrl,

    #[error("Invalid base URL '{url}': {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("Unsupported base URL scheme '{scheme}', expected http or https")]
    UnsupportedScheme { scheme: String },

    #[error("Failed to read config file {path:?}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("No engines selected for this run")]
    NoEngines,

    #[error("Engine '{name}' is not in the configured engine set")]
    UnknownEngine { name: String },

    #[error("Engine '{name}' is configured more than once")]
    DuplicateEngine { name: String },

    #[error("Timeout '{what}' must be greater than zero")]
    ZeroTimeout { what: &'static str },
}

/// When to capture an artifact for a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactPolicy {
    Off,
    /// Every failed attempt.
    OnFailure,
    /// Failed attempts from the first retry onwards, never the first attempt.
    OnFirstRetry,
}

impl ArtifactPolicy {
    pub(crate) fn applies(self, attempt: u32) -> bool {
        match self {
            ArtifactPolicy::Off => false,
            ArtifactPolicy::OnFailure => true,
            ArtifactPolicy::OnFirstRetry => attempt >= 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    pub dir: PathBuf,
    pub screenshot: ArtifactPolicy,
    pub trace: ArtifactPolicy,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
            screenshot: ArtifactPolicy::OnFailure,
            trace: ArtifactPolicy::OnFirstRetry,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseFilter {
    pub names: Vec<String>,
    pub tags: Vec<String>,
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub base_url: Url,
    pub engines: Vec<EngineProfile>,
    pub retries: u32,
    pub global_timeout: Duration,
    pub action_timeout: Duration,
    pub assertion_timeout: Duration,
    pub poll_interval: Duration,
    pub artifacts: ArtifactConfig,
    pub report_path: Option<PathBuf>,
    pub no_progress: bool,
    pub filter: CaseFilter,
}

impl RunConfig {
    /// A configuration with stock timeouts and a single default engine,
    /// mostly useful as a starting point in tests.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            engines: vec![EngineProfile::named("chromium-desktop")],
            retries: DEFAULT_RETRIES,
            global_timeout: DEFAULT_GLOBAL_TIMEOUT,
            action_timeout: DEFAULT_ACTION_TIMEOUT,
            assertion_timeout: DEFAULT_ASSERTION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            artifacts: ArtifactConfig::default(),
            report_path: None,
            no_progress: true,
            filter: CaseFilter::default(),
        }
    }

    /// Resolve the effective configuration from the config file and the
    /// command line, with the command line taking precedence.
    pub fn load(cli: &CrosswindCli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => ConfigFile::read(path)?,
            None => ConfigFile::default(),
        };

        let base_url = cli
            .base_url
            .clone()
            .or(file.base_url)
            .ok_or(ConfigError::MissingBaseUrl)?;
        let base_url = Url::parse(&base_url).map_err(|e| ConfigError::BaseUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme {
                scheme: base_url.scheme().to_string(),
            });
        }

        let mut engines = if file.engines.is_empty() {
            vec![EngineProfile::named("chromium-desktop")]
        } else {
            file.engines
        };
        // Engine names key worker threads and report rows, so they must be
        // unique.
        let mut seen = std::collections::HashSet::new();
        for engine in &engines {
            if !seen.insert(engine.name.as_str()) {
                return Err(ConfigError::DuplicateEngine {
                    name: engine.name.clone(),
                });
            }
        }
        if !cli.engine.is_empty() {
            for name in &cli.engine {
                if !engines.iter().any(|e| &e.name == name) {
                    return Err(ConfigError::UnknownEngine { name: name.clone() });
                }
            }
            engines.retain(|e| cli.engine.contains(&e.name));
        }
        if engines.is_empty() {
            return Err(ConfigError::NoEngines);
        }

        let timeouts = file.timeouts.unwrap_or_default();
        let global_timeout = cli
            .global_timeout
            .map(Duration::from_secs)
            .or(timeouts.global_s.map(Duration::from_secs))
            .unwrap_or(DEFAULT_GLOBAL_TIMEOUT);
        let action_timeout = timeouts
            .action_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_ACTION_TIMEOUT);
        let assertion_timeout = timeouts
            .assertion_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_ASSERTION_TIMEOUT);
        let poll_interval = timeouts
            .poll_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        for (what, value) in [
            ("global", global_timeout),
            ("action", action_timeout),
            ("assertion", assertion_timeout),
            ("poll", poll_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroTimeout { what });
            }
        }

        let file_artifacts = file.artifacts.unwrap_or_default();
        let defaults = ArtifactConfig::default();
        let artifacts = ArtifactConfig {
            dir: cli
                .artifacts_dir
                .clone()
                .or(file_artifacts.dir)
                .unwrap_or(defaults.dir),
            screenshot: file_artifacts.screenshot.unwrap_or(defaults.screenshot),
            trace: file_artifacts.trace.unwrap_or(defaults.trace),
        };

        Ok(Self {
            base_url,
            engines,
            retries: cli.retries.or(file.retries).unwrap_or(DEFAULT_RETRIES),
            global_timeout,
            action_timeout,
            assertion_timeout,
            poll_interval,
            artifacts,
            report_path: cli.report.clone().or(file.report),
            no_progress: cli.no_progress,
            filter: CaseFilter {
                names: cli.filter.clone(),
                tags: cli.tag.clone(),
            },
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
    retries: Option<u32>,
    report: Option<PathBuf>,
    #[serde(default)]
    engines: Vec<EngineProfile>,
    timeouts: Option<TimeoutsFile>,
    artifacts: Option<ArtifactsFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimeoutsFile {
    global_s: Option<u64>,
    action_ms: Option<u64>,
    assertion_ms: Option<u64>,
    poll_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArtifactsFile {
    dir: Option<PathBuf>,
    screenshot: Option<ArtifactPolicy>,
    trace: Option<ArtifactPolicy>,
}

impl ConfigFile {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::File {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crosswind.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn minimal_cli_gets_defaults() {
        let cli = CrosswindCli {
            base_url: Some("http://localhost:5173".to_string()),
            ..Default::default()
        };
        let config = RunConfig::load(&cli).unwrap();

        assert_eq!(config.retries, 2);
        assert_eq!(config.global_timeout, Duration::from_secs(300));
        assert_eq!(config.action_timeout, Duration::from_millis(10_000));
        assert_eq!(config.assertion_timeout, Duration::from_millis(5_000));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.engines.len(), 1);
        assert_eq!(config.engines[0].name, "chromium-desktop");
        assert_eq!(config.artifacts.screenshot, ArtifactPolicy::OnFailure);
        assert_eq!(config.artifacts.trace, ArtifactPolicy::OnFirstRetry);
    }

    #[test]
    fn missing_base_url_is_fatal() {
        let err = RunConfig::load(&CrosswindCli::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingBaseUrl));
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let cli = CrosswindCli {
            base_url: Some("ftp://localhost".to_string()),
            ..Default::default()
        };
        let err = RunConfig::load(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme { .. }));
    }

    #[test]
    fn file_values_load_and_cli_overrides_win() {
        let (_dir, path) = write_config(
            r#"
            base_url = "http://localhost:5173"
            retries = 5

            [timeouts]
            global_s = 60
            assertion_ms = 2000

            [artifacts]
            screenshot = "off"

            [[engines]]
            name = "chromium-desktop"

            [[engines]]
            name = "mobile-chrome"
            viewport = { width = 393, height = 851 }
            "#,
        );
        let cli = CrosswindCli {
            config: Some(path),
            retries: Some(1),
            ..Default::default()
        };
        let config = RunConfig::load(&cli).unwrap();

        assert_eq!(config.retries, 1);
        assert_eq!(config.global_timeout, Duration::from_secs(60));
        assert_eq!(config.assertion_timeout, Duration::from_millis(2_000));
        assert_eq!(config.artifacts.screenshot, ArtifactPolicy::Off);
        assert_eq!(config.engines.len(), 2);
        assert_eq!(config.engines[1].viewport.width, 393);
    }

    #[test]
    fn engine_selection_filters_configured_set() {
        let (_dir, path) = write_config(
            r#"
            base_url = "http://localhost:5173"

            [[engines]]
            name = "chromium-desktop"

            [[engines]]
            name = "mobile-chrome"
            "#,
        );
        let cli = CrosswindCli {
            config: Some(path),
            engine: vec!["mobile-chrome".to_string()],
            ..Default::default()
        };
        let config = RunConfig::load(&cli).unwrap();

        assert_eq!(config.engines.len(), 1);
        assert_eq!(config.engines[0].name, "mobile-chrome");
    }

    #[test]
    fn unknown_engine_is_fatal() {
        let cli = CrosswindCli {
            base_url: Some("http://localhost:5173".to_string()),
            engine: vec!["firefox".to_string()],
            ..Default::default()
        };
        let err = RunConfig::load(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEngine { .. }));
    }

    #[test]
    fn duplicate_engine_names_are_rejected() {
        let (_dir, path) = write_config(
            r#"
            base_url = "http://localhost:5173"

            [[engines]]
            name = "chromium-desktop"

            [[engines]]
            name = "chromium-desktop"
            viewport = { width = 1920, height = 1080 }
            "#,
        );
        let cli = CrosswindCli {
            config: Some(path),
            ..Default::default()
        };
        let err = RunConfig::load(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateEngine { .. }));
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let (_dir, path) = write_config(
            r#"
            base_url = "http://localhost:5173"

            [timeouts]
            poll_ms = 0
            "#,
        );
        let cli = CrosswindCli {
            config: Some(path),
            ..Default::default()
        };
        let err = RunConfig::load(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTimeout { what: "poll" }));
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let (_dir, path) = write_config(
            r#"
            base_url = "http://localhost:5173"
            paralellism = 4
            "#,
        );
        let cli = CrosswindCli {
            config: Some(path),
            ..Default::default()
        };
        let err = RunConfig::load(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn on_first_retry_skips_the_first_attempt() {
        assert!(!ArtifactPolicy::OnFirstRetry.applies(0));
        assert!(ArtifactPolicy::OnFirstRetry.applies(1));
        assert!(ArtifactPolicy::OnFailure.applies(0));
        assert!(!ArtifactPolicy::Off.applies(3));
    }
}
