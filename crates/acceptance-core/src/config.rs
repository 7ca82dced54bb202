use crate::error::{AcceptanceError, Result};
use crate::paths;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// TransportMode
// ---------------------------------------------------------------------------

/// Which sinks receive structured log records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// Text log only.
    #[default]
    Realtime,
    /// JSON-lines relay only.
    Json,
    /// Both sinks.
    Hybrid,
}

impl TransportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportMode::Realtime => "realtime",
            TransportMode::Json => "json",
            TransportMode::Hybrid => "hybrid",
        }
    }

    pub fn writes_text(self) -> bool {
        matches!(self, TransportMode::Realtime | TransportMode::Hybrid)
    }

    pub fn writes_json(self) -> bool {
        matches!(self, TransportMode::Json | TransportMode::Hybrid)
    }
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TransportConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub mode: TransportMode,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_relay_file")]
    pub relay_file: PathBuf,
    #[serde(default, alias = "fallbackToRealtimeOnJsonError")]
    pub fallback_to_realtime_on_json_error: bool,
    #[serde(default = "default_write_attempts")]
    pub write_attempts: u32,
    #[serde(default = "default_write_backoff_ms")]
    pub write_backoff_ms: u64,
}

fn default_log_file() -> PathBuf {
    PathBuf::from(paths::DEFAULT_LOG_FILE)
}

fn default_relay_file() -> PathBuf {
    PathBuf::from(paths::DEFAULT_RELAY_FILE)
}

fn default_write_attempts() -> u32 {
    10
}

fn default_write_backoff_ms() -> u64 {
    120
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::default(),
            log_file: default_log_file(),
            relay_file: default_relay_file(),
            fallback_to_realtime_on_json_error: false,
            write_attempts: default_write_attempts(),
            write_backoff_ms: default_write_backoff_ms(),
        }
    }
}

impl TransportConfig {
    pub fn write_backoff(&self) -> Duration {
        Duration::from_millis(self.write_backoff_ms)
    }
}

// ---------------------------------------------------------------------------
// ExecutorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_http_timeout() -> u64 {
    8
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// PreflightConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightConfig {
    #[serde(default)]
    pub required_files: Vec<PathBuf>,
    #[serde(default)]
    pub required_endpoints: Vec<String>,
    #[serde(default = "default_preflight_timeout")]
    pub timeout_secs: u64,
}

fn default_preflight_timeout() -> u64 {
    6
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            required_files: Vec::new(),
            required_endpoints: Vec::new(),
            timeout_secs: default_preflight_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// GateConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_threshold")]
    pub pass_rate_threshold: f64,
}

fn default_threshold() -> f64 {
    1.0
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            pass_rate_threshold: default_threshold(),
        }
    }
}

// ---------------------------------------------------------------------------
// CoverageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageConfig {
    /// Matches acceptance-item ids in the requirements document.
    #[serde(default = "default_acceptance_pattern")]
    pub acceptance_pattern: String,
    /// Matches API ids in the API list document.
    #[serde(default = "default_api_pattern")]
    pub api_pattern: String,
    /// Link a test point to an API id when the test point id starts with it.
    #[serde(default = "default_link_api_prefix")]
    pub link_api_prefix: bool,
}

fn default_acceptance_pattern() -> String {
    r"\bAC-[A-Z0-9]+(?:-[0-9]+)*\b".to_string()
}

fn default_api_pattern() -> String {
    r"\bAPI-[A-Z]+-[0-9]{3}\b".to_string()
}

fn default_link_api_prefix() -> bool {
    true
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            acceptance_pattern: default_acceptance_pattern(),
            api_pattern: default_api_pattern(),
            link_api_prefix: default_link_api_prefix(),
        }
    }
}

impl CoverageConfig {
    pub fn acceptance_regex(&self) -> Result<Regex> {
        compile(&self.acceptance_pattern)
    }

    pub fn api_regex(&self) -> Result<Regex> {
        compile(&self.api_pattern)
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| AcceptanceError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Skill whose output is under test, e.g. "crud-scaffold".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_id: Option<String>,
    /// Workflow stage running the checks, e.g. "feature" or "delivery".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub preflight: PreflightConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub coverage: CoverageConfig,
}

impl Config {
    /// Strict load: a missing or malformed document is an error.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(AcceptanceError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Lenient load used at process start. Anything short of a readable,
    /// well-formed document yields the defaults.
    pub fn load_or_default(root: &Path) -> Self {
        match Self::load(root) {
            Ok(cfg) => cfg,
            Err(AcceptanceError::NotInitialized) => {
                tracing::debug!(root = %root.display(), "no config file; using defaults");
                Config::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "config could not be parsed; using defaults");
                Config::default()
            }
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn log_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.transport.log_file)
    }

    pub fn relay_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.transport.relay_file)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.executor.max_attempts == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "executor.max_attempts is 0; each test point still runs once".to_string(),
            });
        }
        if self.executor.max_attempts > 20 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "executor.max_attempts={} (>20 is unusual)",
                    self.executor.max_attempts
                ),
            });
        }

        if self.transport.write_attempts == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "transport.write_attempts is 0; writes are still attempted once"
                    .to_string(),
            });
        }

        if self.transport.mode == TransportMode::Realtime
            && self.transport.fallback_to_realtime_on_json_error
        {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "fallback_to_realtime_on_json_error has no effect in realtime mode"
                    .to_string(),
            });
        }

        let threshold = self.gate.pass_rate_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("gate.pass_rate_threshold={threshold} must be within 0.0..=1.0"),
            });
        }

        for endpoint in &self.preflight.required_endpoints {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("preflight endpoint '{endpoint}' is not an http(s) URL"),
                });
            }
        }

        for (name, result) in [
            ("coverage.acceptance_pattern", self.coverage.acceptance_regex()),
            ("coverage.api_pattern", self.coverage.api_regex()),
        ] {
            if let Err(e) = result {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{name}: {e}"),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
