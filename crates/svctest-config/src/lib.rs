//! ---
//! svctest_section: "04-configuration"
//! svctest_subsection: "module"
//! svctest_type: "source"
//! svctest_scope: "code"
//! svctest_description: "Driver configuration loading and validation."
//! svctest_version: "v0.1.0"
//! svctest_owner: "tbd"
//! ---
//! Every field has a default, so the driver runs without any configuration
//! file against the session bus and fixtures in the working directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use svctest_logging::LogFormat;
use tracing::debug;

/// Environment variable naming a configuration file; wins over `--config`.
pub const ENV_CONFIG_PATH: &str = "SVCTEST_CONFIG";
/// Configuration file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "service-tests.toml";
/// Bus name of the service under test.
pub const DEFAULT_SERVICE: &str = "com.example.SampleService";
/// Object carrying the functional test methods.
pub const DEFAULT_OBJECT_PATH: &str = "/ServerObject";
/// Introspected objects, in fixture order.
pub const DEFAULT_INTROSPECTION_PATHS: [&str; 7] = [
    "/",
    "/ServerObject",
    "/ServerObject/Child",
    "/Not",
    "/Not/A",
    "/Not/A/Child",
    "/Not/A/Child/Class",
];

fn default_service_name() -> String {
    DEFAULT_SERVICE.to_owned()
}

fn default_object_path() -> String {
    DEFAULT_OBJECT_PATH.to_owned()
}

fn default_introspection_paths() -> Vec<String> {
    DEFAULT_INTROSPECTION_PATHS
        .iter()
        .map(|p| (*p).to_owned())
        .collect()
}

fn default_fixture_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_fixture_prefix() -> String {
    "introspection".to_owned()
}

fn default_fixture_extension() -> String {
    "xml".to_owned()
}

fn default_signal_timeout() -> Duration {
    Duration::from_millis(250)
}

/// Complete driver configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub fixtures: FixtureConfig,
    #[serde(default)]
    pub signals: SignalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration together with the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedDriverConfig {
    pub config: DriverConfig,
    /// `None` when built-in defaults were used.
    pub source: Option<PathBuf>,
}

impl DriverConfig {
    /// Load configuration, honouring `SVCTEST_CONFIG`, then `explicit`, then
    /// `service-tests.toml` in the working directory, then defaults.
    pub fn load_with_source(explicit: Option<&Path>) -> Result<LoadedDriverConfig> {
        let source = resolve_source(
            std::env::var(ENV_CONFIG_PATH).ok(),
            explicit,
            Path::new(DEFAULT_CONFIG_FILE),
        );
        let config = match &source {
            Some(path) => Self::from_path(path)?,
            None => {
                let config = Self::default();
                config.validate()?;
                config
            }
        };
        Ok(LoadedDriverConfig { config, source })
    }

    /// Read, parse and validate a TOML configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parse and validate TOML configuration text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: DriverConfig =
            toml::from_str(contents).context("failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.service.validate()?;
        self.bus.validate()?;
        self.fixtures.validate()?;
        Ok(())
    }
}

fn resolve_source(
    env_value: Option<String>,
    explicit: Option<&Path>,
    fallback: &Path,
) -> Option<PathBuf> {
    if let Some(env_path) = env_value.filter(|v| !v.trim().is_empty()) {
        return Some(PathBuf::from(env_path));
    }
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    fallback.exists().then(|| fallback.to_path_buf())
}

/// The service under test and the objects exercised on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default = "default_object_path")]
    pub object_path: String,
    /// Objects whose introspection is compared; fixture N is entry N (1-based).
    #[serde(default = "default_introspection_paths")]
    pub introspection_paths: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            object_path: default_object_path(),
            introspection_paths: default_introspection_paths(),
        }
    }
}

impl ServiceConfig {
    fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() || !name.contains('.') || name.starts_with('.') || name.ends_with('.')
        {
            return Err(anyhow!(
                "service name {:?} must be a dotted bus name",
                self.name
            ));
        }
        validate_object_path(&self.object_path)?;
        if self.introspection_paths.is_empty() {
            return Err(anyhow!("introspection_paths must not be empty"));
        }
        for path in &self.introspection_paths {
            validate_object_path(path)?;
        }
        Ok(())
    }
}

fn validate_object_path(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(anyhow!("object path {path:?} must start with '/'"));
    }
    Ok(())
}

/// Which message bus to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusKind {
    #[default]
    Session,
    System,
    /// Explicit address taken from [`BusConfig::address`].
    Address,
}

/// Bus connection settings.
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default)]
    pub kind: BusKind,
    #[serde(default)]
    pub address: Option<String>,
    /// Per-call timeout; `None` keeps the bus library default.
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default, rename = "call_timeout_secs")]
    pub call_timeout: Option<Duration>,
}

impl BusConfig {
    fn validate(&self) -> Result<()> {
        if self.kind == BusKind::Address
            && self.address.as_deref().map_or(true, |a| a.trim().is_empty())
        {
            return Err(anyhow!("bus kind 'address' requires bus.address"));
        }
        if self.call_timeout == Some(Duration::ZERO) {
            return Err(anyhow!("bus.call_timeout_secs must be positive"));
        }
        Ok(())
    }
}

/// Location and naming of the golden introspection fixtures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureConfig {
    #[serde(default = "default_fixture_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_fixture_prefix")]
    pub prefix: String,
    #[serde(default = "default_fixture_extension")]
    pub extension: String,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            directory: default_fixture_directory(),
            prefix: default_fixture_prefix(),
            extension: default_fixture_extension(),
        }
    }
}

impl FixtureConfig {
    fn validate(&self) -> Result<()> {
        if self.prefix.trim().is_empty() {
            return Err(anyhow!("fixtures.prefix must not be empty"));
        }
        if self.prefix.contains(['/', '\\']) || self.extension.contains(['/', '\\']) {
            return Err(anyhow!(
                "fixtures.prefix and fixtures.extension must not contain path separators"
            ));
        }
        Ok(())
    }
}

/// What to do about signals triggered by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalPolicy {
    /// Trigger only; delivery is not observed.
    Off,
    /// Observe delivery and warn when a signal does not arrive.
    #[default]
    Warn,
    /// Observe delivery and fail the run when a signal does not arrive.
    Require,
}

/// Signal verification settings.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    #[serde(default)]
    pub policy: SignalPolicy,
    /// How long to wait for each triggered signal.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_signal_timeout", rename = "timeout_ms")]
    pub timeout: Duration,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            policy: SignalPolicy::default(),
            timeout: default_signal_timeout(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Filter directive used when neither `SVCTEST_LOG` nor `RUST_LOG` is set.
    #[serde(default)]
    pub filter: Option<String>,
    /// JSON-lines transcript of every bus call.
    #[serde(default)]
    pub transcript: Option<PathBuf>,
}
