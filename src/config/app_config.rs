//! Application configuration, loaded from a YAML file with environment
//! overrides (`NODEWATCH_*`).

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

fn default_listen_address() -> String {
    "0.0.0.0:4622".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> i64 {
    5
}

fn default_job_timeout_secs() -> u64 {
    30 * 60
}

fn default_drain_timeout_secs() -> u64 {
    60
}

fn default_geo_api_url() -> String {
    "http://ip-api.com/json".to_string()
}

fn default_geo_cache_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_geo_pace_ms() -> u64 {
    // The free tier allows ~45 requests per minute.
    1500
}

/// Probe tuning shared by the three probe variants.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Per-attempt timeout in seconds.
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per probe before recording a failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,
}

impl ProbeConfig {
    /// The per-attempt timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_probe_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// Scheduler tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Deadline of a single job run, in seconds.
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// How long `stop` waits for in-flight jobs, in seconds.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

impl SchedulerConfig {
    /// The per-job deadline as a `Duration`.
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    /// The drain deadline as a `Duration`.
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            job_timeout_secs: default_job_timeout_secs(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

/// Geolocation oracle tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct GeoConfig {
    /// Base URL of the oracle.
    #[serde(default = "default_geo_api_url")]
    pub api_url: String,

    /// Cache time-to-live in seconds.
    #[serde(default = "default_geo_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Pause between bulk lookups in milliseconds.
    #[serde(default = "default_geo_pace_ms")]
    pub pace_ms: u64,
}

impl GeoConfig {
    /// The cache TTL as a `Duration`.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// The bulk pace as a `Duration`.
    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            api_url: default_geo_api_url(),
            cache_ttl_secs: default_geo_cache_ttl_secs(),
            pace_ms: default_geo_pace_ms(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// SQLite database URL, e.g. `sqlite://nodewatch.db`.
    pub database_url: String,

    /// Address the JSON-RPC server listens on.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Path to the bootstrap roster JSON file.
    pub bootstrap_roster_path: String,

    /// Path to the gRPC roster JSON file.
    pub grpc_roster_path: String,

    /// Probe tuning.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Scheduler tuning.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Geolocation tuning.
    #[serde(default)]
    pub geo: GeoConfig,
}

impl AppConfig {
    /// Reads the configuration file (default `config.yaml`) and applies
    /// `NODEWATCH_*` environment overrides.
    pub fn new(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(config_path.unwrap_or("config.yaml")))
            .add_source(Environment::with_prefix("NODEWATCH").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "database_url: \"sqlite::memory:\"\n\
             bootstrap_roster_path: \"rosters/bootstrap_nodes.json\"\n\
             grpc_roster_path: \"rosters/grpc_servers.json\"",
        )
        .unwrap();

        let config = AppConfig::new(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.listen_address, "0.0.0.0:4622");
        assert_eq!(config.probe.max_retries, 5);
        assert_eq!(config.probe.timeout(), Duration::from_secs(30));
        assert_eq!(config.scheduler.job_timeout(), Duration::from_secs(1800));
        assert_eq!(config.geo.pace(), Duration::from_millis(1500));
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "database_url: \"sqlite::memory:\"\n\
             listen_address: \"127.0.0.1:9000\"\n\
             bootstrap_roster_path: \"b.json\"\n\
             grpc_roster_path: \"g.json\"\n\
             probe:\n  timeout_secs: 5\n  max_retries: 2",
        )
        .unwrap();

        let config = AppConfig::new(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.listen_address, "127.0.0.1:9000");
        assert_eq!(config.probe.max_retries, 2);
        assert_eq!(config.probe.timeout(), Duration::from_secs(5));
    }
}
