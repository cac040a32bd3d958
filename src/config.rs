use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub poller: PollerConfig,
    pub storage: StorageConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    /// Hub snapshot document written by the remote fetcher.
    pub status_file: String,
    /// Directory of per-machine spoke documents (one ServerRecord each).
    /// Unset disables spoke merging.
    #[serde(default)]
    pub spoke_dir: Option<String>,
    pub interval_secs: u64,
    /// Spoke files older than this count as unreachable machines.
    #[serde(default = "default_spoke_stale_secs")]
    pub spoke_stale_secs: u64,
}

fn default_spoke_stale_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub aggregate_path: String,
    pub achievements_path: String,
    pub alias_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// How often to log app stats (cycles run, achievements awarded) at INFO level.
    pub stats_log_interval_secs: u64,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.poller.status_file.is_empty(),
            "poller.status_file must be non-empty"
        );
        anyhow::ensure!(
            self.poller.interval_secs > 0,
            "poller.interval_secs must be > 0, got {}",
            self.poller.interval_secs
        );
        anyhow::ensure!(
            self.poller.spoke_stale_secs > 0,
            "poller.spoke_stale_secs must be > 0, got {}",
            self.poller.spoke_stale_secs
        );
        anyhow::ensure!(
            !self.storage.aggregate_path.is_empty(),
            "storage.aggregate_path must be non-empty"
        );
        anyhow::ensure!(
            !self.storage.achievements_path.is_empty(),
            "storage.achievements_path must be non-empty"
        );
        anyhow::ensure!(
            !self.storage.alias_path.is_empty(),
            "storage.alias_path must be non-empty"
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        Ok(())
    }
}
