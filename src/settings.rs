use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,
    #[serde(default)]
    pub coordination: CoordinationConfig,
    #[serde(default)]
    pub pump: PumpConfig,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Address for the Prometheus `/metrics` endpoint, e.g. "127.0.0.1:9190".
    /// Metrics are not served when unset.
    #[serde(default)]
    pub metrics_addr: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: Backend,
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Fs,
    Memory,
    Url,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CoordinationConfig {
    #[serde(default)]
    pub backend: CoordinationBackend,
    #[serde(default)]
    pub etcd_endpoints: Vec<String>,
    #[serde(default = "default_cluster_prefix")]
    pub cluster_prefix: String,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            backend: CoordinationBackend::default(),
            etcd_endpoints: Vec::new(),
            cluster_prefix: default_cluster_prefix(),
        }
    }
}

fn default_cluster_prefix() -> String {
    "/spillway".to_string()
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CoordinationBackend {
    /// In-process lock table. Single-node deployments and tests only.
    #[default]
    Local,
    Etcd,
}

/// Tuning knobs for the pump loops. The per-pool lookahead threshold is not
/// here; it arrives with each pool registration.
#[derive(Debug, Deserialize, Clone)]
pub struct PumpConfig {
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_pump_interval_ms")]
    pub pump_interval_ms: u64,
    #[serde(default = "default_lease_expiry_secs")]
    pub lease_expiry_secs: u64,
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_max_batch_size() -> usize {
    128
}
fn default_pump_interval_ms() -> u64 {
    3_000
}
fn default_lease_expiry_secs() -> u64 {
    15
}
fn default_publish_timeout_ms() -> u64 {
    5_000
}
fn default_shutdown_grace_ms() -> u64 {
    5_000
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            pump_interval_ms: default_pump_interval_ms(),
            lease_expiry_secs: default_lease_expiry_secs(),
            publish_timeout_ms: default_publish_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl PumpConfig {
    pub fn pump_interval(&self) -> Duration {
        Duration::from_millis(self.pump_interval_ms)
    }

    pub fn lease_expiry(&self) -> Duration {
        Duration::from_secs(self.lease_expiry_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let data = fs::read_to_string(p)?;
                let cfg: Self = toml::from_str(&data)?;
                Ok(cfg)
            }
            None => Ok(Self {
                storage: StorageConfig {
                    backend: Backend::Fs,
                    path: "/tmp/spillway".to_string(),
                },
                coordination: CoordinationConfig::default(),
                pump: PumpConfig::default(),
                log_format: LogFormat::default(),
                metrics_addr: None,
            }),
        }
    }
}
