use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zensor_types::{ZensorError, ZensorResult, MAX_TREE_DEPTH};

use super::api::ApiConfig;
use super::constants::{IDENTITIES_DIR_NAME, KEYS_DIR_NAME, LEDGER_DIR_NAME};
use super::directory::DirectoryConfig;
use super::groups::GroupsConfig;
use super::logging::LoggingConfig;
use super::prover::ProverConfig;
use super::types::ProverBackendKind;
use super::verifier::VerifierConfig;
use crate::storage::StorageConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub data_dir: PathBuf,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
    pub prover: ProverConfig,
    pub verifier: VerifierConfig,
    pub groups: GroupsConfig,
    pub directory: DirectoryConfig,
    pub storage: StorageConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
            prover: ProverConfig::default(),
            verifier: VerifierConfig::default(),
            groups: GroupsConfig::default(),
            directory: DirectoryConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".zensor"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/zensor"))
}

impl DaemonConfig {
    pub fn load(path: impl AsRef<Path>) -> ZensorResult<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ZensorError::Config(format!("Failed to read config: {}", e)))?;

            toml::from_str(&contents)
                .map_err(|e| ZensorError::Config(format!("Failed to parse config: {}", e)))?
        } else {
            info!("Config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> ZensorResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ZensorError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ZensorError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path.as_ref(), contents)
            .map_err(|e| ZensorError::Config(format!("Failed to write config: {}", e)))?;

        info!("Configuration saved to {:?}", path.as_ref());
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("ZENSOR_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Ok(port) = std::env::var("ZENSOR_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        if let Ok(bind) = std::env::var("ZENSOR_API_BIND") {
            if let Ok(addr) = bind.parse() {
                self.api.bind_address = addr;
                if bind != "127.0.0.1" && bind != "::1" {
                    warn!(
                        "API server binding to non-localhost address: {}. Ensure proper firewall rules.",
                        bind
                    );
                }
            }
        }

        if let Ok(level) = std::env::var("ZENSOR_LOG_LEVEL") {
            self.logging.level = level.parse().unwrap_or_default();
        }

        if std::env::var("ZENSOR_LOG_JSON").is_ok() {
            self.logging.json = true;
        }

        if let Ok(backend) = std::env::var("ZENSOR_PROVER_BACKEND") {
            match backend.parse() {
                Ok(kind) => self.prover.backend = kind,
                Err(e) => warn!("Ignoring ZENSOR_PROVER_BACKEND: {}", e),
            }
        }

        if let Ok(url) = std::env::var("ZENSOR_PROVER_URL") {
            self.prover.remote_url = Some(url);
        }

        if let Ok(k) = std::env::var("ZENSOR_ROOT_HISTORY") {
            if let Ok(k) = k.parse() {
                self.verifier.root_history_size = k;
            }
        }

        if let Ok(group) = std::env::var("ZENSOR_GROUP_ID") {
            self.groups.default_group = group;
        }

        if let Ok(url) = std::env::var("ZENSOR_DIRECTORY_URL") {
            self.directory.url = Some(url);
        }
    }

    pub fn validate(&self) -> ZensorResult<()> {
        if self.api.enabled && self.api.port == 0 {
            return Err(ZensorError::Config("API port cannot be 0".into()));
        }

        if self.api.max_body_size < 1024 {
            return Err(ZensorError::Config(
                "Max body size must be at least 1024 bytes".into(),
            ));
        }

        if self.verifier.root_history_size == 0 {
            return Err(ZensorError::Config(
                "verifier.root_history_size must be at least 1".into(),
            ));
        }

        if self.groups.tree_depth == 0 || self.groups.tree_depth > MAX_TREE_DEPTH {
            return Err(ZensorError::Config(format!(
                "groups.tree_depth must be between 1 and {}",
                MAX_TREE_DEPTH
            )));
        }

        if self.groups.default_group.trim().is_empty() {
            return Err(ZensorError::Config("groups.default_group cannot be empty".into()));
        }

        if self.prover.backend == ProverBackendKind::Remote {
            match &self.prover.remote_url {
                None => {
                    return Err(ZensorError::Config(
                        "Prover backend is 'remote' but prover.remote_url is not set".into(),
                    ));
                }
                Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                    return Err(ZensorError::Config(format!(
                        "Invalid prover URL: {}",
                        url
                    )));
                }
                Some(_) => {}
            }

            if self.prover.serve_remote {
                warn!("prover.serve_remote is set on a daemon that proves remotely");
            }
        }

        if self.prover.request_timeout_secs == 0 {
            return Err(ZensorError::Config(
                "prover.request_timeout_secs must be positive".into(),
            ));
        }

        if self.groups.sync_on_start && self.directory.url.is_none() {
            return Err(ZensorError::Config(
                "groups.sync_on_start requires directory.url".into(),
            ));
        }

        Ok(())
    }

    pub fn api_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.api.bind_address, self.api.port)
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.prover
            .keys_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join(KEYS_DIR_NAME))
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(LEDGER_DIR_NAME))
    }

    pub fn identities_dir(&self) -> PathBuf {
        self.data_dir.join(IDENTITIES_DIR_NAME)
    }
}
