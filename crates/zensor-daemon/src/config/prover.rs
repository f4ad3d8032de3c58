use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use super::constants::{DEFAULT_REMOTE_TIMEOUT_SECS, DEFAULT_RETRY_MAX_ELAPSED_SECS};
use super::types::ProverBackendKind;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProverConfig {
    pub backend: ProverBackendKind,
    /// Base URL of the proving service when `backend = "remote"`.
    pub remote_url: Option<String>,
    pub request_timeout_secs: u64,
    pub retry_initial_interval_ms: u64,
    pub retry_max_elapsed_secs: u64,
    /// Defaults to `<data_dir>/zk-keys`.
    pub keys_dir: Option<PathBuf>,
    /// Run a trusted setup when no keys are found in `keys_dir`.
    pub generate_missing_keys: bool,
    /// Expose `POST /api/prove` so other daemons can use this one as their remote backend.
    pub serve_remote: bool,
}

impl ProverConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_initial_interval(&self) -> Duration {
        Duration::from_millis(self.retry_initial_interval_ms)
    }

    pub fn retry_max_elapsed(&self) -> Duration {
        Duration::from_secs(self.retry_max_elapsed_secs)
    }
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            backend: ProverBackendKind::Local,
            remote_url: None,
            request_timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
            retry_initial_interval_ms: 500,
            retry_max_elapsed_secs: DEFAULT_RETRY_MAX_ELAPSED_SECS,
            keys_dir: None,
            generate_missing_keys: true,
            serve_remote: false,
        }
    }
}
