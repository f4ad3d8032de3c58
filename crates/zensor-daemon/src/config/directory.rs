use serde::{Deserialize, Serialize};
use std::time::Duration;
use super::constants::DEFAULT_DIRECTORY_TIMEOUT_SECS;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Group directory API base, e.g. `https://groups.example.org/api`.
    pub url: Option<String>,
    /// Dashboard used to build credential-join links.
    pub dashboard_url: Option<String>,
    pub timeout_secs: u64,
}

impl DirectoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: None,
            dashboard_url: None,
            timeout_secs: DEFAULT_DIRECTORY_TIMEOUT_SECS,
        }
    }
}
