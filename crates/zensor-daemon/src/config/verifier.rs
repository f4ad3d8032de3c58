use serde::{Deserialize, Serialize};
use zensor_types::DEFAULT_ROOT_HISTORY;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Number of recent roots per group accepted for new proofs, current root included.
    pub root_history_size: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            root_history_size: DEFAULT_ROOT_HISTORY,
        }
    }
}
