use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use zensor_types::DEFAULT_TREE_DEPTH;
use super::constants::DEFAULT_GROUP_ID;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupsConfig {
    /// Group used by `/api/send-feedback` and `/api/get-feedback`.
    pub default_group: String,
    pub tree_depth: usize,
    /// Pull every configured group from the directory at startup.
    pub sync_on_start: bool,
    /// Accept `POST /api/groups/{id}/members` for locally managed groups.
    pub allow_registration: bool,
    /// Commitments loaded into each group at startup, hex or decimal.
    pub members: BTreeMap<String, Vec<String>>,
}

impl GroupsConfig {
    /// Every group id the daemon serves, default group first.
    pub fn group_ids(&self) -> Vec<String> {
        let mut ids = vec![self.default_group.clone()];
        ids.extend(
            self.members
                .keys()
                .filter(|id| **id != self.default_group)
                .cloned(),
        );
        ids
    }
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            default_group: DEFAULT_GROUP_ID.to_string(),
            tree_depth: DEFAULT_TREE_DEPTH,
            sync_on_start: false,
            allow_registration: true,
            members: BTreeMap::new(),
        }
    }
}
