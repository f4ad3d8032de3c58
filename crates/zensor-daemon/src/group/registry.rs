use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use zensor_crypto::MembershipTree;
use zensor_types::{FieldHash, ZensorError, ZensorResult};

use super::directory::GroupDirectoryClient;

struct GroupState {
    tree: MembershipTree,
    /// Oldest first; the back is the current root.
    roots: VecDeque<FieldHash>,
}

impl GroupState {
    fn new(tree: MembershipTree) -> Self {
        let mut roots = VecDeque::new();
        roots.push_back(tree.root());
        Self { tree, roots }
    }

    fn record_root(&mut self, limit: usize) -> bool {
        let root = self.tree.root();
        if self.roots.back() == Some(&root) {
            return false;
        }
        self.roots.push_back(root);
        while self.roots.len() > limit {
            self.roots.pop_front();
        }
        true
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub id: String,
    pub depth: usize,
    pub size: usize,
    pub root: FieldHash,
    /// Accepted roots, newest first.
    pub root_history: Vec<FieldHash>,
}

/// Membership trees for every served group.
///
/// Mutations take the write lock and push the resulting root onto the
/// group's bounded history; proofs are prepared under the read lock so a
/// path and its root always come from the same tree state.
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, GroupState>>,
    depth: usize,
    history_size: usize,
    directory: Option<GroupDirectoryClient>,
}

impl GroupRegistry {
    pub fn new(depth: usize, history_size: usize) -> ZensorResult<Self> {
        MembershipTree::new(depth)?;
        if history_size == 0 {
            return Err(ZensorError::Config("Root history size must be at least 1".into()));
        }

        Ok(Self {
            groups: RwLock::new(HashMap::new()),
            depth,
            history_size,
            directory: None,
        })
    }

    pub fn with_directory(mut self, directory: GroupDirectoryClient) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn directory(&self) -> Option<&GroupDirectoryClient> {
        self.directory.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn history_size(&self) -> usize {
        self.history_size
    }

    /// Creates an empty group. No-op when it already exists.
    pub async fn create_group(&self, group_id: &str) -> ZensorResult<()> {
        let mut groups = self.groups.write().await;
        if !groups.contains_key(group_id) {
            groups.insert(group_id.to_string(), GroupState::new(MembershipTree::new(self.depth)?));
            info!("Created group {}", group_id);
        }
        Ok(())
    }

    pub async fn contains_group(&self, group_id: &str) -> bool {
        self.groups.read().await.contains_key(group_id)
    }

    pub async fn group_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.groups.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Appends a member, creating the group if needed. Returns the leaf index.
    pub async fn add_member(&self, group_id: &str, commitment: FieldHash) -> ZensorResult<usize> {
        let mut groups = self.groups.write().await;
        let state = match groups.entry(group_id.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                entry.insert(GroupState::new(MembershipTree::new(self.depth)?))
            }
        };

        let index = state.tree.insert(commitment)?;
        state.record_root(self.history_size);
        debug!(group = group_id, index, root = %state.tree.root().short(), "Member added");
        Ok(index)
    }

    pub async fn update_member(
        &self,
        group_id: &str,
        index: usize,
        commitment: FieldHash,
    ) -> ZensorResult<()> {
        self.mutate(group_id, |tree| tree.update(index, commitment)).await
    }

    pub async fn remove_member(&self, group_id: &str, index: usize) -> ZensorResult<()> {
        self.mutate(group_id, |tree| tree.remove(index)).await
    }

    async fn mutate<F>(&self, group_id: &str, f: F) -> ZensorResult<()>
    where
        F: FnOnce(&mut MembershipTree) -> ZensorResult<()>,
    {
        let mut groups = self.groups.write().await;
        let state = groups
            .get_mut(group_id)
            .ok_or_else(|| ZensorError::GroupNotFound(group_id.to_string()))?;
        f(&mut state.tree)?;
        state.record_root(self.history_size);
        Ok(())
    }

    /// Rebuilds the group from a full member list. Returns whether the root changed.
    pub async fn replace_members(
        &self,
        group_id: &str,
        members: Vec<FieldHash>,
    ) -> ZensorResult<bool> {
        let tree = MembershipTree::from_leaves(self.depth, members)?;

        let mut groups = self.groups.write().await;
        match groups.get_mut(group_id) {
            Some(state) => {
                state.tree = tree;
                Ok(state.record_root(self.history_size))
            }
            None => {
                groups.insert(group_id.to_string(), GroupState::new(tree));
                Ok(true)
            }
        }
    }

    /// Pulls the member list from the group directory and rebuilds the tree.
    pub async fn sync_from_directory(&self, group_id: &str) -> ZensorResult<GroupSummary> {
        let directory = self
            .directory
            .as_ref()
            .ok_or_else(|| ZensorError::Config("No group directory configured".into()))?;

        let group = directory.get_group(group_id).await?;
        if group.tree_depth != self.depth {
            warn!(
                "Directory reports depth {} for {}, serving depth {}",
                group.tree_depth, group_id, self.depth
            );
        }

        let members = group.member_commitments()?;
        let count = members.len();
        let changed = self.replace_members(group_id, members).await?;
        info!(
            "Synced group {} from directory: {} members{}",
            group_id,
            count,
            if changed { ", new root" } else { "" }
        );

        self.summary(group_id)
            .await
            .ok_or_else(|| ZensorError::GroupNotFound(group_id.to_string()))
    }

    pub async fn root(&self, group_id: &str) -> Option<FieldHash> {
        self.groups.read().await.get(group_id).map(|s| s.tree.root())
    }

    /// Whether `root` is among the group's last `history_size` roots.
    pub async fn is_known_root(&self, group_id: &str, root: &FieldHash) -> bool {
        self.groups
            .read()
            .await
            .get(group_id)
            .map(|s| s.roots.contains(root))
            .unwrap_or(false)
    }

    pub async fn summary(&self, group_id: &str) -> Option<GroupSummary> {
        self.groups.read().await.get(group_id).map(|s| GroupSummary {
            id: group_id.to_string(),
            depth: s.tree.depth(),
            size: s.tree.len(),
            root: s.tree.root(),
            root_history: s.roots.iter().rev().copied().collect(),
        })
    }

    pub async fn members(&self, group_id: &str) -> Option<Vec<FieldHash>> {
        self.groups
            .read()
            .await
            .get(group_id)
            .map(|s| s.tree.leaves().collect())
    }

    /// Runs `f` against the group's tree under the read lock.
    pub async fn with_tree<R, F>(&self, group_id: &str, f: F) -> ZensorResult<R>
    where
        F: FnOnce(&MembershipTree) -> R,
    {
        let groups = self.groups.read().await;
        let state = groups
            .get(group_id)
            .ok_or_else(|| ZensorError::GroupNotFound(group_id.to_string()))?;
        Ok(f(&state.tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use zensor_crypto::{parse_field_hash, Identity};

    fn commitment(n: u64) -> FieldHash {
        parse_field_hash(&n.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_root_history_bounded() {
        let registry = GroupRegistry::new(4, 3).unwrap();
        registry.create_group("g").await.unwrap();
        let empty_root = registry.root("g").await.unwrap();

        registry.add_member("g", commitment(1)).await.unwrap();
        let first = registry.root("g").await.unwrap();
        registry.add_member("g", commitment(2)).await.unwrap();

        assert!(registry.is_known_root("g", &empty_root).await);
        assert!(registry.is_known_root("g", &first).await);

        registry.add_member("g", commitment(3)).await.unwrap();
        assert!(!registry.is_known_root("g", &empty_root).await);
        assert!(registry.is_known_root("g", &first).await);

        let summary = registry.summary("g").await.unwrap();
        assert_eq!(summary.size, 3);
        assert_eq!(summary.root_history.len(), 3);
        assert_eq!(summary.root_history[0], summary.root);
    }

    #[tokio::test]
    async fn test_unknown_group() {
        let registry = GroupRegistry::new(4, 8).unwrap();
        assert!(!registry.is_known_root("nope", &FieldHash::zero()).await);
        assert!(matches!(
            registry.remove_member("nope", 0).await,
            Err(ZensorError::GroupNotFound(_))
        ));
        assert!(matches!(
            registry.with_tree("nope", |t| t.len()).await,
            Err(ZensorError::GroupNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_replace_members_same_root_not_recorded() {
        let registry = GroupRegistry::new(4, 8).unwrap();
        let members = vec![commitment(1), commitment(2)];

        assert!(registry.replace_members("g", members.clone()).await.unwrap());
        assert!(!registry.replace_members("g", members).await.unwrap());
        assert_eq!(registry.summary("g").await.unwrap().root_history.len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_remove_change_root() {
        let registry = GroupRegistry::new(4, 8).unwrap();
        registry.add_member("g", commitment(1)).await.unwrap();
        let before = registry.root("g").await.unwrap();

        registry.update_member("g", 0, commitment(9)).await.unwrap();
        let updated = registry.root("g").await.unwrap();
        assert_ne!(before, updated);

        registry.remove_member("g", 0).await.unwrap();
        assert_ne!(registry.root("g").await.unwrap(), updated);
        assert!(matches!(
            registry.update_member("g", 5, commitment(1)).await,
            Err(ZensorError::UnknownLeaf { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_inserts_keep_history_consistent() {
        let registry = Arc::new(GroupRegistry::new(6, 64).unwrap());
        registry.create_group("g").await.unwrap();

        let handles: Vec<_> = (0..20u64)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.add_member("g", commitment(i + 1)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let summary = registry.summary("g").await.unwrap();
        assert_eq!(summary.size, 20);
        assert_eq!(summary.root_history.len(), 21);

        let identity = Identity::create(Some(b"late")).unwrap();
        let index = registry.add_member("g", identity.commitment()).await.unwrap();
        let path = registry
            .with_tree("g", |tree| tree.proof_path(index))
            .await
            .unwrap()
            .unwrap();
        assert!(path.verify(&identity.commitment()));
        assert_eq!(path.root, registry.root("g").await.unwrap());
    }

    #[tokio::test]
    async fn test_sync_without_directory() {
        let registry = GroupRegistry::new(4, 8).unwrap();
        assert!(matches!(
            registry.sync_from_directory("g").await,
            Err(ZensorError::Config(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_history_tracks_latest_roots(count in 1usize..12, history in 1usize..6) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let registry = GroupRegistry::new(4, history).unwrap();
                registry.create_group("g").await.unwrap();
                let mut roots = vec![registry.root("g").await.unwrap()];

                for i in 0..count {
                    registry.add_member("g", commitment(i as u64 + 1)).await.unwrap();
                    roots.push(registry.root("g").await.unwrap());
                }

                let summary = registry.summary("g").await.unwrap();
                let expected: Vec<FieldHash> = roots.iter().rev().take(history).copied().collect();
                assert_eq!(summary.root_history, expected);
                for (age, root) in roots.iter().rev().enumerate() {
                    assert_eq!(registry.is_known_root("g", root).await, age < history);
                }
            });
        }
    }
}