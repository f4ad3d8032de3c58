//! Fixed-depth incremental Poseidon Merkle tree of identity commitments.
//!
//! Internal nodes are cached level by level, so `insert` and `update` touch
//! exactly `depth` nodes and `root` is a lookup. Positions that were never
//! filled hash as the zero leaf `Poseidon(0)` and its per-level zero hashes.

use ark_bn254::Fr;
use serde::{Deserialize, Serialize};
use zensor_types::{FieldHash, ZensorError, ZensorResult, MAX_TREE_DEPTH};

use crate::poseidon::{
    field_hash_to_fr, fr_from_canonical, fr_to_field_hash, poseidon_hash1, poseidon_hash2,
};

/// Inclusion path for one leaf, captured against a specific root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipProof {
    pub leaf_index: usize,
    pub siblings: Vec<FieldHash>,
    /// `true` when the node on the path is the right child at that level.
    pub path_indices: Vec<bool>,
    pub root: FieldHash,
}

impl MembershipProof {
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }

    pub fn compute_root(&self, leaf: &FieldHash) -> Option<FieldHash> {
        if self.siblings.len() != self.path_indices.len() {
            return None;
        }

        let mut current = fr_from_canonical(leaf.as_bytes())?;
        for (sibling, is_right) in self.siblings.iter().zip(&self.path_indices) {
            let sibling = fr_from_canonical(sibling.as_bytes())?;
            current = if *is_right {
                poseidon_hash2(sibling, current)
            } else {
                poseidon_hash2(current, sibling)
            };
        }
        Some(fr_to_field_hash(&current))
    }

    pub fn verify(&self, leaf: &FieldHash) -> bool {
        self.compute_root(leaf).map(|r| r == self.root).unwrap_or(false)
    }
}

#[derive(Clone, Debug)]
pub struct MembershipTree {
    depth: usize,
    zero_values: Vec<Fr>,
    /// `levels[0]` holds the leaves, `levels[depth]` the root once any leaf exists.
    levels: Vec<Vec<Fr>>,
}

impl MembershipTree {
    pub fn new(depth: usize) -> ZensorResult<Self> {
        if depth == 0 || depth > MAX_TREE_DEPTH {
            return Err(ZensorError::Config(format!(
                "Tree depth must be between 1 and {}, got {}",
                MAX_TREE_DEPTH, depth
            )));
        }

        let mut zero_values = Vec::with_capacity(depth + 1);
        let mut current = zero_leaf();
        zero_values.push(current);
        for _ in 0..depth {
            current = poseidon_hash2(current, current);
            zero_values.push(current);
        }

        Ok(Self {
            depth,
            zero_values,
            levels: vec![Vec::new(); depth + 1],
        })
    }

    pub fn from_leaves<I>(depth: usize, leaves: I) -> ZensorResult<Self>
    where
        I: IntoIterator<Item = FieldHash>,
    {
        let mut tree = Self::new(depth)?;
        for leaf in leaves {
            tree.insert(leaf)?;
        }
        Ok(tree)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    pub fn insert(&mut self, commitment: FieldHash) -> ZensorResult<usize> {
        let leaf = field_hash_to_fr(&commitment)?;

        if self.len() as u64 >= self.capacity() {
            return Err(ZensorError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }

        let index = self.len();
        self.levels[0].push(leaf);
        self.recompute_path(index);
        Ok(index)
    }

    pub fn update(&mut self, index: usize, commitment: FieldHash) -> ZensorResult<()> {
        let leaf = field_hash_to_fr(&commitment)?;
        self.check_index(index)?;

        self.levels[0][index] = leaf;
        self.recompute_path(index);
        Ok(())
    }

    /// Revokes a member. The slot keeps its index and hashes as empty.
    pub fn remove(&mut self, index: usize) -> ZensorResult<()> {
        self.update(index, fr_to_field_hash(&zero_leaf()))
    }

    pub fn root(&self) -> FieldHash {
        fr_to_field_hash(&self.root_field())
    }

    pub fn root_field(&self) -> Fr {
        self.levels[self.depth]
            .first()
            .copied()
            .unwrap_or(self.zero_values[self.depth])
    }

    pub fn leaf(&self, index: usize) -> Option<FieldHash> {
        self.levels[0].get(index).map(fr_to_field_hash)
    }

    pub fn leaves(&self) -> impl Iterator<Item = FieldHash> + '_ {
        self.levels[0].iter().map(fr_to_field_hash)
    }

    pub fn index_of(&self, commitment: &FieldHash) -> Option<usize> {
        let target = fr_from_canonical(commitment.as_bytes())?;
        self.levels[0].iter().position(|leaf| *leaf == target)
    }

    pub fn contains(&self, commitment: &FieldHash) -> bool {
        self.index_of(commitment).is_some()
    }

    pub fn proof_path(&self, index: usize) -> ZensorResult<MembershipProof> {
        self.check_index(index)?;

        let mut siblings = Vec::with_capacity(self.depth);
        let mut path_indices = Vec::with_capacity(self.depth);
        let mut idx = index;

        for level in 0..self.depth {
            siblings.push(fr_to_field_hash(&self.node(level, idx ^ 1)));
            path_indices.push(idx & 1 == 1);
            idx >>= 1;
        }

        Ok(MembershipProof {
            leaf_index: index,
            siblings,
            path_indices,
            root: self.root(),
        })
    }

    fn check_index(&self, index: usize) -> ZensorResult<()> {
        if index >= self.len() {
            return Err(ZensorError::UnknownLeaf {
                index: index as u64,
                len: self.len() as u64,
            });
        }
        Ok(())
    }

    fn node(&self, level: usize, index: usize) -> Fr {
        self.levels[level]
            .get(index)
            .copied()
            .unwrap_or(self.zero_values[level])
    }

    fn recompute_path(&mut self, index: usize) {
        let mut idx = index;
        for level in 0..self.depth {
            let (left, right) = if idx & 1 == 0 {
                (self.node(level, idx), self.node(level, idx + 1))
            } else {
                (self.node(level, idx - 1), self.node(level, idx))
            };
            let parent = poseidon_hash2(left, right);
            idx >>= 1;

            let next = &mut self.levels[level + 1];
            if idx < next.len() {
                next[idx] = parent;
            } else {
                next.push(parent);
            }
        }
    }
}

/// Value of an empty or revoked leaf.
pub fn zero_leaf() -> Fr {
    poseidon_hash1(Fr::from(0u64))
}

// ============================================================================
// Tests
// ============================================================================
