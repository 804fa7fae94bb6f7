//! Merkle commitments for delegator reward allocations.
//!
//! An off-ledger process computes every delegator's share of a rewards
//! distribution, builds a binary Merkle tree over the share leaves and
//! publishes only the root. Each delegator later presents its own leaf,
//! index and sibling path.
//!
//! - Tree construction: O(n) hashes for n leaves
//! - Proof verification: O(log n) hashes

use crate::{Address, Bips, Hash};
use serde::{Deserialize, Serialize};

/// Merkle inclusion proof: sibling hashes from the leaf up to the root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Sibling hashes from leaf to root.
    ///
    /// siblings[0] is the immediate sibling of the leaf.
    pub siblings: Vec<Hash>,
}

impl MerkleProof {
    /// Create a proof from a sibling path.
    pub fn new(siblings: Vec<Hash>) -> Self {
        Self { siblings }
    }

    /// Verify that `leaf_hash` is the leaf at `index` under `root`.
    pub fn verify(&self, leaf_hash: &Hash, root: &Hash, index: u64) -> bool {
        // An index beyond the tree width can never be authenticated.
        if self.siblings.len() < 64 && index >> self.siblings.len() != 0 {
            return false;
        }

        let mut current = *leaf_hash;
        let mut index = index;

        for sibling in &self.siblings {
            current = if index % 2 == 0 {
                hash_pair(&current, sibling)
            } else {
                hash_pair(sibling, &current)
            };
            index /= 2;
        }

        current == *root
    }

    /// Get the depth of the tree this proof is for.
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }
}

/// Hash two child nodes to produce parent hash.
#[inline]
fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(left.as_bytes());
    data[32..].copy_from_slice(right.as_bytes());
    Hash::from_bytes(&data)
}

/// Build a Merkle tree from leaf hashes and generate proofs for all leaves.
///
/// Returns the root and one proof per leaf, in input order. Leaves are padded
/// to the next power of two with zero hashes. Returns `None` for an empty
/// leaf set.
pub fn build_merkle_tree_with_proofs(leaves: &[Hash]) -> Option<(Hash, Vec<MerkleProof>)> {
    if leaves.is_empty() {
        return None;
    }

    if leaves.len() == 1 {
        return Some((leaves[0], vec![MerkleProof::default()]));
    }

    let n = leaves.len().next_power_of_two();
    let depth = n.trailing_zeros() as usize;

    // Layout: [leaves (n), level 1 (n/2), level 2 (n/4), ..., root (1)]
    let mut tree = vec![Hash::ZERO; 2 * n - 1];
    tree[..leaves.len()].copy_from_slice(leaves);

    let mut level_start = 0;
    let mut level_size = n;

    for _ in 0..depth {
        let next_level_start = level_start + level_size;
        let next_level_size = level_size / 2;

        for i in 0..next_level_size {
            let left = &tree[level_start + 2 * i];
            let right = &tree[level_start + 2 * i + 1];
            tree[next_level_start + i] = hash_pair(left, right);
        }

        level_start = next_level_start;
        level_size = next_level_size;
    }

    let root = tree[tree.len() - 1];

    let proofs = (0..leaves.len())
        .map(|leaf_idx| {
            let mut siblings = Vec::with_capacity(depth);
            let mut level_start = 0;
            let mut level_size = n;
            let mut idx = leaf_idx;

            for _ in 0..depth {
                let sibling_idx = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
                siblings.push(tree[level_start + sibling_idx]);

                level_start += level_size;
                level_size /= 2;
                idx /= 2;
            }

            MerkleProof { siblings }
        })
        .collect();

    Some((root, proofs))
}

/// Leaf hash for a delegator's share of a distribution.
///
/// Domain-separated so a share leaf can never collide with an interior node.
pub fn delegator_share_leaf(delegator: &Address, share: Bips) -> Hash {
    Hash::from_parts(&[
        b"delegator-share",
        delegator.as_bytes(),
        &share.get().to_le_bytes(),
    ])
}
