//! Off-ledger construction of delegator allocations.

use xstake_types::{build_merkle_tree_with_proofs, DelegatorShare, Hash, MerkleProof};

/// A committed allocation: the root to publish and one proof per share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
    pub root: Hash,
    /// Proofs in the order of the input shares; a share's index in the input
    /// is its leaf index.
    pub proofs: Vec<MerkleProof>,
}

impl Commitment {
    /// Proof and leaf index for the share at `index`.
    pub fn proof(&self, index: usize) -> Option<(&MerkleProof, u64)> {
        self.proofs.get(index).map(|p| (p, index as u64))
    }
}

/// Commit to an allocation. Returns `None` for an empty allocation.
pub fn build_commitment(shares: &[DelegatorShare]) -> Option<Commitment> {
    let leaves: Vec<Hash> = shares.iter().map(DelegatorShare::leaf_hash).collect();
    let (root, proofs) = build_merkle_tree_with_proofs(&leaves)?;
    Some(Commitment { root, proofs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use xstake_test_helpers::test_address;
    use xstake_types::Bips;

    #[test]
    fn test_every_share_verifies() {
        let shares: Vec<DelegatorShare> = (0..3)
            .map(|i| DelegatorShare::new(test_address(i), Bips::saturating(3_000)))
            .collect();
        let commitment = build_commitment(&shares).unwrap();

        for (i, share) in shares.iter().enumerate() {
            let (proof, index) = commitment.proof(i).unwrap();
            assert!(proof.verify(&share.leaf_hash(), &commitment.root, index));
        }
        assert!(commitment.proof(3).is_none());
    }

    #[test]
    fn test_empty_allocation() {
        assert!(build_commitment(&[]).is_none());
    }
}
