//! Token eligibility requirements.

use std::collections::BTreeMap;
use xstake_core::EligibilityOracle;
use xstake_types::{Amount, Asset, DomainId};

/// A service's published eligibility table: (token, chain) → minimum stake.
///
/// - Empty table: every validator is eligible.
/// - Matching (token, chain): eligible iff the stake meets the minimum.
/// - No matching key: ineligible, even if another entry would be satisfied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementTable {
    minimums: BTreeMap<(Asset, DomainId), Amount>,
}

impl RequirementTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the minimum for (token, chain).
    ///
    /// Returns the previous minimum, if any.
    pub fn set(&mut self, token: Asset, chain: DomainId, minimum: Amount) -> Option<Amount> {
        self.minimums.insert((token, chain), minimum)
    }

    /// Remove the requirement for (token, chain).
    pub fn remove(&mut self, token: &Asset, chain: DomainId) -> Option<Amount> {
        self.minimums.remove(&(*token, chain))
    }

    /// Minimum for (token, chain), if published.
    pub fn minimum(&self, token: &Asset, chain: DomainId) -> Option<Amount> {
        self.minimums.get(&(*token, chain)).copied()
    }

    /// Number of requirements.
    pub fn len(&self) -> usize {
        self.minimums.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.minimums.is_empty()
    }
}

impl EligibilityOracle for RequirementTable {
    fn check_eligibility(&self, token: &Asset, chain: DomainId, amount: Amount) -> bool {
        if self.minimums.is_empty() {
            return true;
        }
        self.minimum(token, chain)
            .is_some_and(|minimum| amount >= minimum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xstake_types::test_utils::test_token;

    #[test]
    fn test_empty_table_admits_everyone() {
        let table = RequirementTable::new();
        assert!(table.check_eligibility(&Asset::Native, DomainId(7), 0));
        assert!(table.check_eligibility(&test_token(1), DomainId(1), 1));
    }

    #[test]
    fn test_matching_key_checks_minimum() {
        let mut table = RequirementTable::new();
        table.set(test_token(1), DomainId(1), 100);

        assert!(table.check_eligibility(&test_token(1), DomainId(1), 100));
        assert!(table.check_eligibility(&test_token(1), DomainId(1), 1_000));
        assert!(!table.check_eligibility(&test_token(1), DomainId(1), 99));
    }

    #[test]
    fn test_missing_key_is_ineligible() {
        // Only (TokenA, Chain1, 100) is published.
        let mut table = RequirementTable::new();
        table.set(test_token(1), DomainId(1), 100);

        // TokenB on Chain1 with an amount that would satisfy TokenA.
        assert!(!table.check_eligibility(&test_token(2), DomainId(1), 1_000));
        // TokenA on another chain.
        assert!(!table.check_eligibility(&test_token(1), DomainId(2), 1_000));
    }

    #[test]
    fn test_set_replaces_minimum() {
        let mut table = RequirementTable::new();
        assert_eq!(table.set(Asset::Native, DomainId(1), 10), None);
        assert_eq!(table.set(Asset::Native, DomainId(1), 20), Some(10));
        assert_eq!(table.minimum(&Asset::Native, DomainId(1)), Some(20));
        assert_eq!(table.len(), 1);

        assert_eq!(table.remove(&Asset::Native, DomainId(1)), Some(20));
        assert!(table.is_empty());
    }
}
