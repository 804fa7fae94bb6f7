//! Test utilities for constructing records.

use crate::{Address, Amount, Asset, DomainId, StakePosition, ValidatorId, ValidatorRecord};

/// Deterministic address for an index.
pub fn test_address(index: u64) -> Address {
    Address::from_seed(&index.to_le_bytes())
}

/// Token asset for an index.
pub fn test_token(index: u64) -> Asset {
    Asset::Token(Address::from_seed(&[b"token".as_slice(), &index.to_le_bytes()].concat()))
}

/// Validator record with direct stake in one asset.
pub fn test_validator_record(
    id: u64,
    origin: DomainId,
    asset: Asset,
    stake: Amount,
) -> ValidatorRecord {
    let mut record = ValidatorRecord::new(
        ValidatorId(id),
        origin,
        Address::from_seed(&[b"custody".as_slice(), &id.to_le_bytes()].concat()),
        Address::from_seed(&[b"operator".as_slice(), &id.to_le_bytes()].concat()),
    );
    record.stakes.insert(
        asset,
        StakePosition {
            direct: stake,
            attested: None,
        },
    );
    record
}
