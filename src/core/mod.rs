//! Foundational types: assets, ledger, clock, events, errors, digests.

pub mod asset;
pub mod clock;
pub mod error;
pub mod event;
pub mod hash;
pub mod ledger;
