//! Lock/release cross-chain bridging with replay protection.

pub mod transfer;
pub mod verifier;
