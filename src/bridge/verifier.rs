use crate::core::hash::Digest32;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A validator's attestation over a release or relay digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSignature {
    pub validator: String,
    pub signature: Digest32,
}

/// Quorum policy for bridge releases and relayed messages.
///
/// A pluggable capability: transfer logic only asks "does this set of
/// signatures authorize this digest", never how. Swapping the threshold
/// policy, or the signature scheme itself, touches nothing else.
pub trait SignatureVerifier {
    fn verify(&self, digest: &Digest32, signatures: &[ValidatorSignature]) -> bool;
}

/// Keyed-digest quorum verification over a registered validator set.
///
/// Each registered validator holds key material shared with the bridge
/// operator. A signature counts only if it equals the keyed SHA-256 of
/// the validator's key and the digest, and each validator counts once;
/// the digest is authorized when distinct valid signers reach the
/// quorum. Unknown validators and malformed signatures are ignored, not
/// errors — the quorum check is the whole policy.
#[derive(Debug, Clone, Default)]
pub struct ThresholdVerifier {
    validators: HashMap<String, Vec<u8>>,
    quorum: usize,
}

impl ThresholdVerifier {
    pub fn new(quorum: usize) -> Self {
        Self {
            validators: HashMap::new(),
            quorum,
        }
    }

    pub fn register_validator(&mut self, name: impl Into<String>, key: impl Into<Vec<u8>>) {
        self.validators.insert(name.into(), key.into());
    }

    pub fn remove_validator(&mut self, name: &str) -> bool {
        self.validators.remove(name).is_some()
    }

    pub fn set_quorum(&mut self, quorum: usize) {
        self.quorum = quorum;
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }

    /// The signature a validator with `key` produces over `digest`.
    pub fn sign(key: &[u8], digest: &Digest32) -> Digest32 {
        Digest32::of_parts(&[key, digest.as_bytes()])
    }
}

impl SignatureVerifier for ThresholdVerifier {
    fn verify(&self, digest: &Digest32, signatures: &[ValidatorSignature]) -> bool {
        if self.quorum == 0 {
            return false;
        }
        let mut seen: Vec<&str> = Vec::new();
        let mut valid = 0usize;
        for sig in signatures {
            if seen.contains(&sig.validator.as_str()) {
                continue;
            }
            let Some(key) = self.validators.get(&sig.validator) else {
                continue;
            };
            if Self::sign(key, digest) == sig.signature {
                seen.push(&sig.validator);
                valid += 1;
                if valid >= self.quorum {
                    return true;
                }
            }
        }
        false
    }
}

/// Accepts any signature set. For demos and tests that exercise paths
/// other than quorum verification.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAcceptVerifier;

impl SignatureVerifier for AlwaysAcceptVerifier {
    fn verify(&self, _digest: &Digest32, _signatures: &[ValidatorSignature]) -> bool {
        true
    }
}
