//! The `MsgRecordTransactionData` state-mutation request and its field types.

use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::builder::{is_valid_hex, is_valid_state_root, ValidationError};

/// Index into the external ledger whose transactions are being recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[serde(transparent)]
pub struct Slot(pub u64);

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 64 hex characters encoding the 32-byte external state digest at a slot. Case is kept as given.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[serde(transparent)]
pub struct StateRoot(String);

impl StateRoot {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if is_valid_state_root(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ValidationError::InvalidStateRoot)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decoded digest bytes. `None` only for values that bypassed `parse` (e.g. deserialized ones).
    pub fn to_bytes(&self) -> Option<[u8; 32]> {
        let mut out = [0u8; 32];
        faster_hex::hex_decode(self.0.as_bytes(), &mut out).ok()?;
        Some(out)
    }
}

impl fmt::Display for StateRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex-encoded serialized external transaction. Any non-zero length is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[serde(transparent)]
pub struct TransactionPayload(String);

impl TransactionPayload {
    /// `index` is the payload's position in the request, reported back on failure.
    pub fn parse(raw: &str, index: usize) -> Result<Self, ValidationError> {
        if is_valid_hex(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ValidationError::InvalidTransactionData { index })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Records `transactions` (in on-chain order) and `root` for `slot`, sent by `sender`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct RecordRequest {
    pub sender: String,
    pub slot: Slot,
    pub root: StateRoot,
    pub transactions: Vec<TransactionPayload>,
}

impl RecordRequest {
    pub const TYPE_URL: &'static str = "/nitro.MsgRecordTransactionData";

    pub fn new(sender: impl Into<String>, slot: Slot, root: StateRoot, transactions: Vec<TransactionPayload>) -> Self {
        Self { sender: sender.into(), slot, root, transactions }
    }

    /// Accounts whose signatures the request requires.
    pub fn signers(&self) -> Vec<&str> {
        vec![self.sender.as_str()]
    }

    /// Stateless re-check of every field invariant. Values deserialized from JSON or borsh
    /// bypass the typed constructors, so the tx factory calls this before signing.
    pub fn validate_basic(&self) -> Result<(), ValidationError> {
        if self.sender.trim().is_empty() {
            return Err(ValidationError::MissingSender);
        }
        if !is_valid_state_root(self.root.as_str()) {
            return Err(ValidationError::InvalidStateRoot);
        }
        if let Some(index) = self.transactions.iter().position(|tx| !is_valid_hex(tx.as_str())) {
            return Err(ValidationError::InvalidTransactionData { index });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_root_keeps_case_and_decodes() {
        let raw = format!("{}{}", "AB".repeat(16), "cd".repeat(16));
        let root = StateRoot::parse(&raw).unwrap();
        assert_eq!(root.as_str(), raw);
        let bytes = root.to_bytes().unwrap();
        assert_eq!(bytes[0], 0xab);
        assert_eq!(bytes[31], 0xcd);
    }

    #[test]
    fn validate_basic_catches_values_that_skipped_constructors() {
        let json = format!(r#"{{"sender":"nitro1aa","slot":3,"root":"{}","transactions":["ff","nothex"]}}"#, "0".repeat(64));
        let req: RecordRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req.validate_basic(), Err(ValidationError::InvalidTransactionData { index: 1 }));

        let json = format!(r#"{{"sender":" ","slot":3,"root":"{}","transactions":[]}}"#, "0".repeat(64));
        let req: RecordRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req.validate_basic(), Err(ValidationError::MissingSender));

        let json = r#"{"sender":"nitro1aa","slot":3,"root":"abc","transactions":[]}"#;
        let req: RecordRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.validate_basic(), Err(ValidationError::InvalidStateRoot));
    }

    #[test]
    fn borsh_layout_is_stable_for_signing() {
        let req = RecordRequest::new(
            "s",
            Slot(1),
            StateRoot::parse(&"0".repeat(64)).unwrap(),
            vec![TransactionPayload::parse("ff", 0).unwrap()],
        );
        let bytes = borsh::to_vec(&req).unwrap();
        // sender: u32 len + 1 byte, slot: 8, root: 4 + 64, txs: 4 + (4 + 2)
        assert_eq!(bytes.len(), 5 + 8 + 68 + 4 + 6);
        let back: RecordRequest = borsh::from_slice(&bytes).unwrap();
        assert_eq!(back, req);
    }
}
