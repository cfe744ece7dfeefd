//! Validation of raw `record-txs` arguments and assembly of a [`RecordRequest`].

use itertools::Itertools;
use log::debug;
use thiserror::Error;

use crate::msg::{RecordRequest, Slot, StateRoot, TransactionPayload};

/// Positional arguments required before the optional transaction list: slot and root.
pub const MIN_ARGS: usize = 2;

pub const STATE_ROOT_HEX_LEN: usize = 64;

/// Coarse classification used by callers to map failures onto exit behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Argument,
    Format,
    Upstream,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("requires at least {expected} arg(s), only received {received}")]
    MissingArguments { expected: usize, received: usize },
    #[error("unable to parse slot: {reason} ({raw:?})")]
    InvalidSlot { raw: String, reason: String },
    #[error("invalid state root format")]
    InvalidStateRoot,
    #[error("transaction data needs to be hex")]
    InvalidTransactionData { index: usize },
    #[error("request sender must not be empty")]
    MissingSender,
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::MissingArguments { .. } | ValidationError::InvalidSlot { .. } | ValidationError::MissingSender => {
                ErrorKind::Argument
            }
            ValidationError::InvalidStateRoot | ValidationError::InvalidTransactionData { .. } => ErrorKind::Format,
        }
    }
}

/// Non-empty and made only of `[0-9a-fA-F]`. No sign, no `0x` prefix, no length cap.
pub fn is_valid_hex(input: &str) -> bool {
    !input.is_empty() && input.bytes().all(|b| b.is_ascii_hexdigit())
}

/// A state root is a 64 character hex string.
pub fn is_valid_state_root(input: &str) -> bool {
    input.len() == STATE_ROOT_HEX_LEN && is_valid_hex(input)
}

/// Unsigned base-10 `u64`. `str::parse` tolerates a leading `+`, which is rejected here.
pub fn parse_slot(raw: &str) -> Result<Slot, ValidationError> {
    if raw.starts_with('+') {
        return Err(ValidationError::InvalidSlot { raw: raw.to_string(), reason: "sign prefix not allowed".to_string() });
    }
    raw.parse::<u64>().map(Slot).map_err(|e| ValidationError::InvalidSlot { raw: raw.to_string(), reason: e.to_string() })
}

/// Positional count check, run by `build` and by callers that must reject short input early.
pub fn check_arg_count(received: usize) -> Result<(), ValidationError> {
    if received < MIN_ARGS {
        return Err(ValidationError::MissingArguments { expected: MIN_ARGS, received });
    }
    Ok(())
}

/// Turns raw `record-txs` arguments into a [`RecordRequest`], stopping at the first invalid input.
#[derive(Clone, Debug)]
pub struct RecordRequestBuilder {
    signer: String,
}

impl RecordRequestBuilder {
    pub fn new(signer: impl Into<String>) -> Self {
        Self { signer: signer.into() }
    }

    /// `args` is the positional list as typed: `<slot> <root> [tx...]`.
    pub fn build<S: AsRef<str>>(&self, args: &[S]) -> Result<RecordRequest, ValidationError> {
        check_arg_count(args.len())?;
        self.build_parts(args[0].as_ref(), args[1].as_ref(), &args[MIN_ARGS..])
    }

    pub fn build_parts<S: AsRef<str>>(&self, raw_slot: &str, raw_root: &str, raw_txs: &[S]) -> Result<RecordRequest, ValidationError> {
        let slot = parse_slot(raw_slot)?;
        let root = StateRoot::parse(raw_root)?;

        let mut transactions = Vec::with_capacity(raw_txs.len());
        for (index, raw) in raw_txs.iter().enumerate() {
            transactions.push(TransactionPayload::parse(raw.as_ref(), index)?);
        }

        debug!("record request: slot {slot}, root {root}, txs [{}]", transactions.iter().join(", "));
        Ok(RecordRequest::new(self.signer.clone(), slot, root, transactions))
    }
}

/// Shorthand for `RecordRequestBuilder::new(signer).build(args)`.
pub fn build<S: AsRef<str>>(signer: &str, args: &[S]) -> Result<RecordRequest, ValidationError> {
    RecordRequestBuilder::new(signer).build(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "nitro1f00d";

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn requires_slot_and_root() {
        assert_eq!(build::<&str>(ADDR, &[]), Err(ValidationError::MissingArguments { expected: 2, received: 0 }));
        let err = build(ADDR, &["42"]).unwrap_err();
        assert_eq!(err, ValidationError::MissingArguments { expected: 2, received: 1 });
        assert_eq!(err.kind(), ErrorKind::Argument);
        assert_eq!(check_arg_count(1), Err(ValidationError::MissingArguments { expected: 2, received: 1 }));
        assert_eq!(check_arg_count(2), Ok(()));
    }

    #[test]
    fn slot_accepts_full_u64_range() {
        assert_eq!(parse_slot("0"), Ok(Slot(0)));
        assert_eq!(parse_slot("18446744073709551615"), Ok(Slot(u64::MAX)));
        assert_eq!(parse_slot("007"), Ok(Slot(7)));
    }

    #[test]
    fn slot_rejects_signs_overflow_and_junk() {
        for raw in ["-1", "+1", "18446744073709551616", "", "4 2", "0x10", "1e3", "ten"] {
            let err = parse_slot(raw).unwrap_err();
            assert!(matches!(err, ValidationError::InvalidSlot { .. }), "{raw:?}");
            assert_eq!(err.kind(), ErrorKind::Argument);
            assert!(err.to_string().starts_with("unable to parse slot"));
        }
    }

    #[test]
    fn root_must_be_exactly_64_hex_chars() {
        assert!(is_valid_state_root(&"0".repeat(64)));
        assert!(is_valid_state_root(&"aF".repeat(32)));
        assert!(!is_valid_state_root(&"0".repeat(63)));
        assert!(!is_valid_state_root(&"0".repeat(65)));
        assert!(!is_valid_state_root(&format!("{}g", "0".repeat(63))));
        assert!(!is_valid_state_root(&format!("-{}", "0".repeat(63))));

        let err = build(ADDR, &args(&["1", &"a".repeat(63)])).unwrap_err();
        assert_eq!(err, ValidationError::InvalidStateRoot);
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(err.to_string(), "invalid state root format");
    }

    #[test]
    fn tx_hex_has_no_length_cap() {
        assert!(is_valid_hex("deadbeef"));
        assert!(is_valid_hex("DEADbeef"));
        assert!(is_valid_hex(&"f".repeat(4096)));
        assert!(!is_valid_hex("deadbeef "));
        assert!(!is_valid_hex("xyz"));
        assert!(!is_valid_hex("+ff"));
        assert!(!is_valid_hex("-ff"));
        assert!(!is_valid_hex("0xff"));
        assert!(!is_valid_hex(""));
    }

    #[test]
    fn checks_run_in_order() {
        // bad slot wins over bad root and bad txs
        let err = build(ADDR, &args(&["x", "nope", "zz"])).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidSlot { .. }));
        // bad root wins over bad txs
        let err = build(ADDR, &args(&["1", "nope", "zz"])).unwrap_err();
        assert_eq!(err, ValidationError::InvalidStateRoot);
    }

    #[test]
    fn first_bad_tx_aborts() {
        let root = "a".repeat(64);
        let err = build(ADDR, &args(&["42", &root, "ff", "zz", "also-bad"])).unwrap_err();
        assert_eq!(err, ValidationError::InvalidTransactionData { index: 1 });
        assert_eq!(err.to_string(), "transaction data needs to be hex");

        let err = build(ADDR, &args(&["42", &root, "ff", "zz", "00"])).unwrap_err();
        assert_eq!(err, ValidationError::InvalidTransactionData { index: 1 });
    }

    #[test]
    fn preserves_tx_order_and_text() {
        let root = "A".repeat(64);
        let req = build(ADDR, &args(&["42", &root, "ff", "00ab", "DeAd"])).unwrap();
        assert_eq!(req.sender, ADDR);
        assert_eq!(req.slot, Slot(42));
        assert_eq!(req.root.as_str(), root);
        let txs: Vec<&str> = req.transactions.iter().map(|t| t.as_str()).collect();
        assert_eq!(txs, vec!["ff", "00ab", "DeAd"]);
    }

    #[test]
    fn end_to_end_cases() {
        let root = "a".repeat(64);
        let req = build(ADDR, &args(&["42", &root, "ff", "00ab"])).unwrap();
        assert_eq!(
            req,
            RecordRequest::new(
                ADDR,
                Slot(42),
                StateRoot::parse(&root).unwrap(),
                vec![TransactionPayload::parse("ff", 0).unwrap(), TransactionPayload::parse("00ab", 1).unwrap()],
            )
        );

        let empty = build(ADDR, &args(&["42", &root])).unwrap();
        assert!(empty.transactions.is_empty());

        assert_eq!(build(ADDR, &args(&["42", &"a".repeat(63)])).unwrap_err().kind(), ErrorKind::Format);
        assert_eq!(build(ADDR, &args(&["-1", &root])).unwrap_err().kind(), ErrorKind::Argument);
        assert_eq!(build(ADDR, &args(&["42", &root, "zz"])).unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn build_parts_matches_build() {
        let root = "0".repeat(64);
        let via_parts = RecordRequestBuilder::new(ADDR).build_parts("9", &root, &["01"]).unwrap();
        let via_args = build(ADDR, &args(&["9", &root, "01"])).unwrap();
        assert_eq!(via_parts, via_args);
    }
}
