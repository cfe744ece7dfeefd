//! Datagram framing between the client and a nitro node.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const WIRE_VERSION: u8 = 1;

// version(1) | type(1) | nonce(8) | payload_len(4)
const HEADER_LEN: usize = 1 + 1 + 8 + 4;
const CHECKSUM_LEN: usize = 32;

/// Upper bound on a single UDP datagram the node will accept.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Tx = 0,
    TxAck = 1,
    AccountQuery = 2,
    AccountInfo = 3,
}

impl FrameType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(FrameType::Tx),
            1 => Some(FrameType::TxAck),
            2 => Some(FrameType::AccountQuery),
            3 => Some(FrameType::AccountInfo),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("frame too short: {0} bytes")]
    Truncated(usize),
    #[error("unsupported frame version {0}")]
    Version(u8),
    #[error("unknown frame type {0}")]
    UnknownType(u8),
    #[error("payload length {declared} does not match frame ({actual} bytes available)")]
    Length { declared: usize, actual: usize },
    #[error("frame checksum mismatch")]
    Checksum,
    #[error("frame exceeds {} bytes", MAX_FRAME_LEN)]
    TooLarge,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    /// Chosen by the requester and echoed in the reply.
    pub nonce: u64,
    pub payload: Vec<u8>,
}

/// Node reply to a `Tx` frame. `code` 0 means accepted into the mempool.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TxAck {
    pub tx_hash: [u8; 32],
    pub code: u32,
    pub log: String,
}

impl Frame {
    pub fn new(frame_type: FrameType, nonce: u64, payload: Vec<u8>) -> Self {
        Self { frame_type, nonce, payload }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let total = HEADER_LEN + self.payload.len() + CHECKSUM_LEN;
        if total > MAX_FRAME_LEN {
            return Err(WireError::TooLarge);
        }
        let mut v = Vec::with_capacity(total);
        v.push(WIRE_VERSION);
        v.push(self.frame_type as u8);
        v.extend_from_slice(&self.nonce.to_le_bytes());
        v.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        v.extend_from_slice(&self.payload);
        let checksum = Sha256::digest(&v);
        v.extend_from_slice(&checksum);
        Ok(v)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(WireError::Truncated(bytes.len()));
        }
        if bytes[0] != WIRE_VERSION {
            return Err(WireError::Version(bytes[0]));
        }
        let frame_type = FrameType::from_u8(bytes[1]).ok_or(WireError::UnknownType(bytes[1]))?;
        let nonce = u64::from_le_bytes(bytes[2..10].try_into().expect("8-byte slice"));
        let declared = u32::from_le_bytes(bytes[10..14].try_into().expect("4-byte slice")) as usize;
        let actual = bytes.len() - HEADER_LEN - CHECKSUM_LEN;
        if declared != actual {
            return Err(WireError::Length { declared, actual });
        }
        let body_end = HEADER_LEN + declared;
        if Sha256::digest(&bytes[..body_end]).as_slice() != &bytes[body_end..] {
            return Err(WireError::Checksum);
        }
        Ok(Self { frame_type, nonce, payload: bytes[HEADER_LEN..body_end].to_vec() })
    }
}
