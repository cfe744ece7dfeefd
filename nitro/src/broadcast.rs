//! Signing hand-off and transmission of record transactions to a node.

use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};

use crate::account::Account;
use crate::context::ClientContext;
use crate::msg::RecordRequest;
use crate::tx::{SignedTx, TxError, TxFactory, UnsignedTx};
use crate::wire::{Frame, FrameType, TxAck, WireError, MAX_FRAME_LEN};

pub const DEFAULT_ATTEMPTS: usize = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(300);

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encode(std::io::Error),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Tx(#[from] TxError),
    #[error("no reply from {node} after {attempts} attempt(s)")]
    Timeout { node: String, attempts: usize },
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
    #[error("account {0} not found on node")]
    AccountNotFound(String),
    #[error("tx {tx_hash} rejected with code {code}: {log}")]
    Rejected { tx_hash: String, code: u32, log: String },
    #[error("unable to write output: {0}")]
    Output(#[from] serde_json::Error),
}

/// How long to wait on the node after sending a transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastMode {
    /// Wait for the node's mempool acknowledgement.
    #[default]
    Sync,
    /// Send once and return immediately.
    Async,
}

impl fmt::Display for BroadcastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BroadcastMode::Sync => f.write_str("sync"),
            BroadcastMode::Async => f.write_str("async"),
        }
    }
}

impl FromStr for BroadcastMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(BroadcastMode::Sync),
            "async" => Ok(BroadcastMode::Async),
            other => Err(format!("unknown broadcast mode {other:?} (expected sync|async)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BroadcastResult {
    pub tx_hash: String,
    pub code: u32,
    pub raw_log: String,
    pub mode: BroadcastMode,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BroadcastOutcome {
    Generated(UnsignedTx),
    Broadcast(BroadcastResult),
}

#[allow(async_fn_in_trait)]
pub trait Broadcaster {
    async fn broadcast(&self, tx: &SignedTx) -> Result<BroadcastResult, BroadcastError>;
}

/// Request/reply over UDP with doubling per-attempt timeouts.
#[derive(Clone, Debug)]
pub struct NodeClient {
    node: String,
    timeout: Duration,
    attempts: usize,
}

impl NodeClient {
    pub fn new(node: impl Into<String>) -> Self {
        Self { node: node.into(), timeout: DEFAULT_TIMEOUT, attempts: DEFAULT_ATTEMPTS }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    /// Sends one frame without waiting for anything. Returns the nonce used.
    pub async fn send(&self, frame_type: FrameType, payload: Vec<u8>) -> Result<u64, BroadcastError> {
        let nonce: u64 = rand::random();
        let bytes = Frame::new(frame_type, nonce, payload).encode()?;
        let sock = UdpSocket::bind("0.0.0.0:0").await?;
        sock.send_to(&bytes, self.node.as_str()).await?;
        Ok(nonce)
    }

    /// Sends `frame_type` and waits for a `reply_type` frame carrying the same nonce.
    /// Unrelated or malformed datagrams are skipped until the attempt's deadline.
    pub async fn request(&self, frame_type: FrameType, payload: Vec<u8>, reply_type: FrameType) -> Result<Frame, BroadcastError> {
        let nonce: u64 = rand::random();
        let bytes = Frame::new(frame_type, nonce, payload).encode()?;
        let sock = UdpSocket::bind("0.0.0.0:0").await?;
        let mut buf = vec![0u8; MAX_FRAME_LEN];
        let mut timeout = self.timeout;

        for attempt in 0..self.attempts {
            sock.send_to(&bytes, self.node.as_str()).await?;
            let deadline = Instant::now() + timeout;
            loop {
                match timeout_at(deadline, sock.recv_from(&mut buf)).await {
                    Ok(Ok((n, _from))) => match Frame::decode(&buf[..n]) {
                        Ok(reply) if reply.frame_type == reply_type && reply.nonce == nonce => return Ok(reply),
                        Ok(reply) => debug!("ignoring {:?} frame with nonce {}", reply.frame_type, reply.nonce),
                        Err(e) => warn!("dropping malformed reply from {}: {e}", self.node),
                    },
                    Ok(Err(e)) => return Err(e.into()),
                    Err(_elapsed) => break,
                }
            }
            if attempt + 1 < self.attempts {
                timeout = timeout.saturating_mul(2);
                info!("no reply from {}, retrying (attempt {} of {})", self.node, attempt + 2, self.attempts);
            }
        }
        Err(BroadcastError::Timeout { node: self.node.clone(), attempts: self.attempts })
    }
}

/// Sends signed txs as `Tx` frames. In sync mode a lost ack makes the client resend the same
/// bytes, so the node must answer a tx hash it already accepted with that tx's original ack
/// rather than re-checking its sequence.
#[derive(Clone, Debug)]
pub struct NodeBroadcaster {
    client: NodeClient,
    mode: BroadcastMode,
}

impl NodeBroadcaster {
    pub fn new(client: NodeClient, mode: BroadcastMode) -> Self {
        Self { client, mode }
    }
}

impl Broadcaster for NodeBroadcaster {
    async fn broadcast(&self, tx: &SignedTx) -> Result<BroadcastResult, BroadcastError> {
        let tx_hash = tx.hash_hex();
        match self.mode {
            BroadcastMode::Async => {
                self.client.send(FrameType::Tx, tx.encode()).await?;
                info!("sent tx {tx_hash} to {} (async)", self.client.node());
                Ok(BroadcastResult { tx_hash, code: 0, raw_log: String::new(), mode: self.mode })
            }
            BroadcastMode::Sync => {
                let reply = self.client.request(FrameType::Tx, tx.encode(), FrameType::TxAck).await?;
                let ack: TxAck = borsh::from_slice(&reply.payload).map_err(BroadcastError::Encode)?;
                if ack.tx_hash != tx.hash() {
                    return Err(BroadcastError::UnexpectedReply(format!(
                        "ack for {} while waiting on {tx_hash}",
                        faster_hex::hex_string(&ack.tx_hash).to_uppercase()
                    )));
                }
                if ack.code != 0 {
                    return Err(BroadcastError::Rejected { tx_hash, code: ack.code, log: ack.log });
                }
                info!("tx {tx_hash} accepted by {}", self.client.node());
                Ok(BroadcastResult { tx_hash, code: ack.code, raw_log: ack.log, mode: self.mode })
            }
        }
    }
}

/// Either prints the unsigned transaction (`generate_only`) or signs it with the context key,
/// hands it to `broadcaster` and prints the result. Output is JSON, one document per call.
pub async fn generate_or_broadcast<B: Broadcaster, W: Write>(
    ctx: &ClientContext,
    factory: &TxFactory,
    msg: RecordRequest,
    broadcaster: &B,
    out: &mut W,
) -> Result<BroadcastOutcome, BroadcastError> {
    let unsigned = factory.build_unsigned(msg)?;
    if ctx.generate_only {
        serde_json::to_writer_pretty(&mut *out, &unsigned)?;
        writeln!(out)?;
        return Ok(BroadcastOutcome::Generated(unsigned));
    }

    let signed = factory.sign(unsigned, &ctx.keypair)?;
    let result = broadcaster.broadcast(&signed).await?;
    serde_json::to_writer_pretty(&mut *out, &result)?;
    writeln!(out)?;
    Ok(BroadcastOutcome::Broadcast(result))
}

/// Factory preloaded from the context's chain id, fee and memo.
pub fn factory_for(ctx: &ClientContext, account: Account) -> TxFactory {
    TxFactory::new(ctx.chain_id.clone()).with_account(account).with_fee(ctx.fee.clone()).with_memo(ctx.memo.clone())
}
