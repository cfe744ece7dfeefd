use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::debug;
use nitro::account::{Account, AccountInfo, AccountQuery};
use nitro::context::ClientContext;
use nitro::msg::RecordRequest;
use nitro::tx::SignedTx;
use nitro::wire::{Frame, FrameType, TxAck, MAX_FRAME_LEN};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use secp256k1::{Keypair, SecretKey, SECP256K1};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

pub const CODE_OK: u32 = 0;
pub const CODE_BAD_SIGNATURE: u32 = 4;
pub const CODE_WRONG_SEQUENCE: u32 = 32;
pub const CODE_UNKNOWN_ACCOUNT: u32 = 9;

#[derive(Clone, Debug, Default)]
pub struct NodeState {
    pub accounts: HashMap<String, Account>,
    /// Accepted transactions in arrival order.
    pub accepted: Vec<SignedTx>,
    /// Incoming `Tx` frames to swallow before answering, to exercise client retries.
    pub drop_tx_frames: usize,
    /// Acks to swallow after applying the tx, so the client resends an already accepted tx.
    pub drop_acks: usize,
    pub frames_seen: usize,
}

impl NodeState {
    pub fn recorded(&self) -> Vec<RecordRequest> {
        self.accepted.iter().map(|tx| tx.tx.body.msg.clone()).collect()
    }
}

/// In-process node speaking the nitro datagram protocol on 127.0.0.1.
pub struct MockNode {
    pub addr: SocketAddr,
    state: Arc<Mutex<NodeState>>,
    task: JoinHandle<()>,
}

impl MockNode {
    pub async fn start(state: NodeState) -> Self {
        let sock = UdpSocket::bind("127.0.0.1:0").await.expect("bind mock node");
        let addr = sock.local_addr().expect("mock node addr");
        let state = Arc::new(Mutex::new(state));
        let task_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_FRAME_LEN];
            loop {
                let Ok((n, from)) = sock.recv_from(&mut buf).await else { break };
                let Ok(frame) = Frame::decode(&buf[..n]) else { continue };
                if let Some(reply) = handle_frame(&task_state, frame) {
                    let bytes = reply.encode().expect("encode reply");
                    let _ = sock.send_to(&bytes, from).await;
                }
            }
        });
        Self { addr, state, task }
    }

    pub fn snapshot(&self) -> NodeState {
        self.state.lock().expect("node state poisoned").clone()
    }

    /// Polls until `accepted` reaches `count` or the deadline passes.
    pub async fn wait_for_accepted(&self, count: usize, deadline: Duration) -> NodeState {
        let start = tokio::time::Instant::now();
        loop {
            let snap = self.snapshot();
            if snap.accepted.len() >= count || start.elapsed() > deadline {
                return snap;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl Drop for MockNode {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn handle_frame(state: &Arc<Mutex<NodeState>>, frame: Frame) -> Option<Frame> {
    let mut guard = state.lock().expect("node state poisoned");
    guard.frames_seen += 1;
    match frame.frame_type {
        FrameType::AccountQuery => {
            let query: AccountQuery = borsh::from_slice(&frame.payload).ok()?;
            let account = guard.accounts.get(&query.address).copied();
            let info = AccountInfo { address: query.address, account };
            Some(Frame::new(FrameType::AccountInfo, frame.nonce, borsh::to_vec(&info).ok()?))
        }
        FrameType::Tx => {
            if guard.drop_tx_frames > 0 {
                guard.drop_tx_frames -= 1;
                debug!("mock node dropping tx frame {}", frame.nonce);
                return None;
            }
            let tx = SignedTx::decode(&frame.payload).ok()?;
            let (code, log) = check_tx(&mut guard, &tx);
            if guard.drop_acks > 0 {
                guard.drop_acks -= 1;
                debug!("mock node dropping ack for nonce {}", frame.nonce);
                return None;
            }
            let ack = TxAck { tx_hash: tx.hash(), code, log };
            Some(Frame::new(FrameType::TxAck, frame.nonce, borsh::to_vec(&ack).ok()?))
        }
        FrameType::TxAck | FrameType::AccountInfo => None,
    }
}

fn check_tx(state: &mut NodeState, tx: &SignedTx) -> (u32, String) {
    if !tx.verify() {
        return (CODE_BAD_SIGNATURE, "signature verification failed".to_string());
    }
    // A resend of an accepted tx gets its original ack back
    let hash = tx.hash();
    if state.accepted.iter().any(|accepted| accepted.hash() == hash) {
        return (CODE_OK, String::new());
    }
    let sender = tx.tx.body.msg.sender.clone();
    let Some(account) = state.accounts.get_mut(&sender) else {
        return (CODE_UNKNOWN_ACCOUNT, format!("account {sender} not found"));
    };
    if tx.tx.auth_info.sequence != account.sequence {
        let log = format!("account sequence mismatch, expected {}, got {}", account.sequence, tx.tx.auth_info.sequence);
        return (CODE_WRONG_SEQUENCE, log);
    }
    account.sequence += 1;
    state.accepted.push(tx.clone());
    (CODE_OK, String::new())
}

pub fn deterministic_secret(seed: u64) -> SecretKey {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bytes = [0u8; 32];
    loop {
        rng.fill_bytes(&mut bytes);
        if let Ok(secret) = SecretKey::from_slice(&bytes) {
            return secret;
        }
    }
}

pub fn deterministic_keypair(seed: u64) -> Keypair {
    Keypair::from_secret_key(SECP256K1, &deterministic_secret(seed))
}

/// Signer context with short timeouts so failure paths finish quickly. Point `node` at a
/// [`MockNode`] before use.
pub fn test_context(seed: u64) -> ClientContext {
    let mut ctx = ClientContext::new(deterministic_keypair(seed));
    ctx.chain_id = "nitro-it".to_string();
    ctx.timeout = Duration::from_millis(100);
    ctx
}

pub fn registered(ctx: &ClientContext, account: Account) -> NodeState {
    let mut state = NodeState::default();
    state.accounts.insert(ctx.from_address.clone(), account);
    state
}

pub fn record_args(slot: u64, root: &str, txs: &[&str]) -> Vec<String> {
    let mut v = vec![slot.to_string(), root.to_string()];
    v.extend(txs.iter().map(|s| s.to_string()));
    v
}
