//! Everything a command needs from its environment: signer, chain, node and tx options.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use secp256k1::Keypair;
use thiserror::Error;

use crate::account::Account;
use crate::broadcast::{BroadcastMode, NodeClient, DEFAULT_TIMEOUT};
use crate::pki::{address_of, keypair_from_hex, PubKey};
use crate::tx::Fee;

pub const DEFAULT_NODE: &str = "127.0.0.1:26657";
pub const DEFAULT_CHAIN_ID: &str = "nitro-local";

pub const ENV_PRIVATE_KEY: &str = "NITRO_PRIVATE_KEY";
pub const ENV_KEY_FILE: &str = "NITRO_KEY_FILE";
pub const ENV_NODE: &str = "NITRO_NODE";
pub const ENV_CHAIN_ID: &str = "NITRO_CHAIN_ID";

/// Dev key files looked up in the working directory when nothing else names a key.
const DEV_KEY_FILES: [&str; 2] = ["nitro.key", ".nitro.key"];

#[derive(Debug, Error)]
pub enum ContextError {
    #[error(
        "no private key provided: pass --from-key or --key-file, set {} or {}, or put the key hex in ./nitro.key",
        ENV_PRIVATE_KEY,
        ENV_KEY_FILE
    )]
    NoKey,
    #[error("invalid private key hex")]
    InvalidKey,
    #[error("unable to read key file {path}: {source}")]
    KeyFile { path: PathBuf, source: std::io::Error },
}

/// Raw settings as collected from flags; `None` falls back to env vars and defaults.
#[derive(Clone, Debug, Default)]
pub struct ContextConfig {
    pub private_key: Option<String>,
    pub key_file: Option<PathBuf>,
    pub chain_id: Option<String>,
    pub node: Option<String>,
    pub broadcast_mode: BroadcastMode,
    pub generate_only: bool,
    pub fees: u64,
    pub gas: Option<u64>,
    pub memo: Option<String>,
    pub account_number: Option<u64>,
    pub sequence: Option<u64>,
    pub timeout: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct ClientContext {
    /// Signing key; its address is the request sender.
    pub keypair: Keypair,
    /// Address derived from `keypair`.
    pub from_address: String,
    /// Bound into every sign doc, so a signature is only valid on this chain.
    pub chain_id: String,
    /// `host:port` of the node receiving transactions and account queries.
    pub node: String,
    pub broadcast_mode: BroadcastMode,
    /// Print the unsigned transaction instead of signing and sending it.
    pub generate_only: bool,
    pub fee: Fee,
    pub memo: String,
    /// Set for offline signing; otherwise the node is asked.
    pub account: Option<Account>,
    /// First-attempt reply timeout; doubles on each retry.
    pub timeout: Duration,
}

impl ClientContext {
    pub fn new(keypair: Keypair) -> Self {
        let from_address = address_of(&PubKey(keypair.public_key()));
        Self {
            keypair,
            from_address,
            chain_id: DEFAULT_CHAIN_ID.to_string(),
            node: DEFAULT_NODE.to_string(),
            broadcast_mode: BroadcastMode::default(),
            generate_only: false,
            fee: Fee::default(),
            memo: String::new(),
            account: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_config(config: ContextConfig) -> Result<Self, ContextError> {
        let sk_hex = resolve_key_hex(config.private_key.as_deref(), config.key_file.as_deref())?;
        let keypair = keypair_from_hex(&sk_hex).ok_or(ContextError::InvalidKey)?;

        let mut ctx = Self::new(keypair);
        ctx.chain_id = resolve_chain_id(config.chain_id);
        ctx.node = resolve_node(config.node);
        ctx.broadcast_mode = config.broadcast_mode;
        ctx.generate_only = config.generate_only;
        ctx.fee = Fee { amount: config.fees, gas_limit: config.gas.unwrap_or(ctx.fee.gas_limit) };
        ctx.memo = config.memo.unwrap_or_default();
        ctx.account = match (config.account_number, config.sequence) {
            (Some(account_number), Some(sequence)) => Some(Account { account_number, sequence }),
            _ => None,
        };
        if let Some(timeout) = config.timeout {
            ctx.timeout = timeout;
        }
        debug!("client context: from {}, chain {}, node {}", ctx.from_address, ctx.chain_id, ctx.node);
        Ok(ctx)
    }

    pub fn node_client(&self) -> NodeClient {
        NodeClient::new(self.node.clone()).with_timeout(self.timeout)
    }
}

/// Flag, then `NITRO_PRIVATE_KEY`, then key file (flag, `NITRO_KEY_FILE`, dev files).
pub fn resolve_key_hex(flag: Option<&str>, key_file: Option<&Path>) -> Result<String, ContextError> {
    if let Some(s) = flag {
        return Ok(s.trim().to_string());
    }
    if let Some(s) = non_empty_env(ENV_PRIVATE_KEY) {
        return Ok(s);
    }
    let named = key_file.map(Path::to_path_buf).or_else(|| non_empty_env(ENV_KEY_FILE).map(PathBuf::from));
    if let Some(path) = named {
        return read_key_file(&path);
    }
    for path in DEV_KEY_FILES {
        if let Ok(s) = std::fs::read_to_string(path) {
            let t = s.trim().to_string();
            if !t.is_empty() {
                return Ok(t);
            }
        }
    }
    Err(ContextError::NoKey)
}

pub fn resolve_node(flag: Option<String>) -> String {
    flag.or_else(|| non_empty_env(ENV_NODE)).unwrap_or_else(|| DEFAULT_NODE.to_string())
}

pub fn resolve_chain_id(flag: Option<String>) -> String {
    flag.or_else(|| non_empty_env(ENV_CHAIN_ID)).unwrap_or_else(|| DEFAULT_CHAIN_ID.to_string())
}

fn read_key_file(path: &Path) -> Result<String, ContextError> {
    let s = std::fs::read_to_string(path).map_err(|source| ContextError::KeyFile { path: path.to_path_buf(), source })?;
    let t = s.trim();
    if t.is_empty() {
        return Err(ContextError::NoKey);
    }
    Ok(t.to_string())
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
