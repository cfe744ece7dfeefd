use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use nitro::broadcast::BroadcastMode;
use nitro::builder::check_arg_count;
use nitro::context::{ClientContext, ContextConfig};

#[derive(Parser, Debug)]
#[command(name = "nitro-cli", version, about = "Client for the nitro slot-recording module")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transactions subcommands
    Tx {
        #[command(subcommand)]
        module: ModuleTx,
    },
}

#[derive(Subcommand, Debug)]
pub enum ModuleTx {
    /// nitro transactions subcommands
    Nitro {
        #[command(subcommand)]
        command: NitroTx,
    },
}

#[derive(Subcommand, Debug)]
pub enum NitroTx {
    /// Record nitro transactions and state root for a slot
    RecordTxs(RecordTxsArgs),
}

#[derive(Args, Debug)]
pub struct RecordTxsArgs {
    /// <slot> <root> [tx1 tx2 ...]: decimal slot, 64-char hex state root, hex transactions
    #[arg(value_name = "ARGS", num_args = 0.., allow_negative_numbers = true)]
    pub args: Vec<String>,

    #[command(flatten)]
    pub tx: TxFlags,
}

impl RecordTxsArgs {
    /// Counts positionals before resolving the signer, so short input is reported the same way
    /// whether or not a key is configured.
    pub fn client_context(&self) -> anyhow::Result<ClientContext> {
        check_arg_count(self.args.len())?;
        ClientContext::from_config(self.tx.clone().into()).context("unable to get context")
    }
}

/// Signing and broadcast options shared by tx commands.
#[derive(Args, Debug, Clone)]
pub struct TxFlags {
    /// Signer private key hex (else NITRO_PRIVATE_KEY, then a key file)
    #[arg(long)]
    pub from_key: Option<String>,
    /// File holding the signer private key hex (else NITRO_KEY_FILE, then ./nitro.key)
    #[arg(long)]
    pub key_file: Option<PathBuf>,
    /// Chain id bound into the signature (else NITRO_CHAIN_ID)
    #[arg(long)]
    pub chain_id: Option<String>,
    /// Node address host:port (else NITRO_NODE)
    #[arg(long)]
    pub node: Option<String>,
    #[arg(long, default_value_t = 0)]
    pub fees: u64,
    #[arg(long)]
    pub gas: Option<u64>,
    #[arg(long)]
    pub memo: Option<String>,
    /// Offline signing: account number (requires --sequence)
    #[arg(long, requires = "sequence")]
    pub account_number: Option<u64>,
    /// Offline signing: account sequence (requires --account-number)
    #[arg(long, requires = "account_number")]
    pub sequence: Option<u64>,
    /// sync waits for the node's acknowledgement, async returns after sending
    #[arg(long, default_value_t = BroadcastMode::Sync)]
    pub broadcast_mode: BroadcastMode,
    /// Print the unsigned transaction as JSON without signing or sending
    #[arg(long)]
    pub generate_only: bool,
    /// Reply timeout for the first attempt in milliseconds; doubles per retry
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl From<TxFlags> for ContextConfig {
    fn from(flags: TxFlags) -> Self {
        ContextConfig {
            private_key: flags.from_key,
            key_file: flags.key_file,
            chain_id: flags.chain_id,
            node: flags.node,
            broadcast_mode: flags.broadcast_mode,
            generate_only: flags.generate_only,
            fees: flags.fees,
            gas: flags.gas,
            memo: flags.memo,
            account_number: flags.account_number,
            sequence: flags.sequence,
            timeout: flags.timeout_ms.map(Duration::from_millis),
        }
    }
}
