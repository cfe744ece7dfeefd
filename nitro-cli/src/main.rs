use anyhow::Result;
use clap::Parser;
use log::debug;
use nitro::account::NodeAccountRetriever;
use nitro::broadcast::NodeBroadcaster;

mod cli;

use cli::{Cli, Commands, ModuleTx, NitroTx, RecordTxsArgs};

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Tx { module: ModuleTx::Nitro { command: NitroTx::RecordTxs(args) } } => record_txs(args).await,
    }
}

async fn record_txs(args: RecordTxsArgs) -> Result<()> {
    let ctx = args.client_context()?;
    let client = ctx.node_client();
    // Only consulted when --account-number/--sequence are absent
    let accounts = NodeAccountRetriever::new(client.clone());
    let broadcaster = NodeBroadcaster::new(client, ctx.broadcast_mode);

    let outcome = nitro::command::record_txs(&ctx, &args.args, &accounts, &broadcaster, &mut std::io::stdout()).await?;
    debug!("record-txs finished: {outcome:?}");
    Ok(())
}
