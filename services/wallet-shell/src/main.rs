mod auth;
mod commands;
mod shell;

use anyhow::Context;
use clap::Parser;
use shell::{Shell, TerminalContainer, spawn_feed_printer};
use std::path::PathBuf;
use std::sync::Arc;
use tf_chain_client::ChainConfig;
use tf_chain_tempo::TempoRpcClient;
use tf_storage::{KeyValueStore, RocksDbStore};
use tf_wallet_core::{
    AccountManager, ChainConnector, FeatureRegistry, PollingScheduler, Visibility,
    WalletServices, mount_features,
};
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "wallet-shell", version, about = "Terminal wallet for Tempo stablecoins")]
struct Args {
    /// JSON-RPC endpoint; defaults to the Moderato testnet.
    #[arg(long, env = "TEMPO_RPC_URL")]
    rpc_url: Option<String>,

    /// Directory for the encrypted key, imported tokens and history.
    #[arg(long, env = "TEMPO_WALLET_DATA_DIR", default_value = ".tempo-wallet")]
    data_dir: PathBuf,

    /// tracing filter directive, e.g. `info` or `tf_wallet_core=debug`.
    #[arg(long, env = "RUST_LOG", default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&args.log_level))
        .with_writer(std::io::stderr)
        .init();

    let mut config = ChainConfig::from_env()?;
    if let Some(rpc_url) = args.rpc_url {
        config.rpc_url = rpc_url;
    }

    let store: Arc<dyn KeyValueStore> = Arc::new(
        RocksDbStore::open_default(&args.data_dir)
            .with_context(|| format!("failed to open wallet data in {}", args.data_dir.display()))?,
    );
    info!(data_dir = %args.data_dir.display(), rpc = %config.rpc_url, "wallet-shell starting");
    println!("Tempo wallet (chain {})", config.chain_id);

    let accounts = AccountManager::new(store.clone());
    let mut prompt = auth::Prompt::new(BufReader::new(tokio::io::stdin()));
    let Some(key) = auth::authenticate(&accounts, &mut prompt).await? else {
        return Ok(());
    };
    println!("Unlocked {}", key.address());

    let client = TempoRpcClient::connect(&config, key.into_signer())?;
    let connector = ChainConnector::new(Arc::new(client), config.clone());

    let (visibility, visibility_rx) = watch::channel(Visibility::Visible);
    let scheduler = Arc::new(PollingScheduler::spawn(config.poll_interval, visibility_rx));
    let services = WalletServices::new(connector, store, scheduler.clone());

    let registry = FeatureRegistry::new();
    let features = mount_features(&services, &registry);
    registry.set_container(Box::new(TerminalContainer));
    let printer = spawn_feed_printer(&services);

    let shell = Shell {
        services,
        registry,
        features,
        visibility,
    };
    let result = shell.run(prompt.into_reader()).await;

    scheduler.shutdown();
    printer.abort();
    info!("wallet-shell stopped");
    result
}
