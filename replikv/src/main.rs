//! replikv - Raft-replicated key-value store node.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use replikv::api::ApiServer;
use replikv::observability::{TracingConfig, init_tracing};
use replikv_cluster::{Node, NodeConfig};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// replikv - a replicated key-value store.
#[derive(Parser)]
#[command(name = "replikv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Set the HTTP bind address
    #[arg(long, default_value = "0.0.0.0:8000")]
    http_addr: String,

    /// Set the Raft bind address
    #[arg(long, default_value = "127.0.0.1:9000")]
    raft_addr: String,

    /// Set the HTTP address of a member to join
    #[arg(long)]
    join: Option<String>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Raft storage directory
    data_dir: Option<PathBuf>,
}

fn setup_logging(verbosity: u8) -> Result<()> {
    let filter = match verbosity {
        0 => "info,openraft=warn",
        1 => "debug,openraft=info",
        _ => "trace",
    };

    init_tracing(TracingConfig::from_env(filter))
}

fn node_config(cli: &Cli, data_dir: PathBuf) -> Result<NodeConfig> {
    let mut builder = NodeConfig::builder()
        .http_addr(cli.http_addr.clone())
        .raft_addr(cli.raft_addr.clone())
        .data_dir(data_dir);
    if let Some(join) = &cli.join {
        builder = builder.join_addr(join.clone());
    }
    builder.build().map_err(anyhow::Error::msg)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(data_dir) = cli.data_dir.clone() else {
        eprintln!("No Raft storage directory specified");
        eprintln!("{}", Cli::command().render_help());
        std::process::exit(1);
    };

    setup_logging(cli.verbose)?;

    let config = node_config(&cli, data_dir)?;
    let http_addr = config.http_bind_addr().map_err(anyhow::Error::msg)?;

    let node = match Node::start(config).await {
        Ok(node) => node,
        Err(e) => {
            tracing::error!(error = %e, "failed to start node");
            return Err(e).context("failed to start node");
        }
    };

    let listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("failed to bind HTTP address {http_addr}"))?;

    let server = ApiServer::new(node.store(), node.membership());
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let server_task = tokio::spawn(server.serve(listener, shutdown_rx));

    tracing::info!(
        http_addr = %cli.http_addr,
        raft_addr = %cli.raft_addr,
        "replikv started successfully"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("replikv exiting");

    let _ = shutdown_tx.send(());
    server_task.await.context("API server task failed")??;
    node.shutdown().await?;

    Ok(())
}
