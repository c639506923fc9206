//! Entry point for the `receiver` binary.
//!
//! Listens for senders and writes every delivered record as one line to
//! stdout or `--output`.  Each connection is an independent session.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gbn_link::config::DEFAULT_WINDOW;
use gbn_link::{serve, ArqConfig};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Receive line-delimited records sent with Go-Back-N.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Port to listen on.
    port: u16,
    /// Go-Back-N window size (1..=128); must match the sender's.
    #[arg(long, default_value_t = DEFAULT_WINDOW)]
    window_size: usize,
    /// Append records to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = ArqConfig::new(cli.window_size)?;

    let listener = TcpListener::bind(("0.0.0.0", cli.port))
        .await
        .with_context(|| format!("failed to bind port {}", cli.port))?;

    let mut sink: Box<dyn AsyncWrite + Unpin + Send> = match &cli.output {
        Some(path) => Box::new(
            tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };

    let (reports_tx, mut reports) = mpsc::unbounded_channel();
    let server = tokio::spawn(serve(listener, config, reports_tx));

    loop {
        tokio::select! {
            report = reports.recv() => {
                let Some(report) = report else { break };
                for record in &report.records {
                    sink.write_all(record).await?;
                    sink.write_all(b"\n").await?;
                }
                sink.flush().await?;

                match report.outcome {
                    Ok(()) => log::info!(
                        "{}: {} records received ({} rejects sent)",
                        report.peer,
                        report.records.len(),
                        report.stats.rejects_sent
                    ),
                    Err(e) => log::warn!(
                        "{}: session failed after {} records: {e}",
                        report.peer,
                        report.records.len()
                    ),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down");
                break;
            }
        }
    }

    server.abort();
    if let Ok(Err(e)) = server.await {
        return Err(e).context("accept loop failed");
    }
    Ok(())
}
