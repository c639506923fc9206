//! Entry point for the `sender` binary.
//!
//! Reads a file as line-delimited records and delivers them to a `receiver`
//! over TCP.  All protocol work is delegated to the library; this file owns
//! only process setup (logging, argument parsing, reading the input).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use gbn_link::timer::TimerConfig;
use gbn_link::{connect, ArqConfig, Sender};

/// Send a file line by line using Go-Back-N.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Receiver host name or address.
    host: String,
    /// Receiver port.
    port: u16,
    /// File whose lines are sent, one record per line.
    filename: PathBuf,
    /// Go-Back-N window size (1..=128); must match the receiver's.
    window_size: usize,
    /// Wait for acknowledgements before resending the window.
    #[arg(long, default_value_t = 3000)]
    ack_timeout_ms: u64,
    /// Resends without progress before the connection is declared lost.
    #[arg(long, default_value_t = 10)]
    max_retransmissions: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let timers = TimerConfig {
        ack_timeout: Duration::from_millis(cli.ack_timeout_ms),
        max_retransmissions: cli.max_retransmissions,
        ..TimerConfig::default()
    };
    let config = ArqConfig::new(cli.window_size)?.with_timers(timers);

    let text = tokio::fs::read_to_string(&cli.filename)
        .await
        .with_context(|| format!("failed to read {}", cli.filename.display()))?;
    let records: Vec<Vec<u8>> = text.lines().map(|line| line.as_bytes().to_vec()).collect();
    log::info!("Sending {} records from {}", records.len(), cli.filename.display());

    let link = connect((cli.host.as_str(), cli.port), &config.timers)
        .await
        .with_context(|| format!("failed to connect to {}:{}", cli.host, cli.port))?;

    let mut sender = Sender::new(link, &config);
    let stats = sender.run(records).await.context("transfer failed")?;

    log::info!(
        "Done: {} frames sent, {} retransmitted, {} timeouts, {} rejects",
        stats.frames_sent,
        stats.retransmissions,
        stats.timeouts,
        stats.rejects_received
    );
    Ok(())
}
