//! admitflow: exactly-once, watermark-ordered event admission.
//! Replays batches from files, or serves admission over a Unix socket.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use clap::Parser;

mod cli;
mod client;
mod config;
mod replay;
mod server;

fn open_input(path: Option<&Path>) -> anyhow::Result<Box<dyn BufRead>> {
    match path {
        Some(p) if p != Path::new("-") => {
            let file = File::open(p).with_context(|| format!("cannot open {}", p.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        _ => Ok(Box::new(io::stdin().lock())),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    let config = config::Config::load(args.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            config.log_filter(args.log.as_deref()),
        ))
        .with_writer(io::stderr)
        .init();

    match args.command {
        cli::Command::Replay(opts) => {
            let input = open_input(opts.input.as_deref())?;
            let replay_opts = replay::ReplayOptions {
                report: opts.report,
                on_invalid: config.on_invalid(opts.on_invalid),
            };
            let mut buffer = replay::WallClockBuffer::new();
            replay::run_replay(&mut buffer, input, io::stdout().lock(), replay_opts)?;
        }
        cli::Command::Serve => {
            let socket_path = config.socket_path(args.socket_path);
            tracing::info!("admitflow server starting");
            server::serve(&socket_path).await?;
        }
        cli::Command::Submit(opts) => {
            let socket_path = config.socket_path(args.socket_path);
            let input = open_input(opts.input.as_deref())?;
            client::cmd_submit(&socket_path, input, io::stdout()).await?;
        }
        cli::Command::Watermark => {
            let socket_path = config.socket_path(args.socket_path);
            client::cmd_watermark(&socket_path).await?;
        }
    }

    Ok(())
}
