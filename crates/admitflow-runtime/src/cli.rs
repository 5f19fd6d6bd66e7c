//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::OnInvalid;

#[derive(Parser)]
#[command(name = "admitflow", about = "exactly-once, watermark-ordered event admission")]
pub struct Cli {
    /// TOML config file
    #[arg(long, short = 'c', global = true, env = "ADMITFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// UDS socket path (default: /tmp/admitflow-$USER/admitflow.sock)
    #[arg(long, short = 's', global = true)]
    pub socket_path: Option<String>,

    /// Log filter, e.g. "debug" or "admitflow_core=debug"
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Admit batches from newline-delimited JSON and print admitted events
    Replay(ReplayOpts),
    /// Serve admission over a Unix socket
    Serve,
    /// Send batches to a running server
    Submit(SubmitOpts),
    /// Print the server's current watermark
    Watermark,
}

#[derive(clap::Args, Default)]
pub struct ReplayOpts {
    /// Input file, one JSON array of events per line ("-" or omitted: stdin)
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    /// Print one summary object per batch instead of admitted events
    #[arg(long)]
    pub report: bool,

    /// What to do with a batch that fails validation
    #[arg(long, value_enum)]
    pub on_invalid: Option<OnInvalid>,
}

#[derive(clap::Args, Default)]
pub struct SubmitOpts {
    /// Input file, one JSON array of events per line ("-" or omitted: stdin)
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,
}
