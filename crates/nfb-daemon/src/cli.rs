//! Command line interface

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Default location of the published snapshot
pub const DEFAULT_OUTPUT: &str = "tmp/feedback.json";

#[derive(Parser, Debug)]
#[command(name = "nfb-daemon", version, about = "Real-time mu-rhythm neurofeedback engine")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the feedback engine until interrupted
    Run(RunArgs),
    /// Print visible streams as a JSON array and exit
    ListStreams(ListArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Session JSON file (`device_frequency`, optional `feedback` overrides)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Snapshot file to publish
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Use an in-process simulated EEG stream instead of the network
    #[arg(long)]
    pub simulate: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Seconds to wait for streams to announce themselves
    #[arg(long, default_value_t = 2.0)]
    pub timeout: f64,

    /// List the simulated stream instead of network streams
    #[arg(long)]
    pub simulate: bool,
}

impl Cli {
    /// Log filter directive for the requested verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
