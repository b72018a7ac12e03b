//! Command-line interface: a thin wrapper over [`crate::facade::Facade`]
//! and the worker entry point, standing in for an HTTP/RPC façade.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{GetCommand, ListCommand, RetryCommand, TriggerCommand, WorkerCommand};

/// Durable job-execution engine for user-defined pipelines.
#[derive(Debug, Parser, Clone)]
#[command(name = "pipeline-engine")]
#[command(author = "Pipeline Engine Contributors")]
#[command(version = "0.1.0")]
#[command(about = "A durable job-execution engine for user-defined pipelines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a worker process: claims and executes pending Runs, and scans
    /// for stuck Runs to recover.
    Worker(WorkerCommand),

    /// Trigger a new Run of a registered pipeline
    Trigger(TriggerCommand),

    /// List registered pipelines and their run-history summary
    List(ListCommand),

    /// Show one Run's status and the status of every one of its Steps
    Get(GetCommand),

    /// Retry a terminally-failed Run by creating a fresh Run
    Retry(RetryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
