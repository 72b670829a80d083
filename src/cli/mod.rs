//! CLI module for the workflow engine
//!
//! - `serve`: HTTP API
//! - `run`: execute a workflow definition file once and print the record

pub mod run;
pub mod serve;

use clap::{Parser, Subcommand};

/// PMP Workflow Engine - chained prompt execution against LLM providers
#[derive(Parser)]
#[command(name = "pmp-workflow-engine")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve,

    /// Execute a workflow definition file with in-memory storage
    Run(run::RunArgs),
}
