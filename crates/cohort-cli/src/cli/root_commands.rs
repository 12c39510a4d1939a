use clap::{Args, Subcommand};

use crate::cli::subcommands::{BatchCommands, GroupCommands, RunCommands, WorkerCommands};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Create the result store and apply the schema.
    Init,
    /// Load a study, its components and batches from a TOML file.
    Seed(SeedArgs),
    /// Worker identities.
    Worker {
        #[command(subcommand)]
        action: WorkerCommands,
    },
    /// Study runs.
    Run {
        #[command(subcommand)]
        action: RunCommands,
    },
    /// Batches and their results.
    Batch {
        #[command(subcommand)]
        action: BatchCommands,
    },
    /// Groups and group session data.
    Group {
        #[command(subcommand)]
        action: GroupCommands,
    },
}

#[derive(Clone, Debug, Args)]
pub struct SeedArgs {
    /// Path to the seed TOML file.
    pub file: String,
}
