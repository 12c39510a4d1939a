use clap::Subcommand;

/// Batch commands.
#[derive(Clone, Debug, Subcommand)]
pub enum BatchCommands {
    /// List the groups of a batch.
    Groups { batch: String },
    /// List the runs of a batch.
    Results {
        batch: String,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Open or close a batch for new runs.
    SetActive {
        batch: String,
        #[arg(long, action = clap::ArgAction::Set)]
        active: bool,
    },
}
