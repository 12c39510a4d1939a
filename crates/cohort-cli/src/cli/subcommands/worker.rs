use clap::Subcommand;

/// Worker identity commands.
#[derive(Clone, Debug, Subcommand)]
pub enum WorkerCommands {
    /// Register a worker and print its token.
    Create {
        /// preview, one_time, personal or platform
        #[arg(long)]
        kind: String,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        platform_id: Option<String>,
    },
}
