use clap::Subcommand;

/// Study run commands.
#[derive(Clone, Debug, Subcommand)]
pub enum RunCommands {
    /// Start a run for the worker holding the token.
    Start {
        #[arg(long)]
        study: String,
        #[arg(long)]
        batch: String,
        #[arg(long)]
        token: String,
    },
    /// Fetch the data of the component the run is at.
    Component { run: String, component: String },
    /// Submit a result for the current component.
    Submit {
        run: String,
        component: String,
        #[arg(long)]
        data: String,
    },
    /// Close the current component and move on.
    Next { run: String, component: String },
    /// Jump to a component (preview workers only).
    Navigate {
        run: String,
        /// Zero-based index among active components
        #[arg(long, conflicts_with = "previous")]
        index: Option<usize>,
        /// Go back to the previous active component
        #[arg(long)]
        previous: bool,
    },
    /// Abort a run.
    Abandon {
        run: String,
        #[arg(long)]
        message: Option<String>,
    },
    /// Mark a run as failed.
    Fail {
        run: String,
        #[arg(long)]
        reason: String,
    },
    /// Record that the run's client is alive.
    Heartbeat { run: String },
    /// Show a run and its component visits.
    Get { run: String },
}
