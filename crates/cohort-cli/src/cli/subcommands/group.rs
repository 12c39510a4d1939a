use clap::Subcommand;

/// Group commands.
#[derive(Clone, Debug, Subcommand)]
pub enum GroupCommands {
    /// Show a group.
    Get { group: String },
    /// Close a group to new members.
    Finish { group: String },
    /// Show the group's session data and version.
    Session { group: String },
    /// Replace the group's session data if the version still matches.
    SetSession {
        group: String,
        #[arg(long)]
        version: u64,
        #[arg(long)]
        data: Option<String>,
    },
    /// Take a run out of its group.
    Leave { run: String },
    /// Move a run into another group of its batch.
    Reassign { run: String },
}
