use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;
use crate::context::AppContext;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(command: Commands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match command {
        Commands::Init => commands::init::handle(ctx, flags),
        Commands::Seed(args) => commands::seed::handle(&args, ctx, flags).await,
        Commands::Worker { action } => commands::worker::handle(&action, ctx, flags).await,
        Commands::Run { action } => commands::run::handle(&action, ctx, flags).await,
        Commands::Batch { action } => commands::batch::handle(&action, ctx, flags).await,
        Commands::Group { action } => commands::group::handle(&action, ctx, flags).await,
    }
}
