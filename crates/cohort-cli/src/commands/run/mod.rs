mod end;
mod get;
mod progress;
mod start;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::RunCommands;
use crate::context::AppContext;

/// Handle `cohort run`.
pub async fn handle(action: &RunCommands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match action {
        RunCommands::Start {
            study,
            batch,
            token,
        } => start::run(study, batch, token, ctx, flags).await,
        RunCommands::Component { run, component } => {
            progress::component(run, component, ctx, flags).await
        }
        RunCommands::Submit {
            run,
            component,
            data,
        } => progress::submit(run, component, data, ctx, flags).await,
        RunCommands::Next { run, component } => progress::next(run, component, ctx, flags).await,
        RunCommands::Navigate {
            run,
            index,
            previous,
        } => progress::navigate(run, *index, *previous, ctx, flags).await,
        RunCommands::Abandon { run, message } => {
            end::abandon(run, message.as_deref(), ctx, flags).await
        }
        RunCommands::Fail { run, reason } => end::fail(run, reason, ctx, flags).await,
        RunCommands::Heartbeat { run } => get::heartbeat(run, ctx, flags).await,
        RunCommands::Get { run } => get::run(run, ctx, flags).await,
    }
}
