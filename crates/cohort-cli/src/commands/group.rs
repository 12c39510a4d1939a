use crate::cli::GlobalFlags;
use crate::cli::subcommands::GroupCommands;
use crate::context::AppContext;
use crate::output::output;

/// Handle `cohort group`.
pub async fn handle(action: &GroupCommands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match action {
        GroupCommands::Get { group } => output(&ctx.service.get_group(group).await?, flags.format),
        GroupCommands::Finish { group } => {
            output(&ctx.service.finish_group(group).await?, flags.format)
        }
        GroupCommands::Session { group } => {
            output(&ctx.service.group_session(group).await?, flags.format)
        }
        GroupCommands::SetSession {
            group,
            version,
            data,
        } => {
            let session = ctx
                .service
                .update_group_session(group, *version, data.as_deref())
                .await?;
            output(&session, flags.format)
        }
        GroupCommands::Leave { run } => output(&ctx.service.leave_group(run).await?, flags.format),
        GroupCommands::Reassign { run } => {
            output(&ctx.service.reassign_group(run).await?, flags.format)
        }
    }
}
