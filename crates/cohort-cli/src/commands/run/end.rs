use crate::cli::GlobalFlags;
use crate::context::AppContext;
use crate::output::output;

pub async fn abandon(
    run: &str,
    message: Option<&str>,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let study_result = ctx.service.abandon(run, message).await?;
    output(&study_result, flags.format)
}

pub async fn fail(run: &str, reason: &str, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let study_result = ctx.service.fail(run, reason).await?;
    output(&study_result, flags.format)
}
