use crate::cli::GlobalFlags;
use crate::context::AppContext;
use crate::output::output;

pub async fn run(
    study: &str,
    batch: &str,
    token: &str,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let handle = ctx.service.start_run(study, batch, token).await?;
    tracing::info!(run = %handle.study_result_id, "run started");
    output(&handle, flags.format)
}
