use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::context::AppContext;
use crate::output::output;

#[derive(Debug, Serialize)]
struct HeartbeatResponse<'a> {
    study_result_id: &'a str,
    alive: bool,
}

pub async fn run(id: &str, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let view = ctx.service.get_run(id).await?;
    output(&view, flags.format)
}

pub async fn heartbeat(id: &str, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    ctx.service.heartbeat(id).await?;
    output(
        &HeartbeatResponse {
            study_result_id: id,
            alive: true,
        },
        flags.format,
    )
}
