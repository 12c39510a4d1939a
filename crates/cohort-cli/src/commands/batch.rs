use serde::Serialize;

use cohort_core::entities::{GroupResult, StudyResult};

use crate::cli::GlobalFlags;
use crate::cli::subcommands::BatchCommands;
use crate::commands::shared::limit::effective_limit;
use crate::context::AppContext;
use crate::output::output;

#[derive(Debug, Serialize)]
struct GroupListResponse {
    batch_id: String,
    groups: Vec<GroupResult>,
}

#[derive(Debug, Serialize)]
struct ResultListResponse {
    batch_id: String,
    limit: u32,
    study_results: Vec<StudyResult>,
}

/// Handle `cohort batch`.
pub async fn handle(action: &BatchCommands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match action {
        BatchCommands::Groups { batch } => {
            let groups = ctx.service.list_groups(batch).await?;
            output(
                &GroupListResponse {
                    batch_id: batch.clone(),
                    groups,
                },
                flags.format,
            )
        }
        BatchCommands::Results { batch, limit } => {
            let limit = effective_limit(*limit, flags.limit, ctx.config.general.default_limit);
            let study_results = ctx.service.list_study_results(batch, limit).await?;
            output(
                &ResultListResponse {
                    batch_id: batch.clone(),
                    limit,
                    study_results,
                },
                flags.format,
            )
        }
        BatchCommands::SetActive { batch, active } => {
            let batch = ctx.service.set_batch_active(batch, *active).await?;
            output(&batch, flags.format)
        }
    }
}
