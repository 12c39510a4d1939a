use cohort_core::enums::WorkerKind;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::WorkerCommands;
use crate::commands::shared::parse::parse_enum;
use crate::context::AppContext;
use crate::output::output;

/// Handle `cohort worker`.
pub async fn handle(action: &WorkerCommands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match action {
        WorkerCommands::Create {
            kind,
            label,
            platform_id,
        } => {
            let kind: WorkerKind = parse_enum(kind, "kind")?;
            let worker = ctx
                .service
                .create_worker(kind, label.as_deref(), platform_id.as_deref())
                .await?;
            output(&worker, flags.format)
        }
    }
}
