use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::context::AppContext;
use crate::output::output;

#[derive(Debug, Serialize)]
struct InitResponse<'a> {
    database: &'a str,
    busy_timeout_ms: u64,
}

/// Handle `cohort init`.
///
/// Opening the context already applied the schema; this reports where it lives.
pub fn handle(ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    output(
        &InitResponse {
            database: &ctx.config.database.path,
            busy_timeout_ms: ctx.config.database.busy_timeout_ms,
        },
        flags.format,
    )
}
