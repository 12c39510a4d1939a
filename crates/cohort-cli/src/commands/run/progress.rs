use anyhow::bail;
use cohort_core::responses::Navigation;

use crate::cli::GlobalFlags;
use crate::context::AppContext;
use crate::output::output;

pub async fn component(
    run: &str,
    component: &str,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let data = ctx.service.get_component_data(run, component).await?;
    output(&data, flags.format)
}

pub async fn submit(
    run: &str,
    component: &str,
    data: &str,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let outcome = ctx.service.submit_result(run, component, data).await?;
    output(&outcome, flags.format)
}

pub async fn next(
    run: &str,
    component: &str,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let step = ctx.service.next_step(run, component).await?;
    output(&step, flags.format)
}

pub async fn navigate(
    run: &str,
    index: Option<usize>,
    previous: bool,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let target = match (index, previous) {
        (Some(index), false) => Navigation::Index(index),
        (None, true) => Navigation::Previous,
        _ => bail!("pass exactly one of --index or --previous"),
    };
    let component = ctx.service.navigate(run, target).await?;
    output(&component, flags.format)
}
