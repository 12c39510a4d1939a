use anyhow::Context;
use serde::{Deserialize, Serialize};

use cohort_core::entities::{Batch, Component, Study};
use cohort_db::repos::batch::NewBatch;
use cohort_db::updates::component::ComponentUpdateBuilder;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::SeedArgs;
use crate::context::AppContext;
use crate::output::output;

/// A study definition loaded from TOML.
#[derive(Debug, Deserialize)]
struct SeedFile {
    study: SeedStudy,
    #[serde(default)]
    components: Vec<SeedComponent>,
    #[serde(default)]
    batches: Vec<NewBatch>,
}

#[derive(Debug, Deserialize)]
struct SeedStudy {
    title: String,
    #[serde(default)]
    group_study: bool,
    #[serde(default)]
    locked: bool,
}

#[derive(Debug, Deserialize)]
struct SeedComponent {
    title: String,
    #[serde(default)]
    payload: String,
    #[serde(default)]
    reloadable: bool,
    #[serde(default = "default_active")]
    active: bool,
}

const fn default_active() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct SeedResponse {
    study: Study,
    components: Vec<Component>,
    batches: Vec<Batch>,
}

/// Handle `cohort seed`.
pub async fn handle(args: &SeedArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read seed file {}", args.file))?;
    let seed = parse_seed(&raw).with_context(|| format!("invalid seed file {}", args.file))?;

    let study = ctx
        .service
        .create_study(&seed.study.title, seed.study.group_study)
        .await?;

    let mut components = Vec::with_capacity(seed.components.len());
    for entry in &seed.components {
        let mut component = ctx
            .service
            .add_component(&study.id, &entry.title, &entry.payload, entry.reloadable)
            .await?;
        if !entry.active {
            let update = ComponentUpdateBuilder::new().active(false).build();
            component = ctx.service.update_component(&component.id, update).await?;
        }
        components.push(component);
    }

    let mut batches = Vec::with_capacity(seed.batches.len());
    for batch in seed.batches {
        batches.push(ctx.service.create_batch(&study.id, batch).await?);
    }

    let study = if seed.study.locked {
        ctx.service.lock_study(&study.id).await?
    } else {
        study
    };

    tracing::info!(
        study = %study.id,
        components = components.len(),
        batches = batches.len(),
        "study seeded"
    );
    output(
        &SeedResponse {
            study,
            components,
            batches,
        },
        flags.format,
    )
}

fn parse_seed(raw: &str) -> anyhow::Result<SeedFile> {
    let seed: SeedFile = toml::from_str(raw)?;
    if seed.study.title.trim().is_empty() {
        anyhow::bail!("study.title must not be empty");
    }
    Ok(seed)
}

#[cfg(test)]
mod tests {
    use cohort_core::enums::WorkerKind;
    use pretty_assertions::assert_eq;

    use super::parse_seed;

    const SEED: &str = r#"
        [study]
        title = "Prisoner's dilemma"
        group_study = true

        [[components]]
        title = "Consent"
        payload = "<p>consent</p>"

        [[components]]
        title = "Game"
        payload = "<div id='game'></div>"
        reloadable = true

        [[components]]
        title = "Old survey"
        active = false

        [[batches]]
        title = "Pairs"
        max_active_members = 2
        max_total_members = 2
        allowed_worker_kinds = ["personal", "platform"]
    "#;

    #[test]
    fn parses_full_seed_file() {
        let seed = parse_seed(SEED).expect("seed should parse");

        assert!(seed.study.group_study);
        assert!(!seed.study.locked);
        assert_eq!(seed.components.len(), 3);
        assert!(seed.components[0].active);
        assert!(!seed.components[0].reloadable);
        assert!(seed.components[1].reloadable);
        assert!(!seed.components[2].active);
        assert_eq!(seed.components[2].payload, "");

        let batch = &seed.batches[0];
        assert_eq!(batch.max_active_members, Some(2));
        assert_eq!(
            batch.allowed_worker_kinds,
            vec![WorkerKind::Personal, WorkerKind::Platform]
        );
        assert!(batch.active);
    }

    #[test]
    fn batch_defaults_admit_every_kind() {
        let seed = parse_seed(
            r#"
            [study]
            title = "Solo"

            [[batches]]
            title = "Default"
            "#,
        )
        .expect("seed should parse");

        assert!(seed.components.is_empty());
        assert_eq!(seed.batches[0].allowed_worker_kinds.len(), 4);
        assert_eq!(seed.batches[0].max_active_members, None);
    }

    #[test]
    fn rejects_blank_title() {
        let err = parse_seed("[study]\ntitle = \"  \"\n").expect_err("blank title should fail");
        assert!(err.to_string().contains("study.title"));
    }

    #[test]
    fn rejects_unknown_worker_kind() {
        let raw = "[study]\ntitle = \"x\"\n[[batches]]\ntitle = \"b\"\nallowed_worker_kinds = [\"guest\"]\n";
        assert!(parse_seed(raw).is_err());
    }
}
