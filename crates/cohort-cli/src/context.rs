use std::path::Path;

use anyhow::Context;
use cohort_config::CohortConfig;
use cohort_db::service::CohortService;

/// Shared application resources initialized once at startup.
pub struct AppContext {
    pub service: CohortService,
    pub config: CohortConfig,
}

impl AppContext {
    /// Open the result store named by `config`, creating its directory if needed.
    pub async fn init(config: CohortConfig) -> anyhow::Result<Self> {
        if !config.database.is_in_memory() {
            if let Some(parent) = Path::new(&config.database.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create database directory {}", parent.display())
                    })?;
                }
            }
        }

        let service = CohortService::from_config(&config)
            .await
            .with_context(|| format!("failed to open database at {}", config.database.path))?;
        tracing::debug!(path = %config.database.path, "result store ready");

        Ok(Self { service, config })
    }
}

#[cfg(test)]
mod tests {
    use cohort_config::CohortConfig;

    use super::AppContext;

    #[tokio::test]
    async fn init_creates_missing_database_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cohort.db");

        let mut config = CohortConfig::default();
        config.database.path = path.to_string_lossy().into_owned();

        let ctx = AppContext::init(config).await.unwrap();
        assert!(path.exists());
        assert!(ctx.service.list_studies(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn init_accepts_in_memory_store() {
        let mut config = CohortConfig::default();
        config.database.path = ":memory:".into();

        let ctx = AppContext::init(config).await.unwrap();
        let study = ctx.service.create_study("Smoke", false).await.unwrap();
        assert_eq!(ctx.service.get_study(&study.id).await.unwrap().title, "Smoke");
    }
}
