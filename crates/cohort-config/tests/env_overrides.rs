use figment::Jail;
use cohort_config::CohortConfig;
use pretty_assertions::assert_eq;

#[test]
fn env_sets_nested_database_fields() {
    Jail::expect_with(|jail| {
        jail.set_env("COHORT_DATABASE__PATH", ":memory:");
        jail.set_env("COHORT_DATABASE__BUSY_TIMEOUT_MS", "1200");

        let config = CohortConfig::load().expect("config loads");
        assert!(config.database.is_in_memory());
        assert_eq!(config.database.busy_timeout_ms, 1200);
        Ok(())
    });
}

#[test]
fn env_beats_project_file() {
    Jail::expect_with(|jail| {
        jail.create_dir(".cohort")?;
        jail.create_file(
            ".cohort/config.toml",
            r#"
[general]
default_limit = 7
"#,
        )?;
        jail.set_env("COHORT_GENERAL__DEFAULT_LIMIT", "99");

        let config = CohortConfig::load().expect("config loads");
        assert_eq!(config.general.default_limit, 99);
        Ok(())
    });
}
