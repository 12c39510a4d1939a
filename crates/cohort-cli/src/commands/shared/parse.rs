use serde::de::DeserializeOwned;

/// Parse a snake_case enum value using serde-deserialization.
///
/// Hyphens are accepted in place of underscores (`one-time` == `one_time`).
pub fn parse_enum<T>(raw: &str, field: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let normalized = raw.replace('-', "_");
    serde_json::from_value(serde_json::Value::String(normalized))
        .map_err(|error| anyhow::anyhow!("invalid {field} '{raw}': {error}"))
}

#[cfg(test)]
mod tests {
    use cohort_core::enums::WorkerKind;

    use super::parse_enum;

    #[test]
    fn parses_snake_case_kind() {
        let kind: WorkerKind = parse_enum("one_time", "kind").expect("kind should parse");
        assert_eq!(kind, WorkerKind::OneTime);
    }

    #[test]
    fn parses_hyphenated_alias() {
        let kind: WorkerKind = parse_enum("one-time", "kind").expect("kind should parse");
        assert_eq!(kind, WorkerKind::OneTime);
    }

    #[test]
    fn errors_on_unknown_kind() {
        let err = parse_enum::<WorkerKind>("guest", "kind").expect_err("should fail");
        assert!(err.to_string().contains("invalid kind 'guest'"));
    }
}
