//! Serde roundtrip and JsonSchema validation for the types controllers consume.

use chrono::Utc;
use schemars::schema_for;
use cohort_core::entities::*;
use cohort_core::enums::*;
use cohort_core::responses::*;

/// Validate a JSON value against a schemars-generated schema.
fn validate_against_schema(
    schema: &serde_json::Value,
    instance: &serde_json::Value,
) -> Vec<String> {
    let validator = jsonschema::validator_for(schema).expect("schema should be valid");
    validator
        .iter_errors(instance)
        .map(|e| format!("{e}"))
        .collect()
}

macro_rules! roundtrip_and_validate {
    ($name:ident, $ty:ty, $instance:expr) => {
        #[test]
        fn $name() {
            let val: $ty = $instance;

            let json_str = serde_json::to_string_pretty(&val).unwrap();
            let recovered: $ty = serde_json::from_str(&json_str).unwrap();
            assert_eq!(
                recovered,
                val,
                "serde roundtrip failed for {}",
                stringify!($ty)
            );

            let schema = serde_json::to_value(schema_for!($ty)).unwrap();
            let instance = serde_json::to_value(&val).unwrap();
            let errors = validate_against_schema(&schema, &instance);
            assert!(
                errors.is_empty(),
                "Schema validation failed for {}: {:?}",
                stringify!($ty),
                errors
            );
        }
    };
}

fn component_result(state: ComponentResultState) -> ComponentResult {
    ComponentResult {
        id: "crs-00c0ffee".into(),
        study_result_id: "srs-a3f8b2c1".into(),
        component_id: "cmp-11111111".into(),
        state,
        data: Some("{\"rt\": 512}".into()),
        started_at: Utc::now(),
        ended_at: None,
    }
}

roundtrip_and_validate!(
    batch_roundtrip,
    Batch,
    Batch {
        id: "bat-00000001".into(),
        study_id: "stu-00000001".into(),
        title: "Pilot".into(),
        active: true,
        max_active_members: Some(2),
        max_total_members: None,
        allowed_worker_kinds: vec![WorkerKind::Personal, WorkerKind::Platform],
        created_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    group_result_roundtrip,
    GroupResult,
    GroupResult {
        id: "grp-0000beef".into(),
        batch_id: "bat-00000001".into(),
        state: GroupState::Started,
        active_member_count: 2,
        history_member_count: 1,
        session_data: Some("{\"round\": 3}".into()),
        session_version: 4,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        finished_at: None,
    }
);

roundtrip_and_validate!(
    study_result_roundtrip,
    StudyResult,
    StudyResult {
        id: "srs-a3f8b2c1".into(),
        study_id: "stu-00000001".into(),
        batch_id: "bat-00000001".into(),
        worker_id: "wrk-00000001".into(),
        group_id: None,
        state: StudyResultState::Finished,
        confirmation_code: Some("4f9a0c1d2e3b4a5f6e7d8c9b0a1f2e3d".into()),
        message: None,
        session_data: None,
        started_at: Utc::now(),
        ended_at: Some(Utc::now()),
        last_seen_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    next_step_component_roundtrip,
    NextStep,
    NextStep::Component(ComponentRef {
        component_id: "cmp-22222222".into(),
        component_result_id: "crs-33333333".into(),
        position: 3,
        title: "Debrief".into(),
    })
);

roundtrip_and_validate!(
    next_step_finished_roundtrip,
    NextStep,
    NextStep::Finished {
        confirmation_code: "00ff00ff00ff00ff00ff00ff00ff00ff".into(),
    }
);

roundtrip_and_validate!(
    submit_outcome_roundtrip,
    SubmitOutcome,
    SubmitOutcome {
        component_result: component_result(ComponentResultState::ResultDataPosted),
        upcoming: Upcoming::EndOfStudy,
    }
);

#[test]
fn next_step_is_tagged() {
    let json = serde_json::to_value(NextStep::Finished {
        confirmation_code: "abc".into(),
    })
    .unwrap();
    assert_eq!(json["step"], "finished");
    assert_eq!(json["confirmation_code"], "abc");
}
