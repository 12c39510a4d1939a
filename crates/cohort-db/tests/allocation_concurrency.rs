//! Group allocation under concurrent run starts.
//!
//! These run against a file-backed database on a multi-threaded runtime, so
//! every locked transaction has its own connection and concurrent starts
//! really contend for the store's write lock.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use cohort_core::entities::{Batch, GroupResult, Study};
use cohort_core::enums::WorkerKind;
use cohort_db::CohortDb;
use cohort_db::repos::batch::NewBatch;
use cohort_db::service::CohortService;

async fn file_service(dir: &TempDir) -> Arc<CohortService> {
    let path = dir.path().join("cohort.db");
    let db = CohortDb::open_local_with(path.to_str().unwrap(), Duration::from_secs(30))
        .await
        .unwrap();
    Arc::new(CohortService::from_db(db))
}

async fn group_study(
    svc: &CohortService,
    max_active: Option<u32>,
    max_total: Option<u32>,
) -> (Study, Batch) {
    let study = svc.create_study("Synchronized", true).await.unwrap();
    svc.add_component(&study.id, "Lobby", "{}", false).await.unwrap();
    let batch = svc
        .create_batch(
            &study.id,
            NewBatch::new("Wave 1").with_capacity(max_active, max_total),
        )
        .await
        .unwrap();
    (study, batch)
}

async fn tokens(svc: &CohortService, n: usize) -> Vec<String> {
    let mut tokens = Vec::with_capacity(n);
    for _ in 0..n {
        let worker = svc.create_worker(WorkerKind::Personal, None, None).await.unwrap();
        tokens.push(worker.token);
    }
    tokens
}

/// Start one run per token concurrently and return the bound group ids.
async fn start_all(
    svc: &Arc<CohortService>,
    study: &Study,
    batch: &Batch,
    tokens: Vec<String>,
) -> Vec<String> {
    let handles: Vec<_> = tokens
        .into_iter()
        .map(|token| {
            let svc = Arc::clone(svc);
            let (study_id, batch_id) = (study.id.clone(), batch.id.clone());
            tokio::spawn(async move { svc.start_run(&study_id, &batch_id, &token).await })
        })
        .collect();

    let mut groups = Vec::new();
    for handle in handles {
        let run = handle.await.unwrap().unwrap();
        groups.push(run.group_id.unwrap());
    }
    groups
}

fn active_counts(groups: &[GroupResult]) -> Vec<u32> {
    let mut counts: Vec<u32> = groups.iter().map(|g| g.active_member_count).collect();
    counts.sort_unstable();
    counts
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_concurrent_starts_share_one_group() {
    let dir = TempDir::new().unwrap();
    let svc = file_service(&dir).await;
    let (study, batch) = group_study(&svc, Some(2), None).await;

    let bound = start_all(&svc, &study, &batch, tokens(&svc, 2).await).await;
    assert_eq!(bound[0], bound[1]);
    let groups = svc.list_groups(&batch.id).await.unwrap();
    assert_eq!(active_counts(&groups), vec![2]);

    let third = start_all(&svc, &study, &batch, tokens(&svc, 1).await).await;
    assert_ne!(third[0], bound[0]);
    let groups = svc.list_groups(&batch.id).await.unwrap();
    assert_eq!(active_counts(&groups), vec![1, 2]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn three_concurrent_starts_open_exactly_two_groups() {
    let dir = TempDir::new().unwrap();
    let svc = file_service(&dir).await;
    let (study, batch) = group_study(&svc, Some(2), None).await;

    start_all(&svc, &study, &batch, tokens(&svc, 3).await).await;
    let groups = svc.list_groups(&batch.id).await.unwrap();
    assert_eq!(active_counts(&groups), vec![1, 2]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn active_limit_holds_under_load() {
    let dir = TempDir::new().unwrap();
    let svc = file_service(&dir).await;
    let (study, batch) = group_study(&svc, Some(3), None).await;

    start_all(&svc, &study, &batch, tokens(&svc, 20).await).await;

    let groups = svc.list_groups(&batch.id).await.unwrap();
    assert!(groups.iter().all(|g| g.active_member_count <= 3), "{groups:?}");
    assert_eq!(groups.iter().map(|g| g.active_member_count).sum::<u32>(), 20);
    // Packing leaves at most one group partially filled.
    assert_eq!(groups.len(), 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn total_limit_holds_with_churn() {
    let dir = TempDir::new().unwrap();
    let svc = file_service(&dir).await;
    let (study, batch) = group_study(&svc, None, Some(4)).await;

    let handles: Vec<_> = tokens(&svc, 12)
        .await
        .into_iter()
        .map(|token| {
            let svc = Arc::clone(&svc);
            let (study_id, batch_id) = (study.id.clone(), batch.id.clone());
            tokio::spawn(async move {
                let run = svc.start_run(&study_id, &batch_id, &token).await.unwrap();
                svc.abandon(&run.study_result_id, Some("churn")).await.unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let groups = svc.list_groups(&batch.id).await.unwrap();
    for group in &groups {
        assert!(group.total_member_count() <= 4, "{group:?}");
        assert_eq!(group.active_member_count, 0);
    }
    assert_eq!(groups.iter().map(|g| g.history_member_count).sum::<u32>(), 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn packs_into_the_fuller_group() {
    let dir = TempDir::new().unwrap();
    let svc = file_service(&dir).await;
    let (study, batch) = group_study(&svc, Some(5), None).await;

    // The emptier group is older, so age alone would pick it.
    svc.db()
        .conn()
        .execute(
            "INSERT INTO group_results (id, batch_id, active_member_count, created_at, updated_at)
             VALUES ('grp-00000001', ?1, 1, '2026-01-01T00:00:00.000000Z', '2026-01-01T00:00:00.000000Z'),
                    ('grp-00000003', ?1, 3, '2026-01-02T00:00:00.000000Z', '2026-01-02T00:00:00.000000Z')",
            [batch.id.as_str()],
        )
        .await
        .unwrap();

    let bound = start_all(&svc, &study, &batch, tokens(&svc, 1).await).await;
    assert_eq!(bound, vec!["grp-00000003".to_string()]);
    assert_eq!(svc.get_group("grp-00000003").await.unwrap().active_member_count, 4);
    assert_eq!(svc.get_group("grp-00000001").await.unwrap().active_member_count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancelled_starts_leave_counts_consistent() {
    let dir = TempDir::new().unwrap();
    let svc = file_service(&dir).await;
    let (study, batch) = group_study(&svc, Some(2), None).await;

    let handles: Vec<_> = tokens(&svc, 16)
        .await
        .into_iter()
        .enumerate()
        .map(|(i, token)| {
            let svc = Arc::clone(&svc);
            let (study_id, batch_id) = (study.id.clone(), batch.id.clone());
            let budget = Duration::from_micros(50 * u64::try_from(i).unwrap());
            tokio::spawn(async move {
                let _ = tokio::time::timeout(budget, svc.start_run(&study_id, &batch_id, &token)).await;
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let runs = svc.list_study_results(&batch.id, 100).await.unwrap();
    let groups = svc.list_groups(&batch.id).await.unwrap();
    let bound_runs = runs.iter().filter(|r| r.group_id.is_some()).count();
    let active: u32 = groups.iter().map(|g| g.active_member_count).sum();
    assert_eq!(usize::try_from(active).unwrap(), bound_runs);
    assert!(groups.iter().all(|g| g.active_member_count <= 2));
}
