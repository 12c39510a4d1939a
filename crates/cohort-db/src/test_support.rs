//! Shared test utilities for cohort-db unit tests.

#[cfg(test)]
pub(crate) mod helpers {
    use cohort_core::entities::{Batch, Component, Study, Worker};
    use cohort_core::enums::WorkerKind;

    use crate::CohortDb;
    use crate::repos::batch::NewBatch;
    use crate::service::CohortService;

    /// Create an in-memory `CohortService`.
    pub async fn test_service() -> CohortService {
        let db = CohortDb::open_local(":memory:").await.unwrap();
        CohortService::from_db(db)
    }

    /// A study with one component and a batch with the given group limits.
    pub async fn seed_batch(
        svc: &CohortService,
        group_study: bool,
        max_active: Option<u32>,
        max_total: Option<u32>,
    ) -> Batch {
        let study = svc.create_study("Seeded", group_study).await.unwrap();
        svc.add_component(&study.id, "Only", "{}", false).await.unwrap();
        svc.create_batch(
            &study.id,
            NewBatch::new("Seeded batch").with_capacity(max_active, max_total),
        )
        .await
        .unwrap()
    }

    /// A study with components `(title, active, reloadable)` in order, plus
    /// one unlimited batch.
    pub async fn seed_study(
        svc: &CohortService,
        group_study: bool,
        components: &[(&str, bool, bool)],
    ) -> (Study, Vec<Component>, Batch) {
        let study = svc.create_study("Seeded", group_study).await.unwrap();
        let mut created = Vec::new();
        for (title, active, reloadable) in components {
            let mut component = svc
                .add_component(&study.id, title, &format!("payload of {title}"), *reloadable)
                .await
                .unwrap();
            if !active {
                component = svc
                    .update_component(
                        &component.id,
                        crate::updates::component::ComponentUpdateBuilder::new()
                            .active(false)
                            .build(),
                    )
                    .await
                    .unwrap();
            }
            created.push(component);
        }
        let batch = svc
            .create_batch(&study.id, NewBatch::new("Seeded batch"))
            .await
            .unwrap();
        (study, created, batch)
    }

    pub async fn seed_worker(svc: &CohortService, kind: WorkerKind) -> Worker {
        svc.create_worker(kind, None, None).await.unwrap()
    }
}
