mod common;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use common::{features, loop_config, scoring_config, synthetic_entities};
use reflexion::adapters::sqlite::{initialize_database, SqliteRunRepository};
use reflexion::adapters::{MockEntityScorer, MockFeatureProposer};
use reflexion::domain::models::DatabaseConfig;
use reflexion::services::ScoreBatcher;
use reflexion::{Decision, ReflexionLoop, ReflexionState, RunRepository};

async fn file_repository(dir: &tempfile::TempDir) -> SqliteRunRepository {
    let config = DatabaseConfig {
        path: dir.path().join("runs").join("reflexion.db").to_string_lossy().into_owned(),
        max_connections: 2,
    };
    let pool = initialize_database(&config).await.unwrap();
    SqliteRunRepository::new(pool)
}

#[tokio::test]
async fn test_run_audit_trail_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let entities = synthetic_entities(30);

    let run_id = {
        let repository = Arc::new(file_repository(&dir).await);
        let reflexion = ReflexionLoop::new(
            Arc::new(MockFeatureProposer::sequential("candidate")),
            ScoreBatcher::new(Arc::new(MockEntityScorer::hashed()), &scoring_config()),
            loop_config(3),
        )
        .with_repository(repository);
        let initial = ReflexionState::new(features(&["a", "b"])).unwrap();
        let summary = reflexion
            .run(&entities, initial, &mut StdRng::seed_from_u64(21))
            .await
            .unwrap();
        summary.run_id
    };

    let repository = file_repository(&dir).await;
    let runs = repository.list_runs().await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, run_id);
    assert_eq!(runs[0].seed, Some(17));

    let iterations = repository.list_iterations(run_id).await.unwrap();
    assert_eq!(iterations.len(), 3);
    for record in &iterations {
        if !matches!(record.decision, Decision::Skipped { .. }) {
            assert!(record.candidate_feature.is_some());
            assert!(record.old_validation_error.is_some());
        }
    }

    let latest = repository.latest_state(run_id).await.unwrap().unwrap();
    assert_eq!(latest, iterations[2].state);
    assert_eq!(latest.iteration(), 3);
}

#[tokio::test]
async fn test_resume_appends_to_existing_run() {
    let dir = tempfile::tempdir().unwrap();
    let entities = synthetic_entities(24);
    let repository = Arc::new(file_repository(&dir).await);

    let first = ReflexionLoop::new(
        Arc::new(MockFeatureProposer::sequential("first")),
        ScoreBatcher::new(Arc::new(MockEntityScorer::constant(3.0)), &scoring_config()),
        loop_config(1),
    )
    .with_repository(repository.clone());
    let initial = ReflexionState::new(features(&["a"])).unwrap();
    let summary = first
        .run(&entities, initial, &mut StdRng::seed_from_u64(1))
        .await
        .unwrap();

    let state = repository.latest_state(summary.run_id).await.unwrap().unwrap();
    let second = ReflexionLoop::new(
        Arc::new(MockFeatureProposer::sequential("second")),
        ScoreBatcher::new(Arc::new(MockEntityScorer::constant(3.0)), &scoring_config()),
        loop_config(3),
    )
    .with_repository(repository.clone());
    second
        .resume(summary.run_id, &entities, state, &mut StdRng::seed_from_u64(2))
        .await
        .unwrap();

    let iterations = repository.list_iterations(summary.run_id).await.unwrap();
    assert_eq!(iterations.iter().map(|r| r.iteration).collect::<Vec<_>>(), vec![0, 1, 2]);
    let latest = repository.latest_state(summary.run_id).await.unwrap().unwrap();
    assert!(latest.is_rejected("first_1"));
    assert!(latest.is_rejected("second_2"));
}
