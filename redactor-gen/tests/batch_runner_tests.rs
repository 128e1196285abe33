//! Background batch runner tests

mod helpers;

use helpers::{RecordingStore, ScriptedProvider};
use redactor_common::config::PipelineConfig;
use redactor_gen::models::{BatchJob, FailureReason, JobOutcome};
use redactor_gen::db::settings;
use redactor_gen::services::BatchRunner;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn job(topic: &str, title: Option<&str>) -> BatchJob {
    BatchJob {
        topic: topic.to_string(),
        suggested_title: title.map(str::to_string),
    }
}

async fn runner(
    provider: Arc<ScriptedProvider>,
    store: Arc<RecordingStore>,
    delay: Duration,
    shutdown: CancellationToken,
) -> BatchRunner {
    runner_on(helpers::test_db().await, provider, store, delay, shutdown).await
}

async fn runner_on(
    db: SqlitePool,
    provider: Arc<ScriptedProvider>,
    store: Arc<RecordingStore>,
    delay: Duration,
    shutdown: CancellationToken,
) -> BatchRunner {
    let pipeline = Arc::new(helpers::test_pipeline(provider, PipelineConfig::default()));
    let publisher = helpers::test_publisher(db, store).await;
    BatchRunner::new(pipeline, publisher, delay, shutdown)
}

#[tokio::test]
async fn test_failed_jobs_do_not_stop_the_batch() {
    let provider = Arc::new(ScriptedProvider::happy());
    provider.empty_plan_for("broken topic");
    let store = Arc::new(RecordingStore::default());
    let runner = runner(
        provider.clone(),
        store.clone(),
        Duration::ZERO,
        CancellationToken::new(),
    )
    .await;

    let jobs = vec![
        job("electric bikes", Some("Best electric bikes")),
        job("", None),
        job("broken topic", None),
        job("solar panels", None),
        job("heat pumps", Some("Heat pumps explained")),
    ];
    let report = runner
        .submit(jobs, None)
        .join()
        .await
        .unwrap();

    assert!(!report.cancelled);
    assert_eq!(report.outcomes.len(), 5);
    assert_eq!(report.uploaded(), 3);
    assert!(matches!(report.outcomes[1], JobOutcome::Rejected { .. }));
    assert!(matches!(
        report.outcomes[2],
        JobOutcome::GenerationFailed {
            reason: Some(FailureReason::PlanningFailed),
            ..
        }
    ));

    let titles: Vec<String> = store.uploads().into_iter().map(|u| u.title).collect();
    assert_eq!(
        titles,
        vec!["Best electric bikes", "solar panels", "Heat pumps explained"]
    );
    for upload in store.uploads() {
        assert_eq!(upload.folder_id, "folder-1");
        assert_eq!(upload.access_token, "access-1");
    }
}

#[tokio::test]
async fn test_upload_failure_is_reported_and_batch_continues() {
    let provider = Arc::new(ScriptedProvider::happy());
    let store = Arc::new(RecordingStore::default());
    store.fail_title("first");
    let runner = runner(provider, store.clone(), Duration::ZERO, CancellationToken::new()).await;

    let report = runner
        .submit(
            vec![job("first", None), job("second", None)],
            None,
        )
        .join()
        .await
        .unwrap();

    assert!(matches!(report.outcomes[0], JobOutcome::NotSaved { .. }));
    assert!(report.outcomes[1].is_success());
    assert_eq!(store.uploads().len(), 1);
}

#[tokio::test]
async fn test_delay_between_jobs_not_after_last() {
    let provider = Arc::new(ScriptedProvider::happy());
    let store = Arc::new(RecordingStore::default());
    let delay = Duration::from_millis(100);
    let runner = runner(provider, store, delay, CancellationToken::new()).await;

    let started = Instant::now();
    let report = runner
        .submit(
            vec![job("one", None), job("two", None), job("three", None)],
            None,
        )
        .join()
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.uploaded(), 3);
    assert!(elapsed >= delay * 2, "elapsed {:?}", elapsed);
    assert!(elapsed < delay * 3 + Duration::from_secs(1));
}

#[tokio::test]
async fn test_submit_returns_before_jobs_finish() {
    let provider = Arc::new(
        ScriptedProvider::happy().with_fragment_delay(Duration::from_millis(50)),
    );
    let store = Arc::new(RecordingStore::default());
    let runner = runner(provider, store, Duration::ZERO, CancellationToken::new()).await;

    let handle = runner.submit(
        vec![job("one", None), job("two", None)],
        None,
    );
    assert_eq!(handle.job_count(), 2);
    assert!(!handle.is_finished());

    let id = handle.id();
    let report = handle.join().await.unwrap();
    assert_eq!(report.batch_id, id);
}

#[tokio::test]
async fn test_shutdown_stops_between_jobs() {
    let provider = Arc::new(ScriptedProvider::happy());
    let store = Arc::new(RecordingStore::default());
    let shutdown = CancellationToken::new();
    let runner = runner(
        provider,
        store.clone(),
        Duration::from_secs(30),
        shutdown.clone(),
    )
    .await;

    let handle = runner.submit(
        vec![job("one", None), job("two", None), job("three", None)],
        None,
    );

    // Let the first job finish, then cancel during the pause
    while store.uploads().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    shutdown.cancel();

    let report = tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("batch did not stop")
        .unwrap();
    assert!(report.cancelled);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(store.uploads().len(), 1);
}

#[tokio::test]
async fn test_disconnected_store_saves_nothing() {
    let provider = Arc::new(ScriptedProvider::happy());
    let store = Arc::new(RecordingStore::default());
    let db = helpers::test_db().await;
    let runner = runner_on(
        db.clone(),
        provider.clone(),
        store.clone(),
        Duration::ZERO,
        CancellationToken::new(),
    )
    .await;
    settings::delete_drive_credentials(&db).await.unwrap();

    let report = runner
        .submit(vec![job("one", None), job("two", None)], None)
        .join()
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    for outcome in &report.outcomes {
        assert!(matches!(outcome, JobOutcome::NotSaved { .. }), "{:?}", outcome);
    }
    assert!(store.uploads().is_empty());
    assert!(provider.calls().is_empty());
    assert!(settings::get_drive_credentials(&db).await.unwrap().is_none());
}

#[tokio::test]
async fn test_disconnect_mid_batch_stops_uploads() {
    let provider = Arc::new(ScriptedProvider::happy());
    let store = Arc::new(RecordingStore::default());
    let db = helpers::test_db().await;
    let runner = runner_on(
        db.clone(),
        provider,
        store.clone(),
        Duration::from_millis(100),
        CancellationToken::new(),
    )
    .await;

    let handle = runner.submit(
        vec![job("one", None), job("two", None), job("three", None)],
        None,
    );
    while store.uploads().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    settings::delete_drive_credentials(&db).await.unwrap();

    let report = handle.join().await.unwrap();
    assert!(report.outcomes[0].is_success());
    assert!(matches!(report.outcomes[1], JobOutcome::NotSaved { .. }));
    assert!(matches!(report.outcomes[2], JobOutcome::NotSaved { .. }));
    assert_eq!(store.uploads().len(), 1);
}
