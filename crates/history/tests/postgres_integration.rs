//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and use fresh run ids, so
//! they do not need to clear the table between tests. Run with:
//!
//! ```bash
//! cargo test -p history --test postgres_integration
//! ```

use std::sync::Arc;

use futures_util::StreamExt;
use history::{
    AppendOptions, HistoryError, HistoryRecord, HistoryStore, PostgresHistoryStore, RunId, Version,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Connects a store with its own pool; migrations are idempotent.
async fn get_test_store() -> PostgresHistoryStore {
    let info = get_container_info().await;
    PostgresHistoryStore::connect(&info.connection_string)
        .await
        .unwrap()
}

fn create_test_record(run_id: RunId, version: i64, event_type: &str) -> HistoryRecord {
    HistoryRecord::builder()
        .run_id(run_id)
        .workflow_type("book-trip")
        .event_type(event_type)
        .version(Version::new(version))
        .payload_raw(serde_json::json!({"type": event_type, "data": {"seq": version}}))
        .build()
}

#[tokio::test]
async fn append_and_read_run() {
    let store = get_test_store().await;
    let run_id = RunId::new();

    let records = vec![
        create_test_record(run_id, 1, "WorkflowStarted"),
        create_test_record(run_id, 2, "ActivityScheduled"),
        create_test_record(run_id, 3, "ActivityCompleted"),
    ];
    let version = store
        .append(records.clone(), AppendOptions::expect_new())
        .await
        .unwrap();
    assert_eq!(version, Version::new(3));

    let stored = store.read_run(run_id).await.unwrap();
    assert_eq!(stored.len(), 3);
    for (stored, original) in stored.iter().zip(&records) {
        assert_eq!(stored.event_id, original.event_id);
        assert_eq!(stored.event_type, original.event_type);
        assert_eq!(stored.run_id, run_id);
        assert_eq!(stored.workflow_type, "book-trip");
        assert_eq!(stored.version, original.version);
        assert_eq!(stored.payload, original.payload);
    }
}

#[tokio::test]
async fn wrong_expected_version_conflicts() {
    let store = get_test_store().await;
    let run_id = RunId::new();

    store
        .append(
            vec![create_test_record(run_id, 1, "WorkflowStarted")],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();

    let result = store
        .append(
            vec![create_test_record(run_id, 2, "ActivityScheduled")],
            AppendOptions::expect_version(Version::initial()),
        )
        .await;
    assert!(matches!(
        result,
        Err(HistoryError::ConcurrencyConflict { .. })
    ));

    let result = store
        .append(
            vec![create_test_record(run_id, 1, "WorkflowStarted")],
            AppendOptions::new(),
        )
        .await;
    assert!(matches!(
        result,
        Err(HistoryError::ConcurrencyConflict { .. })
    ));
    assert_eq!(store.read_run(run_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn run_version_tracks_appends() {
    let store = get_test_store().await;
    let run_id = RunId::new();

    assert!(store.run_version(run_id).await.unwrap().is_none());

    store
        .append(
            vec![create_test_record(run_id, 1, "WorkflowStarted")],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();
    store
        .append(
            vec![create_test_record(run_id, 2, "ActivityScheduled")],
            AppendOptions::expect_version(Version::first()),
        )
        .await
        .unwrap();

    assert_eq!(
        store.run_version(run_id).await.unwrap(),
        Some(Version::new(2))
    );
}

#[tokio::test]
async fn records_by_type_and_stream_keep_insertion_order() {
    let store = get_test_store().await;
    let first = RunId::new();
    let second = RunId::new();

    store
        .append(
            vec![create_test_record(first, 1, "WorkflowStarted")],
            AppendOptions::new(),
        )
        .await
        .unwrap();
    store
        .append(
            vec![create_test_record(second, 1, "WorkflowStarted")],
            AppendOptions::new(),
        )
        .await
        .unwrap();
    store
        .append(
            vec![create_test_record(first, 2, "WorkflowCompleted")],
            AppendOptions::new(),
        )
        .await
        .unwrap();

    let started: Vec<RunId> = store
        .records_by_type("WorkflowStarted")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.run_id)
        .filter(|id| *id == first || *id == second)
        .collect();
    assert_eq!(started, vec![first, second]);

    let streamed: Vec<(RunId, i64)> = store
        .stream_all()
        .await
        .unwrap()
        .map(|r| r.unwrap())
        .filter(|r| std::future::ready(r.run_id == first || r.run_id == second))
        .map(|r| (r.run_id, r.version.as_i64()))
        .collect()
        .await;
    assert_eq!(streamed, vec![(first, 1), (second, 1), (first, 2)]);
}

#[tokio::test]
async fn history_survives_a_new_connection() {
    let run_id = RunId::new();
    {
        let store = get_test_store().await;
        store
            .append(
                vec![create_test_record(run_id, 1, "WorkflowStarted")],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();
        store.pool().close().await;
    }

    let reopened = get_test_store().await;
    let records = reopened.read_run(run_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].event_type, "WorkflowStarted");
}
