//! PostgreSQL dead-letter store integration tests.
//!
//! These tests share one PostgreSQL container and serialize on the shared
//! `dead_letters` table. Run with:
//!
//! ```bash
//! cargo test -p substrate --test postgres_integration
//! ```

use std::sync::Arc;

use chrono::Utc;
use serial_test::serial;
use substrate::{DeadLetterEntry, DeadLetterStore, PostgresDeadLetterStore, SagaId};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
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

/// Get a fresh store with its own pool and a cleared table
async fn get_test_store() -> PostgresDeadLetterStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    let store = PostgresDeadLetterStore::new(pool);
    store.ensure_schema().await.unwrap();

    sqlx::query("TRUNCATE TABLE dead_letters")
        .execute(store.pool())
        .await
        .unwrap();

    store
}

fn make_entry(saga_id: &SagaId, step_name: &str, attempts: u32) -> DeadLetterEntry {
    DeadLetterEntry {
        saga_id: saga_id.clone(),
        step_name: step_name.to_string(),
        payload: format!("payload-{step_name}").into_bytes(),
        last_error: "downstream unavailable".to_string(),
        attempts,
        recorded_at: Utc::now(),
    }
}

#[tokio::test]
#[serial]
async fn append_and_retrieve_entry() {
    let store = get_test_store().await;
    let saga = SagaId::new("order-fulfillment", "inv-1");

    store.append(make_entry(&saga, "charge-card", 3)).await.unwrap();

    let entries = store.entries_for(&saga).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].saga_id, saga);
    assert_eq!(entries[0].step_name, "charge-card");
    assert_eq!(entries[0].payload, b"payload-charge-card");
    assert_eq!(entries[0].last_error, "downstream unavailable");
    assert_eq!(entries[0].attempts, 3);
}

#[tokio::test]
#[serial]
async fn entries_are_scoped_by_saga_identity() {
    let store = get_test_store().await;
    let saga_a = SagaId::new("order-fulfillment", "inv-1");
    let saga_b = SagaId::new("order-fulfillment", "inv-2");
    let saga_c = SagaId::new("refunds", "inv-1");

    store.append(make_entry(&saga_a, "charge-card", 3)).await.unwrap();
    store.append(make_entry(&saga_b, "reserve", 5)).await.unwrap();
    store.append(make_entry(&saga_c, "release", 2)).await.unwrap();

    let for_a = store.entries_for(&saga_a).await.unwrap();
    assert_eq!(for_a.len(), 1);
    assert_eq!(for_a[0].step_name, "charge-card");

    // Same instance key, different saga name must not leak entries.
    let for_c = store.entries_for(&saga_c).await.unwrap();
    assert_eq!(for_c.len(), 1);
    assert_eq!(for_c[0].step_name, "release");
}

#[tokio::test]
#[serial]
async fn entries_returned_in_insertion_order() {
    let store = get_test_store().await;
    let saga = SagaId::new("order-fulfillment", "inv-1");

    store.append(make_entry(&saga, "ship", 3)).await.unwrap();
    store.append(make_entry(&saga, "charge-card", 3)).await.unwrap();
    store.append(make_entry(&saga, "reserve", 3)).await.unwrap();

    let steps: Vec<_> = store
        .entries_for(&saga)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.step_name)
        .collect();
    assert_eq!(steps, ["ship", "charge-card", "reserve"]);
}

#[tokio::test]
#[serial]
async fn concurrent_appends_from_many_sagas() {
    let store = Arc::new(get_test_store().await);

    let mut handles = Vec::new();
    for i in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let saga = SagaId::new("order-fulfillment", format!("inv-{i}"));
            store.append(make_entry(&saga, "charge-card", 3)).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for i in 0..10 {
        let saga = SagaId::new("order-fulfillment", format!("inv-{i}"));
        assert_eq!(store.entries_for(&saga).await.unwrap().len(), 1);
    }
}

#[tokio::test]
#[serial]
async fn unknown_saga_has_no_entries() {
    let store = get_test_store().await;
    let saga = SagaId::new("order-fulfillment", "missing");

    assert!(store.entries_for(&saga).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn ensure_schema_is_idempotent() {
    let store = get_test_store().await;
    store.ensure_schema().await.unwrap();
    store.ensure_schema().await.unwrap();

    let saga = SagaId::new("order-fulfillment", "inv-1");
    store.append(make_entry(&saga, "charge-card", 3)).await.unwrap();
    assert_eq!(store.entries_for(&saga).await.unwrap().len(), 1);
}
