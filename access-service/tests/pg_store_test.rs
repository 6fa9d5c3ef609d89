//! PostgreSQL assignment store tests.
//!
//! Run with `TEST_DATABASE_URL` pointing at a disposable database.

use access_service::config::DatabaseConfig;
use access_service::db;
use access_service::models::{Assignment, ContextKind, NewAssignment, ValidityWindow};
use access_service::services::{AssignmentStore, PgAssignmentStore, StoreError};
use chrono::{Duration, Utc};
use serial_test::serial;
use std::collections::BTreeSet;

async fn setup() -> PgAssignmentStore {
    let config = DatabaseConfig {
        url: std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/access_test".to_string()),
        max_connections: 5,
        min_connections: 1,
        acquire_timeout_seconds: 5,
    };
    let pool = db::create_pool(&config)
        .await
        .expect("Failed to connect to test database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    sqlx::query("TRUNCATE context_assignments")
        .execute(&pool)
        .await
        .expect("Failed to clean table");
    PgAssignmentStore::new(pool)
}

fn grant(user_id: i64, kind: ContextKind, context_id: i64, validity: ValidityWindow) -> Assignment {
    Assignment::new(
        NewAssignment {
            tenant_id: 1,
            user_id,
            role_id: 2,
            context_kind: kind,
            context_id,
            trade_specialization: Some("electrical".to_string()),
            is_primary: true,
            validity,
        },
        900,
        Utc::now(),
    )
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn test_insert_and_find() {
    let store = setup().await;
    let a = grant(11, ContextKind::Location, 6, ValidityWindow::unbounded());
    store.insert(&a).await.unwrap();

    let found = store.find_by_id(1, a.assignment_id).await.unwrap().unwrap();
    assert_eq!(found.context_kind, ContextKind::Location);
    assert_eq!(found.trade_specialization.as_deref(), Some("electrical"));
    assert!(store.find_by_id(2, a.assignment_id).await.unwrap().is_none());
    store.health_check().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn test_unique_index_rejects_live_duplicate() {
    let store = setup().await;
    let first = grant(11, ContextKind::Project, 30, ValidityWindow::unbounded());
    store.insert(&first).await.unwrap();

    let result = store
        .insert(&grant(11, ContextKind::Project, 30, ValidityWindow::unbounded()))
        .await;
    assert!(matches!(result, Err(StoreError::Duplicate)));

    assert!(store
        .soft_delete(1, first.assignment_id, 900, Utc::now())
        .await
        .unwrap());
    store
        .insert(&grant(11, ContextKind::Project, 30, ValidityWindow::unbounded()))
        .await
        .unwrap();
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn test_concurrent_inserts_one_wins() {
    let store = setup().await;
    let a = grant(12, ContextKind::Location, 6, ValidityWindow::unbounded());
    let b = grant(12, ContextKind::Location, 6, ValidityWindow::unbounded());

    let (ra, rb) = tokio::join!(store.insert(&a), store.insert(&b));
    assert_eq!([ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count(), 1);
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn test_insert_all_rolls_back() {
    let store = setup().await;
    store
        .insert(&grant(13, ContextKind::Project, 30, ValidityWindow::unbounded()))
        .await
        .unwrap();

    let batch = vec![
        grant(13, ContextKind::Project, 45, ValidityWindow::unbounded()),
        grant(13, ContextKind::Project, 30, ValidityWindow::unbounded()),
    ];
    assert!(matches!(
        store.insert_all(&batch).await,
        Err(StoreError::Duplicate)
    ));
    assert_eq!(store.list_for_user(1, 13, true).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn test_live_context_ids_filters_window_and_deletion() {
    let store = setup().await;
    let today = Utc::now().date_naive();
    let yesterday = today - Duration::days(1);
    let tomorrow = today + Duration::days(1);

    store
        .insert(&grant(14, ContextKind::Project, 30, ValidityWindow::new(None, Some(yesterday)).unwrap()))
        .await
        .unwrap();
    store
        .insert(&grant(14, ContextKind::Project, 31, ValidityWindow::new(None, Some(tomorrow)).unwrap()))
        .await
        .unwrap();
    store
        .insert(&grant(14, ContextKind::Project, 32, ValidityWindow::new(Some(tomorrow), None).unwrap()))
        .await
        .unwrap();
    let deleted = grant(14, ContextKind::Project, 45, ValidityWindow::unbounded());
    store.insert(&deleted).await.unwrap();
    store
        .soft_delete(1, deleted.assignment_id, 900, Utc::now())
        .await
        .unwrap();

    let ids = store
        .live_context_ids(1, 14, &ContextKind::Project, today)
        .await
        .unwrap();
    assert_eq!(ids, BTreeSet::from([31]));
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn test_update_and_soft_delete() {
    let store = setup().await;
    let mut a = grant(15, ContextKind::Organization, 1, ValidityWindow::unbounded());
    store.insert(&a).await.unwrap();

    a.role_id = 3;
    a.is_primary = false;
    a.trade_specialization = None;
    a.updated_by = 15;
    store.update(&a).await.unwrap();

    let found = store.find_by_id(1, a.assignment_id).await.unwrap().unwrap();
    assert_eq!(found.role_id, 3);
    assert_eq!(found.trade_specialization, None);

    assert!(store.soft_delete(1, a.assignment_id, 900, Utc::now()).await.unwrap());
    assert!(!store.soft_delete(1, a.assignment_id, 900, Utc::now()).await.unwrap());
    assert!(matches!(store.update(&a).await, Err(StoreError::NotFound)));
    assert!(matches!(
        store.soft_delete(2, a.assignment_id, 900, Utc::now()).await,
        Err(StoreError::NotFound)
    ));
}
