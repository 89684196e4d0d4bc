//! Unit tests for database initialization
//!
//! Tests cover:
//! - Automatic database creation with default schema
//! - Reopening an existing database
//! - Schema constraints the entity stores rely on

use photosku_common::db::{get_schema_version, init_database, init_memory_database, CURRENT_SCHEMA_VERSION};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("photosku.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("photosku.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO users (guid, external_id) VALUES ('u1', 42)")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.as_ref().err());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool2.unwrap())
        .await
        .unwrap();
    assert_eq!(count, 1, "Existing rows must survive reopening");
}

#[tokio::test]
async fn test_schema_version_recorded() {
    let pool = init_memory_database().await.unwrap();

    assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_all_tables_created() {
    let pool = init_memory_database().await.unwrap();

    for table in ["users", "photos", "article_numbers", "photo_articles", "schema_version"] {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "table {} missing", table);
    }
}

#[tokio::test]
async fn test_new_user_defaults_to_idle() {
    let pool = init_memory_database().await.unwrap();

    sqlx::query("INSERT INTO users (guid, external_id) VALUES ('u1', 7)")
        .execute(&pool)
        .await
        .unwrap();

    let state: String = sqlx::query_scalar("SELECT conversation_state FROM users WHERE external_id = 7")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(state, "idle");
}

#[tokio::test]
async fn test_article_numbers_are_unique() {
    let pool = init_memory_database().await.unwrap();

    sqlx::query("INSERT INTO article_numbers (guid, number) VALUES ('a1', '1.2345')")
        .execute(&pool)
        .await
        .unwrap();
    let duplicate = sqlx::query("INSERT INTO article_numbers (guid, number) VALUES ('a2', '1.2345')")
        .execute(&pool)
        .await;

    assert!(duplicate.is_err(), "Duplicate article number must be rejected");
}

#[tokio::test]
async fn test_apply_state_is_constrained() {
    let pool = init_memory_database().await.unwrap();

    sqlx::query("INSERT INTO users (guid, external_id) VALUES ('u1', 1)")
        .execute(&pool)
        .await
        .unwrap();
    let bad = sqlx::query(
        "INSERT INTO photos (guid, owner_id, object_key, apply_state) VALUES ('p1', 'u1', 'k1', 'not_applied')",
    )
    .execute(&pool)
    .await;

    assert!(bad.is_err(), "Only pending/applied are valid apply states");
}

#[tokio::test]
async fn test_deleting_photo_cascades_associations() {
    let pool = init_memory_database().await.unwrap();

    sqlx::query("INSERT INTO users (guid, external_id) VALUES ('u1', 1)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO photos (guid, owner_id, object_key, apply_state) VALUES ('p1', 'u1', 'k1', 'applied')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO article_numbers (guid, number) VALUES ('a1', '1.2345')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO photo_articles (photo_id, article_id) VALUES ('p1', 'a1')")
        .execute(&pool)
        .await
        .unwrap();

    sqlx::query("DELETE FROM photos WHERE guid = 'p1'")
        .execute(&pool)
        .await
        .unwrap();

    let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM photo_articles")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(links, 0);
}
