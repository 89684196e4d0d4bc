//! SQLite entity store
//!
//! UUIDs are stored as TEXT in `guid` columns. Schema lives in
//! `photosku_common::db::init`.

use async_trait::async_trait;
use photosku_common::db::{
    ArticleNumber, ConversationState, ExternalId, Photo, PhotoUpdate, User, UserProfile,
    UserUpdate,
};
use photosku_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::warn;
use uuid::Uuid;

use super::EntityStore;

const USER_COLUMNS: &str = "guid, external_id, username, first_name, last_name, language_code, is_bot, conversation_state";
const PHOTO_COLUMNS: &str = "p.guid, p.owner_id, p.object_key, p.apply_state";

#[derive(Clone)]
pub struct SqliteEntityStore {
    pool: SqlitePool,
}

impl SqliteEntityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn parse_guid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let raw: String = row.get(column);
    Uuid::parse_str(&raw)
        .map_err(|e| Error::Internal(format!("Invalid UUID in column {}: '{}' ({})", column, raw, e)))
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let id = parse_guid(row, "guid")?;
    let state_str: String = row.get("conversation_state");
    let conversation_state = state_str.parse().unwrap_or_else(|_| {
        warn!(user_id = %id, state = %state_str, "Unknown conversation state, treating as idle");
        ConversationState::Idle
    });

    Ok(User {
        id,
        external_id: row.get("external_id"),
        profile: UserProfile {
            username: row.get("username"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            language_code: row.get("language_code"),
            is_bot: row.get("is_bot"),
        },
        conversation_state,
    })
}

fn photo_from_row(row: &SqliteRow) -> Result<Photo> {
    let apply_state: String = row.get("apply_state");
    Ok(Photo {
        id: parse_guid(row, "guid")?,
        owner_id: parse_guid(row, "owner_id")?,
        object_key: parse_guid(row, "object_key")?,
        apply_state: apply_state.parse()?,
    })
}

fn article_from_row(row: &SqliteRow) -> Result<ArticleNumber> {
    Ok(ArticleNumber {
        id: parse_guid(row, "guid")?,
        number: row.get("number"),
    })
}

#[async_trait]
impl EntityStore for SqliteEntityStore {
    async fn get_user_by_external_id(&self, external_id: ExternalId) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE external_id = ?", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn upsert_user(&self, external_id: ExternalId, profile: &UserProfile) -> Result<User> {
        sqlx::query(
            r#"
            INSERT INTO users (
                guid, external_id, username, first_name, last_name, language_code, is_bot,
                conversation_state, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 'idle', CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            ON CONFLICT(external_id) DO UPDATE SET
                username = excluded.username,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                language_code = excluded.language_code,
                is_bot = excluded.is_bot,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(external_id)
        .bind(&profile.username)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.language_code)
        .bind(profile.is_bot)
        .execute(&self.pool)
        .await?;

        self.get_user_by_external_id(external_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user with external id {}", external_id)))
    }

    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        let profile = update.profile.as_ref();
        let result = sqlx::query(
            r#"
            UPDATE users SET
                username = COALESCE(?, username),
                first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                language_code = COALESCE(?, language_code),
                is_bot = COALESCE(?, is_bot),
                conversation_state = COALESCE(?, conversation_state),
                updated_at = CURRENT_TIMESTAMP
            WHERE guid = ?
            "#,
        )
        .bind(profile.map(|p| p.username.clone()))
        .bind(profile.map(|p| p.first_name.clone()))
        .bind(profile.map(|p| p.last_name.clone()))
        .bind(profile.map(|p| p.language_code.clone()))
        .bind(profile.map(|p| p.is_bot))
        .bind(update.conversation_state.map(|s| s.as_str()))
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("user {}", user_id)));
        }
        Ok(())
    }

    async fn create_photo(&self, photo: &Photo) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO photos (guid, owner_id, object_key, apply_state, created_at, updated_at)
            VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            "#,
        )
        .bind(photo.id.to_string())
        .bind(photo.owner_id.to_string())
        .bind(photo.object_key.to_string())
        .bind(photo.apply_state.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_photo(&self, photo_id: Uuid, update: PhotoUpdate) -> Result<()> {
        let Some(apply_state) = update.apply_state else {
            return Ok(());
        };

        let result = sqlx::query(
            "UPDATE photos SET apply_state = ?, updated_at = CURRENT_TIMESTAMP WHERE guid = ?",
        )
        .bind(apply_state.as_str())
        .bind(photo_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("photo {}", photo_id)));
        }
        Ok(())
    }

    async fn list_pending_photos_for_user(&self, owner_id: Uuid) -> Result<Vec<Photo>> {
        let sql = format!(
            "SELECT {} FROM photos p WHERE p.owner_id = ? AND p.apply_state = 'pending' ORDER BY p.rowid",
            PHOTO_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(owner_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(photo_from_row).collect()
    }

    async fn delete_photo(&self, photo_id: Uuid) -> Result<()> {
        // photo_articles rows go with it (ON DELETE CASCADE)
        sqlx::query("DELETE FROM photos WHERE guid = ?")
            .bind(photo_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_photo(&self, photo_id: Uuid) -> Result<Option<Photo>> {
        let sql = format!("SELECT {} FROM photos p WHERE p.guid = ?", PHOTO_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(photo_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(photo_from_row).transpose()
    }

    async fn get_article_by_name(&self, number: &str) -> Result<Option<ArticleNumber>> {
        let row = sqlx::query("SELECT guid, number FROM article_numbers WHERE number = ?")
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(article_from_row).transpose()
    }

    async fn create_article(&self, number: &str) -> Result<ArticleNumber> {
        let article = ArticleNumber::new(number);
        sqlx::query(
            "INSERT INTO article_numbers (guid, number, created_at) VALUES (?, ?, CURRENT_TIMESTAMP)",
        )
        .bind(article.id.to_string())
        .bind(&article.number)
        .execute(&self.pool)
        .await?;

        Ok(article)
    }

    async fn add_association(&self, photo_id: Uuid, article_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO photo_articles (photo_id, article_id, created_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            "#,
        )
        .bind(photo_id.to_string())
        .bind(article_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_association(&self, photo_id: Uuid, article_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM photo_articles WHERE photo_id = ? AND article_id = ?")
            .bind(photo_id.to_string())
            .bind(article_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_photos_for_article(&self, article_id: Uuid) -> Result<Vec<Photo>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM photos p
            JOIN photo_articles pa ON pa.photo_id = p.guid
            WHERE pa.article_id = ?
            ORDER BY pa.seq
            "#,
            PHOTO_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(article_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(photo_from_row).collect()
    }

    async fn list_articles_for_photo(&self, photo_id: Uuid) -> Result<Vec<ArticleNumber>> {
        let rows = sqlx::query(
            r#"
            SELECT a.guid, a.number
            FROM article_numbers a
            JOIN photo_articles pa ON pa.article_id = a.guid
            WHERE pa.photo_id = ?
            ORDER BY pa.seq
            "#,
        )
        .bind(photo_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(article_from_row).collect()
    }
}
