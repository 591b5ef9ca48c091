//! Ebook record operations

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::Result;

/// Reading position given to a freshly ingested book
pub const INITIAL_LOCATION: &str = "0";

/// Ebook record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ebook {
    pub id: String,
    pub title: String,
    pub authors: String,
    pub created_at: String,
    pub updated_at: String,
    pub location: String,
    pub current_text: String,
}

/// Fields needed to create a record
#[derive(Debug, Clone)]
pub struct NewEbook {
    pub id: String,
    pub title: String,
    pub authors: String,
}

/// Reading position update request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub location: String,
    #[serde(default)]
    pub current_text: String,
}

/// Ebook repository
pub struct EbookRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> EbookRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new record at the start of the book
    pub async fn create(&self, ebook: &NewEbook) -> Result<Ebook> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO ebooks (id, title, authors, created_at, updated_at, location, current_text)
            VALUES (?, ?, ?, ?, ?, ?, '')
            "#,
        )
        .bind(&ebook.id)
        .bind(ebook.title.trim())
        .bind(ebook.authors.trim())
        .bind(&now)
        .bind(&now)
        .bind(INITIAL_LOCATION)
        .execute(self.pool)
        .await?;

        tracing::debug!(id = %ebook.id, "Created ebook record");

        Ok(Ebook {
            id: ebook.id.clone(),
            title: ebook.title.trim().to_string(),
            authors: ebook.authors.trim().to_string(),
            created_at: now.clone(),
            updated_at: now,
            location: INITIAL_LOCATION.to_string(),
            current_text: String::new(),
        })
    }

    /// Get a record by id
    pub async fn get(&self, id: &str) -> Result<Option<Ebook>> {
        let ebook = sqlx::query_as::<_, Ebook>(
            r#"
            SELECT id, title, authors, created_at, updated_at, location, current_text
            FROM ebooks
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(ebook)
    }

    /// All records, newest first
    pub async fn list(&self) -> Result<Vec<Ebook>> {
        let ebooks = sqlx::query_as::<_, Ebook>(
            r#"
            SELECT id, title, authors, created_at, updated_at, location, current_text
            FROM ebooks
            ORDER BY created_at DESC, id
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(ebooks)
    }

    /// Store the reader's position. Returns `None` if the record is missing.
    pub async fn update_location(&self, id: &str, update: &LocationUpdate) -> Result<Option<Ebook>> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            UPDATE ebooks
            SET location = ?, current_text = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.location)
        .bind(&update.current_text)
        .bind(&now)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get(id).await
    }
}
