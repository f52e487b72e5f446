//! Category repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use stash_core::{CategoryRepository, Error, Result};

/// PostgreSQL implementation of CategoryRepository.
pub struct PgCategoryRepository {
    pool: Pool<Postgres>,
}

impl PgCategoryRepository {
    /// Create a new PgCategoryRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for PgCategoryRepository {
    async fn list_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM category ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let names = rows
            .into_iter()
            .map(|row| {
                row.try_get("name")
                    .map_err(|e| Error::RowDecode(e.to_string()))
            })
            .collect::<Result<Vec<String>>>()?;

        debug!(
            subsystem = "db",
            component = "categories",
            op = "list_names",
            result_count = names.len(),
            "Categories listed"
        );
        Ok(names)
    }
}
