//! Item repository implementation.

use std::time::Instant;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sqlx::{Pool, Postgres};
use tracing::debug;

use stash_core::{
    new_item_id, CreateItemRequest, Error, Item, ItemQuery, ItemRepository, Result,
    UpdateItemRequest,
};

use crate::escape_like;

/// PostgreSQL implementation of ItemRepository.
pub struct PgItemRepository {
    pool: Pool<Postgres>,
}

impl PgItemRepository {
    /// Create a new PgItemRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Verify that the attachment payload decodes as base64.
///
/// The decoded bytes are discarded; storage keeps the base64 text. An
/// empty payload is fine (no attachment).
fn check_file_payload(file: &str) -> Result<()> {
    if file.is_empty() {
        return Ok(());
    }
    BASE64
        .decode(file)
        .map_err(|e| Error::Decode(format!("attachment is not valid base64: {}", e)))?;
    Ok(())
}

/// Build the search SELECT and its bound parameters.
///
/// The title condition is always present; an empty search term becomes
/// `%%` and matches every title. The author condition is appended whenever
/// the query carries one, category and chapter only when non-empty. ORDER
/// BY text comes from [`stash_core::SortOption`], never from user input.
fn build_search_query(query: &ItemQuery) -> (String, Vec<String>) {
    let mut sql = String::from(
        "SELECT id, title, content, category, chapter, file, file_type, \
         created_by, created_by_name, created_at_utc, updated_at_utc \
         FROM item WHERE title LIKE $1",
    );
    let mut params = vec![format!("%{}%", escape_like(&query.search_term))];
    let mut param_idx = 2;

    if let Some(author) = &query.created_by {
        sql.push_str(&format!(" AND created_by = ${}", param_idx));
        params.push(author.clone());
        param_idx += 1;
    }
    if !query.category.is_empty() {
        sql.push_str(&format!(" AND category = ${}", param_idx));
        params.push(query.category.clone());
        param_idx += 1;
    }
    if !query.chapter.is_empty() {
        sql.push_str(&format!(" AND chapter = ${}", param_idx));
        params.push(query.chapter.clone());
    }

    if let Some(order) = query.sort.order_clause() {
        sql.push(' ');
        sql.push_str(order);
    }

    (sql, params)
}

/// Distinguish row-decode failures from other store errors.
///
/// A row that cannot be mapped into [`Item`] aborts the whole request as a
/// row-decode error instead of being skipped.
fn classify_fetch_error(e: sqlx::Error) -> Error {
    match e {
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_) => Error::RowDecode(e.to_string()),
        other => Error::Database(other),
    }
}

#[async_trait]
impl ItemRepository for PgItemRepository {
    async fn insert(&self, req: CreateItemRequest) -> Result<String> {
        req.validate()?;
        check_file_payload(&req.file)?;
        let id = new_item_id()?;

        sqlx::query(
            "INSERT INTO item (id, title, content, category, chapter, file, file_type, \
             created_by, created_by_name) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&id)
        .bind(&req.title)
        .bind(&req.content)
        .bind(&req.category)
        .bind(&req.chapter)
        .bind(&req.file)
        .bind(&req.file_type)
        .bind(&req.created_by)
        .bind(&req.created_by_name)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "items",
            op = "insert",
            item_id = %id,
            "Item inserted"
        );
        Ok(id)
    }

    async fn search(&self, query: ItemQuery) -> Result<Vec<Item>> {
        let start = Instant::now();
        let (sql, params) = build_search_query(&query);

        let mut q = sqlx::query_as::<_, Item>(&sql);
        for param in &params {
            q = q.bind(param);
        }
        let items = q.fetch_all(&self.pool).await.map_err(classify_fetch_error)?;

        debug!(
            subsystem = "db",
            component = "items",
            op = "search",
            result_count = items.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Search complete"
        );
        Ok(items)
    }

    async fn update(&self, req: UpdateItemRequest) -> Result<()> {
        req.validate()?;
        check_file_payload(&req.file)?;

        // An id with no matching row affects zero rows and still succeeds.
        // That silent no-op is the contract; callers resubmitting an update
        // for a deleted item get a success, not a 404. file_type and
        // created_by are never touched here.
        sqlx::query(
            "UPDATE item SET title = $1, content = $2, category = $3, chapter = $4, \
             file = $5, created_by_name = $6, updated_at_utc = NOW() WHERE id = $7",
        )
        .bind(&req.title)
        .bind(&req.content)
        .bind(&req.category)
        .bind(&req.chapter)
        .bind(&req.file)
        .bind(&req.created_by_name)
        .bind(&req.id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "items",
            op = "update",
            item_id = %req.id,
            "Item updated"
        );
        Ok(())
    }

    async fn delete_batch(&self, ids: &[String]) -> Result<()> {
        // Per-id deletes, no surrounding transaction: the first failure
        // aborts the rest of the batch, deletes already applied stay
        // applied. A missing id deletes zero rows and is not an error.
        for id in ids {
            sqlx::query("DELETE FROM item WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;
        }

        debug!(
            subsystem = "db",
            component = "items",
            op = "delete_batch",
            result_count = ids.len(),
            "Batch delete complete"
        );
        Ok(())
    }
}
