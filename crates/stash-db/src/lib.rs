//! # stash-db
//!
//! PostgreSQL database layer for the stash item repository.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for items and categories
//! - First-boot schema migrations (behind the `migrations` feature)
//!
//! ## Example
//!
//! ```rust,ignore
//! use stash_db::Database;
//! use stash_core::{CreateItemRequest, ItemRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/stash").await?;
//!
//!     let id = db.items.insert(CreateItemRequest {
//!         title: "Intro to Databases".to_string(),
//!         content: "lecture notes".to_string(),
//!         category: "computer-science".to_string(),
//!         chapter: "3".to_string(),
//!         file: String::new(),
//!         file_type: None,
//!         created_by: "student@example.com".to_string(),
//!         created_by_name: "Student".to_string(),
//!     }).await?;
//!
//!     println!("Created item: {}", id);
//!     Ok(())
//! }
//! ```

pub mod categories;
pub mod items;
pub mod pool;

// Re-export core types
pub use stash_core::*;

// Re-export repository implementations
pub use categories::PgCategoryRepository;
pub use items::PgItemRepository;
pub use pool::{create_lazy_pool, create_pool, create_pool_with_config, PoolConfig};

/// Escape LIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Item repository for CRUD and search operations.
    pub items: PgItemRepository,
    /// Category repository for the listing endpoint.
    pub categories: PgCategoryRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            items: PgItemRepository::new(pool.clone()),
            categories: PgCategoryRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Create a Database over a lazy pool that connects on first use.
    pub fn connect_lazy(url: &str) -> Result<Self> {
        let pool = create_lazy_pool(url)?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_passthrough() {
        assert_eq!(escape_like("plain words"), "plain words");
    }

    #[test]
    fn test_escape_like_wildcards() {
        assert_eq!(escape_like("50%"), "50\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
    }
}
