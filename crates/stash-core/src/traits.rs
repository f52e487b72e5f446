//! Repository traits for the stash item store.
//!
//! These traits define the interfaces concrete store implementations must
//! satisfy, keeping the HTTP layer testable against substitutes.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

/// Filters for one search query against the item table.
///
/// Built by the HTTP layer from a decoded search request; `created_by`
/// distinguishes the two search operations: `Some` is the "my items"
/// search and always becomes an exact-match author condition (even when
/// the value is empty), `None` is the general search and adds none.
#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    /// Substring match against title; empty matches everything.
    pub search_term: String,
    /// Exact category match; empty means no category condition.
    pub category: String,
    /// Exact chapter match; empty means no chapter condition.
    pub chapter: String,
    /// Result ordering.
    pub sort: SortOption,
    /// Author filter for the "my items" search.
    pub created_by: Option<String>,
}

impl ItemQuery {
    /// Build the general-search query from wire filters.
    pub fn from_search(req: SearchItemsRequest) -> Self {
        Self {
            search_term: req.search_term,
            category: req.category,
            chapter: req.chapter,
            sort: SortOption::parse(&req.sort_option),
            created_by: None,
        }
    }

    /// Build the "my items" query from wire filters. The author condition
    /// is always present, regardless of whether `userEmail` was supplied.
    pub fn from_mine(req: SearchMyItemsRequest) -> Self {
        Self {
            search_term: req.search_term,
            category: req.category,
            chapter: req.chapter,
            sort: SortOption::parse(&req.sort_option),
            created_by: Some(req.user_email),
        }
    }
}

/// Repository for item CRUD operations.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Validate and insert a new item, returning its generated id.
    async fn insert(&self, req: CreateItemRequest) -> Result<String>;

    /// Search items with optional filters and ordering. Returns an empty
    /// vector when nothing matches.
    async fn search(&self, query: ItemQuery) -> Result<Vec<Item>>;

    /// Validate and overwrite the mutable fields of the item with the
    /// given id, refreshing its update timestamp. Updating a nonexistent
    /// id is a silent success.
    async fn update(&self, req: UpdateItemRequest) -> Result<()>;

    /// Delete each id in the batch, sequentially. Missing ids are skipped
    /// without error; the first store failure aborts the rest of the
    /// batch and already-applied deletes stay applied.
    async fn delete_batch(&self, ids: &[String]) -> Result<()>;
}

/// Repository for the category listing.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// All category names, ordered by name.
    async fn list_names(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_search_has_no_author_filter() {
        let q = ItemQuery::from_search(SearchItemsRequest {
            search_term: "db".to_string(),
            category: "cs".to_string(),
            chapter: String::new(),
            sort_option: "createdAt".to_string(),
        });
        assert_eq!(q.created_by, None);
        assert_eq!(q.sort, SortOption::CreatedAtDesc);
    }

    #[test]
    fn test_from_mine_always_carries_author_filter() {
        let q = ItemQuery::from_mine(SearchMyItemsRequest {
            user_email: String::new(),
            ..Default::default()
        });
        // Empty email still becomes a bound condition, matching no rows
        // rather than widening into a general search.
        assert_eq!(q.created_by, Some(String::new()));
    }
}
