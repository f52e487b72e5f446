//! Core data models for the stash item repository.
//!
//! These types are shared across the stash crates and represent the wire
//! and storage shape of the single domain entity, the item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// ITEM
// =============================================================================

/// A stored item, as persisted and as serialized to clients.
///
/// The attachment is carried as base64 text in `file`, with its MIME type
/// in `file_type`. Timestamps are assigned by the store: `created_at_utc`
/// at insert, `updated_at_utc` at insert and on every update.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub chapter: String,
    pub file: String,
    pub file_type: Option<String>,
    pub created_by: String,
    pub created_by_name: String,
    #[serde(rename = "createdAt")]
    pub created_at_utc: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at_utc: DateTime<Utc>,
}

/// Reject an empty required field.
fn require_non_empty(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", name)));
    }
    Ok(())
}

// =============================================================================
// REQUESTS
// =============================================================================

/// Payload for creating an item. The id and both timestamps are assigned
/// server-side.
///
/// Every field defaults to empty when absent from the body; presence of
/// the required ones is checked by [`validate`](Self::validate), which
/// keeps "field missing" and "field empty" on the same 400 path.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateItemRequest {
    pub title: String,
    pub content: String,
    pub category: String,
    pub chapter: String,
    /// Base64-encoded attachment; may be empty.
    pub file: String,
    pub file_type: Option<String>,
    pub created_by: String,
    pub created_by_name: String,
}

impl CreateItemRequest {
    /// Check required fields before any side effect.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("title", &self.title)?;
        require_non_empty("category", &self.category)?;
        require_non_empty("chapter", &self.chapter)?;
        require_non_empty("createdBy", &self.created_by)?;
        Ok(())
    }
}

/// Payload for updating an item in place.
///
/// `created_by` is required for validation parity with create but is never
/// written; `file_type` is not updatable at all.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateItemRequest {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub chapter: String,
    pub file: String,
    pub created_by: String,
    pub created_by_name: String,
}

impl UpdateItemRequest {
    /// Check required fields before any side effect.
    pub fn validate(&self) -> Result<()> {
        require_non_empty("title", &self.title)?;
        require_non_empty("category", &self.category)?;
        require_non_empty("chapter", &self.chapter)?;
        require_non_empty("createdBy", &self.created_by)?;
        Ok(())
    }
}

/// Search filters for the general search endpoint. Every field is optional
/// on the wire; empty strings mean "no filter".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItemsRequest {
    #[serde(default)]
    pub search_term: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub chapter: String,
    #[serde(default)]
    pub sort_option: String,
}

/// Search filters for the "my items" endpoint: the general filters plus the
/// caller-supplied author identity.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMyItemsRequest {
    #[serde(default)]
    pub search_term: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub chapter: String,
    #[serde(default)]
    pub sort_option: String,
    #[serde(default)]
    pub user_email: String,
}

/// Batch of item ids to delete.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteItemsRequest {
    pub item_ids: Vec<String>,
}

// =============================================================================
// SORTING
// =============================================================================

/// Closed set of search orderings.
///
/// Parsed from the wire `sortOption` string; anything outside the four
/// known values maps to `Unsorted` (store-default order). That fallback is
/// deliberate, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOption {
    CreatedAtDesc,
    CreatedAtAsc,
    UpdatedAtDesc,
    UpdatedAtAsc,
    #[default]
    Unsorted,
}

impl SortOption {
    /// Parse the wire representation.
    pub fn parse(s: &str) -> Self {
        match s {
            "createdAt" => SortOption::CreatedAtDesc,
            "-createdAt" => SortOption::CreatedAtAsc,
            "updatedAt" => SortOption::UpdatedAtDesc,
            "-updatedAt" => SortOption::UpdatedAtAsc,
            _ => SortOption::Unsorted,
        }
    }

    /// ORDER BY fragment for this ordering. Static text only; user input
    /// never reaches the SQL string.
    pub fn order_clause(&self) -> Option<&'static str> {
        match self {
            SortOption::CreatedAtDesc => Some("ORDER BY created_at_utc DESC"),
            SortOption::CreatedAtAsc => Some("ORDER BY created_at_utc"),
            SortOption::UpdatedAtDesc => Some("ORDER BY updated_at_utc DESC"),
            SortOption::UpdatedAtAsc => Some("ORDER BY updated_at_utc"),
            SortOption::Unsorted => None,
        }
    }
}
