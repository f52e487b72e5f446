//! # stash-core
//!
//! Core types, traits, and abstractions for the stash item repository.
//!
//! This crate provides the domain model, the repository traits the
//! database layer implements, the error taxonomy, and ULID identifier
//! generation.

pub mod error;
pub mod id;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use id::{extract_millis, extract_timestamp, is_valid_item_id, new_item_id, ITEM_ID_LEN};
pub use models::*;
pub use traits::*;
