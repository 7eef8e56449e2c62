//! Ranked catalogue search.
//!
//! Translates a search request into the store's full-text query (or the
//! blank-query filter path) and shapes the paginated response. The external
//! fallback is composed one level up, in the catalogue service.

mod engine;
mod types;

pub use engine::SearchEngine;
pub use types::*;
