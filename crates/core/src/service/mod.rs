//! The catalogue service: the public read/write facade over store, caches,
//! coalescer, search engine, upstream client and syncer.

mod catalogue;
mod error;

pub use catalogue::{BulkResult, CatalogueService, CreateManhwa};
pub use error::ServiceError;
