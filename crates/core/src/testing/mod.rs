//! Test doubles and fixtures.
//!
//! The store is cheap enough to use for real (`SqliteStore::in_memory`);
//! mocks cover the seams that would otherwise need a network: the upstream
//! catalogue and the sync executor.

mod mock_sync_executor;
mod mock_upstream;

pub mod fixtures;

pub use mock_sync_executor::MockSyncExecutor;
pub use mock_upstream::MockUpstream;
