//! Live Update Entity Storage
//!
//! Durable key-value storage for Live Update entities. Each entity name owns
//! up to two rows, a state row (lifecycle clock) and a content row (payload
//! clock), accessed through the async [`EntityStore`] contract.
//!
//! Two implementations are provided: [`SqliteStore`] for durable storage
//! (one SQLite file, WAL mode, embedded migrations) and [`MemoryStore`] for
//! tests and hosts that do not persist across restarts.

pub mod error;
pub mod memory;
pub mod models;
pub mod sqlite;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use models::{ActiveUpdate, ContentRecord, StateRecord, StoredUpdate};
pub use sqlite::SqliteStore;
pub use store::EntityStore;
