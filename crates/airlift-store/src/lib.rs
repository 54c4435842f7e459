//! Durable key-value persistence seam for Airlift.
//!
//! The update engine only ever talks to [`KeyValueStore`]: an async,
//! string-valued store with per-key atomicity and no cross-key transactions.
//! Two implementations ship with the crate:
//! - [`MemoryStore`] for tests and hosts without stable disk access.
//! - [`JsonFileStore`], a single JSON file rewritten atomically on every
//!   mutation.
//!
//! Values are stored as plaintext. Hosts that need confidentiality should
//! wrap the trait with their own encrypting adapter.

mod error;
mod file;
mod memory;
mod traits;

pub use error::StoreError;
pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use traits::KeyValueStore;
