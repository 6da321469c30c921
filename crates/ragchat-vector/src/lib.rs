//! Vector index management over two backends: a brute-force flat index and LanceDB.
//!
//! [`IndexManager`] embeds chunks, builds a [`VectorIndex`] of the configured
//! [`IndexBackend`], persists it with a `manifest.json`, and reloads it
//! without re-embedding.

pub mod backend;
pub mod flat;
pub mod lance;
pub mod manager;
pub mod manifest;
pub mod schema;
pub mod table;

pub use backend::IndexBackend;
pub use manager::{IndexManager, VectorIndex};
pub use manifest::Manifest;
