//! Shared building blocks for the ragchat workspace: configuration, the error
//! taxonomy, domain types, the document loader and the response cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod splitter;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
