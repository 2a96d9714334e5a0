//! SQLite backend for the Shajareh genealogy graph.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Every mutating `GraphStore`
//! method executes its query body inside one `rusqlite` transaction; a
//! failure anywhere in the body rolls the whole operation back.

mod encode;
mod queries;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
