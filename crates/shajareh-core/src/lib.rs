//! Core types and trait definitions for the Shajareh genealogy graph.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod error;
pub mod event;
pub mod matching;
pub mod matchmaker;
pub mod person;
pub mod store;
pub mod tree;

pub use error::{DomainError, Error, Result};
