//! JSON REST API for Shajareh.
//!
//! Exposes an axum [`Router`] backed by any
//! [`shajareh_core::store::GraphStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility; acting users are explicit parameters.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", shajareh_api::api_router(store.clone(), events.clone()))
//! ```

pub mod access;
pub mod error;
pub mod matching;
pub mod persons;
pub mod tree;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use shajareh_core::{event::EventBus, store::GraphStore};

pub use error::ApiError;

/// Shared handler state: the store plus the outbound event bus.
pub struct ApiState<S> {
  pub store:  Arc<S>,
  pub events: EventBus,
}

// Manual impl: `S` itself need not be `Clone` behind the `Arc`.
impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), events: self.events.clone() }
  }
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, events: EventBus) -> Router<()>
where
  S: GraphStore + 'static,
{
  Router::new()
    // Persons
    .route("/persons", get(persons::list::<S>).post(persons::create::<S>))
    .route("/persons/find-me", get(persons::find_me::<S>))
    .route(
      "/persons/{id}",
      get(persons::get_one::<S>)
        .patch(persons::update::<S>)
        .delete(persons::delete::<S>),
    )
    .route("/persons/{id}/relatives", post(persons::add_relative::<S>))
    .route("/persons/{id}/tree", get(tree::handler::<S>))
    // Matching workflow
    .route("/matching/{id}", get(matching::get_one::<S>))
    .route("/matching/{id}/choices", get(matching::choices::<S>))
    .route("/matching/{id}/similar", post(matching::set_similar::<S>))
    .route("/matching/{id}/confirm", post(matching::confirm::<S>))
    .route("/matching/{id}/reject", post(matching::reject::<S>))
    .route("/matching/{id}/undo", post(matching::undo::<S>))
    .route(
      "/matching/{id}/remove-similar",
      post(matching::remove_similar::<S>),
    )
    .route("/matching/bulk", post(matching::bulk::<S>))
    // Tree visibility
    .route("/persons/{id}/access-requests", post(access::request::<S>))
    .route("/access-requests/{id}/approve", post(access::approve::<S>))
    .with_state(ApiState { store, events })
}
