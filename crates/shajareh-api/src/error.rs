//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use shajareh_core::{DomainError, Error as CoreError};
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("unprocessable: {0}")]
  Unprocessable(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Map a backend error onto an HTTP-shaped one. Domain errors keep their
  /// message and get a precise status; anything else is a 500.
  pub fn from_store<E>(e: E) -> Self
  where
    E: std::error::Error + DomainError + Send + Sync + 'static,
  {
    let Some(domain) = e.domain() else {
      return ApiError::Store(Box::new(e));
    };
    match domain {
      CoreError::PersonNotFound(_)
      | CoreError::RequestNotFound(_)
      | CoreError::AccessRequestNotFound(_) => {
        ApiError::NotFound(e.to_string())
      }
      CoreError::PermissionDenied => ApiError::Forbidden(e.to_string()),
      CoreError::DuplicateParent { .. }
      | CoreError::PersonHasDependents(_)
      | CoreError::LoopInTree(_)
      | CoreError::StatusPriority { .. }
      | CoreError::DuplicateRequest { .. }
      | CoreError::AlreadyApproved(_) => ApiError::Conflict(e.to_string()),
      CoreError::SelfSpouse(_)
      | CoreError::NoSimilarSelected(_)
      | CoreError::InvalidCandidate(_) => {
        ApiError::Unprocessable(e.to_string())
      }
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Unprocessable(m) => {
        (StatusCode::UNPROCESSABLE_ENTITY, m.clone())
      }
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
