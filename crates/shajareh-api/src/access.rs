//! Handlers for tree-visibility requests.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/persons/:id/access-requests` | Body: `{"applicant_id": <uuid>}`; 409 while one is pending |
//! | `POST` | `/access-requests/:id/approve` | Owner-side approval |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use shajareh_core::{
  access::PermissionRequest, event::EventKind, store::GraphStore,
};
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct RequestBody {
  pub applicant_id: Uuid,
}

/// `POST /persons/:id/access-requests` — returns 201.
pub async fn request<S: GraphStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<RequestBody>,
) -> Result<impl IntoResponse, ApiError> {
  let created = state
    .store
    .request_tree_access(id, body.applicant_id)
    .await
    .map_err(ApiError::from_store)?;

  // The owner is the one who has to act on it.
  if let Ok(Some(person)) = state.store.get_person(id).await {
    state
      .events
      .emit(person.created_by, EventKind::AccessRequestCreated);
  }

  Ok((StatusCode::CREATED, Json(created)))
}

/// `POST /access-requests/:id/approve`
pub async fn approve<S: GraphStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<PermissionRequest>, ApiError> {
  let approved = state
    .store
    .approve_tree_access(id)
    .await
    .map_err(ApiError::from_store)?;

  tracing::info!(
    request = %id,
    applicant = %approved.applicant_id,
    "tree access approved"
  );
  state
    .events
    .emit(approved.applicant_id, EventKind::AccessApproved);

  Ok(Json(approved))
}
