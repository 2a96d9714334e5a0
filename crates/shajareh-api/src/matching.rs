//! Handlers for the `/matching` workflow endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/matching/:id` | The request itself |
//! | `GET`  | `/matching/:id/choices` | Disambiguation list, sentinel first |
//! | `POST` | `/matching/:id/similar` | Body: `{"similar_person_id": <uuid or null>}` |
//! | `POST` | `/matching/:id/confirm` | Apply the merge |
//! | `POST` | `/matching/:id/reject` | |
//! | `POST` | `/matching/:id/undo` | |
//! | `POST` | `/matching/:id/remove-similar` | |
//! | `POST` | `/matching/bulk` | Body: [`BulkBody`]; partial success intended |

use axum::{
  Json,
  extract::{Path, State},
};
use serde::Deserialize;
use shajareh_core::{
  event::EventKind,
  matching::{BatchOutcome, MatchingRequest},
  matchmaker::{MatchChoice, labeled_choices},
  store::GraphStore,
};
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /matching/:id`
pub async fn get_one<S: GraphStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<MatchingRequest>, ApiError> {
  let request = require_request(&state, id).await?;
  Ok(Json(request))
}

async fn require_request<S: GraphStore>(
  state: &ApiState<S>,
  id: Uuid,
) -> Result<MatchingRequest, ApiError> {
  state
    .store
    .get_request(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("matching request {id} not found")))
}

// ─── Choices ──────────────────────────────────────────────────────────────────

/// `GET /matching/:id/choices`
pub async fn choices<S: GraphStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<MatchChoice>>, ApiError> {
  let request = require_request(&state, id).await?;
  let anchor = state
    .store
    .get_person(request.person_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("person {} not found", request.person_id))
    })?;

  let candidates = state
    .store
    .match_candidates(request.related_person_id, Some(request.person_id))
    .await
    .map_err(ApiError::from_store)?;

  Ok(Json(labeled_choices(anchor.gender, request.relation, &candidates)))
}

// ─── Transitions ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SetSimilarBody {
  /// `null` means "none of these".
  pub similar_person_id: Option<Uuid>,
}

/// `POST /matching/:id/similar`
pub async fn set_similar<S: GraphStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<SetSimilarBody>,
) -> Result<Json<MatchingRequest>, ApiError> {
  let request = state
    .store
    .set_similar(id, body.similar_person_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(request))
}

/// `POST /matching/:id/confirm`
pub async fn confirm<S: GraphStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<MatchingRequest>, ApiError> {
  let request = state
    .store
    .confirm_matching(id)
    .await
    .map_err(ApiError::from_store)?;

  tracing::info!(request = %id, "matching confirmed");
  // Tell the owner of the record that just gained an edge.
  if let Some(similar_id) = request.similar_person_id
    && let Ok(Some(similar)) = state.store.get_person(similar_id).await
  {
    state.events.emit(similar.created_by, EventKind::MatchConfirmed);
  }

  Ok(Json(request))
}

/// `POST /matching/:id/reject`
pub async fn reject<S: GraphStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<MatchingRequest>, ApiError> {
  let request = state
    .store
    .reject_matching(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(request))
}

/// `POST /matching/:id/undo`
pub async fn undo<S: GraphStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<MatchingRequest>, ApiError> {
  let request = state
    .store
    .undo_matching(id)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(request = %id, "matching undone");
  Ok(Json(request))
}

/// `POST /matching/:id/remove-similar`
pub async fn remove_similar<S: GraphStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<MatchingRequest>, ApiError> {
  let request = state
    .store
    .remove_similar(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(request))
}

// ─── Bulk ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
  Confirm,
  Undo,
  Reject,
}

#[derive(Debug, Deserialize)]
pub struct BulkBody {
  pub action:      BulkAction,
  pub request_ids: Vec<Uuid>,
}

/// `POST /matching/bulk` — applies `action` per item; wrong-status items
/// are reported in `failed` without aborting the rest.
pub async fn bulk<S: GraphStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<BulkBody>,
) -> Result<Json<BatchOutcome>, ApiError> {
  let outcome = match body.action {
    BulkAction::Confirm => state.store.confirm_many(body.request_ids).await,
    BulkAction::Undo => state.store.undo_many(body.request_ids).await,
    BulkAction::Reject => state.store.reject_many(body.request_ids).await,
  }
  .map_err(ApiError::from_store)?;

  if !outcome.failed.is_empty() {
    tracing::warn!(
      failed = outcome.failed.len(),
      succeeded = outcome.succeeded.len(),
      "bulk matching operation partially failed"
    );
  }
  Ok(Json(outcome))
}
