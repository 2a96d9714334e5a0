//! Handler for `GET /persons/:id/tree`.
//!
//! `?direction=ancestors|descendants` picks the walk (ancestors by
//! default); `?as_user=` is the viewer and must pass the visibility gate.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use shajareh_core::{
  store::GraphStore,
  tree::{AncestorTree, DescendantTree},
};
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  #[default]
  Ancestors,
  Descendants,
}

#[derive(Debug, Deserialize)]
pub struct TreeParams {
  #[serde(default)]
  pub direction: Direction,
  pub as_user:   Uuid,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TreeResponse {
  Ancestors(AncestorTree),
  Descendants(DescendantTree),
}

/// `GET /persons/:id/tree?as_user=<uuid>[&direction=descendants]`
pub async fn handler<S: GraphStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<TreeParams>,
) -> Result<Json<TreeResponse>, ApiError> {
  let allowed = state
    .store
    .can_see_tree(id, params.as_user)
    .await
    .map_err(ApiError::from_store)?;
  if !allowed {
    return Err(ApiError::Forbidden(format!(
      "user {} may not view the tree of person {id}",
      params.as_user
    )));
  }

  let response = match params.direction {
    Direction::Ancestors => state
      .store
      .ancestor_tree(id)
      .await
      .map_err(ApiError::from_store)?
      .map(TreeResponse::Ancestors),
    Direction::Descendants => state
      .store
      .descendant_tree(id)
      .await
      .map_err(ApiError::from_store)?
      .map(TreeResponse::Descendants),
  };

  response
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("person {id} not found")))
}
