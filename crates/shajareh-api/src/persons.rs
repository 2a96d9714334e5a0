//! Handlers for `/persons` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/persons` | All persons |
//! | `POST`   | `/persons` | Body: [`CreateBody`]; returns 201 |
//! | `GET`    | `/persons/:id` | Materialised view; 404 if not found |
//! | `PATCH`  | `/persons/:id` | Attribute edit; `as_user` must own the record |
//! | `DELETE` | `/persons/:id?as_user=` | Creator only; blocked while edges remain |
//! | `GET`    | `/persons/find-me` | Self-identification lookup |
//! | `POST`   | `/persons/:id/relatives` | Add a relative, maybe opening a matching request |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shajareh_core::{
  access,
  event::EventKind,
  matching::MatchingRequest,
  person::{
    Gender, NewPerson, Person, PersonSummary, PersonUpdate, PersonView,
    RelationKind,
  },
  store::{FindMeQuery, GraphStore},
};
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /persons`
pub async fn list<S: GraphStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<Person>>, ApiError> {
  let persons = state
    .store
    .list_persons()
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(persons))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /persons`, and flattened into
/// [`AddRelativeBody`] for `POST /persons/:id/relatives`.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub first_name:  String,
  pub last_name:   String,
  pub gender:      Gender,
  pub birth_year:  i16,
  pub birth_date:  Option<NaiveDate>,
  pub birth_place: Option<String>,
  pub death_year:  Option<i16>,
  pub death_date:  Option<NaiveDate>,
  pub user_id:     Option<Uuid>,
  pub created_by:  Uuid,
}

impl From<CreateBody> for NewPerson {
  fn from(b: CreateBody) -> Self {
    NewPerson {
      first_name:  b.first_name,
      last_name:   b.last_name,
      gender:      b.gender,
      birth_year:  b.birth_year,
      birth_date:  b.birth_date,
      birth_place: b.birth_place,
      death_year:  b.death_year,
      death_date:  b.death_date,
      user_id:     b.user_id,
      created_by:  b.created_by,
    }
  }
}

/// `POST /persons` — returns 201 + the stored person.
pub async fn create<S: GraphStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let person = state
    .store
    .create_person(NewPerson::from(body))
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(person)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /persons/:id`
pub async fn get_one<S: GraphStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<PersonView>, ApiError> {
  let view = state
    .store
    .person_view(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("person {id} not found")))?;
  Ok(Json(view))
}

// ─── Update ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  /// The acting user; must be the creator or the linked account-holder.
  pub as_user: Uuid,
  #[serde(flatten)]
  pub fields:  PersonUpdate,
}

/// `PATCH /persons/:id`
pub async fn update<S: GraphStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<Person>, ApiError> {
  let person = state
    .store
    .get_person(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("person {id} not found")))?;
  if !access::can_update(&person, body.as_user) {
    return Err(ApiError::Forbidden(format!(
      "user {} may not edit person {id}",
      body.as_user
    )));
  }

  let person = state
    .store
    .update_person(id, body.fields)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(person))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
  pub as_user: Uuid,
}

/// `DELETE /persons/:id?as_user=<uuid>`
pub async fn delete<S: GraphStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<DeleteParams>,
) -> Result<StatusCode, ApiError> {
  let person = state
    .store
    .get_person(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("person {id} not found")))?;
  if !access::can_delete(&person, params.as_user) {
    return Err(ApiError::Forbidden(format!(
      "user {} may not delete person {id}",
      params.as_user
    )));
  }

  state
    .store
    .delete_person(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Find me ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct FindMeParams {
  pub first_name:  String,
  pub last_name:   String,
  #[serde(default)]
  pub father_name: String,
  #[serde(default)]
  pub mother_name: String,
}

/// `GET /persons/find-me?first_name=...&last_name=...[&father_name=...][&mother_name=...]`
pub async fn find_me<S: GraphStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<FindMeParams>,
) -> Result<Json<Vec<PersonSummary>>, ApiError> {
  let query = FindMeQuery {
    first_name:  params.first_name,
    last_name:   params.last_name,
    father_name: params.father_name,
    mother_name: params.mother_name,
  };
  let hits = state
    .store
    .find_me(&query)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(hits))
}

// ─── Add relative ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AddRelativeBody {
  pub relation: RelationKind,
  #[serde(flatten)]
  pub person:   CreateBody,
}

#[derive(Debug, Serialize)]
pub struct AddRelativeResponse {
  pub person:  Person,
  /// Present when the new relative fuzzy-matched existing records; the
  /// caller is expected to drive the matching workflow next.
  pub request: Option<MatchingRequest>,
}

/// `POST /persons/:id/relatives` — returns 201.
pub async fn add_relative<S: GraphStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AddRelativeBody>,
) -> Result<impl IntoResponse, ApiError> {
  let outcome = state
    .store
    .add_relative(id, body.relation, NewPerson::from(body.person))
    .await
    .map_err(ApiError::from_store)?;

  if let Some(request) = &outcome.request {
    tracing::info!(
      request = %request.request_id,
      related = %request.related_person_id,
      "duplicate candidates found, matching request opened"
    );
    state
      .events
      .emit(request.created_by, EventKind::MatchCandidateFound);
  }

  Ok((
    StatusCode::CREATED,
    Json(AddRelativeResponse {
      person:  outcome.person,
      request: outcome.request,
    }),
  ))
}
