//! Person — the node type of the family graph.
//!
//! A person row carries its own attributes plus the two parent edges.
//! Spouse edges are symmetric and live in their own table; child edges are
//! derived (the reverse of father/mother) and never stored.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Enums ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
  Male,
  Female,
}

/// Where a person record stands in the duplicate-resolution lifecycle.
///
/// `Matched` records are ghosts: superseded by a merge target, excluded from
/// every traversal and candidate pool, retained only for undo and audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingStatus {
  #[default]
  NoMatch,
  IsMatching,
  Matched,
}

/// The relation being established between an anchor person and a newly added
/// relative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
  Father,
  Mother,
  Spouse,
  Child,
}

impl RelationKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Father => "father",
      Self::Mother => "mother",
      Self::Spouse => "spouse",
      Self::Child => "child",
    }
  }
}

impl std::fmt::Display for RelationKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Person ──────────────────────────────────────────────────────────────────

/// A member of the family graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
  pub person_id:       Uuid,
  pub first_name:      String,
  pub last_name:       String,
  pub gender:          Gender,
  pub birth_year:      i16,
  pub birth_date:      Option<NaiveDate>,
  /// Free-text place label; geographic reference data is out of scope.
  pub birth_place:     Option<String>,
  pub death_year:      Option<i16>,
  pub death_date:      Option<NaiveDate>,
  pub father_id:       Option<Uuid>,
  pub mother_id:       Option<Uuid>,
  pub matching_status: MatchingStatus,
  /// The account this person record belongs to, if any.
  pub user_id:         Option<Uuid>,
  pub created_by:      Uuid,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

impl Person {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }
}

// ─── NewPerson ───────────────────────────────────────────────────────────────

/// Input to [`crate::store::GraphStore::create_person`] and
/// [`crate::store::GraphStore::add_relative`]. Identity, matching status,
/// and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewPerson {
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

impl NewPerson {
  /// Convenience constructor with the optional attributes left empty.
  pub fn new(
    first_name: impl Into<String>,
    last_name: impl Into<String>,
    gender: Gender,
    birth_year: i16,
    created_by: Uuid,
  ) -> Self {
    Self {
      first_name: first_name.into(),
      last_name: last_name.into(),
      gender,
      birth_year,
      birth_date: None,
      birth_place: None,
      death_year: None,
      death_date: None,
      user_id: None,
      created_by,
    }
  }
}

// ─── PersonUpdate ────────────────────────────────────────────────────────────

/// Attribute-only edit; relation edges are never touched through an update.
/// `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonUpdate {
  pub first_name:  Option<String>,
  pub last_name:   Option<String>,
  pub gender:      Option<Gender>,
  pub birth_year:  Option<i16>,
  pub birth_date:  Option<NaiveDate>,
  pub birth_place: Option<String>,
  pub death_year:  Option<i16>,
  pub death_date:  Option<NaiveDate>,
}

// ─── Summary and view ────────────────────────────────────────────────────────

/// The narrow display projection of a person — everything a tree node or a
/// match-choice list needs, and nothing more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonSummary {
  pub person_id:  Uuid,
  pub first_name: String,
  pub last_name:  String,
  pub gender:     Gender,
  pub birth_year: i16,
}

impl PersonSummary {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }
}

/// The computed read model for one person — assembled on read, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonView {
  pub person:   Person,
  pub father:   Option<PersonSummary>,
  pub mother:   Option<PersonSummary>,
  pub spouses:  Vec<PersonSummary>,
  pub children: Vec<PersonSummary>,
}
