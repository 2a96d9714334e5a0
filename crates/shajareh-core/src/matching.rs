//! The relation-matching workflow — states, transitions, and merge planning.
//!
//! A [`MatchingRequest`] tracks the resolution of one suspected duplicate: a
//! newly added relative (the related person) that fuzzy-matches one or more
//! existing records. The status field is a small state machine:
//!
//! ```text
//! AwaitingSimilar ──set_similar(Some)──▶ AwaitingConfirmation ──confirm──▶ IsDone
//!        ▲  │                                  ▲   │  │                      │
//!        │  └─set_similar(None)──▶ Rejected ◀──│───┘  └──remove_similar──▶ (back)
//!        │                            │        └───────────undo─────────────┘
//!        └────────remove_similar──────┴──undo──▶ AwaitingConfirmation
//! ```
//!
//! The transition preconditions are pure functions here; the storage backend
//! enforces them inside the transaction that applies the effects, so a
//! wrong-status call can never half-apply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  error::{Error, Result},
  person::{Gender, RelationKind},
};

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
  AwaitingSimilar,
  AwaitingConfirmation,
  IsDone,
  Rejected,
}

impl RequestStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::AwaitingSimilar => "awaiting_similar",
      Self::AwaitingConfirmation => "awaiting_confirmation",
      Self::IsDone => "is_done",
      Self::Rejected => "rejected",
    }
  }
}

impl std::fmt::Display for RequestStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Transitions ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
  SetSimilar,
  Confirm,
  Undo,
  Reject,
  RemoveSimilar,
}

impl Transition {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::SetSimilar => "set_similar",
      Self::Confirm => "confirm",
      Self::Undo => "undo",
      Self::Reject => "reject",
      Self::RemoveSimilar => "remove_similar",
    }
  }

  /// The statuses this transition may be applied from.
  pub fn allowed_from(self, status: RequestStatus) -> bool {
    use RequestStatus::*;
    match self {
      Self::SetSimilar => status == AwaitingSimilar,
      Self::Confirm | Self::Reject | Self::RemoveSimilar => {
        status == AwaitingConfirmation
      }
      Self::Undo => matches!(status, IsDone | Rejected),
    }
  }
}

impl std::fmt::Display for Transition {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Check a transition precondition, failing with the status-priority error
/// the caller surfaces unmodified.
pub fn ensure_transition(
  status: RequestStatus,
  transition: Transition,
) -> Result<()> {
  if transition.allowed_from(status) {
    Ok(())
  } else {
    Err(Error::StatusPriority { transition, status })
  }
}

// ─── Request ─────────────────────────────────────────────────────────────────

/// One pending (or resolved) duplicate-resolution request.
///
/// `related_person_id` is unique across requests: a person can be the subject
/// of at most one duplicate resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingRequest {
  pub request_id:        Uuid,
  /// The anchor — the existing tree member the relative was attached to.
  pub person_id:         Uuid,
  /// The newly created relative, candidate for being a duplicate.
  pub related_person_id: Uuid,
  /// The pre-existing person selected as the real match, once chosen.
  pub similar_person_id: Option<Uuid>,
  pub relation:          RelationKind,
  pub status:            RequestStatus,
  pub created_by:        Uuid,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

// ─── Merge planning ──────────────────────────────────────────────────────────

/// The single graph edge a confirmed match rewrites, and undo restores.
///
/// "Target" is the person the anchor's edge points at: the similar person
/// while the match is done, the related person after undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeEdge {
  /// `anchor.father := target`
  AnchorFather,
  /// `anchor.mother := target`
  AnchorMother,
  /// `target.father := anchor` — the anchor is the target's father.
  TargetFather,
  /// `target.mother := anchor`
  TargetMother,
  /// symmetric spouse edge between anchor and target
  SpouseLink,
}

/// Which edge a merge for `relation` rewrites, given the anchor's gender.
pub fn merge_edge(relation: RelationKind, anchor_gender: Gender) -> MergeEdge {
  match relation {
    RelationKind::Father => MergeEdge::AnchorFather,
    RelationKind::Mother => MergeEdge::AnchorMother,
    RelationKind::Spouse => MergeEdge::SpouseLink,
    RelationKind::Child => match anchor_gender {
      Gender::Male => MergeEdge::TargetFather,
      Gender::Female => MergeEdge::TargetMother,
    },
  }
}

// ─── Batch outcomes ──────────────────────────────────────────────────────────

/// One failed item of a bulk workflow operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
  pub request_id: Uuid,
  pub reason:     String,
}

/// Result of applying a workflow transition across a selection set. Per-item
/// failures are collected, not fatal: the successes stand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
  pub succeeded: Vec<Uuid>,
  pub failed:    Vec<BatchFailure>,
}
