//! Error types for `shajareh-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{
  matching::{RequestStatus, Transition},
  person::RelationKind,
};

#[derive(Debug, Error)]
pub enum Error {
  #[error("person not found: {0}")]
  PersonNotFound(Uuid),

  #[error("matching request not found: {0}")]
  RequestNotFound(Uuid),

  #[error("access request not found: {0}")]
  AccessRequestNotFound(Uuid),

  /// The father/mother slot is already occupied. Changing a parent is only
  /// possible through the matching workflow's do/undo.
  #[error("person {person} already has a {slot}")]
  DuplicateParent { person: Uuid, slot: RelationKind },

  #[error("person {0} still has relatives attached")]
  PersonHasDependents(Uuid),

  #[error("loop detected in family tree at person {0}")]
  LoopInTree(Uuid),

  #[error("cannot link person {0} as their own spouse")]
  SelfSpouse(Uuid),

  /// A workflow transition was attempted from the wrong status.
  #[error("cannot {transition} a matching request in status {status}")]
  StatusPriority {
    transition: Transition,
    status:     RequestStatus,
  },

  #[error("matching request {0} has no similar person selected")]
  NoSimilarSelected(Uuid),

  #[error("person {0} cannot be selected as the match")]
  InvalidCandidate(Uuid),

  #[error("an awaiting access request already exists for person {person} and applicant {applicant}")]
  DuplicateRequest { person: Uuid, applicant: Uuid },

  #[error("access request {0} is already approved")]
  AlreadyApproved(Uuid),

  #[error("permission denied")]
  PermissionDenied,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Lets a caller that only knows a backend's error type recover the domain
/// error inside it, e.g. for HTTP status mapping.
pub trait DomainError {
  fn domain(&self) -> Option<&Error>;
}

impl DomainError for Error {
  fn domain(&self) -> Option<&Error> { Some(self) }
}
