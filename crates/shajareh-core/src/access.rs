//! Tree visibility and ownership checks.
//!
//! The predicates are pure; the backend supplies the viewer set and stores
//! permission requests. Approval is driven by the owner-facing caller, which
//! is expected to add the applicant to the viewer set alongside the status
//! change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::person::Person;

// ─── Permission requests ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
  AwaitingApprove,
  Approved,
}

/// A request by `applicant_id` to view `person_id`'s subtree. At most one
/// awaiting request may exist per (person, applicant) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequest {
  pub request_id:   Uuid,
  pub person_id:    Uuid,
  pub applicant_id: Uuid,
  pub status:       PermissionStatus,
  pub created_at:   DateTime<Utc>,
}

// ─── Predicates ──────────────────────────────────────────────────────────────

/// A user sees a person's tree if they were granted visibility, created the
/// record, or are the account the record belongs to.
pub fn can_see_tree(person: &Person, viewers: &[Uuid], user_id: Uuid) -> bool {
  person.created_by == user_id
    || person.user_id == Some(user_id)
    || viewers.contains(&user_id)
}

/// Attribute edits are allowed to the creator and to the linked
/// account-holder.
pub fn can_update(person: &Person, user_id: Uuid) -> bool {
  person.created_by == user_id || person.user_id == Some(user_id)
}

/// Deletion is reserved for the creator.
pub fn can_delete(person: &Person, user_id: Uuid) -> bool {
  person.created_by == user_id
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::person::{Gender, MatchingStatus};

  fn person(created_by: Uuid, user_id: Option<Uuid>) -> Person {
    Person {
      person_id: Uuid::new_v4(),
      first_name: "Ali".into(),
      last_name: "Rezaei".into(),
      gender: Gender::Male,
      birth_year: 1990,
      birth_date: None,
      birth_place: None,
      death_year: None,
      death_date: None,
      father_id: None,
      mother_id: None,
      matching_status: MatchingStatus::NoMatch,
      user_id,
      created_by,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  #[test]
  fn creator_sees_updates_and_deletes() {
    let creator = Uuid::new_v4();
    let p = person(creator, None);
    assert!(can_see_tree(&p, &[], creator));
    assert!(can_update(&p, creator));
    assert!(can_delete(&p, creator));
  }

  #[test]
  fn linked_account_sees_and_updates_but_cannot_delete() {
    let account = Uuid::new_v4();
    let p = person(Uuid::new_v4(), Some(account));
    assert!(can_see_tree(&p, &[], account));
    assert!(can_update(&p, account));
    assert!(!can_delete(&p, account));
  }

  #[test]
  fn granted_viewer_only_sees() {
    let viewer = Uuid::new_v4();
    let p = person(Uuid::new_v4(), None);
    assert!(!can_see_tree(&p, &[], viewer));
    assert!(can_see_tree(&p, &[viewer], viewer));
    assert!(!can_update(&p, viewer));
    assert!(!can_delete(&p, viewer));
  }
}
