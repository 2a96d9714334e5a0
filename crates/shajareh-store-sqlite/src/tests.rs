//! Integration tests for `SqliteStore` against an in-memory database.

use shajareh_core::{
  Error as CoreError,
  matching::RequestStatus,
  person::{Gender, MatchingStatus, NewPerson, PersonUpdate, RelationKind},
  store::{FindMeQuery, GraphStore},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn person(
  first: &str,
  last: &str,
  gender: Gender,
  birth_year: i16,
  created_by: Uuid,
) -> NewPerson {
  NewPerson::new(first, last, gender, birth_year, created_by)
}

// ─── Persons ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_person() {
  let s = store().await;
  let creator = Uuid::new_v4();

  let created = s
    .create_person(person("Ali", "Rezaei", Gender::Male, 1990, creator))
    .await
    .unwrap();
  assert_eq!(created.matching_status, MatchingStatus::NoMatch);
  assert!(created.father_id.is_none());

  let fetched = s.get_person(created.person_id).await.unwrap().unwrap();
  assert_eq!(fetched.person_id, created.person_id);
  assert_eq!(fetched.full_name(), "Ali Rezaei");
  assert_eq!(fetched.birth_year, 1990);
  assert_eq!(fetched.created_by, creator);
}

#[tokio::test]
async fn get_person_missing_returns_none() {
  let s = store().await;
  assert!(s.get_person(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn update_person_changes_attributes_only() {
  let s = store().await;
  let creator = Uuid::new_v4();
  let p = s
    .create_person(person("Ali", "Rezaei", Gender::Male, 1990, creator))
    .await
    .unwrap();

  let updated = s
    .update_person(
      p.person_id,
      PersonUpdate {
        first_name: Some("Ali-Reza".into()),
        death_year: Some(2070),
        ..Default::default()
      },
    )
    .await
    .unwrap();
  assert_eq!(updated.first_name, "Ali-Reza");
  assert_eq!(updated.death_year, Some(2070));
  assert_eq!(updated.last_name, "Rezaei");

  let err = s
    .update_person(Uuid::new_v4(), PersonUpdate::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::PersonNotFound(_))));
}

// ─── Parent edges ────────────────────────────────────────────────────────────

#[tokio::test]
async fn set_father_links_parent() {
  let s = store().await;
  let u = Uuid::new_v4();
  let child = s
    .create_person(person("Ali", "Rezaei", Gender::Male, 1990, u))
    .await
    .unwrap();
  let father = s
    .create_person(person("Hassan", "Rezaei", Gender::Male, 1955, u))
    .await
    .unwrap();

  s.set_father(child.person_id, father.person_id).await.unwrap();

  let child = s.get_person(child.person_id).await.unwrap().unwrap();
  assert_eq!(child.father_id, Some(father.person_id));
}

#[tokio::test]
async fn occupied_father_slot_is_rejected() {
  let s = store().await;
  let u = Uuid::new_v4();
  let child = s
    .create_person(person("Ali", "Rezaei", Gender::Male, 1990, u))
    .await
    .unwrap();
  let f1 = s
    .create_person(person("Hassan", "Rezaei", Gender::Male, 1955, u))
    .await
    .unwrap();
  let f2 = s
    .create_person(person("Hossein", "Rezaei", Gender::Male, 1950, u))
    .await
    .unwrap();

  s.set_father(child.person_id, f1.person_id).await.unwrap();
  let err = s.set_father(child.person_id, f2.person_id).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::DuplicateParent { slot: RelationKind::Father, .. })
  ));
}

#[tokio::test]
async fn self_parenting_is_rejected() {
  let s = store().await;
  let u = Uuid::new_v4();
  let p = s
    .create_person(person("Ali", "Rezaei", Gender::Male, 1990, u))
    .await
    .unwrap();

  let err = s.set_father(p.person_id, p.person_id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::LoopInTree(_))));
}

#[tokio::test]
async fn ancestry_cycle_is_rejected_at_edge_creation() {
  let s = store().await;
  let u = Uuid::new_v4();
  let a = s
    .create_person(person("A", "Rezaei", Gender::Male, 1990, u))
    .await
    .unwrap();
  let b = s
    .create_person(person("B", "Rezaei", Gender::Male, 1960, u))
    .await
    .unwrap();
  let c = s
    .create_person(person("C", "Rezaei", Gender::Male, 1930, u))
    .await
    .unwrap();

  s.set_father(a.person_id, b.person_id).await.unwrap();
  s.set_father(b.person_id, c.person_id).await.unwrap();

  // Closing the triangle would make A its own ancestor.
  let err = s.set_father(c.person_id, a.person_id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::LoopInTree(_))));

  // The graph is unchanged and still traversable.
  let tree = s.ancestor_tree(a.person_id).await.unwrap().unwrap();
  assert_eq!(
    tree
      .father
      .as_ref()
      .and_then(|f| f.father.as_ref())
      .map(|g| g.person.first_name.clone()),
    Some("C".to_string())
  );
}

#[tokio::test]
async fn completing_the_parent_pair_links_the_parents_as_spouses() {
  let s = store().await;
  let u = Uuid::new_v4();
  let child = s
    .create_person(person("Ali", "Rezaei", Gender::Male, 1990, u))
    .await
    .unwrap();
  let father = s
    .create_person(person("Hassan", "Rezaei", Gender::Male, 1955, u))
    .await
    .unwrap();
  let mother = s
    .create_person(person("Zahra", "Karimi", Gender::Female, 1960, u))
    .await
    .unwrap();

  s.set_father(child.person_id, father.person_id).await.unwrap();
  s.set_mother(child.person_id, mother.person_id).await.unwrap();

  let view = s.person_view(father.person_id).await.unwrap().unwrap();
  assert_eq!(view.spouses.len(), 1);
  assert_eq!(view.spouses[0].person_id, mother.person_id);
}

// ─── Spouse edges ────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_spouse_is_symmetric_and_idempotent() {
  let s = store().await;
  let u = Uuid::new_v4();
  let a = s
    .create_person(person("Hassan", "Rezaei", Gender::Male, 1955, u))
    .await
    .unwrap();
  let b = s
    .create_person(person("Zahra", "Karimi", Gender::Female, 1960, u))
    .await
    .unwrap();

  s.add_spouse(a.person_id, b.person_id).await.unwrap();
  // Repeat call, reversed order: still a single edge.
  s.add_spouse(b.person_id, a.person_id).await.unwrap();

  let view_a = s.person_view(a.person_id).await.unwrap().unwrap();
  let view_b = s.person_view(b.person_id).await.unwrap().unwrap();
  assert_eq!(view_a.spouses.len(), 1);
  assert_eq!(view_b.spouses.len(), 1);
  assert_eq!(view_a.spouses[0].person_id, b.person_id);
  assert_eq!(view_b.spouses[0].person_id, a.person_id);
}

#[tokio::test]
async fn self_spouse_is_rejected() {
  let s = store().await;
  let u = Uuid::new_v4();
  let a = s
    .create_person(person("Hassan", "Rezaei", Gender::Male, 1955, u))
    .await
    .unwrap();
  let err = s.add_spouse(a.person_id, a.person_id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::SelfSpouse(_))));
}

// ─── Deletion ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_person_with_a_father_is_blocked() {
  let s = store().await;
  let u = Uuid::new_v4();
  let child = s
    .create_person(person("Ali", "Rezaei", Gender::Male, 1990, u))
    .await
    .unwrap();
  let father = s
    .create_person(person("Hassan", "Rezaei", Gender::Male, 1955, u))
    .await
    .unwrap();
  s.set_father(child.person_id, father.person_id).await.unwrap();

  let err = s.delete_person(child.person_id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::PersonHasDependents(_))));

  // The tree is unchanged.
  let child = s.get_person(child.person_id).await.unwrap().unwrap();
  assert_eq!(child.father_id, Some(father.person_id));
}

#[tokio::test]
async fn delete_person_with_children_or_spouses_is_blocked() {
  let s = store().await;
  let u = Uuid::new_v4();
  let child = s
    .create_person(person("Ali", "Rezaei", Gender::Male, 1990, u))
    .await
    .unwrap();
  let father = s
    .create_person(person("Hassan", "Rezaei", Gender::Male, 1955, u))
    .await
    .unwrap();
  s.set_father(child.person_id, father.person_id).await.unwrap();

  let err = s.delete_person(father.person_id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::PersonHasDependents(_))));

  let a = s
    .create_person(person("Hossein", "Rezaei", Gender::Male, 1950, u))
    .await
    .unwrap();
  let b = s
    .create_person(person("Zahra", "Karimi", Gender::Female, 1955, u))
    .await
    .unwrap();
  s.add_spouse(a.person_id, b.person_id).await.unwrap();
  let err = s.delete_person(a.person_id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::PersonHasDependents(_))));
}

#[tokio::test]
async fn delete_isolated_person_succeeds() {
  let s = store().await;
  let u = Uuid::new_v4();
  let p = s
    .create_person(person("Ali", "Rezaei", Gender::Male, 1990, u))
    .await
    .unwrap();

  s.delete_person(p.person_id).await.unwrap();
  assert!(s.get_person(p.person_id).await.unwrap().is_none());
}

// ─── find_me ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn find_me_matches_on_own_and_parent_names() {
  let s = store().await;
  let u = Uuid::new_v4();
  let child = s
    .create_person(person("Ali", "Rezaei", Gender::Male, 1990, u))
    .await
    .unwrap();
  let father = s
    .create_person(person("Hassan", "Rezaei", Gender::Male, 1955, u))
    .await
    .unwrap();
  let mother = s
    .create_person(person("Zahra", "Karimi", Gender::Female, 1960, u))
    .await
    .unwrap();
  s.set_father(child.person_id, father.person_id).await.unwrap();
  s.set_mother(child.person_id, mother.person_id).await.unwrap();

  let hits = s
    .find_me(&FindMeQuery {
      first_name:  "ali".into(),
      last_name:   "rez".into(),
      father_name: "hassan".into(),
      mother_name: "zahra".into(),
    })
    .await
    .unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].person_id, child.person_id);

  // A person with no recorded parents never matches.
  let hits = s
    .find_me(&FindMeQuery {
      first_name: "hassan".into(),
      last_name: "rezaei".into(),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(hits.is_empty());
}

// ─── Matchmaking ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_a_candidate_found_opens_a_request() {
  let s = store().await;
  let u = Uuid::new_v4();
  // An unmatched "Hassan Rezaei" born 1955 already exists.
  let existing = s
    .create_person(person("Hassan", "Rezaei", Gender::Male, 1955, u))
    .await
    .unwrap();
  let anchor = s
    .create_person(person("Reza", "Rezaei", Gender::Male, 1985, u))
    .await
    .unwrap();

  let outcome = s
    .add_relative(
      anchor.person_id,
      RelationKind::Father,
      person("Hassan", "Rezaei", Gender::Male, 1955, u),
    )
    .await
    .unwrap();

  // The new father is linked immediately and flagged as pending.
  let anchor = s.get_person(anchor.person_id).await.unwrap().unwrap();
  assert_eq!(anchor.father_id, Some(outcome.person.person_id));
  assert_eq!(outcome.person.matching_status, MatchingStatus::IsMatching);

  let request = outcome.request.expect("request opened");
  assert_eq!(request.status, RequestStatus::AwaitingSimilar);
  assert_eq!(request.related_person_id, outcome.person.person_id);
  assert_eq!(request.similar_person_id, None);

  // The candidate pool holds exactly the pre-existing Hassan.
  let candidates = s
    .match_candidates(outcome.person.person_id, Some(anchor.person_id))
    .await
    .unwrap();
  assert_eq!(candidates.len(), 1);
  assert_eq!(candidates[0].person.person_id, existing.person_id);
}

#[tokio::test]
async fn add_relative_without_candidates_opens_no_request() {
  let s = store().await;
  let u = Uuid::new_v4();
  let anchor = s
    .create_person(person("Reza", "Rezaei", Gender::Male, 1985, u))
    .await
    .unwrap();

  let outcome = s
    .add_relative(
      anchor.person_id,
      RelationKind::Father,
      person("Hassan", "Rezaei", Gender::Male, 1955, u),
    )
    .await
    .unwrap();

  assert!(outcome.request.is_none());
  assert_eq!(outcome.person.matching_status, MatchingStatus::NoMatch);
  let anchor = s.get_person(anchor.person_id).await.unwrap().unwrap();
  assert_eq!(anchor.father_id, Some(outcome.person.person_id));
}

#[tokio::test]
async fn candidate_search_is_substring_and_case_insensitive() {
  let s = store().await;
  let u = Uuid::new_v4();
  let long_name = s
    .create_person(person("hassan-ali", "rezaei-fard", Gender::Male, 1955, u))
    .await
    .unwrap();
  let probe = s
    .create_person(person("Hassan", "Rezaei", Gender::Male, 1955, u))
    .await
    .unwrap();
  // Same names, wrong year: not a candidate.
  s.create_person(person("Hassan", "Rezaei", Gender::Male, 1956, u))
    .await
    .unwrap();

  let found = s.match_candidates(probe.person_id, None).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].person.person_id, long_name.person_id);
}

#[tokio::test]
async fn matched_ghosts_never_appear_as_candidates() {
  let s = store().await;
  let u = Uuid::new_v4();
  let existing = s
    .create_person(person("Hassan", "Rezaei", Gender::Male, 1955, u))
    .await
    .unwrap();
  let anchor = s
    .create_person(person("Reza", "Rezaei", Gender::Male, 1985, u))
    .await
    .unwrap();

  let outcome = s
    .add_relative(
      anchor.person_id,
      RelationKind::Father,
      person("Hassan", "Rezaei", Gender::Male, 1955, u),
    )
    .await
    .unwrap();
  let request = outcome.request.unwrap();
  s.set_similar(request.request_id, Some(existing.person_id))
    .await
    .unwrap();
  s.confirm_matching(request.request_id).await.unwrap();

  // The ghosted new Hassan is invisible to a fresh probe's search.
  let probe = s
    .create_person(person("Hassan", "Rezaei", Gender::Male, 1955, u))
    .await
    .unwrap();
  let found = s.match_candidates(probe.person_id, None).await.unwrap();
  let ids: Vec<_> = found.iter().map(|c| c.person.person_id).collect();
  assert!(ids.contains(&existing.person_id));
  assert!(!ids.contains(&outcome.person.person_id));
}

#[tokio::test]
async fn candidate_profiles_carry_relative_names() {
  let s = store().await;
  let u = Uuid::new_v4();
  let candidate = s
    .create_person(person("Hassan", "Rezaei", Gender::Male, 1955, u))
    .await
    .unwrap();
  let father = s
    .create_person(person("Gholam", "Rezaei", Gender::Male, 1920, u))
    .await
    .unwrap();
  s.set_father(candidate.person_id, father.person_id).await.unwrap();

  let probe = s
    .create_person(person("Hassan", "Rezaei", Gender::Male, 1955, u))
    .await
    .unwrap();
  let found = s.match_candidates(probe.person_id, None).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].father_name.as_deref(), Some("Gholam"));
  assert_eq!(found[0].mother_name, None);
}

// ─── Matching workflow ───────────────────────────────────────────────────────

/// anchor + pending father request against one existing candidate.
async fn father_request(
  s: &SqliteStore,
) -> (Uuid, Uuid, Uuid, Uuid) {
  let u = Uuid::new_v4();
  let existing = s
    .create_person(person("Hassan", "Rezaei", Gender::Male, 1955, u))
    .await
    .unwrap();
  let anchor = s
    .create_person(person("Reza", "Rezaei", Gender::Male, 1985, u))
    .await
    .unwrap();
  let outcome = s
    .add_relative(
      anchor.person_id,
      RelationKind::Father,
      person("Hassan", "Rezaei", Gender::Male, 1955, u),
    )
    .await
    .unwrap();
  let request = outcome.request.unwrap();
  (
    request.request_id,
    anchor.person_id,
    outcome.person.person_id,
    existing.person_id,
  )
}

#[tokio::test]
async fn scenario_b_selecting_a_similar_awaits_confirmation() {
  let s = store().await;
  let (request_id, _anchor, _related, existing) = father_request(&s).await;

  let request = s.set_similar(request_id, Some(existing)).await.unwrap();
  assert_eq!(request.status, RequestStatus::AwaitingConfirmation);
  assert_eq!(request.similar_person_id, Some(existing));
}

#[tokio::test]
async fn selecting_none_of_these_rejects_the_request() {
  let s = store().await;
  let (request_id, _anchor, related, _existing) = father_request(&s).await;

  let request = s.set_similar(request_id, None).await.unwrap();
  assert_eq!(request.status, RequestStatus::Rejected);
  assert_eq!(request.similar_person_id, None);

  let related = s.get_person(related).await.unwrap().unwrap();
  assert_eq!(related.matching_status, MatchingStatus::NoMatch);
}

#[tokio::test]
async fn ghost_or_participant_cannot_be_selected_as_similar() {
  let s = store().await;
  let (request_id, anchor, related, _existing) = father_request(&s).await;

  let err = s.set_similar(request_id, Some(anchor)).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::InvalidCandidate(_))));
  let err = s.set_similar(request_id, Some(related)).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::InvalidCandidate(_))));
}

#[tokio::test]
async fn scenario_c_confirm_merges_the_edge_and_ghosts_the_related() {
  let s = store().await;
  let (request_id, anchor, related, existing) = father_request(&s).await;
  s.set_similar(request_id, Some(existing)).await.unwrap();

  let request = s.confirm_matching(request_id).await.unwrap();
  assert_eq!(request.status, RequestStatus::IsDone);

  let anchor = s.get_person(anchor).await.unwrap().unwrap();
  assert_eq!(anchor.father_id, Some(existing));
  let related = s.get_person(related).await.unwrap().unwrap();
  assert_eq!(related.matching_status, MatchingStatus::Matched);
}

#[tokio::test]
async fn scenario_d_undo_restores_the_related_person() {
  let s = store().await;
  let (request_id, anchor, related, existing) = father_request(&s).await;
  s.set_similar(request_id, Some(existing)).await.unwrap();
  s.confirm_matching(request_id).await.unwrap();

  let request = s.undo_matching(request_id).await.unwrap();
  assert_eq!(request.status, RequestStatus::AwaitingConfirmation);
  assert_eq!(request.similar_person_id, Some(existing));

  let anchor = s.get_person(anchor).await.unwrap().unwrap();
  assert_eq!(anchor.father_id, Some(related));
  let related = s.get_person(related).await.unwrap().unwrap();
  assert_eq!(related.matching_status, MatchingStatus::IsMatching);
}

#[tokio::test]
async fn reject_then_undo_reopens_the_request() {
  let s = store().await;
  let (request_id, anchor, related, existing) = father_request(&s).await;
  s.set_similar(request_id, Some(existing)).await.unwrap();

  let request = s.reject_matching(request_id).await.unwrap();
  assert_eq!(request.status, RequestStatus::Rejected);
  let related_row = s.get_person(related).await.unwrap().unwrap();
  assert_eq!(related_row.matching_status, MatchingStatus::NoMatch);
  // No merge ever happened, so the anchor still points at the related.
  let anchor_row = s.get_person(anchor).await.unwrap().unwrap();
  assert_eq!(anchor_row.father_id, Some(related));

  let request = s.undo_matching(request_id).await.unwrap();
  assert_eq!(request.status, RequestStatus::AwaitingConfirmation);
  let related_row = s.get_person(related).await.unwrap().unwrap();
  assert_eq!(related_row.matching_status, MatchingStatus::IsMatching);
  let anchor_row = s.get_person(anchor).await.unwrap().unwrap();
  assert_eq!(anchor_row.father_id, Some(related));
}

#[tokio::test]
async fn remove_similar_returns_to_awaiting_similar() {
  let s = store().await;
  let (request_id, _anchor, _related, existing) = father_request(&s).await;
  s.set_similar(request_id, Some(existing)).await.unwrap();

  let request = s.remove_similar(request_id).await.unwrap();
  assert_eq!(request.status, RequestStatus::AwaitingSimilar);
  assert_eq!(request.similar_person_id, None);
}

#[tokio::test]
async fn transitions_from_the_wrong_status_fail() {
  let s = store().await;
  let (request_id, _anchor, _related, existing) = father_request(&s).await;

  // AwaitingSimilar: only set_similar is legal.
  for result in [
    s.confirm_matching(request_id).await,
    s.reject_matching(request_id).await,
    s.undo_matching(request_id).await,
    s.remove_similar(request_id).await,
  ] {
    assert!(matches!(
      result.unwrap_err(),
      Error::Core(CoreError::StatusPriority { .. })
    ));
  }

  s.set_similar(request_id, Some(existing)).await.unwrap();
  let err = s
    .set_similar(request_id, Some(existing))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::StatusPriority { .. })));

  s.confirm_matching(request_id).await.unwrap();
  let err = s.confirm_matching(request_id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::StatusPriority { .. })));
}

#[tokio::test]
async fn child_merge_writes_the_similar_persons_parent_slot() {
  let s = store().await;
  let u = Uuid::new_v4();
  let existing_child = s
    .create_person(person("Ali", "Rezaei", Gender::Male, 2010, u))
    .await
    .unwrap();
  let anchor = s
    .create_person(person("Reza", "Rezaei", Gender::Male, 1985, u))
    .await
    .unwrap();

  let outcome = s
    .add_relative(
      anchor.person_id,
      RelationKind::Child,
      person("Ali", "Rezaei", Gender::Male, 2010, u),
    )
    .await
    .unwrap();
  // The male anchor became the new child's father on entry.
  assert_eq!(outcome.person.father_id, Some(anchor.person_id));

  let request = outcome.request.unwrap();
  s.set_similar(request.request_id, Some(existing_child.person_id))
    .await
    .unwrap();
  s.confirm_matching(request.request_id).await.unwrap();

  let existing_child =
    s.get_person(existing_child.person_id).await.unwrap().unwrap();
  assert_eq!(existing_child.father_id, Some(anchor.person_id));

  // Undo clears the slot again.
  s.undo_matching(request.request_id).await.unwrap();
  let existing_child =
    s.get_person(existing_child.person_id).await.unwrap().unwrap();
  assert_eq!(existing_child.father_id, None);
}

#[tokio::test]
async fn spouse_merge_adds_the_edge_and_undo_removes_it() {
  let s = store().await;
  let u = Uuid::new_v4();
  let existing = s
    .create_person(person("Zahra", "Karimi", Gender::Female, 1987, u))
    .await
    .unwrap();
  let anchor = s
    .create_person(person("Reza", "Rezaei", Gender::Male, 1985, u))
    .await
    .unwrap();

  let outcome = s
    .add_relative(
      anchor.person_id,
      RelationKind::Spouse,
      person("Zahra", "Karimi", Gender::Female, 1987, u),
    )
    .await
    .unwrap();
  let request = outcome.request.unwrap();
  s.set_similar(request.request_id, Some(existing.person_id))
    .await
    .unwrap();
  s.confirm_matching(request.request_id).await.unwrap();

  let view = s.person_view(anchor.person_id).await.unwrap().unwrap();
  let ids: Vec<_> = view.spouses.iter().map(|p| p.person_id).collect();
  assert!(ids.contains(&existing.person_id));

  s.undo_matching(request.request_id).await.unwrap();
  let view = s.person_view(anchor.person_id).await.unwrap().unwrap();
  let ids: Vec<_> = view.spouses.iter().map(|p| p.person_id).collect();
  assert!(!ids.contains(&existing.person_id));
  // The pending relative's own edge is untouched.
  assert!(ids.contains(&outcome.person.person_id));
}

#[tokio::test]
async fn failed_confirm_leaves_no_partial_state() {
  let s = store().await;
  let u = Uuid::new_v4();
  // The existing look-alike child already has a father, so a child merge
  // into it must fail on the occupied slot.
  let other_father = s
    .create_person(person("Hossein", "Rezaei", Gender::Male, 1950, u))
    .await
    .unwrap();
  let existing_child = s
    .create_person(person("Ali", "Rezaei", Gender::Male, 2010, u))
    .await
    .unwrap();
  s.set_father(existing_child.person_id, other_father.person_id)
    .await
    .unwrap();

  let anchor = s
    .create_person(person("Reza", "Rezaei", Gender::Male, 1985, u))
    .await
    .unwrap();
  let outcome = s
    .add_relative(
      anchor.person_id,
      RelationKind::Child,
      person("Ali", "Rezaei", Gender::Male, 2010, u),
    )
    .await
    .unwrap();
  let request = outcome.request.unwrap();
  s.set_similar(request.request_id, Some(existing_child.person_id))
    .await
    .unwrap();

  let err = s.confirm_matching(request.request_id).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::DuplicateParent { slot: RelationKind::Father, .. })
  ));

  // Nothing moved: edge, flags, and status are all as before the attempt.
  let existing_child =
    s.get_person(existing_child.person_id).await.unwrap().unwrap();
  assert_eq!(existing_child.father_id, Some(other_father.person_id));
  let related = s.get_person(outcome.person.person_id).await.unwrap().unwrap();
  assert_eq!(related.matching_status, MatchingStatus::IsMatching);
  let request = s.get_request(request.request_id).await.unwrap().unwrap();
  assert_eq!(request.status, RequestStatus::AwaitingConfirmation);
}

#[tokio::test]
async fn bulk_confirm_collects_per_item_failures() {
  let s = store().await;
  let (ready_id, _a1, _r1, existing1) = father_request(&s).await;
  s.set_similar(ready_id, Some(existing1)).await.unwrap();
  // Second request left in AwaitingSimilar: confirm must fail on it.
  let (stuck_id, _a2, _r2, _e2) = father_request(&s).await;

  let outcome = s.confirm_many(vec![ready_id, stuck_id]).await.unwrap();
  assert_eq!(outcome.succeeded, vec![ready_id]);
  assert_eq!(outcome.failed.len(), 1);
  assert_eq!(outcome.failed[0].request_id, stuck_id);

  // The successful item really committed.
  let request = s.get_request(ready_id).await.unwrap().unwrap();
  assert_eq!(request.status, RequestStatus::IsDone);
}

// ─── Tree traversal ──────────────────────────────────────────────────────────

#[tokio::test]
async fn ancestor_tree_nests_father_and_mother() {
  let s = store().await;
  let u = Uuid::new_v4();
  let child = s
    .create_person(person("Ali", "Rezaei", Gender::Male, 1990, u))
    .await
    .unwrap();
  let father = s
    .create_person(person("Hassan", "Rezaei", Gender::Male, 1955, u))
    .await
    .unwrap();
  let mother = s
    .create_person(person("Zahra", "Karimi", Gender::Female, 1960, u))
    .await
    .unwrap();
  let grandfather = s
    .create_person(person("Gholam", "Rezaei", Gender::Male, 1920, u))
    .await
    .unwrap();
  s.set_father(child.person_id, father.person_id).await.unwrap();
  s.set_mother(child.person_id, mother.person_id).await.unwrap();
  s.set_father(father.person_id, grandfather.person_id).await.unwrap();

  let tree = s.ancestor_tree(child.person_id).await.unwrap().unwrap();
  assert_eq!(tree.person.person_id, child.person_id);
  let f = tree.father.unwrap();
  assert_eq!(f.person.person_id, father.person_id);
  assert_eq!(f.father.unwrap().person.person_id, grandfather.person_id);
  assert_eq!(tree.mother.unwrap().person.person_id, mother.person_id);

  assert!(s.ancestor_tree(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn ghosted_child_disappears_from_descendants() {
  let s = store().await;
  let u = Uuid::new_v4();
  let existing_child = s
    .create_person(person("Ali", "Rezaei", Gender::Male, 2010, u))
    .await
    .unwrap();
  let anchor = s
    .create_person(person("Reza", "Rezaei", Gender::Male, 1985, u))
    .await
    .unwrap();
  let outcome = s
    .add_relative(
      anchor.person_id,
      RelationKind::Child,
      person("Ali", "Rezaei", Gender::Male, 2010, u),
    )
    .await
    .unwrap();
  let request = outcome.request.unwrap();
  s.set_similar(request.request_id, Some(existing_child.person_id))
    .await
    .unwrap();
  s.confirm_matching(request.request_id).await.unwrap();

  // Both the ghost and the merged child carry a father edge to the anchor,
  // but only the live one is visible.
  let tree = s.descendant_tree(anchor.person_id).await.unwrap().unwrap();
  let ids: Vec<_> = tree.children.iter().map(|c| c.person.person_id).collect();
  assert_eq!(ids, vec![existing_child.person_id]);
}

#[tokio::test]
async fn descendant_tree_recurses_over_generations() {
  let s = store().await;
  let u = Uuid::new_v4();
  let grandfather = s
    .create_person(person("Gholam", "Rezaei", Gender::Male, 1920, u))
    .await
    .unwrap();
  let father = s
    .create_person(person("Hassan", "Rezaei", Gender::Male, 1955, u))
    .await
    .unwrap();
  let child = s
    .create_person(person("Ali", "Rezaei", Gender::Male, 1990, u))
    .await
    .unwrap();
  s.set_father(father.person_id, grandfather.person_id).await.unwrap();
  s.set_father(child.person_id, father.person_id).await.unwrap();

  let tree = s.descendant_tree(grandfather.person_id).await.unwrap().unwrap();
  assert_eq!(tree.children.len(), 1);
  assert_eq!(tree.children[0].person.person_id, father.person_id);
  assert_eq!(tree.children[0].children[0].person.person_id, child.person_id);
}

// ─── Tree visibility ─────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_pending_access_request_is_rejected() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let applicant = Uuid::new_v4();
  let p = s
    .create_person(person("Ali", "Rezaei", Gender::Male, 1990, owner))
    .await
    .unwrap();

  s.request_tree_access(p.person_id, applicant).await.unwrap();
  let err = s
    .request_tree_access(p.person_id, applicant)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DuplicateRequest { .. })));
}

#[tokio::test]
async fn approval_grants_visibility_and_allows_a_new_request() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let applicant = Uuid::new_v4();
  let p = s
    .create_person(person("Ali", "Rezaei", Gender::Male, 1990, owner))
    .await
    .unwrap();

  assert!(!s.can_see_tree(p.person_id, applicant).await.unwrap());

  let request = s.request_tree_access(p.person_id, applicant).await.unwrap();
  let approved = s.approve_tree_access(request.request_id).await.unwrap();
  assert_eq!(
    approved.status,
    shajareh_core::access::PermissionStatus::Approved
  );
  assert!(s.can_see_tree(p.person_id, applicant).await.unwrap());

  let err = s.approve_tree_access(request.request_id).await.unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::AlreadyApproved(_))));

  // Once resolved, the pair may file again.
  s.request_tree_access(p.person_id, applicant).await.unwrap();
}

#[tokio::test]
async fn creator_and_linked_account_always_see_the_tree() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let account = Uuid::new_v4();
  let mut input = person("Ali", "Rezaei", Gender::Male, 1990, owner);
  input.user_id = Some(account);
  let p = s.create_person(input).await.unwrap();

  assert!(s.can_see_tree(p.person_id, owner).await.unwrap());
  assert!(s.can_see_tree(p.person_id, account).await.unwrap());
  assert!(!s.can_see_tree(p.person_id, Uuid::new_v4()).await.unwrap());

  let err = s
    .can_see_tree(Uuid::new_v4(), owner)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::PersonNotFound(_))));
}
