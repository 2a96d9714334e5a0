//! The `GraphStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `shajareh-store-sqlite`). The web layer depends on this abstraction, not
//! on any concrete backend. Every mutating method is one atomic unit: either
//! all of its writes are visible afterwards or none are.

use std::future::Future;

use uuid::Uuid;

use crate::{
  access::PermissionRequest,
  error::DomainError,
  matchmaker::CandidateProfile,
  matching::{BatchOutcome, MatchingRequest, RequestStatus},
  person::{NewPerson, Person, PersonSummary, PersonUpdate, PersonView, RelationKind},
  tree::{AncestorTree, DescendantTree},
};

// ─── Query and outcome types ─────────────────────────────────────────────────

/// Parameters for [`GraphStore::find_me`]: locate one's own record in a
/// tree someone else entered. All four filters are case-insensitive
/// substrings; the parent filters require the parents to be recorded.
#[derive(Debug, Clone, Default)]
pub struct FindMeQuery {
  pub first_name:  String,
  pub last_name:   String,
  pub father_name: String,
  pub mother_name: String,
}

/// Result of [`GraphStore::add_relative`]. When the new relative had fuzzy
/// matches, `request` carries the matching workflow the caller must drive
/// to resolution.
#[derive(Debug, Clone)]
pub struct AddRelativeOutcome {
  pub person:  Person,
  pub request: Option<MatchingRequest>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a genealogy graph backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait GraphStore: Send + Sync {
  type Error: std::error::Error + DomainError + Send + Sync + 'static;

  // ── Persons ───────────────────────────────────────────────────────────

  /// Create and persist a new person with no relations and matching status
  /// `NoMatch`.
  fn create_person(
    &self,
    input: NewPerson,
  ) -> impl Future<Output = Result<Person, Self::Error>> + Send + '_;

  /// Retrieve a person by id. Returns `None` if not found.
  fn get_person(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send + '_;

  /// Materialise the read model for one person: the row plus parent,
  /// spouse, and children summaries. Returns `None` if not found.
  fn person_view(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<PersonView>, Self::Error>> + Send + '_;

  fn list_persons(
    &self,
  ) -> impl Future<Output = Result<Vec<Person>, Self::Error>> + Send + '_;

  /// Attribute-only edit; fails with `PersonNotFound` for unknown ids.
  fn update_person(
    &self,
    id: Uuid,
    update: PersonUpdate,
  ) -> impl Future<Output = Result<Person, Self::Error>> + Send + '_;

  /// Self-identification lookup over name + parent names.
  fn find_me<'a>(
    &'a self,
    query: &'a FindMeQuery,
  ) -> impl Future<Output = Result<Vec<PersonSummary>, Self::Error>> + Send + 'a;

  /// Set the father edge. Fails with `DuplicateParent` if the slot is
  /// occupied and `LoopInTree` if the edge would make the child its own
  /// ancestor. When this completes the child's parent pair, the two
  /// parents are linked as spouses.
  fn set_father(
    &self,
    child: Uuid,
    father: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Mother-slot counterpart of [`GraphStore::set_father`].
  fn set_mother(
    &self,
    child: Uuid,
    mother: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Symmetric spouse edge; calling it again for the same pair is a no-op.
  fn add_spouse(
    &self,
    a: Uuid,
    b: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete a person with no remaining relation edges. Fails with
  /// `PersonHasDependents` if any parent, child, or spouse edge exists.
  fn delete_person(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Matchmaking ───────────────────────────────────────────────────────

  /// Fuzzy-match candidates for `person`, decorated with the relative
  /// names the choice labels use. `anchor` is additionally excluded when
  /// searching on behalf of a relation-matching flow.
  fn match_candidates(
    &self,
    person: Uuid,
    anchor: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<CandidateProfile>, Self::Error>> + Send + '_;

  fn match_exists(
    &self,
    person: Uuid,
    anchor: Option<Uuid>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// The workflow entry point: create the relative, link it to the anchor
  /// per `relation`, and — when candidates exist — open a matching request
  /// and flip the relative to `IsMatching`, all in one transaction.
  fn add_relative(
    &self,
    anchor: Uuid,
    relation: RelationKind,
    input: NewPerson,
  ) -> impl Future<Output = Result<AddRelativeOutcome, Self::Error>> + Send + '_;

  // ── Matching workflow ─────────────────────────────────────────────────

  fn get_request(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<MatchingRequest>, Self::Error>> + Send + '_;

  fn list_requests(
    &self,
    status: Option<RequestStatus>,
  ) -> impl Future<Output = Result<Vec<MatchingRequest>, Self::Error>> + Send + '_;

  /// Record the user's pick from the choice list. `None` means "none of
  /// these": the request is rejected and the relative goes back to
  /// `NoMatch`.
  fn set_similar(
    &self,
    request: Uuid,
    similar: Option<Uuid>,
  ) -> impl Future<Output = Result<MatchingRequest, Self::Error>> + Send + '_;

  /// Apply the merge: rewrite the anchor edge onto the similar person,
  /// ghost the related person, and close the request.
  fn confirm_matching(
    &self,
    request: Uuid,
  ) -> impl Future<Output = Result<MatchingRequest, Self::Error>> + Send + '_;

  /// Reverse a done merge (or reopen a rejection), restoring the related
  /// person as the live node.
  fn undo_matching(
    &self,
    request: Uuid,
  ) -> impl Future<Output = Result<MatchingRequest, Self::Error>> + Send + '_;

  fn reject_matching(
    &self,
    request: Uuid,
  ) -> impl Future<Output = Result<MatchingRequest, Self::Error>> + Send + '_;

  /// Drop the selected similar person and return to `AwaitingSimilar`.
  fn remove_similar(
    &self,
    request: Uuid,
  ) -> impl Future<Output = Result<MatchingRequest, Self::Error>> + Send + '_;

  // ── Bulk workflow operations ──────────────────────────────────────────
  //
  // Admin surface: apply one transition across a selection. Items fail
  // independently; the outcome lists both sides.

  fn confirm_many(
    &self,
    requests: Vec<Uuid>,
  ) -> impl Future<Output = Result<BatchOutcome, Self::Error>> + Send + '_;

  fn undo_many(
    &self,
    requests: Vec<Uuid>,
  ) -> impl Future<Output = Result<BatchOutcome, Self::Error>> + Send + '_;

  fn reject_many(
    &self,
    requests: Vec<Uuid>,
  ) -> impl Future<Output = Result<BatchOutcome, Self::Error>> + Send + '_;

  // ── Tree traversal ────────────────────────────────────────────────────

  /// The ancestor tree of `person`, ghosts excluded. Returns `None` if the
  /// person does not exist.
  fn ancestor_tree(
    &self,
    person: Uuid,
  ) -> impl Future<Output = Result<Option<AncestorTree>, Self::Error>> + Send + '_;

  /// Descendant counterpart of [`GraphStore::ancestor_tree`].
  fn descendant_tree(
    &self,
    person: Uuid,
  ) -> impl Future<Output = Result<Option<DescendantTree>, Self::Error>> + Send + '_;

  // ── Visibility ────────────────────────────────────────────────────────

  /// File a request to view `person`'s tree. Fails with `DuplicateRequest`
  /// while an earlier request from the same applicant is still awaiting.
  fn request_tree_access(
    &self,
    person: Uuid,
    applicant: Uuid,
  ) -> impl Future<Output = Result<PermissionRequest, Self::Error>> + Send + '_;

  /// Owner-side approval: mark the request approved and add the applicant
  /// to the person's viewer set, atomically.
  fn approve_tree_access(
    &self,
    request: Uuid,
  ) -> impl Future<Output = Result<PermissionRequest, Self::Error>> + Send + '_;

  fn can_see_tree(
    &self,
    person: Uuid,
    user: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
