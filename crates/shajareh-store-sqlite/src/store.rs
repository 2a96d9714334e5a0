//! [`SqliteStore`] — the SQLite implementation of [`GraphStore`].

use std::path::Path;

use shajareh_core::{
  access::PermissionRequest,
  matching::{BatchOutcome, MatchingRequest, RequestStatus},
  matchmaker::CandidateProfile,
  person::{NewPerson, Person, PersonSummary, PersonUpdate, PersonView, RelationKind},
  store::{AddRelativeOutcome, FindMeQuery, GraphStore},
  tree::{AncestorTree, DescendantTree},
};
use uuid::Uuid;

use crate::{Result, queries, schema::SCHEMA};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A genealogy graph store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Run `body` inside one transaction; any error rolls everything back.
fn with_tx<T>(
  conn: &mut rusqlite::Connection,
  body: impl FnOnce(&rusqlite::Connection) -> Result<T>,
) -> Result<T> {
  let tx = conn.transaction()?;
  let value = body(&tx)?;
  tx.commit()?;
  Ok(value)
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── GraphStore impl ─────────────────────────────────────────────────────────

impl GraphStore for SqliteStore {
  type Error = crate::Error;

  // ── Persons ───────────────────────────────────────────────────────────────

  async fn create_person(&self, input: NewPerson) -> Result<Person> {
    self
      .conn
      .call(move |conn| Ok(with_tx(conn, |c| queries::create_person(c, input))))
      .await?
  }

  async fn get_person(&self, id: Uuid) -> Result<Option<Person>> {
    self
      .conn
      .call(move |conn| Ok(queries::person_by_id(conn, id)))
      .await?
  }

  async fn person_view(&self, id: Uuid) -> Result<Option<PersonView>> {
    self
      .conn
      .call(move |conn| Ok(queries::person_view(conn, id)))
      .await?
  }

  async fn list_persons(&self) -> Result<Vec<Person>> {
    self.conn.call(|conn| Ok(queries::list_persons(conn))).await?
  }

  async fn update_person(
    &self,
    id: Uuid,
    update: PersonUpdate,
  ) -> Result<Person> {
    self
      .conn
      .call(move |conn| {
        Ok(with_tx(conn, |c| queries::update_person(c, id, update)))
      })
      .await?
  }

  async fn find_me(&self, query: &FindMeQuery) -> Result<Vec<PersonSummary>> {
    let query = query.clone();
    self
      .conn
      .call(move |conn| Ok(queries::find_me(conn, &query)))
      .await?
  }

  async fn set_father(&self, child: Uuid, father: Uuid) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        Ok(with_tx(conn, |c| {
          queries::set_parent(c, child, father, queries::ParentSlot::Father)
        }))
      })
      .await?
  }

  async fn set_mother(&self, child: Uuid, mother: Uuid) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        Ok(with_tx(conn, |c| {
          queries::set_parent(c, child, mother, queries::ParentSlot::Mother)
        }))
      })
      .await?
  }

  async fn add_spouse(&self, a: Uuid, b: Uuid) -> Result<()> {
    self
      .conn
      .call(move |conn| Ok(with_tx(conn, |c| queries::add_spouse(c, a, b))))
      .await?
  }

  async fn delete_person(&self, id: Uuid) -> Result<()> {
    self
      .conn
      .call(move |conn| Ok(with_tx(conn, |c| queries::delete_person(c, id))))
      .await?
  }

  // ── Matchmaking ───────────────────────────────────────────────────────────

  async fn match_candidates(
    &self,
    person: Uuid,
    anchor: Option<Uuid>,
  ) -> Result<Vec<CandidateProfile>> {
    self
      .conn
      .call(move |conn| Ok(queries::candidates_for(conn, person, anchor)))
      .await?
  }

  async fn match_exists(
    &self,
    person: Uuid,
    anchor: Option<Uuid>,
  ) -> Result<bool> {
    self
      .conn
      .call(move |conn| Ok(queries::match_exists_for(conn, person, anchor)))
      .await?
  }

  async fn add_relative(
    &self,
    anchor: Uuid,
    relation: RelationKind,
    input: NewPerson,
  ) -> Result<AddRelativeOutcome> {
    self
      .conn
      .call(move |conn| {
        Ok(with_tx(conn, |c| {
          queries::add_relative(c, anchor, relation, input)
        }))
      })
      .await?
  }

  // ── Matching workflow ─────────────────────────────────────────────────────

  async fn get_request(&self, id: Uuid) -> Result<Option<MatchingRequest>> {
    self
      .conn
      .call(move |conn| Ok(queries::request_by_id(conn, id)))
      .await?
  }

  async fn list_requests(
    &self,
    status: Option<RequestStatus>,
  ) -> Result<Vec<MatchingRequest>> {
    self
      .conn
      .call(move |conn| Ok(queries::list_requests(conn, status)))
      .await?
  }

  async fn set_similar(
    &self,
    request: Uuid,
    similar: Option<Uuid>,
  ) -> Result<MatchingRequest> {
    self
      .conn
      .call(move |conn| {
        Ok(with_tx(conn, |c| queries::set_similar(c, request, similar)))
      })
      .await?
  }

  async fn confirm_matching(&self, request: Uuid) -> Result<MatchingRequest> {
    self
      .conn
      .call(move |conn| {
        Ok(with_tx(conn, |c| queries::confirm_matching(c, request)))
      })
      .await?
  }

  async fn undo_matching(&self, request: Uuid) -> Result<MatchingRequest> {
    self
      .conn
      .call(move |conn| {
        Ok(with_tx(conn, |c| queries::undo_matching(c, request)))
      })
      .await?
  }

  async fn reject_matching(&self, request: Uuid) -> Result<MatchingRequest> {
    self
      .conn
      .call(move |conn| {
        Ok(with_tx(conn, |c| queries::reject_matching(c, request)))
      })
      .await?
  }

  async fn remove_similar(&self, request: Uuid) -> Result<MatchingRequest> {
    self
      .conn
      .call(move |conn| {
        Ok(with_tx(conn, |c| queries::remove_similar(c, request)))
      })
      .await?
  }

  // ── Bulk workflow operations ──────────────────────────────────────────────

  async fn confirm_many(&self, requests: Vec<Uuid>) -> Result<BatchOutcome> {
    self
      .conn
      .call(move |conn| {
        Ok(queries::apply_many(conn, &requests, queries::confirm_matching))
      })
      .await?
  }

  async fn undo_many(&self, requests: Vec<Uuid>) -> Result<BatchOutcome> {
    self
      .conn
      .call(move |conn| {
        Ok(queries::apply_many(conn, &requests, queries::undo_matching))
      })
      .await?
  }

  async fn reject_many(&self, requests: Vec<Uuid>) -> Result<BatchOutcome> {
    self
      .conn
      .call(move |conn| {
        Ok(queries::apply_many(conn, &requests, queries::reject_matching))
      })
      .await?
  }

  // ── Tree traversal ────────────────────────────────────────────────────────

  async fn ancestor_tree(&self, person: Uuid) -> Result<Option<AncestorTree>> {
    self
      .conn
      .call(move |conn| Ok(queries::ancestor_tree(conn, person)))
      .await?
  }

  async fn descendant_tree(
    &self,
    person: Uuid,
  ) -> Result<Option<DescendantTree>> {
    self
      .conn
      .call(move |conn| Ok(queries::descendant_tree(conn, person)))
      .await?
  }

  // ── Visibility ────────────────────────────────────────────────────────────

  async fn request_tree_access(
    &self,
    person: Uuid,
    applicant: Uuid,
  ) -> Result<PermissionRequest> {
    self
      .conn
      .call(move |conn| {
        Ok(with_tx(conn, |c| {
          queries::request_tree_access(c, person, applicant)
        }))
      })
      .await?
  }

  async fn approve_tree_access(
    &self,
    request: Uuid,
  ) -> Result<PermissionRequest> {
    self
      .conn
      .call(move |conn| {
        Ok(with_tx(conn, |c| queries::approve_tree_access(c, request)))
      })
      .await?
  }

  async fn can_see_tree(&self, person: Uuid, user: Uuid) -> Result<bool> {
    self
      .conn
      .call(move |conn| Ok(queries::can_see_tree(conn, person, user)))
      .await?
  }
}
