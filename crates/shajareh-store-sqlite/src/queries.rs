//! Synchronous query bodies.
//!
//! Every function here runs on the database thread, against either a plain
//! connection (reads) or a transaction the caller in `store.rs` opened
//! (writes). A body returns the crate error type directly, so a domain
//! failure aborts the surrounding transaction exactly like a database
//! failure would — nothing half-applies.

use std::collections::HashSet;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, params};
use shajareh_core::{
  Error as CoreError, access as core_access,
  access::{PermissionRequest, PermissionStatus},
  matching::{
    BatchFailure, BatchOutcome, MatchingRequest, MergeEdge, RequestStatus,
    Transition, ensure_transition, merge_edge,
  },
  matchmaker::{CandidateProfile, MatchQuery},
  person::{
    Gender, MatchingStatus, NewPerson, Person, PersonSummary, PersonUpdate,
    PersonView, RelationKind,
  },
  store::{AddRelativeOutcome, FindMeQuery},
  tree::{self, PersonNode, TreeError, TreeSource},
};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RawNode, RawPerson, RawPermission, RawRequest, RawSummary, encode_date,
    encode_dt, encode_gender, encode_matching_status,
    encode_permission_status, encode_relation, encode_request_status,
    encode_uuid,
  },
};

// ─── Person reads ────────────────────────────────────────────────────────────

pub fn person_by_id(conn: &Connection, id: Uuid) -> Result<Option<Person>> {
  let raw: Option<RawPerson> = conn
    .query_row(
      &format!(
        "SELECT {} FROM persons WHERE person_id = ?1",
        RawPerson::COLUMNS
      ),
      params![encode_uuid(id)],
      RawPerson::from_row,
    )
    .optional()?;
  raw.map(RawPerson::into_person).transpose()
}

pub fn require_person(conn: &Connection, id: Uuid) -> Result<Person> {
  person_by_id(conn, id)?.ok_or(Error::Core(CoreError::PersonNotFound(id)))
}

pub fn list_persons(conn: &Connection) -> Result<Vec<Person>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM persons ORDER BY last_name, first_name",
    RawPerson::COLUMNS
  ))?;
  let raws = stmt
    .query_map([], RawPerson::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawPerson::into_person).collect()
}

fn summary_by_id(
  conn: &Connection,
  id: Uuid,
) -> Result<Option<PersonSummary>> {
  let raw: Option<RawSummary> = conn
    .query_row(
      "SELECT person_id, first_name, last_name, gender, birth_year
       FROM persons WHERE person_id = ?1",
      params![encode_uuid(id)],
      RawSummary::from_row,
    )
    .optional()?;
  raw.map(RawSummary::into_summary).transpose()
}

fn spouse_summaries(
  conn: &Connection,
  id: Uuid,
) -> Result<Vec<PersonSummary>> {
  let mut stmt = conn.prepare(
    "SELECT p.person_id, p.first_name, p.last_name, p.gender, p.birth_year
     FROM persons p
     JOIN spouses s
       ON (s.person_a = ?1 AND s.person_b = p.person_id)
       OR (s.person_b = ?1 AND s.person_a = p.person_id)
     WHERE p.matching_status <> 'matched'
     ORDER BY p.last_name, p.first_name",
  )?;
  let raws = stmt
    .query_map(params![encode_uuid(id)], RawSummary::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawSummary::into_summary).collect()
}

fn child_summaries(
  conn: &Connection,
  id: Uuid,
) -> Result<Vec<PersonSummary>> {
  let mut stmt = conn.prepare(
    "SELECT person_id, first_name, last_name, gender, birth_year
     FROM persons
     WHERE (father_id = ?1 OR mother_id = ?1)
       AND matching_status <> 'matched'
     ORDER BY birth_year, first_name",
  )?;
  let raws = stmt
    .query_map(params![encode_uuid(id)], RawSummary::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawSummary::into_summary).collect()
}

pub fn person_view(conn: &Connection, id: Uuid) -> Result<Option<PersonView>> {
  let Some(person) = person_by_id(conn, id)? else {
    return Ok(None);
  };
  let father = match person.father_id {
    Some(f) => summary_by_id(conn, f)?,
    None => None,
  };
  let mother = match person.mother_id {
    Some(m) => summary_by_id(conn, m)?,
    None => None,
  };
  let spouses = spouse_summaries(conn, id)?;
  let children = child_summaries(conn, id)?;
  Ok(Some(PersonView { person, father, mother, spouses, children }))
}

pub fn find_me(
  conn: &Connection,
  query: &FindMeQuery,
) -> Result<Vec<PersonSummary>> {
  let mut stmt = conn.prepare(
    "SELECT p.person_id, p.first_name, p.last_name, p.gender, p.birth_year
     FROM persons p
     JOIN persons f ON f.person_id = p.father_id
     JOIN persons m ON m.person_id = p.mother_id
     WHERE lower(p.first_name) LIKE '%' || lower(?1) || '%'
       AND lower(p.last_name)  LIKE '%' || lower(?2) || '%'
       AND lower(f.first_name) LIKE '%' || lower(?3) || '%'
       AND lower(m.first_name) LIKE '%' || lower(?4) || '%'
       AND p.matching_status <> 'matched'
     ORDER BY p.last_name, p.first_name",
  )?;
  let raws = stmt
    .query_map(
      params![
        query.first_name,
        query.last_name,
        query.father_name,
        query.mother_name,
      ],
      RawSummary::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawSummary::into_summary).collect()
}

// ─── Person writes ───────────────────────────────────────────────────────────

fn insert_person(conn: &Connection, person: &Person) -> Result<()> {
  conn.execute(
    "INSERT INTO persons (
       person_id, first_name, last_name, gender, birth_year, birth_date,
       birth_place, death_year, death_date, father_id, mother_id,
       matching_status, user_id, created_by, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
    params![
      encode_uuid(person.person_id),
      person.first_name,
      person.last_name,
      encode_gender(person.gender),
      person.birth_year,
      person.birth_date.map(encode_date),
      person.birth_place,
      person.death_year,
      person.death_date.map(encode_date),
      person.father_id.map(encode_uuid),
      person.mother_id.map(encode_uuid),
      encode_matching_status(person.matching_status),
      person.user_id.map(encode_uuid),
      encode_uuid(person.created_by),
      encode_dt(person.created_at),
      encode_dt(person.updated_at),
    ],
  )?;
  Ok(())
}

pub fn create_person(conn: &Connection, input: NewPerson) -> Result<Person> {
  let now = Utc::now();
  let person = Person {
    person_id:       Uuid::new_v4(),
    first_name:      input.first_name,
    last_name:       input.last_name,
    gender:          input.gender,
    birth_year:      input.birth_year,
    birth_date:      input.birth_date,
    birth_place:     input.birth_place,
    death_year:      input.death_year,
    death_date:      input.death_date,
    father_id:       None,
    mother_id:       None,
    matching_status: MatchingStatus::NoMatch,
    user_id:         input.user_id,
    created_by:      input.created_by,
    created_at:      now,
    updated_at:      now,
  };
  insert_person(conn, &person)?;
  Ok(person)
}

pub fn update_person(
  conn: &Connection,
  id: Uuid,
  update: PersonUpdate,
) -> Result<Person> {
  let mut person = require_person(conn, id)?;

  if let Some(v) = update.first_name {
    person.first_name = v;
  }
  if let Some(v) = update.last_name {
    person.last_name = v;
  }
  if let Some(v) = update.gender {
    person.gender = v;
  }
  if let Some(v) = update.birth_year {
    person.birth_year = v;
  }
  if let Some(v) = update.birth_date {
    person.birth_date = Some(v);
  }
  if let Some(v) = update.birth_place {
    person.birth_place = Some(v);
  }
  if let Some(v) = update.death_year {
    person.death_year = Some(v);
  }
  if let Some(v) = update.death_date {
    person.death_date = Some(v);
  }
  person.updated_at = Utc::now();

  conn.execute(
    "UPDATE persons SET
       first_name = ?2, last_name = ?3, gender = ?4, birth_year = ?5,
       birth_date = ?6, birth_place = ?7, death_year = ?8, death_date = ?9,
       updated_at = ?10
     WHERE person_id = ?1",
    params![
      encode_uuid(id),
      person.first_name,
      person.last_name,
      encode_gender(person.gender),
      person.birth_year,
      person.birth_date.map(encode_date),
      person.birth_place,
      person.death_year,
      person.death_date.map(encode_date),
      encode_dt(person.updated_at),
    ],
  )?;
  Ok(person)
}

pub fn delete_person(conn: &Connection, id: Uuid) -> Result<()> {
  let person = require_person(conn, id)?;
  if person.father_id.is_some() || person.mother_id.is_some() {
    return Err(CoreError::PersonHasDependents(id).into());
  }

  let id_str = encode_uuid(id);
  let has_children: bool = conn.query_row(
    "SELECT EXISTS(SELECT 1 FROM persons WHERE father_id = ?1 OR mother_id = ?1)",
    params![id_str],
    |r| r.get(0),
  )?;
  let has_spouses: bool = conn.query_row(
    "SELECT EXISTS(SELECT 1 FROM spouses WHERE person_a = ?1 OR person_b = ?1)",
    params![id_str],
    |r| r.get(0),
  )?;
  if has_children || has_spouses {
    return Err(CoreError::PersonHasDependents(id).into());
  }

  // Matching and permission rows go with the person via cascade.
  conn.execute("DELETE FROM persons WHERE person_id = ?1", params![id_str])?;
  Ok(())
}

// ─── Parent and spouse edges ─────────────────────────────────────────────────

#[derive(Clone, Copy)]
pub enum ParentSlot {
  Father,
  Mother,
}

impl ParentSlot {
  fn column(self) -> &'static str {
    match self {
      Self::Father => "father_id",
      Self::Mother => "mother_id",
    }
  }

  fn relation(self) -> RelationKind {
    match self {
      Self::Father => RelationKind::Father,
      Self::Mother => RelationKind::Mother,
    }
  }
}

/// Would `parent` becoming a parent of `child` make `child` its own
/// ancestor? Walks the existing ancestry of `parent`; the visited set also
/// terminates the walk on a pre-existing (corrupt) cycle.
fn would_create_loop(
  conn: &Connection,
  child: Uuid,
  parent: Uuid,
) -> Result<bool> {
  if child == parent {
    return Ok(true);
  }
  let mut stack = vec![parent];
  let mut visited: HashSet<Uuid> = HashSet::new();
  while let Some(id) = stack.pop() {
    if id == child {
      return Ok(true);
    }
    if !visited.insert(id) {
      continue;
    }
    let parents: Option<(Option<String>, Option<String>)> = conn
      .query_row(
        "SELECT father_id, mother_id FROM persons WHERE person_id = ?1",
        params![encode_uuid(id)],
        |r| Ok((r.get(0)?, r.get(1)?)),
      )
      .optional()?;
    if let Some((father, mother)) = parents {
      if let Some(f) = father {
        stack.push(Uuid::parse_str(&f)?);
      }
      if let Some(m) = mother {
        stack.push(Uuid::parse_str(&m)?);
      }
    }
  }
  Ok(false)
}

fn write_parent(
  conn: &Connection,
  child: Uuid,
  parent: Option<Uuid>,
  slot: ParentSlot,
) -> Result<()> {
  conn.execute(
    &format!(
      "UPDATE persons SET {} = ?2, updated_at = ?3 WHERE person_id = ?1",
      slot.column()
    ),
    params![
      encode_uuid(child),
      parent.map(encode_uuid),
      encode_dt(Utc::now()),
    ],
  )?;
  Ok(())
}

/// Assign an empty parent slot, refusing occupied slots and edges that
/// would close a cycle. Completing the child's parent pair links the two
/// parents as spouses.
pub fn set_parent(
  conn: &Connection,
  child_id: Uuid,
  parent_id: Uuid,
  slot: ParentSlot,
) -> Result<()> {
  let child = require_person(conn, child_id)?;
  require_person(conn, parent_id)?;

  let occupied = match slot {
    ParentSlot::Father => child.father_id,
    ParentSlot::Mother => child.mother_id,
  };
  if occupied.is_some() {
    return Err(
      CoreError::DuplicateParent { person: child_id, slot: slot.relation() }
        .into(),
    );
  }
  if would_create_loop(conn, child_id, parent_id)? {
    return Err(CoreError::LoopInTree(child_id).into());
  }

  write_parent(conn, child_id, Some(parent_id), slot)?;

  let other = match slot {
    ParentSlot::Father => child.mother_id,
    ParentSlot::Mother => child.father_id,
  };
  if let Some(other_parent) = other {
    insert_spouse_edge(conn, parent_id, other_parent)?;
  }
  Ok(())
}

fn insert_spouse_edge(conn: &Connection, a: Uuid, b: Uuid) -> Result<()> {
  let (first, second) = spouse_pair(a, b);
  conn.execute(
    "INSERT OR IGNORE INTO spouses (person_a, person_b) VALUES (?1, ?2)",
    params![first, second],
  )?;
  Ok(())
}

fn delete_spouse_edge(conn: &Connection, a: Uuid, b: Uuid) -> Result<()> {
  let (first, second) = spouse_pair(a, b);
  conn.execute(
    "DELETE FROM spouses WHERE person_a = ?1 AND person_b = ?2",
    params![first, second],
  )?;
  Ok(())
}

/// Canonical storage order for the symmetric pair.
fn spouse_pair(a: Uuid, b: Uuid) -> (String, String) {
  let (a, b) = (encode_uuid(a), encode_uuid(b));
  if a < b { (a, b) } else { (b, a) }
}

pub fn add_spouse(conn: &Connection, a: Uuid, b: Uuid) -> Result<()> {
  if a == b {
    return Err(CoreError::SelfSpouse(a).into());
  }
  require_person(conn, a)?;
  require_person(conn, b)?;
  insert_spouse_edge(conn, a, b)
}

// ─── Matchmaking ─────────────────────────────────────────────────────────────

const CANDIDATE_SQL: &str = "
  SELECT p.person_id, p.first_name, p.last_name, p.gender, p.birth_year,
         (SELECT f.first_name FROM persons f
           WHERE f.person_id = p.father_id) AS father_name,
         (SELECT m.first_name FROM persons m
           WHERE m.person_id = p.mother_id) AS mother_name,
         (SELECT c.first_name FROM persons c
           WHERE (c.father_id = p.person_id OR c.mother_id = p.person_id)
             AND c.person_id NOT IN (?5, ?6)
             AND c.matching_status <> 'matched'
           ORDER BY c.birth_year, c.first_name LIMIT 1) AS child_name,
         (SELECT q.first_name FROM persons q
           JOIN spouses s
             ON (s.person_a = p.person_id AND s.person_b = q.person_id)
             OR (s.person_b = p.person_id AND s.person_a = q.person_id)
           WHERE q.person_id NOT IN (?5, ?6)
           ORDER BY q.first_name LIMIT 1) AS spouse_name
  FROM persons p
  WHERE lower(p.first_name) LIKE '%' || lower(?1) || '%'
    AND lower(p.last_name)  LIKE '%' || lower(?2) || '%'
    AND p.birth_year = ?3
    AND p.gender = ?4
    AND p.matching_status <> 'matched'
    AND p.person_id NOT IN (?5, ?6)
  ORDER BY p.last_name, p.first_name";

/// The two exclusion slots of [`CANDIDATE_SQL`]: the probe person and, in a
/// relation-matching flow, the anchor. With only one id to exclude it is
/// repeated into the second slot.
fn exclusion_slots(query: &MatchQuery) -> (String, String) {
  let first = query
    .exclude
    .first()
    .copied()
    .map(encode_uuid)
    .unwrap_or_else(|| encode_uuid(Uuid::nil()));
  let second = query
    .exclude
    .get(1)
    .copied()
    .map(encode_uuid)
    .unwrap_or_else(|| first.clone());
  (first, second)
}

/// Fuzzy candidates for `query`, decorated with one relative name each —
/// the whole profile comes back from a single query, so a deep choice list
/// never fans out into per-candidate lookups.
pub fn candidates(
  conn: &Connection,
  query: &MatchQuery,
) -> Result<Vec<CandidateProfile>> {
  let (excl_a, excl_b) = exclusion_slots(query);
  let mut stmt = conn.prepare(CANDIDATE_SQL)?;
  let rows = stmt
    .query_map(
      params![
        query.first_name,
        query.last_name,
        query.birth_year,
        encode_gender(query.gender),
        excl_a,
        excl_b,
      ],
      |row| {
        Ok((
          RawSummary::from_row(row)?,
          row.get::<_, Option<String>>(5)?,
          row.get::<_, Option<String>>(6)?,
          row.get::<_, Option<String>>(7)?,
          row.get::<_, Option<String>>(8)?,
        ))
      },
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  rows
    .into_iter()
    .map(|(raw, father_name, mother_name, child_name, spouse_name)| {
      Ok(CandidateProfile {
        person: raw.into_summary()?,
        father_name,
        mother_name,
        child_name,
        spouse_name,
      })
    })
    .collect()
}

pub fn match_exists(conn: &Connection, query: &MatchQuery) -> Result<bool> {
  let (excl_a, excl_b) = exclusion_slots(query);
  let exists: bool = conn.query_row(
    "SELECT EXISTS(
       SELECT 1 FROM persons p
       WHERE lower(p.first_name) LIKE '%' || lower(?1) || '%'
         AND lower(p.last_name)  LIKE '%' || lower(?2) || '%'
         AND p.birth_year = ?3
         AND p.gender = ?4
         AND p.matching_status <> 'matched'
         AND p.person_id NOT IN (?5, ?6))",
    params![
      query.first_name,
      query.last_name,
      query.birth_year,
      encode_gender(query.gender),
      excl_a,
      excl_b,
    ],
    |r| r.get(0),
  )?;
  Ok(exists)
}

/// Load the probe person and run its candidate query; `anchor` switches to
/// the relation-matching exclusion set.
pub fn candidates_for(
  conn: &Connection,
  person_id: Uuid,
  anchor: Option<Uuid>,
) -> Result<Vec<CandidateProfile>> {
  let probe = require_person(conn, person_id)?;
  let query = match anchor {
    Some(anchor_id) => MatchQuery::for_related(&probe, anchor_id),
    None => MatchQuery::for_person(&probe),
  };
  candidates(conn, &query)
}

pub fn match_exists_for(
  conn: &Connection,
  person_id: Uuid,
  anchor: Option<Uuid>,
) -> Result<bool> {
  let probe = require_person(conn, person_id)?;
  let query = match anchor {
    Some(anchor_id) => MatchQuery::for_related(&probe, anchor_id),
    None => MatchQuery::for_person(&probe),
  };
  match_exists(conn, &query)
}

// ─── Matching requests ───────────────────────────────────────────────────────

pub fn request_by_id(
  conn: &Connection,
  id: Uuid,
) -> Result<Option<MatchingRequest>> {
  let raw: Option<RawRequest> = conn
    .query_row(
      &format!(
        "SELECT {} FROM matching_requests WHERE request_id = ?1",
        RawRequest::COLUMNS
      ),
      params![encode_uuid(id)],
      RawRequest::from_row,
    )
    .optional()?;
  raw.map(RawRequest::into_request).transpose()
}

fn require_request(conn: &Connection, id: Uuid) -> Result<MatchingRequest> {
  request_by_id(conn, id)?.ok_or(Error::Core(CoreError::RequestNotFound(id)))
}

pub fn list_requests(
  conn: &Connection,
  status: Option<RequestStatus>,
) -> Result<Vec<MatchingRequest>> {
  let raws = if let Some(status) = status {
    let mut stmt = conn.prepare(&format!(
      "SELECT {} FROM matching_requests WHERE status = ?1
       ORDER BY created_at",
      RawRequest::COLUMNS
    ))?;
    stmt
      .query_map(params![encode_request_status(status)], RawRequest::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?
  } else {
    let mut stmt = conn.prepare(&format!(
      "SELECT {} FROM matching_requests ORDER BY created_at",
      RawRequest::COLUMNS
    ))?;
    stmt
      .query_map([], RawRequest::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?
  };
  raws.into_iter().map(RawRequest::into_request).collect()
}

fn set_matching_status(
  conn: &Connection,
  person: Uuid,
  status: MatchingStatus,
) -> Result<()> {
  conn.execute(
    "UPDATE persons SET matching_status = ?2, updated_at = ?3
     WHERE person_id = ?1",
    params![
      encode_uuid(person),
      encode_matching_status(status),
      encode_dt(Utc::now()),
    ],
  )?;
  Ok(())
}

fn write_request_status(
  conn: &Connection,
  request: Uuid,
  status: RequestStatus,
  similar: Option<Uuid>,
) -> Result<()> {
  conn.execute(
    "UPDATE matching_requests
     SET status = ?2, similar_person_id = ?3, updated_at = ?4
     WHERE request_id = ?1",
    params![
      encode_uuid(request),
      encode_request_status(status),
      similar.map(encode_uuid),
      encode_dt(Utc::now()),
    ],
  )?;
  Ok(())
}

// ─── add_relative ────────────────────────────────────────────────────────────

pub fn add_relative(
  conn: &Connection,
  anchor_id: Uuid,
  relation: RelationKind,
  input: NewPerson,
) -> Result<AddRelativeOutcome> {
  let anchor = require_person(conn, anchor_id)?;
  let created_by = input.created_by;
  let person = create_person(conn, input)?;

  // The requested edge is established immediately, pending or not; a
  // confirmed match later swaps it onto the similar person.
  match relation {
    RelationKind::Father => {
      set_parent(conn, anchor_id, person.person_id, ParentSlot::Father)?;
    }
    RelationKind::Mother => {
      set_parent(conn, anchor_id, person.person_id, ParentSlot::Mother)?;
    }
    RelationKind::Spouse => add_spouse(conn, anchor_id, person.person_id)?,
    RelationKind::Child => {
      let slot = match anchor.gender {
        Gender::Male => ParentSlot::Father,
        Gender::Female => ParentSlot::Mother,
      };
      set_parent(conn, person.person_id, anchor_id, slot)?;
    }
  }

  let found =
    candidates(conn, &MatchQuery::for_related(&person, anchor_id))?;
  if found.is_empty() {
    let person = require_person(conn, person.person_id)?;
    return Ok(AddRelativeOutcome { person, request: None });
  }

  set_matching_status(conn, person.person_id, MatchingStatus::IsMatching)?;
  let now = Utc::now();
  let request = MatchingRequest {
    request_id: Uuid::new_v4(),
    person_id: anchor_id,
    related_person_id: person.person_id,
    similar_person_id: None,
    relation,
    status: RequestStatus::AwaitingSimilar,
    created_by,
    created_at: now,
    updated_at: now,
  };
  conn.execute(
    "INSERT INTO matching_requests (
       request_id, person_id, related_person_id, similar_person_id,
       relation, status, created_by, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    params![
      encode_uuid(request.request_id),
      encode_uuid(request.person_id),
      encode_uuid(request.related_person_id),
      Option::<String>::None,
      encode_relation(relation),
      encode_request_status(request.status),
      encode_uuid(created_by),
      encode_dt(now),
      encode_dt(now),
    ],
  )?;

  let person = require_person(conn, person.person_id)?;
  Ok(AddRelativeOutcome { person, request: Some(request) })
}

// ─── Workflow transitions ────────────────────────────────────────────────────

pub fn set_similar(
  conn: &Connection,
  id: Uuid,
  similar: Option<Uuid>,
) -> Result<MatchingRequest> {
  let request = require_request(conn, id)?;
  ensure_transition(request.status, Transition::SetSimilar)
    .map_err(Error::Core)?;

  match similar {
    None => {
      // "None of these": the relative is no duplicate after all.
      set_matching_status(
        conn,
        request.related_person_id,
        MatchingStatus::NoMatch,
      )?;
      write_request_status(conn, id, RequestStatus::Rejected, None)?;
    }
    Some(similar_id) => {
      let candidate = require_person(conn, similar_id)?;
      if candidate.matching_status == MatchingStatus::Matched
        || similar_id == request.related_person_id
        || similar_id == request.person_id
      {
        return Err(CoreError::InvalidCandidate(similar_id).into());
      }
      write_request_status(
        conn,
        id,
        RequestStatus::AwaitingConfirmation,
        Some(similar_id),
      )?;
    }
  }
  require_request(conn, id)
}

pub fn confirm_matching(conn: &Connection, id: Uuid) -> Result<MatchingRequest> {
  let request = require_request(conn, id)?;
  ensure_transition(request.status, Transition::Confirm)
    .map_err(Error::Core)?;
  let similar_id = request
    .similar_person_id
    .ok_or(Error::Core(CoreError::NoSimilarSelected(id)))?;
  let anchor = require_person(conn, request.person_id)?;

  match merge_edge(request.relation, anchor.gender) {
    MergeEdge::AnchorFather => {
      merge_anchor_parent(conn, &anchor, similar_id, ParentSlot::Father)?;
    }
    MergeEdge::AnchorMother => {
      merge_anchor_parent(conn, &anchor, similar_id, ParentSlot::Mother)?;
    }
    MergeEdge::TargetFather => {
      merge_target_parent(conn, &anchor, similar_id, ParentSlot::Father)?;
    }
    MergeEdge::TargetMother => {
      merge_target_parent(conn, &anchor, similar_id, ParentSlot::Mother)?;
    }
    MergeEdge::SpouseLink => {
      insert_spouse_edge(conn, anchor.person_id, similar_id)?;
    }
  }

  set_matching_status(
    conn,
    request.related_person_id,
    MatchingStatus::Matched,
  )?;
  write_request_status(conn, id, RequestStatus::IsDone, Some(similar_id))?;
  require_request(conn, id)
}

/// `anchor.<slot> := similar` — the slot currently holds the related person
/// and is rewritten in place, bypassing the occupied-slot rule that governs
/// ordinary parent assignment.
fn merge_anchor_parent(
  conn: &Connection,
  anchor: &Person,
  similar_id: Uuid,
  slot: ParentSlot,
) -> Result<()> {
  if would_create_loop(conn, anchor.person_id, similar_id)? {
    return Err(CoreError::LoopInTree(anchor.person_id).into());
  }
  write_parent(conn, anchor.person_id, Some(similar_id), slot)
}

/// `similar.<slot> := anchor` — the similar person's own slot must be free.
fn merge_target_parent(
  conn: &Connection,
  anchor: &Person,
  similar_id: Uuid,
  slot: ParentSlot,
) -> Result<()> {
  let similar = require_person(conn, similar_id)?;
  let occupied = match slot {
    ParentSlot::Father => similar.father_id,
    ParentSlot::Mother => similar.mother_id,
  };
  if occupied.is_some() {
    return Err(
      CoreError::DuplicateParent { person: similar_id, slot: slot.relation() }
        .into(),
    );
  }
  if would_create_loop(conn, similar_id, anchor.person_id)? {
    return Err(CoreError::LoopInTree(similar_id).into());
  }
  write_parent(conn, similar_id, Some(anchor.person_id), slot)
}

pub fn undo_matching(conn: &Connection, id: Uuid) -> Result<MatchingRequest> {
  let request = require_request(conn, id)?;
  ensure_transition(request.status, Transition::Undo).map_err(Error::Core)?;

  // Only a done match ever merged an edge; a rejection has nothing to
  // reverse beyond the flags.
  if request.status == RequestStatus::IsDone {
    let similar_id = request
      .similar_person_id
      .ok_or(Error::Core(CoreError::NoSimilarSelected(id)))?;
    let anchor = require_person(conn, request.person_id)?;

    match merge_edge(request.relation, anchor.gender) {
      MergeEdge::AnchorFather => write_parent(
        conn,
        anchor.person_id,
        Some(request.related_person_id),
        ParentSlot::Father,
      )?,
      MergeEdge::AnchorMother => write_parent(
        conn,
        anchor.person_id,
        Some(request.related_person_id),
        ParentSlot::Mother,
      )?,
      MergeEdge::TargetFather => {
        write_parent(conn, similar_id, None, ParentSlot::Father)?;
      }
      MergeEdge::TargetMother => {
        write_parent(conn, similar_id, None, ParentSlot::Mother)?;
      }
      MergeEdge::SpouseLink => {
        delete_spouse_edge(conn, anchor.person_id, similar_id)?;
      }
    }
  }

  set_matching_status(
    conn,
    request.related_person_id,
    MatchingStatus::IsMatching,
  )?;
  write_request_status(
    conn,
    id,
    RequestStatus::AwaitingConfirmation,
    request.similar_person_id,
  )?;
  require_request(conn, id)
}

pub fn reject_matching(conn: &Connection, id: Uuid) -> Result<MatchingRequest> {
  let request = require_request(conn, id)?;
  ensure_transition(request.status, Transition::Reject).map_err(Error::Core)?;

  set_matching_status(
    conn,
    request.related_person_id,
    MatchingStatus::NoMatch,
  )?;
  write_request_status(
    conn,
    id,
    RequestStatus::Rejected,
    request.similar_person_id,
  )?;
  require_request(conn, id)
}

pub fn remove_similar(conn: &Connection, id: Uuid) -> Result<MatchingRequest> {
  let request = require_request(conn, id)?;
  ensure_transition(request.status, Transition::RemoveSimilar)
    .map_err(Error::Core)?;

  write_request_status(conn, id, RequestStatus::AwaitingSimilar, None)?;
  require_request(conn, id)
}

/// Apply one transition across a selection; each item commits or rolls back
/// on its own, and failures are collected rather than fatal.
pub fn apply_many(
  conn: &mut rusqlite::Connection,
  ids: &[Uuid],
  apply: fn(&Connection, Uuid) -> Result<MatchingRequest>,
) -> Result<BatchOutcome> {
  let mut outcome = BatchOutcome::default();
  for &id in ids {
    let tx = conn.transaction()?;
    match apply(&tx, id) {
      Ok(_) => {
        tx.commit()?;
        outcome.succeeded.push(id);
      }
      Err(e) => {
        // Dropping the transaction rolls this item back.
        outcome
          .failed
          .push(BatchFailure { request_id: id, reason: e.to_string() });
      }
    }
  }
  Ok(outcome)
}

// ─── Tree traversal ──────────────────────────────────────────────────────────

/// [`TreeSource`] over a live connection; one point query per node.
struct ConnSource<'c> {
  conn: &'c Connection,
}

impl TreeSource for ConnSource<'_> {
  type Error = Error;

  fn node(&mut self, id: Uuid) -> Result<Option<PersonNode>> {
    let raw: Option<RawNode> = self
      .conn
      .query_row(
        "SELECT person_id, first_name, last_name, gender, birth_year,
                matching_status, father_id, mother_id
         FROM persons WHERE person_id = ?1",
        params![encode_uuid(id)],
        RawNode::from_row,
      )
      .optional()?;
    raw.map(RawNode::into_node).transpose()
  }

  fn children_of(&mut self, id: Uuid) -> Result<Vec<PersonNode>> {
    let mut stmt = self.conn.prepare(
      "SELECT person_id, first_name, last_name, gender, birth_year,
              matching_status, father_id, mother_id
       FROM persons
       WHERE father_id = ?1 OR mother_id = ?1
       ORDER BY birth_year, first_name",
    )?;
    let raws = stmt
      .query_map(params![encode_uuid(id)], RawNode::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawNode::into_node).collect()
  }
}

fn flatten_tree_error(e: TreeError<Error>) -> Error {
  match e {
    TreeError::Loop(id) => Error::Core(CoreError::LoopInTree(id)),
    TreeError::Source(e) => e,
  }
}

pub fn ancestor_tree(
  conn: &Connection,
  id: Uuid,
) -> Result<Option<shajareh_core::tree::AncestorTree>> {
  let mut source = ConnSource { conn };
  tree::ancestors(&mut source, id).map_err(flatten_tree_error)
}

pub fn descendant_tree(
  conn: &Connection,
  id: Uuid,
) -> Result<Option<shajareh_core::tree::DescendantTree>> {
  let mut source = ConnSource { conn };
  tree::descendants(&mut source, id).map_err(flatten_tree_error)
}

// ─── Tree visibility ─────────────────────────────────────────────────────────

pub fn request_tree_access(
  conn: &Connection,
  person_id: Uuid,
  applicant_id: Uuid,
) -> Result<PermissionRequest> {
  require_person(conn, person_id)?;

  let pending: bool = conn.query_row(
    "SELECT EXISTS(
       SELECT 1 FROM tree_permission_requests
       WHERE person_id = ?1 AND applicant_id = ?2
         AND status = 'awaiting_approve')",
    params![encode_uuid(person_id), encode_uuid(applicant_id)],
    |r| r.get(0),
  )?;
  if pending {
    return Err(
      CoreError::DuplicateRequest {
        person:    person_id,
        applicant: applicant_id,
      }
      .into(),
    );
  }

  let request = PermissionRequest {
    request_id: Uuid::new_v4(),
    person_id,
    applicant_id,
    status: PermissionStatus::AwaitingApprove,
    created_at: Utc::now(),
  };
  conn.execute(
    "INSERT INTO tree_permission_requests (
       request_id, person_id, applicant_id, status, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5)",
    params![
      encode_uuid(request.request_id),
      encode_uuid(person_id),
      encode_uuid(applicant_id),
      encode_permission_status(request.status),
      encode_dt(request.created_at),
    ],
  )?;
  Ok(request)
}

fn permission_by_id(
  conn: &Connection,
  id: Uuid,
) -> Result<Option<PermissionRequest>> {
  let raw: Option<RawPermission> = conn
    .query_row(
      "SELECT request_id, person_id, applicant_id, status, created_at
       FROM tree_permission_requests WHERE request_id = ?1",
      params![encode_uuid(id)],
      RawPermission::from_row,
    )
    .optional()?;
  raw.map(RawPermission::into_permission).transpose()
}

pub fn approve_tree_access(
  conn: &Connection,
  id: Uuid,
) -> Result<PermissionRequest> {
  let request = permission_by_id(conn, id)?
    .ok_or(Error::Core(CoreError::AccessRequestNotFound(id)))?;
  if request.status == PermissionStatus::Approved {
    return Err(CoreError::AlreadyApproved(id).into());
  }

  conn.execute(
    "UPDATE tree_permission_requests SET status = 'approved'
     WHERE request_id = ?1",
    params![encode_uuid(id)],
  )?;
  conn.execute(
    "INSERT OR IGNORE INTO tree_viewers (person_id, user_id) VALUES (?1, ?2)",
    params![
      encode_uuid(request.person_id),
      encode_uuid(request.applicant_id)
    ],
  )?;

  Ok(PermissionRequest { status: PermissionStatus::Approved, ..request })
}

pub fn can_see_tree(
  conn: &Connection,
  person_id: Uuid,
  user_id: Uuid,
) -> Result<bool> {
  let person = require_person(conn, person_id)?;

  let mut stmt =
    conn.prepare("SELECT user_id FROM tree_viewers WHERE person_id = ?1")?;
  let viewer_strs = stmt
    .query_map(params![encode_uuid(person_id)], |r| r.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  let viewers = viewer_strs
    .iter()
    .map(|s| Uuid::parse_str(s))
    .collect::<std::result::Result<Vec<_>, _>>()?;

  Ok(core_access::can_see_tree(&person, &viewers, user_id))
}
