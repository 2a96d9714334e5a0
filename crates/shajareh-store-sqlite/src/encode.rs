//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, calendar dates as ISO 8601
//! dates, enums as their snake_case discriminants, UUIDs as hyphenated
//! lowercase strings.

use chrono::{DateTime, NaiveDate, Utc};
use shajareh_core::{
  access::{PermissionRequest, PermissionStatus},
  matching::{MatchingRequest, RequestStatus},
  person::{Gender, MatchingStatus, Person, PersonSummary, RelationKind},
  tree::PersonNode,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_uuid_opt(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── Timestamps and dates ────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  s.parse().map_err(|_| Error::DateParse(format!("bad date: {s:?}")))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn encode_gender(g: Gender) -> &'static str {
  match g {
    Gender::Male => "male",
    Gender::Female => "female",
  }
}

pub fn decode_gender(s: &str) -> Result<Gender> {
  match s {
    "male" => Ok(Gender::Male),
    "female" => Ok(Gender::Female),
    other => Err(Error::DateParse(format!("unknown gender: {other:?}"))),
  }
}

pub fn encode_matching_status(m: MatchingStatus) -> &'static str {
  match m {
    MatchingStatus::NoMatch => "no_match",
    MatchingStatus::IsMatching => "is_matching",
    MatchingStatus::Matched => "matched",
  }
}

pub fn decode_matching_status(s: &str) -> Result<MatchingStatus> {
  match s {
    "no_match" => Ok(MatchingStatus::NoMatch),
    "is_matching" => Ok(MatchingStatus::IsMatching),
    "matched" => Ok(MatchingStatus::Matched),
    other => {
      Err(Error::DateParse(format!("unknown matching status: {other:?}")))
    }
  }
}

pub fn encode_relation(r: RelationKind) -> &'static str { r.as_str() }

pub fn decode_relation(s: &str) -> Result<RelationKind> {
  match s {
    "father" => Ok(RelationKind::Father),
    "mother" => Ok(RelationKind::Mother),
    "spouse" => Ok(RelationKind::Spouse),
    "child" => Ok(RelationKind::Child),
    other => Err(Error::DateParse(format!("unknown relation: {other:?}"))),
  }
}

pub fn encode_request_status(s: RequestStatus) -> &'static str { s.as_str() }

pub fn decode_request_status(s: &str) -> Result<RequestStatus> {
  match s {
    "awaiting_similar" => Ok(RequestStatus::AwaitingSimilar),
    "awaiting_confirmation" => Ok(RequestStatus::AwaitingConfirmation),
    "is_done" => Ok(RequestStatus::IsDone),
    "rejected" => Ok(RequestStatus::Rejected),
    other => {
      Err(Error::DateParse(format!("unknown request status: {other:?}")))
    }
  }
}

pub fn encode_permission_status(s: PermissionStatus) -> &'static str {
  match s {
    PermissionStatus::AwaitingApprove => "awaiting_approve",
    PermissionStatus::Approved => "approved",
  }
}

pub fn decode_permission_status(s: &str) -> Result<PermissionStatus> {
  match s {
    "awaiting_approve" => Ok(PermissionStatus::AwaitingApprove),
    "approved" => Ok(PermissionStatus::Approved),
    other => {
      Err(Error::DateParse(format!("unknown permission status: {other:?}")))
    }
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `persons` row.
pub struct RawPerson {
  pub person_id:       String,
  pub first_name:      String,
  pub last_name:       String,
  pub gender:          String,
  pub birth_year:      i16,
  pub birth_date:      Option<String>,
  pub birth_place:     Option<String>,
  pub death_year:      Option<i16>,
  pub death_date:      Option<String>,
  pub father_id:       Option<String>,
  pub mother_id:       Option<String>,
  pub matching_status: String,
  pub user_id:         Option<String>,
  pub created_by:      String,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawPerson {
  /// Column list matching the field order above; keep in sync with
  /// [`RawPerson::from_row`].
  pub const COLUMNS: &'static str = "person_id, first_name, last_name, \
     gender, birth_year, birth_date, birth_place, death_year, death_date, \
     father_id, mother_id, matching_status, user_id, created_by, \
     created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      person_id:       row.get(0)?,
      first_name:      row.get(1)?,
      last_name:       row.get(2)?,
      gender:          row.get(3)?,
      birth_year:      row.get(4)?,
      birth_date:      row.get(5)?,
      birth_place:     row.get(6)?,
      death_year:      row.get(7)?,
      death_date:      row.get(8)?,
      father_id:       row.get(9)?,
      mother_id:       row.get(10)?,
      matching_status: row.get(11)?,
      user_id:         row.get(12)?,
      created_by:      row.get(13)?,
      created_at:      row.get(14)?,
      updated_at:      row.get(15)?,
    })
  }

  pub fn into_person(self) -> Result<Person> {
    Ok(Person {
      person_id:       decode_uuid(&self.person_id)?,
      first_name:      self.first_name,
      last_name:       self.last_name,
      gender:          decode_gender(&self.gender)?,
      birth_year:      self.birth_year,
      birth_date:      self.birth_date.as_deref().map(decode_date).transpose()?,
      birth_place:     self.birth_place,
      death_year:      self.death_year,
      death_date:      self.death_date.as_deref().map(decode_date).transpose()?,
      father_id:       decode_uuid_opt(self.father_id.as_deref())?,
      mother_id:       decode_uuid_opt(self.mother_id.as_deref())?,
      matching_status: decode_matching_status(&self.matching_status)?,
      user_id:         decode_uuid_opt(self.user_id.as_deref())?,
      created_by:      decode_uuid(&self.created_by)?,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings for the narrow display projection.
pub struct RawSummary {
  pub person_id:  String,
  pub first_name: String,
  pub last_name:  String,
  pub gender:     String,
  pub birth_year: i16,
}

impl RawSummary {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      person_id:  row.get(0)?,
      first_name: row.get(1)?,
      last_name:  row.get(2)?,
      gender:     row.get(3)?,
      birth_year: row.get(4)?,
    })
  }

  pub fn into_summary(self) -> Result<PersonSummary> {
    Ok(PersonSummary {
      person_id:  decode_uuid(&self.person_id)?,
      first_name: self.first_name,
      last_name:  self.last_name,
      gender:     decode_gender(&self.gender)?,
      birth_year: self.birth_year,
    })
  }
}

/// Raw strings for a traversal node: summary fields plus the parent edges.
pub struct RawNode {
  pub person_id:       String,
  pub first_name:      String,
  pub last_name:       String,
  pub gender:          String,
  pub birth_year:      i16,
  pub matching_status: String,
  pub father_id:       Option<String>,
  pub mother_id:       Option<String>,
}

impl RawNode {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      person_id:       row.get(0)?,
      first_name:      row.get(1)?,
      last_name:       row.get(2)?,
      gender:          row.get(3)?,
      birth_year:      row.get(4)?,
      matching_status: row.get(5)?,
      father_id:       row.get(6)?,
      mother_id:       row.get(7)?,
    })
  }

  pub fn into_node(self) -> Result<PersonNode> {
    Ok(PersonNode {
      person_id:       decode_uuid(&self.person_id)?,
      first_name:      self.first_name,
      last_name:       self.last_name,
      gender:          decode_gender(&self.gender)?,
      birth_year:      self.birth_year,
      matching_status: decode_matching_status(&self.matching_status)?,
      father_id:       decode_uuid_opt(self.father_id.as_deref())?,
      mother_id:       decode_uuid_opt(self.mother_id.as_deref())?,
    })
  }
}

/// Raw strings read directly from a `matching_requests` row.
pub struct RawRequest {
  pub request_id:        String,
  pub person_id:         String,
  pub related_person_id: String,
  pub similar_person_id: Option<String>,
  pub relation:          String,
  pub status:            String,
  pub created_by:        String,
  pub created_at:        String,
  pub updated_at:        String,
}

impl RawRequest {
  pub const COLUMNS: &'static str = "request_id, person_id, \
     related_person_id, similar_person_id, relation, status, created_by, \
     created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      request_id:        row.get(0)?,
      person_id:         row.get(1)?,
      related_person_id: row.get(2)?,
      similar_person_id: row.get(3)?,
      relation:          row.get(4)?,
      status:            row.get(5)?,
      created_by:        row.get(6)?,
      created_at:        row.get(7)?,
      updated_at:        row.get(8)?,
    })
  }

  pub fn into_request(self) -> Result<MatchingRequest> {
    Ok(MatchingRequest {
      request_id:        decode_uuid(&self.request_id)?,
      person_id:         decode_uuid(&self.person_id)?,
      related_person_id: decode_uuid(&self.related_person_id)?,
      similar_person_id: decode_uuid_opt(self.similar_person_id.as_deref())?,
      relation:          decode_relation(&self.relation)?,
      status:            decode_request_status(&self.status)?,
      created_by:        decode_uuid(&self.created_by)?,
      created_at:        decode_dt(&self.created_at)?,
      updated_at:        decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `tree_permission_requests` row.
pub struct RawPermission {
  pub request_id:   String,
  pub person_id:    String,
  pub applicant_id: String,
  pub status:       String,
  pub created_at:   String,
}

impl RawPermission {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      request_id:   row.get(0)?,
      person_id:    row.get(1)?,
      applicant_id: row.get(2)?,
      status:       row.get(3)?,
      created_at:   row.get(4)?,
    })
  }

  pub fn into_permission(self) -> Result<PermissionRequest> {
    Ok(PermissionRequest {
      request_id:   decode_uuid(&self.request_id)?,
      person_id:    decode_uuid(&self.person_id)?,
      applicant_id: decode_uuid(&self.applicant_id)?,
      status:       decode_permission_status(&self.status)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}
