//! Ancestor and descendant traversal with cycle detection.
//!
//! The algorithms live here, behind the narrow [`TreeSource`] lookup trait;
//! storage backends only supply nodes. Each traversal owns a fresh visited
//! set created inside the entry function and threaded down the recursion —
//! the set never outlives one call, so independent traversals cannot bleed
//! into each other.
//!
//! Matched ghost records are skipped as if the edge did not exist. A repeat
//! visit within one traversal fails with a loop error; the graph store
//! refuses the edges that would create a cycle, so the guard is a last line
//! of defence, not a normal code path.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::person::{Gender, MatchingStatus, PersonSummary};

// ─── Source ──────────────────────────────────────────────────────────────────

/// What a traversal needs to know about one person: display fields plus the
/// edges to walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonNode {
  pub person_id:       Uuid,
  pub first_name:      String,
  pub last_name:       String,
  pub gender:          Gender,
  pub birth_year:      i16,
  pub matching_status: MatchingStatus,
  pub father_id:       Option<Uuid>,
  pub mother_id:       Option<Uuid>,
}

impl PersonNode {
  pub fn summary(&self) -> PersonSummary {
    PersonSummary {
      person_id:  self.person_id,
      first_name: self.first_name.clone(),
      last_name:  self.last_name.clone(),
      gender:     self.gender,
      birth_year: self.birth_year,
    }
  }
}

/// Node lookup interface a traversal walks over. Backends keep this narrow:
/// only the display fields and edge ids, never whole rows.
pub trait TreeSource {
  type Error: std::error::Error;

  fn node(&mut self, id: Uuid) -> Result<Option<PersonNode>, Self::Error>;

  /// All persons whose father or mother is `id`.
  fn children_of(&mut self, id: Uuid)
  -> Result<Vec<PersonNode>, Self::Error>;
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TreeError<E: std::error::Error> {
  #[error("loop detected in family tree at person {0}")]
  Loop(Uuid),

  #[error(transparent)]
  Source(#[from] E),
}

// ─── Output shapes ───────────────────────────────────────────────────────────

/// The ancestor tree of one person, keyed father/mother at every level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AncestorTree {
  pub person: PersonSummary,
  pub father: Option<Box<AncestorTree>>,
  pub mother: Option<Box<AncestorTree>>,
}

/// The descendant tree of one person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescendantTree {
  pub person:   PersonSummary,
  pub children: Vec<DescendantTree>,
}

// ─── Ancestors ───────────────────────────────────────────────────────────────

/// Walk up the father/mother edges from `root`. Returns `None` if `root`
/// does not exist.
pub fn ancestors<S: TreeSource>(
  source: &mut S,
  root: Uuid,
) -> Result<Option<AncestorTree>, TreeError<S::Error>> {
  let Some(node) = source.node(root)? else {
    return Ok(None);
  };
  let mut visited = HashSet::from([node.person_id]);
  walk_up(source, node, &mut visited).map(Some)
}

fn walk_up<S: TreeSource>(
  source: &mut S,
  node: PersonNode,
  visited: &mut HashSet<Uuid>,
) -> Result<AncestorTree, TreeError<S::Error>> {
  let father = ascend(source, node.father_id, visited)?;
  let mother = ascend(source, node.mother_id, visited)?;
  Ok(AncestorTree { person: node.summary(), father, mother })
}

fn ascend<S: TreeSource>(
  source: &mut S,
  parent_id: Option<Uuid>,
  visited: &mut HashSet<Uuid>,
) -> Result<Option<Box<AncestorTree>>, TreeError<S::Error>> {
  let Some(id) = parent_id else {
    return Ok(None);
  };
  if !visited.insert(id) {
    return Err(TreeError::Loop(id));
  }
  let Some(node) = source.node(id)? else {
    // Dangling edge; treat as absent rather than failing the whole tree.
    return Ok(None);
  };
  if node.matching_status == MatchingStatus::Matched {
    return Ok(None);
  }
  Ok(Some(Box::new(walk_up(source, node, visited)?)))
}

// ─── Descendants ─────────────────────────────────────────────────────────────

/// Walk down the child edges from `root`, carrying the same loop guard as
/// the ancestor walk. Returns `None` if `root` does not exist.
pub fn descendants<S: TreeSource>(
  source: &mut S,
  root: Uuid,
) -> Result<Option<DescendantTree>, TreeError<S::Error>> {
  let Some(node) = source.node(root)? else {
    return Ok(None);
  };
  let mut visited = HashSet::from([node.person_id]);
  walk_down(source, node, &mut visited).map(Some)
}

fn walk_down<S: TreeSource>(
  source: &mut S,
  node: PersonNode,
  visited: &mut HashSet<Uuid>,
) -> Result<DescendantTree, TreeError<S::Error>> {
  let mut children = Vec::new();
  for child in source.children_of(node.person_id)? {
    if child.matching_status == MatchingStatus::Matched {
      continue;
    }
    if !visited.insert(child.person_id) {
      return Err(TreeError::Loop(child.person_id));
    }
    children.push(walk_down(source, child, visited)?);
  }
  Ok(DescendantTree { person: node.summary(), children })
}
