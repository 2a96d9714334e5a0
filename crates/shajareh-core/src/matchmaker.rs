//! Fuzzy matchmaking — finding existing persons that plausibly denote the
//! same real individual as a freshly entered record.
//!
//! Name matching is deliberately substring-based (not exact) to tolerate
//! transliteration and spelling variance in hand-entered genealogical data.
//! False positives are expected; a human confirms every match through the
//! workflow, nothing is merged automatically.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::person::{Gender, Person, PersonSummary, RelationKind};

// ─── Query ───────────────────────────────────────────────────────────────────

/// Parameters for the candidate search: case-insensitive substring on both
/// names, exact birth year, exact gender. Matched ghosts and everything in
/// `exclude` never appear in the results.
#[derive(Debug, Clone)]
pub struct MatchQuery {
  pub first_name: String,
  pub last_name:  String,
  pub birth_year: i16,
  pub gender:     Gender,
  pub exclude:    Vec<Uuid>,
}

impl MatchQuery {
  /// Candidates for `person` itself (used by self-identification flows).
  pub fn for_person(person: &Person) -> Self {
    Self {
      first_name: person.first_name.clone(),
      last_name:  person.last_name.clone(),
      birth_year: person.birth_year,
      gender:     person.gender,
      exclude:    vec![person.person_id],
    }
  }

  /// Candidates for a newly added relative: the relative itself and the
  /// anchor it was attached to are both excluded.
  pub fn for_related(related: &Person, anchor_id: Uuid) -> Self {
    let mut query = Self::for_person(related);
    query.exclude.push(anchor_id);
    query
  }
}

// ─── Candidate profile ───────────────────────────────────────────────────────

/// A candidate plus the relative names used to tell look-alikes apart in the
/// choice list. Each name is fetched by the backend in the same query that
/// finds the candidate; the anchor person is never used as the
/// distinguishing relative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProfile {
  pub person:      PersonSummary,
  pub father_name: Option<String>,
  pub mother_name: Option<String>,
  pub child_name:  Option<String>,
  pub spouse_name: Option<String>,
}

// ─── Choices ─────────────────────────────────────────────────────────────────

/// One entry of the disambiguation list shown to the user.
/// `person_id == None` is the "none of these" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchChoice {
  pub person_id: Option<Uuid>,
  pub label:     String,
}

/// Build the ordered choice list for a relation-matching request.
///
/// The first entry is always the "none of these" sentinel. Every candidate
/// label is decorated with one distinguishing relative, chosen by priority:
/// father, else mother, else a child, else a spouse. When the relation is
/// `Child`, the parent slot the anchor itself would occupy is skipped — the
/// anchor's own name would distinguish nothing.
pub fn labeled_choices(
  anchor_gender: Gender,
  relation: RelationKind,
  candidates: &[CandidateProfile],
) -> Vec<MatchChoice> {
  let anchor_is_father =
    relation == RelationKind::Child && anchor_gender == Gender::Male;
  let anchor_is_mother =
    relation == RelationKind::Child && anchor_gender == Gender::Female;

  let mut choices = vec![MatchChoice {
    person_id: None,
    label:     "none of these".to_string(),
  }];

  for candidate in candidates {
    let mut label = candidate.person.full_name();
    if let (Some(father), false) = (&candidate.father_name, anchor_is_father) {
      label.push_str(&format!(" (father: {father})"));
    } else if let (Some(mother), false) =
      (&candidate.mother_name, anchor_is_mother)
    {
      label.push_str(&format!(" (mother: {mother})"));
    } else if let Some(child) = &candidate.child_name {
      label.push_str(&format!(" (child: {child})"));
    } else if let Some(spouse) = &candidate.spouse_name {
      label.push_str(&format!(" (spouse: {spouse})"));
    }
    choices.push(MatchChoice {
      person_id: Some(candidate.person.person_id),
      label,
    });
  }

  choices
}

#[cfg(test)]
mod tests {
  use super::*;

  fn summary(first: &str, last: &str) -> PersonSummary {
    PersonSummary {
      person_id:  Uuid::new_v4(),
      first_name: first.to_string(),
      last_name:  last.to_string(),
      gender:     Gender::Male,
      birth_year: 1955,
    }
  }

  fn profile(first: &str, last: &str) -> CandidateProfile {
    CandidateProfile {
      person:      summary(first, last),
      father_name: None,
      mother_name: None,
      child_name:  None,
      spouse_name: None,
    }
  }

  #[test]
  fn sentinel_comes_first() {
    let choices = labeled_choices(Gender::Male, RelationKind::Father, &[]);
    assert_eq!(choices.len(), 1);
    assert_eq!(choices[0].person_id, None);
  }

  #[test]
  fn father_name_wins_over_other_relatives() {
    let mut p = profile("Hassan", "Rezaei");
    p.father_name = Some("Gholam".into());
    p.mother_name = Some("Zahra".into());
    p.spouse_name = Some("Maryam".into());

    let choices = labeled_choices(Gender::Male, RelationKind::Father, &[p]);
    assert_eq!(choices[1].label, "Hassan Rezaei (father: Gholam)");
  }

  #[test]
  fn child_relation_skips_the_parent_slot_the_anchor_occupies() {
    // A male anchor adding a child would BE the father; naming the
    // candidate's father would point back at the anchor itself.
    let mut p = profile("Ali", "Rezaei");
    p.father_name = Some("anchor-name".into());
    p.mother_name = Some("Zahra".into());

    let choices = labeled_choices(Gender::Male, RelationKind::Child, &[p]);
    assert_eq!(choices[1].label, "Ali Rezaei (mother: Zahra)");
  }

  #[test]
  fn falls_back_to_child_then_spouse() {
    let mut p = profile("Hassan", "Rezaei");
    p.spouse_name = Some("Maryam".into());
    let choices =
      labeled_choices(Gender::Male, RelationKind::Father, &[p.clone()]);
    assert_eq!(choices[1].label, "Hassan Rezaei (spouse: Maryam)");

    p.child_name = Some("Reza".into());
    let choices = labeled_choices(Gender::Male, RelationKind::Father, &[p]);
    assert_eq!(choices[1].label, "Hassan Rezaei (child: Reza)");
  }

  #[test]
  fn undecorated_when_candidate_has_no_relatives() {
    let choices = labeled_choices(
      Gender::Female,
      RelationKind::Spouse,
      &[profile("Hassan", "Rezaei")],
    );
    assert_eq!(choices[1].label, "Hassan Rezaei");
  }
}
