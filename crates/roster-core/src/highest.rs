//! Highest privilege held per role namespace.
//!
//! A role token such as `COF_LEAD_ASSESSOR` splits at its first `_` into a
//! namespace (`COF`, the fund short name) and a sub-role (`LEAD_ASSESSOR`).
//! Only sub-roles on the [`Privilege`] ladder take part; every other token
//! (region tags, round-qualified roles, unknown sub-roles) is ignored here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};

/// The privilege ladder, highest first. Declaration order is rank order, so
/// `Ord` puts the most privileged sub-role first.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Privilege {
  LeadAssessor,
  Assessor,
  Commenter,
}

/// Namespace → highest sub-role held within it.
pub type HighestRoleMap = BTreeMap<String, Privilege>;

/// Reduce a set of role tokens to the highest [`Privilege`] per namespace.
///
/// Namespaces with no qualifying role are absent from the result. Duplicate
/// tokens and input order have no effect on the output.
pub fn highest_role_map<I, R>(roles: I) -> HighestRoleMap
where
  I: IntoIterator<Item = R>,
  R: AsRef<str>,
{
  let mut map = HighestRoleMap::new();

  for role in roles {
    let Some((namespace, sub_role)) = role.as_ref().split_once('_') else {
      continue;
    };
    if namespace.is_empty() {
      continue;
    }
    let Ok(privilege) = sub_role.parse::<Privilege>() else {
      continue;
    };

    map
      .entry(namespace.to_owned())
      .and_modify(|held| *held = (*held).min(privilege))
      .or_insert(privilege);
  }

  map
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator as _;

  use super::*;

  fn expected(pairs: &[(&str, Privilege)]) -> HighestRoleMap {
    pairs.iter().map(|(ns, p)| ((*ns).to_owned(), *p)).collect()
  }

  #[test]
  fn ladder_is_ranked_highest_first() {
    let ladder: Vec<&'static str> = Privilege::iter().map(Into::into).collect();
    assert_eq!(ladder, ["LEAD_ASSESSOR", "ASSESSOR", "COMMENTER"]);
    assert!(Privilege::LeadAssessor < Privilege::Assessor);
    assert!(Privilege::Assessor < Privilege::Commenter);
  }

  #[test]
  fn picks_highest_role_per_namespace() {
    let roles = [
      "COF_ASSESSOR",
      "COF_COMMENTER",
      "NSTF_LEAD_ASSESSOR",
      "NSTF_ASSESSOR",
      "INVALIDFUND_INVALIDROLE",
    ];

    let map = highest_role_map(roles);
    assert_eq!(
      map,
      expected(&[
        ("COF", Privilege::Assessor),
        ("NSTF", Privilege::LeadAssessor),
      ])
    );
    assert_eq!(
      serde_json::to_value(&map).unwrap(),
      serde_json::json!({ "COF": "ASSESSOR", "NSTF": "LEAD_ASSESSOR" })
    );
  }

  #[test]
  fn ignores_region_tags_and_unknown_sub_roles() {
    let roles = [
      "COF_ASSESSOR",
      "COF_COMMENTER",
      "COF_SCOTLAND",
      "COF_ENGLAND",
      "COF_WALES",
      "COF_NORTHERNIRELAND",
      "NSTF_LEAD_ASSESSOR",
      "NSTF_ASSESSOR",
      "NSTF_COMMENTER",
      "MOCKFUND_COMMENTER",
      "INVALIDFUND_INVALIDROLE",
      "COF_ASSESSOR_R1",
    ];

    let map = highest_role_map(roles);
    assert!(!map.contains_key("INVALIDFUND"));
    assert_eq!(
      map,
      expected(&[
        ("COF", Privilege::Assessor),
        ("NSTF", Privilege::LeadAssessor),
        ("MOCKFUND", Privilege::Commenter),
      ])
    );
  }

  #[test]
  fn tokens_without_a_namespace_are_excluded() {
    let map = highest_role_map(["ADMIN", "ASSESSOR", "_COMMENTER", "LEAD_ASSESSOR"]);
    // `LEAD_ASSESSOR` splits into namespace `LEAD` and sub-role `ASSESSOR`.
    assert_eq!(map, expected(&[("LEAD", Privilege::Assessor)]));
  }

  #[test]
  fn empty_input_yields_empty_map() {
    assert!(highest_role_map(Vec::<String>::new()).is_empty());
  }

  #[test]
  fn is_idempotent_and_order_independent() {
    let roles = vec!["NSTF_COMMENTER", "COF_COMMENTER", "COF_LEAD_ASSESSOR", "COF_LEAD_ASSESSOR"];
    let mut reversed = roles.clone();
    reversed.reverse();

    let first = highest_role_map(&roles);
    assert_eq!(first, highest_role_map(&roles));
    assert_eq!(first, highest_role_map(&reversed));
    assert_eq!(first["COF"], Privilege::LeadAssessor);
  }
}
