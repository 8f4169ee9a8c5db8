//! Request and response types for bulk role updates.
//!
//! A bulk request is an ordered JSON object of `email → roles`, where the
//! roles are either a single token or a list of tokens:
//!
//! ```json
//! { "a@x.com": "ADMIN", "b@x.com": ["COF_ASSESSOR", "NSTF_COMMENTER"] }
//! ```
//!
//! Entry order is preserved from the wire so that validation, commit order,
//! and error reporting are reproducible for the same input.

use std::fmt;

use serde::{
  Deserialize, Deserializer, Serialize, Serializer,
  de::{MapAccess, Visitor},
  ser::SerializeMap,
};

// ─── Role selection ──────────────────────────────────────────────────────────

/// The desired roles for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleSelection {
  One(String),
  Many(Vec<String>),
}

impl RoleSelection {
  pub fn tokens(&self) -> &[String] {
    match self {
      Self::One(role) => std::slice::from_ref(role),
      Self::Many(roles) => roles,
    }
  }
}

impl From<&str> for RoleSelection {
  fn from(role: &str) -> Self { Self::One(role.to_owned()) }
}

impl From<Vec<&str>> for RoleSelection {
  fn from(roles: Vec<&str>) -> Self {
    Self::Many(roles.into_iter().map(str::to_owned).collect())
  }
}

// ─── Request ─────────────────────────────────────────────────────────────────

/// An ordered mapping of email → [`RoleSelection`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkRoleRequest {
  entries: Vec<(String, RoleSelection)>,
}

impl BulkRoleRequest {
  pub fn new() -> Self { Self::default() }

  /// Append an entry, keeping insertion order.
  pub fn with(mut self, email: impl Into<String>, roles: impl Into<RoleSelection>) -> Self {
    self.entries.push((email.into(), roles.into()));
    self
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &RoleSelection)> {
    self.entries.iter().map(|(email, roles)| (email.as_str(), roles))
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl<K, V> FromIterator<(K, V)> for BulkRoleRequest
where
  K: Into<String>,
  V: Into<RoleSelection>,
{
  fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
    Self {
      entries: iter
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect(),
    }
  }
}

impl Serialize for BulkRoleRequest {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.entries.len()))?;
    for (email, roles) in &self.entries {
      map.serialize_entry(email, roles)?;
    }
    map.end()
  }
}

impl<'de> Deserialize<'de> for BulkRoleRequest {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
      type Value = BulkRoleRequest;

      fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object mapping email addresses to a role or list of roles")
      }

      fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((email, roles)) = access.next_entry::<String, RoleSelection>()? {
          entries.push((email, roles));
        }
        Ok(BulkRoleRequest { entries })
      }
    }

    deserializer.deserialize_map(EntriesVisitor)
  }
}

// ─── Response ────────────────────────────────────────────────────────────────

/// Returned when every account in a bulk request was updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRoleOutcome {
  pub status:   String,
  /// Echo of the request, in request order.
  pub accounts: BulkRoleRequest,
}

impl BulkRoleOutcome {
  pub const ALL_UPDATED: &'static str = "all updated";

  pub fn all_updated(accounts: BulkRoleRequest) -> Self {
    Self { status: Self::ALL_UPDATED.to_owned(), accounts }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn both_request_shapes_deserialize_in_order() {
    let body = r#"{
      "z@x.com": "ADMIN",
      "a@x.com": ["COF_ASSESSOR", "NSTF_COMMENTER"],
      "m@x.com": []
    }"#;
    let request: BulkRoleRequest = serde_json::from_str(body).unwrap();

    let entries: Vec<_> = request.iter().collect();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].0, "z@x.com");
    assert_eq!(entries[0].1.tokens(), ["ADMIN"]);
    assert_eq!(entries[1].0, "a@x.com");
    assert_eq!(entries[1].1.tokens(), ["COF_ASSESSOR", "NSTF_COMMENTER"]);
    assert!(entries[2].1.tokens().is_empty());
  }

  #[test]
  fn outcome_echoes_request_in_order() {
    let request = BulkRoleRequest::new()
      .with("b@x.com", "LEAD_ASSESSOR")
      .with("a@x.com", "ADMIN");
    let json = serde_json::to_string(&BulkRoleOutcome::all_updated(request)).unwrap();
    assert_eq!(
      json,
      r#"{"status":"all updated","accounts":{"b@x.com":"LEAD_ASSESSOR","a@x.com":"ADMIN"}}"#
    );
  }

  #[test]
  fn non_string_roles_are_rejected() {
    let result = serde_json::from_str::<BulkRoleRequest>(r#"{"a@x.com": 7}"#);
    assert!(result.is_err());
    let result = serde_json::from_str::<BulkRoleRequest>(r#"["a@x.com"]"#);
    assert!(result.is_err());
  }
}
