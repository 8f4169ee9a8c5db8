//! The role catalog and the role normaliser.
//!
//! Role tokens are an open string type checked against a closed catalog at
//! the request boundary. The catalog is configuration: a set of standalone
//! canonical tokens, a list of canonical namespace prefixes, and a table of
//! deprecated aliases that map onto canonical tokens.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The outcome of a successful normalisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRole {
  /// The canonical spelling.
  pub role:             String,
  /// The deprecated alias the caller used, if any.
  pub deprecated_alias: Option<String>,
}

impl NormalizedRole {
  pub fn is_deprecated(&self) -> bool { self.deprecated_alias.is_some() }
}

/// The set of role tokens this service accepts.
///
/// Matching is case-insensitive throughout, so entries may be written in any
/// case in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleCatalog {
  /// Tokens that are canonical on their own, e.g. `ADMIN`.
  pub canonical:          BTreeSet<String>,
  /// Namespace prefixes whose members are all canonical, e.g. `COF_`.
  /// A prefix only matches when something follows it.
  pub canonical_prefixes: Vec<String>,
  /// Deprecated alias → canonical token.
  pub aliases:            BTreeMap<String, String>,
}

impl Default for RoleCatalog {
  fn default() -> Self {
    Self {
      canonical:          ["ADMIN", "APPLICANT"].map(String::from).into(),
      canonical_prefixes: vec!["COF_".into(), "NSTF_".into()],
      aliases:            [
        ("ASSESSOR", "COF_ASSESSOR"),
        ("LEAD_ASSESSOR", "COF_LEAD_ASSESSOR"),
        ("COMMENTER", "COF_COMMENTER"),
      ]
      .into_iter()
      .map(|(alias, canonical)| (alias.to_owned(), canonical.to_owned()))
      .collect(),
    }
  }
}

impl RoleCatalog {
  /// A catalog with no prefixes and no aliases, where exactly `tokens` are
  /// valid.
  pub fn flat<I, T>(tokens: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    Self {
      canonical:          tokens.into_iter().map(Into::into).collect(),
      canonical_prefixes: Vec::new(),
      aliases:            BTreeMap::new(),
    }
  }

  /// Map `token` onto its canonical spelling.
  ///
  /// Deprecated aliases succeed but log a warning naming the replacement.
  pub fn normalize(&self, token: &str) -> Result<NormalizedRole> {
    let upper = token.trim().to_uppercase();

    if let Some(canonical) = self
      .aliases
      .iter()
      .find(|(alias, _)| alias.eq_ignore_ascii_case(&upper))
      .map(|(_, canonical)| canonical.to_uppercase())
    {
      tracing::warn!(
        role = %upper,
        replacement = %canonical,
        "deprecated role {upper} used; use {canonical} instead"
      );
      return Ok(NormalizedRole {
        role:             canonical,
        deprecated_alias: Some(upper),
      });
    }

    if self.is_canonical(&upper) {
      return Ok(NormalizedRole { role: upper, deprecated_alias: None });
    }

    Err(Error::InvalidRole { email: None, role: token.to_owned() })
  }

  /// Normalise every token, failing on the first invalid one.
  pub fn normalize_all<I, T>(&self, tokens: I) -> Result<BTreeSet<String>>
  where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
  {
    tokens
      .into_iter()
      .map(|t| self.normalize(t.as_ref()).map(|n| n.role))
      .collect()
  }

  fn is_canonical(&self, upper: &str) -> bool {
    if self.canonical.iter().any(|c| c.eq_ignore_ascii_case(upper)) {
      return true;
    }
    self.canonical_prefixes.iter().any(|prefix| {
      let prefix = prefix.to_uppercase();
      upper.len() > prefix.len() && upper.starts_with(&prefix)
    })
  }
}
