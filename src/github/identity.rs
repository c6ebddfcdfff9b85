// src/github/identity.rs
// =============================================================================
// This module turns a repository URL into an owner/name pair.
//
// The URL is split on '/' and read positionally:
//
//   https://github.com/acme/cool#readme
//   [0]    [1][2]      [3]  [4]
//
// Segment 3 is the owner, segment 4 the repository name. A "#readme"
// fragment (common in awesome-style lists) is cut off the name. Nothing
// else is validated: a bad owner or name shows up later as a failed fetch.
// =============================================================================

use crate::error::IdentityError;
use serde::{Deserialize, Serialize};
use std::fmt;

const OWNER_SEGMENT: usize = 3;
const NAME_SEGMENT: usize = 4;

/// A repository on the hosting service, e.g. `acme/cool`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoIdentity {
    pub owner: String,
    pub name: String,
}

impl RepoIdentity {
    /// Parses a repository URL.
    ///
    /// Example:
    ///   "https://github.com/acme/cool#readme" -> acme/cool
    pub fn resolve(url: &str) -> Result<Self, IdentityError> {
        let segments: Vec<&str> = url.split('/').collect();

        if segments.len() <= NAME_SEGMENT {
            return Err(IdentityError::LinkTooShort(url.to_string()));
        }

        let owner = segments[OWNER_SEGMENT];
        let mut name = segments[NAME_SEGMENT];

        if name.contains("#readme") {
            name = name.split('#').next().unwrap_or_default();
        }

        if owner.is_empty() || name.is_empty() {
            return Err(IdentityError::InvalidIdentity(url.to_string()));
        }

        Ok(RepoIdentity {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// The canonical store key: `owner/name`, lowercased.
    ///
    /// GitHub treats owner and repository names case-insensitively, so
    /// `Acme/Cool` and `acme/cool` must land on the same record.
    pub fn key(&self) -> String {
        format!("{}/{}", self.owner, self.name).to_ascii_lowercase()
    }
}

impl fmt::Display for RepoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
