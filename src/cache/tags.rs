//! Cache tags: identify a single entity or a whole collection.

use sha2::{Digest, Sha256};
use std::fmt;

use super::traits::QueryKey;

/// Identity part of a tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagId {
  /// A single entity by its key
  Id(String),
  /// The collection of all entities of the type
  List,
}

/// Entity type plus identity, e.g. `book:LIST` or `book:42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
  pub entity_type: &'static str,
  pub id: TagId,
}

impl Tag {
  pub fn id(entity_type: &'static str, id: impl Into<String>) -> Self {
    Self {
      entity_type,
      id: TagId::Id(id.into()),
    }
  }

  pub fn list(entity_type: &'static str) -> Self {
    Self {
      entity_type,
      id: TagId::List,
    }
  }

  pub fn is_list(&self) -> bool {
    self.id == TagId::List
  }

  /// Whether a subscriber holding `self` is affected by a change to `other`.
  ///
  /// A list tag covers every entity of its type; an id tag covers itself and
  /// the list of its type.
  pub fn covers(&self, other: &Tag) -> bool {
    if self.entity_type != other.entity_type {
      return false;
    }
    self.is_list() || other.is_list() || self.id == other.id
  }
}

impl fmt::Display for Tag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.id {
      TagId::Id(id) => write!(f, "{}:{}", self.entity_type, id),
      TagId::List => write!(f, "{}:LIST", self.entity_type),
    }
  }
}

impl QueryKey for Tag {
  fn cache_hash(&self) -> String {
    let input = match &self.id {
      TagId::Id(id) => format!("{}/id/{}", self.entity_type, id),
      TagId::List => format!("{}/list", self.entity_type),
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  fn description(&self) -> String {
    self.to_string()
  }
}
