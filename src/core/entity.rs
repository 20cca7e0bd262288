//! Entity traits defining the core abstraction for all managed data types

use crate::core::error::{CrudError, CrudResult};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::str::FromStr;

/// Soft-delete state carried by every entity
///
/// `deleted` is persisted; `is_deletable` is an advisory flag computed at read
/// time (typically by a post-fetch hook) and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deletable {
    /// Marks the entity as logically removed
    #[serde(default)]
    pub deleted: bool,

    /// Whether the entity may currently be deleted
    #[serde(skip)]
    pub is_deletable: bool,
}

/// Base trait for all entities managed by a service.
///
/// An entity has an identifier of some key type and carries a [`Deletable`]
/// block. Everything else about its shape is up to the implementor.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Identifier type; a tuple for composite keys
    type Id: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// The entity type name (e.g., "book", "author")
    fn entity_type() -> &'static str;

    /// Get the identifier of this entity instance
    fn id(&self) -> Self::Id;

    /// Soft-delete block
    fn deletable(&self) -> &Deletable;

    /// Mutable soft-delete block
    fn deletable_mut(&mut self) -> &mut Deletable;

    /// Check if the entity has been soft-deleted
    fn is_deleted(&self) -> bool {
        self.deletable().deleted
    }

    /// Mark or unmark the entity as soft-deleted
    fn set_deleted(&mut self, deleted: bool) {
        self.deletable_mut().deleted = deleted;
    }

    /// Advisory deletability flag
    fn is_deletable(&self) -> bool {
        self.deletable().is_deletable
    }

    fn set_deletable(&mut self, deletable: bool) {
        self.deletable_mut().is_deletable = deletable;
    }
}

/// Converts identifier strings into typed ids.
///
/// An id string is a comma-separated token list; every
/// [`id_field_count`](IdCodec::id_field_count) consecutive tokens form one id.
pub trait IdCodec: Entity {
    /// Number of tokens that make up one id (1 for scalar keys)
    fn id_field_count() -> usize;

    /// Build one id from exactly `id_field_count()` tokens
    fn parts_to_id(parts: &[&str]) -> anyhow::Result<Self::Id>;
}

/// Combines a stored entity with an incoming update.
///
/// Edit and delete always operate on the merged value, so an implementation
/// decides which fields the caller may change.
pub trait Merge: Entity {
    fn merge(stored: Self, incoming: &Self) -> Self;
}

/// Parse the token at `index` into a typed id component
pub fn parse_id_part<T>(parts: &[&str], index: usize) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let part = parts
        .get(index)
        .ok_or_else(|| anyhow!("missing id component at position {}", index))?;
    part.trim()
        .parse::<T>()
        .map_err(|e| anyhow!("invalid id component '{}': {}", part, e))
}

/// Split an id string into chunks of `field_count` trimmed tokens
pub fn chunk_id_tokens(id_string: &str, field_count: usize) -> CrudResult<Vec<Vec<&str>>> {
    let bad_id = |message: String| CrudError::BadId {
        value: id_string.to_string(),
        message,
    };

    if field_count == 0 {
        return Err(bad_id("entity declares zero id fields".to_string()));
    }

    let tokens: Vec<&str> = id_string.split(',').map(str::trim).collect();
    if tokens.iter().any(|token| token.is_empty()) {
        return Err(bad_id("empty id component".to_string()));
    }
    if tokens.len() % field_count != 0 {
        return Err(bad_id(format!(
            "{} components cannot be grouped by {}",
            tokens.len(),
            field_count
        )));
    }

    Ok(tokens.chunks(field_count).map(<[&str]>::to_vec).collect())
}
