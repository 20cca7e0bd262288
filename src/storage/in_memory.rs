//! In-memory repository for testing and development

use crate::core::entity::Entity;
use crate::core::store::Repository;
use crate::core::stream::{QueryPlan, StreamSource};
use anyhow::{Result, anyhow};
use indexmap::IndexMap;
use std::sync::{Arc, RwLock};

/// In-memory repository implementation
///
/// Keeps rows in insertion order; saving an existing id replaces the row in
/// place. Uses RwLock for thread-safe access. Serves both id lookups and
/// query plans.
pub struct InMemoryRepository<E: Entity> {
    rows: Arc<RwLock<IndexMap<E::Id, E>>>,
}

impl<E: Entity> Clone for InMemoryRepository<E> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<E: Entity> Default for InMemoryRepository<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> InMemoryRepository<E> {
    /// Create a new empty repository
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(IndexMap::new())),
        }
    }

    /// Create a repository holding `rows`
    pub fn with_rows(rows: impl IntoIterator<Item = E>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(
                rows.into_iter().map(|row| (row.id(), row)).collect(),
            )),
        }
    }

    /// Number of stored rows, soft-deleted ones included
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Rows matching a predicate, soft-deleted ones included
    pub fn find_where<F>(&self, predicate: F) -> Result<Vec<E>>
    where
        F: Fn(&E) -> bool,
    {
        Ok(self
            .read()?
            .values()
            .filter(|row| predicate(*row))
            .cloned()
            .collect())
    }

    /// Remove rows matching a predicate, returning how many were removed
    pub fn remove_where<F>(&self, predicate: F) -> Result<usize>
    where
        F: Fn(&E) -> bool,
    {
        let mut rows = self.write()?;
        let before = rows.len();
        rows.retain(|_, row| !predicate(&*row));
        Ok(before - rows.len())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, IndexMap<E::Id, E>>> {
        self.rows
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, IndexMap<E::Id, E>>> {
        self.rows
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))
    }
}

impl<E: Entity> Repository<E> for InMemoryRepository<E> {
    fn find_by_id(&self, id: &E::Id) -> Result<Option<E>> {
        Ok(self.read()?.get(id).cloned())
    }

    fn exists_by_id(&self, id: &E::Id) -> Result<bool> {
        Ok(self.read()?.contains_key(id))
    }

    fn save(&self, entity: E) -> Result<E> {
        self.write()?.insert(entity.id(), entity.clone());
        Ok(entity)
    }

    fn delete(&self, entity: &E) -> Result<()> {
        self.write()?
            .shift_remove(&entity.id())
            .map(|_| ())
            .ok_or_else(|| anyhow!("{} {:?} is not stored", E::entity_type(), entity.id()))
    }

    fn find_all_by_id(&self, ids: &[E::Id]) -> Result<Vec<E>> {
        let rows = self.read()?;
        Ok(ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
    }
}

impl<E: Entity> StreamSource<E> for InMemoryRepository<E> {
    fn fetch(&self, plan: &QueryPlan<E>) -> Result<Vec<E>> {
        let rows = self.read()?;
        Ok(plan.evaluate(rows.values().cloned()))
    }
}
