//! Persistence abstraction used by the CRUD orchestrator

use crate::core::entity::Entity;
use anyhow::Result;

/// Keyed persistence for one entity type
///
/// Implementations report failures through `anyhow`; services wrap them into
/// [`CrudError::Storage`](crate::core::CrudError::Storage).
pub trait Repository<E: Entity>: Send + Sync {
    /// Look up an entity by id, including soft-deleted rows
    fn find_by_id(&self, id: &E::Id) -> Result<Option<E>>;

    fn exists_by_id(&self, id: &E::Id) -> Result<bool> {
        Ok(self.find_by_id(id)?.is_some())
    }

    /// Insert or replace an entity, returning the stored value
    fn save(&self, entity: E) -> Result<E>;

    /// Physically remove an entity
    fn delete(&self, entity: &E) -> Result<()>;

    /// Fetch several entities in the order of `ids`, skipping misses
    fn find_all_by_id(&self, ids: &[E::Id]) -> Result<Vec<E>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entity) = self.find_by_id(id)? {
                found.push(entity);
            }
        }
        Ok(found)
    }
}
