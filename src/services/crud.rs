//! Mutation-side service: create, edit, delete and soft delete with hooks

use crate::config::ServiceConfig;
use crate::core::entity::{IdCodec, Merge};
use crate::core::error::{CrudError, CrudResult};
use crate::core::hooks::{HookKind, PassedValues};
use crate::services::read_only::ReadOnlyService;
use std::ops::Deref;

/// Full CRUD access to one entity type
///
/// Every mutation gets a fresh [`PassedValues`] map shared by its pre and
/// post chains, so handlers at the same order can hand data across the
/// persistence call. Read operations are reachable through `Deref` to
/// [`ReadOnlyService`].
pub struct CrudService<E: IdCodec + Merge> {
    pub(crate) reader: ReadOnlyService<E>,
    pub(crate) config: ServiceConfig,
}

impl<E: IdCodec + Merge> Deref for CrudService<E> {
    type Target = ReadOnlyService<E>;

    fn deref(&self) -> &Self::Target {
        &self.reader
    }
}

impl<E: IdCodec + Merge> CrudService<E> {
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Persist a new entity
    ///
    /// Fails with [`CrudError::AlreadyExists`] before any hook runs when the
    /// id is taken, and before saving when a pre-add hook changed the id to
    /// a taken one.
    pub fn create(&self, entity: E) -> CrudResult<E> {
        self.ensure_enabled(!self.config.disable_add, "add")?;

        let id = entity.id();
        self.ensure_absent(&id)?;

        let mut passed = PassedValues::new();
        let entity = self.run(HookKind::PreAdd, entity, &mut passed)?;
        // a pre-add hook may have rewritten the id
        if entity.id() != id {
            self.ensure_absent(&entity.id())?;
        }
        let saved = self.save(entity)?;
        let saved = self.run(HookKind::PostAdd, saved, &mut passed)?;

        tracing::info!(service = %self.reader.id, id = ?saved.id(), "created");
        Ok(saved)
    }

    /// Merge an update into the stored entity and persist it
    ///
    /// Pre-edit hooks see the merged value.
    pub fn edit(&self, entity: E) -> CrudResult<E> {
        self.ensure_enabled(!self.config.disable_edit, "edit")?;
        let saved = self.update(entity, false)?;
        tracing::info!(service = %self.reader.id, id = ?saved.id(), "edited");
        Ok(saved)
    }

    /// Mark an entity deleted through the edit path
    ///
    /// Edit hooks run; the row stays in storage but disappears from queries.
    pub fn soft_delete(&self, entity: E) -> CrudResult<E> {
        self.ensure_enabled(!self.config.disable_soft_delete, "soft delete")?;
        let saved = self.update(entity, true)?;
        tracing::info!(service = %self.reader.id, id = ?saved.id(), "soft deleted");
        Ok(saved)
    }

    /// Physically remove an entity
    pub fn delete(&self, entity: E) -> CrudResult<()> {
        self.ensure_enabled(!self.config.disable_delete, "delete")?;

        let stored = self.stored(&entity.id())?;
        let merged = E::merge(stored, &entity);

        let mut passed = PassedValues::new();
        let merged = self.run(HookKind::PreDelete, merged, &mut passed)?;
        self.reader
            .repository
            .delete(&merged)
            .map_err(|e| CrudError::storage("delete", e))?;
        let deleted = self.run(HookKind::PostDelete, merged, &mut passed)?;

        tracing::info!(service = %self.reader.id, id = ?deleted.id(), "deleted");
        Ok(())
    }

    /// Delete the entity named by an id string
    pub fn delete_by_id_string(&self, id_string: &str) -> CrudResult<()> {
        self.ensure_enabled(!self.config.disable_delete, "delete")?;
        let ids = self.reader.convert_ids(id_string)?;
        let [id] = ids.as_slice() else {
            return Err(CrudError::BadId {
                value: id_string.to_string(),
                message: format!("expected one id, got {}", ids.len()),
            });
        };
        let entity = self.reader.get_by_id(id)?;
        self.delete(entity)
    }

    fn update(&self, incoming: E, mark_deleted: bool) -> CrudResult<E> {
        let stored = self.stored(&incoming.id())?;
        let mut merged = E::merge(stored, &incoming);
        if mark_deleted {
            merged.set_deleted(true);
        }

        let mut passed = PassedValues::new();
        let merged = self.run(HookKind::PreEdit, merged, &mut passed)?;
        let saved = self.save(merged)?;
        self.run(HookKind::PostEdit, saved, &mut passed)
    }

    fn ensure_absent(&self, id: &E::Id) -> CrudResult<()> {
        let exists = self
            .reader
            .repository
            .exists_by_id(id)
            .map_err(|e| CrudError::storage("exists_by_id", e))?;
        if exists {
            return Err(CrudError::AlreadyExists {
                entity_type: E::entity_type().to_string(),
                id: format!("{:?}", id),
            });
        }
        Ok(())
    }

    fn stored(&self, id: &E::Id) -> CrudResult<E> {
        self.reader
            .repository
            .find_by_id(id)
            .map_err(|e| CrudError::storage("find_by_id", e))?
            .ok_or_else(|| CrudError::NotFound {
                entity_type: E::entity_type().to_string(),
                id: format!("{:?}", id),
            })
    }

    fn save(&self, entity: E) -> CrudResult<E> {
        self.reader
            .repository
            .save(entity)
            .map_err(|e| CrudError::storage("save", e))
    }

    fn run(&self, kind: HookKind, entity: E, passed: &mut PassedValues) -> CrudResult<E> {
        self.reader.hooks.run(kind, entity, passed)
    }

    fn ensure_enabled(&self, enabled: bool, operation: &'static str) -> CrudResult<()> {
        if enabled {
            return Ok(());
        }
        tracing::debug!(service = %self.reader.id, operation, "operation disabled");
        Err(CrudError::OperationDisabled {
            service: self.reader.id.clone(),
            operation,
        })
    }
}
