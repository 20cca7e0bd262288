//! Query-side service: list, count and id lookups

use crate::core::entity::{IdCodec, chunk_id_tokens};
use crate::core::error::{CrudError, CrudResult};
use crate::core::hooks::{HookTable, PassedValues};
use crate::core::query::{FetchRequest, FetchedRows, FilterRequest};
use crate::core::store::Repository;
use crate::core::stream::{EntityStream, StreamSource};
use crate::services::composer::QueryComposer;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Read access to one entity type
///
/// Loads only fetch hooks. Build one with
/// [`ServiceBuilder::build_read_only`](crate::services::ServiceBuilder::build_read_only).
pub struct ReadOnlyService<E: IdCodec> {
    pub(crate) id: String,
    pub(crate) repository: Arc<dyn Repository<E>>,
    pub(crate) source: Arc<dyn StreamSource<E>>,
    pub(crate) composer: QueryComposer<E>,
    pub(crate) hooks: HookTable<E>,
}

impl<E: IdCodec> ReadOnlyService<E> {
    /// Service id, as used in the extension registry and configuration
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn hooks(&self) -> &HookTable<E> {
        &self.hooks
    }

    pub fn filter_keys(&self) -> BTreeSet<&str> {
        self.composer.filter_keys()
    }

    pub fn sort_keys(&self) -> BTreeSet<&str> {
        self.composer.sort_keys()
    }

    /// Whether a filter request would pass validation
    pub fn validate_filters(&self, request: &FilterRequest) -> bool {
        self.composer.validate_filters(request)
    }

    /// Compose the query for a request without running it
    ///
    /// Pre-fetch hooks run with a fresh value map; use
    /// [`fetch_all`](Self::fetch_all) to have it reach post-fetch hooks.
    pub fn query(&self, request: &FetchRequest) -> CrudResult<EntityStream<E>> {
        self.compose(request, &mut PassedValues::new())
    }

    fn compose(
        &self,
        request: &FetchRequest,
        passed: &mut PassedValues,
    ) -> CrudResult<EntityStream<E>> {
        self.composer.compose(
            EntityStream::new(Arc::clone(&self.source)),
            &self.hooks,
            passed,
            &request.filters,
            request.sort.as_deref(),
            request.start,
            request.count,
        )
    }

    /// List live entities matching the request
    ///
    /// Pre-fetch and post-fetch hooks share one value map, so handlers at
    /// the same order pair up. Post-fetch hooks see the rows with
    /// `full_scan` set.
    pub fn fetch_all(&self, request: &FetchRequest) -> CrudResult<Vec<E>> {
        let mut passed = PassedValues::new();
        let rows = self
            .compose(request, &mut passed)?
            .to_list()
            .map_err(|e| CrudError::storage("fetch_all", e))?;
        tracing::debug!(service = %self.id, rows = rows.len(), "fetched");

        let fetched = self.hooks.run_post_fetch(
            FetchedRows {
                rows,
                full_scan: true,
            },
            &mut passed,
        )?;
        Ok(fetched.rows)
    }

    /// Count live entities matching the filters
    ///
    /// Runs pre-fetch hooks and filter validation like [`fetch_all`](Self::fetch_all).
    pub fn count(&self, filters: &FilterRequest) -> CrudResult<u64> {
        let stream = self.composer.compose(
            EntityStream::new(Arc::clone(&self.source)),
            &self.hooks,
            &mut PassedValues::new(),
            filters,
            None,
            None,
            None,
        )?;
        stream.count().map_err(|e| CrudError::storage("count", e))
    }

    /// Parse a comma-separated id string into typed ids
    pub fn convert_ids(&self, id_string: &str) -> CrudResult<Vec<E::Id>> {
        chunk_id_tokens(id_string, E::id_field_count())?
            .into_iter()
            .map(|parts| {
                E::parts_to_id(&parts).map_err(|e| CrudError::BadId {
                    value: id_string.to_string(),
                    message: format!("{:#}", e),
                })
            })
            .collect()
    }

    /// Look up live entities by id string, in the order given
    ///
    /// Missing and soft-deleted ids are skipped. Pre-fetch hooks do not run;
    /// post-fetch hooks see the rows with `full_scan` unset.
    pub fn fetch_by_ids(&self, id_string: &str) -> CrudResult<Vec<E>> {
        let ids = self.convert_ids(id_string)?;
        let rows: Vec<E> = self
            .repository
            .find_all_by_id(&ids)
            .map_err(|e| CrudError::storage("find_all_by_id", e))?
            .into_iter()
            .filter(|row| !row.is_deleted())
            .collect();
        tracing::debug!(service = %self.id, requested = ids.len(), found = rows.len(), "fetched by id");

        let fetched = self.hooks.run_post_fetch(
            FetchedRows {
                rows,
                full_scan: false,
            },
            &mut PassedValues::new(),
        )?;
        Ok(fetched.rows)
    }

    /// Look up one entity by id
    ///
    /// Soft-deleted entities are returned; no hooks run.
    pub fn get_by_id(&self, id: &E::Id) -> CrudResult<E> {
        self.repository
            .find_by_id(id)
            .map_err(|e| CrudError::storage("find_by_id", e))?
            .ok_or_else(|| CrudError::NotFound {
                entity_type: E::entity_type().to_string(),
                id: format!("{:?}", id),
            })
    }
}
