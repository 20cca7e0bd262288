//! Turns a list request into an [`EntityStream`]
//!
//! Composition runs in a fixed order:
//!
//! 1. pre-fetch hooks rewrite the incoming filter lists;
//! 2. the lists are validated and mandatory filters checked;
//! 3. filters are applied in request order;
//! 4. the sort key, if any, is applied;
//! 5. the pagination window, if any, is applied;
//! 6. soft-deleted rows are excluded.

use crate::core::entity::Entity;
use crate::core::error::{CrudError, CrudResult};
use crate::core::extension::{Filter, Sort};
use crate::core::hooks::{HookTable, PassedValues};
use crate::core::query::{FilterContainer, FilterRequest, Pagination};
use crate::core::stream::EntityStream;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Check a filter request against the known keys
///
/// Valid when the three lists have the same length and every
/// `lowercase(name + operation)` key is registered or mandatory. An empty
/// request is valid.
pub fn validate_filters<V>(
    request: &FilterRequest,
    registered: &HashMap<String, V>,
    mandatory: &HashSet<String>,
) -> bool {
    request.is_consistent()
        && request
            .keys()
            .all(|key| registered.contains_key(&key) || mandatory.contains(&key))
}

/// Filters, sorts and mandatory keys of one service
pub struct QueryComposer<E: Entity> {
    service: String,
    filters: HashMap<String, Arc<dyn Filter<E>>>,
    sorts: HashMap<String, Arc<dyn Sort<E>>>,
    mandatory: HashSet<String>,
}

impl<E: Entity> QueryComposer<E> {
    pub fn new(
        service: impl Into<String>,
        filters: HashMap<String, Arc<dyn Filter<E>>>,
        sorts: HashMap<String, Arc<dyn Sort<E>>>,
    ) -> Self {
        let mandatory = filters
            .iter()
            .filter(|(_, filter)| filter.is_mandatory())
            .map(|(key, _)| key.clone())
            .collect();
        Self {
            service: service.into(),
            filters,
            sorts,
            mandatory,
        }
    }

    pub fn filter_keys(&self) -> BTreeSet<&str> {
        self.filters.keys().map(String::as_str).collect()
    }

    pub fn sort_keys(&self) -> BTreeSet<&str> {
        self.sorts.keys().map(String::as_str).collect()
    }

    pub fn mandatory_keys(&self) -> BTreeSet<&str> {
        self.mandatory.iter().map(String::as_str).collect()
    }

    pub fn validate_filters(&self, request: &FilterRequest) -> bool {
        validate_filters(request, &self.filters, &self.mandatory)
    }

    /// Reject requests that fail validation, naming the offending keys
    pub fn ensure_valid(&self, request: &FilterRequest) -> CrudResult<()> {
        if self.validate_filters(request) {
            return Ok(());
        }
        let message = if !request.is_consistent() {
            format!(
                "{} filters, {} operations and {} values do not line up",
                request.names.len(),
                request.operations.len(),
                request.values.len()
            )
        } else {
            let unknown: Vec<String> = request
                .keys()
                .filter(|key| !self.filters.contains_key(key) && !self.mandatory.contains(key))
                .collect();
            format!("unknown filter {}", unknown.join(", "))
        };
        tracing::debug!(service = %self.service, %message, "filter validation failed");
        Err(CrudError::bad_filter(message))
    }

    /// Every mandatory filter key must appear in the request
    pub fn ensure_mandatory(&self, request: &FilterRequest) -> CrudResult<()> {
        if self.mandatory.is_empty() {
            return Ok(());
        }
        let present: HashSet<String> = request.keys().collect();
        let mut missing: Vec<&str> = self
            .mandatory
            .iter()
            .filter(|key| !present.contains(*key))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort_unstable();
        Err(CrudError::bad_filter(format!(
            "missing mandatory filter {}",
            missing.join(", ")
        )))
    }

    /// Apply every filter triple in request order
    pub fn apply_filters(
        &self,
        mut stream: EntityStream<E>,
        request: &FilterRequest,
    ) -> CrudResult<EntityStream<E>> {
        for ((name, operation, value), key) in request.triples().zip(request.keys()) {
            let Some(filter) = self.filters.get(&key) else {
                continue;
            };
            stream = filter.apply(stream, value).map_err(|e| {
                CrudError::bad_filter(format!(
                    "{} {} '{}': {:#}",
                    name, operation, value, e
                ))
            })?;
        }
        Ok(stream)
    }

    /// Apply a sort key; lookup is case-insensitive and an empty key is ignored
    pub fn apply_sort(
        &self,
        stream: EntityStream<E>,
        sort: Option<&str>,
    ) -> CrudResult<EntityStream<E>> {
        let Some(raw) = sort.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(stream);
        };
        let key = raw.to_lowercase();
        match self.sorts.get(&key) {
            Some(sort) => Ok(sort.apply(stream)),
            None => Err(CrudError::BadSort {
                key: raw.to_string(),
            }),
        }
    }

    pub fn apply_pagination(
        stream: EntityStream<E>,
        pagination: Option<Pagination>,
    ) -> EntityStream<E> {
        match pagination {
            Some(Pagination { start, count }) => stream.skip(start).limit(count),
            None => stream,
        }
    }

    /// Run the whole pipeline
    ///
    /// `passed` is the query's value map; the caller hands it on to the
    /// post-fetch chain.
    pub fn compose(
        &self,
        stream: EntityStream<E>,
        hooks: &HookTable<E>,
        passed: &mut PassedValues,
        filters: &FilterRequest,
        sort: Option<&str>,
        start: Option<u64>,
        count: Option<u64>,
    ) -> CrudResult<EntityStream<E>> {
        let filters = hooks
            .run_pre_fetch(FilterContainer::from_request(filters.clone()), passed)?
            .into_request();

        self.ensure_valid(&filters)?;
        self.ensure_mandatory(&filters)?;

        let stream = self.apply_filters(stream, &filters)?;
        let stream = self.apply_sort(stream, sort)?;
        let pagination = Pagination::from_parts(start, count)?;
        let stream = Self::apply_pagination(stream, pagination).exclude_deleted();

        tracing::debug!(
            service = %self.service,
            plan = %stream.plan().describe(),
            "query composed"
        );
        Ok(stream)
    }
}
