//! Registry of filter and sort extensions, grouped by service id
//!
//! Extensions are declared once at startup through an
//! [`ExtensionRegistryBuilder`]. The built registry is immutable and shared
//! between services; each service asks for its own typed instances with
//! [`ExtensionRegistry::filters_for`] and [`ExtensionRegistry::sorts_for`].

use crate::core::entity::Entity;
use crate::core::extension::{Filter, FilterInfo, Sort, SortInfo};
use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;

type FilterFactory<E> = Arc<dyn Fn() -> Arc<dyn Filter<E>> + Send + Sync>;
type SortFactory<E> = Arc<dyn Fn() -> Arc<dyn Sort<E>> + Send + Sync>;

/// A registered extension with its type-erased factory
#[derive(Clone)]
struct Descriptor<I> {
    info: I,
    entity: &'static str,
    factory: Arc<dyn Any + Send + Sync>,
}

/// Collects extension declarations
///
/// Registering the same key twice for a service replaces the earlier entry.
#[derive(Default)]
pub struct ExtensionRegistryBuilder {
    filters: Vec<Descriptor<FilterInfo>>,
    sorts: Vec<Descriptor<SortInfo>>,
}

impl ExtensionRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a filter for entity `E`
    ///
    /// `build` is called whenever a service asks for its filters, so it may
    /// capture collaborators (another service, a repository) to inject.
    pub fn filter<E, F, B>(mut self, info: FilterInfo, build: B) -> Self
    where
        E: Entity,
        F: Filter<E> + 'static,
        B: Fn() -> F + Send + Sync + 'static,
    {
        let factory: FilterFactory<E> = Arc::new(move || Arc::new(build()) as Arc<dyn Filter<E>>);
        self.filters.push(Descriptor {
            info,
            entity: type_name::<E>(),
            factory: Arc::new(factory),
        });
        self
    }

    /// Declare a sort for entity `E`
    pub fn sort<E, S, B>(mut self, info: SortInfo, build: B) -> Self
    where
        E: Entity,
        S: Sort<E> + 'static,
        B: Fn() -> S + Send + Sync + 'static,
    {
        let factory: SortFactory<E> = Arc::new(move || Arc::new(build()) as Arc<dyn Sort<E>>);
        self.sorts.push(Descriptor {
            info,
            entity: type_name::<E>(),
            factory: Arc::new(factory),
        });
        self
    }

    pub fn build(self) -> ExtensionRegistry {
        let mut filters: HashMap<String, HashMap<String, Descriptor<FilterInfo>>> = HashMap::new();
        for descriptor in self.filters {
            let key = descriptor.info.key();
            let service = descriptor.info.service_id.clone();
            if let Some(previous) = filters
                .entry(service.clone())
                .or_default()
                .insert(key.clone(), descriptor)
            {
                tracing::warn!(service = %service, %key, replaced = previous.entity, "filter registered twice, keeping the last one");
            }
        }

        let mut sorts: HashMap<String, HashMap<String, Descriptor<SortInfo>>> = HashMap::new();
        for descriptor in self.sorts {
            let key = descriptor.info.key();
            let service = descriptor.info.service_id.clone();
            if let Some(previous) = sorts
                .entry(service.clone())
                .or_default()
                .insert(key.clone(), descriptor)
            {
                tracing::warn!(service = %service, %key, replaced = previous.entity, "sort registered twice, keeping the last one");
            }
        }

        tracing::info!(
            services = filters.len().max(sorts.len()),
            filters = filters.values().map(HashMap::len).sum::<usize>(),
            sorts = sorts.values().map(HashMap::len).sum::<usize>(),
            "extension registry built"
        );

        ExtensionRegistry { filters, sorts }
    }
}

/// Immutable filter/sort registry
#[derive(Default)]
pub struct ExtensionRegistry {
    filters: HashMap<String, HashMap<String, Descriptor<FilterInfo>>>,
    sorts: HashMap<String, HashMap<String, Descriptor<SortInfo>>>,
}

impl ExtensionRegistry {
    pub fn builder() -> ExtensionRegistryBuilder {
        ExtensionRegistryBuilder::new()
    }

    /// Registry without any extension
    pub fn empty() -> Self {
        Self::default()
    }

    /// Instantiate the filters registered for a service, keyed by filter key
    ///
    /// An entry declared for another entity type is logged and skipped; the
    /// remaining filters are still returned.
    pub fn filters_for<E: Entity>(&self, service_id: &str) -> HashMap<String, Arc<dyn Filter<E>>> {
        let Some(group) = self.filters.get(service_id) else {
            return HashMap::new();
        };
        group
            .iter()
            .filter_map(|(key, descriptor)| {
                match descriptor.factory.downcast_ref::<FilterFactory<E>>() {
                    Some(factory) => Some((key.clone(), factory())),
                    None => {
                        tracing::error!(
                            service = service_id,
                            %key,
                            declared_for = descriptor.entity,
                            requested_for = type_name::<E>(),
                            "filter entity type mismatch, skipping"
                        );
                        None
                    }
                }
            })
            .collect()
    }

    /// Instantiate the sorts registered for a service, keyed by sort key
    pub fn sorts_for<E: Entity>(&self, service_id: &str) -> HashMap<String, Arc<dyn Sort<E>>> {
        let Some(group) = self.sorts.get(service_id) else {
            return HashMap::new();
        };
        group
            .iter()
            .filter_map(|(key, descriptor)| {
                match descriptor.factory.downcast_ref::<SortFactory<E>>() {
                    Some(factory) => Some((key.clone(), factory())),
                    None => {
                        tracing::error!(
                            service = service_id,
                            %key,
                            declared_for = descriptor.entity,
                            requested_for = type_name::<E>(),
                            "sort entity type mismatch, skipping"
                        );
                        None
                    }
                }
            })
            .collect()
    }

    /// Every service id with at least one extension
    pub fn service_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .filters
            .keys()
            .chain(self.sorts.keys())
            .map(String::as_str)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
