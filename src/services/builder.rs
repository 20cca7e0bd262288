//! Builder wiring storage, extensions, configuration and hooks into a service

use crate::config::{ServiceConfig, ServicesConfig};
use crate::core::entity::{Entity, IdCodec, Merge};
use crate::core::error::{ConfigError, CrudResult};
use crate::core::hooks::{HookDeclarations, HookKind, HookTable};
use crate::core::store::Repository;
use crate::core::stream::StreamSource;
use crate::services::composer::QueryComposer;
use crate::services::crud::CrudService;
use crate::services::read_only::ReadOnlyService;
use crate::services::registry::ExtensionRegistry;
use std::sync::Arc;

/// Builder for [`ReadOnlyService`] and [`CrudService`]
///
/// # Example
///
/// ```rust,ignore
/// let books = ServiceBuilder::<Book>::new("book")
///     .repository(book_store.clone())
///     .extensions(registry.clone())
///     .config(&services_config)
///     .hooks(|h| {
///         h.pre_add(1, HookHandler::transform(take_authors));
///         h.post_add(1, HookHandler::apply(link_authors));
///     })
///     .build()?;
/// ```
pub struct ServiceBuilder<E: Entity> {
    id: String,
    repository: Option<Arc<dyn Repository<E>>>,
    source: Option<Arc<dyn StreamSource<E>>>,
    registry: Option<Arc<ExtensionRegistry>>,
    config: Option<ServiceConfig>,
    hooks: HookDeclarations<E>,
}

impl<E: Entity> ServiceBuilder<E> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            repository: None,
            source: None,
            registry: None,
            config: None,
            hooks: HookDeclarations::new(),
        }
    }

    /// Storage that serves both id lookups and queries
    pub fn repository<R>(mut self, store: Arc<R>) -> Self
    where
        R: Repository<E> + StreamSource<E> + 'static,
    {
        let repository: Arc<dyn Repository<E>> = store.clone();
        let source: Arc<dyn StreamSource<E>> = store;
        self.repository = Some(repository);
        self.source = Some(source);
        self
    }

    /// Use a separate query backend
    pub fn stream_source(mut self, source: Arc<dyn StreamSource<E>>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn extensions(mut self, registry: Arc<ExtensionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Take this service's entry from a loaded configuration
    pub fn config(mut self, config: &ServicesConfig) -> Self {
        self.config = Some(config.service(&self.id));
        self
    }

    pub fn service_config(mut self, config: ServiceConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Declare hooks; may be called several times
    pub fn hooks<F>(mut self, declare: F) -> Self
    where
        F: FnOnce(&mut HookDeclarations<E>),
    {
        let mut declarations = HookDeclarations::new();
        declare(&mut declarations);
        self.hooks.append(declarations);
        self
    }

    /// Build a query-only service; mutation hooks are ignored
    pub fn build_read_only(self) -> CrudResult<ReadOnlyService<E>>
    where
        E: IdCodec,
    {
        self.assemble(&HookKind::FETCH).map(|(reader, _)| reader)
    }

    /// Build a full CRUD service
    pub fn build(self) -> CrudResult<CrudService<E>>
    where
        E: IdCodec + Merge,
    {
        let (reader, config) = self.assemble(&HookKind::ALL)?;
        Ok(CrudService { reader, config })
    }

    fn assemble(self, kinds: &[HookKind]) -> CrudResult<(ReadOnlyService<E>, ServiceConfig)>
    where
        E: IdCodec,
    {
        let missing = |field: &str| ConfigError::MissingField {
            field: field.to_string(),
            context: format!("service '{}'", self.id),
        };
        let repository = self.repository.clone().ok_or_else(|| missing("repository"))?;
        let source = self.source.clone().ok_or_else(|| missing("stream source"))?;

        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(ExtensionRegistry::empty()));
        let known = registry.service_ids();
        if !known.is_empty() && !known.contains(&self.id.as_str()) {
            tracing::warn!(service = %self.id, registered = ?known, "no extensions registered for service");
        }
        let composer = QueryComposer::new(
            self.id.clone(),
            registry.filters_for::<E>(&self.id),
            registry.sorts_for::<E>(&self.id),
        );
        let hooks = HookTable::load(self.id.clone(), self.hooks, kinds)?;
        let config = self
            .config
            .unwrap_or_else(|| ServiceConfig::enabled(self.id.clone()));

        tracing::info!(
            service = %self.id,
            entity = E::entity_type(),
            filters = composer.filter_keys().len(),
            sorts = composer.sort_keys().len(),
            hooks = hooks.total(),
            "service ready"
        );

        Ok((
            ReadOnlyService {
                id: self.id,
                repository,
                source,
                composer,
                hooks,
            },
            config,
        ))
    }
}
