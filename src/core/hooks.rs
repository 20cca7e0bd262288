//! Ordered lifecycle hooks
//!
//! Every service owns a [`HookTable`]: one [`HookChain`] per [`HookKind`],
//! each an ordered map from an integer order to a [`HookHandler`]. Running a
//! chain threads a *primary value* through its handlers in ascending order.
//!
//! Handlers of different kinds can exchange data through an auxiliary map
//! keyed by order, created fresh for each top-level operation:
//!
//! - a [`HookHandler::Transform`] stores its result at its own order;
//! - a [`HookHandler::Apply`] or [`HookHandler::ObserveWith`] at the same
//!   order in a later chain of the same operation reads it back.
//!
//! So a pre-add handler at order 1 can hand a value to the post-add handler at
//! order 1 without touching the handler at order 2.
//!
//! # Example
//!
//! ```rust,ignore
//! hooks.pre_add(1, HookHandler::transform(|book: &mut Book| {
//!     Ok(HookValue::new(std::mem::take(&mut book.authors)))
//! }));
//! hooks.post_add(1, HookHandler::apply(|book: Book, authors| {
//!     // authors is Some(HookValue) holding the Vec taken above
//!     Ok(book)
//! }));
//! ```

use crate::core::error::{CrudError, CrudResult, HookError, HookResult};
use crate::core::query::{FetchedRows, FilterContainer};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Lifecycle point a handler is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    PreAdd,
    PostAdd,
    PreEdit,
    PostEdit,
    PreDelete,
    PostDelete,
    PreFetch,
    PostFetch,
}

impl HookKind {
    /// Kinds whose primary value is the entity itself
    pub const ENTITY: [HookKind; 6] = [
        HookKind::PreAdd,
        HookKind::PostAdd,
        HookKind::PreEdit,
        HookKind::PostEdit,
        HookKind::PreDelete,
        HookKind::PostDelete,
    ];

    /// Kinds a read-only service loads
    pub const FETCH: [HookKind; 2] = [HookKind::PreFetch, HookKind::PostFetch];

    pub const ALL: [HookKind; 8] = [
        HookKind::PreAdd,
        HookKind::PostAdd,
        HookKind::PreEdit,
        HookKind::PostEdit,
        HookKind::PreDelete,
        HookKind::PostDelete,
        HookKind::PreFetch,
        HookKind::PostFetch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::PreAdd => "pre_add",
            HookKind::PostAdd => "post_add",
            HookKind::PreEdit => "pre_edit",
            HookKind::PostEdit => "post_edit",
            HookKind::PreDelete => "pre_delete",
            HookKind::PostDelete => "post_delete",
            HookKind::PreFetch => "pre_fetch",
            HookKind::PostFetch => "post_fetch",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Values and handlers
// =============================================================================

/// Type-erased value passed between paired handlers
pub struct HookValue(Box<dyn Any + Send + Sync>);

impl HookValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Take the value out, or get `self` back if the type does not match
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        self.0.downcast::<T>().map(|b| *b).map_err(HookValue)
    }
}

impl fmt::Debug for HookValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HookValue(..)")
    }
}

/// Values exchanged by order within one operation
pub type PassedValues = HashMap<i32, HookValue>;

type TransformFn<T> = dyn Fn(&mut T) -> HookResult<HookValue> + Send + Sync;
type ApplyFn<T> = dyn Fn(T, Option<HookValue>) -> HookResult<T> + Send + Sync;
type ObserveFn<T> = dyn Fn(&T) -> HookResult<()> + Send + Sync;
type ObserveWithFn<T> = dyn Fn(&T, Option<&HookValue>) -> HookResult<()> + Send + Sync;

/// A hook handler, tagged by what it does with the primary value
pub enum HookHandler<T> {
    /// May mutate the primary value; its result is stored at its order
    Transform(Arc<TransformFn<T>>),
    /// Receives the value stored at its order and returns the new primary value
    Apply(Arc<ApplyFn<T>>),
    /// Inspects the primary value
    Observe(Arc<ObserveFn<T>>),
    /// Inspects the primary value and the value stored at its order
    ObserveWith(Arc<ObserveWithFn<T>>),
}

impl<T> HookHandler<T> {
    pub fn transform<F>(f: F) -> Self
    where
        F: Fn(&mut T) -> HookResult<HookValue> + Send + Sync + 'static,
    {
        HookHandler::Transform(Arc::new(f))
    }

    pub fn apply<F>(f: F) -> Self
    where
        F: Fn(T, Option<HookValue>) -> HookResult<T> + Send + Sync + 'static,
    {
        HookHandler::Apply(Arc::new(f))
    }

    pub fn observe<F>(f: F) -> Self
    where
        F: Fn(&T) -> HookResult<()> + Send + Sync + 'static,
    {
        HookHandler::Observe(Arc::new(f))
    }

    pub fn observe_with<F>(f: F) -> Self
    where
        F: Fn(&T, Option<&HookValue>) -> HookResult<()> + Send + Sync + 'static,
    {
        HookHandler::ObserveWith(Arc::new(f))
    }

    fn variant(&self) -> &'static str {
        match self {
            HookHandler::Transform(_) => "transform",
            HookHandler::Apply(_) => "apply",
            HookHandler::Observe(_) => "observe",
            HookHandler::ObserveWith(_) => "observe_with",
        }
    }
}

impl<T> Clone for HookHandler<T> {
    fn clone(&self) -> Self {
        match self {
            HookHandler::Transform(f) => HookHandler::Transform(Arc::clone(f)),
            HookHandler::Apply(f) => HookHandler::Apply(Arc::clone(f)),
            HookHandler::Observe(f) => HookHandler::Observe(Arc::clone(f)),
            HookHandler::ObserveWith(f) => HookHandler::ObserveWith(Arc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for HookHandler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HookHandler::{}", self.variant())
    }
}

// =============================================================================
// Chains
// =============================================================================

/// Handlers of one kind, run in ascending order
pub struct HookChain<T> {
    kind: HookKind,
    handlers: BTreeMap<i32, HookHandler<T>>,
}

impl<T> HookChain<T> {
    pub fn new(kind: HookKind) -> Self {
        Self {
            kind,
            handlers: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> HookKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered orders, ascending
    pub fn orders(&self) -> Vec<i32> {
        self.handlers.keys().copied().collect()
    }

    /// Add a handler; an order may be used once per chain
    pub fn insert(&mut self, service: &str, order: i32, handler: HookHandler<T>) -> CrudResult<()> {
        if self.handlers.contains_key(&order) {
            tracing::error!(service, kind = %self.kind, order, "duplicate hook order");
            return Err(CrudError::DuplicateHookOrder {
                service: service.to_string(),
                kind: self.kind,
                order,
            });
        }
        tracing::debug!(service, kind = %self.kind, order, handler = handler.variant(), "hook loaded");
        self.handlers.insert(order, handler);
        Ok(())
    }

    /// Thread `primary` through every handler
    ///
    /// The first failing handler aborts the chain; handlers after it do not run.
    pub fn execute(&self, service: &str, primary: T, passed: &mut PassedValues) -> CrudResult<T> {
        let mut current = primary;
        for (&order, handler) in &self.handlers {
            tracing::trace!(service, kind = %self.kind, order, "running hook");
            current = match handler {
                HookHandler::Transform(f) => {
                    let value = f(&mut current).map_err(|e| self.translate(service, order, e))?;
                    passed.insert(order, value);
                    current
                }
                HookHandler::Apply(f) => {
                    let value = passed.remove(&order);
                    f(current, value).map_err(|e| self.translate(service, order, e))?
                }
                HookHandler::Observe(f) => {
                    f(&current).map_err(|e| self.translate(service, order, e))?;
                    current
                }
                HookHandler::ObserveWith(f) => {
                    f(&current, passed.get(&order)).map_err(|e| self.translate(service, order, e))?;
                    current
                }
            };
        }
        Ok(current)
    }

    fn translate(&self, service: &str, order: i32, err: HookError) -> CrudError {
        match err {
            HookError::Status { code, message } => {
                tracing::warn!(
                    service,
                    kind = %self.kind,
                    order,
                    status = code.as_u16(),
                    %message,
                    "hook rejected operation"
                );
                CrudError::Status { code, message }
            }
            HookError::Failed(source) => {
                tracing::error!(
                    service,
                    kind = %self.kind,
                    order,
                    error = %format!("{:#}", source),
                    "hook failed"
                );
                CrudError::Internal(format!(
                    "{} hook at order {} failed on service '{}'",
                    self.kind, order, service
                ))
            }
        }
    }
}

// =============================================================================
// Declarations and the per-service table
// =============================================================================

enum DeclaredHandler<E> {
    Entity(HookHandler<E>),
    PreFetch(HookHandler<FilterContainer>),
    PostFetch(HookHandler<FetchedRows<E>>),
}

struct Declaration<E> {
    kind: HookKind,
    order: i32,
    handler: DeclaredHandler<E>,
}

/// Hooks declared for a service before it is built
pub struct HookDeclarations<E> {
    entries: Vec<Declaration<E>>,
}

impl<E> Default for HookDeclarations<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E> HookDeclarations<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pre_add(&mut self, order: i32, handler: HookHandler<E>) -> &mut Self {
        self.entity(HookKind::PreAdd, order, handler)
    }

    pub fn post_add(&mut self, order: i32, handler: HookHandler<E>) -> &mut Self {
        self.entity(HookKind::PostAdd, order, handler)
    }

    pub fn pre_edit(&mut self, order: i32, handler: HookHandler<E>) -> &mut Self {
        self.entity(HookKind::PreEdit, order, handler)
    }

    pub fn post_edit(&mut self, order: i32, handler: HookHandler<E>) -> &mut Self {
        self.entity(HookKind::PostEdit, order, handler)
    }

    pub fn pre_delete(&mut self, order: i32, handler: HookHandler<E>) -> &mut Self {
        self.entity(HookKind::PreDelete, order, handler)
    }

    pub fn post_delete(&mut self, order: i32, handler: HookHandler<E>) -> &mut Self {
        self.entity(HookKind::PostDelete, order, handler)
    }

    /// Runs before every list and count query, on the incoming filter lists
    pub fn pre_fetch(&mut self, order: i32, handler: HookHandler<FilterContainer>) -> &mut Self {
        self.entries.push(Declaration {
            kind: HookKind::PreFetch,
            order,
            handler: DeclaredHandler::PreFetch(handler),
        });
        self
    }

    /// Runs after every list query and id lookup, on the fetched rows
    pub fn post_fetch(&mut self, order: i32, handler: HookHandler<FetchedRows<E>>) -> &mut Self {
        self.entries.push(Declaration {
            kind: HookKind::PostFetch,
            order,
            handler: DeclaredHandler::PostFetch(handler),
        });
        self
    }

    fn entity(&mut self, kind: HookKind, order: i32, handler: HookHandler<E>) -> &mut Self {
        self.entries.push(Declaration {
            kind,
            order,
            handler: DeclaredHandler::Entity(handler),
        });
        self
    }

    pub(crate) fn append(&mut self, mut other: HookDeclarations<E>) {
        self.entries.append(&mut other.entries);
    }
}

/// All hook chains of one service
pub struct HookTable<E> {
    service: String,
    entity: HashMap<HookKind, HookChain<E>>,
    pre_fetch: HookChain<FilterContainer>,
    post_fetch: HookChain<FetchedRows<E>>,
}

impl<E> HookTable<E> {
    /// Empty table
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            entity: HookKind::ENTITY
                .into_iter()
                .map(|kind| (kind, HookChain::new(kind)))
                .collect(),
            pre_fetch: HookChain::new(HookKind::PreFetch),
            post_fetch: HookChain::new(HookKind::PostFetch),
        }
    }

    /// Build the table from declarations, keeping only the `enabled` kinds
    ///
    /// Declarations of other kinds are dropped with a warning. Fails on the
    /// first duplicate order within a kind.
    pub fn load(
        service: impl Into<String>,
        declarations: HookDeclarations<E>,
        enabled: &[HookKind],
    ) -> CrudResult<Self> {
        let mut table = Self::new(service);
        for Declaration {
            kind,
            order,
            handler,
        } in declarations.entries
        {
            if !enabled.contains(&kind) {
                tracing::warn!(
                    service = %table.service,
                    %kind,
                    order,
                    "hook kind not supported by this service, ignoring"
                );
                continue;
            }
            match handler {
                DeclaredHandler::Entity(handler) => {
                    if let Some(chain) = table.entity.get_mut(&kind) {
                        chain.insert(&table.service, order, handler)?;
                    }
                }
                DeclaredHandler::PreFetch(handler) => {
                    table.pre_fetch.insert(&table.service, order, handler)?
                }
                DeclaredHandler::PostFetch(handler) => {
                    table.post_fetch.insert(&table.service, order, handler)?
                }
            }
        }
        Ok(table)
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Number of handlers registered for a kind
    pub fn count(&self, kind: HookKind) -> usize {
        match kind {
            HookKind::PreFetch => self.pre_fetch.len(),
            HookKind::PostFetch => self.post_fetch.len(),
            _ => self.entity.get(&kind).map_or(0, HookChain::len),
        }
    }

    pub fn total(&self) -> usize {
        HookKind::ALL.iter().map(|&kind| self.count(kind)).sum()
    }

    /// Run an entity chain
    ///
    /// `passed` belongs to the calling operation and pairs pre/post handlers.
    pub fn run(&self, kind: HookKind, entity: E, passed: &mut PassedValues) -> CrudResult<E> {
        match self.entity.get(&kind) {
            Some(chain) => chain.execute(&self.service, entity, passed),
            None => Ok(entity),
        }
    }

    /// Run the pre-fetch chain
    ///
    /// Pass the same `passed` map to [`run_post_fetch`](Self::run_post_fetch)
    /// for the same query so handlers at one order can pair up.
    pub fn run_pre_fetch(
        &self,
        filters: FilterContainer,
        passed: &mut PassedValues,
    ) -> CrudResult<FilterContainer> {
        self.pre_fetch.execute(&self.service, filters, passed)
    }

    pub fn run_post_fetch(
        &self,
        rows: FetchedRows<E>,
        passed: &mut PassedValues,
    ) -> CrudResult<FetchedRows<E>> {
        self.post_fetch.execute(&self.service, rows, passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use http::StatusCode;
    use std::sync::Mutex;

    fn recorder() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn record(log: &Arc<Mutex<Vec<String>>>, entry: impl Into<String>) {
        log.lock().unwrap().push(entry.into());
    }

    #[test]
    fn test_handlers_run_in_ascending_order() {
        let log = recorder();
        let mut chain = HookChain::<String>::new(HookKind::PreAdd);
        for order in [30, -5, 10] {
            let log = log.clone();
            chain
                .insert(
                    "note",
                    order,
                    HookHandler::observe(move |_: &String| {
                        record(&log, order.to_string());
                        Ok(())
                    }),
                )
                .unwrap();
        }

        assert_eq!(chain.orders(), vec![-5, 10, 30]);
        chain
            .execute("note", "x".to_string(), &mut PassedValues::new())
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["-5", "10", "30"]);
    }

    #[test]
    fn test_duplicate_order_is_rejected() {
        let mut chain = HookChain::<String>::new(HookKind::PostEdit);
        chain
            .insert("note", 1, HookHandler::observe(|_: &String| Ok(())))
            .unwrap();
        let err = chain
            .insert("note", 1, HookHandler::observe(|_: &String| Ok(())))
            .unwrap_err();

        assert!(matches!(
            err,
            CrudError::DuplicateHookOrder {
                kind: HookKind::PostEdit,
                order: 1,
                ..
            }
        ));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_same_order_in_different_kinds_is_allowed() {
        let mut declarations = HookDeclarations::<String>::new();
        declarations
            .pre_add(1, HookHandler::observe(|_: &String| Ok(())))
            .post_add(1, HookHandler::observe(|_: &String| Ok(())));
        let table = HookTable::load("note", declarations, &HookKind::ALL).unwrap();
        assert_eq!(table.count(HookKind::PreAdd), 1);
        assert_eq!(table.count(HookKind::PostAdd), 1);
        assert_eq!(table.total(), 2);
    }

    #[test]
    fn test_load_rejects_duplicate_order() {
        let mut declarations = HookDeclarations::<String>::new();
        declarations
            .pre_fetch(4, HookHandler::observe(|_: &FilterContainer| Ok(())))
            .pre_fetch(4, HookHandler::observe(|_: &FilterContainer| Ok(())));
        assert!(matches!(
            HookTable::load("note", declarations, &HookKind::ALL),
            Err(CrudError::DuplicateHookOrder {
                kind: HookKind::PreFetch,
                order: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_load_skips_disabled_kinds() {
        let mut declarations = HookDeclarations::<String>::new();
        declarations
            .pre_add(1, HookHandler::observe(|_: &String| Ok(())))
            .post_fetch(1, HookHandler::observe(|_: &FetchedRows<String>| Ok(())));
        let table = HookTable::load("note", declarations, &HookKind::FETCH).unwrap();
        assert_eq!(table.count(HookKind::PreAdd), 0);
        assert_eq!(table.count(HookKind::PostFetch), 1);
    }

    #[test]
    fn test_pre_post_pairing_by_order() {
        let seen = recorder();
        let mut declarations = HookDeclarations::<String>::new();
        declarations
            .pre_add(
                1,
                HookHandler::transform(|note: &mut String| {
                    let at = note.find('#').unwrap_or(note.len());
                    Ok(HookValue::new(note.split_off(at)))
                }),
            )
            .pre_add(
                2,
                HookHandler::transform(|note: &mut String| Ok(HookValue::new(note.len()))),
            );
        {
            let seen = seen.clone();
            declarations.post_add(
                1,
                HookHandler::apply(move |note: String, value| {
                    let tags = value.and_then(|v| v.downcast::<String>().ok());
                    record(&seen, format!("1:{:?}", tags));
                    Ok(format!("{} {}", note.trim_end(), tags.unwrap_or_default()))
                }),
            );
        }
        {
            let seen = seen.clone();
            declarations.post_add(
                3,
                HookHandler::observe_with(move |_: &String, value| {
                    record(&seen, format!("3:{}", value.is_some()));
                    Ok(())
                }),
            );
        }

        let table = HookTable::load("note", declarations, &HookKind::ALL).unwrap();
        let mut passed = PassedValues::new();
        let note = table
            .run(HookKind::PreAdd, "buy milk #home".to_string(), &mut passed)
            .unwrap();
        assert_eq!(note, "buy milk ");
        assert_eq!(passed.len(), 2);

        let note = table.run(HookKind::PostAdd, note, &mut passed).unwrap();
        assert_eq!(note, "buy milk #home");
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["1:Some(\"#home\")", "3:false"]
        );
        // order 1 was consumed, order 2 is still there for nobody
        assert!(!passed.contains_key(&1));
        assert_eq!(passed.get(&2).and_then(|v| v.downcast_ref::<usize>()), Some(&9));
    }

    #[test]
    fn test_status_error_passes_through_and_aborts() {
        let log = recorder();
        let mut chain = HookChain::<String>::new(HookKind::PreDelete);
        chain
            .insert(
                "note",
                1,
                HookHandler::observe(|_: &String| {
                    Err(HookError::status(StatusCode::CONFLICT, "note is pinned"))
                }),
            )
            .unwrap();
        {
            let log = log.clone();
            chain
                .insert(
                    "note",
                    2,
                    HookHandler::observe(move |_: &String| {
                        record(&log, "ran");
                        Ok(())
                    }),
                )
                .unwrap();
        }

        let err = chain
            .execute("note", "x".into(), &mut PassedValues::new())
            .unwrap_err();
        match err {
            CrudError::Status { code, message } => {
                assert_eq!(code, StatusCode::CONFLICT);
                assert_eq!(message, "note is pinned");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_other_errors_become_internal() {
        let mut chain = HookChain::<String>::new(HookKind::PostEdit);
        chain
            .insert(
                "note",
                7,
                HookHandler::observe(|_: &String| Err(anyhow!("index offline").into())),
            )
            .unwrap();

        let err = chain
            .execute("note", "x".into(), &mut PassedValues::new())
            .unwrap_err();
        assert!(matches!(err, CrudError::Internal(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("post_edit hook at order 7"));
    }

    #[test]
    fn test_pre_fetch_value_reaches_post_fetch_at_same_order() {
        let seen = recorder();
        let mut declarations = HookDeclarations::<String>::new();
        declarations
            .pre_fetch(
                1,
                HookHandler::transform(|filters: &mut FilterContainer| {
                    filters.push("tenant", "equals", "acme");
                    Ok(HookValue::new(filters.len()))
                }),
            )
            .pre_fetch(2, HookHandler::transform(|_: &mut FilterContainer| Ok(HookValue::new("two"))));
        {
            let seen = seen.clone();
            declarations.post_fetch(
                1,
                HookHandler::observe_with(move |_: &FetchedRows<String>, value| {
                    let count = value.and_then(|v| v.downcast_ref::<usize>()).copied();
                    record(&seen, format!("1:{:?}", count));
                    Ok(())
                }),
            );
        }
        let table = HookTable::load("note", declarations, &HookKind::FETCH).unwrap();

        let mut passed = PassedValues::new();
        let filters = table.run_pre_fetch(FilterContainer::new(), &mut passed).unwrap();
        assert!(filters.contains("tenant", "equals"));
        let rows = FetchedRows {
            rows: vec!["a".to_string()],
            full_scan: true,
        };
        table.run_post_fetch(rows.clone(), &mut passed).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["1:Some(1)"]);

        // a new query starts from an empty map
        table.run_post_fetch(rows, &mut PassedValues::new()).unwrap();
        assert_eq!(seen.lock().unwrap().last().unwrap(), "1:None");
    }

    #[test]
    fn test_hook_value_downcast() {
        let value = HookValue::new(vec![1_i64, 2]);
        assert!(value.downcast_ref::<Vec<i64>>().is_some());
        assert!(value.downcast_ref::<String>().is_none());
        let value = value.downcast::<String>().unwrap_err();
        assert_eq!(value.downcast::<Vec<i64>>().unwrap(), vec![1, 2]);
    }
}
