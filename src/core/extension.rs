//! Filter and sort extension points
//!
//! A filter narrows an [`EntityStream`] for one `(field, operation)` pair; a
//! sort orders it for one `(field, direction)` pair. Both are registered per
//! service in the [`ExtensionRegistry`](crate::services::ExtensionRegistry)
//! under their [`semantic_key`].

use crate::core::entity::Entity;
use crate::core::operators::{Operation, SortDirection, parse_date_value, semantic_key};
use crate::core::stream::EntityStream;
use anyhow::Result;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::sync::Arc;

/// Narrows a query for one filter key
pub trait Filter<E: Entity>: Send + Sync {
    /// Append this filter's constraint for the given request value
    ///
    /// An error means the value is unusable (e.g. not a date) and is reported
    /// to the caller as a bad filter.
    fn apply(&self, stream: EntityStream<E>, value: &str) -> Result<EntityStream<E>>;

    /// A mandatory filter must be present in every list and count request
    fn is_mandatory(&self) -> bool {
        false
    }
}

/// Orders a query for one sort key
pub trait Sort<E: Entity>: Send + Sync {
    fn apply(&self, stream: EntityStream<E>) -> EntityStream<E>;
}

/// Registration metadata of a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterInfo {
    /// Service the filter belongs to
    pub service_id: String,
    pub field: String,
    pub operation: Operation,
}

impl FilterInfo {
    pub fn new(service_id: impl Into<String>, field: impl Into<String>, operation: Operation) -> Self {
        Self {
            service_id: service_id.into(),
            field: field.into(),
            operation,
        }
    }

    pub fn key(&self) -> String {
        semantic_key(&self.field, self.operation.code())
    }
}

/// Registration metadata of a sort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortInfo {
    pub service_id: String,
    pub field: String,
    pub direction: SortDirection,
}

impl SortInfo {
    pub fn new(
        service_id: impl Into<String>,
        field: impl Into<String>,
        direction: SortDirection,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            field: field.into(),
            direction,
        }
    }

    pub fn key(&self) -> String {
        semantic_key(&self.field, self.direction.code())
    }
}

type Matcher<E> = Arc<dyn Fn(&E, &str) -> bool + Send + Sync>;

/// Filter built from a `(row, value) -> bool` closure
///
/// # Example
/// ```rust,ignore
/// let title = FieldFilter::new(|book: &Book, value| book.title.contains(value));
/// let tenant = FieldFilter::new(|book: &Book, value| book.tenant == value).mandatory();
/// ```
pub struct FieldFilter<E> {
    matcher: Matcher<E>,
    mandatory: bool,
}

impl<E: Entity> FieldFilter<E> {
    pub fn new<F>(matcher: F) -> Self
    where
        F: Fn(&E, &str) -> bool + Send + Sync + 'static,
    {
        Self {
            matcher: Arc::new(matcher),
            mandatory: false,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }
}

impl<E: Entity> Filter<E> for FieldFilter<E> {
    fn apply(&self, stream: EntityStream<E>, value: &str) -> Result<EntityStream<E>> {
        let matcher = Arc::clone(&self.matcher);
        let value = value.to_string();
        Ok(stream.filter(move |row| matcher(row, &value)))
    }

    fn is_mandatory(&self) -> bool {
        self.mandatory
    }
}

/// Filter comparing a date field against a parsed request value
///
/// Plain operations (`lt`, `equals`, ...) compare dates the same way their
/// date counterparts do.
pub struct DateFilter<E> {
    extract: Arc<dyn Fn(&E) -> NaiveDate + Send + Sync>,
    operation: Operation,
}

impl<E: Entity> DateFilter<E> {
    pub fn new<F>(operation: Operation, extract: F) -> Self
    where
        F: Fn(&E) -> NaiveDate + Send + Sync + 'static,
    {
        Self {
            extract: Arc::new(extract),
            operation,
        }
    }
}

impl<E: Entity> Filter<E> for DateFilter<E> {
    fn apply(&self, stream: EntityStream<E>, value: &str) -> Result<EntityStream<E>> {
        let expected = parse_date_value(value)?;
        let extract = Arc::clone(&self.extract);
        let operation = self.operation;
        Ok(stream.filter(move |row| operation.compare(&extract(row), &expected)))
    }
}

/// Sort by a key extracted from each row
pub struct FieldSort<E> {
    compare: Arc<dyn Fn(&E, &E) -> Ordering + Send + Sync>,
    direction: SortDirection,
}

impl<E: Entity> FieldSort<E> {
    pub fn new<K, F>(direction: SortDirection, key: F) -> Self
    where
        K: Ord,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        Self {
            compare: Arc::new(move |a: &E, b: &E| key(a).cmp(&key(b))),
            direction,
        }
    }

    pub fn ascending<K, F>(key: F) -> Self
    where
        K: Ord,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        Self::new(SortDirection::Asc, key)
    }

    pub fn descending<K, F>(key: F) -> Self
    where
        K: Ord,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        Self::new(SortDirection::Desc, key)
    }
}

impl<E: Entity> Sort<E> for FieldSort<E> {
    fn apply(&self, stream: EntityStream<E>) -> EntityStream<E> {
        let compare = Arc::clone(&self.compare);
        match self.direction {
            SortDirection::Asc => stream.sorted_by(move |a, b| compare(a, b)),
            SortDirection::Desc => stream.sorted_by(move |a, b| compare(b, a)),
        }
    }
}
