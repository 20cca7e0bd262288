//! Query parameters: filter triples, pagination and fetched-row envelopes

use crate::core::error::{CrudError, CrudResult};
use crate::core::operators::semantic_key;
use serde::{Deserialize, Serialize};

/// Parallel lists of filter names, operations and values
///
/// Entry `i` of each list forms one filter triple. Deserializes from the
/// `filter`, `filterOperation` and `filterValue` parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRequest {
    #[serde(rename = "filter")]
    pub names: Vec<String>,

    #[serde(rename = "filterOperation")]
    pub operations: Vec<String>,

    #[serde(rename = "filterValue")]
    pub values: Vec<String>,
}

impl FilterRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one triple
    pub fn with(
        mut self,
        name: impl Into<String>,
        operation: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.names.push(name.into());
        self.operations.push(operation.into());
        self.values.push(value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.operations.is_empty() && self.values.is_empty()
    }

    /// All three lists have the same length
    pub fn is_consistent(&self) -> bool {
        self.names.len() == self.operations.len() && self.names.len() == self.values.len()
    }

    /// Iterate `(name, operation, value)` triples
    pub fn triples(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.names
            .iter()
            .zip(&self.operations)
            .zip(&self.values)
            .map(|((n, o), v)| (n.as_str(), o.as_str(), v.as_str()))
    }

    /// Lowercase lookup key of every triple
    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.names
            .iter()
            .zip(&self.operations)
            .map(|(n, o)| semantic_key(n, o))
    }
}

/// Mutable filter lists handed to pre-fetch hooks
///
/// Hooks may add, drop or rewrite triples; the composer validates whatever
/// comes out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterContainer {
    pub filters: Vec<String>,
    pub operations: Vec<String>,
    pub values: Vec<String>,
}

impl FilterContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the container from a request
    pub fn from_request(request: FilterRequest) -> Self {
        Self {
            filters: request.names,
            operations: request.operations,
            values: request.values,
        }
    }

    pub fn into_request(self) -> FilterRequest {
        FilterRequest {
            names: self.filters,
            operations: self.operations,
            values: self.values,
        }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn push(
        &mut self,
        name: impl Into<String>,
        operation: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.filters.push(name.into());
        self.operations.push(operation.into());
        self.values.push(value.into());
    }

    /// Whether a triple with this name/operation pair is present (case-insensitive)
    pub fn contains(&self, name: &str, operation: &str) -> bool {
        let key = semantic_key(name, operation);
        self.filters
            .iter()
            .zip(&self.operations)
            .any(|(n, o)| semantic_key(n, o) == key)
    }

    /// Remove every triple with this name/operation pair, returning how many went
    pub fn remove(&mut self, name: &str, operation: &str) -> usize {
        let key = semantic_key(name, operation);
        let before = self.filters.len();
        let mut kept = FilterContainer::new();
        for ((n, o), v) in self
            .filters
            .drain(..)
            .zip(self.operations.drain(..))
            .zip(self.values.drain(..))
        {
            if semantic_key(&n, &o) != key {
                kept.push(n, o, v);
            }
        }
        *self = kept;
        before - self.filters.len()
    }
}

/// Validated pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub start: u64,
    pub count: u64,
}

impl Pagination {
    /// Both or neither: one without the other is a [`CrudError::BadPagination`]
    pub fn from_parts(start: Option<u64>, count: Option<u64>) -> CrudResult<Option<Pagination>> {
        match (start, count) {
            (Some(start), Some(count)) => Ok(Some(Pagination { start, count })),
            (None, None) => Ok(None),
            _ => Err(CrudError::BadPagination { start, count }),
        }
    }
}

/// Rows handed to post-fetch hooks
///
/// `full_scan` is true for list queries and false for lookups by id.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedRows<E> {
    pub rows: Vec<E>,
    pub full_scan: bool,
}

/// Parameters of a list query
///
/// # Example
/// ```rust,ignore
/// let request = FetchRequest::new()
///     .filter("title", "equals", "Dune")
///     .page(0, 20)
///     .sort("titleasc");
/// let books = books_service.fetch_all(&request)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FetchRequest {
    #[serde(flatten)]
    pub filters: FilterRequest,

    /// Rows to skip; requires `count`
    pub start: Option<u64>,

    /// Maximum rows to return; requires `start`
    pub count: Option<u64>,

    /// Sort key, e.g. `titleasc`
    pub sort: Option<String>,
}

impl FetchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(
        mut self,
        name: impl Into<String>,
        operation: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.filters = self.filters.with(name, operation, value);
        self
    }

    pub fn page(mut self, start: u64, count: u64) -> Self {
        self.start = Some(start);
        self.count = Some(count);
        self
    }

    pub fn sort(mut self, key: impl Into<String>) -> Self {
        self.sort = Some(key.into());
        self
    }
}
