//! # This-CRUD
//!
//! A generic data-access layer for entity types: list, count, look up,
//! create, edit and delete, with ordered lifecycle hooks and pluggable
//! per-entity filters and sorts.
//!
//! ## Features
//!
//! - **Ordered Hooks**: pre/post handlers for add, edit, delete and fetch,
//!   run by ascending order, with values handed from a pre handler to the
//!   post handler of the same order
//! - **Filter & Sort Extensions**: registered per service under a
//!   case-insensitive `field + operation` key, validated on every request
//! - **Mandatory Filters**: refuse queries that do not carry them, unless a
//!   pre-fetch hook injects them
//! - **Soft Delete**: deleted rows stay stored but disappear from queries and
//!   pagination windows
//! - **Composite Keys**: comma-separated id strings chunked by the entity's
//!   id field count
//! - **Configuration-Based**: per-service operation switches via YAML
//! - **Typed Errors**: every failure maps to a status code and error code
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use this_crud::prelude::*;
//!
//! impl_entity!(Book, "book", id: i64);
//! impl_merge!(Book, [title, published]);
//!
//! let registry = Arc::new(
//!     ExtensionRegistry::builder()
//!         .filter::<Book, _, _>(FilterInfo::new("book", "title", Operation::Equals), || {
//!             FieldFilter::new(|b: &Book, v| b.title.contains(v))
//!         })
//!         .build(),
//! );
//!
//! let books = ServiceBuilder::<Book>::new("book")
//!     .repository(Arc::new(InMemoryRepository::new()))
//!     .extensions(registry)
//!     .build()?;
//!
//! books.create(book)?;
//! let found = books.fetch_all(&FetchRequest::new().filter("title", "equals", "Dune"))?;
//! ```

pub mod config;
pub mod core;
pub mod entities;
pub mod logging;
pub mod services;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core Traits ===
    pub use crate::core::{
        entity::{Deletable, Entity, IdCodec, Merge, parse_id_part},
        extension::{DateFilter, FieldFilter, FieldSort, Filter, FilterInfo, Sort, SortInfo},
        hooks::{HookDeclarations, HookHandler, HookKind, HookValue},
        operators::{Operation, SortDirection},
        query::{FetchRequest, FetchedRows, FilterContainer, FilterRequest},
        store::Repository,
        stream::{EntityStream, StreamSource},
    };

    // === Errors ===
    pub use crate::core::error::{CrudError, CrudResult, HookError, HookResult};

    // === Macros ===
    pub use crate::{impl_entity, impl_merge};

    // === Services ===
    pub use crate::services::{CrudService, ExtensionRegistry, ReadOnlyService, ServiceBuilder};

    // === Storage ===
    pub use crate::storage::InMemoryRepository;

    // === Config ===
    pub use crate::config::{ServiceConfig, ServicesConfig};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use chrono::NaiveDate;
    pub use http::StatusCode;
    pub use serde::{Deserialize, Serialize};
    pub use std::sync::Arc;
}
