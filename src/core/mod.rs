//! Core module containing the fundamental traits and types of the data-access layer

pub mod entity;
pub mod error;
pub mod extension;
pub mod hooks;
pub mod operators;
pub mod query;
pub mod store;
pub mod stream;

pub use entity::{Deletable, Entity, IdCodec, Merge};
pub use error::{ConfigError, CrudError, CrudResult, ErrorResponse, HookError, HookResult};
pub use extension::{DateFilter, FieldFilter, FieldSort, Filter, FilterInfo, Sort, SortInfo};
pub use hooks::{HookChain, HookDeclarations, HookHandler, HookKind, HookTable, HookValue, PassedValues};
pub use operators::{Operation, SortDirection, semantic_key};
pub use query::{FetchRequest, FetchedRows, FilterContainer, FilterRequest, Pagination};
pub use store::Repository;
pub use stream::{EntityStream, QueryPlan, QueryStep, StreamSource};
