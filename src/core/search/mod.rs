// src/core/search/mod.rs

//! The in-memory full-text search engine backing the `FT.*` command family:
//! schema definitions, the inverted-index structure, and query parsing.

pub mod index;
pub mod query;
pub mod schema;

pub use index::SearchIndex;
pub use query::{Query, QueryParser, Term};
pub use schema::{Field, FieldOption, FieldType, Schema};
