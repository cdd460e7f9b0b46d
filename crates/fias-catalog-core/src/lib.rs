//! # FIAS Catalog Core
//!
//! Shared logic for the address catalog: data model, text normalization,
//! naming rules, legacy codepage decoding, import schema mapping, store
//! abstraction, hierarchy resolution, search index construction, the query
//! engine and the bulk importer.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Storage is reached
//! only through the [`store::CatalogStore`] trait.

pub mod codepage;
pub mod hierarchy;
pub mod import;
pub mod models;
pub mod naming;
pub mod normalize;
pub mod query;
pub mod schema;
pub mod search_index;
pub mod store;
