//! # FIAS Catalog
//!
//! A local address classifier catalog over SQLite: bulk import of FIAS
//! extracts, hierarchy resolution across historical revisions, denormalized
//! search text, and address listings with natural house-number ordering.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │ Tabular dump │──▶│   Importer   │──▶│  SQLite  │
//! │  CP866/UTF-8 │   │ map + batch  │   │  tables  │
//! └──────────────┘   └──────────────┘   └────┬─────┘
//!                                            │
//!                         ┌──────────────────┤
//!                         ▼                  ▼
//!                  ┌─────────────┐    ┌─────────────┐
//!                  │ Search index│    │ Query engine│
//!                  └─────────────┘    └─────────────┘
//! ```
//!
//! Domain logic lives in `fias-catalog-core`; this crate supplies the SQLite
//! store, configuration, the tabular row source and the `fias` binary.
//!
//! ## Quick Start
//!
//! ```bash
//! fias init
//! fias import ADDROBJ.DBF.csv HOUSE77.DBF.csv --region 77
//! fias index
//! fias search "москва тверская"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite `CatalogStore` |
//! | [`csv_source`] | Tabular dump row source |
//! | [`import_cmd`] | Import and index commands |
//! | [`query_cmd`] | Listing and search commands |
//! | [`progress`] | Import progress on stderr |
//! | [`stats`] | Database statistics |
//! | [`logging`] | `tracing` subscriber setup |

pub mod config;
pub mod csv_source;
pub mod db;
pub mod import_cmd;
pub mod logging;
pub mod migrate;
pub mod progress;
pub mod query_cmd;
pub mod sqlite_store;
pub mod stats;
