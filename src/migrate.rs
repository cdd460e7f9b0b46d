//! Schema creation for the catalog database.
//!
//! One table per import target. Imported values are stored as TEXT exactly
//! as mapped. Address-element and house tables carry extra columns the store
//! maintains itself.

use anyhow::Result;
use fias_catalog_core::schema::{RecordKind, TargetSchema};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Store-maintained columns appended to imported columns, per record kind.
pub fn maintained_columns(schema: TargetSchema) -> &'static [(&'static str, &'static str)] {
    match schema.record_kind() {
        RecordKind::AddressElement => &[
            ("formalname_upper", "TEXT NOT NULL DEFAULT ''"),
            ("fulltext_search", "TEXT"),
            ("fulltext_search_upper", "TEXT"),
            ("houses_count", "INTEGER NOT NULL DEFAULT 0"),
        ],
        RecordKind::House => &[("housenum_upper", "TEXT NOT NULL DEFAULT ''")],
        RecordKind::Auxiliary => &[],
    }
}

fn create_table_sql(schema: TargetSchema) -> String {
    let mut columns: Vec<String> = schema
        .columns()
        .iter()
        .map(|col| format!("{} TEXT", col))
        .collect();
    columns.extend(
        maintained_columns(schema)
            .iter()
            .map(|(col, decl)| format!("{} {}", col, decl)),
    );
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        schema.table(),
        columns.join(",\n    ")
    )
}

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_addrobj_aoguid ON fias_addrobj(aoguid)",
    "CREATE INDEX IF NOT EXISTS idx_addrobj_aoid ON fias_addrobj(aoid)",
    "CREATE INDEX IF NOT EXISTS idx_addrobj_parentguid ON fias_addrobj(parentguid)",
    "CREATE INDEX IF NOT EXISTS idx_addrobj_aolevel ON fias_addrobj(aolevel)",
    "CREATE INDEX IF NOT EXISTS idx_addrobj_formalname_upper ON fias_addrobj(formalname_upper)",
    "CREATE INDEX IF NOT EXISTS idx_house_aoguid ON fias_house(aoguid)",
    "CREATE INDEX IF NOT EXISTS idx_house_houseguid ON fias_house(houseguid)",
    "CREATE INDEX IF NOT EXISTS idx_house_gisgkh_guid ON fias_house(gisgkh_guid)",
    "CREATE INDEX IF NOT EXISTS idx_house_fias_houseguid ON fias_house(fias_houseguid)",
];

/// Create every table and index on an open pool. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    for schema in TargetSchema::ALL {
        sqlx::query(&create_table_sql(schema)).execute(pool).await?;
    }
    for index in INDEXES {
        sqlx::query(index).execute(pool).await?;
    }
    Ok(())
}

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}
