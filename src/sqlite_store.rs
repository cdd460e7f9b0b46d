//! SQLite-backed [`CatalogStore`] implementation.
//!
//! Filters are translated into SQL with [`QueryBuilder`]. Guid sets are bound
//! as one JSON array and expanded with `json_each`, so large sets do not run
//! into the bound-parameter limit. Name and search predicates compare
//! against the `*_upper` columns, which are normalized in Rust when a row is
//! written since SQLite cannot uppercase Cyrillic.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use fias_catalog_core::models::{AddressElement, House};
use fias_catalog_core::normalize::normalize;
use fias_catalog_core::schema::{column, MappedRow, RecordKind, TargetSchema};
use fias_catalog_core::store::{CatalogStore, ElementFilter, HouseFilter, NameMatch, RowBatch};

const ADDROBJ: &str = "fias_addrobj";
const HOUSE: &str = "fias_house";

/// Stored flags count as set unless they hold an explicit false value.
const ACTIVE: &str = "(actual IS NULL OR LOWER(TRIM(actual)) NOT IN ('0', 'f', 'false', 'n', 'no'))";

const TERMINAL: &str =
    "(COALESCE(CAST(currstatus AS INTEGER), 0) = 0 OR nextid IS NULL OR TRIM(nextid) = '')";

/// SQLite implementation of the [`CatalogStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn json_set(values: &[String]) -> String {
    serde_json::Value::from(values.to_vec()).to_string()
}

fn push_in_set(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, values: &[String]) {
    qb.push(format!(" AND {} IN (SELECT value FROM json_each(", column));
    qb.push_bind(json_set(values));
    qb.push("))");
}

fn limit_value(limit: Option<i64>) -> i64 {
    match limit {
        Some(n) if n > 0 => n,
        _ => -1,
    }
}

/// `WITH m AS (...)` over the address table with every predicate of the
/// filter applied. `None` when an empty set makes the result empty.
fn element_cte(filter: &ElementFilter) -> Option<QueryBuilder<'static, Sqlite>> {
    let mut qb = QueryBuilder::new(format!(
        "WITH m AS (SELECT rowid AS rid, * FROM {} WHERE 1 = 1",
        ADDROBJ
    ));
    if let Some(guids) = &filter.guids {
        if guids.is_empty() {
            return None;
        }
        push_in_set(&mut qb, "aoguid", guids);
    }
    if let Some(parents) = &filter.parent_guids {
        if parents.is_empty() {
            return None;
        }
        push_in_set(&mut qb, "parentguid", parents);
    }
    if let Some(level) = filter.level {
        qb.push(" AND CAST(aolevel AS INTEGER) = ");
        qb.push_bind(level.code());
    }
    if let Some(code) = &filter.region_code {
        qb.push(" AND regioncode = ");
        qb.push_bind(code.clone());
    }
    if filter.with_child_houses {
        qb.push(" AND houses_count > 0");
    }
    if filter.terminal_only {
        qb.push(" AND ");
        qb.push(TERMINAL);
    }
    if filter.active_only {
        qb.push(" AND ");
        qb.push(ACTIVE);
    }
    match &filter.name {
        Some(NameMatch::Exact(name)) => {
            qb.push(" AND formalname_upper = ");
            qb.push_bind(name.clone());
        }
        Some(NameMatch::Contains(fragment)) => {
            qb.push(" AND instr(formalname_upper, ");
            qb.push_bind(fragment.clone());
            qb.push(") > 0");
        }
        None => {}
    }
    for token in &filter.search {
        if token.strict {
            qb.push(
                " AND instr(' ' || REPLACE(REPLACE(COALESCE(fulltext_search_upper, ''), ',', ' '), '.', ' ') || ' ', ",
            );
            qb.push_bind(format!(" {} ", token.text));
            qb.push(") > 0");
        } else {
            qb.push(" AND instr(COALESCE(fulltext_search_upper, ''), ");
            qb.push_bind(token.text.clone());
            qb.push(") > 0");
        }
    }
    qb.push(")");
    Some(qb)
}

fn push_distinct(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ElementFilter) {
    if filter.distinct_guid {
        qb.push(" WHERE rid IN (SELECT MIN(rid) FROM m GROUP BY aoguid)");
    }
}

fn mapped(row: &SqliteRow, schema: TargetSchema) -> Result<MappedRow> {
    schema
        .columns()
        .iter()
        .map(|col| Ok((*col, row.try_get::<Option<String>, _>(*col)?)))
        .collect()
}

fn element_from_row(row: &SqliteRow) -> Result<Option<AddressElement>> {
    let Some(mut element) = AddressElement::from_row(&mapped(row, TargetSchema::AddressElements)?)
    else {
        return Ok(None);
    };
    element.search_text = row.try_get("fulltext_search")?;
    element.search_text_normalized = row.try_get("fulltext_search_upper")?;
    element.house_count = row.try_get("houses_count")?;
    Ok(Some(element))
}

/// Normalized copy of a column, kept next to it for name predicates.
fn upper_of(row: &MappedRow, name: &str) -> String {
    normalize(column(row, name).unwrap_or_default())
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn find_elements(&self, filter: &ElementFilter) -> Result<Vec<AddressElement>> {
        let Some(mut qb) = element_cte(filter) else {
            return Ok(Vec::new());
        };
        qb.push(" SELECT * FROM m");
        push_distinct(&mut qb, filter);
        if filter.order_by_name {
            qb.push(" ORDER BY formalname_upper, rid");
        } else {
            qb.push(" ORDER BY rid");
        }
        qb.push(" LIMIT ");
        qb.push_bind(limit_value(filter.limit));
        qb.push(" OFFSET ");
        qb.push_bind(filter.offset.max(0));

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut elements = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(element) = element_from_row(row)? {
                elements.push(element);
            }
        }
        Ok(elements)
    }

    async fn count_elements(&self, filter: &ElementFilter) -> Result<i64> {
        let Some(mut qb) = element_cte(filter) else {
            return Ok(0);
        };
        qb.push(" SELECT COUNT(*) FROM m");
        push_distinct(&mut qb, filter);
        let count = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn find_houses(&self, filter: &HouseFilter) -> Result<Vec<House>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT * FROM {} WHERE 1 = 1", HOUSE));
        if let Some(guids) = &filter.house_guids {
            if guids.is_empty() {
                return Ok(Vec::new());
            }
            push_in_set(&mut qb, "houseguid", guids);
        }
        if let Some(aoguids) = &filter.aoguids {
            if aoguids.is_empty() {
                return Ok(Vec::new());
            }
            push_in_set(&mut qb, "aoguid", aoguids);
        }
        if let Some(number) = &filter.house_number {
            qb.push(" AND housenum = ");
            qb.push_bind(number.clone());
        }
        if let Some(fragment) = &filter.number_contains {
            qb.push(" AND instr(housenum_upper, ");
            qb.push_bind(fragment.clone());
            qb.push(") > 0");
        }
        if let Some(guid) = &filter.linked_to {
            qb.push(" AND (houseguid = ");
            qb.push_bind(guid.clone());
            qb.push(" OR gisgkh_guid = ");
            qb.push_bind(guid.clone());
            qb.push(" OR fias_houseguid = ");
            qb.push_bind(guid.clone());
            qb.push(")");
        }
        if let Some(date) = filter.valid_on {
            qb.push(" AND (enddate IS NULL OR enddate > ");
            qb.push_bind(date.format("%Y-%m-%d").to_string());
            qb.push(")");
        }
        if filter.active_only {
            qb.push(" AND ");
            qb.push(ACTIVE);
        }
        qb.push(" ORDER BY rowid");

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut houses = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(house) = House::from_row(&mapped(row, TargetSchema::Houses)?) {
                houses.push(house);
            }
        }
        Ok(houses)
    }

    async fn save_search_text(
        &self,
        element_id: &str,
        text: &str,
        normalized: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE fias_addrobj SET fulltext_search = ?, fulltext_search_upper = ? WHERE aoid = ?",
        )
        .bind(text)
        .bind(normalized)
        .bind(element_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_batch(&self, batch: &RowBatch) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let kind = batch.schema.record_kind();

        for row in &batch.rows {
            let mut names: Vec<&str> = row.iter().map(|(col, _)| *col).collect();
            let mut values: Vec<Option<String>> =
                row.iter().map(|(_, value)| value.clone()).collect();
            match kind {
                RecordKind::AddressElement => {
                    names.push("formalname_upper");
                    values.push(Some(upper_of(row, "formalname")));
                }
                RecordKind::House => {
                    names.push("housenum_upper");
                    values.push(Some(upper_of(row, "housenum")));
                }
                RecordKind::Auxiliary => {}
            }
            if names.is_empty() {
                continue;
            }

            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "INSERT INTO {} ({}) VALUES (",
                batch.schema.table(),
                names.join(", ")
            ));
            let mut separated = qb.separated(", ");
            for value in values {
                separated.push_bind(value);
            }
            separated.push_unseparated(")");
            qb.build()
                .execute(&mut *tx)
                .await
                .with_context(|| format!("inserting into {}", batch.schema.table()))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn refresh_house_counts(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE fias_addrobj SET houses_count = (
                SELECT COUNT(*) FROM fias_house h WHERE h.aoguid = fias_addrobj.aoguid
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
