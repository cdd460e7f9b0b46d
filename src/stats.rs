//! Database statistics and health overview.
//!
//! Provides a quick summary of what's loaded: row counts per table and how
//! much of the address hierarchy has its search text and house counts
//! computed. Used by `fias stats` to confirm that imports and `fias index`
//! did what was expected.

use anyhow::Result;
use fias_catalog_core::schema::TargetSchema;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Search-index coverage of the address table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexCoverage {
    pub elements: i64,
    pub with_search_text: i64,
    pub with_houses: i64,
}

pub async fn table_counts(pool: &SqlitePool) -> Result<Vec<(&'static str, i64)>> {
    let mut counts = Vec::with_capacity(TargetSchema::ALL.len());
    for schema in TargetSchema::ALL {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", schema.table()))
            .fetch_one(pool)
            .await?;
        counts.push((schema.table(), count));
    }
    Ok(counts)
}

pub async fn index_coverage(pool: &SqlitePool) -> Result<IndexCoverage> {
    let (elements, with_search_text, with_houses): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COALESCE(SUM(CASE WHEN fulltext_search_upper IS NOT NULL AND fulltext_search_upper != '' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN houses_count > 0 THEN 1 ELSE 0 END), 0)
        FROM fias_addrobj
        "#,
    )
    .fetch_one(pool)
    .await?;
    Ok(IndexCoverage {
        elements,
        with_search_text,
        with_houses,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let counts = table_counts(&pool).await?;
    let coverage = index_coverage(&pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("FIAS Catalog: Database Stats");
    println!("============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!(
        "  Indexed:     {} / {} ({}%)",
        coverage.with_search_text,
        coverage.elements,
        percent(coverage.with_search_text, coverage.elements)
    );
    println!("  With houses: {}", coverage.with_houses);

    let loaded: Vec<_> = counts.iter().filter(|(_, n)| *n > 0).collect();
    if !loaded.is_empty() {
        println!();
        println!("  By table:");
        println!("  {:<20} {:>12}", "TABLE", "ROWS");
        println!("  {}", "-".repeat(33));
        for (table, n) in loaded {
            println!("  {:<20} {:>12}", table, n);
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

fn percent(part: i64, whole: i64) -> i64 {
    if whole > 0 {
        (part * 100) / whole
    } else {
        0
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_human_readable() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn percent_of_empty_is_zero() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 3), 33);
    }
}
