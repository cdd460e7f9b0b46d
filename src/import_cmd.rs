//! `fias import` and `fias index`.
//!
//! Import loads each file in turn and keeps going after a failed one; the
//! command fails at the end if any source did. Index rebuilds the derived
//! columns the queries rely on.

use std::path::PathBuf;

use anyhow::{bail, Result};
use fias_catalog_core::codepage::Codepage;
use fias_catalog_core::import::{ImportOptions, ImportOutcome, ImportProgress, ImportReport, Importer};
use fias_catalog_core::search_index::SearchIndexBuilder;
use fias_catalog_core::store::CatalogStore;
use serde::Serialize;
use tracing::{error, info};

use crate::config::Config;
use crate::csv_source::{source_name, CsvSource};
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Overrides of `[import]` settings from the command line.
#[derive(Debug, Default, Clone)]
pub struct ImportOverrides {
    pub region: Option<String>,
    pub encoding: Option<Codepage>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SourceResult {
    Imported(ImportReport),
    Unsupported { source: String },
    Failed { source: String, error: String },
}

impl SourceResult {
    fn failed(&self) -> bool {
        matches!(self, SourceResult::Failed { .. })
    }
}

fn import_options(config: &Config, overrides: &ImportOverrides) -> ImportOptions {
    ImportOptions {
        batch_size: overrides.batch_size.unwrap_or(config.import.batch_size),
        region_code: overrides
            .region
            .clone()
            .or_else(|| config.import.region.clone())
            .filter(|r| !r.trim().is_empty()),
        codepage: overrides.encoding.unwrap_or(config.import.encoding),
    }
}

/// Import every file with one importer. Results are in argument order.
pub async fn import_files<S: CatalogStore>(
    store: &S,
    files: &[PathBuf],
    options: ImportOptions,
    delimiter: u8,
    progress: &dyn ImportProgress,
) -> Vec<SourceResult> {
    let importer = Importer::new(store, options, progress);
    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let outcome = match CsvSource::open(path, delimiter) {
            Ok(mut source) => importer.import(&mut source).await,
            Err(e) => Err(e),
        };
        results.push(match outcome {
            Ok(ImportOutcome::Imported(report)) => SourceResult::Imported(report),
            Ok(ImportOutcome::Unsupported { source }) => SourceResult::Unsupported { source },
            Err(e) => {
                error!(file = %path.display(), error = %format!("{:#}", e), "import failed");
                SourceResult::Failed {
                    source: source_name(path),
                    error: format!("{:#}", e),
                }
            }
        });
    }
    results
}

pub async fn run_import(
    config: &Config,
    files: &[PathBuf],
    overrides: &ImportOverrides,
    progress: &dyn ImportProgress,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let options = import_options(config, overrides);

    let results = import_files(
        &store,
        files,
        options,
        config.import.delimiter_byte(),
        progress,
    )
    .await;
    println!("{}", serde_json::to_string_pretty(&results)?);

    let failed = results.iter().filter(|r| r.failed()).count();
    if failed > 0 {
        bail!("{} of {} sources failed to import", failed, results.len());
    }
    Ok(())
}

/// Recompute house counts and fill in every missing search text.
pub async fn run_index(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);

    let counted = store.refresh_house_counts().await?;
    info!(elements = counted, "house counts refreshed");
    let indexed = SearchIndexBuilder::new(&store).rebuild_all().await?;
    info!(elements = indexed, "search index rebuilt");

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "house_counts_refreshed": counted,
            "search_texts_checked": indexed,
        }))?
    );
    Ok(())
}
