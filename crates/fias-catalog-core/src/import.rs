//! Chunked bulk import of classifier extracts.
//!
//! A [`RowSource`] yields raw records field by field. The [`Importer`]
//! resolves the target schema from the source name, maps each record onto
//! the schema's column whitelist, decodes and trims values, applies the
//! optional region pre-filter and writes rows in batches through
//! [`CatalogStore::insert_batch`].
//!
//! Every batch is its own transaction. A failure stops the import and
//! leaves earlier batches committed.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::codepage::Codepage;
use crate::schema::{column, MappedRow, TargetSchema};
use crate::store::{CatalogStore, RowBatch};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Field of the source format marking deleted records; never imported.
const DELETION_FLAG: &str = "deleted";

/// One undecoded source record: field name and raw value bytes, in source
/// column order.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    pub fields: Vec<(String, Vec<u8>)>,
}

impl RawRow {
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.fields.push((name.into(), value.into()));
    }
}

/// Sequential reader over one extract file.
pub trait RowSource: Send {
    /// File name the target schema is resolved from.
    fn name(&self) -> &str;

    /// Record count, when the format knows it up front.
    fn total_rows(&self) -> Option<u64>;

    fn next_row(&mut self) -> Result<Option<RawRow>>;
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub batch_size: usize,
    /// Keep only address elements of this region.
    pub region_code: Option<String>,
    pub codepage: Codepage,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            region_code: None,
            codepage: Codepage::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEvent {
    Started {
        source: String,
        schema: TargetSchema,
        total: Option<u64>,
    },
    BatchCommitted {
        source: String,
        rows_read: u64,
        rows_written: u64,
        total: Option<u64>,
    },
    Finished {
        source: String,
        rows_written: u64,
        rows_skipped: u64,
    },
}

/// Receives import progress. Implementations decide where it goes.
pub trait ImportProgress: Send + Sync {
    fn report(&self, event: ImportEvent);
}

pub struct NoProgress;

impl ImportProgress for NoProgress {
    fn report(&self, _event: ImportEvent) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub source: String,
    pub table: &'static str,
    pub rows_read: u64,
    /// Rows dropped by the region filter.
    pub rows_skipped: u64,
    pub rows_written: u64,
    pub batches: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported(ImportReport),
    /// No target schema matches the source name. Nothing was read.
    Unsupported { source: String },
}

/// Rewrite compact `YYYYMMDD` dates as `YYYY-MM-DD`. Other values pass
/// through unchanged.
pub fn normalize_date(value: &str) -> String {
    if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}-{}-{}", &value[..4], &value[4..6], &value[6..])
    } else {
        value.to_string()
    }
}

/// Map a raw record onto the schema's whitelist. Field names are matched
/// case-insensitively, values are decoded and trimmed, empty values become
/// `None`.
pub fn map_row(schema: TargetSchema, raw: &RawRow, codepage: Codepage) -> MappedRow {
    let mut row = MappedRow::with_capacity(raw.fields.len());
    for (name, bytes) in &raw.fields {
        let name = name.trim().to_lowercase();
        if name == DELETION_FLAG {
            continue;
        }
        let Some(col) = schema.accepted_column(&name) else {
            continue;
        };
        let decoded = codepage.decode(bytes);
        let value = decoded.trim();
        let value = if value.is_empty() {
            None
        } else if TargetSchema::is_date_column(col) {
            Some(normalize_date(value))
        } else {
            Some(value.to_string())
        };
        row.push((col, value));
    }
    row
}

/// Region codes compare numerically when both sides are numbers, so `"5"`
/// and `"05"` match.
fn same_region(value: &str, wanted: &str) -> bool {
    match (value.trim().parse::<i64>(), wanted.trim().parse::<i64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => value.trim() == wanted.trim(),
    }
}

pub struct Importer<'a, S: CatalogStore> {
    store: &'a S,
    options: ImportOptions,
    progress: &'a dyn ImportProgress,
}

impl<'a, S: CatalogStore> Importer<'a, S> {
    pub fn new(store: &'a S, options: ImportOptions, progress: &'a dyn ImportProgress) -> Self {
        Self {
            store,
            options,
            progress,
        }
    }

    fn keeps(&self, schema: TargetSchema, row: &MappedRow) -> bool {
        match &self.options.region_code {
            Some(wanted) if schema.accepts_region_filter() => {
                column(row, "regioncode").is_some_and(|code| same_region(code, wanted))
            }
            _ => true,
        }
    }

    /// Import one source. Unsupported names are reported, not failed.
    pub async fn import(&self, source: &mut dyn RowSource) -> Result<ImportOutcome> {
        let name = source.name().to_string();
        let Some(schema) = TargetSchema::for_file_name(&name) else {
            warn!(source = %name, "no target table for file, skipped");
            return Ok(ImportOutcome::Unsupported { source: name });
        };

        let total = source.total_rows();
        let batch_size = self.options.batch_size.max(1);
        info!(source = %name, table = schema.table(), total, batch_size, "import started");
        self.progress.report(ImportEvent::Started {
            source: name.clone(),
            schema,
            total,
        });

        let mut report = ImportReport {
            source: name.clone(),
            table: schema.table(),
            rows_read: 0,
            rows_skipped: 0,
            rows_written: 0,
            batches: 0,
        };
        let mut pending: Vec<MappedRow> = Vec::with_capacity(batch_size);

        while let Some(raw) = source
            .next_row()
            .with_context(|| format!("reading {} at record {}", name, report.rows_read + 1))?
        {
            report.rows_read += 1;
            let row = map_row(schema, &raw, self.options.codepage);
            if !self.keeps(schema, &row) {
                report.rows_skipped += 1;
                continue;
            }
            pending.push(row);
            if pending.len() >= batch_size {
                self.flush(schema, &mut pending, &mut report, total).await?;
            }
        }
        if !pending.is_empty() {
            self.flush(schema, &mut pending, &mut report, total).await?;
        }

        info!(
            source = %name,
            rows_read = report.rows_read,
            rows_written = report.rows_written,
            rows_skipped = report.rows_skipped,
            batches = report.batches,
            "import finished"
        );
        self.progress.report(ImportEvent::Finished {
            source: name,
            rows_written: report.rows_written,
            rows_skipped: report.rows_skipped,
        });
        Ok(ImportOutcome::Imported(report))
    }

    async fn flush(
        &self,
        schema: TargetSchema,
        pending: &mut Vec<MappedRow>,
        report: &mut ImportReport,
        total: Option<u64>,
    ) -> Result<()> {
        let batch = RowBatch {
            schema,
            rows: std::mem::take(pending),
        };
        let size = batch.rows.len() as u64;
        self.store
            .insert_batch(&batch)
            .await
            .with_context(|| format!("writing batch {} into {}", report.batches + 1, schema))?;
        report.batches += 1;
        report.rows_written += size;
        info!(table = schema.table(), size, written = report.rows_written, "batch committed");
        self.progress.report(ImportEvent::BatchCommitted {
            source: report.source.clone(),
            rows_read: report.rows_read,
            rows_written: report.rows_written,
            total,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::store::memory::InMemoryStore;

    struct VecSource {
        name: String,
        rows: std::vec::IntoIter<RawRow>,
        fail_at: Option<usize>,
        served: usize,
    }

    impl VecSource {
        fn new(name: &str, rows: Vec<RawRow>) -> Self {
            Self {
                name: name.to_string(),
                rows: rows.into_iter(),
                fail_at: None,
                served: 0,
            }
        }
    }

    impl RowSource for VecSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn total_rows(&self) -> Option<u64> {
            Some(self.rows.len() as u64)
        }

        fn next_row(&mut self) -> Result<Option<RawRow>> {
            if self.fail_at == Some(self.served) {
                anyhow::bail!("truncated record");
            }
            self.served += 1;
            Ok(self.rows.next())
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ImportEvent>>);

    impl ImportProgress for Recorder {
        fn report(&self, event: ImportEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn addrobj(i: usize, region: &str) -> RawRow {
        let mut row = RawRow::default();
        row.push("AOID", format!("id-{i}"));
        row.push("AOGUID", format!("guid-{i}"));
        row.push("FORMALNAME", "Ленина");
        row.push("SHORTNAME", "ул");
        row.push("AOLEVEL", "7");
        row.push("REGIONCODE", region);
        row.push("CURRSTATUS", "0");
        row.push("UPDATEDATE", "20190315");
        row.push("DELETED", "");
        row.push("SOMETHING_NEW", "x");
        row
    }

    fn utf8() -> ImportOptions {
        ImportOptions {
            codepage: Codepage::Utf8,
            ..ImportOptions::default()
        }
    }

    #[tokio::test]
    async fn rows_are_written_in_batches_with_a_final_remainder() {
        let store = InMemoryStore::new();
        let rows = (0..2500).map(|i| addrobj(i, "50")).collect();
        let mut source = VecSource::new("ADDROBJ.DBF", rows);

        let outcome = Importer::new(&store, utf8(), &NoProgress)
            .import(&mut source)
            .await
            .unwrap();
        let ImportOutcome::Imported(report) = outcome else {
            panic!("expected import");
        };
        assert_eq!(report.rows_written, 2500);
        assert_eq!(report.batches, 3);
        assert_eq!(store.batch_sizes(), vec![1000, 1000, 500]);
        assert!(store.element("id-2499").is_some());
    }

    #[tokio::test]
    async fn unknown_columns_and_deletion_flag_are_dropped() {
        let store = InMemoryStore::new();
        let mut source = VecSource::new("ADDROBJ.DBF", vec![addrobj(1, "50")]);
        Importer::new(&store, utf8(), &NoProgress)
            .import(&mut source)
            .await
            .unwrap();

        let rows = store.rows(TargetSchema::AddressElements);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert!(row.iter().all(|(col, _)| *col != "something_new" && *col != "deleted"));
        assert_eq!(column(row, "formalname"), Some("Ленина"));
        assert_eq!(column(row, "updatedate"), Some("2019-03-15"));
    }

    #[tokio::test]
    async fn region_filter_skips_other_regions() {
        let store = InMemoryStore::new();
        let mut source = VecSource::new(
            "ADDROBJ.DBF",
            vec![addrobj(1, "50"), addrobj(2, "77"), addrobj(3, "05"), addrobj(4, "")],
        );
        let options = ImportOptions {
            region_code: Some("5".into()),
            ..utf8()
        };
        let outcome = Importer::new(&store, options, &NoProgress)
            .import(&mut source)
            .await
            .unwrap();
        let ImportOutcome::Imported(report) = outcome else {
            panic!("expected import");
        };
        assert_eq!(report.rows_written, 1);
        assert_eq!(report.rows_skipped, 3);
        assert!(store.element("id-3").is_some());
    }

    #[tokio::test]
    async fn region_filter_ignores_house_files() {
        let store = InMemoryStore::new();
        let mut row = RawRow::default();
        row.push("HOUSEID", "h1");
        row.push("HOUSEGUID", "hg1");
        row.push("AOGUID", "s1");
        row.push("HOUSENUM", "9");
        let mut source = VecSource::new("HOUSE50.DBF", vec![row]);
        let options = ImportOptions {
            region_code: Some("77".into()),
            ..utf8()
        };
        Importer::new(&store, options, &NoProgress)
            .import(&mut source)
            .await
            .unwrap();
        assert_eq!(store.rows(TargetSchema::Houses).len(), 1);
    }

    #[tokio::test]
    async fn cp866_values_are_decoded() {
        let store = InMemoryStore::new();
        let mut row = RawRow::default();
        row.push("AOID", "a1");
        row.push("AOGUID", "g1");
        // "Мира" in CP866
        row.push("FORMALNAME", vec![0x8Cu8, 0xA8, 0xE0, 0xA0]);
        let mut source = VecSource::new("ADDROBJ.DBF", vec![row]);
        Importer::new(&store, ImportOptions::default(), &NoProgress)
            .import(&mut source)
            .await
            .unwrap();
        assert_eq!(store.element("a1").unwrap().formal_name, "Мира");
    }

    #[tokio::test]
    async fn unsupported_file_is_reported_not_failed() {
        let store = InMemoryStore::new();
        let mut source = VecSource::new("README.TXT", vec![addrobj(1, "50")]);
        let outcome = Importer::new(&store, utf8(), &NoProgress)
            .import(&mut source)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ImportOutcome::Unsupported {
                source: "README.TXT".into()
            }
        );
        assert!(store.batch_sizes().is_empty());
    }

    #[tokio::test]
    async fn read_error_keeps_committed_batches() {
        let store = InMemoryStore::new();
        let rows = (0..5).map(|i| addrobj(i, "50")).collect();
        let mut source = VecSource::new("ADDROBJ.DBF", rows);
        source.fail_at = Some(3);
        let options = ImportOptions {
            batch_size: 2,
            ..utf8()
        };

        let err = Importer::new(&store, options, &NoProgress)
            .import(&mut source)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("truncated record"));
        assert_eq!(store.batch_sizes(), vec![2]);
    }

    #[tokio::test]
    async fn progress_events_follow_batches() {
        let store = InMemoryStore::new();
        let rows = (0..3).map(|i| addrobj(i, "50")).collect();
        let mut source = VecSource::new("ADDROBJ.DBF", rows);
        let recorder = Recorder::default();
        let options = ImportOptions {
            batch_size: 2,
            ..utf8()
        };
        Importer::new(&store, options, &recorder)
            .import(&mut source)
            .await
            .unwrap();

        let events = recorder.0.lock().unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], ImportEvent::Started { total: Some(3), .. }));
        assert!(matches!(
            events[2],
            ImportEvent::BatchCommitted { rows_written: 3, .. }
        ));
        assert!(matches!(
            events[3],
            ImportEvent::Finished { rows_written: 3, rows_skipped: 0, .. }
        ));
    }

    #[test]
    fn compact_dates_are_expanded() {
        assert_eq!(normalize_date("20191231"), "2019-12-31");
        assert_eq!(normalize_date("2019-12-31"), "2019-12-31");
        assert_eq!(normalize_date("n/a"), "n/a");
    }
}
