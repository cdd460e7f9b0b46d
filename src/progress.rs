//! Import progress reporting.
//!
//! Reports observable progress during `fias import` so users see which file
//! is being loaded and how many rows are committed. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.

use std::io::Write;

use fias_catalog_core::import::{ImportEvent, ImportProgress, NoProgress};

/// Human-friendly progress on stderr: "import ADDROBJ.DBF  12,000 / 80,000 rows".
pub struct StderrProgress;

impl ImportProgress for StderrProgress {
    fn report(&self, event: ImportEvent) {
        let line = match &event {
            ImportEvent::Started { source, schema, .. } => {
                format!("import {}  -> {}\n", source, schema)
            }
            ImportEvent::BatchCommitted {
                source,
                rows_written,
                total,
                ..
            } => match total {
                Some(total) => format!(
                    "import {}  {} / {} rows\n",
                    source,
                    format_number(*rows_written),
                    format_number(*total)
                ),
                None => format!("import {}  {} rows\n", source, format_number(*rows_written)),
            },
            ImportEvent::Finished {
                source,
                rows_written,
                rows_skipped,
            } => format!(
                "import {}  done: {} written, {} skipped\n",
                source,
                format_number(*rows_written),
                format_number(*rows_skipped)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ImportProgress for JsonProgress {
    fn report(&self, event: ImportEvent) {
        let obj = match &event {
            ImportEvent::Started {
                source,
                schema,
                total,
            } => serde_json::json!({
                "event": "started",
                "source": source,
                "table": schema.table(),
                "total": total
            }),
            ImportEvent::BatchCommitted {
                source,
                rows_read,
                rows_written,
                total,
            } => serde_json::json!({
                "event": "batch",
                "source": source,
                "rows_read": rows_read,
                "rows_written": rows_written,
                "total": total
            }),
            ImportEvent::Finished {
                source,
                rows_written,
                rows_skipped,
            } => serde_json::json!({
                "event": "finished",
                "source": source,
                "rows_written": rows_written,
                "rows_skipped": rows_skipped
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn ImportProgress> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
