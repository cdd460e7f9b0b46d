//! # FIAS Catalog CLI (`fias`)
//!
//! The `fias` binary loads classifier extracts into a local SQLite catalog
//! and answers hierarchy, listing and search queries over it.
//!
//! ## Usage
//!
//! ```bash
//! fias --config ./config/fias.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fias init` | Create the SQLite database and all tables |
//! | `fias import <files..>` | Load tabular dumps of extract files |
//! | `fias index` | Refresh house counts and build missing search texts |
//! | `fias regions` | List regions |
//! | `fias children <guid>` | List the current children of an element |
//! | `fias houses <guid>` | List the houses of an element |
//! | `fias address` | List houses by region, city, street or house |
//! | `fias search "<text>"` | Search address elements by free text |
//! | `fias house <guid>` | Show one house with its chain and alternates |
//! | `fias stats` | Row counts and index coverage |
//!
//! Query commands print JSON on stdout. Logs and progress go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use fias_catalog::import_cmd::{self, ImportOverrides};
use fias_catalog::progress::ProgressMode;
use fias_catalog::{config, logging, migrate, query_cmd, stats};
use fias_catalog_core::codepage::Codepage;
use fias_catalog_core::models::Level;
use fias_catalog_core::query::{AddressQuery, SearchQuery};

/// FIAS Catalog CLI: a local address classifier catalog.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "fias",
    about = "A local address classifier catalog: import, hierarchy and search",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/fias.toml")]
    config: PathBuf,

    /// Import progress on stderr. Defaults to `human` on a terminal.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Import tabular dumps of extract files.
    ///
    /// The target table is chosen from the file name with any trailing
    /// `.csv` removed, e.g. `ADDROBJ.DBF.csv` loads into `fias_addrobj`.
    /// Files that match no table are reported and skipped.
    Import {
        /// Files to import, in order.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Keep only address elements of this region code.
        #[arg(long)]
        region: Option<String>,

        /// Source encoding: cp866 or utf8.
        #[arg(long)]
        encoding: Option<Codepage>,

        /// Rows per transaction.
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Refresh house counts and compute missing search texts.
    Index,

    /// List regions.
    Regions {
        /// Case-insensitive substring of the region name.
        #[arg(long)]
        name: Option<String>,
    },

    /// List the current children of an address element.
    Children {
        parent_guid: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        limit: Option<i64>,

        /// Only children with houses registered directly under them.
        #[arg(long)]
        with_houses: bool,
    },

    /// List the houses of an address element in natural number order.
    Houses {
        parent_guid: String,

        /// Substring of the house number; `*` lists all.
        #[arg(long)]
        number: Option<String>,

        #[arg(long)]
        limit: Option<i64>,
    },

    /// List houses with their street, city and region.
    Address {
        #[arg(long)]
        region_id: Option<String>,

        #[arg(long)]
        city_id: Option<String>,

        #[arg(long)]
        street_id: Option<String>,

        #[arg(long)]
        house_guid: Option<String>,

        /// Exact house number; requires --street-id.
        #[arg(long)]
        house_number: Option<String>,

        #[arg(long, default_value_t = 0)]
        offset: i64,

        /// Page size; 0 returns every row.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Search address elements by free text.
    Search {
        text: String,

        /// Match whole words only.
        #[arg(long)]
        strict: bool,

        /// Restrict to one hierarchy level code.
        #[arg(long)]
        level: Option<i64>,

        #[arg(long)]
        region_code: Option<String>,

        #[arg(long, default_value_t = 0)]
        offset: i64,

        #[arg(long)]
        limit: Option<i64>,
    },

    /// Show one house with its address chain and alternate guids.
    House {
        house_guid: String,

        /// Leave the house's own guid out of the alternates.
        #[arg(long)]
        exclude_self: bool,

        /// Leave inactive and duplicate records out of the alternates.
        #[arg(long)]
        exclude_duplicates: bool,
    },

    /// Show row counts and index coverage.
    Stats,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.log);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import {
            files,
            region,
            encoding,
            batch_size,
        } => {
            let mode = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);
            let reporter = mode.reporter();
            let overrides = ImportOverrides {
                region,
                encoding,
                batch_size,
            };
            import_cmd::run_import(&cfg, &files, &overrides, reporter.as_ref()).await?;
        }
        Commands::Index => {
            import_cmd::run_index(&cfg).await?;
        }
        Commands::Regions { name } => {
            query_cmd::run_regions(&cfg, name).await?;
        }
        Commands::Children {
            parent_guid,
            name,
            limit,
            with_houses,
        } => {
            query_cmd::run_children(&cfg, &parent_guid, name, limit, with_houses).await?;
        }
        Commands::Houses {
            parent_guid,
            number,
            limit,
        } => {
            query_cmd::run_houses(&cfg, &parent_guid, number, limit).await?;
        }
        Commands::Address {
            region_id,
            city_id,
            street_id,
            house_guid,
            house_number,
            offset,
            limit,
        } => {
            let query = AddressQuery {
                region_id,
                city_id,
                street_id,
                house_guid,
                house_number,
                offset,
                limit,
            };
            query_cmd::run_address(&cfg, query).await?;
        }
        Commands::Search {
            text,
            strict,
            level,
            region_code,
            offset,
            limit,
        } => {
            let query = SearchQuery {
                text,
                strict,
                level: level.map(Level::from_code),
                region_code,
                offset,
                limit,
            };
            query_cmd::run_search(&cfg, query).await?;
        }
        Commands::House {
            house_guid,
            exclude_self,
            exclude_duplicates,
        } => {
            query_cmd::run_house(&cfg, &house_guid, exclude_self, exclude_duplicates).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
