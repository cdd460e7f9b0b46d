//! SQLite store behind the query engine, search index and importer.

use anyhow::Result;
use chrono::NaiveDate;
use fias_catalog::config::{Config, DbConfig, ImportConfig, LogConfig, QueryConfig};
use fias_catalog::sqlite_store::SqliteStore;
use fias_catalog::{db, migrate};
use fias_catalog_core::codepage::Codepage;
use fias_catalog_core::import::{
    ImportOptions, ImportOutcome, Importer, NoProgress, RawRow, RowSource,
};
use fias_catalog_core::models::Level;
use fias_catalog_core::query::{
    AddressQuery, ChildrenQuery, ElementListQuery, HouseListQuery, QueryEngine, SearchQuery,
};
use fias_catalog_core::search_index::SearchIndexBuilder;
use fias_catalog_core::store::{CatalogStore, ElementFilter, HouseFilter, NameMatch};
use tempfile::TempDir;

struct Rows {
    name: String,
    rows: std::vec::IntoIter<RawRow>,
}

impl RowSource for Rows {
    fn name(&self) -> &str {
        &self.name
    }

    fn total_rows(&self) -> Option<u64> {
        Some(self.rows.len() as u64)
    }

    fn next_row(&mut self) -> Result<Option<RawRow>> {
        Ok(self.rows.next())
    }
}

fn row(fields: &[(&str, &str)]) -> RawRow {
    let mut raw = RawRow::default();
    for (name, value) in fields {
        raw.push(*name, *value);
    }
    raw
}

fn element(aoid: &str, aoguid: &str, parent: &str, level: &str, name: &str, short: &str) -> RawRow {
    revision(aoid, aoguid, parent, level, name, short, "0", "")
}

#[allow(clippy::too_many_arguments)]
fn revision(
    aoid: &str,
    aoguid: &str,
    parent: &str,
    level: &str,
    name: &str,
    short: &str,
    currstatus: &str,
    nextid: &str,
) -> RawRow {
    row(&[
        ("AOID", aoid),
        ("AOGUID", aoguid),
        ("PARENTGUID", parent),
        ("AOLEVEL", level),
        ("FORMALNAME", name),
        ("SHORTNAME", short),
        ("REGIONCODE", "50"),
        ("CURRSTATUS", currstatus),
        ("NEXTID", nextid),
    ])
}

fn house(id: &str, guid: &str, street: &str, number: &str, enddate: &str) -> RawRow {
    row(&[
        ("HOUSEID", id),
        ("HOUSEGUID", guid),
        ("AOGUID", street),
        ("HOUSENUM", number),
        ("ESTSTATUS", "2"),
        ("ENDDATE", enddate),
    ])
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

async fn open(tmp: &TempDir) -> SqliteStore {
    let config = Config {
        db: DbConfig {
            path: tmp.path().join("data").join("fias.sqlite"),
        },
        import: ImportConfig::default(),
        query: QueryConfig::default(),
        log: LogConfig::default(),
    };
    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    SqliteStore::new(pool)
}

async fn load(store: &SqliteStore, name: &str, rows: Vec<RawRow>) {
    let options = ImportOptions {
        codepage: Codepage::Utf8,
        batch_size: 2,
        ..ImportOptions::default()
    };
    let mut source = Rows {
        name: name.to_string(),
        rows: rows.into_iter(),
    };
    let outcome = Importer::new(store, options, &NoProgress)
        .import(&mut source)
        .await
        .unwrap();
    assert!(matches!(outcome, ImportOutcome::Imported(_)));
}

/// Region → city → two streets, a superseded street revision and houses.
async fn catalog(tmp: &TempDir) -> SqliteStore {
    let store = open(tmp).await;
    load(
        &store,
        "ADDROBJ.DBF",
        vec![
            element("r1", "R1", "", "1", "Московская", "обл"),
            element("c1", "C1", "R1", "4", "Химки", "г"),
            revision("s1-old", "S1", "C1", "7", "Старая", "ул", "1", "s1"),
            element("s1", "S1", "C1", "7", "Ленина", "ул"),
            element("s2", "S2", "C1", "7", "Ёлочная", "ул"),
        ],
    )
    .await;
    load(
        &store,
        "HOUSE50.DBF",
        vec![
            house("h1", "H1", "S1", "10А", "20790606"),
            house("h2", "H2", "S1", "9", ""),
            house("h3", "H3", "S1", "2", "20790606"),
            house("h4", "H4", "S1", "1", "20200101"),
            house("h5", "H5", "S2", "3", "20790606"),
        ],
    )
    .await;
    store.refresh_house_counts().await.unwrap();
    SearchIndexBuilder::new(&store).rebuild_all().await.unwrap();
    store
}

#[tokio::test]
async fn by_region_sorts_streets_then_house_numbers() {
    let tmp = TempDir::new().unwrap();
    let store = catalog(&tmp).await;
    let engine = QueryEngine::new(&store).with_today(today());

    let listing = engine.by_region("R1", 0, Some(50)).await.unwrap();
    let rows: Vec<(String, String)> = listing
        .items
        .iter()
        .map(|r| {
            (
                r.street.as_ref().unwrap().formal_name.clone(),
                r.house.house_number.clone(),
            )
        })
        .collect();
    assert_eq!(
        rows,
        vec![
            ("Ёлочная".to_string(), "3".to_string()),
            ("Ленина".to_string(), "2".to_string()),
            ("Ленина".to_string(), "9".to_string()),
            ("Ленина".to_string(), "10А".to_string()),
        ]
    );
    assert_eq!(listing.count_total, 4);
    assert_eq!(listing.items[1].house_name, "дом 2");
}

#[tokio::test]
async fn address_facade_pages_by_street() {
    let tmp = TempDir::new().unwrap();
    let store = catalog(&tmp).await;
    let engine = QueryEngine::new(&store).with_today(today());

    let page = engine
        .find_address(&AddressQuery {
            street_id: Some("S1".into()),
            offset: 1,
            limit: Some(1),
            ..AddressQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(page.count_total, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].house.house_number, "9");
    assert_eq!(page.items[0].region.as_ref().unwrap().guid, "R1");
}

#[tokio::test]
async fn search_text_is_persisted_for_every_level() {
    let tmp = TempDir::new().unwrap();
    let store = catalog(&tmp).await;

    let streets = store
        .find_elements(&ElementFilter::by_guid("S1").terminal())
        .await
        .unwrap();
    assert_eq!(streets.len(), 1);
    assert_eq!(
        streets[0].search_text.as_deref(),
        Some("Московская обл, Химки г, Ленина ул")
    );
    assert_eq!(
        streets[0].search_text_normalized.as_deref(),
        Some("МОСКОВСКАЯ ОБЛ, ХИМКИ Г, ЛЕНИНА УЛ")
    );
}

#[tokio::test]
async fn search_matches_tokens_loose_and_strict() {
    let tmp = TempDir::new().unwrap();
    let store = catalog(&tmp).await;
    let engine = QueryEngine::new(&store).with_today(today());

    let folded = engine
        .search(&SearchQuery {
            text: "химки, елочная".into(),
            ..SearchQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(folded.count_total, 1);
    assert_eq!(folded.items[0].id, "S2");

    let loose = engine
        .search(&SearchQuery {
            text: "Лен".into(),
            ..SearchQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(loose.count_total, 1);

    let strict = engine
        .search(&SearchQuery {
            text: "Лен".into(),
            strict: true,
            ..SearchQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(strict.count_total, 0);

    let cities = engine
        .search(&SearchQuery {
            text: "химки".into(),
            strict: true,
            level: Some(Level::City),
            ..SearchQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(cities.count_total, 1);
    assert_eq!(cities.items[0].id, "C1");
}

#[tokio::test]
async fn children_are_distinct_current_and_ordered() {
    let tmp = TempDir::new().unwrap();
    let store = catalog(&tmp).await;
    // the same lineage delivered again by a second extract
    load(
        &store,
        "ADDROBJ.DBF",
        vec![element("s1", "S1", "C1", "7", "Ленина", "ул")],
    )
    .await;
    let engine = QueryEngine::new(&store).with_today(today());

    let children = engine
        .list_children(&ChildrenQuery {
            parent_guid: "C1".into(),
            ..ChildrenQuery::default()
        })
        .await
        .unwrap();
    let titles: Vec<&str> = children.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Ёлочная ул", "Ленина ул"]);
    assert_eq!(children.count_total, 2);

    let filtered = engine
        .list_children(&ChildrenQuery {
            parent_guid: "C1".into(),
            formal_name_filter: Some("ЁЛОЧ".into()),
            ..ChildrenQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(filtered.items.len(), 1);
    assert_eq!(filtered.items[0].id, "S2");

    let exact = store
        .find_elements(&ElementFilter {
            name: Some(NameMatch::exact(" елочная ")),
            ..ElementFilter::by_parent("C1")
        })
        .await
        .unwrap();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].guid, "S2");
    let partial = store
        .find_elements(&ElementFilter {
            name: Some(NameMatch::exact("елоч")),
            ..ElementFilter::default()
        })
        .await
        .unwrap();
    assert!(partial.is_empty());
}

#[tokio::test]
async fn houses_listing_skips_expired_and_sorts_naturally() {
    let tmp = TempDir::new().unwrap();
    let store = catalog(&tmp).await;
    let engine = QueryEngine::new(&store).with_today(today());

    let houses = engine
        .list_houses(&HouseListQuery {
            parent_guid: "S1".into(),
            number_filter: Some("*".into()),
            ..HouseListQuery::default()
        })
        .await
        .unwrap();
    let numbers: Vec<&str> = houses
        .items
        .iter()
        .map(|h| h.house.house_number.as_str())
        .collect();
    assert_eq!(numbers, vec!["2", "9", "10А"]);

    let by_number = engine
        .list_houses(&HouseListQuery {
            parent_guid: "S1".into(),
            number_filter: Some("а".into()),
            ..HouseListQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(by_number.items.len(), 1);
    assert_eq!(by_number.items[0].id, "H1");
}

#[tokio::test]
async fn house_counts_and_child_house_filter() {
    let tmp = TempDir::new().unwrap();
    let store = catalog(&tmp).await;
    let engine = QueryEngine::new(&store).with_today(today());

    let streets = engine
        .list_elements(&ElementListQuery {
            level: Some(Level::Street),
            only_with_child_houses: true,
            ..ElementListQuery::default()
        })
        .await
        .unwrap();
    let counts: Vec<(String, i64)> = streets
        .items
        .iter()
        .map(|i| (i.id.clone(), i.element.house_count))
        .collect();
    assert_eq!(counts, vec![("S2".to_string(), 1), ("S1".to_string(), 4)]);

    let cities = engine
        .list_elements(&ElementListQuery {
            level: Some(Level::City),
            only_with_child_houses: true,
            ..ElementListQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(cities.count_total, 0);
}

#[tokio::test]
async fn empty_sets_and_unknown_guids_yield_empty_results() {
    let tmp = TempDir::new().unwrap();
    let store = catalog(&tmp).await;

    let filter = ElementFilter {
        guids: Some(Vec::new()),
        ..ElementFilter::default()
    };
    assert!(store.find_elements(&filter).await.unwrap().is_empty());
    assert_eq!(store.count_elements(&filter).await.unwrap(), 0);
    let houses = store
        .find_houses(&HouseFilter {
            aoguids: Some(Vec::new()),
            ..HouseFilter::default()
        })
        .await
        .unwrap();
    assert!(houses.is_empty());

    let engine = QueryEngine::new(&store).with_today(today());
    let listing = engine.by_city("NOPE", 0, None).await.unwrap();
    assert_eq!(listing.count_total, 0);
}

#[tokio::test]
async fn alternate_guids_follow_external_registry_links() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;
    load(
        &store,
        "HOUSE50.DBF",
        vec![
            house("h1", "H1", "S1", "1", ""),
            row(&[
                ("HOUSEID", "g1"),
                ("HOUSEGUID", "G1"),
                ("AOGUID", "S1"),
                ("HOUSENUM", "1"),
                ("GISGKH", "1"),
                ("GISGKH_GUID", "H1"),
            ]),
        ],
    )
    .await;
    let engine = QueryEngine::new(&store).with_today(today());
    let target = engine.house("H1").await.unwrap().unwrap();

    let all = engine.alternate_guids(&target, true, true).await.unwrap();
    assert_eq!(all, vec!["H1", "G1"]);
    let canonical = engine.alternate_guids(&target, true, false).await.unwrap();
    assert_eq!(canonical, vec!["H1"]);
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp).await;
    migrate::apply(store.pool()).await.unwrap();
    let counts = fias_catalog::stats::table_counts(store.pool()).await.unwrap();
    assert_eq!(counts.len(), 19);
    assert!(counts.iter().all(|(_, n)| *n == 0));
}
