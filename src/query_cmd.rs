//! Read-only CLI commands. Every command prints one pretty JSON document on
//! stdout.

use anyhow::Result;
use fias_catalog_core::models::{AddressElement, House};
use fias_catalog_core::naming::{display_name, house_display_name};
use fias_catalog_core::query::{
    AddressQuery, ChildrenQuery, HouseListQuery, QueryEngine, SearchQuery,
};
use fias_catalog_core::search_index::SearchIndexBuilder;
use serde::Serialize;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn open_store(config: &Config) -> Result<SqliteStore> {
    Ok(SqliteStore::new(db::connect(config).await?))
}

pub async fn run_regions(config: &Config, name: Option<String>) -> Result<()> {
    let store = open_store(config).await?;
    let listing = QueryEngine::new(&store).regions(name).await?;
    print_json(&listing)
}

pub async fn run_children(
    config: &Config,
    parent_guid: &str,
    name: Option<String>,
    limit: Option<i64>,
    with_houses: bool,
) -> Result<()> {
    let store = open_store(config).await?;
    let listing = QueryEngine::new(&store)
        .list_children(&ChildrenQuery {
            parent_guid: parent_guid.to_string(),
            formal_name_filter: name,
            only_with_child_houses: with_houses,
            limit: Some(limit.unwrap_or(config.query.children_limit)),
        })
        .await?;
    print_json(&listing)
}

pub async fn run_houses(
    config: &Config,
    parent_guid: &str,
    number: Option<String>,
    limit: Option<i64>,
) -> Result<()> {
    let store = open_store(config).await?;
    let listing = QueryEngine::new(&store)
        .list_houses(&HouseListQuery {
            parent_guid: parent_guid.to_string(),
            number_filter: number,
            limit: Some(limit.unwrap_or(config.query.children_limit)),
        })
        .await?;
    print_json(&listing)
}

pub async fn run_address(config: &Config, mut query: AddressQuery) -> Result<()> {
    if query.limit.is_none() {
        query.limit = Some(config.query.default_limit);
    }
    let store = open_store(config).await?;
    let listing = QueryEngine::new(&store).find_address(&query).await?;
    print_json(&listing)
}

pub async fn run_search(config: &Config, mut query: SearchQuery) -> Result<()> {
    if query.limit.is_none() {
        query.limit = Some(config.query.default_limit);
    }
    let store = open_store(config).await?;
    let listing = QueryEngine::new(&store).search(&query).await?;
    print_json(&listing)
}

#[derive(Serialize)]
struct HouseDetails {
    house: House,
    name: String,
    full_address: String,
    /// Full address with the region part left out.
    local_address: String,
    street: Option<ElementSummary>,
    city: Option<ElementSummary>,
    region: Option<ElementSummary>,
    is_canonical: bool,
    alternate_guids: Vec<String>,
}

#[derive(Serialize)]
struct ElementSummary {
    guid: String,
    name: String,
}

impl From<AddressElement> for ElementSummary {
    fn from(element: AddressElement) -> Self {
        Self {
            name: display_name(&element),
            guid: element.guid,
        }
    }
}

/// One house with its resolved chain and the guids of its alternates.
/// Prints `null` when no record has the guid.
pub async fn run_house(
    config: &Config,
    house_guid: &str,
    exclude_self: bool,
    exclude_duplicates: bool,
) -> Result<()> {
    let store = open_store(config).await?;
    let engine = QueryEngine::new(&store);
    let Some(house) = engine.house(house_guid).await? else {
        return print_json(&Option::<HouseDetails>::None);
    };

    let resolver = engine.resolver();
    let name = house_display_name(&house);
    let local_path = match resolver.resolve_terminal(&house.aoguid).await? {
        Some(mut parent) => {
            SearchIndexBuilder::new(&store)
                .search_text_without_region(&mut parent)
                .await?
        }
        None => String::new(),
    };
    let local_address = [local_path, name.clone()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    let details = HouseDetails {
        name,
        local_address,
        full_address: resolver.full_address_string(&house).await?,
        street: resolver.street(&house).await?.map(Into::into),
        city: resolver.city(&house).await?.map(Into::into),
        region: resolver.region(&house).await?.map(Into::into),
        is_canonical: house.is_canonical(),
        alternate_guids: engine
            .alternate_guids(&house, !exclude_self, !exclude_duplicates)
            .await?,
        house,
    };
    print_json(&details)
}
