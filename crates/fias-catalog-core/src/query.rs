//! Hierarchical address listing and free-text search.
//!
//! The engine composes [`CatalogStore`] predicates with the terminal-revision
//! rule: every hop of a street → city → region chain is resolved to the
//! lineage's terminal revision. Listings return a [`Listing`] envelope with
//! the total match count computed over the same filter without paging.
//!
//! # Ordering
//!
//! Address rows sort by region, city and street normalized formal name,
//! then by [`NaturalKey`] of the house number. Missing chain members sort
//! last. Rows that tie on every key keep storage order.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::hierarchy::HierarchyResolver;
use crate::models::{AddressElement, House, Level, Listing};
use crate::naming::{house_display_name, label};
use crate::normalize::{cmp_nulls_last, normalize, tokenize, NaturalKey};
use crate::store::{CatalogStore, ElementFilter, HouseFilter, NameMatch, SearchToken};

pub const DEFAULT_LIMIT: i64 = 50;
pub const DEFAULT_CHILDREN_LIMIT: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The request is missing the filter that would identify what to list.
    #[error("invalid query: {0}")]
    Usage(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type QueryResult<T> = Result<T, QueryError>;

fn default_limit() -> Option<i64> {
    Some(DEFAULT_LIMIT)
}

/// Address listing parameters, keyed like the query facade.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressQuery {
    /// List every house three levels below this region guid.
    pub region_id: Option<String>,
    /// List every house two levels below this city guid.
    pub city_id: Option<String>,
    /// List the houses of this street guid. With `house_number`, look up
    /// one house on it.
    pub street_id: Option<String>,
    /// Look up one house lineage.
    pub house_guid: Option<String>,
    /// Exact house number, used together with `street_id`.
    pub house_number: Option<String>,
    #[serde(default)]
    pub offset: i64,
    /// Page size; `None` or `0` returns every row.
    #[serde(default = "default_limit")]
    pub limit: Option<i64>,
}

impl Default for AddressQuery {
    fn default() -> Self {
        Self {
            region_id: None,
            city_id: None,
            street_id: None,
            house_guid: None,
            house_number: None,
            offset: 0,
            limit: default_limit(),
        }
    }
}

/// Children of one element.
#[derive(Debug, Clone, Default)]
pub struct ChildrenQuery {
    pub parent_guid: String,
    /// Case-insensitive substring of the formal name.
    pub formal_name_filter: Option<String>,
    /// Only children with houses registered directly under them.
    pub only_with_child_houses: bool,
    /// Defaults to [`DEFAULT_CHILDREN_LIMIT`].
    pub limit: Option<i64>,
}

/// Houses of one element.
#[derive(Debug, Clone, Default)]
pub struct HouseListQuery {
    pub parent_guid: String,
    /// Case-insensitive substring of the house number; `*` means no filter.
    pub number_filter: Option<String>,
    /// Defaults to [`DEFAULT_CHILDREN_LIMIT`].
    pub limit: Option<i64>,
}

/// Flat listing of terminal elements.
#[derive(Debug, Clone, Default)]
pub struct ElementListQuery {
    pub level: Option<Level>,
    pub formal_name_filter: Option<String>,
    pub only_with_child_houses: bool,
    pub offset: i64,
    pub limit: Option<i64>,
}

/// Free-text search over the denormalized search text.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub text: String,
    /// Match whole words only.
    pub strict: bool,
    pub level: Option<Level>,
    pub region_code: Option<String>,
    pub offset: i64,
    /// Defaults to [`DEFAULT_LIMIT`].
    pub limit: Option<i64>,
}

/// A house with its resolved street, city and region revisions.
#[derive(Debug, Clone, Serialize)]
pub struct AddressRow {
    pub house: House,
    pub house_name: String,
    pub street: Option<AddressElement>,
    pub city: Option<AddressElement>,
    pub region: Option<AddressElement>,
}

/// Listing entry for an address element.
#[derive(Debug, Clone, Serialize)]
pub struct ElementItem {
    pub id: String,
    pub title: String,
    pub element: AddressElement,
}

/// Listing entry for a house.
#[derive(Debug, Clone, Serialize)]
pub struct HouseItem {
    pub id: String,
    pub title: String,
    pub house: House,
}

#[derive(PartialEq, Eq)]
struct RowKey {
    region: Option<String>,
    city: Option<String>,
    street: Option<String>,
    house: NaturalKey,
}

impl RowKey {
    fn of(row: &AddressRow) -> Self {
        let name = |e: &Option<AddressElement>| e.as_ref().map(|e| normalize(&e.formal_name));
        Self {
            region: name(&row.region),
            city: name(&row.city),
            street: name(&row.street),
            house: NaturalKey::new(&row.house.house_number),
        }
    }
}

impl Ord for RowKey {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_nulls_last(self.region.as_deref(), other.region.as_deref())
            .then_with(|| cmp_nulls_last(self.city.as_deref(), other.city.as_deref()))
            .then_with(|| cmp_nulls_last(self.street.as_deref(), other.street.as_deref()))
            .then_with(|| self.house.cmp(&other.house))
    }
}

impl PartialOrd for RowKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn effective_limit(limit: Option<i64>) -> Option<usize> {
    match limit {
        Some(n) if n > 0 => Some(n as usize),
        _ => None,
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Sort, deduplicate by house guid, count and page.
fn into_listing(rows: Vec<AddressRow>, offset: i64, limit: Option<i64>) -> Listing<AddressRow> {
    let mut seen = HashSet::new();
    let mut keyed: Vec<(RowKey, AddressRow)> = rows
        .into_iter()
        .filter(|row| seen.insert(row.house.house_guid.clone()))
        .map(|row| (RowKey::of(&row), row))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let count_total = keyed.len() as i64;
    let items = keyed
        .into_iter()
        .map(|(_, row)| row)
        .skip(offset.max(0) as usize)
        .take(effective_limit(limit).unwrap_or(usize::MAX))
        .collect();
    Listing {
        items,
        count_total,
        offset,
    }
}

pub struct QueryEngine<'a, S: CatalogStore> {
    store: &'a S,
    resolver: HierarchyResolver<'a, S>,
    today: NaiveDate,
}

impl<'a, S: CatalogStore> QueryEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            resolver: HierarchyResolver::new(store),
            today: Utc::now().date_naive(),
        }
    }

    /// Fix the date house validity is evaluated against.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn resolver(&self) -> &HierarchyResolver<'a, S> {
        &self.resolver
    }

    /// Terminal revisions of the given lineages, first per guid.
    async fn terminal_by_guid(&self, guids: Vec<String>) -> QueryResult<HashMap<String, AddressElement>> {
        let filter = ElementFilter {
            guids: Some(guids),
            terminal_only: true,
            ..ElementFilter::default()
        };
        Ok(first_per_guid(self.store.find_elements(&filter).await?))
    }

    /// Terminal revisions whose parent is one of `parents`, first per guid.
    async fn terminal_children(
        &self,
        parents: Vec<String>,
    ) -> QueryResult<HashMap<String, AddressElement>> {
        let filter = ElementFilter {
            parent_guids: Some(parents),
            terminal_only: true,
            ..ElementFilter::default()
        };
        Ok(first_per_guid(self.store.find_elements(&filter).await?))
    }

    async fn optional_terminal(&self, guid: Option<&str>) -> QueryResult<Option<AddressElement>> {
        match guid.filter(|g| !g.is_empty()) {
            Some(g) => Ok(self.resolver.resolve_terminal(g).await?),
            None => Ok(None),
        }
    }

    /// Houses whose street's parent's parent is `region_id`.
    pub async fn by_region(
        &self,
        region_id: &str,
        offset: i64,
        limit: Option<i64>,
    ) -> QueryResult<Listing<AddressRow>> {
        let regions = self.terminal_by_guid(vec![region_id.to_string()]).await?;
        let Some(region) = regions.get(region_id) else {
            return Ok(Listing::empty(offset));
        };
        let cities = self.terminal_children(vec![region_id.to_string()]).await?;
        let streets = self.terminal_children(cities.keys().cloned().collect()).await?;
        let houses = self
            .store
            .find_houses(&HouseFilter {
                aoguids: Some(streets.keys().cloned().collect()),
                valid_on: Some(self.today),
                ..HouseFilter::default()
            })
            .await?;

        let rows = houses
            .into_iter()
            .filter_map(|house| {
                let street = streets.get(&house.aoguid)?;
                let city = cities.get(street.parent_guid.as_deref()?)?;
                Some(AddressRow {
                    house_name: house_display_name(&house),
                    street: Some(street.clone()),
                    city: Some(city.clone()),
                    region: Some(region.clone()),
                    house,
                })
            })
            .collect();
        Ok(into_listing(rows, offset, limit))
    }

    /// Houses whose street's parent is `city_id`. The city must have a
    /// terminal parent.
    pub async fn by_city(
        &self,
        city_id: &str,
        offset: i64,
        limit: Option<i64>,
    ) -> QueryResult<Listing<AddressRow>> {
        let Some(city) = self.resolver.resolve_terminal(city_id).await? else {
            return Ok(Listing::empty(offset));
        };
        let Some(region) = self.optional_terminal(city.parent_guid.as_deref()).await? else {
            return Ok(Listing::empty(offset));
        };
        let streets = self.terminal_children(vec![city_id.to_string()]).await?;
        let houses = self
            .store
            .find_houses(&HouseFilter {
                aoguids: Some(streets.keys().cloned().collect()),
                valid_on: Some(self.today),
                ..HouseFilter::default()
            })
            .await?;

        let rows = houses
            .into_iter()
            .filter_map(|house| {
                let street = streets.get(&house.aoguid)?;
                Some(AddressRow {
                    house_name: house_display_name(&house),
                    street: Some(street.clone()),
                    city: Some(city.clone()),
                    region: Some(region.clone()),
                    house,
                })
            })
            .collect();
        Ok(into_listing(rows, offset, limit))
    }

    /// Active, valid houses registered directly under `street_id`. City and
    /// region are attached when resolvable.
    pub async fn by_street(
        &self,
        street_id: &str,
        offset: i64,
        limit: Option<i64>,
    ) -> QueryResult<Listing<AddressRow>> {
        let street = match self.resolver.resolve_terminal(street_id).await? {
            Some(street) => street,
            None => {
                let mut any = self
                    .store
                    .find_elements(&ElementFilter {
                        limit: Some(1),
                        ..ElementFilter::by_guid(street_id)
                    })
                    .await?;
                if any.is_empty() {
                    return Ok(Listing::empty(offset));
                }
                any.swap_remove(0)
            }
        };
        let city = self.optional_terminal(street.parent_guid.as_deref()).await?;
        let region = match &city {
            Some(city) => self.optional_terminal(city.parent_guid.as_deref()).await?,
            None => None,
        };
        let houses = self
            .store
            .find_houses(&HouseFilter {
                aoguids: Some(vec![street_id.to_string()]),
                valid_on: Some(self.today),
                active_only: true,
                ..HouseFilter::default()
            })
            .await?;

        let rows = houses
            .into_iter()
            .map(|house| AddressRow {
                house_name: house_display_name(&house),
                street: Some(street.clone()),
                city: city.clone(),
                region: region.clone(),
                house,
            })
            .collect();
        Ok(into_listing(rows, offset, limit))
    }

    /// One house, by guid or by number on a street.
    pub async fn by_house(&self, query: &AddressQuery) -> QueryResult<Listing<AddressRow>> {
        let filter = if let Some(guid) = non_empty(&query.house_guid) {
            HouseFilter {
                house_guids: Some(vec![guid.to_string()]),
                ..HouseFilter::default()
            }
        } else if let (Some(number), Some(street)) =
            (non_empty(&query.house_number), non_empty(&query.street_id))
        {
            HouseFilter {
                aoguids: Some(vec![street.to_string()]),
                house_number: Some(number.to_string()),
                ..HouseFilter::default()
            }
        } else {
            return Err(QueryError::Usage(
                "house lookup needs houseGuid, or houseNumber together with streetId".into(),
            ));
        };
        let houses = self
            .store
            .find_houses(&HouseFilter {
                valid_on: Some(self.today),
                ..filter
            })
            .await?;

        let mut rows = Vec::with_capacity(houses.len());
        for house in houses {
            let street = self.optional_terminal(Some(&house.aoguid)).await?;
            let city = match &street {
                Some(s) => self.optional_terminal(s.parent_guid.as_deref()).await?,
                None => None,
            };
            let region = match &city {
                Some(c) => self.optional_terminal(c.parent_guid.as_deref()).await?,
                None => None,
            };
            rows.push(AddressRow {
                house_name: house_display_name(&house),
                street,
                city,
                region,
                house,
            });
        }
        Ok(into_listing(rows, query.offset, query.limit))
    }

    /// Dispatch on the most specific filter present: house, street, city,
    /// region.
    pub async fn find_address(&self, query: &AddressQuery) -> QueryResult<Listing<AddressRow>> {
        if non_empty(&query.house_guid).is_some()
            || (non_empty(&query.house_number).is_some() && non_empty(&query.street_id).is_some())
        {
            return self.by_house(query).await;
        }
        if let Some(street) = non_empty(&query.street_id) {
            return self.by_street(street, query.offset, query.limit).await;
        }
        if let Some(city) = non_empty(&query.city_id) {
            return self.by_city(city, query.offset, query.limit).await;
        }
        if let Some(region) = non_empty(&query.region_id) {
            return self.by_region(region, query.offset, query.limit).await;
        }
        Err(QueryError::Usage(
            "one of regionId, cityId, streetId or houseGuid is required".into(),
        ))
    }

    /// Terminal, active children of an element, one per lineage, by name.
    pub async fn list_children(&self, query: &ChildrenQuery) -> QueryResult<Listing<ElementItem>> {
        let filter = ElementFilter {
            terminal_only: true,
            active_only: true,
            with_child_houses: query.only_with_child_houses,
            name: non_empty(&query.formal_name_filter).map(NameMatch::contains),
            distinct_guid: true,
            order_by_name: true,
            limit: Some(query.limit.unwrap_or(DEFAULT_CHILDREN_LIMIT)),
            ..ElementFilter::by_parent(&query.parent_guid)
        };
        self.element_listing(filter).await
    }

    /// Terminal elements, optionally of one level, by name.
    pub async fn list_elements(
        &self,
        query: &ElementListQuery,
    ) -> QueryResult<Listing<ElementItem>> {
        let filter = ElementFilter {
            level: query.level,
            terminal_only: true,
            with_child_houses: query.only_with_child_houses,
            name: non_empty(&query.formal_name_filter).map(NameMatch::contains),
            order_by_name: true,
            offset: query.offset,
            limit: query.limit,
            ..ElementFilter::default()
        };
        self.element_listing(filter).await
    }

    pub async fn regions(&self, name_filter: Option<String>) -> QueryResult<Listing<ElementItem>> {
        self.list_elements(&ElementListQuery {
            level: Some(Level::Region),
            formal_name_filter: name_filter,
            ..ElementListQuery::default()
        })
        .await
    }

    async fn element_listing(&self, filter: ElementFilter) -> QueryResult<Listing<ElementItem>> {
        let count_total = self.store.count_elements(&filter).await?;
        let items = self
            .store
            .find_elements(&filter)
            .await?
            .into_iter()
            .map(|element| ElementItem {
                id: element.guid.clone(),
                title: label(&element),
                element,
            })
            .collect();
        Ok(Listing {
            items,
            count_total,
            offset: filter.offset,
        })
    }

    /// Valid houses of an element in natural house-number order.
    pub async fn list_houses(&self, query: &HouseListQuery) -> QueryResult<Listing<HouseItem>> {
        let parent_exists = !self
            .store
            .find_elements(&ElementFilter {
                limit: Some(1),
                ..ElementFilter::by_guid(&query.parent_guid)
            })
            .await?
            .is_empty();
        if !parent_exists {
            return Ok(Listing::empty(0));
        }

        let number_contains = non_empty(&query.number_filter)
            .filter(|f| *f != "*")
            .map(normalize);
        let mut houses = self
            .store
            .find_houses(&HouseFilter {
                aoguids: Some(vec![query.parent_guid.clone()]),
                valid_on: Some(self.today),
                number_contains,
                ..HouseFilter::default()
            })
            .await?;
        houses.sort_by_cached_key(|h| NaturalKey::new(&h.house_number));

        let count_total = houses.len() as i64;
        let limit = effective_limit(Some(query.limit.unwrap_or(DEFAULT_CHILDREN_LIMIT)));
        let items = houses
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|house| HouseItem {
                id: house.house_guid.clone(),
                title: house_display_name(&house),
                house,
            })
            .collect();
        Ok(Listing {
            items,
            count_total,
            offset: 0,
        })
    }

    /// Elements whose search text contains every query token.
    pub async fn search(&self, query: &SearchQuery) -> QueryResult<Listing<ElementItem>> {
        let tokens = tokenize(&query.text);
        if tokens.is_empty() {
            return Ok(Listing::empty(query.offset));
        }
        let filter = ElementFilter {
            search: tokens
                .into_iter()
                .map(|text| SearchToken {
                    text,
                    strict: query.strict,
                })
                .collect(),
            level: query.level,
            region_code: query.region_code.clone(),
            terminal_only: true,
            order_by_name: true,
            offset: query.offset,
            limit: Some(query.limit.unwrap_or(DEFAULT_LIMIT)),
            ..ElementFilter::default()
        };
        self.element_listing(filter).await
    }

    /// Current record of a house lineage, preferring one valid today.
    pub async fn house(&self, house_guid: &str) -> QueryResult<Option<House>> {
        let houses = self
            .store
            .find_houses(&HouseFilter {
                house_guids: Some(vec![house_guid.to_string()]),
                ..HouseFilter::default()
            })
            .await?;
        let today = self.today;
        let valid = houses.iter().position(|h| h.is_valid_on(today));
        Ok(match valid {
            Some(i) => houses.into_iter().nth(i),
            None => houses.into_iter().next(),
        })
    }

    /// Guids of every record that denotes the same building as `house`,
    /// across this registry and the linked external one.
    ///
    /// Without `include_self`, only records linked to `house` and carrying
    /// another guid are returned. Without `include_duplicates`, inactive
    /// records and external copies pointing elsewhere are dropped.
    pub async fn alternate_guids(
        &self,
        house: &House,
        include_self: bool,
        include_duplicates: bool,
    ) -> QueryResult<Vec<String>> {
        let guid = house.house_guid.as_str();
        let linked = self
            .store
            .find_houses(&HouseFilter {
                linked_to: Some(guid.to_string()),
                ..HouseFilter::default()
            })
            .await?;

        let mut seen = HashSet::new();
        Ok(linked
            .into_iter()
            .filter(|h| {
                include_self
                    || (h.house_guid != guid
                        && (h.external_guid.as_deref() == Some(guid)
                            || h.fias_house_guid.as_deref() == Some(guid)))
            })
            .filter(|h| {
                include_duplicates
                    || (h.is_active
                        && (!h.is_from_external_registry
                            || h.external_guid
                                .as_deref()
                                .map_or(true, |g| g.is_empty() || g == h.house_guid)))
            })
            .map(|h| h.house_guid)
            .filter(|g| seen.insert(g.clone()))
            .collect())
    }
}

fn first_per_guid(elements: Vec<AddressElement>) -> HashMap<String, AddressElement> {
    let mut by_guid = HashMap::new();
    for element in elements {
        by_guid.entry(element.guid.clone()).or_insert(element);
    }
    by_guid
}
