//! Storage abstraction for the catalog.
//!
//! The [`CatalogStore`] trait is pure data access: composable filter
//! predicates in, materialized records out. Hierarchy walking, naming and
//! ordering rules live in the components built on top of it.
//!
//! Name predicates never touch the raw display name. Query text is
//! normalized with [`normalize`](crate::normalize::normalize) when the
//! filter is built, and stores compare it against columns normalized at
//! write time.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{AddressElement, House, Level};
use crate::normalize::normalize;
use crate::schema::{MappedRow, TargetSchema};

/// Name predicate over the normalized formal name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameMatch {
    Exact(String),
    Contains(String),
}

impl NameMatch {
    pub fn exact(query: &str) -> Self {
        NameMatch::Exact(normalize(query.trim()))
    }

    pub fn contains(query: &str) -> Self {
        NameMatch::Contains(normalize(query.trim()))
    }

    pub fn matches(&self, normalized_name: &str) -> bool {
        match self {
            NameMatch::Exact(q) => normalized_name == q,
            NameMatch::Contains(q) => normalized_name.contains(q.as_str()),
        }
    }
}

/// One query token that must occur in the normalized search text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchToken {
    /// Normalized token text.
    pub text: String,
    /// Require word boundaries around the token instead of a substring hit.
    pub strict: bool,
}

/// Predicates over address-element revisions. Every set field narrows the
/// result; an unset field does not filter.
#[derive(Debug, Clone, Default)]
pub struct ElementFilter {
    /// Lineage guid in this set. An empty set matches nothing.
    pub guids: Option<Vec<String>>,
    /// Parent guid in this set. An empty set matches nothing.
    pub parent_guids: Option<Vec<String>>,
    pub level: Option<Level>,
    pub region_code: Option<String>,
    /// Only elements with `house_count > 0`.
    pub with_child_houses: bool,
    /// Only terminal revisions.
    pub terminal_only: bool,
    /// Only elements not deactivated.
    pub active_only: bool,
    pub name: Option<NameMatch>,
    /// All tokens must match the normalized search text.
    pub search: Vec<SearchToken>,
    /// Keep the first revision (in storage order) of each guid.
    pub distinct_guid: bool,
    /// Order by normalized formal name, ties in storage order. Otherwise
    /// storage order.
    pub order_by_name: bool,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl ElementFilter {
    pub fn by_guid(guid: &str) -> Self {
        Self {
            guids: Some(vec![guid.to_string()]),
            ..Self::default()
        }
    }

    pub fn by_parent(parent_guid: &str) -> Self {
        Self {
            parent_guids: Some(vec![parent_guid.to_string()]),
            ..Self::default()
        }
    }

    pub fn terminal(mut self) -> Self {
        self.terminal_only = true;
        self
    }

    /// Whether an element satisfies every predicate except paging,
    /// ordering and distinctness. Shared by in-process store
    /// implementations.
    pub fn matches(&self, element: &AddressElement, normalized_name: &str) -> bool {
        if let Some(guids) = &self.guids {
            if !guids.iter().any(|g| *g == element.guid) {
                return false;
            }
        }
        if let Some(parents) = &self.parent_guids {
            match &element.parent_guid {
                Some(p) if parents.iter().any(|g| g == p) => {}
                _ => return false,
            }
        }
        if let Some(level) = self.level {
            if element.level != level {
                return false;
            }
        }
        if let Some(code) = &self.region_code {
            if element.region_code.as_deref() != Some(code.as_str()) {
                return false;
            }
        }
        if self.with_child_houses && element.house_count <= 0 {
            return false;
        }
        if self.terminal_only && !element.is_terminal() {
            return false;
        }
        if self.active_only && !element.is_active {
            return false;
        }
        if let Some(name) = &self.name {
            if !name.matches(normalized_name) {
                return false;
            }
        }
        if !self.search.is_empty() {
            let haystack = element.search_text_normalized.as_deref().unwrap_or("");
            let all = self.search.iter().all(|token| {
                if token.strict {
                    crate::normalize::contains_word(haystack, &token.text)
                } else {
                    haystack.contains(token.text.as_str())
                }
            });
            if !all {
                return false;
            }
        }
        true
    }
}

/// Predicates over house records. Results come back in storage order.
#[derive(Debug, Clone, Default)]
pub struct HouseFilter {
    pub house_guids: Option<Vec<String>>,
    /// Containing element guid in this set. An empty set matches nothing.
    pub aoguids: Option<Vec<String>>,
    /// Exact house number.
    pub house_number: Option<String>,
    /// Normalized substring of the house number.
    pub number_contains: Option<String>,
    /// Records whose own guid, external guid, or classifier guid equals this.
    pub linked_to: Option<String>,
    /// Only records valid on this date (see [`House::is_valid_on`]).
    pub valid_on: Option<NaiveDate>,
    pub active_only: bool,
}

impl HouseFilter {
    pub fn matches(&self, house: &House) -> bool {
        if let Some(guids) = &self.house_guids {
            if !guids.iter().any(|g| *g == house.house_guid) {
                return false;
            }
        }
        if let Some(aoguids) = &self.aoguids {
            if !aoguids.iter().any(|g| *g == house.aoguid) {
                return false;
            }
        }
        if let Some(number) = &self.house_number {
            if house.house_number != *number {
                return false;
            }
        }
        if let Some(fragment) = &self.number_contains {
            if !normalize(&house.house_number).contains(fragment.as_str()) {
                return false;
            }
        }
        if let Some(guid) = &self.linked_to {
            let linked = house.house_guid == *guid
                || house.external_guid.as_deref() == Some(guid.as_str())
                || house.fias_house_guid.as_deref() == Some(guid.as_str());
            if !linked {
                return false;
            }
        }
        if let Some(date) = self.valid_on {
            if !house.is_valid_on(date) {
                return false;
            }
        }
        if self.active_only && !house.is_active {
            return false;
        }
        true
    }
}

/// Rows bound for one target table, inserted atomically.
#[derive(Debug, Clone)]
pub struct RowBatch {
    pub schema: TargetSchema,
    pub rows: Vec<MappedRow>,
}

/// Abstract storage backend for the catalog.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_elements`](CatalogStore::find_elements) | Address-element revisions matching a filter |
/// | [`count_elements`](CatalogStore::count_elements) | Count for the same filter, ignoring paging |
/// | [`find_houses`](CatalogStore::find_houses) | House records matching a filter |
/// | [`save_search_text`](CatalogStore::save_search_text) | Persist the denormalized search fields |
/// | [`insert_batch`](CatalogStore::insert_batch) | Atomic insert of one import batch |
/// | [`refresh_house_counts`](CatalogStore::refresh_house_counts) | Recompute cached house counts |
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_elements(&self, filter: &ElementFilter) -> Result<Vec<AddressElement>>;

    /// Number of matches for `filter` with `limit`/`offset` ignored. With
    /// `distinct_guid` set, counts lineages.
    async fn count_elements(&self, filter: &ElementFilter) -> Result<i64>;

    async fn find_houses(&self, filter: &HouseFilter) -> Result<Vec<House>>;

    /// Write both search fields on every row with this revision key.
    async fn save_search_text(&self, element_id: &str, text: &str, normalized: &str)
        -> Result<()>;

    /// Insert all rows of the batch in one transaction.
    async fn insert_batch(&self, batch: &RowBatch) -> Result<()>;

    /// Recompute `house_count` of every element. Returns the number of
    /// elements updated.
    async fn refresh_house_counts(&self) -> Result<u64>;
}
