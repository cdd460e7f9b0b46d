//! In-memory [`CatalogStore`] implementation for tests and small embedded
//! catalogs.
//!
//! Uses `Vec`s behind `std::sync::RwLock`. Insertion order is storage
//! order. Filter semantics match the SQLite store.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{AddressElement, House};
use crate::normalize::normalize;
use crate::schema::{MappedRow, RecordKind, TargetSchema};

use super::{CatalogStore, ElementFilter, HouseFilter, RowBatch};

struct StoredElement {
    element: AddressElement,
    name_key: String,
}

/// In-memory catalog store.
pub struct InMemoryStore {
    elements: RwLock<Vec<StoredElement>>,
    houses: RwLock<Vec<House>>,
    tables: RwLock<HashMap<TargetSchema, Vec<MappedRow>>>,
    batches: RwLock<Vec<(TargetSchema, usize)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            elements: RwLock::new(Vec::new()),
            houses: RwLock::new(Vec::new()),
            tables: RwLock::new(HashMap::new()),
            batches: RwLock::new(Vec::new()),
        }
    }

    pub fn add_element(&self, element: AddressElement) {
        let name_key = normalize(&element.formal_name);
        self.elements
            .write()
            .unwrap()
            .push(StoredElement { element, name_key });
    }

    pub fn add_house(&self, house: House) {
        self.houses.write().unwrap().push(house);
    }

    /// Raw rows inserted into a table through [`CatalogStore::insert_batch`].
    pub fn rows(&self, schema: TargetSchema) -> Vec<MappedRow> {
        self.tables
            .read()
            .unwrap()
            .get(&schema)
            .cloned()
            .unwrap_or_default()
    }

    /// Size of every committed batch, in commit order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.read().unwrap().iter().map(|(_, n)| *n).collect()
    }

    /// Current copy of a stored revision.
    pub fn element(&self, element_id: &str) -> Option<AddressElement> {
        self.elements
            .read()
            .unwrap()
            .iter()
            .find(|s| s.element.element_id == element_id)
            .map(|s| s.element.clone())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn select<'a>(stored: &'a [StoredElement], filter: &ElementFilter) -> Vec<&'a StoredElement> {
    let mut matched: Vec<&StoredElement> = stored
        .iter()
        .filter(|s| filter.matches(&s.element, &s.name_key))
        .collect();
    if filter.distinct_guid {
        let mut seen = HashSet::new();
        matched.retain(|s| seen.insert(s.element.guid.clone()));
    }
    if filter.order_by_name {
        // stable: ties keep storage order
        matched.sort_by(|a, b| a.name_key.cmp(&b.name_key));
    }
    matched
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn find_elements(&self, filter: &ElementFilter) -> Result<Vec<AddressElement>> {
        let stored = self.elements.read().unwrap();
        let offset = filter.offset.max(0) as usize;
        let limit = match filter.limit {
            Some(n) if n > 0 => n as usize,
            _ => usize::MAX,
        };
        Ok(select(&stored, filter)
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|s| s.element.clone())
            .collect())
    }

    async fn count_elements(&self, filter: &ElementFilter) -> Result<i64> {
        let stored = self.elements.read().unwrap();
        Ok(select(&stored, filter).len() as i64)
    }

    async fn find_houses(&self, filter: &HouseFilter) -> Result<Vec<House>> {
        let houses = self.houses.read().unwrap();
        Ok(houses.iter().filter(|h| filter.matches(h)).cloned().collect())
    }

    async fn save_search_text(
        &self,
        element_id: &str,
        text: &str,
        normalized: &str,
    ) -> Result<()> {
        let mut stored = self.elements.write().unwrap();
        for s in stored.iter_mut().filter(|s| s.element.element_id == element_id) {
            s.element.search_text = Some(text.to_string());
            s.element.search_text_normalized = Some(normalized.to_string());
        }
        Ok(())
    }

    async fn insert_batch(&self, batch: &RowBatch) -> Result<()> {
        // Materialize first so a bad row leaves nothing half-written.
        let mut elements = Vec::new();
        let mut houses = Vec::new();
        match batch.schema.record_kind() {
            RecordKind::AddressElement => {
                for row in &batch.rows {
                    if let Some(e) = AddressElement::from_row(row) {
                        elements.push(e);
                    }
                }
            }
            RecordKind::House => {
                for row in &batch.rows {
                    if let Some(h) = House::from_row(row) {
                        houses.push(h);
                    }
                }
            }
            RecordKind::Auxiliary => {}
        }

        for e in elements {
            self.add_element(e);
        }
        self.houses.write().unwrap().extend(houses);
        self.tables
            .write()
            .unwrap()
            .entry(batch.schema)
            .or_default()
            .extend(batch.rows.iter().cloned());
        self.batches
            .write()
            .unwrap()
            .push((batch.schema, batch.rows.len()));
        Ok(())
    }

    async fn refresh_house_counts(&self) -> Result<u64> {
        let mut counts: HashMap<String, i64> = HashMap::new();
        for h in self.houses.read().unwrap().iter() {
            *counts.entry(h.aoguid.clone()).or_default() += 1;
        }
        let mut stored = self.elements.write().unwrap();
        for s in stored.iter_mut() {
            s.element.house_count = counts.get(&s.element.guid).copied().unwrap_or(0);
        }
        Ok(stored.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Level;
    use crate::store::{NameMatch, SearchToken};

    fn street(id: &str, guid: &str, parent: &str, name: &str) -> AddressElement {
        AddressElement::new(id, guid, Level::Street, name, "ул").with_parent(parent)
    }

    #[tokio::test]
    async fn name_filter_uses_normalized_name() {
        let store = InMemoryStore::new();
        store.add_element(street("1", "s1", "c1", "Ёлочная"));
        store.add_element(street("2", "s2", "c1", "Ленина"));

        let filter = ElementFilter {
            name: Some(NameMatch::contains("елоч")),
            ..ElementFilter::by_parent("c1")
        };
        let found = store.find_elements(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].guid, "s1");
    }

    #[tokio::test]
    async fn distinct_guid_keeps_first_revision_and_counts_lineages() {
        let store = InMemoryStore::new();
        store.add_element(street("1", "s1", "c1", "Ленина"));
        store.add_element(street("1-copy", "s1", "c1", "Ленина"));
        store.add_element(street("2", "s2", "c1", "Абрикосовая"));

        let filter = ElementFilter {
            distinct_guid: true,
            order_by_name: true,
            ..ElementFilter::by_parent("c1")
        };
        let found = store.find_elements(&filter).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|e| e.element_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(store.count_elements(&filter).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn empty_guid_set_matches_nothing() {
        let store = InMemoryStore::new();
        store.add_element(street("1", "s1", "c1", "Ленина"));
        let filter = ElementFilter {
            guids: Some(Vec::new()),
            ..ElementFilter::default()
        };
        assert!(store.find_elements(&filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn strict_search_respects_word_boundaries() {
        let store = InMemoryStore::new();
        let mut a = street("1", "s1", "c1", "Ленина");
        a.search_text_normalized = Some("УЛ ЛЕНИНА".into());
        let mut b = street("2", "s2", "c1", "Ленинабад");
        b.search_text_normalized = Some("УЛ ЛЕНИНАБАД".into());
        store.add_element(a);
        store.add_element(b);

        let filter = ElementFilter {
            search: vec![SearchToken {
                text: "ЛЕНИНА".into(),
                strict: true,
            }],
            ..ElementFilter::default()
        };
        let found = store.find_elements(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].guid, "s1");

        let loose = ElementFilter {
            search: vec![SearchToken {
                text: "ЛЕНИНА".into(),
                strict: false,
            }],
            ..ElementFilter::default()
        };
        assert_eq!(store.find_elements(&loose).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn refresh_house_counts_counts_direct_children() {
        let store = InMemoryStore::new();
        store.add_element(street("1", "s1", "c1", "Ленина"));
        store.add_element(street("2", "s2", "c1", "Мира"));
        store.add_house(House::new("h1", "hg1", "s1", "1"));
        store.add_house(House::new("h2", "hg2", "s1", "2"));

        store.refresh_house_counts().await.unwrap();
        let filter = ElementFilter {
            with_child_houses: true,
            ..ElementFilter::default()
        };
        let found = store.find_elements(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].house_count, 2);
    }
}
