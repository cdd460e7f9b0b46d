//! Denormalized full-text search string per address element.
//!
//! An element's search text is its nearest terminal ancestor's search text
//! followed by its own "`formalName` `shortTypeName`", comma-joined, most
//! specific last. Values are computed lazily and cached on the row together
//! with an uppercased, `Ё`-folded copy used by search predicates.
//!
//! Recomputation is a pure function of already-stored ancestor data, so
//! concurrent writers of the same element write the same value.

use std::collections::HashSet;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::hierarchy::HierarchyResolver;
use crate::models::AddressElement;
use crate::naming::{label, without_region};
use crate::normalize::normalize;
use crate::store::{CatalogStore, ElementFilter};

/// Page size used when walking the whole catalog.
const REBUILD_PAGE: i64 = 500;

pub struct SearchIndexBuilder<'a, S: CatalogStore> {
    store: &'a S,
}

fn join_parts(prefix: &str, own: &str) -> String {
    [prefix.trim(), own.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

impl<'a, S: CatalogStore> SearchIndexBuilder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Return the element's search text, computing and persisting it (and
    /// any missing ancestor texts) first if it is absent.
    ///
    /// `element` is updated in place, so a second call returns the cached
    /// value without touching the store.
    pub async fn ensure_search_text(&self, element: &mut AddressElement) -> Result<String> {
        if element.has_search_text() {
            return Ok(element.search_text.clone().unwrap_or_default());
        }

        let resolver = HierarchyResolver::new(self.store);

        // Climb until an ancestor with cached text or the top of the chain.
        let mut pending: Vec<AddressElement> = Vec::new();
        let mut visited = HashSet::from([element.guid.clone()]);
        let mut prefix = String::new();
        let mut parent_guid = element.parent_guid.clone();
        while let Some(guid) = parent_guid.take().filter(|g| !g.is_empty()) {
            if !visited.insert(guid.clone()) {
                warn!(guid = %guid, start = %element.guid, "cycle in parent chain, search text truncated");
                break;
            }
            let Some(parent) = resolver.resolve_terminal(&guid).await? else {
                break;
            };
            if parent.has_search_text() {
                prefix = parent.search_text.clone().unwrap_or_default();
                break;
            }
            parent_guid = parent.parent_guid.clone();
            pending.push(parent);
        }

        // Fill in from the top down.
        for ancestor in pending.iter_mut().rev() {
            prefix = self.persist(ancestor, &prefix).await?;
        }
        self.persist(element, &prefix).await
    }

    async fn persist(&self, element: &mut AddressElement, prefix: &str) -> Result<String> {
        let text = join_parts(prefix, &label(element));
        let normalized = normalize(&text);
        debug!(element_id = %element.element_id, text = %text, "search text computed");
        self.store
            .save_search_text(&element.element_id, &text, &normalized)
            .await?;
        element.search_text = Some(text.clone());
        element.search_text_normalized = Some(normalized);
        Ok(text)
    }

    /// Search text without its region part.
    pub async fn search_text_without_region(&self, element: &mut AddressElement) -> Result<String> {
        let text = self.ensure_search_text(element).await?;
        Ok(without_region(&text))
    }

    /// Ensure search text for every element in storage order. Returns the
    /// number of elements visited.
    pub async fn rebuild_all(&self) -> Result<u64> {
        let mut offset = 0;
        let mut visited = 0u64;
        loop {
            let page = self
                .store
                .find_elements(&ElementFilter {
                    limit: Some(REBUILD_PAGE),
                    offset,
                    ..ElementFilter::default()
                })
                .await?;
            if page.is_empty() {
                break;
            }
            for mut element in page {
                self.ensure_search_text(&mut element).await?;
                visited += 1;
            }
            offset += REBUILD_PAGE;
            info!(visited, "search index progress");
        }
        Ok(visited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Level;
    use crate::store::memory::InMemoryStore;

    #[tokio::test]
    async fn root_element_uses_own_label() {
        let store = InMemoryStore::new();
        let mut region = AddressElement::new("r1", "R", Level::Region, " Тверская ", "обл ");
        store.add_element(region.clone());

        let builder = SearchIndexBuilder::new(&store);
        let text = builder.ensure_search_text(&mut region).await.unwrap();
        assert_eq!(text, "Тверская обл");
        assert_eq!(region.search_text_normalized.as_deref(), Some("ТВЕРСКАЯ ОБЛ"));
        assert_eq!(
            store.element("r1").unwrap().search_text.as_deref(),
            Some("Тверская обл")
        );
    }

    #[tokio::test]
    async fn child_is_prefixed_by_parent_text() {
        let store = InMemoryStore::new();
        let mut region = AddressElement::new("r1", "R", Level::Region, "Московская", "обл");
        region.search_text = Some("Московская область".into());
        region.search_text_normalized = Some("МОСКОВСКАЯ ОБЛАСТЬ".into());
        store.add_element(region);
        let mut city = AddressElement::new("c1", "C", Level::City, "г", "Москва").with_parent("R");
        store.add_element(city.clone());

        let builder = SearchIndexBuilder::new(&store);
        let text = builder.ensure_search_text(&mut city).await.unwrap();
        assert_eq!(text, "Московская область, г Москва");
    }

    #[tokio::test]
    async fn fills_missing_ancestors_and_is_idempotent() {
        let store = InMemoryStore::new();
        store.add_element(AddressElement::new("r1", "R", Level::Region, "Московская", "обл"));
        store.add_element(AddressElement::new("c1", "C", Level::City, "Химки", "г").with_parent("R"));
        let mut street =
            AddressElement::new("s1", "S", Level::Street, "Ёлочная", "ул").with_parent("C");
        store.add_element(street.clone());

        let builder = SearchIndexBuilder::new(&store);
        let first = builder.ensure_search_text(&mut street).await.unwrap();
        assert_eq!(first, "Московская обл, Химки г, Ёлочная ул");
        assert_eq!(
            street.search_text_normalized.as_deref(),
            Some("МОСКОВСКАЯ ОБЛ, ХИМКИ Г, ЕЛОЧНАЯ УЛ")
        );
        assert_eq!(
            store.element("c1").unwrap().search_text.as_deref(),
            Some("Московская обл, Химки г")
        );

        let second = builder.ensure_search_text(&mut street).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.element("s1").unwrap().search_text.as_deref(), Some(first.as_str()));
    }

    #[tokio::test]
    async fn unresolvable_parent_gives_empty_prefix() {
        let store = InMemoryStore::new();
        let mut street =
            AddressElement::new("s1", "S", Level::Street, "Ленина", "ул").with_parent("GONE");
        store.add_element(street.clone());

        let text = SearchIndexBuilder::new(&store)
            .ensure_search_text(&mut street)
            .await
            .unwrap();
        assert_eq!(text, "Ленина ул");
    }

    #[tokio::test]
    async fn region_part_can_be_dropped() {
        let store = InMemoryStore::new();
        store.add_element(AddressElement::new("r1", "R", Level::Region, "Тверская", "обл"));
        let mut city =
            AddressElement::new("c1", "C", Level::City, "Ржев", "г").with_parent("R");
        store.add_element(city.clone());

        let builder = SearchIndexBuilder::new(&store);
        let text = builder.search_text_without_region(&mut city).await.unwrap();
        assert_eq!(text, "Ржев г");
        assert_eq!(city.search_text.as_deref(), Some("Тверская обл, Ржев г"));
    }

    #[tokio::test]
    async fn cyclic_parents_terminate() {
        let store = InMemoryStore::new();
        store.add_element(AddressElement::new("a", "A", Level::Street, "Первая", "ул").with_parent("B"));
        store.add_element(AddressElement::new("b", "B", Level::City, "Вторая", "г").with_parent("A"));
        let mut a = store.element("a").unwrap();

        let text = SearchIndexBuilder::new(&store)
            .ensure_search_text(&mut a)
            .await
            .unwrap();
        assert_eq!(text, "Вторая г, Первая ул");
    }

    #[tokio::test]
    async fn rebuild_all_indexes_every_element() {
        let store = InMemoryStore::new();
        store.add_element(AddressElement::new("r1", "R", Level::Region, "Московская", "обл"));
        store.add_element(AddressElement::new("c1", "C", Level::City, "Химки", "г").with_parent("R"));

        let visited = SearchIndexBuilder::new(&store).rebuild_all().await.unwrap();
        assert_eq!(visited, 2);
        assert!(store.element("r1").unwrap().has_search_text());
        assert!(store.element("c1").unwrap().has_search_text());
    }
}
