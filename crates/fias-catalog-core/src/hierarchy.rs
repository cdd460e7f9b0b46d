//! Ancestor resolution over the historical revision chains.
//!
//! Every climb is an explicit loop that remembers the guids it has visited,
//! since the importer does not validate parent links and a corrupt extract
//! can contain cycles.

use std::collections::HashSet;

use anyhow::Result;
use tracing::warn;

use crate::models::{AddressElement, House, Level};
use crate::naming::house_display_name;
use crate::search_index::SearchIndexBuilder;
use crate::store::{CatalogStore, ElementFilter};

pub struct HierarchyResolver<'a, S: CatalogStore> {
    store: &'a S,
}

impl<'a, S: CatalogStore> HierarchyResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// The terminal revision of a lineage, or `None` if no revision is
    /// terminal. With several terminal revisions the first in storage order
    /// wins.
    pub async fn resolve_terminal(&self, guid: &str) -> Result<Option<AddressElement>> {
        let mut terminal = self
            .store
            .find_elements(&ElementFilter::by_guid(guid).terminal())
            .await?;
        if terminal.len() > 1 {
            warn!(guid, revisions = terminal.len(), "lineage has several terminal revisions");
        }
        Ok(if terminal.is_empty() {
            None
        } else {
            Some(terminal.swap_remove(0))
        })
    }

    /// Climb from `element` through terminal parents until one of
    /// `target` level is found. `element` itself is not a candidate.
    ///
    /// Returns `None` when the chain ends, a parent lineage has no terminal
    /// revision, or a guid repeats.
    pub async fn ancestor_at_level(
        &self,
        element: &AddressElement,
        target: Level,
    ) -> Result<Option<AddressElement>> {
        let mut visited = HashSet::from([element.guid.clone()]);
        let mut parent_guid = element.parent_guid.clone();
        while let Some(guid) = parent_guid.filter(|g| !g.is_empty()) {
            if !visited.insert(guid.clone()) {
                warn!(guid = %guid, start = %element.guid, "cycle in parent chain");
                return Ok(None);
            }
            let Some(parent) = self.resolve_terminal(&guid).await? else {
                return Ok(None);
            };
            if parent.level == target {
                return Ok(Some(parent));
            }
            parent_guid = parent.parent_guid;
        }
        Ok(None)
    }

    /// The element of `target` level on the house's chain, starting with the
    /// house's own element.
    pub async fn element_at_level(
        &self,
        house: &House,
        target: Level,
    ) -> Result<Option<AddressElement>> {
        let Some(element) = self.resolve_terminal(&house.aoguid).await? else {
            return Ok(None);
        };
        if element.level == target {
            return Ok(Some(element));
        }
        self.ancestor_at_level(&element, target).await
    }

    pub async fn street(&self, house: &House) -> Result<Option<AddressElement>> {
        self.element_at_level(house, Level::Street).await
    }

    pub async fn city(&self, house: &House) -> Result<Option<AddressElement>> {
        self.element_at_level(house, Level::City).await
    }

    pub async fn region(&self, house: &House) -> Result<Option<AddressElement>> {
        self.element_at_level(house, Level::Region).await
    }

    /// "<element search text>, <house name>". Without a resolvable element
    /// only the house name is returned.
    pub async fn full_address_string(&self, house: &House) -> Result<String> {
        let house_name = house_display_name(house);
        let Some(mut element) = self.resolve_terminal(&house.aoguid).await? else {
            return Ok(house_name);
        };
        let prefix = SearchIndexBuilder::new(self.store)
            .ensure_search_text(&mut element)
            .await?;
        Ok([prefix, house_name]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", "))
    }
}
