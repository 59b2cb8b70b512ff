use std::collections::{BTreeMap, BTreeSet};

use crate::attribute::{AttributeDefinition, Scope};
use crate::error::CoreError;
use crate::ids::{StoreId, WebsiteId};

/// Known stores grouped by website. The default store always exists and
/// belongs to the admin website.
#[derive(Debug, Clone)]
pub struct StoreDirectory {
    websites: BTreeMap<StoreId, WebsiteId>,
}

impl Default for StoreDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreDirectory {
    pub fn new() -> Self {
        let mut websites = BTreeMap::new();
        websites.insert(StoreId::DEFAULT, WebsiteId::ADMIN);
        Self { websites }
    }

    pub fn insert(&mut self, store_id: StoreId, website_id: WebsiteId) -> Result<(), CoreError> {
        if store_id.is_default() && website_id != WebsiteId::ADMIN {
            return Err(CoreError::InvalidInput(
                "the default store belongs to the admin website".into(),
            ));
        }
        self.websites.insert(store_id, website_id);
        Ok(())
    }

    pub fn with_store(mut self, store_id: i64, website_id: i64) -> Result<Self, CoreError> {
        self.insert(StoreId::new(store_id), WebsiteId::new(website_id))?;
        Ok(self)
    }

    pub fn contains(&self, store_id: StoreId) -> bool {
        self.websites.contains_key(&store_id)
    }

    pub fn website_of(&self, store_id: StoreId) -> Result<WebsiteId, CoreError> {
        self.websites
            .get(&store_id)
            .copied()
            .ok_or_else(|| CoreError::NotFound(format!("store {store_id}")))
    }

    pub fn stores_in_website(&self, website_id: WebsiteId) -> BTreeSet<StoreId> {
        self.websites
            .iter()
            .filter(|(_, w)| **w == website_id)
            .map(|(s, _)| *s)
            .collect()
    }

    pub fn stores(&self) -> impl Iterator<Item = StoreId> + '_ {
        self.websites.keys().copied()
    }
}

/// Pure scope arithmetic. Never touches storage.
pub struct ScopeResolver;

impl ScopeResolver {
    /// The store whose row holds (or would hold) `attr`'s value for a request
    /// made under `requested`. For store-scoped attributes this is only the
    /// candidate; whether a row exists there is decided by the reader.
    pub fn effective_store_for(attr: &AttributeDefinition, requested: StoreId) -> StoreId {
        match attr.scope {
            Scope::Global => StoreId::DEFAULT,
            Scope::Website | Scope::Store => requested,
        }
    }

    /// Stores consulted on read, most specific first.
    pub fn read_stores(attr: &AttributeDefinition, requested: StoreId) -> Vec<StoreId> {
        let candidate = Self::effective_store_for(attr, requested);
        if candidate.is_default() {
            vec![StoreId::DEFAULT]
        } else {
            vec![candidate, StoreId::DEFAULT]
        }
    }

    /// Pick the effective value out of the rows found at the read stores.
    pub fn pick<'a, T>(
        attr: &AttributeDefinition,
        requested: StoreId,
        rows: &'a BTreeMap<StoreId, T>,
    ) -> Option<&'a T> {
        Self::read_stores(attr, requested)
            .into_iter()
            .find_map(|store| rows.get(&store))
    }
}
