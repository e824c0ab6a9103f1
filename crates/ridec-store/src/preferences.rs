//! UI preferences: collapsed areas and integration settings

use crate::error::Result;
use crate::keys;
use crate::kv::LocalStore;
use std::collections::BTreeMap;

pub struct Preferences<'a> {
    store: &'a LocalStore,
}

impl<'a> Preferences<'a> {
    pub fn new(store: &'a LocalStore) -> Self {
        Self { store }
    }

    /// Area name -> collapsed
    pub async fn collapsed_areas(&self) -> Result<BTreeMap<String, bool>> {
        Ok(self
            .store
            .get::<BTreeMap<String, bool>>(keys::AREA_COLLAPSED)
            .await?
            .unwrap_or_default())
    }

    pub async fn set_area_collapsed(&self, area: &str, collapsed: bool) -> Result<()> {
        let mut areas = self.collapsed_areas().await?;
        if collapsed {
            areas.insert(area.to_string(), true);
        } else {
            areas.remove(area);
        }
        if areas.is_empty() {
            self.store.remove(keys::AREA_COLLAPSED).await?;
        } else {
            self.store.set(keys::AREA_COLLAPSED, &areas).await?;
        }
        Ok(())
    }

    pub async fn integration(&self, system: &str) -> Result<Option<serde_json::Value>> {
        self.store.get(&keys::integration_key(system)).await
    }

    pub async fn set_integration(&self, system: &str, config: &serde_json::Value) -> Result<()> {
        self.store.set(&keys::integration_key(system), config).await
    }
}
