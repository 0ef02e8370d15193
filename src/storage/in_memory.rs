use super::CatalogStore;
use crate::domain::{EquipmentFields, EquipmentRecord, ItemCode, SearchCriteria};
use crate::error::{CatalogError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// In-memory catalog for development and testing
#[derive(Clone)]
pub struct InMemoryCatalog {
    records: Arc<Mutex<BTreeMap<ItemCode, EquipmentFields>>>,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Catalog pre-populated with existing records, codes kept as given
    pub fn with_records(records: impl IntoIterator<Item = EquipmentRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.code, r.fields)).collect();
        Self {
            records: Arc::new(Mutex::new(map)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<ItemCode, EquipmentFields>>> {
        self.records
            .lock()
            .map_err(|_| CatalogError::connectivity("in-memory catalog lock poisoned"))
    }
}

fn to_records<'a>(
    iter: impl Iterator<Item = (&'a ItemCode, &'a EquipmentFields)>,
) -> Vec<EquipmentRecord> {
    iter.map(|(code, fields)| EquipmentRecord::new(*code, fields.clone()))
        .collect()
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn fetch_all(&self) -> Result<Vec<EquipmentRecord>> {
        let records = self.lock()?;
        Ok(to_records(records.iter()))
    }

    async fn fetch_by_code(&self, code: ItemCode) -> Result<Option<EquipmentRecord>> {
        let records = self.lock()?;
        Ok(records
            .get(&code)
            .map(|fields| EquipmentRecord::new(code, fields.clone())))
    }

    async fn fetch_by_codes(&self, codes: &[ItemCode]) -> Result<Vec<EquipmentRecord>> {
        let records = self.lock()?;
        Ok(to_records(
            records.iter().filter(|(code, _)| codes.contains(code)),
        ))
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<EquipmentRecord>> {
        let all = self.fetch_all().await?;
        Ok(all.into_iter().filter(|r| criteria.matches(r)).collect())
    }

    async fn insert(&self, fields: &EquipmentFields) -> Result<ItemCode> {
        let mut records = self.lock()?;
        let code = ItemCode::next_after(records.keys().next_back().copied())?;
        records.insert(code, fields.clone());

        debug!("Inserted item {} into in-memory catalog", code);
        Ok(code)
    }

    async fn update(&self, code: ItemCode, fields: &EquipmentFields) -> Result<bool> {
        let mut records = self.lock()?;
        match records.get_mut(&code) {
            Some(existing) => {
                *existing = fields.clone();
                debug!("Updated item {} in in-memory catalog", code);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
