use crate::domain::{EquipmentFields, EquipmentRecord, ItemCode, SearchCriteria};
use crate::error::Result;
use async_trait::async_trait;

pub mod in_memory;
pub mod schema;
pub mod sqlite;

pub use in_memory::InMemoryCatalog;
pub use schema::CatalogSchema;
pub use sqlite::SqliteCatalog;

/// Storage trait for the equipment catalog.
///
/// "No matching data" is always an `Ok` value (empty, `None`, `false`);
/// an unreachable backend is `CatalogError::Connectivity`.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Every record, ordered by code
    async fn fetch_all(&self) -> Result<Vec<EquipmentRecord>>;

    async fn fetch_by_code(&self, code: ItemCode) -> Result<Option<EquipmentRecord>>;

    /// Records whose code is contained in `codes`, ordered by code
    async fn fetch_by_codes(&self, codes: &[ItemCode]) -> Result<Vec<EquipmentRecord>>;

    /// Records matching `criteria`. Empty criteria return every record.
    async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<EquipmentRecord>>;

    /// Insert a new record, assigning `max(code) + 1` (or 1 when empty)
    async fn insert(&self, fields: &EquipmentFields) -> Result<ItemCode>;

    /// Overwrite every mutable field of `code`. Returns false when `code` does not exist.
    async fn update(&self, code: ItemCode, fields: &EquipmentFields) -> Result<bool>;
}
