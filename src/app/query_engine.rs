use crate::domain::{CatalogRow, EquipmentRecord, ItemCode, SearchCriteria};
use crate::error::Result;
use crate::images::{self, ImageResolver};
use crate::observability;
use crate::storage::CatalogStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Bounds for the per-row image lookups of a client search
#[derive(Debug, Clone, Copy)]
pub struct ImageLookup {
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for ImageLookup {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout: Duration::from_secs(3),
        }
    }
}

/// Filtered and unfiltered catalog listings
pub struct QueryEngine {
    store: Arc<dyn CatalogStore>,
    images: Arc<dyn ImageResolver>,
    lookup: ImageLookup,
}

impl QueryEngine {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        images: Arc<dyn ImageResolver>,
        lookup: ImageLookup,
    ) -> Self {
        Self {
            store,
            images,
            lookup,
        }
    }

    /// Client search. Returns nothing when neither a term nor a category is
    /// given, so the first page load does not dump the whole catalog.
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<CatalogRow>> {
        if criteria.is_empty() {
            return Ok(Vec::new());
        }
        observability::search_executed();

        let records = self.store.search(criteria).await?;
        let mut rows: Vec<CatalogRow> = records.iter().map(CatalogRow::from).collect();

        let codes: Vec<ItemCode> = rows.iter().map(|r| r.code).collect();
        let urls = images::resolve_all(
            self.images.clone(),
            &codes,
            self.lookup.concurrency,
            self.lookup.timeout,
        )
        .await;
        for (row, url) in rows.iter_mut().zip(urls) {
            row.image_url = url;
        }

        debug!(
            term = ?criteria.term(),
            category = ?criteria.category(),
            "Search returned {} rows",
            rows.len()
        );
        Ok(rows)
    }

    /// Admin listing: every record, no image lookups
    pub async fn list_all(&self) -> Result<Vec<CatalogRow>> {
        let records = self.store.fetch_all().await?;
        Ok(records.iter().map(CatalogRow::from).collect())
    }

    /// Distinct category values across the whole catalog, sorted
    pub async fn categories(&self) -> Result<Vec<String>> {
        let records = self.store.fetch_all().await?;
        let categories: BTreeSet<String> = records
            .into_iter()
            .map(|r| r.fields.category)
            .collect();
        Ok(categories.into_iter().collect())
    }

    pub async fn item(&self, code: ItemCode) -> Result<Option<EquipmentRecord>> {
        self.store.fetch_by_code(code).await
    }
}
