use crate::domain::{EquipmentRecord, ItemCode, SelectionKey};
use crate::error::Result;
use crate::observability;
use crate::storage::CatalogStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

pub const ENQUIRY_HEADER: &str = "Hello, I would like to enquire about the following items:";

/// A rendered enquiry, ready to preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enquiry {
    pub items: Vec<EquipmentRecord>,
    /// Selected identifiers with no matching record, verbatim
    pub missing: Vec<String>,
    pub message: String,
}

/// Turns a selection of item identifiers into an enquiry message. Read-only.
pub struct EnquiryComposer {
    store: Arc<dyn CatalogStore>,
}

impl EnquiryComposer {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Compose an enquiry for `selection`. Returns `None` for an empty selection.
    pub async fn compose(&self, selection: &[String]) -> Result<Option<Enquiry>> {
        let mut keys: Vec<(String, SelectionKey)> = Vec::new();
        for raw in selection {
            if raw.trim().is_empty() || keys.iter().any(|(seen, _)| seen == raw) {
                continue;
            }
            keys.push((raw.clone(), SelectionKey::parse(raw)));
        }
        if keys.is_empty() {
            return Ok(None);
        }

        // Raw keys are never integer text, so only Code keys can name a record
        let codes: Vec<ItemCode> = keys
            .iter()
            .filter_map(|(_, key)| match key {
                SelectionKey::Code(code) => Some(*code),
                SelectionKey::Raw(_) => None,
            })
            .collect();
        let candidates = self.store.fetch_by_codes(&codes).await?;

        let mut items: Vec<EquipmentRecord> = Vec::new();
        let mut missing = Vec::new();
        for (raw, key) in &keys {
            match candidates.iter().find(|r| key.selects(r.code)) {
                Some(record) => {
                    if !items.iter().any(|i| i.code == record.code) {
                        items.push(record.clone());
                    }
                }
                None => missing.push(raw.clone()),
            }
        }

        debug!(
            "Enquiry matched {} of {} selected items",
            items.len(),
            keys.len()
        );
        observability::enquiry_composed();

        let message = render(&items, &missing);
        Ok(Some(Enquiry {
            items,
            missing,
            message,
        }))
    }
}

fn render(items: &[EquipmentRecord], missing: &[String]) -> String {
    let mut lines = vec![ENQUIRY_HEADER.to_string()];
    for record in items {
        lines.push(format!(
            "- {}: {} ({})",
            record.code, record.fields.category_description, record.fields.category
        ));
    }
    if !missing.is_empty() {
        lines.push(format!(
            "Details not found for item(s): {}",
            missing.join(", ")
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EquipmentFields;
    use crate::storage::InMemoryCatalog;

    fn composer() -> EnquiryComposer {
        let store = InMemoryCatalog::with_records(vec![
            EquipmentRecord::new(
                ItemCode(1),
                EquipmentFields {
                    category: "Tools".into(),
                    category_description: "Widget".into(),
                    ..Default::default()
                },
            ),
            EquipmentRecord::new(
                ItemCode(3),
                EquipmentFields {
                    category: "Safety".into(),
                    category_description: "Hard hat".into(),
                    ..Default::default()
                },
            ),
        ]);
        EnquiryComposer::new(Arc::new(store))
    }

    fn selection(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn lists_found_items_and_missing_ones() {
        let enquiry = composer()
            .compose(&selection(&["1", "2"]))
            .await
            .unwrap()
            .unwrap();

        assert!(enquiry.message.starts_with(ENQUIRY_HEADER));
        assert!(enquiry.message.contains("- 1: Widget (Tools)"));
        assert!(enquiry.message.contains("Details not found for item(s): 2"));
        assert_eq!(enquiry.missing, vec!["2"]);
    }

    #[tokio::test]
    async fn empty_selection_is_none() {
        assert_eq!(composer().compose(&[]).await.unwrap(), None);
        assert_eq!(composer().compose(&selection(&[" "])).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unparseable_identifier_does_not_hide_valid_ones() {
        let enquiry = composer()
            .compose(&selection(&["3", "X-9", " 1"]))
            .await
            .unwrap()
            .unwrap();

        let codes: Vec<ItemCode> = enquiry.items.iter().map(|r| r.code).collect();
        assert_eq!(codes, vec![ItemCode(3), ItemCode(1)]);
        assert_eq!(enquiry.missing, vec!["X-9"]);
        assert_eq!(
            enquiry.message,
            format!(
                "{ENQUIRY_HEADER}\n- 3: Hard hat (Safety)\n- 1: Widget (Tools)\nDetails not found for item(s): X-9"
            )
        );
    }

    /// Store that fails any full scan
    struct NoScan(InMemoryCatalog);

    #[async_trait::async_trait]
    impl CatalogStore for NoScan {
        async fn fetch_all(&self) -> Result<Vec<EquipmentRecord>> {
            Err(crate::error::CatalogError::connectivity("full scan not expected"))
        }
        async fn fetch_by_code(&self, code: ItemCode) -> Result<Option<EquipmentRecord>> {
            self.0.fetch_by_code(code).await
        }
        async fn fetch_by_codes(&self, codes: &[ItemCode]) -> Result<Vec<EquipmentRecord>> {
            self.0.fetch_by_codes(codes).await
        }
        async fn search(
            &self,
            criteria: &crate::domain::SearchCriteria,
        ) -> Result<Vec<EquipmentRecord>> {
            self.0.search(criteria).await
        }
        async fn insert(&self, fields: &EquipmentFields) -> Result<ItemCode> {
            self.0.insert(fields).await
        }
        async fn update(&self, code: ItemCode, fields: &EquipmentFields) -> Result<bool> {
            self.0.update(code, fields).await
        }
    }

    #[tokio::test]
    async fn non_numeric_identifiers_are_missing_without_a_scan() {
        let store = InMemoryCatalog::with_records(vec![EquipmentRecord::new(
            ItemCode(7),
            EquipmentFields {
                category: "Tools".into(),
                category_description: "Spanner".into(),
                ..Default::default()
            },
        )]);
        let composer = EnquiryComposer::new(Arc::new(NoScan(store)));

        let enquiry = composer
            .compose(&selection(&["7.0", "seven", "7"]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(enquiry.missing, vec!["7.0", "seven"]);
        assert_eq!(enquiry.items.len(), 1);
        assert_eq!(enquiry.items[0].code, ItemCode(7));
    }
}
