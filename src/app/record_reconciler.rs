use super::Notice;
use crate::domain::{EquipmentFields, EquipmentRecord, ItemCode};
use crate::error::{CatalogError, FieldError, Result};
use crate::observability;
use crate::storage::CatalogStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Admin edit form as submitted. Every field is optional in the request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemForm {
    pub item_code: String,
    pub category: String,
    pub sub_category: String,
    pub category_description: String,
    pub make: String,
    pub model: String,
    pub certification: String,
    pub specification: String,
    pub location: String,
    pub price: String,
    pub quantity: String,
}

impl ItemForm {
    /// Form pre-filled from a stored record
    pub fn from_record(record: &EquipmentRecord) -> Self {
        let f = &record.fields;
        Self {
            item_code: record.code.to_string(),
            category: f.category.clone(),
            sub_category: f.sub_category.clone(),
            category_description: f.category_description.clone(),
            make: f.make.clone(),
            model: f.model.clone(),
            certification: f.certification.clone(),
            specification: f.specification.clone(),
            location: f.location.clone(),
            price: f.price.clone(),
            quantity: f.quantity.clone(),
        }
    }

    /// Check field requirements and split into (code for update, fields)
    pub fn validate(&self) -> Result<(Option<ItemCode>, EquipmentFields)> {
        let mut errors = Vec::new();

        let code = match self.item_code.trim() {
            "" => None,
            raw => match raw.parse::<i64>() {
                Ok(n) if n > 0 => Some(ItemCode(n)),
                _ => {
                    errors.push(FieldError::new("item_code", "must be a positive whole number"));
                    None
                }
            },
        };

        let fields = EquipmentFields {
            category: self.category.trim().to_string(),
            sub_category: self.sub_category.trim().to_string(),
            category_description: self.category_description.trim().to_string(),
            make: self.make.trim().to_string(),
            model: self.model.trim().to_string(),
            certification: self.certification.trim().to_string(),
            specification: self.specification.trim().to_string(),
            location: self.location.trim().to_string(),
            price: self.price.trim().to_string(),
            quantity: self.quantity.trim().to_string(),
        };

        if fields.category.is_empty() {
            errors.push(FieldError::new("category", "is required"));
        }
        if fields.category_description.is_empty() {
            errors.push(FieldError::new("category_description", "is required"));
        }
        if !fields.price.is_empty() {
            match fields.price.parse::<f64>() {
                Ok(p) if p.is_finite() && p >= 0.0 => {}
                _ => errors.push(FieldError::new("price", "must be a non-negative number")),
            }
        }
        if !fields.quantity.is_empty() && fields.quantity.parse::<u64>().is_err() {
            errors.push(FieldError::new("quantity", "must be a whole number of zero or more"));
        }

        if errors.is_empty() {
            Ok((code, fields))
        } else {
            Err(CatalogError::Validation(errors))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Added(ItemCode),
    Updated(ItemCode),
    /// The submitted code does not exist; nothing was written
    NotFound(ItemCode),
}

impl SaveOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, SaveOutcome::NotFound(_))
    }

    pub fn code(&self) -> ItemCode {
        match *self {
            SaveOutcome::Added(c) | SaveOutcome::Updated(c) | SaveOutcome::NotFound(c) => c,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            SaveOutcome::Added(_) => "added",
            SaveOutcome::Updated(_) => "updated",
            SaveOutcome::NotFound(_) => "not_found",
        }
    }

    pub fn notice(&self) -> Notice {
        match self {
            SaveOutcome::Added(code) => Notice::success(format!("Item {code} added successfully")),
            SaveOutcome::Updated(code) => {
                Notice::success(format!("Item {code} updated successfully"))
            }
            SaveOutcome::NotFound(code) => {
                Notice::failure(format!("Item {code} could not be updated because it does not exist"))
            }
        }
    }
}

/// Decides between adding and updating a catalog row from an edit form
pub struct RecordReconciler {
    store: Arc<dyn CatalogStore>,
}

impl RecordReconciler {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Save a submitted form. A non-blank `item_code` means update, otherwise add.
    pub async fn save(&self, form: &ItemForm) -> Result<SaveOutcome> {
        let result = self.reconcile(form).await;
        match &result {
            Ok(outcome) => {
                observability::save_recorded(outcome.label());
                info!("Catalog save: {:?}", outcome);
            }
            Err(e) => {
                observability::save_recorded(if e.is_connectivity() { "error" } else { "invalid" });
                warn!("Catalog save rejected: {}", e);
            }
        }
        result
    }

    async fn reconcile(&self, form: &ItemForm) -> Result<SaveOutcome> {
        let (code, fields) = form.validate()?;
        match code {
            Some(code) => {
                if self.store.update(code, &fields).await? {
                    Ok(SaveOutcome::Updated(code))
                } else {
                    Ok(SaveOutcome::NotFound(code))
                }
            }
            None => Ok(SaveOutcome::Added(self.store.insert(&fields).await?)),
        }
    }
}
