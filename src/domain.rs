//! Domain data shapes shared across the store, the use cases and the HTTP layer.

use crate::error::{CatalogError, FieldError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a catalog row. Assigned by the store, never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemCode(pub i64);

impl ItemCode {
    pub fn value(self) -> i64 {
        self.0
    }

    /// Code that follows `current_max`, or the first code for an empty catalog.
    /// Fails once the highest code is `i64::MAX`.
    pub fn next_after(current_max: Option<ItemCode>) -> Result<ItemCode> {
        match current_max {
            Some(ItemCode(max)) => max.checked_add(1).map(ItemCode).ok_or_else(|| {
                CatalogError::Validation(vec![FieldError::new(
                    "item_code",
                    format!("no item codes remain after {max}"),
                )])
            }),
            None => Ok(ItemCode(1)),
        }
    }
}

impl fmt::Display for ItemCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The mutable part of an equipment record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentFields {
    pub category: String,
    pub sub_category: String,
    pub category_description: String,
    pub make: String,
    pub model: String,
    pub certification: String,
    pub specification: String,
    pub location: String,
    pub price: String,
    /// Stock count; only the stock table stores it
    pub quantity: String,
}

/// A stored catalog row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentRecord {
    pub code: ItemCode,
    #[serde(flatten)]
    pub fields: EquipmentFields,
}

impl EquipmentRecord {
    pub fn new(code: ItemCode, fields: EquipmentFields) -> Self {
        Self { code, fields }
    }
}

/// Free-text term plus optional category filter. Whitespace-only values count
/// as absent; any other term is matched exactly as given, spaces included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchCriteria {
    pub term: Option<String>,
    pub category: Option<String>,
}

impl SearchCriteria {
    pub fn new(term: Option<&str>, category: Option<&str>) -> Self {
        Self {
            term: term.map(str::to_string),
            category: category.map(str::to_string),
        }
    }

    pub fn term(&self) -> Option<&str> {
        self.term.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref().filter(|c| !c.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.term().is_none() && self.category().is_none()
    }

    /// Whether `record` satisfies these criteria.
    ///
    /// The term matches case-insensitively as a substring of either the
    /// category description or the make; the category must match exactly.
    /// Empty criteria match everything.
    pub fn matches(&self, record: &EquipmentRecord) -> bool {
        let term_ok = match self.term() {
            Some(term) => {
                let needle = term.to_lowercase();
                record.fields.category_description.to_lowercase().contains(&needle)
                    || record.fields.make.to_lowercase().contains(&needle)
            }
            None => true,
        };
        let category_ok = match self.category() {
            Some(category) => record.fields.category == category,
            None => true,
        };
        term_ok && category_ok
    }
}

/// Stable external result shape for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRow {
    pub code: ItemCode,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub price: String,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
}

impl From<&EquipmentRecord> for CatalogRow {
    fn from(record: &EquipmentRecord) -> Self {
        Self {
            code: record.code,
            description: record.fields.category_description.clone(),
            kind: record.fields.category.clone(),
            price: record.fields.price.clone(),
            image_url: None,
        }
    }
}

/// One normalized entry of a selection set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SelectionKey {
    Code(ItemCode),
    Raw(String),
}

impl SelectionKey {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(n) => SelectionKey::Code(ItemCode(n)),
            Err(_) => SelectionKey::Raw(raw.to_string()),
        }
    }

    /// Whether this key selects `code`. Every integer text parses to `Code`,
    /// so a `Raw` key never names a stored code.
    pub fn selects(&self, code: ItemCode) -> bool {
        match self {
            SelectionKey::Code(c) => *c == code,
            SelectionKey::Raw(_) => false,
        }
    }
}
