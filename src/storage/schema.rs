//! Mapping between the canonical `EquipmentRecord` and a backing table.

use crate::domain::EquipmentFields;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Which backing table layout the catalog lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    #[default]
    Equipment,
    Stock,
}

impl FromStr for SchemaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equipment" | "equipment_inventory" => Ok(SchemaKind::Equipment),
            "stock" | "products" => Ok(SchemaKind::Stock),
            other => Err(format!("unknown catalog schema '{other}'")),
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaKind::Equipment => write!(f, "equipment"),
            SchemaKind::Stock => write!(f, "stock"),
        }
    }
}

/// Column names for one table layout. `None` marks a field the table does not have:
/// it reads back as an empty string and is never written.
#[derive(Debug, Clone)]
pub struct CatalogSchema {
    pub kind: SchemaKind,
    pub table: &'static str,
    pub code: &'static str,
    pub category: &'static str,
    pub sub_category: Option<&'static str>,
    pub category_description: &'static str,
    pub make: Option<&'static str>,
    pub model: Option<&'static str>,
    pub certification: Option<&'static str>,
    pub specification: Option<&'static str>,
    pub location: Option<&'static str>,
    pub price: Option<&'static str>,
    pub quantity: Option<&'static str>,
    /// Extra predicate restricting which rows are part of the catalog
    pub visible_when: Option<&'static str>,
    /// Fixed column values written on insert
    pub insert_defaults: &'static [(&'static str, &'static str)],
    pub migration: &'static str,
}

impl CatalogSchema {
    pub fn for_kind(kind: SchemaKind) -> Self {
        match kind {
            SchemaKind::Equipment => Self::equipment(),
            SchemaKind::Stock => Self::stock(),
        }
    }

    pub fn equipment() -> Self {
        Self {
            kind: SchemaKind::Equipment,
            table: "equipment_inventory",
            code: "Item_Code",
            category: "Category",
            sub_category: Some("Sub_Category"),
            category_description: "Category_Description",
            make: Some("Make"),
            model: Some("Model"),
            certification: Some("Certification"),
            specification: Some("Specification"),
            location: Some("Location"),
            price: Some("Price"),
            quantity: None,
            visible_when: None,
            insert_defaults: &[],
            migration: include_str!("../../migrations/001_create_equipment_inventory.sql"),
        }
    }

    pub fn stock() -> Self {
        Self {
            kind: SchemaKind::Stock,
            table: "products",
            code: "ID",
            category: "category",
            sub_category: None,
            category_description: "product",
            make: None,
            model: None,
            certification: None,
            specification: None,
            location: None,
            price: None,
            quantity: Some("quantity"),
            visible_when: Some("active = 1"),
            insert_defaults: &[("active", "1")],
            migration: include_str!("../../migrations/002_create_products.sql"),
        }
    }

    /// Field columns in canonical order: category, sub_category, category_description,
    /// make, model, certification, specification, location, price, quantity.
    fn field_columns(&self) -> [Option<&'static str>; 10] {
        [
            Some(self.category),
            self.sub_category,
            Some(self.category_description),
            self.make,
            self.model,
            self.certification,
            self.specification,
            self.location,
            self.price,
            self.quantity,
        ]
    }

    /// SELECT list yielding the code followed by the ten fields as text
    pub fn select_list(&self) -> String {
        let mut parts = vec![self.code.to_string()];
        for column in self.field_columns() {
            parts.push(match column {
                Some(c) => format!("COALESCE(CAST({c} AS TEXT), '')"),
                None => "''".to_string(),
            });
        }
        parts.join(", ")
    }

    /// Base WHERE predicate (always valid SQL so callers can append `AND ...`)
    pub fn base_predicate(&self) -> &'static str {
        self.visible_when.unwrap_or("1=1")
    }

    /// Mapped (column, value) pairs for writing `fields`
    pub fn writable<'a>(&self, fields: &'a EquipmentFields) -> Vec<(&'static str, &'a str)> {
        let values: [&'a str; 10] = [
            &fields.category,
            &fields.sub_category,
            &fields.category_description,
            &fields.make,
            &fields.model,
            &fields.certification,
            &fields.specification,
            &fields.location,
            &fields.price,
            &fields.quantity,
        ];
        self.field_columns()
            .into_iter()
            .zip(values)
            .filter_map(|(column, value)| column.map(|c| (c, value)))
            .collect()
    }
}

/// Build an `EquipmentFields` from ten text values in canonical order
pub fn fields_from_values(values: [String; 10]) -> EquipmentFields {
    let [category, sub_category, category_description, make, model, certification, specification, location, price, quantity] =
        values;
    EquipmentFields {
        category,
        sub_category,
        category_description,
        make,
        model,
        certification,
        specification,
        location,
        price,
        quantity,
    }
}
