use std::fmt;
use thiserror::Error;

/// A single field-level validation problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog backend unreachable: {message}")]
    Connectivity { message: String },

    #[error("Validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl CatalogError {
    pub fn connectivity(message: impl Into<String>) -> Self {
        CatalogError::Connectivity {
            message: message.into(),
        }
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, CatalogError::Connectivity { .. })
    }

    /// Text that is safe to show to staff. Never carries backend detail.
    pub fn user_notice(&self) -> String {
        match self {
            CatalogError::Connectivity { .. } => {
                "The inventory is temporarily unavailable. Please try again shortly.".to_string()
            }
            CatalogError::Validation(fields) => {
                let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
                format!("Please check the following fields: {}", names.join(", "))
            }
            CatalogError::Config(_) | CatalogError::Io(_) | CatalogError::Toml(_) => {
                "Something went wrong. Please contact an administrator.".to_string()
            }
        }
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(e: rusqlite::Error) -> Self {
        CatalogError::connectivity(format!("database error: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
