//! Use cases over the catalog: search, record reconciliation and enquiries.

pub mod enquiry_composer;
pub mod query_engine;
pub mod record_reconciler;

pub use enquiry_composer::{Enquiry, EnquiryComposer};
pub use query_engine::{ImageLookup, QueryEngine};
pub use record_reconciler::{ItemForm, RecordReconciler, SaveOutcome};

use crate::images::ImageResolver;
use crate::storage::CatalogStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One-shot message shown to staff after an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub success: bool,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// The use cases wired to one store and one image resolver
#[derive(Clone)]
pub struct Inventory {
    pub query: Arc<QueryEngine>,
    pub reconciler: Arc<RecordReconciler>,
    pub enquiries: Arc<EnquiryComposer>,
}

impl Inventory {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        images: Arc<dyn ImageResolver>,
        lookup: ImageLookup,
    ) -> Self {
        Self {
            query: Arc::new(QueryEngine::new(store.clone(), images, lookup)),
            reconciler: Arc::new(RecordReconciler::new(store.clone())),
            enquiries: Arc::new(EnquiryComposer::new(store)),
        }
    }
}
