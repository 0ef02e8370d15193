use super::{object_prefix, ImageResolver};
use crate::domain::ItemCode;
use crate::error::{CatalogError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Serves item photos from a local directory laid out like the bucket
pub struct LocalImageResolver {
    root: PathBuf,
    namespace: String,
    public_base_url: String,
}

impl LocalImageResolver {
    pub fn new(root: impl Into<PathBuf>, namespace: &str, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            namespace: namespace.to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ImageResolver for LocalImageResolver {
    async fn image_url(&self, code: ItemCode) -> Result<Option<String>> {
        let prefix = object_prefix(&self.namespace, code);
        let dir = self.root.join(&prefix);

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CatalogError::connectivity(format!(
                    "cannot list {}: {e}",
                    dir.display()
                )))
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        Ok(names
            .into_iter()
            .next()
            .map(|name| format!("{}/{}{}", self.public_base_url, prefix, name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn returns_first_file_in_sorted_order() {
        let root = tempdir().unwrap();
        let dir = root.path().join("engineer-inventory/product_id/12");
        std::fs::create_dir_all(dir.join("thumbs")).unwrap();
        std::fs::write(dir.join("b.jpg"), b"b").unwrap();
        std::fs::write(dir.join("a.jpg"), b"a").unwrap();

        let resolver = LocalImageResolver::new(root.path(), "engineer-inventory", "/images/");
        assert_eq!(
            resolver.image_url(ItemCode(12)).await.unwrap().as_deref(),
            Some("/images/engineer-inventory/product_id/12/a.jpg")
        );
    }

    #[tokio::test]
    async fn unknown_item_has_no_image() {
        let root = tempdir().unwrap();
        let resolver = LocalImageResolver::new(root.path(), "engineer-inventory", "/images");
        assert_eq!(resolver.image_url(ItemCode(99)).await.unwrap(), None);
    }
}
