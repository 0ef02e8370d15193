use crate::error::{CatalogError, Result};
use crate::images::{S3Settings, DEFAULT_NAMESPACE};
use crate::storage::schema::SchemaKind;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "inventory.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub images: ImagesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 5000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared staff password
    pub password: String,
    /// Secret mixed into session tokens
    pub secret_key: String,
    /// Seconds a login stays valid
    pub session_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password: String::new(),
            secret_key: String::new(),
            session_ttl_secs: 12 * 60 * 60,
        }
    }
}

impl AuthConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub schema: SchemaKind,
    pub timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/inventory.db"),
            schema: SchemaKind::Equipment,
            timeout_ms: 5_000,
        }
    }
}

impl DatabaseConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageBackend {
    #[default]
    None,
    S3,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub backend: ImageBackend,
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub namespace: String,
    pub local_root: PathBuf,
    pub public_base_url: String,
    pub concurrency: usize,
    pub timeout_ms: u64,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            backend: ImageBackend::None,
            bucket: String::new(),
            region: None,
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            local_root: PathBuf::from("images"),
            public_base_url: "/images".to_string(),
            concurrency: 4,
            timeout_ms: 3_000,
        }
    }
}

impl ImagesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn s3_settings(&self) -> S3Settings {
        S3Settings {
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            namespace: self.namespace.clone(),
            timeout: self.timeout(),
        }
    }
}

impl AppConfig {
    /// Load `.env`, then the TOML file (missing file means defaults), then
    /// environment overrides.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        let path = env::var("INVENTORY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = match fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(CatalogError::Config(format!(
                    "Failed to read config file '{path}': {e}"
                )))
            }
        };
        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from `lookup` (the process environment in production)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("INVENTORY_DB_PATH") {
            self.database.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("INVENTORY_SCHEMA") {
            self.database.schema = v.parse().map_err(CatalogError::Config)?;
        }
        if let Some(v) = lookup("APP_PASSWORD") {
            self.auth.password = v;
        }
        if let Some(v) = lookup("APP_SECRET_KEY") {
            self.auth.secret_key = v;
        }
        if let Some(v) = lookup("IMAGE_BACKEND") {
            self.images.backend = match v.to_ascii_lowercase().as_str() {
                "none" | "" => ImageBackend::None,
                "s3" => ImageBackend::S3,
                "local" => ImageBackend::Local,
                other => {
                    return Err(CatalogError::Config(format!("unknown image backend '{other}'")))
                }
            };
        }
        if let Some(v) = lookup("S3_BUCKET_NAME") {
            self.images.bucket = v;
        }
        if let Some(v) = lookup("S3_REGION") {
            self.images.region = Some(v);
        }
        if let Some(v) = lookup("S3_ENDPOINT") {
            self.images.endpoint = Some(v);
        }
        if let Some(v) = lookup("S3_ACCESS_KEY_ID") {
            self.images.access_key_id = Some(v);
        }
        if let Some(v) = lookup("S3_SECRET_ACCESS_KEY") {
            self.images.secret_access_key = Some(v);
        }
        if let Some(v) = lookup("IMAGE_ROOT") {
            self.images.local_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("IMAGE_PUBLIC_BASE_URL") {
            self.images.public_base_url = v;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = v
                .parse()
                .map_err(|_| CatalogError::Config(format!("invalid PORT '{v}'")))?;
        }
        Ok(())
    }

    /// Settings the HTTP server cannot run without
    pub fn validate_for_serving(&self) -> Result<()> {
        if self.auth.password.is_empty() {
            return Err(CatalogError::Config(
                "auth.password (APP_PASSWORD) must be set".to_string(),
            ));
        }
        if self.auth.secret_key.is_empty() {
            return Err(CatalogError::Config(
                "auth.secret_key (APP_SECRET_KEY) must be set".to_string(),
            ));
        }
        if self.images.backend == ImageBackend::S3 && self.images.bucket.is_empty() {
            return Err(CatalogError::Config(
                "images.bucket (S3_BUCKET_NAME) must be set for the s3 backend".to_string(),
            ));
        }
        if self.images.access_key_id.is_some() != self.images.secret_access_key.is_some() {
            return Err(CatalogError::Config(
                "S3_ACCESS_KEY_ID and S3_SECRET_ACCESS_KEY must be set together".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parses_sections_with_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [database]
            path = "/srv/inventory.db"
            schema = "stock"

            [images]
            backend = "s3"
            bucket = "stock-photos"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.schema, SchemaKind::Stock);
        assert_eq!(config.database.timeout_ms, 5_000);
        assert_eq!(config.images.backend, ImageBackend::S3);
        assert_eq!(config.images.namespace, "engineer-inventory");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.auth.session_ttl(), Duration::from_secs(43_200));
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("APP_PASSWORD", "hunter2"),
            ("APP_SECRET_KEY", "k"),
            ("INVENTORY_SCHEMA", "equipment"),
            ("IMAGE_BACKEND", "local"),
            ("PORT", "8080"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::from_toml("[database]\nschema = \"stock\"").unwrap();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database.schema, SchemaKind::Equipment);
        assert_eq!(config.images.backend, ImageBackend::Local);
        assert_eq!(config.server.port, 8080);
        assert!(config.validate_for_serving().is_ok());
    }

    #[test]
    fn s3_keys_come_from_environment() {
        let mut config = AppConfig::default();
        config.auth.password = "p".into();
        config.auth.secret_key = "k".into();
        config
            .apply_env(|k| match k {
                "IMAGE_BACKEND" => Some("s3".to_string()),
                "S3_BUCKET_NAME" => Some("stock-photos".to_string()),
                "S3_ACCESS_KEY_ID" => Some("AKIDEXAMPLE".to_string()),
                _ => None,
            })
            .unwrap();
        assert!(config.validate_for_serving().is_err());

        config.images.secret_access_key = Some("secret".to_string());
        assert!(config.validate_for_serving().is_ok());
        let s3 = config.images.s3_settings();
        assert_eq!(s3.access_key_id.as_deref(), Some("AKIDEXAMPLE"));
        assert_eq!(s3.bucket, "stock-photos");
    }

    #[test]
    fn serving_requires_credentials() {
        let err = AppConfig::default().validate_for_serving().unwrap_err();
        assert!(err.to_string().contains("APP_PASSWORD"));
    }

    #[test]
    fn bad_port_is_config_error() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(|k| (k == "PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Config(_)));
    }
}
