use super::{object_prefix, ImageResolver};
use crate::domain::ItemCode;
use crate::error::{CatalogError, Result};
use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use std::time::Duration;
use tracing::debug;

const DEFAULT_REGION: &str = "us-east-1";
const LIST_LIMIT: i32 = 20;

/// Connection settings for the photo bucket
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub bucket: String,
    pub region: Option<String>,
    /// Custom endpoint (MinIO, LocalStack); path-style addressing is used
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub namespace: String,
    pub timeout: Duration,
}

/// Looks up item photos with an authenticated ListObjectsV2 call
pub struct S3ImageResolver {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base: String,
    namespace: String,
}

impl S3ImageResolver {
    /// Build the client. Static keys are used when both are configured,
    /// otherwise the default AWS credential chain applies.
    pub async fn connect(settings: &S3Settings) -> Result<Self> {
        let bucket = settings.bucket.trim();
        if bucket.is_empty() {
            return Err(CatalogError::Config("S3 bucket name is empty".to_string()));
        }

        let region = settings
            .region
            .clone()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(settings.timeout)
                    .build(),
            );

        match (&settings.access_key_id, &settings.secret_access_key) {
            (Some(id), Some(secret)) => {
                loader = loader.credentials_provider(Credentials::new(
                    id.clone(),
                    secret.clone(),
                    None,
                    None,
                    "inventory-config",
                ));
            }
            (None, None) => {}
            _ => {
                return Err(CatalogError::Config(
                    "S3 access key id and secret access key must be set together".to_string(),
                ))
            }
        }

        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
            public_base: public_base(bucket, settings.endpoint.as_deref()),
            namespace: settings.namespace.clone(),
        })
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, encode_key(key))
    }
}

/// Where listed objects are fetched from by browsers
fn public_base(bucket: &str, endpoint: Option<&str>) -> String {
    match endpoint {
        Some(endpoint) => format!("{}/{bucket}", endpoint.trim_end_matches('/')),
        None => format!("https://{bucket}.s3.amazonaws.com"),
    }
}

/// Percent-encode each path segment of an object key, keeping the slashes
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// First listed key that is an object rather than a folder marker
fn first_image_key<'a>(keys: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    keys.into_iter().find(|key| !key.ends_with('/'))
}

#[async_trait]
impl ImageResolver for S3ImageResolver {
    async fn image_url(&self, code: ItemCode) -> Result<Option<String>> {
        let prefix = object_prefix(&self.namespace, code);
        let listing = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .max_keys(LIST_LIMIT)
            .send()
            .await
            .map_err(|e| {
                CatalogError::connectivity(format!(
                    "S3 listing for '{prefix}' failed: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let url = first_image_key(listing.contents().iter().filter_map(|o| o.key()))
            .map(|key| self.public_url(key));
        debug!("Image for item {}: {:?}", code, url);
        Ok(url)
    }
}
