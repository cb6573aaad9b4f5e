use std::collections::BTreeSet;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Image MIME types accepted for upload.
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Maximum accepted upload size.
pub const MAX_UPLOAD_BYTES: usize = 3 * 1024 * 1024;

/// Storage-key prefix under which entry images are written.
pub const ASSET_KEY_PREFIX: &str = "entries/images/";

#[derive(Debug, Error)]
/// Errors from object-storage operations.
pub enum AssetError {
    #[error("object storage is not configured")]
    NotConfigured,
    #[error("object storage error: {0}")]
    Storage(String),
    #[error("invalid asset url pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Generates a fresh storage key for an uploaded file, keeping a sanitized
/// extension from the client-supplied name.
pub fn new_asset_key(file_name: &str) -> String {
    let extension = file_name
        .rsplit('.')
        .next()
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "jpg".to_string());
    format!("{ASSET_KEY_PREFIX}{}.{extension}", Uuid::new_v4())
}

#[async_trait]
/// Capability contract for binary asset storage.
pub trait AssetStore: Send + Sync {
    /// Public URL prefix under which stored keys are reachable. Used by the
    /// scanner to recognize referenced assets inside rich text.
    fn public_base_url(&self) -> &str;

    /// Stores `bytes` under `key` and returns the public URL. Re-uploading a
    /// key overwrites the object.
    async fn upload(
        &self,
        bytes: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> Result<String, AssetError>;

    /// Removes every object in `keys`. No-op on empty input; deleting a key
    /// that no longer exists is not an error.
    async fn delete_many(&self, keys: &BTreeSet<String>) -> Result<(), AssetError>;
}

/// S3-backed asset store.
#[derive(Debug, Clone)]
pub struct S3AssetStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3AssetStore {
    /// Connects using the default AWS credential chain.
    pub async fn connect(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        let bucket = bucket.into();
        let region = region.into();
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.clone()))
            .load()
            .await;
        let client = aws_sdk_s3::Client::new(&config);
        let public_base_url = format!("https://{bucket}.s3.{region}.amazonaws.com/");

        info!(%bucket, %region, "object storage client initialized");

        Self {
            client,
            bucket,
            public_base_url,
        }
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> Result<String, AssetError> {
        debug!(bucket = %self.bucket, %key, size = bytes.len(), "uploading asset");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|error| AssetError::Storage(format!("failed to upload '{key}': {error}")))?;

        Ok(format!("{}{key}", self.public_base_url))
    }

    async fn delete_many(&self, keys: &BTreeSet<String>) -> Result<(), AssetError> {
        if keys.is_empty() {
            return Ok(());
        }

        let objects = keys
            .iter()
            .map(|key| {
                ObjectIdentifier::builder()
                    .key(key)
                    .build()
                    .map_err(|error| AssetError::Storage(error.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .build()
            .map_err(|error| AssetError::Storage(error.to_string()))?;

        self.client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|error| {
                AssetError::Storage(format!("failed to delete {} object(s): {error}", keys.len()))
            })?;

        info!(bucket = %self.bucket, count = keys.len(), "deleted assets");
        Ok(())
    }
}

/// Inert store used when no object-storage credentials are configured.
/// Uploads are rejected; deletes succeed silently so lifecycle cleanup paths
/// stay no-ops instead of logging failures on every save.
#[derive(Debug, Clone, Default)]
pub struct DisabledAssetStore;

#[async_trait]
impl AssetStore for DisabledAssetStore {
    fn public_base_url(&self) -> &str {
        ""
    }

    async fn upload(
        &self,
        _bytes: Vec<u8>,
        _key: &str,
        _content_type: &str,
    ) -> Result<String, AssetError> {
        Err(AssetError::NotConfigured)
    }

    async fn delete_many(&self, keys: &BTreeSet<String>) -> Result<(), AssetError> {
        if !keys.is_empty() {
            debug!(count = keys.len(), "object storage disabled; skipping delete");
        }
        Ok(())
    }
}
