//! Blob storage for answers to `file` fields. Uploads are addressed by the
//! SHA-256 of their content; the submission stores only the hash.

use async_trait::async_trait;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadStoreError {
    #[error("duplicate")]
    Duplicate,
    #[error("not_found")]
    NotFound,
    #[error("other: {0}")]
    Other(String),
}

#[async_trait]
pub trait UploadStore: Send + Sync {
    async fn save(&self, hash: &str, mime: &str, bytes: &[u8]) -> Result<(), UploadStoreError>;
    async fn load(&self, hash: &str) -> Result<(Vec<u8>, String), UploadStoreError>;
    /// Whether a blob with this hash is stored. Malformed hashes are never stored.
    async fn exists(&self, hash: &str) -> Result<bool, UploadStoreError>;
}

/// Sniffed MIME type, `application/octet-stream` when unknown.
pub fn sniff_mime(bytes: &[u8]) -> String {
    infer::get(bytes)
        .map(|t| t.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".into())
}

/// Hex SHA-256, the only form an upload reference takes.
pub fn valid_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

// ---------------- Filesystem implementation ----------------
pub struct FsUploadStore {
    root: PathBuf,
}

impl FsUploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, hash: &str) -> PathBuf {
        self.root.join(&hash[0..2]).join(hash)
    }

    fn mime_path(path: &Path) -> PathBuf {
        path.with_extension("mime")
    }
}

#[async_trait]
impl UploadStore for FsUploadStore {
    async fn save(&self, hash: &str, mime: &str, bytes: &[u8]) -> Result<(), UploadStoreError> {
        if !valid_hash(hash) {
            return Err(UploadStoreError::Other(format!("invalid hash {hash}")));
        }
        let path = self.path_for(hash);
        if path.exists() {
            return Err(UploadStoreError::Duplicate);
        }
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| UploadStoreError::Other(e.to_string()))?;
        }
        std::fs::write(&path, bytes).map_err(|e| {
            error!("write failed hash={hash} path={}: {e}", path.display());
            UploadStoreError::Other(e.to_string())
        })?;
        std::fs::write(Self::mime_path(&path), mime).map_err(|e| UploadStoreError::Other(e.to_string()))?;
        Ok(())
    }

    async fn load(&self, hash: &str) -> Result<(Vec<u8>, String), UploadStoreError> {
        if !valid_hash(hash) {
            return Err(UploadStoreError::NotFound);
        }
        let path = self.path_for(hash);
        let bytes = std::fs::read(&path).map_err(|_| UploadStoreError::NotFound)?;
        let mime = std::fs::read_to_string(Self::mime_path(&path)).unwrap_or_else(|_| sniff_mime(&bytes));
        Ok((bytes, mime))
    }

    async fn exists(&self, hash: &str) -> Result<bool, UploadStoreError> {
        Ok(valid_hash(hash) && self.path_for(hash).is_file())
    }
}

// ---------------- S3 Implementation (MinIO compatible) ----------------
pub struct S3UploadStore {
    bucket: String,
    client: aws_sdk_s3::Client,
    prefix: String,
}

impl S3UploadStore {
    pub async fn new(endpoint: String) -> anyhow::Result<Self> {
        use aws_credential_types::provider::SharedCredentialsProvider;
        use aws_credential_types::Credentials;

        let bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| "formdesk-uploads".into());
        let region = std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into());
        let access = std::env::var("S3_ACCESS_KEY").unwrap_or_default();
        let secret = std::env::var("S3_SECRET_KEY").unwrap_or_default();

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region))
            .endpoint_url(endpoint);
        if !access.is_empty() && !secret.is_empty() {
            let creds = Credentials::new(access, secret, None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(creds));
        }
        let conf = loader.load().await;
        // Force path-style addressing (required for most MinIO/local endpoints without wildcard DNS)
        let s3_conf = aws_sdk_s3::config::Builder::from(&conf).force_path_style(true).build();
        let client = aws_sdk_s3::Client::from_conf(s3_conf);
        info!("Initialized S3/MinIO upload client (path-style addressing enabled)");

        if let Err(e) = client.head_bucket().bucket(&bucket).send().await {
            warn!("head_bucket failed for '{bucket}' (will attempt create): {e:?}");
            let mut attempt = 0u32;
            let max_attempts = 5;
            loop {
                attempt += 1;
                match client.create_bucket().bucket(&bucket).send().await {
                    Ok(_) => {
                        info!("created bucket '{bucket}' (attempt {attempt})");
                        break;
                    }
                    Err(e2) if attempt >= max_attempts => {
                        error!("create_bucket failed for '{bucket}' after {attempt} attempts: {e2:?}");
                        return Err(anyhow::anyhow!("failed to ensure bucket '{bucket}': {e2}"));
                    }
                    Err(e2) => {
                        let backoff_ms = 200 * attempt.pow(2); // quadratic backoff
                        warn!("create_bucket attempt {attempt} failed for '{bucket}': {e2:?} (retrying in {backoff_ms}ms)");
                        tokio::time::sleep(std::time::Duration::from_millis(backoff_ms as u64)).await;
                    }
                }
            }
        }

        Ok(Self { bucket, client, prefix: "uploads".into() })
    }

    fn key_for(&self, hash: &str) -> String {
        format!("{}/{}/{}", self.prefix, &hash[0..2], hash)
    }
}

#[async_trait]
impl UploadStore for S3UploadStore {
    async fn save(&self, hash: &str, mime: &str, bytes: &[u8]) -> Result<(), UploadStoreError> {
        use aws_sdk_s3::primitives::ByteStream;
        if !valid_hash(hash) {
            return Err(UploadStoreError::Other(format!("invalid hash {hash}")));
        }
        let key = self.key_for(hash);
        if self.client.head_object().bucket(&self.bucket).key(&key).send().await.is_ok() {
            return Err(UploadStoreError::Duplicate);
        }
        let put = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(mime);
        if let Err(e) = put.send().await {
            error!("put_object failed hash={hash} key={key} bucket={} err={:?}", self.bucket, e);
            return Err(UploadStoreError::Other(e.to_string()));
        }
        Ok(())
    }

    async fn load(&self, hash: &str) -> Result<(Vec<u8>, String), UploadStoreError> {
        if !valid_hash(hash) {
            return Err(UploadStoreError::NotFound);
        }
        let key = self.key_for(hash);
        let obj = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|_| UploadStoreError::NotFound)?;
        let content_type = obj.content_type().map(str::to_string);
        let data = obj.body.collect().await.map_err(|e| UploadStoreError::Other(e.to_string()))?;
        let bytes = Vec::from(data.into_bytes().as_ref());
        let mime = content_type.unwrap_or_else(|| sniff_mime(&bytes));
        Ok((bytes, mime))
    }

    async fn exists(&self, hash: &str) -> Result<bool, UploadStoreError> {
        if !valid_hash(hash) {
            return Ok(false);
        }
        let key = self.key_for(hash);
        match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().map_or(false, |se| se.is_not_found()) => Ok(false),
            Err(e) => {
                error!("head_object failed hash={hash} key={key} bucket={} err={:?}", self.bucket, e);
                Err(UploadStoreError::Other(e.to_string()))
            }
        }
    }
}

/// S3 when `S3_ENDPOINT` is set, otherwise the local upload directory.
pub async fn build_upload_store(upload_dir: &Path) -> anyhow::Result<Arc<dyn UploadStore>> {
    match std::env::var("S3_ENDPOINT") {
        Ok(endpoint) => Ok(Arc::new(S3UploadStore::new(endpoint).await?)),
        Err(_) => {
            info!("Storing uploads under '{}'", upload_dir.display());
            Ok(Arc::new(FsUploadStore::new(upload_dir)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "ab54d286e2bd5cdf2a2e2c6ec7ff8cd6a3b8f1e0a1a2b3c4d5e6f708192a3b4c";

    #[tokio::test]
    async fn fs_store_roundtrip_and_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsUploadStore::new(dir.path());
        store.save(HASH, "text/plain", b"hello").await.unwrap();
        assert!(matches!(store.save(HASH, "text/plain", b"hello").await, Err(UploadStoreError::Duplicate)));
        let (bytes, mime) = store.load(HASH).await.unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(mime, "text/plain");
    }

    #[tokio::test]
    async fn exists_only_for_stored_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsUploadStore::new(dir.path());
        assert!(!store.exists(HASH).await.unwrap());
        store.save(HASH, "text/plain", b"hello").await.unwrap();
        assert!(store.exists(HASH).await.unwrap());
        assert!(!store.exists("not-a-hash").await.unwrap());
        assert!(!store.exists(&HASH[..63]).await.unwrap());
    }

    #[tokio::test]
    async fn fs_store_rejects_path_like_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsUploadStore::new(dir.path());
        assert!(matches!(store.load("../../etc/passwd").await, Err(UploadStoreError::NotFound)));
    }
}
