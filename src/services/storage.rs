use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use thiserror::Error;

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("S3 error: {0}")]
    S3(String),
}

/// Key-to-bytes storage for raw uploaded files.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn ContentStore>, StorageError> {
    match config {
        StorageConfig::Local { root } => Ok(Arc::new(LocalStore::new(root.clone()).await?)),
        StorageConfig::S3 { .. } => Ok(Arc::new(S3Store::new(config)?)),
    }
}

/// Keys are generated file names; anything that could escape the root is refused.
fn check_key(key: &str) -> Result<(), StorageError> {
    let ok = !key.is_empty()
        && key != "."
        && key != ".."
        && !key.contains(['/', '\\'])
        && !key.contains('\0');
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub async fn new(root: PathBuf) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(&root).await?;
        tracing::info!("Uploads directory: {}", root.display());
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ContentStore for LocalStore {
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket_name: String,
}

impl S3Store {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let StorageConfig::S3 {
            bucket,
            region,
            endpoint,
            access_key_id,
            secret_access_key,
        } = config
        else {
            return Err(StorageError::S3("storage backend is not s3".to_string()));
        };

        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key_id.clone(),
            secret_access_key.clone(),
            None,
            None,
            "manual_config",
        );

        let mut s3_config_builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = endpoint {
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(s3_config_builder.build()),
            bucket_name: bucket.clone(),
        })
    }
}

#[async_trait]
impl ContentStore for S3Store {
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        check_key(key)?;
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("failed to upload {}: {}", key, e)))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        check_key(key)?;
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::S3(format!("failed to download {}: {}", key, e))
                }
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(format!("failed to read body of {}: {}", key, e)))?;

        Ok(data.into_bytes().to_vec())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        check_key(key)?;
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("failed to delete {}: {}", key, e)))?;

        Ok(())
    }
}
