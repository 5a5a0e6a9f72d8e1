//! Artifact store management: versioned blob-store paths, uploads,
//! retrieval and the per-environment latest pointer.

mod keys;
mod memory;

pub use keys::{
    artifact_key, environment_prefix, identifier_for, identifier_from_key, latest_key,
    validate_key, ARTIFACT_EXT, LATEST_NAME,
};
pub use memory::MemoryObjectStore;

use crate::environment::EnvironmentPolicy;
use crate::errors::{DeployError, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Seam to the external blob store.
///
/// Four operations, all idempotent except `put`. `get` and `exists`
/// must report a missing object as [`StoreError::NotFound`] so callers
/// can distinguish it from transport failures.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Checks whether an object exists.
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError>;

    /// Writes an object.
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Reads an object.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Lists keys under a prefix.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Where an uploaded artifact lives, plus its digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocation {
    /// The bucket holding the object.
    pub bucket: String,
    /// The full object key.
    pub key: String,
    /// The key identifier (version or timestamp).
    pub identifier: String,
    /// Hex-encoded SHA-256 of the artifact bytes.
    pub sha256: String,
    /// Artifact size in bytes.
    pub size: usize,
}

/// Manages artifact placement for one function and bucket.
#[derive(Clone)]
pub struct ArtifactStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    function_name: String,
}

impl ArtifactStore {
    /// Creates a manager over the given object store.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        function_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            function_name: function_name.into(),
        }
    }

    /// The bucket this manager writes to.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Uploads an artifact and best-effort refreshes the latest pointer.
    ///
    /// Correctness depends only on the versioned key; a latest-pointer
    /// failure is logged and swallowed.
    pub async fn put(
        &self,
        bytes: Vec<u8>,
        policy: &EnvironmentPolicy,
        version: &str,
    ) -> Result<ArtifactLocation, StoreError> {
        let identifier = identifier_for(policy, version);
        let key = artifact_key(&self.function_name, policy, &identifier)?;
        let sha256 = hex::encode(Sha256::digest(&bytes));
        let size = bytes.len();

        self.store.put(&self.bucket, &key, bytes.clone()).await?;
        tracing::info!(
            key,
            size,
            sha256 = %sha256,
            "Uploaded artifact"
        );

        if let Err(err) = self.write_latest(bytes, policy).await {
            tracing::warn!(
                environment = %policy.name,
                error = %err,
                "Failed to refresh latest pointer; deploy continues"
            );
        }

        Ok(ArtifactLocation {
            bucket: self.bucket.clone(),
            key,
            identifier,
            sha256,
            size,
        })
    }

    /// Checks whether an artifact exists for the given version.
    ///
    /// `NotFound` is a normal answer (false); transport and auth
    /// failures propagate.
    pub async fn exists(
        &self,
        policy: &EnvironmentPolicy,
        version: &str,
    ) -> Result<bool, StoreError> {
        let key = artifact_key(&self.function_name, policy, version)?;
        self.store.exists(&self.bucket, &key).await
    }

    /// Fetches the artifact for a recorded version.
    ///
    /// A missing version fails loudly with the list of versions
    /// currently available, never silently substituting another one.
    pub async fn get(
        &self,
        policy: &EnvironmentPolicy,
        version: &str,
    ) -> Result<(ArtifactLocation, Vec<u8>), DeployError> {
        let key = artifact_key(&self.function_name, policy, version).map_err(|source| {
            DeployError::Store {
                stage: "fetch-artifact",
                source,
            }
        })?;

        match self.store.get(&self.bucket, &key).await {
            Ok(bytes) => {
                let sha256 = hex::encode(Sha256::digest(&bytes));
                let size = bytes.len();
                Ok((
                    ArtifactLocation {
                        bucket: self.bucket.clone(),
                        key,
                        identifier: version.to_string(),
                        sha256,
                        size,
                    },
                    bytes,
                ))
            }
            Err(StoreError::NotFound { .. }) => {
                let available = self.list_versions(policy).await.unwrap_or_default();
                Err(DeployError::VersionNotFound {
                    version: version.to_string(),
                    environment: policy.name.clone(),
                    available,
                })
            }
            Err(source) => Err(DeployError::Store {
                stage: "fetch-artifact",
                source,
            }),
        }
    }

    /// Points the environment's latest object at the given version's
    /// artifact. Idempotent.
    pub async fn update_latest_pointer(
        &self,
        policy: &EnvironmentPolicy,
        version: &str,
    ) -> Result<(), StoreError> {
        let key = artifact_key(&self.function_name, policy, version)?;
        let bytes = self.store.get(&self.bucket, &key).await?;
        self.write_latest(bytes, policy).await
    }

    /// Lists artifact identifiers present for the environment, sorted.
    pub async fn list_versions(
        &self,
        policy: &EnvironmentPolicy,
    ) -> Result<Vec<String>, StoreError> {
        let prefix = environment_prefix(&self.function_name, policy);
        let keys = self.store.list(&self.bucket, &prefix).await?;
        let mut versions: Vec<String> = keys
            .iter()
            .filter_map(|k| identifier_from_key(k))
            .collect();
        versions.sort_by(compare_versions);
        Ok(versions)
    }

    async fn write_latest(
        &self,
        bytes: Vec<u8>,
        policy: &EnvironmentPolicy,
    ) -> Result<(), StoreError> {
        let key = latest_key(&self.function_name, policy)?;
        self.store.put(&self.bucket, &key, bytes).await
    }
}

/// Orders identifiers numerically where they are semver-shaped,
/// lexically otherwise.
fn compare_versions(a: &String, b: &String) -> std::cmp::Ordering {
    match (semver_tuple(a), semver_tuple(b)) {
        (Some(ta), Some(tb)) => ta.cmp(&tb),
        _ => a.cmp(b),
    }
}

fn semver_tuple(value: &str) -> Option<(u64, u64, u64)> {
    let core = value.split('-').next()?;
    let mut parts = core.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next()?.parse().ok()?;
    Some((major, minor, patch))
}
