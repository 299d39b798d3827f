//! RemoteStorage - object_store をバックエンドとする tier
//!
//! # 実装詳細
//! - S3 互換エンドポイント（MinIO など）は `AmazonS3Builder` で接続
//! - tier ごとの既定 ACL（incoming は private、active は public-read）は
//!   クライアントの既定ヘッダー `x-amz-acl` で付与する
//! - 書き込みごとに Cache-Control と Content-Type を設定し、
//!   incoming tier では有効期限マーカー（`expires` メタデータ）も付ける
//! - テストでは `object_store::memory::InMemory` を使用
//!
//! 存在しないキーの削除は成功扱い（S3 と同じ挙動）。

use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use futures::TryStreamExt;
use http::{HeaderMap, HeaderValue};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{
    Attribute, AttributeValue, Attributes, ClientOptions, ObjectStore, PutOptions, PutPayload,
};
use tracing::debug;

use crate::config::S3TierConfig;
use crate::domain::{StorageError, content_type_for_key};
use crate::ports::{Clock, StoredObject};

/// Default access policy applied by the tier's client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannedAcl {
    Private,
    PublicRead,
}

impl CannedAcl {
    pub fn header_value(self) -> &'static str {
        match self {
            CannedAcl::Private => "private",
            CannedAcl::PublicRead => "public-read",
        }
    }
}

/// Metadata attached to every write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePolicy {
    pub cache_control: String,
    /// Lifetime marker; only set for the incoming tier.
    pub expires_after: Option<TimeDelta>,
}

impl WritePolicy {
    pub fn public(cache_control: impl Into<String>) -> Self {
        Self {
            cache_control: cache_control.into(),
            expires_after: None,
        }
    }

    pub fn expiring(cache_control: impl Into<String>, after: TimeDelta) -> Self {
        Self {
            cache_control: cache_control.into(),
            expires_after: Some(after),
        }
    }
}

#[derive(Clone)]
pub struct RemoteStorage {
    store: Arc<dyn ObjectStore>,
    /// endpoint + bucket; two tiers with the same location share a store.
    location: String,
    root: Option<ObjectPath>,
    policy: WritePolicy,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RemoteStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStorage")
            .field("location", &self.location)
            .field("root", &self.root)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RemoteStorage {
    pub fn new(
        location: impl Into<String>,
        store: Arc<dyn ObjectStore>,
        policy: WritePolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            location: location.into(),
            root: None,
            policy,
            clock,
        }
    }

    /// Connect to an S3-compatible bucket.
    pub fn s3(
        config: &S3TierConfig,
        acl: CannedAcl,
        policy: WritePolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        let mut headers = HeaderMap::new();
        headers.insert("x-amz-acl", HeaderValue::from_static(acl.header_value()));

        let store = AmazonS3Builder::new()
            .with_endpoint(&config.endpoint)
            .with_allow_http(config.endpoint.starts_with("http://"))
            .with_bucket_name(&config.bucket)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_key)
            .with_region(&config.region)
            .with_client_options(ClientOptions::new().with_default_headers(headers))
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let location = format!("{}/{}", config.endpoint.trim_end_matches('/'), config.bucket);
        let tier = Self::new(location, Arc::new(store), policy, clock);
        Ok(match &config.root {
            Some(root) => tier.with_root(root.as_str()),
            None => tier,
        })
    }

    /// Keep this tier's objects under a path prefix of the store.
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(ObjectPath::from(root.into()));
        self
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn path(&self, key: &str) -> ObjectPath {
        match &self.root {
            Some(root) => root.child(key),
            None => ObjectPath::from_iter([key]),
        }
    }

    fn key_of(&self, location: &ObjectPath) -> Option<String> {
        let parts: Vec<_> = match &self.root {
            Some(root) => location.prefix_match(root)?.collect(),
            None => location.parts().collect(),
        };
        match parts.as_slice() {
            [part] => Some(part.as_ref().to_string()),
            _ => None,
        }
    }

    fn attributes(&self, key: &str) -> Result<Attributes, StorageError> {
        let content_type = content_type_for_key(key)
            .ok_or_else(|| StorageError::UnsupportedContentType(key.to_string()))?;

        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::CacheControl,
            AttributeValue::from(self.policy.cache_control.clone()),
        );
        attributes.insert(Attribute::ContentType, AttributeValue::from(content_type));
        if let Some(after) = self.policy.expires_after {
            let expires = (self.clock.now() + after).to_rfc2822();
            attributes.insert(
                Attribute::Metadata(Cow::Borrowed("expires")),
                AttributeValue::from(expires),
            );
        }
        Ok(attributes)
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.store.head(&self.path(key)).await.is_ok()
    }

    pub async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let result = self
            .store
            .get(&self.path(key))
            .await
            .map_err(|e| StorageError::from_remote(key, e))?;
        result
            .bytes()
            .await
            .map_err(|e| StorageError::from_remote(key, e))
    }

    pub async fn put(&self, key: &str, src: &Path) -> Result<(), StorageError> {
        let data = tokio::fs::read(src)
            .await
            .map_err(|e| StorageError::from_io(key, e))?;
        self.put_bytes(key, Bytes::from(data)).await
    }

    pub async fn put_bytes(&self, key: &str, bytes: Bytes) -> Result<(), StorageError> {
        let opts = PutOptions {
            attributes: self.attributes(key)?,
            ..Default::default()
        };
        self.store
            .put_opts(&self.path(key), PutPayload::from(bytes), opts)
            .await
            .map_err(|e| StorageError::from_remote(key, e))?;
        debug!(key, location = %self.location, "remote put");
        Ok(())
    }

    /// Succeeds when the key is absent.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self.store.delete(&self.path(key)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(StorageError::from_remote(key, e)),
        }
    }

    pub async fn last_modified(&self, key: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        match self.store.head(&self.path(key)).await {
            Ok(meta) => Ok(Some(meta.last_modified)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(StorageError::from_remote(key, e)),
        }
    }

    pub async fn list(&self) -> Result<Vec<StoredObject>, StorageError> {
        let metas: Vec<_> = self
            .store
            .list(self.root.as_ref())
            .try_collect()
            .await
            .map_err(|e| StorageError::from_remote(&self.location, e))?;

        let mut objects: Vec<_> = metas
            .into_iter()
            .filter_map(|meta| {
                Some(StoredObject {
                    key: self.key_of(&meta.location)?,
                    last_modified: meta.last_modified,
                })
            })
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    /// Server-side copy when both tiers share a store and write policy,
    /// otherwise the bytes pass through this process.
    pub async fn copy_to(&self, key: &str, dest: &RemoteStorage) -> Result<(), StorageError> {
        if self.location == dest.location && self.policy == dest.policy {
            return self
                .store
                .copy(&self.path(key), &dest.path(key))
                .await
                .map_err(|e| StorageError::from_remote(key, e));
        }
        let bytes = self.get(key).await?;
        dest.put_bytes(key, bytes).await
    }
}
