use async_trait::async_trait;
use chrono::Utc;
use pkg_constants::state::REGISTRY_ROOT;
use pkg_types::meta::{ObjectKey, Resource};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::client::StateStore;
use crate::error::StoreError;
use crate::watch::EventLog;

/// Narrow get/create/update contract the controllers are written against.
///
/// `create` fails with [`StoreError::AlreadyExists`] when the object is present.
/// `update` is a compare-and-swap on `metadata.resource_version` and fails with
/// [`StoreError::VersionConflict`] when the caller's copy is stale.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get<R: Resource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<R>, StoreError>;

    /// Returns the object as stored, with its assigned uid and version.
    async fn create<R: Resource>(&self, object: &R) -> Result<R, StoreError>;

    /// Returns the object as stored, with its bumped version.
    async fn update<R: Resource>(&self, object: &R) -> Result<R, StoreError>;
}

/// Storage key of an object: `/registry/<plural>/<namespace>/<name>`.
pub fn object_key<R: Resource>(namespace: &str, name: &str) -> String {
    format!("{}/{}/{}/{}", REGISTRY_ROOT, R::PLURAL, namespace, name)
}

/// Split a storage key back into its plural segment and object identity.
pub fn parse_object_key(key: &str) -> Option<(&str, ObjectKey)> {
    let rest = key.strip_prefix(REGISTRY_ROOT)?.strip_prefix('/')?;
    let mut parts = rest.splitn(3, '/');
    let plural = parts.next()?;
    let namespace = parts.next()?;
    let name = parts.next()?;
    if plural.is_empty() || namespace.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((plural, ObjectKey::new(namespace, name)))
}

/// Typed, versioned object registry on top of the raw [`StateStore`].
#[derive(Clone)]
pub struct Registry {
    store: StateStore,
    /// Serializes read-compare-write so each create/update is atomic.
    write_lock: Arc<Mutex<()>>,
}

impl Registry {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Registry over a fresh in-memory store.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let store = StateStore::in_memory()
            .await
            .map_err(StoreError::unavailable)?;
        Ok(Self::new(store))
    }

    pub fn events(&self) -> &EventLog {
        &self.store.event_log
    }

    pub fn into_store(self) -> StateStore {
        self.store
    }

    /// All objects of a kind, optionally restricted to one namespace.
    pub async fn list<R: Resource>(&self, namespace: Option<&str>) -> Result<Vec<R>, StoreError> {
        let prefix = match namespace {
            Some(ns) => format!("{}/{}/{}/", REGISTRY_ROOT, R::PLURAL, ns),
            None => format!("{}/{}/", REGISTRY_ROOT, R::PLURAL),
        };
        let entries = self
            .store
            .list_prefix(&prefix)
            .await
            .map_err(StoreError::unavailable)?;
        entries
            .into_iter()
            .map(|(key, value)| decode::<R>(&key, &value))
            .collect()
    }

    pub async fn delete<R: Resource>(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let key = object_key::<R>(namespace, name);
        let _guard = self.write_lock.lock().await;
        if self.read::<R>(&key).await?.is_none() {
            return Err(StoreError::NotFound {
                kind: R::KIND,
                key: ObjectKey::new(namespace, name),
            });
        }
        self.store
            .delete(&key)
            .await
            .map_err(StoreError::unavailable)
    }

    async fn read<R: Resource>(&self, key: &str) -> Result<Option<R>, StoreError> {
        match self.store.get(key).await.map_err(StoreError::unavailable)? {
            Some(value) => decode(key, &value).map(Some),
            None => Ok(None),
        }
    }

    async fn write<R: Resource>(&self, key: &str, object: &R) -> Result<(), StoreError> {
        let data = serde_json::to_vec(object).map_err(|e| StoreError::Codec {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.store
            .put(key, &data)
            .await
            .map_err(StoreError::unavailable)
    }
}

fn decode<R: Resource>(key: &str, value: &[u8]) -> Result<R, StoreError> {
    serde_json::from_slice(value).map_err(|e| StoreError::Codec {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl ObjectStore for Registry {
    async fn get<R: Resource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<R>, StoreError> {
        self.read(&object_key::<R>(namespace, name)).await
    }

    async fn create<R: Resource>(&self, object: &R) -> Result<R, StoreError> {
        let id = object.key();
        let key = object_key::<R>(&id.namespace, &id.name);

        let _guard = self.write_lock.lock().await;
        if self.read::<R>(&key).await?.is_some() {
            return Err(StoreError::AlreadyExists { kind: R::KIND, key: id });
        }

        let mut stored = object.clone();
        stored.on_create();
        let meta = stored.metadata_mut();
        meta.uid = Uuid::new_v4().to_string();
        meta.resource_version = 1;
        meta.created_at = Utc::now();

        self.write(&key, &stored).await?;
        debug!("Created {} {}", R::KIND, id);
        Ok(stored)
    }

    async fn update<R: Resource>(&self, object: &R) -> Result<R, StoreError> {
        let id = object.key();
        let key = object_key::<R>(&id.namespace, &id.name);

        let _guard = self.write_lock.lock().await;
        let current: R = match self.read(&key).await? {
            Some(current) => current,
            None => return Err(StoreError::NotFound { kind: R::KIND, key: id }),
        };

        let actual = current.metadata().resource_version;
        let expected = object.metadata().resource_version;
        if expected != actual {
            return Err(StoreError::VersionConflict {
                kind: R::KIND,
                key: id,
                expected,
                actual,
            });
        }

        let mut stored = object.clone();
        let meta = stored.metadata_mut();
        meta.resource_version = actual + 1;
        meta.uid = current.metadata().uid.clone();
        meta.created_at = current.metadata().created_at;

        self.write(&key, &stored).await?;
        debug!(
            "Updated {} {} (version {})",
            R::KIND,
            id,
            stored.metadata().resource_version
        );
        Ok(stored)
    }
}
