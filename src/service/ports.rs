//! Collaborators the link service talks to. Drivers live outside this crate;
//! the in-memory versions here back tests and single-process embedding.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::models::{LinkRecord, Tenant};
use crate::error::Error;

/// Persistent link storage, unique on short code.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, record: LinkRecord) -> Result<(), Error>;
    async fn find_by_code(&self, short_code: &str) -> Result<Option<LinkRecord>, Error>;
}

/// Best-effort accelerator in front of the store.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Error>;
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;
}

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn get_by_id(&self, tenant_id: &str) -> Result<Option<Tenant>, Error>;
}

#[derive(Default)]
pub struct MemoryStore {
    inner: DashMap<String, LinkRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, record: LinkRecord) -> Result<(), Error> {
        match self.inner.entry(record.short_code.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Error::Store(format!(
                "duplicate short code {}",
                record.short_code
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn find_by_code(&self, short_code: &str) -> Result<Option<LinkRecord>, Error> {
        Ok(self.inner.get(short_code).map(|r| r.value().clone()))
    }
}

/// Entries carry their deadline; `None` never expires.
#[derive(Default)]
pub struct MemoryCache {
    inner: DashMap<String, (String, Option<Instant>)>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Error> {
        let expires = Instant::now().checked_add(ttl);
        self.inner.insert(key.to_string(), (value.to_string(), expires));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let now = Instant::now();
        let live = |expires: &Option<Instant>| expires.map_or(true, |at| now < at);

        if let Some(entry) = self.inner.get(key) {
            let (value, expires) = entry.value();
            if live(expires) {
                return Ok(Some(value.clone()));
            }
        }
        // Re-checked under the shard lock so a concurrent fresh write survives.
        self.inner.remove_if(key, |_, (_, expires)| !live(expires));
        Ok(None)
    }
}

#[derive(Default)]
pub struct MemoryTenants {
    inner: DashMap<String, Tenant>,
}

impl MemoryTenants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, tenant: Tenant) {
        self.inner.insert(tenant.id.clone(), tenant);
    }
}

#[async_trait]
impl TenantDirectory for MemoryTenants {
    async fn get_by_id(&self, tenant_id: &str) -> Result<Option<Tenant>, Error> {
        Ok(self.inner.get(tenant_id).map(|t| t.value().clone()))
    }
}
