//! Link issuing and resolution across the three modes.
//!
//! Stateful links store a record keyed by an obfuscated id; stateless links
//! carry the whole URL in the code; secure links carry it encrypted and
//! signed. Only the stateful mode touches the store and cache.

mod models;
mod ports;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::codec::Codec;
use crate::config::{ConfigError, CryptoConfig};
use crate::error::Error;
use crate::idgen::IdGenerator;
use crate::secure::SecureTokens;
use crate::shortcode::{validate_short_code, validate_token};

pub use models::{LinkRecord, Tenant};
pub use ports::{
    DocumentStore, KeyValueCache, MemoryCache, MemoryStore, MemoryTenants, TenantDirectory,
};

/// How long resolved URLs stay in the cache.
pub const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Returns the part of `long_url` below `base_url` (path, query and
/// fragment), or `None` when the URL is not under the base or would not
/// rebuild to the same string.
fn relative_to_base(long_url: &str, base_url: &str) -> Option<String> {
    let base = Url::parse(base_url).ok()?;
    let url = Url::parse(long_url).ok()?;
    if url.as_str() != long_url || url.origin() != base.origin() {
        return None;
    }

    let rest = url.path().strip_prefix(base.path().trim_end_matches('/'))?;
    if !rest.starts_with('/') || rest == "/" {
        return None;
    }

    let mut relative = rest.to_string();
    if let Some(query) = url.query() {
        relative.push('?');
        relative.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        relative.push('#');
        relative.push_str(fragment);
    }
    Some(relative)
}

fn join_base(base_url: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

pub struct LinkService {
    codec: Codec,
    secure: SecureTokens,
    ids: IdGenerator,
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn KeyValueCache>,
    tenants: Arc<dyn TenantDirectory>,
}

impl LinkService {
    pub fn new(
        config: &CryptoConfig,
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn KeyValueCache>,
        tenants: Arc<dyn TenantDirectory>,
    ) -> Result<Self, ConfigError> {
        Ok(LinkService {
            codec: Codec::new(config),
            secure: SecureTokens::new(config),
            ids: IdGenerator::new(config.generator_node_id())?,
            store,
            cache,
            tenants,
        })
    }

    async fn tenant_base(&self, tenant_id: &str) -> Option<String> {
        if tenant_id.is_empty() {
            return None;
        }
        match self.tenants.get_by_id(tenant_id).await {
            Ok(Some(tenant)) if !tenant.base_url.is_empty() => Some(tenant.base_url),
            Ok(_) => None,
            Err(e) => {
                warn!(tenant_id, error = %e, "tenant lookup failed");
                None
            }
        }
    }

    async fn shrink(&self, long_url: &str, tenant_id: &str) -> String {
        self.tenant_base(tenant_id)
            .await
            .and_then(|base| relative_to_base(long_url, &base))
            .unwrap_or_else(|| long_url.to_string())
    }

    async fn expand(&self, stored: String, tenant_id: &str) -> String {
        if is_absolute(&stored) {
            return stored;
        }
        match self.tenant_base(tenant_id).await {
            Some(base) => join_base(&base, &stored),
            None => stored,
        }
    }

    async fn cache_set(&self, code: &str, url: &str) {
        if let Err(e) = self.cache.set(code, url, CACHE_TTL).await {
            warn!(code, error = %e, "cache write failed");
        }
    }

    /// Issues a stateful short code for `long_url` under `tenant_id` (empty
    /// for no tenant).
    pub async fn create(&self, long_url: &str, tenant_id: &str) -> Result<String, Error> {
        let stored = self.shrink(long_url, tenant_id).await;
        let code = self.codec.encode_id(self.ids.next_id(), tenant_id);

        self.store
            .insert(LinkRecord {
                short_code: code.clone(),
                long_url: stored,
                tenant_id: tenant_id.to_string(),
                created_at: chrono::Utc::now().timestamp(),
            })
            .await?;
        self.cache_set(&code, long_url).await;

        info!(code = %code, tenant_id, "issued stateful link");
        Ok(code)
    }

    /// Resolves a stateful short code to its full URL.
    pub async fn resolve(&self, code: &str) -> Result<String, Error> {
        validate_short_code(code)?;

        match self.cache.get(code).await {
            Ok(Some(url)) if is_absolute(&url) => return Ok(url),
            Ok(_) => {}
            Err(e) => debug!(code, error = %e, "cache read failed, using store"),
        }

        let record = self
            .store
            .find_by_code(code)
            .await?
            .ok_or(Error::NotFound)?;
        let url = self.expand(record.long_url, &record.tenant_id).await;

        self.cache_set(code, &url).await;
        Ok(url)
    }

    /// Issues a stateless code. With `trim`, a URL under the tenant's base is
    /// encoded relative to it and re-prefixed on resolution.
    pub async fn create_stateless(
        &self,
        long_url: &str,
        tenant_id: &str,
        trim: bool,
    ) -> Result<String, Error> {
        let payload = if trim {
            self.shrink(long_url, tenant_id).await
        } else {
            long_url.to_string()
        };
        self.codec.encode_payload(payload.as_bytes(), tenant_id)
    }

    pub async fn resolve_stateless(&self, code: &str, tenant_id: &str) -> Result<String, Error> {
        validate_token(code)?;
        let bytes = self.codec.decode_payload(code, tenant_id)?;
        let url = String::from_utf8(bytes).map_err(|_| Error::CorruptedData)?;
        Ok(self.expand(url, tenant_id).await)
    }

    pub fn create_secure(&self, long_url: &str) -> Result<String, Error> {
        self.secure.create(long_url)
    }

    pub fn resolve_secure(&self, token: &str) -> Result<String, Error> {
        validate_token(token)?;
        self.secure.resolve(token).map_err(|e| {
            debug!(kind = e.kind(), "secure token rejected");
            e
        })
    }
}
