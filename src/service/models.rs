use serde::{Deserialize, Serialize};

/// A stored stateful link. `long_url` is relative to the tenant's base URL
/// when it was issued under one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub short_code: String,
    pub long_url: String,
    #[serde(default)]
    pub tenant_id: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    #[serde(rename = "tenant_id")]
    pub id: String,
    #[serde(rename = "tenant_name")]
    pub name: String,
    pub base_url: String,
    pub active: bool,
}
