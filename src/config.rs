use std::collections::HashMap;
use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

use crate::idgen::MAX_NODE_ID;

/// Rounds used when `FEISTEL_ROUNDS` is not set.
pub const DEFAULT_ROUNDS: u8 = 3;
pub const MAX_ROUNDS: u8 = 10;
pub const AES_KEY_LENGTH: usize = 32;

/// Startup configuration errors. All of them are fatal.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} not set")]
    MissingVar(&'static str),

    #[error("invalid FEISTEL_KEYS value: {0:?}")]
    InvalidFeistelKey(String),

    #[error("at least one Feistel key is required")]
    NoFeistelKeys,

    #[error("active Feistel version {version} out of range (have {available} keys)")]
    InvalidVersion { version: String, available: usize },

    #[error("invalid FEISTEL_ROUNDS {0:?} (must be between 1 and 10)")]
    InvalidRounds(String),

    #[error("AES_SECRET must be exactly 32 bytes, got {0}")]
    InvalidAesSecretLength(usize),

    #[error("HMAC_SECRET must not be empty")]
    EmptyHmacSecret,

    #[error("node id {0:?} out of range (must be between 0 and 1023)")]
    InvalidNodeId(String),
}

/// Versioned 32-bit Feistel keys plus the secret used to derive tenant keys.
///
/// Encoding and decoding must see the same key and round count; a mismatch
/// produces a different permutation rather than an error.
#[derive(Clone)]
pub struct FeistelKeyMaterial {
    keys: Vec<u32>,
    active_version: usize,
    rounds: u8,
    master_secret: Option<Vec<u8>>,
}

impl FeistelKeyMaterial {
    /// Creates key material with the given keys, the first one active and
    /// the default round count.
    pub fn new(keys: Vec<u32>) -> Result<Self, ConfigError> {
        if keys.is_empty() {
            return Err(ConfigError::NoFeistelKeys);
        }
        Ok(FeistelKeyMaterial {
            keys,
            active_version: 0,
            rounds: DEFAULT_ROUNDS,
            master_secret: None,
        })
    }

    /// Selects the key version used for new codes.
    pub fn active_version(mut self, version: usize) -> Result<Self, ConfigError> {
        if version >= self.keys.len() {
            return Err(ConfigError::InvalidVersion {
                version: version.to_string(),
                available: self.keys.len(),
            });
        }
        self.active_version = version;
        Ok(self)
    }

    /// Sets the number of Feistel rounds. The value must be between 1 and 10.
    pub fn rounds(mut self, rounds: u8) -> Result<Self, ConfigError> {
        if rounds == 0 || rounds > MAX_ROUNDS {
            return Err(ConfigError::InvalidRounds(rounds.to_string()));
        }
        self.rounds = rounds;
        Ok(self)
    }

    /// Sets the secret that tenant keys are derived from. Without it every
    /// tenant shares the active key.
    pub fn master_secret(mut self, secret: &[u8]) -> Self {
        self.master_secret = if secret.is_empty() {
            None
        } else {
            Some(secret.to_vec())
        };
        self
    }

    pub fn round_count(&self) -> u8 {
        self.rounds
    }

    pub fn active_key(&self) -> u32 {
        self.keys[self.active_version]
    }

    pub fn active_key_version(&self) -> usize {
        self.active_version
    }

    /// Returns the key registered under `version`, if any.
    pub fn key(&self, version: usize) -> Option<u32> {
        self.keys.get(version).copied()
    }

    pub fn has_master_secret(&self) -> bool {
        self.master_secret.is_some()
    }

    /// Derives the 32-bit key for `tenant_id`.
    ///
    /// HKDF-SHA256 over the master secret with `tenant/<id>` as info. An
    /// empty tenant id, or a missing master secret, yields the active key.
    ///
    /// Keys from deployments that hashed tenant id and secret with FNV-1a
    /// differ from these, so tenant-scoped codes they issued will not decode
    /// here. Codes issued without a tenant use the active key and still do.
    pub fn tenant_key(&self, tenant_id: &str) -> u32 {
        match (&self.master_secret, tenant_id.is_empty()) {
            (Some(secret), false) => derive_tenant_key(secret, tenant_id),
            _ => self.active_key(),
        }
    }
}

fn derive_tenant_key(secret: &[u8], tenant_id: &str) -> u32 {
    let hkdf = Hkdf::<Sha256>::new(None, secret);
    let mut okm = [0u8; 4];
    hkdf.expand(format!("tenant/{}", tenant_id).as_bytes(), &mut okm)
        .expect("Length 4 should be valid");
    u32::from_be_bytes(okm)
}

impl fmt::Debug for FeistelKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FeistelKeyMaterial")
            .field("versions", &self.keys.len())
            .field("active_version", &self.active_version)
            .field("rounds", &self.rounds)
            .field("master_secret", &self.master_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Process-wide key material, loaded once at startup and passed explicitly to
/// every component that needs it.
#[derive(Clone)]
pub struct CryptoConfig {
    pub(crate) feistel: FeistelKeyMaterial,
    pub(crate) aes_secret: [u8; AES_KEY_LENGTH],
    pub(crate) hmac_secret: Vec<u8>,
    pub(crate) node_id: u16,
}

impl CryptoConfig {
    /// Builds a configuration from already-parsed parts.
    pub fn new(
        feistel: FeistelKeyMaterial,
        aes_secret: &[u8],
        hmac_secret: &[u8],
    ) -> Result<Self, ConfigError> {
        let aes_secret: [u8; AES_KEY_LENGTH] = aes_secret
            .try_into()
            .map_err(|_| ConfigError::InvalidAesSecretLength(aes_secret.len()))?;
        if hmac_secret.is_empty() {
            return Err(ConfigError::EmptyHmacSecret);
        }
        Ok(CryptoConfig {
            feistel,
            aes_secret,
            hmac_secret: hmac_secret.to_vec(),
            node_id: 0,
        })
    }

    /// Sets the generator node id. The value must be between 0 and 1023.
    pub fn node_id(mut self, node_id: u16) -> Result<Self, ConfigError> {
        if node_id > MAX_NODE_ID {
            return Err(ConfigError::InvalidNodeId(node_id.to_string()));
        }
        self.node_id = node_id;
        Ok(self)
    }

    /// Loads the configuration from the process environment, reading a
    /// `.env` file first when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_vars(std::env::vars())
    }

    /// Loads the configuration from explicit key/value pairs, using the same
    /// variable names as [`CryptoConfig::from_env`].
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let get = |name: &'static str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

        let keys = get("FEISTEL_KEYS")
            .ok_or(ConfigError::MissingVar("FEISTEL_KEYS"))?
            .split(',')
            .map(|k| {
                k.trim()
                    .parse::<u32>()
                    .map_err(|_| ConfigError::InvalidFeistelKey(k.trim().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let available = keys.len();

        let version = get("ACTIVE_FEISTEL_VERSION")
            .ok_or(ConfigError::MissingVar("ACTIVE_FEISTEL_VERSION"))?;
        let version = version.parse::<usize>().map_err(|_| ConfigError::InvalidVersion {
            version: version.to_string(),
            available,
        })?;

        let rounds = match get("FEISTEL_ROUNDS") {
            None => DEFAULT_ROUNDS,
            Some(r) => r
                .parse::<u8>()
                .map_err(|_| ConfigError::InvalidRounds(r.to_string()))?,
        };

        let mut feistel = FeistelKeyMaterial::new(keys)?
            .active_version(version)?
            .rounds(rounds)?;
        match get("MASTER_FEISTEL_SECRET") {
            Some(secret) => feistel = feistel.master_secret(secret.as_bytes()),
            None => warn!("MASTER_FEISTEL_SECRET not set, tenant-scoped keys disabled"),
        }

        let aes_secret = vars.get("AES_SECRET").ok_or(ConfigError::MissingVar("AES_SECRET"))?;
        let hmac_secret = vars.get("HMAC_SECRET").ok_or(ConfigError::MissingVar("HMAC_SECRET"))?;
        let config = CryptoConfig::new(feistel, aes_secret.as_bytes(), hmac_secret.as_bytes())?;

        match get("NODE_ID") {
            None => Ok(config),
            Some(n) => {
                let node_id = n
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidNodeId(n.to_string()))?;
                config.node_id(node_id)
            }
        }
    }

    pub fn feistel(&self) -> &FeistelKeyMaterial {
        &self.feistel
    }

    pub fn generator_node_id(&self) -> u16 {
        self.node_id
    }
}

impl fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CryptoConfig")
            .field("feistel", &self.feistel)
            .field("aes_secret", &"<redacted>")
            .field("hmac_secret", &"<redacted>")
            .field("node_id", &self.node_id)
            .finish()
    }
}
