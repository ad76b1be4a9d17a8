use tracing::debug;

use crate::compress::{compress, decompress};
use crate::config::{CryptoConfig, FeistelKeyMaterial};
use crate::error::{Error, MalformedKind};
use crate::feistel::{deobfuscate, deobfuscate_bytes, obfuscate, obfuscate_bytes};
use crate::shortcode;

/// Framing byte in front of variable-length payloads. Base62 drops leading
/// zero bytes, and the marker keeps the first real byte from being one.
pub(crate) const MARKER: u8 = 1;

/// Tenant-scoped encoder/decoder for stateful ids and stateless payloads.
///
/// Stateful: `id -> obfuscate -> base62`. Stateless:
/// `bytes -> zlib -> obfuscate_bytes -> marker -> base62`. Both use the key
/// derived for the tenant, so a code issued for one tenant decodes to garbage
/// under another tenant's key.
#[derive(Debug, Clone)]
pub struct Codec {
    keys: FeistelKeyMaterial,
    base_key: u32,
}

impl Codec {
    /// Creates a codec using the active key version.
    ///
    /// # Examples
    ///
    /// ```
    /// use linkcode::{Codec, CryptoConfig, FeistelKeyMaterial};
    ///
    /// let keys = FeistelKeyMaterial::new(vec![777]).unwrap();
    /// let config = CryptoConfig::new(keys, &[7u8; 32], b"hmac-secret").unwrap();
    /// let codec = Codec::new(&config);
    ///
    /// let code = codec.encode_id(12345, "");
    /// assert_eq!(codec.decode_id(&code, "").unwrap(), 12345);
    /// ```
    pub fn new(config: &CryptoConfig) -> Codec {
        Codec::from_keys(config.feistel().clone())
    }

    pub fn from_keys(keys: FeistelKeyMaterial) -> Codec {
        let base_key = keys.active_key();
        Codec { keys, base_key }
    }

    /// Returns a codec bound to an older key version, for codes issued
    /// before a rotation. Tenant-derived keys are unaffected by versions.
    pub fn with_version(&self, version: usize) -> Option<Codec> {
        let base_key = self.keys.key(version)?;
        Some(Codec {
            keys: self.keys.clone(),
            base_key,
        })
    }

    fn key_for(&self, tenant_id: &str) -> u32 {
        if tenant_id.is_empty() || !self.keys.has_master_secret() {
            self.base_key
        } else {
            self.keys.tenant_key(tenant_id)
        }
    }

    fn rounds(&self) -> u8 {
        self.keys.round_count()
    }

    /// Encodes a generated id into a short code for `tenant_id` (empty for
    /// no tenant).
    pub fn encode_id(&self, id: u64, tenant_id: &str) -> String {
        let obfuscated = obfuscate(id, self.key_for(tenant_id), self.rounds());
        shortcode::encode_u64(obfuscated)
    }

    /// Recovers the id behind a short code.
    ///
    /// A code from another tenant still decodes, to an unrelated id; callers
    /// rely on the store lookup to reject it.
    pub fn decode_id(&self, code: &str, tenant_id: &str) -> Result<u64, Error> {
        let obfuscated = shortcode::decode_u64(code)?;
        Ok(deobfuscate(obfuscated, self.key_for(tenant_id), self.rounds()))
    }

    /// Encodes an arbitrary payload without any stored state.
    pub fn encode_payload(&self, data: &[u8], tenant_id: &str) -> Result<String, Error> {
        let key = self.key_for(tenant_id).to_be_bytes();
        let obfuscated = obfuscate_bytes(&compress(data)?, &key, self.rounds());

        let mut framed = Vec::with_capacity(obfuscated.len() + 1);
        framed.push(MARKER);
        framed.extend_from_slice(&obfuscated);
        Ok(shortcode::encode_bytes(&framed))
    }

    /// Inverse of [`Codec::encode_payload`].
    ///
    /// There is no integrity tag in this mode: a flipped bit or a foreign
    /// tenant key shows up as [`Error::CorruptedData`] when the inflated
    /// stream fails to parse.
    pub fn decode_payload(&self, code: &str, tenant_id: &str) -> Result<Vec<u8>, Error> {
        shortcode::validate_token(code)?;
        let framed = shortcode::decode_bytes(code)?;
        let obfuscated = unframe(&framed)?;

        let key = self.key_for(tenant_id).to_be_bytes();
        let compressed = deobfuscate_bytes(obfuscated, &key, self.rounds());
        decompress(&compressed).map_err(|e| {
            debug!(tenant_id, "stateless payload failed to inflate");
            e
        })
    }
}

/// Strips and checks the framing marker.
pub(crate) fn unframe(framed: &[u8]) -> Result<&[u8], Error> {
    match framed.split_first() {
        None => Err(MalformedKind::TooShort.into()),
        Some((&MARKER, rest)) => Ok(rest),
        Some((&received, _)) => Err(MalformedKind::MarkerMismatch {
            received,
            expected: MARKER,
        }
        .into()),
    }
}
