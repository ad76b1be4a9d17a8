//! Authenticated short tokens.
//!
//! Token bytes, before Base62:
//!
//! ```text
//! [1 byte: marker=1][12 bytes: nonce][N bytes: AES-256-GCM ciphertext + tag][32 bytes: HMAC-SHA256]
//! ```
//!
//! The HMAC covers nonce and ciphertext and is checked before anything is
//! decrypted. Tokens are self-contained: no store, no tenant scoping.

use aes::Aes256;
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{AesGcm, Nonce};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::codec::{unframe, MARKER};
use crate::compress::{compress, decompress};
use crate::config::CryptoConfig;
use crate::error::{Error, MalformedKind};
use crate::shortcode;

type HmacSha256 = Hmac<Sha256>;
type Aes256Gcm = AesGcm<Aes256, U12>;

pub const NONCE_LENGTH: usize = 12;
pub const TAG_LENGTH: usize = 32;

fn nonce() -> [u8; NONCE_LENGTH] {
    rand::thread_rng().gen::<[u8; NONCE_LENGTH]>()
}

/// Creates and resolves tamper-evident tokens.
#[derive(Clone)]
pub struct SecureTokens {
    cipher: Aes256Gcm,
    hmac: HmacSha256,
}

impl SecureTokens {
    pub fn new(config: &CryptoConfig) -> SecureTokens {
        SecureTokens {
            cipher: Aes256Gcm::new_from_slice(&config.aes_secret)
                .expect("Key length 32 should be valid"),
            hmac: <HmacSha256 as Mac>::new_from_slice(&config.hmac_secret)
                .expect("HMAC accepts keys of any length"),
        }
    }

    fn tag(&self, data: &[u8]) -> HmacSha256 {
        let mut hmac = self.hmac.clone();
        hmac.update(data);
        hmac
    }

    /// Compresses, encrypts and signs `long_url`.
    ///
    /// # Examples
    ///
    /// ```
    /// use linkcode::{CryptoConfig, FeistelKeyMaterial, SecureTokens};
    ///
    /// let keys = FeistelKeyMaterial::new(vec![777]).unwrap();
    /// let config = CryptoConfig::new(keys, &[7u8; 32], b"hmac-secret").unwrap();
    /// let tokens = SecureTokens::new(&config);
    ///
    /// let token = tokens.create("https://example.com/a").unwrap();
    /// assert_eq!(tokens.resolve(&token).unwrap(), "https://example.com/a");
    /// ```
    pub fn create(&self, long_url: &str) -> Result<String, Error> {
        let nonce = nonce();
        let compressed = compress(long_url.as_bytes())?;
        let ciphertext = self
            .cipher
            .encrypt(Nonce::<U12>::from_slice(&nonce), &compressed[..])
            .map_err(|_| Error::EncryptionFailed)?;

        let mut payload = Vec::with_capacity(1 + NONCE_LENGTH + ciphertext.len() + TAG_LENGTH);
        payload.push(MARKER);
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);

        let tag = self.tag(&payload[1..]).finalize().into_bytes();
        payload.extend_from_slice(&tag);

        Ok(shortcode::encode_bytes(&payload))
    }

    /// Verifies and opens a token produced by [`SecureTokens::create`].
    pub fn resolve(&self, token: &str) -> Result<String, Error> {
        shortcode::validate_token(token)?;
        let framed = shortcode::decode_bytes(token)?;
        let data = unframe(&framed)?;
        if data.len() < TAG_LENGTH {
            debug!(len = data.len(), "secure token shorter than its tag");
            return Err(MalformedKind::TooShort.into());
        }

        let (sealed, received) = data.split_at(data.len() - TAG_LENGTH);
        if self.tag(sealed).verify_slice(received).is_err() {
            warn!(event = "tamper_detected", "secure token failed integrity check");
            return Err(Error::TamperDetected);
        }

        if sealed.len() < NONCE_LENGTH {
            return Err(Error::DecryptionFailed);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LENGTH);
        let compressed = self
            .cipher
            .decrypt(Nonce::<U12>::from_slice(nonce), ciphertext)
            .map_err(|_| Error::DecryptionFailed)?;

        let original = decompress(&compressed)?;
        String::from_utf8(original).map_err(|_| Error::CorruptedData)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use crate::config::FeistelKeyMaterial;

    fn tokens() -> SecureTokens {
        SecureTokens::new(&test_config())
    }

    fn seal_raw(tokens: &SecureTokens, sealed: &[u8]) -> String {
        let mut payload = vec![MARKER];
        payload.extend_from_slice(sealed);
        let tag = tokens.tag(sealed).finalize().into_bytes();
        payload.extend_from_slice(&tag);
        shortcode::encode_bytes(&payload)
    }

    #[test]
    fn test_roundtrip() {
        let tokens = tokens();
        let token = tokens.create("https://example.com/a").unwrap();
        assert!(token.bytes().all(|b| b.is_ascii_alphanumeric()));
        assert_eq!(tokens.resolve(&token).unwrap(), "https://example.com/a");
    }

    #[test]
    fn test_roundtrip_many() {
        let tokens = tokens();
        let long = "long/".repeat(200);
        for s in ["", "a", "https://example.com/ünïcode?x=1&y=2", long.as_str()] {
            // Fresh nonces, so leading zero bytes in the nonce get exercised too.
            for _ in 0..50 {
                let token = tokens.create(s).unwrap();
                assert_eq!(tokens.resolve(&token).unwrap(), s);
            }
        }
    }

    #[test]
    fn test_nonce_is_fresh() {
        let tokens = tokens();
        let a = tokens.create("https://example.com/a").unwrap();
        let b = tokens.create("https://example.com/a").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_every_character_change_is_rejected() {
        let tokens = tokens();
        let token = tokens.create("https://example.com/a").unwrap();

        for i in 0..token.len() {
            let mut chars: Vec<u8> = token.bytes().collect();
            chars[i] = if chars[i] == b'x' { b'y' } else { b'x' };
            let tampered = String::from_utf8(chars).unwrap();
            match tokens.resolve(&tampered) {
                Err(Error::TamperDetected) | Err(Error::Malformed(_)) => {}
                other => panic!("position {} resolved to {:?}", i, other),
            }
        }
    }

    #[test]
    fn test_every_bit_flip_is_rejected() {
        let tokens = tokens();
        let token = tokens.create("https://example.com/a").unwrap();
        let bytes = shortcode::decode_bytes(&token).unwrap();

        for i in 1..bytes.len() {
            for bit in 0..8 {
                let mut flipped = bytes.clone();
                flipped[i] ^= 1 << bit;
                let tampered = shortcode::encode_bytes(&flipped);
                assert_eq!(tokens.resolve(&tampered), Err(Error::TamperDetected));
            }
        }
    }

    #[test]
    fn test_malformed() {
        let tokens = tokens();
        assert!(matches!(
            tokens.resolve("abc-def"),
            Err(Error::Malformed(MalformedKind::InvalidCharacter { .. }))
        ));
        // Marker plus a handful of bytes.
        let short = shortcode::encode_bytes(&[MARKER, 1, 2, 3]);
        assert_eq!(
            tokens.resolve(&short),
            Err(Error::Malformed(MalformedKind::TooShort))
        );
        assert_eq!(
            tokens.resolve("0"),
            Err(Error::Malformed(MalformedKind::TooShort))
        );
        assert_eq!(
            tokens.resolve(""),
            Err(Error::Malformed(MalformedKind::InvalidLength))
        );
    }

    #[test]
    fn test_oversized_token_rejected_before_decoding() {
        let tokens = tokens();
        let started = std::time::Instant::now();
        for len in [shortcode::MAX_TOKEN_LENGTH + 1, 1 << 20] {
            assert_eq!(
                tokens.resolve(&"Z".repeat(len)),
                Err(Error::Malformed(MalformedKind::InvalidLength))
            );
        }
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_valid_tag_bad_ciphertext() {
        let tokens = tokens();
        assert_eq!(
            tokens.resolve(&seal_raw(&tokens, &[9u8; 8])),
            Err(Error::DecryptionFailed)
        );
        assert_eq!(
            tokens.resolve(&seal_raw(&tokens, &[9u8; 40])),
            Err(Error::DecryptionFailed)
        );
    }

    #[test]
    fn test_valid_ciphertext_bad_compression() {
        let tokens = tokens();
        let nonce = [3u8; NONCE_LENGTH];
        let ciphertext = tokens
            .cipher
            .encrypt(Nonce::<U12>::from_slice(&nonce), &b"not zlib"[..])
            .unwrap();
        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);
        assert_eq!(
            tokens.resolve(&seal_raw(&tokens, &sealed)),
            Err(Error::CorruptedData)
        );
    }

    #[test]
    fn test_other_secrets_reject() {
        let token = tokens().create("https://example.com/a").unwrap();
        let keys = FeistelKeyMaterial::new(vec![777]).unwrap();
        let other = CryptoConfig::new(keys, &[7u8; 32], b"another-hmac-secret").unwrap();
        assert_eq!(
            SecureTokens::new(&other).resolve(&token),
            Err(Error::TamperDetected)
        );
    }
}
