//! `linkcode` turns long URLs and generated ids into compact, tenant-scoped
//! short codes for a link shortener, and turns them back.
//!
//! Three link modes are supported:
//!
//! - **Stateful**: a time-ordered 64-bit id is permuted with a keyed Feistel
//!   network and Base62-encoded. The code is an opaque storage key; the URL
//!   lives in a [`DocumentStore`].
//! - **Stateless**: the URL is zlib-compressed, permuted byte-wise and
//!   Base62-encoded. Nothing is stored, and there is no integrity check.
//! - **Secure**: the URL is compressed, encrypted with AES-256-GCM under a
//!   fresh nonce and signed with HMAC-SHA256. Tampering is detected before
//!   decryption.
//!
//! The Feistel permutations are obfuscation: they stop enumeration of
//! sequential ids, not a determined attacker. Use the secure mode when the
//! content of a code must stay confidential.
//!
//! Key material is loaded once into an immutable [`CryptoConfig`] and passed
//! to every component explicitly. Encoding and decoding must use the same
//! keys and round count; a mismatch yields a different permutation, not an
//! error.
//!
//! # Usage
//!
//! ```
//! use linkcode::{Codec, CryptoConfig, IdGenerator};
//!
//! let config = CryptoConfig::from_vars([
//!     ("FEISTEL_KEYS", "777,9001"),
//!     ("ACTIVE_FEISTEL_VERSION", "0"),
//!     ("MASTER_FEISTEL_SECRET", "tenant-derivation-secret"),
//!     ("AES_SECRET", "0123456789abcdef0123456789abcdef"),
//!     ("HMAC_SECRET", "integrity-secret"),
//! ])
//! .unwrap();
//!
//! let ids = IdGenerator::new(config.generator_node_id()).unwrap();
//! let codec = Codec::new(&config);
//!
//! let id = ids.next_id();
//! let code = codec.encode_id(id, "acme");
//! assert_eq!(codec.decode_id(&code, "acme").unwrap(), id);
//!
//! let code = codec.encode_payload(b"https://example.com/a", "acme").unwrap();
//! assert_eq!(codec.decode_payload(&code, "acme").unwrap(), b"https://example.com/a");
//! ```

mod codec;
mod compress;
mod config;
mod error;
pub mod feistel;
mod idgen;
mod secure;
pub mod service;
pub mod shortcode;

pub use codec::Codec;
pub use compress::{compress, decompress};
pub use config::{ConfigError, CryptoConfig, FeistelKeyMaterial};
pub use error::{Error, MalformedKind};
pub use idgen::{Clock, IdGenerator, IdParts, SystemClock, EPOCH_MILLIS, MAX_NODE_ID};
pub use secure::SecureTokens;
pub use service::{
    DocumentStore, KeyValueCache, LinkRecord, LinkService, MemoryCache, MemoryStore,
    MemoryTenants, Tenant, TenantDirectory,
};
