//! Base62 over the `0-9a-zA-Z` alphabet.
//!
//! Input bytes are read as one big-endian unsigned integer. Values that fit
//! in a `u128` go through the `base62` crate; longer payloads use schoolbook
//! division. Leading zero bytes carry no value and do not survive a round
//! trip, so variable-length payloads are framed by their callers.

use crate::error::{Error, MalformedKind};

pub const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Longest short code accepted by [`validate_short_code`].
pub const MAX_CODE_LENGTH: usize = 200;

/// Longest stateless or secure token accepted by [`validate_token`]. Decoding
/// is quadratic in the length, so oversized input is refused up front.
pub const MAX_TOKEN_LENGTH: usize = 8192;

// 62^21 < 2^128, so any 21-digit string decodes into a u128.
const U128_DIGITS: usize = 21;
const U64_DIGITS: usize = 11;

fn digit_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'z' => Some(byte - b'a' + 10),
        b'A'..=b'Z' => Some(byte - b'A' + 36),
        _ => None,
    }
}

fn digits(encoded: &str) -> Result<Vec<u8>, Error> {
    encoded
        .bytes()
        .enumerate()
        .map(|(position, byte)| {
            digit_value(byte).ok_or(Error::Malformed(MalformedKind::InvalidCharacter {
                byte,
                position,
            }))
        })
        .collect()
}

/// Encodes `data` as a Base62 string. Empty or all-zero input gives `"0"`.
pub fn encode_bytes(data: &[u8]) -> String {
    let start = data.iter().position(|&b| b != 0).unwrap_or(data.len());
    let significant = &data[start..];

    if significant.is_empty() {
        return "0".to_string();
    }
    if significant.len() <= 16 {
        let mut buf = [0u8; 16];
        buf[16 - significant.len()..].copy_from_slice(significant);
        return base62::encode_alternative(u128::from_be_bytes(buf));
    }
    encode_long(significant)
}

fn encode_long(significant: &[u8]) -> String {
    let mut num = significant.to_vec();
    let mut out = Vec::with_capacity(num.len() * 4 / 3 + 1);

    while !num.is_empty() {
        let mut rem = 0u32;
        let mut quotient = Vec::with_capacity(num.len());
        for &b in &num {
            let acc = rem * 256 + b as u32;
            let q = acc / 62;
            rem = acc % 62;
            if !(quotient.is_empty() && q == 0) {
                quotient.push(q as u8);
            }
        }
        out.push(ALPHABET[rem as usize]);
        num = quotient;
    }

    if out.is_empty() {
        out.push(ALPHABET[0]);
    }
    out.iter().rev().map(|&c| c as char).collect()
}

/// Decodes a Base62 string into the minimal big-endian bytes of its value.
/// Zero (and the empty string) decode to an empty vector.
pub fn decode_bytes(encoded: &str) -> Result<Vec<u8>, Error> {
    let digits = digits(encoded)?;

    if digits.len() <= U128_DIGITS {
        let value = digits
            .iter()
            .fold(0u128, |acc, &d| acc * 62 + d as u128);
        let bytes = value.to_be_bytes();
        let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        return Ok(bytes[start..].to_vec());
    }
    Ok(decode_long(&digits))
}

fn decode_long(digits: &[u8]) -> Vec<u8> {
    let mut bytes: Vec<u8> = Vec::with_capacity(digits.len() * 3 / 4 + 1);
    for &digit in digits {
        let mut carry = digit as u32;
        for b in bytes.iter_mut().rev() {
            let acc = *b as u32 * 62 + carry;
            *b = acc as u8;
            carry = acc >> 8;
        }
        while carry > 0 {
            bytes.insert(0, carry as u8);
            carry >>= 8;
        }
    }
    bytes
}

/// Encodes a 64-bit value.
pub fn encode_u64(num: u64) -> String {
    base62::encode_alternative(num)
}

/// Decodes a string produced by [`encode_u64`].
pub fn decode_u64(encoded: &str) -> Result<u64, Error> {
    if encoded.is_empty() || encoded.len() > U64_DIGITS {
        return Err(MalformedKind::InvalidLength.into());
    }
    digits(encoded)?;
    let value = base62::decode_alternative(encoded)
        .map_err(|_| Error::Malformed(MalformedKind::Overflow))?;
    u64::try_from(value).map_err(|_| Error::Malformed(MalformedKind::Overflow))
}

/// Checks that `code` looks like something this crate could have issued.
pub fn validate_short_code(code: &str) -> Result<(), Error> {
    if code.is_empty() || code.len() > MAX_CODE_LENGTH {
        return Err(MalformedKind::InvalidLength.into());
    }
    digits(code).map(|_| ())
}

/// Like [`validate_short_code`], with the larger bound for self-contained
/// tokens.
pub fn validate_token(token: &str) -> Result<(), Error> {
    if token.is_empty() || token.len() > MAX_TOKEN_LENGTH {
        return Err(MalformedKind::InvalidLength.into());
    }
    digits(token).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_zero() {
        assert_eq!(encode_bytes(&[]), "0");
        assert_eq!(encode_bytes(&[0, 0, 0]), "0");
        assert_eq!(encode_bytes(&[0; 40]), "0");
        assert_eq!(decode_bytes("0").unwrap(), Vec::<u8>::new());
        assert_eq!(decode_bytes("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_known_values() {
        assert_eq!(encode_bytes(&[61]), "Z");
        assert_eq!(encode_bytes(&[62]), "10");
        assert_eq!(encode_bytes(&[0x01, 0x00]), "48");
        assert_eq!(encode_u64(0), "0");
        assert_eq!(encode_u64(10), "a");
        assert_eq!(encode_u64(36), "A");
        assert_eq!(decode_bytes("48").unwrap(), vec![0x01, 0x00]);
        assert_eq!(decode_u64("Z").unwrap(), 61);
    }

    #[test]
    fn test_u64_matches_bytes() {
        for &n in &[1u64, 61, 62, 12345, u32::MAX as u64, u64::MAX] {
            assert_eq!(encode_u64(n), encode_bytes(&n.to_be_bytes()));
            assert_eq!(decode_u64(&encode_u64(n)).unwrap(), n);
        }
        assert_eq!(encode_u64(u64::MAX).len(), 11);
    }

    #[test]
    fn test_long_path_agrees_with_u128_path() {
        let mut rng = rand::thread_rng();
        for _ in 0..1_000 {
            let len = rng.gen_range(1..=16);
            let mut data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            data[0] |= 1;
            let encoded = encode_bytes(&data);
            assert_eq!(encoded, encode_long(&data));
            assert_eq!(decode_long(&digits(&encoded).unwrap()), data);
        }
    }

    #[test]
    fn test_random_roundtrips_without_leading_zero() {
        let mut rng = rand::thread_rng();
        for _ in 0..2_000 {
            let len = rng.gen_range(1..=64);
            let mut data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            if data[0] == 0 {
                data[0] = 1;
            }
            let encoded = encode_bytes(&data);
            assert!(encoded.bytes().all(|b| b.is_ascii_alphanumeric()));
            assert_eq!(decode_bytes(&encoded).unwrap(), data);
        }
    }

    #[test]
    fn test_leading_zeros_dropped() {
        let encoded = encode_bytes(&[0, 0, 7, 9]);
        assert_eq!(encoded, encode_bytes(&[7, 9]));
        assert_eq!(decode_bytes(&encoded).unwrap(), vec![7, 9]);
    }

    #[test]
    fn test_invalid_characters() {
        assert_eq!(
            decode_bytes("ab+c"),
            Err(Error::Malformed(MalformedKind::InvalidCharacter {
                byte: b'+',
                position: 2
            }))
        );
        assert!(decode_bytes("é").is_err());
        assert!(decode_u64("a-b").is_err());
    }

    #[test]
    fn test_decode_u64_bounds() {
        assert_eq!(
            decode_u64(""),
            Err(Error::Malformed(MalformedKind::InvalidLength))
        );
        assert_eq!(
            decode_u64("zzzzzzzzzzzz"),
            Err(Error::Malformed(MalformedKind::InvalidLength))
        );
        // 11 digits but above u64::MAX.
        assert_eq!(
            decode_u64("ZZZZZZZZZZZ"),
            Err(Error::Malformed(MalformedKind::Overflow))
        );
    }

    #[test]
    fn test_validate_short_code() {
        assert!(validate_short_code("abcXYZ019").is_ok());
        assert!(validate_short_code("").is_err());
        assert!(validate_short_code(&"a".repeat(MAX_CODE_LENGTH)).is_ok());
        assert!(validate_short_code(&"a".repeat(MAX_CODE_LENGTH + 1)).is_err());
        assert!(validate_short_code("abc/def").is_err());

        assert!(validate_token(&"a".repeat(MAX_CODE_LENGTH + 1)).is_ok());
        assert_eq!(
            validate_token(&"a".repeat(MAX_TOKEN_LENGTH + 1)),
            Err(Error::Malformed(MalformedKind::InvalidLength))
        );
    }
}
