use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::Error;

/// Upper bound on inflated output. No issued URL comes close; the cap keeps a
/// crafted token from inflating without limit.
pub const MAX_DECOMPRESSED_LEN: u64 = 64 * 1024;

/// zlib-compresses `data` at the default level. A deflate failure is
/// [`Error::EncryptionFailed`], the same as any other encode-side failure.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, Error> {
    compress_into(data, Vec::with_capacity(data.len() / 2 + 16))
}

fn compress_into<W: Write>(data: &[u8], sink: W) -> Result<W, Error> {
    let mut encoder = ZlibEncoder::new(sink, Compression::default());
    encoder.write_all(data).map_err(|_| Error::EncryptionFailed)?;
    encoder.finish().map_err(|_| Error::EncryptionFailed)
}

/// Inflates zlib data. Any malformed stream is [`Error::CorruptedData`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .take(MAX_DECOMPRESSED_LEN + 1)
        .read_to_end(&mut out)
        .map_err(|_| Error::CorruptedData)?;
    if out.len() as u64 > MAX_DECOMPRESSED_LEN {
        return Err(Error::CorruptedData);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let url = b"https://example.com/some/long/path?with=query&and=more";
        let compressed = compress(url).unwrap();
        assert_eq!(compressed[0], 0x78);
        assert_eq!(decompress(&compressed).unwrap(), url);
    }

    #[test]
    fn test_empty() {
        assert_eq!(decompress(&compress(b"").unwrap()).unwrap(), b"");
    }

    #[test]
    fn test_garbage() {
        assert_eq!(decompress(b"not zlib at all"), Err(Error::CorruptedData));
        let mut compressed = compress(b"https://example.com/a").unwrap();
        compressed[0] ^= 0xff;
        assert_eq!(decompress(&compressed), Err(Error::CorruptedData));
    }

    #[test]
    fn test_size_cap() {
        let bomb = compress(&vec![b'a'; MAX_DECOMPRESSED_LEN as usize + 1]).unwrap();
        assert_eq!(decompress(&bomb), Err(Error::CorruptedData));
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "sink closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_is_reported() {
        let data = vec![b'x'; 64 * 1024];
        assert!(matches!(
            compress_into(&data, FailingSink),
            Err(Error::EncryptionFailed)
        ));
    }
}
