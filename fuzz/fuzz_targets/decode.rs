#![no_main]
use linkcode::{shortcode, Codec, CryptoConfig, FeistelKeyMaterial, SecureTokens};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let keys = FeistelKeyMaterial::new(vec![777])
        .unwrap()
        .master_secret(b"fuzz-master");
    let config = CryptoConfig::new(keys, &[7u8; 32], b"fuzz-hmac").unwrap();
    let input = String::from_utf8_lossy(data);

    let _ = shortcode::decode_bytes(&input);
    let codec = Codec::new(&config);
    let _ = codec.decode_id(&input, "tenant");
    let _ = codec.decode_payload(&input, "tenant");
    let _ = SecureTokens::new(&config).resolve(&input);
});
