use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use linkcode::{feistel, shortcode, Codec, CryptoConfig, FeistelKeyMaterial, IdGenerator, SecureTokens};

fn config() -> CryptoConfig {
    let keys = FeistelKeyMaterial::new(vec![777])
        .unwrap()
        .master_secret(b"bench-master");
    CryptoConfig::new(keys, &[7u8; 32], b"bench-hmac").unwrap()
}

fn bench_id_generator(c: &mut Criterion) {
    let generator = IdGenerator::new(1).unwrap();
    c.bench_function("idgen/next_id", |b| b.iter(|| black_box(generator.next_id())));
}

fn bench_feistel(c: &mut Criterion) {
    let mut group = c.benchmark_group("feistel");
    group.bench_function("obfuscate_u64", |b| {
        b.iter(|| feistel::obfuscate(black_box(12345), 777, 3))
    });

    for size in [32usize, 1024, 64 * 1024] {
        let data = vec![0xa5u8; size];
        group.bench_with_input(BenchmarkId::new("obfuscate_bytes", size), &data, |b, data| {
            b.iter(|| feistel::obfuscate_bytes(black_box(data), b"key!", 3))
        });
    }
    group.finish();
}

fn bench_shortcode(c: &mut Criterion) {
    let mut group = c.benchmark_group("shortcode");
    let short = [0x7fu8; 8];
    let long = [0x7fu8; 64];
    group.bench_function("encode_8_bytes", |b| b.iter(|| shortcode::encode_bytes(black_box(&short))));
    group.bench_function("encode_64_bytes", |b| b.iter(|| shortcode::encode_bytes(black_box(&long))));

    let encoded = shortcode::encode_bytes(&long);
    group.bench_function("decode_64_bytes", |b| {
        b.iter(|| shortcode::decode_bytes(black_box(&encoded)).unwrap())
    });
    group.finish();
}

fn bench_pipelines(c: &mut Criterion) {
    let config = config();
    let codec = Codec::new(&config);
    let tokens = SecureTokens::new(&config);
    let url = "https://example.com/some/fairly/long/path?with=query&and=more";

    let mut group = c.benchmark_group("pipeline");
    group.bench_function("stateful_encode", |b| {
        b.iter(|| codec.encode_id(black_box(0x0123_4567_89ab_cdef), "acme"))
    });
    group.bench_function("stateless_encode", |b| {
        b.iter(|| codec.encode_payload(black_box(url.as_bytes()), "acme").unwrap())
    });

    let token = tokens.create(url).unwrap();
    group.bench_function("secure_create", |b| b.iter(|| tokens.create(black_box(url)).unwrap()));
    group.bench_function("secure_resolve", |b| {
        b.iter(|| tokens.resolve(black_box(&token)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_id_generator, bench_feistel, bench_shortcode, bench_pipelines);
criterion_main!(benches);
