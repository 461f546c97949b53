use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use digital_safe_core::hash::hash512;
use digital_safe_core::{LayeredCipher, Passphrase};
use rand::{thread_rng, RngCore};
use std::time::Duration;

fn generate_random_data(size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    thread_rng().fill_bytes(&mut data);
    data
}

fn benchmark_cipher() -> LayeredCipher {
    let passphrase = Passphrase::new();
    passphrase
        .set_passphrase("benchmark_passphrase_1234567890!@#$")
        .expect("Failed to set passphrase");
    LayeredCipher::from_passphrase(&passphrase).expect("Key derivation failed")
}

fn benchmark_passphrase_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("passphrase_hash");
    group.sample_size(10);

    group.bench_function("hash512_20011", |b| {
        b.iter(|| hash512(black_box("CorrectHorse1"), black_box("abcDEF1234!@#$"), 20_011));
    });

    group.finish();
}

fn benchmark_key_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_derivation");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    let secret = generate_random_data(64);
    group.bench_function("three_layer_keys", |b| {
        b.iter(|| LayeredCipher::from_secret(black_box(&secret)));
    });

    group.finish();
}

fn benchmark_encryption(c: &mut Criterion) {
    let mut group = c.benchmark_group("encryption");
    let cipher = benchmark_cipher();

    for size in [1024, 10 * 1024, 100 * 1024, 1024 * 1024].iter() {
        let data = generate_random_data(*size);
        group.bench_with_input(BenchmarkId::new("layered_encrypt", size), &data, |b, data| {
            b.iter(|| cipher.encrypt(black_box(data)));
        });
    }

    group.finish();
}

fn benchmark_decryption(c: &mut Criterion) {
    let mut group = c.benchmark_group("decryption");
    let cipher = benchmark_cipher();

    for size in [1024, 10 * 1024, 100 * 1024, 1024 * 1024].iter() {
        let data = generate_random_data(*size);
        let encrypted = cipher.encrypt(&data).expect("Encryption failed");
        group.bench_with_input(
            BenchmarkId::new("layered_decrypt", size),
            &encrypted,
            |b, encrypted| {
                b.iter(|| cipher.decrypt(black_box(encrypted)));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_passphrase_hash,
    benchmark_key_derivation,
    benchmark_encryption,
    benchmark_decryption
);
criterion_main!(benches);
