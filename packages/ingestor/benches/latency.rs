//! Latency benchmarks for the donation pipeline
//!
//! Covers the per-transaction work done inside a scan cycle:
//! - Message extraction
//! - Weight scoring and ether formatting
//! - JSON message formatting for publication

use alloy::primitives::{Address, Bytes, TxHash, U256};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use donation_ingestor::chain::ChainTransaction;
use donation_ingestor::publisher::DonationMessage;
use donation_ingestor::weight::{format_ether, message_weight};
use donation_ingestor::{Donation, MessageExtractor};

/// `sendMessage(string)` call carrying `text`
fn tagged_payload(text: &str) -> Vec<u8> {
    let mut payload = vec![0x9d, 0x96, 0xe2, 0xdf];
    payload.extend_from_slice(&U256::from(32u64).to_be_bytes::<32>());
    payload.extend_from_slice(&U256::from(text.len()).to_be_bytes::<32>());
    let mut data = text.as_bytes().to_vec();
    data.resize(text.len().div_ceil(32) * 32, 0);
    payload.extend_from_slice(&data);
    payload
}

/// Benchmark message extraction
fn bench_extract_message(c: &mut Criterion) {
    let extractor = MessageExtractor::default();
    let tagged = tagged_payload("Thanks for all the great work on this project!");
    let plain = b"Thanks for all the great work on this project!".to_vec();

    c.bench_function("extract_tagged_message", |b| {
        b.iter(|| black_box(extractor.extract(black_box(&tagged))))
    });
    c.bench_function("extract_plain_message", |b| {
        b.iter(|| black_box(extractor.extract(black_box(&plain))))
    });
}

/// Benchmark weight scoring
fn bench_message_weight(c: &mut Criterion) {
    let message = "a".repeat(250);

    c.bench_function("message_weight", |b| {
        b.iter(|| black_box(message_weight(black_box("1.5"), Some(black_box(&message)))))
    });
}

/// Benchmark wei to ether formatting
fn bench_format_ether(c: &mut Criterion) {
    let wei = U256::from(1_234_500_000_000_000_000u64);

    c.bench_function("format_ether", |b| {
        b.iter(|| black_box(format_ether(black_box(wei))))
    });
}

/// Benchmark JSON message formatting
fn bench_format_message(c: &mut Criterion) {
    let input = tagged_payload("thanks!");
    let tx = ChainTransaction {
        hash: TxHash::repeat_byte(0x12),
        from: Address::repeat_byte(0x11),
        to: Some(Address::repeat_byte(0xab)),
        value: U256::from(1_000_000_000_000_000u64),
        input: Bytes::from(input.clone()),
        block_number: Some(100),
    };
    let extracted = MessageExtractor::default().extract(&input);
    let donation = Donation::new(&tx, Address::repeat_byte(0xab), 100, extracted, 1703000000000);

    c.bench_function("format_message_json", |b| {
        b.iter(|| black_box(DonationMessage::from_donation(black_box(&donation)).to_json().unwrap()))
    });
}

criterion_group!(
    benches,
    bench_extract_message,
    bench_message_weight,
    bench_format_ether,
    bench_format_message
);
criterion_main!(benches);
