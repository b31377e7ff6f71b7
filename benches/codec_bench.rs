//! Benchmarks for the bit-efficient codec.
//!
//! Run with: cargo bench --bench codec_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use fipa_acl_engine::acl_message::{AclMessage, FipaProtocol, Performative, ReplyBy};
use fipa_acl_engine::encoding::{AclCodec, BitEfficientCodec};

fn message_with_content(size: usize) -> AclMessage {
    AclMessage::new(vec![b'x'; size], Performative::Inform)
        .with_sender("bench-sender")
        .with_receiver("bench-receiver-1")
        .with_receiver("bench-receiver-2")
        .with_language("fipa-sl")
        .with_ontology("logistics")
        .with_protocol(FipaProtocol::Request)
        .with_reply_with("r-1")
        .with_reply_by(ReplyBy::absolute(chrono::Utc::now()))
        .with_user_parameter("x-priority", "7")
}

fn bench_encode(c: &mut Criterion) {
    let codec = BitEfficientCodec::new();
    let mut group = c.benchmark_group("encode");

    for size in [0usize, 200, 4_096, 70_000] {
        let message = message_with_content(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &message, |b, m| {
            b.iter(|| codec.encode(black_box(m)).unwrap())
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let codec = BitEfficientCodec::new();
    let mut group = c.benchmark_group("decode");

    for size in [0usize, 200, 4_096, 70_000] {
        let bytes = codec.encode(&message_with_content(size)).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| codec.decode(black_box(bytes)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
