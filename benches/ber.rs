//! Codec benchmarks.
//!
//! Every request and response passes through these paths once per attempt.

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use snmp_manager::ber::{Decoder, EncodeBuf};
use snmp_manager::{CommunityMessage, ErrorStatus, Oid, Pdu, Value, VarBind, Version};
use std::hint::black_box;

fn common_oids() -> Vec<(&'static str, Oid)> {
    vec![
        ("sysDescr", Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0])),
        ("ifDescr.12", Oid::from_slice(&[1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 12])),
        (
            "enterprise",
            Oid::from_slice(&[1, 3, 6, 1, 4, 1, 9, 9, 42, 1, 2, 3, 4, 5, 6, 70000]),
        ),
    ]
}

fn bench_oid(c: &mut Criterion) {
    let mut group = c.benchmark_group("oid");

    for (name, oid) in common_oids() {
        let text = oid.to_string();
        let ber = oid.to_ber();

        group.bench_with_input(BenchmarkId::new("parse", name), &text, |b, text| {
            b.iter(|| black_box(Oid::parse(text).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("to_ber", name), &oid, |b, oid| {
            b.iter(|| black_box(oid.to_ber()))
        });
        group.bench_with_input(BenchmarkId::new("from_ber", name), &ber, |b, ber| {
            b.iter(|| black_box(Oid::from_ber(ber).unwrap()))
        });
    }

    group.finish();
}

fn bench_integer(c: &mut Criterion) {
    let mut group = c.benchmark_group("integer");

    for value in [0i32, 127, -129, 65_536, i32::MIN] {
        group.bench_with_input(BenchmarkId::new("encode", value), &value, |b, &value| {
            b.iter(|| {
                let mut buf = EncodeBuf::new();
                buf.push_integer(black_box(value));
                black_box(buf.finish())
            })
        });
    }

    group.finish();
}

/// GET response with `n` interface descriptions, as a GETBULK reply looks.
fn response(n: u32) -> CommunityMessage {
    let varbinds = (1..=n)
        .map(|i| {
            VarBind::new(
                Oid::from_slice(&[1, 3, 6, 1, 2, 1, 2, 2, 1, 2, i]),
                Value::from(format!("GigabitEthernet0/{i}")),
            )
        })
        .collect();
    CommunityMessage::new(
        Version::V2c,
        Bytes::from_static(b"public"),
        Pdu::response(12345, ErrorStatus::NoError, 0, varbinds),
    )
}

fn bench_message(c: &mut Criterion) {
    let mut group = c.benchmark_group("message");

    for n in [1u32, 10, 50] {
        let msg = response(n);
        let encoded = msg.encode();

        group.throughput(Throughput::Bytes(encoded.len() as u64));
        group.bench_with_input(BenchmarkId::new("encode", n), &msg, |b, msg| {
            b.iter(|| black_box(msg.encode()))
        });
        group.bench_with_input(BenchmarkId::new("decode", n), &encoded, |b, data| {
            b.iter(|| black_box(CommunityMessage::decode(data.clone()).unwrap()))
        });
    }

    let request = CommunityMessage::v2c(
        Bytes::from_static(b"public"),
        Pdu::get_bulk(42, 0, 25, &[Oid::from_slice(&[1, 3, 6, 1, 2, 1, 2, 2])]),
    );
    group.throughput(Throughput::Elements(1));
    group.bench_function("encode_getbulk_request", |b| {
        b.iter(|| black_box(request.encode()))
    });

    group.finish();
}

fn bench_decode_varbind_list(c: &mut Criterion) {
    let encoded = {
        let mut buf = EncodeBuf::new();
        snmp_manager::varbind::encode_varbind_list(&mut buf, &response(25).pdu.varbinds);
        buf.finish()
    };

    c.bench_function("varbind_list_decode_25", |b| {
        b.iter(|| {
            let mut decoder = Decoder::new(encoded.clone());
            black_box(snmp_manager::varbind::decode_varbind_list(&mut decoder).unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_oid,
    bench_integer,
    bench_message,
    bench_decode_varbind_list
);
criterion_main!(benches);
