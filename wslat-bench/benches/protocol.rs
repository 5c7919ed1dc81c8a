//! Wire codec benchmarks.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use wslat_core::protocol;
use wslat_core::{PushEvent, RttMessage};

fn benchmark_push_event(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_event");

    for size in [16usize, 100, 1_024] {
        let event = PushEvent::new(42, protocol::payload(size), 1_700_000_000_000_000_000);
        let text = event.encode().unwrap();
        group.throughput(Throughput::Bytes(text.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", size), &event, |b, event| {
            b.iter(|| black_box(event.encode()))
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &text, |b, text| {
            b.iter(|| black_box(PushEvent::decode(black_box(text.as_bytes()))))
        });
    }

    group.finish();
}

fn benchmark_rtt_echo_path(c: &mut Criterion) {
    let request = RttMessage::new(7, protocol::payload(100), 1_700_000_000_000_000_000)
        .with_message_id("18c2f-7")
        .encode()
        .unwrap();

    c.bench_function("rtt_server_echo", |b| {
        b.iter(|| {
            let mut msg = RttMessage::decode(black_box(request.as_bytes())).unwrap();
            msg.stamp_server_recv(1_700_000_000_000_100_000).unwrap();
            msg.stamp_server_send(1_700_000_000_000_120_000).unwrap();
            black_box(msg.encode())
        })
    });

    let reply = {
        let mut msg = RttMessage::decode(request.as_bytes()).unwrap();
        msg.stamp_server_recv(1_700_000_000_000_100_000).unwrap();
        msg.stamp_server_send(1_700_000_000_000_120_000).unwrap();
        msg.encode().unwrap()
    };

    c.bench_function("rtt_client_receive", |b| {
        b.iter(|| {
            let mut msg = RttMessage::decode(black_box(reply.as_bytes())).unwrap();
            msg.stamp_client_recv(1_700_000_000_000_250_000).unwrap();
            black_box(msg.rtt().unwrap())
        })
    });
}

criterion_group!(benches, benchmark_push_event, benchmark_rtt_echo_path);
criterion_main!(benches);
