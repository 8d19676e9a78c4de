use criterion::{criterion_group, criterion_main, Criterion};
use prism_collab::coordinator::Roster;
use prism_collab::hub::BroadcastHub;
use prism_collab::presence::SessionIdentity;
use prism_collab::protocol::{CodeUpdate, CollabEvent, CollabMessage};
use std::hint::black_box;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

fn code_update(size: usize) -> CollabEvent {
    CollabEvent::CodeUpdate(CodeUpdate {
        project_id: Uuid::new_v4(),
        file_name: "App.tsx".into(),
        new_code: "x".repeat(size),
    })
}

fn bench_code_update_encode(c: &mut Criterion) {
    let sender = Uuid::new_v4();
    let event = code_update(4096);

    c.bench_function("code_update_encode_4KB", |b| {
        b.iter(|| {
            let msg = CollabMessage::new(black_box(sender), black_box(&event)).unwrap();
            black_box(msg.encode().unwrap());
        })
    });
}

fn bench_code_update_decode(c: &mut Criterion) {
    let bytes = CollabMessage::new(Uuid::new_v4(), &code_update(4096))
        .unwrap()
        .encode()
        .unwrap();

    c.bench_function("code_update_decode_4KB", |b| {
        b.iter(|| {
            let msg = CollabMessage::decode(black_box(&bytes)).unwrap();
            black_box(msg.incoming().unwrap());
        })
    });
}

fn bench_heartbeat_encode(c: &mut Criterion) {
    let identity = SessionIdentity::random();

    c.bench_function("heartbeat_encode", |b| {
        b.iter(|| {
            let event = CollabEvent::Heartbeat(identity.collaborator());
            let msg = CollabMessage::new(identity.id, black_box(&event)).unwrap();
            black_box(msg.encode().unwrap());
        })
    });
}

fn bench_hub_fanout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let hub = Arc::new(BroadcastHub::new("bench", 1024));
    let poster = Uuid::new_v4();
    let bytes = CollabMessage::new(poster, &code_update(256))
        .unwrap()
        .encode()
        .unwrap();

    c.bench_function("hub_fanout_8_receivers", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut receivers: Vec<_> =
                    (0..8).map(|_| hub.subscribe(Uuid::new_v4())).collect();
                hub.post(poster, black_box(bytes.clone()));
                for rx in receivers.iter_mut() {
                    black_box(rx.recv().await);
                }
            });
        })
    });
}

fn bench_roster_sweep(c: &mut Criterion) {
    let start = Instant::now();
    let peers: Vec<_> = (0..32).map(|_| SessionIdentity::random().collaborator()).collect();

    c.bench_function("roster_sweep_32", |b| {
        b.iter(|| {
            let mut roster = Roster::new(Uuid::new_v4());
            for (i, peer) in peers.iter().enumerate() {
                roster.upsert(peer.id, peer, start + Duration::from_secs(i as u64 % 20));
            }
            black_box(roster.sweep(start + Duration::from_secs(20), Duration::from_secs(10)));
        })
    });
}

criterion_group!(
    benches,
    bench_code_update_encode,
    bench_code_update_decode,
    bench_heartbeat_encode,
    bench_hub_fanout,
    bench_roster_sweep,
);
criterion_main!(benches);
