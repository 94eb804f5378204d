//! Performance benchmarks for the identity and sync hot paths

use client::building::Building;
use server::broadcaster::Broadcaster;
use server::client_manager::Player;
use server::processor::PacketProcessor;
use server::state_store::StateStore;
use shared::{derive_id, IdentityRegistry, Packet, SpatialSignature};
use std::sync::Arc;
use std::time::Instant;

const PIECE_COUNT: usize = 2000;

struct NullBroadcaster;

impl Broadcaster for NullBroadcaster {
    fn send_to_others(&self, _packet: &Packet, _origin: &Player) {}
    fn send_to_all(&self, _packet: &Packet) {}
}

fn signature(i: usize) -> SpatialSignature {
    SpatialSignature::at((i % 100) as f32, 0.0, (i / 100) as f32)
}

/// Benchmarks id derivation from spatial signatures
#[test]
fn benchmark_id_derivation() {
    let signatures: Vec<String> = (0..1000).map(|i| signature(i).to_string()).collect();

    let iterations = 10_000;
    let start = Instant::now();

    for i in 0..iterations {
        let _ = derive_id(&signatures[i % signatures.len()]);
    }

    let duration = start.elapsed();
    println!(
        "Id derivation: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks registry registration and lookup
#[test]
fn benchmark_registry_operations() {
    let registry: IdentityRegistry<u64> = IdentityRegistry::new();
    let ids: Vec<String> = (0..10_000).map(|i| signature(i).derive_id()).collect();

    let start = Instant::now();

    for (handle, id) in ids.iter().enumerate() {
        registry.register(id, handle as u64);
    }
    for (handle, id) in ids.iter().enumerate() {
        assert_eq!(registry.resolve(id), Some(handle as u64));
    }

    let duration = start.elapsed();
    println!(
        "Registry: {} registrations and lookups in {:?}",
        ids.len(),
        duration
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks the server pipeline for amount changes
#[test]
fn benchmark_amount_change_processing() {
    let processor = PacketProcessor::new(Arc::new(StateStore::new()), NullBroadcaster);
    let sender = Player {
        id: 1,
        name: "bench".to_string(),
        addr: "127.0.0.1:9000".parse().unwrap(),
    };
    let packets: Vec<Packet> = (0..10_000)
        .map(|i| Packet::ConstructionAmountChanged {
            id: derive_id(&format!("piece-{}", i % 500)),
            amount: (i % 100) as f32 / 100.0,
        })
        .collect();

    let start = Instant::now();

    for packet in &packets {
        processor.process(packet, Some(&sender)).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Amount changes: {} packets in {:?} ({:.2} μs/packet)",
        packets.len(),
        duration,
        duration.as_micros() as f64 / packets.len() as f64
    );

    assert_eq!(processor.store().len(), 500);
    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks a late joiner applying a large world snapshot
#[test]
fn benchmark_snapshot_application() {
    let store = StateStore::new();
    for i in 0..PIECE_COUNT {
        let signature = signature(i);
        store.place(&signature.derive_id(), signature);
        store.set_amount(&signature.derive_id(), 0.5);
    }
    let snapshot = Packet::WorldState {
        pieces: store.snapshot(),
    };

    let start = Instant::now();

    let mut building = Building::new();
    building.apply_remote(&snapshot);

    let duration = start.elapsed();
    println!(
        "Snapshot: {} pieces applied in {:?}",
        building.world().len(),
        duration
    );

    assert_eq!(building.world().len(), PIECE_COUNT);
    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}
