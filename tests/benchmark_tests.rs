//! Performance benchmarks for the per-tick mover paths

use bincode::{deserialize, serialize};
use server::game::GameState;
use shared::{
    Command, ManualClock, MoveNodes, MoverConfig, Orientation, Packet, Push, TileGrid, TilePos,
    TimestampWindow, DEDUP_WINDOW,
};
use std::time::Instant;

/// Benchmarks timestamp deduplication with constant eviction
#[test]
fn benchmark_timestamp_window() {
    let mut window = TimestampWindow::new(DEDUP_WINDOW);

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let timestamp = i as f64 * 0.016;
        window.try_insert(timestamp);
        let _ = window.contains(timestamp - 0.016);
    }

    let duration = start.elapsed();
    println!(
        "Timestamp window: {} inserts in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(window.len(), DEDUP_WINDOW);
    // Should complete in under 500ms for 100k iterations
    assert!(duration.as_millis() < 500);
}

/// Benchmarks move node generation and target popping
#[test]
fn benchmark_move_nodes() {
    let mut nodes = MoveNodes::new(TilePos::ZERO, Orientation::Up);
    let directions = [
        Orientation::Up,
        Orientation::Right,
        Orientation::Down,
        Orientation::Left,
    ];

    let iterations = 50_000;
    let start = Instant::now();

    for i in 0..iterations {
        let direction = directions[(i / 10) % directions.len()];
        let target = nodes.get_target_node(direction.vector());
        if i % 7 == 0 {
            nodes.adjust_future_nodes(direction.rotate(1).vector());
        }
        nodes.add_history_node(target, i as f64, direction);
    }

    let duration = start.elapsed();
    println!(
        "Move nodes: {} steps in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 500);
}

/// Benchmarks server ticks with many cruising movers
#[test]
fn benchmark_world_update() {
    let clock = ManualClock::new(1.0);
    let mut game = GameState::new(TileGrid::new());

    let ids: Vec<_> = (0..50)
        .map(|i| game.spawn_mover(MoverConfig::default(), TilePos::new(i * 4, 0)))
        .collect();
    for id in &ids {
        game.mover_mut(*id).unwrap().start_movement(&clock).unwrap();
    }
    game.drain_outbound();

    let dt = 1.0 / 60.0;
    let iterations = 600;
    let start = Instant::now();
    let mut pushes = 0;

    for _ in 0..iterations {
        clock.advance(dt as f64);
        game.update(dt, &clock);
        pushes += game.drain_outbound().len();
    }

    let duration = start.elapsed();
    println!(
        "World update: {} ticks of {} movers in {:?} ({:.2} μs/tick, {} pushes)",
        iterations,
        ids.len(),
        duration,
        duration.as_micros() as f64 / iterations as f64,
        pushes
    );

    // 10 seconds of play at 5 tiles per second
    assert!(pushes >= ids.len() * 45);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks packet serialization performance
#[test]
fn benchmark_packet_serialization() {
    let mut game = GameState::new(TileGrid::new());
    let id = game.spawn_mover(MoverConfig::default().with_hull(3, 5), TilePos::ZERO);
    let snapshot: Vec<Packet> = game
        .snapshots()
        .into_iter()
        .map(|(mover_id, push)| Packet::Push { mover_id, push })
        .collect();
    let command = Packet::Command {
        mover_id: id,
        command: Command::Rotate {
            facing_direction: Orientation::Left,
            timestamp: 12.5,
        },
    };

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        for packet in &snapshot {
            let data = serialize(packet).unwrap();
            let _: Packet = deserialize(&data).unwrap();
        }
        let data = serialize(&command).unwrap();
        let _: Packet = deserialize(&data).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Packet serialization: {} rounds in {:?} ({:.2} μs/round)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    let spawn_size = serialize(&snapshot[0]).unwrap().len();
    println!("Spawn packet size: {} bytes", spawn_size);
    assert!(matches!(
        snapshot[0],
        Packet::Push {
            push: Push::Spawned { .. },
            ..
        }
    ));
    assert!(spawn_size <= shared::MAX_PACKET_SIZE);
    assert!(duration.as_millis() < 2000);
}
