//! Performance benchmarks for the hot paths: wire encoding, per-recipient
//! redaction, fill replay and word draws.

use std::collections::HashSet;
use std::time::Instant;

use client::canvas::{DrawingSurface, Raster};
use shared::protocol::{ChatKind, ChatMessage, Message, Stroke, StrokeBatch};
use shared::state::{redact, GameSettings, Phase, Player, SessionState};
use shared::words;

fn busy_state(players: usize, chat_lines: usize) -> SessionState {
    let mut state = SessionState::with_settings(GameSettings::default());
    state.phase = Phase::Drawing;
    state.timer = 42;
    state.word = Some("Penguin".to_string());
    state.hint = "P______".to_string();
    state.drawer = Some("P0".to_string());

    for i in 0..players {
        state.players.push(Player::new(
            format!("P{}", i),
            format!("Player {}", i),
            i as u32,
            i == 0,
        ));
    }
    for i in 0..chat_lines {
        state.chat.push(ChatMessage {
            id: i as u64,
            sender: format!("P{}", i % players),
            sender_name: format!("Player {}", i % players),
            text: format!("guess number {}", i),
            kind: ChatKind::Guess,
            correct: false,
            timestamp_ms: 1_700_000_000_000 + i as u64,
        });
    }
    state
}

/// Benchmarks stroke batch encode/decode round-trips
#[test]
fn benchmark_stroke_batch_roundtrip() {
    let batch = StrokeBatch {
        strokes: (0..5)
            .map(|i| Stroke {
                x: i * 3,
                y: i * 2,
                last_x: i * 3 - 1,
                last_y: i * 2 - 1,
                color: 0x00ff_0000,
                size: 4,
                is_eraser: false,
            })
            .collect(),
        captured_at_ms: 1_700_000_000_000,
    };
    let message = Message::StrokeBatch { batch };

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let bytes = bincode::serialize(&message).unwrap();
        let decoded = Message::decode(&bytes).unwrap();
        assert!(matches!(decoded, Message::StrokeBatch { .. }));
    }

    let duration = start.elapsed();
    println!(
        "Stroke batch roundtrip: {} iterations in {:?} ({:.2} µs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // A drawer at pointer-move resolution produces tens of batches per
    // second, not thousands; this leaves orders of magnitude of headroom.
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks per-recipient state redaction for a full lobby
#[test]
fn benchmark_state_redaction() {
    let state = busy_state(8, 200);
    let recipients: Vec<String> = (0..8).map(|i| format!("P{}", i)).collect();

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        for recipient in &recipients {
            let masked = redact(&state, recipient);
            assert_eq!(masked.players.len(), 8);
        }
    }

    let duration = start.elapsed();
    println!(
        "Redaction: {} full-lobby broadcasts in {:?} ({:.2} µs/broadcast)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // One broadcast per second per mutation; redaction must stay trivial.
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks snapshot encoding of a busy session state
#[test]
fn benchmark_state_snapshot_encoding() {
    let state = busy_state(8, 500);

    let iterations = 1_000;
    let start = Instant::now();

    let mut total_bytes = 0usize;
    for _ in 0..iterations {
        let bytes = bincode::serialize(&Message::GameStateUpdate {
            state: state.clone(),
        })
        .unwrap();
        total_bytes += bytes.len();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot encoding: {} iterations in {:?} ({} bytes each)",
        iterations,
        duration,
        total_bytes / iterations
    );

    assert!(duration.as_millis() < 5000);
}

/// Benchmarks the scanline flood fill on a full-size canvas
#[test]
fn benchmark_flood_fill_full_canvas() {
    let iterations = 20;
    let start = Instant::now();

    for i in 0..iterations {
        let mut raster = Raster::new(800, 500);
        raster.flood_fill(400, 250, 0x00ff_0000 + i);
        assert_eq!(raster.pixel(0, 0), Some(0x00ff_0000 + i));
    }

    let duration = start.elapsed();
    println!(
        "Flood fill 800x500: {} fills in {:?} ({:.2} ms/fill)",
        iterations,
        duration,
        duration.as_millis() as f64 / iterations as f64
    );

    // A fill must replay faster than a frame to keep remote canvases live.
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks no-repeat word draws against a growing used set
#[test]
fn benchmark_word_draws() {
    let mut used: HashSet<String> = HashSet::new();

    let iterations = 10_000;
    let start = Instant::now();

    for i in 0..iterations {
        let drawn = words::random_words("Mix", 3, &used);
        assert_eq!(drawn.len(), 3);
        // Grow the used set the way a long session would.
        if i % 100 == 0 {
            for word in drawn {
                used.insert(word);
            }
        }
    }

    let duration = start.elapsed();
    println!(
        "Word draws: {} draws in {:?} ({:.2} µs/draw)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}
