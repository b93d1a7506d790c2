use std::fmt::Write as _;

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use pitchseq_terminal::dataset::{LoadFilter, load_csv_reader};
use pitchseq_terminal::demo_feed::{DEMO_SEED, generate_pitches};
use pitchseq_terminal::outcome::{SequenceMode, compute_success};
use pitchseq_terminal::pitch_rankings::{RankConfig, RankSelector, rank, rank_matrix};
use pitchseq_terminal::pitches::{Hand, PitchEvent, PitchType};

const BENCH_GAMES: u32 = 200;

fn events_to_csv(events: &[PitchEvent]) -> String {
    let mut out = String::from(
        "pitch_type,game_date,game_pk,at_bat_number,pitch_number,p_throws,stand,events,description,launch_speed,year\n",
    );
    for e in events {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{}",
            e.pitch_type.code(),
            e.game_date.map(|d| d.to_string()).unwrap_or_default(),
            e.game_pk.map(|v| v.to_string()).unwrap_or_default(),
            e.at_bat_number.map(|v| v.to_string()).unwrap_or_default(),
            e.pitch_number.map(|v| v.to_string()).unwrap_or_default(),
            e.p_throws,
            e.stand,
            e.events.as_deref().unwrap_or(""),
            e.description.as_deref().unwrap_or(""),
            e.launch_speed.map(|v| v.to_string()).unwrap_or_default(),
            e.year
        );
    }
    out
}

fn bench_compute_success(c: &mut Criterion) {
    let events = generate_pitches(BENCH_GAMES, DEMO_SEED);
    c.bench_function("compute_success_table_order", |b| {
        b.iter(|| {
            let scored = compute_success(black_box(&events), SequenceMode::TableOrder);
            black_box(scored.len());
        })
    });
    c.bench_function("compute_success_at_bat", |b| {
        b.iter(|| {
            let scored = compute_success(black_box(&events), SequenceMode::AtBat);
            black_box(scored.len());
        })
    });
}

fn bench_rank(c: &mut Criterion) {
    let events = generate_pitches(BENCH_GAMES, DEMO_SEED);
    let scored = compute_success(&events, SequenceMode::TableOrder);
    let selector = RankSelector {
        prev_pitch_type: PitchType::FourSeamFastball,
        pitcher_hand: Hand::R,
        batter_hand: Hand::R,
    };
    c.bench_function("rank_single_selector", |b| {
        b.iter(|| {
            let rows = rank(black_box(&scored), selector, RankConfig::default()).unwrap();
            black_box(rows.len());
        })
    });
}

fn bench_rank_matrix(c: &mut Criterion) {
    let events = generate_pitches(BENCH_GAMES, DEMO_SEED);
    let scored = compute_success(&events, SequenceMode::TableOrder);
    c.bench_function("rank_matrix", |b| {
        b.iter(|| {
            let matrix = rank_matrix(black_box(&scored), RankConfig::default()).unwrap();
            black_box(matrix.len());
        })
    });
}

fn bench_csv_load(c: &mut Criterion) {
    let csv = events_to_csv(&generate_pitches(50, DEMO_SEED));
    let filter = LoadFilter::default();
    c.bench_function("csv_load_chunked", |b| {
        b.iter(|| {
            let (events, _) =
                load_csv_reader(black_box(csv.as_bytes()), &filter, 10_000, "bench").unwrap();
            black_box(events.len());
        })
    });
}

criterion_group!(
    perf,
    bench_compute_success,
    bench_rank,
    bench_rank_matrix,
    bench_csv_load
);
criterion_main!(perf);
