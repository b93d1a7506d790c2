use std::path::PathBuf;

use pitchseq_terminal::dataset::{DataSource, load_dataset};
use pitchseq_terminal::outcome::{ScoredPitch, SequenceMode, compute_success};
use pitchseq_terminal::pitch_rankings::{
    RankConfig, RankError, RankSelector, global_prior, rank, rank_matrix, weighted_rate,
};
use pitchseq_terminal::pitches::{Hand, PitchEvent, PitchType};

fn scored(
    pitch_type: PitchType,
    prev: Option<PitchType>,
    p_throws: Hand,
    stand: Hand,
    success: bool,
) -> ScoredPitch {
    ScoredPitch {
        event: PitchEvent::new(pitch_type, p_throws, stand, 2023),
        success,
        prev_pitch_type: prev,
    }
}

fn selector(prev: PitchType, p_throws: Hand, stand: Hand) -> RankSelector {
    RankSelector {
        prev_pitch_type: prev,
        pitcher_hand: p_throws,
        batter_hand: stand,
    }
}

/// Three sliders after a four-seamer (two successes) inside a table whose
/// overall success rate is exactly 0.4.
fn slider_after_fastball_table() -> Vec<ScoredPitch> {
    let ff = Some(PitchType::FourSeamFastball);
    let mut rows = vec![
        scored(PitchType::Slider, ff, Hand::R, Hand::R, true),
        scored(PitchType::Slider, ff, Hand::R, Hand::R, true),
        scored(PitchType::Slider, ff, Hand::R, Hand::R, false),
    ];
    // 17 filler rows in another bucket with 6 successes: 8 / 20 overall.
    for idx in 0..17 {
        rows.push(scored(
            PitchType::Changeup,
            Some(PitchType::Sinker),
            Hand::L,
            Hand::L,
            idx < 6,
        ));
    }
    rows
}

#[test]
fn slider_after_fastball_example() {
    let rows = slider_after_fastball_table();
    let prior = global_prior(&rows).expect("non-empty table has a prior");
    assert!((prior - 0.4).abs() < 1e-12);

    let out = rank(
        &rows,
        selector(PitchType::FourSeamFastball, Hand::R, Hand::R),
        RankConfig::default(),
    )
    .expect("rank succeeds");
    assert_eq!(out.len(), 1);
    let slider = &out[0];
    assert_eq!(slider.rank, 1);
    assert_eq!(slider.pitch_type, PitchType::Slider);
    assert_eq!(slider.occurrences, 3);
    assert!((slider.raw_rate - 2.0 / 3.0).abs() < 1e-9);
    assert!((slider.weighted_rate - 0.461_538).abs() < 1e-4);
}

#[test]
fn no_matching_rows_is_empty_not_error() {
    let rows = slider_after_fastball_table();
    let out = rank(
        &rows,
        selector(PitchType::Knuckleball, Hand::L, Hand::R),
        RankConfig::default(),
    )
    .expect("rank succeeds");
    assert!(out.is_empty());
}

#[test]
fn empty_table_has_no_prior() {
    let err = rank(
        &[],
        selector(PitchType::Slider, Hand::R, Hand::R),
        RankConfig::default(),
    )
    .expect_err("no prior on empty table");
    assert_eq!(err, RankError::NoGlobalPrior);
}

#[test]
fn negative_prior_count_rejected() {
    let rows = slider_after_fastball_table();
    let cfg = RankConfig {
        prior_count: -1.0,
        top_n: 5,
    };
    let err = rank(&rows, selector(PitchType::FourSeamFastball, Hand::R, Hand::R), cfg)
        .expect_err("negative prior count");
    assert_eq!(err, RankError::InvalidPriorCount(-1.0));
    assert!(rank_matrix(&rows, cfg).is_err());
}

#[test]
fn output_capped_at_top_n_and_sorted() {
    let prev = Some(PitchType::Sinker);
    let mut rows = Vec::new();
    let kinds = [
        (PitchType::FourSeamFastball, 8),
        (PitchType::Slider, 7),
        (PitchType::Changeup, 6),
        (PitchType::Curveball, 5),
        (PitchType::Cutter, 4),
        (PitchType::Sweeper, 3),
        (PitchType::Splitter, 2),
    ];
    for (pt, hits) in kinds {
        for idx in 0..10 {
            rows.push(scored(pt, prev, Hand::R, Hand::L, idx < hits));
        }
    }

    for top_n in [1usize, 3, 5] {
        let cfg = RankConfig {
            prior_count: 10.0,
            top_n,
        };
        let out = rank(&rows, selector(PitchType::Sinker, Hand::R, Hand::L), cfg)
            .expect("rank succeeds");
        assert_eq!(out.len(), top_n);
        for pair in out.windows(2) {
            assert!(pair[0].weighted_rate >= pair[1].weighted_rate);
        }
        let ranks = out.iter().map(|s| s.rank).collect::<Vec<_>>();
        assert_eq!(ranks, (1..=top_n).collect::<Vec<_>>());
        assert_eq!(out[0].pitch_type, PitchType::FourSeamFastball);
    }
}

#[test]
fn equal_rates_break_ties_by_name() {
    let prev = Some(PitchType::Cutter);
    let mut rows = Vec::new();
    for pt in [PitchType::Sweeper, PitchType::Changeup, PitchType::Sinker] {
        rows.push(scored(pt, prev, Hand::L, Hand::R, true));
        rows.push(scored(pt, prev, Hand::L, Hand::R, false));
    }
    let out = rank(
        &rows,
        selector(PitchType::Cutter, Hand::L, Hand::R),
        RankConfig::default(),
    )
    .expect("rank succeeds");
    let names = out.iter().map(|s| s.pitch_type.name()).collect::<Vec<_>>();
    assert_eq!(names, ["Changeup", "Sinker", "Sweeper"]);

    let mut reversed = rows.clone();
    reversed.reverse();
    let again = rank(
        &reversed,
        selector(PitchType::Cutter, Hand::L, Hand::R),
        RankConfig::default(),
    )
    .expect("rank succeeds");
    assert_eq!(out, again);
}

#[test]
fn weighted_rate_stays_between_raw_and_prior() {
    let priors = [0.0, 0.25, 0.4, 0.9, 1.0];
    let raws = [0.0, 0.1, 0.5, 2.0 / 3.0, 1.0];
    for n in [0u64, 1, 3, 50, 10_000] {
        for m in [0.0, 0.5, 10.0, 250.0] {
            for prior in priors {
                for raw in raws {
                    let w = weighted_rate(n, raw, prior, m);
                    assert!(w >= raw.min(prior) && w <= raw.max(prior), "n={n} m={m}");
                }
            }
        }
    }
}

#[test]
fn weighted_rate_limits() {
    assert!((weighted_rate(0, 0.9, 0.3, 10.0) - 0.3).abs() < 1e-12);
    assert_eq!(weighted_rate(0, 0.9, 0.3, 0.0), 0.3);
    assert!((weighted_rate(5_000_000, 0.9, 0.3, 10.0) - 0.9).abs() < 1e-5);
    assert_eq!(weighted_rate(4, 0.75, 0.3, 0.0), 0.75);
}

#[test]
fn prior_counts_every_row_not_just_the_selection() {
    let rows = slider_after_fastball_table();
    let only_selected = rows[..3].to_vec();
    let full = rank(
        &rows,
        selector(PitchType::FourSeamFastball, Hand::R, Hand::R),
        RankConfig::default(),
    )
    .expect("rank succeeds");
    let narrow = rank(
        &only_selected,
        selector(PitchType::FourSeamFastball, Hand::R, Hand::R),
        RankConfig::default(),
    )
    .expect("rank succeeds");
    assert_eq!(full[0].raw_rate, narrow[0].raw_rate);
    assert!(full[0].weighted_rate < narrow[0].weighted_rate);
}

#[test]
fn matrix_covers_each_observed_selector_once() {
    let rows = slider_after_fastball_table();
    let matrix = rank_matrix(&rows, RankConfig::default()).expect("matrix");
    assert_eq!(matrix.len(), 2);
    assert_eq!(matrix[0].selector.prev_pitch_type, PitchType::FourSeamFastball);
    assert_eq!(matrix[1].selector.prev_pitch_type, PitchType::Sinker);
    for entry in &matrix {
        let direct = rank(&rows, entry.selector, RankConfig::default()).expect("rank");
        assert_eq!(direct, entry.rows);
    }
}

#[test]
fn fixture_ranking_end_to_end() {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push("statcast_sample.csv");
    let data = load_dataset(&DataSource::new(vec![path])).expect("fixture loads");
    let rows = compute_success(&data.events, SequenceMode::TableOrder);

    let prior = global_prior(&rows).expect("prior");
    assert!((prior - 4.0 / 9.0).abs() < 1e-12);

    let out = rank(
        &rows,
        selector(PitchType::FourSeamFastball, Hand::R, Hand::R),
        RankConfig::default(),
    )
    .expect("rank succeeds");
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].pitch_type, PitchType::Slider);
    assert_eq!(out[0].occurrences, 2);
    assert!((out[0].raw_rate - 0.5).abs() < 1e-12);
    let expected = (2.0 * 0.5 + 10.0 * (4.0 / 9.0)) / 12.0;
    assert!((out[0].weighted_rate - expected).abs() < 1e-12);
}
