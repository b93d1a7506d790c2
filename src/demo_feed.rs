use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dataset::Dataset;
use crate::pitches::{Hand, PitchEvent, PitchType};

pub const DEMO_SEED: u64 = 0x5eed_2023;

// Rough league-wide usage shares; weights only need to be relative.
const PITCH_MIX: [(PitchType, u32); 12] = [
    (PitchType::FourSeamFastball, 32),
    (PitchType::Sinker, 15),
    (PitchType::Slider, 16),
    (PitchType::Changeup, 11),
    (PitchType::Curveball, 7),
    (PitchType::Cutter, 7),
    (PitchType::Sweeper, 6),
    (PitchType::Splitter, 2),
    (PitchType::KnuckleCurve, 2),
    (PitchType::SweepingCurve, 1),
    (PitchType::SlowCurve, 1),
    (PitchType::Knuckleball, 1),
];

const NON_TERMINAL: [(&str, u32); 5] = [
    ("ball", 36),
    ("called_strike", 17),
    ("swinging_strike", 11),
    ("foul", 18),
    ("blocked_ball", 2),
];

/// Synthetic Statcast-like season: games → at-bats → pitches, in game order.
pub fn generate_pitches(games: u32, seed: u64) -> Vec<PitchEvent> {
    let mut rng = StdRng::seed_from_u64(seed);
    let opening_day = NaiveDate::from_ymd_opt(2023, 3, 30).unwrap_or(NaiveDate::MIN);
    let mut out = Vec::new();

    for game in 0..games {
        let game_pk = 700_000 + u64::from(game);
        let game_date = opening_day + ChronoDuration::days(i64::from(game / 15));
        let at_bats = rng.gen_range(65..80u32);
        let mut p_throws = random_hand(&mut rng, 0.72);
        for at_bat in 1..=at_bats {
            if rng.gen_bool(0.08) {
                p_throws = random_hand(&mut rng, 0.72);
            }
            let stand = random_hand(&mut rng, 0.58);
            push_at_bat(&mut rng, &mut out, game_pk, at_bat, game_date, p_throws, stand);
        }
    }
    out
}

pub fn demo_dataset(games: u32) -> Dataset {
    Dataset::from_events(generate_pitches(games, DEMO_SEED))
}

fn push_at_bat(
    rng: &mut StdRng,
    out: &mut Vec<PitchEvent>,
    game_pk: u64,
    at_bat: u32,
    game_date: NaiveDate,
    p_throws: Hand,
    stand: Hand,
) {
    let mut balls = 0u8;
    let mut strikes = 0u8;
    let mut pitch_number = 1u32;

    loop {
        let pitch_type = weighted_pick(rng, &PITCH_MIX);
        let mut event = PitchEvent::new(pitch_type, p_throws, stand, game_date.year());
        event.game_date = Some(game_date);
        event.game_pk = Some(game_pk);
        event.at_bat_number = Some(at_bat);
        event.pitch_number = Some(pitch_number);

        let in_play = rng.gen_bool(0.17);
        if in_play {
            let speed = rng.gen_range(55.0..112.0_f64);
            event.launch_speed = Some((speed * 10.0).round() / 10.0);
            event.description = Some("hit_into_play".to_string());
            let outcome = if speed < 80.0 || rng.gen_bool(0.55) {
                "field_out"
            } else if rng.gen_bool(0.8) {
                "single"
            } else {
                "home_run"
            };
            event.events = Some(outcome.to_string());
            out.push(event);
            return;
        }

        let desc = weighted_pick(rng, &NON_TERMINAL);
        event.description = Some(desc.to_string());
        match desc {
            "ball" | "blocked_ball" => balls += 1,
            "foul" => strikes = (strikes + 1).min(2),
            _ => strikes += 1,
        }
        if strikes >= 3 {
            event.events = Some("strikeout".to_string());
            out.push(event);
            return;
        }
        if balls >= 4 {
            event.events = Some("walk".to_string());
            out.push(event);
            return;
        }
        out.push(event);
        pitch_number += 1;
    }
}

fn random_hand(rng: &mut StdRng, right_share: f64) -> Hand {
    if rng.gen_bool(right_share) { Hand::R } else { Hand::L }
}

fn weighted_pick<T: Copy>(rng: &mut StdRng, table: &[(T, u32)]) -> T {
    let total: u32 = table.iter().map(|(_, w)| *w).sum();
    let mut roll = rng.gen_range(0..total.max(1));
    for (item, weight) in table {
        if roll < *weight {
            return *item;
        }
        roll -= weight;
    }
    table[table.len() - 1].0
}
