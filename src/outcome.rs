use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::pitches::{PitchEvent, PitchType};

/// Exit velocity (mph) below which a ball in play counts as weak contact.
pub const WEAK_CONTACT_MPH: f64 = 80.0;

const STRIKE_DESCRIPTIONS: [&str; 3] = ["swinging_strike", "foul", "called_strike"];

/// How "previous pitch" is resolved for each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SequenceMode {
    /// The row right above, whatever at-bat or game it belongs to.
    #[default]
    TableOrder,
    /// Pitch `n - 1` of the same `game_pk` and `at_bat_number`, wherever it
    /// sits in the table.
    AtBat,
}

impl SequenceMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "table" | "table_order" | "row" => Some(SequenceMode::TableOrder),
            "at_bat" | "atbat" | "at-bat" => Some(SequenceMode::AtBat),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SequenceMode::TableOrder => "table order",
            SequenceMode::AtBat => "per at-bat",
        }
    }
}

/// A loaded pitch plus the two derived columns the ranking needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPitch {
    pub event: PitchEvent,
    pub success: bool,
    pub prev_pitch_type: Option<PitchType>,
}

pub fn is_success(event: &PitchEvent) -> bool {
    if event.events.as_deref() == Some("strikeout") {
        return true;
    }
    if event
        .description
        .as_deref()
        .is_some_and(|d| STRIKE_DESCRIPTIONS.contains(&d))
    {
        return true;
    }
    event
        .launch_speed
        .is_some_and(|speed| speed < WEAK_CONTACT_MPH)
}

/// Derive `success` and `prev_pitch_type` over the whole loaded table.
/// Must run before any selector filtering so the prior sees every row.
pub fn compute_success(events: &[PitchEvent], mode: SequenceMode) -> Vec<ScoredPitch> {
    match mode {
        SequenceMode::TableOrder => {
            let mut prev: Option<PitchType> = None;
            events
                .iter()
                .map(|event| {
                    let scored = score(event, prev);
                    prev = Some(event.pitch_type);
                    scored
                })
                .collect()
        }
        SequenceMode::AtBat => {
            // Exports may list an at-bat's pitches in any order, so look the
            // predecessor up by pitch number instead of by row position.
            let mut by_pitch: HashMap<(u64, u32, u32), PitchType> = HashMap::new();
            for event in events {
                if let Some(id) = event.identity() {
                    by_pitch.entry(id).or_insert(event.pitch_type);
                }
            }
            events
                .iter()
                .map(|event| {
                    let prev = event.identity().and_then(|(game, at_bat, pitch)| {
                        let before = pitch.checked_sub(1)?;
                        by_pitch.get(&(game, at_bat, before)).copied()
                    });
                    score(event, prev)
                })
                .collect()
        }
    }
}

fn score(event: &PitchEvent, prev_pitch_type: Option<PitchType>) -> ScoredPitch {
    ScoredPitch {
        event: event.clone(),
        success: is_success(event),
        prev_pitch_type,
    }
}
