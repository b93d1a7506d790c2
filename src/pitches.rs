use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Statcast pitch codes the tool knows about, in display-table order.
pub const PITCH_TYPE_TABLE: [(&str, &str); 12] = [
    ("FF", "Four-Seam Fastball"),
    ("SL", "Slider"),
    ("CU", "Curveball"),
    ("CH", "Changeup"),
    ("FS", "Splitter"),
    ("SI", "Sinker"),
    ("FC", "Cutter"),
    ("KC", "Knuckle Curve"),
    ("KN", "Knuckleball"),
    ("SV", "Sweeper"),
    ("ST", "Sweeping Curve"),
    ("CS", "Slow Curve"),
];

/// Serialized as its display name, the same text the table and workbook show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PitchType {
    FourSeamFastball,
    Slider,
    Curveball,
    Changeup,
    Splitter,
    Sinker,
    Cutter,
    KnuckleCurve,
    Knuckleball,
    Sweeper,
    SweepingCurve,
    SlowCurve,
}

impl PitchType {
    pub const ALL: [PitchType; 12] = [
        PitchType::FourSeamFastball,
        PitchType::Slider,
        PitchType::Curveball,
        PitchType::Changeup,
        PitchType::Splitter,
        PitchType::Sinker,
        PitchType::Cutter,
        PitchType::KnuckleCurve,
        PitchType::Knuckleball,
        PitchType::Sweeper,
        PitchType::SweepingCurve,
        PitchType::SlowCurve,
    ];

    /// Map a raw Statcast code. Anything outside the table is `None` and the
    /// row carrying it gets dropped by the loader.
    pub fn from_code(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "FF" => Some(PitchType::FourSeamFastball),
            "SL" => Some(PitchType::Slider),
            "CU" => Some(PitchType::Curveball),
            "CH" => Some(PitchType::Changeup),
            "FS" => Some(PitchType::Splitter),
            "SI" => Some(PitchType::Sinker),
            "FC" => Some(PitchType::Cutter),
            "KC" => Some(PitchType::KnuckleCurve),
            "KN" => Some(PitchType::Knuckleball),
            "SV" => Some(PitchType::Sweeper),
            "ST" => Some(PitchType::SweepingCurve),
            "CS" => Some(PitchType::SlowCurve),
            _ => None,
        }
    }

    /// Accepts either a code ("SL") or a display name ("slider").
    pub fn parse_label(raw: &str) -> Option<Self> {
        if let Some(pt) = Self::from_code(raw) {
            return Some(pt);
        }
        let needle = raw.trim();
        Self::ALL
            .into_iter()
            .find(|pt| pt.name().eq_ignore_ascii_case(needle))
    }

    pub fn code(self) -> &'static str {
        PITCH_TYPE_TABLE[self.table_index()].0
    }

    pub fn name(self) -> &'static str {
        PITCH_TYPE_TABLE[self.table_index()].1
    }

    fn table_index(self) -> usize {
        match self {
            PitchType::FourSeamFastball => 0,
            PitchType::Slider => 1,
            PitchType::Curveball => 2,
            PitchType::Changeup => 3,
            PitchType::Splitter => 4,
            PitchType::Sinker => 5,
            PitchType::Cutter => 6,
            PitchType::KnuckleCurve => 7,
            PitchType::Knuckleball => 8,
            PitchType::Sweeper => 9,
            PitchType::SweepingCurve => 10,
            PitchType::SlowCurve => 11,
        }
    }
}

impl From<PitchType> for String {
    fn from(pt: PitchType) -> Self {
        pt.name().to_string()
    }
}

impl TryFrom<String> for PitchType {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        PitchType::parse_label(&raw).ok_or_else(|| format!("unknown pitch type: {raw}"))
    }
}

impl fmt::Display for PitchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hand {
    R,
    L,
}

impl Hand {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "R" | "r" => Some(Hand::R),
            "L" | "l" => Some(Hand::L),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Hand::R => "R",
            Hand::L => "L",
        }
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pitch thrown, after the loader has mapped and validated it.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchEvent {
    pub pitch_type: PitchType,
    pub p_throws: Hand,
    pub stand: Hand,
    pub events: Option<String>,
    pub description: Option<String>,
    pub launch_speed: Option<f64>,
    pub year: i32,
    pub game_date: Option<NaiveDate>,
    pub game_pk: Option<u64>,
    pub at_bat_number: Option<u32>,
    pub pitch_number: Option<u32>,
}

impl PitchEvent {
    /// Minimal row; the optional identity/date columns start empty.
    pub fn new(pitch_type: PitchType, p_throws: Hand, stand: Hand, year: i32) -> Self {
        Self {
            pitch_type,
            p_throws,
            stand,
            events: None,
            description: None,
            launch_speed: None,
            year,
            game_date: None,
            game_pk: None,
            at_bat_number: None,
            pitch_number: None,
        }
    }

    /// (game, at-bat, pitch) when all three are present.
    pub fn identity(&self) -> Option<(u64, u32, u32)> {
        Some((self.game_pk?, self.at_bat_number?, self.pitch_number?))
    }

    pub fn at_bat_key(&self) -> Option<(u64, u32)> {
        Some((self.game_pk?, self.at_bat_number?))
    }
}
