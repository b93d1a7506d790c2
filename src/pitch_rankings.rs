use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::outcome::ScoredPitch;
use crate::pitches::{Hand, PitchType};

pub const DEFAULT_PRIOR_COUNT: f64 = 10.0;
pub const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Error, PartialEq)]
pub enum RankError {
    #[error("dataset has no scored pitches; global success prior is undefined")]
    NoGlobalPrior,

    #[error("prior count must be a finite value >= 0 (got {0})")]
    InvalidPriorCount(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RankSelector {
    pub prev_pitch_type: PitchType,
    pub pitcher_hand: Hand,
    pub batter_hand: Hand,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankConfig {
    /// Pseudo-observations at the global rate blended into every group.
    pub prior_count: f64,
    pub top_n: usize,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            prior_count: DEFAULT_PRIOR_COUNT,
            top_n: DEFAULT_TOP_N,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PitchTypeStat {
    pub rank: usize,
    pub pitch_type: PitchType,
    pub raw_rate: f64,
    pub weighted_rate: f64,
    pub occurrences: u64,
}

/// One selector triple and its ranked rows, used for the full export matrix.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixEntry {
    pub selector: RankSelector,
    pub rows: Vec<PitchTypeStat>,
}

/// Mean success over every scored row; `None` on an empty table.
pub fn global_prior(scored: &[ScoredPitch]) -> Option<f64> {
    if scored.is_empty() {
        return None;
    }
    let hits = scored.iter().filter(|s| s.success).count();
    Some(hits as f64 / scored.len() as f64)
}

/// Additive pseudo-count shrinkage of `raw_rate` toward `prior`.
///
/// With no observations and no pseudo-observations the prior is returned.
/// The result always lies between `raw_rate` and `prior`.
pub fn weighted_rate(occurrences: u64, raw_rate: f64, prior: f64, prior_count: f64) -> f64 {
    let n = occurrences as f64;
    let denom = n + prior_count;
    if denom <= 0.0 {
        return prior;
    }
    let value = (n * raw_rate + prior_count * prior) / denom;
    // Float rounding can leave the blend an ulp outside its endpoints.
    value.clamp(raw_rate.min(prior), raw_rate.max(prior))
}

#[derive(Debug, Default, Clone, Copy)]
struct GroupAgg {
    count: u64,
    successes: u64,
}

pub fn rank(
    scored: &[ScoredPitch],
    selector: RankSelector,
    cfg: RankConfig,
) -> Result<Vec<PitchTypeStat>, RankError> {
    if !cfg.prior_count.is_finite() || cfg.prior_count < 0.0 {
        return Err(RankError::InvalidPriorCount(cfg.prior_count));
    }
    let prior = global_prior(scored).ok_or(RankError::NoGlobalPrior)?;
    Ok(rank_with_prior(scored, selector, cfg, prior))
}

fn rank_with_prior(
    scored: &[ScoredPitch],
    selector: RankSelector,
    cfg: RankConfig,
    prior: f64,
) -> Vec<PitchTypeStat> {
    // Keyed by display name so equal weighted rates fall back to alphabetical order.
    let mut groups: BTreeMap<&'static str, (PitchType, GroupAgg)> = BTreeMap::new();
    for row in scored.iter().filter(|row| matches_selector(row, selector)) {
        let pt = row.event.pitch_type;
        let (_, agg) = groups.entry(pt.name()).or_insert((pt, GroupAgg::default()));
        agg.count += 1;
        if row.success {
            agg.successes += 1;
        }
    }

    let mut stats: Vec<PitchTypeStat> = groups
        .into_values()
        .map(|(pitch_type, agg)| {
            let raw_rate = agg.successes as f64 / agg.count as f64;
            PitchTypeStat {
                rank: 0,
                pitch_type,
                raw_rate,
                weighted_rate: weighted_rate(agg.count, raw_rate, prior, cfg.prior_count),
                occurrences: agg.count,
            }
        })
        .collect();

    // Stable: ties keep the name order established above.
    stats.sort_by(|a, b| b.weighted_rate.total_cmp(&a.weighted_rate));
    stats.truncate(cfg.top_n);
    for (idx, stat) in stats.iter_mut().enumerate() {
        stat.rank = idx + 1;
    }

    debug!(
        prev = %selector.prev_pitch_type,
        pitcher = %selector.pitcher_hand,
        batter = %selector.batter_hand,
        prior,
        rows = stats.len(),
        "ranked pitch types"
    );
    stats
}

fn matches_selector(row: &ScoredPitch, selector: RankSelector) -> bool {
    row.prev_pitch_type == Some(selector.prev_pitch_type)
        && row.event.p_throws == selector.pitcher_hand
        && row.event.stand == selector.batter_hand
}

/// Rank every (previous pitch, pitcher hand, batter hand) triple that occurs
/// in the table. Triples with no rows are left out.
pub fn rank_matrix(scored: &[ScoredPitch], cfg: RankConfig) -> Result<Vec<MatrixEntry>, RankError> {
    if !cfg.prior_count.is_finite() || cfg.prior_count < 0.0 {
        return Err(RankError::InvalidPriorCount(cfg.prior_count));
    }
    let prior = global_prior(scored).ok_or(RankError::NoGlobalPrior)?;

    let mut seen = HashSet::new();
    let mut selectors = Vec::new();
    for row in scored {
        let Some(prev) = row.prev_pitch_type else {
            continue;
        };
        let selector = RankSelector {
            prev_pitch_type: prev,
            pitcher_hand: row.event.p_throws,
            batter_hand: row.event.stand,
        };
        if seen.insert(selector) {
            selectors.push(selector);
        }
    }
    selectors.sort_by(|a, b| {
        a.prev_pitch_type
            .name()
            .cmp(b.prev_pitch_type.name())
            .then(a.pitcher_hand.as_str().cmp(b.pitcher_hand.as_str()))
            .then(a.batter_hand.as_str().cmp(b.batter_hand.as_str()))
    });

    Ok(selectors
        .into_iter()
        .map(|selector| MatrixEntry {
            selector,
            rows: rank_with_prior(scored, selector, cfg, prior),
        })
        .collect())
}
