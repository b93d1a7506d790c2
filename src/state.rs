use std::collections::VecDeque;
use std::sync::Arc;

use crate::dataset::Dataset;
use crate::outcome::{ScoredPitch, SequenceMode, compute_success};
use crate::pitch_rankings::{PitchTypeStat, RankConfig, RankSelector, global_prior, rank};
use crate::pitches::{Hand, PitchType};

const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorFocus {
    PrevPitch,
    PitcherHand,
    BatterHand,
}

impl SelectorFocus {
    fn next(self) -> Self {
        match self {
            SelectorFocus::PrevPitch => SelectorFocus::PitcherHand,
            SelectorFocus::PitcherHand => SelectorFocus::BatterHand,
            SelectorFocus::BatterHand => SelectorFocus::PrevPitch,
        }
    }

    fn prev(self) -> Self {
        match self {
            SelectorFocus::PrevPitch => SelectorFocus::BatterHand,
            SelectorFocus::PitcherHand => SelectorFocus::PrevPitch,
            SelectorFocus::BatterHand => SelectorFocus::PitcherHand,
        }
    }
}

/// What the results panel should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsView {
    NotLoaded,
    EmptyDataset,
    NoMatches,
    Ranked,
    Failed,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub dataset: Option<Arc<Dataset>>,
    pub scored: Arc<Vec<ScoredPitch>>,
    pub prior: Option<f64>,
    pub rank_cfg: RankConfig,
    pub sequence: SequenceMode,
    pub pitch_options: Vec<PitchType>,
    pub pitcher_options: Vec<Hand>,
    pub batter_options: Vec<Hand>,
    pub pitch_selected: usize,
    pub pitcher_selected: usize,
    pub batter_selected: usize,
    pub focus: SelectorFocus,
    pub results: Vec<PitchTypeStat>,
    pub rank_error: Option<String>,
    pub source_label: String,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
    pub show_pitch_key: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(RankConfig::default(), SequenceMode::default())
    }
}

impl AppState {
    pub fn new(rank_cfg: RankConfig, sequence: SequenceMode) -> Self {
        Self {
            dataset: None,
            scored: Arc::new(Vec::new()),
            prior: None,
            rank_cfg,
            sequence,
            pitch_options: Vec::new(),
            pitcher_options: Vec::new(),
            batter_options: Vec::new(),
            pitch_selected: 0,
            pitcher_selected: 0,
            batter_selected: 0,
            focus: SelectorFocus::PrevPitch,
            results: Vec::new(),
            rank_error: None,
            source_label: String::new(),
            logs: VecDeque::new(),
            help_overlay: false,
            show_pitch_key: false,
        }
    }

    /// Swap in a freshly loaded dataset. Scoring runs once here; selector
    /// changes afterwards only re-rank. Previous selections are kept when the
    /// new dataset still offers them.
    pub fn set_dataset(&mut self, dataset: Arc<Dataset>) {
        let keep_pitch = self.selected_pitch();
        let keep_pitcher = self.selected_pitcher_hand();
        let keep_batter = self.selected_batter_hand();

        self.scored = Arc::new(compute_success(&dataset.events, self.sequence));
        self.prior = global_prior(&self.scored);
        self.pitch_options = dataset.pitch_type_options();
        self.pitcher_options = dataset.pitcher_hand_options();
        self.batter_options = dataset.batter_hand_options();
        self.pitch_selected = position_or_zero(&self.pitch_options, keep_pitch);
        self.pitcher_selected = position_or_zero(&self.pitcher_options, keep_pitcher);
        self.batter_selected = position_or_zero(&self.batter_options, keep_batter);
        self.dataset = Some(dataset);
        self.recompute();
    }

    pub fn selected_pitch(&self) -> Option<PitchType> {
        self.pitch_options.get(self.pitch_selected).copied()
    }

    pub fn selected_pitcher_hand(&self) -> Option<Hand> {
        self.pitcher_options.get(self.pitcher_selected).copied()
    }

    pub fn selected_batter_hand(&self) -> Option<Hand> {
        self.batter_options.get(self.batter_selected).copied()
    }

    pub fn selector(&self) -> Option<RankSelector> {
        Some(RankSelector {
            prev_pitch_type: self.selected_pitch()?,
            pitcher_hand: self.selected_pitcher_hand()?,
            batter_hand: self.selected_batter_hand()?,
        })
    }

    pub fn results_view(&self) -> ResultsView {
        let Some(dataset) = self.dataset.as_ref() else {
            return ResultsView::NotLoaded;
        };
        if dataset.is_empty() {
            return ResultsView::EmptyDataset;
        }
        if self.rank_error.is_some() {
            return ResultsView::Failed;
        }
        if self.results.is_empty() {
            ResultsView::NoMatches
        } else {
            ResultsView::Ranked
        }
    }

    /// Re-run the ranking for the current selectors.
    pub fn recompute(&mut self) {
        self.results.clear();
        self.rank_error = None;
        let Some(dataset) = self.dataset.as_ref() else {
            return;
        };
        if dataset.is_empty() {
            return;
        }
        let Some(selector) = self.selector() else {
            return;
        };
        match rank(&self.scored, selector, self.rank_cfg) {
            Ok(rows) => self.results = rows,
            Err(err) => {
                let msg = err.to_string();
                self.push_log(format!("[WARN] Ranking failed: {msg}"));
                self.rank_error = Some(msg);
            }
        }
    }

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_prev(&mut self) {
        self.focus = self.focus.prev();
    }

    pub fn cycle_value_next(&mut self) {
        self.cycle_value(true);
    }

    pub fn cycle_value_prev(&mut self) {
        self.cycle_value(false);
    }

    fn cycle_value(&mut self, forward: bool) {
        let (idx, len) = match self.focus {
            SelectorFocus::PrevPitch => (&mut self.pitch_selected, self.pitch_options.len()),
            SelectorFocus::PitcherHand => (&mut self.pitcher_selected, self.pitcher_options.len()),
            SelectorFocus::BatterHand => (&mut self.batter_selected, self.batter_options.len()),
        };
        if len == 0 {
            *idx = 0;
            return;
        }
        *idx = if forward {
            (*idx + 1) % len
        } else if *idx == 0 {
            len - 1
        } else {
            *idx - 1
        };
        self.recompute();
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }
}

fn position_or_zero<T: PartialEq>(options: &[T], keep: Option<T>) -> usize {
    keep.and_then(|k| options.iter().position(|o| *o == k))
        .unwrap_or(0)
}
