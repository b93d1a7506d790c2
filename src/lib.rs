pub mod config;
pub mod dataset;
pub mod demo_feed;
pub mod export;
pub mod logging;
pub mod outcome;
pub mod pitch_rankings;
pub mod pitches;
pub mod state;
