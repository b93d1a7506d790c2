use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use pitchseq_terminal::config::{AppConfig, arg_value, has_flag};
use pitchseq_terminal::dataset::{Dataset, load_dataset};
use pitchseq_terminal::demo_feed::demo_dataset;
use pitchseq_terminal::export::export_workbook;
use pitchseq_terminal::logging;
use pitchseq_terminal::outcome::compute_success;
use pitchseq_terminal::pitch_rankings::{global_prior, rank};
use pitchseq_terminal::pitches::Hand;

fn main() -> anyhow::Result<()> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let cfg = AppConfig::load()?;
    logging::init_stderr(&cfg.log_filter);

    let dataset = if cfg.demo {
        Arc::new(demo_dataset(200))
    } else {
        Arc::new(load_dataset(&cfg.data_source()).context("load dataset")?)
    };
    eprintln!("{}", dataset.stats.summary_line());

    if has_flag(&args, "--list") {
        print_options(&dataset);
        return Ok(());
    }
    if dataset.is_empty() {
        println!("The dataset is empty or does not match the filtering criteria.");
        return Ok(());
    }

    let selector = dataset.selector_from_labels(
        arg_value(&args, "--prev").as_deref(),
        arg_value(&args, "--pitcher").as_deref(),
        arg_value(&args, "--batter").as_deref(),
    )?;
    let scored = compute_success(&dataset.events, cfg.sequence);
    let rows = rank(&scored, selector, cfg.rank)?;

    if let Some(path) = arg_value(&args, "--xlsx").map(PathBuf::from) {
        let report = export_workbook(
            &path,
            &scored,
            Some(selector),
            &rows,
            cfg.rank,
            &dataset.stats,
        )?;
        eprintln!(
            "wrote {} ({} combinations, {} matrix rows)",
            path.display(),
            report.combinations,
            report.matrix_rows
        );
    }

    if has_flag(&args, "--json") {
        let out = serde_json::json!({
            "selector": selector,
            "prior": global_prior(&scored),
            "prior_count": cfg.rank.prior_count,
            "sequence": cfg.sequence.label(),
            "rows": rows,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "After {} | pitcher {} | batter {}",
        selector.prev_pitch_type, selector.pitcher_hand, selector.batter_hand
    );
    if rows.is_empty() {
        println!("No data available for the selected filters.");
        return Ok(());
    }
    println!(
        "{:<5} {:<22} {:>12} {:>10} {:>11}",
        "Rank", "Pitch Type", "Success", "Weighted", "Occurrences"
    );
    for row in rows {
        println!(
            "{:<5} {:<22} {:>11.1}% {:>9.1}% {:>11}",
            row.rank,
            row.pitch_type.name(),
            row.raw_rate * 100.0,
            row.weighted_rate * 100.0,
            row.occurrences
        );
    }
    Ok(())
}

fn print_options(dataset: &Dataset) {
    println!("Pitch types:");
    for pt in dataset.pitch_type_options() {
        println!("  {:<4}{}", pt.code(), pt.name());
    }
    let hands = |hs: Vec<Hand>| {
        hs.iter()
            .map(|h| h.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("Pitcher hands: {}", hands(dataset.pitcher_hand_options()));
    println!("Batter hands: {}", hands(dataset.batter_hand_options()));
    if let Some((from, to)) = dataset.year_span() {
        println!("Seasons: {from}-{to}");
    }
}
