use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::dataset::LoadStats;
use crate::outcome::ScoredPitch;
use crate::pitch_rankings::{PitchTypeStat, RankConfig, RankSelector, rank_matrix};
use crate::pitches::PITCH_TYPE_TABLE;

#[derive(Debug)]
pub struct ExportReport {
    pub ranking_rows: usize,
    pub matrix_rows: usize,
    pub combinations: usize,
}

const RANKING_HEADER: [&str; 5] = [
    "Rank",
    "Pitch Type",
    "Success Rate",
    "Weighted Success Rate",
    "Occurrences",
];

/// Write the current ranking, every selector combination, the pitch key and
/// the load statistics into one workbook.
pub fn export_workbook(
    path: &Path,
    scored: &[ScoredPitch],
    selector: Option<RankSelector>,
    current: &[PitchTypeStat],
    cfg: RankConfig,
    stats: &LoadStats,
) -> Result<ExportReport> {
    let matrix = rank_matrix(scored, cfg).context("rank selector matrix")?;

    let mut ranking_rows = vec![header_row(&[], &RANKING_HEADER)];
    for stat in current {
        ranking_rows.push(stat_cells(stat));
    }

    let matrix_prefix = ["Previous Pitch", "Pitcher Hand", "Batter Hand"];
    let mut matrix_rows = vec![header_row(&matrix_prefix, &RANKING_HEADER)];
    for entry in &matrix {
        for stat in &entry.rows {
            let mut row = vec![
                entry.selector.prev_pitch_type.name().to_string(),
                entry.selector.pitcher_hand.to_string(),
                entry.selector.batter_hand.to_string(),
            ];
            row.extend(stat_cells(stat));
            matrix_rows.push(row);
        }
    }

    let mut key_rows = vec![vec!["Code".to_string(), "Pitch Type".to_string()]];
    for (code, name) in PITCH_TYPE_TABLE {
        key_rows.push(vec![code.to_string(), name.to_string()]);
    }

    let mut load_rows = vec![vec!["Metric".to_string(), "Value".to_string()]];
    let selection = selector
        .map(|s| format!("{} / P:{} / B:{}", s.prev_pitch_type, s.pitcher_hand, s.batter_hand))
        .unwrap_or_else(|| "-".to_string());
    for (name, value) in [
        ("Selection", selection),
        ("Prior count", format!("{}", cfg.prior_count)),
        ("Top N", cfg.top_n.to_string()),
        ("Files", stats.files.to_string()),
        ("Rows read", stats.rows_read.to_string()),
        ("Rows kept", stats.rows_kept.to_string()),
        ("Dropped: unknown pitch", stats.dropped_unknown_pitch.to_string()),
        ("Dropped: missing field", stats.dropped_missing_field.to_string()),
        ("Dropped: out of range", stats.dropped_out_of_range.to_string()),
        ("Malformed rows", stats.malformed.to_string()),
        ("Duplicates", stats.duplicates.to_string()),
    ] {
        load_rows.push(vec![name.to_string(), value]);
    }

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Ranking")?;
        write_rows(sheet, &ranking_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Matrix")?;
        write_rows(sheet, &matrix_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("PitchKey")?;
        write_rows(sheet, &key_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Load")?;
        write_rows(sheet, &load_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        ranking_rows: ranking_rows.len().saturating_sub(1),
        matrix_rows: matrix_rows.len().saturating_sub(1),
        combinations: matrix.len(),
    })
}

fn header_row(prefix: &[&str], rest: &[&str]) -> Vec<String> {
    prefix
        .iter()
        .chain(rest.iter())
        .map(|s| s.to_string())
        .collect()
}

fn stat_cells(stat: &PitchTypeStat) -> Vec<String> {
    vec![
        stat.rank.to_string(),
        stat.pitch_type.name().to_string(),
        format!("{:.4}", stat.raw_rate),
        format!("{:.4}", stat.weighted_rate),
        stat.occurrences.to_string(),
    ]
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
