use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::hash::Hash;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};
use flate2::read::GzDecoder;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::pitch_rankings::RankSelector;
use crate::pitches::{Hand, PitchEvent, PitchType};

pub const DEFAULT_CHUNK_ROWS: usize = 500_000;
pub const DEFAULT_MIN_YEAR: i32 = 2021;

const MAX_LOGGED_MALFORMED: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LoadFilter {
    pub min_year: i32,
    pub max_year: Option<i32>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl Default for LoadFilter {
    fn default() -> Self {
        Self {
            min_year: DEFAULT_MIN_YEAR,
            max_year: None,
            date_from: None,
            date_to: None,
        }
    }
}

impl LoadFilter {
    fn has_date_range(&self) -> bool {
        self.date_from.is_some() || self.date_to.is_some()
    }

    pub fn accepts(&self, year: i32, game_date: Option<NaiveDate>) -> bool {
        if year < self.min_year {
            return false;
        }
        if self.max_year.is_some_and(|max| year > max) {
            return false;
        }
        if !self.has_date_range() {
            return true;
        }
        // A date window cannot be checked without a date.
        let Some(date) = game_date else {
            return false;
        };
        if self.date_from.is_some_and(|from| date < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| date > to) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct DataSource {
    pub paths: Vec<PathBuf>,
    pub filter: LoadFilter,
    pub chunk_rows: usize,
}

impl DataSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            filter: LoadFilter::default(),
            chunk_rows: DEFAULT_CHUNK_ROWS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub files: usize,
    pub rows_read: usize,
    pub rows_kept: usize,
    pub malformed: usize,
    pub dropped_unknown_pitch: usize,
    pub dropped_missing_field: usize,
    pub dropped_out_of_range: usize,
    pub duplicates: usize,
}

impl LoadStats {
    fn merge(&mut self, other: &LoadStats) {
        self.files += other.files;
        self.rows_read += other.rows_read;
        self.rows_kept += other.rows_kept;
        self.malformed += other.malformed;
        self.dropped_unknown_pitch += other.dropped_unknown_pitch;
        self.dropped_missing_field += other.dropped_missing_field;
        self.dropped_out_of_range += other.dropped_out_of_range;
        self.duplicates += other.duplicates;
    }

    pub fn summary_line(&self) -> String {
        format!(
            "files={} read={} kept={} unknown_pitch={} missing={} out_of_range={} malformed={} dup={}",
            self.files,
            self.rows_read,
            self.rows_kept,
            self.dropped_unknown_pitch,
            self.dropped_missing_field,
            self.dropped_out_of_range,
            self.malformed,
            self.duplicates
        )
    }
}

/// The full universe of pitches the ranking runs against.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub events: Vec<PitchEvent>,
    pub stats: LoadStats,
    pub files: Vec<PathBuf>,
}

impl Dataset {
    /// Build from rows already in memory (demo data, tests). Dedup still applies.
    pub fn from_events(events: Vec<PitchEvent>) -> Self {
        let rows_read = events.len();
        let (events, duplicates) = dedup_events(events);
        Self {
            stats: LoadStats {
                rows_read,
                rows_kept: events.len(),
                duplicates,
                ..LoadStats::default()
            },
            events,
            files: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Pitch types in order of first appearance.
    pub fn pitch_type_options(&self) -> Vec<PitchType> {
        unique_in_order(self.events.iter().map(|e| e.pitch_type))
    }

    pub fn pitcher_hand_options(&self) -> Vec<Hand> {
        unique_in_order(self.events.iter().map(|e| e.p_throws))
    }

    pub fn batter_hand_options(&self) -> Vec<Hand> {
        unique_in_order(self.events.iter().map(|e| e.stand))
    }

    pub fn year_span(&self) -> Option<(i32, i32)> {
        let min = self.events.iter().map(|e| e.year).min()?;
        let max = self.events.iter().map(|e| e.year).max()?;
        Some((min, max))
    }

    /// Resolve selector labels against the values this dataset actually
    /// offers. A missing label takes the first option.
    pub fn selector_from_labels(
        &self,
        prev: Option<&str>,
        pitcher: Option<&str>,
        batter: Option<&str>,
    ) -> Result<RankSelector> {
        let pitches = self.pitch_type_options();
        let prev_pitch_type = match prev {
            Some(raw) => PitchType::parse_label(raw)
                .filter(|pt| pitches.contains(pt))
                .ok_or_else(|| {
                    let valid = pitches.iter().map(|pt| pt.code()).collect::<Vec<_>>();
                    anyhow!(
                        "previous pitch '{raw}' not in dataset (valid: {})",
                        valid.join(", ")
                    )
                })?,
            None => pitches
                .first()
                .copied()
                .ok_or_else(|| anyhow!("dataset has no pitch types"))?,
        };
        Ok(RankSelector {
            prev_pitch_type,
            pitcher_hand: pick_hand(pitcher, &self.pitcher_hand_options(), "pitcher hand")?,
            batter_hand: pick_hand(batter, &self.batter_hand_options(), "batter hand")?,
        })
    }
}

fn pick_hand(raw: Option<&str>, options: &[Hand], what: &str) -> Result<Hand> {
    let valid = || {
        options
            .iter()
            .map(|h| h.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    match raw {
        Some(raw) => Hand::parse(raw)
            .filter(|h| options.contains(h))
            .ok_or_else(|| anyhow!("{what} '{raw}' not in dataset (valid: {})", valid())),
        None => options
            .first()
            .copied()
            .ok_or_else(|| anyhow!("dataset has no {what} values")),
    }
}

fn unique_in_order<T: Copy + Eq + Hash>(items: impl Iterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if seen.insert(item) {
            out.push(item);
        }
    }
    out
}

/// Drop repeated (game, at-bat, pitch) identities, first occurrence wins.
/// Rows without a full identity are always kept.
pub fn dedup_events(events: Vec<PitchEvent>) -> (Vec<PitchEvent>, usize) {
    let mut seen = HashSet::new();
    let mut duplicates = 0usize;
    let mut out = Vec::with_capacity(events.len());
    for event in events {
        if let Some(id) = event.identity()
            && !seen.insert(id)
        {
            duplicates += 1;
            continue;
        }
        out.push(event);
    }
    (out, duplicates)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Csv,
    CsvGz,
    Parquet,
}

fn file_kind(path: &Path) -> Option<FileKind> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();
    if name.ends_with(".csv.gz") {
        Some(FileKind::CsvGz)
    } else if name.ends_with(".csv") {
        Some(FileKind::Csv)
    } else if name.ends_with(".parquet") {
        Some(FileKind::Parquet)
    } else {
        None
    }
}

/// Expand directories into their supported files (sorted by name) and check
/// that every explicit path exists.
pub fn resolve_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            for entry in
                fs::read_dir(path).with_context(|| format!("read dir {}", path.display()))?
            {
                let entry = entry.with_context(|| format!("read dir entry in {}", path.display()))?;
                let p = entry.path();
                if p.is_file() && file_kind(&p).is_some() {
                    found.push(p);
                }
            }
            found.sort();
            out.extend(found);
            continue;
        }
        if !path.exists() {
            return Err(anyhow!("data source not found: {}", path.display()));
        }
        if file_kind(path).is_none() {
            return Err(anyhow!(
                "unsupported data file (expected .csv, .csv.gz or .parquet): {}",
                path.display()
            ));
        }
        out.push(path.clone());
    }
    Ok(out)
}

pub fn load_dataset(source: &DataSource) -> Result<Dataset> {
    let files = resolve_files(&source.paths)?;
    if files.is_empty() {
        return Err(anyhow!("no data files found in {:?}", source.paths));
    }
    let chunk_rows = source.chunk_rows.max(1);

    // Files load in parallel; collect keeps source order so table order is stable.
    let parts = files
        .par_iter()
        .map(|path| load_file(path, &source.filter, chunk_rows))
        .collect::<Vec<_>>();

    let mut stats = LoadStats::default();
    let mut events = Vec::new();
    for part in parts {
        let (rows, file_stats) = part?;
        stats.merge(&file_stats);
        events.extend(rows);
    }

    let (events, duplicates) = dedup_events(events);
    stats.duplicates = duplicates;
    stats.rows_kept = events.len();
    if events.is_empty() {
        warn!("no pitches matched the load filters");
    }
    info!(summary = %stats.summary_line(), "dataset loaded");

    Ok(Dataset {
        events,
        stats,
        files,
    })
}

fn load_file(path: &Path, filter: &LoadFilter, chunk_rows: usize) -> Result<(Vec<PitchEvent>, LoadStats)> {
    let kind = file_kind(path)
        .ok_or_else(|| anyhow!("unsupported data file: {}", path.display()))?;
    let label = path.display().to_string();
    let (events, mut stats) = match kind {
        FileKind::Csv => {
            let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
            load_csv_reader(BufReader::new(file), filter, chunk_rows, &label)?
        }
        FileKind::CsvGz => {
            let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
            load_csv_reader(
                BufReader::new(GzDecoder::new(file)),
                filter,
                chunk_rows,
                &label,
            )?
        }
        FileKind::Parquet => load_parquet(path, filter)?,
    };
    stats.files = 1;
    info!(file = %label, read = stats.rows_read, kept = events.len(), "loaded data file");
    Ok((events, stats))
}

#[derive(Debug, Default, Deserialize)]
struct RawPitchRow {
    #[serde(default)]
    pitch_type: Option<String>,
    #[serde(default)]
    p_throws: Option<String>,
    #[serde(default)]
    stand: Option<String>,
    #[serde(default)]
    events: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    launch_speed: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    year: Option<i32>,
    #[serde(default)]
    game_date: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    game_pk: Option<u64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    at_bat_number: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pitch_number: Option<u32>,
}

/// Stream CSV records, filtering every `chunk_rows` records so a large file
/// never holds more than one chunk of unfiltered rows.
pub fn load_csv_reader<R: Read>(
    reader: R,
    filter: &LoadFilter,
    chunk_rows: usize,
    label: &str,
) -> Result<(Vec<PitchEvent>, LoadStats)> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut stats = LoadStats::default();
    let mut events = Vec::new();
    let mut chunk: Vec<RawPitchRow> = Vec::with_capacity(chunk_rows.min(65_536));
    let mut chunk_idx = 0usize;

    for record in rdr.deserialize::<RawPitchRow>() {
        stats.rows_read += 1;
        match record {
            Ok(row) => chunk.push(row),
            Err(err) if err.is_io_error() => {
                return Err(anyhow::Error::new(err).context(format!("read csv {label}")));
            }
            Err(err) => note_malformed(&mut stats, label, err),
        }
        if chunk.len() >= chunk_rows {
            flush_chunk(&mut chunk, filter, &mut stats, &mut events);
            chunk_idx += 1;
            debug!(file = %label, chunk = chunk_idx, kept = events.len(), "filtered chunk");
        }
    }
    if !chunk.is_empty() {
        flush_chunk(&mut chunk, filter, &mut stats, &mut events);
    }
    stats.rows_kept = events.len();
    Ok((events, stats))
}

/// Count a row that could not be decoded; only the first few are logged.
fn note_malformed(stats: &mut LoadStats, label: &str, err: impl fmt::Display) {
    stats.malformed += 1;
    if stats.malformed <= MAX_LOGGED_MALFORMED {
        warn!(file = %label, "skipping malformed row: {err}");
    }
}

fn flush_chunk(
    chunk: &mut Vec<RawPitchRow>,
    filter: &LoadFilter,
    stats: &mut LoadStats,
    out: &mut Vec<PitchEvent>,
) {
    for raw in chunk.drain(..) {
        if let Some(event) = accept_row(raw, filter, stats) {
            out.push(event);
        }
    }
}

fn accept_row(raw: RawPitchRow, filter: &LoadFilter, stats: &mut LoadStats) -> Option<PitchEvent> {
    let Some(pitch_type) = raw.pitch_type.as_deref().and_then(PitchType::from_code) else {
        stats.dropped_unknown_pitch += 1;
        return None;
    };
    let p_throws = raw.p_throws.as_deref().and_then(Hand::parse);
    let stand = raw.stand.as_deref().and_then(Hand::parse);
    let (Some(p_throws), Some(stand)) = (p_throws, stand) else {
        stats.dropped_missing_field += 1;
        return None;
    };
    let game_date = raw.game_date.as_deref().and_then(parse_game_date);
    let Some(year) = raw.year.or_else(|| game_date.map(|d| d.year())) else {
        stats.dropped_missing_field += 1;
        return None;
    };
    if !filter.accepts(year, game_date) {
        stats.dropped_out_of_range += 1;
        return None;
    }

    Some(PitchEvent {
        pitch_type,
        p_throws,
        stand,
        events: non_empty(raw.events),
        description: non_empty(raw.description),
        launch_speed: raw.launch_speed.filter(|v| v.is_finite()),
        year,
        game_date,
        game_pk: raw.game_pk,
        at_bat_number: raw.at_bat_number,
        pitch_number: raw.pitch_number,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn parse_game_date(raw: &str) -> Option<NaiveDate> {
    const FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }
    // Timestamps like "2023-04-01 00:00:00" or "2023-04-01T00:00:00".
    let head = cleaned
        .split([' ', 'T'])
        .next()
        .unwrap_or(cleaned);
    for fmt in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(head, fmt) {
            return Some(date);
        }
    }
    None
}

fn load_parquet(path: &Path, filter: &LoadFilter) -> Result<(Vec<PitchEvent>, LoadStats)> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(file).context("open parquet reader")?;
    let iter = reader.get_row_iter(None).context("iterate parquet rows")?;

    let label = path.display().to_string();
    let mut stats = LoadStats::default();
    let mut events = Vec::new();
    for row in iter {
        stats.rows_read += 1;
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                note_malformed(&mut stats, &label, err);
                continue;
            }
        };
        let mut raw = RawPitchRow::default();
        for (name, field) in row.get_column_iter() {
            match name.as_str() {
                "pitch_type" => raw.pitch_type = field_str(field),
                "p_throws" => raw.p_throws = field_str(field),
                "stand" => raw.stand = field_str(field),
                "events" => raw.events = field_str(field),
                "description" => raw.description = field_str(field),
                "launch_speed" => raw.launch_speed = field_f64(field),
                "year" => raw.year = field_i64(field).and_then(|v| i32::try_from(v).ok()),
                "game_date" => raw.game_date = field_date_text(field),
                "game_pk" => raw.game_pk = field_i64(field).and_then(|v| u64::try_from(v).ok()),
                "at_bat_number" => {
                    raw.at_bat_number = field_i64(field).and_then(|v| u32::try_from(v).ok())
                }
                "pitch_number" => {
                    raw.pitch_number = field_i64(field).and_then(|v| u32::try_from(v).ok())
                }
                _ => {}
            }
        }
        if let Some(event) = accept_row(raw, filter, &mut stats) {
            events.push(event);
        }
    }
    stats.rows_kept = events.len();
    Ok((events, stats))
}

fn field_str(field: &Field) -> Option<String> {
    match field {
        Field::Str(s) => Some(s.clone()),
        Field::Bytes(b) => b.as_utf8().ok().map(|s| s.to_string()),
        _ => None,
    }
}

fn field_f64(field: &Field) -> Option<f64> {
    match field {
        Field::Double(v) => Some(*v),
        Field::Float(v) => Some(f64::from(*v)),
        Field::Int(v) => Some(f64::from(*v)),
        Field::Long(v) => Some(*v as f64),
        Field::Short(v) => Some(f64::from(*v)),
        Field::Str(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn field_i64(field: &Field) -> Option<i64> {
    match field {
        Field::Byte(v) => Some(i64::from(*v)),
        Field::Short(v) => Some(i64::from(*v)),
        Field::Int(v) => Some(i64::from(*v)),
        Field::Long(v) => Some(*v),
        Field::UInt(v) => Some(i64::from(*v)),
        Field::ULong(v) => i64::try_from(*v).ok(),
        Field::Double(v) if v.fract() == 0.0 => Some(*v as i64),
        Field::Float(v) if v.fract() == 0.0 => Some(*v as i64),
        Field::Str(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn field_date_text(field: &Field) -> Option<String> {
    match field {
        Field::Date(days) => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
            let date = epoch.checked_add_signed(ChronoDuration::days(i64::from(*days)))?;
            Some(date.format("%Y-%m-%d").to_string())
        }
        other => field_str(other),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FileStamp {
    path: PathBuf,
    len: u64,
    modified: Option<SystemTime>,
}

/// Identity of a data source: every resolved file with its size and mtime,
/// plus the filters applied while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceKey {
    files: Vec<FileStamp>,
    filter: LoadFilter,
}

impl SourceKey {
    pub fn for_source(source: &DataSource) -> Result<Self> {
        let mut files = Vec::new();
        for path in resolve_files(&source.paths)? {
            let meta = fs::metadata(&path).with_context(|| format!("stat {}", path.display()))?;
            files.push(FileStamp {
                path,
                len: meta.len(),
                modified: meta.modified().ok(),
            });
        }
        Ok(Self {
            files,
            filter: source.filter.clone(),
        })
    }
}

/// Keeps the last loaded dataset until its source changes on disk.
#[derive(Debug, Default)]
pub struct DatasetCache {
    entry: Option<(SourceKey, Arc<Dataset>)>,
    hits: u64,
    loads: u64,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&mut self, source: &DataSource) -> Result<Arc<Dataset>> {
        let key = SourceKey::for_source(source)?;
        if let Some((cached_key, data)) = &self.entry
            && *cached_key == key
        {
            self.hits += 1;
            debug!(hits = self.hits, "dataset cache hit");
            return Ok(Arc::clone(data));
        }

        let data = Arc::new(load_dataset(source)?);
        self.entry = Some((key, Arc::clone(&data)));
        self.loads += 1;
        Ok(data)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn loads(&self) -> u64 {
        self.loads
    }
}
