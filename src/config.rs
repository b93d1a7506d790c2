use std::path::PathBuf;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;

use crate::dataset::{DEFAULT_CHUNK_ROWS, DEFAULT_MIN_YEAR, DataSource, LoadFilter};
use crate::outcome::SequenceMode;
use crate::pitch_rankings::{DEFAULT_PRIOR_COUNT, DEFAULT_TOP_N, RankConfig};

pub const DEFAULT_DATA_PATH: &str = "smaller_statcast.csv";
const MIN_CHUNK_ROWS: usize = 1_000;
const MAX_TOP_N: usize = 20;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_paths: Vec<PathBuf>,
    pub filter: LoadFilter,
    pub chunk_rows: usize,
    pub rank: RankConfig,
    pub sequence: SequenceMode,
    /// Generate a synthetic dataset instead of reading files.
    pub demo: bool,
    pub log_filter: String,
    pub log_file: Option<PathBuf>,
    pub export_dir: PathBuf,
}

impl AppConfig {
    /// Load `.env.local`/`.env`, then environment, then command-line flags.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        let args = std::env::args().skip(1).collect::<Vec<_>>();
        Self::from_env_and_args(|key| std::env::var(key).ok(), &args)
    }

    /// `env` is injected so tests never touch the process environment.
    pub fn from_env_and_args(env: impl Fn(&str) -> Option<String>, args: &[String]) -> Result<Self> {
        let env_trimmed = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_raw = arg_value(args, "--data").or_else(|| env_trimmed("PITCH_DATA"));
        let data_paths = match data_raw {
            Some(raw) => parse_paths(&raw),
            None => vec![PathBuf::from(DEFAULT_DATA_PATH)],
        };
        if data_paths.is_empty() {
            return Err(anyhow!("no data paths configured"));
        }

        let min_year = parse_opt::<i32>(arg_value(args, "--min-year").or_else(|| env_trimmed("PITCH_MIN_YEAR")), "min year")?
            .unwrap_or(DEFAULT_MIN_YEAR);
        let max_year = parse_opt::<i32>(arg_value(args, "--max-year").or_else(|| env_trimmed("PITCH_MAX_YEAR")), "max year")?;
        if let Some(max) = max_year
            && max < min_year
        {
            return Err(anyhow!("max year {max} is before min year {min_year}"));
        }
        let date_from = parse_date_opt(arg_value(args, "--from").or_else(|| env_trimmed("PITCH_DATE_FROM")))?;
        let date_to = parse_date_opt(arg_value(args, "--to").or_else(|| env_trimmed("PITCH_DATE_TO")))?;
        if let (Some(from), Some(to)) = (date_from, date_to)
            && to < from
        {
            return Err(anyhow!("date range ends ({to}) before it starts ({from})"));
        }

        let chunk_rows = parse_opt::<usize>(env_trimmed("PITCH_CHUNK_ROWS"), "chunk rows")?
            .unwrap_or(DEFAULT_CHUNK_ROWS)
            .max(MIN_CHUNK_ROWS);

        let prior_count = parse_opt::<f64>(
            arg_value(args, "--prior-count").or_else(|| env_trimmed("PITCH_PRIOR_COUNT")),
            "prior count",
        )?
        .unwrap_or(DEFAULT_PRIOR_COUNT);
        if !prior_count.is_finite() || prior_count < 0.0 {
            return Err(anyhow!("prior count must be >= 0 (got {prior_count})"));
        }
        let top_n = parse_opt::<usize>(arg_value(args, "--top").or_else(|| env_trimmed("PITCH_TOP_N")), "top n")?
            .unwrap_or(DEFAULT_TOP_N)
            .clamp(1, MAX_TOP_N);

        let sequence = match arg_value(args, "--sequence").or_else(|| env_trimmed("PITCH_SEQUENCE")) {
            Some(raw) => SequenceMode::parse(&raw)
                .ok_or_else(|| anyhow!("unknown sequence mode '{raw}' (use table or at_bat)"))?,
            None => SequenceMode::default(),
        };

        Ok(Self {
            data_paths,
            filter: LoadFilter {
                min_year,
                max_year,
                date_from,
                date_to,
            },
            chunk_rows,
            rank: RankConfig { prior_count, top_n },
            sequence,
            demo: has_flag(args, "--demo"),
            log_filter: env_trimmed("PITCH_LOG").unwrap_or_else(|| "info".to_string()),
            log_file: env_trimmed("PITCH_LOG_FILE").map(PathBuf::from),
            export_dir: env_trimmed("PITCH_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        })
    }

    pub fn data_source(&self) -> DataSource {
        DataSource {
            paths: self.data_paths.clone(),
            filter: self.filter.clone(),
            chunk_rows: self.chunk_rows,
        }
    }
}

/// `--name=value` or `--name value`; blank values are ignored.
pub fn arg_value(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(v) = arg.strip_prefix(&prefix) {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
            && !next.starts_with("--")
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

pub fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn parse_paths(raw: &str) -> Vec<PathBuf> {
    raw.split([',', ';'])
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn parse_opt<T: std::str::FromStr>(raw: Option<String>, what: &str) -> Result<Option<T>> {
    match raw {
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow!("invalid {what}: '{v}'")),
        None => Ok(None),
    }
}

fn parse_date_opt(raw: Option<String>) -> Result<Option<NaiveDate>> {
    match raw {
        Some(v) => NaiveDate::parse_from_str(&v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| anyhow!("invalid date '{v}' (expected YYYY-MM-DD)")),
        None => Ok(None),
    }
}
