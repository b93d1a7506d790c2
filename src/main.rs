use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap};
use tracing::{info, warn};

use pitchseq_terminal::config::AppConfig;
use pitchseq_terminal::dataset::DatasetCache;
use pitchseq_terminal::demo_feed::demo_dataset;
use pitchseq_terminal::export::export_workbook;
use pitchseq_terminal::logging;
use pitchseq_terminal::pitches::PITCH_TYPE_TABLE;
use pitchseq_terminal::state::{AppState, ResultsView, SelectorFocus};

const DEMO_GAMES: u32 = 600;

struct App {
    state: AppState,
    cfg: AppConfig,
    cache: DatasetCache,
    should_quit: bool,
}

impl App {
    fn new(cfg: AppConfig) -> Self {
        Self {
            state: AppState::new(cfg.rank, cfg.sequence),
            cfg,
            cache: DatasetCache::new(),
            should_quit: false,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.help_overlay || self.state.show_pitch_key {
            match key.code {
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('c') => {
                    self.state.help_overlay = false;
                    self.state.show_pitch_key = false;
                }
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            }
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => self.state.focus_next(),
            KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => self.state.focus_prev(),
            KeyCode::Char('j') | KeyCode::Down => self.state.cycle_value_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.cycle_value_prev(),
            KeyCode::Char('r') | KeyCode::Char('R') => self.reload(true),
            KeyCode::Char('x') | KeyCode::Char('X') => self.export(),
            KeyCode::Char('c') => self.state.show_pitch_key = true,
            KeyCode::Char('?') => self.state.help_overlay = true,
            _ => {}
        }
    }

    fn reload(&mut self, announce: bool) {
        if self.cfg.demo {
            if self.state.dataset.is_none() {
                let data = Arc::new(demo_dataset(DEMO_GAMES));
                self.state.source_label = "demo data".to_string();
                self.state
                    .push_log(format!("[INFO] Generated {} demo pitches", data.len()));
                self.state.set_dataset(data);
            } else if announce {
                self.state.push_log("[INFO] Demo data does not reload");
            }
            return;
        }

        let source = self.cfg.data_source();
        let loads_before = self.cache.loads();
        match self.cache.get_or_load(&source) {
            Ok(data) => {
                let fresh = self.cache.loads() != loads_before;
                if !fresh && self.state.dataset.is_some() {
                    if announce {
                        self.state
                            .push_log("[INFO] Source unchanged, using cached dataset");
                    }
                    return;
                }
                self.state.source_label = source_label(&self.cfg);
                self.state.push_log(format!(
                    "[INFO] Loaded {} pitches ({})",
                    data.len(),
                    data.stats.summary_line()
                ));
                if data.is_empty() {
                    self.state.push_log(
                        "[WARN] The dataset is empty or does not match the filtering criteria.",
                    );
                }
                self.state.set_dataset(data);
            }
            Err(err) => {
                warn!("dataset load failed: {err:#}");
                self.state.push_log(format!("[WARN] Load failed: {err:#}"));
            }
        }
    }

    fn export(&mut self) {
        let Some(dataset) = self.state.dataset.clone() else {
            self.state.push_log("[INFO] Nothing to export yet");
            return;
        };
        if dataset.is_empty() {
            self.state.push_log("[INFO] Nothing to export: dataset is empty");
            return;
        }
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self
            .cfg
            .export_dir
            .join(format!("pitch_rankings_{stamp}.xlsx"));
        match export_workbook(
            &path,
            &self.state.scored,
            self.state.selector(),
            &self.state.results,
            self.state.rank_cfg,
            &dataset.stats,
        ) {
            Ok(report) => {
                info!(path = %path.display(), "exported workbook");
                self.state.push_log(format!(
                    "[INFO] Exported {} combinations ({} rows) to {}",
                    report.combinations,
                    report.matrix_rows,
                    path.display()
                ));
            }
            Err(err) => self.state.push_log(format!("[WARN] Export failed: {err:#}")),
        }
    }
}

fn source_label(cfg: &AppConfig) -> String {
    let names = cfg
        .data_paths
        .iter()
        .map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| p.display().to_string())
        })
        .collect::<Vec<_>>();
    names.join(", ")
}

fn main() -> io::Result<()> {
    let cfg = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("config error: {err:#}");
            std::process::exit(2);
        }
    };
    if let Some(path) = cfg.log_file.as_ref()
        && let Err(err) = logging::init_file(path, &cfg.log_filter)
    {
        eprintln!("[WARN] logging disabled: {err:#}");
    }

    let mut app = App::new(cfg);
    app.reload(false);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    loop {
        terminal.draw(|f| ui(f, app))?;

        if event::poll(tick_rate)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.on_key(key);
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(&app.state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    render_selectors(frame, chunks[1], &app.state);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(50), Constraint::Length(46)])
        .split(chunks[2]);
    render_results(frame, body[0], &app.state);
    render_key(frame, body[1]);

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[3]);

    let footer = Paragraph::new(
        "Tab/←/→ Selector | j/k/↑/↓ Change | r Reload | x Export | c Pitch key | ? Help | q Quit",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[4]);

    if app.state.show_pitch_key {
        render_pitch_key_overlay(frame, frame.size());
    } else if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let prior = state
        .prior
        .map(|p| format!("{:.1}%", p * 100.0))
        .unwrap_or_else(|| "-".to_string());
    let source = if state.source_label.is_empty() {
        "no source"
    } else {
        state.source_label.as_str()
    };
    let line1 = format!(
        "PITCH SEQUENCE SUCCESS RATES | {source} | prior {prior} | m={} | prev: {}",
        state.rank_cfg.prior_count,
        state.sequence.label()
    );
    let line2 =
        "Find which pitches have been most successful after the pitch you just threw.".to_string();
    let line3 = match state.dataset.as_ref().and_then(|d| d.year_span()) {
        Some((from, to)) if from == to => format!("Data: Statcast pitches from the {from} season."),
        Some((from, to)) => format!("Data: Statcast pitches from the {from}-{to} seasons."),
        None => "Data: none loaded.".to_string(),
    };
    format!("{line1}\n{line2}\n{line3}")
}

fn render_selectors(frame: &mut Frame, area: Rect, state: &AppState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(44),
            Constraint::Percentage(28),
            Constraint::Percentage(28),
        ])
        .split(area);

    let pitch = state
        .selected_pitch()
        .map(|p| p.name().to_string())
        .unwrap_or_else(|| "-".to_string());
    let pitcher = state
        .selected_pitcher_hand()
        .map(|h| h.to_string())
        .unwrap_or_else(|| "-".to_string());
    let batter = state
        .selected_batter_hand()
        .map(|h| h.to_string())
        .unwrap_or_else(|| "-".to_string());

    let items = [
        (SelectorFocus::PrevPitch, "Previous Pitch Type", pitch),
        (SelectorFocus::PitcherHand, "Pitcher Handedness", pitcher),
        (SelectorFocus::BatterHand, "Hitter Handedness", batter),
    ];
    for (idx, (focus, title, value)) in items.into_iter().enumerate() {
        let focused = state.focus == focus;
        let style = if focused {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let text = if focused {
            format!("◀ {value} ▶")
        } else {
            format!("  {value}")
        };
        let widget = Paragraph::new(text)
            .style(style)
            .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(widget, cols[idx]);
    }
}

fn render_results(frame: &mut Frame, area: Rect, state: &AppState) {
    let title = format!("Top {} Ranked Pitch Recommendations", state.rank_cfg.top_n);
    let block = Block::default().title(title).borders(Borders::ALL);

    let message = match state.results_view() {
        ResultsView::Ranked => None,
        ResultsView::NotLoaded => Some("No dataset loaded. Check the console, then press r."),
        ResultsView::EmptyDataset => {
            Some("The dataset is empty or does not match the filtering criteria.")
        }
        ResultsView::NoMatches => Some("No data available for the selected filters."),
        ResultsView::Failed => Some("Ranking failed. See the console for details."),
    };
    if let Some(message) = message {
        let empty = Paragraph::new(message)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let header = Row::new(vec![
        Cell::from("Rank"),
        Cell::from("Pitch Type"),
        Cell::from("Success Rate"),
        Cell::from("Weighted"),
        Cell::from("Occurrences"),
    ])
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows = state.results.iter().map(|stat| {
        let style = if stat.rank == 1 {
            Style::default().fg(Color::Green)
        } else {
            Style::default()
        };
        Row::new(vec![
            Cell::from(stat.rank.to_string()),
            Cell::from(stat.pitch_type.name()),
            Cell::from(format!("{:.1}%", stat.raw_rate * 100.0)),
            Cell::from(format!("{:.1}%", stat.weighted_rate * 100.0)),
            Cell::from(stat.occurrences.to_string()),
        ])
        .style(style)
    });

    let widths = [
        Constraint::Length(5),
        Constraint::Min(20),
        Constraint::Length(13),
        Constraint::Length(10),
        Constraint::Length(12),
    ];
    let table = Table::new(rows, widths).header(header).block(block);
    frame.render_widget(table, area);
}

fn render_key(frame: &mut Frame, area: Rect) {
    let text = [
        "Success Rate: share of times the pitch",
        "sequence ended in a favorable result.",
        "",
        "Weighted Success Rate: success rate pulled",
        "toward the overall rate to account for",
        "small sample sizes.",
        "",
        "Occurrences: times the selected pitch",
        "sequence occurred.",
    ]
    .join("\n");
    let key = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .block(Block::default().title("Key").borders(Borders::ALL));
    frame.render_widget(key, area);
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No messages yet".to_string();
    }
    let start = state.logs.len().saturating_sub(3);
    state
        .logs
        .iter()
        .skip(start)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_pitch_key_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(40, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = PITCH_TYPE_TABLE
        .iter()
        .map(|(code, name)| format!("  {code:<4}{name}"))
        .collect::<Vec<_>>()
        .join("\n");
    let key = Paragraph::new(text)
        .block(Block::default().title("Pitch Codes").borders(Borders::ALL));
    frame.render_widget(key, popup_area);
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Pitch Sequence Terminal - Help",
        "",
        "Selectors:",
        "  Tab / → / l      Next selector",
        "  S-Tab / ← / h    Previous selector",
        "  j/k or ↓/↑       Change value (re-ranks)",
        "",
        "Global:",
        "  r                Reload source (cached if unchanged)",
        "  x                Export xlsx workbook",
        "  c                Pitch code table",
        "  ?                Toggle help",
        "  q                Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
