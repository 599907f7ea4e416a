pub mod analyzer;
pub mod app_dirs;
pub mod classifier;
pub mod config;
pub mod oracle;
pub mod progress;
pub mod puzzle;
pub mod refutation;
pub mod runtime;
pub mod session;
pub mod timer;
pub mod ui;
pub mod util;

use crate::{
    app_dirs::progress_db_path,
    config::{Config, ConfigStore, FileConfigStore},
    progress::{ProgressDb, SessionRecord},
    puzzle::{Difficulty, PuzzleProvider},
    runtime::{CrosstermEventSource, Runner, TrainerEvent},
    session::{
        Command, Session, SessionEvent, SessionOptions, SessionSummary, Status, TimerMode,
    },
    timer::SystemClock,
    ui::board::BoardView,
};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use shakmaty::Color;
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};

const TICK_RATE_MS: u64 = 100;
const HISTORY_LIMIT: usize = 20;

/// chess vision trainer: find every check and capture
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A chess vision trainer. Each puzzle deals a position; find every check and every capture for both sides, dodge the scripted blunders, and track your accuracy over time."
)]
pub struct Cli {
    /// puzzle difficulty tier
    #[clap(short = 'd', long, value_enum)]
    difficulty: Option<Difficulty>,

    /// number of puzzles in the session
    #[clap(short = 'n', long)]
    puzzles: Option<usize>,

    /// total session time limit in seconds
    #[clap(short = 's', long)]
    seconds: Option<u64>,

    /// apply the time limit to each puzzle instead of the whole session
    #[clap(long)]
    per_puzzle: bool,

    /// work through the four categories one at a time (white checks, white
    /// captures, black checks, black captures)
    #[clap(long)]
    sequential: bool,

    /// reject moves that lose material even when they check or capture
    #[clap(long)]
    good_moves_only: bool,

    /// always show the board from white's side
    #[clap(long)]
    no_flip: bool,

    /// write the session history as CSV to the given path and exit
    #[clap(long, value_name = "PATH")]
    export_history: Option<PathBuf>,
}

impl Cli {
    /// Saved config provides the defaults; explicit flags override and are
    /// saved back.
    fn merge_into(&self, cfg: &mut Config) {
        if let Some(d) = self.difficulty {
            cfg.difficulty = d;
        }
        if let Some(n) = self.puzzles {
            cfg.puzzle_count = n;
        }
        if let Some(s) = self.seconds {
            cfg.time_limit_secs = Some(s);
        }
        if self.per_puzzle {
            cfg.per_puzzle_timer = true;
        }
        if self.sequential {
            cfg.sequential = true;
        }
        if self.good_moves_only {
            cfg.good_moves_only = true;
        }
        if self.no_flip {
            cfg.auto_flip = false;
        }
    }
}

fn session_options(cfg: &Config) -> SessionOptions {
    let timer = match (cfg.time_limit_secs, cfg.per_puzzle_timer) {
        (Some(secs), true) => TimerMode::PerPuzzle(secs),
        (Some(secs), false) => TimerMode::Total(secs),
        (None, _) => TimerMode::Off,
    };
    SessionOptions {
        difficulty: cfg.difficulty,
        timer,
        sequential: cfg.sequential,
        good_moves_only: cfg.good_moves_only,
        auto_flip: cfg.auto_flip,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Playing,
    Results,
    History,
}

/// One entry in the found-move log panel.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub san: String,
    pub is_check: bool,
    pub is_capture: bool,
    pub color: Color,
}

pub struct App {
    pub session: Session<SystemClock>,
    pub board: BoardView,
    pub status: Status,
    pub log: Vec<LogEntry>,
    pub state: AppState,
    pub summary: Option<SessionSummary>,
    pub history: Vec<SessionRecord>,
    pub time_up_prompt: bool,
    pub progress: Option<ProgressDb>,
    opts: SessionOptions,
    puzzle_count: usize,
    provider: PuzzleProvider,
}

impl App {
    pub fn new(
        opts: SessionOptions,
        puzzle_count: usize,
        provider: PuzzleProvider,
        progress: Option<ProgressDb>,
    ) -> Self {
        let solved = progress
            .as_ref()
            .and_then(|db| db.solved_ids().ok())
            .unwrap_or_default();
        let puzzles = provider.session_set(opts.difficulty, puzzle_count, &solved);
        let (session, cmds) = Session::new(opts.clone(), puzzles, solved, SystemClock);
        let mut app = Self {
            session,
            board: BoardView::default(),
            status: Status::FindTargets,
            log: Vec::new(),
            state: AppState::Playing,
            summary: None,
            history: Vec::new(),
            time_up_prompt: false,
            progress,
            opts,
            puzzle_count,
            provider,
        };
        app.apply_commands(cmds);
        app
    }

    /// Minimal app around an existing session, for render tests.
    #[cfg(test)]
    pub fn headless(session: Session<SystemClock>) -> Self {
        Self {
            session,
            board: BoardView::default(),
            status: Status::FindTargets,
            log: Vec::new(),
            state: AppState::Playing,
            summary: None,
            history: Vec::new(),
            time_up_prompt: false,
            progress: None,
            opts: SessionOptions::default(),
            puzzle_count: 0,
            provider: PuzzleProvider::from_puzzles(vec![]),
        }
    }

    /// Start a fresh session with the same options. Solved-puzzle ordering
    /// re-reads the progress store so newly solved puzzles sink to the back.
    pub fn retry(&mut self) {
        self.session.destroy();
        let solved = self
            .progress
            .as_ref()
            .and_then(|db| db.solved_ids().ok())
            .unwrap_or_default();
        let puzzles = self
            .provider
            .session_set(self.opts.difficulty, self.puzzle_count, &solved);
        let (session, cmds) = Session::new(self.opts.clone(), puzzles, solved, SystemClock);
        self.session = session;
        self.board = BoardView::default();
        self.status = Status::FindTargets;
        self.log.clear();
        self.summary = None;
        self.time_up_prompt = false;
        self.state = AppState::Playing;
        self.apply_commands(cmds);
    }

    pub fn apply_commands(&mut self, cmds: Vec<Command>) {
        for cmd in cmds {
            match cmd {
                Command::SetBoard { fen, orientation } => self.board.set_board(&fen, orientation),
                Command::RevertBoard { fen } => self.board.revert(&fen),
                Command::HighlightSquares { from, to } => self.board.highlight(from, to),
                Command::ClearHighlights => self.board.clear_highlights(),
                Command::DrawArrow { from, to } => self.board.draw_arrow(from, to),
                Command::SetStatus(status) => self.status = status,
                Command::LogFoundMove {
                    san,
                    is_check,
                    is_capture,
                    color,
                } => self.log.push(LogEntry {
                    san,
                    is_check,
                    is_capture,
                    color,
                }),
                Command::ClearLog => self.log.clear(),
                Command::RecordSolved { puzzle_id } => {
                    if let Some(db) = &self.progress {
                        let _ = db.record_puzzle_solved(puzzle_id);
                    }
                }
                Command::TimeUp => self.time_up_prompt = true,
                Command::Finished(summary) => {
                    if let Some(db) = &self.progress {
                        let _ = db.record_session_result(&summary);
                    }
                    self.summary = Some(summary);
                    self.time_up_prompt = false;
                    self.state = AppState::Results;
                }
            }
        }
    }

    fn load_history(&mut self) {
        self.history = self
            .progress
            .as_ref()
            .and_then(|db| db.recent_sessions(HISTORY_LIMIT).ok())
            .unwrap_or_default();
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(path) = &cli.export_history {
        let db_path = progress_db_path().ok_or("cannot resolve progress database path")?;
        let db = ProgressDb::open(&db_path)?;
        let file = std::fs::File::create(path)?;
        db.export_history_csv(file)?;
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = FileConfigStore::new();
    let mut cfg = store.load();
    cli.merge_into(&mut cfg);
    let _ = store.save(&cfg);

    let progress = progress_db_path().and_then(|p| ProgressDb::open(&p).ok());
    let provider = PuzzleProvider::bundled();
    if provider.is_empty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "no puzzles available").exit();
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(session_options(&cfg), cfg.puzzle_count, provider, progress);
    let result = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        Duration::from_millis(TICK_RATE_MS),
    );

    terminal.draw(|f| f.render_widget(&*app, f.area()))?;

    loop {
        match runner.step() {
            TrainerEvent::Tick => {
                if app.state == AppState::Playing {
                    let cmds = app.session.handle_event(SessionEvent::Tick);
                    app.apply_commands(cmds);
                    terminal.draw(|f| f.render_widget(&*app, f.area()))?;
                }
            }
            TrainerEvent::Redraw => {
                terminal.draw(|f| f.render_widget(&*app, f.area()))?;
            }
            TrainerEvent::Key(key) => {
                if is_quit(&key) {
                    break;
                }
                if !handle_key(app, key) {
                    break;
                }
                terminal.draw(|f| f.render_widget(&*app, f.area()))?;
            }
        }
    }

    app.session.destroy();
    Ok(())
}

fn is_quit(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
}

/// Returns false when the app should exit.
fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    // Any key dismisses the total-timeout prompt.
    if app.time_up_prompt {
        let cmds = app.session.acknowledge_timeout();
        app.apply_commands(cmds);
        return true;
    }

    match app.state {
        AppState::Playing => match key.code {
            KeyCode::Esc => {
                let cmds = app.session.finish_now();
                app.apply_commands(cmds);
                true
            }
            KeyCode::Up | KeyCode::Char('k') => {
                app.board.move_cursor(0, 1);
                true
            }
            KeyCode::Down | KeyCode::Char('j') => {
                app.board.move_cursor(0, -1);
                true
            }
            KeyCode::Left | KeyCode::Char('h') => {
                app.board.move_cursor(-1, 0);
                true
            }
            KeyCode::Right | KeyCode::Char('l') => {
                app.board.move_cursor(1, 0);
                true
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some((from, to)) = app.board.select() {
                    let cmds = app.session.handle_event(SessionEvent::UserMove { from, to });
                    app.apply_commands(cmds);
                }
                true
            }
            _ => true,
        },
        AppState::Results => match key.code {
            KeyCode::Esc => false,
            KeyCode::Char('r') => {
                app.retry();
                true
            }
            KeyCode::Char('h') => {
                app.load_history();
                app.state = AppState::History;
                true
            }
            _ => true,
        },
        AppState::History => match key.code {
            KeyCode::Esc => false,
            KeyCode::Char('b') | KeyCode::Backspace => {
                app.state = AppState::Results;
                true
            }
            _ => true,
        },
    }
}
