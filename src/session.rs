use crate::analyzer::{analyze_targets, move_key, TargetAnalysis, TargetKind};
use crate::classifier::{classify, Classification};
use crate::oracle::Board;
use crate::puzzle::{Difficulty, Puzzle};
use crate::refutation::resolve_refutation;
use crate::timer::{Clock, SessionTimer};
use shakmaty::{Color, Square};
use std::collections::HashSet;

/// How long a found-move highlight stays before the board reverts.
pub const FOUND_REVERT_DELAY_MS: u64 = 800;
/// Input-locked penalty window after a scripted blunder.
pub const BAD_MOVE_DELAY_MS: u64 = 3000;
/// Transition delay between a solved puzzle and the next one.
pub const NEXT_PUZZLE_DELAY_MS: u64 = 1500;
/// Delay between a per-puzzle timeout and the next puzzle.
pub const TIMEOUT_ADVANCE_DELAY_MS: u64 = 1500;

/// The four stage tuples of sequential mode, in progression order.
pub const STAGES: [(Color, TargetKind); 4] = [
    (Color::White, TargetKind::Checks),
    (Color::White, TargetKind::Captures),
    (Color::Black, TargetKind::Checks),
    (Color::Black, TargetKind::Captures),
];

pub fn stage_name(stage: usize) -> &'static str {
    match stage {
        0 => "white checks",
        1 => "white captures",
        2 => "black checks",
        _ => "black captures",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    Off,
    /// Countdown re-anchored to now + limit on every puzzle load.
    PerPuzzle(u64),
    /// One countdown for the whole session.
    Total(u64),
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub difficulty: Difficulty,
    pub timer: TimerMode,
    pub sequential: bool,
    pub good_moves_only: bool,
    pub auto_flip: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Easy,
            timer: TimerMode::Off,
            sequential: false,
            good_moves_only: false,
            auto_flip: true,
        }
    }
}

/// Accumulating session counters. Monotonically non-decreasing while the
/// session runs; flushed to the progress store at session end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub total_clicks: u32,
    pub total_errors: u32,
    pub moves_found: u32,
    pub moves_available: u32,
    pub category_found: [u32; 4],
    pub category_total: [u32; 4],
    pub puzzles_attempted: u32,
    pub puzzles_solved: u32,
    pub newly_solved: u32,
    pub previously_solved: u32,
}

impl SessionStats {
    pub fn accuracy(&self) -> f64 {
        if self.moves_available == 0 {
            0.0
        } else {
            self.moves_found as f64 / self.moves_available as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub difficulty: Difficulty,
    pub elapsed_secs: f64,
    pub accuracy: f64,
    pub avg_secs_per_puzzle: f64,
    pub stats: SessionStats,
}

/// User-visible status line values. Rendering (text, colors) is the UI's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    FindTargets,
    Found { san: String },
    FoundButDangerous { san: String },
    AlreadyFound { san: String },
    NotATarget,
    BadMovePlayed { san: String },
    RefutationUnresolvable { san: String },
    PuzzleSolved,
    PuzzleTimeout,
    SessionTimeUp,
}

/// Side effects the session asks its collaborators to perform. The session
/// never touches the UI or the progress store directly, which keeps the whole
/// state machine testable without a terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetBoard {
        fen: String,
        orientation: Color,
    },
    RevertBoard {
        fen: String,
    },
    HighlightSquares {
        from: Square,
        to: Square,
    },
    ClearHighlights,
    DrawArrow {
        from: Square,
        to: Square,
    },
    SetStatus(Status),
    LogFoundMove {
        san: String,
        is_check: bool,
        is_capture: bool,
        color: Color,
    },
    ClearLog,
    RecordSolved {
        puzzle_id: u32,
    },
    /// Total-session deadline reached; the shell presents a blocking prompt
    /// and calls `acknowledge_timeout` when it is dismissed.
    TimeUp,
    Finished(SessionSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    UserMove { from: Square, to: Square },
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingAction {
    RevertBoard,
    ResolveBadMove,
    NextPuzzle,
    TimeoutAdvance,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    fire_at: u64,
    action: PendingAction,
}

/// The session state machine: owns puzzle iteration, found-move tracking,
/// staged progression, timer lifecycle, and session statistics.
///
/// Single-threaded and event-driven: `handle_event` is the only entry point,
/// all suspension goes through the internal pending-action registry drained on
/// ticks, and every pending action is cancelled at puzzle load boundaries and
/// at teardown so nothing can fire into torn-down state.
pub struct Session<C: Clock> {
    opts: SessionOptions,
    puzzles: Vec<Puzzle>,
    clock: C,
    idx: usize,
    board: Option<Board>,
    forced: [Option<Board>; 2],
    targets: TargetAnalysis,
    required: [HashSet<String>; 4],
    found: HashSet<String>,
    stage_idx: usize,
    input_locked: bool,
    bad_move_applied: bool,
    timer: SessionTimer,
    pending: Vec<Pending>,
    stats: SessionStats,
    solved_before: HashSet<u32>,
    finished: bool,
    time_up_signaled: bool,
}

fn color_index(color: Color) -> usize {
    if color.is_white() {
        0
    } else {
        1
    }
}

impl<C: Clock> Session<C> {
    pub fn new(
        opts: SessionOptions,
        puzzles: Vec<Puzzle>,
        solved_before: HashSet<u32>,
        clock: C,
    ) -> (Self, Vec<Command>) {
        let now = clock.now_ms();
        let mut timer = SessionTimer::start(now);
        if let TimerMode::Total(secs) = opts.timer {
            timer.set_deadline(now + secs * 1000);
        }
        let mut session = Self {
            opts,
            puzzles,
            clock,
            idx: 0,
            board: None,
            forced: [None, None],
            targets: TargetAnalysis::default(),
            required: Default::default(),
            found: HashSet::new(),
            stage_idx: 0,
            input_locked: false,
            bad_move_applied: false,
            timer,
            pending: Vec::new(),
            stats: SessionStats::default(),
            solved_before,
            finished: false,
            time_up_signaled: false,
        };
        let mut cmds = Vec::new();
        session.load_puzzle(0, &mut cmds);
        (session, cmds)
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> Vec<Command> {
        let mut cmds = Vec::new();
        if self.finished {
            return cmds;
        }
        match event {
            SessionEvent::UserMove { from, to } => self.on_user_move(from, to, &mut cmds),
            SessionEvent::Tick => self.on_tick(&mut cmds),
        }
        cmds
    }

    /// Finalize after the blocking total-timeout prompt is dismissed.
    pub fn acknowledge_timeout(&mut self) -> Vec<Command> {
        let mut cmds = Vec::new();
        if self.time_up_signaled && !self.finished {
            self.finish(&mut cmds);
        }
        cmds
    }

    /// Finish early (user quits). Produces the summary for what was played.
    pub fn finish_now(&mut self) -> Vec<Command> {
        let mut cmds = Vec::new();
        if !self.finished {
            self.finish(&mut cmds);
        }
        cmds
    }

    /// Tear down without a summary: cancel everything pending so no action
    /// can fire afterwards.
    pub fn destroy(&mut self) {
        self.pending.clear();
        self.finished = true;
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn stage_index(&self) -> usize {
        self.stage_idx
    }

    pub fn is_input_locked(&self) -> bool {
        self.input_locked
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn timer(&self) -> &SessionTimer {
        &self.timer
    }

    pub fn found_count(&self) -> usize {
        self.found.len()
    }

    pub fn has_found(&self, from: Square, to: Square) -> bool {
        self.found.contains(&move_key(from, to))
    }

    pub fn current_puzzle(&self) -> Option<&Puzzle> {
        self.puzzles.get(self.idx)
    }

    pub fn puzzle_number(&self) -> (usize, usize) {
        (self.idx + 1, self.puzzles.len())
    }

    pub fn current_fen(&self) -> Option<String> {
        self.board.as_ref().map(|b| b.fen())
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.timer.elapsed_secs(self.clock.now_ms())
    }

    pub fn remaining_secs(&self) -> Option<u64> {
        self.timer
            .remaining_ms(self.clock.now_ms())
            .map(|ms| ms.div_ceil(1000))
    }

    /// The UI-facing task indicator.
    pub fn task_label(&self) -> String {
        if !self.opts.sequential {
            "find every check and capture".to_string()
        } else if self.stage_idx >= STAGES.len() {
            "all stages cleared".to_string()
        } else {
            format!("find {}", stage_name(self.stage_idx))
        }
    }

    fn schedule(&mut self, action: PendingAction, delay_ms: u64) {
        self.pending.push(Pending {
            fire_at: self.clock.now_ms() + delay_ms,
            action,
        });
    }

    fn load_puzzle(&mut self, start_idx: usize, cmds: &mut Vec<Command>) {
        self.pending.clear();
        self.found.clear();
        self.stage_idx = 0;
        self.input_locked = false;
        self.bad_move_applied = false;

        // Skip puzzles whose position cannot be parsed rather than aborting
        // the whole session.
        let mut idx = start_idx;
        let board = loop {
            match self.puzzles.get(idx) {
                None => return self.finish(cmds),
                Some(puzzle) => match Board::from_fen(&puzzle.fen) {
                    Ok(board) => break board,
                    Err(_) => idx += 1,
                },
            }
        };
        self.idx = idx;

        self.targets = analyze_targets(&board);
        self.forced = [
            board.with_turn(Color::White).ok(),
            board.with_turn(Color::Black).ok(),
        ];

        for (stage, (color, kind)) in STAGES.iter().enumerate() {
            let keys: HashSet<String> = self
                .targets
                .for_color(*color)
                .list(*kind)
                .iter()
                .filter(|t| !self.is_excluded(&t.san))
                .map(|t| t.key())
                .collect();
            self.stats.category_total[stage] += keys.len() as u32;
            self.required[stage] = keys;
        }
        let distinct: HashSet<&String> = self.required.iter().flatten().collect();
        self.stats.moves_available += distinct.len() as u32;
        self.stats.puzzles_attempted += 1;

        let now = self.clock.now_ms();
        if self.timer.is_paused() {
            self.timer.resume(now);
        }
        if let TimerMode::PerPuzzle(secs) = self.opts.timer {
            self.timer.set_deadline(now + secs * 1000);
        }

        let orientation = if self.opts.auto_flip {
            board.turn()
        } else {
            Color::White
        };
        cmds.push(Command::ClearHighlights);
        cmds.push(Command::ClearLog);
        cmds.push(Command::SetBoard {
            fen: board.fen(),
            orientation,
        });
        cmds.push(Command::SetStatus(Status::FindTargets));
        self.board = Some(board);

        if self.opts.sequential {
            self.advance_satisfied_stages();
        }
        // A puzzle with no required targets completes on the spot.
        if self.all_required_found() {
            self.solve_puzzle(cmds);
        }
    }

    fn is_excluded(&self, san: &str) -> bool {
        // In good-moves-only mode, targets matching a scripted blunder are
        // neither required for completion nor counted in category totals.
        self.opts.good_moves_only
            && self
                .puzzles
                .get(self.idx)
                .is_some_and(|p| p.bad_moves.iter().any(|b| b.notation() == san))
    }

    fn advance_satisfied_stages(&mut self) {
        while self.stage_idx < STAGES.len() && self.required[self.stage_idx].is_subset(&self.found)
        {
            self.stage_idx += 1;
        }
    }

    fn all_required_found(&self) -> bool {
        if self.opts.sequential {
            self.stage_idx >= STAGES.len()
        } else {
            self.required.iter().all(|r| r.is_subset(&self.found))
        }
    }

    fn on_user_move(&mut self, from: Square, to: Square, cmds: &mut Vec<Command>) {
        let now = self.clock.now_ms();
        let Some(fen) = self.current_fen() else {
            return;
        };

        // Deadline already passed or input locked by an active penalty:
        // silent revert, no stats change.
        if self.input_locked || self.time_up_signaled || self.timer.is_expired(now) {
            cmds.push(Command::RevertBoard { fen });
            return;
        }

        // Click counting policy: every classified attempt counts, including
        // illegal ones.
        self.stats.total_clicks += 1;

        let color = match self.board.as_ref().and_then(|b| b.piece_at(from)) {
            Some(piece) => piece.color,
            None => {
                cmds.push(Command::RevertBoard { fen });
                return;
            }
        };

        let bad_moves = self
            .puzzles
            .get(self.idx)
            .map(|p| p.bad_moves.clone())
            .unwrap_or_default();
        let classification = classify(
            self.forced[color_index(color)].as_ref(),
            from,
            to,
            color,
            &self.targets,
            &bad_moves,
            self.opts.good_moves_only,
        );

        match classification {
            Classification::Illegal => {
                cmds.push(Command::RevertBoard { fen });
            }
            Classification::OffTarget => {
                cmds.push(Command::RevertBoard { fen });
                cmds.push(Command::SetStatus(Status::NotATarget));
            }
            Classification::Target {
                san,
                is_check,
                is_capture,
                also_bad,
            } => self.on_target_found(from, to, color, san, is_check, is_capture, also_bad, cmds),
            Classification::BadMove { san, refutation } => {
                self.on_bad_move(from, to, color, san, refutation, cmds)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn on_target_found(
        &mut self,
        from: Square,
        to: Square,
        color: Color,
        san: String,
        is_check: bool,
        is_capture: bool,
        also_bad: bool,
        cmds: &mut Vec<Command>,
    ) {
        let fen = self.current_fen().unwrap_or_default();
        let key = move_key(from, to);
        if self.found.contains(&key) {
            cmds.push(Command::RevertBoard { fen });
            cmds.push(Command::SetStatus(Status::AlreadyFound { san }));
            return;
        }

        self.found.insert(key.clone());
        self.stats.moves_found += 1;
        // A move that both checks and captures scores in both categories.
        for (stage, (stage_color, kind)) in STAGES.iter().enumerate() {
            let hits = match kind {
                TargetKind::Checks => is_check,
                TargetKind::Captures => is_capture,
            };
            if *stage_color == color && hits && self.required[stage].contains(&key) {
                self.stats.category_found[stage] += 1;
            }
        }

        cmds.push(Command::LogFoundMove {
            san: san.clone(),
            is_check,
            is_capture,
            color,
        });
        cmds.push(Command::HighlightSquares { from, to });
        cmds.push(Command::SetStatus(if also_bad {
            Status::FoundButDangerous { san }
        } else {
            Status::Found { san }
        }));
        // Let the highlight breathe before the board redraws.
        self.schedule(PendingAction::RevertBoard, FOUND_REVERT_DELAY_MS);

        if self.opts.sequential {
            self.advance_satisfied_stages();
        }
        if self.all_required_found() {
            self.solve_puzzle(cmds);
        }
    }

    fn on_bad_move(
        &mut self,
        from: Square,
        to: Square,
        color: Color,
        san: String,
        refutation: Option<String>,
        cmds: &mut Vec<Command>,
    ) {
        let now = self.clock.now_ms();
        self.stats.total_errors += 1;

        let pre_fen = self.current_fen().unwrap_or_default();
        // Apply the blunder on the live position so the refutation is shown
        // one ply later, on the board the trainee just created.
        self.bad_move_applied = self
            .board
            .as_mut()
            .and_then(|b| b.apply(from, to))
            .is_some();
        if self.bad_move_applied {
            if let Some(fen) = self.current_fen() {
                cmds.push(Command::SetBoard {
                    fen,
                    orientation: self.orientation(),
                });
            }
        }

        self.input_locked = true;
        self.timer.pause(now);

        let arrow = refutation
            .as_deref()
            .and_then(|r| resolve_refutation(&pre_fen, color, from, to, r));
        match (arrow, refutation.is_some()) {
            (Some((rf, rt)), _) => {
                cmds.push(Command::SetStatus(Status::BadMovePlayed { san }));
                cmds.push(Command::DrawArrow { from: rf, to: rt });
            }
            (None, true) => {
                cmds.push(Command::SetStatus(Status::RefutationUnresolvable { san }));
            }
            (None, false) => {
                cmds.push(Command::SetStatus(Status::BadMovePlayed { san }));
            }
        }

        self.schedule(PendingAction::ResolveBadMove, BAD_MOVE_DELAY_MS);
    }

    /// Board orientation for the current puzzle. Auto-flip follows the side
    /// to move of the puzzle as dealt, not of any simulated position.
    pub fn orientation(&self) -> Color {
        if !self.opts.auto_flip {
            return Color::White;
        }
        self.puzzles
            .get(self.idx)
            .and_then(|p| Board::from_fen(&p.fen).ok())
            .map(|b| b.turn())
            .unwrap_or(Color::White)
    }

    fn solve_puzzle(&mut self, cmds: &mut Vec<Command>) {
        self.stats.puzzles_solved += 1;
        if let Some(id) = self.puzzles.get(self.idx).map(|p| p.id) {
            if self.solved_before.contains(&id) {
                self.stats.previously_solved += 1;
            } else {
                self.stats.newly_solved += 1;
            }
            cmds.push(Command::RecordSolved { puzzle_id: id });
        }
        cmds.push(Command::SetStatus(Status::PuzzleSolved));

        // Freeze the clock across the transition so the gap never counts
        // against the player.
        self.timer.pause(self.clock.now_ms());
        self.input_locked = true;
        self.schedule(PendingAction::NextPuzzle, NEXT_PUZZLE_DELAY_MS);
    }

    fn on_tick(&mut self, cmds: &mut Vec<Command>) {
        let now = self.clock.now_ms();

        // Fire due delayed actions in schedule order.
        let mut due = Vec::new();
        self.pending.retain(|p| {
            if p.fire_at <= now {
                due.push(p.action);
                false
            } else {
                true
            }
        });
        for action in due {
            self.fire(action, cmds);
            if self.finished {
                return;
            }
        }

        if self.timer.is_expired(now) {
            match self.opts.timer {
                TimerMode::PerPuzzle(_) => {
                    // Pausing also guarantees the expiry fires exactly once.
                    self.timer.pause(now);
                    self.input_locked = true;
                    cmds.push(Command::SetStatus(Status::PuzzleTimeout));
                    self.schedule(PendingAction::TimeoutAdvance, TIMEOUT_ADVANCE_DELAY_MS);
                }
                TimerMode::Total(_) => {
                    self.timer.pause(now);
                    if !self.time_up_signaled {
                        self.time_up_signaled = true;
                        cmds.push(Command::SetStatus(Status::SessionTimeUp));
                        cmds.push(Command::TimeUp);
                    }
                }
                TimerMode::Off => {}
            }
        }
    }

    fn fire(&mut self, action: PendingAction, cmds: &mut Vec<Command>) {
        match action {
            PendingAction::RevertBoard => {
                if let Some(fen) = self.current_fen() {
                    cmds.push(Command::RevertBoard { fen });
                }
            }
            PendingAction::ResolveBadMove => {
                if self.bad_move_applied {
                    if let Some(board) = self.board.as_mut() {
                        board.undo();
                    }
                    self.bad_move_applied = false;
                }
                if let Some(fen) = self.current_fen() {
                    cmds.push(Command::RevertBoard { fen });
                }
                self.input_locked = false;
                self.timer.resume(self.clock.now_ms());
                cmds.push(Command::SetStatus(Status::FindTargets));
            }
            PendingAction::NextPuzzle | PendingAction::TimeoutAdvance => {
                self.load_puzzle(self.idx + 1, cmds);
            }
        }
    }

    fn finish(&mut self, cmds: &mut Vec<Command>) {
        self.finished = true;
        self.pending.clear();
        let now = self.clock.now_ms();
        let elapsed_secs = self.timer.elapsed_secs(now);
        let attempted = self.stats.puzzles_attempted.max(1) as f64;
        cmds.push(Command::Finished(SessionSummary {
            difficulty: self.opts.difficulty,
            elapsed_secs,
            accuracy: self.stats.accuracy(),
            avg_secs_per_puzzle: elapsed_secs / attempted,
            stats: self.stats.clone(),
        }));
    }
}
