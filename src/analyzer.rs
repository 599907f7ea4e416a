use crate::oracle::Board;
use shakmaty::{Color, Role, Square};
use std::collections::HashMap;

/// The two categories of target move a trainee has to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Checks,
    Captures,
}

/// Composite lookup key for a from-to pair, e.g. `"e2-e4"`.
pub fn move_key(from: Square, to: Square) -> String {
    format!("{from}-{to}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMove {
    pub from: Square,
    pub to: Square,
    pub san: String,
    pub is_check: bool,
    pub is_capture: bool,
}

impl TargetMove {
    pub fn key(&self) -> String {
        move_key(self.from, self.to)
    }
}

/// All target moves for one color: iterable lists plus O(1) lookup maps keyed
/// by from-to pair. A move that both checks and captures appears in both sets
/// independently.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    pub checks: Vec<TargetMove>,
    pub captures: Vec<TargetMove>,
    pub checks_by_key: HashMap<String, TargetMove>,
    pub captures_by_key: HashMap<String, TargetMove>,
}

impl TargetSet {
    fn insert(&mut self, target: TargetMove) {
        let key = target.key();
        if target.is_check && !self.checks_by_key.contains_key(&key) {
            self.checks.push(target.clone());
            self.checks_by_key.insert(key.clone(), target.clone());
        }
        if target.is_capture && !self.captures_by_key.contains_key(&key) {
            self.captures.push(target.clone());
            self.captures_by_key.insert(key, target);
        }
    }

    pub fn list(&self, kind: TargetKind) -> &[TargetMove] {
        match kind {
            TargetKind::Checks => &self.checks,
            TargetKind::Captures => &self.captures,
        }
    }

    pub fn lookup(&self, kind: TargetKind, key: &str) -> Option<&TargetMove> {
        match kind {
            TargetKind::Checks => self.checks_by_key.get(key),
            TargetKind::Captures => self.captures_by_key.get(key),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty() && self.captures.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TargetAnalysis {
    pub white: TargetSet,
    pub black: TargetSet,
}

impl TargetAnalysis {
    pub fn for_color(&self, color: Color) -> &TargetSet {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }
}

/// Compute every check and capture available to both colors.
///
/// Runs once per puzzle load; every per-move decision afterwards goes through
/// the key maps in constant time, so the simulate/undo cost here is paid once
/// per position rather than per click.
pub fn analyze_targets(board: &Board) -> TargetAnalysis {
    TargetAnalysis {
        white: analyze_color(board, Color::White),
        black: analyze_color(board, Color::Black),
    }
}

fn analyze_color(board: &Board, color: Color) -> TargetSet {
    // A position that becomes illegal under the forced side-swap contributes
    // empty sets instead of failing the whole analysis.
    let forced = match board.with_turn(color) {
        Ok(b) => b,
        Err(_) => return TargetSet::default(),
    };

    let mut set = TargetSet::default();
    for md in forced.legal_moves() {
        // Promotion choices collapse into one logical target (queen default).
        if matches!(md.promotion, Some(r) if r != Role::Queen) {
            continue;
        }
        let is_check = forced.gives_check(md.from, md.to);
        if !md.is_capture && !is_check {
            continue;
        }
        set.insert(TargetMove {
            from: md.from,
            to: md.to,
            san: md.san,
            is_check,
            is_capture: md.is_capture,
        });
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn analysis(fen: &str) -> TargetAnalysis {
        analyze_targets(&Board::from_fen(fen).unwrap())
    }

    #[test]
    fn start_position_has_no_targets() {
        let targets = analysis(START);
        assert!(targets.white.is_empty());
        assert!(targets.black.is_empty());
    }

    #[test]
    fn single_capture_is_found_for_white_only() {
        let targets = analysis("7k/8/8/5n2/4P3/8/8/K7 w - - 0 1");
        assert_eq!(targets.white.captures.len(), 1);
        assert_eq!(targets.white.captures[0].san, "exf5");
        assert_eq!(targets.white.captures[0].key(), "e4-f5");
        assert!(targets.white.checks.is_empty());
        assert!(targets.black.is_empty());
    }

    #[test]
    fn checks_and_captures_are_kept_separately() {
        let targets = analysis("3r2k1/8/8/8/3p4/8/8/3Q2K1 w - - 0 1");
        let white = &targets.white;
        assert_eq!(white.captures.len(), 1);
        assert_eq!(white.captures[0].san, "Qxd4");
        assert_eq!(white.checks.len(), 2);
        assert!(white.checks_by_key.contains_key("d1-g4"));
        assert!(white.checks_by_key.contains_key("d1-b3"));
        assert!(targets.black.is_empty());
    }

    #[test]
    fn check_that_captures_appears_in_both_sets() {
        // Rxe8 both captures the rook and checks the king behind it.
        let targets = analysis("4r1k1/8/8/8/8/8/8/4R1K1 w - - 0 1");
        let white = &targets.white;
        assert!(white.checks_by_key.contains_key("e1-e8"));
        assert!(white.captures_by_key.contains_key("e1-e8"));
    }

    #[test]
    fn lists_and_maps_are_bijective_by_key() {
        let targets = analysis("6k1/r7/8/4p3/8/5N2/8/1R4K1 w - - 0 1");
        for set in [&targets.white, &targets.black] {
            for (list, map) in [
                (&set.checks, &set.checks_by_key),
                (&set.captures, &set.captures_by_key),
            ] {
                assert_eq!(list.len(), map.len());
                for t in list {
                    assert_eq!(map.get(&t.key()), Some(t));
                }
            }
        }
    }

    #[test]
    fn every_check_leaves_opponent_in_check_and_every_capture_captures() {
        let fens = [
            "6k1/r7/8/4p3/8/5N2/8/1R4K1 w - - 0 1",
            "3r2k1/8/8/8/3p4/8/8/3Q2K1 w - - 0 1",
            "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4",
        ];
        for fen in fens {
            let board = Board::from_fen(fen).unwrap();
            let targets = analyze_targets(&board);
            for color in [Color::White, Color::Black] {
                let forced = board.with_turn(color).unwrap();
                for t in &targets.for_color(color).checks {
                    let mut scratch = forced.clone();
                    assert!(scratch.apply(t.from, t.to).is_some(), "{fen} {}", t.san);
                    assert!(scratch.is_check(), "{fen}: {} should check", t.san);
                }
                for t in &targets.for_color(color).captures {
                    let md = forced.legal_move_between(t.from, t.to).unwrap();
                    assert!(md.is_capture, "{fen}: {} should capture", t.san);
                }
            }
        }
    }

    #[test]
    fn analysis_is_idempotent() {
        let board = Board::from_fen("6k1/r7/8/4p3/8/5N2/8/1R4K1 w - - 0 1").unwrap();
        let a = analyze_targets(&board);
        let b = analyze_targets(&board);
        for color in [Color::White, Color::Black] {
            let (sa, sb) = (a.for_color(color), b.for_color(color));
            let keys =
                |m: &HashMap<String, TargetMove>| -> Vec<String> { m.keys().cloned().collect() };
            let mut ka = keys(&sa.checks_by_key);
            let mut kb = keys(&sb.checks_by_key);
            ka.sort();
            kb.sort();
            assert_eq!(ka, kb);
            let mut ca = keys(&sa.captures_by_key);
            let mut cb = keys(&sb.captures_by_key);
            ca.sort();
            cb.sort();
            assert_eq!(ca, cb);
        }
    }

    #[test]
    fn promotions_collapse_to_one_target() {
        // e7-e8 promotes with check; only the queen promotion is kept.
        let targets = analysis("6k1/4P3/8/8/8/8/8/4K3 w - - 0 1");
        let hits: Vec<_> = targets
            .white
            .checks
            .iter()
            .filter(|t| t.key() == "e7-e8")
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].san, "e8=Q+");
    }
}
