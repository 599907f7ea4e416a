use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;

static PUZZLE_DIR: Dir = include_dir!("puzzles");

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A scripted blunder: either a bare SAN string or a SAN paired with the
/// refutation that punishes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BadMoveSpec {
    Plain(String),
    Scripted {
        notation: String,
        #[serde(default)]
        refutation: Option<String>,
    },
}

impl BadMoveSpec {
    pub fn notation(&self) -> &str {
        match self {
            BadMoveSpec::Plain(n) => n,
            BadMoveSpec::Scripted { notation, .. } => notation,
        }
    }

    pub fn refutation(&self) -> Option<&str> {
        match self {
            BadMoveSpec::Plain(_) => None,
            BadMoveSpec::Scripted { refutation, .. } => refutation.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    pub id: u32,
    pub fen: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub bad_moves: Vec<BadMoveSpec>,
}

fn read_puzzles_from_file(file_name: &str) -> Result<Vec<Puzzle>, Box<dyn Error>> {
    let file = PUZZLE_DIR
        .get_file(file_name)
        .expect("Puzzle file not found");

    let file_as_str = file
        .contents_utf8()
        .expect("Unable to interpret file as a string");

    let puzzles = serde_json::from_str(file_as_str).expect("Unable to deserialize puzzle json");

    Ok(puzzles)
}

/// Selects the puzzles a session plays: filter by difficulty, put puzzles the
/// user has never solved first, shuffle within each group.
pub struct PuzzleProvider {
    puzzles: Vec<Puzzle>,
}

impl PuzzleProvider {
    pub fn bundled() -> Self {
        Self {
            puzzles: read_puzzles_from_file("bundled.json").unwrap_or_default(),
        }
    }

    pub fn from_puzzles(puzzles: Vec<Puzzle>) -> Self {
        Self { puzzles }
    }

    pub fn len(&self) -> usize {
        self.puzzles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.puzzles.is_empty()
    }

    pub fn session_set(
        &self,
        difficulty: Difficulty,
        count: usize,
        solved: &HashSet<u32>,
    ) -> Vec<Puzzle> {
        let mut pool: Vec<Puzzle> = self
            .puzzles
            .iter()
            .filter(|p| p.difficulty == difficulty)
            .cloned()
            .collect();
        // Fall back to the whole book when the requested tier is empty.
        if pool.is_empty() {
            pool = self.puzzles.clone();
        }

        let mut rng = thread_rng();
        let (mut unseen, mut seen): (Vec<Puzzle>, Vec<Puzzle>) =
            pool.into_iter().partition(|p| !solved.contains(&p.id));
        unseen.shuffle(&mut rng);
        seen.shuffle(&mut rng);

        unseen.extend(seen);
        unseen.truncate(count);
        unseen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn puzzle(id: u32, difficulty: Difficulty) -> Puzzle {
        Puzzle {
            id,
            fen: "7k/8/8/5n2/4P3/8/8/K7 w - - 0 1".to_string(),
            difficulty,
            bad_moves: vec![],
        }
    }

    #[test]
    fn bad_move_spec_parses_both_shapes() {
        let plain: BadMoveSpec = serde_json::from_str(r#""Qxd4""#).unwrap();
        assert_eq!(plain, BadMoveSpec::Plain("Qxd4".to_string()));
        assert_eq!(plain.notation(), "Qxd4");
        assert_eq!(plain.refutation(), None);

        let scripted: BadMoveSpec =
            serde_json::from_str(r#"{"notation":"Qxd4","refutation":"Rxd4"}"#).unwrap();
        assert_eq!(scripted.notation(), "Qxd4");
        assert_eq!(scripted.refutation(), Some("Rxd4"));

        let no_reply: BadMoveSpec = serde_json::from_str(r#"{"notation":"Nxe5"}"#).unwrap();
        assert_eq!(no_reply.notation(), "Nxe5");
        assert_eq!(no_reply.refutation(), None);
    }

    #[test]
    fn puzzle_deserializes_without_bad_moves() {
        let json = r#"{"id":1,"fen":"8/8/8/8/8/8/8/8 w - - 0 1","difficulty":"easy"}"#;
        let p: Puzzle = serde_json::from_str(json).unwrap();
        assert_eq!(p.id, 1);
        assert_eq!(p.difficulty, Difficulty::Easy);
        assert!(p.bad_moves.is_empty());
    }

    #[test]
    fn bundled_book_loads_and_has_valid_positions() {
        let provider = PuzzleProvider::bundled();
        assert!(!provider.is_empty());
        for p in &provider.puzzles {
            assert!(
                crate::oracle::Board::from_fen(&p.fen).is_ok(),
                "puzzle {} has invalid FEN",
                p.id
            );
        }
    }

    #[test]
    fn session_set_filters_by_difficulty() {
        let provider = PuzzleProvider::from_puzzles(vec![
            puzzle(1, Difficulty::Easy),
            puzzle(2, Difficulty::Medium),
            puzzle(3, Difficulty::Easy),
        ]);
        let set = provider.session_set(Difficulty::Easy, 10, &HashSet::new());
        assert_eq!(set.len(), 2);
        assert!(set.iter().all(|p| p.difficulty == Difficulty::Easy));
    }

    #[test]
    fn session_set_prioritizes_unseen_puzzles() {
        let provider = PuzzleProvider::from_puzzles(vec![
            puzzle(1, Difficulty::Easy),
            puzzle(2, Difficulty::Easy),
            puzzle(3, Difficulty::Easy),
            puzzle(4, Difficulty::Easy),
        ]);
        let solved: HashSet<u32> = [1, 2].into_iter().collect();
        let set = provider.session_set(Difficulty::Easy, 4, &solved);
        assert_eq!(set.len(), 4);
        assert!(!solved.contains(&set[0].id));
        assert!(!solved.contains(&set[1].id));
        assert!(solved.contains(&set[2].id));
        assert!(solved.contains(&set[3].id));
    }

    #[test]
    fn session_set_falls_back_when_tier_is_empty() {
        let provider = PuzzleProvider::from_puzzles(vec![puzzle(1, Difficulty::Easy)]);
        let set = provider.session_set(Difficulty::Hard, 5, &HashSet::new());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn session_set_respects_count() {
        let provider = PuzzleProvider::from_puzzles(
            (0..20).map(|i| puzzle(i, Difficulty::Easy)).collect(),
        );
        let set = provider.session_set(Difficulty::Easy, 5, &HashSet::new());
        assert_eq!(set.len(), 5);
    }
}
