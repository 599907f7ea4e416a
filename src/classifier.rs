use crate::analyzer::{move_key, TargetAnalysis, TargetKind};
use crate::oracle::Board;
use crate::puzzle::BadMoveSpec;
use shakmaty::{Color, Square};

/// Outcome of classifying a single attempted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A check and/or capture the trainee is looking for. `also_bad` marks a
    /// nominal target that matches a scripted blunder (normal mode only).
    Target {
        san: String,
        is_check: bool,
        is_capture: bool,
        also_bad: bool,
    },
    /// A scripted blunder (good-moves-only mode).
    BadMove {
        san: String,
        refutation: Option<String>,
    },
    /// Legal, but neither a check nor a capture.
    OffTarget,
    /// No piece of the given color on the origin square, or no legal move
    /// between the squares.
    Illegal,
}

/// Classify an attempted move against the cached target maps.
///
/// `forced` is the scratch board with side-to-move forced to `color` (None if
/// the forced position was unbuildable). The target lookup is O(1); the only
/// oracle work here is the legality probe and, for non-targets, deriving SAN.
///
/// Bad-move detection is checked before off-target rejection in good-moves-only
/// mode; otherwise a blunder that is also a nominal target would be silently
/// accepted as correct.
pub fn classify(
    forced: Option<&Board>,
    from: Square,
    to: Square,
    color: Color,
    targets: &TargetAnalysis,
    bad_moves: &[BadMoveSpec],
    good_moves_only: bool,
) -> Classification {
    let Some(board) = forced else {
        return Classification::Illegal;
    };
    match board.piece_at(from) {
        Some(piece) if piece.color == color => {}
        _ => return Classification::Illegal,
    }
    let Some(md) = board.legal_move_between(from, to) else {
        return Classification::Illegal;
    };

    let key = move_key(from, to);
    let set = targets.for_color(color);
    let check_hit = set.lookup(TargetKind::Checks, &key);
    let capture_hit = set.lookup(TargetKind::Captures, &key);

    // Prefer the stored notation so we never re-derive ambiguous SAN.
    let san = check_hit
        .or(capture_hit)
        .map(|t| t.san.clone())
        .unwrap_or(md.san);

    let bad_entry = bad_moves.iter().find(|b| b.notation() == san);

    if good_moves_only {
        if let Some(entry) = bad_entry {
            return Classification::BadMove {
                san,
                refutation: entry.refutation().map(str::to_string),
            };
        }
    }

    if check_hit.is_none() && capture_hit.is_none() {
        return Classification::OffTarget;
    }

    Classification::Target {
        san,
        is_check: check_hit.is_some(),
        is_capture: capture_hit.is_some(),
        also_bad: bad_entry.is_some(),
    }
}
