use crate::oracle::Board;
use shakmaty::{Color, Role, Square};

/// Resolve the scripted refutation of a bad move into a demonstrative arrow.
///
/// `fen` is the position immediately before the bad move. The bad move is
/// replayed on a scratch copy with side-to-move forced to the mover's color
/// (en passant cleared), then the refutation SAN is matched against the
/// opponent's legal replies in three fallback tiers:
///
/// 1. exact SAN parse (check/mate suffix tolerated),
/// 2. SAN with decoration characters stripped,
/// 3. destination square plus piece-type letter, first candidate winning.
///
/// Returns `None` when nothing resolves; the caller surfaces an explicit
/// "cannot display refutation" status instead of failing silently.
pub fn resolve_refutation(
    fen: &str,
    mover: Color,
    from: Square,
    to: Square,
    refutation: &str,
) -> Option<(Square, Square)> {
    let board = Board::from_fen(fen).ok()?;
    let mut scratch = board.with_turn(mover).ok()?;
    scratch.apply(from, to)?;

    // Tier 1: the oracle parses the notation as-is.
    if let Some(squares) = scratch.resolve_san(refutation) {
        return Some(squares);
    }

    // Tier 2: strip decoration and retry.
    let stripped = strip_decoration(refutation);
    if let Some(squares) = scratch.resolve_san(&stripped) {
        return Some(squares);
    }

    // Tier 3: destination square + piece letter (pawn when absent).
    let to_sq = destination_square(&stripped)?;
    let role = piece_letter_role(&stripped);
    scratch
        .legal_moves()
        .into_iter()
        .find(|md| md.role == role && md.to == to_sq)
        .map(|md| (md.from, md.to))
}

fn strip_decoration(san: &str) -> String {
    // Non-ASCII also goes: annotated books attach NAG glyphs like ‼ or ⁈.
    san.chars()
        .filter(|c| c.is_ascii() && !"+#x!?".contains(*c))
        .collect()
}

fn destination_square(stripped: &str) -> Option<Square> {
    // Drop a promotion suffix like "=Q" or a bare trailing piece letter.
    let core = stripped.trim_end_matches(|c: char| c.is_ascii_uppercase() || c == '=');
    let mut rev = core.chars().rev();
    let (rank, file) = (rev.next()?, rev.next()?);
    let mut key = String::with_capacity(2);
    key.push(file);
    key.push(rank);
    key.parse().ok()
}

fn piece_letter_role(stripped: &str) -> Role {
    match stripped.chars().next() {
        Some('N') => Role::Knight,
        Some('B') => Role::Bishop,
        Some('R') => Role::Rook,
        Some('Q') => Role::Queen,
        Some('K') => Role::King,
        _ => Role::Pawn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUEEN_TRAP: &str = "3r2k1/8/8/8/3p4/8/8/3Q2K1 w - - 0 1";

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn exact_notation_resolves() {
        let arrow = resolve_refutation(QUEEN_TRAP, Color::White, sq("d1"), sq("d4"), "Rxd4");
        assert_eq!(arrow, Some((sq("d8"), sq("d4"))));
    }

    #[test]
    fn decorated_notation_resolves_after_stripping() {
        for notated in ["Rxd4!", "Rxd4?", "Rxd4+?!"] {
            let arrow = resolve_refutation(QUEEN_TRAP, Color::White, sq("d1"), sq("d4"), notated);
            assert_eq!(arrow, Some((sq("d8"), sq("d4"))), "failed for {notated}");
        }
    }

    #[test]
    fn destination_fallback_matches_piece_letter() {
        // "Rd4" omits the capture marker; tier 3 matches rook-to-d4.
        let arrow = resolve_refutation(QUEEN_TRAP, Color::White, sq("d1"), sq("d4"), "Rd4");
        assert_eq!(arrow, Some((sq("d8"), sq("d4"))));
    }

    #[test]
    fn pawn_is_assumed_without_piece_letter() {
        // After exd5 the black c-pawn can recapture; "cxd5" and bare "d5"
        // should both resolve to c6-d5.
        let fen = "4k3/8/2p5/3p4/4P3/8/8/4K3 w - - 0 1";
        let arrow = resolve_refutation(fen, Color::White, sq("e4"), sq("d5"), "cxd5");
        assert_eq!(arrow, Some((sq("c6"), sq("d5"))));
    }

    #[test]
    fn nag_annotated_refutation_resolves() {
        for notated in ["Rxd4‼", "Rxd4⁈"] {
            let arrow = resolve_refutation(QUEEN_TRAP, Color::White, sq("d1"), sq("d4"), notated);
            assert_eq!(arrow, Some((sq("d8"), sq("d4"))), "failed for {notated}");
        }
    }

    #[test]
    fn unresolvable_annotated_notation_returns_none() {
        let arrow = resolve_refutation(QUEEN_TRAP, Color::White, sq("d1"), sq("d4"), "Zz9‼");
        assert_eq!(arrow, None);
    }

    #[test]
    fn unresolvable_notation_returns_none() {
        let arrow = resolve_refutation(QUEEN_TRAP, Color::White, sq("d1"), sq("d4"), "Nf6");
        assert_eq!(arrow, None);
    }

    #[test]
    fn illegal_bad_move_returns_none() {
        let arrow = resolve_refutation(QUEEN_TRAP, Color::White, sq("d1"), sq("d8"), "Rxd8");
        assert_eq!(arrow, None);
    }

    #[test]
    fn garbage_inputs_degrade_to_none() {
        assert_eq!(
            resolve_refutation("not a fen", Color::White, sq("d1"), sq("d4"), "Rxd4"),
            None
        );
        assert_eq!(
            resolve_refutation(QUEEN_TRAP, Color::White, sq("d1"), sq("d4"), ""),
            None
        );
    }
}
