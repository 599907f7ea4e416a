use shakmaty::{
    fen::Fen,
    san::SanPlus,
    CastlingMode, CastlingSide, Chess, Color, EnPassantMode, Move, Piece, Position, Role, Square,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("invalid FEN: {0}")]
    InvalidFen(String),
    #[error("illegal position: {0}")]
    IllegalPosition(String),
}

/// A single legal move as reported by the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveData {
    pub from: Square,
    pub to: Square,
    pub san: String,
    pub role: Role,
    pub is_capture: bool,
    pub is_en_passant: bool,
    pub promotion: Option<Role>,
}

/// Thin wrapper around shakmaty exposing exactly the capability surface the
/// session engine consumes: legality queries, apply/undo, check status, and
/// forced side-to-move scratch copies.
///
/// Undo is a position stack; shakmaty positions are cheap to clone and the
/// stack never grows beyond a couple of plies during refutation playback.
#[derive(Debug, Clone)]
pub struct Board {
    pos: Chess,
    history: Vec<Chess>,
}

/// Squares a move travels between, normalized so castling reads as the king
/// hop the user would input (e1-g1), not shakmaty's king/rook encoding.
fn move_squares(m: &Move) -> Option<(Square, Square)> {
    match *m {
        Move::Normal { from, to, .. } => Some((from, to)),
        Move::EnPassant { from, to } => Some((from, to)),
        Move::Castle { king, rook } => {
            let side = if rook.file() > king.file() {
                CastlingSide::KingSide
            } else {
                CastlingSide::QueenSide
            };
            Some((king, Square::from_coords(side.king_to_file(), king.rank())))
        }
        Move::Put { .. } => None,
    }
}

impl Board {
    pub fn from_fen(raw: &str) -> Result<Self, OracleError> {
        let fen: Fen = raw
            .parse()
            .map_err(|_| OracleError::InvalidFen(raw.to_string()))?;
        let pos: Chess = fen
            .into_position(CastlingMode::Standard)
            .map_err(|_| OracleError::IllegalPosition(raw.to_string()))?;
        Ok(Self {
            pos,
            history: Vec::new(),
        })
    }

    pub fn fen(&self) -> String {
        Fen::from_position(self.pos.clone(), EnPassantMode::Legal).to_string()
    }

    pub fn turn(&self) -> Color {
        self.pos.turn()
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.pos.board().piece_at(square)
    }

    /// Is the side to move currently in check?
    pub fn is_check(&self) -> bool {
        self.pos.is_check()
    }

    /// Scratch copy with side-to-move forced to `color`. The en-passant square
    /// is cleared: it is side-relative and must not leak across the swap.
    /// Fails when the swap produces an illegal position (e.g. the side not to
    /// move would be in check).
    pub fn with_turn(&self, color: Color) -> Result<Self, OracleError> {
        let fen = self.fen();
        let mut fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(OracleError::InvalidFen(fen));
        }
        fields[1] = if color.is_white() { "w" } else { "b" };
        fields[3] = "-";
        Self::from_fen(&fields.join(" "))
    }

    pub fn legal_moves(&self) -> Vec<MoveData> {
        self.pos
            .legal_moves()
            .iter()
            .filter_map(|m| self.move_data(m))
            .collect()
    }

    /// The legal move between two squares, if any. When several promotions
    /// match, the queen promotion is preferred.
    pub fn legal_move_between(&self, from: Square, to: Square) -> Option<MoveData> {
        self.find_move(from, to).and_then(|m| self.move_data(&m))
    }

    /// Does playing this from-to pair leave the opponent in check?
    pub fn gives_check(&self, from: Square, to: Square) -> bool {
        match self.find_move(from, to) {
            Some(m) => {
                let mut next = self.pos.clone();
                next.play_unchecked(&m);
                next.is_check()
            }
            None => false,
        }
    }

    /// Apply the legal move between `from` and `to` (queen promotion default).
    /// Returns `None` without touching the position when no such move exists.
    pub fn apply(&mut self, from: Square, to: Square) -> Option<MoveData> {
        let m = self.find_move(from, to)?;
        let data = self.move_data(&m);
        self.history.push(self.pos.clone());
        self.pos.play_unchecked(&m);
        data
    }

    /// Undo the most recent applied move. Returns false when there is nothing
    /// to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.pop() {
            Some(prev) => {
                self.pos = prev;
                true
            }
            None => false,
        }
    }

    /// Resolve a SAN string (check/mate suffix tolerated) against the current
    /// legal moves.
    pub fn resolve_san(&self, san: &str) -> Option<(Square, Square)> {
        let sp: SanPlus = san.parse().ok()?;
        let m = sp.san.to_move(&self.pos).ok()?;
        move_squares(&m)
    }

    fn find_move(&self, from: Square, to: Square) -> Option<Move> {
        let mut fallback = None;
        for m in self.pos.legal_moves() {
            let Some((f, t)) = move_squares(&m) else {
                continue;
            };
            if f != from || t != to {
                continue;
            }
            match m.promotion() {
                None | Some(Role::Queen) => return Some(m),
                Some(_) => fallback = fallback.or(Some(m)),
            }
        }
        fallback
    }

    fn move_data(&self, m: &Move) -> Option<MoveData> {
        let (from, to) = move_squares(m)?;
        Some(MoveData {
            from,
            to,
            san: SanPlus::from_move(self.pos.clone(), m).to_string(),
            role: m.role(),
            is_capture: m.is_capture(),
            is_en_passant: m.is_en_passant(),
            promotion: m.promotion(),
        })
    }
}
