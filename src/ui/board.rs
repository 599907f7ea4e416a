use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color as TermColor, Modifier, Style},
};
use shakmaty::{Color, File, Rank, Square};

const CELL_WIDTH: u16 = 4;
const CELL_HEIGHT: u16 = 2;

fn piece_glyph(c: char) -> &'static str {
    match c {
        'K' => "♔",
        'Q' => "♕",
        'R' => "♖",
        'B' => "♗",
        'N' => "♘",
        'P' => "♙",
        'k' => "♚",
        'q' => "♛",
        'r' => "♜",
        'b' => "♝",
        'n' => "♞",
        'p' => "♟",
        _ => " ",
    }
}

/// Terminal board state: position, orientation, cursor, and the transient
/// decorations the session asks for (highlights, refutation arrow).
#[derive(Debug, Clone)]
pub struct BoardView {
    grid: [[Option<char>; 8]; 8],
    orientation: Color,
    cursor: Square,
    selected: Option<Square>,
    highlights: Vec<(Square, Square)>,
    arrow: Option<(Square, Square)>,
}

impl Default for BoardView {
    fn default() -> Self {
        Self {
            grid: [[None; 8]; 8],
            orientation: Color::White,
            cursor: Square::E2,
            selected: None,
            highlights: Vec::new(),
            arrow: None,
        }
    }
}

/// Parse just the piece-placement field of a FEN. Tolerant of trailing
/// fields; rows that overflow are truncated.
fn parse_board_field(fen: &str) -> [[Option<char>; 8]; 8] {
    let mut grid = [[None; 8]; 8];
    let field = fen.split_whitespace().next().unwrap_or("");
    for (row, rank_str) in field.split('/').take(8).enumerate() {
        let rank = 7 - row;
        let mut file = 0usize;
        for c in rank_str.chars() {
            if file >= 8 {
                break;
            }
            if let Some(skip) = c.to_digit(10) {
                file += skip as usize;
            } else {
                grid[rank][file] = Some(c);
                file += 1;
            }
        }
    }
    grid
}

impl BoardView {
    /// Full board replacement: new position, new orientation, all
    /// decorations and selection state dropped.
    pub fn set_board(&mut self, fen: &str, orientation: Color) {
        self.grid = parse_board_field(fen);
        self.orientation = orientation;
        self.selected = None;
        self.highlights.clear();
        self.arrow = None;
    }

    /// Snap back to the given position. Selection and the arrow are dropped;
    /// highlights persist until explicitly cleared.
    pub fn revert(&mut self, fen: &str) {
        self.grid = parse_board_field(fen);
        self.selected = None;
        self.arrow = None;
    }

    pub fn orientation(&self) -> Color {
        self.orientation
    }

    pub fn cursor(&self) -> Square {
        self.cursor
    }

    pub fn selected(&self) -> Option<Square> {
        self.selected
    }

    pub fn highlight(&mut self, from: Square, to: Square) {
        self.highlights.push((from, to));
    }

    pub fn clear_highlights(&mut self) {
        self.highlights.clear();
    }

    pub fn draw_arrow(&mut self, from: Square, to: Square) {
        self.arrow = Some((from, to));
    }

    pub fn piece_at(&self, sq: Square) -> Option<char> {
        self.grid[sq.rank() as usize][sq.file() as usize]
    }

    /// Move the cursor one square in screen direction. Directions are
    /// relative to the displayed orientation so arrow keys always move the
    /// cursor the way the screen shows.
    pub fn move_cursor(&mut self, dx: i8, dy: i8) {
        let (dx, dy) = if self.orientation == Color::White {
            (dx, dy)
        } else {
            (-dx, -dy)
        };
        let file = (self.cursor.file() as i8 + dx).clamp(0, 7);
        let rank = (self.cursor.rank() as i8 + dy).clamp(0, 7);
        self.cursor = Square::from_coords(
            File::new(file as u32),
            Rank::new(rank as u32),
        );
    }

    /// First press picks up a piece, second press yields the attempted move.
    /// Pressing the selected square again drops the piece.
    pub fn select(&mut self) -> Option<(Square, Square)> {
        match self.selected {
            None => {
                if self.piece_at(self.cursor).is_some() {
                    self.selected = Some(self.cursor);
                }
                None
            }
            Some(from) if from == self.cursor => {
                self.selected = None;
                None
            }
            Some(from) => {
                self.selected = None;
                Some((from, self.cursor))
            }
        }
    }

    fn is_highlighted(&self, sq: Square) -> bool {
        self.highlights.iter().any(|(f, t)| *f == sq || *t == sq)
    }

    /// Pixel footprint of the board including coordinate labels.
    pub fn size() -> (u16, u16) {
        (8 * CELL_WIDTH + 3, 8 * CELL_HEIGHT + 1)
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let (need_w, need_h) = Self::size();
        if area.width < need_w || area.height < need_h {
            return;
        }

        for screen_rank in 0..8u16 {
            for screen_file in 0..8u16 {
                let (file, rank) = if self.orientation == Color::White {
                    (screen_file as u32, 7 - screen_rank as u32)
                } else {
                    (7 - screen_file as u32, screen_rank as u32)
                };
                let sq = Square::from_coords(File::new(file), Rank::new(rank));

                let light = (file + rank) % 2 == 1;
                let mut bg = if light {
                    TermColor::Rgb(181, 136, 99)
                } else {
                    TermColor::Rgb(101, 67, 33)
                };
                if self.is_highlighted(sq) {
                    bg = TermColor::Rgb(170, 162, 58);
                }
                if let Some((af, at)) = self.arrow {
                    if af == sq || at == sq {
                        bg = TermColor::Rgb(180, 70, 70);
                    }
                }
                if self.selected == Some(sq) {
                    bg = TermColor::Rgb(100, 130, 180);
                }

                let fg = match self.piece_at(sq) {
                    Some(c) if c.is_ascii_uppercase() => TermColor::White,
                    Some(_) => TermColor::Black,
                    None => bg,
                };
                let mut style = Style::default().bg(bg).fg(fg);
                if self.cursor == sq {
                    style = style.add_modifier(Modifier::REVERSED);
                }

                let x0 = area.x + 3 + screen_file * CELL_WIDTH;
                let y0 = area.y + screen_rank * CELL_HEIGHT;
                for dy in 0..CELL_HEIGHT {
                    for dx in 0..CELL_WIDTH {
                        if let Some(cell) = buf.cell_mut((x0 + dx, y0 + dy)) {
                            cell.set_symbol(" ");
                            cell.set_style(style);
                        }
                    }
                }
                let glyph = self.piece_at(sq).map(piece_glyph).unwrap_or(" ");
                let arrow_mark = match self.arrow {
                    Some((af, _)) if af == sq => Some("○"),
                    Some((_, at)) if at == sq => Some("●"),
                    _ => None,
                };
                let symbol = if glyph != " " { glyph } else { arrow_mark.unwrap_or(" ") };
                if let Some(cell) = buf.cell_mut((x0 + CELL_WIDTH / 2 - 1, y0 + CELL_HEIGHT / 2)) {
                    cell.set_symbol(symbol);
                    cell.set_style(style);
                }
            }
        }

        // Coordinate labels.
        let label_style = Style::default().add_modifier(Modifier::DIM);
        for screen_rank in 0..8u16 {
            let rank_char = if self.orientation == Color::White {
                (b'8' - screen_rank as u8) as char
            } else {
                (b'1' + screen_rank as u8) as char
            };
            let y = area.y + screen_rank * CELL_HEIGHT + CELL_HEIGHT / 2;
            if let Some(cell) = buf.cell_mut((area.x + 1, y)) {
                cell.set_symbol(&rank_char.to_string());
                cell.set_style(label_style);
            }
        }
        for screen_file in 0..8u16 {
            let file_char = if self.orientation == Color::White {
                (b'a' + screen_file as u8) as char
            } else {
                (b'h' - screen_file as u8) as char
            };
            let x = area.x + 3 + screen_file * CELL_WIDTH + CELL_WIDTH / 2 - 1;
            let y = area.y + 8 * CELL_HEIGHT;
            if let Some(cell) = buf.cell_mut((x, y)) {
                cell.set_symbol(&file_char.to_string());
                cell.set_style(label_style);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn parses_starting_position() {
        let mut view = BoardView::default();
        view.set_board(START, Color::White);
        assert_eq!(view.piece_at(sq("e1")), Some('K'));
        assert_eq!(view.piece_at(sq("e8")), Some('k'));
        assert_eq!(view.piece_at(sq("a2")), Some('P'));
        assert_eq!(view.piece_at(sq("e4")), None);
    }

    #[test]
    fn set_board_clears_decorations() {
        let mut view = BoardView::default();
        view.set_board(START, Color::White);
        view.highlight(sq("e2"), sq("e4"));
        view.draw_arrow(sq("d8"), sq("d4"));
        view.set_board(START, Color::Black);
        assert!(!view.is_highlighted(sq("e2")));
        assert_eq!(view.arrow, None);
        assert_eq!(view.orientation(), Color::Black);
    }

    #[test]
    fn revert_keeps_highlights_drops_arrow_and_selection() {
        let mut view = BoardView::default();
        view.set_board(START, Color::White);
        view.highlight(sq("e2"), sq("e4"));
        view.draw_arrow(sq("d8"), sq("d4"));
        view.cursor = sq("e2");
        view.select();
        assert_eq!(view.selected(), Some(sq("e2")));

        view.revert(START);
        assert!(view.is_highlighted(sq("e2")));
        assert_eq!(view.arrow, None);
        assert_eq!(view.selected(), None);
    }

    #[test]
    fn select_picks_up_and_releases() {
        let mut view = BoardView::default();
        view.set_board(START, Color::White);
        view.cursor = sq("g1");
        assert_eq!(view.select(), None);
        assert_eq!(view.selected(), Some(sq("g1")));

        view.cursor = sq("f3");
        assert_eq!(view.select(), Some((sq("g1"), sq("f3"))));
        assert_eq!(view.selected(), None);
    }

    #[test]
    fn selecting_same_square_cancels() {
        let mut view = BoardView::default();
        view.set_board(START, Color::White);
        view.cursor = sq("e2");
        view.select();
        assert_eq!(view.select(), None);
        assert_eq!(view.selected(), None);
    }

    #[test]
    fn empty_square_cannot_be_picked_up() {
        let mut view = BoardView::default();
        view.set_board(START, Color::White);
        view.cursor = sq("e4");
        assert_eq!(view.select(), None);
        assert_eq!(view.selected(), None);
    }

    #[test]
    fn cursor_moves_are_orientation_relative() {
        let mut view = BoardView::default();
        view.set_board(START, Color::White);
        view.cursor = sq("e4");
        view.move_cursor(0, 1);
        assert_eq!(view.cursor(), sq("e5"));
        view.move_cursor(1, 0);
        assert_eq!(view.cursor(), sq("f5"));

        view.set_board(START, Color::Black);
        view.cursor = sq("e4");
        view.move_cursor(0, 1);
        assert_eq!(view.cursor(), sq("e3"));
        view.move_cursor(1, 0);
        assert_eq!(view.cursor(), sq("d3"));
    }

    #[test]
    fn cursor_clamps_at_board_edge() {
        let mut view = BoardView::default();
        view.set_board(START, Color::White);
        view.cursor = sq("a1");
        view.move_cursor(-1, -1);
        assert_eq!(view.cursor(), sq("a1"));
        view.cursor = sq("h8");
        view.move_cursor(1, 1);
        assert_eq!(view.cursor(), sq("h8"));
    }

    #[test]
    fn renders_into_buffer() {
        let mut view = BoardView::default();
        view.set_board(START, Color::White);
        let (w, h) = BoardView::size();
        let area = Rect::new(0, 0, w, h);
        let mut buf = Buffer::empty(area);
        view.render(area, &mut buf);
        let rendered: String = buf.content().iter().map(|c| c.symbol()).collect();
        assert!(rendered.contains("♔"));
        assert!(rendered.contains("♚"));
        assert!(rendered.contains("a"));
        assert!(rendered.contains("8"));
    }

    #[test]
    fn small_area_renders_nothing() {
        let mut view = BoardView::default();
        view.set_board(START, Color::White);
        let area = Rect::new(0, 0, 10, 4);
        let mut buf = Buffer::empty(area);
        view.render(area, &mut buf);
        let rendered: String = buf.content().iter().map(|c| c.symbol()).collect();
        assert!(rendered.trim().is_empty());
    }
}
