//! Board state: a fixed-size grid of optional pieces plus the flags needed to
//! decide what the side to move may do.

use std::fmt::Write as _;

use crate::coord::Coord;
use crate::movegen;
use crate::types::{Piece, PieceColor, PieceKind};

/// Standard board edge length.
pub const STANDARD_SIZE: u8 = 8;

const BACK_RANK: [PieceKind; 8] = [
    PieceKind::Rook,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Rook,
];

/// The authoritative grid of pieces.
///
/// All state is owned, so `clone_independent` (and `Clone`) yield a copy that
/// can be mutated freely without any effect on the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    width: u8,
    height: u8,
    squares: Vec<Option<Piece>>,
    side_to_move: PieceColor,
    move_number: u32,
    en_passant: Option<Coord>,
    kings: [Option<Coord>; 2],
}

impl Board {
    /// Create an empty board. White moves first and the move counter starts at 1.
    pub fn new(width: u8, height: u8) -> Self {
        Self {
            width,
            height,
            squares: vec![None; width as usize * height as usize],
            side_to_move: PieceColor::White,
            move_number: 1,
            en_passant: None,
            kings: [None, None],
        }
    }

    /// The standard 8x8 starting position.
    pub fn standard() -> Self {
        let mut board = Self::new(STANDARD_SIZE, STANDARD_SIZE);
        let top = STANDARD_SIZE as i8 - 1;
        for (file, kind) in BACK_RANK.iter().enumerate() {
            let file = file as i8;
            board.put(PieceColor::White, *kind, Coord::new(file, 0));
            board.put(PieceColor::White, PieceKind::Pawn, Coord::new(file, 1));
            board.put(PieceColor::Black, PieceKind::Pawn, Coord::new(file, top - 1));
            board.put(PieceColor::Black, *kind, Coord::new(file, top));
        }
        board
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    pub fn side_to_move(&self) -> PieceColor {
        self.side_to_move
    }

    pub fn set_side_to_move(&mut self, color: PieceColor) {
        self.side_to_move = color;
    }

    pub(crate) fn switch_side(&mut self) {
        self.side_to_move = self.side_to_move.opponent();
    }

    pub fn move_number(&self) -> u32 {
        self.move_number
    }

    pub fn set_move_number(&mut self, number: u32) {
        self.move_number = number.max(1);
    }

    pub(crate) fn increment_move_number(&mut self) -> u32 {
        self.move_number = self.move_number.saturating_add(1);
        self.move_number
    }

    /// The square a pawn skipped on the previous ply, if any.
    pub fn en_passant(&self) -> Option<Coord> {
        self.en_passant
    }

    pub fn set_en_passant(&mut self, target: Option<Coord>) {
        self.en_passant = target.filter(|c| self.contains(*c));
    }

    /// True when a pawn of `color` landing on `target` captures en passant:
    /// `target` is the live en-passant square and an enemy pawn stands just
    /// beyond it.
    pub fn is_en_passant_capture(&self, target: Coord, color: PieceColor) -> bool {
        self.en_passant == Some(target)
            && self
                .get(target - Coord::new(0, color.forward()))
                .is_some_and(|p| p.is_pawn() && p.color != color)
    }

    /// Cached location of the king of `color`.
    pub fn king(&self, color: PieceColor) -> Option<Coord> {
        self.kings[color.index()]
    }

    pub fn contains(&self, coord: Coord) -> bool {
        coord.is_inside(self.width, self.height)
    }

    fn index(&self, coord: Coord) -> Option<usize> {
        self.contains(coord)
            .then(|| coord.rank as usize * self.width as usize + coord.file as usize)
    }

    /// Piece on `coord`; out-of-bounds reads are empty.
    pub fn get(&self, coord: Coord) -> Option<&Piece> {
        self.index(coord).and_then(|i| self.squares[i].as_ref())
    }

    pub(crate) fn get_mut(&mut self, coord: Coord) -> Option<&mut Piece> {
        let i = self.index(coord)?;
        self.squares[i].as_mut()
    }

    pub fn is_empty(&self, coord: Coord) -> bool {
        self.contains(coord) && self.get(coord).is_none()
    }

    /// True when `coord` holds a piece of the color opposing `color`.
    pub fn is_enemy(&self, coord: Coord, color: PieceColor) -> bool {
        self.get(coord).is_some_and(|p| p.color != color)
    }

    /// Place `piece` on `coord` (or clear it with `None`).
    ///
    /// Whatever stood there before is dropped. Out-of-bounds writes are a
    /// caller error: they are logged and ignored.
    pub fn set(&mut self, coord: Coord, piece: Option<Piece>) {
        let Some(i) = self.index(coord) else {
            tracing::warn!("Ignoring write outside the board at {:?}", coord);
            return;
        };

        if let Some(old) = self.squares[i] {
            if old.is_king() && self.kings[old.color.index()] == Some(coord) {
                self.kings[old.color.index()] = None;
            }
        }

        let piece = piece.map(|mut p| {
            p.coord = coord;
            p
        });
        if let Some(p) = piece.filter(Piece::is_king) {
            self.kings[p.color.index()] = Some(coord);
        }
        self.squares[i] = piece;
    }

    /// Remove and return the piece on `coord`.
    pub fn take(&mut self, coord: Coord) -> Option<Piece> {
        let piece = self.get(coord).copied();
        if piece.is_some() {
            self.set(coord, None);
        }
        piece
    }

    /// Convenience for setting up positions: place a fresh, unmoved piece.
    pub fn put(&mut self, color: PieceColor, kind: PieceKind, coord: Coord) {
        self.set(coord, Some(Piece::new(color, kind, coord)));
    }

    pub fn pieces(&self) -> impl Iterator<Item = &Piece> {
        self.squares.iter().flatten()
    }

    pub fn pieces_of(&self, color: PieceColor) -> impl Iterator<Item = &Piece> {
        self.pieces().filter(move |p| p.color == color)
    }

    /// Deep copy for speculative simulation.
    pub fn clone_independent(&self) -> Board {
        self.clone()
    }

    /// Compare two boards by what matters to the rules: placement, side to
    /// move, move counter, en-passant target and whether each piece has moved.
    pub fn same_position(&self, other: &Board) -> bool {
        let key = |p: &Option<Piece>| p.map(|p| (p.color, p.kind, p.has_moved()));
        self.width == other.width
            && self.height == other.height
            && self.side_to_move == other.side_to_move
            && self.move_number == other.move_number
            && self.en_passant == other.en_passant
            && self
                .squares
                .iter()
                .zip(&other.squares)
                .all(|(a, b)| key(a) == key(b))
    }

    /// Rank pawns of `color` start on.
    pub fn pawn_start_rank(&self, color: PieceColor) -> i8 {
        match color {
            PieceColor::White => 1,
            PieceColor::Black => self.height as i8 - 2,
        }
    }

    /// Rank on which pawns of `color` must be promoted.
    pub fn promotion_rank(&self, color: PieceColor) -> i8 {
        match color {
            PieceColor::White => self.height as i8 - 1,
            PieceColor::Black => 0,
        }
    }

    /// True when a pawn stands on its last rank and has to be replaced.
    pub fn must_be_promoted(&self, coord: Coord) -> bool {
        self.get(coord)
            .is_some_and(|p| p.is_pawn() && coord.rank == self.promotion_rank(p.color))
    }

    /// True if any piece of `by_color` could capture on `coord`.
    ///
    /// Uses capture opportunities rather than full move generation, so it never
    /// recurses into check testing.
    pub fn is_square_attacked(&self, coord: Coord, by_color: PieceColor) -> bool {
        self.pieces_of(by_color)
            .any(|p| movegen::capture_opportunities(self, p).contains(&coord))
    }

    /// True if the king of `king_color` is attacked. A board without that king
    /// is never in check.
    pub fn is_in_check(&self, king_color: PieceColor) -> bool {
        self.king(king_color)
            .is_some_and(|king| self.is_square_attacked(king, king_color.opponent()))
    }

    /// Check that the step `from -> to` matches the movement shape of `piece`
    /// and that every square strictly between the endpoints is empty.
    ///
    /// A never-moved king stepping two files sideways is treated as a castling
    /// attempt: the destination must be empty and an unmoved rook of the same
    /// color must stand just beyond it (or one further square out). Attacked
    /// squares are not considered here; move generation covers that.
    pub fn path_clear_and_shape_valid(&self, piece: &Piece, from: Coord, to: Coord) -> bool {
        if !self.contains(to) || from == to {
            return false;
        }
        let delta = to - from;

        match piece.kind {
            PieceKind::Knight => return true,
            _ if !delta.is_straight_line() => return false,
            PieceKind::Bishop if delta.file == 0 || delta.rank == 0 => return false,
            PieceKind::Rook if delta.file != 0 && delta.rank != 0 => return false,
            PieceKind::Pawn if !self.pawn_shape_valid(piece, from, delta) => return false,
            _ => {}
        }

        let step = delta.signum();
        let mut cursor = from + step;
        let mut way_length = 0;
        while cursor != to {
            if !self.is_empty(cursor) {
                return false;
            }
            cursor += step;
            way_length += 1;
        }

        if piece.kind != PieceKind::King {
            return true;
        }
        match way_length {
            0 => true,
            1 if step.rank == 0 && !piece.has_moved() => {
                let rook = self
                    .get(to + step)
                    .or_else(|| self.get(to + step * 2).filter(|_| self.is_empty(to + step)));
                let rook_ready = rook.is_some_and(|r| {
                    r.kind == PieceKind::Rook && r.color == piece.color && !r.has_moved()
                });
                self.is_empty(to) && rook_ready
            }
            _ => false,
        }
    }

    fn pawn_shape_valid(&self, pawn: &Piece, from: Coord, delta: Coord) -> bool {
        let forward = pawn.color.forward();
        match (delta.file.abs(), delta.rank * forward) {
            (0, 1) => true,
            (0, 2) => from.rank == self.pawn_start_rank(pawn.color),
            (1, 1) => true,
            _ => false,
        }
    }

    /// Count the pieces on the board per color and kind.
    pub fn material(&self) -> MaterialCount {
        let mut count = MaterialCount::default();
        for piece in self.pieces() {
            count.counts[piece.color.index()][kind_index(piece.kind)] += 1;
        }
        count
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::standard()
    }
}

fn kind_index(kind: PieceKind) -> usize {
    PieceKind::ALL
        .iter()
        .position(|k| *k == kind)
        .unwrap_or_default()
}

/// Number of pieces of each kind per side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialCount {
    counts: [[u8; 6]; 2],
}

impl MaterialCount {
    pub fn get(&self, color: PieceColor, kind: PieceKind) -> u8 {
        self.counts[color.index()][kind_index(kind)]
    }
}

impl std::fmt::Display for MaterialCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (color, title) in [(PieceColor::White, "White"), (PieceColor::Black, "Black")] {
            writeln!(f, "{} has:", title)?;
            for kind in PieceKind::ALL.iter().filter(|k| **k != PieceKind::King) {
                writeln!(f, "  {} = {}", kind.plural_name(), self.get(color, *kind))?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        for rank in (0..self.height as i8).rev() {
            let _ = write!(out, "{:>2} ", rank + 1);
            for file in 0..self.width as i8 {
                let symbol = self.get(Coord::new(file, rank)).map_or('.', Piece::symbol);
                out.push(symbol);
                if file + 1 < self.width as i8 {
                    out.push(' ');
                }
            }
            out.push('\n');
        }
        out.push_str("   ");
        for file in 0..self.width as i8 {
            out.push(Coord::new(file, 0).file_char());
            if file + 1 < self.width as i8 {
                out.push(' ');
            }
        }
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Coord {
        s.parse().unwrap()
    }

    #[test]
    fn test_standard_position() {
        let board = Board::standard();
        assert_eq!(
            board.get(sq("a1")).map(|p| (p.kind, p.color)),
            Some((PieceKind::Rook, PieceColor::White))
        );
        assert_eq!(
            board.get(sq("d8")).map(|p| (p.kind, p.color)),
            Some((PieceKind::Queen, PieceColor::Black))
        );
        assert_eq!(board.king(PieceColor::White), Some(sq("e1")));
        assert_eq!(board.king(PieceColor::Black), Some(sq("e8")));
        assert_eq!(board.side_to_move(), PieceColor::White);
        assert_eq!(board.move_number(), 1);
        assert_eq!(board.pieces().count(), 32);
    }

    #[test]
    fn test_out_of_bounds_is_harmless() {
        let mut board = Board::standard();
        let before = board.clone();
        assert!(board.get(Coord::new(8, 0)).is_none());
        assert!(board.get(Coord::new(-1, 3)).is_none());
        board.set(
            Coord::new(9, 9),
            Some(Piece::new(PieceColor::White, PieceKind::Queen, Coord::new(9, 9))),
        );
        assert_eq!(board, before);
    }

    #[test]
    fn test_king_cache_follows_grid() {
        let mut board = Board::new(8, 8);
        board.put(PieceColor::White, PieceKind::King, sq("e1"));
        assert_eq!(board.king(PieceColor::White), Some(sq("e1")));

        let king = board.take(sq("e1"));
        assert!(board.king(PieceColor::White).is_none());
        board.set(sq("f2"), king);
        assert_eq!(board.king(PieceColor::White), Some(sq("f2")));
        assert_eq!(board.get(sq("f2")).map(|p| p.coord), Some(sq("f2")));
    }

    #[test]
    fn test_clone_is_independent() {
        let board = Board::standard();
        let mut copy = board.clone_independent();
        copy.take(sq("e2"));
        copy.set_side_to_move(PieceColor::Black);
        assert!(board.get(sq("e2")).is_some());
        assert_eq!(board.side_to_move(), PieceColor::White);
        assert_ne!(board, copy);
        assert!(!board.same_position(&copy));
        assert!(board.same_position(&board.clone_independent()));
    }

    #[test]
    fn test_check_detection() {
        let mut board = Board::new(8, 8);
        board.put(PieceColor::White, PieceKind::King, sq("e1"));
        board.put(PieceColor::Black, PieceKind::King, sq("e8"));
        board.put(PieceColor::Black, PieceKind::Rook, sq("e5"));
        assert!(board.is_in_check(PieceColor::White));
        assert!(!board.is_in_check(PieceColor::Black));

        board.put(PieceColor::White, PieceKind::Pawn, sq("e2"));
        assert!(!board.is_in_check(PieceColor::White));
    }

    #[test]
    fn test_pawn_attacks_diagonally_only() {
        let mut board = Board::new(8, 8);
        board.put(PieceColor::Black, PieceKind::Pawn, sq("d5"));
        assert!(board.is_square_attacked(sq("c4"), PieceColor::Black));
        assert!(board.is_square_attacked(sq("e4"), PieceColor::Black));
        assert!(!board.is_square_attacked(sq("d4"), PieceColor::Black));
        assert!(!board.is_square_attacked(sq("d3"), PieceColor::Black));
    }

    #[test]
    fn test_path_shapes() {
        let board = Board::standard();
        let bishop = *board.get(sq("c1")).unwrap();
        let rook = *board.get(sq("a1")).unwrap();
        let knight = *board.get(sq("b1")).unwrap();
        let pawn = *board.get(sq("e2")).unwrap();

        assert!(!board.path_clear_and_shape_valid(&bishop, sq("c1"), sq("e3")));
        assert!(!board.path_clear_and_shape_valid(&bishop, sq("c1"), sq("c3")));
        assert!(!board.path_clear_and_shape_valid(&rook, sq("a1"), sq("a3")));
        assert!(board.path_clear_and_shape_valid(&knight, sq("b1"), sq("c3")));
        assert!(board.path_clear_and_shape_valid(&pawn, sq("e2"), sq("e4")));
        assert!(!board.path_clear_and_shape_valid(&pawn, sq("e2"), sq("e5")));
        assert!(!board.path_clear_and_shape_valid(&pawn, sq("e2"), sq("e1")));
    }

    #[test]
    fn test_path_castling_pattern() {
        let mut board = Board::new(8, 8);
        board.put(PieceColor::White, PieceKind::King, sq("e1"));
        board.put(PieceColor::White, PieceKind::Rook, sq("h1"));
        board.put(PieceColor::White, PieceKind::Rook, sq("a1"));
        let king = *board.get(sq("e1")).unwrap();

        assert!(board.path_clear_and_shape_valid(&king, sq("e1"), sq("g1")));
        assert!(board.path_clear_and_shape_valid(&king, sq("e1"), sq("c1")));

        board.put(PieceColor::White, PieceKind::Knight, sq("b1"));
        assert!(!board.path_clear_and_shape_valid(&king, sq("e1"), sq("c1")));

        board.get_mut(sq("h1")).unwrap().last_moved_at = 3;
        assert!(!board.path_clear_and_shape_valid(&king, sq("e1"), sq("g1")));
    }

    #[test]
    fn test_material_count_display() {
        let board = Board::standard();
        let material = board.material();
        assert_eq!(material.get(PieceColor::White, PieceKind::Pawn), 8);
        assert_eq!(material.get(PieceColor::Black, PieceKind::Queen), 1);
        let text = material.to_string();
        assert!(text.starts_with("White has:\n  pawns = 8\n"));
        assert!(text.contains("Black has:\n"));
        assert!(!text.contains("kings"));
    }

    #[test]
    fn test_display_renders_ranks_top_down() {
        let board = Board::standard();
        let text = board.to_string();
        let first = text.lines().next().unwrap();
        assert_eq!(first, " 8 r n b q k b n r");
        assert!(text.ends_with("   a b c d e f g h"));
    }
}
