use crate::board::Board;
use crate::coord::Coord;
use crate::types::{Piece, PieceColor, PieceKind};

/// A from/to transition of a single piece.
///
/// Only what was known at generation time is stored; captures and the
/// en-passant classification are derived against whatever board the move is
/// looked at with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Coord,
    pub to: Coord,
    pub color: PieceColor,
    pub kind: PieceKind,
    /// Board move counter when the move was generated.
    pub number: u32,
    pub promotion: Option<PieceKind>,
}

impl Move {
    pub fn new(piece: &Piece, to: Coord, number: u32) -> Self {
        Self {
            from: piece.coord,
            to,
            color: piece.color,
            kind: piece.kind,
            number,
            promotion: None,
        }
    }

    /// Build a move for whatever piece stands on `from`.
    pub fn on_board(board: &Board, from: Coord, to: Coord) -> Option<Self> {
        board
            .get(from)
            .map(|piece| Self::new(piece, to, board.move_number()))
    }

    pub fn with_promotion(mut self, promotion: Option<PieceKind>) -> Self {
        self.promotion = promotion;
        self
    }

    /// Re-derive this move against another board (e.g. a simulation clone).
    ///
    /// Returns `None` when the piece that generated the move is not on `from`.
    pub fn rebind(&self, board: &Board) -> Option<Move> {
        let piece = board.get(self.from)?;
        (piece.kind == self.kind && piece.color == self.color).then(|| {
            Self::new(piece, self.to, board.move_number()).with_promotion(self.promotion)
        })
    }

    /// Piece removed by this move, including an en-passant victim.
    pub fn captured(&self, board: &Board) -> Option<Piece> {
        if self.is_en_passant(board) {
            return board.get(self.en_passant_victim()).copied();
        }
        board.get(self.to).copied().filter(|p| p.color != self.color)
    }

    pub fn is_en_passant(&self, board: &Board) -> bool {
        self.kind == PieceKind::Pawn
            && self.from.file != self.to.file
            && board.is_en_passant_capture(self.to, self.color)
    }

    /// Square of the pawn an en-passant capture removes.
    pub fn en_passant_victim(&self) -> Coord {
        Coord::new(self.to.file, self.from.rank)
    }

    /// A king displaced by two files.
    pub fn is_castle(&self) -> bool {
        self.kind == PieceKind::King
            && self.from.rank == self.to.rank
            && (self.to.file - self.from.file).abs() == 2
    }

    pub fn is_double_push(&self) -> bool {
        self.kind == PieceKind::Pawn
            && self.from.file == self.to.file
            && (self.to.rank - self.from.rank).abs() == 2
    }

    /// True when this pawn move lands on the last rank.
    pub fn is_promotion(&self, board: &Board) -> bool {
        self.kind == PieceKind::Pawn && self.to.rank == board.promotion_rank(self.color)
    }

    /// Full-move number as printed in game notation.
    pub fn full_move_number(&self) -> u32 {
        self.number.div_ceil(2)
    }

    /// Coordinate notation, e.g. `e2e4` or `e7e8q`.
    pub fn notation(&self) -> String {
        crate::uci::format_move_token(self)
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.notation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Coord {
        s.parse().unwrap()
    }

    #[test]
    fn test_on_board_reads_piece() {
        let board = Board::standard();
        let mv = Move::on_board(&board, sq("g1"), sq("f3")).unwrap();
        assert_eq!(mv.kind, PieceKind::Knight);
        assert_eq!(mv.color, PieceColor::White);
        assert_eq!(mv.number, 1);
        assert!(Move::on_board(&board, sq("e4"), sq("e5")).is_none());
    }

    #[test]
    fn test_classifications() {
        let board = Board::standard();
        let push = Move::on_board(&board, sq("e2"), sq("e4")).unwrap();
        assert!(push.is_double_push());
        assert!(!push.is_castle());

        let castle = Move::on_board(&board, sq("e1"), sq("g1")).unwrap();
        assert!(castle.is_castle());
        assert_eq!(castle.notation(), "e1g1");
    }

    #[test]
    fn test_captured_is_live_lookup() {
        let mut board = Board::new(8, 8);
        board.put(PieceColor::White, PieceKind::Rook, sq("a1"));
        let mv = Move::on_board(&board, sq("a1"), sq("a8")).unwrap();
        assert!(mv.captured(&board).is_none());

        board.put(PieceColor::Black, PieceKind::Knight, sq("a8"));
        assert_eq!(mv.captured(&board).map(|p| p.kind), Some(PieceKind::Knight));
    }

    #[test]
    fn test_en_passant_capture_reports_victim() {
        let mut board = Board::new(8, 8);
        board.put(PieceColor::White, PieceKind::Pawn, sq("e5"));
        board.put(PieceColor::Black, PieceKind::Pawn, sq("d5"));
        board.set_en_passant(Some(sq("d6")));
        let mv = Move::on_board(&board, sq("e5"), sq("d6")).unwrap();
        assert!(mv.is_en_passant(&board));
        assert_eq!(mv.en_passant_victim(), sq("d5"));
        assert_eq!(mv.captured(&board).map(|p| p.coord), Some(sq("d5")));
    }

    #[test]
    fn test_rebind_checks_piece_identity() {
        let board = Board::standard();
        let mv = Move::on_board(&board, sq("b1"), sq("c3")).unwrap();
        let clone = board.clone_independent();
        assert_eq!(mv.rebind(&clone), Some(mv));

        let mut other = Board::standard();
        other.put(PieceColor::White, PieceKind::Bishop, sq("b1"));
        assert!(mv.rebind(&other).is_none());
    }

    #[test]
    fn test_full_move_number() {
        let mut board = Board::standard();
        assert_eq!(Move::on_board(&board, sq("e2"), sq("e4")).unwrap().full_move_number(), 1);
        board.set_move_number(2);
        assert_eq!(Move::on_board(&board, sq("e7"), sq("e5")).unwrap().full_move_number(), 1);
        board.set_move_number(3);
        assert_eq!(Move::on_board(&board, sq("g1"), sq("f3")).unwrap().full_move_number(), 2);
    }
}
