//! Legal-move filtering by simulation on an independent board copy.

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::coord::Coord;
use crate::executor;
use crate::movegen;
use crate::moves::Move;
use crate::types::{PieceColor, PieceKind};

/// Whether a legality query simulates the move to look for self-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckPolicy {
    Enforce,
    /// Shape and occupancy only. Used for reachability questions that must not
    /// recurse into check testing.
    Skip,
}

/// Outcome of the position for the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Ongoing,
    Check,
    Checkmate { winner: PieceColor },
    Stalemate,
}

impl GameStatus {
    pub fn is_over(self) -> bool {
        matches!(self, Self::Checkmate { .. } | Self::Stalemate)
    }
}

/// Decide whether `mv` is legal on `board`.
///
/// The move must belong to the piece standing on `from`, appear in that
/// piece's pseudo-legal set and, under [`CheckPolicy::Enforce`], must not leave
/// the mover's king attacked once played on a throwaway copy of the board.
pub fn is_legal(board: &Board, mv: &Move, policy: CheckPolicy) -> bool {
    let Some(piece) = board.get(mv.from) else {
        return false;
    };
    if piece.kind != mv.kind || piece.color != mv.color {
        return false;
    }
    if !board.path_clear_and_shape_valid(piece, mv.from, mv.to) {
        return false;
    }
    if let Some(kind) = mv.promotion {
        if !kind.is_promotion_target() || !mv.is_promotion(board) {
            return false;
        }
    }
    if !movegen::pseudo_legal_moves(board, piece)
        .iter()
        .any(|candidate| candidate.to == mv.to)
    {
        return false;
    }

    match policy {
        CheckPolicy::Skip => true,
        CheckPolicy::Enforce => {
            let mut simulation = board.clone_independent();
            executor::apply(&mut simulation, mv);
            !simulation.is_in_check(piece.color)
        }
    }
}

/// Legal moves of the piece on `from`. Promotions are expanded into one move
/// per promotion kind.
pub fn legal_moves_from(board: &Board, from: Coord) -> Vec<Move> {
    let Some(piece) = board.get(from) else {
        return Vec::new();
    };
    let mut moves = Vec::new();
    for mv in movegen::pseudo_legal_moves(board, piece) {
        if !is_legal(board, &mv, CheckPolicy::Enforce) {
            continue;
        }
        if mv.is_promotion(board) {
            moves.extend(
                PieceKind::PROMOTIONS
                    .iter()
                    .map(|kind| mv.with_promotion(Some(*kind))),
            );
        } else {
            moves.push(mv);
        }
    }
    moves
}

/// Every legal move for the side to move.
pub fn legal_moves(board: &Board) -> Vec<Move> {
    let side = board.side_to_move();
    let origins: Vec<Coord> = board.pieces_of(side).map(|p| p.coord).collect();
    origins
        .into_iter()
        .flat_map(|from| legal_moves_from(board, from))
        .collect()
}

pub fn has_legal_move(board: &Board) -> bool {
    let side = board.side_to_move();
    board.pieces_of(side).any(|piece| {
        movegen::pseudo_legal_moves(board, piece)
            .iter()
            .any(|mv| is_legal(board, mv, CheckPolicy::Enforce))
    })
}

pub fn status(board: &Board) -> GameStatus {
    let side = board.side_to_move();
    let in_check = board.is_in_check(side);
    match (has_legal_move(board), in_check) {
        (true, false) => GameStatus::Ongoing,
        (true, true) => GameStatus::Check,
        (false, true) => GameStatus::Checkmate {
            winner: side.opponent(),
        },
        (false, false) => GameStatus::Stalemate,
    }
}

/// Count leaf nodes of the legal move tree to `depth` plies.
pub fn perft(board: &Board, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = legal_moves(board);
    if depth == 1 {
        return moves.len() as u64;
    }
    moves
        .iter()
        .map(|mv| {
            let mut next = board.clone_independent();
            executor::apply(&mut next, mv);
            perft(&next, depth - 1)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fen::parse_fen;

    fn sq(s: &str) -> Coord {
        s.parse().unwrap()
    }

    fn mv(board: &Board, from: &str, to: &str) -> Move {
        Move::on_board(board, sq(from), sq(to)).unwrap()
    }

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

    #[test]
    fn test_start_position_has_twenty_moves() {
        assert_eq!(legal_moves(&Board::standard()).len(), 20);
    }

    #[test]
    fn test_pinned_piece_cannot_move() {
        let mut board = Board::new(8, 8);
        board.put(PieceColor::White, PieceKind::King, sq("e1"));
        board.put(PieceColor::White, PieceKind::Knight, sq("e2"));
        board.put(PieceColor::Black, PieceKind::Rook, sq("e8"));
        board.put(PieceColor::Black, PieceKind::King, sq("a8"));

        let jump = mv(&board, "e2", "c3");
        assert!(!is_legal(&board, &jump, CheckPolicy::Enforce));
        assert!(is_legal(&board, &jump, CheckPolicy::Skip));
        assert!(legal_moves_from(&board, sq("e2")).is_empty());
    }

    #[test]
    fn test_validation_leaves_board_untouched() {
        let board = Board::standard();
        let before = board.clone();
        assert!(is_legal(&board, &mv(&board, "e2", "e4"), CheckPolicy::Enforce));
        assert_eq!(board, before);
    }

    #[test]
    fn test_rejects_wrong_shape_and_empty_origin() {
        let board = Board::standard();
        assert!(!is_legal(&board, &mv(&board, "c1", "c3"), CheckPolicy::Enforce));
        let mut ghost = mv(&board, "e2", "e4");
        ghost.from = sq("e3");
        assert!(!is_legal(&board, &ghost, CheckPolicy::Enforce));
    }

    #[test]
    fn test_king_cannot_step_into_attack() {
        let mut board = Board::new(8, 8);
        board.put(PieceColor::White, PieceKind::King, sq("e1"));
        board.put(PieceColor::Black, PieceKind::Rook, sq("d8"));
        board.put(PieceColor::Black, PieceKind::King, sq("h8"));
        assert!(!is_legal(&board, &mv(&board, "e1", "d1"), CheckPolicy::Enforce));
        assert!(is_legal(&board, &mv(&board, "e1", "f1"), CheckPolicy::Enforce));
    }

    #[test]
    fn test_promotion_kind_validation() {
        let mut board = Board::new(8, 8);
        board.put(PieceColor::White, PieceKind::King, sq("a1"));
        board.put(PieceColor::Black, PieceKind::King, sq("h8"));
        board.put(PieceColor::White, PieceKind::Pawn, sq("c7"));

        let push = mv(&board, "c7", "c8");
        assert!(is_legal(&board, &push.with_promotion(Some(PieceKind::Knight)), CheckPolicy::Enforce));
        assert!(!is_legal(&board, &push.with_promotion(Some(PieceKind::King)), CheckPolicy::Enforce));
        assert_eq!(legal_moves_from(&board, sq("c7")).len(), 4);

        let quiet = mv(&board, "a1", "a2").with_promotion(Some(PieceKind::Queen));
        assert!(!is_legal(&board, &quiet, CheckPolicy::Enforce));
    }

    #[test]
    fn test_fools_mate_status() {
        let board = parse_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3").unwrap();
        assert_eq!(
            status(&board),
            GameStatus::Checkmate {
                winner: PieceColor::Black
            }
        );
    }

    #[test]
    fn test_stalemate_status() {
        let board = parse_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(status(&board), GameStatus::Stalemate);
    }

    #[test]
    fn test_castle_with_attacked_path_is_rejected() {
        // Black bishop on a6 covers f1; e1 and g1 are safe.
        let board = parse_fen("4k3/8/b7/8/8/8/8/4K2R w K - 0 1").unwrap();
        assert!(!board.is_in_check(PieceColor::White));
        assert!(!board.is_square_attacked(sq("g1"), PieceColor::Black));
        assert!(board.is_square_attacked(sq("f1"), PieceColor::Black));
        assert!(!is_legal(&board, &mv(&board, "e1", "g1"), CheckPolicy::Enforce));
    }

    #[test]
    fn test_perft_start_position() {
        let board = Board::standard();
        assert_eq!(perft(&board, 1), 20);
        assert_eq!(perft(&board, 2), 400);
        assert_eq!(perft(&board, 3), 8902);
    }

    #[test]
    fn test_perft_kiwipete() {
        let board = parse_fen(KIWIPETE).unwrap();
        assert_eq!(perft(&board, 1), 48);
        assert_eq!(perft(&board, 2), 2039);
    }

    #[test]
    fn test_perft_en_passant_pins() {
        // Position 3 from the chess programming wiki exercises rank pins on
        // en-passant captures.
        let board = parse_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap();
        assert_eq!(perft(&board, 1), 14);
        assert_eq!(perft(&board, 2), 191);
        assert_eq!(perft(&board, 3), 2812);
    }

    fn reference_perft(board: &cozy_chess::Board, depth: u32) -> u64 {
        if depth == 0 {
            return 1;
        }
        let mut nodes = 0;
        board.generate_moves(|moves| {
            for mv in moves {
                let mut next = board.clone();
                next.play_unchecked(mv);
                nodes += reference_perft(&next, depth - 1);
            }
            false
        });
        nodes
    }

    #[test]
    fn test_perft_matches_reference_generator() {
        let positions = [
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1",
            "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
            "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
        ];
        for fen in positions {
            let ours = parse_fen(fen).unwrap();
            let reference: cozy_chess::Board = fen.parse().unwrap();
            assert_eq!(
                perft(&ours, 2),
                reference_perft(&reference, 2),
                "perft mismatch for {}",
                fen
            );
        }
    }
}
