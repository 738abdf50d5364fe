//! Pseudo-legal move generation, dispatched over piece kind.
//!
//! Nothing in here looks at whether a move exposes the mover's own king;
//! that filtering happens in [`crate::legality`].

use smallvec::SmallVec;

use crate::board::Board;
use crate::coord::Coord;
use crate::moves::Move;
use crate::types::{Piece, PieceKind};

pub type MoveList = SmallVec<[Move; 32]>;
pub type SquareList = SmallVec<[Coord; 32]>;

const ORTHOGONAL: [Coord; 4] = [
    Coord::new(1, 0),
    Coord::new(-1, 0),
    Coord::new(0, 1),
    Coord::new(0, -1),
];

const DIAGONAL: [Coord; 4] = [
    Coord::new(1, 1),
    Coord::new(1, -1),
    Coord::new(-1, 1),
    Coord::new(-1, -1),
];

const KNIGHT_JUMPS: [Coord; 8] = [
    Coord::new(1, 2),
    Coord::new(2, 1),
    Coord::new(2, -1),
    Coord::new(1, -2),
    Coord::new(-1, -2),
    Coord::new(-2, -1),
    Coord::new(-2, 1),
    Coord::new(-1, 2),
];

const ADJACENT: [Coord; 8] = [
    Coord::new(-1, -1),
    Coord::new(-1, 0),
    Coord::new(-1, 1),
    Coord::new(0, -1),
    Coord::new(0, 1),
    Coord::new(1, -1),
    Coord::new(1, 0),
    Coord::new(1, 1),
];

/// All pseudo-legal moves of `piece`.
pub fn pseudo_legal_moves(board: &Board, piece: &Piece) -> MoveList {
    let targets = match piece.kind {
        PieceKind::Pawn => pawn_targets(board, piece),
        PieceKind::Knight => step_targets(board, piece, &KNIGHT_JUMPS),
        PieceKind::Bishop => ray_targets(board, piece, &DIAGONAL),
        PieceKind::Rook => ray_targets(board, piece, &ORTHOGONAL),
        PieceKind::Queen => {
            let mut targets = ray_targets(board, piece, &DIAGONAL);
            targets.extend(ray_targets(board, piece, &ORTHOGONAL));
            targets
        }
        PieceKind::King => {
            let mut targets = step_targets(board, piece, &ADJACENT);
            targets.extend(castling_targets(board, piece));
            targets
        }
    };

    let number = board.move_number();
    targets
        .into_iter()
        .map(|to| Move::new(piece, to, number))
        .collect()
}

/// Squares `piece` threatens. Non-capturing specials (double pushes,
/// castling) are left out, and pawns threaten both forward diagonals
/// regardless of occupancy.
pub fn capture_opportunities(board: &Board, piece: &Piece) -> SquareList {
    match piece.kind {
        PieceKind::Pawn => pawn_diagonals(board, piece).collect(),
        PieceKind::Knight => step_targets(board, piece, &KNIGHT_JUMPS),
        PieceKind::Bishop => ray_targets(board, piece, &DIAGONAL),
        PieceKind::Rook => ray_targets(board, piece, &ORTHOGONAL),
        PieceKind::Queen => {
            let mut targets = ray_targets(board, piece, &DIAGONAL);
            targets.extend(ray_targets(board, piece, &ORTHOGONAL));
            targets
        }
        PieceKind::King => step_targets(board, piece, &ADJACENT),
    }
}

fn pawn_diagonals<'a>(board: &'a Board, pawn: &Piece) -> impl Iterator<Item = Coord> + 'a {
    let forward = pawn.color.forward();
    let origin = pawn.coord;
    [1, -1]
        .into_iter()
        .map(move |side| origin + Coord::new(side, forward))
        .filter(|c| board.contains(*c))
}

fn pawn_targets(board: &Board, pawn: &Piece) -> SquareList {
    let mut targets = SquareList::new();
    let step = Coord::new(0, pawn.color.forward());

    let one = pawn.coord + step;
    if board.is_empty(one) {
        targets.push(one);
        let two = one + step;
        if pawn.coord.rank == board.pawn_start_rank(pawn.color) && board.is_empty(two) {
            targets.push(two);
        }
    }

    for diagonal in pawn_diagonals(board, pawn) {
        if board.is_enemy(diagonal, pawn.color)
            || board.is_en_passant_capture(diagonal, pawn.color)
        {
            targets.push(diagonal);
        }
    }
    targets
}

fn step_targets(board: &Board, piece: &Piece, offsets: &[Coord]) -> SquareList {
    offsets
        .iter()
        .map(|offset| piece.coord + *offset)
        .filter(|to| board.is_empty(*to) || board.is_enemy(*to, piece.color))
        .collect()
}

fn ray_targets(board: &Board, piece: &Piece, directions: &[Coord]) -> SquareList {
    let mut targets = SquareList::new();
    for step in directions {
        let mut cursor = piece.coord + *step;
        while board.is_empty(cursor) {
            targets.push(cursor);
            cursor += *step;
        }
        if board.is_enemy(cursor, piece.color) {
            targets.push(cursor);
        }
    }
    targets
}

/// Castling destinations for a never-moved king.
///
/// Scans towards each edge: every square up to the corner rook must be empty,
/// the king may not be in check, and neither the square it crosses nor the one
/// it lands on may be attacked.
fn castling_targets(board: &Board, king: &Piece) -> SquareList {
    let mut targets = SquareList::new();
    if king.has_moved() {
        return targets;
    }
    let opponent = king.color.opponent();
    if board.is_square_attacked(king.coord, opponent) {
        return targets;
    }

    for side in [1, -1] {
        let step = Coord::new(side, 0);
        let mut cursor = king.coord + step;
        while board.is_empty(cursor) {
            cursor += step;
        }

        let rook_ready = board.get(cursor).is_some_and(|rook| {
            rook.kind == PieceKind::Rook && rook.color == king.color && !rook.has_moved()
        });
        let at_corner = cursor.file == 0 || cursor.file == board.width() as i8 - 1;
        if !rook_ready || !at_corner || (cursor.file - king.coord.file).abs() < 3 {
            continue;
        }

        let crossed = king.coord + step;
        let landing = crossed + step;
        if board.is_square_attacked(crossed, opponent) || board.is_square_attacked(landing, opponent)
        {
            continue;
        }
        targets.push(landing);
    }
    targets
}
