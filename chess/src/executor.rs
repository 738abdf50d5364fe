//! Applying moves to a board.
//!
//! [`apply`] trusts its input: callers validate with
//! [`crate::legality::is_legal`] first. The legality checker itself calls it
//! on throwaway copies while simulating.

use crate::board::Board;
use crate::coord::Coord;
use crate::moves::Move;
use crate::types::{Piece, PieceKind};

/// Everything a single application changed, for callers that render or
/// record the move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveEffects {
    /// The mover as it stands after the move.
    pub destination: Piece,
    pub captured: Option<Piece>,
    /// Square emptied by an en-passant capture.
    pub en_passant_victim: Option<Coord>,
    /// Rook relocation of a castling move.
    pub rook_move: Option<(Coord, Coord)>,
    pub promoted_to: Option<PieceKind>,
    /// A pawn reached its last rank without a chosen promotion kind.
    pub promotion_pending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecuteError {
    #[error("No piece on {0}")]
    EmptySquare(Coord),
    #[error("Piece on {0} cannot be promoted")]
    NotPromotable(Coord),
    #[error("Cannot promote to {0:?}")]
    InvalidPromotion(PieceKind),
}

/// Play `mv` on `board`.
///
/// Moves the piece, removes any captured piece (including an en-passant
/// victim), relocates the rook of a castling move, stamps the mover with the
/// incremented move counter and hands the turn to the opponent. A move whose
/// origin square is empty leaves the board untouched.
pub fn apply(board: &mut Board, mv: &Move) -> MoveEffects {
    let en_passant = mv.is_en_passant(board);
    board.set_en_passant(None);

    let Some(mut piece) = board.take(mv.from) else {
        tracing::warn!("Applying {} with no piece on {}", mv, mv.from);
        return MoveEffects {
            destination: Piece::new(mv.color, mv.kind, mv.to),
            captured: None,
            en_passant_victim: None,
            rook_move: None,
            promoted_to: None,
            promotion_pending: false,
        };
    };

    let number = board.increment_move_number();
    piece.prev_coord = mv.from;
    piece.last_moved_at = number;

    let (captured, en_passant_victim) = if en_passant {
        let victim = mv.en_passant_victim();
        (board.take(victim), Some(victim))
    } else {
        (board.take(mv.to), None)
    };

    let rook_move = if mv.is_castle() {
        castle_rook(board, mv, number)
    } else {
        None
    };

    board.set(mv.to, Some(piece));
    board.switch_side();

    if mv.is_double_push() {
        let skipped = mv.from + (mv.to - mv.from).signum();
        board.set_en_passant(Some(skipped));
    }

    let mut promoted_to = None;
    let mut promotion_pending = false;
    if board.must_be_promoted(mv.to) {
        match mv.promotion.filter(|k| k.is_promotion_target()) {
            Some(kind) => {
                if let Some(p) = board.get_mut(mv.to) {
                    p.kind = kind;
                }
                promoted_to = Some(kind);
            }
            None => promotion_pending = true,
        }
    }

    let destination = board.get(mv.to).copied().unwrap_or(piece);
    tracing::trace!(
        "Applied {} (captured: {:?}, castle: {:?})",
        mv,
        captured.map(|p| p.kind),
        rook_move
    );

    MoveEffects {
        destination,
        captured,
        en_passant_victim,
        rook_move,
        promoted_to,
        promotion_pending,
    }
}

/// Move the castling rook to the square the king crossed. The rook sits
/// either right next to the king's destination or one square further out.
fn castle_rook(board: &mut Board, mv: &Move, number: u32) -> Option<(Coord, Coord)> {
    let step = (mv.to - mv.from).signum();
    let from = [mv.to + step, mv.to + step * 2]
        .into_iter()
        .find(|c| board.get(*c).is_some_and(|p| p.kind == PieceKind::Rook && p.color == mv.color))?;
    let to = mv.to - step;
    let mut rook = board.take(from)?;
    rook.prev_coord = from;
    rook.last_moved_at = number;
    board.set(to, Some(rook));
    Some((from, to))
}

/// Replace the pawn on `coord` with a piece of `kind`.
///
/// Used to resolve a pending promotion once the kind has been chosen.
pub fn promote(board: &mut Board, coord: Coord, kind: PieceKind) -> Result<Piece, ExecuteError> {
    if !kind.is_promotion_target() {
        return Err(ExecuteError::InvalidPromotion(kind));
    }
    if board.get(coord).is_none() {
        return Err(ExecuteError::EmptySquare(coord));
    }
    if !board.must_be_promoted(coord) {
        return Err(ExecuteError::NotPromotable(coord));
    }
    let piece = board
        .get_mut(coord)
        .ok_or(ExecuteError::EmptySquare(coord))?;
    piece.kind = kind;
    Ok(*piece)
}
