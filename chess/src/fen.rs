//! Position notation: rank-by-rank placement, side to move, castling
//! availability and en-passant target.

use std::fmt::Write as _;

use crate::board::Board;
use crate::coord::Coord;
use crate::types::{Piece, PieceColor, PieceKind};

/// Stamp given to pieces that lost their castling right before the position
/// was set up.
const MOVED_BEFORE_SETUP: u32 = 1;

/// Files are lettered `a..z`, so no side may be longer than 26 squares.
const MAX_SIDE: usize = 26;

/// Parse a FEN string into a Board
///
/// Pieces whose castling right is absent are marked as moved. The full-move
/// field is translated into the board's per-ply counter; the half-move clock
/// is accepted and ignored.
pub fn parse_fen(fen: &str) -> Result<Board, FenError> {
    let parts: Vec<&str> = fen.split_whitespace().collect();
    if parts.is_empty() || parts.len() > 6 {
        return Err(FenError::InvalidFormat);
    }

    let mut board = parse_placement(parts[0])?;

    let side = match parts.get(1).copied().unwrap_or("w") {
        "w" => PieceColor::White,
        "b" => PieceColor::Black,
        other => return Err(FenError::InvalidSideToMove(other.to_string())),
    };
    board.set_side_to_move(side);

    for color in [PieceColor::White, PieceColor::Black] {
        let count = board
            .pieces_of(color)
            .filter(|p| p.kind == PieceKind::King)
            .count();
        if count != 1 {
            return Err(FenError::KingCount { color, count });
        }
    }

    apply_castling_rights(&mut board, parts.get(2).copied().unwrap_or("-"))?;

    match parts.get(3).copied().unwrap_or("-") {
        "-" => {}
        square => {
            let target: Coord = square
                .parse()
                .map_err(|_| FenError::InvalidEnPassant(square.to_string()))?;
            let mover = board.side_to_move();
            let expected_rank =
                board.pawn_start_rank(mover.opponent()) + mover.opponent().forward();
            if !board.contains(target) || target.rank != expected_rank || !board.is_empty(target) {
                return Err(FenError::InvalidEnPassant(square.to_string()));
            }
            board.set_en_passant(Some(target));
            if !board.is_en_passant_capture(target, mover) {
                return Err(FenError::InvalidEnPassant(square.to_string()));
            }
        }
    }

    if let Some(clock) = parts.get(4) {
        clock
            .parse::<u32>()
            .map_err(|_| FenError::InvalidCounter(clock.to_string()))?;
    }
    let full_move = match parts.get(5) {
        Some(field) => field
            .parse::<u32>()
            .map_err(|_| FenError::InvalidCounter(field.to_string()))?
            .max(1),
        None => 1,
    };
    let plies = match side {
        PieceColor::White => full_move.checked_mul(2).map(|n| n - 1),
        PieceColor::Black => full_move.checked_mul(2),
    };
    let plies = plies.ok_or_else(|| {
        FenError::InvalidCounter(parts.get(5).copied().unwrap_or_default().to_string())
    })?;
    board.set_move_number(plies);

    Ok(board)
}

fn parse_placement(placement: &str) -> Result<Board, FenError> {
    let rows: Vec<&str> = placement.split('/').collect();
    if rows.len() > MAX_SIDE {
        return Err(FenError::InvalidBoardLayout);
    }
    let mut parsed: Vec<Vec<Option<Piece>>> = Vec::with_capacity(rows.len());

    for row in &rows {
        let mut squares = Vec::new();
        let mut chars = row.chars().peekable();
        while let Some(c) = chars.next() {
            if let Some(digit) = c.to_digit(10) {
                let mut run = digit as usize;
                while let Some(next) = chars.peek().and_then(|n| n.to_digit(10)) {
                    run = run * 10 + next as usize;
                    if squares.len() + run > MAX_SIDE {
                        return Err(FenError::InvalidBoardLayout);
                    }
                    chars.next();
                }
                if run == 0 || squares.len() + run > MAX_SIDE {
                    return Err(FenError::InvalidBoardLayout);
                }
                squares.extend(std::iter::repeat(None).take(run));
            } else {
                let kind = PieceKind::from_char(c).ok_or(FenError::InvalidPiece(c))?;
                let color = if c.is_ascii_uppercase() {
                    PieceColor::White
                } else {
                    PieceColor::Black
                };
                if squares.len() == MAX_SIDE {
                    return Err(FenError::InvalidBoardLayout);
                }
                squares.push(Some(Piece::new(color, kind, Coord::new(0, 0))));
            }
        }
        parsed.push(squares);
    }

    let width = parsed.first().map_or(0, Vec::len);
    if width == 0
        || width > MAX_SIDE
        || parsed.len() > MAX_SIDE
        || parsed.iter().any(|row| row.len() != width)
    {
        return Err(FenError::InvalidBoardLayout);
    }

    let height = parsed.len();
    let mut board = Board::new(width as u8, height as u8);
    for (row_index, row) in parsed.into_iter().enumerate() {
        let rank = (height - 1 - row_index) as i8;
        for (file, piece) in row.into_iter().enumerate() {
            if let Some(piece) = piece {
                board.put(piece.color, piece.kind, Coord::new(file as i8, rank));
            }
        }
    }
    Ok(board)
}

fn apply_castling_rights(board: &mut Board, field: &str) -> Result<(), FenError> {
    if field != "-" && (field.is_empty() || !field.chars().all(|c| "KQkq".contains(c))) {
        return Err(FenError::InvalidCastling(field.to_string()));
    }

    for color in [PieceColor::White, PieceColor::Black] {
        let (king_side, queen_side) = match color {
            PieceColor::White => ('K', 'Q'),
            PieceColor::Black => ('k', 'q'),
        };
        let rank = home_rank(board, color);
        let rights = [
            (field.contains(king_side), board.width() as i8 - 1),
            (field.contains(queen_side), 0),
        ];
        for (allowed, file) in rights {
            if !allowed {
                stamp_moved(board, Coord::new(file, rank), PieceKind::Rook, color);
            }
        }
        if rights.iter().all(|(allowed, _)| !allowed) {
            if let Some(king) = board.king(color) {
                stamp_moved(board, king, PieceKind::King, color);
            }
        }
    }
    Ok(())
}

fn stamp_moved(board: &mut Board, coord: Coord, kind: PieceKind, color: PieceColor) {
    if let Some(piece) = board.get(coord).copied() {
        if piece.kind == kind && piece.color == color {
            board.set(
                coord,
                Some(Piece {
                    last_moved_at: MOVED_BEFORE_SETUP,
                    ..piece
                }),
            );
        }
    }
}

fn home_rank(board: &Board, color: PieceColor) -> i8 {
    match color {
        PieceColor::White => 0,
        PieceColor::Black => board.height() as i8 - 1,
    }
}

/// Format a Board as a FEN string
///
/// Castling availability is derived from never-moved kings and corner rooks.
/// The half-move and full-move fields are fixed placeholders.
pub fn format_fen(board: &Board) -> String {
    let mut fen = String::new();

    for rank in (0..board.height() as i8).rev() {
        let mut empty = 0;
        for file in 0..board.width() as i8 {
            match board.get(Coord::new(file, rank)) {
                Some(piece) => {
                    if empty > 0 {
                        let _ = write!(fen, "{}", empty);
                        empty = 0;
                    }
                    fen.push(piece.symbol());
                }
                None => empty += 1,
            }
        }
        if empty > 0 {
            let _ = write!(fen, "{}", empty);
        }
        if rank > 0 {
            fen.push('/');
        }
    }

    fen.push(' ');
    fen.push(match board.side_to_move() {
        PieceColor::White => 'w',
        PieceColor::Black => 'b',
    });

    fen.push(' ');
    fen.push_str(&castling_field(board));

    fen.push(' ');
    match board.en_passant() {
        Some(target) => fen.push_str(&target.to_string()),
        None => fen.push('-'),
    }

    fen.push_str(" 0 1");
    fen
}

fn castling_field(board: &Board) -> String {
    let mut field = String::new();
    for color in [PieceColor::White, PieceColor::Black] {
        let king_ready = board
            .king(color)
            .and_then(|c| board.get(c))
            .is_some_and(|k| !k.has_moved());
        if !king_ready {
            continue;
        }
        let rank = home_rank(board, color);
        for (file, letter) in [(board.width() as i8 - 1, 'K'), (0, 'Q')] {
            let rook_ready = board.get(Coord::new(file, rank)).is_some_and(|r| {
                r.kind == PieceKind::Rook && r.color == color && !r.has_moved()
            });
            if rook_ready {
                field.push(match color {
                    PieceColor::White => letter,
                    PieceColor::Black => letter.to_ascii_lowercase(),
                });
            }
        }
    }
    if field.is_empty() {
        field.push('-');
    }
    field
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FenError {
    #[error("Invalid FEN format")]
    InvalidFormat,
    #[error("Invalid board layout")]
    InvalidBoardLayout,
    #[error("Invalid piece symbol: {0}")]
    InvalidPiece(char),
    #[error("Invalid side to move: {0}")]
    InvalidSideToMove(String),
    #[error("Invalid castling field: {0}")]
    InvalidCastling(String),
    #[error("Invalid en passant square: {0}")]
    InvalidEnPassant(String),
    #[error("Invalid move counter: {0}")]
    InvalidCounter(String),
    #[error("Expected exactly one {} king, found {count}", .color.as_str())]
    KingCount { color: PieceColor, count: usize },
}
