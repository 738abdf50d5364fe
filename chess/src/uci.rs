//! Coordinate move tokens as spoken by UCI engines (`e2e4`, `e7e8q`).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::coord::Coord;
use crate::moves::Move;
use crate::types::PieceKind;

/// A move as written on the wire: squares plus an optional promotion letter.
/// Carries no piece identity; bind it to a board with [`MoveToken::to_move`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveToken {
    pub from: Coord,
    pub to: Coord,
    pub promotion: Option<PieceKind>,
}

impl MoveToken {
    pub fn new(from: Coord, to: Coord, promotion: Option<PieceKind>) -> Self {
        Self {
            from,
            to,
            promotion,
        }
    }

    /// Resolve against the piece standing on `from`.
    pub fn to_move(&self, board: &Board) -> Option<Move> {
        Move::on_board(board, self.from, self.to).map(|mv| mv.with_promotion(self.promotion))
    }
}

impl From<&Move> for MoveToken {
    fn from(mv: &Move) -> Self {
        Self::new(mv.from, mv.to, mv.promotion)
    }
}

impl std::fmt::Display for MoveToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(kind) = self.promotion {
            write!(f, "{}", kind.to_char_lower())?;
        }
        Ok(())
    }
}

impl FromStr for MoveToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_move_token(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid move token: {0}")]
    InvalidLength(String),
    #[error("Invalid square in move token: {0}")]
    InvalidSquare(String),
    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),
}

/// Parse `e2e4` / `e7e8q`. Only `q`, `r`, `b` and `n` are accepted as
/// promotion letters.
pub fn parse_move_token(s: &str) -> Result<MoveToken, TokenError> {
    if !s.is_ascii() || !(4..=5).contains(&s.len()) {
        return Err(TokenError::InvalidLength(s.to_string()));
    }

    let square = |part: &str| {
        part.parse::<Coord>()
            .map_err(|_| TokenError::InvalidSquare(s.to_string()))
    };
    let from = square(&s[0..2])?;
    let to = square(&s[2..4])?;

    let promotion = match s[4..].chars().next() {
        None => None,
        Some(c) => Some(
            PieceKind::from_char(c)
                .filter(|k| k.is_promotion_target() && c.is_ascii_lowercase())
                .ok_or_else(|| TokenError::InvalidPromotion(s.to_string()))?,
        ),
    };

    Ok(MoveToken::new(from, to, promotion))
}

pub fn format_move_token(mv: &Move) -> String {
    MoveToken::from(mv).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_promotion() {
        let token = parse_move_token("e2e4").unwrap();
        assert_eq!(token.from, Coord::new(4, 1));
        assert_eq!(token.to, Coord::new(4, 3));
        assert!(token.promotion.is_none());

        let token: MoveToken = "e7e8q".parse().unwrap();
        assert_eq!(token.promotion, Some(PieceKind::Queen));
        assert_eq!(token.to_string(), "e7e8q");
        assert_eq!(parse_move_token("a2a1n").unwrap().promotion, Some(PieceKind::Knight));
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        assert!(matches!(parse_move_token("e2"), Err(TokenError::InvalidLength(_))));
        assert!(matches!(parse_move_token("e2e4qq"), Err(TokenError::InvalidLength(_))));
        assert!(matches!(parse_move_token("e0e4"), Err(TokenError::InvalidSquare(_))));
        assert!(matches!(parse_move_token("e7e8k"), Err(TokenError::InvalidPromotion(_))));
        assert!(matches!(parse_move_token("e7e8x"), Err(TokenError::InvalidPromotion(_))));
        assert!(matches!(parse_move_token("e7e8Q"), Err(TokenError::InvalidPromotion(_))));
        assert!(parse_move_token("(none)").is_err());
    }

    #[test]
    fn test_format_from_move() {
        let board = Board::standard();
        let mv = Move::on_board(&board, Coord::new(6, 0), Coord::new(5, 2)).unwrap();
        assert_eq!(format_move_token(&mv), "g1f3");
        let promo = mv.with_promotion(Some(PieceKind::Rook));
        assert_eq!(format_move_token(&promo), "g1f3r");
    }

    #[test]
    fn test_to_move_binds_piece() {
        let board = Board::standard();
        let token = parse_move_token("b8c6").unwrap();
        let mv = token.to_move(&board).unwrap();
        assert_eq!(mv.kind, PieceKind::Knight);
        assert!(parse_move_token("e4e5").unwrap().to_move(&board).is_none());
    }
}
