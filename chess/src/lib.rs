pub mod board;
pub mod coord;
pub mod executor;
pub mod fen;
pub mod game;
pub mod legality;
pub mod movegen;
pub mod moves;
pub mod tree;
pub mod types;
pub mod uci;

pub use board::{Board, MaterialCount};
pub use coord::{Coord, CoordParseError};
pub use executor::{ExecuteError, MoveEffects};
pub use fen::{format_fen, parse_fen, FenError};
pub use game::{Controllers, Game, GameError, GamePhase, SideController};
pub use legality::{CheckPolicy, GameStatus};
pub use moves::Move;
pub use tree::{BranchRecord, GameTree, MoveNode, NodeId};
pub use types::{Piece, PieceColor, PieceKind};
pub use uci::{format_move_token, parse_move_token, MoveToken, TokenError};
