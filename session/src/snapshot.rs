use chess::{Controllers, GamePhase, GameStatus, PieceColor};
use serde::Serialize;

/// Complete, immutable snapshot of session state.
/// Sent to subscribers on every state change and on subscribe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub fen: String,
    pub side_to_move: PieceColor,
    pub phase: GamePhase,
    pub status: GameStatus,
    /// Full-move number of the position, starting at 1.
    pub move_number: u32,
    /// Half-moves from the start to the current node.
    pub ply: usize,
    pub last_move: Option<String>,
    pub notation: String,
    pub selected: Option<String>,
    pub legal_targets: Vec<String>,
    pub material: String,
    pub board: String,
    pub controllers: Controllers,
    pub engine_thinking: bool,
    /// Depth and score the engine reported for its last move.
    pub engine_eval: Option<String>,
}
