//! The game controller: owns the live board and the move tree and decides
//! who may move next.

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::coord::Coord;
use crate::executor;
use crate::fen::FenError;
use crate::legality::{self, CheckPolicy, GameStatus};
use crate::moves::Move;
use crate::tree::GameTree;
use crate::types::{PieceColor, PieceKind};
use crate::uci::{MoveToken, TokenError};

/// Who produces the moves for one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SideController {
    #[default]
    Human,
    Engine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Controllers {
    pub white: SideController,
    pub black: SideController,
}

impl Controllers {
    pub fn new(white: SideController, black: SideController) -> Self {
        Self { white, black }
    }

    pub fn get(&self, color: PieceColor) -> SideController {
        match color {
            PieceColor::White => self.white,
            PieceColor::Black => self.black,
        }
    }

    pub fn set(&mut self, color: PieceColor, controller: SideController) {
        match color {
            PieceColor::White => self.white = controller,
            PieceColor::Black => self.black = controller,
        }
    }

    pub fn any_engine(&self) -> bool {
        self.white == SideController::Engine || self.black == SideController::Engine
    }
}

/// What the game is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// The game is over; nothing is accepted until a new game starts.
    Idle,
    AwaitingHumanInput,
    AwaitingEngineMove,
    /// A human pawn reached the last rank and the kind is still open.
    AwaitingPromotionChoice,
}

#[derive(Debug, Clone, Copy)]
struct PendingPromotion {
    mv: Move,
}

#[derive(Debug, Clone)]
pub struct Game {
    board: Board,
    tree: GameTree,
    controllers: Controllers,
    phase: GamePhase,
    selected: Option<Coord>,
    pending_promotion: Option<PendingPromotion>,
    engine_turn: bool,
}

impl Default for Game {
    fn default() -> Self {
        Self::new(Controllers::default())
    }
}

impl Game {
    /// A new game from the standard starting position.
    pub fn new(controllers: Controllers) -> Self {
        Self::from_position(Board::standard(), controllers)
    }

    pub fn from_position(start: Board, controllers: Controllers) -> Self {
        let mut game = Self {
            board: start.clone_independent(),
            tree: GameTree::from_position(start),
            controllers,
            phase: GamePhase::Idle,
            selected: None,
            pending_promotion: None,
            engine_turn: false,
        };
        game.refresh_phase();
        game
    }

    /// Create a game from a FEN string
    pub fn from_fen(fen: &str, controllers: Controllers) -> Result<Self, GameError> {
        Ok(Self::from_position(crate::fen::parse_fen(fen)?, controllers))
    }

    /// Throw away the move tree and start over from the starting position.
    pub fn new_game(&mut self) {
        self.tree.new_game();
        self.sync_board();
        tracing::info!("New game started");
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn status(&self) -> GameStatus {
        legality::status(&self.board)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Snapshot of the live board.
    pub fn current_board(&self) -> Board {
        self.board.clone_independent()
    }

    pub fn tree(&self) -> &GameTree {
        &self.tree
    }

    pub fn controllers(&self) -> Controllers {
        self.controllers
    }

    pub fn side_to_move(&self) -> PieceColor {
        self.board.side_to_move()
    }

    pub fn selected(&self) -> Option<Coord> {
        self.selected
    }

    /// True while an engine search for the live position is outstanding.
    pub fn engine_turn_outstanding(&self) -> bool {
        self.engine_turn
    }

    pub fn move_history_notation(&self) -> String {
        self.tree.export_notation()
    }

    /// Select the piece on `coord` for a human move. Only pieces of the side
    /// to move can be selected; anything else clears the selection.
    pub fn select(&mut self, coord: Coord) -> bool {
        let side = self.board.side_to_move();
        let selectable = self.phase == GamePhase::AwaitingHumanInput
            && self.board.get(coord).is_some_and(|p| p.color == side);
        self.selected = selectable.then_some(coord);
        selectable
    }

    /// Distinct destination squares of the piece on `from`.
    pub fn legal_targets(&self, from: Coord) -> Vec<Coord> {
        let mut targets: Vec<Coord> = legality::legal_moves_from(&self.board, from)
            .into_iter()
            .map(|mv| mv.to)
            .collect();
        targets.dedup();
        targets
    }

    /// Submit a human move. Returns whether it was accepted.
    pub fn request_move(&mut self, from: Coord, to: Coord) -> bool {
        self.request_move_with(from, to, None)
    }

    /// Submit a human move with an optional promotion kind. Without a kind, a
    /// pawn reaching the last rank leaves the game awaiting the choice.
    pub fn request_move_with(&mut self, from: Coord, to: Coord, promotion: Option<PieceKind>) -> bool {
        if self.phase != GamePhase::AwaitingHumanInput {
            tracing::debug!("Rejecting {}{}: game is {:?}", from, to, self.phase);
            return false;
        }
        let Some(mv) = Move::on_board(&self.board, from, to) else {
            return false;
        };
        let mv = mv.with_promotion(promotion);
        if !self.accepts(&mv) {
            tracing::debug!("Rejecting illegal move {}", mv);
            return false;
        }

        let effects = executor::apply(&mut self.board, &mv);
        self.selected = None;
        if effects.promotion_pending {
            self.pending_promotion = Some(PendingPromotion { mv });
            self.phase = GamePhase::AwaitingPromotionChoice;
        } else {
            self.record(mv);
        }
        true
    }

    /// Resolve a pending human promotion.
    pub fn choose_promotion(&mut self, kind: PieceKind) -> Result<(), GameError> {
        let Some(pending) = self.pending_promotion else {
            return Err(GameError::NoPendingPromotion);
        };
        if !kind.is_promotion_target() {
            return Err(GameError::InvalidPromotion(kind));
        }
        executor::promote(&mut self.board, pending.mv.to, kind)
            .map_err(|_| GameError::InvalidPromotion(kind))?;
        self.pending_promotion = None;
        self.record(pending.mv.with_promotion(Some(kind)));
        Ok(())
    }

    /// Mark an engine search as outstanding and hand out the position to
    /// search. No moves are accepted until the turn completes or is aborted.
    pub fn begin_engine_turn(&mut self) -> Result<Board, GameError> {
        if self.phase != GamePhase::AwaitingEngineMove || self.engine_turn {
            return Err(GameError::WrongPhase(self.phase));
        }
        self.engine_turn = true;
        Ok(self.current_board())
    }

    /// Play the engine's answer for the outstanding turn. A missing promotion
    /// kind defaults to a queen.
    pub fn complete_engine_move(&mut self, token: MoveToken) -> Result<(), GameError> {
        if self.phase != GamePhase::AwaitingEngineMove || !self.engine_turn {
            return Err(GameError::WrongPhase(self.phase));
        }
        self.engine_turn = false;

        let mut mv = token
            .to_move(&self.board)
            .ok_or_else(|| GameError::IllegalMove(token.to_string()))?;
        if mv.promotion.is_none() && mv.is_promotion(&self.board) {
            mv.promotion = Some(PieceKind::Queen);
        }
        if !self.accepts(&mv) {
            return Err(GameError::IllegalMove(token.to_string()));
        }

        executor::apply(&mut self.board, &mv);
        self.record(mv);
        Ok(())
    }

    /// Forget the outstanding engine turn. A late answer is rejected.
    pub fn abort_engine_turn(&mut self) {
        if self.engine_turn {
            tracing::debug!("Engine turn aborted");
        }
        self.engine_turn = false;
    }

    pub fn set_controller(&mut self, color: PieceColor, controller: SideController) {
        self.controllers.set(color, controller);
        if controller == SideController::Human && self.board.side_to_move() == color {
            self.engine_turn = false;
        }
        self.refresh_phase();
    }

    /// Step forward into continuation `variation` of the current position.
    pub fn advance(&mut self, variation: usize) -> bool {
        self.navigate(|tree| tree.advance(variation))
    }

    pub fn retreat(&mut self) -> bool {
        self.navigate(GameTree::retreat)
    }

    pub fn return_to_last_branch(&mut self) -> bool {
        self.navigate(GameTree::return_to_last_branch)
    }

    pub fn goto_half_move(&mut self, n: usize) -> bool {
        self.navigate(|tree| tree.goto_half_move(n))
    }

    pub fn promote_current(&mut self) -> bool {
        self.navigate(GameTree::promote_current)
    }

    /// Record `from -> to` as an alternative to the current move and step
    /// into it. A promotion without a kind becomes a queen.
    pub fn add_variation(&mut self, from: Coord, to: Coord, promotion: Option<PieceKind>) -> bool {
        if self.is_locked() {
            return false;
        }
        let Some(parent) = self.tree.node(self.tree.current()).parent() else {
            return false;
        };
        let before = self.tree.position_at(parent);
        let Some(mv) = Move::on_board(&before, from, to) else {
            return false;
        };
        let mut mv = mv.with_promotion(promotion);
        if mv.promotion.is_none() && mv.is_promotion(&before) {
            mv.promotion = Some(PieceKind::Queen);
        }
        if mv.color != before.side_to_move() || !legality::is_legal(&before, &mv, CheckPolicy::Enforce) {
            return false;
        }
        self.navigate(|tree| tree.add_variation(mv).is_some())
    }

    /// Annotate the current move. Refused while a move is in progress.
    pub fn set_comment(&mut self, text: impl Into<String>) -> bool {
        if self.is_locked() {
            return false;
        }
        self.tree.set_comment(text);
        true
    }

    fn is_locked(&self) -> bool {
        self.engine_turn || self.pending_promotion.is_some()
    }

    fn navigate(&mut self, step: impl FnOnce(&mut GameTree) -> bool) -> bool {
        if self.is_locked() {
            tracing::debug!("Navigation refused while a move is in progress");
            return false;
        }
        if !step(&mut self.tree) {
            return false;
        }
        self.sync_board();
        true
    }

    fn accepts(&self, mv: &Move) -> bool {
        mv.color == self.board.side_to_move()
            && legality::is_legal(&self.board, mv, CheckPolicy::Enforce)
    }

    /// Store a move already applied to the live board. Replaying a move that
    /// the tree already holds steps into the existing node.
    fn record(&mut self, mv: Move) {
        let existing = self
            .tree
            .node(self.tree.current())
            .children()
            .iter()
            .position(|id| {
                self.tree
                    .node(*id)
                    .mv()
                    .is_some_and(|m| MoveToken::from(m) == MoveToken::from(&mv))
            });
        match existing {
            Some(index) => {
                self.tree.advance(index);
            }
            None => {
                self.tree.add_move(mv);
            }
        }
        tracing::debug!("Recorded {} (ply {})", mv, self.tree.current_ply());
        self.refresh_phase();
    }

    fn sync_board(&mut self) {
        self.board = self.tree.current_position();
        self.selected = None;
        self.pending_promotion = None;
        self.engine_turn = false;
        self.refresh_phase();
    }

    fn refresh_phase(&mut self) {
        self.phase = if self.pending_promotion.is_some() {
            GamePhase::AwaitingPromotionChoice
        } else if self.status().is_over() {
            GamePhase::Idle
        } else {
            match self.controllers.get(self.board.side_to_move()) {
                SideController::Human => GamePhase::AwaitingHumanInput,
                SideController::Engine => GamePhase::AwaitingEngineMove,
            }
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Illegal move: {0}")]
    IllegalMove(String),
    #[error("Not possible while the game is {0:?}")]
    WrongPhase(GamePhase),
    #[error("No promotion is pending")]
    NoPendingPromotion,
    #[error("Cannot promote to {0:?}")]
    InvalidPromotion(PieceKind),
    #[error("Invalid move token: {0}")]
    Token(#[from] TokenError),
    #[error("FEN parse error: {0}")]
    Fen(#[from] FenError),
}
