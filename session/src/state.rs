use std::time::Duration;

use chess::{format_fen, Board, Coord, Game, GamePhase, PieceColor, SideController};
use engine::{EngineConfig, EngineError, SearchTask, UciEngine};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::commands::SessionError;
use crate::snapshot::SessionSnapshot;

/// An engine process being started on its own task.
pub(crate) struct EngineStartup {
    handle: JoinHandle<Result<UciEngine, EngineError>>,
    /// Position to search once the engine is up. Cleared when the turn is
    /// dropped in the meantime.
    pub search_board: Option<Board>,
    /// Pending answer to the `ConfigureEngine` that started it.
    pub reply: Option<oneshot::Sender<Result<(), SessionError>>>,
}

impl EngineStartup {
    pub fn spawn(config: EngineConfig) -> Self {
        Self {
            handle: tokio::spawn(UciEngine::spawn(config)),
            search_board: None,
            reply: None,
        }
    }

    /// Wait for the handshake to finish. Must not be polled again once it
    /// has returned.
    pub async fn wait(&mut self) -> Result<UciEngine, EngineError> {
        match (&mut self.handle).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Engine startup task failed: {}", e);
                Err(EngineError::Terminated)
            }
        }
    }

    /// Give up on the startup. The half-started process is killed with the task.
    pub fn abort(self) {
        if let Some(reply) = self.reply {
            let _ = reply.send(Err(SessionError::Engine(
                "superseded before the engine was ready".to_string(),
            )));
        }
        self.handle.abort();
    }
}

/// Internal mutable state, owned entirely by the session actor. No locks.
pub(crate) struct SessionState {
    pub game: Game,
    pub engine: Option<UciEngine>,
    /// Used for the next spawn; `None` means defaults with path discovery.
    pub engine_config: Option<EngineConfig>,
    /// The in-flight search. It owns the engine until it finishes.
    pub search: Option<SearchTask>,
    /// An engine still completing its handshake.
    pub startup: Option<EngineStartup>,
    pub search_budget: Duration,
    /// Options to send before the next search, set while the engine was busy.
    pub pending_options: Vec<(String, String)>,
    /// Last evaluation behind an engine move.
    pub engine_eval: Option<String>,
}

impl SessionState {
    pub fn new(game: Game, engine_config: Option<EngineConfig>, search_budget: Duration) -> Self {
        Self {
            game,
            engine: None,
            engine_config,
            search: None,
            startup: None,
            search_budget,
            pending_options: Vec::new(),
            engine_eval: None,
        }
    }

    /// Build a full snapshot of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        let board = self.game.board();
        let selected = self.game.selected();
        let legal_targets = selected
            .map(|from| self.game.legal_targets(from))
            .unwrap_or_default();

        SessionSnapshot {
            fen: format_fen(board),
            side_to_move: board.side_to_move(),
            phase: self.game.phase(),
            status: self.game.status(),
            move_number: board.move_number().div_ceil(2),
            ply: self.game.tree().current_ply(),
            last_move: self.game.tree().current_move().map(|mv| mv.notation()),
            notation: self.game.move_history_notation(),
            selected: selected.map(|c| c.to_string()),
            legal_targets: legal_targets.iter().map(Coord::to_string).collect(),
            material: board.material().to_string(),
            board: board.to_string(),
            controllers: self.game.controllers(),
            engine_thinking: self.engine_thinking(),
            engine_eval: self.engine_eval.clone(),
        }
    }

    pub fn engine_thinking(&self) -> bool {
        self.game.engine_turn_outstanding() && (self.search_running() || self.startup_searching())
    }

    fn search_running(&self) -> bool {
        self.search.as_ref().is_some_and(|task| !task.is_cancelled())
    }

    fn startup_searching(&self) -> bool {
        self.startup
            .as_ref()
            .is_some_and(|startup| startup.search_board.is_some())
    }

    /// True while option changes cannot reach the engine directly.
    pub fn engine_busy(&self) -> bool {
        self.search.is_some() || self.startup.is_some()
    }

    pub fn should_auto_trigger_engine(&self) -> bool {
        self.game.phase() == GamePhase::AwaitingEngineMove
            && !self.game.engine_turn_outstanding()
            && self.search.is_none()
    }

    /// Begin the engine's turn. The search starts right away when an engine
    /// is idle; otherwise it is handed to the startup task, which is spawned
    /// if none is running yet.
    pub async fn trigger_engine(&mut self) -> Result<(), EngineError> {
        let board = match self.game.begin_engine_turn() {
            Ok(board) => board,
            Err(e) => {
                tracing::warn!("Engine turn not started: {}", e);
                return Ok(());
            }
        };

        if let Some(engine) = self.engine.take() {
            return self.start_search(engine, board).await;
        }
        if let Some(startup) = self.startup.as_mut() {
            tracing::debug!("Engine still starting, search queued");
            startup.search_board = Some(board);
            return Ok(());
        }

        let config = self
            .engine_config
            .get_or_insert_with(EngineConfig::default)
            .clone();
        tracing::info!("Starting engine to move for {}", board.side_to_move());
        self.pending_options.clear();
        let mut startup = EngineStartup::spawn(config);
        startup.search_board = Some(board);
        self.startup = Some(startup);
        Ok(())
    }

    /// Send queued options, then search `board` on a background task.
    pub async fn start_search(&mut self, mut engine: UciEngine, board: Board) -> Result<(), EngineError> {
        self.flush_options(&mut engine).await?;
        tracing::info!("Engine thinking for {}", board.side_to_move());
        self.search = Some(SearchTask::spawn(engine, board, self.search_budget));
        Ok(())
    }

    pub async fn flush_options(&mut self, engine: &mut UciEngine) -> Result<(), EngineError> {
        for (name, value) in std::mem::take(&mut self.pending_options) {
            engine.set_option(&name, value).await?;
        }
        Ok(())
    }

    /// Drop the outstanding engine turn. A running search keeps going until
    /// the engine answers `stop`, and its move is discarded. A starting
    /// engine is kept but will not search.
    pub fn cancel_search(&mut self) {
        if let Some(task) = &self.search {
            task.cancel();
        }
        if let Some(startup) = self.startup.as_mut() {
            startup.search_board = None;
        }
        self.game.abort_engine_turn();
    }

    /// Cancel a running search whose turn the game no longer waits for.
    pub fn reconcile_search(&mut self) {
        let stale = (self.search_running() || self.startup_searching())
            && !self.game.engine_turn_outstanding();
        if stale {
            tracing::debug!("Search no longer wanted, cancelling");
            self.cancel_search();
        }
    }

    /// Hand every engine-controlled side back to the human.
    pub fn disable_engine_control(&mut self) {
        for color in [PieceColor::White, PieceColor::Black] {
            if self.game.controllers().get(color) == SideController::Engine {
                self.game.set_controller(color, SideController::Human);
            }
        }
    }

    /// Let go of the engine without waiting for it to quit. Any turn it was
    /// playing is dropped.
    pub fn release_engine(&mut self) {
        if let Some(task) = self.search.take() {
            task.abort();
        }
        if let Some(startup) = self.startup.take() {
            startup.abort();
        }
        self.game.abort_engine_turn();
        if let Some(engine) = self.engine.take() {
            tokio::spawn(engine.shutdown());
        }
    }

    /// Stop the engine for good, killing a running search.
    pub async fn shutdown_engine(&mut self) {
        if let Some(task) = self.search.take() {
            task.abort();
        }
        if let Some(startup) = self.startup.take() {
            startup.abort();
        }
        self.game.abort_engine_turn();
        if let Some(engine) = self.engine.take() {
            engine.shutdown().await;
        }
    }
}
