//! A single game session run as an actor task.
//!
//! The actor owns the [`chess::Game`] and the engine process. Callers talk to
//! it through a [`SessionHandle`] and observe it through broadcast
//! [`SessionEvent`]s.

mod actor;
pub mod commands;
pub mod events;
pub mod handle;
pub mod snapshot;
mod state;

use std::time::Duration;

use chess::{Controllers, Game};
use engine::EngineConfig;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use actor::run_session_actor;
pub use commands::{Navigation, SessionError};
pub use events::SessionEvent;
pub use handle::SessionHandle;
pub use snapshot::SessionSnapshot;
use state::SessionState;

/// Budget given to the engine for each move unless configured otherwise.
pub const DEFAULT_SEARCH_BUDGET: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub controllers: Controllers,
    /// Start from this position instead of the standard one.
    pub start_fen: Option<String>,
    /// Engine settings used when an engine side first needs a move.
    pub engine: Option<EngineConfig>,
    pub search_budget: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            controllers: Controllers::default(),
            start_fen: None,
            engine: None,
            search_budget: DEFAULT_SEARCH_BUDGET,
        }
    }
}

/// Start a session actor. The returned task finishes after
/// [`SessionHandle::shutdown`] or once every handle is dropped.
pub fn spawn_session(config: SessionConfig) -> Result<(SessionHandle, JoinHandle<()>), SessionError> {
    let game = match config.start_fen.as_deref() {
        Some(fen) => Game::from_fen(fen, config.controllers)?,
        None => Game::new(config.controllers),
    };

    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (event_tx, _) = broadcast::channel(100);
    let state = SessionState::new(game, config.engine, config.search_budget);
    let task = tokio::spawn(run_session_actor(state, cmd_rx, event_tx));
    tracing::info!("Session spawned");
    Ok((SessionHandle::new(cmd_tx), task))
}
