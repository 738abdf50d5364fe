use chess::{Coord, GameError, GamePhase, MoveToken, PieceColor, PieceKind, SideController};
use engine::EngineConfig;
use tokio::sync::{broadcast, oneshot};

use crate::events::SessionEvent;
use crate::snapshot::SessionSnapshot;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("Illegal move: {0}")]
    IllegalMove(String),
    #[error("Nothing to select on {0}")]
    NotSelectable(Coord),
    #[error("Not allowed while the game is {0:?}")]
    WrongPhase(GamePhase),
    #[error("Cannot navigate: {0}")]
    Navigation(String),
    #[error("No engine search to cancel")]
    NothingToCancel,
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("Engine error: {0}")]
    Engine(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Moves through the game tree without changing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Step into continuation `n` of the current position (0 is the main line).
    Advance(usize),
    Retreat,
    /// Jump back to the most recent position where a side line was entered.
    ReturnToBranch,
    /// Jump to ply `n` of the main line.
    GotoHalfMove(usize),
}

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Commands sent to the session actor. Each embeds a oneshot for the reply.
/// Engine turns are started by the actor itself.
pub enum SessionCommand {
    Select {
        square: Coord,
        reply: Reply<SessionSnapshot>,
    },
    RequestMove {
        token: MoveToken,
        reply: Reply<SessionSnapshot>,
    },
    ChoosePromotion {
        kind: PieceKind,
        reply: Reply<SessionSnapshot>,
    },
    NewGame {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Navigate {
        navigation: Navigation,
        reply: Reply<SessionSnapshot>,
    },
    PromoteVariation {
        reply: Reply<SessionSnapshot>,
    },
    AddVariation {
        token: MoveToken,
        reply: Reply<SessionSnapshot>,
    },
    SetComment {
        text: String,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    SetController {
        color: PieceColor,
        controller: SideController,
        reply: oneshot::Sender<SessionSnapshot>,
    },
    ConfigureEngine {
        config: EngineConfig,
        reply: Reply<()>,
    },
    SetEngineElo {
        elo: u32,
        reply: Reply<()>,
    },
    CancelEngine {
        reply: Reply<SessionSnapshot>,
    },
    GetSnapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Subscribe {
        reply: oneshot::Sender<(SessionSnapshot, broadcast::Receiver<SessionEvent>)>,
    },
    Shutdown,
}
