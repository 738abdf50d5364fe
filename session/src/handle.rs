use chess::{Coord, MoveToken, PieceColor, PieceKind, SideController};
use engine::EngineConfig;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::commands::{Navigation, SessionCommand, SessionError};
use crate::events::SessionEvent;
use crate::snapshot::SessionSnapshot;

/// Cheap, cloneable handle to a session actor.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub(crate) fn new(cmd_tx: mpsc::Sender<SessionCommand>) -> Self {
        Self { cmd_tx }
    }

    pub async fn select(&self, square: Coord) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Select { square, reply: tx }).await?;
        flatten(rx.await)
    }

    pub async fn request_move(&self, token: MoveToken) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::RequestMove { token, reply: tx })
            .await?;
        flatten(rx.await)
    }

    pub async fn choose_promotion(&self, kind: PieceKind) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::ChoosePromotion { kind, reply: tx })
            .await?;
        flatten(rx.await)
    }

    pub async fn new_game(&self) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::NewGame { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn navigate(&self, navigation: Navigation) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Navigate {
            navigation,
            reply: tx,
        })
        .await?;
        flatten(rx.await)
    }

    /// Make the current move the main continuation of its parent.
    pub async fn promote_variation(&self) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::PromoteVariation { reply: tx })
            .await?;
        flatten(rx.await)
    }

    /// Record an alternative to the current move and step into it.
    pub async fn add_variation(&self, token: MoveToken) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::AddVariation { token, reply: tx })
            .await?;
        flatten(rx.await)
    }

    pub async fn set_comment(&self, text: impl Into<String>) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::SetComment {
            text: text.into(),
            reply: tx,
        })
        .await?;
        flatten(rx.await)
    }

    pub async fn set_controller(
        &self,
        color: PieceColor,
        controller: SideController,
    ) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::SetController {
            color,
            controller,
            reply: tx,
        })
        .await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn configure_engine(&self, config: EngineConfig) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::ConfigureEngine { config, reply: tx })
            .await?;
        flatten(rx.await)
    }

    pub async fn set_engine_elo(&self, elo: u32) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::SetEngineElo { elo, reply: tx })
            .await?;
        flatten(rx.await)
    }

    /// Abandon the outstanding engine search and hand its side to the human.
    pub async fn cancel_engine(&self) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::CancelEngine { reply: tx }).await?;
        flatten(rx.await)
    }

    pub async fn get_snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::GetSnapshot { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn subscribe(
        &self,
    ) -> Result<(SessionSnapshot, broadcast::Receiver<SessionEvent>), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Subscribe { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Shutdown).await;
    }

    async fn send(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SessionError::Internal("Session actor closed".into()))
    }
}

fn flatten<T>(
    reply: Result<Result<T, SessionError>, oneshot::error::RecvError>,
) -> Result<T, SessionError> {
    reply.map_err(|_| SessionError::Internal("Reply dropped".into()))?
}
