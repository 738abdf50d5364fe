use crate::{EngineError, StopHandle, UciEngine};
use chess::{Board, MoveToken};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};

/// How a background search ended.
#[derive(Debug)]
pub enum SearchOutcome {
    Found(MoveToken),
    /// The search was cancelled; any move it produced is discarded.
    Cancelled,
    Failed(EngineError),
}

/// A search running on its own task.
///
/// The engine is moved into the task and handed back when it finishes, so
/// at most one search can be outstanding per engine.
pub struct SearchTask {
    handle: JoinHandle<(UciEngine, Result<MoveToken, EngineError>)>,
    cancelled: Arc<AtomicBool>,
    stop: StopHandle,
}

impl SearchTask {
    pub fn spawn(mut engine: UciEngine, board: Board, budget: Duration) -> Self {
        let stop = engine.stop_handle();
        let handle = tokio::spawn(async move {
            let result = engine.search(&board, budget).await;
            (engine, result)
        });
        Self {
            handle,
            cancelled: Arc::new(AtomicBool::new(false)),
            stop,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Mark the search cancelled and ask the engine to stop early.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            tracing::debug!("Cancelling engine search");
            if !self.stop.stop() {
                tracing::warn!("Could not deliver stop to engine");
            }
        }
    }

    /// Wait for the task to finish. Must not be polled again once it has
    /// returned; drop the task instead.
    pub async fn wait(&mut self) -> (Option<UciEngine>, SearchOutcome) {
        let joined = (&mut self.handle).await;
        self.finish(joined)
    }

    pub async fn join(mut self) -> (Option<UciEngine>, SearchOutcome) {
        self.wait().await
    }

    /// Abandon the search without waiting. The engine is dropped with the
    /// task, which kills its process.
    pub fn abort(self) {
        self.cancel();
        self.handle.abort();
    }

    fn finish(
        &self,
        joined: Result<(UciEngine, Result<MoveToken, EngineError>), JoinError>,
    ) -> (Option<UciEngine>, SearchOutcome) {
        let (engine, result) = match joined {
            Ok(done) => done,
            Err(e) => {
                tracing::error!("Search task failed: {}", e);
                return (None, SearchOutcome::Failed(EngineError::Terminated));
            }
        };

        let keep = match &result {
            Err(e) if e.is_fatal() => None,
            _ => Some(engine),
        };
        let outcome = match result {
            _ if self.is_cancelled() => SearchOutcome::Cancelled,
            Ok(mv) => SearchOutcome::Found(mv),
            Err(e) => SearchOutcome::Failed(e),
        };
        (keep, outcome)
    }
}
