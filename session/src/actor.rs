use chess::{GamePhase, SideController};
use engine::{EngineConfig, EngineError, SearchOutcome, SearchTask, UciEngine};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::Instrument;

use crate::commands::{Navigation, SessionCommand, SessionError};
use crate::events::SessionEvent;
use crate::snapshot::SessionSnapshot;
use crate::state::{EngineStartup, SessionState};

/// The main session actor loop.
/// Owns all mutable state. Processes commands, engine startups and search
/// results sequentially.
pub(crate) async fn run_session_actor(
    state: SessionState,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    run_session_actor_inner(state, cmd_rx, event_tx)
        .instrument(tracing::info_span!("session"))
        .await;
}

async fn run_session_actor_inner(
    mut state: SessionState,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    tracing::info!("Session actor started");

    // An engine may be to move in the starting position
    maybe_auto_trigger(&mut state, &event_tx).await;

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Shutdown) | None => {
                        tracing::info!("Session actor shutting down");
                        state.shutdown_engine().await;
                        break;
                    }
                    Some(cmd) => handle_command(&mut state, cmd, &event_tx).await,
                }
            }

            (engine, outcome) = next_search_result(&mut state.search) => {
                state.search = None;
                handle_search_outcome(&mut state, engine, outcome, &event_tx).await;
            }

            result = next_startup_result(&mut state.startup) => {
                if let Some(startup) = state.startup.take() {
                    handle_startup_result(&mut state, startup, result, &event_tx).await;
                }
            }
        }
    }

    tracing::info!("Session actor exited");
}

async fn next_search_result(
    search: &mut Option<SearchTask>,
) -> (Option<UciEngine>, SearchOutcome) {
    match search.as_mut() {
        Some(task) => task.wait().await,
        None => std::future::pending().await,
    }
}

async fn next_startup_result(
    startup: &mut Option<EngineStartup>,
) -> Result<UciEngine, EngineError> {
    match startup.as_mut() {
        Some(startup) => startup.wait().await,
        None => std::future::pending().await,
    }
}

async fn handle_command(
    state: &mut SessionState,
    cmd: SessionCommand,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    match cmd {
        SessionCommand::Select { square, reply } => {
            let result = match state.game.phase() {
                GamePhase::AwaitingHumanInput if state.game.select(square) => Ok(()),
                GamePhase::AwaitingHumanInput => Err(SessionError::NotSelectable(square)),
                phase => Err(SessionError::WrongPhase(phase)),
            };
            let _ = reply.send(publish(state, result, event_tx));
        }
        SessionCommand::RequestMove { token, reply } => {
            let result = match state.game.phase() {
                GamePhase::AwaitingHumanInput => {
                    if state
                        .game
                        .request_move_with(token.from, token.to, token.promotion)
                    {
                        Ok(())
                    } else {
                        Err(SessionError::IllegalMove(token.to_string()))
                    }
                }
                phase => Err(SessionError::WrongPhase(phase)),
            };
            let _ = reply.send(publish(state, result, event_tx));
            maybe_auto_trigger(state, event_tx).await;
        }
        SessionCommand::ChoosePromotion { kind, reply } => {
            let result = state.game.choose_promotion(kind).map_err(SessionError::from);
            let _ = reply.send(publish(state, result, event_tx));
            maybe_auto_trigger(state, event_tx).await;
        }
        SessionCommand::NewGame { reply } => {
            state.game.new_game();
            state.engine_eval = None;
            let snapshot = publish(state, Ok(()), event_tx);
            if let Ok(snapshot) = snapshot {
                let _ = reply.send(snapshot);
            }
            maybe_auto_trigger(state, event_tx).await;
        }
        SessionCommand::Navigate { navigation, reply } => {
            let result = ensure_unlocked(state).and_then(|()| {
                let moved = match navigation {
                    Navigation::Advance(n) => state.game.advance(n),
                    Navigation::Retreat => state.game.retreat(),
                    Navigation::ReturnToBranch => state.game.return_to_last_branch(),
                    Navigation::GotoHalfMove(n) => state.game.goto_half_move(n),
                };
                if moved {
                    Ok(())
                } else {
                    Err(SessionError::Navigation(format!(
                        "{:?} is not possible from here",
                        navigation
                    )))
                }
            });
            let _ = reply.send(publish(state, result, event_tx));
            maybe_auto_trigger(state, event_tx).await;
        }
        SessionCommand::PromoteVariation { reply } => {
            let result = ensure_unlocked(state).and_then(|()| {
                if state.game.promote_current() {
                    Ok(())
                } else {
                    Err(SessionError::Navigation(
                        "current move is already the main continuation".to_string(),
                    ))
                }
            });
            let _ = reply.send(publish(state, result, event_tx));
        }
        SessionCommand::AddVariation { token, reply } => {
            let result = ensure_unlocked(state).and_then(|()| {
                if state
                    .game
                    .add_variation(token.from, token.to, token.promotion)
                {
                    Ok(())
                } else {
                    Err(SessionError::IllegalMove(token.to_string()))
                }
            });
            let _ = reply.send(publish(state, result, event_tx));
            maybe_auto_trigger(state, event_tx).await;
        }
        SessionCommand::SetComment { text, reply } => {
            let result = ensure_unlocked(state).and_then(|()| {
                if state.game.set_comment(text) {
                    Ok(())
                } else {
                    Err(SessionError::WrongPhase(state.game.phase()))
                }
            });
            let _ = reply.send(publish(state, result, event_tx));
        }
        SessionCommand::SetController {
            color,
            controller,
            reply,
        } => {
            tracing::info!("{} is now played by {:?}", color, controller);
            state.game.set_controller(color, controller);
            if let Ok(snapshot) = publish(state, Ok(()), event_tx) {
                let _ = reply.send(snapshot);
            }
            maybe_auto_trigger(state, event_tx).await;
        }
        SessionCommand::ConfigureEngine { config, reply } => {
            configure_engine(state, config, reply);
            maybe_auto_trigger(state, event_tx).await;
        }
        SessionCommand::SetEngineElo { elo, reply } => {
            let _ = reply.send(set_engine_elo(state, elo).await);
        }
        SessionCommand::CancelEngine { reply } => {
            let result = if state.game.engine_turn_outstanding() {
                let side = state.game.side_to_move();
                state.cancel_search();
                state.game.set_controller(side, SideController::Human);
                tracing::info!("Engine search cancelled, {} handed to the human", side);
                Ok(())
            } else {
                Err(SessionError::NothingToCancel)
            };
            let _ = reply.send(publish(state, result, event_tx));
        }
        SessionCommand::GetSnapshot { reply } => {
            let _ = reply.send(state.snapshot());
        }
        SessionCommand::Subscribe { reply } => {
            let snapshot = state.snapshot();
            let rx = event_tx.subscribe();
            let _ = reply.send((snapshot, rx));
        }
        SessionCommand::Shutdown => unreachable!(),
    }
}

/// Broadcast the new state after a successful mutation.
fn publish(
    state: &mut SessionState,
    result: Result<(), SessionError>,
    event_tx: &broadcast::Sender<SessionEvent>,
) -> Result<SessionSnapshot, SessionError> {
    result?;
    state.reconcile_search();
    let snapshot = state.snapshot();
    let _ = event_tx.send(SessionEvent::StateChanged(snapshot.clone()));
    Ok(snapshot)
}

/// Tree edits are refused while a move is half made.
fn ensure_unlocked(state: &SessionState) -> Result<(), SessionError> {
    let phase = state.game.phase();
    if state.game.engine_turn_outstanding() || phase == GamePhase::AwaitingPromotionChoice {
        return Err(SessionError::WrongPhase(phase));
    }
    Ok(())
}

/// Replace the engine. The reply is sent once the new engine has finished
/// its handshake.
fn configure_engine(
    state: &mut SessionState,
    config: EngineConfig,
    reply: oneshot::Sender<Result<(), SessionError>>,
) {
    state.release_engine();
    tracing::info!("Configuring engine at {:?}", config.path);
    state.engine_config = Some(config.clone());
    state.pending_options.clear();
    let mut startup = EngineStartup::spawn(config);
    startup.reply = Some(reply);
    state.startup = Some(startup);
}

async fn set_engine_elo(state: &mut SessionState, elo: u32) -> Result<(), SessionError> {
    let config = state.engine_config.get_or_insert_with(EngineConfig::default);
    config.limit_strength = true;
    config.elo = Some(elo);

    let options = [
        ("UCI_LimitStrength".to_string(), "true".to_string()),
        ("UCI_Elo".to_string(), elo.to_string()),
    ];
    if let Some(engine) = state.engine.as_mut() {
        for (name, value) in options {
            if let Err(e) = engine.set_option(&name, value).await {
                state.engine = None;
                return Err(SessionError::Engine(e.to_string()));
            }
        }
    } else if state.engine_busy() {
        tracing::debug!("Engine busy, Elo {} applied before the next search", elo);
        state.pending_options.extend(options);
    }
    Ok(())
}

/// Start an engine search if it's the engine's turn and the game is ongoing.
async fn maybe_auto_trigger(state: &mut SessionState, event_tx: &broadcast::Sender<SessionEvent>) {
    if !state.should_auto_trigger_engine() {
        return;
    }
    match state.trigger_engine().await {
        Ok(()) => {
            if state.engine_thinking() {
                let _ = event_tx.send(SessionEvent::StateChanged(state.snapshot()));
            }
        }
        Err(e) => {
            tracing::error!("Failed to start engine search: {}", e);
            engine_failed(state, e.to_string(), event_tx);
        }
    }
}

async fn handle_startup_result(
    state: &mut SessionState,
    startup: EngineStartup,
    result: Result<UciEngine, EngineError>,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    let EngineStartup {
        search_board,
        reply,
        ..
    } = startup;
    let search_board = search_board.filter(|_| state.game.engine_turn_outstanding());

    match result {
        Ok(mut engine) => {
            tracing::info!("Engine {:?} ready", engine.name());
            if let Some(reply) = reply {
                let _ = event_tx.send(SessionEvent::StateChanged(state.snapshot()));
                let _ = reply.send(Ok(()));
            }
            let started = match search_board {
                Some(board) => state.start_search(engine, board).await,
                None => state.flush_options(&mut engine).await.map(|()| {
                    state.engine = Some(engine);
                }),
            };
            if let Err(e) = started {
                tracing::error!("Failed to start engine search: {}", e);
                engine_failed(state, e.to_string(), event_tx);
            }
        }
        Err(e) => {
            tracing::error!("Engine failed to start: {}", e);
            if let Some(reply) = reply {
                let _ = reply.send(Err(SessionError::Engine(format!(
                    "Failed to spawn engine: {}",
                    e
                ))));
            }
            if search_board.is_some() {
                engine_failed(state, e.to_string(), event_tx);
            }
        }
    }

    maybe_auto_trigger(state, event_tx).await;
}

async fn handle_search_outcome(
    state: &mut SessionState,
    engine: Option<UciEngine>,
    outcome: SearchOutcome,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    if engine.is_some() {
        state.engine = engine;
    }

    match outcome {
        SearchOutcome::Found(token) if state.game.engine_turn_outstanding() => {
            match state.game.complete_engine_move(token) {
                Ok(()) => {
                    tracing::info!("Engine played {}", token);
                    state.engine_eval = state
                        .engine
                        .as_ref()
                        .and_then(|engine| engine.last_info())
                        .map(ToString::to_string);
                    let _ = event_tx.send(SessionEvent::StateChanged(state.snapshot()));
                }
                Err(e) => {
                    tracing::error!("Engine suggested illegal move {}: {}", token, e);
                    engine_failed(
                        state,
                        format!("Engine suggested illegal move {}", token),
                        event_tx,
                    );
                }
            }
        }
        SearchOutcome::Found(token) => {
            tracing::debug!("Discarding bestmove {} for an abandoned turn", token);
        }
        SearchOutcome::Cancelled => {
            tracing::debug!("Cancelled search finished");
        }
        SearchOutcome::Failed(e) => {
            tracing::error!("Engine search failed: {}", e);
            engine_failed(state, e.to_string(), event_tx);
        }
    }

    maybe_auto_trigger(state, event_tx).await;
}

fn engine_failed(
    state: &mut SessionState,
    reason: String,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    state.game.abort_engine_turn();
    state.disable_engine_control();
    let _ = event_tx.send(SessionEvent::EngineFailed(reason));
    let _ = event_tx.send(SessionEvent::StateChanged(state.snapshot()));
}
