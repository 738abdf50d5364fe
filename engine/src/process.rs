use crate::uci::{format_command, parse_uci_message, UciError, UciMessage};
use crate::{EngineCommand, EngineConfig, EngineError, EngineEvent, EngineInfo, GoParams};
use chess::{format_fen, Board, MoveToken};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::mpsc;

/// Well-known install locations checked before `PATH`.
const ENGINE_CANDIDATES: &[&str] = &[
    "/usr/local/bin/stockfish",
    "/usr/bin/stockfish",
    "/opt/homebrew/bin/stockfish",
    "/usr/games/stockfish",
];

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// A running UCI engine subprocess.
///
/// The handshake and option block are completed by [`UciEngine::spawn`];
/// afterwards every [`UciEngine::search`] sends exactly one `position` and
/// one `go` and waits for the matching `bestmove`.
pub struct UciEngine {
    process: Child,
    command_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
    config: EngineConfig,
    name: Option<String>,
    /// Set when a search was abandoned and its `bestmove` may still arrive.
    needs_sync: bool,
    /// Latest scored `info` line of the most recent search.
    last_info: Option<EngineInfo>,
}

/// Sends `stop` to an engine whose search is owned elsewhere.
#[derive(Debug, Clone)]
pub struct StopHandle {
    command_tx: mpsc::Sender<EngineCommand>,
}

impl StopHandle {
    /// Returns false when the engine is gone or its command queue is full.
    pub fn stop(&self) -> bool {
        self.command_tx.try_send(EngineCommand::Stop).is_ok()
    }
}

impl UciEngine {
    /// Start the engine, complete the UCI handshake and send the option block.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn spawn(config: EngineConfig) -> Result<Self, EngineError> {
        let path = match &config.path {
            Some(path) => path.clone(),
            None => find_engine_path().ok_or(EngineError::NotFound)?,
        };
        tracing::info!("Spawning engine at {:?} (config: {:?})", path, config);

        let mut process = tokio::process::Command::new(&path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::error!("Failed to spawn engine: {}", e);
                EngineError::Spawn(e)
            })?;

        let mut stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::Handshake("engine stdin unavailable".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| EngineError::Handshake("engine stdout unavailable".to_string()))?;

        let (event_tx, mut event_rx) = mpsc::channel::<EngineEvent>(64);
        tokio::spawn(read_output(stdout, event_tx));

        write_line(&mut stdin, "uci").await?;
        let name = tokio::time::timeout(config.handshake_timeout, async {
            let mut name = None;
            while let Some(event) = event_rx.recv().await {
                match event {
                    EngineEvent::Identified(id) => name = Some(id),
                    EngineEvent::UciOk => return Ok(name),
                    EngineEvent::Terminated => break,
                    other => tracing::trace!("Ignoring during handshake: {:?}", other),
                }
            }
            Err(EngineError::Handshake(
                "engine exited before uciok".to_string(),
            ))
        })
        .await
        .map_err(|_| {
            tracing::error!("Timeout waiting for uciok");
            EngineError::Handshake(format!("no uciok within {:?}", config.handshake_timeout))
        })??;
        tracing::debug!("Received uciok from {:?}", name);

        for option in config.option_commands() {
            write_line(&mut stdin, &format_command(&option)).await?;
        }
        write_line(&mut stdin, "isready").await?;
        wait_ready(&mut event_rx, config.handshake_timeout).await?;

        let (command_tx, command_rx) = mpsc::channel::<EngineCommand>(32);
        tokio::spawn(write_commands(stdin, command_rx));

        tracing::info!("Engine {:?} initialized", name);
        Ok(Self {
            process,
            command_tx,
            event_rx,
            config,
            name,
            needs_sync: false,
            last_info: None,
        })
    }

    /// Ask for the best move in `board` with `budget` on both clocks.
    ///
    /// Waits at most `budget` plus the configured read grace. On expiry the
    /// engine is told to stop and [`EngineError::Timeout`] is returned.
    #[tracing::instrument(level = "debug", skip(self, board))]
    pub async fn search(&mut self, board: &Board, budget: Duration) -> Result<MoveToken, EngineError> {
        self.discard_stale_events()?;
        if self.needs_sync {
            self.send(EngineCommand::IsReady).await?;
            wait_ready(&mut self.event_rx, self.config.handshake_timeout).await?;
            self.needs_sync = false;
        }

        self.last_info = None;
        let clock = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        let fen = format_fen(board);
        tracing::info!("Searching FEN={} budget={}ms", fen, clock);
        self.send(EngineCommand::SetPosition { fen }).await?;
        self.send(EngineCommand::Go(GoParams {
            wtime: Some(clock),
            btime: Some(clock),
            depth: Some(self.config.depth),
        }))
        .await?;

        let limit = budget + self.config.read_grace;
        match tokio::time::timeout(limit, self.await_best_move()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("No bestmove within {:?}, sending stop", limit);
                self.needs_sync = true;
                let _ = self.command_tx.try_send(EngineCommand::Stop);
                Err(EngineError::Timeout(limit))
            }
        }
    }

    /// Send a single `setoption` outside the initial option block.
    pub async fn set_option(&mut self, name: &str, value: String) -> Result<(), EngineError> {
        tracing::info!("Setting option {} = {}", name, value);
        if name == "UCI_Elo" {
            self.config.elo = value.parse().ok();
        }
        self.send(EngineCommand::SetOption {
            name: name.to_string(),
            value,
        })
        .await
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            command_tx: self.command_tx.clone(),
        }
    }

    /// Name reported by `id name` during the handshake.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Depth and score from the last search, if the engine reported any.
    pub fn last_info(&self) -> Option<&EngineInfo> {
        self.last_info.as_ref()
    }

    /// Send `quit`, then kill the process if it has not exited shortly after.
    pub async fn shutdown(mut self) {
        tracing::info!("Shutting down engine {:?}", self.name);
        let _ = self.command_tx.try_send(EngineCommand::Quit);
        if tokio::time::timeout(SHUTDOWN_GRACE, self.process.wait())
            .await
            .is_err()
        {
            tracing::warn!("Engine ignored quit, killing it");
            let _ = self.process.kill().await;
        }
    }

    async fn send(&self, cmd: EngineCommand) -> Result<(), EngineError> {
        self.command_tx.send(cmd).await.map_err(|_| {
            tracing::error!("Engine command queue closed");
            EngineError::Terminated
        })
    }

    fn discard_stale_events(&mut self) -> Result<(), EngineError> {
        while let Ok(event) = self.event_rx.try_recv() {
            if event == EngineEvent::Terminated {
                return Err(EngineError::Terminated);
            }
            tracing::trace!("Discarding stale event: {:?}", event);
        }
        Ok(())
    }

    async fn await_best_move(&mut self) -> Result<MoveToken, EngineError> {
        while let Some(event) = self.event_rx.recv().await {
            match event {
                EngineEvent::BestMove(mv) => {
                    tracing::info!("Received bestmove {}", mv);
                    return Ok(mv);
                }
                EngineEvent::NoMove => return Err(EngineError::NoMove),
                EngineEvent::Malformed(e) => return Err(EngineError::Malformed(e)),
                EngineEvent::Terminated => return Err(EngineError::Terminated),
                EngineEvent::Info(info) if info.score.is_some() => {
                    tracing::trace!("Engine info: {}", info);
                    self.last_info = Some(info);
                }
                other => tracing::trace!("Ignoring event during search: {:?}", other),
            }
        }
        Err(EngineError::Terminated)
    }
}

/// Locate an engine binary without starting it.
pub fn find_engine_path() -> Option<PathBuf> {
    ENGINE_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
        .or_else(|| {
            let dirs = std::env::var_os("PATH")?;
            std::env::split_paths(&dirs)
                .map(|dir| dir.join("stockfish"))
                .find(|path| path.is_file())
        })
}

/// Map one line of engine output to an event. Unrecognised lines yield `None`.
pub(crate) fn event_for_line(line: &str) -> Option<EngineEvent> {
    match parse_uci_message(line) {
        Ok(UciMessage::Id { name, value }) if name == "name" => Some(EngineEvent::Identified(value)),
        Ok(UciMessage::Id { .. }) => None,
        Ok(UciMessage::UciOk) => Some(EngineEvent::UciOk),
        Ok(UciMessage::ReadyOk) => Some(EngineEvent::ReadyOk),
        Ok(UciMessage::BestMove { mv, .. }) => Some(EngineEvent::BestMove(mv)),
        Ok(UciMessage::NoBestMove) => Some(EngineEvent::NoMove),
        Ok(UciMessage::Info(info)) => Some(EngineEvent::Info(info)),
        Err(UciError::UnknownMessage(_)) => None,
        Err(e) => Some(EngineEvent::Malformed(e)),
    }
}

async fn read_output(stdout: ChildStdout, event_tx: mpsc::Sender<EngineEvent>) {
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                tracing::warn!("Engine stdout EOF - engine closed");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                tracing::trace!("UCI << {}", trimmed);
                if let Some(event) = event_for_line(trimmed) {
                    if event_tx.send(event).await.is_err() {
                        tracing::debug!("Event receiver dropped");
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::error!("Error reading engine stdout: {}", e);
                break;
            }
        }
    }
    let _ = event_tx.send(EngineEvent::Terminated).await;
    tracing::info!("Output reader task exiting");
}

async fn write_commands(mut stdin: ChildStdin, mut command_rx: mpsc::Receiver<EngineCommand>) {
    while let Some(cmd) = command_rx.recv().await {
        let line = format_command(&cmd);
        if let Err(e) = write_line(&mut stdin, &line).await {
            tracing::error!("Failed to write to engine stdin: {}", e);
            break;
        }
        if cmd == EngineCommand::Quit {
            break;
        }
    }
    tracing::info!("Stdin writer task exiting");
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    tracing::trace!("UCI >> {}", line);
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

async fn wait_ready(
    event_rx: &mut mpsc::Receiver<EngineEvent>,
    limit: Duration,
) -> Result<(), EngineError> {
    tokio::time::timeout(limit, async {
        while let Some(event) = event_rx.recv().await {
            match event {
                EngineEvent::ReadyOk => return Ok(()),
                EngineEvent::Terminated => return Err(EngineError::Terminated),
                other => tracing::trace!("Ignoring while waiting for readyok: {:?}", other),
            }
        }
        Err(EngineError::Terminated)
    })
    .await
    .map_err(|_| EngineError::Handshake(format!("no readyok within {:?}", limit)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_for_line() {
        assert_eq!(
            event_for_line("id name FakeFish 1.0"),
            Some(EngineEvent::Identified("FakeFish 1.0".to_string()))
        );
        assert_eq!(event_for_line("id author someone"), None);
        assert_eq!(event_for_line("option name Hash type spin"), None);
        assert_eq!(event_for_line(""), None);
        assert_eq!(event_for_line("bestmove (none)"), Some(EngineEvent::NoMove));
        assert!(matches!(
            event_for_line("bestmove zz"),
            Some(EngineEvent::Malformed(UciError::InvalidMove(_)))
        ));
        assert_eq!(
            event_for_line("bestmove e2e4"),
            Some(EngineEvent::BestMove("e2e4".parse().unwrap()))
        );
    }

    #[tokio::test]
    async fn test_write_line_appends_newline() {
        let mut out = Vec::new();
        write_line(&mut out, "isready").await.unwrap();
        assert_eq!(out, b"isready\n");
    }
}


#[cfg(all(test, unix))]
mod process_tests {
    use super::fake::FakeEngine;
    use super::*;
    use crate::Score;

    #[tokio::test]
    async fn test_handshake_and_search() {
        let fake = FakeEngine::replying("e2e4");
        let mut engine = UciEngine::spawn(fake.config.clone()).await.unwrap();
        assert_eq!(engine.name(), Some("FakeFish"));

        let mv = engine
            .search(&Board::default(), Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(mv.to_string(), "e2e4");
        assert_eq!(
            engine.last_info(),
            Some(&EngineInfo {
                depth: Some(1),
                score: Some(Score::Centipawns(12)),
            })
        );

        let received = fake.received();
        assert_eq!(received[0], "uci");
        assert!(received.iter().any(|l| l == "setoption name UCI_Elo value 1500"));
        assert!(received
            .iter()
            .any(|l| l == "position fen rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"));
        assert!(received.iter().any(|l| l == "go wtime 200 btime 200 depth 99"));
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_options_sent_once() {
        let fake = FakeEngine::replying("e2e4");
        let mut engine = UciEngine::spawn(fake.config.clone()).await.unwrap();
        for _ in 0..2 {
            engine
                .search(&Board::default(), Duration::from_millis(100))
                .await
                .unwrap();
        }

        let received = fake.received();
        let option_lines = received.iter().filter(|l| l.starts_with("setoption")).count();
        assert_eq!(option_lines, fake.config.option_commands().len());
        let positions = received.iter().filter(|l| l.starts_with("position fen")).count();
        assert_eq!(positions, 2);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_timeout_sends_stop() {
        let fake = FakeEngine::new(r#"echo "uciok""#, ":", ":");
        let mut config = fake.config.clone();
        config.read_grace = Duration::from_millis(100);
        let mut engine = UciEngine::spawn(config).await.unwrap();

        let result = engine
            .search(&Board::default(), Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(EngineError::Timeout(_))));
        assert!(fake.wait_for("stop").await);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_search_after_timeout_resyncs() {
        let fake = FakeEngine::waiting_for_stop("d2d4");
        let mut config = fake.config.clone();
        config.read_grace = Duration::from_millis(50);
        let mut engine = UciEngine::spawn(config).await.unwrap();

        let first = engine
            .search(&Board::default(), Duration::from_millis(50))
            .await;
        assert!(matches!(first, Err(EngineError::Timeout(_))));

        // The late bestmove is consumed by the resync, so this search times out too.
        let second = engine
            .search(&Board::default(), Duration::from_millis(50))
            .await;
        assert!(matches!(second, Err(EngineError::Timeout(_))));
        assert!(fake.received().iter().filter(|l| *l == "isready").count() >= 2);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_engine_exit_is_terminated() {
        let fake = FakeEngine::new(r#"echo "uciok""#, "exit 0", ":");
        let mut engine = UciEngine::spawn(fake.config.clone()).await.unwrap();
        let result = engine
            .search(&Board::default(), Duration::from_millis(200))
            .await;
        assert!(matches!(result, Err(EngineError::Terminated)));
    }

    #[tokio::test]
    async fn test_malformed_bestmove() {
        let fake = FakeEngine::replying("zz");
        let mut engine = UciEngine::spawn(fake.config.clone()).await.unwrap();
        let result = engine
            .search(&Board::default(), Duration::from_millis(200))
            .await;
        assert!(matches!(result, Err(EngineError::Malformed(_))));
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_no_move() {
        let fake = FakeEngine::replying("(none)");
        let mut engine = UciEngine::spawn(fake.config.clone()).await.unwrap();
        let result = engine
            .search(&Board::default(), Duration::from_millis(200))
            .await;
        assert!(matches!(result, Err(EngineError::NoMove)));
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let fake = FakeEngine::new(":", ":", ":");
        let mut config = fake.config.clone();
        config.handshake_timeout = Duration::from_millis(200);
        let result = UciEngine::spawn(config).await;
        assert!(matches!(result, Err(EngineError::Handshake(_))));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let config = EngineConfig {
            path: Some(PathBuf::from("/nonexistent/chess-engine")),
            ..Default::default()
        };
        let result = UciEngine::spawn(config).await;
        assert!(matches!(result, Err(EngineError::Spawn(_))));
    }

    #[tokio::test]
    async fn test_set_option_updates_config() {
        let fake = FakeEngine::replying("e2e4");
        let mut engine = UciEngine::spawn(fake.config.clone()).await.unwrap();
        engine
            .set_option("UCI_Elo", "2000".to_string())
            .await
            .unwrap();
        assert_eq!(engine.config().elo, Some(2000));
        assert!(fake.wait_for("setoption name UCI_Elo value 2000").await);
        engine.shutdown().await;
    }
}
