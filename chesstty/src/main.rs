//! ChessTTY - terminal chess with UCI engine support.
//!
//! Two subcommands:
//!
//! 1. **`play`**: runs a game session and reads one command per line from
//!    stdin (moves like `e2e4`, tree navigation, engine control). Every state
//!    change is printed, as text or as JSON with `--json`.
//! 2. **`perft`**: counts the leaf nodes of the legal move tree, useful for
//!    checking the move generator against published numbers.
//!
//! Logs go to a daily file under the log directory (see [`config`]), never to
//! the terminal.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use chess::{legality, parse_fen, Board, Controllers, GamePhase, GameStatus, PieceColor, SideController};
use clap::{Args, Parser, Subcommand, ValueEnum};
use engine::EngineConfig;
use session::{Navigation, SessionConfig, SessionEvent, SessionHandle, SessionSnapshot};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use input::{EngineTarget, LineCommand};

mod config;
mod input;

/// Top-level CLI arguments for ChessTTY.
#[derive(Parser)]
#[command(name = "chesstty", version, about = "Terminal chess with UCI engine support")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a game, reading one command per line from stdin.
    Play(PlayArgs),
    /// Count leaf nodes of the legal move tree at each depth up to DEPTH.
    Perft {
        depth: u32,
        /// Position to start from instead of the standard one.
        #[arg(long)]
        fen: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Controller {
    Human,
    Engine,
}

impl From<Controller> for SideController {
    fn from(controller: Controller) -> Self {
        match controller {
            Controller::Human => SideController::Human,
            Controller::Engine => SideController::Engine,
        }
    }
}

#[derive(Args)]
struct PlayArgs {
    #[arg(long, value_enum, default_value = "human")]
    white: Controller,
    #[arg(long, value_enum, default_value = "human")]
    black: Controller,
    /// Engine binary. Overrides `CHESSTTY_ENGINE_PATH`.
    #[arg(long)]
    engine_path: Option<PathBuf>,
    /// Search depth limit sent with every `go`.
    #[arg(long)]
    depth: Option<u8>,
    /// Limit the engine to this Elo rating.
    #[arg(long)]
    elo: Option<u32>,
    /// Time budget per engine move in milliseconds.
    #[arg(long, default_value_t = 3000)]
    movetime_ms: u64,
    /// Start from this position instead of the standard one.
    #[arg(long)]
    fen: Option<String>,
    /// Print snapshots as JSON lines.
    #[arg(long)]
    json: bool,
}

impl PlayArgs {
    /// Merge flags over the environment layer.
    fn engine_config(&self) -> EngineConfig {
        let mut engine = EngineConfig {
            path: self.engine_path.clone().or_else(config::get_engine_path),
            read_grace: config::get_engine_read_grace(),
            ..Default::default()
        };
        if let Some(depth) = self.depth {
            engine.depth = depth;
        }
        if let Some(elo) = self.elo {
            engine.limit_strength = true;
            engine.elo = Some(elo);
        }
        engine
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            controllers: Controllers::new(self.white.into(), self.black.into()),
            start_fen: self.fen.clone(),
            engine: Some(self.engine_config()),
            search_budget: Duration::from_millis(self.movetime_ms),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(&config::get_log_dir());

    match cli.command {
        Commands::Play(args) => play(args).await,
        Commands::Perft { depth, fen } => perft(depth, fen.as_deref()),
    }
}

fn init_logging(log_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    std::fs::create_dir_all(log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(log_dir, "chesstty");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    guard
}

async fn play(args: PlayArgs) -> anyhow::Result<()> {
    tracing::info!("ChessTTY starting up");
    let json = args.json;
    let (handle, task) =
        session::spawn_session(args.session_config()).context("failed to start session")?;

    let (snapshot, mut events) = handle.subscribe().await?;
    print_snapshot(&snapshot, json)?;
    if !json {
        println!("Type `help` for commands.");
    }

    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::StateChanged(snapshot)) => {
                    if let Err(e) = print_snapshot(&snapshot, json) {
                        tracing::warn!("Failed to print snapshot: {}", e);
                    }
                }
                Ok(SessionEvent::EngineFailed(reason)) => {
                    eprintln!("engine failed: {}; both sides are now played by hand", reason);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Printer skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match input::parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };
        if command == LineCommand::Quit {
            break;
        }
        if let Err(e) = dispatch(&handle, command, json).await {
            eprintln!("{}", e);
        }
    }

    handle.shutdown().await;
    task.await.context("session task failed")?;
    printer.await.context("printer task failed")?;
    tracing::info!("ChessTTY shutting down");
    Ok(())
}

/// Run one line command against the session. State changes are printed by
/// the event printer, so only read-only commands print here.
async fn dispatch(handle: &SessionHandle, command: LineCommand, json: bool) -> anyhow::Result<()> {
    match command {
        LineCommand::Move(mv) => {
            handle.request_move(mv).await?;
        }
        LineCommand::Select(square) => {
            let snapshot = handle.select(square).await?;
            if !json {
                println!("{} can move to: {}", square, snapshot.legal_targets.join(" "));
            }
        }
        LineCommand::Promote(kind) => {
            handle.choose_promotion(kind).await?;
        }
        LineCommand::Back => {
            handle.navigate(Navigation::Retreat).await?;
        }
        LineCommand::Next(variation) => {
            handle.navigate(Navigation::Advance(variation)).await?;
        }
        LineCommand::Branch => {
            handle.navigate(Navigation::ReturnToBranch).await?;
        }
        LineCommand::Goto(ply) => {
            handle.navigate(Navigation::GotoHalfMove(ply)).await?;
        }
        LineCommand::Mainline => {
            handle.promote_variation().await?;
        }
        LineCommand::Variation(mv) => {
            handle.add_variation(mv).await?;
        }
        LineCommand::Comment(text) => {
            handle.set_comment(text).await?;
        }
        LineCommand::Engine(target) => {
            let (white, black) = match target {
                EngineTarget::White => (SideController::Engine, SideController::Human),
                EngineTarget::Black => (SideController::Human, SideController::Engine),
                EngineTarget::Off => (SideController::Human, SideController::Human),
            };
            handle.set_controller(PieceColor::White, white).await?;
            handle.set_controller(PieceColor::Black, black).await?;
        }
        LineCommand::Cancel => {
            handle.cancel_engine().await?;
        }
        LineCommand::Board => {
            let snapshot = handle.get_snapshot().await?;
            print_snapshot(&snapshot, json)?;
            if !json {
                print!("{}", snapshot.material);
            }
        }
        LineCommand::Pgn => {
            let snapshot = handle.get_snapshot().await?;
            println!("{}", snapshot.notation);
        }
        LineCommand::New => {
            handle.new_game().await?;
        }
        LineCommand::Help => println!("{}", input::HELP),
        LineCommand::Quit => {}
    }
    Ok(())
}

fn print_snapshot(snapshot: &SessionSnapshot, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }
    println!("{}", snapshot.board);
    println!("fen: {}", snapshot.fen);
    println!("{}", status_line(snapshot));
    if !snapshot.notation.is_empty() {
        println!("moves: {}", snapshot.notation);
    }
    if let Some(eval) = &snapshot.engine_eval {
        println!("engine: {}", eval);
    }
    Ok(())
}

fn status_line(snapshot: &SessionSnapshot) -> String {
    match snapshot.status {
        GameStatus::Checkmate { winner } => return format!("Checkmate, {} wins", winner),
        GameStatus::Stalemate => return "Stalemate".to_string(),
        GameStatus::Ongoing | GameStatus::Check => {}
    }

    let mut line = format!("{} to move (move {})", snapshot.side_to_move, snapshot.move_number);
    if snapshot.status == GameStatus::Check {
        line.push_str(", check");
    }
    if snapshot.phase == GamePhase::AwaitingPromotionChoice {
        line.push_str("; choose a promotion with `promote q|r|b|n`");
    } else if snapshot.engine_thinking {
        line.push_str("; engine thinking");
    }
    line
}

fn perft(depth: u32, fen: Option<&str>) -> anyhow::Result<()> {
    let board = match fen {
        Some(fen) => parse_fen(fen).with_context(|| format!("invalid FEN: {}", fen))?,
        None => Board::standard(),
    };
    tracing::info!("perft to depth {}", depth);
    for d in 1..=depth {
        let start = Instant::now();
        let nodes = legality::perft(&board, d);
        println!("perft({}) = {} ({:.2?})", d, nodes, start.elapsed());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play_args(extra: &[&str]) -> PlayArgs {
        let mut argv = vec!["chesstty", "play"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Play(args) => args,
            Commands::Perft { .. } => panic!("expected play"),
        }
    }

    #[test]
    fn test_play_defaults() {
        let args = play_args(&[]);
        let config = args.session_config();
        assert_eq!(config.controllers, Controllers::default());
        assert_eq!(config.search_budget, Duration::from_millis(3000));
        assert!(!args.json);
    }

    #[test]
    fn test_flags_override_engine_config() {
        let args = play_args(&[
            "--black",
            "engine",
            "--engine-path",
            "/opt/engines/fish",
            "--depth",
            "12",
            "--elo",
            "1900",
            "--movetime-ms",
            "500",
        ]);
        let config = args.session_config();
        assert_eq!(config.controllers.black, SideController::Engine);
        assert_eq!(config.search_budget, Duration::from_millis(500));

        let engine = config.engine.unwrap();
        assert_eq!(engine.path, Some(PathBuf::from("/opt/engines/fish")));
        assert_eq!(engine.depth, 12);
        assert_eq!(engine.elo, Some(1900));
        assert!(engine.limit_strength);
    }

    #[test]
    fn test_perft_args() {
        let cli = Cli::try_parse_from(["chesstty", "perft", "3", "--fen", "8/8/8/8/8/8/8/K6k w - - 0 1"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Perft { depth: 3, fen: Some(_) }));
        assert!(perft(1, Some("not a fen")).is_err());
    }

    #[tokio::test]
    async fn test_status_line() {
        let (handle, task) = session::spawn_session(SessionConfig::default()).unwrap();
        let snapshot = handle.get_snapshot().await.unwrap();
        assert_eq!(status_line(&snapshot), "white to move (move 1)");

        for mv in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            handle.request_move(mv.parse().unwrap()).await.unwrap();
        }
        let snapshot = handle.get_snapshot().await.unwrap();
        assert_eq!(status_line(&snapshot), "Checkmate, black wins");

        handle.shutdown().await;
        task.await.unwrap();
    }
}
