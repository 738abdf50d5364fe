pub mod process;
pub mod search;
pub mod uci;

pub use process::{find_engine_path, StopHandle, UciEngine};
pub use search::{SearchOutcome, SearchTask};
pub use uci::{UciError, UciMessage};

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chess::MoveToken;

/// How to start and tune the engine process.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Explicit binary; well-known locations are searched when unset.
    pub path: Option<PathBuf>,
    pub args: Vec<String>,
    /// Depth limit sent with every `go`.
    pub depth: u8,
    pub limit_strength: bool,
    pub elo: Option<u32>,
    pub hash_mb: u32,
    pub threads: u32,
    pub handshake_timeout: Duration,
    /// Extra time granted on top of the search budget before giving up on
    /// a `bestmove`.
    pub read_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: None,
            args: Vec::new(),
            depth: 99,
            limit_strength: true,
            elo: Some(1500),
            hash_mb: 1024,
            threads: 4,
            handshake_timeout: Duration::from_secs(10),
            read_grace: Duration::from_secs(5),
        }
    }
}

impl EngineConfig {
    /// The option block sent once after the handshake.
    pub fn option_commands(&self) -> Vec<EngineCommand> {
        let mut options = vec![EngineCommand::SetOption {
            name: "UCI_LimitStrength".to_string(),
            value: self.limit_strength.to_string(),
        }];
        if let Some(elo) = self.elo.filter(|_| self.limit_strength) {
            options.push(EngineCommand::SetOption {
                name: "UCI_Elo".to_string(),
                value: elo.to_string(),
            });
        }
        options.push(EngineCommand::SetOption {
            name: "Hash".to_string(),
            value: self.hash_mb.clamp(1, 2048).to_string(),
        });
        options.push(EngineCommand::SetOption {
            name: "Threads".to_string(),
            value: self.threads.clamp(1, 16).to_string(),
        });
        options
    }
}

/// Commands sent to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    SetPosition { fen: String },
    SetOption { name: String, value: String },
    IsReady,
    Go(GoParams),
    Stop,
    Quit,
}

/// Parameters for the "go" command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoParams {
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub depth: Option<u8>,
}

/// Events received from the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Identified(String),
    UciOk,
    ReadyOk,
    BestMove(MoveToken),
    /// `bestmove (none)`: the engine has nothing to play.
    NoMove,
    Info(EngineInfo),
    Malformed(UciError),
    /// The engine's output closed.
    Terminated,
}

/// Search progress reported on `info` lines. Only what the session shows
/// is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineInfo {
    pub depth: Option<u8>,
    pub score: Option<Score>,
}

impl fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.depth, self.score) {
            (Some(depth), Some(score)) => write!(f, "depth {} score {}", depth, score),
            (None, Some(score)) => write!(f, "score {}", score),
            (Some(depth), None) => write!(f, "depth {}", depth),
            (None, None) => Ok(()),
        }
    }
}

/// Evaluation from the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    Mate(i8), // Negative for being mated
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Centipawns(cp) => write!(f, "cp {}", cp),
            Self::Mate(moves) => write!(f, "mate {}", moves),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No engine binary found")]
    NotFound,
    #[error("Failed to spawn engine: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Engine IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Engine handshake failed: {0}")]
    Handshake(String),
    #[error("Engine process terminated")]
    Terminated,
    #[error("Engine did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Engine has no move to play")]
    NoMove,
    #[error("Malformed engine response: {0}")]
    Malformed(#[from] UciError),
}

impl EngineError {
    /// True when the process can no longer be talked to.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NotFound | Self::Spawn(_) | Self::Io(_) | Self::Handshake(_) | Self::Terminated
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_block() {
        let config = EngineConfig::default();
        let lines: Vec<String> = config
            .option_commands()
            .iter()
            .map(uci::format_command)
            .collect();
        assert_eq!(
            lines,
            vec![
                "setoption name UCI_LimitStrength value true",
                "setoption name UCI_Elo value 1500",
                "setoption name Hash value 1024",
                "setoption name Threads value 4",
            ]
        );
    }

    #[test]
    fn test_option_block_without_strength_limit() {
        let config = EngineConfig {
            limit_strength: false,
            threads: 64,
            ..Default::default()
        };
        let lines: Vec<String> = config
            .option_commands()
            .iter()
            .map(uci::format_command)
            .collect();
        assert_eq!(lines[0], "setoption name UCI_LimitStrength value false");
        assert!(!lines.iter().any(|l| l.contains("UCI_Elo")));
        assert_eq!(lines.last().map(String::as_str), Some("setoption name Threads value 16"));
    }

    #[test]
    fn test_info_display() {
        let info = EngineInfo {
            depth: Some(12),
            score: Some(Score::Centipawns(-35)),
        };
        assert_eq!(info.to_string(), "depth 12 score cp -35");
        let mate = EngineInfo {
            depth: None,
            score: Some(Score::Mate(3)),
        };
        assert_eq!(mate.to_string(), "score mate 3");
        assert_eq!(EngineInfo::default().to_string(), "");
    }

    #[test]
    fn test_fatal_errors() {
        assert!(EngineError::Terminated.is_fatal());
        assert!(!EngineError::Timeout(Duration::from_secs(1)).is_fatal());
        assert!(!EngineError::NoMove.is_fatal());
    }
}
