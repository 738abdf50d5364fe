use chess::{parse_move_token, MoveToken};

use crate::{EngineCommand, EngineInfo, Score};

/// Incoming message from UCI engine
#[derive(Debug, Clone, PartialEq)]
pub enum UciMessage {
    Id { name: String, value: String },
    UciOk,
    ReadyOk,
    BestMove { mv: MoveToken, ponder: Option<MoveToken> },
    NoBestMove,
    Info(EngineInfo),
}

/// Parse a UCI message line
pub fn parse_uci_message(line: &str) -> Result<UciMessage, crate::UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    match tokens.first() {
        Some(&"uciok") => Ok(UciMessage::UciOk),
        Some(&"readyok") => Ok(UciMessage::ReadyOk),

        Some(&"id") => {
            if tokens.len() < 3 {
                return Err(crate::UciError::MalformedMessage(line.to_string()));
            }
            let name = tokens[1].to_string();
            let value = tokens[2..].join(" ");
            Ok(UciMessage::Id { name, value })
        }

        Some(&"bestmove") => match tokens.get(1) {
            None => Err(crate::UciError::MalformedMessage(line.to_string())),
            Some(&"(none)") | Some(&"0000") => Ok(UciMessage::NoBestMove),
            Some(token) => {
                let mv = parse_move_token(token)?;
                let ponder = match (tokens.get(2), tokens.get(3)) {
                    (Some(&"ponder"), Some(token)) => parse_move_token(token).ok(),
                    _ => None,
                };
                Ok(UciMessage::BestMove { mv, ponder })
            }
        },

        Some(&"info") => Ok(UciMessage::Info(parse_info_line(&tokens[1..]))),

        _ => Err(crate::UciError::UnknownMessage(line.to_string())),
    }
}

/// Parse an "info" line from the engine. Everything after `string` is free
/// text.
fn parse_info_line(tokens: &[&str]) -> EngineInfo {
    let mut info = EngineInfo::default();
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                i += 1;
                info.depth = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "score" => {
                i += 1;
                if let Some(&score_type) = tokens.get(i) {
                    i += 1;
                    if let Some(value_str) = tokens.get(i) {
                        info.score = match score_type {
                            "cp" => value_str.parse().ok().map(Score::Centipawns),
                            "mate" => value_str.parse().ok().map(Score::Mate),
                            _ => None,
                        };
                    }
                }
            }
            "string" => break,
            _ => {}
        }
        i += 1;
    }

    info
}

/// Render a command as the line written to the engine (without newline).
pub fn format_command(cmd: &EngineCommand) -> String {
    match cmd {
        EngineCommand::SetPosition { fen } => format!("position fen {}", fen),
        EngineCommand::SetOption { name, value } => {
            format!("setoption name {} value {}", name, value)
        }
        EngineCommand::IsReady => "isready".to_string(),
        EngineCommand::Go(params) => {
            let mut go = "go".to_string();
            if let Some(wtime) = params.wtime {
                go.push_str(&format!(" wtime {}", wtime));
            }
            if let Some(btime) = params.btime {
                go.push_str(&format!(" btime {}", btime));
            }
            if let Some(depth) = params.depth {
                go.push_str(&format!(" depth {}", depth));
            }
            go
        }
        EngineCommand::Stop => "stop".to_string(),
        EngineCommand::Quit => "quit".to_string(),
    }
}
