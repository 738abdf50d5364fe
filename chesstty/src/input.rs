//! Parsing of the line commands read during `play`.

use chess::{parse_move_token, Coord, CoordParseError, MoveToken, PieceKind, TokenError};

/// Which sides the `engine` command hands to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineTarget {
    White,
    Black,
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineCommand {
    Move(MoveToken),
    Select(Coord),
    Promote(PieceKind),
    Back,
    Next(usize),
    /// Return to the last position where a side line was entered.
    Branch,
    Goto(usize),
    /// Make the current side line the main line.
    Mainline,
    Variation(MoveToken),
    Comment(String),
    Engine(EngineTarget),
    Cancel,
    Board,
    Pgn,
    New,
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InputError {
    #[error("Unknown command: {0} (type `help`)")]
    Unknown(String),
    #[error("Missing argument for `{0}`")]
    MissingArgument(&'static str),
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error("Invalid piece for promotion: {0}")]
    InvalidPromotion(String),
    #[error("Expected white, black or off, got {0}")]
    InvalidEngineTarget(String),
    #[error(transparent)]
    Square(#[from] CoordParseError),
    #[error(transparent)]
    Token(#[from] TokenError),
}

pub const HELP: &str = "\
commands:
  e2e4 | e7e8q        play a move (promotion letter optional)
  select e2           select a piece and list its targets
  promote q|r|b|n     finish a pending promotion
  back | next [i]     step back, or forward into continuation i
  branch              return to the last branch point
  goto N              jump to ply N of the main line
  mainline            promote the current side line
  variation e7e5      add an alternative to the current move
  comment TEXT        annotate the current move
  engine white|black|off
  cancel              abandon the running engine search
  board | pgn | new | help | quit";

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<LineCommand>, InputError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "" => return Ok(None),
        "select" => LineCommand::Select(required(rest, "select")?.parse()?),
        "promote" => LineCommand::Promote(parse_promotion(required(rest, "promote")?)?),
        "back" => LineCommand::Back,
        "next" if rest.is_empty() => LineCommand::Next(0),
        "next" => LineCommand::Next(parse_number(rest)?),
        "branch" => LineCommand::Branch,
        "goto" => LineCommand::Goto(parse_number(required(rest, "goto")?)?),
        "mainline" => LineCommand::Mainline,
        "variation" => LineCommand::Variation(parse_move_token(required(rest, "variation")?)?),
        "comment" => LineCommand::Comment(rest.to_string()),
        "engine" => LineCommand::Engine(match required(rest, "engine")? {
            "white" => EngineTarget::White,
            "black" => EngineTarget::Black,
            "off" => EngineTarget::Off,
            other => return Err(InputError::InvalidEngineTarget(other.to_string())),
        }),
        "cancel" => LineCommand::Cancel,
        "board" => LineCommand::Board,
        "pgn" => LineCommand::Pgn,
        "new" => LineCommand::New,
        "help" => LineCommand::Help,
        "quit" | "exit" => LineCommand::Quit,
        token if rest.is_empty() && token.starts_with(|c: char| c.is_ascii_lowercase()) => {
            match parse_move_token(token) {
                Ok(mv) => LineCommand::Move(mv),
                Err(_) => return Err(InputError::Unknown(token.to_string())),
            }
        }
        other => return Err(InputError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn required<'a>(rest: &'a str, command: &'static str) -> Result<&'a str, InputError> {
    if rest.is_empty() {
        Err(InputError::MissingArgument(command))
    } else {
        Ok(rest)
    }
}

fn parse_number(s: &str) -> Result<usize, InputError> {
    s.parse().map_err(|_| InputError::InvalidNumber(s.to_string()))
}

fn parse_promotion(s: &str) -> Result<PieceKind, InputError> {
    let mut chars = s.chars();
    match (chars.next().and_then(PieceKind::from_char), chars.next()) {
        (Some(kind), None) if kind.is_promotion_target() => Ok(kind),
        _ => Err(InputError::InvalidPromotion(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_moves() {
        let cmd = parse_line("e2e4").unwrap().unwrap();
        assert_eq!(cmd, LineCommand::Move(parse_move_token("e2e4").unwrap()));

        let cmd = parse_line("  e7e8q ").unwrap().unwrap();
        let LineCommand::Move(mv) = cmd else {
            panic!("expected a move");
        };
        assert_eq!(mv.promotion, Some(PieceKind::Queen));
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(
            parse_line("select e2").unwrap(),
            Some(LineCommand::Select(Coord::new(4, 1)))
        );
        assert_eq!(
            parse_line("promote n").unwrap(),
            Some(LineCommand::Promote(PieceKind::Knight))
        );
        assert_eq!(parse_line("next").unwrap(), Some(LineCommand::Next(0)));
        assert_eq!(parse_line("next 2").unwrap(), Some(LineCommand::Next(2)));
        assert_eq!(parse_line("goto 10").unwrap(), Some(LineCommand::Goto(10)));
        assert_eq!(
            parse_line("comment  a sharp line ").unwrap(),
            Some(LineCommand::Comment("a sharp line".to_string()))
        );
        assert_eq!(
            parse_line("engine off").unwrap(),
            Some(LineCommand::Engine(EngineTarget::Off))
        );
        assert_eq!(parse_line("quit").unwrap(), Some(LineCommand::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_line("dance"),
            Err(InputError::Unknown("dance".to_string()))
        );
        assert_eq!(parse_line("goto"), Err(InputError::MissingArgument("goto")));
        assert_eq!(
            parse_line("goto x"),
            Err(InputError::InvalidNumber("x".to_string()))
        );
        assert_eq!(
            parse_line("promote k"),
            Err(InputError::InvalidPromotion("k".to_string()))
        );
        assert!(matches!(parse_line("select e"), Err(InputError::Square(_))));
        assert!(matches!(
            parse_line("variation e7e8k"),
            Err(InputError::Token(_))
        ));
        assert_eq!(
            parse_line("engine both"),
            Err(InputError::InvalidEngineTarget("both".to_string()))
        );
    }
}
