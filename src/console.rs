//! Line protocol read by the daemon on stdin.
//!
//! `<event-kind> [x y]` is an activity event. Lines starting with `:` are
//! control commands: `:pause`, `:resume`, `:reset`, `:status`,
//! `:timeout <ms>`, `:quit`. Blank lines and `#` comments are ignored.

use std::time::Duration;

use crate::idle::{ActivityEvent, EventKind};

/// Control command typed on the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    Reset,
    Status,
    Timeout(Duration),
    Quit,
}

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Activity(ActivityEvent),
    Command(Command),
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error("Expected both x and y coordinates")]
    IncompletePosition,
    #[error("Unexpected argument: {0}")]
    UnexpectedArgument(String),
}

/// Parse a console line. Returns `Ok(None)` for blank lines and comments.
pub fn parse_line(line: &str) -> Result<Option<Input>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut parts = line.split_whitespace();
    let head = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    if let Some(name) = head.strip_prefix(':') {
        return parse_command(name, &args).map(|c| Some(Input::Command(c)));
    }

    let mut event = ActivityEvent::new(EventKind::from(head.to_string()));
    match args.as_slice() {
        [] => {}
        [x, y] => {
            event = event.with_position(parse_number(x)?, parse_number(y)?);
        }
        [_] => return Err(ParseError::IncompletePosition),
        [_, _, extra, ..] => return Err(ParseError::UnexpectedArgument(extra.to_string())),
    }
    Ok(Some(Input::Activity(event)))
}

fn parse_command(name: &str, args: &[&str]) -> Result<Command, ParseError> {
    let command = match name {
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "reset" => Command::Reset,
        "status" => Command::Status,
        "quit" | "q" => Command::Quit,
        "timeout" => {
            let ms = args
                .first()
                .ok_or_else(|| ParseError::InvalidNumber(String::new()))?;
            let ms: u64 = ms
                .parse()
                .map_err(|_| ParseError::InvalidNumber(ms.to_string()))?;
            return match args.get(1) {
                Some(extra) => Err(ParseError::UnexpectedArgument(extra.to_string())),
                None => Ok(Command::Timeout(Duration::from_millis(ms))),
            };
        }
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };
    match args.first() {
        Some(extra) => Err(ParseError::UnexpectedArgument(extra.to_string())),
        None => Ok(command),
    }
}

fn parse_number(s: &str) -> Result<f64, ParseError> {
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::InvalidNumber(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_event() {
        assert_eq!(
            parse_line("keydown"),
            Ok(Some(Input::Activity(ActivityEvent::key_down())))
        );
    }

    #[test]
    fn parses_positioned_event() {
        assert_eq!(
            parse_line("  mousemove 10 20.5 "),
            Ok(Some(Input::Activity(ActivityEvent::pointer_move(10.0, 20.5))))
        );
    }

    #[test]
    fn rejects_half_a_position() {
        assert_eq!(parse_line("mousemove 10"), Err(ParseError::IncompletePosition));
        assert_eq!(
            parse_line("mousemove 10 x"),
            Err(ParseError::InvalidNumber("x".to_string()))
        );
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_line(":pause"), Ok(Some(Input::Command(Command::Pause))));
        assert_eq!(parse_line(":q"), Ok(Some(Input::Command(Command::Quit))));
        assert_eq!(
            parse_line(":timeout 1500"),
            Ok(Some(Input::Command(Command::Timeout(Duration::from_millis(1500)))))
        );
    }

    #[test]
    fn rejects_bad_commands() {
        assert_eq!(
            parse_line(":sleep"),
            Err(ParseError::UnknownCommand("sleep".to_string()))
        );
        assert_eq!(
            parse_line(":timeout soon"),
            Err(ParseError::InvalidNumber("soon".to_string()))
        );
        assert_eq!(
            parse_line(":reset now"),
            Err(ParseError::UnexpectedArgument("now".to_string()))
        );
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        assert_eq!(parse_line("   "), Ok(None));
        assert_eq!(parse_line("# keydown"), Ok(None));
    }
}
