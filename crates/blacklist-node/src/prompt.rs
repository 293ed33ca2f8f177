//! Interactive port prompt.

use std::io::{self, BufRead, IsTerminal, Write};
use tracing::warn;

const PROMPT: &str = "Enter port to run the server on [default: 8080]: ";

/// Ask for a port on stdin when it is a terminal.
///
/// Returns `None` when stdin is not interactive, the answer is empty, or the
/// answer is not a valid port (the caller then uses the default).
pub fn port_from_stdin() -> Option<u16> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return None;
    }
    ask_port(stdin.lock(), io::stdout())
}

/// Prompt on `output` and read one line from `input`.
pub fn ask_port<R: BufRead, W: Write>(mut input: R, mut output: W) -> Option<u16> {
    if write!(output, "{}", PROMPT).and_then(|_| output.flush()).is_err() {
        return None;
    }

    let mut line = String::new();
    if input.read_line(&mut line).is_err() {
        return None;
    }
    parse_port(&line)
}

fn parse_port(answer: &str) -> Option<u16> {
    let answer = answer.trim();
    if answer.is_empty() {
        return None;
    }
    match answer.parse::<u16>() {
        Ok(port) if port != 0 => Some(port),
        _ => {
            warn!(input = answer, "Invalid port input, using default port 8080");
            None
        }
    }
}
