//! Uniform error reporting.
//!
//! Every user-facing diagnostic cites a 1-based (line, column) position and
//! goes to stderr as `FATAL [line,col]: message`. Internal invariant
//! violations are a separate kind that the driver turns into exit code 1.

use colored::Colorize;
use thiserror::Error;

/// A 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{}]", self.line, self.col)
    }
}

/// Prints a positioned diagnostic to the error stream.
pub fn report_fatal(pos: Position, message: &str) {
    eprintln!("{} {}: {}", "FATAL".red(), pos, message);
}

/// A violated compiler invariant: an unreachable branch, a missing symbol
/// where name analysis promised one, an unsupported operand width. These
/// terminate the requested pipeline with exit code 1.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct InternalError(String);

impl InternalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The failure a caller of a pass observes. Semantic detail has already been
/// printed by the pass itself; this only says which stage gave up.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("FATAL {pos}: {message}")]
    Syntax { pos: Position, message: String },
    #[error("Name Analysis Failed")]
    NameAnalysisFailed,
    #[error("Type Analysis Failed")]
    TypeAnalysisFailed,
    #[error("InternalError: {0}")]
    Internal(#[from] InternalError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
