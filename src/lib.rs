//! rillc, a compiler for the rill language.
//!
//! The pipeline is a chain of passes over a shared AST:
//!
//!   source text -> [lexer] -> tokens -> [parser] -> AST
//!     -> [name analysis] -> symbol resolutions
//!     -> [type analysis] -> node types + widening coercions
//!     -> [lowering] -> linear three-address IR
//!
//! Each pass is usable on its own through this library; the `rillc` binary
//! wires them up behind the command-line flags.

pub mod diagnostics;
pub mod frontend;
pub mod index;
pub mod middle;

pub use diagnostics::{CompileError, InternalError, Position};
pub use frontend::{SourceFile, SourceFileOrigin};

use frontend::parser::Parser;
use middle::ir::{lower_to_ir, IrProgram};
use middle::resolve::NameAnalysis;
use middle::type_check::TypeAnalysis;

/// Runs the whole pipeline over a source file and returns the IR program.
///
/// Semantic diagnostics are printed to stderr as they are found; the
/// returned error only says which pass gave up.
pub fn compile_to_ir(source: &SourceFile) -> Result<IrProgram, CompileError> {
    let program = Parser::parse_program(source)?;

    let names = NameAnalysis::build(&program);
    if !names.passed() {
        return Err(CompileError::NameAnalysisFailed);
    }

    let types = TypeAnalysis::check(&program, &names);
    if !types.passed() {
        return Err(CompileError::TypeAnalysisFailed);
    }

    Ok(lower_to_ir(&program, &names, types)?)
}
