use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{error::ErrorKind, CommandFactory, Parser as ClapParser};

use rillc::{
    frontend::{lexer, parser::Parser, unparse},
    middle::{ir::lower_to_ir, resolve::NameAnalysis, type_check::TypeAnalysis},
    CompileError, SourceFile, SourceFileOrigin,
};

#[derive(Debug, ClapParser)]
#[command(version, about = "Compiler for the rill language", long_about = None)]
struct Args {
    /// Source file to compile
    source_file: PathBuf,

    /// Write the token stream to PATH ("--" for stdout)
    #[arg(short = 't', value_name = "PATH", allow_hyphen_values = true)]
    tokens_out: Option<PathBuf>,

    /// Parse the input to check syntax
    #[arg(short = 'p')]
    parse_only: bool,

    /// Write the canonical program form to PATH
    #[arg(short = 'u', value_name = "PATH", allow_hyphen_values = true)]
    unparse_out: Option<PathBuf>,

    /// Run name analysis and write the symbol-annotated program form to PATH
    #[arg(short = 'n', value_name = "PATH", allow_hyphen_values = true)]
    names_out: Option<PathBuf>,

    /// Run type analysis
    #[arg(short = 'c')]
    check_types: bool,

    /// Write the program as three-address code to PATH
    #[arg(short = 'a', value_name = "PATH", allow_hyphen_values = true)]
    ir_out: Option<PathBuf>,
}

impl Args {
    fn requested_anything(&self) -> bool {
        self.tokens_out.is_some()
            || self.parse_only
            || self.unparse_out.is_some()
            || self.names_out.is_some()
            || self.check_types
            || self.ir_out.is_some()
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if !args.requested_anything() {
        Args::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "No passes requested; use at least one of -t, -p, -u, -n, -c, -a",
            )
            .exit();
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), CompileError> {
    let contents = fs::read_to_string(&args.source_file)?;
    let source = SourceFile::new(contents, SourceFileOrigin::File(args.source_file.clone()));

    if let Some(path) = &args.tokens_out {
        write_output(path, &lexer::output_tokens(&source))?;
    }

    let needs_ast = args.parse_only
        || args.unparse_out.is_some()
        || args.names_out.is_some()
        || args.check_types
        || args.ir_out.is_some();

    if !needs_ast {
        return Ok(());
    }

    let program = Parser::parse_program(&source)?;

    if let Some(path) = &args.unparse_out {
        write_output(path, &unparse::unparse_program(&program, None))?;
    }

    if !(args.names_out.is_some() || args.check_types || args.ir_out.is_some()) {
        return Ok(());
    }

    let names = NameAnalysis::build(&program);
    if !names.passed() {
        return Err(CompileError::NameAnalysisFailed);
    }

    if let Some(path) = &args.names_out {
        write_output(path, &unparse::unparse_program(&program, Some(&names)))?;
    }

    if !(args.check_types || args.ir_out.is_some()) {
        return Ok(());
    }

    let types = TypeAnalysis::check(&program, &names);
    if !types.passed() {
        return Err(CompileError::TypeAnalysisFailed);
    }

    if let Some(path) = &args.ir_out {
        let ir = lower_to_ir(&program, &names, types)?;
        write_output(path, &ir.to_text(false))?;
    }

    Ok(())
}

/// `--` means standard output.
fn write_output(path: &Path, contents: &str) -> io::Result<()> {
    if path == Path::new("--") {
        io::stdout().write_all(contents.as_bytes())
    } else {
        fs::write(path, contents)
    }
}
