//! The compiler binary: CLI argument parsing, extension validation, and the
//! lex → parse → annotate → codegen → resolve → write pipeline of spec §2's
//! "Driver" component and §6's external interface.
//!
//! Run with `--help` for more info.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::debug;

use impc::common::Diagnostic;
use impc::front::lex::Lexer;
use impc::CompileError;

/// A single-pass compiler from Imp to VM-ASM.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Source file, must have a `.imp` extension.
    source: PathBuf,
    /// Output file; a missing `.mr` extension is appended automatically.
    output: PathBuf,
    /// Lexer-only mode: print each token and exit, without parsing or
    /// generating code.
    #[arg(short = 't', long = "tokens")]
    tokens_only: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    if args.source.extension().and_then(|e| e.to_str()) != Some("imp") {
        eprintln!("ERROR: input file must have a '.imp' extension");
        return ExitCode::from(1);
    }

    let source = match std::fs::read_to_string(&args.source) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("ERROR: could not read '{}': {e}", args.source.display());
            return ExitCode::from(1);
        }
    };
    debug!("read {} bytes from {}", source.len(), args.source.display());

    if args.tokens_only {
        return run_tokens_only(&source);
    }

    let asm = match impc::compile(&source) {
        Ok(asm) => asm,
        Err(CompileError::Diagnostics(diagnostics)) => {
            for diagnostic in &diagnostics {
                print_diagnostic(diagnostic);
            }
            return ExitCode::from(2);
        }
        Err(CompileError::Internal(diagnostic)) => {
            print_diagnostic(&diagnostic);
            return ExitCode::from(1);
        }
    };
    debug!("resolved {} instructions", asm.lines().count());

    let output_path = with_mr_extension(&args.output);
    if let Err(e) = std::fs::write(&output_path, asm) {
        eprintln!("ERROR: could not write '{}': {e}", output_path.display());
        return ExitCode::from(1);
    }
    debug!("wrote {}", output_path.display());

    ExitCode::SUCCESS
}

fn run_tokens_only(source: &str) -> ExitCode {
    let mut lexer = Lexer::new(source);
    loop {
        match lexer.next() {
            Ok(Some(token)) => println!("{}", token.display_line()),
            Ok(None) => break,
            Err(e) => {
                eprintln!("ERROR: {e}");
                return ExitCode::from(2);
            }
        }
    }
    ExitCode::SUCCESS
}

fn with_mr_extension(path: &Path) -> PathBuf {
    if path.extension().and_then(|e| e.to_str()) == Some("mr") {
        path.to_path_buf()
    } else {
        let mut with_ext = path.as_os_str().to_os_string();
        with_ext.push(".mr");
        PathBuf::from(with_ext)
    }
}

/// `ERROR: <message> - '<lexeme>' on line: <n>` or the tokenless
/// `ERROR: <message>` (spec §7's diagnostic format). `Diagnostic`'s
/// `thiserror`-derived `Display` already renders each variant in exactly one
/// of these two shapes, so printing is a passthrough.
fn print_diagnostic(diagnostic: &Diagnostic) {
    println!("{diagnostic}");
}
