//! CLI driver: reads source (file or interactive line), wires the pipeline
//! scan → parse → resolve → interpret, and maps error flags onto process
//! exit codes (65 for syntax/static errors, 70 for runtime errors).
//!
//! The driver refuses to interpret when parsing or resolving reported any
//! error.  `run` without a filename drops into a REPL whose interpreter —
//! and therefore global environment — persists across lines.

use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use treelox as lox;

use lox::ast::Expr;
use lox::ast_printer::AstPrinter;
use lox::error::LoxError;
use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::resolver::Resolver;
use lox::scanner::Scanner;
use lox::token::Token;

const EXIT_STATIC_ERROR: u8 = 65;
const EXIT_RUNTIME_ERROR: u8 = 70;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox tree-walking interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Emit tokens as JSON objects, one per line
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: PathBuf },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: PathBuf },

    /// Runs a Lox program from a file, or starts a REPL when omitted
    Run { filename: Option<PathBuf> },
}

/// Memory-map a source file.  The scanner borrows the mapping directly, so
/// no copy of the source is made.
fn map_source(filename: &PathBuf) -> Result<Mmap> {
    info!("Mapping file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;

    // SAFETY: the mapping is read-only and lives for the duration of the
    // pipeline; we accept the usual mmap caveat about concurrent truncation.
    let mmap = unsafe { Mmap::map(&file) }.context(format!("Failed to map file {:?}", filename))?;

    info!("Mapped {} bytes from {:?}", mmap.len(), filename);

    Ok(mmap)
}

fn init_logger(to_file: bool) -> Result<()> {
    if !to_file {
        // Minimal logger so `log` macros have a sink.
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
        return Ok(());
    }

    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("treelox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // override with RUST_LOG
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

/// Scan the whole buffer, reporting lex errors as they appear.  Returns the
/// token list (always EOF-terminated) and whether any error was reported.
fn scan(source: &[u8]) -> (Vec<Token>, bool) {
    let mut tokens = Vec::new();
    let mut had_error = false;

    for result in Scanner::new(source) {
        match result {
            Ok(token) => tokens.push(token),
            Err(e) => {
                had_error = true;
                eprintln!("{}", e);
            }
        }
    }

    (tokens, had_error)
}

/// Run one program through the full pipeline against `interpreter`.
/// Returns the exit code the driver should surface (0 on success).
fn run(source: &[u8], interpreter: &mut Interpreter) -> u8 {
    let (tokens, lex_error) = scan(source);

    let (statements, parse_errors) = Parser::new(tokens).parse();
    for e in &parse_errors {
        eprintln!("{}", e);
    }

    if lex_error || !parse_errors.is_empty() {
        return EXIT_STATIC_ERROR;
    }

    let side_table = match Resolver::new().resolve(&statements) {
        Ok(table) => table,
        Err(errors) => {
            for e in &errors {
                eprintln!("{}", e);
            }
            return EXIT_STATIC_ERROR;
        }
    };

    debug!("Resolved {} local binding(s)", side_table.len());

    match interpreter.interpret(&statements, &side_table) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", e);
            EXIT_RUNTIME_ERROR
        }
    }
}

/// Interactive prompt.  One interpreter lives for the whole session, so
/// globals, functions, and classes declared on earlier lines stay defined;
/// an error aborts only the line that caused it.
fn repl() -> Result<()> {
    let mut interpreter = Interpreter::new();
    let stdin = io::stdin();

    print!("> ");
    io::stdout().flush()?;

    for line in stdin.lock().lines() {
        let line = line?;

        if !line.trim().is_empty() {
            run(line.as_bytes(), &mut interpreter);
        }

        print!("> ");
        io::stdout().flush()?;
    }

    Ok(())
}

fn tokenize(source: &[u8], json: bool) -> Result<u8> {
    let mut had_error = false;

    for result in Scanner::new(source) {
        match result {
            Ok(token) => {
                if json {
                    println!("{}", serde_json::to_string(&token)?);
                } else {
                    println!("{}", token);
                }
            }
            Err(e) => {
                had_error = true;
                eprintln!("{}", e);
            }
        }
    }

    Ok(if had_error { EXIT_STATIC_ERROR } else { 0 })
}

fn parse_expression(source: &[u8]) -> Result<Expr, LoxError> {
    let mut tokens = Vec::new();
    for result in Scanner::new(source) {
        tokens.push(result?);
    }

    Parser::new(tokens).parse_expression()
}

fn main() -> Result<ExitCode> {
    let args: Cli = Cli::parse();

    init_logger(args.log)?;

    info!("CLI arguments: {:?}", args);

    let code = match args.commands {
        Commands::Tokenize { filename, json } => {
            let source = map_source(&filename)?;
            tokenize(&source, json)?
        }

        Commands::Parse { filename } => {
            let source = map_source(&filename)?;

            match parse_expression(&source) {
                Ok(expr) => {
                    println!("{}", AstPrinter.print(&expr));
                    0
                }
                Err(e) => {
                    eprintln!("{}", e);
                    EXIT_STATIC_ERROR
                }
            }
        }

        Commands::Evaluate { filename } => {
            let source = map_source(&filename)?;

            match parse_expression(&source) {
                Ok(expr) => {
                    let mut interpreter = Interpreter::new();

                    match interpreter.evaluate_expression(&expr) {
                        Ok(value) => {
                            println!("{}", value);
                            0
                        }
                        Err(e) => {
                            eprintln!("{}", e);
                            EXIT_RUNTIME_ERROR
                        }
                    }
                }
                Err(e) => {
                    eprintln!("{}", e);
                    EXIT_STATIC_ERROR
                }
            }
        }

        Commands::Run { filename } => match filename {
            Some(filename) => {
                let source = map_source(&filename)?;
                let mut interpreter = Interpreter::new();

                run(&source, &mut interpreter)
            }
            None => {
                repl()?;
                0
            }
        },
    };

    Ok(ExitCode::from(code))
}
