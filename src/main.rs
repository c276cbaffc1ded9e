//! corevm - CLI Entry Point
//!
//! Commands:
//! - `corevm run <config>` - Run a match and print the report
//! - `corevm dump <config>` - Print the arena after warrior placement
//! - `corevm asm <source>` - Assemble a warrior to base64
//! - `corevm disasm <base64>` - Disassemble a warrior

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Parser, Subcommand};
use tracing::Level;

use corevm::{assemble, disassemble, Game, GameConfig, JsonLines, MatchReport};

#[derive(Parser)]
#[command(name = "corevm")]
#[command(version = "0.1.0")]
#[command(about = "A 16-bit Core War arena: warriors fight for a shared 64KB memory")]
struct Cli {
    /// Log placement and thread deaths to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a match to completion
    Run {
        /// Path to the JSON match configuration
        config: String,
        /// Write the event log here instead of stdout
        #[arg(short, long)]
        log: Option<String>,
        /// Override the placement seed
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Place the warriors and print the arena as hex
    Dump {
        /// Path to the JSON match configuration
        config: String,
        /// Override the placement seed
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Assemble a warrior and print it as base64
    Asm {
        /// Path to the source file
        source: String,
    },
    /// Disassemble a base64 warrior
    Disasm {
        /// The program, base64 encoded
        program: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .without_time()
        .with_target(false)
        .with_max_level(level)
        .try_init();

    let result = match cli.command {
        Commands::Run { config, log, seed } => run_match(&config, log.as_deref(), seed),
        Commands::Dump { config, seed } => dump_arena(&config, seed),
        Commands::Asm { source } => assemble_file(&source),
        Commands::Disasm { program } => disassemble_program(&program),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn load_game(path: &str, seed: Option<u64>) -> Result<Game, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path, e))?;
    let mut config = GameConfig::from_json(&text)?;
    if seed.is_some() {
        config.seed = seed;
    }
    Ok(Game::new(config)?)
}

fn run_match(path: &str, log: Option<&str>, seed: Option<u64>) -> CliResult {
    let mut game = load_game(path, seed)?;

    let report = match log {
        Some(log_path) => {
            let file = File::create(Path::new(log_path))
                .map_err(|e| format!("failed to create {}: {}", log_path, e))?;
            let mut sink = JsonLines::new(BufWriter::new(file));
            let report = game.run(&mut sink)?;
            sink.into_inner().flush()?;
            report
        }
        None => {
            let mut sink = JsonLines::new(io::stdout().lock());
            game.run(&mut sink)?
        }
    };

    print_report(&report)
}

fn print_report(report: &MatchReport) -> CliResult {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, report)?;
    writeln!(out)?;
    Ok(())
}

fn dump_arena(path: &str, seed: Option<u64>) -> CliResult {
    let game = load_game(path, seed)?;
    print!("{}", game.memory().hex_dump());
    Ok(())
}

fn assemble_file(source_path: &str) -> CliResult {
    let source = std::fs::read_to_string(source_path)
        .map_err(|e| format!("failed to read {}: {}", source_path, e))?;
    let program = assemble(&source)?;
    println!("{}", STANDARD.encode(program));
    Ok(())
}

fn disassemble_program(encoded: &str) -> CliResult {
    let program = STANDARD.decode(encoded.trim())?;
    print!("{}", disassemble(&program));
    Ok(())
}
