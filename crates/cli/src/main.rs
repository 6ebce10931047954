mod session;

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use weft_core::{compile_into, ModuleTree};

/// Weft branching-story toolchain.
#[derive(Parser)]
#[command(name = "weft", version, about = "Weft story compiler and player")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile story sources and report the passages found
    Compile {
        /// Story source files, compiled in order (later files override)
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Emit the full compiled book as JSON
        #[arg(long)]
        json: bool,
        /// Print each passage's generated-unit listing
        #[arg(long, conflicts_with = "json")]
        listing: bool,
    },

    /// Play a story in the terminal
    Run {
        /// Story source files, compiled in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Passage to show first
        #[arg(long, default_value = "Start")]
        start: String,
        /// Disable the undo/redo commands
        #[arg(long)]
        no_undo: bool,
        /// Disable the save/load commands
        #[arg(long)]
        no_saves: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Compile {
            files,
            json,
            listing,
        } => cmd_compile(&files, json, listing),
        Commands::Run {
            files,
            start,
            no_undo,
            no_saves,
        } => cmd_run(&files, &start, no_undo, no_saves),
    }
}

fn compile_files(files: &[PathBuf]) -> ModuleTree {
    let mut tree = ModuleTree::new();
    for path in files {
        match fs::read_to_string(path) {
            Ok(text) => compile_into(&mut tree, &text),
            Err(e) => {
                eprintln!("error: {}: {}", path.display(), e);
                process::exit(1);
            }
        }
    }
    tree
}

fn cmd_compile(files: &[PathBuf], json: bool, listing: bool) {
    let book = compile_files(files).flatten();
    if json {
        match serde_json::to_string_pretty(&book) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        }
        return;
    }
    if listing {
        for (name, passage) in &book {
            println!(":: {}", name);
            println!("{}", passage.listing);
        }
        return;
    }
    for (name, passage) in &book {
        if passage.tags.is_empty() {
            println!("{}", name);
        } else {
            println!("{} [{}]", name, passage.tags.join("]["));
        }
    }
    println!("{} passage(s)", book.len());
}

fn cmd_run(files: &[PathBuf], start: &str, no_undo: bool, no_saves: bool) {
    let tree = compile_files(files);
    if let Err(e) = session::play(tree, start, no_undo, no_saves) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
