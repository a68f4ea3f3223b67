use std::{io::IsTerminal, path::PathBuf};

use clap::{Parser, ValueEnum};

/// One-line usage shown for missing or malformed arguments.
pub const USAGE: &str = "Usage: allocscope <MODULE> <TYPE> <METHOD> [--pdb FILE] [--exclude PREFIX]... [--json] [--color WHEN] [-v]";

/// allocscope - report the heap allocations reachable from a .NET method
#[derive(Debug, Parser)]
#[command(name = "allocscope", version, about, long_about = None)]
pub struct Cli {
    /// Path to the .NET module (.exe or .dll).
    #[arg(value_name = "MODULE")]
    pub module: PathBuf,

    /// Type declaring the entry method; a name containing '.' is matched as a full name.
    #[arg(value_name = "TYPE")]
    pub type_name: String,

    /// Name of the entry method.
    #[arg(value_name = "METHOD")]
    pub method: String,

    /// Portable PDB with the module's sequence points. Defaults to the module path with a .pdb extension.
    #[arg(long, value_name = "FILE")]
    pub pdb: Option<PathBuf>,

    /// Namespace prefix whose methods are never followed. Repeatable; replaces the default "System".
    #[arg(long, value_name = "PREFIX")]
    pub exclude: Vec<String>,

    /// Emit the report as JSON instead of text.
    #[arg(long)]
    pub json: bool,

    /// Colour allocation lines: auto, always or never.
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto, value_name = "WHEN")]
    pub color: ColorChoice,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// Resolves `auto` against whether stdout is a terminal.
    pub fn enabled(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => std::io::stdout().is_terminal(),
        }
    }
}

impl Cli {
    /// The debug symbols to load, and whether the user asked for them explicitly.
    pub fn pdb_path(&self) -> (PathBuf, bool) {
        match &self.pdb {
            Some(path) => (path.clone(), true),
            None => (self.module.with_extension("pdb"), false),
        }
    }
}
