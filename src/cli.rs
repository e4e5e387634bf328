//! Command line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// pdfsqueeze: compress a folder of PDFs through a remote service.
#[derive(Debug, Parser)]
#[command(name = "pdfsqueeze", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Application root holding pdfs/, compress_pdfs/ and config.json.
    #[arg(long, global = true, env = "PDFSQUEEZE_HOME")]
    pub home: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Builds the manifest from the PDFs in the source folder.
    Init {
        /// Title written into every output; "filename" uses each file's name.
        #[arg(long, default_value = "")]
        title: String,

        /// Author written into every output.
        #[arg(long, default_value = "")]
        author: String,

        /// Replace an existing manifest.
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Compresses every file listed in the manifest.
    Compress {
        /// Number of parallel workers (overrides settings.toml).
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Shows the layout, pending files and the active key.
    Status,

    /// Manages API keys.
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum KeysAction {
    /// Lists configured keys.
    List,
    /// Adds a public key; the first key added becomes active.
    Add { key: String },
    /// Makes a key the active one.
    Use { key: String },
}
