//! CLI argument definitions.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{BackendKind, StoreConfig};
use crate::error::Result;

/// pilot-bridge - per-device PalmOS database storage.
///
/// Keeps each handheld's backup and install partitions, parses PDB/PRC
/// containers and renders application icons.
///
/// Robot Mode: use --robot or --format=json for machine-parseable output.
#[derive(Parser, Debug)]
#[command(name = "pilot-bridge", version, about, long_about = None)]
#[command(propagate_version = true)]
#[allow(clippy::struct_excessive_bools)] // CLI flags naturally use multiple bools
pub struct Cli {
    /// Output format (text for humans, json for agents/scripts)
    #[arg(
        long,
        short = 'f',
        default_value = "text",
        global = true,
        env = "PILOT_BRIDGE_FORMAT"
    )]
    pub format: OutputFormat,

    /// Robot mode: equivalent to --format=json, logs as JSON lines
    #[arg(long, global = true)]
    pub robot: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Config file (default: <config dir>/pilot-bridge/config.toml)
    #[arg(long, global = true, env = "PILOT_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Storage directory, overrides the config file
    #[arg(long, global = true, env = "PILOT_BRIDGE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Storage backend, overrides the config file
    #[arg(long, global = true, env = "PILOT_BRIDGE_BACKEND")]
    pub backend: Option<BackendKind>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with optional color
    #[default]
    Text,
    /// JSON output for scripts and agents
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

impl Cli {
    /// Returns true if output should be JSON (robot mode or explicit --format=json).
    pub const fn use_json(&self) -> bool {
        self.robot || matches!(self.format, OutputFormat::Json | OutputFormat::JsonCompact)
    }

    /// Returns true if output should be compact JSON.
    pub const fn use_compact_json(&self) -> bool {
        matches!(self.format, OutputFormat::JsonCompact)
    }

    /// Config file values with command-line overrides applied.
    pub fn store_config(&self) -> Result<StoreConfig> {
        let mut config = StoreConfig::load(self.config.as_deref())?;
        if let Some(dir) = &self.data_dir {
            config.data_dir.clone_from(dir);
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        Ok(config)
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    // === Devices ===
    /// Manage device namespaces
    #[command(subcommand)]
    Devices(DevicesCommand),

    // === Databases ===
    /// Inspect and move databases in a device's backup partition
    #[command(subcommand)]
    Db(DbCommand),

    /// Stage databases for the next sync
    #[command(subcommand)]
    Install(InstallCommand),

    /// Decode an application's tAIB icon
    Icon(IconArgs),

    // === Storage ===
    /// Print this client's sync identifier
    ComputerId,

    /// Export or import the whole store as a ZIP archive
    #[command(subcommand)]
    Archive(ArchiveCommand),

    /// Show the effective configuration
    Config(ConfigArgs),

    // === Utilities ===
    /// Show version and build information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Subcommand, Debug)]
pub enum DevicesCommand {
    /// List device namespaces
    List,

    /// Create backup and install partitions for a device
    Create {
        /// Device (HotSync user) name
        name: String,
    },

    /// Delete a device and every database in it
    Remove {
        name: String,
    },

    /// Check whether a device exists (exit code 1 if not)
    Exists {
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// List databases in the backup partition
    List {
        device: String,

        /// Parse each database and show its header fields
        #[arg(long, short = 'l')]
        long: bool,
    },

    /// Show a database's header and entries
    Info {
        device: String,
        /// File name, e.g. MemoDB.pdb
        name: String,
    },

    /// Check whether a non-empty database exists in the backup partition
    Exists { device: String, name: String },

    /// Copy a database's raw bytes out of the store
    Export {
        device: String,
        name: String,

        /// Output file (default: ./<name>)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Parse a PDB/PRC file and write it to the backup partition
    Import { device: String, file: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum InstallCommand {
    /// Stage one or more .prc/.pdb files
    Add {
        device: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show the install queue
    List { device: String },

    /// Remove a staged file without installing it
    Discard { device: String, filename: String },

    /// Mark a staged file as installed, moving it to the backup partition
    Promote { device: String, filename: String },
}

#[derive(Args, Debug)]
pub struct IconArgs {
    pub device: String,

    /// Database file name, e.g. Solitaire.prc
    pub file: String,

    /// Write the 2x rendering as PNG
    #[arg(long)]
    pub png: Option<PathBuf>,

    /// Decode every depth in the bitmap chain
    #[arg(long)]
    pub all_depths: bool,
}

#[derive(Subcommand, Debug)]
pub enum ArchiveCommand {
    /// Write every device to a ZIP file
    Export {
        /// Output file (default: pilot-bridge-backup_<timestamp>.zip)
        output: Option<PathBuf>,
    },

    /// Replace the store's contents with a ZIP file's
    Import { archive: PathBuf },
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Only print the config file path
    #[arg(long)]
    pub path: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
