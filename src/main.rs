//! pilot-bridge CLI - per-device PalmOS database storage.
//!
//! Provides both human-friendly and agent-friendly (robot mode) interfaces.
#![forbid(unsafe_code)]

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::Parser;
use console::style;
use serde::Serialize;

use pilot_bridge::cli::{
    self, ArchiveCommand, Cli, Commands, DbCommand, DevicesCommand, InstallCommand,
};
use pilot_bridge::config::default_config_path;
use pilot_bridge::error::{Result, ResultExt, StoreError};
use pilot_bridge::icon::{self, IconBitmap};
use pilot_bridge::logging::init_logging;
use pilot_bridge::pdb::{DatabaseSummary, Entries};
use pilot_bridge::store::{DeviceStore, InstallFile, default_archive_name};

/// Build information embedded at compile time.
mod build_info {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    pub fn git_sha() -> &'static str {
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
    }

    pub fn git_dirty() -> &'static str {
        option_env!("VERGEN_GIT_DIRTY").unwrap_or("false")
    }

    pub fn build_timestamp() -> &'static str {
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown")
    }

    pub fn rustc_semver() -> &'static str {
        option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown")
    }

    pub fn target() -> &'static str {
        option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown")
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color || !io::stdout().is_terminal() {
        console::set_colors_enabled(false);
    }
    if cli.no_color || !io::stderr().is_terminal() {
        console::set_colors_enabled_stderr(false);
    }
    init_logging(cli.robot, cli.verbose, cli.quiet);

    if let Err(e) = run(&cli).await {
        output_error(&cli, &e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        None => print_quick_start(cli),
        Some(Commands::Devices(cmd)) => cmd_devices(cli, cmd).await,
        Some(Commands::Db(cmd)) => cmd_db(cli, cmd).await,
        Some(Commands::Install(cmd)) => cmd_install(cli, cmd).await,
        Some(Commands::Icon(args)) => cmd_icon(cli, args).await,
        Some(Commands::ComputerId) => cmd_computer_id(cli).await,
        Some(Commands::Archive(cmd)) => cmd_archive(cli, cmd).await,
        Some(Commands::Config(args)) => cmd_config(cli, args),
        Some(Commands::Version) => cmd_version(cli),
        Some(Commands::Completions(args)) => cmd_completions(cli, args),
    }
}

fn open_store(cli: &Cli) -> Result<DeviceStore> {
    cli.store_config()?.open_store()
}

// === Quick Start ===

#[derive(Serialize)]
struct RobotQuickStart {
    tool: &'static str,
    version: &'static str,
    description: &'static str,
    commands: Vec<(&'static str, &'static str)>,
    output_modes: OutputModes,
}

#[derive(Serialize)]
struct OutputModes {
    human: &'static str,
    robot: &'static str,
    compact: &'static str,
}

const QUICK_START: &[(&str, &str)] = &[
    ("pilot-bridge devices list", "List devices"),
    ("pilot-bridge devices create <NAME>", "Create a device"),
    ("pilot-bridge db list <DEVICE> -l", "List backed-up databases"),
    ("pilot-bridge install add <DEVICE> <FILE>...", "Stage .prc/.pdb files"),
    ("pilot-bridge icon <DEVICE> <FILE>", "Show an application icon"),
    ("pilot-bridge archive export", "Back up the whole store"),
];

fn print_quick_start(cli: &Cli) -> Result<()> {
    if cli.use_json() {
        let help = RobotQuickStart {
            tool: "pilot-bridge",
            version: build_info::VERSION,
            description: "Per-device PalmOS database storage",
            commands: QUICK_START.to_vec(),
            output_modes: OutputModes {
                human: "--format=text (default)",
                robot: "--robot or --format=json",
                compact: "--format=json-compact",
            },
        };
        return output_json(cli, &help);
    }

    println!(
        "{} {} - PalmOS database storage\n",
        style("pilot-bridge").bold().cyan(),
        build_info::VERSION
    );
    println!("{}", style("QUICK START").bold().underlined());
    println!();
    for (command, what) in QUICK_START {
        println!("  {:<46} {what}", style(command).green());
    }
    println!();
    println!("Run {} for full help", style("pilot-bridge --help").yellow());
    Ok(())
}

// === Devices ===

async fn cmd_devices(cli: &Cli, cmd: &DevicesCommand) -> Result<()> {
    let store = open_store(cli)?;
    match cmd {
        DevicesCommand::List => {
            let devices = store.list_devices().await?;
            if cli.use_json() {
                output_json(cli, &serde_json::json!({ "devices": devices }))?;
            } else if devices.is_empty() {
                println!("{}", style("No devices").yellow());
                println!("Create one with `pilot-bridge devices create <NAME>`");
            } else {
                for d in &devices {
                    println!("{d}");
                }
            }
        }
        DevicesCommand::Create { name } => {
            store.create_device(name).await?;
            report(cli, &serde_json::json!({ "device": name, "created": true }), || {
                format!("Device {} ready", style(name).green())
            })?;
        }
        DevicesCommand::Remove { name } => {
            store.remove_device(name).await?;
            report(cli, &serde_json::json!({ "device": name, "removed": true }), || {
                format!("Device {name} removed")
            })?;
        }
        DevicesCommand::Exists { name } => {
            let exists = store.device_exists(name).await?;
            if cli.use_json() {
                output_json(cli, &serde_json::json!({ "device": name, "exists": exists }))?;
            } else if !cli.quiet {
                println!("{}", if exists { "yes" } else { "no" });
            }
            if !exists {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

// === Databases ===

#[derive(Serialize)]
#[serde(untagged)]
enum EntryInfo {
    Record {
        index: usize,
        unique_id: u32,
        attributes: u8,
        size: usize,
    },
    Resource {
        index: usize,
        #[serde(rename = "type")]
        type_code: String,
        id: u16,
        size: usize,
    },
}

fn entry_infos(entries: &Entries) -> Vec<EntryInfo> {
    match entries {
        Entries::Records(records) => records
            .iter()
            .enumerate()
            .map(|(index, r)| EntryInfo::Record {
                index,
                unique_id: r.unique_id,
                attributes: r.attributes,
                size: r.data.len(),
            })
            .collect(),
        Entries::Resources(resources) => resources
            .iter()
            .enumerate()
            .map(|(index, r)| EntryInfo::Resource {
                index,
                type_code: r.type_code.to_string(),
                id: r.resource_id,
                size: r.data.len(),
            })
            .collect(),
    }
}

fn print_summary_line(s: &DatabaseSummary) {
    println!(
        "{:<36} {} {}/{} v{} {:>5} entries",
        style(&s.file_name).green(),
        s.kind,
        s.type_code,
        s.creator,
        s.version,
        s.entry_count
    );
}

async fn cmd_db(cli: &Cli, cmd: &DbCommand) -> Result<()> {
    let store = open_store(cli)?;
    match cmd {
        DbCommand::List { device, long } => {
            if *long {
                let summaries: Vec<DatabaseSummary> = store
                    .list_all_databases(device)
                    .await?
                    .iter()
                    .map(pilot_bridge::pdb::Database::summary)
                    .collect();
                if cli.use_json() {
                    output_json(cli, &summaries)?;
                } else {
                    summaries.iter().for_each(print_summary_line);
                }
            } else {
                let files = store.list_backup_files(device).await?;
                if cli.use_json() {
                    output_json(cli, &serde_json::json!({ "device": device, "databases": files }))?;
                } else if files.is_empty() && !cli.quiet {
                    println!("{}", style("Backup partition is empty").yellow());
                } else {
                    files.iter().for_each(|f| println!("{f}"));
                }
            }
        }
        DbCommand::Info { device, name } => {
            let db = store.read_database(device, name).await?;
            let summary = db.summary();
            let entries = entry_infos(db.entries());
            if cli.use_json() {
                output_json(
                    cli,
                    &serde_json::json!({ "database": summary, "entries": entries }),
                )?;
            } else {
                println!("{}: {}", style("Name").bold(), summary.name);
                println!("{}: {}", style("Kind").bold(), summary.kind);
                println!("{}: {}", style("Type").bold(), summary.type_code);
                println!("{}: {}", style("Creator").bold(), summary.creator);
                println!("{}: {}", style("Version").bold(), summary.version);
                println!("{}: 0x{:04x}", style("Attributes").bold(), summary.attributes.0);
                if let Some(at) = summary.modified_at {
                    println!("{}: {at}", style("Modified").bold());
                }
                println!("{}: {}", style("Entries").bold(), summary.entry_count);
                for entry in &entries {
                    match entry {
                        EntryInfo::Record { index, unique_id, attributes, size } => println!(
                            "  #{index:<4} uid {unique_id:06x} attr {attributes:02x} {size} bytes"
                        ),
                        EntryInfo::Resource { type_code, id, size, .. } => {
                            println!("  {type_code} {id:<6} {size} bytes");
                        }
                    }
                }
            }
        }
        DbCommand::Exists { device, name } => {
            let exists = store.database_exists(device, name).await?;
            if cli.use_json() {
                output_json(
                    cli,
                    &serde_json::json!({ "device": device, "database": name, "exists": exists }),
                )?;
            } else if !cli.quiet {
                println!("{}", if exists { "yes" } else { "no" });
            }
            if !exists {
                std::process::exit(1);
            }
        }
        DbCommand::Export { device, name, output } => {
            let bytes = store.read_database_buffer(device, name).await?;
            let output = output.clone().unwrap_or_else(|| PathBuf::from(name));
            tokio::fs::write(&output, &bytes).await?;
            report(
                cli,
                &serde_json::json!({ "database": name, "output": output, "size": bytes.len() }),
                || format!("Wrote {} ({} bytes)", output.display(), bytes.len()),
            )?;
        }
        DbCommand::Import { device, file } => {
            let input = InstallFile::from_path(file).await?;
            let db = input.parse()?;
            let written = store.write_database(device, &db).await?;
            report(
                cli,
                &serde_json::json!({ "device": device, "source": input.name, "database": written }),
                || format!("Imported {} as {}", input.name, style(&written).green()),
            )?;
        }
    }
    Ok(())
}

// === Install queue ===

async fn cmd_install(cli: &Cli, cmd: &InstallCommand) -> Result<()> {
    let store = open_store(cli)?;
    match cmd {
        InstallCommand::Add { device, files } => {
            let mut staged = Vec::new();
            for path in files {
                let file = InstallFile::from_path(path).await?;
                let token = store.stage_for_install(device, &file).await?;
                staged.push(serde_json::json!({
                    "filename": token.filename(),
                    "database": token.database().header.name,
                    "backup_name": token.backup_name(),
                }));
                if !cli.use_json() && !cli.quiet {
                    println!(
                        "Staged {} ({})",
                        style(token.filename()).green(),
                        token.database().header.name
                    );
                }
            }
            if cli.use_json() {
                output_json(cli, &serde_json::json!({ "device": device, "staged": staged }))?;
            }
        }
        InstallCommand::List { device } => {
            let queue = store.list_install_queue(device).await?;
            if cli.use_json() {
                let items: Vec<_> = queue
                    .iter()
                    .map(|(filename, db)| {
                        serde_json::json!({ "filename": filename, "database": db.summary() })
                    })
                    .collect();
                output_json(cli, &serde_json::json!({ "device": device, "queue": items }))?;
            } else if queue.is_empty() {
                println!("{}", style("Install queue is empty").yellow());
            } else {
                for (filename, db) in queue.iter() {
                    println!("{:<36} -> {}", style(filename).green(), db.file_name());
                }
            }
        }
        InstallCommand::Discard { device, filename } => {
            store.discard_staged_install(device, filename).await?;
            report(
                cli,
                &serde_json::json!({ "outcome": "discarded", "filename": filename }),
                || format!("Discarded {filename}"),
            )?;
        }
        InstallCommand::Promote { device, filename } => {
            let token = store
                .staged_installs(device)
                .await?
                .into_iter()
                .find(|s| s.filename() == filename)
                .ok_or_else(|| StoreError::StagedFileNotFound {
                    filename: filename.clone(),
                })?;
            let outcome = store.promote(token).await?;
            report(cli, &outcome, || format!("Promoted {filename}"))?;
        }
    }
    Ok(())
}

// === Icons ===

async fn cmd_icon(cli: &Cli, args: &cli::IconArgs) -> Result<()> {
    let store = open_store(cli)?;
    let db = store.read_database(&args.device, &args.file).await?;
    let bitmaps: Vec<IconBitmap> = if args.all_depths {
        icon::decode_icon_depths(&db)
    } else {
        vec![icon::decode_icon(&db)]
    };
    let fallback = bitmaps.first().is_some_and(IconBitmap::is_fallback);

    if let (Some(png), Some(first)) = (&args.png, bitmaps.first()) {
        icon::save_icon_png(first, png)?;
    }

    if cli.use_json() {
        // Packed rows, most significant bits first, `row_bytes` per row.
        let pixels: Vec<String> = bitmaps.iter().map(|b| BASE64.encode(&b.data)).collect();
        return output_json(
            cli,
            &serde_json::json!({
                "database": db.file_name(),
                "fallback": fallback,
                "bitmaps": bitmaps,
                "pixels_base64": pixels,
                "png": args.png,
            }),
        );
    }

    if fallback && !cli.quiet {
        println!("{}", style("No usable tAIB icon, showing placeholder").yellow());
    }
    for bitmap in &bitmaps {
        println!(
            "{}x{} {} bpp, v{}, {} bytes/row",
            bitmap.width, bitmap.height, bitmap.pixel_size, bitmap.version, bitmap.row_bytes
        );
        match icon::ascii_art(bitmap) {
            Ok(art) => println!("{art}\n"),
            Err(e) => println!("{}\n", style(e).dim()),
        }
    }
    if let Some(png) = &args.png {
        println!("Wrote {}", png.display());
    }
    Ok(())
}

// === Storage ===

async fn cmd_computer_id(cli: &Cli) -> Result<()> {
    let store = open_store(cli)?;
    let id = store.computer_id().await?;
    if cli.use_json() {
        output_json(
            cli,
            &serde_json::json!({ "computer_id": id, "hex": format!("0x{id:08x}") }),
        )
    } else {
        println!("0x{id:08x} ({id})");
        Ok(())
    }
}

async fn cmd_archive(cli: &Cli, cmd: &ArchiveCommand) -> Result<()> {
    let store = open_store(cli)?;
    match cmd {
        ArchiveCommand::Export { output } => {
            let output = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(default_archive_name(&chrono::Local::now())));
            let bytes = store.export_archive().await?;
            tokio::fs::write(&output, &bytes).await?;
            report(
                cli,
                &serde_json::json!({ "output": output, "size": bytes.len() }),
                || format!("Wrote {} ({} bytes)", style(output.display()).green(), bytes.len()),
            )?;
        }
        ArchiveCommand::Import { archive } => {
            let bytes = read_input(archive).await?;
            let summary = store.import_archive(&bytes).await?;
            report(cli, &summary, || {
                format!(
                    "Imported {} files for {} devices",
                    summary.files, summary.devices
                )
            })?;
        }
    }
    Ok(())
}

fn cmd_config(cli: &Cli, args: &cli::ConfigArgs) -> Result<()> {
    let path = cli.config.clone().or_else(default_config_path);
    if args.path {
        let shown = path.as_deref().map(|p| p.display().to_string());
        if cli.use_json() {
            return output_json(cli, &serde_json::json!({ "path": shown }));
        }
        println!("{}", shown.unwrap_or_else(|| "(none)".to_string()));
        return Ok(());
    }

    let config = cli.store_config()?;
    if cli.use_json() {
        return output_json(cli, &config);
    }
    if let Some(path) = &path {
        println!("{}: {}", style("Config file").bold(), path.display());
    }
    println!("{}: {:?}", style("Backend").bold(), config.backend);
    println!("{}: {}", style("Data dir").bold(), config.data_dir.display());
    println!("{}: {}", style("Root namespace").bold(), config.root_namespace);
    Ok(())
}

fn cmd_version(cli: &Cli) -> Result<()> {
    if cli.use_json() {
        return output_json(
            cli,
            &serde_json::json!({
                "version": build_info::VERSION,
                "git_sha": build_info::git_sha(),
                "git_dirty": build_info::git_dirty() == "true",
                "build_timestamp": build_info::build_timestamp(),
                "rustc_version": build_info::rustc_semver(),
                "target": build_info::target(),
            }),
        );
    }
    println!("pilot-bridge {}", build_info::VERSION);
    println!(
        "git: {}{}",
        build_info::git_sha(),
        if build_info::git_dirty() == "true" {
            " (dirty)"
        } else {
            ""
        }
    );
    println!("built: {}", build_info::build_timestamp());
    println!("rustc: {}", build_info::rustc_semver());
    println!("target: {}", build_info::target());
    Ok(())
}

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
fn cmd_completions(_cli: &Cli, args: &cli::CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    clap_complete::generate(
        args.shell,
        &mut Cli::command(),
        "pilot-bridge",
        &mut io::stdout(),
    );
    Ok(())
}

// === Utility Functions ===

async fn read_input(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// JSON document in robot mode, `message()` otherwise (unless quiet).
fn report<T: Serialize>(cli: &Cli, data: &T, message: impl FnOnce() -> String) -> Result<()> {
    if cli.use_json() {
        output_json(cli, data)
    } else {
        if !cli.quiet {
            println!("{}", message());
        }
        Ok(())
    }
}

fn output_json<T: Serialize>(cli: &Cli, data: &T) -> Result<()> {
    let json = if cli.use_compact_json() {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    }
    .map_err(|e| StoreError::Other(format!("Failed to encode JSON: {e}")))?;
    println!("{json}");
    Ok(())
}

fn output_error(cli: &Cli, error: &StoreError) {
    if cli.use_json() {
        let json = serde_json::json!({
            "error": true,
            "message": error.to_string(),
            "suggestion": error.suggestion(),
            "recoverable": error.is_user_recoverable(),
        });
        eprintln!("{json:#}");
    } else {
        eprintln!("{}: {}", style("Error").red().bold(), error);
        if let Some(suggestion) = error.suggestion() {
            eprintln!("{}: {}", style("Hint").yellow(), suggestion);
        }
    }
}
