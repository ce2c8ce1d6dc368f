//! extsd CLI - reports the external SD card of the current device.
//!
//! All detection happens in `extsd-core`; this binary only gathers the
//! configuration, calls the core entry points and prints the results.

mod render;

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use extsd_core::{CapabilityTier, ExternalVolumeInfo, NixStatFs, ProbeConfig};
use serde::Serialize;

use render::{MountsReport, StatusReport};

/// External SD card detection tool.
#[derive(Parser)]
#[command(name = "extsd")]
#[command(about = "Find, verify and measure the external SD card", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON config file (defaults to <config dir>/extsd/config.json if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Platform capability tier: legacy, modern or multi-directory
    #[arg(long, env = "EXTSD_TIER", global = true)]
    tier: Option<CapabilityTier>,

    /// Derive the capability tier from an Android API level
    #[arg(
        long,
        env = "EXTSD_API_LEVEL",
        global = true,
        conflicts_with = "tier",
        value_parser = CapabilityTier::parse_api_level
    )]
    api_level: Option<CapabilityTier>,

    /// Mount table to read instead of /proc/mounts
    #[arg(long, env = "EXTSD_MOUNT_TABLE", global = true)]
    mount_table: Option<PathBuf>,

    /// Platform storage directory, primary first (repeatable)
    #[arg(long = "external-dir", global = true)]
    external_dirs: Vec<PathBuf>,

    /// Subdirectory appended to each volume under the storage root
    #[arg(long, global = true)]
    app_subdir: Option<PathBuf>,

    /// Accept a mount table candidate without the write probe
    #[arg(long, global = true)]
    no_verify: bool,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the external SD card path, writability and usage (default).
    Status,
    /// Print the raw mount table and the entry picked as the SD card.
    Mounts,
    /// Run the write probe against a directory.
    Probe {
        /// Directory to probe
        path: PathBuf,
    },
    /// Print block statistics for the filesystem containing a path.
    Stats {
        /// Any path on the filesystem
        path: PathBuf,
    },
    /// Print the effective configuration.
    Config,
}

#[derive(Serialize)]
struct ProbeReport<'a> {
    path: &'a Path,
    writable: bool,
    error: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", report(e.as_ref()));
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    // RUST_LOG, when set, overrides the flag
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = effective_config(&cli)?;
    log::debug!("effective config: {:?}", config);

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => {
            let info = ExternalVolumeInfo::from_config(&config);
            let status = StatusReport {
                tier: info.tier(),
                exists: info.exists(),
                path: info.path().map(Path::to_path_buf),
                writability: info.writability().clone(),
                block_info: info.block_info_state(),
            };
            if cli.json {
                print_json(&status)?;
            } else {
                print!("{}", render::render_status(&status));
            }
        }
        Commands::Mounts => {
            let info = ExternalVolumeInfo::from_config(&config);
            let mounts = MountsReport::from_table(info.mount_table(), &config.mount_table);
            if cli.json {
                print_json(&mounts)?;
            } else {
                print!("{}", render::render_mount_table(&mounts));
            }
        }
        Commands::Probe { path } => {
            let result = extsd_core::probe::probe_write(&path);
            let probe = ProbeReport {
                path: &path,
                writable: result.is_ok(),
                error: result.err().map(|e| e.report()),
            };
            if cli.json {
                print_json(&probe)?;
            } else {
                match &probe.error {
                    None => println!("{} is writable", path.display()),
                    Some(reason) => println!("{} is not writable: {}", path.display(), reason),
                }
            }
        }
        Commands::Stats { path } => {
            let info =
                extsd_core::stats::block_info(&NixStatFs, &path, config.tier.stats_strategy())?;
            if cli.json {
                print_json(&info)?;
            } else {
                println!("Path: {}", info.path.display());
                println!("Block Size: {} bytes", info.block_size_bytes);
                print!("{}", render::render_usage(&info));
            }
        }
        Commands::Config => print_json(&config)?,
    }

    Ok(())
}

/// Layers defaults, the config file and command line flags.
fn effective_config(cli: &Cli) -> extsd_core::Result<ProbeConfig> {
    let mut config = match &cli.config {
        Some(path) => ProbeConfig::load(path)?,
        None => ProbeConfig::load_default()?,
    };

    if let Some(tier) = cli.tier.or(cli.api_level) {
        config.tier = tier;
    }
    if let Some(mount_table) = &cli.mount_table {
        config.mount_table = mount_table.clone();
    }
    if !cli.external_dirs.is_empty() {
        config.external_dirs = cli.external_dirs.clone();
    }
    if let Some(subdir) = &cli.app_subdir {
        config.app_subdir = Some(subdir.clone());
    }
    if cli.no_verify {
        config.verify_mount_candidate = false;
    }

    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Formats an error with its source chain.
fn report(e: &dyn Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
