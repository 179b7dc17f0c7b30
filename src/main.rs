mod archive_patch;
mod audit;
mod backup;
mod binary_patch;
mod builder;
mod config;
mod config_merge;
mod error;
mod ingest;
mod ini;
mod mechsetup;
mod ordered;
mod patch_format;
mod tools;
mod util;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;

use crate::audit::AuditStatus;
use crate::config::{BuildConfig, BuildContext};
use crate::ingest::DirectorySource;

#[derive(Parser)]
#[command(name = "gamepatch", about = "Game patch package builder", version)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply all patch definitions to the install and write the manifest
    Build {
        /// Path to the build config
        #[arg(long, short, default_value = "buildConfig.json")]
        config: PathBuf,
        /// Also write a zstd-compressed copy of the manifest
        #[arg(long)]
        compress: bool,
    },
    /// Check an install against the hashes recorded in a manifest
    Audit {
        /// Path to gamePatch.json (or gamePatch.json.zst)
        #[arg(long, short)]
        manifest: PathBuf,
        /// Game install root
        #[arg(long)]
        install_dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Build { config, compress } => {
            println!("Building patch package...");
            println!("  Config: {}", config.display());

            let start = Instant::now();
            let config = BuildConfig::load(&config)?;
            let ctx = BuildContext::from_config(&config)?;
            let source = DirectorySource::new(&ctx.patches_dir);
            let (_, summary) = builder::build_package(&ctx, &source, compress)?;
            let elapsed = start.elapsed();

            println!("\nPatch package built successfully!");
            println!("  Binary edits: {}", summary.binary_edits);
            println!("  Binary mismatches: {}", summary.binary_errors);
            println!("  Archive fragments: {}", summary.archive_fragments);
            println!("  Setup records: {}", summary.records_written);
            println!("  Config keys set: {}", summary.keys_set);
            println!("  Config keys created: {}", summary.keys_created);
            println!("  Manifest: {}", summary.manifest_path.display());
            if let Some(path) = &summary.compressed_path {
                println!("  Compressed: {}", path.display());
            }
            println!("  Time elapsed: {:.3}s", elapsed.as_secs_f64());

            if summary.binary_errors > 0 {
                log::warn!("{} binary edits did not match and were skipped", summary.binary_errors);
            }
        }
        Commands::Audit { manifest, install_dir } => {
            println!("Auditing install...");
            println!("  Manifest: {}", manifest.display());
            println!("  Install: {}", install_dir.display());

            let package = audit::read_manifest(&manifest)?;
            let entries = audit::audit_install(&package, &install_dir)?;
            let failed = entries.iter().filter(|e| e.status != AuditStatus::Match).count();

            for entry in entries.iter().filter(|e| e.status != AuditStatus::Match) {
                match &entry.status {
                    AuditStatus::Mismatch { actual } => println!(
                        "  {}: expected {}, found {actual}",
                        entry.target_path, entry.expected
                    ),
                    _ => println!("  {}: missing ({})", entry.target_path, entry.file.display()),
                }
            }

            println!("\n  Files checked: {}", entries.len());
            println!("  Files failing: {failed}");
            if failed > 0 {
                anyhow::bail!("{failed} of {} files do not match the manifest", entries.len());
            }
        }
    }

    Ok(())
}
