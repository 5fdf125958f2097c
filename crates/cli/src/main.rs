use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use symcache_outline::{DecodeResult, Decoder, OutlineConfig};

mod locate;

use locate::{find_artifact, DEFAULT_ARTIFACT_NAME, DEFAULT_CACHE_SUBDIR};

#[derive(Parser)]
#[command(name = "symcache")]
#[command(about = "Decode a language server's document-symbol cache into JSON", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Decoder settings (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cache directory, relative to the project root
    #[arg(long, global = true, default_value = DEFAULT_CACHE_SUBDIR)]
    cache_subdir: String,

    /// File name of the symbol cache artifact
    #[arg(long, global = true, default_value = DEFAULT_ARTIFACT_NAME)]
    artifact_name: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the outline of a project's symbol cache
    Outline(OutlineArgs),

    /// Print the path of the newest symbol cache artifact
    Locate(LocateArgs),

    /// Print the JSON schema of the outline document
    Schema,
}

#[derive(Args)]
struct OutlineArgs {
    /// Project root used to relativize file paths
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Decode this artifact instead of searching the cache directory
    #[arg(long)]
    artifact: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct LocateArgs {
    /// Project root to search
    #[arg(long, default_value = ".")]
    project: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match &cli.command {
        Commands::Outline(args) => run_outline(&cli, args),
        Commands::Locate(args) => run_locate(&cli, args),
        Commands::Schema => {
            let schema = schemars::schema_for!(DecodeResult);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<OutlineConfig> {
    match &cli.config {
        Some(path) => OutlineConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(OutlineConfig::default()),
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path {}", path.display()))
}

fn run_outline(cli: &Cli, args: &OutlineArgs) -> Result<()> {
    let decoder = Decoder::new(load_config(cli)?).context("Invalid decoder config")?;
    let project_root = absolute(&args.project)?;

    let artifact = match &args.artifact {
        Some(path) => Some(path.clone()),
        None => find_artifact(&project_root, &cli.cache_subdir, &cli.artifact_name),
    };

    let result = match artifact {
        Some(path) => {
            log::info!("Decoding {}", path.display());
            decoder.decode_file(&path, &project_root)
        }
        None => {
            log::info!(
                "No {} under {}",
                cli.artifact_name,
                project_root.join(&cli.cache_subdir).display()
            );
            DecodeResult::empty()
        }
    };

    let output = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{output}");
    Ok(())
}

fn run_locate(cli: &Cli, args: &LocateArgs) -> Result<()> {
    let project_root = absolute(&args.project)?;
    let artifact = find_artifact(&project_root, &cli.cache_subdir, &cli.artifact_name);
    println!("{}", json!({ "artifact": artifact }));
    Ok(())
}
