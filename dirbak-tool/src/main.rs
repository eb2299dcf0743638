use anyhow::Context;
use clap::Parser;
use dirbak_lib::{Archiver, CollisionPolicy, Config};
use std::{collections::HashMap, env, fs, path::PathBuf};
use tracing::debug;

mod logging;
mod process;

use process::Selection;

#[derive(Parser, Debug)]
#[command(author, version, about = "Copy a directory to <dir>/<name>-copy and/or zip it to <dir>/<name>.zip", long_about = None)]
pub struct Cli {
    /// Directory to back up
    #[arg()]
    pub source: Option<String>,

    /// Directory that receives the <name>-copy folder
    #[arg(short, long)]
    pub backup_dir: Option<String>,

    /// Directory that receives the <name>.zip archive
    #[arg(short, long)]
    pub zip_dir: Option<String>,

    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Dry run (just list files and targets)
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub dry: bool,

    /// Patterns to skip (can be specified multiple times)
    #[arg(short = 's', long)]
    pub skip: Vec<String>,

    /// What to do when the zip file already exists [overwrite|fail]
    #[arg(long, value_name = "POLICY")]
    pub on_zip_collision: Option<CollisionPolicy>,

    /// Generate YAML config to stdout
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub generate_yaml_config: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    // Step 1: Read environment
    let vars: HashMap<String, String> = env::vars().collect();
    let env_config = read_env(&vars)?;

    // Step 2: Read config file (if any)
    let mut file_config = Config::default();
    if let Some(path) = cli.config.clone().or(env_config.config.clone()) {
        file_config = read_config_file(&path)?;
    }

    // Step 3: Merge configs: env < file < CLI
    let merged = merge_configs(env_config, file_config, cli_to_config(&cli));
    debug!(?merged, "merged configuration");

    if cli.generate_yaml_config {
        let yaml = serde_yaml::to_string(&merged)?;
        println!("{yaml}");
        return Ok(0);
    }

    let Some(source) = merged.source.as_deref().filter(|s| !s.is_empty()) else {
        eprintln!(
            "Error: no source directory selected (SOURCE argument, config:source or DIRBAK_SOURCE)"
        );
        return Ok(2);
    };

    let selection = Selection {
        source: PathBuf::from(source),
        backup_dir: non_empty_path(merged.backup_dir.as_deref()),
        zip_dir: non_empty_path(merged.zip_dir.as_deref()),
    };

    if selection.backup_dir.is_none() && selection.zip_dir.is_none() {
        eprintln!("No backup or zip directory selected. Nothing to do.");
        return Ok(3);
    }

    let archiver = Archiver::new()
        .with_skip_patterns(merged.skip.as_deref().unwrap_or_default())?
        .with_zip_collision(merged.zip_collision.unwrap_or_default());

    if merged.dry.unwrap_or(false) {
        process::dry_run(&archiver, &selection)?;
        return Ok(0);
    }

    Ok(process::run(&archiver, &selection).exit_code())
}

fn non_empty_path(value: Option<&str>) -> Option<PathBuf> {
    value.filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn parse_flag(value: &str) -> bool {
    value == "true" || value == "1" || value.eq_ignore_ascii_case("yes")
}

/// Reads environment variables prefixed with DIRBAK_
fn read_env(vars: &HashMap<String, String>) -> anyhow::Result<Config> {
    let mut cfg = Config::default();

    macro_rules! get_env {
        ($key:expr) => {
            vars.get(&format!("DIRBAK_{}", $key)).cloned()
        };
    }

    cfg.source = get_env!("SOURCE");
    cfg.backup_dir = get_env!("BACKUP_DIR");
    cfg.zip_dir = get_env!("ZIP_DIR");
    cfg.config = get_env!("CONFIG");
    cfg.dry = get_env!("DRY").map(|v| parse_flag(&v));
    cfg.skip = get_env!("SKIP").map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    });
    cfg.zip_collision = get_env!("ZIP_COLLISION")
        .map(|v| {
            v.parse::<CollisionPolicy>()
                .map_err(anyhow::Error::msg)
                .context("DIRBAK_ZIP_COLLISION")
        })
        .transpose()?;
    Ok(cfg)
}

/// Reads YAML or JSON config from file
fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading config file {path}"))?;
    let lower = path.to_lowercase();
    let cfg = if lower.ends_with(".json") {
        serde_json::from_str(&content).with_context(|| format!("parsing JSON config {path}"))?
    } else {
        serde_yaml::from_str(&content).with_context(|| format!("parsing YAML config {path}"))?
    };
    Ok(cfg)
}

/// Converts CLI struct into Config
fn cli_to_config(cli: &Cli) -> Config {
    Config {
        source: cli.source.clone(),
        backup_dir: cli.backup_dir.clone(),
        zip_dir: cli.zip_dir.clone(),
        config: cli.config.clone(),
        dry: cli.dry.then_some(true),
        skip: if cli.skip.is_empty() {
            None
        } else {
            Some(cli.skip.clone())
        },
        zip_collision: cli.on_zip_collision,
    }
}

/// Merge configs by priority: env < file < cli
fn merge_configs(env: Config, file: Config, cli: Config) -> Config {
    fn pick<T>(env: Option<T>, file: Option<T>, cli: Option<T>) -> Option<T> {
        cli.or(file).or(env)
    }

    Config {
        source: pick(env.source, file.source, cli.source),
        backup_dir: pick(env.backup_dir, file.backup_dir, cli.backup_dir),
        zip_dir: pick(env.zip_dir, file.zip_dir, cli.zip_dir),
        config: pick(env.config, file.config, cli.config),
        dry: pick(env.dry, file.dry, cli.dry),
        skip: pick(env.skip, file.skip, cli.skip),
        zip_collision: pick(env.zip_collision, file.zip_collision, cli.zip_collision),
    }
}
