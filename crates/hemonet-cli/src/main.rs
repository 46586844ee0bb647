//! hemonet - federated hemogram classification CLI
//!
//! ## Commands
//!
//! - `validate`: report missing reference fields of an observation
//! - `normalize`: print the canonical form of an observation
//! - `classify`: classify observations with the configured network
//! - `share`: push an observation to the sharing peers
//! - `metadata`: fetch each peer's dataset metadata

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn, Level};

use hemonet_core::{
    ConversionEngine, ErrorLog, JsonlErrorLog, MemoryErrorLog, NetworkConfig, Observation,
    DEFAULT_MIN_HEMOGRAM_FIELDS,
};

#[derive(Parser)]
#[command(name = "hemonet")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Federated hemogram classification", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that every raw field's reference field is present
    Validate {
        /// Observation file (JSON object)
        file: PathBuf,

        /// Minimum number of hemogram fields with a value
        #[arg(long, default_value_t = DEFAULT_MIN_HEMOGRAM_FIELDS)]
        min_fields: usize,
    },

    /// Print the canonical form of an observation
    Normalize {
        /// Observation file (JSON object)
        file: PathBuf,
    },

    /// Classify observations with the configured classifier and peers
    Classify {
        /// Observation file (JSON object or array)
        file: PathBuf,

        /// Network configuration (TOML)
        #[arg(short, long, env = "HEMONET_CONFIG")]
        config: PathBuf,
    },

    /// Push an observation to the peers that accept shared data
    Share {
        /// Observation file (JSON object)
        file: PathBuf,

        /// Network configuration (TOML)
        #[arg(short, long, env = "HEMONET_CONFIG")]
        config: PathBuf,

        /// Treat the observation as finished
        #[arg(long)]
        finished: bool,
    },

    /// Fetch and print each peer's dataset metadata
    Metadata {
        /// Network configuration (TOML)
        #[arg(short, long, env = "HEMONET_CONFIG")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    hemonet_core::telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Validate { file, min_fields } => cmd_validate(&file, min_fields),
        Commands::Normalize { file } => cmd_normalize(&file),
        Commands::Classify { file, config } => cmd_classify(&file, &config).await,
        Commands::Share {
            file,
            config,
            finished,
        } => cmd_share(&file, &config, finished).await,
        Commands::Metadata { config } => cmd_metadata(&config).await,
    }
}

/// Read one observation or an array of them.
fn read_observations(path: &Path) -> Result<Vec<Observation>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read observation file: {}", path.display()))?;
    parse_observations(&content)
        .with_context(|| format!("Invalid observation file: {}", path.display()))
}

fn parse_observations(content: &str) -> Result<Vec<Observation>> {
    match serde_json::from_str::<Value>(content)? {
        Value::Array(rows) => Ok(rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Observation>, _>>()?),
        row @ Value::Object(_) => Ok(vec![serde_json::from_value(row)?]),
        _ => bail!("expected a JSON object or an array of objects"),
    }
}

fn read_observation(path: &Path) -> Result<Observation> {
    let mut observations = read_observations(path)?;
    if observations.len() != 1 {
        bail!(
            "expected exactly one observation in {}, found {}",
            path.display(),
            observations.len()
        );
    }
    Ok(observations.remove(0))
}

fn load_config(path: &Path) -> Result<(NetworkConfig, Arc<dyn ErrorLog>)> {
    let config = NetworkConfig::load(path)
        .with_context(|| format!("Failed to load network config: {}", path.display()))?;
    let error_log: Arc<dyn ErrorLog> = match &config.error_log {
        Some(log_path) => Arc::new(
            JsonlErrorLog::open(log_path)
                .with_context(|| format!("Failed to open error log: {}", log_path.display()))?,
        ),
        None => Arc::new(MemoryErrorLog::new()),
    };
    Ok((config, error_log))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn engine() -> Result<ConversionEngine> {
    ConversionEngine::hemogram().context("Invalid conversion rules")
}

fn cmd_validate(path: &Path, min_fields: usize) -> Result<()> {
    let observation = read_observation(path)?;
    let engine = engine()?;

    let mut problems: Vec<String> = engine
        .validate(&observation)
        .iter()
        .map(ToString::to_string)
        .collect();
    if let Err(e) = engine.check_minimum_fields(&observation, min_fields) {
        problems.push(e.to_string());
    }

    if problems.is_empty() {
        println!("{}: ok", path.display());
        return Ok(());
    }
    for problem in &problems {
        println!("{problem}");
    }
    bail!("{} problem(s) found in {}", problems.len(), path.display())
}

fn cmd_normalize(path: &Path) -> Result<()> {
    let observation = read_observation(path)?;
    let normalized = engine()?
        .normalize(&observation)
        .context("Normalization failed")?;
    print_json(&normalized)
}

async fn cmd_classify(path: &Path, config_path: &Path) -> Result<()> {
    let observations = read_observations(path)?;
    let (config, error_log) = load_config(config_path)?;
    let coordinator = config
        .coordinator(Arc::clone(&error_log))?
        .with_conversion(engine()?);

    info!(observations = observations.len(), "classifying");
    let prediction = coordinator
        .network_predict(&observations)
        .await
        .context("Classification unavailable")?;

    let failures = error_log.entries().len();
    if failures > 0 {
        warn!(failures, "some remote calls failed");
    }
    print_json(&prediction)
}

async fn cmd_share(path: &Path, config_path: &Path, finished: bool) -> Result<()> {
    let observation = read_observation(path)?;
    let (config, error_log) = load_config(config_path)?;
    let coordinator = config.coordinator(error_log)?;

    let summary = coordinator
        .share(&observation, finished)
        .await
        .context("Data share task failed")?;
    print_json(&summary)
}

async fn cmd_metadata(config_path: &Path) -> Result<()> {
    let (config, error_log) = load_config(config_path)?;
    let mut peers = config.build_peers(error_log)?;

    let mut metadata = BTreeMap::new();
    for peer in &mut peers {
        peer.refresh_metadata().await;
        metadata.insert(
            peer.name().to_string(),
            peer.last_metadata().cloned().unwrap_or(Value::Null),
        );
    }
    print_json(&metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_observation() {
        let observations = parse_observations(r#"{"wbc": 5.0, "neut": null}"#).unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].number("wbc"), Some(5.0));
    }

    #[test]
    fn test_parse_observation_array() {
        let observations = parse_observations(r#"[{"wbc": 5.0}, {"wbc": 12.0}]"#).unwrap();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[1].number("wbc"), Some(12.0));
    }

    #[test]
    fn test_parse_rejects_scalars() {
        assert!(parse_observations("42").is_err());
        assert!(parse_observations(r#"[{"wbc": "high"}]"#).is_err());
    }

    #[test]
    fn test_read_observation_requires_exactly_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        std::fs::write(&path, r#"[{"wbc": 1.0}, {"wbc": 2.0}]"#).unwrap();
        assert!(read_observation(&path).is_err());
    }

    #[test]
    fn test_cli_parses_share_flags() {
        let cli = Cli::try_parse_from([
            "hemonet", "share", "obs.json", "--config", "net.toml", "--finished",
        ])
        .unwrap();
        match cli.command {
            Commands::Share { finished, .. } => assert!(finished),
            _ => panic!("expected share"),
        }
    }
}
