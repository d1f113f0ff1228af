use abx_client::config::{Config, ConfigFile};
use abx_client::logging;
use abx_client::output::{self, OutputFormat};
use abx_client::record::{CAPTURE_VERSION, FileHeader};
use abx_client::session::Session;
use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(version, about = "Replay the ABX exchange feed, recover gaps and save the packets")]
struct Args {
    /// JSON configuration file with ServerAddress / ServerPort
    #[arg(long, short = 'c', env = "ABX_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Server address (overrides the config file)
    #[arg(long, env = "ABX_HOST")]
    host: Option<String>,

    /// Server port (overrides the config file)
    #[arg(long, env = "ABX_PORT")]
    port: Option<i64>,

    /// Maximum recovery passes before giving up on missing sequences
    #[arg(long, env = "ABX_MAX_PASSES")]
    max_passes: Option<u32>,

    /// Socket read timeout in milliseconds; a timeout ends the replay
    #[arg(long, env = "ABX_READ_TIMEOUT_MS")]
    read_timeout_ms: Option<u64>,

    /// TCP connect timeout in milliseconds
    #[arg(long, env = "ABX_CONNECT_TIMEOUT_MS")]
    connect_timeout_ms: Option<u64>,

    /// First sequence number of the feed, so lost leading packets are recovered
    #[arg(long, env = "ABX_FIRST_SEQUENCE")]
    first_sequence: Option<i32>,

    /// Output file path; defaults to output/abx_YYYY_MM_DD.<ext>
    #[arg(long, short = 'o', env = "ABX_OUT")]
    out: Option<PathBuf>,

    /// Output encoding
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Debug-level logging unless RUST_LOG is set
    #[arg(long, short = 'v', default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> ConfigFile {
        ConfigFile {
            server_address: self.host.clone(),
            server_port: self.port,
            max_recovery_passes: self.max_passes,
            read_timeout_ms: self.read_timeout_ms,
            connect_timeout_ms: self.connect_timeout_ms,
            first_sequence: self.first_sequence,
        }
    }

    /// The config file is optional only when the endpoint comes from flags.
    fn load_config(&self) -> Result<Config> {
        let endpoint_from_flags = self.host.is_some() && self.port.is_some();
        let file = if endpoint_from_flags && !self.config.exists() {
            ConfigFile::default()
        } else {
            ConfigFile::load(&self.config)?
        };
        Ok(Config::try_from(file.merge(self.overrides()))?)
    }
}

fn now_unix_ns() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();
    let args = Args::parse();
    logging::init(args.verbose);

    let config = args.load_config().context("load configuration")?;
    info!(
        endpoint = %config.endpoint(),
        max_recovery_passes = config.max_recovery_passes,
        "configuration loaded"
    );

    let outcome = Session::tcp(&config).run().context("exchange session")?;
    if !outcome.is_complete() {
        warn!(
            missing = outcome.missing_count(),
            ranges = ?outcome.missing,
            "saving incomplete packet set"
        );
    }

    let out = args.out.clone().unwrap_or_else(|| output::default_output_path(args.format));
    match args.format {
        OutputFormat::Json => output::write_json(&out, &outcome.packets),
        OutputFormat::Capture => {
            let header = FileHeader {
                version: CAPTURE_VERSION,
                created_unix_ns: now_unix_ns(),
                server: config.server_address.clone(),
                port: config.server_port,
                missing: outcome.missing.clone(),
            };
            output::write_capture_file(&out, &header, &outcome.packets)
        }
    }
    .with_context(|| format!("write {}", out.display()))?;

    info!(packets = outcome.packets.len(), path = %out.display(), "output saved");
    Ok(())
}
