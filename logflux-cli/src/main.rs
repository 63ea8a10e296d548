//! CLI for the logflux pipeline.
//!
//! Reads JSON-lines log records from stdin and runs them through a hook,
//! writing batches either to stdout as line protocol or to an InfluxDB
//! server.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};
use logflux::influx::{InfluxConfig, InfluxHttpSink};
use logflux::{Config, FieldValue, Hook, Level, LineProtocolSink, LogRecord, Precision};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Batch structured log records into time-series points.
#[derive(Parser)]
#[command(name = "logflux", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Pipe JSON-lines records from stdin through a hook.
    ///
    /// Each line is an object such as
    /// `{"message": "...", "level": "info", "fields": {"user_id": 1}}`
    /// with an optional `timestamp_ns`.
    Pipe {
        #[command(flatten)]
        config: ConfigArgs,

        /// InfluxDB base URL. Without it, batches go to stdout.
        #[arg(long)]
        influx_url: Option<String>,

        /// InfluxDB username.
        #[arg(long, requires = "influx_url")]
        username: Option<String>,

        /// InfluxDB password.
        #[arg(long, requires = "username")]
        password: Option<String>,
    },

    /// Print the resolved configuration as JSON.
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

/// Configuration overrides shared by all commands.
#[derive(Args)]
struct ConfigArgs {
    /// JSON config file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Destination database.
    #[arg(long)]
    database: Option<String>,

    /// Measurement for records without a `measurement` field.
    #[arg(long)]
    measurement: Option<String>,

    /// Field promoted to a tag (repeatable).
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Points per batch.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Seconds before a partial batch is flushed.
    #[arg(long)]
    batch_interval: Option<f64>,

    /// Timestamp precision (ns, us, ms, s, m, h).
    #[arg(long, value_parser = parse_precision)]
    precision: Option<Precision>,
}

/// One input line.
#[derive(Deserialize)]
struct InputRecord {
    #[serde(default)]
    message: String,
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    fields: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    timestamp_ns: Option<u64>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Pipe {
            config,
            influx_url,
            username,
            password,
        } => cmd_pipe(&config, influx_url, username, password),
        Commands::Config { config } => cmd_config(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Implements `logflux pipe`.
fn cmd_pipe(
    args: &ConfigArgs,
    influx_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(args)?;

    let hook = match influx_url {
        Some(url) => {
            let mut influx = InfluxConfig::new(url);
            if let Some(username) = username {
                influx = influx.with_basic_auth(username, password.unwrap_or_default());
            }
            Hook::new(config, InfluxHttpSink::new(influx)?)?
        }
        None => Hook::new(config, LineProtocolSink::new(io::stdout()))?,
    };

    let mut submitted = 0u64;
    let mut rejected = 0u64;
    let mut skipped = 0u64;

    for (lineno, line) in io::stdin().lock().lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record = match parse_record(&line) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(line = lineno + 1, "skipping malformed record: {e}");
                rejected += 1;
                continue;
            }
        };

        if !hook.supports(record.level) {
            skipped += 1;
            continue;
        }

        match hook.submit(record) {
            Ok(()) => submitted += 1,
            Err(e) => {
                tracing::warn!(line = lineno + 1, "record rejected: {e}");
                rejected += 1;
            }
        }
    }

    hook.shutdown()?;

    eprintln!("submitted={submitted} rejected={rejected} skipped={skipped}");
    Ok(())
}

/// Implements `logflux config`.
fn cmd_config(args: &ConfigArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(args)?.resolved();
    config.validate()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Loads the config file, if any, and applies flag overrides.
fn build_config(args: &ConfigArgs) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    if let Some(database) = &args.database {
        config.database.clone_from(database);
    }
    if let Some(measurement) = &args.measurement {
        config.default_measurement.clone_from(measurement);
    }
    if !args.tags.is_empty() {
        config.tags.clone_from(&args.tags);
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(secs) = args.batch_interval {
        config.batch_interval = if secs > 0.0 {
            Duration::try_from_secs_f64(secs)?
        } else {
            Duration::ZERO
        };
    }
    if let Some(precision) = args.precision {
        config.precision = precision;
    }

    Ok(config)
}

fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    Ok(Config::from_json_file(path)?)
}

/// Parses one JSON line into a log record.
fn parse_record(line: &str) -> Result<LogRecord, Box<dyn std::error::Error>> {
    let input: InputRecord = serde_json::from_str(line)?;

    let level = match input.level.as_deref() {
        Some(level) => level.parse::<Level>()?,
        None => Level::Info,
    };

    let mut record = LogRecord::new(level, input.message);
    if let Some(ns) = input.timestamp_ns {
        record = record.at(UNIX_EPOCH + Duration::from_nanos(ns));
    } else {
        record = record.at(SystemTime::now());
    }

    for (key, value) in &input.fields {
        if let Some(value) = FieldValue::from_json(value) {
            record.fields.insert(key.clone(), value);
        }
    }

    Ok(record)
}

fn parse_precision(s: &str) -> Result<Precision, String> {
    Precision::parse(s).ok_or_else(|| format!("unknown precision '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ConfigArgs {
        ConfigArgs {
            config: None,
            database: None,
            measurement: None,
            tags: Vec::new(),
            batch_size: None,
            batch_interval: None,
            precision: None,
        }
    }

    #[test]
    fn test_parse_record() {
        let record = parse_record(
            r#"{"message":"hi","level":"warn","fields":{"user_id":1,"skip":null},"timestamp_ns":5}"#,
        )
        .unwrap();

        assert_eq!(record.message, "hi");
        assert_eq!(record.level, Level::Warn);
        assert_eq!(record.timestamp, UNIX_EPOCH + Duration::from_nanos(5));
        assert_eq!(record.fields.len(), 1);
        assert_eq!(record.fields["user_id"], FieldValue::Integer(1));
    }

    #[test]
    fn test_parse_record_errors() {
        assert!(parse_record("not json").is_err());
        assert!(parse_record(r#"{"level":"loud"}"#).is_err());
    }

    #[test]
    fn test_build_config_overrides() {
        let mut a = args();
        a.database = Some("app".to_string());
        a.tags = vec!["host".to_string()];
        a.batch_interval = Some(0.25);
        a.precision = Some(Precision::Millisecond);

        let config = build_config(&a).unwrap();
        assert_eq!(config.database, "app");
        assert_eq!(config.tags, vec!["host".to_string()]);
        assert_eq!(config.batch_interval, Duration::from_millis(250));
        assert_eq!(config.precision, Precision::Millisecond);
        assert_eq!(config.batch_size, 100);
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "logflux", "pipe", "--tag", "host", "--tag", "user", "--precision", "s",
        ])
        .unwrap();
        match cli.command {
            Commands::Pipe { config, .. } => {
                assert_eq!(config.tags, vec!["host".to_string(), "user".to_string()]);
                assert_eq!(config.precision, Some(Precision::Second));
            }
            Commands::Config { .. } => panic!("expected pipe"),
        }
    }
}
