//! The configuration surface (`spec.md` §6, expanded in `SPEC_FULL.md`
//! §4.10): a file-sourced [`EngineConfig`] with environment and CLI
//! overrides layered on top. The core itself only ever consumes a fully
//! resolved `EngineConfig` — it never parses argv or a config file itself.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

/// A `name:priority:filter:policy` route given on the command line
/// (`spec.md` §6, `policy` 4-tuple).
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct InitialRoute {
    pub name: String,
    pub priority: i64,
    pub filter: String,
    pub policy: String,
}

#[derive(Debug, Error, Diagnostic)]
pub enum InitialRouteParseError {
    #[error("initial route \"{0}\" must have the form name:priority:filter:policy")]
    #[diagnostic(code(eventcascade::config::malformed_route_tuple))]
    MalformedTuple(String),
    #[error("initial route \"{0}\" has a non-integer priority")]
    #[diagnostic(code(eventcascade::config::invalid_priority))]
    InvalidPriority(String),
}

impl std::str::FromStr for InitialRoute {
    type Err = InitialRouteParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = raw.splitn(4, ':').collect();
        let [name, priority, filter, policy] = parts.as_slice() else {
            return Err(InitialRouteParseError::MalformedTuple(raw.to_string()));
        };
        let priority = priority
            .parse()
            .map_err(|_| InitialRouteParseError::InvalidPriority(raw.to_string()))?;
        Ok(InitialRoute {
            name: name.to_string(),
            priority,
            filter: filter.to_string(),
            policy: policy.to_string(),
        })
    }
}

/// The fully resolved configuration the core is wired up from. Mirrors the
/// CLI table in `spec.md` §6 one field at a time.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// uv-style pool size, 1-1024.
    pub server_threads: usize,
    pub event_socket: PathBuf,
    pub event_queue_tasks: usize,
    pub api_socket: PathBuf,
    pub api_queue_tasks: usize,
    #[serde(with = "duration_millis")]
    pub api_timeout: Duration,
    pub store_path: PathBuf,
    pub kvdb_path: PathBuf,
    pub router_threads: usize,
    pub queue_size: usize,
    pub queue_flood_file: PathBuf,
    pub queue_flood_attempts: u32,
    #[serde(with = "duration_micros")]
    pub queue_flood_sleep: Duration,
    pub policy: Vec<InitialRoute>,
    /// Replace the existing route table with `policy` at startup rather
    /// than merging it in (`spec.md` §6).
    pub force_router_arg: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_threads: 8,
            event_socket: PathBuf::from("/var/run/eventcascade/event.sock"),
            event_queue_tasks: 64,
            api_socket: PathBuf::from("/var/run/eventcascade/api.sock"),
            api_queue_tasks: 64,
            api_timeout: Duration::from_millis(5000),
            store_path: PathBuf::from("/etc/eventcascade/assets"),
            kvdb_path: PathBuf::from("/var/lib/eventcascade/kvdb"),
            router_threads: 4,
            queue_size: 1024,
            queue_flood_file: PathBuf::from("/var/log/eventcascade/flood.jsonl"),
            queue_flood_attempts: 3,
            queue_flood_sleep: Duration::from_micros(200),
            policy: Vec::new(),
            force_router_arg: false,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("could not read config file {0}: {1}")]
    #[diagnostic(code(eventcascade::config::io))]
    Io(PathBuf, String),
    #[error("could not parse config file {0}: {1}")]
    #[diagnostic(code(eventcascade::config::parse))]
    Parse(PathBuf, String),
}

impl EngineConfig {
    /// Load a YAML config file, then apply environment variable overrides
    /// (`dotenvy`-style, same as the rest of the ambient configuration
    /// stack) for the fields most commonly tuned per-deployment.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;
        let mut config: EngineConfig = serde_yaml::from_str(&raw)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        dotenvy::dotenv().ok();
        if let Ok(v) = std::env::var("EVENTCASCADE_ROUTER_THREADS") {
            if let Ok(n) = v.parse() {
                self.router_threads = n;
            }
        }
        if let Ok(v) = std::env::var("EVENTCASCADE_QUEUE_SIZE") {
            if let Ok(n) = v.parse() {
                self.queue_size = n;
            }
        }
        if let Ok(v) = std::env::var("EVENTCASCADE_STORE_PATH") {
            self.store_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("EVENTCASCADE_KVDB_PATH") {
            self.kvdb_path = PathBuf::from(v);
        }
    }

    /// Layer CLI-provided overrides from [`CliArgs`] on top of this config.
    pub fn apply_cli(&mut self, cli: &CliArgs) {
        if let Some(threads) = cli.router_threads {
            self.router_threads = threads;
        }
        if let Some(queue_size) = cli.queue_size {
            self.queue_size = queue_size;
        }
        if let Some(store_path) = &cli.store_path {
            self.store_path = store_path.clone();
        }
        if !cli.policy.is_empty() {
            if cli.force_router_arg {
                // Replace the file-sourced route table outright.
                self.policy = cli.policy.clone();
            } else {
                // Merge: file-sourced routes stay, CLI routes are appended.
                self.policy.extend(cli.policy.iter().cloned());
            }
        }
        if cli.force_router_arg {
            self.force_router_arg = true;
        }
    }
}

/// Command-line overrides layered on top of a file-sourced [`EngineConfig`]
/// (`spec.md` §6). Logging/CLI parsing sit outside the core per `spec.md`
/// §1; this struct is the thin shell that produces a resolved
/// `EngineConfig` before the core ever runs.
#[derive(Parser, Debug)]
#[command(name = "eventcascaded", about = "Security-event processing engine daemon")]
pub struct CliArgs {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "/etc/eventcascade/config.yml")]
    pub config: PathBuf,

    #[arg(long)]
    pub router_threads: Option<usize>,

    #[arg(long)]
    pub queue_size: Option<usize>,

    #[arg(long)]
    pub store_path: Option<PathBuf>,

    /// `name:priority:filter:policy`, may be given more than once.
    #[arg(long = "policy")]
    pub policy: Vec<InitialRoute>,

    #[arg(long)]
    pub force_router_arg: bool,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

mod duration_micros {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_micros() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_micros(u64::deserialize(d)?))
    }
}
