//!
//! goalmusic server configuration
//! ------------------------------
//! Resolved in three layers, later layers overriding earlier ones:
//! built-in defaults, environment variables, then command-line flags.
//!
//! | Setting   | Env                   | Flag                        | Default   |
//! |-----------|-----------------------|-----------------------------|-----------|
//! | host      | `GOALMUSIC_HOST`      | `--host H`                  | `0.0.0.0` |
//! | port      | `GOALMUSIC_HTTP_PORT` | `--http-port N`             | `8000`    |
//! | data file | `GOALMUSIC_DATA_FILE` | `--data-file P` / `--in-memory` | none (in-memory) |
//! | snapshot interval | `GOALMUSIC_PERSIST_INTERVAL_MS` | `--persist-interval-ms N` | `1000` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub const ENV_HOST: &str = "GOALMUSIC_HOST";
pub const ENV_HTTP_PORT: &str = "GOALMUSIC_HTTP_PORT";
pub const ENV_DATA_FILE: &str = "GOALMUSIC_DATA_FILE";
pub const ENV_PERSIST_INTERVAL_MS: &str = "GOALMUSIC_PERSIST_INTERVAL_MS";

const DEFAULT_PERSIST_INTERVAL_MS: u64 = 1_000;

pub const USAGE: &str = "goalmusic server\n\nUSAGE:\n  goalmusic_server [--host H] [--http-port N] [--data-file PATH | --in-memory] [--persist-interval-ms N]\n\nOPTIONS:\n  --host H            Listen address (env: GOALMUSIC_HOST, default 0.0.0.0)\n  --http-port N       HTTP API port (env: GOALMUSIC_HTTP_PORT, default 8000)\n  --data-file PATH    Persist the users collection to PATH (env: GOALMUSIC_DATA_FILE)\n  --in-memory         Keep users in memory only, ignoring GOALMUSIC_DATA_FILE\n  --persist-interval-ms N\n                      Delay between background snapshots of the data file (env: GOALMUSIC_PERSIST_INTERVAL_MS, default 1000)\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    /// Snapshot file for the users collection; `None` keeps data in memory.
    pub data_file: Option<PathBuf>,
    /// Delay between background snapshots while the collection is dirty.
    pub persist_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8000,
            data_file: None,
            persist_interval_ms: DEFAULT_PERSIST_INTERVAL_MS,
        }
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].as_str());
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_port(raw: &str, source: &str) -> Result<u16> {
    raw.trim().parse::<u16>().with_context(|| format!("invalid port '{}' from {}", raw, source))
}

fn parse_interval_ms(raw: &str, source: &str) -> Result<u64> {
    let ms = raw.trim().parse::<u64>().with_context(|| format!("invalid interval '{}' from {}", raw, source))?;
    if ms == 0 {
        anyhow::bail!("interval from {} must be at least 1 ms", source);
    }
    Ok(ms)
}

impl ServerConfig {
    /// True when the user asked for usage text.
    pub fn wants_help(args: &[String]) -> bool {
        has_flag(args, "--help") || has_flag(args, "-h")
    }

    /// Resolve from the process environment and the given argv.
    pub fn from_env_and_args(args: &[String]) -> Result<Self> {
        Self::resolve(|name| std::env::var(name).ok(), args)
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve<F>(env: F, args: &[String]) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = ServerConfig::default();

        if let Some(h) = env(ENV_HOST).filter(|s| !s.trim().is_empty()) {
            cfg.host = h.trim().to_string();
        }
        if let Some(p) = env(ENV_HTTP_PORT) {
            cfg.http_port = parse_port(&p, ENV_HTTP_PORT)?;
        }
        if let Some(f) = env(ENV_DATA_FILE).filter(|s| !s.trim().is_empty()) {
            cfg.data_file = Some(PathBuf::from(f));
        }
        if let Some(ms) = env(ENV_PERSIST_INTERVAL_MS) {
            cfg.persist_interval_ms = parse_interval_ms(&ms, ENV_PERSIST_INTERVAL_MS)?;
        }

        if let Some(h) = arg_value(args, "--host") {
            cfg.host = h.to_string();
        }
        if let Some(p) = arg_value(args, "--http-port") {
            cfg.http_port = parse_port(p, "--http-port")?;
        }
        if let Some(f) = arg_value(args, "--data-file") {
            cfg.data_file = Some(PathBuf::from(f));
        }
        if let Some(ms) = arg_value(args, "--persist-interval-ms") {
            cfg.persist_interval_ms = parse_interval_ms(ms, "--persist-interval-ms")?;
        }
        if has_flag(args, "--in-memory") {
            cfg.data_file = None;
        }
        Ok(cfg)
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_millis(self.persist_interval_ms)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.http_port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.http_port))
    }
}
