// src/config.rs

//! Manages server configuration: loading the flat `key value` file and
//! applying defaults.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// The config path used when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "redis.conf";

const DEFAULT_DATABASES: usize = 16;

/// Everything the server consumes from its configuration file. A missing
/// file simply yields the defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    /// Number of sub-databases per process.
    pub databases: usize,
    pub appendonly: bool,
    pub appendfilename: String,
    /// This node's own address in cluster mode (the `self` key).
    pub self_addr: Option<String>,
    /// The other cluster members, comma-separated in the file.
    pub peers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 6379,
            databases: DEFAULT_DATABASES,
            appendonly: false,
            appendfilename: "appendonly.aof".into(),
            self_addr: None,
            peers: Vec::new(),
        }
    }
}

impl Config {
    /// The address the listener binds to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Cluster mode is on iff this node knows itself and at least one peer.
    pub fn cluster_mode(&self) -> bool {
        self.self_addr.is_some() && !self.peers.is_empty()
    }

    /// Loads the configuration from a flat file of `key value` lines.
    /// Unknown keys are warned about and skipped; `#` starts a comment.
    pub fn from_file(path: &str) -> Result<Config> {
        let mut config = Config::default();

        if !Path::new(path).exists() {
            info!("config file '{}' not found, using defaults", path);
            return Ok(config);
        }

        let contents =
            fs::read_to_string(path).with_context(|| format!("failed to read '{path}'"))?;

        for (lineno, raw_line) in contents.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(char::is_whitespace) else {
                warn!("ignoring config line {} with no value: '{}'", lineno + 1, line);
                continue;
            };
            let key = key.to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "bind" => config.bind = value.to_string(),
                "port" => {
                    config.port = value
                        .parse()
                        .with_context(|| format!("invalid port '{value}' on line {}", lineno + 1))?
                }
                "databases" => {
                    let databases: usize = value.parse().with_context(|| {
                        format!("invalid databases '{value}' on line {}", lineno + 1)
                    })?;
                    config.databases = if databases == 0 {
                        warn!("databases 0 is meaningless, using {}", DEFAULT_DATABASES);
                        DEFAULT_DATABASES
                    } else {
                        databases
                    };
                }
                "appendonly" => {
                    config.appendonly = match value.to_ascii_lowercase().as_str() {
                        "yes" | "true" => true,
                        "no" | "false" => false,
                        other => bail!("invalid appendonly value '{other}' on line {}", lineno + 1),
                    }
                }
                "appendfilename" => config.appendfilename = value.to_string(),
                "self" => config.self_addr = Some(value.to_string()),
                "peers" => {
                    config.peers = value
                        .split(',')
                        .map(str::trim)
                        .filter(|peer| !peer.is_empty())
                        .map(str::to_string)
                        .collect()
                }
                other => warn!("unknown config key '{}' on line {}", other, lineno + 1),
            }
        }

        Ok(config)
    }
}
