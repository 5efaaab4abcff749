//! Service configuration.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration.

use crate::drip::DripLimits;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Address the server listens on.
    pub bind_address: String,

    /// Compression level: `-1` for the codec default, or `0..=9`.
    pub compression_level: i32,

    /// Idle encoders kept per scheme.
    pub max_idle_encoders: usize,

    /// Upper bound for `/bytes`, `/stream-bytes` and `/range`.
    pub max_byte_count: usize,

    /// Upper bound for `/delay` and the drip delay, in seconds.
    pub max_delay_secs: f64,

    /// Upper bound for the drip body size.
    pub max_drip_bytes: usize,

    /// Upper bound for the drip (and paced range) window, in seconds.
    pub max_drip_duration_secs: f64,

    /// Upper bound for `/stream` line count.
    pub max_stream_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:1323".to_string(),
            compression_level: -1,
            max_idle_encoders: crate::pool::DEFAULT_MAX_IDLE,
            max_byte_count: 100 * 1024,
            max_delay_secs: 10.0,
            max_drip_bytes: 10 << 20,
            max_drip_duration_secs: 60.0,
            max_stream_lines: 100,
        }
    }
}

impl Config {
    /// Reads, parses and validates a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::parse(&content)
    }

    /// Parses and validates TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Semantic checks that parsing alone cannot express.
    ///
    /// The compression level is not checked here; building the pool does that.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.bind_address.parse::<SocketAddr>().is_err() {
            problems.push(format!("bind_address {:?} is not host:port", self.bind_address));
        }
        if self.max_byte_count == 0 {
            problems.push("max_byte_count must be positive".to_string());
        }
        if self.max_stream_lines == 0 {
            problems.push("max_stream_lines must be positive".to_string());
        }
        if !self.max_delay_secs.is_finite() || self.max_delay_secs < 0.0 {
            problems.push("max_delay_secs must be a non-negative number".to_string());
        }
        if !self.max_drip_duration_secs.is_finite() || self.max_drip_duration_secs < 0.1 {
            problems.push("max_drip_duration_secs must be at least 0.1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(problems.join(", ")))
        }
    }

    /// Clamps applied to `/drip`.
    pub fn drip_limits(&self) -> DripLimits {
        DripLimits {
            max_bytes: self.max_drip_bytes,
            max_duration_secs: self.max_drip_duration_secs,
            max_delay_secs: self.max_delay_secs,
        }
    }
}
