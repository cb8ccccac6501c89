//! Configuration for the mixing synchronizer
//!
//! A `MixerConfig` is immutable for the lifetime of a run. It describes the
//! output side only; each input stream's framing is supplied when the stream
//! is registered.
//!
//! Settings sources, in priority order:
//! 1. Values passed programmatically
//! 2. TOML configuration file (`MixerConfig::from_toml_file`)
//! 3. Built-in defaults (code constants below)

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::audio::StreamFormat;
use crate::error::{Error, Result};
use polymix_common::timing;

/// Output-side mixer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MixerConfig {
    /// Output sample rate in Hz
    #[serde(default = "default_output_rate")]
    pub output_rate: u32,

    /// Samples per output block
    #[serde(default = "default_block_frames")]
    pub block_frames: u64,

    /// Output framing (bytes per frame group, frames per group)
    #[serde(default = "default_output_format")]
    pub output_format: StreamFormat,
}

fn default_output_rate() -> u32 {
    44_100
}

fn default_block_frames() -> u64 {
    1024
}

fn default_output_format() -> StreamFormat {
    StreamFormat::stereo_f32(default_output_rate())
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            output_rate: default_output_rate(),
            block_frames: default_block_frames(),
            output_format: default_output_format(),
        }
    }
}

impl MixerConfig {
    /// Load configuration from a TOML file, applying defaults for missing
    /// fields.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: MixerConfig = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        info!(
            output_rate = config.output_rate,
            block_frames = config.block_frames,
            "loaded mixer configuration from {}",
            path.display()
        );
        Ok(config)
    }

    /// Reject configurations the synchronizer cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.output_rate == 0 {
            return Err(Error::Config("output_rate must be non-zero".into()));
        }
        if self.block_frames == 0 {
            return Err(Error::Config("block_frames must be non-zero".into()));
        }
        if self.output_format.bytes_per_frame == 0 || self.output_format.frame_length == 0 {
            return Err(Error::Config(
                "output_format framing must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Duration of one output block in microseconds (truncating).
    pub fn block_duration_us(&self) -> i64 {
        timing::block_duration_us(self.block_frames, self.output_rate)
    }

    /// Byte length of one output block.
    pub fn block_bytes(&self) -> usize {
        (self.block_frames * self.output_format.bytes_per_frame as u64
            / self.output_format.frame_length as u64) as usize
    }
}
