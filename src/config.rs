//! Configuration types for viseme timeline generation.

use crate::error::{LipSyncError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the lip-sync pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LipSyncConfig {
    /// Waveform probing settings.
    pub audio: AudioConfig,
    /// Forced-alignment service settings.
    pub aligner: AlignerConfig,
    /// Smoothing and hold-time thresholds shared by both timeline paths.
    pub timeline: TimelineConfig,
    /// Heuristic fallback timeline settings.
    pub fallback: FallbackConfig,
}

/// Waveform probing configuration.
///
/// The `fallback_*` fields are substituted when a WAV header declares zero
/// or is missing the corresponding field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Duration used when no waveform is available or the header is unusable.
    pub default_duration_secs: f64,
    /// Sample rate in Hz assumed for a zeroed header field.
    pub fallback_sample_rate: u32,
    /// Bits per sample assumed for a zeroed header field.
    pub fallback_bits_per_sample: u16,
    /// Channel count assumed for a zeroed header field.
    pub fallback_channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: 1.0,
            fallback_sample_rate: 22_050,
            fallback_bits_per_sample: 16,
            fallback_channels: 1,
        }
    }
}

/// Forced-alignment service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignerConfig {
    /// Whether to call the aligner at all. When `false` every turn takes the
    /// heuristic fallback path.
    pub enabled: bool,
    /// Full URL of the alignment endpoint (Gentle-compatible).
    pub endpoint_url: String,
    /// Hard deadline for one alignment round trip, in milliseconds.
    pub timeout_ms: u64,
    /// Duration given to a phone with no usable end time, and to the silent
    /// segment emitted for a word the aligner could not find.
    pub default_phone_ms: u32,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint_url: "http://localhost:8765/transcriptions?async=false".to_owned(),
            timeout_ms: 10_000,
            default_phone_ms: 50,
        }
    }
}

impl AlignerConfig {
    /// Default phone duration in seconds.
    pub fn default_phone_secs(&self) -> f64 {
        f64::from(self.default_phone_ms) / 1000.0
    }
}

/// Timeline smoothing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Same-label entries separated by less than this are merged.
    pub merge_gap_ms: u32,
    /// Segments shorter than this, sandwiched between neighbours that map to
    /// the same viseme, are dropped.
    pub flicker_ms: u32,
    /// No segment may be shorter than this unless the whole timeline is.
    pub min_hold_ms: u32,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            merge_gap_ms: 30,
            flicker_ms: 50,
            min_hold_ms: 40,
        }
    }
}

/// Heuristic fallback timeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Length of the `rest` inserted between words.
    pub word_gap_ms: u32,
    /// Cosmetic timing jitter as a fraction of the average unit duration.
    ///
    /// `0.0` disables jitter entirely.
    pub jitter: f64,
    /// Seed for the jitter generator. `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            word_gap_ms: 50,
            jitter: 0.15,
            seed: None,
        }
    }
}

/// Largest jitter fraction accepted by [`LipSyncConfig::validate`].
pub const MAX_JITTER: f64 = 0.5;

impl LipSyncConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| LipSyncError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| LipSyncError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/fae/lipsync.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("fae").join("lipsync.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("fae")
                .join("lipsync.toml")
        } else {
            PathBuf::from("/tmp/fae-config/lipsync.toml")
        }
    }

    /// Check values that the pipeline cannot sensibly default at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`LipSyncError::Config`] describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        let default_duration = self.audio.default_duration_secs;
        if !default_duration.is_finite() || default_duration <= 0.0 {
            return Err(LipSyncError::Config(format!(
                "audio.default_duration_secs must be positive, got {default_duration}"
            )));
        }
        if !(0.0..=MAX_JITTER).contains(&self.fallback.jitter) {
            return Err(LipSyncError::Config(format!(
                "fallback.jitter must be within 0.0..={MAX_JITTER}, got {}",
                self.fallback.jitter
            )));
        }
        if self.aligner.enabled {
            if self.aligner.timeout_ms == 0 {
                return Err(LipSyncError::Config(
                    "aligner.timeout_ms must be non-zero".into(),
                ));
            }
            if self.aligner.endpoint_url.trim().is_empty() {
                return Err(LipSyncError::Config(
                    "aligner.endpoint_url is empty but the aligner is enabled".into(),
                ));
            }
        }
        Ok(())
    }
}
