//! Waveform duration probing from RIFF/WAVE headers.
//!
//! Synthesized speech arrives as an in-memory WAV file. Its duration is the
//! ground truth both timeline paths scale to, so probing never fails: a
//! header `hound` rejects is re-read by a tolerant chunk scanner that
//! substitutes configured defaults for zeroed fields, and anything
//! unreadable yields the configured default duration.

use crate::config::AudioConfig;
use std::io::Cursor;
use tracing::{debug, warn};

/// Declared `data` chunk size used by streaming writers that never patch
/// the header.
const STREAMING_DATA_SIZE: u32 = u32::MAX;

/// Header fields that determine playback length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    /// Samples per second per channel.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Bits per sample.
    pub bits_per_sample: u16,
    /// Payload bytes in the `data` chunk.
    pub data_bytes: u64,
}

impl WavInfo {
    /// Playback length in seconds.
    ///
    /// `data_bytes / (bytes_per_sample * channels * sample_rate)`.
    pub fn duration_secs(&self) -> f64 {
        let bytes_per_sample = u64::from(self.bits_per_sample.div_ceil(8));
        let bytes_per_second =
            bytes_per_sample * u64::from(self.channels) * u64::from(self.sample_rate);
        if bytes_per_second == 0 {
            return 0.0;
        }
        self.data_bytes as f64 / bytes_per_second as f64
    }
}

/// Probe the duration of an in-memory WAV file, in seconds.
///
/// Returns `defaults.default_duration_secs` when the header cannot be parsed
/// or declares no audio.
pub fn probe_duration(bytes: &[u8], defaults: &AudioConfig) -> f64 {
    let probed = read_header(bytes, defaults).map(|info| (info, info.duration_secs()));
    match probed {
        Some((info, secs)) if secs.is_finite() && secs > 0.0 => {
            debug!(
                sample_rate = info.sample_rate,
                channels = info.channels,
                bits = info.bits_per_sample,
                data_bytes = info.data_bytes,
                duration_secs = secs,
                "probed waveform duration"
            );
            secs
        }
        Some(_) => {
            warn!(
                default_secs = defaults.default_duration_secs,
                "waveform declares no audio, using default duration"
            );
            defaults.default_duration_secs
        }
        None => {
            warn!(
                len = bytes.len(),
                default_secs = defaults.default_duration_secs,
                "unparseable waveform header, using default duration"
            );
            defaults.default_duration_secs
        }
    }
}

/// Read the header fields, first strictly via `hound`, then tolerantly.
fn read_header(bytes: &[u8], defaults: &AudioConfig) -> Option<WavInfo> {
    read_with_hound(bytes).or_else(|| scan_riff(bytes, defaults))
}

fn read_with_hound(bytes: &[u8]) -> Option<WavInfo> {
    // The reader borrows `bytes` and is dropped before returning.
    let reader = hound::WavReader::new(Cursor::new(bytes)).ok()?;
    let spec = reader.spec();
    let frames = u64::from(reader.duration());
    if spec.sample_rate == 0 || spec.channels == 0 || frames == 0 {
        return None;
    }
    let bytes_per_frame = u64::from(spec.bits_per_sample.div_ceil(8)) * u64::from(spec.channels);
    let data_bytes = frames * bytes_per_frame;
    // hound trusts the declared chunk size; a streaming or truncated file
    // claims more than is actually there.
    if data_bytes > bytes.len() as u64 {
        return None;
    }
    Some(WavInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        data_bytes,
    })
}

/// Walk the RIFF chunk list looking for `fmt ` and `data`.
fn scan_riff(bytes: &[u8], defaults: &AudioConfig) -> Option<WavInfo> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }

    let mut sample_rate = 0u32;
    let mut channels = 0u16;
    let mut bits_per_sample = 0u16;
    let mut data_bytes = None;

    let mut offset = 12usize;
    while offset.checked_add(8)? <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let size = read_u32(bytes, offset + 4)?;
        let body = offset + 8;

        match id {
            b"fmt " => {
                channels = read_u16(bytes, body + 2).unwrap_or(0);
                sample_rate = read_u32(bytes, body + 4).unwrap_or(0);
                bits_per_sample = read_u16(bytes, body + 14).unwrap_or(0);
            }
            b"data" => {
                let available = (bytes.len() - body) as u64;
                let declared = u64::from(size);
                data_bytes = Some(
                    if size == 0 || size == STREAMING_DATA_SIZE || declared > available {
                        available
                    } else {
                        declared
                    },
                );
                break;
            }
            _ => {}
        }

        let padded = usize::try_from(size).ok()?.checked_add(size as usize & 1)?;
        offset = body.checked_add(padded)?;
    }

    let data_bytes = data_bytes?;
    let info = WavInfo {
        sample_rate: nonzero_or(sample_rate, defaults.fallback_sample_rate),
        channels: nonzero_or(channels, defaults.fallback_channels),
        bits_per_sample: nonzero_or(bits_per_sample, defaults.fallback_bits_per_sample),
        data_bytes,
    };
    debug!(?info, "tolerant RIFF scan recovered waveform header");
    Some(info)
}

fn nonzero_or<T: PartialEq + Default>(value: T, fallback: T) -> T {
    if value == T::default() { fallback } else { value }
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let raw = bytes.get(at..at.checked_add(2)?)?;
    Some(u16::from_le_bytes([raw[0], raw[1]]))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw = bytes.get(at..at.checked_add(4)?)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}
