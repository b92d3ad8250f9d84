//! Recorder and host configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tutti_rpc::IdAllocatorConfig;

/// Frames per render quantum.
pub const RENDER_QUANTUM: usize = 128;

/// Silent frames rendered before a capture node is armed, at minimum.
pub const MIN_WARM_UP_FRAMES: usize = 1024;

/// Channel count assumed when the input does not report one.
pub const DEFAULT_CHANNEL_COUNT: u16 = 2;

/// Per-session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Output format. `None` uses the host's default.
    pub mime_type: Option<String>,
    /// How often the input's track set is checked for changes.
    pub watchdog_interval: Duration,
    /// Requested warm-up length; never less than [`MIN_WARM_UP_FRAMES`].
    pub warm_up_frames: usize,
    /// Blocks the input may queue for the capture node before overflowing.
    pub input_queue_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            mime_type: None,
            watchdog_interval: Duration::from_secs(1),
            warm_up_frames: MIN_WARM_UP_FRAMES,
            input_queue_capacity: 1024,
        }
    }
}

impl RecorderConfig {
    /// Create a builder for configuring a session
    ///
    /// # Example
    /// ```ignore
    /// let config = RecorderConfig::builder()
    ///     .mime_type("audio/x-tutti-pcm")
    ///     .watchdog_interval(Duration::from_millis(250))
    ///     .build();
    /// ```
    pub fn builder() -> RecorderConfigBuilder {
        RecorderConfigBuilder::default()
    }

    /// Warm-up length after applying the minimum.
    pub fn effective_warm_up_frames(&self) -> usize {
        self.warm_up_frames.max(MIN_WARM_UP_FRAMES)
    }
}

/// Builder for RecorderConfig with fluent API
#[derive(Clone, Debug, Default)]
pub struct RecorderConfigBuilder {
    config: RecorderConfig,
}

impl RecorderConfigBuilder {
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.config.mime_type = Some(mime_type.into());
        self
    }

    pub fn watchdog_interval(mut self, interval: Duration) -> Self {
        self.config.watchdog_interval = interval;
        self
    }

    /// Warm-up from an output latency, as `latency * sample_rate` frames.
    pub fn warm_up_latency(mut self, latency: Duration, sample_rate: u32) -> Self {
        let frames = (latency.as_nanos() * sample_rate as u128).div_ceil(1_000_000_000);
        self.config.warm_up_frames = frames as usize;
        self
    }

    pub fn warm_up_frames(mut self, frames: usize) -> Self {
        self.config.warm_up_frames = frames;
        self
    }

    pub fn input_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.input_queue_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> RecorderConfig {
        self.config
    }
}

/// Configuration of the realms a [`RecorderHost`](crate::RecorderHost) spawns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// MIME type used when a session does not ask for one.
    pub default_mime_type: String,
    /// Frames per render quantum.
    pub render_quantum: usize,
    /// Pause between render passes when no commands arrive.
    pub render_interval: Duration,
    /// Correlation ids on the encoder broker channel.
    pub ids: IdAllocatorConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            default_mime_type: crate::format::WAV_MIME_TYPE.to_string(),
            render_quantum: RENDER_QUANTUM,
            render_interval: Duration::from_millis(2),
            ids: IdAllocatorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RecorderConfig::default();
        assert_eq!(config.mime_type, None);
        assert_eq!(config.watchdog_interval, Duration::from_secs(1));
        assert_eq!(config.effective_warm_up_frames(), 1024);

        let host = HostConfig::default();
        assert_eq!(host.render_quantum, 128);
        assert_eq!(host.default_mime_type, "audio/wav");
    }

    #[test]
    fn test_builder() {
        let config = RecorderConfig::builder()
            .mime_type("audio/x-tutti-pcm")
            .watchdog_interval(Duration::from_millis(50))
            .input_queue_capacity(0)
            .build();
        assert_eq!(config.mime_type.as_deref(), Some("audio/x-tutti-pcm"));
        assert_eq!(config.watchdog_interval, Duration::from_millis(50));
        assert_eq!(config.input_queue_capacity, 1);
    }

    #[test]
    fn test_warm_up_floor() {
        let short = RecorderConfig::builder()
            .warm_up_latency(Duration::from_millis(5), 48000)
            .build();
        assert_eq!(short.warm_up_frames, 240);
        assert_eq!(short.effective_warm_up_frames(), 1024);

        let long = RecorderConfig::builder()
            .warm_up_latency(Duration::from_millis(50), 48000)
            .build();
        assert_eq!(long.effective_warm_up_frames(), 2400);
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = RecorderConfig::builder().mime_type("audio/wav").build();
        let json = serde_json::to_string(&config).unwrap();
        let back: RecorderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
