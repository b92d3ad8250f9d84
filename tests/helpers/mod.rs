//! Test helpers and fixtures for tutti-capture integration tests
//!
//! Sessions run against a synthetic [`MediaInput`] so no capture hardware is
//! needed. Signals are pushed in render quanta and read back either through
//! the demuxer or as WAV.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Lossless paths (container output)
//! - `INT16_EPSILON` (1/32768): 16-bit WAV output

#![allow(dead_code)]

pub mod tolerances;

use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tutti_capture::prelude::*;
use tutti_capture::recorder::RENDER_QUANTUM;

/// Default test sample rate (matches common hardware)
pub const TEST_SAMPLE_RATE: u32 = 48000;

/// How long a test waits for any single session event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a session on `host` recording `input` as `mime_type`.
pub fn test_session(host: &RecorderHost, input: &MediaInput, mime_type: &str) -> RecorderSession {
    let config = RecorderConfig::builder().mime_type(mime_type).build();
    RecorderSession::new(host.clone(), input.clone(), config)
        .expect("Failed to create test session")
}

/// Wait for the next session event.
pub async fn next_event(events: &mut UnboundedReceiver<RecorderEvent>) -> RecorderEvent {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("Timed out waiting for a recorder event")
        .expect("Recorder event stream closed")
}

/// Collect events up to and including the terminal `Stop` or `Error`.
pub async fn until_end(events: &mut UnboundedReceiver<RecorderEvent>) -> Vec<RecorderEvent> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        let done = matches!(event, RecorderEvent::Stop | RecorderEvent::Error(_));
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// The blobs delivered by `DataAvailable` events, in order.
pub fn blobs(events: &[RecorderEvent]) -> Vec<&Blob> {
    events
        .iter()
        .filter_map(|event| match event {
            RecorderEvent::DataAvailable(blob) => Some(blob),
            _ => None,
        })
        .collect()
}

/// Push planar `channels` into `input` one render quantum at a time.
pub fn push_quanta(input: &MediaInput, channels: &[Vec<f32>]) {
    let frames = channels.first().map_or(0, Vec::len);
    let mut start = 0;
    while start < frames {
        let end = (start + RENDER_QUANTUM).min(frames);
        input.push(channels.iter().map(|c| c[start..end].to_vec()).collect());
        start = end;
    }
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect()
}

/// Generate white noise (random samples in -1..1).
pub fn generate_noise(num_samples: usize, seed: u64) -> Vec<f32> {
    // Simple LCG for reproducible "random" noise
    let mut rng = seed;
    (0..num_samples)
        .map(|_| {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((rng >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0
        })
        .collect()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Check if two signals are approximately equal within tolerance.
pub fn signals_approx_equal(a: &[f32], b: &[f32], tolerance: f32) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_sine() {
        let samples = generate_sine(1000.0, 48000.0, 48);
        assert_eq!(samples.len(), 48);
        assert!(samples[0].abs() < 1e-6);
        assert!(peak(&samples) > 0.99);
    }

    #[test]
    fn test_generate_noise_is_reproducible() {
        assert_eq!(generate_noise(64, 7), generate_noise(64, 7));
        assert!(peak(&generate_noise(64, 7)) <= 1.0);
    }

    #[test]
    fn test_signals_approx_equal() {
        let a = vec![0.0, 0.5, 1.0];
        let b = vec![0.001, 0.501, 0.999];
        assert!(signals_approx_equal(&a, &b, 0.01));
        assert!(!signals_approx_equal(&a, &b, 0.0001));
        assert!(!signals_approx_equal(&a, &b[..2], 0.01));
    }
}
