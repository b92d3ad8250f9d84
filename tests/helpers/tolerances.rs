//! Tolerance constants for capture testing.

/// Floating point rounding errors.
/// Use for paths that should be lossless, such as the container output.
pub const FLOAT_EPSILON: f32 = 1e-6;

/// 16-bit quantization step size.
/// Use when reading back WAV output.
pub const INT16_EPSILON: f32 = 1.0 / 32768.0;

/// Automation curves evaluated in f64 and stored as f32.
pub const AUTOMATION_EPSILON: f32 = 1e-5;
