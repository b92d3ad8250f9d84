//! Hardware capture through CPAL.

use crate::error::{DeviceError, Result};
use crate::input::{deinterleave, MediaInput};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample};

/// A running capture stream feeding a [`MediaInput`].
///
/// The input carries the device's native sample rate and channel count.
/// Capture stops when this value is dropped.
pub struct CpalInput {
    input: MediaInput,
    device_name: String,
    _stream: cpal::Stream,
}

impl CpalInput {
    /// Open the default input device.
    pub fn open_default() -> Result<Self> {
        Self::open(None)
    }

    /// Open an input device by name, or the default one.
    pub fn open(name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match name {
            Some(name) => host
                .input_devices()
                .map_err(|e| DeviceError::Stream(e.to_string()))?
                .find(|device| device.name().is_ok_and(|n| n == name))
                .ok_or_else(|| DeviceError::NotFound(name.to_string()))?,
            None => host
                .default_input_device()
                .ok_or_else(|| DeviceError::NotFound("default input".to_string()))?,
        };
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let supported = device
            .default_input_config()
            .map_err(|e| DeviceError::Stream(e.to_string()))?;
        let channels = supported.channels();
        let input = MediaInput::new(supported.sample_rate().0, channels);
        let config: cpal::StreamConfig = supported.config();

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, &input)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, &input)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, &input)?,
            other => {
                return Err(DeviceError::Stream(format!("unsupported sample format {other}")).into())
            }
        };
        stream
            .play()
            .map_err(|e| DeviceError::Stream(e.to_string()))?;

        tracing::info!(
            device = %device_name,
            sample_rate = config.sample_rate.0,
            channels,
            "capture device opened"
        );
        Ok(Self {
            input,
            device_name,
            _stream: stream,
        })
    }

    pub fn input(&self) -> &MediaInput {
        &self.input
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    input: &MediaInput,
) -> Result<cpal::Stream>
where
    T: SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let channels = config.channels as usize;
    let sink = input.clone();
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                scratch.clear();
                scratch.extend(data.iter().map(|&s| cpal::Sample::from_sample(s)));
                sink.push(deinterleave(&scratch, channels));
            },
            |err| tracing::error!(error = %err, "capture stream error"),
            None,
        )
        .map_err(|e| DeviceError::Stream(e.to_string()).into())
}
