//! Capture integration tests
//!
//! Records synthetic signals through the full pipeline and decodes the
//! delivered blobs.

use crate::helpers::tolerances::{FLOAT_EPSILON, INT16_EPSILON};
use crate::helpers::*;
use std::io::Cursor;
use tutti_capture::prelude::*;
use tutti_capture::recorder::{StateError, RENDER_QUANTUM};
use tutti_capture::Error;

/// A stereo sine survives the container path unchanged.
#[tokio::test]
async fn test_sine_roundtrip_container() {
    let host = RecorderHost::default();
    let input = MediaInput::new(TEST_SAMPLE_RATE, 2);
    let session = test_session(&host, &input, CONTAINER_MIME_TYPE);
    let mut events = session.events().unwrap();

    let frames = RENDER_QUANTUM * 10 + 37;
    let left = generate_sine(440.0, TEST_SAMPLE_RATE as f64, frames);
    let right = generate_sine(660.0, TEST_SAMPLE_RATE as f64, frames);

    session.start(None).unwrap();
    assert!(matches!(next_event(&mut events).await, RecorderEvent::Start));
    push_quanta(&input, &[left.clone(), right.clone()]);
    session.stop().unwrap();

    let seen = until_end(&mut events).await;
    assert!(matches!(seen.last(), Some(RecorderEvent::Stop)));
    let channels = decode_blobs(blobs(&seen), 2).unwrap();
    assert!(signals_approx_equal(&channels[0], &left, FLOAT_EPSILON));
    assert!(signals_approx_equal(&channels[1], &right, FLOAT_EPSILON));
}

/// The default WAV output is a valid 16-bit file.
#[tokio::test]
async fn test_wav_output_decodes_with_hound() {
    let host = RecorderHost::default();
    let input = MediaInput::new(TEST_SAMPLE_RATE, 1);
    let session =
        RecorderSession::new(host, input.clone(), RecorderConfig::default()).unwrap();
    assert_eq!(session.mime_type(), WAV_MIME_TYPE);
    let mut events = session.events().unwrap();

    let signal: Vec<f32> = generate_sine(1000.0, TEST_SAMPLE_RATE as f64, RENDER_QUANTUM * 4)
        .into_iter()
        .map(|s| s * 0.5)
        .collect();

    session.start(None).unwrap();
    assert!(matches!(next_event(&mut events).await, RecorderEvent::Start));
    push_quanta(&input, &[signal.clone()]);
    session.stop().unwrap();

    let seen = until_end(&mut events).await;
    let found = blobs(&seen);
    assert_eq!(found.len(), 1);

    let reader = hound::WavReader::new(Cursor::new(found[0].to_vec())).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, TEST_SAMPLE_RATE);
    assert_eq!(spec.bits_per_sample, 16);

    let decoded: Vec<f32> = reader
        .into_samples::<i16>()
        .map(|s| s.unwrap() as f32 / 32767.0)
        .collect();
    assert!(signals_approx_equal(&decoded, &signal, 2.0 * INT16_EPSILON));
}

/// Timeslice blobs can be decoded as they arrive.
#[tokio::test]
async fn test_timeslice_blobs_decode_incrementally() {
    let host = RecorderHost::default();
    let input = MediaInput::new(TEST_SAMPLE_RATE, 1);
    let session = test_session(&host, &input, CONTAINER_MIME_TYPE);
    let mut events = session.events().unwrap();
    let signal = generate_noise(RENDER_QUANTUM * 6, 42);

    session.start(Some(Duration::from_millis(10))).unwrap();
    assert!(matches!(next_event(&mut events).await, RecorderEvent::Start));

    let mut decoder = BlobDecoder::new(1).unwrap();
    for block in signal.chunks(RENDER_QUANTUM) {
        input.push(vec![block.to_vec()]);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    while decoder.frames() == 0 {
        if let RecorderEvent::DataAvailable(blob) = next_event(&mut events).await {
            decoder.push(&blob).unwrap();
        }
    }
    assert!(!decoder.is_finished());

    session.stop().unwrap();
    for event in until_end(&mut events).await {
        if let RecorderEvent::DataAvailable(blob) = event {
            decoder.push(&blob).unwrap();
        }
    }
    assert!(decoder.is_finished());
    assert_eq!(decoder.channels()[0], signal);
}

/// State errors convert into the umbrella error.
#[tokio::test]
async fn test_state_errors_through_umbrella() {
    fn pause(session: &RecorderSession) -> tutti_capture::Result<()> {
        session.pause()?;
        Ok(())
    }

    let host = RecorderHost::default();
    let input = MediaInput::new(TEST_SAMPLE_RATE, 1);
    let session = test_session(&host, &input, CONTAINER_MIME_TYPE);
    let mut events = session.events().unwrap();

    match pause(&session) {
        Err(Error::State(StateError { operation, state })) => {
            assert_eq!(operation, "pause");
            assert_eq!(state, RecordingState::Inactive);
        }
        other => panic!("expected a state error, got {other:?}"),
    }

    session.start(None).unwrap();
    pause(&session).unwrap();
    assert_eq!(session.state(), RecordingState::Paused);
    session.stop().unwrap();
    until_end(&mut events).await;
    assert_eq!(session.state(), RecordingState::Stopped);
    assert!(pause(&session).is_err());
}
