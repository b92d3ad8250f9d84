//! Automation integration tests
//!
//! A gain envelope rendered from a parameter timeline shapes the signal
//! before it is captured.

use crate::helpers::tolerances::AUTOMATION_EPSILON;
use crate::helpers::*;
use approx::assert_abs_diff_eq;
use tutti_capture::prelude::*;
use tutti_capture::recorder::RENDER_QUANTUM;

const FRAMES: usize = RENDER_QUANTUM * 8;

fn gain_graph() -> (ParamGraph, ParamId) {
    let mut graph = ParamGraph::new();
    let amp = graph.add_node("amp");
    let gain = graph
        .add_param(amp, ParamDescriptor::new("gain", 1.0).with_range(0.0, 1.0))
        .unwrap();
    (graph, gain)
}

async fn record(signal: Vec<f32>) -> Vec<f32> {
    let host = RecorderHost::default();
    let input = MediaInput::new(TEST_SAMPLE_RATE, 1);
    let session = test_session(&host, &input, CONTAINER_MIME_TYPE);
    let mut events = session.events().unwrap();

    session.start(None).unwrap();
    assert!(matches!(next_event(&mut events).await, RecorderEvent::Start));
    push_quanta(&input, &[signal]);
    session.stop().unwrap();

    let seen = until_end(&mut events).await;
    decode_blobs(blobs(&seen), 1).unwrap().remove(0)
}

/// A linear fade-in is captured as rendered.
#[tokio::test]
async fn test_fade_in_is_captured() {
    let (mut graph, gain) = gain_graph();
    let duration = FRAMES as f64 / TEST_SAMPLE_RATE as f64;
    graph
        .param_mut(gain)
        .unwrap()
        .set_value_at_time(0.0, 0.0)
        .unwrap()
        .linear_ramp_to_value_at_time(1.0, duration)
        .unwrap();

    let mut envelope = vec![0.0f32; FRAMES];
    graph
        .render(gain, 0.0, TEST_SAMPLE_RATE as f64, &mut envelope)
        .unwrap();
    let signal: Vec<f32> = envelope.iter().map(|g| g * 0.5).collect();

    let captured = record(signal.clone()).await;
    assert_eq!(captured, signal);
    assert_abs_diff_eq!(captured[0], 0.0, epsilon = AUTOMATION_EPSILON);
    assert_abs_diff_eq!(captured[FRAMES / 2], 0.25, epsilon = AUTOMATION_EPSILON);
    assert!(captured.windows(2).all(|w| w[1] >= w[0]));
}

/// Cancel-and-hold mid-ramp freezes the gain at its value at that instant.
#[tokio::test]
async fn test_cancel_and_hold_freezes_gain() {
    let (mut graph, gain) = gain_graph();
    let duration = FRAMES as f64 / TEST_SAMPLE_RATE as f64;
    let hold_at = duration / 4.0;
    graph
        .param_mut(gain)
        .unwrap()
        .set_value_at_time(0.0, 0.0)
        .unwrap()
        .linear_ramp_to_value_at_time(1.0, duration)
        .unwrap();
    let held = graph.param(gain).unwrap().value_at(hold_at);
    graph
        .param_mut(gain)
        .unwrap()
        .cancel_and_hold_at_time(hold_at)
        .unwrap();

    let mut envelope = vec![0.0f32; FRAMES];
    graph
        .render(gain, 0.0, TEST_SAMPLE_RATE as f64, &mut envelope)
        .unwrap();

    let captured = record(envelope).await;
    let tail = &captured[FRAMES / 2..];
    assert!(tail
        .iter()
        .all(|&g| (g - held as f32).abs() < AUTOMATION_EPSILON));
    assert_abs_diff_eq!(held, 0.25, epsilon = 1e-9);
}
