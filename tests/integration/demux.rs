//! Demux integration tests
//!
//! Recorded container output decodes identically however it is split.

use crate::helpers::*;
use tutti_capture::demux::{Demuxer, SampleBlock};
use tutti_capture::prelude::*;
use tutti_capture::recorder::RENDER_QUANTUM;

async fn recorded_bytes(channels: &[Vec<f32>]) -> Vec<u8> {
    let host = RecorderHost::default();
    let input = MediaInput::new(TEST_SAMPLE_RATE, channels.len() as u16);
    let session = test_session(&host, &input, CONTAINER_MIME_TYPE);
    let mut events = session.events().unwrap();

    session.start(Some(Duration::from_millis(5))).unwrap();
    assert!(matches!(next_event(&mut events).await, RecorderEvent::Start));
    push_quanta(&input, channels);
    session.stop().unwrap();

    let seen = until_end(&mut events).await;
    blobs(&seen).iter().flat_map(|b| b.to_vec()).collect()
}

fn demux_in_pieces(
    bytes: &[u8],
    channel_count: usize,
    mut next_len: impl FnMut() -> usize,
) -> Vec<SampleBlock> {
    let mut demuxer = Demuxer::new(channel_count).unwrap();
    let mut blocks = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        let len = next_len().clamp(1, rest.len());
        let (piece, tail) = rest.split_at(len);
        blocks.extend(demuxer.push(piece.to_vec()));
        rest = tail;
    }
    assert!(demuxer.last_error().is_none());
    blocks
}

/// Splitting the stream at arbitrary points yields the same blocks.
#[tokio::test]
async fn test_chunking_invariance_on_recorded_stream() {
    let left = generate_noise(RENDER_QUANTUM * 5, 1);
    let right = generate_noise(RENDER_QUANTUM * 5, 2);
    let bytes = recorded_bytes(&[left.clone(), right.clone()]).await;

    let whole = demux_in_pieces(&bytes, 2, || usize::MAX);
    assert!(whole.last().is_some_and(SampleBlock::is_end_of_stream));

    let bytewise = demux_in_pieces(&bytes, 2, || 1);
    assert_eq!(bytewise, whole);

    let mut seed = 0x2545_f491_u64;
    let random = demux_in_pieces(&bytes, 2, || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        (seed >> 59) as usize + 1
    });
    assert_eq!(random, whole);

    let decoded = |ch: usize| -> Vec<f32> {
        whole
            .iter()
            .flat_map(|b| b.channel(ch).unwrap_or_default().to_vec())
            .collect()
    };
    assert_eq!(decoded(0), left);
    assert_eq!(decoded(1), right);
}
