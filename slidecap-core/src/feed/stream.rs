//! Splitting a recording into framed test chunks.

use super::TestChunk;

/// Frame `samples` as one logical stream of chunks of at most `chunk_len`
/// samples. The first chunk has offset 0 and the last one completes the
/// stream. An empty input yields no chunks.
pub fn frame_stream(samples: &[i16], chunk_len: usize) -> Vec<TestChunk> {
    let total = samples.len().min(u32::MAX as usize);
    let chunk_len = chunk_len.max(1);
    samples[..total]
        .chunks(chunk_len)
        .enumerate()
        .filter_map(|(i, piece)| {
            TestChunk::new((i * chunk_len) as u32, total as u32, piece.to_vec()).ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_cover_the_stream_with_offsets() {
        let samples: Vec<i16> = (0..10).collect();
        let chunks = frame_stream(&samples, 4);

        let framing: Vec<(u32, u32, u32)> = chunks
            .iter()
            .map(|c| (c.offset(), c.length(), c.total()))
            .collect();
        assert_eq!(framing, vec![(0, 4, 10), (4, 4, 10), (8, 2, 10)]);
        assert!(chunks[0].opens_stream());
        assert!(!chunks[1].completes_stream());
        assert!(chunks[2].completes_stream());
        assert_eq!(chunks[2].samples(), &[8, 9]);
    }

    #[test]
    fn empty_input_has_no_chunks() {
        assert!(frame_stream(&[], 16).is_empty());
    }
}
