//! JSON framing for the test command channel.
//!
//! ```text
//! {"type":"testMode"}
//! {"type":"chunk","offset":0,"total":320,"samples":[12,-4,...]}
//! ```
//!
//! A chunk's length is the number of samples it carries.

use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, Result};
use crate::feed::{FeedCommand, TestChunk};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CommandFrame {
    TestMode,
    Chunk {
        offset: u32,
        total: u32,
        samples: Vec<i16>,
    },
}

impl TryFrom<CommandFrame> for FeedCommand {
    type Error = CaptureError;

    fn try_from(frame: CommandFrame) -> Result<Self> {
        match frame {
            CommandFrame::TestMode => Ok(FeedCommand::EnterTestMode),
            CommandFrame::Chunk {
                offset,
                total,
                samples,
            } => Ok(FeedCommand::Chunk(TestChunk::new(offset, total, samples)?)),
        }
    }
}

/// Decode one JSON line into a command.
///
/// # Errors
/// `CaptureError::InvalidFrame` for malformed JSON or unknown frame types,
/// `CaptureError::InvalidTestChunk` for chunks that overrun their total.
pub fn decode_frame(line: &str) -> Result<FeedCommand> {
    let frame: CommandFrame =
        serde_json::from_str(line.trim()).map_err(|e| CaptureError::InvalidFrame(e.to_string()))?;
    FeedCommand::try_from(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_test_mode_command() {
        assert_eq!(
            decode_frame(r#"{"type":"testMode"}"#).expect("decode"),
            FeedCommand::EnterTestMode
        );
    }

    #[test]
    fn decodes_chunk_with_length_from_samples() {
        let cmd = decode_frame(r#" {"type":"chunk","offset":160,"total":320,"samples":[1,-2,3]} "#)
            .expect("decode");
        let FeedCommand::Chunk(chunk) = cmd else {
            panic!("expected chunk, got {cmd:?}");
        };
        assert_eq!(chunk.offset(), 160);
        assert_eq!(chunk.length(), 3);
        assert_eq!(chunk.total(), 320);
        assert_eq!(chunk.samples(), &[1, -2, 3]);
    }

    #[test]
    fn rejects_unknown_frame_type() {
        assert!(matches!(
            decode_frame(r#"{"type":"reboot"}"#),
            Err(CaptureError::InvalidFrame(_))
        ));
    }

    #[test]
    fn rejects_chunk_overrunning_total() {
        assert!(matches!(
            decode_frame(r#"{"type":"chunk","offset":2,"total":3,"samples":[1,2]}"#),
            Err(CaptureError::InvalidTestChunk(_))
        ));
    }

    #[test]
    fn chunk_frame_serializes_with_camel_case_tag() {
        let frame = CommandFrame::Chunk {
            offset: 0,
            total: 2,
            samples: vec![4, 5],
        };
        let line = serde_json::to_string(&frame).expect("encode");
        let chunk = TestChunk::new(0, 2, vec![4, 5]).expect("chunk");
        assert_eq!(decode_frame(&line).expect("decode"), FeedCommand::Chunk(chunk));
        let json: serde_json::Value = serde_json::from_str(&line).expect("valid json");
        assert_eq!(json["type"], "chunk");
        assert_eq!(json["total"], 2);
        assert_eq!(json["samples"][1], 5);
    }
}
