//! Commands arriving from the out-of-band test channel.

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use super::TestChunk;

/// A decoded message from the test command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCommand {
    /// Switch the provider from live capture to test injection.
    EnterTestMode,
    Chunk(TestChunk),
}

/// Non-blocking source of feed commands, polled from `poll_timestamp`.
pub trait CommandSource: Send {
    /// Next pending command, or `None` if nothing is waiting right now.
    fn try_next(&mut self) -> Option<FeedCommand>;
}

/// A command source that never yields anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCommands;

impl CommandSource for NoCommands {
    fn try_next(&mut self) -> Option<FeedCommand> {
        None
    }
}

/// Command source backed by a crossbeam channel.
#[derive(Debug)]
pub struct ChannelCommands {
    rx: Receiver<FeedCommand>,
    /// Set once every sender is gone and the queue is drained.
    disconnected: bool,
}

impl ChannelCommands {
    pub fn new(rx: Receiver<FeedCommand>) -> Self {
        Self {
            rx,
            disconnected: false,
        }
    }
}

impl CommandSource for ChannelCommands {
    fn try_next(&mut self) -> Option<FeedCommand> {
        match self.rx.try_recv() {
            Ok(cmd) => Some(cmd),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                if !self.disconnected {
                    tracing::debug!("test command channel closed");
                    self.disconnected = true;
                }
                None
            }
        }
    }
}

/// Create an unbounded command channel.
pub fn command_channel() -> (Sender<FeedCommand>, ChannelCommands) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (tx, ChannelCommands::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_yields_commands_in_order_then_reports_disconnect() {
        let (tx, mut commands) = command_channel();
        tx.send(FeedCommand::EnterTestMode).expect("send");
        let chunk = TestChunk::new(0, 1, vec![7]).expect("chunk");
        tx.send(FeedCommand::Chunk(chunk.clone())).expect("send");
        drop(tx);

        assert_eq!(commands.try_next(), Some(FeedCommand::EnterTestMode));
        assert_eq!(commands.try_next(), Some(FeedCommand::Chunk(chunk)));
        assert!(!commands.disconnected);
        assert_eq!(commands.try_next(), None);
        assert!(commands.disconnected);
    }

    #[test]
    fn empty_channel_is_not_disconnected() {
        let (_tx, mut commands) = command_channel();
        assert_eq!(commands.try_next(), None);
        assert!(!commands.disconnected);
    }
}
