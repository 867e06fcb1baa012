use super::{ResultSink, RuntimeError, RuntimeEvent};
use parking_lot::RwLock;
use tokio::sync::mpsc;

/// Sink that forwards events over an unbounded channel.
pub struct ChannelSink {
    event_tx: RwLock<mpsc::UnboundedSender<RuntimeEvent>>,
}

impl ChannelSink {
    pub fn new(event_tx: mpsc::UnboundedSender<RuntimeEvent>) -> Self {
        Self {
            event_tx: RwLock::new(event_tx),
        }
    }

    /// Create a sink together with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RuntimeEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (Self::new(event_tx), event_rx)
    }

    /// Replace the event sender (each CLI run mode gets a fresh channel)
    pub fn replace_event_tx(&self, new_tx: mpsc::UnboundedSender<RuntimeEvent>) {
        *self.event_tx.write() = new_tx;
    }
}

impl ResultSink for ChannelSink {
    fn emit(&self, event: RuntimeEvent) -> Result<(), RuntimeError> {
        self.event_tx
            .read()
            .send(event)
            .map_err(|_| RuntimeError::ReceiverClosed)?;
        Ok(())
    }
}
