//! Typed, ordered message channel between the coordinator and one worker.
//!
//! A worker link is two of these: the coordinator creates one for replies
//! before spawning, the worker creates one for commands and sends its
//! [`Outbox`] back as the first reply.

use tokio::sync::mpsc;

/// The other side of the channel has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("worker channel closed before a message arrived")]
    Closed,
}

/// Create a connected sending/receiving pair.
pub fn pair<T>() -> (Outbox<T>, Inbox<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Outbox { tx }, Inbox { rx })
}

/// Sending endpoint. Cheap to clone and may itself be sent as a message.
#[derive(Debug)]
pub struct Outbox<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for Outbox<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T> Outbox<T> {
    pub fn send(&self, value: T) -> Result<(), ChannelError> {
        self.tx.send(value).map_err(|_| ChannelError::Closed)
    }
}

/// Receiving endpoint. Values arrive in send order.
#[derive(Debug)]
pub struct Inbox<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Inbox<T> {
    /// Wait for the next value, failing if every sender is gone first.
    pub async fn next(&mut self) -> Result<T, ChannelError> {
        self.rx.recv().await.ok_or(ChannelError::Closed)
    }
}
