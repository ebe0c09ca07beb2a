//! Signal sinks
//!
//! Accepted signals leave the engine through [`SignalSink::emit`]. Emitting
//! never blocks the evaluation path: backpressure is handled by dropping.

use super::types::{SignalDirection, SignalEvent, SignalStrength};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Messages kept after a trim
const INBOX_KEEP: usize = 10;
/// Trim once the inbox grows past this
const INBOX_LIMIT: usize = 20;

pub trait SignalSink: Send + Sync {
    /// Fire-and-forget delivery of an accepted signal
    fn emit(&self, event: SignalEvent);
}

/// Forwards events onto a bounded tokio channel
pub struct ChannelSink {
    tx: mpsc::Sender<SignalEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<SignalEvent>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end, e.g. for a notification consumer task
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<SignalEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }
}

impl SignalSink for ChannelSink {
    fn emit(&self, event: SignalEvent) {
        if let Err(e) = self.tx.try_send(event) {
            match e {
                mpsc::error::TrySendError::Full(event) => {
                    log::warn!("⚠️  Signal channel full, dropping {}", event.strategy_name);
                }
                mpsc::error::TrySendError::Closed(event) => {
                    log::warn!("⚠️  Signal channel closed, dropping {}", event.strategy_name);
                }
            }
        }
    }
}

/// Logs every event as one JSON line
#[derive(Debug, Default)]
pub struct LogSink;

impl SignalSink for LogSink {
    fn emit(&self, event: SignalEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => log::info!("🚨 SIGNAL {}", json),
            Err(e) => log::error!("❌ Failed to serialize signal: {}", e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageKind {
    StrongBuy,
    NormalBuy,
    NormalSell,
    StrongSell,
}

impl MessageKind {
    pub fn from_signal(direction: SignalDirection, strength: SignalStrength) -> Self {
        match (direction, strength) {
            (SignalDirection::Buy, SignalStrength::Strong) => MessageKind::StrongBuy,
            (SignalDirection::Buy, SignalStrength::Normal) => MessageKind::NormalBuy,
            (SignalDirection::Sell, SignalStrength::Normal) => MessageKind::NormalSell,
            (SignalDirection::Sell, SignalStrength::Strong) => MessageKind::StrongSell,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            MessageKind::StrongBuy => "Strong buy signal",
            MessageKind::NormalBuy => "Buy signal",
            MessageKind::NormalSell => "Sell signal",
            MessageKind::StrongSell => "Strong sell signal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboxMessage {
    pub kind: MessageKind,
    pub title: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// In-app message list, newest first
///
/// Once it holds more than 20 messages it is cut back to the newest 10.
#[derive(Debug, Default)]
pub struct MessageInbox {
    messages: Mutex<Vec<InboxMessage>>,
}

impl MessageInbox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<InboxMessage> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<InboxMessage>> {
        // A panic while holding the lock cannot leave the list half-written
        self.messages.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SignalSink for MessageInbox {
    fn emit(&self, event: SignalEvent) {
        let kind = MessageKind::from_signal(event.direction, event.strength);
        let message = InboxMessage {
            kind,
            title: kind.title().to_string(),
            body: event.message,
            timestamp: event.timestamp,
        };

        let mut messages = self.lock();
        messages.insert(0, message);
        if messages.len() > INBOX_LIMIT {
            messages.truncate(INBOX_KEEP);
            log::debug!("🧹 Message inbox trimmed to {}", INBOX_KEEP);
        }
    }
}

impl<S: SignalSink + ?Sized> SignalSink for Arc<S> {
    fn emit(&self, event: SignalEvent) {
        (**self).emit(event)
    }
}

/// Delivers every event to each inner sink in order
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn SignalSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl SignalSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl SignalSink for FanoutSink {
    fn emit(&self, event: SignalEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(event.clone());
            }
            last.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(direction: SignalDirection, strength: SignalStrength, n: usize) -> SignalEvent {
        SignalEvent {
            triggered: true,
            direction,
            strength,
            message: format!("signal #{}", n),
            timestamp: Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap(),
            strategy_name: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_channel_sink_drops_when_full() {
        let (sink, mut rx) = ChannelSink::channel(1);
        sink.emit(event(SignalDirection::Buy, SignalStrength::Normal, 1));
        sink.emit(event(SignalDirection::Buy, SignalStrength::Normal, 2));

        assert_eq!(rx.recv().await.unwrap().message, "signal #1");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_closed_does_not_panic() {
        let (sink, rx) = ChannelSink::channel(4);
        drop(rx);
        sink.emit(event(SignalDirection::Sell, SignalStrength::Strong, 1));
    }

    #[test]
    fn test_message_kind_mapping() {
        assert_eq!(
            MessageKind::from_signal(SignalDirection::Buy, SignalStrength::Strong),
            MessageKind::StrongBuy
        );
        assert_eq!(
            MessageKind::from_signal(SignalDirection::Sell, SignalStrength::Normal),
            MessageKind::NormalSell
        );
    }

    #[test]
    fn test_inbox_is_newest_first() {
        let inbox = MessageInbox::new();
        inbox.emit(event(SignalDirection::Buy, SignalStrength::Normal, 1));
        inbox.emit(event(SignalDirection::Sell, SignalStrength::Strong, 2));

        let messages = inbox.messages();
        assert_eq!(messages[0].body, "signal #2");
        assert_eq!(messages[0].kind, MessageKind::StrongSell);
        assert_eq!(messages[1].title, "Buy signal");
    }

    #[test]
    fn test_inbox_trims_past_limit() {
        let inbox = MessageInbox::new();
        for n in 1..=20 {
            inbox.emit(event(SignalDirection::Buy, SignalStrength::Normal, n));
        }
        assert_eq!(inbox.len(), 20);

        inbox.emit(event(SignalDirection::Buy, SignalStrength::Normal, 21));
        let messages = inbox.messages();
        assert_eq!(messages.len(), 10);
        assert_eq!(messages[0].body, "signal #21");
        assert_eq!(messages[9].body, "signal #12");

        inbox.clear();
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let first = MessageInbox::new();
        let second = MessageInbox::new();
        let fanout = FanoutSink::new()
            .with(Arc::clone(&first))
            .with(LogSink)
            .with(Arc::clone(&second));

        fanout.emit(event(SignalDirection::Buy, SignalStrength::Strong, 1));
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }
}
