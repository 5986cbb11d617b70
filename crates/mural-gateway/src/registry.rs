//! Live session tracking and delta fan-out.

use std::collections::HashMap;

use axum::extract::ws::Message;
use tokio::sync::{RwLock, mpsc};
use tracing::debug;

/// The set of currently-connected sessions, owned by the gateway state.
///
/// Each session is addressed by its connection id and reached through an
/// unbounded channel drained by that connection's writer task, so broadcasts
/// never block on a slow socket.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, mpsc::UnboundedSender<Message>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, id: String, tx: mpsc::UnboundedSender<Message>) {
        self.sessions.write().await.insert(id, tx);
    }

    pub async fn unregister(&self, id: &str) {
        self.sessions.write().await.remove(id);
    }

    /// Deliver `message` to every session except `exclude`.
    ///
    /// Sessions whose channel has closed are skipped silently and pruned;
    /// a dead peer never fails the broadcast for the rest. Messages from one
    /// sender reach all recipients in the order broadcast was called.
    pub async fn broadcast(&self, exclude: &str, message: Message) {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, tx| id.as_str() == exclude || tx.send(message.clone()).is_ok());
        let pruned = before - sessions.len();
        if pruned > 0 {
            debug!(pruned, "Dropped closed sessions during broadcast");
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Message {
        Message::Text(s.to_string().into())
    }

    fn as_text(message: Message) -> String {
        match message {
            Message::Text(t) => t.as_str().to_string(),
            other => panic!("expected text message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_broadcast_excludes_sender() {
        let registry = SessionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let (tx_c, mut rx_c) = mpsc::unbounded_channel();
        registry.register("a".into(), tx_a).await;
        registry.register("b".into(), tx_b).await;
        registry.register("c".into(), tx_c).await;

        registry.broadcast("a", text("hello")).await;

        assert_eq!(as_text(rx_b.recv().await.unwrap()), "hello");
        assert_eq!(as_text(rx_c.recv().await.unwrap()), "hello");
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_preserves_sender_order() {
        let registry = SessionRegistry::new();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.register("a".into(), tx_a).await;
        registry.register("b".into(), tx_b).await;

        for i in 0..10 {
            registry.broadcast("a", text(&i.to_string())).await;
        }
        for i in 0..10 {
            assert_eq!(as_text(rx_b.recv().await.unwrap()), i.to_string());
        }
    }

    #[tokio::test]
    async fn test_closed_sessions_are_pruned() {
        let registry = SessionRegistry::new();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        registry.register("a".into(), tx_a).await;
        registry.register("b".into(), tx_b).await;
        drop(rx_b);

        registry.broadcast("a", text("x")).await;
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_unregister() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register("a".into(), tx).await;
        assert_eq!(registry.len().await, 1);
        registry.unregister("a").await;
        assert_eq!(registry.len().await, 0);
    }
}
