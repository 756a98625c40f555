use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use duet_types::events::ServerEvent;

struct Peer {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

/// Connection registry for the realtime relay: at most one live connection
/// per user identity. Delivery is at-most-once and fire-and-forget — an
/// offline receiver means the event is dropped.
#[derive(Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

struct RelayInner {
    /// user_id -> active connection. Last writer wins.
    peers: RwLock<HashMap<i64, Peer>>,
}

impl Relay {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RelayInner {
                peers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Bind a user identity to a connection, replacing any earlier binding
    /// for the same user.
    pub async fn register(&self, user_id: i64, conn_id: Uuid, tx: mpsc::UnboundedSender<ServerEvent>) {
        self.inner
            .peers
            .write()
            .await
            .insert(user_id, Peer { conn_id, tx });
        debug!("User {} registered on connection {}", user_id, conn_id);
    }

    /// Forward an event to the receiver's connection if they are online.
    /// Returns whether a connection was found; a missing or closed peer is
    /// not an error.
    pub async fn relay(&self, receiver_id: i64, event: ServerEvent) -> bool {
        let peers = self.inner.peers.read().await;
        match peers.get(&receiver_id) {
            Some(peer) => peer.tx.send(event).is_ok(),
            None => {
                debug!("User {} offline, dropping relay event", receiver_id);
                false
            }
        }
    }

    /// Remove every binding still owned by this connection. A binding taken
    /// over by a newer connection for the same user is left alone.
    pub async fn unregister(&self, conn_id: Uuid) {
        self.inner
            .peers
            .write()
            .await
            .retain(|_, peer| peer.conn_id != conn_id);
    }

    pub async fn is_online(&self, user_id: i64) -> bool {
        self.inner.peers.read().await.contains_key(&user_id)
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typing(sender_id: i64) -> ServerEvent {
        ServerEvent::UserTyping { sender_id }
    }

    #[tokio::test]
    async fn relays_to_registered_peer() {
        let relay = Relay::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        relay.register(1, Uuid::new_v4(), tx).await;

        assert!(relay.relay(1, typing(2)).await);
        match rx.recv().await {
            Some(ServerEvent::UserTyping { sender_id }) => assert_eq!(sender_id, 2),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn drops_event_for_offline_peer() {
        let relay = Relay::new();
        assert!(!relay.relay(42, typing(1)).await);
    }

    #[tokio::test]
    async fn later_registration_replaces_earlier_one() {
        let relay = Relay::new();
        let (old_tx, mut old_rx) = mpsc::unbounded_channel();
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();
        relay.register(1, Uuid::new_v4(), old_tx).await;
        relay.register(1, Uuid::new_v4(), new_tx).await;

        assert!(relay.relay(1, typing(2)).await);
        assert!(new_rx.recv().await.is_some());
        assert!(old_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregister_only_removes_own_binding() {
        let relay = Relay::new();
        let old_conn = Uuid::new_v4();
        let new_conn = Uuid::new_v4();
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, _new_rx) = mpsc::unbounded_channel();

        relay.register(1, old_conn, old_tx).await;
        relay.register(1, new_conn, new_tx).await;

        // stale disconnect after a takeover must not unbind the new connection
        relay.unregister(old_conn).await;
        assert!(relay.is_online(1).await);

        relay.unregister(new_conn).await;
        assert!(!relay.is_online(1).await);
    }
}
