//! In-memory registry of connected peer sessions.
//!
//! Presence lives and dies with the channel: nothing here is persisted.
//! Tiles-role sessions never enter the registry; they have no presence.

use std::collections::HashMap;

use rand::Rng;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use fresco_store::constants::MAX_NAME_LEN;

use crate::protocol::PresenceUpdate;

/// Outbound frame queue of one connection. Sends never block; a dead
/// receiver just means the session is on its way out.
pub type FrameSender = mpsc::UnboundedSender<String>;

#[derive(Debug, Clone)]
pub struct PeerSession {
    pub id: Uuid,
    pub display_name: String,
    pub cursor_color: String,
    pub x: f64,
    pub y: f64,
    sender: FrameSender,
}

/// What identification hands back to the connection handler.
#[derive(Debug, Clone)]
pub struct PeerJoined {
    pub id: Uuid,
    pub cursor_color: String,
    pub display_name: String,
    /// `(id, x, y)` of every peer already connected.
    pub others: Vec<(String, f64, f64)>,
}

/// Presence state after a mutation, ready for broadcast.
#[derive(Debug, Clone)]
pub struct PresenceState {
    pub id: Uuid,
    pub x: f64,
    pub y: f64,
    pub cursor_color: String,
    pub display_name: String,
}

#[derive(Default)]
pub struct SessionRegistry {
    peers: RwLock<HashMap<Uuid, PeerSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint an identity for a newly identified peer and insert it.
    ///
    /// The snapshot of already-connected peers is taken under the same write
    /// lock as the insert, so the welcome and the registry agree.
    pub async fn register(&self, sender: FrameSender) -> PeerJoined {
        let id = Uuid::new_v4();
        let cursor_color = random_cursor_color();
        let display_name = default_name(&id);

        let mut peers = self.peers.write().await;
        let others = peers
            .values()
            .map(|p| (p.id.to_string(), p.x, p.y))
            .collect();

        peers.insert(
            id,
            PeerSession {
                id,
                display_name: display_name.clone(),
                cursor_color: cursor_color.clone(),
                x: 0.0,
                y: 0.0,
                sender,
            },
        );

        PeerJoined {
            id,
            cursor_color,
            display_name,
            others,
        }
    }

    /// Drop a session. Returns false if it was already gone.
    pub async fn remove(&self, id: Uuid) -> bool {
        self.peers.write().await.remove(&id).is_some()
    }

    /// Apply a partial presence mutation and return the resulting state.
    /// `None` if the session is unknown.
    pub async fn apply_presence(
        &self,
        id: Uuid,
        update: PresenceUpdate,
    ) -> Option<PresenceState> {
        let mut peers = self.peers.write().await;
        let session = peers.get_mut(&id)?;

        if let Some(x) = update.x {
            session.x = x;
        }
        if let Some(y) = update.y {
            session.y = y;
        }
        if let Some(color) = update.color {
            session.cursor_color = color;
        }
        if let Some(name) = update.name {
            session.display_name = name.chars().take(MAX_NAME_LEN).collect();
        }

        Some(PresenceState {
            id: session.id,
            x: session.x,
            y: session.y,
            cursor_color: session.cursor_color.clone(),
            display_name: session.display_name.clone(),
        })
    }

    /// Deliver one frame to every peer session except `exclude`.
    ///
    /// Individual send failures are swallowed; the failing session's own
    /// close handler removes it.
    pub async fn fanout(&self, frame: &str, exclude: Option<Uuid>) {
        let peers = self.peers.read().await;
        for session in peers.values() {
            if Some(session.id) == exclude {
                continue;
            }
            let _ = session.sender.send(frame.to_string());
        }
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }
}

fn random_cursor_color() -> String {
    let hue = rand::thread_rng().gen_range(0..360);
    format!("hsl({hue}, 70%, 55%)")
}

fn default_name(id: &Uuid) -> String {
    let hex = id.simple().to_string();
    format!("peer-{}", &hex[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (FrameSender, mpsc::UnboundedReceiver<String>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn register_issues_unique_identities() {
        let registry = SessionRegistry::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        let a = registry.register(tx1).await;
        let b = registry.register(tx2).await;

        assert_ne!(a.id, b.id);
        assert!(a.display_name.starts_with("peer-"));
        assert!(a.cursor_color.starts_with("hsl("));
        assert_eq!(registry.peer_count().await, 2);
    }

    #[tokio::test]
    async fn snapshot_excludes_the_newcomer() {
        let registry = SessionRegistry::new();
        let (tx1, _rx1) = channel();
        let a = registry.register(tx1).await;
        assert!(a.others.is_empty());

        let (tx2, _rx2) = channel();
        let b = registry.register(tx2).await;
        assert_eq!(b.others.len(), 1);
        assert_eq!(b.others[0].0, a.id.to_string());
        assert_eq!(b.others[0].1, 0.0);
    }

    #[tokio::test]
    async fn presence_mutation_is_partial() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = channel();
        let joined = registry.register(tx).await;

        let state = registry
            .apply_presence(
                joined.id,
                PresenceUpdate {
                    x: Some(42.0),
                    y: Some(-7.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(state.x, 42.0);
        assert_eq!(state.y, -7.0);
        assert_eq!(state.display_name, joined.display_name);

        let state = registry
            .apply_presence(
                joined.id,
                PresenceUpdate {
                    name: Some("x".repeat(100)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(state.display_name.chars().count(), MAX_NAME_LEN);
        // Cursor untouched by a name-only update.
        assert_eq!(state.x, 42.0);
    }

    #[tokio::test]
    async fn presence_for_unknown_session_is_none() {
        let registry = SessionRegistry::new();
        let state = registry
            .apply_presence(Uuid::new_v4(), PresenceUpdate::default())
            .await;
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn fanout_excludes_the_originator() {
        let registry = SessionRegistry::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        let a = registry.register(tx1).await;
        let _b = registry.register(tx2).await;

        registry.fanout("hello", Some(a.id)).await;

        assert_eq!(rx2.try_recv().unwrap(), "hello");
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn fanout_to_dead_receiver_is_swallowed() {
        let registry = SessionRegistry::new();
        let (tx1, rx1) = channel();
        let (tx2, mut rx2) = channel();
        registry.register(tx1).await;
        registry.register(tx2).await;
        drop(rx1);

        registry.fanout("still-works", None).await;
        assert_eq!(rx2.try_recv().unwrap(), "still-works");
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = channel();
        let joined = registry.register(tx).await;

        assert!(registry.remove(joined.id).await);
        assert!(!registry.remove(joined.id).await);
        assert_eq!(registry.peer_count().await, 0);
    }
}
