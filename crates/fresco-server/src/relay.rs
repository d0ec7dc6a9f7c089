//! Live fan-out of strokes, presence, and leaves to peer sessions.
//!
//! The relay keeps no state of its own: it encodes a frame once and asks the
//! registry to deliver it. Sessions hold no back-reference to the relay; the
//! connection close handler calls in here directly.

use std::sync::Arc;

use uuid::Uuid;

use fresco_store::Stroke;

use crate::protocol;
use crate::sessions::{PresenceState, SessionRegistry};

#[derive(Clone)]
pub struct Relay {
    registry: Arc<SessionRegistry>,
}

impl Relay {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Send a canonical stroke to every peer except the originator.
    /// `origin` is `None` for strokes that arrived over HTTP.
    pub async fn broadcast_stroke(&self, origin: Option<Uuid>, stroke: &Stroke) {
        let frame = protocol::stroke_frame(stroke);
        self.registry.fanout(&frame, origin).await;
    }

    /// Send a presence update to every peer except its subject.
    pub async fn broadcast_presence(&self, state: &PresenceState) {
        let frame = protocol::presence_frame(
            &state.id.to_string(),
            state.x,
            state.y,
            &state.cursor_color,
            &state.display_name,
        );
        self.registry.fanout(&frame, Some(state.id)).await;
    }

    /// Announce a departed peer to everyone remaining.
    pub async fn broadcast_leave(&self, id: Uuid) {
        let frame = protocol::leave_frame(&id.to_string());
        self.registry.fanout(&frame, None).await;
    }
}
