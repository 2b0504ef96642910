//! Session-scoped gameplay events
//!
//! Components publish lifecycle events (a kart joined, a kart was eliminated)
//! on a bus owned by the session instead of static global events. The session
//! drains the bus once per tick and routes each event to the game tracker, so
//! publishers never need a reference to the consumer.

use log::debug;
use shared::ClientId;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    PlayerJoined(ClientId),
    PlayerEliminated(ClientId),
}

/// Cloneable publishing side of the bus
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSender {
    pub fn publish(&self, event: SessionEvent) {
        // Closed only while the session is being torn down
        if self.tx.send(event).is_err() {
            debug!("Dropped {:?}: event bus closed", event);
        }
    }
}

/// Receiving side, owned by the session
#[derive(Debug)]
pub struct EventBus {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl EventBus {
    pub fn channel() -> (EventSender, EventBus) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSender { tx }, EventBus { rx })
    }

    /// Takes every event published so far, in publish order
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}
