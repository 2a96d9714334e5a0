//! Domain events and the in-process event bus.
//!
//! Events are fire-and-forget: the bus never blocks, and delivery failure
//! never affects the operation that produced the event. Downstream
//! consumers (a websocket push channel, a notification writer) subscribe
//! independently; having no subscriber at all is normal.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// What happened, from the recipient's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
  MatchCandidateFound,
  MatchConfirmed,
  AccessRequestCreated,
  AccessApproved,
}

/// One notification addressed to one user.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Event {
  pub user_id: Uuid,
  pub kind:    EventKind,
}

/// Broadcast fan-out for [`Event`]s. Cloning is cheap; all clones feed the
/// same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
  tx: broadcast::Sender<Event>,
}

impl EventBus {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity);
    Self { tx }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<Event> {
    self.tx.subscribe()
  }

  /// Publish an event. A send error only means nobody is listening, which
  /// is not the producer's problem.
  pub fn emit(&self, user_id: Uuid, kind: EventKind) {
    let _ = self.tx.send(Event { user_id, kind });
  }
}

impl Default for EventBus {
  fn default() -> Self { Self::new(64) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn subscriber_receives_emitted_event() {
    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let user = Uuid::new_v4();

    bus.emit(user, EventKind::MatchConfirmed);

    let event = rx.recv().await.unwrap();
    assert_eq!(event.user_id, user);
    assert_eq!(event.kind, EventKind::MatchConfirmed);
  }

  #[test]
  fn emit_without_subscribers_is_a_no_op() {
    let bus = EventBus::default();
    bus.emit(Uuid::new_v4(), EventKind::AccessApproved);
  }
}
