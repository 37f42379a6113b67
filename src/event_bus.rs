//! Multicast distribution of binding callbacks.
//!
//! Two kinds of receivers hang off the bus:
//!
//! - [`Subscription`]s see every event of the kinds they asked for, buffered until read. Any number
//!   of them may observe the same kind at once.
//! - [`PendingResult`]s are registered by the messenger, one per issued operation that expects a
//!   callback. Each published result event resolves the oldest pending slot of its kind, which is
//!   how an issued request is paired with its callback without any identifier on the wire.

use crate::error::GattError;
use crate::event::{Event, EventKind};
use futures_util::Stream;
use log::{debug, trace, warn};
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use enumset::EnumSet;
use tokio::sync::{mpsc, oneshot};

#[derive(Clone, Default)]
pub struct EventBus {
  state: Arc<Mutex<BusState>>,
}

#[derive(Default)]
struct BusState {
  closed: bool,
  subscribers: Vec<Subscriber>,
  pending: HashMap<EventKind, VecDeque<PendingSlot>>,
  next_slot_id: u64,
}

struct Subscriber {
  kinds: EnumSet<EventKind>,
  tx: mpsc::UnboundedSender<Event>,
}

struct PendingSlot {
  id: u64,
  tx: oneshot::Sender<Event>,
}

impl EventBus {
  pub fn new() -> Self {
    Default::default()
  }

  fn state(&self) -> MutexGuard<'_, BusState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Subscribes to every future event of `kinds`.
  ///
  /// On a closed bus the returned subscription is already terminated.
  pub fn subscribe(&self, kinds: impl Into<EnumSet<EventKind>>) -> Subscription {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut state = self.state();
    if !state.closed {
      state.subscribers.push(Subscriber {
        kinds: kinds.into(),
        tx,
      });
    }
    Subscription { rx }
  }

  /// Delivers `event` to every matching subscriber, and to the oldest pending result of its kind.
  ///
  /// Called from the binding's callback context. Never blocks.
  pub fn publish(&self, event: Event) {
    let kind = event.kind();
    let mut state = self.state();
    if state.closed {
      debug!("Bus closed, dropping {kind:?} event");
      return;
    }

    state.subscribers.retain(|s| {
      if !s.kinds.contains(kind) {
        return !s.tx.is_closed();
      }
      s.tx.send(event.clone()).is_ok()
    });

    if kind.is_result() {
      match state.pending.get_mut(&kind).and_then(VecDeque::pop_front) {
        Some(slot) => {
          trace!("Resolving pending {kind:?} result #{}", slot.id);
          if slot.tx.send(event).is_err() {
            debug!("Requester of {kind:?} result #{} went away, discarding", slot.id);
          }
        }
        None => warn!("Unexpected {kind:?} callback with no pending request, discarding"),
      }
    }
  }

  /// Registers a slot for the next unclaimed result of `kind`.
  pub(crate) fn expect_result(&self, kind: EventKind) -> Result<PendingResult, GattError> {
    let mut state = self.state();
    if state.closed {
      return Err(GattError::MessengerClosed);
    }
    let id = state.next_slot_id;
    state.next_slot_id += 1;
    let (tx, rx) = oneshot::channel();
    state
      .pending
      .entry(kind)
      .or_default()
      .push_back(PendingSlot { id, tx });
    Ok(PendingResult { id, kind, rx })
  }

  /// Removes a slot whose request never reached the link.
  pub(crate) fn withdraw(&self, pending: PendingResult) {
    let mut state = self.state();
    if let Some(queue) = state.pending.get_mut(&pending.kind) {
      queue.retain(|slot| slot.id != pending.id);
    }
  }

  /// Terminates every subscription and fails every pending result. Later publishes are dropped.
  pub fn close(&self) {
    let mut state = self.state();
    if state.closed {
      return;
    }
    state.closed = true;
    let pending: usize = state.pending.values().map(VecDeque::len).sum();
    debug!(
      "Closing event bus ({} subscriber(s), {pending} pending result(s))",
      state.subscribers.len()
    );
    state.subscribers.clear();
    state.pending.clear();
  }

  pub fn is_closed(&self) -> bool {
    self.state().closed
  }

  /// Live subscriptions that include `kind`.
  pub fn subscriber_count(&self, kind: EventKind) -> usize {
    self
      .state()
      .subscribers
      .iter()
      .filter(|s| s.kinds.contains(kind) && !s.tx.is_closed())
      .count()
  }

  /// Issued requests still waiting for a `kind` callback.
  pub fn pending_results(&self, kind: EventKind) -> usize {
    self.state().pending.get(&kind).map_or(0, VecDeque::len)
  }
}

/// Receiving end of [`EventBus::subscribe`]. Dropping it unsubscribes.
pub struct Subscription {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl Subscription {
  /// Next event, or `None` once the bus is closed.
  pub async fn recv(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

impl Stream for Subscription {
  type Item = Event;

  fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    self.rx.poll_recv(cx)
  }
}

/// The callback slot of one issued operation.
#[derive(Debug)]
pub struct PendingResult {
  id: u64,
  kind: EventKind,
  rx: oneshot::Receiver<Event>,
}

impl PendingResult {
  pub fn kind(&self) -> EventKind {
    self.kind
  }

  /// Waits for the matching callback. Fails if the bus is closed first.
  pub async fn recv(self) -> Result<Event, GattError> {
    let kind = self.kind;
    self
      .rx
      .await
      .map_err(|_| GattError::ClosedWhileWaiting(format!("{kind:?} callback")))
  }
}
