use crate::error::GattError;
use crate::event::{ConnectionState, Event, EventKind};
use crate::event_bus::{EventBus, Subscription};
use log::{debug, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Turns the connection state change stream into "wait until state X" conditions.
///
/// Only one wait may be outstanding at a time.
pub struct ConnectionStateMonitor {
  bus: EventBus,
  close_tx: watch::Sender<bool>,
  waiting: Arc<AtomicBool>,
  label: Arc<str>,
}

impl ConnectionStateMonitor {
  pub fn new(bus: EventBus, label: Arc<str>) -> Self {
    let (close_tx, _) = watch::channel(false);
    Self {
      bus,
      close_tx,
      waiting: Default::default(),
      label,
    }
  }

  /// Starts watching for `target` right away, so a transition triggered after this call cannot be
  /// missed. Await the returned [`StateWait`] to suspend until it happens.
  pub fn watch_for(&self, target: ConnectionState) -> Result<StateWait, GattError> {
    if self.is_closed() {
      return Err(GattError::ClosedWhileWaiting(target.to_string()));
    }
    if self.waiting.swap(true, Ordering::AcqRel) {
      return Err(GattError::WaitInProgress(target));
    }
    Ok(StateWait {
      target,
      subscription: self.bus.subscribe(EventKind::ConnectionStateChange),
      close_rx: self.close_tx.subscribe(),
      _guard: WaitGuard(self.waiting.clone()),
      label: self.label.clone(),
    })
  }

  /// Suspends until `target` is reported. `Ok(false)` when the link dropped with a failure
  /// status before reaching it.
  pub async fn await_state(&self, target: ConnectionState) -> Result<bool, GattError> {
    self.watch_for(target)?.wait().await
  }

  /// Fails the outstanding wait, if any, and every later one. Idempotent.
  pub fn close(&self) {
    if !self.close_tx.send_replace(true) {
      debug!("[{}] Closing connection state monitor", self.label);
    }
  }

  pub fn is_closed(&self) -> bool {
    *self.close_tx.borrow()
  }
}

struct WaitGuard(Arc<AtomicBool>);

impl Drop for WaitGuard {
  fn drop(&mut self) {
    self.0.store(false, Ordering::Release);
  }
}

/// An armed wait for one connection state. Dropping it unsubscribes.
pub struct StateWait {
  target: ConnectionState,
  subscription: Subscription,
  close_rx: watch::Receiver<bool>,
  _guard: WaitGuard,
  label: Arc<str>,
}

impl StateWait {
  pub async fn wait(mut self) -> Result<bool, GattError> {
    let target = self.target;
    loop {
      let event = tokio::select! {
        biased;
        _ = self.close_rx.wait_for(|closed| *closed) => None,
        event = self.subscription.recv() => event,
      };
      let change = match event {
        Some(Event::ConnectionStateChange(change)) => change,
        Some(_) => continue,
        None => {
          debug!("[{}] Closed while waiting for {target}", self.label);
          return Err(GattError::ClosedWhileWaiting(target.to_string()));
        }
      };

      if change.new_state == target {
        trace!("[{}] Reached {target}", self.label);
        return Ok(true);
      }
      if change.new_state == ConnectionState::Disconnected && !change.status.is_success() {
        warn!(
          "[{}] Disconnected with {} while waiting for {target}",
          self.label, change.status
        );
        return Ok(false);
      }
      trace!(
        "[{}] Ignoring {} while waiting for {target}",
        self.label,
        change.new_state
      );
    }
  }
}
