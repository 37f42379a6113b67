//! The only component allowed to issue GATT operations on the binding.
//!
//! Requests from any number of callers are funneled through one queue into a single task. That
//! task issues them strictly one at a time: the binding's synchronous accept/reject for a request
//! resolves its submission before the next request is dequeued.

use crate::binding::{GattBinding, Handle, WriteType};
use crate::config::GattConfig;
use crate::error::{BindingError, GattError};
use crate::event::EventKind;
use crate::event_bus::EventBus;
use crate::responder::{Submission, SubmissionResponder};
use log::{debug, trace, warn};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
  DiscoverServices,
  ReadCharacteristic {
    handle: Handle,
  },
  WriteCharacteristic {
    handle: Handle,
    value: Vec<u8>,
    write_type: WriteType,
  },
  WriteDescriptor {
    handle: Handle,
    value: Vec<u8>,
  },
  RequestMtu {
    mtu: u16,
  },
  SetCharacteristicNotification {
    handle: Handle,
    enable: bool,
  },
}

impl Operation {
  /// Callback kind that completes this operation, if the binding produces one.
  pub fn result_kind(&self) -> Option<EventKind> {
    match self {
      Operation::DiscoverServices => Some(EventKind::ServicesDiscovered),
      Operation::ReadCharacteristic { .. } => Some(EventKind::CharacteristicRead),
      Operation::WriteCharacteristic { .. } => Some(EventKind::CharacteristicWrite),
      Operation::WriteDescriptor { .. } => Some(EventKind::DescriptorWrite),
      Operation::RequestMtu { .. } => Some(EventKind::MtuChanged),
      Operation::SetCharacteristicNotification { .. } => None,
    }
  }

  fn issue(&self, binding: &dyn GattBinding) -> Result<bool, BindingError> {
    match self {
      Operation::DiscoverServices => binding.discover_services(),
      Operation::ReadCharacteristic { handle } => binding.read_characteristic(*handle),
      Operation::WriteCharacteristic {
        handle,
        value,
        write_type,
      } => binding.write_characteristic(*handle, value, *write_type),
      Operation::WriteDescriptor { handle, value } => binding.write_descriptor(*handle, value),
      Operation::RequestMtu { mtu } => binding.request_mtu(*mtu),
      Operation::SetCharacteristicNotification { handle, enable } => {
        binding.set_characteristic_notification(*handle, *enable)
      }
    }
  }
}

impl Display for Operation {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Operation::DiscoverServices => write!(f, "discover_services()"),
      Operation::ReadCharacteristic { handle } => write!(f, "read_characteristic({handle})"),
      Operation::WriteCharacteristic {
        handle,
        value,
        write_type,
      } => write!(
        f,
        "write_characteristic({handle}, {}, {write_type})",
        bytes_string(value.len())
      ),
      Operation::WriteDescriptor { handle, value } => write!(
        f,
        "write_descriptor({handle}, {})",
        bytes_string(value.len())
      ),
      Operation::RequestMtu { mtu } => write!(f, "request_mtu({mtu})"),
      Operation::SetCharacteristicNotification { handle, enable } => write!(
        f,
        "set_characteristic_notification({handle}, enable={enable})"
      ),
    }
  }
}

pub(crate) fn bytes_string(len: usize) -> String {
  if len == 1 {
    format!("{len} byte")
  } else {
    format!("{len} bytes")
  }
}

struct Message {
  operation: Operation,
  responder: SubmissionResponder,
}

/// Handle to the serializing task. Dropping it stops the task like [`Messenger::close`].
pub struct Messenger {
  tx: mpsc::Sender<Message>,
  close_tx: watch::Sender<bool>,
  label: Arc<str>,
}

impl Messenger {
  /// Spawns the messenger task on the current tokio runtime.
  pub fn spawn(binding: Arc<dyn GattBinding>, bus: EventBus, config: &GattConfig) -> Self {
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    let (close_tx, close_rx) = watch::channel(false);
    let label: Arc<str> = Arc::from(config.label.as_str());

    let label_for_loop = label.clone();
    tokio::spawn(async move {
      run_messenger(label_for_loop, binding, bus, rx, close_rx).await;
    });

    Self {
      tx,
      close_tx,
      label,
    }
  }

  /// Queues `operation` and waits until the binding accepted or rejected it.
  pub async fn submit(&self, operation: Operation) -> Result<Submission, GattError> {
    if self.is_closed() {
      return Err(GattError::MessengerClosed);
    }
    let (responder, rx) = SubmissionResponder::new();
    self
      .tx
      .send(Message {
        operation,
        responder,
      })
      .await
      .map_err(|SendError(message)| {
        message.responder.discard();
        GattError::MessengerClosed
      })?;
    rx.await.map_err(|_| GattError::MessengerClosed)?
  }

  /// Fails every queued submission and refuses new ones. Idempotent.
  pub fn close(&self) {
    if !self.close_tx.send_replace(true) {
      debug!("[{}] Closing messenger", self.label);
    }
  }

  pub fn is_closed(&self) -> bool {
    *self.close_tx.borrow()
  }
}

async fn run_messenger(
  label: Arc<str>,
  binding: Arc<dyn GattBinding>,
  bus: EventBus,
  mut rx: mpsc::Receiver<Message>,
  mut close_rx: watch::Receiver<bool>,
) {
  loop {
    let message = tokio::select! {
      biased;
      _ = close_rx.wait_for(|closed| *closed) => break,
      message = rx.recv() => match message {
        Some(message) => message,
        None => break,
      },
    };
    process(&label, binding.as_ref(), &bus, message);
  }

  rx.close();
  let mut drained = 0usize;
  while let Some(message) = rx.recv().await {
    trace!("[{label}] Failing queued {}", message.operation);
    message.responder.respond(Err(GattError::MessengerClosed));
    drained += 1;
  }
  debug!("[{label}] Messenger stopped, {drained} queued request(s) failed");
}

fn process(label: &str, binding: &dyn GattBinding, bus: &EventBus, message: Message) {
  let Message {
    operation,
    responder,
  } = message;

  if responder.is_abandoned() {
    debug!("[{label}] Submitter of {operation} went away, not issuing");
    responder.discard();
    return;
  }

  // Registered before issuing: a binding may call back before its issue call returns.
  let pending = match operation.result_kind().map(|kind| bus.expect_result(kind)) {
    Some(Err(e)) => {
      responder.respond(Err(e));
      return;
    }
    Some(Ok(pending)) => Some(pending),
    None => None,
  };

  trace!("[{label}] Issuing {operation}");
  let submission = match operation.issue(binding) {
    Ok(true) => Submission::Accepted(pending),
    Ok(false) => {
      debug!("[{label}] {operation} returned false");
      if let Some(pending) = pending {
        bus.withdraw(pending);
      }
      Submission::Rejected(None)
    }
    Err(e) => {
      warn!("[{label}] {operation} failed: {e}");
      if let Some(pending) = pending {
        bus.withdraw(pending);
      }
      Submission::Rejected(Some(e))
    }
  };
  responder.respond(Ok(submission));
}
