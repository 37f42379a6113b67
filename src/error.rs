use crate::event::{ConnectionState, EventKind, GattStatus};

/// Transport-level fault raised by a [`GattBinding`](crate::binding::GattBinding) when an issue
/// call could not even be attempted (lost transport, dead driver handle, ...).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BindingError {
  message: String,
}

impl BindingError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

#[derive(Debug, thiserror::Error)]
pub enum GattError {
  /// The binding returned `false` from an issue call, or failed with a transport fault.
  #[error("{call} was rejected by the binding")]
  Rejected {
    call: String,
    #[source]
    source: Option<BindingError>,
  },
  #[error("messenger closed")]
  MessengerClosed,
  #[error("closed while waiting for {0}")]
  ClosedWhileWaiting(String),
  #[error("a connection state wait is already outstanding (target {0})")]
  WaitInProgress(ConnectionState),
  #[error("{0} GATT operation(s) in flight")]
  OperationsInFlight(usize),
  #[error("{0} has no callback to wait for")]
  NoCallback(String),
  #[error("{call} received an unexpected {kind:?} callback")]
  UnexpectedCallback { call: String, kind: EventKind },
  #[error("{call} completed with status {status}")]
  Status { call: String, status: GattStatus },
}

impl GattError {
  pub(crate) fn rejected(call: impl Into<String>, source: Option<BindingError>) -> Self {
    GattError::Rejected {
      call: call.into(),
      source,
    }
  }

  /// True for every failure caused by `close()`.
  pub fn is_closed(&self) -> bool {
    matches!(
      self,
      GattError::MessengerClosed | GattError::ClosedWhileWaiting(_)
    )
  }
}
