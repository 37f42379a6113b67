use crate::error::{BindingError, GattError};
use crate::event_bus::PendingResult;
use log::warn;
use tokio::sync::oneshot;

/// Outcome of handing one operation to the binding.
#[derive(Debug)]
pub enum Submission {
  /// The binding took the request. Holds the callback slot when the operation has one.
  Accepted(Option<PendingResult>),
  /// The binding refused the request, or its transport failed. No callback will follow.
  Rejected(Option<BindingError>),
}

impl Submission {
  pub fn is_accepted(&self) -> bool {
    matches!(self, Submission::Accepted(_))
  }
}

pub(crate) type SubmissionResult = Result<Submission, GattError>;

/// Single-assignment resolver of a submission future.
#[derive(Debug)]
pub(crate) struct SubmissionResponder {
  tx: Option<oneshot::Sender<SubmissionResult>>,
}

impl SubmissionResponder {
  pub fn new() -> (Self, oneshot::Receiver<SubmissionResult>) {
    let (tx, rx) = oneshot::channel();
    (Self { tx: Some(tx) }, rx)
  }

  /// The submitter stopped waiting.
  pub fn is_abandoned(&self) -> bool {
    self.tx.as_ref().map_or(true, |tx| tx.is_closed())
  }

  pub fn respond(mut self, result: SubmissionResult) {
    if let Some(tx) = self.tx.take() {
      let _ = tx.send(result);
    }
  }

  /// Drops the responder without resolving, for a request that never entered the queue.
  pub fn discard(mut self) {
    self.tx.take();
  }
}

impl Drop for SubmissionResponder {
  fn drop(&mut self) {
    if let Some(tx) = self.tx.take() {
      warn!("Submission dropped without a response!");
      let _ = tx.send(Err(GattError::MessengerClosed));
    }
  }
}
