use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts GATT operations between submission and result delivery.
#[derive(Clone, Default)]
pub(crate) struct InFlight {
  count: Arc<AtomicUsize>,
}

impl InFlight {
  pub fn enter(&self) -> InFlightGuard {
    self.count.fetch_add(1, Ordering::AcqRel);
    InFlightGuard {
      count: self.count.clone(),
    }
  }

  pub fn count(&self) -> usize {
    self.count.load(Ordering::Acquire)
  }
}

pub(crate) struct InFlightGuard {
  count: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
  fn drop(&mut self) {
    self.count.fetch_sub(1, Ordering::AcqRel);
  }
}
