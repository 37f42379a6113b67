/// Per-instance knobs for [`Gatt`](crate::gatt::Gatt).
#[derive(Debug, Clone)]
pub struct GattConfig {
  /// Prefix for every log line of this instance, typically the peer address.
  pub label: String,

  /// Bound on queued (not yet issued) operations; further submitters wait for room.
  pub queue_capacity: usize,

  /// Refuse `connect`/`disconnect` while GATT operations are outstanding.
  pub guard_lifecycle: bool,
}

impl Default for GattConfig {
  fn default() -> Self {
    Self {
      label: "gatt".to_owned(),
      queue_capacity: 64,
      guard_lifecycle: true,
    }
  }
}

impl GattConfig {
  pub fn with_label(mut self, label: impl Into<String>) -> Self {
    self.label = label.into();
    self
  }

  pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
    self.queue_capacity = capacity.max(1);
    self
  }

  pub fn with_lifecycle_guard(mut self, enabled: bool) -> Self {
    self.guard_lifecycle = enabled;
    self
  }
}
