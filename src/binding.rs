//! Boundary with the platform driver that actually talks to the radio.

use crate::error::BindingError;
use std::fmt::{Display, Formatter};

/// Opaque attribute handle (characteristic, descriptor or service) as understood by the binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u16);

impl Display for Handle {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "0x{:04X}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteType {
  #[default]
  Default,
  NoResponse,
  Signed,
}

impl Display for WriteType {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      WriteType::Default => "WRITE_TYPE_DEFAULT",
      WriteType::NoResponse => "WRITE_TYPE_NO_RESPONSE",
      WriteType::Signed => "WRITE_TYPE_SIGNED",
    };
    f.write_str(s)
  }
}

/// A connected (or connectable) GATT link.
///
/// Every issue method returns immediately: `Ok(true)` when the request was handed to the
/// controller, `Ok(false)` when the driver refused it, `Err` when the transport is gone. The
/// outcome of an accepted request arrives later, out-of-band, as an
/// [`Event`](crate::event::Event) the binding publishes on the
/// [`EventBus`](crate::event_bus::EventBus) it was constructed with.
///
/// # Ordering precondition
///
/// Results carry no request identifier. The binding MUST deliver the callback of every accepted
/// request in the order the requests were issued; result matching in this crate is only correct
/// under that contract. A binding MAY publish from inside the issue call itself.
///
/// `set_characteristic_notification` is purely local and produces no callback.
pub trait GattBinding: Send + Sync + 'static {
  fn discover_services(&self) -> Result<bool, BindingError>;

  fn read_characteristic(&self, handle: Handle) -> Result<bool, BindingError>;

  fn write_characteristic(
    &self,
    handle: Handle,
    value: &[u8],
    write_type: WriteType,
  ) -> Result<bool, BindingError>;

  fn write_descriptor(&self, handle: Handle, value: &[u8]) -> Result<bool, BindingError>;

  fn request_mtu(&self, mtu: u16) -> Result<bool, BindingError>;

  fn set_characteristic_notification(
    &self,
    handle: Handle,
    enable: bool,
  ) -> Result<bool, BindingError>;

  /// Starts (re)connecting; the outcome arrives as connection state changes.
  fn connect(&self) -> Result<bool, BindingError>;

  fn disconnect(&self) -> Result<(), BindingError>;

  /// Releases the driver resources. Called once, last, by `Gatt::close`.
  fn close(&self);
}
