use crate::binding::Handle;
use crate::error::GattError;
use enumset::{enum_set, EnumSet, EnumSetType};
use std::fmt::{Display, Formatter};

/// Status code reported by the remote side (or the local stack) with every callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GattStatus(pub u16);

impl GattStatus {
  pub const SUCCESS: GattStatus = GattStatus(0x00);
  pub const INVALID_HANDLE: GattStatus = GattStatus(0x01);
  pub const READ_NOT_PERMITTED: GattStatus = GattStatus(0x02);
  pub const WRITE_NOT_PERMITTED: GattStatus = GattStatus(0x03);
  pub const INSUFFICIENT_AUTHENTICATION: GattStatus = GattStatus(0x05);
  pub const REQUEST_NOT_SUPPORTED: GattStatus = GattStatus(0x06);
  pub const INVALID_OFFSET: GattStatus = GattStatus(0x07);
  pub const INSUFFICIENT_AUTHORIZATION: GattStatus = GattStatus(0x08);
  pub const INVALID_ATTRIBUTE_LENGTH: GattStatus = GattStatus(0x0D);
  pub const INSUFFICIENT_ENCRYPTION: GattStatus = GattStatus(0x0F);
  pub const GATT_ERROR: GattStatus = GattStatus(0x85);
  pub const CONNECTION_CONGESTED: GattStatus = GattStatus(0x8F);
  pub const FAILURE: GattStatus = GattStatus(0x101);

  pub fn is_success(&self) -> bool {
    *self == Self::SUCCESS
  }

  fn name(&self) -> Option<&'static str> {
    let name = match *self {
      Self::SUCCESS => "GATT_SUCCESS",
      Self::INVALID_HANDLE => "GATT_INVALID_HANDLE",
      Self::READ_NOT_PERMITTED => "GATT_READ_NOT_PERMITTED",
      Self::WRITE_NOT_PERMITTED => "GATT_WRITE_NOT_PERMITTED",
      Self::INSUFFICIENT_AUTHENTICATION => "GATT_INSUFFICIENT_AUTHENTICATION",
      Self::REQUEST_NOT_SUPPORTED => "GATT_REQUEST_NOT_SUPPORTED",
      Self::INVALID_OFFSET => "GATT_INVALID_OFFSET",
      Self::INSUFFICIENT_AUTHORIZATION => "GATT_INSUFFICIENT_AUTHORIZATION",
      Self::INVALID_ATTRIBUTE_LENGTH => "GATT_INVALID_ATTRIBUTE_LENGTH",
      Self::INSUFFICIENT_ENCRYPTION => "GATT_INSUFFICIENT_ENCRYPTION",
      Self::GATT_ERROR => "GATT_ERROR",
      Self::CONNECTION_CONGESTED => "GATT_CONNECTION_CONGESTED",
      Self::FAILURE => "GATT_FAILURE",
      _ => return None,
    };
    Some(name)
  }
}

impl Display for GattStatus {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self.name() {
      Some(name) => write!(f, "{name}({})", self.0),
      None => write!(f, "GATT_UNKNOWN({})", self.0),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
  Disconnected,
  Connecting,
  Connected,
  Disconnecting,
}

impl Display for ConnectionState {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      ConnectionState::Disconnected => "STATE_DISCONNECTED",
      ConnectionState::Connecting => "STATE_CONNECTING",
      ConnectionState::Connected => "STATE_CONNECTED",
      ConnectionState::Disconnecting => "STATE_DISCONNECTING",
    };
    f.write_str(s)
  }
}

#[derive(EnumSetType, Debug, Hash)]
pub enum EventKind {
  ConnectionStateChange,
  ServicesDiscovered,
  CharacteristicRead,
  CharacteristicWrite,
  DescriptorWrite,
  MtuChanged,
  CharacteristicChanged,
}

impl EventKind {
  /// Kinds that complete a queued operation, as opposed to unsolicited ones.
  pub const RESULTS: EnumSet<EventKind> = enum_set!(
    EventKind::ServicesDiscovered
      | EventKind::CharacteristicRead
      | EventKind::CharacteristicWrite
      | EventKind::DescriptorWrite
      | EventKind::MtuChanged
  );

  pub fn is_result(self) -> bool {
    Self::RESULTS.contains(self)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnConnectionStateChange {
  pub status: GattStatus,
  pub new_state: ConnectionState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnServicesDiscovered {
  pub status: GattStatus,
  pub services: Vec<Handle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnCharacteristicRead {
  pub handle: Handle,
  pub value: Vec<u8>,
  pub status: GattStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnCharacteristicWrite {
  pub handle: Handle,
  pub value: Vec<u8>,
  pub status: GattStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnDescriptorWrite {
  pub handle: Handle,
  pub value: Vec<u8>,
  pub status: GattStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnMtuChanged {
  pub mtu: u16,
  pub status: GattStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnCharacteristicChanged {
  pub handle: Handle,
  pub value: Vec<u8>,
}

/// One callback from the binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
  ConnectionStateChange(OnConnectionStateChange),
  ServicesDiscovered(OnServicesDiscovered),
  CharacteristicRead(OnCharacteristicRead),
  CharacteristicWrite(OnCharacteristicWrite),
  DescriptorWrite(OnDescriptorWrite),
  MtuChanged(OnMtuChanged),
  CharacteristicChanged(OnCharacteristicChanged),
}

impl Event {
  pub fn kind(&self) -> EventKind {
    match self {
      Event::ConnectionStateChange(_) => EventKind::ConnectionStateChange,
      Event::ServicesDiscovered(_) => EventKind::ServicesDiscovered,
      Event::CharacteristicRead(_) => EventKind::CharacteristicRead,
      Event::CharacteristicWrite(_) => EventKind::CharacteristicWrite,
      Event::DescriptorWrite(_) => EventKind::DescriptorWrite,
      Event::MtuChanged(_) => EventKind::MtuChanged,
      Event::CharacteristicChanged(_) => EventKind::CharacteristicChanged,
    }
  }
}

macro_rules! impl_from_event {
  ($($variant:ident($payload:ident)),* $(,)?) => {
    $(
      impl From<$payload> for Event {
        fn from(payload: $payload) -> Self {
          Event::$variant(payload)
        }
      }

      impl TryFrom<Event> for $payload {
        type Error = Event;

        fn try_from(event: Event) -> Result<Self, Self::Error> {
          match event {
            Event::$variant(payload) => Ok(payload),
            other => Err(other),
          }
        }
      }
    )*
  };
}

impl_from_event!(
  ConnectionStateChange(OnConnectionStateChange),
  ServicesDiscovered(OnServicesDiscovered),
  CharacteristicRead(OnCharacteristicRead),
  CharacteristicWrite(OnCharacteristicWrite),
  DescriptorWrite(OnDescriptorWrite),
  MtuChanged(OnMtuChanged),
  CharacteristicChanged(OnCharacteristicChanged),
);

/// Converts a non-success status carried by a result into [`GattError::Status`].
pub trait CheckStatus: Sized {
  const CALL: &'static str;

  fn status(&self) -> GattStatus;

  fn check_status(self) -> Result<Self, GattError> {
    let status = self.status();
    if status.is_success() {
      Ok(self)
    } else {
      Err(GattError::Status {
        call: Self::CALL.to_owned(),
        status,
      })
    }
  }
}

macro_rules! impl_check_status {
  ($($payload:ident => $call:literal),* $(,)?) => {
    $(
      impl CheckStatus for $payload {
        const CALL: &'static str = $call;

        fn status(&self) -> GattStatus {
          self.status
        }
      }
    )*
  };
}

impl_check_status!(
  OnConnectionStateChange => "connection state change",
  OnServicesDiscovered => "discover_services",
  OnCharacteristicRead => "read_characteristic",
  OnCharacteristicWrite => "write_characteristic",
  OnDescriptorWrite => "write_descriptor",
  OnMtuChanged => "request_mtu",
);
