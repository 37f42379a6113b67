use crate::binding::{GattBinding, Handle, WriteType};
use crate::config::GattConfig;
use crate::connection_state::ConnectionStateMonitor;
use crate::error::{BindingError, GattError};
use crate::event::{
  ConnectionState, Event, EventKind, OnCharacteristicChanged, OnCharacteristicRead,
  OnCharacteristicWrite, OnConnectionStateChange, OnDescriptorWrite, OnMtuChanged,
  OnServicesDiscovered,
};
use crate::event_bus::{EventBus, PendingResult};
use crate::handle::InFlight;
use crate::messenger::{bytes_string, Messenger, Operation};
use crate::responder::Submission;
use futures_util::{future, Stream, StreamExt};
use log::{debug, info, trace, warn};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Awaitable GATT client over a callback-driven [`GattBinding`].
///
/// Every operation is queued behind all earlier ones, issued once the link is free, and resolved
/// with the callback the binding publishes for it. A non-success [`GattStatus`] in the returned
/// payload is data, not an error; only a binding that refuses the call, or a closed instance,
/// produces `Err`.
///
/// Must be created inside a tokio runtime.
///
/// [`GattStatus`]: crate::event::GattStatus
pub struct Gatt<B: GattBinding> {
  binding: Arc<B>,
  bus: EventBus,
  messenger: Messenger,
  monitor: ConnectionStateMonitor,
  in_flight: InFlight,
  config: GattConfig,
  label: Arc<str>,
  closed: AtomicBool,
}

impl<B: GattBinding> Gatt<B> {
  /// `bus` must be the bus `binding` publishes its callbacks on.
  pub fn new(binding: B, bus: EventBus) -> Self {
    Self::with_config(binding, bus, GattConfig::default())
  }

  pub fn with_config(binding: B, bus: EventBus, config: GattConfig) -> Self {
    let binding = Arc::new(binding);
    let label: Arc<str> = Arc::from(config.label.as_str());
    let messenger = Messenger::spawn(binding.clone(), bus.clone(), &config);
    let monitor = ConnectionStateMonitor::new(bus.clone(), label.clone());
    Self {
      binding,
      bus,
      messenger,
      monitor,
      in_flight: Default::default(),
      config,
      label,
      closed: AtomicBool::new(false),
    }
  }

  pub fn binding(&self) -> &B {
    &self.binding
  }

  pub fn event_bus(&self) -> &EventBus {
    &self.bus
  }

  /// Every connection state change from now on.
  pub fn on_connection_state_change(
    &self,
  ) -> impl Stream<Item = OnConnectionStateChange> + Send + Unpin + 'static {
    self
      .bus
      .subscribe(EventKind::ConnectionStateChange)
      .filter_map(|event| future::ready(OnConnectionStateChange::try_from(event).ok()))
  }

  /// Every notification or indication value from now on.
  pub fn on_characteristic_changed(
    &self,
  ) -> impl Stream<Item = OnCharacteristicChanged> + Send + Unpin + 'static {
    self
      .bus
      .subscribe(EventKind::CharacteristicChanged)
      .filter_map(|event| future::ready(OnCharacteristicChanged::try_from(event).ok()))
  }

  /// Asks the binding to connect without waiting for the outcome.
  pub fn request_connect(&self) -> Result<bool, BindingError> {
    self.binding.connect()
  }

  /// Asks the binding to disconnect without waiting for the outcome.
  pub fn request_disconnect(&self) -> Result<(), BindingError> {
    self.binding.disconnect()
  }

  /// Connects and waits for [`ConnectionState::Connected`].
  ///
  /// `Ok(false)` when the binding refused to start connecting, or when the link reported a failed
  /// disconnect first.
  pub async fn connect(&self) -> Result<bool, GattError> {
    self.check_lifecycle("connect")?;
    let wait = self.monitor.watch_for(ConnectionState::Connected)?;
    match self.request_connect() {
      Ok(true) => {}
      Ok(false) => {
        warn!("[{}] connect: binding connect() returned false", self.label);
        return Ok(false);
      }
      Err(e) => {
        warn!("[{}] connect: binding connect() failed: {e}", self.label);
        return Ok(false);
      }
    }
    trace!("[{}] connect: waiting for {}", self.label, ConnectionState::Connected);
    let connected = wait.wait().await?;
    info!("[{}] connect, connected={connected}", self.label);
    Ok(connected)
  }

  /// Disconnects and waits for [`ConnectionState::Disconnected`].
  pub async fn disconnect(&self) -> Result<(), GattError> {
    self.check_lifecycle("disconnect")?;
    let wait = self.monitor.watch_for(ConnectionState::Disconnected)?;
    self
      .request_disconnect()
      .map_err(|e| GattError::rejected("disconnect()", Some(e)))?;
    trace!(
      "[{}] disconnect: waiting for {}",
      self.label,
      ConnectionState::Disconnected
    );
    wait.wait().await?;
    info!("[{}] disconnect, disconnected", self.label);
    Ok(())
  }

  fn check_lifecycle(&self, call: &str) -> Result<(), GattError> {
    let in_flight = self.in_flight.count();
    if self.config.guard_lifecycle && in_flight > 0 {
      warn!("[{}] {call}: refused, {in_flight} operation(s) in flight", self.label);
      return Err(GattError::OperationsInFlight(in_flight));
    }
    Ok(())
  }

  /// Tears down in order: state monitor, messenger, pending results and subscriptions, binding.
  ///
  /// Every outstanding operation or wait resolves with a closed failure. Idempotent, callable from
  /// any task.
  pub fn close(&self) {
    if self.closed.swap(true, Ordering::AcqRel) {
      return;
    }
    debug!("[{}] close: begin", self.label);
    self.monitor.close();
    self.messenger.close();
    self.bus.close();
    self.binding.close();
    debug!("[{}] close: end", self.label);
  }

  pub fn is_closed(&self) -> bool {
    self.closed.load(Ordering::Acquire)
  }

  pub async fn discover_services(&self) -> Result<OnServicesDiscovered, GattError> {
    let result: OnServicesDiscovered = self.execute(Operation::DiscoverServices).await?;
    info!(
      "[{}] discover_services, {} service(s), status={}",
      self.label,
      result.services.len(),
      result.status
    );
    Ok(result)
  }

  pub async fn read_characteristic(
    &self,
    handle: Handle,
  ) -> Result<OnCharacteristicRead, GattError> {
    let result: OnCharacteristicRead = self
      .execute(Operation::ReadCharacteristic { handle })
      .await?;
    info!(
      "[{}] <- read_characteristic {handle} ({}), status={}",
      self.label,
      bytes_string(result.value.len()),
      result.status
    );
    Ok(result)
  }

  pub async fn write_characteristic(
    &self,
    handle: Handle,
    value: &[u8],
    write_type: WriteType,
  ) -> Result<OnCharacteristicWrite, GattError> {
    let result: OnCharacteristicWrite = self
      .execute(Operation::WriteCharacteristic {
        handle,
        value: value.to_vec(),
        write_type,
      })
      .await?;
    info!(
      "[{}] -> write_characteristic {handle} ({}), type={write_type}, status={}",
      self.label,
      bytes_string(value.len()),
      result.status
    );
    Ok(result)
  }

  pub async fn write_descriptor(
    &self,
    handle: Handle,
    value: &[u8],
  ) -> Result<OnDescriptorWrite, GattError> {
    let result: OnDescriptorWrite = self
      .execute(Operation::WriteDescriptor {
        handle,
        value: value.to_vec(),
      })
      .await?;
    info!(
      "[{}] -> write_descriptor {handle} ({}), status={}",
      self.label,
      bytes_string(value.len()),
      result.status
    );
    Ok(result)
  }

  pub async fn request_mtu(&self, mtu: u16) -> Result<OnMtuChanged, GattError> {
    let result: OnMtuChanged = self.execute(Operation::RequestMtu { mtu }).await?;
    info!(
      "[{}] request_mtu {mtu} -> {}, status={}",
      self.label, result.mtu, result.status
    );
    Ok(result)
  }

  /// Enables or disables local delivery of notifications for `handle`. The binding produces no
  /// callback for this, so acceptance is the whole result.
  pub async fn set_characteristic_notification(
    &self,
    handle: Handle,
    enable: bool,
  ) -> Result<bool, GattError> {
    let _in_flight = self.in_flight.enter();
    let operation = Operation::SetCharacteristicNotification { handle, enable };
    self.submit(operation).await?;
    info!(
      "[{}] set_characteristic_notification {handle} enable={enable}",
      self.label
    );
    Ok(true)
  }

  async fn execute<T>(&self, operation: Operation) -> Result<T, GattError>
  where
    T: TryFrom<Event, Error = Event>,
  {
    let _in_flight = self.in_flight.enter();
    let call = operation.to_string();
    let pending = self
      .submit(operation)
      .await?
      .ok_or_else(|| GattError::NoCallback(call.clone()))?;

    trace!("[{}] {call}: waiting for callback", self.label);
    let event = pending.recv().await?;
    T::try_from(event).map_err(|event| {
      warn!("[{}] {call}: unexpected {:?} callback", self.label, event.kind());
      GattError::UnexpectedCallback {
        call,
        kind: event.kind(),
      }
    })
  }

  async fn submit(&self, operation: Operation) -> Result<Option<PendingResult>, GattError> {
    let call = operation.to_string();
    debug!("[{}] {call}: submitting", self.label);
    match self.messenger.submit(operation).await? {
      Submission::Accepted(pending) => Ok(pending),
      Submission::Rejected(source) => {
        warn!("[{}] {call}: rejected by binding", self.label);
        Err(GattError::rejected(call, source))
      }
    }
  }
}

impl<B: GattBinding> Debug for Gatt<B> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Gatt")
      .field("label", &self.label)
      .field("in_flight", &self.in_flight.count())
      .field("closed", &self.is_closed())
      .finish_non_exhaustive()
  }
}

impl<B: GattBinding> Drop for Gatt<B> {
  fn drop(&mut self) {
    self.close();
  }
}
