#![allow(dead_code)]

use gatt_messenger::messenger::Operation;
use gatt_messenger::{
  BindingError, ConnectionState, Event, EventBus, GattBinding, GattStatus, Handle,
  OnCharacteristicRead, OnCharacteristicWrite, OnConnectionStateChange, OnDescriptorWrite,
  OnMtuChanged, OnServicesDiscovered, WriteType,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Mutex, Once};
use std::thread;
use std::time::Duration;

pub fn init_logging() {
  static INIT: Once = Once::new();
  INIT.call_once(|| {
    let _ = env_logger::builder().is_test(true).try_init();
  });
}

/// In-memory link. Records every issued operation and, in auto mode, answers each accepted one
/// from a separate callback thread in issue order.
pub struct FakeBinding {
  bus: EventBus,
  accept: AtomicBool,
  connect_accepted: AtomicBool,
  fail_transport: AtomicBool,
  issued: Mutex<Vec<Operation>>,
  in_call: AtomicBool,
  overlaps: AtomicUsize,
  closed: AtomicBool,
  inline: AtomicBool,
  replies: Option<Mutex<mpsc::Sender<Event>>>,
}

impl FakeBinding {
  /// Callbacks are published by the test itself.
  pub fn manual(bus: &EventBus) -> Self {
    Self::build(bus, None)
  }

  /// Every accepted operation is answered with a success callback.
  pub fn auto(bus: &EventBus) -> Self {
    let (tx, rx) = mpsc::channel::<Event>();
    let callback_bus = bus.clone();
    thread::spawn(move || {
      while let Ok(event) = rx.recv() {
        thread::sleep(Duration::from_millis(1));
        callback_bus.publish(event);
      }
    });
    Self::build(bus, Some(Mutex::new(tx)))
  }

  fn build(bus: &EventBus, replies: Option<Mutex<mpsc::Sender<Event>>>) -> Self {
    Self {
      bus: bus.clone(),
      accept: AtomicBool::new(true),
      connect_accepted: AtomicBool::new(true),
      fail_transport: AtomicBool::new(false),
      issued: Default::default(),
      in_call: AtomicBool::new(false),
      overlaps: AtomicUsize::new(0),
      closed: AtomicBool::new(false),
      inline: AtomicBool::new(false),
      replies,
    }
  }

  pub fn set_accept(&self, accept: bool) {
    self.accept.store(accept, Ordering::SeqCst);
  }

  pub fn set_connect_accepted(&self, accept: bool) {
    self.connect_accepted.store(accept, Ordering::SeqCst);
  }

  pub fn set_transport_failure(&self, fail: bool) {
    self.fail_transport.store(fail, Ordering::SeqCst);
  }

  /// Answer from inside the issue call instead of the callback thread.
  pub fn set_inline_replies(&self, inline: bool) {
    self.inline.store(inline, Ordering::SeqCst);
  }

  pub fn issued(&self) -> Vec<Operation> {
    self.issued.lock().unwrap().clone()
  }

  pub fn overlaps(&self) -> usize {
    self.overlaps.load(Ordering::SeqCst)
  }

  pub fn is_closed(&self) -> bool {
    self.closed.load(Ordering::SeqCst)
  }

  pub fn publish(&self, event: impl Into<Event>) {
    self.bus.publish(event.into());
  }

  pub fn publish_state(&self, new_state: ConnectionState, status: GattStatus) {
    self.publish(OnConnectionStateChange { status, new_state });
  }

  fn reply(&self, event: impl Into<Event>) {
    if self.inline.load(Ordering::SeqCst) {
      self.bus.publish(event.into());
    } else if let Some(replies) = &self.replies {
      let _ = replies.lock().unwrap().send(event.into());
    }
  }

  fn issue(&self, operation: Operation) -> Result<bool, BindingError> {
    if self.in_call.swap(true, Ordering::SeqCst) {
      self.overlaps.fetch_add(1, Ordering::SeqCst);
    }
    thread::sleep(Duration::from_micros(200));
    self.issued.lock().unwrap().push(operation.clone());
    self.in_call.store(false, Ordering::SeqCst);

    if self.fail_transport.load(Ordering::SeqCst) {
      return Err(BindingError::new("transport lost"));
    }
    let accepted = self.accept.load(Ordering::SeqCst);
    if accepted {
      self.auto_reply(operation);
    }
    Ok(accepted)
  }

  fn auto_reply(&self, operation: Operation) {
    let status = GattStatus::SUCCESS;
    match operation {
      Operation::DiscoverServices => self.reply(OnServicesDiscovered {
        status,
        services: vec![Handle(0x0001), Handle(0x0010)],
      }),
      Operation::ReadCharacteristic { handle } => self.reply(OnCharacteristicRead {
        handle,
        value: handle.0.to_le_bytes().to_vec(),
        status,
      }),
      Operation::WriteCharacteristic { handle, value, .. } => {
        self.reply(OnCharacteristicWrite {
          handle,
          value,
          status,
        })
      }
      Operation::WriteDescriptor { handle, value } => self.reply(OnDescriptorWrite {
        handle,
        value,
        status,
      }),
      Operation::RequestMtu { mtu } => self.reply(OnMtuChanged { mtu, status }),
      Operation::SetCharacteristicNotification { .. } => {}
    }
  }
}

impl GattBinding for FakeBinding {
  fn discover_services(&self) -> Result<bool, BindingError> {
    self.issue(Operation::DiscoverServices)
  }

  fn read_characteristic(&self, handle: Handle) -> Result<bool, BindingError> {
    self.issue(Operation::ReadCharacteristic { handle })
  }

  fn write_characteristic(
    &self,
    handle: Handle,
    value: &[u8],
    write_type: WriteType,
  ) -> Result<bool, BindingError> {
    self.issue(Operation::WriteCharacteristic {
      handle,
      value: value.to_vec(),
      write_type,
    })
  }

  fn write_descriptor(&self, handle: Handle, value: &[u8]) -> Result<bool, BindingError> {
    self.issue(Operation::WriteDescriptor {
      handle,
      value: value.to_vec(),
    })
  }

  fn request_mtu(&self, mtu: u16) -> Result<bool, BindingError> {
    self.issue(Operation::RequestMtu { mtu })
  }

  fn set_characteristic_notification(
    &self,
    handle: Handle,
    enable: bool,
  ) -> Result<bool, BindingError> {
    self.issue(Operation::SetCharacteristicNotification { handle, enable })
  }

  fn connect(&self) -> Result<bool, BindingError> {
    let accepted = self.connect_accepted.load(Ordering::SeqCst);
    if accepted {
      self.reply(OnConnectionStateChange {
        status: GattStatus::SUCCESS,
        new_state: ConnectionState::Connecting,
      });
      self.reply(OnConnectionStateChange {
        status: GattStatus::SUCCESS,
        new_state: ConnectionState::Connected,
      });
    }
    Ok(accepted)
  }

  fn disconnect(&self) -> Result<(), BindingError> {
    self.reply(OnConnectionStateChange {
      status: GattStatus::SUCCESS,
      new_state: ConnectionState::Disconnected,
    });
    Ok(())
  }

  fn close(&self) {
    self.closed.store(true, Ordering::SeqCst);
  }
}
