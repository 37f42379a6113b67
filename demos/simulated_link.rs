use futures_util::StreamExt;
use gatt_messenger::{
  BindingError, ConnectionState, Event, EventBus, Gatt, GattBinding, GattConfig, GattStatus,
  Handle, OnCharacteristicChanged, OnCharacteristicRead, OnCharacteristicWrite,
  OnConnectionStateChange, OnDescriptorWrite, OnMtuChanged, OnServicesDiscovered, WriteType,
};
use log::info;
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

const BATTERY_LEVEL: Handle = Handle(0x002B);
const HEART_RATE_MEASUREMENT: Handle = Handle(0x002C);
const HEART_RATE_CCCD: Handle = Handle(0x002D);
const CONTROL_POINT: Handle = Handle(0x002A);

/// Pretend radio: answers every accepted request from its own "controller" thread, in order, after
/// a short air-time delay. Enabling the CCCD starts a heart rate notification ticker.
struct SimulatedLink {
  tx: Mutex<mpsc::Sender<Command>>,
}

enum Command {
  Reply(Event),
  StartNotifications,
}

impl SimulatedLink {
  fn new(bus: EventBus) -> Self {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
      let mut bpm = 60u8;
      let mut notifying = false;
      loop {
        match rx.recv_timeout(Duration::from_millis(50)) {
          Ok(Command::Reply(event)) => {
            thread::sleep(Duration::from_millis(5));
            bus.publish(event);
          }
          Ok(Command::StartNotifications) => notifying = true,
          Err(mpsc::RecvTimeoutError::Timeout) if notifying => {
            bpm = bpm.wrapping_add(1);
            bus.publish(
              OnCharacteristicChanged {
                handle: HEART_RATE_MEASUREMENT,
                value: vec![0x00, bpm],
              }
              .into(),
            );
          }
          Err(mpsc::RecvTimeoutError::Timeout) => {}
          Err(mpsc::RecvTimeoutError::Disconnected) => return,
        }
      }
    });
    Self { tx: Mutex::new(tx) }
  }

  fn send(&self, command: Command) -> Result<bool, BindingError> {
    self
      .tx
      .lock()
      .map_err(|_| BindingError::new("controller poisoned"))?
      .send(command)
      .map_err(|_| BindingError::new("controller gone"))?;
    Ok(true)
  }

  fn reply(&self, event: impl Into<Event>) -> Result<bool, BindingError> {
    self.send(Command::Reply(event.into()))
  }
}

impl GattBinding for SimulatedLink {
  fn discover_services(&self) -> Result<bool, BindingError> {
    self.reply(OnServicesDiscovered {
      status: GattStatus::SUCCESS,
      services: vec![Handle(0x0028)],
    })
  }

  fn read_characteristic(&self, handle: Handle) -> Result<bool, BindingError> {
    if handle != BATTERY_LEVEL {
      return Ok(false);
    }
    self.reply(OnCharacteristicRead {
      handle,
      value: vec![87],
      status: GattStatus::SUCCESS,
    })
  }

  fn write_characteristic(
    &self,
    handle: Handle,
    value: &[u8],
    _write_type: WriteType,
  ) -> Result<bool, BindingError> {
    let status = if handle == CONTROL_POINT {
      GattStatus::SUCCESS
    } else {
      GattStatus::WRITE_NOT_PERMITTED
    };
    self.reply(OnCharacteristicWrite {
      handle,
      value: value.to_vec(),
      status,
    })
  }

  fn write_descriptor(&self, handle: Handle, value: &[u8]) -> Result<bool, BindingError> {
    self.reply(OnDescriptorWrite {
      handle,
      value: value.to_vec(),
      status: GattStatus::SUCCESS,
    })?;
    if handle == HEART_RATE_CCCD && value.first() == Some(&0x01) {
      self.send(Command::StartNotifications)?;
    }
    Ok(true)
  }

  fn request_mtu(&self, mtu: u16) -> Result<bool, BindingError> {
    self.reply(OnMtuChanged {
      mtu: mtu.min(247),
      status: GattStatus::SUCCESS,
    })
  }

  fn set_characteristic_notification(
    &self,
    _handle: Handle,
    _enable: bool,
  ) -> Result<bool, BindingError> {
    Ok(true)
  }

  fn connect(&self) -> Result<bool, BindingError> {
    for new_state in [ConnectionState::Connecting, ConnectionState::Connected] {
      self.reply(OnConnectionStateChange {
        status: GattStatus::SUCCESS,
        new_state,
      })?;
    }
    Ok(true)
  }

  fn disconnect(&self) -> Result<(), BindingError> {
    self.reply(OnConnectionStateChange {
      status: GattStatus::SUCCESS,
      new_state: ConnectionState::Disconnected,
    })?;
    Ok(())
  }

  fn close(&self) {
    info!("Simulated link released");
  }
}

#[tokio::main]
async fn main() -> Result<(), gatt_messenger::GattError> {
  env_logger::init();

  let bus = EventBus::new();
  let gatt = Gatt::with_config(
    SimulatedLink::new(bus.clone()),
    bus,
    GattConfig::default().with_label("C0:FF:EE:00:00:01"),
  );

  if !gatt.connect().await? {
    println!("Could not connect");
    return Ok(());
  }

  let (mtu, services, battery) = tokio::join!(
    gatt.request_mtu(517),
    gatt.discover_services(),
    gatt.read_characteristic(BATTERY_LEVEL),
  );
  println!("MTU {}, {} service(s)", mtu?.mtu, services?.services.len());
  println!("Battery {}%", battery?.value.first().copied().unwrap_or_default());

  let denied = gatt
    .write_characteristic(Handle(0x0099), &[0xFF], WriteType::Default)
    .await?;
  println!("Write to read-only handle: {}", denied.status);

  let mut heart_rate = gatt.on_characteristic_changed();
  gatt
    .set_characteristic_notification(HEART_RATE_MEASUREMENT, true)
    .await?;
  gatt.write_descriptor(HEART_RATE_CCCD, &[0x01, 0x00]).await?;
  for _ in 0..3 {
    if let Some(measurement) = heart_rate.next().await {
      println!("Heart rate {} bpm", measurement.value[1]);
    }
  }

  gatt
    .write_characteristic(CONTROL_POINT, &[0x01], WriteType::NoResponse)
    .await?;
  gatt.disconnect().await?;
  gatt.close();
  Ok(())
}
