//! Awaitable request/response GATT client on top of a link that allows one outstanding operation
//! and reports every result through an untagged callback stream.
//!
//! Plug a platform driver in by implementing [`GattBinding`] and publishing its callbacks on the
//! [`EventBus`] handed to [`Gatt::new`].

pub mod binding;
pub mod config;
pub mod connection_state;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod gatt;
pub mod messenger;
mod handle;
mod responder;

pub use binding::{GattBinding, Handle, WriteType};
pub use config::GattConfig;
pub use error::{BindingError, GattError};
pub use event::*;
pub use event_bus::{EventBus, PendingResult, Subscription};
pub use gatt::Gatt;
pub use responder::Submission;
