// Keyhook Device Drivers
// Raw capture and injection of key events

pub mod devices;
#[cfg(all(feature = "linux", target_os = "linux"))]
pub mod linux;
pub mod memory;

#[cfg(all(feature = "linux", target_os = "linux"))]
pub use linux::EvdevDriver;
pub use memory::MemoryDriver;

use std::sync::Arc;

use crate::event::KeyEvent;
use crate::key::ScanCode;

/// Called once per raw transition; returns false to suppress the event
pub type EventSink = Arc<dyn Fn(KeyEvent) -> bool + Send + Sync>;

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors that can occur in a driver
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Event device error: {0}")]
    Evdev(String),

    #[error("Not supported by this driver: {0}")]
    Unsupported(&'static str),

    #[error("Key name {0:?} is not mapped by this driver")]
    UnknownName(String),
}

/// Platform capture and injection.
///
/// `listen` blocks on its own thread and calls the sink for every event in
/// delivery order; everything else may be called from any thread.
pub trait KeyboardDriver: Send + Sync {
    /// Prepare for `listen`; failures here are returned to `Listener::start`
    fn init(&self) -> DriverResult<()>;

    /// Deliver events to `sink` until `stop` is called
    fn listen(&self, sink: EventSink) -> DriverResult<()>;

    /// Synthesize a key press
    fn press(&self, code: ScanCode) -> DriverResult<()>;

    /// Synthesize a key release
    fn release(&self, code: ScanCode) -> DriverResult<()>;

    /// Scan codes for a normalised key name in the active layout, each with
    /// the modifier names that must be held to produce it
    fn map_name(&self, name: &str) -> DriverResult<Vec<(ScanCode, Vec<String>)>>;

    /// Type a character the layout has no key for
    fn type_unicode(&self, _ch: char) -> DriverResult<()> {
        Err(DriverError::Unsupported("unicode typing"))
    }

    /// Make `listen` return
    fn stop(&self);
}
