// Keyhook Key Events
// Immutable keyboard transitions and their serialized record form

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;
use std::time::Instant;
use strum_macros::{Display, EnumString};

use crate::key::ScanCode;

static CLOCK_ORIGIN: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Monotonic seconds since the first call in this process
pub fn monotonic_time() -> f64 {
    CLOCK_ORIGIN.elapsed().as_secs_f64()
}

/// Direction of a key transition
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Down,
    Up,
}

/// A single key transition as seen by the listener.
///
/// Two events are equal when type, scan code, timestamp, device and name
/// match, so a press repeated at another instant is a distinct event.
#[derive(Debug, Clone)]
pub struct KeyEvent {
    pub event_type: EventType,
    pub scan_code: ScanCode,
    /// Layout-dependent name, when the driver knows it
    pub name: Option<String>,
    /// Monotonic seconds
    pub time: f64,
    pub device: Option<String>,
    pub is_keypad: bool,
}

impl KeyEvent {
    pub fn new(event_type: EventType, scan_code: ScanCode, time: f64) -> Self {
        Self {
            event_type,
            scan_code,
            name: None,
            time,
            device: None,
            is_keypad: false,
        }
    }

    pub fn down(scan_code: ScanCode, time: f64) -> Self {
        Self::new(EventType::Down, scan_code, time)
    }

    pub fn up(scan_code: ScanCode, time: f64) -> Self {
        Self::new(EventType::Up, scan_code, time)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_keypad(mut self, is_keypad: bool) -> Self {
        self.is_keypad = is_keypad;
        self
    }

    pub fn is_down(&self) -> bool {
        self.event_type == EventType::Down
    }

    pub fn is_up(&self) -> bool {
        self.event_type == EventType::Up
    }

    /// Wire record for this event
    pub fn to_record(&self) -> EventRecord {
        EventRecord {
            event_type: self.event_type,
            scan_code: self.scan_code,
            name: self.name.clone(),
            time: self.time,
            is_keypad: self.is_keypad,
            device: self.device.clone(),
        }
    }

    /// Serialize as a single-line JSON record
    pub fn to_json(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string(&self.to_record())?)
    }

    /// Parse a JSON record produced by `to_json` or another process
    pub fn from_json(line: &str) -> Result<Self, RecordError> {
        let record: EventRecord = serde_json::from_str(line)?;
        Ok(record.into())
    }
}

impl PartialEq for KeyEvent {
    fn eq(&self, other: &Self) -> bool {
        self.event_type == other.event_type
            && self.scan_code == other.scan_code
            && self.time.to_bits() == other.time.to_bits()
            && self.device == other.device
            && self.name == other.name
    }
}

impl Eq for KeyEvent {}

impl Hash for KeyEvent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.event_type.hash(state);
        self.scan_code.hash(state);
        self.time.to_bits().hash(state);
        self.device.hash(state);
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "KeyEvent({} {})", name, self.event_type),
            None => write!(f, "KeyEvent({} {})", self.scan_code, self.event_type),
        }
    }
}

/// Serialized form of a key event, one JSON object per event.
///
/// Unknown fields are ignored and missing optional fields default to
/// null/false so records from other producers still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_type: EventType,
    pub scan_code: ScanCode,
    #[serde(default)]
    pub name: Option<String>,
    pub time: f64,
    #[serde(default)]
    pub is_keypad: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl From<EventRecord> for KeyEvent {
    fn from(record: EventRecord) -> Self {
        KeyEvent {
            event_type: record.event_type,
            scan_code: record.scan_code,
            name: record.name,
            time: record.time,
            device: record.device,
            is_keypad: record.is_keypad,
        }
    }
}

/// Errors reading or writing event records
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Invalid event record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
