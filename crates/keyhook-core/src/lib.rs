// Keyhook Core Library
// Global keyboard hooks, multi-step hotkeys and key event simulation

pub mod api;
pub mod canonical;
pub mod decision;
pub mod driver;
pub mod event;
pub mod hook;
pub mod hotkey;
pub mod key;
pub mod listener;
pub mod modifier;
pub mod state;

#[cfg(feature = "config")]
pub mod config;

pub use api::{get_typed_strings, hotkey_name, Keyboard, KeyboardError, KeyboardResult, WordOptions};
pub use canonical::{normalize_name, ALL_MODIFIERS, SIDED_MODIFIERS};
pub use decision::{merge, Decision, Decisions};
pub use driver::{DriverError, DriverResult, EventSink, KeyboardDriver, MemoryDriver};
pub use event::{EventRecord, EventType, KeyEvent, RecordError};
pub use hook::{Hook, HotkeyHook, HotkeyOptions, SimpleHook, SingleKeyHook};
pub use hotkey::{parse_hotkey, Hotkey, HotkeyParseError, Key, Step, TransitionTable};
pub use key::ScanCode;
pub use listener::{HookAlias, HookHandle, HookId, Listener, ListenerError, ListenerResult};
pub use modifier::ModifierCodes;
pub use state::{KeySet, PressSnapshot, PressState};

#[cfg(all(feature = "linux", target_os = "linux"))]
pub use driver::EvdevDriver;

#[cfg(feature = "config")]
pub use config::{Config, ConfigError};
