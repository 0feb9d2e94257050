// Keyhook State Module
// Pressed-key tracking

pub mod key_set;
pub mod press_state;

pub use key_set::KeySet;
pub use press_state::{PressSnapshot, PressState};
