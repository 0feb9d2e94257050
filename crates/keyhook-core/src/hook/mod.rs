// Keyhook Hooks
// Matching units the listener asks about every event

pub mod hotkey;

pub use hotkey::{HotkeyHook, HotkeyOptions};

use crate::decision::{Decision, Decisions};
use crate::event::KeyEvent;
use crate::key::ScanCode;
use crate::state::PressSnapshot;

/// Something that gives an opinion on key events.
///
/// The returned map may hold decisions for earlier events the hook
/// suspended as well as for `event` itself. Events left out are allowed.
pub trait Hook: Send {
    fn process_event(&mut self, event: &KeyEvent, state: &PressSnapshot) -> Decisions;
}

/// Event callback returning a decision
pub type EventCallback = Box<dyn FnMut(&KeyEvent) -> Decision + Send>;

/// Hook that asks a callback about every event
pub struct SimpleHook {
    callback: EventCallback,
}

impl SimpleHook {
    pub fn new(callback: impl FnMut(&KeyEvent) -> Decision + Send + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl Hook for SimpleHook {
    fn process_event(&mut self, event: &KeyEvent, _state: &PressSnapshot) -> Decisions {
        let mut decisions = Decisions::new();
        decisions.insert(event.clone(), (self.callback)(event));
        decisions
    }
}

/// Hook that asks a callback only about events of one key
pub struct SingleKeyHook {
    codes: Vec<ScanCode>,
    callback: EventCallback,
}

impl SingleKeyHook {
    pub fn new(
        codes: impl IntoIterator<Item = ScanCode>,
        callback: impl FnMut(&KeyEvent) -> Decision + Send + 'static,
    ) -> Self {
        Self {
            codes: codes.into_iter().collect(),
            callback: Box::new(callback),
        }
    }

    pub fn codes(&self) -> &[ScanCode] {
        &self.codes
    }
}

impl Hook for SingleKeyHook {
    fn process_event(&mut self, event: &KeyEvent, _state: &PressSnapshot) -> Decisions {
        let decision = if self.codes.contains(&event.scan_code) {
            (self.callback)(event)
        } else {
            Decision::Allow
        };
        let mut decisions = Decisions::new();
        decisions.insert(event.clone(), decision);
        decisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_simple_hook() {
        let mut hook = SimpleHook::new(|e| Decision::block_if(e.is_down()));
        let state = PressSnapshot::default();

        let down = KeyEvent::down(ScanCode(30), 0.0);
        let up = KeyEvent::up(ScanCode(30), 0.1);
        assert_eq!(hook.process_event(&down, &state)[&down], Decision::Suppress);
        assert_eq!(hook.process_event(&up, &state)[&up], Decision::Allow);
    }

    #[test]
    fn test_single_key_hook_filters() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let mut hook = SingleKeyHook::new([ScanCode(30)], move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Decision::Suppress
        });
        let state = PressSnapshot::default();

        let other = KeyEvent::down(ScanCode(48), 0.0);
        assert_eq!(hook.process_event(&other, &state)[&other], Decision::Allow);

        let a = KeyEvent::down(ScanCode(30), 0.1);
        assert_eq!(hook.process_event(&a, &state)[&a], Decision::Suppress);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
