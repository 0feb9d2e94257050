// Keyhook Press State
// Physical, logical and modifier key sets owned by the listener

use super::KeySet;
use crate::event::{EventType, KeyEvent};
use crate::key::ScanCode;
use crate::modifier::ModifierCodes;

/// Pressed-key bookkeeping for one listener run.
///
/// The three sets are not nested: a suppressed press leaves a key physically
/// pressed without ever becoming logically pressed.
#[derive(Debug, Clone, Default)]
pub struct PressState {
    /// Down seen, no matching Up yet
    physical: KeySet,
    /// Down allowed downstream, no matching Up yet
    logical: KeySet,
    /// Physically pressed modifiers
    modifiers: KeySet,
}

impl PressState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a physical transition
    pub fn record_physical(&mut self, event: &KeyEvent, modifiers: &ModifierCodes) {
        match event.event_type {
            EventType::Down => {
                self.physical.insert(event.scan_code);
                if modifiers.contains(event.scan_code) {
                    self.modifiers.insert(event.scan_code);
                }
            }
            EventType::Up => {
                self.physical.remove(event.scan_code);
                self.modifiers.remove(event.scan_code);
            }
        }
    }

    /// Record a transition that reached the rest of the system
    pub fn record_logical(&mut self, event_type: EventType, code: ScanCode) {
        match event_type {
            EventType::Down => self.logical.insert(code),
            EventType::Up => self.logical.remove(code),
        };
    }

    pub fn physical(&self) -> &KeySet {
        &self.physical
    }

    pub fn logical(&self) -> &KeySet {
        &self.logical
    }

    pub fn modifiers(&self) -> &KeySet {
        &self.modifiers
    }

    /// Immutable copy for hooks and other threads
    pub fn snapshot(&self) -> PressSnapshot {
        PressSnapshot {
            physical: self.physical.clone(),
            logical: self.logical.clone(),
            modifiers: self.modifiers.clone(),
        }
    }

    pub fn clear(&mut self) {
        self.physical.clear();
        self.logical.clear();
        self.modifiers.clear();
    }
}

/// Point-in-time copy of a `PressState`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PressSnapshot {
    pub physical: KeySet,
    pub logical: KeySet,
    pub modifiers: KeySet,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_tracking() {
        let mods = ModifierCodes::linux();
        let mut state = PressState::new();

        state.record_physical(&KeyEvent::down(ScanCode(29), 0.0), &mods);
        state.record_physical(&KeyEvent::down(ScanCode(30), 0.1), &mods);
        assert!(state.physical().contains(ScanCode(30)));
        assert_eq!(state.modifiers().to_vec(), vec![ScanCode(29)]);
        // Nothing was allowed yet
        assert!(state.logical().is_empty());

        state.record_physical(&KeyEvent::up(ScanCode(29), 0.2), &mods);
        assert!(state.modifiers().is_empty());
        assert_eq!(state.physical().to_vec(), vec![ScanCode(30)]);
    }

    #[test]
    fn test_logical_tracking() {
        let mut state = PressState::new();
        state.record_logical(EventType::Down, ScanCode(30));
        assert!(state.logical().contains(ScanCode(30)));
        state.record_logical(EventType::Up, ScanCode(30));
        assert!(state.logical().is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mods = ModifierCodes::linux();
        let mut state = PressState::new();
        state.record_physical(&KeyEvent::down(ScanCode(30), 0.0), &mods);

        let snapshot = state.snapshot();
        state.clear();
        assert!(snapshot.physical.contains(ScanCode(30)));
        assert!(state.physical().is_empty());
    }
}
