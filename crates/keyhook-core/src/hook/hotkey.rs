// Keyhook Hotkey Hook
// Per-event hotkey matching with suspension of partially matched input

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};

use super::Hook;
use crate::decision::{Decision, Decisions};
use crate::event::KeyEvent;
use crate::hotkey::{Hotkey, TransitionTable};
use crate::key::ScanCode;
use crate::modifier::ModifierCodes;
use crate::state::PressSnapshot;

/// Callback fired when a hotkey completes
pub type HotkeyCallback = Box<dyn FnMut() -> Decision + Send>;

/// Options for registering a hotkey
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HotkeyOptions {
    /// Register as a suppressing hook (otherwise the callback runs on the
    /// async worker and its decision is ignored)
    pub suppress: bool,
    /// Seconds allowed between steps; zero or negative disables the timeout
    pub timeout: f64,
    /// Fire on release of the final main key instead of its press
    pub trigger_on_release: bool,
}

impl Default for HotkeyOptions {
    fn default() -> Self {
        Self {
            suppress: true,
            timeout: 1.0,
            trigger_on_release: false,
        }
    }
}

/// Hook driving one hotkey's transition table.
///
/// Events that may belong to the hotkey are suspended while the match is in
/// progress. When the hotkey fails they are released; when it completes and
/// the callback does not allow it, they are suppressed along with the
/// releases of any swallowed presses.
pub struct HotkeyHook {
    hotkey: Hotkey,
    table: TransitionTable,
    modifiers: ModifierCodes,
    options: HotkeyOptions,
    callback: HotkeyCallback,
    state: usize,
    suspended: Vec<KeyEvent>,
    pending_release_suppress: HashSet<ScanCode>,
}

impl HotkeyHook {
    pub fn new(
        hotkey: Hotkey,
        modifiers: ModifierCodes,
        options: HotkeyOptions,
        callback: impl FnMut() -> Decision + Send + 'static,
    ) -> Self {
        let table = TransitionTable::build(&hotkey);
        log::debug!(
            "Built hotkey {} with {} transitions",
            hotkey,
            table.len()
        );
        Self {
            hotkey,
            table,
            modifiers,
            options,
            callback: Box::new(callback),
            state: 0,
            suspended: Vec::new(),
            pending_release_suppress: HashSet::new(),
        }
    }

    pub fn hotkey(&self) -> &Hotkey {
        &self.hotkey
    }

    /// Current automaton state (0 when idle)
    pub fn state(&self) -> usize {
        self.state
    }

    /// Events held back by the current partial match
    pub fn suspended(&self) -> &[KeyEvent] {
        &self.suspended
    }

    fn timeout(&self) -> Option<f64> {
        (self.options.timeout > 0.0).then_some(self.options.timeout)
    }

    /// Forget a partial match if the last suspended event is too old
    fn expire(&mut self, now: f64) {
        let Some(timeout) = self.timeout() else {
            return;
        };
        let latest = self
            .suspended
            .iter()
            .map(|e| e.time)
            .fold(f64::NEG_INFINITY, f64::max);
        if !self.suspended.is_empty() && now - latest >= timeout {
            log::debug!("Hotkey {} timed out in state {}", self.hotkey, self.state);
            self.state = 0;
            self.suspended.clear();
        }
    }

    /// Stop suspending presses the current state no longer needs.
    ///
    /// Walking from the newest event back, the first `useful` presses (and
    /// every release in between) stay suspended; older ones are let go.
    fn release_useless(&mut self) {
        let mut useful: isize = self.hotkey.steps()[..self.state]
            .iter()
            .map(|s| s.press_count() as isize)
            .sum();

        let mut order: Vec<usize> = (0..self.suspended.len()).collect();
        order.sort_by(|&a, &b| self.suspended[b].time.total_cmp(&self.suspended[a].time));

        let mut keep = vec![true; self.suspended.len()];
        for index in order {
            if useful <= 0 {
                keep[index] = false;
            }
            if self.suspended[index].is_down() {
                useful -= 1;
            }
        }

        let mut flags = keep.into_iter();
        self.suspended.retain(|_| flags.next().unwrap_or(true));
    }

    fn fire(&mut self) -> Decision {
        log::debug!("Hotkey {} triggered", self.hotkey);
        match catch_unwind(AssertUnwindSafe(|| (self.callback)())) {
            Ok(decision) => decision,
            Err(_) => {
                log::error!("Callback for hotkey {} panicked", self.hotkey);
                Decision::Allow
            }
        }
    }
}

impl Hook for HotkeyHook {
    fn process_event(&mut self, event: &KeyEvent, state: &PressSnapshot) -> Decisions {
        let last_step = self.hotkey.len() - 1;
        let step = &self.hotkey.steps()[self.state.min(last_step)];
        let is_standard = step.is_standard();
        let key_count = step.keys().len();
        let is_main_key = step.is_main_code(event.scan_code);

        let mut suppressed: Vec<KeyEvent> = Vec::new();

        if event.is_up() {
            if self.suspended.iter().any(|e| e.scan_code == event.scan_code) {
                // Release of a suspended press, hold it with its press
                self.suspended.push(event.clone());
            } else if self.pending_release_suppress.remove(&event.scan_code) {
                suppressed.push(event.clone());
            }
        } else if self.modifiers.contains(event.scan_code) && is_standard {
            // Modifiers are read from the press state when the main key arrives
        } else if self.state < self.hotkey.len() {
            self.expire(event.time);

            let chord = if is_standard {
                state.modifiers.chord_with(event.scan_code)
            } else {
                state.physical.to_vec()
            };
            self.suspended.push(event.clone());

            if is_standard || state.physical.len() >= key_count || !is_main_key {
                let previous = self.state;
                self.state = self.table.next(self.state, &chord);
                log::trace!("Hotkey {}: state {} -> {}", self.hotkey, previous, self.state);
                self.release_useless();
            }
        }

        let trigger_edge = if self.options.trigger_on_release {
            event.is_up()
        } else {
            event.is_down()
        };

        if self.state == self.table.accepting_state() && is_main_key && trigger_edge {
            if !self.fire().is_allow() {
                for held in &self.suspended {
                    let is_logically_pressed = state.logical.contains(held.scan_code);

                    // A release whose press already went downstream must pass
                    if !(held.is_up() && is_logically_pressed) {
                        suppressed.push(held.clone());
                    }

                    if held.is_down() && !is_logically_pressed {
                        self.pending_release_suppress.insert(held.scan_code);
                    } else if held.is_up() {
                        self.pending_release_suppress.remove(&held.scan_code);
                    }
                }
            }
            self.state = 0;
            self.suspended.clear();
        }

        let mut decisions = Decisions::new();
        for held in &self.suspended {
            decisions.insert(held.clone(), Decision::Suspend);
        }
        for event in suppressed {
            decisions.insert(event, Decision::Suppress);
        }
        decisions
    }
}
