// Keyhook Word Listeners
// Typed-word detection on top of the event stream

use crate::canonical::{is_modifier_name, normalize_name};
use crate::decision::{Decision, Decisions};
use crate::event::KeyEvent;
use crate::hook::Hook;
use crate::key::ScanCode;
use crate::state::PressSnapshot;

/// Options for `Keyboard::add_word_listener`
#[derive(Debug, Clone, PartialEq)]
pub struct WordOptions {
    /// Key names that end a word and check it for a match
    pub triggers: Vec<String>,
    /// Match endings of words too ("carpet" matches "pet")
    pub match_suffix: bool,
    /// Seconds allowed between typed characters; zero or negative disables it
    pub timeout: f64,
}

impl Default for WordOptions {
    fn default() -> Self {
        Self {
            triggers: vec!["space".to_string()],
            match_suffix: false,
            timeout: 2.0,
        }
    }
}

/// Hook that watches key presses for one typed word followed by a trigger.
///
/// Modifiers and releases are ignored. Any other multi-character key name
/// that is not a trigger discards the word typed so far. Matching is case
/// sensitive. Input is only blocked when the hook consumes its trigger.
pub struct WordHook {
    word: String,
    options: WordOptions,
    current: String,
    last_time: Option<f64>,
    consume_trigger: bool,
    /// Trigger whose press was consumed, until its release is too
    consumed: Option<ScanCode>,
    callback: Box<dyn FnMut() + Send>,
}

impl WordHook {
    pub fn new(word: impl Into<String>, options: WordOptions, callback: impl FnMut() + Send + 'static) -> Self {
        let options = WordOptions {
            triggers: options
                .triggers
                .iter()
                .filter_map(|t| normalize_name(t))
                .collect(),
            ..options
        };
        Self {
            word: word.into(),
            options,
            current: String::new(),
            last_time: None,
            consume_trigger: false,
            consumed: None,
            callback: Box::new(callback),
        }
    }

    /// Suppress the press and release of a trigger that completes the word
    pub fn consuming_trigger(mut self) -> Self {
        self.consume_trigger = true;
        self
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    /// Characters typed since the last reset
    pub fn current(&self) -> &str {
        &self.current
    }

    fn matches(&self) -> bool {
        self.current == self.word || (self.options.match_suffix && self.current.ends_with(&self.word))
    }

    /// Track one event; returns whether it completed the word
    fn observe(&mut self, event: &KeyEvent) -> bool {
        let Some(name) = event.name.as_deref() else {
            return false;
        };
        if event.is_up() || is_modifier_name(name) {
            return false;
        }

        if let Some(last) = self.last_time {
            if self.options.timeout > 0.0 && event.time - last > self.options.timeout {
                self.current.clear();
            }
        }
        self.last_time = Some(event.time);

        if self.options.triggers.iter().any(|t| t == name) && self.matches() {
            log::debug!("Word {:?} typed", self.word);
            (self.callback)();
            self.current.clear();
            return true;
        }

        if name.chars().count() > 1 {
            self.current.clear();
        } else {
            self.current.push_str(name);
        }
        false
    }
}

impl Hook for WordHook {
    fn process_event(&mut self, event: &KeyEvent, _state: &PressSnapshot) -> Decisions {
        let decision = if self.observe(event) && self.consume_trigger {
            self.consumed = Some(event.scan_code);
            Decision::Suppress
        } else if event.is_up() && self.consumed == Some(event.scan_code) {
            self.consumed = None;
            Decision::Suppress
        } else {
            Decision::Allow
        };
        let mut decisions = Decisions::new();
        decisions.insert(event.clone(), decision);
        decisions
    }
}
