// Keyhook Hotkeys
// Keys, steps and multi-step hotkey sequences

pub mod automaton;
pub mod parser;

pub use automaton::TransitionTable;
pub use parser::{key_to_scan_codes, parse_hotkey};

use smallvec::SmallVec;
use std::fmt;

use crate::key::ScanCode;
use crate::modifier::ModifierCodes;

/// Errors that can occur while parsing a hotkey
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HotkeyParseError {
    #[error("hotkey string cannot be empty")]
    EmptyInput,

    #[error("hotkey {0:?} has an empty step")]
    EmptyStep(String),

    #[error("hotkey {0:?} has an empty key name")]
    EmptyKey(String),

    #[error("key {0:?} is not mapped to any known key")]
    UnknownKey(String),

    #[error("multi-step hotkey {0:?} not allowed here")]
    MultiStep(String),

    #[error("invalid hotkey grammar: {0}")]
    Grammar(String),
}

/// Codes of one key; sided modifiers have two, everything else one
pub type KeyCodes = SmallVec<[ScanCode; 2]>;

/// A set of equivalent scan codes, such as the left and right ctrl keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    label: Option<String>,
    codes: KeyCodes,
}

impl Key {
    /// Create a key from at least one scan code.
    ///
    /// Duplicate codes are dropped, first occurrence wins.
    pub fn new(label: Option<String>, codes: impl IntoIterator<Item = ScanCode>) -> Option<Self> {
        let mut unique = KeyCodes::new();
        for code in codes {
            if !unique.contains(&code) {
                unique.push(code);
            }
        }
        if unique.is_empty() {
            return None;
        }
        Some(Self {
            label,
            codes: unique,
        })
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn codes(&self) -> &[ScanCode] {
        &self.codes
    }

    /// The code used when this key is sent
    pub fn primary(&self) -> ScanCode {
        self.codes[0]
    }

    pub fn contains(&self, code: ScanCode) -> bool {
        self.codes.contains(&code)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.label, self.codes.as_slice()) {
            (Some(label), _) => write!(f, "{}", label),
            (None, [code]) => write!(f, "{}", code),
            (None, codes) => {
                let parts: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
                write!(f, "({})", parts.join(","))
            }
        }
    }
}

/// One chord of a hotkey.
///
/// A step is *standard* when it is any number of modifier keys plus exactly
/// one other key, its main key. Other steps are plain simultaneous chords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    keys: Vec<Key>,
    main_key: Option<usize>,
}

impl Step {
    /// Classify `keys` against the modifier set.
    ///
    /// A key counts as a modifier when its first scan code is one.
    pub fn new(keys: Vec<Key>, modifiers: &ModifierCodes) -> Self {
        let non_modifiers: Vec<usize> = keys
            .iter()
            .enumerate()
            .filter(|(_, k)| !modifiers.contains(k.primary()))
            .map(|(i, _)| i)
            .collect();
        let main_key = match non_modifiers.as_slice() {
            [index] => Some(*index),
            _ => None,
        };
        Self { keys, main_key }
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn is_standard(&self) -> bool {
        self.main_key.is_some()
    }

    pub fn main_key(&self) -> Option<&Key> {
        self.main_key.map(|i| &self.keys[i])
    }

    /// Whether `code` completes this step: the main key of a standard step,
    /// any key of a chord step.
    pub fn is_main_code(&self, code: ScanCode) -> bool {
        match self.main_key() {
            Some(key) => key.contains(code),
            None => self.keys.iter().any(|k| k.contains(code)),
        }
    }

    /// Every sorted chord that satisfies this step, one code taken from each
    /// key (the Cartesian product of the keys' codes).
    pub fn chords(&self) -> Vec<Vec<ScanCode>> {
        let mut combos: Vec<Vec<ScanCode>> = vec![Vec::new()];
        for key in &self.keys {
            combos = combos
                .into_iter()
                .flat_map(|prefix| {
                    key.codes().iter().map(move |&code| {
                        let mut next = prefix.clone();
                        next.push(code);
                        next
                    })
                })
                .collect();
        }
        for combo in &mut combos {
            combo.sort_unstable();
        }
        combos
    }

    /// Key presses needed to satisfy this step
    pub fn press_count(&self) -> usize {
        if self.is_standard() {
            1
        } else {
            self.keys.len()
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.keys.iter().map(|k| k.to_string()).collect();
        write!(f, "{}", parts.join("+"))
    }
}

/// An ordered sequence of steps, e.g. "ctrl+k, ctrl+c"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hotkey {
    steps: Vec<Step>,
}

impl Hotkey {
    /// Create a hotkey from at least one step
    pub fn new(steps: Vec<Step>) -> Result<Self, HotkeyParseError> {
        if steps.is_empty() {
            return Err(HotkeyParseError::EmptyInput);
        }
        Ok(Self { steps })
    }

    /// One step holding one key
    pub fn single(code: ScanCode, modifiers: &ModifierCodes) -> Self {
        let key = Key {
            label: None,
            codes: smallvec::smallvec![code],
        };
        Self {
            steps: vec![Step::new(vec![key], modifiers)],
        }
    }

    /// Build from raw scan codes: steps of keys of equivalent codes
    pub fn from_scan_codes(
        steps: &[&[&[ScanCode]]],
        modifiers: &ModifierCodes,
    ) -> Result<Self, HotkeyParseError> {
        let mut parsed = Vec::with_capacity(steps.len());
        for step in steps {
            if step.is_empty() {
                return Err(HotkeyParseError::EmptyStep(format!("{:?}", steps)));
            }
            let keys = step
                .iter()
                .map(|codes| {
                    Key::new(None, codes.iter().copied())
                        .ok_or_else(|| HotkeyParseError::EmptyKey(format!("{:?}", steps)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            parsed.push(Step::new(keys, modifiers));
        }
        Self::new(parsed)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.steps.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(codes: &[u16]) -> Key {
        Key::new(None, codes.iter().map(|&c| ScanCode(c))).unwrap()
    }

    #[test]
    fn test_key_dedups_codes() {
        let k = key(&[29, 97, 29]);
        assert_eq!(k.codes(), &[ScanCode(29), ScanCode(97)]);
        assert!(Key::new(None, Vec::new()).is_none());
    }

    #[test]
    fn test_standard_step() {
        let mods = ModifierCodes::linux();
        let step = Step::new(vec![key(&[29, 97]), key(&[30])], &mods);
        assert!(step.is_standard());
        assert_eq!(step.main_key().unwrap().codes(), &[ScanCode(30)]);
        assert!(step.is_main_code(ScanCode(30)));
        assert!(!step.is_main_code(ScanCode(29)));
        assert_eq!(step.press_count(), 1);
    }

    #[test]
    fn test_chord_step() {
        let mods = ModifierCodes::linux();
        let step = Step::new(vec![key(&[30]), key(&[48])], &mods);
        assert!(!step.is_standard());
        assert!(step.is_main_code(ScanCode(48)));
        assert_eq!(step.press_count(), 2);

        // A lone modifier is a chord too
        let lone = Step::new(vec![key(&[29])], &mods);
        assert!(!lone.is_standard());
    }

    #[test]
    fn test_step_chords_product() {
        let mods = ModifierCodes::linux();
        let step = Step::new(vec![key(&[97, 29]), key(&[30])], &mods);
        assert_eq!(
            step.chords(),
            vec![
                vec![ScanCode(30), ScanCode(97)],
                vec![ScanCode(29), ScanCode(30)],
            ]
        );
    }

    #[test]
    fn test_from_scan_codes() {
        let mods = ModifierCodes::linux();
        let hotkey =
            Hotkey::from_scan_codes(&[&[&[ScanCode(30)]], &[&[ScanCode(48)]]], &mods).unwrap();
        assert_eq!(hotkey.len(), 2);
        assert_eq!(hotkey.to_string(), "30, 48");

        assert!(Hotkey::from_scan_codes(&[], &mods).is_err());
        assert!(Hotkey::from_scan_codes(&[&[]], &mods).is_err());
        assert!(Hotkey::from_scan_codes(&[&[&[]]], &mods).is_err());
    }

    #[test]
    fn test_display() {
        let mods = ModifierCodes::linux();
        let labelled = Key::new(Some("ctrl".into()), [ScanCode(29), ScanCode(97)]).unwrap();
        let step = Step::new(vec![labelled, key(&[30])], &mods);
        assert_eq!(step.to_string(), "ctrl+30");
        assert_eq!(key(&[29, 97]).to_string(), "(29,97)");
    }
}
