// Keyhook Modifier Codes
// Which scan codes count as modifiers for the active driver

use std::collections::HashSet;

use crate::canonical::ALL_MODIFIERS;
use crate::driver::KeyboardDriver;
use crate::key::ScanCode;

/// Linux codes for ctrl, shift, alt and meta (both sides)
const LINUX_MODIFIER_CODES: [u16; 8] = [29, 97, 42, 54, 56, 100, 125, 126];

/// The set of scan codes treated as modifiers.
///
/// Chord matching treats these specially: a modifier press never advances a
/// standard hotkey step on its own and releasing one never cancels progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifierCodes {
    codes: HashSet<ScanCode>,
}

impl ModifierCodes {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// The Linux input-event-codes modifiers
    pub fn linux() -> Self {
        LINUX_MODIFIER_CODES.iter().map(|&c| ScanCode(c)).collect()
    }

    /// Ask the driver for the codes of every modifier name.
    ///
    /// Names the driver cannot map are skipped.
    pub fn from_driver(driver: &dyn KeyboardDriver) -> Self {
        let mut codes = Self::new();
        for name in ALL_MODIFIERS {
            match driver.map_name(name) {
                Ok(entries) => {
                    for (code, _) in entries {
                        codes.insert(code);
                    }
                }
                Err(e) => log::trace!("No scan code for modifier {:?}: {}", name, e),
            }
        }
        codes
    }

    /// Add a modifier code
    pub fn insert(&mut self, code: ScanCode) {
        self.codes.insert(code);
    }

    /// Check if a scan code is a modifier
    pub fn contains(&self, code: ScanCode) -> bool {
        self.codes.contains(&code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// All modifier codes, sorted
    pub fn sorted(&self) -> Vec<ScanCode> {
        let mut codes: Vec<ScanCode> = self.codes.iter().copied().collect();
        codes.sort_unstable();
        codes
    }
}

impl FromIterator<ScanCode> for ModifierCodes {
    fn from_iter<I: IntoIterator<Item = ScanCode>>(iter: I) -> Self {
        Self {
            codes: iter.into_iter().collect(),
        }
    }
}
