// Keyhook Hotkey Parser
// Parses hotkey strings like "ctrl+shift+a, alt+b" into steps of keys

use regex::Regex;
use std::sync::LazyLock;

use super::{Hotkey, HotkeyParseError, Key, Step};
use crate::canonical::{is_sided_modifier, normalize_name};
use crate::driver::KeyboardDriver;
use crate::key::ScanCode;
use crate::modifier::ModifierCodes;

/// Step and key separators: `,` and `+` with optional surrounding space
static SEPARATORS: LazyLock<Result<(Regex, Regex), regex::Error>> =
    LazyLock::new(|| Ok((Regex::new(r",\s?")?, Regex::new(r"\s?\+\s?")?)));

/// Scan codes for a key name, as reported by the driver.
///
/// Sided modifiers ("ctrl", "shift", ...) resolve to the codes of both the
/// left and right keys, left first.
///
/// # Errors
/// `UnknownKey` when the driver maps the name to nothing.
pub fn key_to_scan_codes(
    driver: &dyn KeyboardDriver,
    key: &str,
) -> Result<Vec<ScanCode>, HotkeyParseError> {
    let normalized = normalize_name(key).ok_or(HotkeyParseError::EmptyKey(key.to_string()))?;

    let mut codes: Vec<ScanCode> = Vec::new();
    let mut push_unique = |code: ScanCode| {
        if !codes.contains(&code) {
            codes.push(code);
        }
    };

    if is_sided_modifier(&normalized) {
        for side in ["left", "right"] {
            if let Ok(entries) = driver.map_name(&format!("{} {}", side, normalized)) {
                entries.into_iter().for_each(|(code, _)| push_unique(code));
            }
        }
    } else {
        match driver.map_name(&normalized) {
            Ok(entries) => entries.into_iter().for_each(|(code, _)| push_unique(code)),
            Err(e) => log::debug!("Driver cannot map {:?}: {}", normalized, e),
        }
    }

    if codes.is_empty() {
        return Err(HotkeyParseError::UnknownKey(key.to_string()));
    }
    Ok(codes)
}

/// Parse a hotkey string.
///
/// Steps are separated by `,` and keys within a step by `+`. The separator
/// characters themselves are spelled `comma` and `plus`. A single character
/// is always a one-key hotkey, so "+" and "," are valid on their own.
///
/// # Examples
/// ```
/// use keyhook_core::driver::MemoryDriver;
/// use keyhook_core::hotkey::parse_hotkey;
/// use keyhook_core::modifier::ModifierCodes;
///
/// let driver = MemoryDriver::linux();
/// let hotkey = parse_hotkey("ctrl+a, b", &driver, &ModifierCodes::linux()).unwrap();
/// assert_eq!(hotkey.len(), 2);
/// assert!(hotkey.steps()[0].is_standard());
/// ```
pub fn parse_hotkey(
    text: &str,
    driver: &dyn KeyboardDriver,
    modifiers: &ModifierCodes,
) -> Result<Hotkey, HotkeyParseError> {
    if text.is_empty() {
        return Err(HotkeyParseError::EmptyInput);
    }

    if text.chars().count() == 1 {
        let key = parse_key(text, text, driver)?;
        return Hotkey::new(vec![Step::new(vec![key], modifiers)]);
    }

    let (step_sep, key_sep) = SEPARATORS
        .as_ref()
        .map_err(|e| HotkeyParseError::Grammar(e.to_string()))?;

    let mut steps = Vec::new();
    for step_text in step_sep.split(text) {
        if step_text.trim().is_empty() {
            return Err(HotkeyParseError::EmptyStep(text.to_string()));
        }
        let keys = key_sep
            .split(step_text)
            .map(|name| parse_key(name, text, driver))
            .collect::<Result<Vec<_>, _>>()?;
        steps.push(Step::new(keys, modifiers));
    }

    Hotkey::new(steps)
}

fn parse_key(name: &str, hotkey: &str, driver: &dyn KeyboardDriver) -> Result<Key, HotkeyParseError> {
    if name.is_empty() {
        return Err(HotkeyParseError::EmptyKey(hotkey.to_string()));
    }
    let codes = key_to_scan_codes(driver, name)?;
    Key::new(Some(name.to_string()), codes).ok_or(HotkeyParseError::UnknownKey(name.to_string()))
}
