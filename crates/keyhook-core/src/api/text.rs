// Keyhook Text Helpers
// Typing text, reading typed text back and naming hotkeys

use std::thread;
use std::time::Duration;

use super::KeyboardResult;
use crate::canonical::normalize_name;
use crate::event::{EventType, KeyEvent};
use crate::hotkey::key_to_scan_codes;
use crate::key::ScanCode;
use crate::listener::Listener;

/// Modifier order used in hotkey names
const MODIFIER_ORDER: [&str; 4] = ["ctrl", "alt", "shift", "windows"];

/// Type `text` through the listener's driver.
///
/// Characters with a key on the layout are typed as key presses, holding the
/// modifiers the layout needs; the rest go through `type_unicode`.
pub(crate) fn write_text(listener: &Listener, text: &str, delay: Duration) -> KeyboardResult<()> {
    let driver = listener.driver();

    for ch in text.chars() {
        let entry = normalize_name(&ch.to_string())
            .and_then(|name| driver.map_name(&name).ok())
            .and_then(|entries| entries.into_iter().next());

        match entry {
            Some((code, modifiers)) => {
                let mut held = Vec::with_capacity(modifiers.len());
                for modifier in &modifiers {
                    if let Some(&modifier) = key_to_scan_codes(driver.as_ref(), modifier)?.first() {
                        held.push(modifier);
                    }
                }

                for &modifier in &held {
                    listener.send(EventType::Down, modifier)?;
                }
                listener.send(EventType::Down, code)?;
                listener.send(EventType::Up, code)?;
                for &modifier in held.iter().rev() {
                    listener.send(EventType::Up, modifier)?;
                }
            }
            None => {
                log::trace!("No key for {:?}, typing it as unicode", ch);
                driver.type_unicode(ch)?;
            }
        }

        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
    Ok(())
}

/// Deduce the strings typed in a sequence of events.
///
/// Strings are split at presses of non-text keys (enter, tab, ...). Shift and
/// caps lock upper-case letters; with `allow_backspace` a backspace deletes
/// the last character. Events without a name count as non-text keys. The
/// last, possibly empty, string is always included.
pub fn get_typed_strings<'a, I>(events: I, allow_backspace: bool) -> Vec<String>
where
    I: IntoIterator<Item = &'a KeyEvent>,
{
    let mut strings = Vec::new();
    let mut shift_pressed = false;
    let mut capslock = false;
    let mut current = String::new();

    for event in events {
        let name = match event.name.as_deref() {
            Some("space") => " ",
            Some(name) => name,
            None => "",
        };

        if name.contains("shift") {
            shift_pressed = event.is_down();
        } else if name == "caps lock" && event.is_down() {
            capslock = !capslock;
        } else if allow_backspace && name == "backspace" && event.is_down() {
            current.pop();
        } else if event.is_down() {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => {
                    if shift_pressed ^ capslock {
                        current.extend(ch.to_uppercase());
                    } else {
                        current.push(ch);
                    }
                }
                _ => strings.push(std::mem::take(&mut current)),
            }
        }
    }
    strings.push(current);
    strings
}

/// Standard name for a hotkey made of the given keys.
///
/// Names are normalised, sides are dropped ("left ctrl" is "ctrl") and "+"
/// is spelled "plus". Modifiers come first in ctrl, alt, shift, windows
/// order, then the remaining keys sorted.
///
/// ```
/// use keyhook_core::api::hotkey_name;
///
/// assert_eq!(hotkey_name(["+", "left ctrl", "shift"]), "ctrl+shift+plus");
/// ```
pub fn hotkey_name<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut clean: Vec<String> = names
        .into_iter()
        .filter_map(|name| normalize_name(name.as_ref()))
        .map(|name| {
            name.replace("left ", "")
                .replace("right ", "")
                .replace('+', "plus")
        })
        .collect();
    clean.sort_by_key(|name| {
        let rank = MODIFIER_ORDER
            .iter()
            .position(|m| m == name)
            .unwrap_or(MODIFIER_ORDER.len() + 1);
        (rank, name.clone())
    });
    clean.dedup();
    clean.join("+")
}

/// Name of one event's key, or its scan code when it has none
pub(crate) fn event_key_name(event: &KeyEvent) -> String {
    match &event.name {
        Some(name) => name.clone(),
        None => code_name(event.scan_code),
    }
}

pub(crate) fn code_name(code: ScanCode) -> String {
    code.name()
        .map(str::to_string)
        .unwrap_or_else(|| code.code().to_string())
}
