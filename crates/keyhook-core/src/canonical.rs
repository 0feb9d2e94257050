// Keyhook Canonical Names
// Key name normalisation shared by hotkey parsing, drivers and the API

use std::collections::HashMap;
use std::sync::LazyLock;

/// Modifiers that exist as a left and a right key
pub const SIDED_MODIFIERS: [&str; 4] = ["ctrl", "alt", "shift", "windows"];

/// Every modifier name, sided variants included
pub const ALL_MODIFIERS: [&str; 13] = [
    "alt",
    "alt gr",
    "ctrl",
    "shift",
    "windows",
    "left ctrl",
    "left alt",
    "left shift",
    "left windows",
    "right ctrl",
    "right alt",
    "right shift",
    "right windows",
];

static ALIASES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("escape", "esc"),
        ("return", "enter"),
        ("del", "delete"),
        ("control", "ctrl"),
        ("left arrow", "left"),
        ("up arrow", "up"),
        ("down arrow", "down"),
        ("right arrow", "right"),
        (" ", "space"),
        ("\x1b", "esc"),
        ("\x08", "backspace"),
        ("\n", "enter"),
        ("\t", "tab"),
        ("\r", "enter"),
        ("scrlk", "scroll lock"),
        ("prtscn", "print screen"),
        ("prnt scrn", "print screen"),
        ("snapshot", "print screen"),
        ("ins", "insert"),
        ("pause break", "pause"),
        ("capslock", "caps lock"),
        ("number lock", "num lock"),
        ("numlock", "num lock"),
        ("space bar", "space"),
        ("spacebar", "space"),
        ("linefeed", "enter"),
        ("win", "windows"),
        ("super", "windows"),
        ("meta", "windows"),
        ("command", "windows"),
        ("cmd", "windows"),
        ("option", "alt"),
        ("app", "menu"),
        ("apps", "menu"),
        ("application", "menu"),
        ("pagedown", "page down"),
        ("pageup", "page up"),
        ("pgdown", "page down"),
        ("pgup", "page up"),
        ("play/pause", "play/pause media"),
        ("left win", "left windows"),
        ("right win", "right windows"),
        ("left control", "left ctrl"),
        ("right control", "right ctrl"),
        ("altgr", "alt gr"),
        ("select", "end"),
        ("find", "home"),
        ("next", "page down"),
        ("prior", "page up"),
        // Spelled-out forms for the characters that are hotkey separators
        ("comma", ","),
        ("plus", "+"),
    ])
});

/// Clean up a key name and convert it to its canonical form.
///
/// Multi-character names are lower-cased and underscores become spaces, so
/// "LEFT_CONTROL" and "left control" both yield "left ctrl". Single
/// characters keep their case ("A" stays "A").
///
/// Returns `None` for an empty name.
pub fn normalize_name(name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }

    let mut name = if name.chars().count() > 1 {
        name.to_lowercase()
    } else {
        name.to_string()
    };
    if name != "_" && name.contains('_') {
        name = name.replace('_', " ");
    }

    Some(match ALIASES.get(name.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => name,
    })
}

/// Whether `name` (already normalised) is a modifier name
pub fn is_modifier_name(name: &str) -> bool {
    ALL_MODIFIERS.contains(&name)
}

/// Whether `name` (already normalised) is a modifier with left and right keys
pub fn is_sided_modifier(name: &str) -> bool {
    SIDED_MODIFIERS.contains(&name)
}
