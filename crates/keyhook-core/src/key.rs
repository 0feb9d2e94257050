// Keyhook Scan Codes
// Physical key identifiers and the Linux input-event-codes name table

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

include!(concat!(env!("OUT_DIR"), "/scan_code.rs"));

/// Canonical names for Linux key codes (input-event-codes.h).
///
/// Names follow the canonical form produced by `normalize_name`: lower case,
/// words separated by spaces, sided modifiers spelled "left x"/"right x".
const LINUX_KEYS: &[(u16, &str)] = &[
    (1, "esc"),
    (2, "1"),
    (3, "2"),
    (4, "3"),
    (5, "4"),
    (6, "5"),
    (7, "6"),
    (8, "7"),
    (9, "8"),
    (10, "9"),
    (11, "0"),
    (12, "-"),
    (13, "="),
    (14, "backspace"),
    (15, "tab"),
    (16, "q"),
    (17, "w"),
    (18, "e"),
    (19, "r"),
    (20, "t"),
    (21, "y"),
    (22, "u"),
    (23, "i"),
    (24, "o"),
    (25, "p"),
    (26, "["),
    (27, "]"),
    (28, "enter"),
    (29, "left ctrl"),
    (30, "a"),
    (31, "s"),
    (32, "d"),
    (33, "f"),
    (34, "g"),
    (35, "h"),
    (36, "j"),
    (37, "k"),
    (38, "l"),
    (39, ";"),
    (40, "'"),
    (41, "`"),
    (42, "left shift"),
    (43, "\\"),
    (44, "z"),
    (45, "x"),
    (46, "c"),
    (47, "v"),
    (48, "b"),
    (49, "n"),
    (50, "m"),
    (51, ","),
    (52, "."),
    (53, "/"),
    (54, "right shift"),
    (55, "keypad *"),
    (56, "left alt"),
    (57, "space"),
    (58, "caps lock"),
    (59, "f1"),
    (60, "f2"),
    (61, "f3"),
    (62, "f4"),
    (63, "f5"),
    (64, "f6"),
    (65, "f7"),
    (66, "f8"),
    (67, "f9"),
    (68, "f10"),
    (69, "num lock"),
    (70, "scroll lock"),
    (71, "keypad 7"),
    (72, "keypad 8"),
    (73, "keypad 9"),
    (74, "keypad -"),
    (75, "keypad 4"),
    (76, "keypad 5"),
    (77, "keypad 6"),
    (78, "keypad +"),
    (79, "keypad 1"),
    (80, "keypad 2"),
    (81, "keypad 3"),
    (82, "keypad 0"),
    (83, "keypad ."),
    (86, "<"),
    (87, "f11"),
    (88, "f12"),
    (96, "keypad enter"),
    (97, "right ctrl"),
    (98, "keypad /"),
    (99, "print screen"),
    (100, "right alt"),
    (102, "home"),
    (103, "up"),
    (104, "page up"),
    (105, "left"),
    (106, "right"),
    (107, "end"),
    (108, "down"),
    (109, "page down"),
    (110, "insert"),
    (111, "delete"),
    (113, "volume mute"),
    (114, "volume down"),
    (115, "volume up"),
    (119, "pause"),
    (125, "left windows"),
    (126, "right windows"),
    (127, "menu"),
    (163, "next track"),
    (164, "play/pause media"),
    (165, "previous track"),
    (166, "stop media"),
    (183, "f13"),
    (184, "f14"),
    (185, "f15"),
    (186, "f16"),
    (187, "f17"),
    (188, "f18"),
    (189, "f19"),
    (190, "f20"),
    (191, "f21"),
    (192, "f22"),
    (193, "f23"),
    (194, "f24"),
];

/// Characters typed on a US layout with shift held, and the key producing them.
const SHIFTED_CHARS: &[(char, u16)] = &[
    ('!', 2),
    ('@', 3),
    ('#', 4),
    ('$', 5),
    ('%', 6),
    ('^', 7),
    ('&', 8),
    ('*', 9),
    ('(', 10),
    (')', 11),
    ('_', 12),
    ('+', 13),
    ('{', 26),
    ('}', 27),
    (':', 39),
    ('"', 40),
    ('~', 41),
    ('|', 43),
    ('<', 51),
    ('>', 52),
    ('?', 53),
];

fn names_by_code() -> &'static HashMap<u16, &'static str> {
    static NAMES: OnceLock<HashMap<u16, &'static str>> = OnceLock::new();
    NAMES.get_or_init(|| LINUX_KEYS.iter().copied().collect())
}

/// Canonical name for a Linux key code
pub fn key_name(code: u16) -> Option<&'static str> {
    names_by_code().get(&code).copied()
}

/// Scan codes producing `name` on a US layout, each with the modifier names
/// that must be held to type it.
///
/// `name` must already be normalized. Unshifted entries come first so callers
/// that only need one code can take the head of the list.
pub fn codes_for_name(name: &str) -> Vec<(ScanCode, Vec<&'static str>)> {
    let mut entries: Vec<(ScanCode, Vec<&'static str>)> = LINUX_KEYS
        .iter()
        .filter(|(_, n)| *n == name)
        .map(|(code, _)| (ScanCode(*code), Vec::new()))
        .collect();

    let mut chars = name.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if ch.is_ascii_uppercase() {
            let lower = ch.to_ascii_lowercase().to_string();
            if let Some((code, _)) = LINUX_KEYS.iter().find(|(_, n)| *n == lower) {
                entries.push((ScanCode(*code), vec!["shift"]));
            }
        }
        entries.extend(
            SHIFTED_CHARS
                .iter()
                .filter(|(c, _)| *c == ch)
                .map(|(_, code)| (ScanCode(*code), vec!["shift"])),
        );
    }

    entries
}

/// Whether a Linux key code sits on the numeric keypad
pub fn is_keypad_code(code: u16) -> bool {
    matches!(code, 55 | 71..=83 | 96 | 98 | 117 | 118 | 121)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_name() {
        assert_eq!(key_name(30), Some("a"));
        assert_eq!(key_name(29), Some("left ctrl"));
        assert_eq!(key_name(57), Some("space"));
        assert_eq!(key_name(0x2ff), None);
    }

    #[test]
    fn test_codes_for_plain_name() {
        assert_eq!(codes_for_name("a"), vec![(ScanCode(30), vec![])]);
        assert_eq!(codes_for_name("page up"), vec![(ScanCode(104), vec![])]);
        assert!(codes_for_name("not a key").is_empty());
    }

    #[test]
    fn test_codes_for_shifted_chars() {
        assert_eq!(codes_for_name("A"), vec![(ScanCode(30), vec!["shift"])]);
        assert_eq!(codes_for_name("!"), vec![(ScanCode(2), vec!["shift"])]);
        // '<' has its own key on ISO boards and is shift+comma on US boards
        assert_eq!(
            codes_for_name("<"),
            vec![(ScanCode(86), vec![]), (ScanCode(51), vec!["shift"])]
        );
    }

    #[test]
    fn test_scan_code_display_and_parse() {
        assert_eq!(ScanCode(30).to_string(), "30");
        assert_eq!("57".parse::<ScanCode>().unwrap(), ScanCode(57));
        assert!("space".parse::<ScanCode>().is_err());
    }

    #[test]
    fn test_scan_code_ordering() {
        assert!(ScanCode(29) < ScanCode(30));
        assert_eq!(ScanCode::from(42).code(), 42);
    }

    #[test]
    fn test_keypad_codes() {
        assert!(is_keypad_code(79));
        assert!(!is_keypad_code(2));
    }
}
