// Keyhook Device Selection
// Decides which input devices the evdev driver grabs

/// Name prefix of the virtual output device, never grabbed
pub const VIRTUAL_DEVICE_PREFIX: &str = "Keyhook (virtual)";

// Q W E R T Y row plus SPACE, A and Z
const KEYBOARD_CODES: &[u16] = &[16, 17, 18, 19, 20, 21, 57, 30, 44];

/// Whether a device with these key capabilities looks like a keyboard
pub fn looks_like_keyboard(supported: &[u16]) -> bool {
    KEYBOARD_CODES.iter().all(|code| supported.contains(code))
}

/// Check if a device name belongs to our own virtual device
pub fn is_virtual_device(name: &str) -> bool {
    name.starts_with(VIRTUAL_DEVICE_PREFIX)
}

/// Whether a device should be grabbed.
///
/// With an explicit filter only devices matching by name or path are used.
/// Without one, every keyboard except the virtual output device is used.
pub fn matches_device_filter(
    device_name: &str,
    device_path: &str,
    filter: &[String],
    is_keyboard: bool,
) -> bool {
    if !filter.is_empty() {
        return filter
            .iter()
            .any(|wanted| wanted == device_path || wanted == device_name);
    }

    is_keyboard && !is_virtual_device(device_name)
}
