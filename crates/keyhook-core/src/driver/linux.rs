// Keyhook evdev Driver
// Grabs keyboards through evdev and re-emits allowed events through uinput

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, Device, EventType, InputEvent};
use parking_lot::Mutex;
use std::io;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};

use super::devices::{looks_like_keyboard, matches_device_filter, VIRTUAL_DEVICE_PREFIX};
use super::{DriverError, DriverResult, EventSink, KeyboardDriver};
use crate::event::{monotonic_time, EventType as KeyEventType, KeyEvent};
use crate::key::{self, is_keypad_code, ScanCode};

/// Poll timeout, bounds how long `stop` takes to be noticed
const POLL_TIMEOUT_MS: i32 = 100;

/// Device information for listing devices
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub path: Option<String>,
}

/// Grabbed input devices, released on drop
struct Capture {
    devices: Vec<(Device, String)>,
    poll_fds: Vec<libc::pollfd>,
}

impl Capture {
    fn grab(filter: &[String]) -> DriverResult<Self> {
        let mut devices = Vec::new();
        for (path, mut device) in evdev::enumerate() {
            let name = device.name().unwrap_or("Unknown").to_string();
            let path = path.to_string_lossy().to_string();
            if !matches_device_filter(&name, &path, filter, is_keyboard(&device)) {
                continue;
            }

            // A previous run may have left the device grabbed
            let _ = device.ungrab();
            device.grab().map_err(|e| io_error(e, &path))?;
            log::debug!("Grabbed {} ({})", name, path);
            devices.push((device, name));
        }

        if devices.is_empty() {
            return Err(DriverError::DeviceNotFound(
                "No keyboard devices found".to_string(),
            ));
        }

        let poll_fds = devices
            .iter()
            .map(|(device, _)| libc::pollfd {
                fd: device.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();
        Ok(Self { devices, poll_fds })
    }

    /// Key events from every ready device, with the device name
    fn poll(&mut self) -> DriverResult<Vec<(InputEvent, String)>> {
        let mut events = Vec::new();

        // SAFETY: poll_fds holds valid descriptors owned by self.devices
        let ready = unsafe {
            libc::poll(
                self.poll_fds.as_mut_ptr(),
                self.poll_fds.len() as libc::nfds_t,
                POLL_TIMEOUT_MS,
            )
        };

        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                return Ok(events);
            }
            return Err(DriverError::Io(err));
        }
        if ready == 0 {
            return Ok(events);
        }

        for (i, (device, name)) in self.devices.iter_mut().enumerate() {
            if self.poll_fds[i].revents & libc::POLLIN == 0 {
                continue;
            }
            match device.fetch_events() {
                Ok(fetched) => events.extend(
                    fetched
                        .filter(|e| e.event_type() == EventType::KEY)
                        .map(|e| (e, name.clone())),
                ),
                Err(e) => log::warn!("Failed to read from {}: {}", name, e),
            }
        }
        Ok(events)
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        // A keyboard left grabbed stays dead for the whole session
        for (device, name) in &mut self.devices {
            if let Err(e) = device.ungrab() {
                log::warn!("Failed to release {}: {}", name, e);
            }
        }
    }
}

fn is_keyboard(device: &Device) -> bool {
    if !device.supported_events().contains(EventType::KEY) {
        return false;
    }
    let Some(keys) = device.supported_keys() else {
        return false;
    };
    let codes: Vec<u16> = keys.iter().map(|k| k.code()).collect();
    looks_like_keyboard(&codes)
}

fn io_error(err: io::Error, what: &str) -> DriverError {
    if err.kind() == io::ErrorKind::PermissionDenied {
        DriverError::PermissionDenied(format!("{}: {}", what, err))
    } else {
        DriverError::Io(err)
    }
}

fn create_virtual_device() -> DriverResult<VirtualDevice> {
    let mut keys = AttributeSet::<evdev::Key>::new();
    for code in 0..256u16 {
        keys.insert(evdev::Key::new(code));
    }

    let device = VirtualDeviceBuilder::new()
        .map_err(|e| io_error(e, "/dev/uinput"))?
        .name(&format!("{} Keyboard", VIRTUAL_DEVICE_PREFIX))
        .with_keys(&keys)
        .map_err(|e| DriverError::Evdev(e.to_string()))?
        .build()
        .map_err(|e| io_error(e, "/dev/uinput"))?;
    Ok(device)
}

/// Linux driver: exclusive evdev capture plus uinput injection.
///
/// Allowed events are written to a virtual device, which is never grabbed
/// itself, so injected input does not come back to the listener.
pub struct EvdevDriver {
    filter: Vec<String>,
    capture: Mutex<Option<Capture>>,
    output: Mutex<Option<VirtualDevice>>,
    running: AtomicBool,
}

impl EvdevDriver {
    /// Driver for every keyboard, or only the devices named (or at the paths)
    /// in `filter`
    pub fn new(filter: Vec<String>) -> Self {
        Self {
            filter,
            capture: Mutex::new(None),
            output: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    /// List all available keyboard devices
    pub fn list_devices() -> DriverResult<Vec<DeviceInfo>> {
        let devices: Vec<DeviceInfo> = evdev::enumerate()
            .filter(|(_, device)| {
                is_keyboard(device)
                    && !super::devices::is_virtual_device(device.name().unwrap_or(""))
            })
            .map(|(path, device)| DeviceInfo {
                name: device.name().unwrap_or("Unknown").to_string(),
                path: path.to_str().map(str::to_string),
            })
            .collect();

        if devices.is_empty() {
            return Err(DriverError::DeviceNotFound(
                "No keyboard devices found".to_string(),
            ));
        }
        Ok(devices)
    }

    fn emit(&self, code: ScanCode, value: i32) -> DriverResult<()> {
        let mut output = self.output.lock();
        if output.is_none() {
            *output = Some(create_virtual_device()?);
        }
        let Some(device) = output.as_mut() else {
            return Err(DriverError::Evdev("virtual device unavailable".to_string()));
        };

        let key_event = InputEvent::new(EventType::KEY, code.code(), value);
        // SYN is required for the kernel to process the key event
        let syn_event = InputEvent::new(EventType::SYNCHRONIZATION, 0, 0);
        device.emit(&[key_event, syn_event])?;
        Ok(())
    }
}

impl KeyboardDriver for EvdevDriver {
    fn init(&self) -> DriverResult<()> {
        let mut output = self.output.lock();
        if output.is_none() {
            *output = Some(create_virtual_device()?);
        }
        drop(output);

        *self.capture.lock() = Some(Capture::grab(&self.filter)?);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn listen(&self, sink: EventSink) -> DriverResult<()> {
        let Some(mut capture) = self.capture.lock().take() else {
            return Err(DriverError::DeviceNotFound(
                "listen called before init".to_string(),
            ));
        };

        while self.running.load(Ordering::SeqCst) {
            for (raw, device) in capture.poll()? {
                let event_type = match raw.value() {
                    0 => KeyEventType::Up,
                    // 1 is a press, 2 an auto-repeat
                    1 | 2 => KeyEventType::Down,
                    _ => continue,
                };
                let code = ScanCode(raw.code());
                let mut event = KeyEvent::new(event_type, code, monotonic_time())
                    .with_device(device)
                    .with_keypad(is_keypad_code(code.code()));
                event.name = key::key_name(code.code()).map(str::to_string);

                if sink(event) {
                    self.emit(code, raw.value())?;
                }
            }
        }
        Ok(())
    }

    fn press(&self, code: ScanCode) -> DriverResult<()> {
        self.emit(code, 1)
    }

    fn release(&self, code: ScanCode) -> DriverResult<()> {
        self.emit(code, 0)
    }

    fn map_name(&self, name: &str) -> DriverResult<Vec<(ScanCode, Vec<String>)>> {
        let entries: Vec<(ScanCode, Vec<String>)> = key::codes_for_name(name)
            .into_iter()
            .map(|(code, mods)| (code, mods.into_iter().map(str::to_string).collect()))
            .collect();
        if entries.is_empty() {
            return Err(DriverError::UnknownName(name.to_string()));
        }
        Ok(entries)
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
