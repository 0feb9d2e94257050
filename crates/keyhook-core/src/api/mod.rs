// Keyhook Keyboard API
// High-level surface over the listener: hooks, hotkeys, sending and recording

pub mod text;
pub mod words;

pub use text::{get_typed_strings, hotkey_name};
pub use words::{WordHook, WordOptions};

use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::decision::Decision;
use crate::driver::{DriverError, KeyboardDriver};
use crate::event::{EventType, KeyEvent};
use crate::hook::{HotkeyHook, HotkeyOptions, SimpleHook, SingleKeyHook};
use crate::hotkey::{self, Hotkey, HotkeyParseError};
use crate::key::ScanCode;
use crate::listener::{HookAlias, HookHandle, Listener, ListenerError, WeakListener};

/// Result type for keyboard operations
pub type KeyboardResult<T> = Result<T, KeyboardError>;

/// Errors returned by the keyboard API
#[derive(Debug, thiserror::Error)]
pub enum KeyboardError {
    #[error("Invalid hotkey: {0}")]
    Parse(#[from] HotkeyParseError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Listener error: {0}")]
    Listener(#[from] ListenerError),

    #[error("Must call start_recording before stop_recording")]
    NotRecording,

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Hook removed while waiting for input")]
    Cancelled,
}

/// Shared event callback, removable through `HookAlias::callback`
pub type SharedEventCallback = Arc<dyn Fn(&KeyEvent) -> Decision + Send + Sync>;

/// Shared hotkey callback, removable through `HookAlias::callback`
pub type SharedHotkeyCallback = Arc<dyn Fn() -> Decision + Send + Sync>;

struct Recording {
    events: Arc<Mutex<Vec<KeyEvent>>>,
    handle: HookHandle,
}

/// Keyboard hooking and simulation.
///
/// Wraps a [`Listener`] and resolves key names through its driver. Hooks
/// registered with `suppress = false` run on the listener's async worker,
/// which only receives events while the listener is started.
#[derive(Clone)]
pub struct Keyboard {
    listener: Listener,
    recording: Arc<Mutex<Option<Recording>>>,
    words: Arc<Mutex<IndexMap<String, HookHandle>>>,
}

impl Keyboard {
    pub fn new(driver: Arc<dyn KeyboardDriver>) -> Self {
        Self::from_listener(Listener::new(driver))
    }

    pub fn from_listener(listener: Listener) -> Self {
        Self {
            listener,
            recording: Arc::new(Mutex::new(None)),
            words: Arc::new(Mutex::new(IndexMap::new())),
        }
    }

    pub fn listener(&self) -> &Listener {
        &self.listener
    }

    pub fn start(&self) -> KeyboardResult<()> {
        self.listener.start()?;
        Ok(())
    }

    pub fn stop(&self) -> KeyboardResult<()> {
        self.listener.stop()?;
        Ok(())
    }

    // --- Names ---

    /// Scan codes of a key name
    pub fn key_to_scan_codes(&self, key: &str) -> KeyboardResult<Vec<ScanCode>> {
        Ok(hotkey::key_to_scan_codes(self.listener.driver().as_ref(), key)?)
    }

    pub fn parse_hotkey(&self, text: &str) -> KeyboardResult<Hotkey> {
        Ok(hotkey::parse_hotkey(
            text,
            self.listener.driver().as_ref(),
            self.listener.modifiers(),
        )?)
    }

    pub fn is_modifier(&self, code: ScanCode) -> bool {
        self.listener.is_modifier(code)
    }

    // --- Hooks ---

    /// Call `callback` for every event
    pub fn hook(
        &self,
        callback: impl FnMut(&KeyEvent) -> Decision + Send + 'static,
        suppress: bool,
    ) -> HookHandle {
        self.listener.register(SimpleHook::new(callback), vec![], suppress)
    }

    /// Like `hook`, also removable by `HookAlias::callback(&callback)`
    pub fn hook_shared(&self, callback: SharedEventCallback, suppress: bool) -> HookHandle {
        let alias = HookAlias::callback(&callback);
        self.listener.register(
            SimpleHook::new(move |event: &KeyEvent| callback(event)),
            vec![alias],
            suppress,
        )
    }

    /// Call `callback` for every press; releases are allowed
    pub fn on_press(
        &self,
        mut callback: impl FnMut(&KeyEvent) -> Decision + Send + 'static,
        suppress: bool,
    ) -> HookHandle {
        self.hook(
            move |event| {
                if event.is_down() {
                    callback(event)
                } else {
                    Decision::Allow
                }
            },
            suppress,
        )
    }

    /// Call `callback` for every release; presses are allowed
    pub fn on_release(
        &self,
        mut callback: impl FnMut(&KeyEvent) -> Decision + Send + 'static,
        suppress: bool,
    ) -> HookHandle {
        self.hook(
            move |event| {
                if event.is_up() {
                    callback(event)
                } else {
                    Decision::Allow
                }
            },
            suppress,
        )
    }

    /// Call `callback` for presses and releases of one key.
    ///
    /// The hook is aliased by the key name. A callback cannot suspend a single
    /// key, so `Suspend` is treated as `Suppress`.
    pub fn hook_key(
        &self,
        key: &str,
        callback: impl FnMut(&KeyEvent) -> Decision + Send + 'static,
        suppress: bool,
    ) -> KeyboardResult<HookHandle> {
        self.register_key(key, callback, vec![key.into()], suppress)
    }

    /// Like `hook_key`, also removable by `HookAlias::callback(&callback)`
    pub fn hook_key_shared(
        &self,
        key: &str,
        callback: SharedEventCallback,
        suppress: bool,
    ) -> KeyboardResult<HookHandle> {
        let aliases = vec![HookAlias::callback(&callback), key.into()];
        self.register_key(key, move |event: &KeyEvent| callback(event), aliases, suppress)
    }

    fn register_key(
        &self,
        key: &str,
        mut callback: impl FnMut(&KeyEvent) -> Decision + Send + 'static,
        aliases: Vec<HookAlias>,
        suppress: bool,
    ) -> KeyboardResult<HookHandle> {
        let codes = self.key_to_scan_codes(key)?;
        let hook = SingleKeyHook::new(codes, move |event| match callback(event) {
            Decision::Suspend => Decision::Suppress,
            decision => decision,
        });
        Ok(self.listener.register(hook, aliases, suppress))
    }

    pub fn on_press_key(
        &self,
        key: &str,
        mut callback: impl FnMut(&KeyEvent) -> Decision + Send + 'static,
        suppress: bool,
    ) -> KeyboardResult<HookHandle> {
        self.hook_key(
            key,
            move |event| {
                if event.is_down() {
                    callback(event)
                } else {
                    Decision::Allow
                }
            },
            suppress,
        )
    }

    pub fn on_release_key(
        &self,
        key: &str,
        mut callback: impl FnMut(&KeyEvent) -> Decision + Send + 'static,
        suppress: bool,
    ) -> KeyboardResult<HookHandle> {
        self.hook_key(
            key,
            move |event| {
                if event.is_up() {
                    callback(event)
                } else {
                    Decision::Allow
                }
            },
            suppress,
        )
    }

    /// Suppress every event of a key, whatever the modifiers
    pub fn block_key(&self, key: &str) -> KeyboardResult<HookHandle> {
        self.hook_key(key, |_| Decision::Suppress, true)
    }

    /// Press or release the hotkey `dst` whenever `src` is pressed or released
    pub fn remap_key(&self, src: &str, dst: &str) -> KeyboardResult<HookHandle> {
        let target = self.parse_hotkey(dst)?;
        let listener = self.listener.downgrade();
        self.hook_key(
            src,
            move |event| {
                if let Some(listener) = listener.upgrade() {
                    let pressed = event.is_down();
                    if let Err(e) = send_hotkey(&listener, &target, pressed, !pressed) {
                        log::warn!("Failed to send remapped {}: {}", target, e);
                    }
                }
                Decision::Suppress
            },
            true,
        )
    }

    /// Disable every hook registered under `alias`
    pub fn unhook(&self, alias: impl Into<HookAlias>) -> bool {
        self.listener.disable_by_alias(&alias.into())
    }

    /// Remove every hook, including hotkeys, word listeners and recordings
    pub fn unhook_all(&self) {
        self.listener.unhook_all();
        self.words.lock().clear();
        let _ = self.recording.lock().take();
    }

    // --- Hotkeys ---

    /// Call `callback` whenever `hotkey` is typed.
    ///
    /// The hook is aliased by the hotkey string. Unless the callback returns
    /// `Allow`, the keys that made up the hotkey are suppressed.
    pub fn add_hotkey(
        &self,
        hotkey: &str,
        callback: impl FnMut() -> Decision + Send + 'static,
        options: HotkeyOptions,
    ) -> KeyboardResult<HookHandle> {
        self.register_hotkey(hotkey, callback, vec![hotkey.into()], options)
    }

    /// Like `add_hotkey`, also removable by `HookAlias::callback(&callback)`
    pub fn add_hotkey_shared(
        &self,
        hotkey: &str,
        callback: SharedHotkeyCallback,
        options: HotkeyOptions,
    ) -> KeyboardResult<HookHandle> {
        let aliases = vec![HookAlias::callback(&callback), hotkey.into()];
        self.register_hotkey(hotkey, move || callback(), aliases, options)
    }

    fn register_hotkey(
        &self,
        hotkey: &str,
        callback: impl FnMut() -> Decision + Send + 'static,
        aliases: Vec<HookAlias>,
        options: HotkeyOptions,
    ) -> KeyboardResult<HookHandle> {
        let parsed = self.parse_hotkey(hotkey)?;
        let hook = HotkeyHook::new(parsed, self.listener.modifiers().clone(), options, callback);
        Ok(self.listener.register(hook, aliases, options.suppress))
    }

    pub fn remove_hotkey(&self, alias: impl Into<HookAlias>) -> bool {
        self.unhook(alias)
    }

    /// Send `dst` instead of `src` whenever `src` is typed.
    ///
    /// Modifiers held when `src` completes are released around `dst` and
    /// pressed again afterwards.
    pub fn remap_hotkey(
        &self,
        src: &str,
        dst: &str,
        options: HotkeyOptions,
    ) -> KeyboardResult<HookHandle> {
        let target = self.parse_hotkey(dst)?;
        let listener = self.listener.downgrade();
        self.add_hotkey(
            src,
            move || {
                if let Err(e) = send_remapped(&listener, &target) {
                    log::warn!("Failed to send remapped {}: {}", target, e);
                }
                Decision::Suppress
            },
            options,
        )
    }

    // --- Sending ---

    /// Press and/or release every key of a hotkey, step by step.
    ///
    /// Within a step keys are pressed in order and released in reverse.
    pub fn send(&self, hotkey: &str, do_press: bool, do_release: bool) -> KeyboardResult<()> {
        let parsed = self.parse_hotkey(hotkey)?;
        send_hotkey(&self.listener, &parsed, do_press, do_release)
    }

    pub fn press(&self, hotkey: &str) -> KeyboardResult<()> {
        self.send(hotkey, true, false)
    }

    pub fn release(&self, hotkey: &str) -> KeyboardResult<()> {
        self.send(hotkey, false, true)
    }

    pub fn press_and_release(&self, hotkey: &str) -> KeyboardResult<()> {
        self.send(hotkey, true, true)
    }

    // --- State ---

    /// Whether every key of a single-step hotkey is physically pressed
    pub fn is_pressed(&self, hotkey: &str) -> KeyboardResult<bool> {
        let parsed = self.parse_hotkey(hotkey)?;
        let [step] = parsed.steps() else {
            return Err(HotkeyParseError::MultiStep(hotkey.to_string()).into());
        };
        let pressed = self.listener.snapshot().physical;
        Ok(step
            .keys()
            .iter()
            .all(|key| key.codes().iter().any(|&code| pressed.contains(code))))
    }

    /// Release every logically pressed key, returning their codes
    pub fn stash_state(&self) -> KeyboardResult<Vec<ScanCode>> {
        stash_state(&self.listener)
    }

    /// Press and release keys so exactly `codes` are held
    pub fn restore_state(&self, codes: &[ScanCode]) -> KeyboardResult<()> {
        restore_state(&self.listener, codes)
    }

    /// Like `restore_state`, considering only modifiers
    pub fn restore_modifiers(&self, codes: &[ScanCode]) -> KeyboardResult<()> {
        restore_modifiers(&self.listener, codes)
    }

    /// Type `text`, waiting `delay` between characters.
    ///
    /// Pressed keys are released first; held modifiers are pressed again
    /// afterwards.
    pub fn write(&self, text: &str, delay: Duration) -> KeyboardResult<()> {
        write_with(&self.listener, text, delay)
    }

    // --- Waiting and reading ---

    /// Block until `hotkey` is typed
    pub fn wait(
        &self,
        hotkey: &str,
        suppress: bool,
        trigger_on_release: bool,
    ) -> KeyboardResult<()> {
        let (tx, rx) = mpsc::channel();
        let options = HotkeyOptions {
            suppress,
            trigger_on_release,
            ..HotkeyOptions::default()
        };
        let handle = self.add_hotkey(
            hotkey,
            move || {
                let _ = tx.send(());
                Decision::Suppress
            },
            options,
        )?;
        let result = rx.recv().map_err(|_| KeyboardError::Cancelled);
        handle.dispose();
        result
    }

    /// Block until the next event; with `suppress` it is also blocked
    pub fn read_event(&self, suppress: bool) -> KeyboardResult<KeyEvent> {
        let (tx, rx) = mpsc::channel();
        let handle = self.hook(
            move |event| {
                let _ = tx.send(event.clone());
                Decision::block_if(suppress)
            },
            true,
        );
        let result = rx.recv().map_err(|_| KeyboardError::Cancelled);
        handle.dispose();
        result
    }

    /// Name (or scan code) of the key of the next event
    pub fn read_key(&self, suppress: bool) -> KeyboardResult<String> {
        Ok(text::event_key_name(&self.read_event(suppress)?))
    }

    /// Block until a hotkey is pressed and a key released, then name it
    pub fn read_hotkey(&self, suppress: bool) -> KeyboardResult<String> {
        let mut held: IndexMap<ScanCode, String> = self
            .listener
            .snapshot()
            .physical
            .iter()
            .map(|code| (code, text::code_name(code)))
            .collect();

        let (tx, rx) = mpsc::channel();
        let handle = self.hook(
            move |event| {
                let _ = tx.send(event.clone());
                Decision::block_if(suppress && event.is_down())
            },
            true,
        );

        let result = loop {
            let Ok(event) = rx.recv() else {
                break Err(KeyboardError::Cancelled);
            };
            let name = text::event_key_name(&event);
            if event.is_down() {
                held.insert(event.scan_code, name);
            } else {
                held.shift_remove(&event.scan_code);
                break Ok(hotkey_name(held.values().chain(std::iter::once(&name))));
            }
        };
        handle.dispose();
        result
    }

    /// Standard name of the physically pressed keys
    pub fn get_hotkey_name(&self) -> String {
        hotkey_name(self.listener.snapshot().physical.iter().map(text::code_name))
    }

    // --- Recording ---

    /// Record every event until `stop_recording`
    pub fn start_recording(&self) -> KeyboardResult<()> {
        let mut recording = self.recording.lock();
        if recording.is_some() {
            return Err(KeyboardError::AlreadyRecording);
        }

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let handle = self.hook(
            move |event| {
                sink.lock().push(event.clone());
                Decision::Allow
            },
            true,
        );
        *recording = Some(Recording { events, handle });
        Ok(())
    }

    /// Stop recording and return the events seen
    pub fn stop_recording(&self) -> KeyboardResult<Vec<KeyEvent>> {
        let recording = self.recording.lock().take().ok_or(KeyboardError::NotRecording)?;
        recording.handle.dispose();
        let events = std::mem::take(&mut *recording.events.lock());
        Ok(events)
    }

    /// Record every event until `until` is typed
    pub fn record(
        &self,
        until: &str,
        suppress: bool,
        trigger_on_release: bool,
    ) -> KeyboardResult<Vec<KeyEvent>> {
        self.start_recording()?;
        if let Err(e) = self.wait(until, suppress, trigger_on_release) {
            let _ = self.stop_recording();
            return Err(e);
        }
        self.stop_recording()
    }

    /// Replay events keeping their relative timing divided by `speed_factor`.
    ///
    /// A non-positive `speed_factor` replays as fast as possible. Pressed
    /// keys are released first; held modifiers are pressed again afterwards.
    pub fn play(&self, events: &[KeyEvent], speed_factor: f64) -> KeyboardResult<()> {
        let state = self.stash_state()?;

        let mut last_time: Option<f64> = None;
        for event in events {
            if let Some(last) = last_time {
                let gap = (event.time - last) / speed_factor;
                if speed_factor > 0.0 && gap > 0.0 {
                    thread::sleep(Duration::from_secs_f64(gap));
                }
            }
            last_time = Some(event.time);
            self.listener.send(event.event_type, event.scan_code)?;
        }

        self.restore_modifiers(&state)
    }

    // --- Words ---

    /// Call `callback` whenever `word` is typed followed by a trigger key.
    ///
    /// One listener per word: adding the same word again replaces it.
    pub fn add_word_listener(
        &self,
        word: &str,
        callback: impl FnMut() + Send + 'static,
        options: WordOptions,
    ) -> HookHandle {
        self.register_word(WordHook::new(word, options, callback))
    }

    fn register_word(&self, hook: WordHook) -> HookHandle {
        let word = hook.word().to_string();
        let handle = self.listener.register(hook, vec![], true);
        if let Some(previous) = self.words.lock().insert(word, handle.clone()) {
            previous.dispose();
        }
        handle
    }

    pub fn remove_word_listener(&self, word: &str) -> bool {
        match self.words.lock().shift_remove(word) {
            Some(handle) => handle.dispose(),
            None => false,
        }
    }

    /// Replace `source` followed by a trigger key with `replacement`.
    ///
    /// The trigger key is swallowed and the typed word is erased with
    /// backspaces, so only the replacement remains.
    pub fn add_abbreviation(
        &self,
        source: &str,
        replacement: &str,
        options: WordOptions,
    ) -> HookHandle {
        let erase = "\u{8}".repeat(source.chars().count());
        let text = format!("{}{}", erase, replacement);
        let listener = self.listener.downgrade();
        let hook = WordHook::new(source, options, move || {
            if let Some(listener) = listener.upgrade() {
                if let Err(e) = write_with(&listener, &text, Duration::ZERO) {
                    log::warn!("Failed to expand abbreviation: {}", e);
                }
            }
        });
        self.register_word(hook.consuming_trigger())
    }
}

impl std::fmt::Debug for Keyboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyboard")
            .field("listener", &self.listener)
            .finish()
    }
}

fn send_hotkey(
    listener: &Listener,
    hotkey: &Hotkey,
    do_press: bool,
    do_release: bool,
) -> KeyboardResult<()> {
    for step in hotkey.steps() {
        if do_press {
            for key in step.keys() {
                listener.send(EventType::Down, key.primary())?;
            }
        }
        if do_release {
            for key in step.keys().iter().rev() {
                listener.send(EventType::Up, key.primary())?;
            }
        }
    }
    Ok(())
}

fn send_remapped(listener: &WeakListener, target: &Hotkey) -> KeyboardResult<()> {
    let Some(listener) = listener.upgrade() else {
        return Ok(());
    };
    let active: Vec<ScanCode> = listener
        .snapshot()
        .logical
        .iter()
        .filter(|&code| listener.is_modifier(code))
        .collect();

    for &code in &active {
        listener.send(EventType::Up, code)?;
    }
    send_hotkey(&listener, target, true, true)?;
    for &code in active.iter().rev() {
        listener.send(EventType::Down, code)?;
    }
    Ok(())
}

/// Keys held as far as the rest of the system knows are the logical ones
fn stash_state(listener: &Listener) -> KeyboardResult<Vec<ScanCode>> {
    let state = listener.snapshot().logical.to_vec();
    for &code in &state {
        listener.send(EventType::Up, code)?;
    }
    Ok(state)
}

fn restore_state(listener: &Listener, codes: &[ScanCode]) -> KeyboardResult<()> {
    let current = listener.snapshot().logical;
    let target: crate::state::KeySet = codes.iter().copied().collect();

    let mut events: Vec<(EventType, ScanCode)> = current
        .difference(&target)
        .map(|code| (EventType::Up, code))
        .collect();
    events.extend(target.difference(&current).map(|code| (EventType::Down, code)));
    listener.send_unhooked(&events)?;
    Ok(())
}

fn restore_modifiers(listener: &Listener, codes: &[ScanCode]) -> KeyboardResult<()> {
    let modifiers: Vec<ScanCode> = codes
        .iter()
        .copied()
        .filter(|&code| listener.is_modifier(code))
        .collect();
    restore_state(listener, &modifiers)
}

pub(crate) fn write_with(listener: &Listener, text: &str, delay: Duration) -> KeyboardResult<()> {
    let state = stash_state(listener)?;
    text::write_text(listener, text, delay)?;
    restore_modifiers(listener, &state)
}
