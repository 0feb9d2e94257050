// Keyhook Memory Driver
// In-process driver for headless use and tests

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::time::Duration;

use super::{DriverError, DriverResult, EventSink, KeyboardDriver};
use crate::canonical::normalize_name;
use crate::event::{monotonic_time, EventType, KeyEvent};
use crate::key::{self, ScanCode};

/// How long `feed` waits for a listener to connect
const CONNECT_WAIT: Duration = Duration::from_secs(2);

enum NameTable {
    /// The Linux key table with a US layout
    Linux,
    Custom(HashMap<String, Vec<(ScanCode, Vec<String>)>>),
}

#[derive(Default)]
struct Inner {
    sink: Option<EventSink>,
    stopped: bool,
    /// Bumped by every `init`, so a stale `listen` from an earlier run exits
    session: u64,
    output: Vec<KeyEvent>,
    typed: Vec<char>,
}

/// Driver with no device behind it.
///
/// Physical input is fed in with `feed`; whatever would reach the rest of
/// the system (allowed input plus synthesized presses and releases) is
/// collected and read back with `take_output`.
pub struct MemoryDriver {
    names: NameTable,
    echo: bool,
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl MemoryDriver {
    /// Driver using the Linux key names
    pub fn linux() -> Self {
        Self::with_table(NameTable::Linux)
    }

    /// Driver knowing only the given names, each mapped to one code
    pub fn with_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, u16)>,
    {
        let mut table: HashMap<String, Vec<(ScanCode, Vec<String>)>> = HashMap::new();
        for (name, code) in names {
            let normalized = normalize_name(name).unwrap_or_default();
            table
                .entry(normalized)
                .or_default()
                .push((ScanCode(code), Vec::new()));
        }
        Self::with_table(NameTable::Custom(table))
    }

    fn with_table(names: NameTable) -> Self {
        Self {
            names,
            echo: false,
            inner: Mutex::new(Inner::default()),
            changed: Condvar::new(),
        }
    }

    /// Deliver synthesized events to the listener too, the way platforms
    /// that hook injected input do
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Connect a sink without blocking in `listen`
    pub fn connect(&self, sink: EventSink) {
        let mut inner = self.inner.lock();
        inner.sink = Some(sink);
        self.changed.notify_all();
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().sink.is_some()
    }

    /// Deliver a physical event, returning whether it was allowed
    pub fn feed(&self, event: KeyEvent) -> bool {
        let sink = self.wait_for_sink();
        let allowed = match sink {
            Some(sink) => sink(event.clone()),
            None => {
                log::warn!("No listener connected, passing {} through", event);
                true
            }
        };
        if allowed {
            self.inner.lock().output.push(event);
        }
        allowed
    }

    /// Events that reached the system since the last call
    pub fn take_output(&self) -> Vec<KeyEvent> {
        std::mem::take(&mut self.inner.lock().output)
    }

    /// Characters typed with `type_unicode` since the last call
    pub fn take_typed(&self) -> Vec<char> {
        std::mem::take(&mut self.inner.lock().typed)
    }

    fn wait_for_sink(&self) -> Option<EventSink> {
        let mut inner = self.inner.lock();
        if inner.sink.is_none() && !inner.stopped {
            let _ = self
                .changed
                .wait_while_for(&mut inner, |i| i.sink.is_none() && !i.stopped, CONNECT_WAIT);
        }
        inner.sink.clone()
    }

    fn synthesize(&self, event_type: EventType, code: ScanCode) {
        let mut event = KeyEvent::new(event_type, code, monotonic_time());
        event.name = code.name().map(str::to_string);

        // The sink must be called without the lock held, it may call back in
        let sink = if self.echo {
            self.inner.lock().sink.clone()
        } else {
            None
        };
        let allowed = sink.map_or(true, |sink| sink(event.clone()));
        if allowed {
            self.inner.lock().output.push(event);
        }
    }
}

impl KeyboardDriver for MemoryDriver {
    fn init(&self) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        inner.stopped = false;
        inner.session += 1;
        self.changed.notify_all();
        Ok(())
    }

    fn listen(&self, sink: EventSink) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        let session = inner.session;
        if inner.stopped {
            return Ok(());
        }
        inner.sink = Some(sink);
        self.changed.notify_all();
        while !inner.stopped && inner.session == session {
            self.changed.wait(&mut inner);
        }
        if inner.session == session {
            inner.sink = None;
        }
        Ok(())
    }

    fn press(&self, code: ScanCode) -> DriverResult<()> {
        self.synthesize(EventType::Down, code);
        Ok(())
    }

    fn release(&self, code: ScanCode) -> DriverResult<()> {
        self.synthesize(EventType::Up, code);
        Ok(())
    }

    fn map_name(&self, name: &str) -> DriverResult<Vec<(ScanCode, Vec<String>)>> {
        let entries = match &self.names {
            NameTable::Linux => key::codes_for_name(name)
                .into_iter()
                .map(|(code, mods)| (code, mods.into_iter().map(str::to_string).collect()))
                .collect(),
            NameTable::Custom(table) => table.get(name).cloned().unwrap_or_default(),
        };
        if entries.is_empty() {
            return Err(DriverError::UnknownName(name.to_string()));
        }
        Ok(entries)
    }

    fn type_unicode(&self, ch: char) -> DriverResult<()> {
        self.inner.lock().typed.push(ch);
        Ok(())
    }

    fn stop(&self) {
        let mut inner = self.inner.lock();
        inner.stopped = true;
        self.changed.notify_all();
    }
}
