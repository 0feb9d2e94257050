// Keyhook Listener
// Sole receiver of key events: press state, hook decisions and replay

pub mod queue;
pub mod registry;

pub use queue::AsyncQueue;
pub use registry::{HookAlias, HookId, HookRegistry, SharedHook};

use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use crate::decision::{merge_for, Decision, Decisions};
use crate::driver::{DriverError, DriverResult, EventSink, KeyboardDriver};
use crate::event::{EventType, KeyEvent};
use crate::hook::Hook;
use crate::key::ScanCode;
use crate::modifier::ModifierCodes;
use crate::state::{KeySet, PressSnapshot, PressState};

/// Bounded wait of the async worker, so a stop is noticed promptly
const WORKER_POLL: Duration = Duration::from_millis(100);

/// Result type for listener operations
pub type ListenerResult<T> = Result<T, ListenerError>;

/// Errors that can occur starting or stopping a listener
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Listener is already running")]
    AlreadyRunning,

    #[error("Listener is not running")]
    NotRunning,

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Failed to spawn listener thread: {0}")]
    Thread(#[source] std::io::Error),
}

/// An event held back by a hook, with the modifiers active when it arrived
#[derive(Debug, Clone)]
struct SuspendedEvent {
    event: KeyEvent,
    modifiers: KeySet,
}

/// Counts one more replay in progress while alive.
///
/// Guards are taken from the capture thread and from any thread sending
/// unhooked events, so they may be dropped in any order.
struct ReplayGuard<'a> {
    depth: &'a AtomicUsize,
}

impl<'a> ReplayGuard<'a> {
    fn engage(depth: &'a AtomicUsize) -> Self {
        depth.fetch_add(1, Ordering::SeqCst);
        Self { depth }
    }
}

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Shared {
    driver: Arc<dyn KeyboardDriver>,
    modifiers: ModifierCodes,
    press_state: RwLock<PressState>,
    /// Held for the whole of synchronous processing, which serializes it
    suspended: Mutex<Vec<SuspendedEvent>>,
    /// Length of `suspended`, readable while hooks hold the lock
    suspended_len: AtomicUsize,
    registry: RwLock<HookRegistry>,
    replaying: AtomicUsize,
    queue: AsyncQueue,
    /// Fresh flag per start, so a quick stop/start never revives an old worker
    running: Mutex<Option<Arc<AtomicBool>>>,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn process(&self, event: KeyEvent) -> bool {
        if self.replaying.load(Ordering::SeqCst) > 0 {
            log::trace!("Passing injected {}", event);
            return true;
        }

        let queue_async = self.is_running();
        let mut suspended = self.suspended.lock();

        let snapshot = {
            let mut state = self.press_state.write();
            state.record_physical(&event, &self.modifiers);
            state.snapshot()
        };

        if queue_async {
            self.queue.push(event.clone());
        }

        let decision = {
            // Events injected by hooks or by replay pass straight through
            let _guard = ReplayGuard::engage(&self.replaying);

            let hooks = self.registry.read().suppressing();
            let outputs: Vec<Decisions> = hooks
                .iter()
                .filter_map(|hook| run_hook(hook, &event, &snapshot))
                .collect();

            self.resolve_suspended(&mut suspended, &outputs, &snapshot.modifiers);
            merge_for(&outputs, &event)
        };

        log::trace!("{} -> {}", event, decision);
        let allowed = match decision {
            Decision::Suspend => {
                suspended.push(SuspendedEvent {
                    event,
                    modifiers: snapshot.modifiers,
                });
                false
            }
            Decision::Suppress => false,
            Decision::Allow => {
                self.press_state
                    .write()
                    .record_logical(event.event_type, event.scan_code);
                true
            }
        };
        self.suspended_len.store(suspended.len(), Ordering::SeqCst);
        allowed
    }

    /// Apply this pass's decisions to earlier suspended events.
    ///
    /// Allowed events are replayed in suspension order, each with the
    /// modifiers that were active when it was suspended; the live modifier
    /// state is restored afterwards.
    fn resolve_suspended(
        &self,
        suspended: &mut Vec<SuspendedEvent>,
        outputs: &[Decisions],
        active: &KeySet,
    ) {
        let mut current = active.clone();
        let mut remaining = Vec::with_capacity(suspended.len());

        for held in suspended.drain(..) {
            match merge_for(outputs, &held.event) {
                Decision::Suspend => remaining.push(held),
                Decision::Suppress => log::debug!("Suppressing suspended {}", held.event),
                Decision::Allow => {
                    let extra: Vec<ScanCode> = current.difference(&held.modifiers).collect();
                    for code in extra {
                        self.inject(EventType::Up, code);
                        current.remove(code);
                    }
                    let missing: Vec<ScanCode> = held.modifiers.difference(&current).collect();
                    for code in missing {
                        self.inject(EventType::Down, code);
                        current.insert(code);
                    }

                    log::debug!("Replaying {}", held.event);
                    self.inject(held.event.event_type, held.event.scan_code);
                }
            }
        }
        *suspended = remaining;

        for code in active.difference(&current) {
            self.inject(EventType::Down, code);
        }
        for code in current.difference(active) {
            self.inject(EventType::Up, code);
        }
    }

    /// Synthesize an event; failures are logged, replay carries on
    fn inject(&self, event_type: EventType, code: ScanCode) {
        if let Err(e) = self.send(event_type, code) {
            log::warn!("Failed to inject {} {}: {}", event_type, code, e);
        }
    }

    fn send(&self, event_type: EventType, code: ScanCode) -> DriverResult<()> {
        match event_type {
            EventType::Down => self.driver.press(code)?,
            EventType::Up => self.driver.release(code)?,
        }
        self.press_state.write().record_logical(event_type, code);
        Ok(())
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(flag) = self.running.get_mut().take() {
            flag.store(false, Ordering::SeqCst);
            self.driver.stop();
        }
    }
}

/// Run one hook, isolating panics
fn run_hook(hook: &SharedHook, event: &KeyEvent, snapshot: &PressSnapshot) -> Option<Decisions> {
    match catch_unwind(AssertUnwindSafe(|| hook.lock().process_event(event, snapshot))) {
        Ok(decisions) => Some(decisions),
        Err(_) => {
            log::error!("Hook panicked while processing {}", event);
            None
        }
    }
}

fn run_worker(shared: Weak<Shared>, running: Arc<AtomicBool>) {
    log::debug!("Async worker started");
    while running.load(Ordering::SeqCst) {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        let Some(event) = shared.queue.recv_timeout(WORKER_POLL) else {
            continue;
        };

        let snapshot = shared.press_state.read().snapshot();
        let hooks = shared.registry.read().nonsuppressing();
        for hook in &hooks {
            // Decisions of non-suppressing hooks are ignored
            let _ = run_hook(hook, &event, &snapshot);
        }
        shared.queue.task_done();
    }
    log::debug!("Async worker stopped");
}

/// The event coordinator.
///
/// Receives every event from the driver, keeps the pressed-key state, asks
/// the suppressing hooks for decisions, replays suspended events once they
/// are allowed and feeds non-suppressing hooks from a background worker.
/// Cloning gives another handle to the same listener.
#[derive(Clone)]
pub struct Listener {
    shared: Arc<Shared>,
}

impl Listener {
    /// Create a listener, asking the driver which codes are modifiers
    pub fn new(driver: Arc<dyn KeyboardDriver>) -> Self {
        let modifiers = ModifierCodes::from_driver(driver.as_ref());
        Self::with_modifiers(driver, modifiers)
    }

    pub fn with_modifiers(driver: Arc<dyn KeyboardDriver>, modifiers: ModifierCodes) -> Self {
        Self {
            shared: Arc::new(Shared {
                driver,
                modifiers,
                press_state: RwLock::new(PressState::new()),
                suspended: Mutex::new(Vec::new()),
                suspended_len: AtomicUsize::new(0),
                registry: RwLock::new(HookRegistry::new()),
                replaying: AtomicUsize::new(0),
                queue: AsyncQueue::new(),
                running: Mutex::new(None),
            }),
        }
    }

    pub fn driver(&self) -> &Arc<dyn KeyboardDriver> {
        &self.shared.driver
    }

    pub fn modifiers(&self) -> &ModifierCodes {
        &self.shared.modifiers
    }

    pub fn is_modifier(&self, code: ScanCode) -> bool {
        self.shared.modifiers.contains(code)
    }

    /// Start capturing.
    ///
    /// Driver initialisation errors are returned here and never retried.
    /// Press state, suspensions and queued async events are reset.
    pub fn start(&self) -> ListenerResult<()> {
        let mut running = self.shared.running.lock();
        if running.is_some() {
            return Err(ListenerError::AlreadyRunning);
        }

        self.shared.driver.init()?;
        self.shared.press_state.write().clear();
        self.shared.suspended.lock().clear();
        self.shared.suspended_len.store(0, Ordering::SeqCst);
        self.shared.queue.clear();

        let flag = Arc::new(AtomicBool::new(true));

        let worker_shared = Arc::downgrade(&self.shared);
        let worker_flag = flag.clone();
        thread::Builder::new()
            .name("keyhook-async".to_string())
            .spawn(move || run_worker(worker_shared, worker_flag))
            .map_err(ListenerError::Thread)?;

        let driver = self.shared.driver.clone();
        let sink = self.event_sink();
        let capture_flag = flag.clone();
        thread::Builder::new()
            .name("keyhook-capture".to_string())
            .spawn(move || {
                if let Err(e) = driver.listen(sink) {
                    log::error!("Driver stopped listening: {}", e);
                }
                capture_flag.store(false, Ordering::SeqCst);
            })
            .map_err(|e| {
                flag.store(false, Ordering::SeqCst);
                ListenerError::Thread(e)
            })?;

        *running = Some(flag);
        log::debug!("Listener started");
        Ok(())
    }

    /// Stop capturing; queued async events may be dropped
    pub fn stop(&self) -> ListenerResult<()> {
        let flag = self
            .shared
            .running
            .lock()
            .take()
            .ok_or(ListenerError::NotRunning)?;
        flag.store(false, Ordering::SeqCst);
        self.shared.driver.stop();
        log::debug!("Listener stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Sink for the driver; holds the listener weakly
    pub fn event_sink(&self) -> EventSink {
        let shared = Arc::downgrade(&self.shared);
        Arc::new(move |event: KeyEvent| match shared.upgrade() {
            Some(shared) => shared.process(event),
            None => true,
        })
    }

    /// Decide one event synchronously; returns whether it is allowed
    pub fn process_event(&self, event: KeyEvent) -> bool {
        self.shared.process(event)
    }

    /// Register a hook under the given aliases
    pub fn register(
        &self,
        hook: impl Hook + 'static,
        aliases: Vec<HookAlias>,
        suppress: bool,
    ) -> HookHandle {
        self.register_shared(Arc::new(Mutex::new(hook)), aliases, suppress)
    }

    pub fn register_shared(
        &self,
        hook: SharedHook,
        aliases: Vec<HookAlias>,
        suppress: bool,
    ) -> HookHandle {
        let id = self.shared.registry.write().register(hook, aliases, suppress);
        log::debug!(
            "Registered {} ({})",
            id,
            if suppress { "suppressing" } else { "async" }
        );
        HookHandle {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Disable every hook registered under `alias`, returns whether any was
    pub fn disable_by_alias(&self, alias: &HookAlias) -> bool {
        let removed = self.shared.registry.write().disable_by_alias(alias);
        if !removed {
            log::debug!("No enabled hook registered as {:?}", alias);
        }
        removed
    }

    /// Remove every hook
    pub fn unhook_all(&self) {
        self.shared.registry.write().clear();
    }

    /// Number of enabled hooks
    pub fn hook_count(&self) -> usize {
        self.shared.registry.read().len()
    }

    /// Copy of the pressed-key state
    pub fn snapshot(&self) -> PressSnapshot {
        self.shared.press_state.read().snapshot()
    }

    /// Whether a key is physically held down
    pub fn is_pressed(&self, code: ScanCode) -> bool {
        self.shared.press_state.read().physical().contains(code)
    }

    /// Number of events currently held back by hooks; safe to call from
    /// inside a hook
    pub fn suspended_count(&self) -> usize {
        self.shared.suspended_len.load(Ordering::SeqCst)
    }

    /// Synthesize a press or release and track it as logically pressed
    pub fn send(&self, event_type: EventType, code: ScanCode) -> DriverResult<()> {
        self.shared.send(event_type, code)
    }

    /// Synthesize events that no hook sees, even on drivers that echo
    /// injected input back to the listener
    pub fn send_unhooked(&self, events: &[(EventType, ScanCode)]) -> DriverResult<()> {
        let _guard = ReplayGuard::engage(&self.shared.replaying);
        for &(event_type, code) in events {
            self.shared.send(event_type, code)?;
        }
        Ok(())
    }

    /// Handle that does not keep the listener alive
    pub fn downgrade(&self) -> WeakListener {
        WeakListener {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Block until the async worker has processed every queued event
    pub fn join_async(&self) {
        while self.is_running() && !self.shared.queue.wait_drained(WORKER_POLL) {}
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("running", &self.is_running())
            .field("hooks", &self.hook_count())
            .finish()
    }
}

/// Non-owning listener handle, for callbacks registered on the listener itself
#[derive(Clone)]
pub struct WeakListener {
    shared: Weak<Shared>,
}

impl WeakListener {
    pub fn upgrade(&self) -> Option<Listener> {
        self.shared.upgrade().map(|shared| Listener { shared })
    }
}

/// Handle to one hook registration
#[derive(Clone)]
pub struct HookHandle {
    id: HookId,
    shared: Weak<Shared>,
}

impl HookHandle {
    pub fn id(&self) -> HookId {
        self.id
    }

    /// Enable again after `disable`; enabling an enabled hook does nothing
    pub fn enable(&self) -> bool {
        self.with_registry(|registry, id| registry.enable(id))
    }

    pub fn disable(&self) -> bool {
        self.with_registry(|registry, id| registry.disable(id))
    }

    /// Remove the hook for good
    pub fn dispose(&self) -> bool {
        self.with_registry(|registry, id| registry.dispose(id))
    }

    pub fn is_enabled(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.registry.read().is_enabled(self.id))
    }

    /// Alias naming this registration
    pub fn alias(&self) -> HookAlias {
        HookAlias::Handle(self.id)
    }

    fn with_registry(&self, f: impl FnOnce(&mut HookRegistry, HookId) -> bool) -> bool {
        match self.shared.upgrade() {
            Some(shared) => f(&mut shared.registry.write(), self.id),
            None => false,
        }
    }
}

impl fmt::Debug for HookHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookHandle").field("id", &self.id).finish()
    }
}

impl From<&HookHandle> for HookAlias {
    fn from(handle: &HookHandle) -> Self {
        handle.alias()
    }
}
