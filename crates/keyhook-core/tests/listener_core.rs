// Keyhook Listener Scenario Tests
//
// Feeds scripted key sequences through a listener with hotkeys registered
// and checks exactly what reaches the output, including replays.

use std::sync::{mpsc, Arc};
use std::thread;

use parking_lot::Mutex;

use keyhook_core::{
    Decision, DriverError, DriverResult, EventSink, EventType, HookAlias, Hotkey, HotkeyHook,
    HotkeyOptions, KeyEvent, Keyboard, KeyboardDriver, Listener, ModifierCodes, ScanCode,
    SimpleHook, SingleKeyHook,
};

// Keys are numbered in the scripts: negative numbers are modifiers
const MODIFIERS: [u16; 3] = [29, 42, 56];
const KEYS: [u16; 3] = [30, 48, 46];

fn code(n: i32) -> ScanCode {
    if n < 0 {
        ScanCode(MODIFIERS[(-n - 1) as usize])
    } else {
        ScanCode(KEYS[n as usize])
    }
}

fn number(code: ScanCode) -> i32 {
    if let Some(i) = MODIFIERS.iter().position(|&c| c == code.code()) {
        return -(i as i32) - 1;
    }
    match KEYS.iter().position(|&c| c == code.code()) {
        Some(i) => i as i32,
        None => code.code() as i32,
    }
}

type Log = Arc<Mutex<Vec<String>>>;

/// Driver that writes synthesized events to a shared log
struct LogDriver {
    log: Log,
}

impl KeyboardDriver for LogDriver {
    fn init(&self) -> DriverResult<()> {
        Ok(())
    }

    fn listen(&self, _sink: EventSink) -> DriverResult<()> {
        Ok(())
    }

    fn press(&self, code: ScanCode) -> DriverResult<()> {
        self.log.lock().push(format!("PRESS({})", number(code)));
        Ok(())
    }

    fn release(&self, code: ScanCode) -> DriverResult<()> {
        self.log.lock().push(format!("RELEASE({})", number(code)));
        Ok(())
    }

    fn map_name(&self, name: &str) -> DriverResult<Vec<(ScanCode, Vec<String>)>> {
        Err(DriverError::UnknownName(name.to_string()))
    }

    fn stop(&self) {}
}

/// One scripted input event
#[derive(Clone, Copy)]
struct Input {
    event_type: EventType,
    key: i32,
    time: Option<f64>,
}

fn p(key: i32) -> Input {
    Input {
        event_type: EventType::Down,
        key,
        time: None,
    }
}

fn r(key: i32) -> Input {
    Input {
        event_type: EventType::Up,
        key,
        time: None,
    }
}

fn p_at(key: i32, time: f64) -> Input {
    Input {
        time: Some(time),
        ..p(key)
    }
}

fn r_at(key: i32, time: f64) -> Input {
    Input {
        time: Some(time),
        ..r(key)
    }
}

fn describe(inputs: &[Input]) -> String {
    inputs
        .iter()
        .map(|input| match input.event_type {
            EventType::Down => format!("PRESS({})", input.key),
            EventType::Up => format!("RELEASE({})", input.key),
        })
        .collect::<Vec<_>>()
        .join("+")
}

struct Harness {
    listener: Listener,
    log: Log,
    hotkeys: Vec<Arc<Mutex<HotkeyHook>>>,
    clock: f64,
}

impl Harness {
    fn new() -> Self {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let driver = Arc::new(LogDriver { log: log.clone() });
        let modifiers: ModifierCodes = MODIFIERS.iter().map(|&c| ScanCode(c)).collect();
        Self {
            listener: Listener::with_modifiers(driver, modifiers),
            log,
            hotkeys: Vec::new(),
            clock: 1.0,
        }
    }

    fn modifiers(&self) -> ModifierCodes {
        self.listener.modifiers().clone()
    }

    /// Callback logging a trigger and answering `decision`
    fn trigger(&self, value: i32, decision: Decision) -> impl FnMut() -> Decision + Send + 'static {
        let log = self.log.clone();
        move || {
            if value == 1000 {
                log.lock().push("TRIGGERED()".to_string());
            } else {
                log.lock().push(format!("TRIGGERED({})", value));
            }
            decision
        }
    }

    /// Register a hotkey whose steps are lists of single-code keys
    fn add_hotkey(&mut self, steps: &[&[i32]], options: HotkeyOptions, value: i32, decision: Decision) {
        let codes: Vec<Vec<Vec<ScanCode>>> = steps
            .iter()
            .map(|step| step.iter().map(|&key| vec![code(key)]).collect())
            .collect();
        let keys: Vec<Vec<&[ScanCode]>> = codes
            .iter()
            .map(|step| step.iter().map(Vec::as_slice).collect())
            .collect();
        let nested: Vec<&[&[ScanCode]]> = keys.iter().map(Vec::as_slice).collect();

        let hotkey = Hotkey::from_scan_codes(&nested, &self.modifiers()).expect("valid hotkey");
        let hook = Arc::new(Mutex::new(HotkeyHook::new(
            hotkey,
            self.modifiers(),
            options,
            self.trigger(value, decision),
        )));
        self.listener
            .register_shared(hook.clone(), Vec::new(), options.suppress);
        self.hotkeys.push(hook);
    }

    fn add_blocking(&mut self, steps: &[&[i32]]) {
        self.add_hotkey(steps, HotkeyOptions::default(), 1000, Decision::Suppress);
    }

    fn add_on_release(&mut self, steps: &[&[i32]]) {
        let options = HotkeyOptions {
            trigger_on_release: true,
            ..HotkeyOptions::default()
        };
        self.add_hotkey(steps, options, 1000, Decision::Suppress);
    }

    /// Feed `inputs` and check the output, then check that no hotkey is
    /// left half matched
    fn sim(&mut self, inputs: &[Input], expected: &str) {
        for input in inputs {
            let time = input.time.unwrap_or_else(|| {
                self.clock += 0.0002;
                self.clock
            });
            let event = KeyEvent::new(input.event_type, code(input.key), time);
            if self.listener.process_event(event) {
                self.log.lock().push(describe(std::slice::from_ref(input)));
            }
        }

        let output = std::mem::take(&mut *self.log.lock()).join("+");
        assert_eq!(output, expected, "output for {}", describe(inputs));

        for hook in &self.hotkeys {
            assert_eq!(hook.lock().state(), 0, "hotkey state after {}", describe(inputs));
        }
        assert_eq!(self.listener.suspended_count(), 0);
    }

    fn sim_same(&mut self, inputs: &[Input]) {
        let expected = describe(inputs);
        self.sim(inputs, &expected);
    }
}

#[test]
fn test_allowing_hook() {
    let mut h = Harness::new();
    h.listener
        .register(SingleKeyHook::new([code(0)], |_| Decision::Allow), Vec::new(), true);
    h.sim_same(&[p(0), r(0)]);
}

#[test]
fn test_suppressing_key_hook() {
    let mut h = Harness::new();
    let log = h.log.clone();
    h.listener.register(
        SingleKeyHook::new([code(0)], move |event| {
            if event.is_down() {
                log.lock().push("TRIGGERED()".to_string());
            }
            Decision::Suppress
        }),
        Vec::new(),
        true,
    );
    h.sim(&[p(1), p(0), r(0), r(1)], "PRESS(1)+TRIGGERED()+RELEASE(1)");
}

#[test]
fn test_single_key_blocking_hotkey() {
    let mut h = Harness::new();
    h.add_blocking(&[&[0]]);
    h.sim_same(&[p(1), r(1)]);
    h.sim(&[p(0), r(0)], "TRIGGERED()");
    h.sim(
        &[p(0), r(0), p(1), r(1), p(0), r(0)],
        "TRIGGERED()+PRESS(1)+RELEASE(1)+TRIGGERED()",
    );
    h.sim(&[p(1), p(0), r(1), r(0)], "PRESS(1)+TRIGGERED()+RELEASE(1)");
    h.sim_same(&[p(-1), p(0), r(-1), r(0)]);
    h.sim(&[p(0), p(0), r(0)], "TRIGGERED()+TRIGGERED()");
}

#[test]
fn test_single_key_allowing_hotkey() {
    let mut h = Harness::new();
    h.add_hotkey(&[&[0]], HotkeyOptions::default(), 1000, Decision::Allow);
    h.sim_same(&[p(1), r(1)]);
    h.sim(&[p(0), r(0)], "TRIGGERED()+PRESS(0)+RELEASE(0)");
    h.sim(
        &[p(1), p(0), r(1), r(0)],
        "PRESS(1)+TRIGGERED()+PRESS(0)+RELEASE(1)+RELEASE(0)",
    );
    h.sim(
        &[p(0), p(0), r(0)],
        "TRIGGERED()+PRESS(0)+TRIGGERED()+PRESS(0)+RELEASE(0)",
    );
}

#[test]
fn test_single_key_with_modifier_hotkey() {
    let mut h = Harness::new();
    h.add_blocking(&[&[-1, 0]]);
    h.sim_same(&[p(-1), r(-1), p(0), r(0), p(-1), r(-1)]);
    h.sim(&[p(-1), p(0), r(0), r(-1)], "PRESS(-1)+TRIGGERED()+RELEASE(-1)");
    h.sim(&[p(-1), p(0), r(-1), r(0)], "PRESS(-1)+TRIGGERED()+RELEASE(-1)");
    h.sim_same(&[p(0), p(-1), r(-1), r(0)]);
    h.sim(
        &[p(-1), p(1), p(0), r(1), r(-1), r(0)],
        "PRESS(-1)+PRESS(1)+TRIGGERED()+RELEASE(1)+RELEASE(-1)",
    );
}

#[test]
fn test_single_key_with_modifier_on_release() {
    let mut h = Harness::new();
    h.add_on_release(&[&[-1, 0]]);
    h.sim_same(&[p(-1), r(-1), p(0), r(0), p(-1), r(-1)]);
    h.sim(&[p(-1), p(0), r(0), r(-1)], "PRESS(-1)+TRIGGERED()+RELEASE(-1)");
    h.sim(&[p(-1), p(0), r(-1), r(0)], "PRESS(-1)+RELEASE(-1)+TRIGGERED()");
    h.sim_same(&[p(0), p(-1), r(-1), r(0)]);
    h.sim(
        &[p(-1), p(1), p(0), r(1), r(-1), r(0)],
        "PRESS(-1)+PRESS(1)+RELEASE(1)+RELEASE(-1)+TRIGGERED()",
    );
}

#[test]
fn test_single_key_with_many_modifiers() {
    let mut h = Harness::new();
    h.add_blocking(&[&[-2, -1, 0]]);
    h.sim_same(&[p(-2), p(-1), r(-1), p(0), r(0), p(-1), r(-1), r(-2)]);
    h.sim(
        &[p(-2), p(-1), p(0), r(0), r(-1), r(-2)],
        "PRESS(-2)+PRESS(-1)+TRIGGERED()+RELEASE(-1)+RELEASE(-2)",
    );
    h.sim(
        &[p(-1), p(-2), p(0), r(-2), r(-1), r(0)],
        "PRESS(-1)+PRESS(-2)+TRIGGERED()+RELEASE(-2)+RELEASE(-1)",
    );
    h.sim_same(&[p(-3), p(-2), p(-1), p(0), r(0), r(-1), r(-2), r(-3)]);
}

#[test]
fn test_pending_modifier_not_main_key() {
    let mut h = Harness::new();
    h.add_blocking(&[&[-1, 1]]);
    h.sim_same(&[p(-1), p(0), r(0), r(-1)]);
}

#[test]
fn test_single_keys_multistep() {
    let mut h = Harness::new();
    h.add_blocking(&[&[0], &[1]]);
    h.sim(&[p(0), r(0), p(1), r(1)], "TRIGGERED()");
    h.sim(&[p(0), p(1), r(0), r(1)], "TRIGGERED()");
    h.sim(
        &[p(0), r(0), p(-1), p(1), r(-1), r(1)],
        "PRESS(-1)+TRIGGERED()+RELEASE(-1)",
    );
    h.sim(
        &[p(0), r(0), p(2), r(2), p(0), r(0), p(1), r(1)],
        "PRESS(0)+RELEASE(0)+PRESS(2)+RELEASE(2)+TRIGGERED()",
    );
    h.sim(
        &[p(0), r(0), p(0), r(0), p(1), r(1)],
        "PRESS(0)+RELEASE(0)+TRIGGERED()",
    );
    h.sim(&[p(0), p(0), r(0), p(1), r(1)], "PRESS(0)+TRIGGERED()+RELEASE(0)");
    h.sim(
        &[p(0), p(0), r(0), p(2), r(2)],
        "PRESS(0)+PRESS(0)+RELEASE(0)+PRESS(2)+RELEASE(2)",
    );
}

#[test]
fn test_keys_with_modifiers_multistep() {
    for on_release in [false, true] {
        let mut h = Harness::new();
        if on_release {
            h.add_on_release(&[&[0], &[-1, 1]]);
        } else {
            h.add_blocking(&[&[0], &[-1, 1]]);
        }
        h.sim_same(&[p(0), r(0), p(1), r(1)]);
        h.sim_same(&[p(-1), p(0), r(0), p(1), r(1), r(-1)]);
        h.sim(
            &[p(0), r(0), p(-1), p(1), r(1), r(-1)],
            "PRESS(-1)+TRIGGERED()+RELEASE(-1)",
        );
        h.sim(
            &[p(0), r(0), p(-1), p(2), r(2), r(-1)],
            "PRESS(-1)+RELEASE(-1)+PRESS(0)+RELEASE(0)+PRESS(-1)+PRESS(2)+RELEASE(2)+RELEASE(-1)",
        );
    }
}

#[test]
fn test_single_key_on_release() {
    let mut h = Harness::new();
    h.add_on_release(&[&[0]]);
    h.sim_same(&[p(1), r(1)]);
    h.sim(&[p(0), r(0)], "TRIGGERED()");
    h.sim(
        &[p(0), r(0), p(1), r(1), p(0), r(0)],
        "TRIGGERED()+PRESS(1)+RELEASE(1)+TRIGGERED()",
    );
    h.sim(&[p(1), p(0), r(1), r(0)], "PRESS(1)+RELEASE(1)+TRIGGERED()");
    h.sim_same(&[p(-1), p(0), r(-1), r(0)]);
    h.sim(&[p(0), p(0), r(0)], "PRESS(0)+TRIGGERED()+RELEASE(0)");
}

#[test]
fn test_hotkey_trigger_order() {
    let mut h = Harness::new();
    h.add_hotkey(&[&[0]], HotkeyOptions::default(), 1000, Decision::Suppress);
    let on_release = HotkeyOptions {
        trigger_on_release: true,
        ..HotkeyOptions::default()
    };
    h.add_hotkey(&[&[0]], on_release, 2000, Decision::Suppress);
    h.add_hotkey(&[&[0]], HotkeyOptions::default(), 3000, Decision::Suppress);
    h.sim(&[p(0), r(0)], "TRIGGERED()+TRIGGERED(3000)+TRIGGERED(2000)");
}

#[test]
fn test_many_steps() {
    let mut h = Harness::new();
    h.add_blocking(&[&[0], &[0], &[0], &[1]]);
    h.sim(&[p(0), r(0), p(0), r(0), p(0), r(0), p(1), r(1)], "TRIGGERED()");
    h.sim(&[p(0), p(0), p(0), r(0), p(1), r(1)], "TRIGGERED()");
    h.sim(&[p(0), p(0), p(0), p(1), r(0), r(1)], "TRIGGERED()");
    h.sim(
        &[p(0), p(0), p(0), p(0), p(1), r(0), r(1)],
        "PRESS(0)+TRIGGERED()+RELEASE(0)",
    );
    h.sim(
        &[p(0), r(0), p(0), r(0), p(0), r(0), p(0), r(0), p(1), r(1)],
        "PRESS(0)+RELEASE(0)+TRIGGERED()",
    );
}

#[test]
fn test_hotkey_timeout() {
    let mut h = Harness::new();
    h.add_blocking(&[&[0], &[-1, 1]]);
    h.sim(
        &[
            p_at(0, 0.1),
            r_at(0, 0.2),
            p_at(-1, 0.5),
            p_at(1, 0.7),
            r_at(1, 0.8),
            r_at(-1, 0.9),
        ],
        "PRESS(-1)+TRIGGERED()+RELEASE(-1)",
    );
    h.sim(
        &[
            p_at(0, 1.0),
            r_at(0, 1.1),
            p_at(-1, 2.5),
            p_at(1, 2.6),
            r_at(1, 2.7),
            r_at(-1, 2.8),
        ],
        "PRESS(-1)+RELEASE(-1)+PRESS(0)+RELEASE(0)+PRESS(-1)+PRESS(1)+RELEASE(1)+RELEASE(-1)",
    );
}

#[test]
fn test_combo_hotkey() {
    let mut h = Harness::new();
    h.add_blocking(&[&[0, 1]]);
    h.sim(&[p(0), p(1), r(0), r(1)], "TRIGGERED()");
    h.sim(&[p(1), p(0), r(0), r(1)], "TRIGGERED()");
    h.sim_same(&[p(2), p(1), p(0), r(0), r(1), r(2)]);
    h.sim_same(&[p(-2), p(1), p(0), r(0), r(1), r(-2)]);
}

#[test]
fn test_combo_hotkey_callback_captures_value() {
    let mut h = Harness::new();
    h.add_hotkey(&[&[0, 1]], HotkeyOptions::default(), 1005, Decision::Suppress);
    h.sim(&[p(0), p(1)], "TRIGGERED(1005)");
}

#[test]
fn test_multistep_combo_hotkey() {
    let mut h = Harness::new();
    h.add_blocking(&[&[0], &[0, 1]]);
    h.sim(&[p(0), r(0), p(0), p(1), r(0), r(1)], "TRIGGERED()");
    h.sim(&[p(0), p(0), p(1), r(0), r(1)], "TRIGGERED()");
}

#[test]
fn test_multistep_combo_hotkey_repeated_press() {
    let mut h = Harness::new();
    h.add_blocking(&[&[0, 1], &[0]]);
    // The repeat of the first press is not part of the chord and goes through
    h.sim(
        &[p(0), p(0), p(1), p(0), r(0), r(1)],
        "PRESS(0)+TRIGGERED()+RELEASE(0)",
    );
}

#[test]
fn test_all_modifiers_combo() {
    let mut h = Harness::new();
    h.add_blocking(&[&[-1, -2]]);
    h.sim(&[p(-1), p(-2), r(-1), r(-2)], "TRIGGERED()");
    h.sim(
        &[p(-1), p(-2), p(0), r(0), r(-1), r(-2)],
        "TRIGGERED()+PRESS(0)+RELEASE(0)",
    );
}

#[test]
fn test_unhook_by_callback_twice() {
    let h = Harness::new();
    let keyboard = Keyboard::from_listener(h.listener.clone());
    let log = h.log.clone();
    let callback: Arc<dyn Fn(&KeyEvent) -> Decision + Send + Sync> = Arc::new(move |_: &KeyEvent| {
        log.lock().push("CALLED".to_string());
        Decision::Suppress
    });

    keyboard.hook_shared(callback.clone(), true);
    assert!(!h.listener.process_event(KeyEvent::down(code(0), 1.0)));
    assert_eq!(h.log.lock().len(), 1);

    assert!(keyboard.unhook(HookAlias::callback(&callback)));
    assert!(!keyboard.unhook(HookAlias::callback(&callback)));

    assert!(h.listener.process_event(KeyEvent::up(code(0), 1.1)));
    assert_eq!(h.log.lock().len(), 1);
}

#[test]
fn test_disable_handle_twice() {
    let h = Harness::new();
    let handle = h
        .listener
        .register(SingleKeyHook::new([code(0)], |_| Decision::Suppress), Vec::new(), true);

    assert!(!h.listener.process_event(KeyEvent::down(code(0), 1.0)));
    assert!(handle.disable());
    assert!(!handle.disable());
    assert!(h.listener.process_event(KeyEvent::down(code(0), 1.1)));
    assert_eq!(h.listener.hook_count(), 0);
    assert!(handle.enable());
    assert!(!h.listener.process_event(KeyEvent::down(code(0), 1.2)));
}

#[test]
fn test_disabling_hotkey_mid_sequence_replays_its_events() {
    let h = Harness::new();
    let first: &[ScanCode] = &[code(0)];
    let second: &[ScanCode] = &[code(1)];
    let steps: [&[&[ScanCode]]; 2] = [&[first], &[second]];
    let hotkey = Hotkey::from_scan_codes(&steps, &h.modifiers()).expect("valid hotkey");
    let log = h.log.clone();
    let handle = h.listener.register(
        HotkeyHook::new(hotkey, h.modifiers(), HotkeyOptions::default(), move || {
            log.lock().push("TRIGGERED()".to_string());
            Decision::Suppress
        }),
        Vec::new(),
        true,
    );

    assert!(!h.listener.process_event(KeyEvent::down(code(0), 1.0)));
    assert!(!h.listener.process_event(KeyEvent::up(code(0), 1.1)));
    assert_eq!(h.listener.suspended_count(), 2);

    assert!(handle.disable());
    assert!(h.listener.process_event(KeyEvent::down(code(1), 1.2)));
    assert_eq!(h.log.lock().join("+"), "PRESS(0)+RELEASE(0)");
    assert_eq!(h.listener.suspended_count(), 0);
}

/// Driver whose first synthesized press waits until released by the test
struct GatedDriver {
    entered: Mutex<Option<mpsc::Sender<()>>>,
    gate: Mutex<Option<mpsc::Receiver<()>>>,
}

impl KeyboardDriver for GatedDriver {
    fn init(&self) -> DriverResult<()> {
        Ok(())
    }

    fn listen(&self, _sink: EventSink) -> DriverResult<()> {
        Ok(())
    }

    fn press(&self, _code: ScanCode) -> DriverResult<()> {
        let entered = self.entered.lock().take();
        if let Some(entered) = entered {
            let _ = entered.send(());
        }
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        Ok(())
    }

    fn release(&self, _code: ScanCode) -> DriverResult<()> {
        Ok(())
    }

    fn map_name(&self, name: &str) -> DriverResult<Vec<(ScanCode, Vec<String>)>> {
        Err(DriverError::UnknownName(name.to_string()))
    }

    fn stop(&self) {}
}

#[test]
fn test_unhooked_send_overlapping_capture_keeps_hooks_running() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (gate_tx, gate_rx) = mpsc::channel();
    let driver = Arc::new(GatedDriver {
        entered: Mutex::new(Some(entered_tx)),
        gate: Mutex::new(Some(gate_rx)),
    });
    let modifiers: ModifierCodes = MODIFIERS.iter().map(|&c| ScanCode(c)).collect();
    let listener = Listener::with_modifiers(driver, modifiers);

    // The first event blocks inside the hook until told to carry on
    let (in_hook_tx, in_hook_rx) = mpsc::channel();
    let (resume_tx, resume_rx) = mpsc::channel::<()>();
    let mut first = Some((in_hook_tx, resume_rx));
    listener.register(
        SimpleHook::new(move |_| {
            if let Some((in_hook, resume)) = first.take() {
                let _ = in_hook.send(());
                let _ = resume.recv();
            }
            Decision::Suppress
        }),
        Vec::new(),
        true,
    );

    let capturing = listener.clone();
    let capture = thread::spawn(move || capturing.process_event(KeyEvent::down(code(0), 1.0)));
    in_hook_rx.recv().unwrap();

    let sending = listener.clone();
    let sender = thread::spawn(move || sending.send_unhooked(&[(EventType::Down, code(1))]));
    entered_rx.recv().unwrap();

    // Capture finishes first, then the unhooked send
    resume_tx.send(()).unwrap();
    assert!(!capture.join().unwrap());
    gate_tx.send(()).unwrap();
    sender.join().unwrap().unwrap();

    assert!(!listener.process_event(KeyEvent::down(code(2), 1.1)));
    assert!(listener.snapshot().physical.contains(code(2)));
}
