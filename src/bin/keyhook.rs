// Keyhook CLI
// Runs configured hotkeys, remaps and abbreviations on grabbed evdev keyboards

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;

use keyhook_core::{Config, Decision, EvdevDriver, KeyEvent, Keyboard};

/// Global keyboard hotkeys for Linux
#[derive(Parser, Debug)]
#[command(name = "keyhook")]
#[command(version)]
#[command(about = "Global keyboard hotkeys, remaps and abbreviations", long_about = None)]
struct Args {
    /// TOML configuration file (defaults to ~/.config/keyhook/config.toml)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Only grab these devices, by name or path (can be used multiple times)
    #[arg(short, long, value_name = "DEVICE")]
    devices: Vec<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Validate config and exit
    #[arg(long)]
    check_config: bool,

    /// List available keyboard devices
    #[arg(long)]
    list_devices: bool,

    /// Print every key event as a JSON line until interrupted
    #[arg(long, conflicts_with = "play")]
    record: bool,

    /// Replay JSON lines read from stdin
    #[arg(long)]
    play: bool,

    /// Playback speed factor; zero replays as fast as possible
    #[arg(long, default_value_t = 1.0, requires = "play")]
    speed: f64,
}

impl Args {
    fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// CLI devices win over the configuration's `[devices] only`
    fn device_filter(&self, config: &Config) -> Vec<String> {
        if self.devices.is_empty() {
            config.devices.only.clone()
        } else {
            self.devices.clone()
        }
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Config::load_default().context("Failed to load default config"),
    }
}

fn list_devices() -> anyhow::Result<()> {
    let devices = EvdevDriver::list_devices().context("Failed to enumerate input devices")?;
    println!("Found {} keyboard device(s):", devices.len());
    for (index, device) in devices.iter().enumerate() {
        match &device.path {
            Some(path) => println!("  {}: {} ({})", index, device.name, path),
            None => println!("  {}: {}", index, device.name),
        }
    }
    Ok(())
}

/// Flag cleared on SIGINT or SIGTERM
fn shutdown_flag() -> anyhow::Result<Arc<AtomicBool>> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let running = Arc::new(AtomicBool::new(true));
    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handler")?;
    let flag = running.clone();
    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            log::info!("Received signal {}, shutting down", signal);
            flag.store(false, Ordering::SeqCst);
        }
    });
    Ok(running)
}

fn wait_for_shutdown(running: &AtomicBool) {
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }
}

fn record(keyboard: &Keyboard, running: &AtomicBool) -> anyhow::Result<()> {
    keyboard.hook(
        |event: &KeyEvent| {
            match event.to_json() {
                Ok(line) => {
                    let mut stdout = io::stdout().lock();
                    if writeln!(stdout, "{}", line).and_then(|_| stdout.flush()).is_err() {
                        log::warn!("Failed to write event record");
                    }
                }
                Err(e) => log::warn!("Failed to encode {}: {}", event, e),
            }
            Decision::Allow
        },
        false,
    );
    keyboard.start().context("Failed to start listening")?;
    log::info!("Recording, press Ctrl+C to stop");
    wait_for_shutdown(running);
    keyboard.stop()?;
    Ok(())
}

fn play(keyboard: &Keyboard, speed: f64) -> anyhow::Result<()> {
    let mut events = Vec::new();
    for (number, line) in io::stdin().lock().lines().enumerate() {
        let line = line.context("Failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let event = KeyEvent::from_json(&line)
            .with_context(|| format!("Invalid event record on line {}", number + 1))?;
        events.push(event);
    }
    log::info!("Playing {} events", events.len());
    keyboard.play(&events, speed)?;
    Ok(())
}

fn run(args: Args) -> anyhow::Result<()> {
    if args.list_devices {
        return list_devices();
    }

    let config = load_config(&args)?;
    let driver = Arc::new(EvdevDriver::new(args.device_filter(&config)));
    let keyboard = Keyboard::new(driver.clone());

    config
        .validate(driver.as_ref(), keyboard.listener().modifiers())
        .context("Invalid configuration")?;
    if args.check_config {
        println!("Configuration is valid");
        return Ok(());
    }

    if args.play {
        return play(&keyboard, args.speed);
    }

    let running = shutdown_flag()?;
    if args.record {
        return record(&keyboard, &running);
    }

    let handles = config.install(&keyboard).context("Failed to install hotkeys")?;
    if handles.is_empty() {
        bail!("Nothing to do: the configuration has no hotkeys, remaps or abbreviations");
    }
    log::info!("Installed {} hook(s)", handles.len());

    keyboard.start().context("Failed to start listening")?;
    wait_for_shutdown(&running);
    keyboard.stop()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_filter()))
        .init();
    run(args)
}
