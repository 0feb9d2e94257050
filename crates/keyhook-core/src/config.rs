// Keyhook Configuration
// TOML hotkey configuration loaded by the command line tool

#![cfg(feature = "config")]

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::api::{self, Keyboard, KeyboardResult, WordOptions};
use crate::decision::Decision;
use crate::driver::KeyboardDriver;
use crate::hook::HotkeyOptions;
use crate::hotkey::{parse_hotkey, HotkeyParseError};
use crate::listener::HookHandle;
use crate::modifier::ModifierCodes;

/// Errors that can occur when loading a configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(String),

    #[error("Invalid hotkey {keys:?}: {source}")]
    Hotkey {
        keys: String,
        #[source]
        source: HotkeyParseError,
    },

    #[error("Hotkey {0:?} needs exactly one of send, write, command or log")]
    Action(String),
}

/// Defaults applied to every hotkey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub timeout: f64,
    pub suppress: bool,
    pub trigger_on_release: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let options = HotkeyOptions::default();
        Self {
            timeout: options.timeout,
            suppress: options.suppress,
            trigger_on_release: options.trigger_on_release,
        }
    }
}

/// Which input devices to capture
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Devices {
    /// Device names or paths; empty captures every keyboard
    pub only: Vec<String>,
}

/// What a configured hotkey does
#[derive(Debug, Clone, PartialEq)]
pub enum HotkeyAction {
    /// Send another hotkey in its place
    Send(String),
    /// Type text
    Write(String),
    /// Run a shell command
    Command(String),
    /// Log a message
    Log(String),
}

/// A `[[hotkey]]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HotkeyEntry {
    pub keys: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppress: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_on_release: Option<bool>,
}

impl HotkeyEntry {
    pub fn action(&self) -> Result<HotkeyAction, ConfigError> {
        let actions = [
            self.send.clone().map(HotkeyAction::Send),
            self.write.clone().map(HotkeyAction::Write),
            self.command.clone().map(HotkeyAction::Command),
            self.log.clone().map(HotkeyAction::Log),
        ];
        let mut set = actions.into_iter().flatten();
        match (set.next(), set.next()) {
            (Some(action), None) => Ok(action),
            _ => Err(ConfigError::Action(self.keys.clone())),
        }
    }

    /// Options for this hotkey, falling back to `settings`
    pub fn options(&self, settings: &Settings) -> HotkeyOptions {
        HotkeyOptions {
            suppress: self.suppress.unwrap_or(settings.suppress),
            timeout: self.timeout.unwrap_or(settings.timeout),
            trigger_on_release: self
                .trigger_on_release
                .unwrap_or(settings.trigger_on_release),
        }
    }
}

/// A `[[remap]]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemapEntry {
    pub from: String,
    pub to: String,
}

/// An `[[abbreviation]]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbbreviationEntry {
    pub from: String,
    pub to: String,
}

/// Hotkey configuration.
///
/// ```toml
/// [settings]
/// timeout = 1.5
///
/// [devices]
/// only = ["AT Translated Set 2 keyboard"]
///
/// [[hotkey]]
/// keys = "ctrl+alt+t"
/// command = "alacritty"
///
/// [[remap]]
/// from = "alt+w"
/// to = "ctrl+up"
///
/// [[abbreviation]]
/// from = "tm"
/// to = "™"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub settings: Settings,
    pub devices: Devices,
    #[serde(rename = "hotkey")]
    pub hotkeys: Vec<HotkeyEntry>,
    #[serde(rename = "remap")]
    pub remaps: Vec<RemapEntry>,
    #[serde(rename = "abbreviation")]
    pub abbreviations: Vec<AbbreviationEntry>,
    /// Path the configuration was loaded from
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path)?;
        let mut config = Self::from_toml(&content)?;
        config.source_path = Some(path.as_ref().to_path_buf());
        Ok(config)
    }

    /// Parse a configuration; hotkey actions are checked, key names are not
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Toml(e.to_string()))?;
        for entry in &config.hotkeys {
            entry.action()?;
        }
        Ok(config)
    }

    /// Default location (~/.config/keyhook/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("keyhook").join("config.toml"))
    }

    /// Load from the default location, or an empty configuration if missing
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::from_file(path);
            }
        }
        Ok(Self::default())
    }

    /// Check every hotkey string against the driver's key names
    pub fn validate(
        &self,
        driver: &dyn KeyboardDriver,
        modifiers: &ModifierCodes,
    ) -> Result<(), ConfigError> {
        let check = |keys: &str| {
            parse_hotkey(keys, driver, modifiers)
                .map(|_| ())
                .map_err(|source| ConfigError::Hotkey {
                    keys: keys.to_string(),
                    source,
                })
        };

        for entry in &self.hotkeys {
            check(&entry.keys)?;
            if let HotkeyAction::Send(target) = entry.action()? {
                check(&target)?;
            }
        }
        for remap in &self.remaps {
            check(&remap.from)?;
            check(&remap.to)?;
        }
        Ok(())
    }

    /// Register every hotkey, remap and abbreviation on `keyboard`
    pub fn install(&self, keyboard: &Keyboard) -> KeyboardResult<Vec<HookHandle>> {
        let mut handles = Vec::new();

        for entry in &self.hotkeys {
            let options = entry.options(&self.settings);
            let Ok(action) = entry.action() else {
                log::warn!("Skipping hotkey {:?} without a single action", entry.keys);
                continue;
            };
            let handle = match action {
                HotkeyAction::Send(target) => keyboard.remap_hotkey(&entry.keys, &target, options)?,
                HotkeyAction::Write(text) => {
                    let listener = keyboard.listener().downgrade();
                    keyboard.add_hotkey(
                        &entry.keys,
                        move || {
                            if let Some(listener) = listener.upgrade() {
                                if let Err(e) = api::write_with(&listener, &text, Duration::ZERO) {
                                    log::warn!("Failed to write text: {}", e);
                                }
                            }
                            Decision::Suppress
                        },
                        options,
                    )?
                }
                HotkeyAction::Command(command) => keyboard.add_hotkey(
                    &entry.keys,
                    move || {
                        if let Err(e) = run_command(&command) {
                            log::warn!("Failed to run {:?}: {}", command, e);
                        }
                        Decision::Suppress
                    },
                    options,
                )?,
                HotkeyAction::Log(message) => keyboard.add_hotkey(
                    &entry.keys,
                    move || {
                        log::info!("{}", message);
                        Decision::Suppress
                    },
                    options,
                )?,
            };
            handles.push(handle);
        }

        let remap_options = HotkeyOptions {
            suppress: true,
            ..self.settings_options()
        };
        for remap in &self.remaps {
            handles.push(keyboard.remap_hotkey(&remap.from, &remap.to, remap_options)?);
        }

        for abbreviation in &self.abbreviations {
            handles.push(keyboard.add_abbreviation(
                &abbreviation.from,
                &abbreviation.to,
                WordOptions::default(),
            ));
        }

        log::info!(
            "Installed {} hotkeys, {} remaps, {} abbreviations",
            self.hotkeys.len(),
            self.remaps.len(),
            self.abbreviations.len()
        );
        Ok(handles)
    }

    fn settings_options(&self) -> HotkeyOptions {
        HotkeyOptions {
            suppress: self.settings.suppress,
            timeout: self.settings.timeout,
            trigger_on_release: self.settings.trigger_on_release,
        }
    }
}

/// Start `sh -c command` and reap it on a background thread
fn run_command(command: &str) -> std::io::Result<JoinHandle<Option<ExitStatus>>> {
    let mut child = Command::new("sh").arg("-c").arg(command).spawn()?;
    log::debug!("Started {:?} (pid {})", command, child.id());
    let command = command.to_string();
    thread::Builder::new()
        .name("keyhook-command".to_string())
        .spawn(move || match child.wait() {
            Ok(status) => {
                if !status.success() {
                    log::warn!("{:?} exited with {}", command, status);
                }
                Some(status)
            }
            Err(e) => {
                log::warn!("Failed to wait for {:?}: {}", command, e);
                None
            }
        })
}
