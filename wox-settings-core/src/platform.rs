//! Per-OS setting values
//!
//! Some settings (hotkeys, proxy, autostart, tool paths) carry one value per
//! operating system so a settings file synced between machines keeps each
//! machine's choice. [`PlatformValue`] stores all three variants; reads and
//! writes resolve against an explicit [`Os`].

use serde::{Deserialize, Serialize};

/// Operating system a value is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Windows,
    MacOs,
    Linux,
    /// Anything else; resolves like macOS.
    Other,
}

impl Os {
    /// The OS this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Os::Windows
        } else if cfg!(target_os = "macos") {
            Os::MacOs
        } else if cfg!(target_os = "linux") {
            Os::Linux
        } else {
            Os::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Windows => "windows",
            Os::MacOs => "macos",
            Os::Linux => "linux",
            Os::Other => "other",
        }
    }
}

/// A setting whose effective value depends on the running OS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformValue<T> {
    #[serde(rename = "WinValue")]
    pub win: T,
    #[serde(rename = "MacValue")]
    pub mac: T,
    #[serde(rename = "LinuxValue")]
    pub linux: T,
}

impl<T> PlatformValue<T> {
    pub fn new(win: T, mac: T, linux: T) -> Self {
        Self { win, mac, linux }
    }

    /// Variant for `os`. Unrecognized platforms read the macOS variant.
    pub fn resolve(&self, os: Os) -> &T {
        match os {
            Os::Windows => &self.win,
            Os::Linux => &self.linux,
            Os::MacOs | Os::Other => &self.mac,
        }
    }

    /// Replace only the variant for `os`; the other two are untouched.
    pub fn assign(&mut self, os: Os, value: T) {
        match os {
            Os::Windows => self.win = value,
            Os::Linux => self.linux = value,
            Os::MacOs | Os::Other => self.mac = value,
        }
    }

    /// Value for the running OS.
    pub fn get(&self) -> &T {
        self.resolve(Os::current())
    }

    /// Set the value for the running OS.
    pub fn set(&mut self, value: T) {
        self.assign(Os::current(), value)
    }
}

impl<T: Clone> PlatformValue<T> {
    /// Same value on every platform.
    pub fn uniform(value: T) -> Self {
        Self {
            win: value.clone(),
            mac: value.clone(),
            linux: value,
        }
    }
}
