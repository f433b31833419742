//! Side effects owned by the rest of the application
//!
//! The settings manager validates and applies some updates through
//! collaborators it does not implement: hotkey registration, proxy
//! configuration, i18n and OS autostart. They are invoked synchronously from
//! the mutating call and must finish before the setting counts as changed.

use crate::error::Result;
use crate::types::LangCode;

/// Collaborators consulted by [`SettingsManager`](crate::manager::SettingsManager).
pub trait SystemHooks {
    /// Whether `hotkey` can be registered (not taken by another program).
    fn is_hotkey_available(&self, hotkey: &str) -> bool;

    /// Point outgoing HTTP traffic at `url`, or go direct when `None`.
    fn update_proxy(&self, url: Option<&str>);

    /// Switch the active UI language. An error rejects the update.
    fn switch_language(&self, lang: &LangCode) -> Result<()>;

    /// Whether the OS currently launches the application at login.
    fn is_autostart(&self) -> Result<bool>;
}

/// Hooks for headless use: every hotkey is available, proxy and language
/// changes are only logged, autostart is reported as `autostart`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessHooks {
    pub autostart: bool,
}

impl SystemHooks for HeadlessHooks {
    fn is_hotkey_available(&self, _hotkey: &str) -> bool {
        true
    }

    fn update_proxy(&self, url: Option<&str>) {
        tracing::info!(url = url.unwrap_or(""), "Proxy update requested");
    }

    fn switch_language(&self, lang: &LangCode) -> Result<()> {
        tracing::info!(lang = %lang, "Language switch requested");
        Ok(())
    }

    fn is_autostart(&self) -> Result<bool> {
        Ok(self.autostart)
    }
}
