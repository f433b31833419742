//! Settings manager
//!
//! Owns the in-memory [`GlobalSettings`] and [`AppData`] snapshots and keeps
//! them in the settings store. Constructed once at startup with
//! [`SettingsManager::init`] and handed to its consumers; calls must be
//! serialized by the owner (`&mut self` on every mutation).

use crate::error::{Error, Result};
use crate::hooks::SystemHooks;
use crate::platform::Os;
use crate::store::SettingStore;
use crate::types::{
    now_millis, AIProvider, ActionedResult, AppData, GlobalSettings, LangCode, Locale,
    PlainQuery, PluginSetting, PluginSettingDefinitions, QueryHistory, QueryHotkey,
    QueryShortcut, ResultHash,
};
use serde::Serialize;
use std::str::FromStr;

/// Setting that can be changed through [`SettingsManager::update_setting`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    EnableAutostart,
    MainHotkey,
    SelectionHotkey,
    UsePinYin,
    SwitchInputMethodABC,
    HideOnStart,
    HideOnLostFocus,
    ShowTray,
    LangCode,
    QueryMode,
    ShowPosition,
    ThemeId,
    QueryHotkeys,
    QueryShortcuts,
    AIProviders,
    EnableAutoBackup,
    EnableAutoUpdate,
    AppWidth,
    MaxResultCount,
    HttpProxyEnabled,
    HttpProxyUrl,
    CustomPythonPath,
    CustomNodejsPath,
}

impl SettingKey {
    pub const ALL: [SettingKey; 23] = [
        SettingKey::EnableAutostart,
        SettingKey::MainHotkey,
        SettingKey::SelectionHotkey,
        SettingKey::UsePinYin,
        SettingKey::SwitchInputMethodABC,
        SettingKey::HideOnStart,
        SettingKey::HideOnLostFocus,
        SettingKey::ShowTray,
        SettingKey::LangCode,
        SettingKey::QueryMode,
        SettingKey::ShowPosition,
        SettingKey::ThemeId,
        SettingKey::QueryHotkeys,
        SettingKey::QueryShortcuts,
        SettingKey::AIProviders,
        SettingKey::EnableAutoBackup,
        SettingKey::EnableAutoUpdate,
        SettingKey::AppWidth,
        SettingKey::MaxResultCount,
        SettingKey::HttpProxyEnabled,
        SettingKey::HttpProxyUrl,
        SettingKey::CustomPythonPath,
        SettingKey::CustomNodejsPath,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::EnableAutostart => "EnableAutostart",
            SettingKey::MainHotkey => "MainHotkey",
            SettingKey::SelectionHotkey => "SelectionHotkey",
            SettingKey::UsePinYin => "UsePinYin",
            SettingKey::SwitchInputMethodABC => "SwitchInputMethodABC",
            SettingKey::HideOnStart => "HideOnStart",
            SettingKey::HideOnLostFocus => "HideOnLostFocus",
            SettingKey::ShowTray => "ShowTray",
            SettingKey::LangCode => "LangCode",
            SettingKey::QueryMode => "QueryMode",
            SettingKey::ShowPosition => "ShowPosition",
            SettingKey::ThemeId => "ThemeId",
            SettingKey::QueryHotkeys => "QueryHotkeys",
            SettingKey::QueryShortcuts => "QueryShortcuts",
            SettingKey::AIProviders => "AIProviders",
            SettingKey::EnableAutoBackup => "EnableAutoBackup",
            SettingKey::EnableAutoUpdate => "EnableAutoUpdate",
            SettingKey::AppWidth => "AppWidth",
            SettingKey::MaxResultCount => "MaxResultCount",
            SettingKey::HttpProxyEnabled => "HttpProxyEnabled",
            SettingKey::HttpProxyUrl => "HttpProxyUrl",
            SettingKey::CustomPythonPath => "CustomPythonPath",
            SettingKey::CustomNodejsPath => "CustomNodejsPath",
        }
    }

    fn is_proxy(&self) -> bool {
        matches!(self, SettingKey::HttpProxyEnabled | SettingKey::HttpProxyUrl)
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        // older clients still send the pre-rename key
        if s == "LastQueryMode" {
            return Ok(SettingKey::QueryMode);
        }
        SettingKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| Error::UnknownSettingKey(s.to_string()))
    }
}

/// Settings service for the running application.
pub struct SettingsManager {
    store: SettingStore,
    hooks: Box<dyn SystemHooks>,
    os: Os,
    settings: GlobalSettings,
    app_data: AppData,
}

impl SettingsManager {
    /// Load both snapshots from `store` and reconcile the autostart setting
    /// with the OS.
    ///
    /// Missing or undecodable keys take the defaults for `locale`. App data
    /// that cannot be read is replaced by an empty history.
    pub fn init(
        store: SettingStore,
        hooks: Box<dyn SystemHooks>,
        os: Os,
        locale: &Locale,
    ) -> Result<Self> {
        let defaults = GlobalSettings::defaults(locale);
        let mut settings = store.core().load_snapshot(&defaults)?;
        settings.backfill_empty(&defaults, os);

        let app_data = match store.core().load_snapshot(&AppData::default()) {
            Ok(mut data) => {
                data.sort_histories();
                data
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load app data, using empty history");
                AppData::default()
            }
        };

        let mut manager = Self {
            store,
            hooks,
            os,
            settings,
            app_data,
        };
        manager.reconcile_autostart();

        tracing::info!(
            os = os.as_str(),
            query_histories = manager.app_data.query_histories.len(),
            "Settings manager initialized"
        );
        Ok(manager)
    }

    /// Flush both snapshots and release the store.
    pub fn shutdown(mut self) -> Result<()> {
        self.save_settings()?;
        self.save_app_data()?;
        tracing::info!("Settings manager shut down");
        Ok(())
    }

    fn reconcile_autostart(&mut self) {
        let actual = match self.hooks.is_autostart() {
            Ok(actual) => actual,
            Err(e) => {
                tracing::error!(error = %e, "Failed to check autostart status");
                return;
            }
        };

        let configured = *self.settings.enable_autostart.resolve(self.os);
        if actual == configured {
            return;
        }

        tracing::warn!(configured, actual, "Autostart setting mismatch, updating config");
        self.settings.enable_autostart.assign(self.os, actual);
        if let Err(e) = self.save_settings() {
            tracing::error!(error = %e, "Failed to save updated autostart setting");
        }
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    pub fn app_data(&self) -> &AppData {
        &self.app_data
    }

    pub fn os(&self) -> Os {
        self.os
    }

    /// Validate and apply one setting change, then persist the whole
    /// snapshot.
    ///
    /// On error nothing is changed, in memory or in the store.
    pub fn update_setting(&mut self, key: SettingKey, value: &str) -> Result<()> {
        let mut updated = self.settings.clone();
        self.apply(&mut updated, key, value)?;

        if let Err(e) = save_snapshot(&mut self.store, &updated) {
            if key == SettingKey::LangCode {
                self.restore_language();
            }
            return Err(e);
        }
        self.settings = updated;
        tracing::info!(key = %key, "Setting updated");

        if key.is_proxy() {
            self.update_proxy();
        }
        Ok(())
    }

    /// Switch the UI back to the persisted language after a failed save.
    fn restore_language(&self) {
        let lang = &self.settings.lang_code;
        if let Err(e) = self.hooks.switch_language(lang) {
            tracing::error!(lang = %lang, error = %e, "Failed to restore language");
        }
    }

    /// [`update_setting`](Self::update_setting) with a key name as received
    /// from a client.
    pub fn update_setting_str(&mut self, key: &str, value: &str) -> Result<()> {
        let key = key.parse::<SettingKey>()?;
        self.update_setting(key, value)
    }

    fn apply(&self, settings: &mut GlobalSettings, key: SettingKey, value: &str) -> Result<()> {
        let os = self.os;
        match key {
            SettingKey::EnableAutostart => {
                settings.enable_autostart.assign(os, parse_bool(key, value)?)
            }
            SettingKey::MainHotkey => {
                self.check_hotkey(value)?;
                settings.main_hotkey.assign(os, value.to_string());
            }
            SettingKey::SelectionHotkey => {
                self.check_hotkey(value)?;
                settings.selection_hotkey.assign(os, value.to_string());
            }
            SettingKey::UsePinYin => settings.use_pin_yin = parse_bool(key, value)?,
            SettingKey::SwitchInputMethodABC => {
                settings.switch_input_method_abc = parse_bool(key, value)?
            }
            SettingKey::HideOnStart => settings.hide_on_start = parse_bool(key, value)?,
            SettingKey::HideOnLostFocus => settings.hide_on_lost_focus = parse_bool(key, value)?,
            SettingKey::ShowTray => settings.show_tray = parse_bool(key, value)?,
            SettingKey::LangCode => {
                let lang = LangCode::new(value);
                self.hooks.switch_language(&lang)?;
                settings.lang_code = lang;
            }
            SettingKey::QueryMode => settings.query_mode = value.to_string(),
            SettingKey::ShowPosition => settings.show_position = value.to_string(),
            SettingKey::ThemeId => settings.theme_id = value.to_string(),
            SettingKey::QueryHotkeys => {
                let hotkeys: Vec<QueryHotkey> = serde_json::from_str(value)?;
                settings.query_hotkeys.assign(os, hotkeys);
            }
            SettingKey::QueryShortcuts => {
                let shortcuts: Vec<QueryShortcut> = serde_json::from_str(value)?;
                settings.query_shortcuts = shortcuts;
            }
            SettingKey::AIProviders => {
                let providers: Vec<AIProvider> = serde_json::from_str(value)?;
                settings.ai_providers = providers;
            }
            SettingKey::EnableAutoBackup => settings.enable_auto_backup = parse_bool(key, value)?,
            SettingKey::EnableAutoUpdate => settings.enable_auto_update = parse_bool(key, value)?,
            SettingKey::AppWidth => settings.app_width = value.parse::<i64>()?,
            SettingKey::MaxResultCount => settings.max_result_count = value.parse::<i64>()?,
            SettingKey::HttpProxyEnabled => {
                settings.http_proxy_enabled.assign(os, parse_bool(key, value)?)
            }
            SettingKey::HttpProxyUrl => settings.http_proxy_url.assign(os, value.to_string()),
            SettingKey::CustomPythonPath => {
                settings.custom_python_path.assign(os, value.to_string())
            }
            SettingKey::CustomNodejsPath => {
                settings.custom_nodejs_path.assign(os, value.to_string())
            }
        }
        Ok(())
    }

    /// Empty clears the hotkey and needs no check.
    fn check_hotkey(&self, hotkey: &str) -> Result<()> {
        if hotkey.is_empty() || self.hooks.is_hotkey_available(hotkey) {
            Ok(())
        } else {
            Err(Error::HotkeyUnavailable(hotkey.to_string()))
        }
    }

    fn update_proxy(&self) {
        let enabled = *self.settings.http_proxy_enabled.resolve(self.os);
        let url = self.settings.http_proxy_url.resolve(self.os);
        let target = (enabled && !url.is_empty()).then_some(url.as_str());
        tracing::info!(url = target.unwrap_or(""), "Updating HTTP proxy");
        self.hooks.update_proxy(target);
    }

    /// Overwrite every stored setting key with the in-memory snapshot.
    pub fn save_settings(&mut self) -> Result<()> {
        save_snapshot(&mut self.store, &self.settings)?;
        tracing::debug!("Settings saved");
        Ok(())
    }

    // ============================================
    // Usage History
    // ============================================

    /// Record a query. Empty queries are ignored.
    pub fn add_query_history(&mut self, query: PlainQuery) -> Result<()> {
        if query.is_empty() {
            return Ok(());
        }

        tracing::debug!(query = %query.query_text, "Adding query history");
        self.app_data.push_query(QueryHistory {
            query,
            timestamp: now_millis(),
        });
        self.save_app_data()
    }

    /// Up to `n` most recent queries, newest first.
    pub fn latest_query_history(&self, n: usize) -> Vec<QueryHistory> {
        self.app_data.latest_queries(n)
    }

    pub fn add_actioned_result(
        &mut self,
        plugin_id: &str,
        title: &str,
        subtitle: &str,
        query: &str,
    ) -> Result<()> {
        let hash = ResultHash::new(plugin_id, title, subtitle);
        self.app_data.push_actioned(
            hash,
            ActionedResult {
                timestamp: now_millis(),
                query: query.to_string(),
            },
        );
        self.save_app_data()
    }

    pub fn add_favorite_result(
        &mut self,
        plugin_id: &str,
        title: &str,
        subtitle: &str,
    ) -> Result<()> {
        tracing::info!(title, subtitle, "Adding favorite result");
        let hash = ResultHash::new(plugin_id, title, subtitle);
        self.app_data.favorite_results.insert(hash, true);
        self.save_app_data()
    }

    pub fn is_favorite_result(&self, plugin_id: &str, title: &str, subtitle: &str) -> bool {
        let hash = ResultHash::new(plugin_id, title, subtitle);
        self.app_data.favorite_results.contains_key(&hash)
    }

    pub fn remove_favorite_result(
        &mut self,
        plugin_id: &str,
        title: &str,
        subtitle: &str,
    ) -> Result<()> {
        tracing::info!(title, subtitle, "Removing favorite result");
        let hash = ResultHash::new(plugin_id, title, subtitle);
        self.app_data.favorite_results.remove(&hash);
        self.save_app_data()
    }

    /// Overwrite the stored app data with the in-memory snapshot.
    pub fn save_app_data(&mut self) -> Result<()> {
        save_snapshot(&mut self.store, &self.app_data)?;
        tracing::debug!("App data saved");
        Ok(())
    }

    // ============================================
    // Plugin Settings
    // ============================================

    /// Stored settings of a plugin, with every declared default the user has
    /// not set filled in. The returned name is always `plugin_name`.
    pub fn load_plugin_setting(
        &self,
        plugin_id: &str,
        plugin_name: &str,
        definitions: &PluginSettingDefinitions,
    ) -> Result<PluginSetting> {
        let mut settings = self.store.plugin(plugin_id).all()?;
        for (key, value) in definitions.all_defaults() {
            settings.entry(key).or_insert(value);
        }

        Ok(PluginSetting {
            name: plugin_name.to_string(),
            settings,
        })
    }

    /// Replace the stored settings of a plugin.
    pub fn save_plugin_setting(&mut self, plugin_id: &str, setting: &PluginSetting) -> Result<()> {
        let tx = self.store.transaction()?;
        {
            let namespace = tx.plugin(plugin_id);
            namespace.clear()?;
            for (key, value) in &setting.settings {
                namespace.set_raw(key, value)?;
            }
        }
        tx.commit()?;

        tracing::info!(plugin = plugin_id, keys = setting.settings.len(), "Plugin setting saved");
        Ok(())
    }
}

/// Rewrite every top-level key of `snapshot` in one transaction.
fn save_snapshot<T: Serialize>(store: &mut SettingStore, snapshot: &T) -> Result<usize> {
    let tx = store.transaction()?;
    let written = tx.core().write_snapshot(snapshot)?;
    tx.commit()?;
    Ok(written)
}

fn parse_bool(key: SettingKey, value: &str) -> Result<bool> {
    value.parse::<bool>().map_err(|e| Error::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}
