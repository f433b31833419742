//! Core domain types for wox-settings
//!
//! Two independent snapshots make up the persisted state:
//!
//! | Type | Holds | Essential |
//! |------|-------|-----------|
//! | [`GlobalSettings`] | Application configuration (hotkeys, language, theme, proxy, ...) | yes |
//! | [`AppData`] | Usage history: queries, actioned results, favorites | no, falls back to empty |
//!
//! Per-plugin settings ([`PluginSetting`]) live in their own namespace and are
//! loaded lazily. Results of plugins are identified by a [`ResultHash`] so
//! history and favorites never store whole result objects.

use crate::platform::{Os, PlatformValue};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Maximum number of query history entries kept.
pub const MAX_QUERY_HISTORY: usize = 100;

/// Maximum number of actioned-result entries kept per result.
pub const MAX_ACTIONED_RESULTS: usize = 100;

/// Theme selected on first run.
pub const DEFAULT_THEME_ID: &str = "e4006bd3-6bfe-4020-8d1c-4c32a8e567e5";

/// Current time as unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Deserialize an explicit `null` as the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================
// Language & Locale
// ============================================

/// UI language identifier, e.g. `en_US`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LangCode(String);

impl LangCode {
    pub const EN_US: &'static str = "en_US";
    pub const ZH_CN: &'static str = "zh_CN";

    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for LangCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// System locale, used only to pick first-run defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(String);

impl Locale {
    pub fn new(locale: impl Into<String>) -> Self {
        Self(locale.into())
    }

    /// Read the locale from `LC_ALL`, `LC_MESSAGES` or `LANG`, in that order.
    pub fn detect() -> Self {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty())
            .map(Self)
            .unwrap_or_default()
    }

    /// Simplified Chinese (`zh_CN`, `zh-CN`, `zh_CN.UTF-8`, ...)
    pub fn is_zh_cn(&self) -> bool {
        let normalized = self.0.replace('-', "_").to_ascii_lowercase();
        normalized.starts_with("zh_cn")
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self(LangCode::EN_US.to_string())
    }
}

// ============================================
// Global Settings
// ============================================

/// Hotkey that opens the launcher with a preset query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QueryHotkey {
    pub hotkey: String,
    pub query: String,
    pub is_silent_execution: bool,
}

/// Short alias that expands into a longer query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QueryShortcut {
    pub shortcut: String,
    pub query: String,
}

/// Credentials for one AI provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AIProvider {
    pub name: String,
    pub api_key: String,
    pub host: String,
}

/// Whole-application configuration.
///
/// Serialized field names are the persisted setting keys, shared by the
/// legacy JSON file and the settings store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GlobalSettings {
    pub enable_autostart: PlatformValue<bool>,
    pub main_hotkey: PlatformValue<String>,
    pub selection_hotkey: PlatformValue<String>,
    pub use_pin_yin: bool,
    #[serde(rename = "SwitchInputMethodABC")]
    pub switch_input_method_abc: bool,
    pub hide_on_start: bool,
    pub hide_on_lost_focus: bool,
    pub show_tray: bool,
    pub lang_code: LangCode,
    /// Previous query handling when the window reopens (`empty`, `preserve`, ...)
    pub query_mode: String,
    /// Where the window appears (`mouse_screen`, `active_screen`, `last_location`)
    pub show_position: String,
    pub enable_auto_backup: bool,
    pub enable_auto_update: bool,
    pub custom_python_path: PlatformValue<String>,
    pub custom_nodejs_path: PlatformValue<String>,
    pub http_proxy_enabled: PlatformValue<bool>,
    pub http_proxy_url: PlatformValue<String>,
    pub app_width: i64,
    pub max_result_count: i64,
    pub theme_id: String,
    pub last_window_x: i64,
    pub last_window_y: i64,
    pub query_hotkeys: PlatformValue<Vec<QueryHotkey>>,
    pub query_shortcuts: Vec<QueryShortcut>,
    #[serde(rename = "AIProviders")]
    pub ai_providers: Vec<AIProvider>,
}

impl GlobalSettings {
    /// First-run settings; Chinese locales get pinyin matching and zh_CN.
    pub fn defaults(locale: &Locale) -> Self {
        let zh_cn = locale.is_zh_cn();
        let lang_code = if zh_cn {
            LangCode::ZH_CN
        } else {
            LangCode::EN_US
        };

        Self {
            enable_autostart: PlatformValue::uniform(false),
            main_hotkey: PlatformValue::new(
                "alt+space".to_string(),
                "command+space".to_string(),
                "ctrl+ctrl".to_string(),
            ),
            selection_hotkey: PlatformValue::new(
                "win+alt+space".to_string(),
                "command+option+space".to_string(),
                "ctrl+shift+j".to_string(),
            ),
            use_pin_yin: zh_cn,
            switch_input_method_abc: zh_cn,
            hide_on_start: false,
            hide_on_lost_focus: true,
            show_tray: true,
            lang_code: LangCode::new(lang_code),
            query_mode: "empty".to_string(),
            show_position: "mouse_screen".to_string(),
            enable_auto_backup: true,
            enable_auto_update: true,
            custom_python_path: PlatformValue::default(),
            custom_nodejs_path: PlatformValue::default(),
            http_proxy_enabled: PlatformValue::uniform(false),
            http_proxy_url: PlatformValue::default(),
            app_width: 800,
            max_result_count: 10,
            theme_id: DEFAULT_THEME_ID.to_string(),
            last_window_x: -1,
            last_window_y: -1,
            query_hotkeys: PlatformValue::default(),
            query_shortcuts: Vec::new(),
            ai_providers: Vec::new(),
        }
    }

    /// Re-default fields that an older settings file left at their zero value.
    ///
    /// Hotkeys are checked and restored for `os` only.
    pub fn backfill_empty(&mut self, defaults: &GlobalSettings, os: Os) {
        if self.main_hotkey.resolve(os).is_empty() {
            self.main_hotkey
                .assign(os, defaults.main_hotkey.resolve(os).clone());
        }
        if self.selection_hotkey.resolve(os).is_empty() {
            self.selection_hotkey
                .assign(os, defaults.selection_hotkey.resolve(os).clone());
        }
        if self.lang_code.is_empty() {
            self.lang_code = defaults.lang_code.clone();
        }
        if self.query_mode.is_empty() {
            self.query_mode = defaults.query_mode.clone();
        }
        if self.app_width == 0 {
            self.app_width = defaults.app_width;
        }
        if self.max_result_count == 0 {
            self.max_result_count = defaults.max_result_count;
        }
        if self.theme_id.is_empty() {
            self.theme_id = defaults.theme_id.clone();
        }
    }

    /// Overlay a partial JSON object on `defaults`, field by field.
    ///
    /// Keys missing from `partial`, `null` values and values of the wrong type
    /// keep their default; other keys replace it verbatim. Unknown keys are
    /// ignored.
    pub fn overlay(
        defaults: &GlobalSettings,
        partial: serde_json::Map<String, serde_json::Value>,
    ) -> crate::error::Result<Self> {
        crate::store::repo::overlay_fields(defaults, partial)
    }
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self::defaults(&Locale::default())
    }
}

// ============================================
// Usage History
// ============================================

/// Stable identity of a plugin result, derived from plugin id, title and
/// subtitle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultHash(String);

impl ResultHash {
    pub fn new(plugin_id: &str, title: &str, subtitle: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(plugin_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(title.as_bytes());
        hasher.update([0u8]);
        hasher.update(subtitle.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResultHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A query as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PlainQuery {
    #[serde(deserialize_with = "null_as_default")]
    pub query_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub query_text: String,
}

impl PlainQuery {
    pub const INPUT: &'static str = "input";

    /// Text query typed into the input box
    pub fn input(text: impl Into<String>) -> Self {
        Self {
            query_type: Self::INPUT.to_string(),
            query_text: text.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.query_text.is_empty()
    }
}

impl Default for PlainQuery {
    fn default() -> Self {
        Self::input("")
    }
}

/// One query event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryHistory {
    #[serde(default, deserialize_with = "null_as_default")]
    pub query: PlainQuery,
    /// Unix milliseconds
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: i64,
}

/// One "user acted on a result" event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionedResult {
    /// Unix milliseconds
    pub timestamp: i64,
    /// Query that produced the result
    pub query: String,
}

/// Usage history, persisted independently of [`GlobalSettings`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AppData {
    /// Oldest first
    pub query_histories: Vec<QueryHistory>,
    pub actioned_results: BTreeMap<ResultHash, Vec<ActionedResult>>,
    pub favorite_results: BTreeMap<ResultHash, bool>,
}

impl AppData {
    /// Append a query, evicting the oldest beyond [`MAX_QUERY_HISTORY`].
    pub fn push_query(&mut self, entry: QueryHistory) {
        self.query_histories.push(entry);
        truncate_oldest(&mut self.query_histories, MAX_QUERY_HISTORY);
    }

    /// Append an actioned result, evicting the oldest beyond
    /// [`MAX_ACTIONED_RESULTS`] for that hash.
    pub fn push_actioned(&mut self, hash: ResultHash, entry: ActionedResult) {
        let entries = self.actioned_results.entry(hash).or_default();
        entries.push(entry);
        truncate_oldest(entries, MAX_ACTIONED_RESULTS);
    }

    /// Up to `n` most recent queries, newest first.
    pub fn latest_queries(&self, n: usize) -> Vec<QueryHistory> {
        self.query_histories
            .iter()
            .rev()
            .take(n)
            .cloned()
            .collect()
    }

    pub fn sort_histories(&mut self) {
        self.query_histories.sort_by_key(|h| h.timestamp);
    }
}

fn truncate_oldest<T>(entries: &mut Vec<T>, max: usize) {
    if entries.len() > max {
        let excess = entries.len() - max;
        entries.drain(..excess);
    }
}

// ============================================
// Plugin Settings
// ============================================

/// Settings blob of one plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PluginSetting {
    /// Display name of the plugin
    pub name: String,
    pub settings: BTreeMap<String, String>,
}

/// One entry of a plugin's declared settings form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Type", rename_all = "lowercase")]
pub enum PluginSettingDefinition {
    Textbox {
        key: String,
        default_value: String,
    },
    Checkbox {
        key: String,
        default_value: bool,
    },
    Select {
        key: String,
        default_value: String,
        options: Vec<String>,
    },
    /// Static text, no value
    Label { content: String },
    /// Layout break, no value
    Newline,
}

impl PluginSettingDefinition {
    /// Key and default value, for entries that hold a value.
    pub fn default_entry(&self) -> Option<(&str, String)> {
        match self {
            PluginSettingDefinition::Textbox { key, default_value }
            | PluginSettingDefinition::Select {
                key, default_value, ..
            } => Some((key.as_str(), default_value.clone())),
            PluginSettingDefinition::Checkbox { key, default_value } => {
                Some((key.as_str(), default_value.to_string()))
            }
            PluginSettingDefinition::Label { .. } | PluginSettingDefinition::Newline => None,
        }
    }
}

/// Declared settings form of a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginSettingDefinitions(pub Vec<PluginSettingDefinition>);

impl PluginSettingDefinitions {
    pub fn all_defaults(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .filter_map(PluginSettingDefinition::default_entry)
            .map(|(key, value)| (key.to_string(), value))
            .collect()
    }
}

// ============================================
// Clipboard Favorites
// ============================================

/// Clipboard favorite in the unified shape produced by migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteClipboardItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    /// Unix milliseconds
    pub timestamp: i64,
    /// Unix seconds
    pub created_at: i64,
}
