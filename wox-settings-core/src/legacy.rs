//! Legacy JSON settings files
//!
//! Before the settings store existed, state lived in JSON files in the
//! settings directory. Loading never fails: a missing, unreadable or corrupt
//! file yields defaults, and an older file is back-filled field by field.

use crate::platform::Os;
use crate::types::{null_as_default, GlobalSettings, QueryHistory, ResultHash};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Key the global settings file used before it was renamed to `QueryMode`.
const LEGACY_QUERY_MODE_KEY: &str = "LastQueryMode";

/// Usage history as stored in `wox.app.data.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LegacyAppData {
    #[serde(deserialize_with = "null_as_default")]
    pub query_histories: Vec<QueryHistory>,
    /// `None` when the file has no favorites map at all
    pub favorite_results: Option<BTreeMap<ResultHash, bool>>,
}

/// Settings blob as stored in `<pluginId>.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LegacyPluginSetting {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub settings: BTreeMap<String, String>,
}

/// Load the legacy global settings file over `defaults`.
pub fn load_settings(path: &Path, defaults: &GlobalSettings, os: Os) -> GlobalSettings {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No legacy settings file");
        return defaults.clone();
    }

    match read_settings(path, defaults) {
        Ok(mut settings) => {
            settings.backfill_empty(defaults, os);
            tracing::info!(path = %path.display(), "Loaded legacy settings file");
            settings
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to load legacy settings file, using defaults"
            );
            defaults.clone()
        }
    }
}

fn read_settings(path: &Path, defaults: &GlobalSettings) -> crate::error::Result<GlobalSettings> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(defaults.clone());
    }

    let mut partial: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&content)?;
    if let Some(query_mode) = partial.remove(LEGACY_QUERY_MODE_KEY) {
        let current = partial
            .entry("QueryMode")
            .or_insert(serde_json::Value::Null);
        if current.is_null() {
            *current = query_mode;
        }
    }

    Ok(GlobalSettings::overlay(defaults, partial)?)
}

/// Load the legacy app-data file. App data is not essential, so any failure
/// yields an empty history.
pub fn load_app_data(path: &Path) -> LegacyAppData {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No legacy app data file");
        return LegacyAppData::default();
    }

    let parsed = std::fs::read_to_string(path)
        .map_err(crate::error::Error::from)
        .and_then(|content| {
            if content.trim().is_empty() {
                Ok(LegacyAppData::default())
            } else {
                Ok(serde_json::from_str::<LegacyAppData>(&content)?)
            }
        });

    match parsed {
        Ok(mut data) => {
            data.query_histories.sort_by_key(|h| h.timestamp);
            data
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to load legacy app data file, using empty history"
            );
            LegacyAppData::default()
        }
    }
}

/// Parse one plugin settings file.
pub fn load_plugin_setting(path: &Path) -> crate::error::Result<LegacyPluginSetting> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformValue;
    use crate::types::{LangCode, Locale, DEFAULT_THEME_ID};
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let defaults = GlobalSettings::default();
        let loaded = load_settings(&dir.path().join("nope.json"), &defaults, Os::Linux);
        assert_eq!(loaded, defaults);
    }

    #[test]
    fn test_corrupt_file_yields_locale_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "wox.setting.json", "{not json");
        let defaults = GlobalSettings::defaults(&Locale::new("zh_CN.UTF-8"));
        let loaded = load_settings(&path, &defaults, Os::Linux);
        assert!(loaded.use_pin_yin);
        assert_eq!(loaded.lang_code.as_str(), LangCode::ZH_CN);
    }

    #[test]
    fn test_present_fields_preserved_missing_fields_defaulted() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "wox.setting.json",
            r#"{
                "ShowTray": false,
                "AppWidth": 1024,
                "LastQueryMode": "preserve",
                "HttpProxyUrl": {"WinValue": "w", "MacValue": "m", "LinuxValue": "l"},
                "QueryShortcuts": [{"Shortcut": "gh", "Query": "github"}]
            }"#,
        );
        let defaults = GlobalSettings::default();
        let loaded = load_settings(&path, &defaults, Os::Linux);

        assert!(!loaded.show_tray);
        assert_eq!(loaded.app_width, 1024);
        assert_eq!(loaded.query_mode, "preserve");
        assert_eq!(
            loaded.http_proxy_url,
            PlatformValue::new("w".to_string(), "m".to_string(), "l".to_string())
        );
        assert_eq!(loaded.query_shortcuts.len(), 1);
        assert_eq!(loaded.max_result_count, defaults.max_result_count);
        assert_eq!(loaded.theme_id, defaults.theme_id);
        assert_eq!(loaded.main_hotkey, defaults.main_hotkey);
        assert_eq!(loaded.last_window_x, -1);
    }

    #[test]
    fn test_zero_values_are_backfilled() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "wox.setting.json",
            r#"{
                "MainHotkey": {"WinValue": "", "MacValue": "", "LinuxValue": ""},
                "LangCode": "",
                "AppWidth": 0,
                "MaxResultCount": 0,
                "ThemeId": ""
            }"#,
        );
        let loaded = load_settings(&path, &GlobalSettings::default(), Os::Linux);
        assert_eq!(loaded.main_hotkey.linux, "ctrl+ctrl");
        assert_eq!(loaded.main_hotkey.win, "");
        assert_eq!(loaded.lang_code.as_str(), LangCode::EN_US);
        assert_eq!(loaded.app_width, 800);
        assert_eq!(loaded.max_result_count, 10);
        assert_eq!(loaded.theme_id, DEFAULT_THEME_ID);
    }

    #[test]
    fn test_app_data_sorted_and_favorites_tracked() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "wox.app.data.json",
            r#"{
                "QueryHistories": [
                    {"Query": {"QueryType": "input", "QueryText": "b"}, "Timestamp": 20},
                    {"Query": {"QueryType": "input", "QueryText": "a"}, "Timestamp": 10}
                ],
                "FavoriteResults": {"abc": true}
            }"#,
        );
        let data = load_app_data(&path);
        assert_eq!(data.query_histories.len(), 2);
        assert_eq!(data.query_histories[0].query.query_text, "a");
        assert_eq!(data.favorite_results.unwrap().len(), 1);
    }

    #[test]
    fn test_app_data_without_favorites() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "wox.app.data.json", r#"{"QueryHistories": []}"#);
        let data = load_app_data(&path);
        assert!(data.query_histories.is_empty());
        assert!(data.favorite_results.is_none());
    }

    #[test]
    fn test_corrupt_app_data_yields_empty_history() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "wox.app.data.json", "[1, 2");
        assert_eq!(load_app_data(&path), LegacyAppData::default());
    }

    #[test]
    fn test_null_and_mistyped_fields_keep_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "wox.setting.json",
            r#"{
                "AppWidth": 960,
                "ThemeId": "mine",
                "ShowTray": false,
                "QueryMode": null,
                "LastQueryMode": "preserve",
                "QueryShortcuts": null,
                "AIProviders": null,
                "QueryHotkeys": {"WinValue": null, "MacValue": null, "LinuxValue": null},
                "MainHotkey": {"WinValue": null, "MacValue": "option+space", "LinuxValue": "ctrl+space"},
                "LastWindowX": "left"
            }"#,
        );
        let defaults = GlobalSettings::default();
        let loaded = load_settings(&path, &defaults, Os::Linux);

        assert_eq!(loaded.app_width, 960);
        assert_eq!(loaded.theme_id, "mine");
        assert!(!loaded.show_tray);
        assert_eq!(loaded.query_mode, "preserve");
        assert!(loaded.query_shortcuts.is_empty());
        assert!(loaded.ai_providers.is_empty());
        assert_eq!(loaded.query_hotkeys, defaults.query_hotkeys);
        assert_eq!(loaded.main_hotkey.win, defaults.main_hotkey.win);
        assert_eq!(loaded.main_hotkey.linux, "ctrl+space");
        assert_eq!(loaded.last_window_x, defaults.last_window_x);
    }

    #[test]
    fn test_app_data_null_histories_keep_favorites() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "wox.app.data.json",
            r#"{"QueryHistories": null, "FavoriteResults": {"h": true}}"#,
        );
        let data = load_app_data(&path);
        assert!(data.query_histories.is_empty());
        assert_eq!(data.favorite_results.unwrap().len(), 1);
    }

    #[test]
    fn test_app_data_history_without_timestamp() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "wox.app.data.json",
            r#"{
                "QueryHistories": [
                    {"Query": {"QueryType": "input", "QueryText": "late"}, "Timestamp": 5},
                    {"Query": {"QueryType": "input", "QueryText": null}},
                    {"Query": null, "Timestamp": null}
                ],
                "FavoriteResults": {"h": true}
            }"#,
        );
        let data = load_app_data(&path);
        assert_eq!(data.query_histories.len(), 3);
        assert_eq!(data.query_histories[0].timestamp, 0);
        assert_eq!(data.query_histories[2].query.query_text, "late");
        assert!(data.favorite_results.is_some());
    }

    #[test]
    fn test_plugin_file_with_null_settings() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "plugin.json", r#"{"Name": "Calc", "Settings": null}"#);
        let setting = load_plugin_setting(&path).unwrap();
        assert_eq!(setting.name, "Calc");
        assert!(setting.settings.is_empty());
    }
}
