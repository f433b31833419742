//! Settings store repository layer
//!
//! A key-value store with two namespaces on top of SQLite:
//! - **core**: flat application setting keys (`wox_setting` table)
//! - **plugin**: keys scoped by plugin id (`plugin_setting` table)
//!
//! Strings are stored as-is; every other value is stored as its JSON text.

use crate::error::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Handle to the settings store.
///
/// Mutation goes through `&mut self` for transactions, so a single owner
/// serializes all writers.
pub struct SettingStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SettingStore {
    /// Open or create a store at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn, path: None })
    }

    /// Run schema migrations on this store
    pub fn migrate(&self) -> Result<()> {
        super::schema::run_migrations(&self.conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Backing file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Core namespace, writes auto-commit
    pub fn core(&self) -> Namespace<'_> {
        Namespace {
            conn: &self.conn,
            scope: Scope::Core,
        }
    }

    /// Namespace of one plugin, writes auto-commit
    pub fn plugin<'a>(&'a self, plugin_id: &'a str) -> Namespace<'a> {
        Namespace {
            conn: &self.conn,
            scope: Scope::Plugin(plugin_id),
        }
    }

    /// Begin a transaction.
    ///
    /// The returned guard rolls back when dropped without [`StoreTransaction::commit`],
    /// including on early `?` returns and panics.
    pub fn transaction(&mut self) -> Result<StoreTransaction<'_>> {
        let tx = self.conn.transaction()?;
        Ok(StoreTransaction { tx })
    }
}

/// Scoped store transaction.
pub struct StoreTransaction<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> StoreTransaction<'conn> {
    pub fn core(&self) -> Namespace<'_> {
        Namespace {
            conn: &*self.tx,
            scope: Scope::Core,
        }
    }

    pub fn plugin<'a>(&'a self, plugin_id: &'a str) -> Namespace<'a> {
        Namespace {
            conn: &*self.tx,
            scope: Scope::Plugin(plugin_id),
        }
    }

    pub fn commit(self) -> rusqlite::Result<()> {
        self.tx.commit()
    }

    pub fn rollback(self) -> rusqlite::Result<()> {
        self.tx.rollback()
    }
}

#[derive(Debug, Clone, Copy)]
enum Scope<'a> {
    Core,
    Plugin(&'a str),
}

/// Key-value view over one namespace.
#[derive(Clone, Copy)]
pub struct Namespace<'a> {
    conn: &'a Connection,
    scope: Scope<'a>,
}

impl<'a> Namespace<'a> {
    /// Store any serializable value under `key`
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = encode_value(value)?;
        self.set_raw(key, &raw)
    }

    /// Store an already-encoded value under `key`
    pub fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        match self.scope {
            Scope::Core => {
                self.conn.execute(
                    r#"
                    INSERT INTO wox_setting (key, value, updated_at)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at
                    "#,
                    params![key, value, now],
                )?;
            }
            Scope::Plugin(plugin_id) => {
                self.conn.execute(
                    r#"
                    INSERT INTO plugin_setting (plugin_id, key, value, updated_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(plugin_id, key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at
                    "#,
                    params![plugin_id, key, value, now],
                )?;
            }
        }
        Ok(())
    }

    /// Raw stored text for `key`
    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let value = match self.scope {
            Scope::Core => self
                .conn
                .query_row(
                    "SELECT value FROM wox_setting WHERE key = ?1",
                    [key],
                    |row| row.get(0),
                )
                .optional()?,
            Scope::Plugin(plugin_id) => self
                .conn
                .query_row(
                    "SELECT value FROM plugin_setting WHERE plugin_id = ?1 AND key = ?2",
                    params![plugin_id, key],
                    |row| row.get(0),
                )
                .optional()?,
        };
        Ok(value)
    }

    /// Decoded value for `key`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key)? {
            Some(raw) => Ok(Some(decode_value(&raw)?)),
            None => Ok(None),
        }
    }

    /// Remove `key`, returning whether it existed
    pub fn delete(&self, key: &str) -> Result<bool> {
        let affected = match self.scope {
            Scope::Core => self
                .conn
                .execute("DELETE FROM wox_setting WHERE key = ?1", [key])?,
            Scope::Plugin(plugin_id) => self.conn.execute(
                "DELETE FROM plugin_setting WHERE plugin_id = ?1 AND key = ?2",
                params![plugin_id, key],
            )?,
        };
        Ok(affected > 0)
    }

    /// Every key and raw value in this namespace
    pub fn all(&self) -> Result<BTreeMap<String, String>> {
        let (sql, scope_param) = match self.scope {
            Scope::Core => ("SELECT key, value FROM wox_setting", None),
            Scope::Plugin(plugin_id) => (
                "SELECT key, value FROM plugin_setting WHERE plugin_id = ?1",
                Some(plugin_id),
            ),
        };

        let mut stmt = self.conn.prepare(sql)?;
        let map_row = |row: &rusqlite::Row| -> rusqlite::Result<(String, String)> {
            Ok((row.get(0)?, row.get(1)?))
        };
        let rows = match scope_param {
            Some(plugin_id) => stmt
                .query_map([plugin_id], map_row)?
                .collect::<rusqlite::Result<BTreeMap<_, _>>>()?,
            None => stmt
                .query_map([], map_row)?
                .collect::<rusqlite::Result<BTreeMap<_, _>>>()?,
        };
        Ok(rows)
    }

    /// Remove every key in this namespace
    pub fn clear(&self) -> Result<usize> {
        let affected = match self.scope {
            Scope::Core => self.conn.execute("DELETE FROM wox_setting", [])?,
            Scope::Plugin(plugin_id) => self
                .conn
                .execute("DELETE FROM plugin_setting WHERE plugin_id = ?1", [plugin_id])?,
        };
        Ok(affected)
    }

    /// Overwrite every top-level field of `snapshot` as its own key.
    pub fn write_snapshot<T: Serialize>(&self, snapshot: &T) -> Result<usize> {
        let entries = snapshot_entries(snapshot)?;
        for (key, value) in &entries {
            self.set(key, value)?;
        }
        Ok(entries.len())
    }

    /// Rebuild a snapshot from its per-field keys.
    ///
    /// Missing keys keep the value from `defaults`. A key whose stored text
    /// cannot be decoded, or decodes to the wrong type for its field, is
    /// logged and also keeps its default.
    pub fn load_snapshot<T>(&self, defaults: &T) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let fields = match serde_json::to_value(defaults)? {
            Value::Object(map) => map,
            _ => return overlay_fields(defaults, Vec::new()),
        };

        let mut stored = Vec::new();
        for (key, slot) in fields {
            let Some(raw) = self.get_raw(&key)? else {
                continue;
            };
            if slot.is_string() {
                stored.push((key, Value::String(raw)));
                continue;
            }
            match serde_json::from_str::<Value>(&raw) {
                Ok(value) => stored.push((key, value)),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Stored setting is not valid JSON, using default");
                }
            }
        }

        overlay_fields(defaults, stored)
    }
}

/// Lay `fields` over the serialized `defaults`, one top-level key at a time.
///
/// `null` never replaces a default, at any depth. A key whose value does not
/// fit its field is logged and keeps its default; the other keys still apply.
/// Keys unknown to `T` are ignored.
pub fn overlay_fields<T, I>(defaults: &T, fields: I) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    I: IntoIterator<Item = (String, Value)>,
{
    let mut merged = match serde_json::to_value(defaults)? {
        Value::Object(map) => map,
        other => return Ok(serde_json::from_value(other)?),
    };

    for (key, value) in fields {
        let Some(slot) = merged.get(&key) else {
            continue;
        };
        let mut candidate = slot.clone();
        merge_value(&mut candidate, value);

        let previous = merged.insert(key.clone(), candidate);
        if let Err(e) = serde_json::from_value::<T>(Value::Object(merged.clone())) {
            tracing::warn!(key = %key, error = %e, "Setting does not match its type, using default");
            if let Some(previous) = previous {
                merged.insert(key, previous);
            }
        }
    }

    Ok(serde_json::from_value(Value::Object(merged))?)
}

/// Deep-merge `patch` into `target`, skipping nulls.
fn merge_value(target: &mut Value, patch: Value) {
    match (target, patch) {
        (_, Value::Null) => {}
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(slot) => merge_value(slot, value),
                    None if value.is_null() => {}
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

/// Top-level fields of a serializable struct as `(key, value)` pairs.
pub fn snapshot_entries<T: Serialize + ?Sized>(snapshot: &T) -> Result<Vec<(String, Value)>> {
    match serde_json::to_value(snapshot)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(crate::error::Error::InvalidValue {
            key: "snapshot".to_string(),
            message: format!("expected an object, got {}", other),
        }),
    }
}

/// Encode a value for storage: strings verbatim, everything else as JSON.
pub fn encode_value<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(match serde_json::to_value(value)? {
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Inverse of [`encode_value`]: try the raw text as a string first, then as JSON.
pub fn decode_value<T: DeserializeOwned>(raw: &str) -> Result<T> {
    if let Ok(value) = serde_json::from_value(Value::String(raw.to_string())) {
        return Ok(value);
    }
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformValue;
    use crate::types::GlobalSettings;

    fn test_store() -> SettingStore {
        let store = SettingStore::open_in_memory().unwrap();
        store.migrate().unwrap();
        store
    }

    #[test]
    fn test_core_set_get() {
        let store = test_store();
        let core = store.core();

        core.set("ThemeId", "abc").unwrap();
        core.set("AppWidth", &900).unwrap();
        core.set("ShowTray", &true).unwrap();
        core.set(
            "MainHotkey",
            &PlatformValue::new("a".to_string(), "b".to_string(), "c".to_string()),
        )
        .unwrap();

        assert_eq!(core.get_raw("ThemeId").unwrap().as_deref(), Some("abc"));
        assert_eq!(core.get::<String>("ThemeId").unwrap().unwrap(), "abc");
        assert_eq!(core.get::<i64>("AppWidth").unwrap(), Some(900));
        assert_eq!(core.get::<bool>("ShowTray").unwrap(), Some(true));
        let hotkey: PlatformValue<String> = core.get("MainHotkey").unwrap().unwrap();
        assert_eq!(hotkey.linux, "c");
        assert_eq!(core.get::<String>("Missing").unwrap(), None);
    }

    #[test]
    fn test_numeric_looking_strings_stay_strings() {
        let store = test_store();
        store.core().set("LangCode", "123").unwrap();
        assert_eq!(
            store.core().get::<String>("LangCode").unwrap().unwrap(),
            "123"
        );
    }

    #[test]
    fn test_plugin_namespaces_are_isolated() {
        let store = test_store();
        store.plugin("a").set_raw("key", "1").unwrap();
        store.plugin("b").set_raw("key", "2").unwrap();
        store.core().set_raw("key", "3").unwrap();

        assert_eq!(store.plugin("a").get_raw("key").unwrap().as_deref(), Some("1"));
        assert_eq!(store.plugin("b").all().unwrap().len(), 1);
        assert_eq!(store.plugin("a").clear().unwrap(), 1);
        assert!(store.plugin("a").all().unwrap().is_empty());
        assert_eq!(store.core().get_raw("key").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn test_transaction_rolls_back_on_drop() {
        let mut store = test_store();
        {
            let tx = store.transaction().unwrap();
            tx.core().set_raw("key", "value").unwrap();
            tx.plugin("p").set_raw("key", "value").unwrap();
        }
        assert!(store.core().all().unwrap().is_empty());
        assert!(store.plugin("p").all().unwrap().is_empty());

        let tx = store.transaction().unwrap();
        tx.core().set_raw("key", "value").unwrap();
        tx.commit().unwrap();
        assert_eq!(store.core().all().unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let store = test_store();
        let mut settings = GlobalSettings::default();
        settings.app_width = 1234;
        settings.theme_id = "42".to_string();

        let written = store.core().write_snapshot(&settings).unwrap();
        assert_eq!(written, 25);

        let loaded = store
            .core()
            .load_snapshot(&GlobalSettings::default())
            .unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_load_snapshot_defaults_missing_and_corrupt_keys() {
        let store = test_store();
        store.core().set_raw("AppWidth", "not json").unwrap();
        store.core().set_raw("MaxResultCount", "20").unwrap();

        let defaults = GlobalSettings::default();
        let loaded = store.core().load_snapshot(&defaults).unwrap();
        assert_eq!(loaded.app_width, defaults.app_width);
        assert_eq!(loaded.max_result_count, 20);
        assert_eq!(loaded.main_hotkey, defaults.main_hotkey);
    }

    #[test]
    fn test_load_snapshot_keeps_other_keys_when_one_is_mistyped() {
        let store = test_store();
        store.core().set_raw("ThemeId", "dark").unwrap();
        store.core().set_raw("AppWidth", "1200").unwrap();
        store.core().set_raw("LastWindowX", "1.5").unwrap();
        store.core().set_raw("ShowTray", "\"yes\"").unwrap();

        let defaults = GlobalSettings::default();
        let loaded = store.core().load_snapshot(&defaults).unwrap();
        assert_eq!(loaded.theme_id, "dark");
        assert_eq!(loaded.app_width, 1200);
        assert_eq!(loaded.last_window_x, defaults.last_window_x);
        assert_eq!(loaded.show_tray, defaults.show_tray);
    }

    #[test]
    fn test_overlay_fields_skips_nulls_at_any_depth() {
        let defaults = PlatformValue::new(
            "alt+space".to_string(),
            "command+space".to_string(),
            "ctrl+ctrl".to_string(),
        );
        let fields = vec![
            ("WinValue".to_string(), Value::Null),
            ("LinuxValue".to_string(), Value::String("ctrl+space".to_string())),
            ("Unknown".to_string(), Value::Bool(true)),
        ];

        let merged = overlay_fields(&defaults, fields).unwrap();
        assert_eq!(merged.win, "alt+space");
        assert_eq!(merged.mac, "command+space");
        assert_eq!(merged.linux, "ctrl+space");
    }

    #[test]
    fn test_merge_value_recurses_into_objects() {
        let mut target = serde_json::json!({"WinValue": [1], "MacValue": [2], "LinuxValue": []});
        merge_value(
            &mut target,
            serde_json::json!({"WinValue": null, "MacValue": [3], "Extra": null}),
        );
        assert_eq!(
            target,
            serde_json::json!({"WinValue": [1], "MacValue": [3], "LinuxValue": []})
        );
    }
}
