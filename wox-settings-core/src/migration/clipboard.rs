//! Clipboard favorites reconciliation
//!
//! The clipboard plugin kept favorites in two places over time:
//! - a JSON array of history items under its `history` setting, with an
//!   `isFavorite` flag per item
//! - rows flagged `is_favorite` in its own SQLite file `<pluginId>_clipboard.db`
//!
//! Both are converted to [`FavoriteClipboardItem`] and written as one JSON list
//! under the plugin's `favorites` setting. JSON-derived items come first, then
//! database rows (newest first). Items present in both sources are kept twice.

use crate::error::Result;
use crate::store::SettingStore;
use crate::types::FavoriteClipboardItem;
use chrono::{DateTime, NaiveDateTime};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OpenFlags};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Plugin setting holding the legacy JSON history.
pub const HISTORY_KEY: &str = "history";

/// Plugin setting receiving the merged favorites.
pub const FAVORITES_KEY: &str = "favorites";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// History item in the legacy `history` setting.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LegacyClipboardHistory {
    id: String,
    text: String,
    #[serde(rename = "type")]
    kind: String,
    /// Unix milliseconds
    timestamp: i64,
    image_path: String,
    is_favorite: bool,
}

impl LegacyClipboardHistory {
    fn into_favorite(self) -> FavoriteClipboardItem {
        FavoriteClipboardItem {
            id: self.id,
            kind: self.kind,
            content: self.text,
            file_path: self.image_path,
            icon_data: None,
            width: None,
            height: None,
            file_size: None,
            timestamp: self.timestamp,
            created_at: self.timestamp / 1000,
        }
    }
}

/// Row of the `clipboard_history` table.
#[derive(Debug, Clone)]
struct ClipboardRecord {
    id: String,
    kind: String,
    content: String,
    file_path: Option<String>,
    icon_data: Option<String>,
    width: Option<i64>,
    height: Option<i64>,
    file_size: Option<i64>,
    timestamp: i64,
    /// Unix seconds
    created_at: i64,
}

impl From<ClipboardRecord> for FavoriteClipboardItem {
    fn from(record: ClipboardRecord) -> Self {
        FavoriteClipboardItem {
            id: record.id,
            kind: record.kind,
            content: record.content,
            file_path: record.file_path.unwrap_or_default(),
            icon_data: record.icon_data,
            width: record.width,
            height: record.height,
            file_size: record.file_size,
            timestamp: record.timestamp,
            created_at: record.created_at,
        }
    }
}

/// Merge both legacy favorite sources into the plugin's `favorites` setting.
///
/// Writes go straight to `store`, outside any transaction. Failures of either
/// source are logged and that source contributes nothing. Returns the number
/// of favorites written.
pub fn reconcile(store: &SettingStore, plugin_id: &str, database_path: &Path) -> Result<usize> {
    let settings = store.plugin(plugin_id);
    let mut favorites: Vec<FavoriteClipboardItem> = Vec::new();

    if let Some(history_json) = settings.get_raw(HISTORY_KEY)?.filter(|s| !s.is_empty()) {
        match favorites_from_history(&history_json) {
            Ok(items) => {
                tracing::info!(count = items.len(), "Found favorite items in legacy clipboard history");
                favorites.extend(items);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse legacy clipboard history");
            }
        }
        if let Err(e) = settings.set_raw(HISTORY_KEY, "") {
            tracing::warn!(error = %e, "Failed to clear legacy clipboard history");
        }
    }

    match read_database_favorites(database_path) {
        Ok(records) => {
            let found = records.len();
            tracing::info!(count = found, "Found favorite items in clipboard database");
            favorites.extend(records.into_iter().map(FavoriteClipboardItem::from));

            if found > 0 {
                match delete_database_favorites(database_path) {
                    Ok(deleted) => {
                        tracing::info!(deleted, "Deleted migrated favorites from clipboard database")
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to delete favorites from clipboard database")
                    }
                }
            }
        }
        Err(e) => {
            tracing::warn!(
                path = %database_path.display(),
                error = %e,
                "Failed to read favorites from clipboard database"
            );
        }
    }

    if favorites.is_empty() {
        return Ok(0);
    }

    let encoded = serde_json::to_string(&favorites)?;
    settings.set_raw(FAVORITES_KEY, &encoded)?;
    tracing::info!(count = favorites.len(), "Migrated favorite clipboard items");

    Ok(favorites.len())
}

fn favorites_from_history(history_json: &str) -> Result<Vec<FavoriteClipboardItem>> {
    let history: Vec<LegacyClipboardHistory> = serde_json::from_str(history_json)?;
    Ok(history
        .into_iter()
        .filter(|item| item.is_favorite)
        .map(LegacyClipboardHistory::into_favorite)
        .collect())
}

/// Favorite rows, newest first. A missing database file yields no rows.
fn read_database_favorites(path: &Path) -> Result<Vec<ClipboardRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    let mut stmt = conn.prepare(
        r#"
        SELECT id, type, content, file_path, icon_data, width, height, file_size, timestamp, created_at
        FROM clipboard_history
        WHERE is_favorite = 1
        ORDER BY timestamp DESC
        "#,
    )?;

    let records = stmt
        .query_map([], |row| {
            Ok(ClipboardRecord {
                id: row.get(0)?,
                kind: row.get(1)?,
                content: row.get(2)?,
                file_path: row.get(3)?,
                icon_data: row.get(4)?,
                width: row.get(5)?,
                height: row.get(6)?,
                file_size: row.get(7)?,
                timestamp: row.get(8)?,
                created_at: unix_seconds(row.get(9)?, 9)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(records)
}

fn delete_database_favorites(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    let deleted = conn.execute("DELETE FROM clipboard_history WHERE is_favorite = 1", [])?;
    Ok(deleted)
}

/// `created_at` is written either as a unix timestamp or as SQLite datetime text.
fn unix_seconds(value: Value, column: usize) -> rusqlite::Result<i64> {
    match value {
        Value::Null => Ok(0),
        Value::Integer(secs) => Ok(secs),
        Value::Real(secs) => Ok(secs as i64),
        Value::Text(text) => parse_datetime(&text).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                Type::Text,
                format!("unrecognized datetime: {}", text).into(),
            )
        }),
        Value::Blob(_) => Err(rusqlite::Error::InvalidColumnType(
            column,
            "created_at".to_string(),
            Type::Blob,
        )),
    }
}

fn parse_datetime(text: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.timestamp());
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PLUGIN_ID: &str = "clipboard";

    fn test_store() -> SettingStore {
        let store = SettingStore::open_in_memory().unwrap();
        store.migrate().unwrap();
        store
    }

    fn create_clipboard_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE clipboard_history (
                id          TEXT PRIMARY KEY,
                type        TEXT NOT NULL,
                content     TEXT NOT NULL,
                file_path   TEXT,
                icon_data   TEXT,
                width       INTEGER,
                height      INTEGER,
                file_size   INTEGER,
                timestamp   INTEGER NOT NULL,
                is_favorite BOOLEAN NOT NULL DEFAULT 0,
                created_at  DATETIME NOT NULL
            );
            INSERT INTO clipboard_history VALUES
                ('a', 'text', 'from db', NULL, NULL, NULL, NULL, NULL, 2000, 1, '2024-01-02 03:04:05'),
                ('b', 'image', 'png', '/tmp/b.png', 'icon', 10, 20, 300, 3000, 1, '2024-01-02 03:04:06.5+00:00'),
                ('c', 'text', 'plain', NULL, NULL, NULL, NULL, NULL, 4000, 0, '2024-01-02 03:04:07');
            "#,
        )
        .unwrap();
    }

    fn history_json() -> String {
        serde_json::json!([
            {"id": "a", "text": "from json", "type": "text", "timestamp": 1_700_000_000_123i64, "isFavorite": true},
            {"id": "x", "text": "not favorite", "type": "text", "timestamp": 1_700_000_000_000i64}
        ])
        .to_string()
    }

    fn merged(store: &SettingStore) -> Vec<FavoriteClipboardItem> {
        let raw = store
            .plugin(PLUGIN_ID)
            .get_raw(FAVORITES_KEY)
            .unwrap()
            .unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn test_merge_keeps_duplicates() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("clipboard_clipboard.db");
        create_clipboard_db(&db_path);

        let store = test_store();
        store
            .plugin(PLUGIN_ID)
            .set_raw(HISTORY_KEY, &history_json())
            .unwrap();

        let count = reconcile(&store, PLUGIN_ID, &db_path).unwrap();
        assert_eq!(count, 3);

        let items = merged(&store);
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        // JSON source first, then database rows newest first
        assert_eq!(ids, ["a", "b", "a"]);

        assert_eq!(items[0].content, "from json");
        assert_eq!(items[0].created_at, 1_700_000_000);
        assert_eq!(items[1].file_path, "/tmp/b.png");
        assert_eq!(items[1].width, Some(10));
        assert_eq!(items[1].created_at, 1_704_164_646);
        assert_eq!(items[2].content, "from db");
        assert_eq!(items[2].created_at, 1_704_164_645);
    }

    #[test]
    fn test_sources_are_consumed() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("clipboard_clipboard.db");
        create_clipboard_db(&db_path);

        let store = test_store();
        store
            .plugin(PLUGIN_ID)
            .set_raw(HISTORY_KEY, &history_json())
            .unwrap();
        reconcile(&store, PLUGIN_ID, &db_path).unwrap();

        assert_eq!(
            store.plugin(PLUGIN_ID).get_raw(HISTORY_KEY).unwrap().as_deref(),
            Some("")
        );

        let conn = Connection::open(&db_path).unwrap();
        let remaining: Vec<String> = conn
            .prepare("SELECT id FROM clipboard_history")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(remaining, ["c"]);
    }

    #[test]
    fn test_missing_database_contributes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = test_store();
        store
            .plugin(PLUGIN_ID)
            .set_raw(HISTORY_KEY, &history_json())
            .unwrap();

        let count = reconcile(&store, PLUGIN_ID, &dir.path().join("missing.db")).unwrap();
        assert_eq!(count, 1);
        assert!(!dir.path().join("missing.db").exists());
    }

    #[test]
    fn test_history_without_favorites_is_still_cleared() {
        let dir = TempDir::new().unwrap();
        let store = test_store();
        store
            .plugin(PLUGIN_ID)
            .set_raw(HISTORY_KEY, "not json")
            .unwrap();

        let count = reconcile(&store, PLUGIN_ID, &dir.path().join("missing.db")).unwrap();
        assert_eq!(count, 0);
        assert_eq!(
            store.plugin(PLUGIN_ID).get_raw(HISTORY_KEY).unwrap().as_deref(),
            Some("")
        );
        assert!(store
            .plugin(PLUGIN_ID)
            .get_raw(FAVORITES_KEY)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert_eq!(parse_datetime("1970-01-01T00:01:00Z"), Some(60));
        assert_eq!(parse_datetime("1970-01-01 00:01:00"), Some(60));
        assert_eq!(parse_datetime("1970-01-01 01:01:00+01:00"), Some(60));
        assert_eq!(parse_datetime("yesterday"), None);
    }
}
