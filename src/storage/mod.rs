use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::config::{ConfigPaths, StorageOptions};

mod schema;

/// Sentinel id meaning "not yet persisted" on a `Note` and "no matching
/// row" from [`StorageHandle::find_id_by_title`].
pub const NOT_FOUND: i64 = -1;

/// Number of importance levels; valid values are `0..IMPORTANCE_LEVELS`.
pub const IMPORTANCE_LEVELS: u8 = 5;

/// Example notes inserted on a fresh, empty store.
const SEED_NOTES: [(&str, &str, u8); 3] = [
    (
        "Press 'a' to add a note",
        "Start building your to-do list.",
        2,
    ),
    (
        "Open a note to edit it",
        "Select any card and press Enter to try it now.",
        1,
    ),
    ("Example", "What's for dinner tonight?", 0),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub importance: u8,
}

impl Note {
    /// Builds an unsaved note. Any importance value is accepted and
    /// wrapped into range; the id stays [`NOT_FOUND`] until the first
    /// upsert assigns one.
    pub fn new(title: impl Into<String>, content: impl Into<String>, importance: i64) -> Self {
        Self {
            id: NOT_FOUND,
            title: title.into(),
            content: content.into(),
            importance: normalize_importance(importance),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id != NOT_FOUND
    }
}

/// Wraps an arbitrary integer into the valid importance range `[0, 4]`.
pub fn normalize_importance(raw: i64) -> u8 {
    raw.rem_euclid(i64::from(IMPORTANCE_LEVELS)) as u8
}

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    /// All notes, most important first.
    pub fn list_all(&self) -> Result<Vec<Note>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT _id, title, content, importance
                 FROM note
                 ORDER BY importance DESC",
            )?;
            let notes = stmt
                .query_map([], |row| {
                    Ok(Note {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        content: row.get(2)?,
                        importance: normalize_importance(row.get::<_, i64>(3)?),
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("querying all notes")?;
            Ok(notes)
        })
    }

    /// Row id for an exact title match, or [`NOT_FOUND`]. Should several
    /// rows match despite the unique index, the last scanned wins.
    pub fn find_id_by_title(&self, title: &str) -> Result<i64> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT _id FROM note WHERE title = ?1")
                .context("preparing title lookup")?;
            let mut rows = stmt.query(params![title]).context("querying by title")?;
            let mut id = NOT_FOUND;
            while let Some(row) = rows.next()? {
                id = row.get(0)?;
            }
            Ok(id)
        })
    }

    /// Inserts the note when its id is the sentinel, writing the generated
    /// id back onto it; updates the existing row otherwise. A duplicate
    /// title fails at the storage layer and propagates to the caller.
    pub fn upsert(&self, note: &mut Note) -> Result<()> {
        self.with_connection(|conn| {
            if note.is_persisted() {
                conn.execute(
                    "UPDATE note SET title = ?1, content = ?2, importance = ?3 WHERE _id = ?4",
                    params![note.title, note.content, note.importance, note.id],
                )
                .context("updating note")?;
                tracing::debug!(id = note.id, title = %note.title, "updated note");
            } else {
                conn.execute(
                    "INSERT INTO note (title, content, importance) VALUES (?1, ?2, ?3)",
                    params![note.title, note.content, note.importance],
                )
                .context("inserting note")?;
                note.id = conn.last_insert_rowid();
                tracing::debug!(id = note.id, title = %note.title, "inserted note");
            }
            Ok(())
        })
    }

    /// Removes the row with the given id. Zero rows affected is a
    /// harmless no-op; the count is returned for callers that care.
    pub fn delete_by_id(&self, id: i64) -> Result<usize> {
        self.with_connection(|conn| {
            let deleted = conn
                .execute("DELETE FROM note WHERE _id = ?1", params![id])
                .context("deleting note")?;
            tracing::debug!(id, deleted, "deleted note rows");
            Ok(deleted)
        })
    }

    /// Inserts the fixed example notes, one by one, when the store holds
    /// no rows at all. Returns how many were inserted.
    pub fn seed_initial_notes(&self) -> Result<usize> {
        self.with_connection(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM note", [], |row| row.get(0))
                .context("counting existing notes")?;
            if count > 0 {
                return Ok(0);
            }

            tracing::info!("seeding first-run notes");
            let mut inserted = 0;
            for (title, content, importance) in SEED_NOTES {
                conn.execute(
                    "INSERT INTO note (title, content, importance) VALUES (?1, ?2, ?3)",
                    params![title, content, importance],
                )
                .context("inserting seed note")?;
                inserted += 1;
            }
            Ok(inserted)
        })
    }
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<StorageHandle> {
    let db_path = &paths.database_path;
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    Ok(StorageHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigPaths, StorageOptions};
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn temp_paths(root: &TempDir) -> ConfigPaths {
        let base = root.path();
        let config_dir = base.join("config");
        let data_dir = base.join("data");
        ConfigPaths {
            config_dir: config_dir.clone(),
            config_file: config_dir.join("config.toml"),
            data_dir: data_dir.clone(),
            database_path: data_dir.join("notes.db"),
        }
    }

    fn init_storage() -> Result<(TempDir, StorageHandle)> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        let mut options = StorageOptions::default();
        options.database_path = paths.database_path.clone();
        let storage = init(&paths, &options)?;
        Ok((temp, storage))
    }

    #[test]
    fn importance_wraps_into_range() {
        for raw in [-13i64, -7, -5, -1, 0, 1, 4, 5, 9, 23] {
            let normalized = normalize_importance(raw);
            assert!(normalized < IMPORTANCE_LEVELS);
            assert_eq!(i64::from(normalized), ((raw % 5) + 5) % 5);
        }
        assert_eq!(Note::new("t", "c", 9).importance, 4);
        assert_eq!(Note::new("t", "c", -1).importance, 4);
    }

    #[test]
    fn insert_then_list_round_trips() -> Result<()> {
        let (_temp, storage) = init_storage()?;
        let mut note = Note::new("Groceries", "eggs\nbread", 3);
        storage.upsert(&mut note)?;

        assert!(note.is_persisted());
        assert!(note.id >= 1);

        let listed = storage.list_all()?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], note);
        Ok(())
    }

    #[test]
    fn delete_then_find_returns_not_found() -> Result<()> {
        let (_temp, storage) = init_storage()?;
        let mut note = Note::new("Disposable", "body", 1);
        storage.upsert(&mut note)?;

        let deleted = storage.delete_by_id(note.id)?;
        assert_eq!(deleted, 1);
        assert_eq!(storage.find_id_by_title("Disposable")?, NOT_FOUND);
        Ok(())
    }

    #[test]
    fn deleting_missing_id_is_a_noop() -> Result<()> {
        let (_temp, storage) = init_storage()?;
        assert_eq!(storage.delete_by_id(42)?, 0);
        Ok(())
    }

    #[test]
    fn list_orders_by_importance_descending() -> Result<()> {
        let (_temp, storage) = init_storage()?;
        for (i, importance) in [2i64, 0, 4, 1].into_iter().enumerate() {
            let mut note = Note::new(format!("note {i}"), "", importance);
            storage.upsert(&mut note)?;
        }

        let importances: Vec<u8> = storage
            .list_all()?
            .into_iter()
            .map(|note| note.importance)
            .collect();
        assert_eq!(importances, vec![4, 2, 1, 0]);
        Ok(())
    }

    #[test]
    fn upsert_twice_keeps_one_row_with_latest_values() -> Result<()> {
        let (_temp, storage) = init_storage()?;
        let mut note = Note::new("Stable", "first", 1);
        storage.upsert(&mut note)?;
        let assigned = note.id;

        note.content = "second".into();
        note.importance = 4;
        storage.upsert(&mut note)?;

        let listed = storage.list_all()?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, assigned);
        assert_eq!(listed[0].content, "second");
        assert_eq!(listed[0].importance, 4);
        Ok(())
    }

    #[test]
    fn duplicate_title_insert_fails() -> Result<()> {
        let (_temp, storage) = init_storage()?;
        let mut first = Note::new("Twin", "one", 0);
        storage.upsert(&mut first)?;

        let mut second = Note::new("Twin", "two", 3);
        assert_matches!(storage.upsert(&mut second), Err(_));
        assert!(!second.is_persisted());

        let listed = storage.list_all()?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].content, "one");
        Ok(())
    }

    #[test]
    fn fresh_store_seeds_exactly_three_notes() -> Result<()> {
        let (_temp, storage) = init_storage()?;
        assert_eq!(storage.seed_initial_notes()?, 3);

        let listed = storage.list_all()?;
        assert_eq!(listed.len(), 3);
        let importances: Vec<u8> = listed.iter().map(|note| note.importance).collect();
        assert_eq!(importances, vec![2, 1, 0]);

        // A second pass must not duplicate the seeds.
        assert_eq!(storage.seed_initial_notes()?, 0);
        assert_eq!(storage.list_all()?.len(), 3);
        Ok(())
    }

    #[test]
    fn seeding_skips_a_store_with_notes() -> Result<()> {
        let (_temp, storage) = init_storage()?;
        let mut note = Note::new("Existing", "", 0);
        storage.upsert(&mut note)?;

        assert_eq!(storage.seed_initial_notes()?, 0);
        assert_eq!(storage.list_all()?.len(), 1);
        Ok(())
    }

    #[test]
    fn saved_note_round_trips_all_fields() -> Result<()> {
        let (_temp, storage) = init_storage()?;
        let mut note = Note::new("Buy milk", "2%", 1);
        storage.upsert(&mut note)?;

        let listed = storage.list_all()?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Buy milk");
        assert_eq!(listed[0].content, "2%");
        assert_eq!(listed[0].importance, 1);
        assert_ne!(listed[0].id, NOT_FOUND);
        Ok(())
    }

    #[test]
    fn version_downgrade_drops_and_recreates_the_table() -> Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        let mut options = StorageOptions::default();
        options.database_path = paths.database_path.clone();

        let storage = init(&paths, &options)?;
        let mut note = Note::new("Doomed", "body", 2);
        storage.upsert(&mut note)?;

        // Pretend a newer version of the app wrote this database.
        let conn = Connection::open(&paths.database_path)?;
        conn.pragma_update(None, "user_version", 999)?;
        drop(conn);

        let storage = init(&paths, &options)?;
        assert!(storage.list_all()?.is_empty());
        Ok(())
    }
}
