use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{InventoryError, Result};
use crate::types::{ModInput, Record, RecordInput, RecordKind, SampleMod};

// Columns that live outside the attributes blob.
const RESERVED_KEYS: [&str; 5] = ["id", "kind", "name", "created_at", "updated_at"];

/// Thread-safe record store over a single SQLite connection.
pub struct InventoryStore {
    db: Mutex<Connection>,
}

impl InventoryStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    /// All records of one kind, ordered by name.
    #[instrument(skip(self), fields(kind = %kind))]
    pub fn list(&self, kind: RecordKind) -> Result<Vec<Record>> {
        let db = self.lock();
        let mut stmt = db.prepare(
            "SELECT kind, id, name, attributes, created_at, updated_at
             FROM records WHERE kind = ?1 ORDER BY name, id",
        )?;
        let rows = stmt.query_map(rusqlite::params![kind.as_str()], row_to_parts)?;
        rows.map(|row| row?.into_record(kind)).collect()
    }

    /// Fetch one record, `None` if it does not exist.
    #[instrument(skip(self), fields(kind = %kind))]
    pub fn get(&self, kind: RecordKind, id: &str) -> Result<Option<Record>> {
        let id = kind.parse_id(id)?;
        let db = self.lock();
        let parts = db
            .query_row(
                "SELECT kind, id, name, attributes, created_at, updated_at
                 FROM records WHERE kind = ?1 AND id = ?2",
                rusqlite::params![kind.as_str(), id],
                row_to_parts,
            )
            .optional()?;
        parts.map(|p| p.into_record(kind)).transpose()
    }

    /// Insert a new record under a fresh id. Sample labels are short, so a
    /// generated id that is already taken is rolled again.
    #[instrument(skip(self, input), fields(kind = %kind))]
    pub fn create(&self, kind: RecordKind, input: RecordInput) -> Result<Record> {
        let id = loop {
            let id = kind.new_id();
            if !self.exists(kind, &id)? {
                break id;
            }
            debug!(id = %id, "generated id already taken");
        };
        self.write(kind, &id, input)
    }

    /// Insert or replace the record with the given id.
    #[instrument(skip(self, input), fields(kind = %kind))]
    pub fn upsert(&self, kind: RecordKind, id: &str, input: RecordInput) -> Result<Record> {
        let id = kind.parse_id(id)?;
        self.write(kind, &id, input)
    }

    /// Permanently delete a record.
    #[instrument(skip(self), fields(kind = %kind))]
    pub fn delete(&self, kind: RecordKind, id: &str) -> Result<()> {
        let id = kind.parse_id(id)?;
        let db = self.lock();
        let rows_changed = db.execute(
            "DELETE FROM records WHERE kind = ?1 AND id = ?2",
            rusqlite::params![kind.as_str(), id],
        )?;
        if rows_changed == 0 {
            return Err(InventoryError::NotFound {
                kind: kind.as_str(),
                id,
            });
        }
        if kind == RecordKind::Sample {
            db.execute(
                "DELETE FROM sample_mods WHERE sample_id = ?1",
                rusqlite::params![id],
            )?;
        }
        debug!(id = %id, "record deleted");
        Ok(())
    }

    /// Every mod ever added to a sample, oldest first, removed ones included.
    #[instrument(skip(self))]
    pub fn list_mods(&self, sample_id: &str) -> Result<Vec<SampleMod>> {
        let sample_id = RecordKind::Sample.parse_id(sample_id)?;
        let db = self.lock();
        let mut stmt = db.prepare(
            "SELECT id, sample_id, name, time_added, time_removed
             FROM sample_mods WHERE sample_id = ?1 ORDER BY time_added, id",
        )?;
        let mods = stmt
            .query_map(rusqlite::params![sample_id], row_to_mod)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(mods)
    }

    /// Record a new mod on an existing sample.
    #[instrument(skip(self, input))]
    pub fn add_mod(&self, sample_id: &str, input: ModInput) -> Result<SampleMod> {
        let sample_id = RecordKind::Sample.parse_id(sample_id)?;
        let name = input.name.trim();
        if name.is_empty() {
            return Err(InventoryError::MissingField { field: "name" });
        }
        if !self.exists(RecordKind::Sample, &sample_id)? {
            return Err(InventoryError::NotFound {
                kind: RecordKind::Sample.as_str(),
                id: sample_id,
            });
        }

        let sample_mod = SampleMod {
            id: Uuid::new_v4().to_string(),
            sample_id,
            name: name.to_string(),
            time_added: chrono::Utc::now().to_rfc3339(),
            time_removed: None,
        };
        self.lock().execute(
            "INSERT INTO sample_mods (id, sample_id, name, time_added)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                sample_mod.id,
                sample_mod.sample_id,
                sample_mod.name,
                sample_mod.time_added
            ],
        )?;
        debug!(id = %sample_mod.id, "mod added");
        Ok(sample_mod)
    }

    /// Mark a mod as removed. Removing it twice is `NotFound`.
    #[instrument(skip(self))]
    pub fn remove_mod(&self, sample_id: &str, mod_id: &str) -> Result<()> {
        let sample_id = RecordKind::Sample.parse_id(sample_id)?;
        let mod_id = Uuid::parse_str(mod_id.trim())
            .map(|id| id.to_string())
            .map_err(|_| InventoryError::InvalidId {
                kind: "mod",
                id: mod_id.to_string(),
            })?;
        let now = chrono::Utc::now().to_rfc3339();
        let rows_changed = self.lock().execute(
            "UPDATE sample_mods SET time_removed = ?1
             WHERE id = ?2 AND sample_id = ?3 AND time_removed IS NULL",
            rusqlite::params![now, mod_id, sample_id],
        )?;
        if rows_changed == 0 {
            return Err(InventoryError::NotFound {
                kind: "mod",
                id: mod_id,
            });
        }
        debug!(id = %mod_id, "mod removed");
        Ok(())
    }

    fn exists(&self, kind: RecordKind, id: &str) -> Result<bool> {
        let found = self
            .lock()
            .query_row(
                "SELECT 1 FROM records WHERE kind = ?1 AND id = ?2",
                rusqlite::params![kind.as_str(), id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn write(&self, kind: RecordKind, id: &str, input: RecordInput) -> Result<Record> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut attributes = input.attributes;
        for key in RESERVED_KEYS {
            attributes.remove(key);
        }
        let blob = serde_json::to_string(&attributes)?;

        let db = self.lock();
        // created_at survives updates; everything else is replaced.
        db.execute(
            "INSERT INTO records (kind, id, name, attributes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(kind, id) DO UPDATE SET
                 name       = excluded.name,
                 attributes = excluded.attributes,
                 updated_at = excluded.updated_at",
            rusqlite::params![kind.as_str(), id, input.name, blob, now],
        )?;
        let parts = db.query_row(
            "SELECT kind, id, name, attributes, created_at, updated_at
             FROM records WHERE kind = ?1 AND id = ?2",
            rusqlite::params![kind.as_str(), id],
            row_to_parts,
        )?;
        debug!(id = %id, "record written");
        parts.into_record(kind)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Raw column values; attributes are decoded outside the rusqlite closure
/// so JSON errors keep their own error variant.
struct RowParts {
    id: String,
    name: String,
    attributes: String,
    created_at: String,
    updated_at: String,
}

impl RowParts {
    fn into_record(self, kind: RecordKind) -> Result<Record> {
        let attributes: Map<String, Value> = serde_json::from_str(&self.attributes)?;
        Ok(Record {
            id: self.id,
            kind,
            name: self.name,
            attributes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn row_to_mod(row: &rusqlite::Row<'_>) -> rusqlite::Result<SampleMod> {
    Ok(SampleMod {
        id: row.get(0)?,
        sample_id: row.get(1)?,
        name: row.get(2)?,
        time_added: row.get(3)?,
        time_removed: row.get(4)?,
    })
}

fn row_to_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<RowParts> {
    Ok(RowParts {
        id: row.get(1)?,
        name: row.get(2)?,
        attributes: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use serde_json::json;

    fn store() -> InventoryStore {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        InventoryStore::new(conn)
    }

    fn input(v: Value) -> RecordInput {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn create_then_get() {
        let store = store();
        let created = store
            .create(RecordKind::Product, input(json!({ "name": "widget", "sku": "W-1" })))
            .unwrap();
        assert_eq!(created.kind, RecordKind::Product);
        assert_eq!(created.attributes.get("sku"), Some(&json!("W-1")));

        let fetched = store.get(RecordKind::Product, &created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
        // same id under another kind is a different record
        assert!(store.get(RecordKind::User, &created.id).unwrap().is_none());
    }

    #[test]
    fn upsert_replaces_and_keeps_created_at() {
        let store = store();
        let id = Uuid::new_v4().to_string();
        let first = store
            .upsert(RecordKind::Location, &id, input(json!({ "name": "shelf A" })))
            .unwrap();
        let second = store
            .upsert(RecordKind::Location, &id, input(json!({ "name": "shelf B" })))
            .unwrap();
        assert_eq!(second.name, "shelf B");
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(store.list(RecordKind::Location).unwrap().len(), 1);
    }

    #[test]
    fn reserved_keys_are_not_stored_as_attributes() {
        let store = store();
        let rec = store
            .create(
                RecordKind::User,
                input(json!({ "name": "ada", "id": "spoofed", "created_at": "x" })),
            )
            .unwrap();
        assert!(rec.attributes.is_empty());
        assert_ne!(rec.id, "spoofed");
    }

    #[test]
    fn list_is_sorted_by_name() {
        let store = store();
        for name in ["zeta", "alpha", "mid"] {
            store.create(RecordKind::Sample, input(json!({ "name": name }))).unwrap();
        }
        let names: Vec<_> = store
            .list(RecordKind::Sample)
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, ["alpha", "mid", "zeta"]);
    }

    #[test]
    fn delete_missing_is_not_found() {
        let store = store();
        let err = store
            .delete(RecordKind::User, &Uuid::new_v4().to_string())
            .unwrap_err();
        assert!(matches!(err, InventoryError::NotFound { kind: "user", .. }));
    }

    #[test]
    fn invalid_id_is_rejected_before_touching_db() {
        let store = store();
        assert!(matches!(
            store.get(RecordKind::Product, "[product_id]"),
            Err(InventoryError::InvalidId { .. })
        ));
    }

    #[test]
    fn samples_get_label_ids() {
        let store = store();
        let sample = store
            .create(RecordKind::Sample, input(json!({ "name": "coupon 7" })))
            .unwrap();
        assert!(sample.id.parse::<crate::SampleId>().is_ok(), "got {}", sample.id);

        let fetched = store
            .get(RecordKind::Sample, &sample.id.to_lowercase())
            .unwrap()
            .unwrap();
        assert_eq!(fetched.id, sample.id);
    }

    #[test]
    fn mods_are_added_listed_and_removed() {
        let store = store();
        let sample = store
            .upsert(RecordKind::Sample, "1Z-4I-6T", input(json!({ "name": "coupon" })))
            .unwrap();

        let drilled = store
            .add_mod(&sample.id, ModInput { name: "drilled".into() })
            .unwrap();
        store
            .add_mod(&sample.id, ModInput { name: "annealed".into() })
            .unwrap();

        store.remove_mod(&sample.id, &drilled.id).unwrap();
        let mods = store.list_mods("1z-4i-6t").unwrap();
        assert_eq!(mods.len(), 2);
        let removed = mods.iter().find(|m| m.id == drilled.id).unwrap();
        assert!(removed.time_removed.is_some());
        assert!(mods.iter().any(|m| m.name == "annealed" && m.time_removed.is_none()));

        // already removed
        assert!(matches!(
            store.remove_mod(&sample.id, &drilled.id),
            Err(InventoryError::NotFound { kind: "mod", .. })
        ));
    }

    #[test]
    fn add_mod_validates_sample_and_name() {
        let store = store();
        assert!(matches!(
            store.add_mod("00-00-01", ModInput { name: "x".into() }),
            Err(InventoryError::NotFound { kind: "sample", .. })
        ));
        assert!(matches!(
            store.add_mod("not-a-label", ModInput { name: "x".into() }),
            Err(InventoryError::InvalidId { kind: "sample", .. })
        ));
        store
            .upsert(RecordKind::Sample, "00-00-01", input(json!({ "name": "s" })))
            .unwrap();
        assert!(matches!(
            store.add_mod("00-00-01", ModInput { name: "  ".into() }),
            Err(InventoryError::MissingField { field: "name" })
        ));
    }

    #[test]
    fn deleting_a_sample_drops_its_mods() {
        let store = store();
        store
            .upsert(RecordKind::Sample, "0A-0B-0C", input(json!({ "name": "s" })))
            .unwrap();
        store
            .add_mod("0A-0B-0C", ModInput { name: "cut".into() })
            .unwrap();
        store.delete(RecordKind::Sample, "0A-0B-0C").unwrap();
        assert!(store.list_mods("0A-0B-0C").unwrap().is_empty());
    }
}
