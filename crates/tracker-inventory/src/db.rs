use rusqlite::Connection;

use crate::error::Result;

/// Initialise the records and sample_mods tables with their indexes.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS records (
            kind        TEXT NOT NULL,
            id          TEXT NOT NULL,
            name        TEXT NOT NULL,
            attributes  TEXT NOT NULL DEFAULT '{}',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            PRIMARY KEY (kind, id)
        );
        CREATE INDEX IF NOT EXISTS idx_records_kind_name
            ON records(kind, name);

        CREATE TABLE IF NOT EXISTS sample_mods (
            id           TEXT PRIMARY KEY,
            sample_id    TEXT NOT NULL,
            name         TEXT NOT NULL,
            time_added   TEXT NOT NULL,
            time_removed TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_sample_mods_sample
            ON sample_mods(sample_id, time_added);",
    )?;
    Ok(())
}
