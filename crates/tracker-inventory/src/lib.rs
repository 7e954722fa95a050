//! `tracker-inventory` — SQLite record store behind the CRUD endpoints.
//!
//! Every resource (users, locations, products, samples) shares one
//! `records` table keyed by `(kind, id)`. Resource-specific fields travel
//! in a JSON `attributes` column. Samples additionally carry a history of
//! mods in `sample_mods`.

pub mod db;
pub mod error;
pub mod sample_id;
pub mod store;
pub mod types;

pub use error::{InventoryError, Result};
pub use sample_id::SampleId;
pub use store::InventoryStore;
pub use types::{ModInput, Record, RecordInput, RecordKind, SampleMod};
