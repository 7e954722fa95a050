use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{InventoryError, Result};
use crate::sample_id::SampleId;

/// The resource collections the tracker manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    User,
    Location,
    Product,
    Sample,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::User,
        RecordKind::Location,
        RecordKind::Product,
        RecordKind::Sample,
    ];

    /// Stored discriminator and singular route segment, e.g. `"product"`.
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::User => "user",
            RecordKind::Location => "location",
            RecordKind::Product => "product",
            RecordKind::Sample => "sample",
        }
    }

    /// Collection route segment, e.g. `"products"`.
    pub fn plural(self) -> &'static str {
        match self {
            RecordKind::User => "users",
            RecordKind::Location => "locations",
            RecordKind::Product => "products",
            RecordKind::Sample => "samples",
        }
    }

    /// Validate a client-supplied id and return it in canonical form:
    /// `XX-XX-XX` labels for samples, lowercase hyphenated UUIDs otherwise.
    pub fn parse_id(self, raw: &str) -> Result<String> {
        let parsed = match self {
            RecordKind::Sample => raw.parse::<SampleId>().map(|id| id.to_string()).ok(),
            _ => Uuid::parse_str(raw.trim()).map(|id| id.to_string()).ok(),
        };
        parsed.ok_or_else(|| InventoryError::InvalidId {
            kind: self.as_str(),
            id: raw.to_string(),
        })
    }

    /// A fresh id in this kind's format.
    pub fn new_id(self) -> String {
        match self {
            RecordKind::Sample => SampleId::generate().to_string(),
            _ => Uuid::new_v4().to_string(),
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client payload for create/update.
///
/// `name` is the only common field; anything else (`parent_product_id`,
/// `location_id`, ...) is kept verbatim as attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordInput {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// A stored inventory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// UUID v4 (lowercase hyphenated), or an `XX-XX-XX` label for samples.
    pub id: String,
    pub kind: RecordKind,
    pub name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// RFC3339 timestamp of the last update.
    pub updated_at: String,
}

/// Client payload for adding a mod to a sample.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModInput {
    #[serde(default)]
    pub name: String,
}

/// A modification made to a physical sample. Removing a mod stamps
/// `time_removed`; the row stays as history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMod {
    pub id: String,
    pub sample_id: String,
    pub name: String,
    pub time_added: String,
    pub time_removed: Option<String>,
}
