use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version written into fresh metadata records.
pub const SCHEMA_VERSION: u32 = 1;

/// Side record governing the one-time seed bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub version: u32,
    pub initialized_at: DateTime<Utc>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self { version: SCHEMA_VERSION, initialized_at: Utc::now() }
    }
}
