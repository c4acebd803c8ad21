//! Run records: one invocation of the refiner over one document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A run groups the units produced from one input document so they can be
/// resumed and reported together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Short human-pasteable identifier, e.g. `run-1f3a9c2e`.
    pub id: String,
    /// Input document path, kept for the report header.
    pub input_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunRecord {
    /// Create a run with a fresh short identifier.
    pub fn new(input_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: generate_run_id(),
            input_path: input_path.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Short identifier: `run-` plus the first eight hex digits of a UUID.
fn generate_run_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("run-{}", &uuid[..8])
}
