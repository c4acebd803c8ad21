//! CLI command implementations.

pub mod report;
pub mod run;

use std::sync::Arc;

use anyhow::Result;

use crate::adapters::sqlite::{initialize_database, SqliteCheckpointStore, SqliteUnitRegistry};
use crate::domain::models::Config;
use crate::domain::ports::{CheckpointStore, UnitRegistry};

/// Open the checkpoint database and hand back the two stores over it.
pub(crate) async fn open_stores(
    config: &Config,
) -> Result<(Arc<dyn CheckpointStore>, Arc<dyn UnitRegistry>)> {
    let pool = initialize_database(&format!("sqlite:{}", config.database.path)).await?;
    Ok((
        Arc::new(SqliteCheckpointStore::new(pool.clone())),
        Arc::new(SqliteUnitRegistry::new(pool)),
    ))
}
