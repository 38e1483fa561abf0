//! Schema bootstrap.
//!
//! Statements are idempotent (`IF NOT EXISTS`); there is no versioning.

use crate::{DbError, DbResult};
use scylla::Session;
use tracing::{debug, info};

/// Statements creating the keyspace and both tables
pub fn schema_statements(keyspace: &str, replication_factor: u32) -> Vec<String> {
    vec![
        format!(
            "CREATE KEYSPACE IF NOT EXISTS {keyspace} WITH replication = \
             {{'class': 'SimpleStrategy', 'replication_factor': {replication_factor}}}"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {keyspace}.user_locations (
                username text PRIMARY KEY,
                latitude double,
                longitude double
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {keyspace}.location_history (
                username text,
                recorded_at timestamp,
                sample_id timeuuid,
                latitude double,
                longitude double,
                PRIMARY KEY ((username), recorded_at, sample_id)
            ) WITH CLUSTERING ORDER BY (recorded_at ASC, sample_id ASC)"
        ),
    ]
}

/// Run all migrations
pub async fn run_all(session: &Session, keyspace: &str, replication_factor: u32) -> DbResult<()> {
    info!("Running database migrations for keyspace {}...", keyspace);

    for statement in schema_statements(keyspace, replication_factor) {
        debug!("{}", statement);
        session
            .query_unpaged(statement, &[])
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;
    }

    info!("Migrations complete");
    Ok(())
}
