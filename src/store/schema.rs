use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "0.1.0";

pub fn configure_connection(connection: &Connection, busy_timeout: Duration) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    connection
        .busy_timeout(busy_timeout)
        .context("failed to set busy timeout")?;
    Ok(())
}

pub fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS graph_nodes (
              label TEXT NOT NULL,
              id TEXT NOT NULL,
              properties TEXT NOT NULL DEFAULT '{}',
              PRIMARY KEY (label, id)
            );

            CREATE TABLE IF NOT EXISTS graph_edges (
              source_label TEXT NOT NULL,
              source_id TEXT NOT NULL,
              rel_type TEXT NOT NULL,
              target_label TEXT NOT NULL,
              target_id TEXT NOT NULL,
              PRIMARY KEY (source_label, source_id, rel_type, target_label, target_id),
              FOREIGN KEY (source_label, source_id) REFERENCES graph_nodes(label, id),
              FOREIGN KEY (target_label, target_id) REFERENCES graph_nodes(label, id)
            );

            CREATE INDEX IF NOT EXISTS idx_graph_edges_target ON graph_edges(target_label, target_id, rel_type);
            CREATE INDEX IF NOT EXISTS idx_graph_edges_rel ON graph_edges(rel_type);
            ",
        )
        .context("failed to initialize graph schema")?;

    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now_utc_string()],
    )?;

    Ok(())
}

pub fn read_metadata(connection: &Connection, key: &str) -> Result<Option<String>> {
    let value = connection
        .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()
        .with_context(|| format!("failed to read metadata key {key}"))?;
    Ok(value)
}
