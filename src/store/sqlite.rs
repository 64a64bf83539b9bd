use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, Transaction, params};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::{EdgeClause, GraphOperation};

use super::batch::ChunkSink;
use super::schema::{configure_connection, ensure_schema};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteCounts {
    pub nodes_written: usize,
    pub edges_written: usize,
    pub edges_missing_target: usize,
}

impl WriteCounts {
    fn absorb(&mut self, other: WriteCounts) {
        self.nodes_written += other.nodes_written;
        self.edges_written += other.edges_written;
        self.edges_missing_target += other.edges_missing_target;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphCounts {
    pub nodes_total: i64,
    pub edges_total: i64,
    pub nodes_by_label: Vec<(String, i64)>,
    pub edges_by_relation: Vec<(String, i64)>,
}

/// Property-graph store on top of SQLite.
///
/// Nodes are keyed by `(label, id)` and carry their properties as a JSON
/// object. Every chunk handed to [`ChunkSink::execute_chunk`] runs in its own
/// transaction.
pub struct SqliteGraphStore {
    connection: Connection,
    committed: WriteCounts,
}

impl SqliteGraphStore {
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let connection = Connection::open(path)
            .with_context(|| format!("failed to open database: {}", path.display()))?;
        configure_connection(&connection, busy_timeout)?;
        Self::from_connection(connection)
    }

    pub fn from_connection(connection: Connection) -> Result<Self> {
        ensure_schema(&connection)?;
        Ok(Self {
            connection,
            committed: WriteCounts::default(),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Totals over all chunks committed through this handle.
    pub fn committed(&self) -> WriteCounts {
        self.committed
    }
}

impl ChunkSink for SqliteGraphStore {
    fn execute_chunk(&mut self, chunk_index: usize, chunk: &[GraphOperation]) -> Result<()> {
        let tx = self
            .connection
            .transaction()
            .context("failed to open batch transaction")?;

        let mut counts = WriteCounts::default();
        for operation in chunk {
            apply_operation(&tx, operation, &mut counts).with_context(|| {
                format!(
                    "failed to apply {} {}",
                    operation.node.label.as_str(),
                    operation.node.id
                )
            })?;
        }

        tx.commit()
            .with_context(|| format!("failed to commit batch {}", chunk_index + 1))?;

        debug!(
            batch = chunk_index + 1,
            nodes = counts.nodes_written,
            edges = counts.edges_written,
            missing_targets = counts.edges_missing_target,
            "batch written"
        );
        self.committed.absorb(counts);
        Ok(())
    }
}

fn apply_operation(
    tx: &Transaction<'_>,
    operation: &GraphOperation,
    counts: &mut WriteCounts,
) -> Result<()> {
    let node = &operation.node;
    let on_create = serde_json::to_string(&node.on_create)?;
    let on_match = serde_json::to_string(&node.on_match)?;

    tx.prepare_cached(
        "INSERT INTO graph_nodes(label, id, properties) VALUES(?1, ?2, ?3)
         ON CONFLICT(label, id) DO UPDATE SET properties = json_patch(graph_nodes.properties, ?4)",
    )?
    .execute(params![node.label.as_str(), node.id, on_create, on_match])?;
    counts.nodes_written += 1;

    for edge in &operation.edges {
        if insert_edge(tx, operation, edge)? {
            counts.edges_written += 1;
        } else {
            debug!(
                source = %node.id,
                relation = edge.relation.as_str(),
                target = %edge.target_id,
                "edge target not present, skipping"
            );
            counts.edges_missing_target += 1;
        }
    }

    Ok(())
}

/// Returns false when the target node does not exist; the edge is then left out.
fn insert_edge(tx: &Transaction<'_>, operation: &GraphOperation, edge: &EdgeClause) -> Result<bool> {
    let target_exists: bool = tx
        .prepare_cached("SELECT EXISTS(SELECT 1 FROM graph_nodes WHERE label = ?1 AND id = ?2)")?
        .query_row(params![edge.target_label.as_str(), edge.target_id], |row| {
            row.get(0)
        })?;
    if !target_exists {
        return Ok(false);
    }

    tx.prepare_cached(
        "INSERT OR IGNORE INTO graph_edges(source_label, source_id, rel_type, target_label, target_id)
         VALUES(?1, ?2, ?3, ?4, ?5)",
    )?
    .execute(params![
        operation.node.label.as_str(),
        operation.node.id,
        edge.relation.as_str(),
        edge.target_label.as_str(),
        edge.target_id,
    ])?;

    Ok(true)
}

pub fn graph_counts(connection: &Connection) -> Result<GraphCounts> {
    let nodes_by_label = grouped_counts(
        connection,
        "SELECT label, COUNT(*) FROM graph_nodes GROUP BY label ORDER BY label",
    )?;
    let edges_by_relation = grouped_counts(
        connection,
        "SELECT rel_type, COUNT(*) FROM graph_edges GROUP BY rel_type ORDER BY rel_type",
    )?;

    Ok(GraphCounts {
        nodes_total: nodes_by_label.iter().map(|(_, count)| count).sum(),
        edges_total: edges_by_relation.iter().map(|(_, count)| count).sum(),
        nodes_by_label,
        edges_by_relation,
    })
}

fn grouped_counts(connection: &Connection, sql: &str) -> Result<Vec<(String, i64)>> {
    let mut statement = connection
        .prepare(sql)
        .with_context(|| format!("failed to prepare count query: {sql}"))?;
    let rows = statement.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut counts = Vec::new();
    for row in rows {
        counts.push(row?);
    }
    Ok(counts)
}
