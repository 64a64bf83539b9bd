//! Durable graph storage and bounded, transactional batch execution.

mod batch;
mod schema;
mod sqlite;
#[cfg(test)]
mod tests;

pub use batch::{BatchExecutionError, BatchSummary, ChunkSink, DEFAULT_CHUNK_SIZE, execute_in_chunks};
pub use schema::{DB_SCHEMA_VERSION, configure_connection, ensure_schema, read_metadata};
pub use sqlite::{GraphCounts, SqliteGraphStore, WriteCounts, graph_counts};
