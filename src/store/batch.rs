use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::graph::GraphOperation;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Executes one chunk of operations as a single transaction.
///
/// Implementations must either apply the whole chunk or nothing of it.
pub trait ChunkSink {
    fn execute_chunk(&mut self, chunk_index: usize, chunk: &[GraphOperation]) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub chunk_size: usize,
    pub chunks_committed: usize,
    pub operations_committed: usize,
}

#[derive(Debug, thiserror::Error)]
#[error(
    "batch {} ({chunk_size} operations from #{first_operation}) was rolled back; {} earlier batches stay committed",
    .chunk_index + 1,
    .committed.chunks_committed
)]
pub struct BatchExecutionError {
    pub chunk_index: usize,
    pub chunk_size: usize,
    pub first_operation: usize,
    pub committed: BatchSummary,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

/// Splits `operations` into chunks of `chunk_size` and hands them to `sink` in order.
///
/// Stops at the first failing chunk. Chunks before it remain committed, chunks
/// after it are never attempted.
pub fn execute_in_chunks<S: ChunkSink>(
    operations: &[GraphOperation],
    chunk_size: usize,
    sink: &mut S,
) -> Result<BatchSummary, BatchExecutionError> {
    let chunk_size = chunk_size.max(1);
    let mut summary = BatchSummary {
        chunk_size,
        ..BatchSummary::default()
    };

    for (chunk_index, chunk) in operations.chunks(chunk_size).enumerate() {
        let first_operation = chunk_index * chunk_size;

        if let Err(err) = sink.execute_chunk(chunk_index, chunk) {
            error!(
                batch = chunk_index + 1,
                first = first_operation + 1,
                last = first_operation + chunk.len(),
                error = %format!("{err:#}"),
                "batch failed and was rolled back"
            );
            return Err(BatchExecutionError {
                chunk_index,
                chunk_size: chunk.len(),
                first_operation,
                committed: summary,
                source: err.into(),
            });
        }

        summary.chunks_committed += 1;
        summary.operations_committed += chunk.len();
        info!(
            batch = chunk_index + 1,
            first = first_operation + 1,
            last = first_operation + chunk.len(),
            "batch committed"
        );
    }

    Ok(summary)
}
