use serde::{Deserialize, Serialize};

use crate::graph::RegistryCounts;
use crate::protocol::{DocumentFailure, SourceDocument};
use crate::store::{BatchSummary, WriteCounts};

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestPaths {
    pub input_dir: String,
    pub cache_root: String,
    pub manifest_dir: String,
    pub db_path: Option<String>,
    pub cypher_out: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestCounts {
    pub documents_found: usize,
    pub documents_parsed: usize,
    pub documents_failed: usize,
    pub speeches_skipped: usize,
    pub entities: RegistryCounts,
    pub operations_total: usize,
    pub operations_committed: usize,
    pub batches_committed: usize,
    pub writes: WriteCounts,
    pub nodes_total: i64,
    pub edges_total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedBatch {
    pub batch: usize,
    pub first_operation: usize,
    pub operation_count: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub dry_run: bool,
    pub chunk_size: usize,
    pub paths: IngestPaths,
    pub counts: IngestCounts,
    pub batches: Option<BatchSummary>,
    pub failed_batch: Option<FailedBatch>,
    pub document_failures: Vec<DocumentFailure>,
    pub sources: Vec<SourceDocument>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}
