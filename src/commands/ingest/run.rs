use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::cli::{IngestArgs, default_db_path};
use crate::graph::{GraphOperation, GraphRegistry, build_operations};
use crate::model::{FailedBatch, IngestCounts, IngestPaths, IngestRunManifest, MANIFEST_VERSION};
use crate::protocol::{ProtocolParser, discover_protocols, ingest_protocols};
use crate::store::{
    BatchExecutionError, BatchSummary, DB_SCHEMA_VERSION, GraphCounts, SqliteGraphStore,
    WriteCounts, execute_in_chunks, graph_counts,
};
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

use super::manifest::{describe_error, render_ingest_command};

struct StoreOutcome {
    result: Result<BatchSummary, BatchExecutionError>,
    writes: WriteCounts,
    graph: GraphCounts,
}

pub fn run(args: IngestArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let cache_root = args.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let ingest_manifest_path = args.ingest_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "ingest_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| default_db_path(&cache_root));
    let chunk_size = usize::try_from(args.chunk_size).context("chunk size does not fit usize")?;

    info!(
        input_dir = %args.input_dir.display(),
        cache_root = %cache_root.display(),
        run_id = %run_id,
        dry_run = args.dry_run,
        "starting ingest"
    );

    let paths = discover_protocols(&args.input_dir)?;
    if paths.is_empty() {
        warn!(input_dir = %args.input_dir.display(), "no protocol files found");
    }

    let parser = ProtocolParser::new()?;
    let mut registry = GraphRegistry::new();
    let report = ingest_protocols(&parser, &mut registry, &paths);
    log_registry_summary(&registry);

    let operations = build_operations(&registry);

    if let Some(path) = &args.cypher_out {
        write_cypher_lines(path, &operations)?;
        info!(path = %path.display(), statements = operations.len(), "wrote cypher export");
    }

    let outcome = if args.dry_run {
        info!(operations = operations.len(), "dry run, store left untouched");
        None
    } else {
        Some(store_operations(
            &db_path,
            Duration::from_millis(args.busy_timeout_ms),
            chunk_size,
            &operations,
        )?)
    };

    let mut counts = IngestCounts {
        documents_found: report.documents_found,
        documents_parsed: report.documents_parsed,
        documents_failed: report.failures.len(),
        speeches_skipped: report
            .documents
            .iter()
            .map(|document| document.speeches_skipped)
            .sum(),
        entities: registry.counts(),
        operations_total: operations.len(),
        ..IngestCounts::default()
    };

    let mut status = if args.dry_run { "dry_run" } else { "completed" };
    let mut batches = None;
    let mut failed_batch = None;

    if let Some(outcome) = &outcome {
        counts.writes = outcome.writes;
        counts.nodes_total = outcome.graph.nodes_total;
        counts.edges_total = outcome.graph.edges_total;

        match &outcome.result {
            Ok(summary) => {
                counts.operations_committed = summary.operations_committed;
                counts.batches_committed = summary.chunks_committed;
                batches = Some(*summary);
            }
            Err(err) => {
                status = "failed";
                counts.operations_committed = err.committed.operations_committed;
                counts.batches_committed = err.committed.chunks_committed;
                batches = Some(err.committed);
                failed_batch = Some(FailedBatch {
                    batch: err.chunk_index + 1,
                    first_operation: err.first_operation + 1,
                    operation_count: err.chunk_size,
                    reason: describe_error(err.source.as_ref()),
                });
            }
        }
    }

    let mut notes = vec!["Protocols parsed from XML into an in-memory entity registry.".to_string()];
    if args.dry_run {
        notes.push("Dry run: operations were built but not written.".to_string());
    } else {
        notes.push(format!(
            "Operations written to {} in batches of {}.",
            db_path.display(),
            chunk_size
        ));
    }

    let manifest = IngestRunManifest {
        manifest_version: MANIFEST_VERSION,
        run_id,
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_ingest_command(&args),
        dry_run: args.dry_run,
        chunk_size,
        paths: IngestPaths {
            input_dir: args.input_dir.display().to_string(),
            cache_root: cache_root.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            db_path: (!args.dry_run).then(|| db_path.display().to_string()),
            cypher_out: args
                .cypher_out
                .as_ref()
                .map(|path| path.display().to_string()),
        },
        counts,
        batches,
        failed_batch,
        document_failures: report.failures.clone(),
        sources: report.sources.clone(),
        warnings: report.warnings().collect(),
        notes,
    };

    write_json_pretty(&ingest_manifest_path, &manifest)?;
    info!(path = %ingest_manifest_path.display(), status, "wrote ingest run manifest");

    if let Some(StoreOutcome { result: Err(err), .. }) = outcome {
        return Err(anyhow::Error::new(err).context("graph store write failed"));
    }

    info!(
        documents = manifest.counts.documents_parsed,
        operations = manifest.counts.operations_total,
        committed = manifest.counts.operations_committed,
        "ingest completed"
    );

    Ok(())
}

fn log_registry_summary(registry: &GraphRegistry) {
    if registry.speeches().is_empty() {
        warn!("no speeches were ingested");
    }

    for faction in registry.factions().iter() {
        debug!(faction = %faction.id, members = faction.members().len(), "faction");
    }
    for session in registry.sessions().iter() {
        if session.speeches().is_empty() {
            warn!(session = %session.id, "session has no speeches");
        }
    }

    let profiles = registry.speaker_profiles();
    let speaking_time = profiles
        .iter()
        .fold(TimeDelta::zero(), |total, profile| total + profile.speaking_time);
    let profiled_without_speech = profiles
        .iter()
        .filter(|profile| registry.members()[profile.member].speeches().is_empty())
        .count();
    debug!(
        profiles = profiles.len(),
        with_topic = profiles.iter().filter(|profile| !profile.topic.is_empty()).count(),
        without_speech = profiled_without_speech,
        speaking_time_secs = speaking_time.num_seconds(),
        "speaker profiles"
    );

    let silent_members = registry
        .members()
        .iter()
        .filter(|member| member.speeches().is_empty())
        .count();
    info!(
        factions = registry.factions().len(),
        members = registry.members().len(),
        silent_members,
        sessions = registry.sessions().len(),
        speeches = registry.speeches().len(),
        comments = registry.comments().len(),
        "registry built"
    );
}

fn store_operations(
    db_path: &Path,
    busy_timeout: Duration,
    chunk_size: usize,
    operations: &[GraphOperation],
) -> Result<StoreOutcome> {
    if let Some(parent) = db_path.parent() {
        ensure_directory(parent)?;
    }

    let mut store = SqliteGraphStore::open(db_path, busy_timeout)?;
    let result = execute_in_chunks(operations, chunk_size, &mut store);
    let graph = graph_counts(store.connection())?;

    Ok(StoreOutcome {
        result,
        writes: store.committed(),
        graph,
    })
}

fn write_cypher_lines(path: &Path, operations: &[GraphOperation]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let file = File::create(path)
        .with_context(|| format!("failed to create cypher export: {}", path.display()))?;
    let mut output = BufWriter::new(file);

    for operation in operations {
        serde_json::to_writer(&mut output, &operation.to_cypher())
            .with_context(|| format!("failed to serialize cypher for {}", operation.node.id))?;
        writeln!(output)?;
    }

    output
        .flush()
        .with_context(|| format!("failed to write cypher export: {}", path.display()))?;
    Ok(())
}
