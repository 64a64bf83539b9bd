use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::{info, warn};

use crate::cli::{StatusArgs, default_db_path};
use crate::model::IngestRunManifest;
use crate::store::{graph_counts, read_metadata};

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.cache_root.join("manifests");
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| default_db_path(&args.cache_root));

    info!(cache_root = %args.cache_root.display(), "status requested");

    match latest_manifest(&manifest_dir)? {
        Some(path) => {
            let raw = fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let manifest: IngestRunManifest = serde_json::from_slice(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?;

            info!(
                path = %path.display(),
                run_id = %manifest.run_id,
                status = %manifest.status,
                started_at = %manifest.started_at,
                updated_at = %manifest.updated_at,
                dry_run = manifest.dry_run,
                documents_found = manifest.counts.documents_found,
                documents_parsed = manifest.counts.documents_parsed,
                documents_failed = manifest.counts.documents_failed,
                operations_total = manifest.counts.operations_total,
                operations_committed = manifest.counts.operations_committed,
                warnings = manifest.warnings.len(),
                "loaded latest ingest manifest"
            );
            if let Some(failed) = &manifest.failed_batch {
                warn!(
                    batch = failed.batch,
                    first_operation = failed.first_operation,
                    reason = %failed.reason,
                    "last ingest stopped at a failed batch"
                );
            }
        }
        None => warn!(path = %manifest_dir.display(), "no ingest manifest found"),
    }

    if db_path.exists() {
        let conn = Connection::open_with_flags(&db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        let counts = graph_counts(&conn)?;
        let schema_version = read_metadata(&conn, "db_schema_version")?.unwrap_or_default();
        let updated_at = read_metadata(&conn, "db_updated_at")?.unwrap_or_default();

        info!(
            path = %db_path.display(),
            schema_version = %schema_version,
            updated_at = %updated_at,
            nodes = counts.nodes_total,
            edges = counts.edges_total,
            "database status"
        );
        for (label, count) in &counts.nodes_by_label {
            info!(label = %label, count, "nodes");
        }
        for (relation, count) in &counts.edges_by_relation {
            info!(relation = %relation, count, "edges");
        }
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    Ok(())
}

/// Newest `ingest_run_*.json` by file name; the timestamp suffix sorts chronologically.
fn latest_manifest(manifest_dir: &Path) -> Result<Option<PathBuf>> {
    if !manifest_dir.is_dir() {
        return Ok(None);
    }

    let mut latest: Option<PathBuf> = None;
    for entry in fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?
    {
        let path = entry
            .with_context(|| format!("failed to read entry in {}", manifest_dir.display()))?
            .path();
        let is_run_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("ingest_run_") && name.ends_with(".json"))
            .unwrap_or(false);

        if is_run_manifest && latest.as_ref().is_none_or(|current| path > *current) {
            latest = Some(path);
        }
    }

    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_manifest_picks_newest_run_file() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "ingest_run_20240101T000000Z.json",
            "ingest_run_20240301T120000Z.json",
            "notes.json",
        ] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }

        let latest = latest_manifest(dir.path()).unwrap().unwrap();
        assert!(latest.ends_with("ingest_run_20240301T120000Z.json"));
        assert!(latest_manifest(&dir.path().join("missing")).unwrap().is_none());
    }
}
