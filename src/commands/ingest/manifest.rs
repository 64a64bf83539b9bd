use std::error::Error;

use crate::cli::IngestArgs;

pub(super) fn render_ingest_command(args: &IngestArgs) -> String {
    let mut command = vec![
        "plenargraph".to_string(),
        "ingest".to_string(),
        args.input_dir.display().to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
    ];

    if let Some(path) = &args.db_path {
        command.push("--db-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.ingest_manifest_path {
        command.push("--ingest-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    command.push("--chunk-size".to_string());
    command.push(args.chunk_size.to_string());
    command.push("--busy-timeout-ms".to_string());
    command.push(args.busy_timeout_ms.to_string());
    if args.dry_run {
        command.push("--dry-run".to_string());
    }
    if let Some(path) = &args.cypher_out {
        command.push("--cypher-out".to_string());
        command.push(path.display().to_string());
    }

    command.join(" ")
}

/// Joins an error and its sources with `: `, outermost first.
pub(super) fn describe_error(err: &(dyn Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}
