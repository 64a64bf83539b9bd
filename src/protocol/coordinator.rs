use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::graph::GraphRegistry;
use crate::util::sha256_file;

use super::parser::{DocumentReport, ProtocolParser};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub filename: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub documents_found: usize,
    pub documents_parsed: usize,
    pub sources: Vec<SourceDocument>,
    pub documents: Vec<DocumentReport>,
    pub failures: Vec<DocumentFailure>,
}

impl IngestReport {
    pub fn warnings(&self) -> impl Iterator<Item = String> + '_ {
        self.documents.iter().flat_map(|document| {
            document
                .warnings
                .iter()
                .map(move |warning| format!("{}: {warning}", document.source))
        })
    }
}

/// Lists `*.xml` files directly inside `input_dir`, sorted by path.
pub fn discover_protocols(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut protocols = Vec::new();

    let entries = fs::read_dir(input_dir)
        .with_context(|| format!("failed to read {}", input_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", input_dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let is_xml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("xml"))
            .unwrap_or(false);

        if is_xml {
            protocols.push(path);
        }
    }

    protocols.sort();
    Ok(protocols)
}

/// Parses every protocol into `registry`, one at a time and in order.
///
/// A document that cannot be read or parsed is recorded as a failure and the
/// run continues with the next one.
pub fn ingest_protocols(
    parser: &ProtocolParser,
    registry: &mut GraphRegistry,
    paths: &[PathBuf],
) -> IngestReport {
    let mut report = IngestReport {
        documents_found: paths.len(),
        ..IngestReport::default()
    };

    for path in paths {
        let source_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| path.display().to_string());

        info!(source = %source_name, "processing protocol");

        match ingest_protocol(parser, registry, path, &source_name) {
            Ok((document, source)) => {
                report.documents_parsed += 1;
                report.documents.push(document);
                report.sources.push(source);
            }
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(path = %path.display(), reason = %reason, "skipping protocol");
                report.failures.push(DocumentFailure {
                    path: path.display().to_string(),
                    reason,
                });
            }
        }
    }

    info!(
        found = report.documents_found,
        parsed = report.documents_parsed,
        failed = report.failures.len(),
        "protocol ingestion finished"
    );

    report
}

fn ingest_protocol(
    parser: &ProtocolParser,
    registry: &mut GraphRegistry,
    path: &Path,
    source_name: &str,
) -> Result<(DocumentReport, SourceDocument)> {
    let xml = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let sha256 = sha256_file(path)?;

    let document = parser.parse_document(registry, source_name, &xml)?;

    Ok((
        document,
        SourceDocument {
            filename: source_name.to_string(),
            sha256,
        },
    ))
}
