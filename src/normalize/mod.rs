//! File discovery and normalization into an ordered resource list.
//!
//! Files are processed in lexical order of their root-relative path and
//! resources keep their declaration order within a file. A file that cannot
//! be read or parsed is reported as a diagnostic and skipped.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use rayon::prelude::*;

use crate::error::{ParseError, Result, TfGateError};
use crate::ir::Resource;
use crate::parser;
use crate::report::Diagnostic;

/// File name suffixes picked up by directory discovery.
pub const DOCUMENT_SUFFIXES: &[&str] = &[".tf.json", ".tfplan.json", ".plan.json"];

/// Resources and parse diagnostics of one normalization pass.
#[derive(Debug, Default)]
pub struct Normalized {
    pub resources: Vec<Resource>,
    pub diagnostics: Vec<Diagnostic>,
    /// Number of files that were parsed successfully.
    pub files_parsed: usize,
}

/// Collect candidate documents under `root`, honoring `.gitignore` and
/// skipping hidden entries and paths matching an `exclude` pattern.
pub fn discover(root: &Path, exclude: &[glob::Pattern]) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        return Err(TfGateError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("scan root {} does not exist", root.display()),
        )));
    }

    let walker = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .build();

    let mut files = Vec::new();
    for entry in walker.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if !DOCUMENT_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            continue;
        }
        let relative = relative_name(root, path);
        if exclude.iter().any(|p| p.matches(&relative)) {
            tracing::debug!(file = %relative, "excluded");
            continue;
        }
        files.push(path.to_path_buf());
    }

    tracing::debug!(root = %root.display(), files = files.len(), "discovery complete");
    Ok(files)
}

/// Read and parse `files`, producing resources in deterministic order.
///
/// Addresses must be unique within a scan: a resource whose address was
/// already declared by an earlier file is dropped with a diagnostic.
pub fn normalize(root: &Path, files: &[PathBuf]) -> Normalized {
    let mut named: Vec<(String, &PathBuf)> = files
        .iter()
        .map(|path| (relative_name(root, path), path))
        .collect();
    named.sort_by(|a, b| a.0.cmp(&b.0));
    named.dedup_by(|a, b| a.0 == b.0);

    let parsed: Vec<(String, std::result::Result<Vec<Resource>, ParseError>)> = named
        .par_iter()
        .map(|(name, path)| {
            let result = std::fs::read_to_string(path)
                .map_err(|e| ParseError::Read(e.to_string()))
                .and_then(|text| parser::parse_document(name, &text));
            (name.clone(), result)
        })
        .collect();

    let mut normalized = Normalized::default();
    let mut declared_in: HashMap<String, String> = HashMap::new();

    for (name, result) in parsed {
        match result {
            Ok(resources) => {
                normalized.files_parsed += 1;
                for resource in resources {
                    if let Some(first) = declared_in.get(&resource.address) {
                        tracing::warn!(
                            address = %resource.address,
                            file = %name,
                            first = %first,
                            "duplicate resource address"
                        );
                        normalized.diagnostics.push(Diagnostic::parse(
                            &name,
                            format!(
                                "duplicate resource address `{}` (first declared in {}); skipped",
                                resource.address, first
                            ),
                        ));
                        continue;
                    }
                    declared_in.insert(resource.address.clone(), name.clone());
                    normalized.resources.push(resource);
                }
            }
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "file excluded from scan");
                normalized.diagnostics.push(Diagnostic::parse(&name, e.to_string()));
            }
        }
    }

    tracing::info!(
        files = named.len(),
        resources = normalized.resources.len(),
        parse_errors = normalized.diagnostics.len(),
        "normalization complete"
    );
    normalized
}

/// Root-relative, `/`-separated display name of `path`.
pub fn relative_name(root: &Path, path: &Path) -> String {
    let relative = if path == root {
        path.file_name().map(Path::new).unwrap_or(path)
    } else {
        path.strip_prefix(root).unwrap_or(path)
    };
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
