use crate::core::error::LibraryLoadError;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Canonical rotamer library subdirectory of the installed data root.
pub const LIBRARY_SUBDIRECTORY: &str = "rotamers";

/// The prioritized directory roots a library file is searched under.
///
/// A read-only snapshot supplied by the configuration layer; it may contain
/// zero priority roots. Priority roots are probed first in both nested and
/// flattened layouts, then the fixed fallback sequence (working-directory
/// relative, data root, the data root's `rotamers/` subdirectory), then the
/// extra roots.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SearchRoots {
    pub priority: Vec<PathBuf>,
    /// Canonical installed-data root; fallback probes are skipped when unset.
    pub data_root: Option<PathBuf>,
    pub extra: Vec<PathBuf>,
}

/// A successfully resolved library file with its stream already open.
#[derive(Debug)]
pub struct ResolvedStream {
    pub path: PathBuf,
    pub reader: BufReader<File>,
}

/// The file name with any directory components stripped, for roots that keep
/// a flattened layout.
fn flattened_name(file_name: &str) -> &str {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
}

/// Every path the resolver would probe for `file_name`, in probe order.
///
/// The order is total and deterministic: with N priority roots, the first
/// N candidates are the nested layouts, the next N the flattened layouts,
/// then the fixed fallback sequence, then each extra root (nested, then
/// flattened).
pub fn candidate_paths(file_name: &str, roots: &SearchRoots) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    for root in &roots.priority {
        candidates.push(root.join(file_name));
    }
    for root in &roots.priority {
        candidates.push(root.join(flattened_name(file_name)));
    }

    candidates.push(PathBuf::from(file_name));
    if let Some(data_root) = &roots.data_root {
        candidates.push(data_root.join(file_name));
        candidates.push(data_root.join(LIBRARY_SUBDIRECTORY).join(file_name));
    }

    for root in &roots.extra {
        candidates.push(root.join(file_name));
        candidates.push(root.join(flattened_name(file_name)));
    }

    candidates
}

fn open_non_empty(path: &Path) -> Option<File> {
    let file = File::open(path).ok()?;
    let non_empty = file.metadata().map(|m| m.len() > 0).unwrap_or(false);
    non_empty.then_some(file)
}

/// Resolves a library file name to the first openable, non-empty stream.
///
/// Probing stops at the first hit; the failure value carries every candidate
/// tried so a missing table can be diagnosed from the error alone.
pub fn resolve(file_name: &str, roots: &SearchRoots) -> Result<ResolvedStream, LibraryLoadError> {
    let mut tried = Vec::new();
    for candidate in candidate_paths(file_name, roots) {
        match open_non_empty(&candidate) {
            Some(file) => {
                debug!(path = %candidate.display(), "resolved rotamer library file");
                return Ok(ResolvedStream {
                    path: candidate,
                    reader: BufReader::new(file),
                });
            }
            None => tried.push(candidate),
        }
    }

    Err(LibraryLoadError::NotFound {
        file_name: file_name.to_string(),
        tried,
    })
}
