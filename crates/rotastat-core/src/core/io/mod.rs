pub mod resolve;
pub mod rotameric;
pub mod semirotameric;

use crate::core::error::LibraryLoadError;
use std::io::BufRead;
use std::path::Path;

pub(crate) fn malformed(
    path: &Path,
    line: usize,
    message: impl Into<String>,
) -> LibraryLoadError {
    LibraryLoadError::MalformedLibrary {
        path: path.display().to_string(),
        line,
        message: message.into(),
    }
}

/// Reads every data-bearing line with its 1-based line number, skipping
/// blank lines and `#` comments.
pub(crate) fn read_data_lines(
    reader: impl BufRead,
    path: &Path,
) -> Result<Vec<(usize, String)>, LibraryLoadError> {
    let mut lines = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| LibraryLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        lines.push((index + 1, trimmed.to_string()));
    }
    Ok(lines)
}

pub(crate) fn parse_float(
    token: &str,
    what: &str,
    path: &Path,
    line: usize,
) -> Result<f64, LibraryLoadError> {
    token
        .parse::<f64>()
        .map_err(|_| malformed(path, line, format!("invalid {} '{}'", what, token)))
}

pub(crate) fn parse_index(
    token: &str,
    what: &str,
    path: &Path,
    line: usize,
) -> Result<usize, LibraryLoadError> {
    token
        .parse::<usize>()
        .map_err(|_| malformed(path, line, format!("invalid {} '{}'", what, token)))
}
