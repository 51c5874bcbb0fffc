use crate::core::models::layout::LibraryKind;
use std::path::PathBuf;
use thiserror::Error;

/// Represents errors that can occur while locating, parsing, or validating a
/// rotamer statistical library.
///
/// None of these conditions are retried: a missing or malformed statistical
/// table is a configuration or data error, not a transient one. Every variant
/// aborts the in-progress load, and no partial model is returned.
#[derive(Debug, Error)]
pub enum LibraryLoadError {
    /// The library specification carries an empty relative path, so there is
    /// nothing to resolve.
    #[error("Unspecified rotamer library path for residue type '{residue}'")]
    UnspecifiedPath {
        /// The residue type whose specification lacked a path.
        residue: String,
    },
    /// No candidate path yielded a readable, non-empty stream after
    /// exhausting the full fallback order.
    #[error(
        "Could not open rotamer library file '{file_name}' for read ({} candidate paths tried)",
        .tried.len()
    )]
    NotFound {
        /// The originally requested file name.
        file_name: String,
        /// Every candidate path probed, in resolution order.
        tried: Vec<PathBuf>,
    },
    /// The requested (chi, backbone-torsion, kind) key lies outside the
    /// supported table rectangle.
    #[error(
        "Unsupported table dimensions for {kind:?} library: {rotameric_chi} rotameric chi x {backbone_torsions} backbone torsions"
    )]
    UnsupportedDimension {
        kind: LibraryKind,
        rotameric_chi: usize,
        backbone_torsions: usize,
    },
    /// The rotameric chi count derived from the residue chemistry disagrees
    /// with the count declared by the library specification.
    #[error(
        "Rotameric chi count mismatch: specification declares {declared}, residue chemistry derives {derived}"
    )]
    DimensionMismatch { declared: usize, derived: usize },
    /// A stream could be opened but reading from it failed.
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    /// A structural or numeric inconsistency was found mid-stream.
    #[error("Malformed rotamer library '{path}' at line {line}: {message}")]
    MalformedLibrary {
        path: String,
        line: usize,
        message: String,
    },
    /// The semi-rotameric definitions and densities streams disagree on a
    /// shared cardinality.
    #[error(
        "Paired stream mismatch on {quantity}: definitions stream declares {definitions}, densities stream declares {densities}"
    )]
    PairedStreamMismatch {
        quantity: &'static str,
        definitions: usize,
        densities: usize,
    },
}
