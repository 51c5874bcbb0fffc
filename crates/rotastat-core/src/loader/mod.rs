//! The public load entry point.
//!
//! Ties the core pieces together for one (residue chemistry, specification)
//! request: derive the requirement descriptor, cross-check it against the
//! declared dimensions, dispatch the table shape, resolve the backing
//! file(s) across the configured search roots, and parse them into an
//! immutable [`LoadedModel`].
//!
//! Loading is synchronous and blocking; independent requests for different
//! residue types may run concurrently on separate threads, since each load
//! touches only its own stream handles and produces an owned model. Callers
//! that cache models by key must guarantee at-most-once construction
//! themselves.

pub mod config;

pub use self::config::{LoaderSettings, LoaderSettingsBuilder, SettingsError};

use crate::core::chemistry::{ResidueChemistry, derive_descriptor};
use crate::core::error::LibraryLoadError;
use crate::core::io::resolve::resolve;
use crate::core::io::rotameric::read_rotameric;
use crate::core::io::semirotameric::read_semirotameric;
use crate::core::models::LoadedModel;
use crate::core::models::layout::{LibraryKind, VariantKey, select};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, instrument};

/// Suffixes appended to the residue code for the paired semi-rotameric
/// streams, opened from the resolved library's directory.
pub const DEFINITIONS_SUFFIX: &str = "_definitions.rotlib";
pub const DENSITIES_SUFFIX: &str = "_densities.rotlib";

/// Loads the statistical library backing one residue type.
///
/// The returned model is immutable, owns all of its data, and has the
/// settings' numeric modes baked in. Every failure aborts the load and is
/// reported as a distinguishable [`LibraryLoadError`]; no partial or
/// placeholder model is ever returned.
///
/// # Errors
///
/// Returns [`LibraryLoadError::DimensionMismatch`] if the chi count derived
/// from the chemistry disagrees with the specification's declared count.
/// Returns [`LibraryLoadError::UnsupportedDimension`] for keys outside the
/// supported table rectangles.
/// Returns [`LibraryLoadError::UnspecifiedPath`] if the specification names
/// no file, and [`LibraryLoadError::NotFound`] if no search root yields one.
/// Returns [`LibraryLoadError::MalformedLibrary`] or
/// [`LibraryLoadError::PairedStreamMismatch`] for structural defects in the
/// stream contents.
#[instrument(skip_all, name = "rotamer_library_load", fields(residue = %chemistry.name))]
pub fn load(
    chemistry: &ResidueChemistry,
    settings: &LoaderSettings,
) -> Result<LoadedModel, LibraryLoadError> {
    let descriptor = derive_descriptor(chemistry);
    let specification = &chemistry.specification;

    if descriptor.rotameric_chi_count != specification.rotameric_chi_count {
        return Err(LibraryLoadError::DimensionMismatch {
            declared: specification.rotameric_chi_count,
            derived: descriptor.rotameric_chi_count,
        });
    }

    let kind = if descriptor.is_rotameric {
        LibraryKind::Rotameric
    } else {
        LibraryKind::SemiRotameric
    };
    let layout = select(VariantKey {
        rotameric_chi: specification.rotameric_chi_count,
        backbone_torsions: descriptor.backbone_torsion_count,
        kind,
    })?;

    if specification.relative_path.is_empty() {
        return Err(LibraryLoadError::UnspecifiedPath {
            residue: chemistry.name.clone(),
        });
    }

    let resolved = resolve(&specification.relative_path, &settings.roots)?;
    info!(path = %resolved.path.display(), "reading rotamer library");

    match kind {
        LibraryKind::Rotameric => {
            let table = read_rotameric(
                resolved.reader,
                &resolved.path,
                layout,
                descriptor.is_reduced_resolution,
                specification.n_bin_per_rot,
                settings.options,
            )?;
            Ok(LoadedModel::Rotameric(table))
        }
        LibraryKind::SemiRotameric => {
            // The resolved path anchors the directory the paired streams
            // live in; its own contents are not consumed.
            let directory = resolved
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let definitions_path =
                directory.join(format!("{}{}", chemistry.code, DEFINITIONS_SUFFIX));
            let densities_path =
                directory.join(format!("{}{}", chemistry.code, DENSITIES_SUFFIX));
            let definitions = open_paired(&definitions_path)?;
            let densities = open_paired(&densities_path)?;
            let table = read_semirotameric(
                definitions,
                &definitions_path,
                densities,
                &densities_path,
                layout,
                specification,
                descriptor.is_reduced_resolution,
                settings.options,
            )?;
            Ok(LoadedModel::SemiRotameric(table))
        }
    }
}

fn open_paired(path: &Path) -> Result<BufReader<File>, LibraryLoadError> {
    let file = File::open(path).map_err(|_| LibraryLoadError::NotFound {
        file_name: path.display().to_string(),
        tried: vec![path.to_path_buf()],
    })?;
    Ok(BufReader::new(file))
}
