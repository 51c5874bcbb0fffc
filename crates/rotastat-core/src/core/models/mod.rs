pub mod grid;
pub mod layout;
pub mod rotameric;
pub mod semirotameric;

use serde::Deserialize;
use thiserror::Error;

use crate::core::utils::interpolation::InterpolationKind;
use self::layout::TableLayout;
use self::rotameric::RotamericTable;
use self::semirotameric::SemiRotamericTable;

/// Probabilities are floored here before taking `-ln`, so a zero-population
/// bin stays finite.
pub(crate) const MIN_PROBABILITY: f64 = 1e-6;

/// Global numeric-mode flags baked into a model at construction.
///
/// Read from configuration once per load; a constructed model never re-reads
/// configuration, so its behavior is stable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ModelOptions {
    pub interpolation: InterpolationKind,
    pub entropy_correction: bool,
}

/// Partial derivatives of an energy query, in energy units per degree.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    /// One component per backbone torsion dimension.
    pub backbone: Vec<f64>,
    /// One component per chi angle in the query vector.
    pub chi: Vec<f64>,
}

/// A query handed the wrong number of angles for the model's layout.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("Expected {expected} backbone torsion angles, got {got}")]
    BackboneArity { expected: usize, got: usize },
    #[error("Expected {expected} chi angles, got {got}")]
    ChiArity { expected: usize, got: usize },
}

/// The immutable statistical table produced by a successful load.
///
/// Queries are keyed by a backbone-torsion vector and a chi vector. For a
/// rotameric model the chi vector has one entry per rotameric chi; for a
/// semi-rotameric model it carries the non-rotameric chi as its final entry.
/// The returned value is the interpolated `-ln p` score plus the squared
/// standardized deviation from the selected rotamer's chi means, with the
/// per-bin entropy subtracted when entropy correction was enabled at load.
#[derive(Debug)]
pub enum LoadedModel {
    Rotameric(RotamericTable),
    SemiRotameric(SemiRotamericTable),
}

impl LoadedModel {
    pub fn layout(&self) -> TableLayout {
        match self {
            Self::Rotameric(table) => table.layout(),
            Self::SemiRotameric(table) => table.layout(),
        }
    }

    pub fn options(&self) -> ModelOptions {
        match self {
            Self::Rotameric(table) => table.options(),
            Self::SemiRotameric(table) => table.options(),
        }
    }

    /// Number of discrete rotamer bins the model distinguishes.
    pub fn rotamer_count(&self) -> usize {
        match self {
            Self::Rotameric(table) => table.rotamer_count(),
            Self::SemiRotameric(table) => table.rotamer_count(),
        }
    }

    /// Interpolated energy at the given backbone and chi angles, in degrees.
    pub fn energy(&self, backbone: &[f64], chi: &[f64]) -> Result<f64, EvaluationError> {
        match self {
            Self::Rotameric(table) => table.energy(backbone, chi),
            Self::SemiRotameric(table) => table.energy(backbone, chi),
        }
    }

    /// Interpolated energy plus its gradient with respect to every query
    /// angle.
    pub fn energy_with_gradient(
        &self,
        backbone: &[f64],
        chi: &[f64],
    ) -> Result<(f64, Gradient), EvaluationError> {
        match self {
            Self::Rotameric(table) => table.energy_with_gradient(backbone, chi),
            Self::SemiRotameric(table) => table.energy_with_gradient(backbone, chi),
        }
    }
}

pub(crate) fn check_backbone_arity(expected: usize, got: usize) -> Result<(), EvaluationError> {
    if expected != got {
        return Err(EvaluationError::BackboneArity { expected, got });
    }
    Ok(())
}

pub(crate) fn check_chi_arity(expected: usize, got: usize) -> Result<(), EvaluationError> {
    if expected != got {
        return Err(EvaluationError::ChiArity { expected, got });
    }
    Ok(())
}
