//! Periodic interpolation over angular grids.
//!
//! Backbone-dependent statistical tables are periodic in every dimension, so
//! both schemes here wrap: multilinear interpolation reads the 2^n cell
//! corners, and the cubic scheme precomputes spline derivative grids (one per
//! dimension subset, the f/fx/fy/fxy pattern of a bicubic patch generalized
//! to n dimensions) and evaluates the tensor-product Hermite form.

use crate::core::models::grid::{GridAxis, PeriodicGrid, each_index};
use nalgebra::{DMatrix, DVector};
use serde::Deserialize;

/// Interpolation scheme baked into a loaded model at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterpolationKind {
    #[default]
    Linear,
    Bicubic,
}

/// First derivatives of a periodic cubic spline through equally spaced knots.
///
/// Solves the cyclic tridiagonal system (diagonal 4, neighbors 1) whose
/// right-hand side is `3 * (y[i+1] - y[i-1])`. Derivatives are in value per
/// knot spacing.
pub fn periodic_spline_derivatives(y: &[f64]) -> Vec<f64> {
    let n = y.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let mut matrix = DMatrix::<f64>::zeros(n, n);
    let mut rhs = DVector::<f64>::zeros(n);
    for i in 0..n {
        matrix[(i, i)] += 4.0;
        matrix[(i, (i + 1) % n)] += 1.0;
        matrix[(i, (i + n - 1) % n)] += 1.0;
        rhs[i] = 3.0 * (y[(i + 1) % n] - y[(i + n - 1) % n]);
    }

    // Strictly diagonally dominant, so the factorization cannot fail.
    let solution = matrix
        .lu()
        .solve(&rhs)
        .expect("cyclic tridiagonal spline system is non-singular");
    solution.iter().copied().collect()
}

/// Spline-derivative grid of `grid` along one dimension.
fn derivative_along(grid: &PeriodicGrid, dim: usize) -> PeriodicGrid {
    let mut out = PeriodicGrid::zeros(grid.axes().to_vec());
    let bins = grid.axes()[dim].bins;
    let stride = grid.stride(dim);

    let mut line_dims: Vec<usize> = grid.axes().iter().map(|a| a.bins).collect();
    line_dims[dim] = 1;
    for base in each_index(&line_dims) {
        let base_offset = grid.offset(&base);
        let line: Vec<f64> = (0..bins)
            .map(|i| grid.get_flat(base_offset + i * stride))
            .collect();
        for (i, derivative) in periodic_spline_derivatives(&line).into_iter().enumerate() {
            out.set_flat(base_offset + i * stride, derivative);
        }
    }
    out
}

/// Node values plus spline derivative grids for every dimension subset.
///
/// `grids[mask]` holds the mixed derivative over the dimensions set in
/// `mask`; `grids[0]` is the value grid itself.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicCoefficients {
    grids: Vec<PeriodicGrid>,
}

impl CubicCoefficients {
    pub fn new(values: PeriodicGrid) -> Self {
        let dims = values.dimensions();
        let mut grids = Vec::with_capacity(1 << dims);
        grids.push(values);
        for mask in 1..(1usize << dims) {
            let dim = mask.trailing_zeros() as usize;
            grids.push(derivative_along(&grids[mask ^ (1 << dim)], dim));
        }
        Self { grids }
    }

    fn values(&self) -> &PeriodicGrid {
        &self.grids[0]
    }
}

fn hermite_basis(right: bool, tangent: bool, t: f64) -> f64 {
    match (right, tangent) {
        (false, false) => 2.0 * t * t * t - 3.0 * t * t + 1.0,
        (false, true) => t * t * t - 2.0 * t * t + t,
        (true, false) => -2.0 * t * t * t + 3.0 * t * t,
        (true, true) => t * t * t - t * t,
    }
}

fn hermite_basis_dt(right: bool, tangent: bool, t: f64) -> f64 {
    match (right, tangent) {
        (false, false) => 6.0 * t * t - 6.0 * t,
        (false, true) => 3.0 * t * t - 4.0 * t + 1.0,
        (true, false) => -6.0 * t * t + 6.0 * t,
        (true, true) => 3.0 * t * t - 2.0 * t,
    }
}

/// An immutable interpolated scalar field over a periodic angular grid.
///
/// The interpolation scheme is fixed at construction; queries are pure.
/// Gradients are per degree.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpolatedField {
    Linear(PeriodicGrid),
    Bicubic(CubicCoefficients),
}

impl InterpolatedField {
    pub fn new(values: PeriodicGrid, kind: InterpolationKind) -> Self {
        match kind {
            InterpolationKind::Linear => Self::Linear(values),
            InterpolationKind::Bicubic => Self::Bicubic(CubicCoefficients::new(values)),
        }
    }

    pub fn axes(&self) -> &[GridAxis] {
        match self {
            Self::Linear(grid) => grid.axes(),
            Self::Bicubic(coefficients) => coefficients.values().axes(),
        }
    }

    /// The raw stored value at a grid node.
    pub fn node_value(&self, indices: &[usize]) -> f64 {
        match self {
            Self::Linear(grid) => grid.get(indices),
            Self::Bicubic(coefficients) => coefficients.values().get(indices),
        }
    }

    pub fn value(&self, angles: &[f64]) -> f64 {
        self.evaluate(angles, false).0
    }

    pub fn value_and_gradient(&self, angles: &[f64]) -> (f64, Vec<f64>) {
        let (value, gradient) = self.evaluate(angles, true);
        (value, gradient.unwrap_or_default())
    }

    fn evaluate(&self, angles: &[f64], with_gradient: bool) -> (f64, Option<Vec<f64>>) {
        let axes = self.axes();
        debug_assert_eq!(angles.len(), axes.len());
        let dims = axes.len();
        let cells: Vec<(usize, f64)> = axes
            .iter()
            .zip(angles)
            .map(|(axis, &angle)| axis.locate(angle))
            .collect();

        let mut value = 0.0;
        let mut gradient = if with_gradient {
            Some(vec![0.0; dims])
        } else {
            None
        };
        let mut corner_indices = vec![0usize; dims];

        for corner in 0..1usize << dims {
            for (d, slot) in corner_indices.iter_mut().enumerate() {
                *slot = (cells[d].0 + ((corner >> d) & 1)) % axes[d].bins;
            }

            match self {
                Self::Linear(grid) => {
                    let node = grid.get(&corner_indices);
                    let mut weight = 1.0;
                    for (d, cell) in cells.iter().enumerate() {
                        let t = cell.1;
                        weight *= if (corner >> d) & 1 == 1 { t } else { 1.0 - t };
                    }
                    value += weight * node;

                    if let Some(gradient) = gradient.as_mut() {
                        for (k, slot) in gradient.iter_mut().enumerate() {
                            let mut weight = if (corner >> k) & 1 == 1 { 1.0 } else { -1.0 };
                            for (d, cell) in cells.iter().enumerate() {
                                if d == k {
                                    continue;
                                }
                                let t = cell.1;
                                weight *= if (corner >> d) & 1 == 1 { t } else { 1.0 - t };
                            }
                            *slot += weight * node / axes[k].step;
                        }
                    }
                }
                Self::Bicubic(coefficients) => {
                    for (mask, grid) in coefficients.grids.iter().enumerate() {
                        let node = grid.get(&corner_indices);
                        let mut weight = 1.0;
                        for (d, cell) in cells.iter().enumerate() {
                            weight *= hermite_basis(
                                (corner >> d) & 1 == 1,
                                (mask >> d) & 1 == 1,
                                cell.1,
                            );
                        }
                        value += weight * node;

                        if let Some(gradient) = gradient.as_mut() {
                            for (k, slot) in gradient.iter_mut().enumerate() {
                                let mut weight = 1.0;
                                for (d, cell) in cells.iter().enumerate() {
                                    let right = (corner >> d) & 1 == 1;
                                    let tangent = (mask >> d) & 1 == 1;
                                    weight *= if d == k {
                                        hermite_basis_dt(right, tangent, cell.1)
                                    } else {
                                        hermite_basis(right, tangent, cell.1)
                                    };
                                }
                                *slot += weight * node / axes[k].step;
                            }
                        }
                    }
                }
            }
        }

        (value, gradient)
    }
}
