use super::layout::TableLayout;
use super::{EvaluationError, Gradient, MIN_PROBABILITY, ModelOptions};
use super::{check_backbone_arity, check_chi_arity};
use crate::core::models::grid::{GridAxis, PeriodicGrid, each_index};
use crate::core::utils::interpolation::InterpolatedField;
use crate::core::utils::wrap_degrees;

/// A semi-rotameric statistical table: discrete bins over the rotameric chi
/// angles, a continuous density curve over one non-rotameric chi.
///
/// The density curves are stored as `-ln d` fields over the joint
/// (backbone, non-rotameric chi) grid. The rotameric chi definitions come
/// from the definitions stream and do not vary with the backbone. A query's
/// chi vector carries the non-rotameric chi as its final entry.
#[derive(Debug)]
pub struct SemiRotamericTable {
    layout: TableLayout,
    options: ModelOptions,
    wells: Vec<Vec<usize>>,
    chi_mean: Vec<Vec<f64>>,
    chi_sd: Vec<Vec<f64>>,
    density_energy: Vec<InterpolatedField>,
    entropy: InterpolatedField,
}

impl SemiRotamericTable {
    pub(crate) fn from_parts(
        layout: TableLayout,
        options: ModelOptions,
        wells: Vec<Vec<usize>>,
        chi_mean: Vec<Vec<f64>>,
        chi_sd: Vec<Vec<f64>>,
        densities: Vec<PeriodicGrid>,
    ) -> Self {
        let entropy = joint_entropy_grid(&densities, layout.backbone_torsions);

        let density_energy = densities
            .into_iter()
            .map(|grid| {
                let energies = grid.map(|d| -d.max(MIN_PROBABILITY).ln());
                InterpolatedField::new(energies, options.interpolation)
            })
            .collect();

        Self {
            layout,
            options,
            wells,
            chi_mean,
            chi_sd,
            density_energy,
            entropy: InterpolatedField::new(entropy, options.interpolation),
        }
    }

    pub fn layout(&self) -> TableLayout {
        self.layout
    }

    pub fn options(&self) -> ModelOptions {
        self.options
    }

    pub fn rotamer_count(&self) -> usize {
        self.density_energy.len()
    }

    pub fn wells(&self, rotamer: usize) -> &[usize] {
        &self.wells[rotamer]
    }

    /// Domain of the non-rotameric chi dimension: 360 degrees, or 180 when
    /// the density is mirror-symmetric.
    pub fn nrchi_axis(&self) -> GridAxis {
        let axes = self.density_energy[0].axes();
        axes[axes.len() - 1]
    }

    fn nearest_rotamer(&self, chi: &[f64]) -> (usize, f64) {
        let mut best = (0, f64::INFINITY);
        for rotamer in 0..self.rotamer_count() {
            let mut deviation = 0.0;
            for (i, &angle) in chi.iter().enumerate() {
                let z = wrap_degrees(angle - self.chi_mean[rotamer][i]) / self.chi_sd[rotamer][i];
                deviation += z * z;
            }
            if deviation < best.1 {
                best = (rotamer, deviation);
            }
        }
        best
    }

    pub fn energy(&self, backbone: &[f64], chi: &[f64]) -> Result<f64, EvaluationError> {
        check_backbone_arity(self.layout.backbone_torsions, backbone.len())?;
        check_chi_arity(self.layout.rotameric_chi + 1, chi.len())?;

        let (rotameric_chi, nrchi) = chi.split_at(self.layout.rotameric_chi);
        let (rotamer, deviation) = self.nearest_rotamer(rotameric_chi);

        let mut coordinates = backbone.to_vec();
        coordinates.push(nrchi[0]);
        let mut energy = self.density_energy[rotamer].value(&coordinates) + deviation;
        if self.options.entropy_correction {
            energy -= self.entropy.value(backbone);
        }
        Ok(energy)
    }

    pub fn energy_with_gradient(
        &self,
        backbone: &[f64],
        chi: &[f64],
    ) -> Result<(f64, Gradient), EvaluationError> {
        check_backbone_arity(self.layout.backbone_torsions, backbone.len())?;
        check_chi_arity(self.layout.rotameric_chi + 1, chi.len())?;

        let (rotameric_chi, nrchi) = chi.split_at(self.layout.rotameric_chi);
        let (rotamer, _) = self.nearest_rotamer(rotameric_chi);

        let mut coordinates = backbone.to_vec();
        coordinates.push(nrchi[0]);
        let (mut energy, joint_gradient) =
            self.density_energy[rotamer].value_and_gradient(&coordinates);

        let mut backbone_gradient = joint_gradient;
        let nrchi_gradient = backbone_gradient
            .pop()
            .unwrap_or_default();
        let mut chi_gradient = Vec::with_capacity(chi.len());

        for (i, &angle) in rotameric_chi.iter().enumerate() {
            let delta = wrap_degrees(angle - self.chi_mean[rotamer][i]);
            let sd = self.chi_sd[rotamer][i];
            let z = delta / sd;
            energy += z * z;
            chi_gradient.push(2.0 * z / sd);
        }
        chi_gradient.push(nrchi_gradient);

        if self.options.entropy_correction {
            let (entropy, entropy_gradient) = self.entropy.value_and_gradient(backbone);
            energy -= entropy;
            for (slot, g) in backbone_gradient.iter_mut().zip(&entropy_gradient) {
                *slot -= g;
            }
        }

        Ok((
            energy,
            Gradient {
                backbone: backbone_gradient,
                chi: chi_gradient,
            },
        ))
    }
}

/// Shannon entropy over the joint (rotamer, non-rotameric chi bin)
/// distribution at every backbone node.
fn joint_entropy_grid(densities: &[PeriodicGrid], backbone_dims: usize) -> PeriodicGrid {
    let backbone_axes = densities[0].axes()[..backbone_dims].to_vec();
    let nrchi_bins = densities[0].axes()[backbone_dims].bins;
    let mut entropy = PeriodicGrid::zeros(backbone_axes.clone());

    let dims: Vec<usize> = backbone_axes.iter().map(|a| a.bins).collect();
    for backbone_index in each_index(&dims) {
        let mut sum = 0.0;
        let mut joint_index = backbone_index.clone();
        joint_index.push(0);
        for grid in densities {
            for bin in 0..nrchi_bins {
                joint_index[backbone_dims] = bin;
                let p = grid.get(&joint_index).max(MIN_PROBABILITY);
                sum -= p * p.ln();
            }
        }
        entropy.set(&backbone_index, sum);
    }
    entropy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::grid::backbone_axes;
    use crate::core::models::layout::{LibraryKind, TableLayout};

    fn layout() -> TableLayout {
        TableLayout {
            rotameric_chi: 1,
            backbone_torsions: 1,
            kind: LibraryKind::SemiRotameric,
        }
    }

    /// One backbone dimension, two rotamers, a 12-bin symmetric nrchi axis.
    fn table(symmetric: bool, options: ModelOptions) -> SemiRotamericTable {
        let period = if symmetric { 180.0 } else { 360.0 };
        let bins = 12;
        let mut axes = backbone_axes(1, true);
        axes.push(GridAxis {
            start: 0.0,
            step: period / bins as f64,
            bins,
        });

        let mut densities = Vec::new();
        for r in 0..2 {
            let mut grid = PeriodicGrid::zeros(axes.clone());
            for i in 0..12 {
                for b in 0..bins {
                    // Rotamer 0 peaks at the low bins, rotamer 1 is flat.
                    let value = if r == 0 {
                        0.2 - 0.01 * b as f64
                    } else {
                        0.1
                    };
                    grid.set(&[i, b], value);
                }
            }
            densities.push(grid);
        }

        SemiRotamericTable::from_parts(
            layout(),
            options,
            vec![vec![1], vec![2]],
            vec![vec![-65.0], vec![65.0]],
            vec![vec![8.0], vec![8.0]],
            densities,
        )
    }

    #[test]
    fn energy_at_a_node_is_minus_log_density_plus_deviation() {
        let table = table(false, ModelOptions::default());

        // chi matches rotamer 0's mean exactly; nrchi on the first node.
        let energy = table.energy(&[-120.0], &[-65.0, 0.0]).unwrap();

        assert!((energy - (-(0.2f64.ln()))).abs() < 1e-9);
    }

    #[test]
    fn rotamer_selection_uses_the_rotameric_chi_only() {
        let table = table(false, ModelOptions::default());

        let energy = table.energy(&[-120.0], &[65.0, 0.0]).unwrap();

        assert!((energy - (-(0.1f64.ln()))).abs() < 1e-9);
    }

    #[test]
    fn symmetric_domains_repeat_every_180_degrees() {
        let table = table(true, ModelOptions::default());

        let a = table.energy(&[-120.0], &[-65.0, 40.0]).unwrap();
        let b = table.energy(&[-120.0], &[-65.0, 220.0]).unwrap();

        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn asymmetric_domains_do_not_repeat_at_180() {
        let table = table(false, ModelOptions::default());

        let a = table.energy(&[-120.0], &[-65.0, 40.0]).unwrap();
        let b = table.energy(&[-120.0], &[-65.0, 220.0]).unwrap();

        assert!((a - b).abs() > 1e-3);
    }

    #[test]
    fn chi_vector_must_include_the_non_rotameric_chi() {
        let table = table(false, ModelOptions::default());

        assert_eq!(
            table.energy(&[-120.0], &[-65.0]),
            Err(EvaluationError::ChiArity {
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let table = table(false, ModelOptions::default());

        let bb = [-47.0];
        let chi = [-60.0, 37.0];
        let (_, gradient) = table.energy_with_gradient(&bb, &chi).unwrap();

        let h = 1e-4;
        let fd_bb = (table.energy(&[bb[0] + h], &chi).unwrap()
            - table.energy(&[bb[0] - h], &chi).unwrap())
            / (2.0 * h);
        let fd_nrchi = (table.energy(&bb, &[chi[0], chi[1] + h]).unwrap()
            - table.energy(&bb, &[chi[0], chi[1] - h]).unwrap())
            / (2.0 * h);

        assert!((gradient.backbone[0] - fd_bb).abs() < 1e-5);
        assert!((gradient.chi[1] - fd_nrchi).abs() < 1e-5);
    }
}
