use super::layout::TableLayout;
use super::{EvaluationError, Gradient, MIN_PROBABILITY, ModelOptions};
use super::{check_backbone_arity, check_chi_arity};
use crate::core::models::grid::PeriodicGrid;
use crate::core::utils::interpolation::{InterpolatedField, InterpolationKind};
use crate::core::utils::wrap_degrees;

/// A fully rotameric statistical table: discrete bins over every chi angle,
/// conditioned on a periodic backbone-torsion grid.
///
/// Rotamer probabilities are stored as `-ln p` fields under the configured
/// interpolation scheme; chi means and standard deviations are interpolated
/// multilinearly. Immutable after construction.
#[derive(Debug)]
pub struct RotamericTable {
    layout: TableLayout,
    options: ModelOptions,
    /// Chi-bin label per rotameric chi, per rotamer, as read from the file.
    wells: Vec<Vec<usize>>,
    energy: Vec<InterpolatedField>,
    chi_mean: Vec<Vec<InterpolatedField>>,
    chi_sd: Vec<Vec<InterpolatedField>>,
    entropy: InterpolatedField,
}

impl RotamericTable {
    pub(crate) fn from_parts(
        layout: TableLayout,
        options: ModelOptions,
        wells: Vec<Vec<usize>>,
        probabilities: Vec<PeriodicGrid>,
        chi_means: Vec<Vec<PeriodicGrid>>,
        chi_sds: Vec<Vec<PeriodicGrid>>,
    ) -> Self {
        let entropy = entropy_grid(&probabilities);

        let energy = probabilities
            .into_iter()
            .map(|grid| {
                let energies = grid.map(|p| -p.max(MIN_PROBABILITY).ln());
                InterpolatedField::new(energies, options.interpolation)
            })
            .collect();
        let chi_mean = linear_fields(chi_means);
        let chi_sd = linear_fields(chi_sds);

        Self {
            layout,
            options,
            wells,
            energy,
            chi_mean,
            chi_sd,
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
        self.energy.len()
    }

    /// The chi-bin labels of one rotamer, as declared by the library file.
    pub fn wells(&self, rotamer: usize) -> &[usize] {
        &self.wells[rotamer]
    }

    /// The rotamer whose interpolated chi means sit closest to the query, by
    /// standardized deviation.
    fn nearest_rotamer(&self, backbone: &[f64], chi: &[f64]) -> (usize, f64) {
        let mut best = (0, f64::INFINITY);
        for rotamer in 0..self.rotamer_count() {
            let mut deviation = 0.0;
            for (i, &angle) in chi.iter().enumerate() {
                let mean = self.chi_mean[rotamer][i].value(backbone);
                let sd = self.chi_sd[rotamer][i].value(backbone);
                let z = wrap_degrees(angle - mean) / sd;
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
        check_chi_arity(self.layout.rotameric_chi, chi.len())?;

        let (rotamer, deviation) = self.nearest_rotamer(backbone, chi);
        let mut energy = self.energy[rotamer].value(backbone) + deviation;
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
        check_chi_arity(self.layout.rotameric_chi, chi.len())?;

        let (rotamer, _) = self.nearest_rotamer(backbone, chi);
        let (mut energy, mut backbone_gradient) =
            self.energy[rotamer].value_and_gradient(backbone);
        let mut chi_gradient = vec![0.0; chi.len()];

        for (i, &angle) in chi.iter().enumerate() {
            let (mean, mean_gradient) = self.chi_mean[rotamer][i].value_and_gradient(backbone);
            let (sd, sd_gradient) = self.chi_sd[rotamer][i].value_and_gradient(backbone);
            let delta = wrap_degrees(angle - mean);
            let z = delta / sd;
            energy += z * z;
            chi_gradient[i] = 2.0 * z / sd;
            for (k, slot) in backbone_gradient.iter_mut().enumerate() {
                // dz/dbb through both the interpolated mean and sd.
                let dz = -mean_gradient[k] / sd - delta * sd_gradient[k] / (sd * sd);
                *slot += 2.0 * z * dz;
            }
        }

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

/// Shannon entropy of the rotamer distribution at every backbone node.
fn entropy_grid(probabilities: &[PeriodicGrid]) -> PeriodicGrid {
    let mut entropy = PeriodicGrid::zeros(probabilities[0].axes().to_vec());
    for offset in 0..entropy.node_count() {
        let mut sum = 0.0;
        for grid in probabilities {
            let p = grid.get_flat(offset).max(MIN_PROBABILITY);
            sum -= p * p.ln();
        }
        entropy.set_flat(offset, sum);
    }
    entropy
}

fn linear_fields(grids: Vec<Vec<PeriodicGrid>>) -> Vec<Vec<InterpolatedField>> {
    grids
        .into_iter()
        .map(|per_chi| {
            per_chi
                .into_iter()
                .map(|grid| InterpolatedField::new(grid, InterpolationKind::Linear))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::grid::{GridAxis, backbone_axes};
    use crate::core::models::layout::{LibraryKind, TableLayout};

    fn layout() -> TableLayout {
        TableLayout {
            rotameric_chi: 1,
            backbone_torsions: 1,
            kind: LibraryKind::Rotameric,
        }
    }

    /// One backbone dimension, one chi, three rotamers with fixed means.
    fn table(options: ModelOptions) -> RotamericTable {
        let axes = backbone_axes(1, true);
        let probs = [0.6, 0.3, 0.1];
        let means = [-60.0, 60.0, 180.0];

        let mut probability_grids = Vec::new();
        let mut mean_grids = Vec::new();
        let mut sd_grids = Vec::new();
        let mut wells = Vec::new();
        for r in 0..3 {
            let mut p = PeriodicGrid::zeros(axes.clone());
            let mut mean = PeriodicGrid::zeros(axes.clone());
            let mut sd = PeriodicGrid::zeros(axes.clone());
            for i in 0..axes[0].bins {
                p.set(&[i], probs[r]);
                mean.set(&[i], means[r]);
                sd.set(&[i], 10.0);
            }
            probability_grids.push(p);
            mean_grids.push(vec![mean]);
            sd_grids.push(vec![sd]);
            wells.push(vec![r + 1]);
        }

        RotamericTable::from_parts(
            layout(),
            options,
            wells,
            probability_grids,
            mean_grids,
            sd_grids,
        )
    }

    #[test]
    fn energy_at_a_rotamer_mean_is_minus_log_probability() {
        let table = table(ModelOptions::default());

        let energy = table.energy(&[-120.0], &[-60.0]).unwrap();

        assert!((energy - (-(0.6f64.ln()))).abs() < 1e-9);
    }

    #[test]
    fn chi_deviation_adds_the_standardized_square() {
        let table = table(ModelOptions::default());

        let energy = table.energy(&[-120.0], &[-40.0]).unwrap();

        // 20 degrees off a sd-10 mean: z^2 = 4.
        assert!((energy - (-(0.6f64.ln()) + 4.0)).abs() < 1e-9);
    }

    #[test]
    fn nearest_rotamer_is_selected_with_periodic_wrap() {
        let table = table(ModelOptions::default());

        // -175 is 5 degrees from the 180 mean across the wrap.
        let energy = table.energy(&[-120.0], &[-175.0]).unwrap();

        assert!((energy - (-(0.1f64.ln()) + 0.25)).abs() < 1e-9);
    }

    #[test]
    fn entropy_correction_shifts_by_the_distribution_entropy() {
        let plain = table(ModelOptions::default());
        let corrected = table(ModelOptions {
            entropy_correction: true,
            ..ModelOptions::default()
        });

        let expected_entropy: f64 = -[0.6f64, 0.3, 0.1]
            .iter()
            .map(|p| p * p.ln())
            .sum::<f64>();
        let plain_energy = plain.energy(&[-120.0], &[-60.0]).unwrap();
        let corrected_energy = corrected.energy(&[-120.0], &[-60.0]).unwrap();

        assert!((plain_energy - corrected_energy - expected_entropy).abs() < 1e-9);
    }

    #[test]
    fn arity_errors_name_both_counts() {
        let table = table(ModelOptions::default());

        assert_eq!(
            table.energy(&[0.0, 0.0], &[0.0]),
            Err(EvaluationError::BackboneArity {
                expected: 1,
                got: 2
            })
        );
        assert_eq!(
            table.energy(&[0.0], &[]),
            Err(EvaluationError::ChiArity {
                expected: 1,
                got: 0
            })
        );
    }

    #[test]
    fn gradient_matches_finite_differences() {
        // A backbone-varying probability so the gradient is non-trivial.
        let axes = vec![GridAxis::full_circle(12)];
        let mut p = PeriodicGrid::zeros(axes.clone());
        let mut mean = PeriodicGrid::zeros(axes.clone());
        let mut sd = PeriodicGrid::zeros(axes.clone());
        for i in 0..12 {
            let angle = axes[0].node(i);
            p.set(&[i], 0.3 + 0.2 * angle.to_radians().sin());
            mean.set(&[i], -60.0 + 5.0 * angle.to_radians().cos());
            sd.set(&[i], 10.0);
        }
        let table = RotamericTable::from_parts(
            layout(),
            ModelOptions::default(),
            vec![vec![1]],
            vec![p],
            vec![vec![mean]],
            vec![vec![sd]],
        );

        let bb = [-47.0];
        let chi = [-52.0];
        let (_, gradient) = table.energy_with_gradient(&bb, &chi).unwrap();

        let h = 1e-4;
        let fd_bb = (table.energy(&[bb[0] + h], &chi).unwrap()
            - table.energy(&[bb[0] - h], &chi).unwrap())
            / (2.0 * h);
        let fd_chi = (table.energy(&bb, &[chi[0] + h]).unwrap()
            - table.energy(&bb, &[chi[0] - h]).unwrap())
            / (2.0 * h);

        assert!((gradient.backbone[0] - fd_bb).abs() < 1e-5);
        assert!((gradient.chi[0] - fd_chi).abs() < 1e-5);
    }
}
