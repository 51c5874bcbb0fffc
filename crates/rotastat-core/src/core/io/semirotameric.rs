use super::{malformed, parse_float, parse_index, read_data_lines};
use crate::core::chemistry::LibrarySpecification;
use crate::core::error::LibraryLoadError;
use crate::core::models::ModelOptions;
use crate::core::models::grid::{GridAxis, PeriodicGrid, backbone_axes};
use crate::core::models::layout::TableLayout;
use crate::core::models::semirotameric::SemiRotamericTable;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

/// Header keyword declaring the non-rotameric chi bin count; both paired
/// streams must carry it, with equal values.
const NRCHI_BINS_KEYWORD: &str = "NRCHI_BINS";

struct Definitions {
    nrchi_bins: usize,
    /// Chi-bin assignment per rotamer, in definition order.
    wells: Vec<Vec<usize>>,
    rotamer_index: HashMap<Vec<usize>, usize>,
    chi_means: Vec<Vec<f64>>,
    chi_sds: Vec<Vec<f64>>,
}

fn parse_header(
    lines: &[(usize, String)],
    path: &Path,
) -> Result<usize, LibraryLoadError> {
    let (line_number, line) = lines.first().ok_or_else(|| {
        malformed(path, 1, format!("missing {} header", NRCHI_BINS_KEYWORD))
    })?;
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 2 || tokens[0] != NRCHI_BINS_KEYWORD {
        return Err(malformed(
            path,
            *line_number,
            format!("expected '{} <count>' header", NRCHI_BINS_KEYWORD),
        ));
    }
    let bins = parse_index(tokens[1], "non-rotameric chi bin count", path, *line_number)?;
    if bins == 0 {
        return Err(malformed(
            path,
            *line_number,
            "non-rotameric chi bin count must be positive",
        ));
    }
    Ok(bins)
}

/// The definitions stream: a header plus one row per rotamer,
/// `<well_1..well_T> <mean_1..mean_T> <sd_1..sd_T>`.
fn read_definitions(
    reader: impl BufRead,
    path: &Path,
    chi_count: usize,
    n_bin_per_rot: usize,
) -> Result<Definitions, LibraryLoadError> {
    let lines = read_data_lines(reader, path)?;
    let nrchi_bins = parse_header(&lines, path)?;
    let rows = &lines[1..];
    let expected_columns = 3 * chi_count;

    let mut definitions = Definitions {
        nrchi_bins,
        wells: Vec::new(),
        rotamer_index: HashMap::new(),
        chi_means: Vec::new(),
        chi_sds: Vec::new(),
    };

    for (line_number, line) in rows {
        let line_number = *line_number;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != expected_columns {
            return Err(malformed(
                path,
                line_number,
                format!(
                    "expected {} columns, found {}",
                    expected_columns,
                    tokens.len()
                ),
            ));
        }

        let mut wells = Vec::with_capacity(chi_count);
        for token in &tokens[..chi_count] {
            let well = parse_index(token, "chi bin", path, line_number)?;
            if !(1..=n_bin_per_rot).contains(&well) {
                return Err(malformed(
                    path,
                    line_number,
                    format!("chi bin {} out of range 1..={}", well, n_bin_per_rot),
                ));
            }
            wells.push(well);
        }

        let mut means = Vec::with_capacity(chi_count);
        let mut sds = Vec::with_capacity(chi_count);
        for token in &tokens[chi_count..2 * chi_count] {
            means.push(parse_float(token, "chi mean", path, line_number)?);
        }
        for token in &tokens[2 * chi_count..] {
            let sd = parse_float(token, "chi standard deviation", path, line_number)?;
            if sd <= 0.0 {
                return Err(malformed(
                    path,
                    line_number,
                    format!("chi standard deviation {} must be positive", sd),
                ));
            }
            sds.push(sd);
        }

        let index = definitions.wells.len();
        if definitions
            .rotamer_index
            .insert(wells.clone(), index)
            .is_some()
        {
            return Err(malformed(
                path,
                line_number,
                "duplicate rotamer definition",
            ));
        }
        definitions.wells.push(wells);
        definitions.chi_means.push(means);
        definitions.chi_sds.push(sds);
    }

    if definitions.wells.is_empty() {
        let last = lines.last().map(|(number, _)| *number).unwrap_or(1);
        return Err(malformed(path, last, "no rotamer definitions"));
    }

    Ok(definitions)
}

/// Reads a semi-rotameric table from its paired definitions and densities
/// streams.
///
/// Densities rows are `<bb_1..bb_n> <well_1..well_T> <d_1..d_B>` with `B`
/// the header-declared bin count; every (definitions rotamer, backbone bin)
/// must appear exactly once. A disagreement between the two headers is a
/// [`LibraryLoadError::PairedStreamMismatch`]. The non-rotameric chi axis
/// starts at the specification's start angle and spans 360 degrees, or 180
/// when the density is declared mirror-symmetric.
pub fn read_semirotameric(
    definitions: impl BufRead,
    definitions_path: &Path,
    densities: impl BufRead,
    densities_path: &Path,
    layout: TableLayout,
    specification: &LibrarySpecification,
    reduced_resolution: bool,
    options: ModelOptions,
) -> Result<SemiRotamericTable, LibraryLoadError> {
    if specification.n_bin_per_rot == 0 {
        return Err(malformed(
            definitions_path,
            1,
            "chi-bin subdivision count must be positive",
        ));
    }

    let chi_count = layout.rotameric_chi;
    let backbone_count = layout.backbone_torsions;
    let definitions = read_definitions(
        definitions,
        definitions_path,
        chi_count,
        specification.n_bin_per_rot,
    )?;

    let density_lines = read_data_lines(densities, densities_path)?;
    let declared_bins = parse_header(&density_lines, densities_path)?;
    if declared_bins != definitions.nrchi_bins {
        return Err(LibraryLoadError::PairedStreamMismatch {
            quantity: "non-rotameric chi bin count",
            definitions: definitions.nrchi_bins,
            densities: declared_bins,
        });
    }

    let period = if specification.nrchi_symmetric {
        180.0
    } else {
        360.0
    };
    let mut axes = backbone_axes(backbone_count, reduced_resolution);
    axes.push(GridAxis {
        start: specification.nrchi_start_angle,
        step: period / declared_bins as f64,
        bins: declared_bins,
    });

    let rotamer_count = definitions.wells.len();
    let mut density_grids: Vec<PeriodicGrid> = (0..rotamer_count)
        .map(|_| PeriodicGrid::zeros(axes.clone()))
        .collect();
    let backbone_nodes: usize = axes[..backbone_count].iter().map(|a| a.bins).product();
    let mut seen = vec![false; rotamer_count * backbone_nodes];

    let rows = &density_lines[1..];
    let last_line = density_lines.last().map(|(number, _)| *number).unwrap_or(1);
    let expected_columns = backbone_count + chi_count + declared_bins;

    for (line_number, line) in rows {
        let line_number = *line_number;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != expected_columns {
            return Err(malformed(
                densities_path,
                line_number,
                format!(
                    "expected {} columns, found {}",
                    expected_columns,
                    tokens.len()
                ),
            ));
        }

        let mut backbone_bins = Vec::with_capacity(backbone_count);
        for (d, token) in tokens[..backbone_count].iter().enumerate() {
            let angle = parse_float(token, "backbone angle", densities_path, line_number)?;
            let bin = axes[d].nearest_bin(angle).ok_or_else(|| {
                malformed(
                    densities_path,
                    line_number,
                    format!(
                        "backbone angle {} is not on the expected {}-degree grid",
                        angle, axes[d].step
                    ),
                )
            })?;
            backbone_bins.push(bin);
        }

        let mut wells = Vec::with_capacity(chi_count);
        for token in &tokens[backbone_count..backbone_count + chi_count] {
            wells.push(parse_index(token, "chi bin", densities_path, line_number)?);
        }
        let rotamer = *definitions.rotamer_index.get(&wells).ok_or_else(|| {
            malformed(
                densities_path,
                line_number,
                format!(
                    "chi bin assignment {:?} has no definitions entry",
                    wells
                ),
            )
        })?;

        let mut backbone_offset = 0;
        for (axis, &bin) in axes[..backbone_count].iter().zip(&backbone_bins) {
            backbone_offset = backbone_offset * axis.bins + bin;
        }
        let slot = &mut seen[rotamer * backbone_nodes + backbone_offset];
        if *slot {
            return Err(malformed(
                densities_path,
                line_number,
                "duplicate row for this backbone bin and rotamer",
            ));
        }
        *slot = true;

        let mut joint_index = backbone_bins;
        joint_index.push(0);
        for (bin, token) in tokens[backbone_count + chi_count..].iter().enumerate() {
            let density = parse_float(token, "density", densities_path, line_number)?;
            if density < 0.0 {
                return Err(malformed(
                    densities_path,
                    line_number,
                    format!("density {} must be non-negative", density),
                ));
            }
            joint_index[backbone_count] = bin;
            density_grids[rotamer].set(&joint_index, density);
        }
    }

    let missing = seen.iter().filter(|&&covered| !covered).count();
    if missing > 0 {
        return Err(malformed(
            densities_path,
            last_line,
            format!(
                "incomplete table: {} of {} expected rows missing",
                missing,
                seen.len()
            ),
        ));
    }

    Ok(SemiRotamericTable::from_parts(
        layout,
        options,
        definitions.wells,
        definitions.chi_means,
        definitions.chi_sds,
        density_grids,
    ))
}
