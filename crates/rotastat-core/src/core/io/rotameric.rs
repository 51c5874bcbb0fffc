use super::{malformed, parse_float, parse_index, read_data_lines};
use crate::core::error::LibraryLoadError;
use crate::core::models::ModelOptions;
use crate::core::models::grid::{PeriodicGrid, backbone_axes};
use crate::core::models::layout::TableLayout;
use crate::core::models::rotameric::RotamericTable;
use std::io::BufRead;
use std::path::Path;
use tracing::warn;

/// Reads a single-stream rotameric table.
///
/// One row per (backbone-bin combination, rotamer):
///
/// ```text
/// <code> <bb_1..bb_n> <count> <well_1..well_T> <prob> <mean_1..mean_T> <sd_1..sd_T>
/// ```
///
/// Backbone angles must sit on the expected grid, every combination of
/// backbone bin and chi-bin assignment must appear exactly once, and the
/// first structural inconsistency aborts the whole load.
pub fn read_rotameric(
    reader: impl BufRead,
    path: &Path,
    layout: TableLayout,
    reduced_resolution: bool,
    n_bin_per_rot: usize,
    options: ModelOptions,
) -> Result<RotamericTable, LibraryLoadError> {
    if n_bin_per_rot == 0 {
        return Err(malformed(
            path,
            1,
            "chi-bin subdivision count must be positive",
        ));
    }

    let chi_count = layout.rotameric_chi;
    let backbone_count = layout.backbone_torsions;
    let axes = backbone_axes(backbone_count, reduced_resolution);
    let rotamer_count = n_bin_per_rot.pow(chi_count as u32);
    let expected_columns = 3 + backbone_count + 3 * chi_count;

    let mut probabilities: Vec<PeriodicGrid> = (0..rotamer_count)
        .map(|_| PeriodicGrid::zeros(axes.clone()))
        .collect();
    let mut chi_means: Vec<Vec<PeriodicGrid>> = (0..rotamer_count)
        .map(|_| (0..chi_count).map(|_| PeriodicGrid::zeros(axes.clone())).collect())
        .collect();
    let mut chi_sds = chi_means.clone();
    let node_count = probabilities[0].node_count();
    let mut seen = vec![false; rotamer_count * node_count];
    let mut wells_by_rotamer = vec![Vec::new(); rotamer_count];
    let mut residue_code: Option<String> = None;

    let lines = read_data_lines(reader, path)?;
    let last_line = lines.last().map(|(number, _)| *number).unwrap_or(0);

    for (line_number, line) in &lines {
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

        if let Some(code) = &residue_code {
            if code.as_str() != tokens[0] {
                return Err(malformed(
                    path,
                    line_number,
                    format!(
                        "inconsistent residue code '{}' (first row used '{}')",
                        tokens[0], code
                    ),
                ));
            }
        } else {
            residue_code = Some(tokens[0].to_string());
        }

        let mut backbone_bins = Vec::with_capacity(backbone_count);
        for (d, token) in tokens[1..1 + backbone_count].iter().enumerate() {
            let angle = parse_float(token, "backbone angle", path, line_number)?;
            let bin = axes[d].nearest_bin(angle).ok_or_else(|| {
                malformed(
                    path,
                    line_number,
                    format!(
                        "backbone angle {} is not on the expected {}-degree grid",
                        angle, axes[d].step
                    ),
                )
            })?;
            backbone_bins.push(bin);
        }

        parse_index(tokens[1 + backbone_count], "observation count", path, line_number)?;

        let well_tokens = &tokens[2 + backbone_count..2 + backbone_count + chi_count];
        let mut wells = Vec::with_capacity(chi_count);
        let mut rotamer = 0;
        for token in well_tokens {
            let well = parse_index(token, "chi bin", path, line_number)?;
            if !(1..=n_bin_per_rot).contains(&well) {
                return Err(malformed(
                    path,
                    line_number,
                    format!("chi bin {} out of range 1..={}", well, n_bin_per_rot),
                ));
            }
            rotamer = rotamer * n_bin_per_rot + (well - 1);
            wells.push(well);
        }

        let probability_column = 2 + backbone_count + chi_count;
        let probability =
            parse_float(tokens[probability_column], "probability", path, line_number)?;
        if !(0.0..=1.0).contains(&probability) {
            return Err(malformed(
                path,
                line_number,
                format!("probability {} outside [0, 1]", probability),
            ));
        }

        let mean_tokens = &tokens[probability_column + 1..probability_column + 1 + chi_count];
        let sd_tokens = &tokens[probability_column + 1 + chi_count..];
        let mut means = Vec::with_capacity(chi_count);
        let mut sds = Vec::with_capacity(chi_count);
        for token in mean_tokens {
            means.push(parse_float(token, "chi mean", path, line_number)?);
        }
        for token in sd_tokens {
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

        let offset = probabilities[rotamer].offset(&backbone_bins);
        let slot = &mut seen[rotamer * node_count + offset];
        if *slot {
            return Err(malformed(
                path,
                line_number,
                "duplicate row for this backbone bin and rotamer",
            ));
        }
        *slot = true;

        probabilities[rotamer].set_flat(offset, probability);
        for i in 0..chi_count {
            chi_means[rotamer][i].set_flat(offset, means[i]);
            chi_sds[rotamer][i].set_flat(offset, sds[i]);
        }
        wells_by_rotamer[rotamer] = wells;
    }

    let missing = seen.iter().filter(|&&covered| !covered).count();
    if missing > 0 {
        return Err(malformed(
            path,
            last_line,
            format!(
                "incomplete table: {} of {} expected rows missing",
                missing,
                seen.len()
            ),
        ));
    }

    let unnormalized_bins = (0..node_count)
        .filter(|&offset| {
            let total: f64 = probabilities.iter().map(|g| g.get_flat(offset)).sum();
            (total - 1.0).abs() > 0.05
        })
        .count();
    if unnormalized_bins > 0 {
        warn!(
            path = %path.display(),
            bins = unnormalized_bins,
            "rotamer probabilities do not sum to 1 in every backbone bin"
        );
    }

    Ok(RotamericTable::from_parts(
        layout,
        options,
        wells_by_rotamer,
        probabilities,
        chi_means,
        chi_sds,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::layout::LibraryKind;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn layout() -> TableLayout {
        TableLayout {
            rotameric_chi: 1,
            backbone_torsions: 1,
            kind: LibraryKind::Rotameric,
        }
    }

    /// A reduced-resolution 1-bb, 1-chi table with two chi bins.
    fn well_formed() -> String {
        let mut out = String::from("# synthetic test library\n");
        for bin in 0..12 {
            let angle = -180.0 + 30.0 * bin as f64;
            out.push_str(&format!(
                "TST {angle:.1} 120 1 0.7 -60.0 9.0\nTST {angle:.1} 80 2 0.3 60.0 11.0\n"
            ));
        }
        out
    }

    fn read(content: &str) -> Result<RotamericTable, LibraryLoadError> {
        read_rotameric(
            Cursor::new(content),
            &PathBuf::from("TST.rotlib"),
            layout(),
            true,
            2,
            ModelOptions::default(),
        )
    }

    #[test]
    fn well_formed_table_loads_and_reproduces_stored_values() {
        let table = read(&well_formed()).unwrap();

        assert_eq!(table.rotamer_count(), 2);
        assert_eq!(table.wells(0), &[1]);
        assert_eq!(table.wells(1), &[2]);

        let energy = table.energy(&[-90.0], &[-60.0]).unwrap();
        assert!((energy - (-(0.7f64.ln()))).abs() < 1e-9);
    }

    #[test]
    fn wrong_column_count_names_the_line() {
        let mut content = well_formed();
        content.push_str("TST -180.0 5 1 0.7 -60.0\n");

        match read(&content) {
            Err(LibraryLoadError::MalformedLibrary { line, message, .. }) => {
                assert_eq!(line, 26);
                assert!(message.contains("columns"));
            }
            other => panic!("expected MalformedLibrary, got {:?}", other.err()),
        }
    }

    #[test]
    fn non_numeric_fields_are_fatal() {
        let content = well_formed().replace("0.7", "seven");

        assert!(matches!(
            read(&content),
            Err(LibraryLoadError::MalformedLibrary { .. })
        ));
    }

    #[test]
    fn off_grid_backbone_angles_are_fatal() {
        let content = well_formed().replace("-180.0 120", "-175.0 120");

        match read(&content) {
            Err(LibraryLoadError::MalformedLibrary { message, .. }) => {
                assert!(message.contains("grid"));
            }
            other => panic!("expected MalformedLibrary, got {:?}", other.err()),
        }
    }

    #[test]
    fn duplicate_rows_are_fatal() {
        let mut content = well_formed();
        content.push_str("TST -180.0 120 1 0.7 -60.0 9.0\n");

        match read(&content) {
            Err(LibraryLoadError::MalformedLibrary { message, .. }) => {
                assert!(message.contains("duplicate"));
            }
            other => panic!("expected MalformedLibrary, got {:?}", other.err()),
        }
    }

    #[test]
    fn missing_coverage_is_fatal() {
        let content: String = well_formed().lines().take(13).map(|l| format!("{l}\n")).collect();

        match read(&content) {
            Err(LibraryLoadError::MalformedLibrary { message, .. }) => {
                assert!(message.contains("incomplete"));
            }
            other => panic!("expected MalformedLibrary, got {:?}", other.err()),
        }
    }

    #[test]
    fn zero_standard_deviations_are_fatal() {
        let content = well_formed().replace("9.0", "0.0");

        assert!(matches!(
            read(&content),
            Err(LibraryLoadError::MalformedLibrary { .. })
        ));
    }

    #[test]
    fn out_of_range_chi_bins_are_fatal() {
        let content = well_formed().replace(" 120 1 ", " 120 3 ");

        match read(&content) {
            Err(LibraryLoadError::MalformedLibrary { message, .. }) => {
                assert!(message.contains("out of range"));
            }
            other => panic!("expected MalformedLibrary, got {:?}", other.err()),
        }
    }

    #[test]
    fn probabilities_outside_the_unit_interval_are_fatal() {
        let content = well_formed().replace("0.7", "1.7");

        match read(&content) {
            Err(LibraryLoadError::MalformedLibrary { message, .. }) => {
                assert!(message.contains("[0, 1]"));
            }
            other => panic!("expected MalformedLibrary, got {:?}", other.err()),
        }
    }
}
