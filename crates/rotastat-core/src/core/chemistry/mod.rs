use serde::Deserialize;

/// Declares which statistical library backs a residue type and how its
/// dimensions are laid out.
///
/// Owned by the residue chemistry; this subsystem only reads it. The declared
/// counts are cross-checked against the counts derived from the residue's
/// rotatable bonds before any file is opened.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibrarySpecification {
    /// Path of the backing file, relative to the search roots.
    pub relative_path: String,
    /// Number of rotameric chi dimensions the table is binned over.
    pub rotameric_chi_count: usize,
    /// Number of backbone torsions the table is conditioned on.
    pub backbone_torsion_count: usize,
    /// Discrete over some chi angles, continuous over one extra chi.
    #[serde(default)]
    pub semi_rotameric: bool,
    /// Chi-bin subdivision per rotameric chi dimension.
    pub n_bin_per_rot: usize,
    /// Whether the continuous chi dimension's density is mirror-symmetric.
    #[serde(default)]
    pub nrchi_symmetric: bool,
    /// Zero reference of the continuous chi dimension's domain, in degrees.
    #[serde(default)]
    pub nrchi_start_angle: f64,
}

/// The read-only facts this subsystem needs from a residue type.
///
/// Supplied by the residue-chemistry collaborator; everything else about the
/// residue (atoms, bonds, conformation) stays outside this subsystem.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResidueChemistry {
    /// Full residue type name, used in diagnostics.
    pub name: String,
    /// Short residue code; the file stem for paired semi-rotameric streams.
    pub code: String,
    /// Total declared chi angles, proton chis included.
    pub total_chi: usize,
    /// Chi angles that only rotate a proton.
    pub proton_chi_count: usize,
    /// Peptoid backbones condition on an auxiliary pre-torsion.
    #[serde(default)]
    pub is_peptoid: bool,
    /// Beta-amino-acid backbones use the reduced-resolution torsion grid.
    #[serde(default)]
    pub is_beta: bool,
    /// The statistical library backing this residue type.
    pub specification: LibrarySpecification,
}

/// The dimensional key derived from a residue's declared chemistry.
///
/// Selects a model shape together with the library specification. Derivation
/// is pure and never fails; an absent chi is a valid zero count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResidueDescriptor {
    pub total_chi: usize,
    pub proton_chi_count: usize,
    /// `total_chi - proton_chi_count`, minus one more for the continuous chi
    /// of a semi-rotameric library.
    pub rotameric_chi_count: usize,
    /// Declared backbone torsions, plus the peptoid pre-torsion when present.
    pub backbone_torsion_count: usize,
    pub is_rotameric: bool,
    pub is_peptoid: bool,
    pub is_reduced_resolution: bool,
}

/// Derives the dimensional key for a residue type from its declared chemistry.
pub fn derive_descriptor(chemistry: &ResidueChemistry) -> ResidueDescriptor {
    let spec = &chemistry.specification;
    let is_rotameric = !spec.semi_rotameric;

    let heavy_chi = chemistry.total_chi.saturating_sub(chemistry.proton_chi_count);
    // The non-rotameric chi of a semi-rotameric library is not binned.
    let rotameric_chi_count = if is_rotameric {
        heavy_chi
    } else {
        heavy_chi.saturating_sub(1)
    };

    let mut backbone_torsion_count = spec.backbone_torsion_count;
    if chemistry.is_peptoid {
        backbone_torsion_count += 1;
    }

    ResidueDescriptor {
        total_chi: chemistry.total_chi,
        proton_chi_count: chemistry.proton_chi_count,
        rotameric_chi_count,
        backbone_torsion_count,
        is_rotameric,
        is_peptoid: chemistry.is_peptoid,
        is_reduced_resolution: chemistry.is_beta,
    }
}
