use crate::core::error::LibraryLoadError;

/// Maximum rotameric chi dimensions for a fully rotameric table.
pub const MAX_ROTAMERIC_CHI: usize = 4;
/// Maximum rotameric chi dimensions for a semi-rotameric table.
///
/// Semi-rotameric statistical tables are only defined for one or two
/// rotameric chi dimensions in this system.
pub const MAX_SEMI_ROTAMERIC_CHI: usize = 2;
/// Maximum backbone torsion dimensions for either table family.
pub const MAX_BACKBONE_TORSIONS: usize = 5;

/// The two statistical-model families a library file can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LibraryKind {
    /// Discrete bins over every chi angle.
    Rotameric,
    /// Discrete bins over the rotameric chi angles, a continuous density
    /// curve over one additional non-rotameric chi.
    SemiRotameric,
}

/// The dimensional key a load request asks the dispatcher to satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantKey {
    pub rotameric_chi: usize,
    pub backbone_torsions: usize,
    pub kind: LibraryKind,
}

/// The table shape the dispatcher selected for a supported key.
///
/// Dimensions always equal the requested key's; selection validates, it never
/// clamps or substitutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayout {
    pub rotameric_chi: usize,
    pub backbone_torsions: usize,
    pub kind: LibraryKind,
}

/// Selects the table shape for a dimensional key.
///
/// The supported rectangle is chi 1..=4 x bb 1..=5 for rotameric tables and
/// chi 1..=2 x bb 1..=5 for semi-rotameric tables. Any key outside is an
/// [`LibraryLoadError::UnsupportedDimension`] naming the offending counts.
pub fn select(key: VariantKey) -> Result<TableLayout, LibraryLoadError> {
    let max_chi = match key.kind {
        LibraryKind::Rotameric => MAX_ROTAMERIC_CHI,
        LibraryKind::SemiRotameric => MAX_SEMI_ROTAMERIC_CHI,
    };

    let chi_supported = (1..=max_chi).contains(&key.rotameric_chi);
    let bb_supported = (1..=MAX_BACKBONE_TORSIONS).contains(&key.backbone_torsions);
    if !chi_supported || !bb_supported {
        return Err(LibraryLoadError::UnsupportedDimension {
            kind: key.kind,
            rotameric_chi: key.rotameric_chi,
            backbone_torsions: key.backbone_torsions,
        });
    }

    Ok(TableLayout {
        rotameric_chi: key.rotameric_chi,
        backbone_torsions: key.backbone_torsions,
        kind: key.kind,
    })
}
