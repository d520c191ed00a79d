//! fpfs::layout — FPFS catalog columns and their resolved indices.
//!
//! The FPFS moment vector holds eight shapelet moments, `NPEAK` peak
//! (detection) modes, and the precomputed shear responses of each peak mode
//! for both components, in that order.
use crate::perturb::{errors::PerturbResult, layout::MomentLayout};
use std::sync::Arc;

/// Number of peak-detection channels.
pub const NPEAK: usize = 8;

/// Shapelet moment column names, in layout order.
pub const SHAPELET_NAMES: [&str; 8] = [
    "fpfs_M00", "fpfs_M20", "fpfs_M22c", "fpfs_M22s", "fpfs_M40", "fpfs_M42c", "fpfs_M42s",
    "fpfs_M60",
];

/// Full ordered FPFS column list (`8 + 3 · NPEAK` names).
pub fn fpfs_col_names() -> Vec<String> {
    let mut names: Vec<String> = SHAPELET_NAMES.iter().map(|s| s.to_string()).collect();
    names.extend((0..NPEAK).map(|i| format!("fpfs_v{i}")));
    names.extend((0..NPEAK).map(|i| format!("fpfs_v{i}_g1")));
    names.extend((0..NPEAK).map(|i| format!("fpfs_v{i}_g2")));
    names
}

/// The shared FPFS moment layout.
pub fn fpfs_layout() -> PerturbResult<Arc<MomentLayout>> {
    Ok(Arc::new(MomentLayout::new(fpfs_col_names())?))
}

/// Indices of the FPFS columns inside a given layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FpfsIndex {
    pub m00: usize,
    pub m20: usize,
    pub m22c: usize,
    pub m22s: usize,
    pub m40: usize,
    pub m42c: usize,
    pub m42s: usize,
    pub m60: usize,
    pub v: [usize; NPEAK],
    pub v_g1: [usize; NPEAK],
    pub v_g2: [usize; NPEAK],
}

impl FpfsIndex {
    /// Resolve every FPFS column name inside `layout`.
    ///
    /// # Errors
    /// [`PerturbError::UnknownMode`](crate::perturb::errors::PerturbError::UnknownMode)
    /// for the first FPFS column missing from `layout`.
    pub fn resolve(layout: &MomentLayout) -> PerturbResult<Self> {
        let peaks = |suffix: &str| -> PerturbResult<[usize; NPEAK]> {
            let mut out = [0; NPEAK];
            for (i, slot) in out.iter_mut().enumerate() {
                *slot = layout.index_of(&format!("fpfs_v{i}{suffix}"))?;
            }
            Ok(out)
        };
        Ok(Self {
            m00: layout.index_of("fpfs_M00")?,
            m20: layout.index_of("fpfs_M20")?,
            m22c: layout.index_of("fpfs_M22c")?,
            m22s: layout.index_of("fpfs_M22s")?,
            m40: layout.index_of("fpfs_M40")?,
            m42c: layout.index_of("fpfs_M42c")?,
            m42s: layout.index_of("fpfs_M42s")?,
            m60: layout.index_of("fpfs_M60")?,
            v: peaks("")?,
            v_g1: peaks("_g1")?,
            v_g2: peaks("_g2")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perturb::errors::PerturbError;

    #[test]
    // Purpose
    // -------
    // The default layout lists shapelets, peaks, then peak responses.
    fn default_layout_order() {
        let layout = fpfs_layout().unwrap();
        assert_eq!(layout.len(), 8 + 3 * NPEAK);
        let idx = FpfsIndex::resolve(&layout).unwrap();
        assert_eq!((idx.m00, idx.m22c, idx.m60), (0, 2, 7));
        assert_eq!(idx.v[0], 8);
        assert_eq!(idx.v_g1[0], 16);
        assert_eq!(idx.v_g2[NPEAK - 1], 31);
    }

    #[test]
    // Purpose
    // -------
    // A layout missing an FPFS column fails to resolve with the column name.
    fn resolve_reports_missing_column() {
        let layout = MomentLayout::new(SHAPELET_NAMES).unwrap();
        let err = FpfsIndex::resolve(&layout).unwrap_err();
        assert_eq!(err, PerturbError::UnknownMode { name: "fpfs_v0".to_string() });
    }
}
