use crate::data::cell::Cell;
use crate::data::volume::VolumeDims;
use crate::error::CoreError;

/// Fraction of a cell's voxels that fall inside the occupancy mask.
///
/// Empty cells have no occupancy.
pub fn mask_occupancy(cell: &Cell, dims: VolumeDims, mask: &[bool]) -> f64 {
    if cell.is_empty() {
        return 0.0;
    }
    let inside = cell
        .voxels
        .iter()
        .filter(|&&v| mask[dims.linear(v)])
        .count();
    inside as f64 / cell.len() as f64
}

/// Flag the cells whose mean mask occupancy exceeds `thr_mask`.
///
/// Cells without voxels are never valid, so they cannot reach duplicate resolution.
pub fn mask_validity(
    cells: &[Cell],
    dims: VolumeDims,
    mask: &[bool],
    thr_mask: f64,
) -> Result<Vec<bool>, CoreError> {
    dims.check_len(mask.len())?;

    Ok(cells
        .iter()
        .map(|cell| !cell.is_empty() && mask_occupancy(cell, dims, mask) > thr_mask)
        .collect())
}
