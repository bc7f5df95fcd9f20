use serde::{Deserialize, Serialize};

use crate::data::volume::{VolumeDims, Voxel};
use crate::error::CoreError;

/// One candidate cell of a channel, trimmed to its valid voxel prefix.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Voxels belonging to the cell, in detection order.
    pub voxels: Vec<Voxel>,
    /// Per-voxel weights, parallel to `voxels`.
    pub weights: Vec<f64>,
    /// Raw fluorescence, one value per acquisition timepoint.
    pub timeseries: Vec<f64>,
}

impl Cell {
    pub fn new(voxels: Vec<Voxel>, weights: Vec<f64>, timeseries: Vec<f64>) -> Self {
        debug_assert_eq!(voxels.len(), weights.len());
        Cell {
            voxels,
            weights,
            timeseries,
        }
    }

    /// Build a cell from padded container rows, keeping the first `length` entries.
    ///
    /// # Arguments
    ///
    /// * `index` - position of the cell in its channel, used for error reporting
    /// * `xyz` - padded voxel coordinates
    /// * `weights` - padded per-voxel weights
    /// * `length` - number of valid leading entries
    /// * `timeseries` - raw timeseries
    pub fn from_padded(
        index: usize,
        xyz: &[[u32; 3]],
        weights: &[f64],
        length: usize,
        timeseries: Vec<f64>,
    ) -> Result<Self, CoreError> {
        if length > xyz.len() {
            return Err(CoreError::LengthOverflow {
                cell: index,
                what: "coordinate",
                length,
                capacity: xyz.len(),
            });
        }
        if length > weights.len() {
            return Err(CoreError::LengthOverflow {
                cell: index,
                what: "weight",
                length,
                capacity: weights.len(),
            });
        }

        Ok(Cell {
            voxels: xyz[..length].iter().map(|&v| Voxel::from(v)).collect(),
            weights: weights[..length].to_vec(),
            timeseries,
        })
    }

    /// Number of valid voxels.
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Sum of the per-voxel weights, ignoring NaN entries.
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().filter(|w| !w.is_nan()).sum()
    }

    /// Replace every non-finite sample of the timeseries with zero.
    ///
    /// Returns true if anything was replaced.
    pub fn zero_non_finite(&mut self) -> bool {
        let mut touched = false;
        for value in self.timeseries.iter_mut().filter(|v| !v.is_finite()) {
            *value = 0.0;
            touched = true;
        }
        touched
    }
}

/// Zero the non-finite samples of every cell, returning the number of cells affected.
pub fn repair_non_finite(cells: &mut [Cell]) -> usize {
    cells
        .iter_mut()
        .map(|cell| cell.zero_non_finite())
        .filter(|&touched| touched)
        .count()
}

/// Verify that every voxel lies inside `dims`.
pub fn check_bounds(cells: &[Cell], dims: VolumeDims) -> Result<(), CoreError> {
    for (i, cell) in cells.iter().enumerate() {
        if let Some(v) = cell.voxels.iter().find(|&&v| !dims.contains(v)) {
            return Err(CoreError::VoxelOutOfBounds {
                cell: i,
                x: v.x,
                y: v.y,
                z: v.z,
                dims,
            });
        }
    }
    Ok(())
}

/// Verify that every timeseries has `frames` samples.
pub fn check_frames(cells: &[Cell], frames: usize) -> Result<(), CoreError> {
    match cells
        .iter()
        .enumerate()
        .find(|(_, c)| c.timeseries.len() != frames)
    {
        Some((i, c)) => Err(CoreError::FrameCount {
            cell: i,
            expected: frames,
            found: c.timeseries.len(),
        }),
        None => Ok(()),
    }
}

/// Keep the cells flagged in `valid`, preserving order.
pub fn select_valid(cells: Vec<Cell>, valid: &[bool]) -> Vec<Cell> {
    cells
        .into_iter()
        .zip(valid.iter())
        .filter_map(|(cell, &keep)| keep.then_some(cell))
        .collect()
}
