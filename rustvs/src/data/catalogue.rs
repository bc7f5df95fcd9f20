use std::path::Path;

use serde::{Deserialize, Serialize};
use vscore::algorithm::baseline::BaselineResult;
use vscore::algorithm::ownership::VoxelOwnership;
use vscore::data::cell::Cell;
use vscore::data::volume::{VolumeDims, Voxel};

use crate::data::container::{load_bincode, save_atomic};
use crate::data::raw::CONTAINER_VERSION;
use crate::error::CleanError;

/// Deduplicated, baseline-corrected cells of one channel.
///
/// Per-cell rows are indexed by surviving-cell position; `volume_id` refers to
/// the same positions and holds `-1` for unowned voxels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CleanCellCatalogue {
    pub version: u32,
    pub n: usize,
    pub t: usize,
    pub x: usize,
    pub y: usize,
    pub z: usize,
    pub cell_x: Vec<Vec<u32>>,
    pub cell_y: Vec<Vec<u32>>,
    pub cell_z: Vec<Vec<u32>>,
    pub volume_id: Vec<i64>,
    pub volume_weight: Vec<f64>,
    pub cell_weights: Vec<Vec<f32>>,
    pub cell_timeseries_raw: Vec<Vec<f32>>,
    pub cell_timeseries: Vec<Vec<f32>>,
    pub cell_baseline: Vec<Vec<f32>>,
    pub background: Vec<f32>,
}

fn to_f32(values: &[f64]) -> Vec<f32> {
    values.iter().map(|&v| v as f32).collect()
}

fn coords(cells: &[Cell], axis: fn(&Voxel) -> u32) -> Vec<Vec<u32>> {
    cells
        .iter()
        .map(|c| c.voxels.iter().map(axis).collect())
        .collect()
}

impl CleanCellCatalogue {
    /// Collect the surviving cells and their per-channel products.
    ///
    /// `baselines` must be positionally paired with `cells`.
    pub fn assemble(
        dims: VolumeDims,
        frames: usize,
        cells: &[Cell],
        baselines: &[BaselineResult],
        ownership: &VoxelOwnership,
        background: Vec<f32>,
    ) -> Self {
        debug_assert_eq!(cells.len(), baselines.len());

        CleanCellCatalogue {
            version: CONTAINER_VERSION,
            n: cells.len(),
            t: frames,
            x: dims.x,
            y: dims.y,
            z: dims.z,
            cell_x: coords(cells, |v| v.x),
            cell_y: coords(cells, |v| v.y),
            cell_z: coords(cells, |v| v.z),
            volume_id: ownership.owner_ids(),
            volume_weight: ownership.weights().to_vec(),
            cell_weights: cells.iter().map(|c| to_f32(&c.weights)).collect(),
            cell_timeseries_raw: cells.iter().map(|c| to_f32(&c.timeseries)).collect(),
            cell_timeseries: baselines.iter().map(|b| to_f32(&b.corrected)).collect(),
            cell_baseline: baselines.iter().map(|b| to_f32(&b.baseline)).collect(),
            background,
        }
    }

    pub fn dims(&self) -> VolumeDims {
        VolumeDims::new(self.x, self.y, self.z)
    }

    /// Write atomically: `path` never refers to a partial catalogue.
    pub fn save(&self, path: &Path, compress: bool) -> Result<(), CleanError> {
        save_atomic(path, self, compress)
    }

    pub fn load(path: &Path) -> Result<Self, CleanError> {
        load_bincode(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vscore::algorithm::ownership::NO_OWNER;

    #[test]
    fn test_assemble_pairs_rows_with_cells() {
        let dims = VolumeDims::new(2, 1, 1);
        let cells = vec![
            Cell::new(vec![Voxel::new(1, 0, 0)], vec![0.5], vec![1.0, 2.0]),
            Cell::new(vec![Voxel::new(1, 0, 0)], vec![0.75], vec![3.0, 4.0]),
        ];
        let baselines = vec![
            BaselineResult {
                corrected: vec![0.0, 1.0],
                baseline: vec![1.0, 1.0],
            },
            BaselineResult {
                corrected: vec![0.0, 1.0],
                baseline: vec![3.0, 3.0],
            },
        ];
        let ownership = VoxelOwnership::assign(dims, &cells);
        let cat = CleanCellCatalogue::assemble(dims, 2, &cells, &baselines, &ownership, vec![7.0; 2]);

        assert_eq!(cat.n, 2);
        assert_eq!(cat.cell_x, vec![vec![1], vec![1]]);
        assert_eq!(cat.volume_id, vec![NO_OWNER, 1]);
        assert_eq!(cat.volume_weight, vec![0.0, 0.75]);
        assert_eq!(cat.cell_baseline[1], vec![3.0, 3.0]);
        assert_eq!(cat.cell_timeseries_raw[0], vec![1.0, 2.0]);
        assert_eq!(cat.dims(), dims);
    }
}
