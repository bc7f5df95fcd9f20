use serde::{Deserialize, Serialize};

use crate::data::cell::Cell;
use crate::data::volume::{VolumeDims, Voxel};

/// Sentinel written to the stored ownership volume where no cell owns a voxel.
pub const NO_OWNER: i64 = -1;

/// Dense per-voxel record of the strongest surviving cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoxelOwnership {
    dims: VolumeDims,
    owner: Vec<Option<usize>>,
    weight: Vec<f64>,
}

impl VoxelOwnership {
    /// Assign each voxel to the cell with the largest weight there.
    ///
    /// Cells are visited in index order and voxels in cell order; a claimant only
    /// replaces the current owner with a strictly larger weight, so the first cell
    /// reaching the maximum keeps the voxel. Voxels start at weight zero, hence
    /// non-positive weights never claim anything.
    pub fn assign(dims: VolumeDims, cells: &[Cell]) -> Self {
        let mut owner = vec![None; dims.len()];
        let mut weight = vec![0.0; dims.len()];

        for (i, cell) in cells.iter().enumerate() {
            for (&v, &w) in cell.voxels.iter().zip(cell.weights.iter()) {
                let k = dims.linear(v);
                if w > weight[k] {
                    owner[k] = Some(i);
                    weight[k] = w;
                }
            }
        }

        VoxelOwnership { dims, owner, weight }
    }

    pub fn dims(&self) -> VolumeDims {
        self.dims
    }

    pub fn owner_at(&self, v: Voxel) -> Option<usize> {
        self.owner[self.dims.linear(v)]
    }

    pub fn weight_at(&self, v: Voxel) -> f64 {
        self.weight[self.dims.linear(v)]
    }

    /// Number of voxels with an owner.
    pub fn owned_voxels(&self) -> usize {
        self.owner.iter().filter(|o| o.is_some()).count()
    }

    /// Owners in linear voxel order, [`NO_OWNER`] where unowned.
    pub fn owner_ids(&self) -> Vec<i64> {
        self.owner
            .iter()
            .map(|o| o.map_or(NO_OWNER, |i| i as i64))
            .collect()
    }

    /// Owner weights in linear voxel order, zero where unowned.
    pub fn weights(&self) -> &[f64] {
        &self.weight
    }
}
