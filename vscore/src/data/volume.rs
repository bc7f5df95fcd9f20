use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::cell::Cell;
use crate::error::CoreError;

/// Integer voxel address inside a channel's grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Voxel {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Voxel {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Voxel { x, y, z }
    }
}

impl From<[u32; 3]> for Voxel {
    fn from(xyz: [u32; 3]) -> Self {
        Voxel::new(xyz[0], xyz[1], xyz[2])
    }
}

impl From<Voxel> for [u32; 3] {
    fn from(v: Voxel) -> Self {
        [v.x, v.y, v.z]
    }
}

/// Extent of a channel's voxel grid.
///
/// Dense per-voxel arrays are laid out x-major: `(x * dim_y + y) * dim_z + z`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeDims {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl VolumeDims {
    pub fn new(x: usize, y: usize, z: usize) -> Self {
        VolumeDims { x, y, z }
    }

    /// Number of voxels in the grid.
    pub fn len(&self) -> usize {
        self.x * self.y * self.z
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, v: Voxel) -> bool {
        (v.x as usize) < self.x && (v.y as usize) < self.y && (v.z as usize) < self.z
    }

    /// Linear offset of `v`. The voxel must lie inside the grid.
    #[inline]
    pub fn linear(&self, v: Voxel) -> usize {
        debug_assert!(self.contains(v), "voxel {:?} outside {}", v, self);
        (v.x as usize * self.y + v.y as usize) * self.z + v.z as usize
    }

    /// Inverse of [`VolumeDims::linear`].
    pub fn voxel_at(&self, index: usize) -> Voxel {
        let z = index % self.z;
        let y = (index / self.z) % self.y;
        let x = index / (self.z * self.y);
        Voxel::new(x as u32, y as u32, z as u32)
    }

    /// Check that a dense per-voxel array matches this grid.
    pub fn check_len(&self, found: usize) -> Result<(), CoreError> {
        if found != self.len() {
            return Err(CoreError::VolumeSize {
                dims: *self,
                expected: self.len(),
                found,
            });
        }
        Ok(())
    }
}

impl fmt::Display for VolumeDims {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

/// Voxel-to-cell membership index over the valid cells of one channel.
///
/// Stored as a compressed bucket grid: the members of the voxel with linear
/// offset `i` are `members[offsets[i]..offsets[i + 1]]`, in ascending cell order.
#[derive(Clone, Debug)]
pub struct VolumeIndex {
    dims: VolumeDims,
    offsets: Vec<usize>,
    members: Vec<usize>,
}

impl VolumeIndex {
    /// Bucket every voxel of every cell flagged in `valid`.
    ///
    /// All voxels must lie inside `dims` (see [`crate::data::cell::check_bounds`]).
    pub fn build(dims: VolumeDims, cells: &[Cell], valid: &[bool]) -> Self {
        let valid_cells = || {
            cells
                .iter()
                .enumerate()
                .zip(valid.iter())
                .filter(|(_, keep)| **keep)
                .map(|((i, cell), _)| (i, cell))
        };

        // counting pass, shifted by one so the prefix sum yields bucket starts
        let mut offsets = vec![0usize; dims.len() + 1];
        for (_, cell) in valid_cells() {
            for &v in &cell.voxels {
                offsets[dims.linear(v) + 1] += 1;
            }
        }
        for i in 1..offsets.len() {
            offsets[i] += offsets[i - 1];
        }

        let mut cursor = offsets.clone();
        let mut members = vec![0usize; offsets[dims.len()]];
        for (i, cell) in valid_cells() {
            for &v in &cell.voxels {
                let bucket = dims.linear(v);
                members[cursor[bucket]] = i;
                cursor[bucket] += 1;
            }
        }

        VolumeIndex { dims, offsets, members }
    }

    pub fn dims(&self) -> VolumeDims {
        self.dims
    }

    /// Cells occupying the voxel at linear offset `index`.
    pub fn members(&self, index: usize) -> &[usize] {
        &self.members[self.offsets[index]..self.offsets[index + 1]]
    }

    pub fn members_at(&self, v: Voxel) -> &[usize] {
        self.members(self.dims.linear(v))
    }

    /// Iterate over all buckets in linear order, empty ones included.
    pub fn buckets(&self) -> impl Iterator<Item = &[usize]> + '_ {
        self.offsets
            .windows(2)
            .map(move |w| &self.members[w[0]..w[1]])
    }

    /// Total number of (voxel, cell) memberships.
    pub fn total_memberships(&self) -> usize {
        self.members.len()
    }

    pub fn contains_cell(&self, cell: usize) -> bool {
        self.members.contains(&cell)
    }
}
