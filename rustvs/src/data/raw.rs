use std::path::Path;

use serde::{Deserialize, Serialize};
use vscore::data::cell::{check_bounds, check_frames, Cell};
use vscore::data::volume::VolumeDims;

use crate::data::container::{load_bincode, save_bincode};
use crate::error::CleanError;

pub const CONTAINER_VERSION: u32 = 1;

/// Candidate cells of one channel as produced by the detection stage.
///
/// Coordinate and weight rows are padded to a common length; `cell_lengths`
/// gives each row's valid prefix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateCellFile {
    pub version: u32,
    /// `[x, y, z, t]`
    pub dimensions: [usize; 4],
    pub cell_xyz: Vec<Vec<[u32; 3]>>,
    pub cell_weights: Vec<Vec<f64>>,
    pub cell_timeseries: Vec<Vec<f64>>,
    pub cell_lengths: Vec<usize>,
}

impl CandidateCellFile {
    /// Pack cells into padded rows of the longest cell's length.
    ///
    /// Padding uses the origin voxel and NaN weights.
    pub fn from_cells(dims: VolumeDims, frames: usize, cells: &[Cell]) -> Self {
        let width = cells.iter().map(Cell::len).max().unwrap_or(0);

        CandidateCellFile {
            version: CONTAINER_VERSION,
            dimensions: [dims.x, dims.y, dims.z, frames],
            cell_xyz: cells
                .iter()
                .map(|c| {
                    let mut xyz: Vec<[u32; 3]> = c.voxels.iter().map(|&v| v.into()).collect();
                    xyz.resize(width, [0, 0, 0]);
                    xyz
                })
                .collect(),
            cell_weights: cells
                .iter()
                .map(|c| {
                    let mut w = c.weights.clone();
                    w.resize(width, f64::NAN);
                    w
                })
                .collect(),
            cell_timeseries: cells.iter().map(|c| c.timeseries.clone()).collect(),
            cell_lengths: cells.iter().map(Cell::len).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, CleanError> {
        load_bincode(path)
    }

    pub fn save(&self, path: &Path, compress: bool) -> Result<(), CleanError> {
        save_bincode(path, self, compress)
    }

    pub fn dims(&self) -> VolumeDims {
        VolumeDims::new(self.dimensions[0], self.dimensions[1], self.dimensions[2])
    }

    pub fn frames(&self) -> usize {
        self.dimensions[3]
    }

    pub fn len(&self) -> usize {
        self.cell_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_lengths.is_empty()
    }

    /// Unpack into trimmed cells, checking row counts, frame counts and voxel bounds.
    ///
    /// `path` is only used for error reporting.
    pub fn into_cells(self, path: &Path) -> Result<Vec<Cell>, CleanError> {
        let n = self.cell_lengths.len();
        for (what, rows) in [
            ("cell_xyz", self.cell_xyz.len()),
            ("cell_weights", self.cell_weights.len()),
            ("cell_timeseries", self.cell_timeseries.len()),
        ] {
            if rows != n {
                return Err(CleanError::malformed(
                    path,
                    format!("{} has {} rows for {} cells", what, rows, n),
                ));
            }
        }

        let dims = self.dims();
        let frames = self.frames();

        let cells = self
            .cell_xyz
            .iter()
            .zip(self.cell_weights.iter())
            .zip(self.cell_lengths.iter())
            .zip(self.cell_timeseries)
            .enumerate()
            .map(|(i, (((xyz, w), &len), ts))| Cell::from_padded(i, xyz, w, len, ts))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CleanError::cells(path, e))?;

        check_frames(&cells, frames).map_err(|e| CleanError::cells(path, e))?;
        check_bounds(&cells, dims).map_err(|e| CleanError::cells(path, e))?;
        Ok(cells)
    }
}

/// Whole-volume occupancy mask and background image of one channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VolumeFile {
    pub version: u32,
    /// `[x, y, z]`
    pub dimensions: [usize; 3],
    /// x-major linearized occupancy.
    pub volume_mask: Vec<bool>,
    /// x-major linearized background intensity.
    pub background: Vec<f32>,
}

impl VolumeFile {
    pub fn new(dims: VolumeDims, volume_mask: Vec<bool>, background: Vec<f32>) -> Self {
        VolumeFile {
            version: CONTAINER_VERSION,
            dimensions: [dims.x, dims.y, dims.z],
            volume_mask,
            background,
        }
    }

    /// Load and check both arrays against the stored dimensions.
    pub fn load(path: &Path) -> Result<Self, CleanError> {
        let vf: VolumeFile = load_bincode(path)?;
        let dims = vf.dims();
        dims.check_len(vf.volume_mask.len())
            .and_then(|_| dims.check_len(vf.background.len()))
            .map_err(|e| CleanError::cells(path, e))?;
        Ok(vf)
    }

    pub fn save(&self, path: &Path, compress: bool) -> Result<(), CleanError> {
        save_bincode(path, self, compress)
    }

    pub fn dims(&self) -> VolumeDims {
        VolumeDims::new(self.dimensions[0], self.dimensions[1], self.dimensions[2])
    }
}
