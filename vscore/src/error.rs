use thiserror::Error;

use crate::data::volume::VolumeDims;

/// Errors raised while assembling or checking a channel's cells.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("cell {cell}: valid length {length} exceeds {what} capacity {capacity}")]
    LengthOverflow {
        cell: usize,
        what: &'static str,
        length: usize,
        capacity: usize,
    },

    #[error("cell {cell}: timeseries has {found} frames, expected {expected}")]
    FrameCount {
        cell: usize,
        expected: usize,
        found: usize,
    },

    #[error("cell {cell}: voxel ({x}, {y}, {z}) lies outside the {dims} grid")]
    VoxelOutOfBounds {
        cell: usize,
        x: u32,
        y: u32,
        z: u32,
        dims: VolumeDims,
    },

    #[error("volume has {found} entries, the {dims} grid needs {expected}")]
    VolumeSize {
        dims: VolumeDims,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

/// Failures of the parallel map. These are recoverable: callers fall back
/// to the sequential executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to build thread pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),

    #[error("worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("parallel map returned {found} results for {expected} inputs")]
    LostResults { expected: usize, found: usize },
}
