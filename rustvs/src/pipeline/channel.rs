use log::{info, warn};
use serde::{Deserialize, Serialize};
use vscore::algorithm::baseline::{extract_baselines, Detrend};
use vscore::algorithm::duplicates::resolve_duplicates;
use vscore::algorithm::ownership::VoxelOwnership;
use vscore::algorithm::validity::mask_validity;
use vscore::data::cell::{check_bounds, check_frames, repair_non_finite, select_valid, Cell};
use vscore::data::volume::{VolumeDims, VolumeIndex};
use vscore::error::CoreError;
use vscore::executor::{ExecutionPath, Executor};

use crate::data::catalogue::CleanCellCatalogue;
use crate::data::layout::RunLayout;
use crate::data::raw::{CandidateCellFile, VolumeFile};
use crate::error::CleanError;

/// Everything read from storage for one channel.
#[derive(Clone, Debug)]
pub struct ChannelInput {
    pub dims: VolumeDims,
    pub frames: usize,
    pub cells: Vec<Cell>,
    pub volume_mask: Vec<bool>,
    pub background: Vec<f32>,
}

impl ChannelInput {
    pub fn load(layout: &RunLayout, color: usize) -> Result<Self, CleanError> {
        let cells_path = layout.candidate_cells(color);
        let raw = CandidateCellFile::load(&cells_path)?;
        let dims = raw.dims();
        let frames = raw.frames();
        let cells = raw.into_cells(&cells_path)?;

        let volume_path = layout.volume(color);
        let volume = VolumeFile::load(&volume_path)?;
        if volume.dims() != dims {
            return Err(CleanError::malformed(
                &volume_path,
                format!("volume grid {} differs from cell grid {}", volume.dims(), dims),
            ));
        }

        Ok(ChannelInput {
            dims,
            frames,
            cells,
            volume_mask: volume.volume_mask,
            background: volume.background,
        })
    }
}

/// Diagnostics of one cleaned channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelReport {
    pub candidates: usize,
    /// Cells whose raw timeseries had non-finite samples zeroed.
    pub repaired_timeseries: usize,
    /// Cells passing the mask occupancy threshold.
    pub mask_valid: usize,
    pub overlapping_pairs: usize,
    pub duplicates_removed: usize,
    pub survivors: usize,
    pub owned_voxels: usize,
    pub baseline_path: ExecutionPath,
}

/// Run duplicate resolution, baseline extraction and ownership assignment on one channel.
///
/// The input is checked first: every timeseries must have `frames` samples, every
/// voxel must lie inside `dims`, and the mask and background must cover the grid.
pub fn process_channel<D: Detrend>(
    input: ChannelInput,
    thr_mask: f64,
    executor: &Executor,
    detrender: &D,
) -> Result<(CleanCellCatalogue, ChannelReport), CoreError> {
    let ChannelInput {
        dims,
        frames,
        mut cells,
        volume_mask,
        background,
    } = input;
    check_frames(&cells, frames)?;
    check_bounds(&cells, dims)?;
    dims.check_len(volume_mask.len())?;
    dims.check_len(background.len())?;
    let candidates = cells.len();

    let repaired_timeseries = repair_non_finite(&mut cells);
    if repaired_timeseries > 0 {
        warn!(
            "{} cells had non-finite samples, replaced with zero",
            repaired_timeseries
        );
    }

    let mut valid = mask_validity(&cells, dims, &volume_mask, thr_mask)?;
    let mask_valid = valid.iter().filter(|&&v| v).count();

    let index = VolumeIndex::build(dims, &cells, &valid);
    let duplicates = resolve_duplicates(&cells, &mut valid, &index);
    drop(index);

    let survivors = select_valid(cells, &valid);
    info!(
        "{} candidates, {} inside mask, {} duplicates removed, {} survivors",
        candidates,
        mask_valid,
        duplicates.removed.len(),
        survivors.len()
    );

    let baselines = extract_baselines(executor, detrender, &survivors);
    let ownership = VoxelOwnership::assign(dims, &survivors);

    let report = ChannelReport {
        candidates,
        repaired_timeseries,
        mask_valid,
        overlapping_pairs: duplicates.pairs,
        duplicates_removed: duplicates.removed.len(),
        survivors: survivors.len(),
        owned_voxels: ownership.owned_voxels(),
        baseline_path: baselines.path,
    };

    let catalogue = CleanCellCatalogue::assemble(
        dims,
        frames,
        &survivors,
        &baselines.results,
        &ownership,
        background,
    );

    Ok((catalogue, report))
}

/// Result of visiting one channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ChannelOutcome {
    /// A clean catalogue already existed; nothing was read or written.
    Skipped,
    Cleaned(ChannelReport),
    /// The channel aborted; its catalogue is absent and intermediates stay.
    Failed(String),
}

/// Clean one channel unless its catalogue already exists.
pub fn clean_channel<D: Detrend>(
    layout: &RunLayout,
    color: usize,
    thr_mask: f64,
    compress: bool,
    executor: &Executor,
    detrender: &D,
) -> Result<ChannelOutcome, CleanError> {
    let target = layout.clean_catalogue(color);
    if target.is_file() {
        info!("channel {}: {} exists, skipping", color, target.display());
        return Ok(ChannelOutcome::Skipped);
    }

    info!("channel {}: cleaning cells", color);
    let input = ChannelInput::load(layout, color)?;
    let (catalogue, report) = process_channel(input, thr_mask, executor, detrender)
        .map_err(|e| CleanError::cells(&layout.candidate_cells(color), e))?;

    catalogue.save(&target, compress)?;
    info!(
        "channel {}: wrote {} cells to {}",
        color,
        catalogue.n,
        target.display()
    );

    Ok(ChannelOutcome::Cleaned(report))
}
