use std::fs;
use std::path::Path;

use rustvs::data::catalogue::CleanCellCatalogue;
use rustvs::data::config::{RunConfig, PARAMETER_FILE};
use rustvs::data::layout::RunLayout;
use rustvs::data::raw::{CandidateCellFile, VolumeFile};
use rustvs::pipeline::channel::ChannelOutcome;
use rustvs::pipeline::run::clean_cells;
use vscore::algorithm::ownership::NO_OWNER;
use vscore::data::cell::Cell;
use vscore::data::volume::{VolumeDims, Voxel};
use vscore::executor::{ExecutionPath, Executor, ParallelExecutor, SequentialExecutor};

const FRAMES: usize = 8;

fn dims() -> VolumeDims {
    VolumeDims::new(10, 4, 2)
}

fn config(root: &Path, n_colors: usize) -> RunConfig {
    RunConfig {
        dir_output: root.to_path_buf(),
        n_colors,
        thr_mask: 0.5,
        f_volume: 1.0,
        t_baseline: 3.0,
        num_threads: 2,
        parallel: false,
        compress: true,
        keep_intermediates: false,
    }
}

fn slab(x0: u32, x1: u32, total_weight: f64, timeseries: Vec<f64>) -> Cell {
    let voxels: Vec<Voxel> = (x0..x1)
        .flat_map(|x| (0..2).map(move |y| Voxel::new(x, y, 0)))
        .collect();
    let n = voxels.len();
    Cell::new(voxels, vec![total_weight / n as f64; n], timeseries)
}

fn ramp(scale: f64, jitter: f64) -> Vec<f64> {
    (0..FRAMES)
        .map(|t| scale * t as f64 + if t % 2 == 0 { jitter } else { -jitter })
        .collect()
}

/// Cell 0 and cell 1 are duplicates (8 of 10 voxels shared, correlated);
/// cell 2 is isolated; cell 3 lies outside the volume mask.
fn candidates() -> Vec<Cell> {
    let mut isolated = ramp(-0.5, 0.3);
    isolated[2] = f64::NAN;
    vec![
        slab(0, 5, 12.0, ramp(1.0, 0.0)),
        slab(1, 6, 7.0, ramp(1.0, 0.2)),
        slab(6, 8, 4.0, isolated),
        slab(9, 10, 9.0, ramp(2.0, 0.0)),
    ]
}

fn write_channel(layout: &RunLayout, color: usize, cells: &[Cell]) {
    let dims = dims();
    let mask: Vec<bool> = (0..dims.len()).map(|i| dims.voxel_at(i).x < 9).collect();
    let background: Vec<f32> = (0..dims.len()).map(|i| i as f32).collect();

    CandidateCellFile::from_cells(dims, FRAMES, cells)
        .save(&layout.candidate_cells(color), true)
        .unwrap();
    VolumeFile::new(dims, mask, background)
        .save(&layout.volume(color), false)
        .unwrap();
}

fn write_intermediates(layout: &RunLayout) {
    for dir in layout.intermediate_dirs() {
        fs::create_dir_all(dir.join("block00000")).unwrap();
        fs::write(dir.join("block00000").join("part.bin"), b"partial").unwrap();
    }
}

fn intermediates_exist(layout: &RunLayout) -> bool {
    layout.intermediate_dirs().iter().all(|d| d.is_dir())
}

fn sequential() -> Executor {
    Executor::Sequential(SequentialExecutor)
}

#[test]
fn test_duplicates_and_masked_cells_are_removed() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 1);
    let layout = cfg.layout();
    write_channel(&layout, 0, &candidates());
    write_intermediates(&layout);

    let summary = clean_cells(&cfg, &sequential());
    assert!(summary.is_complete());
    assert!(summary.intermediates_removed);
    assert_eq!(summary.cleanup_error, None);
    assert!(!intermediates_exist(&layout));

    let report = match &summary.channels[0] {
        (0, ChannelOutcome::Cleaned(r)) => r.clone(),
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(report.candidates, 4);
    assert_eq!(report.mask_valid, 3);
    assert_eq!(report.duplicates_removed, 1);
    assert_eq!(report.survivors, 2);
    assert_eq!(report.repaired_timeseries, 1);

    let cat = CleanCellCatalogue::load(&layout.clean_catalogue(0)).unwrap();
    assert_eq!(cat.n, 2);
    assert_eq!(cat.t, FRAMES);
    assert_eq!(cat.dims(), dims());
    assert_eq!(cat.cell_x[0], vec![0, 0, 1, 1, 2, 2, 3, 3, 4, 4]);
    assert_eq!(cat.cell_x[1], vec![6, 6, 7, 7]);
    assert_eq!(cat.cell_timeseries_raw[1][2], 0.0);
    assert!(cat
        .cell_timeseries
        .iter()
        .chain(cat.cell_baseline.iter())
        .all(|row| row.len() == FRAMES && row.iter().all(|v| v.is_finite())));

    // corrected + baseline reproduces the raw series
    for i in 0..cat.n {
        for t in 0..FRAMES {
            let sum = cat.cell_timeseries[i][t] + cat.cell_baseline[i][t];
            assert!((sum - cat.cell_timeseries_raw[i][t]).abs() < 1e-4);
        }
    }

    let d = cat.dims();
    assert_eq!(cat.volume_id[d.linear(Voxel::new(2, 1, 0))], 0);
    assert_eq!(cat.volume_id[d.linear(Voxel::new(5, 0, 0))], NO_OWNER);
    assert_eq!(cat.volume_id[d.linear(Voxel::new(7, 1, 0))], 1);
    assert_eq!(cat.volume_id[d.linear(Voxel::new(9, 0, 0))], NO_OWNER);
    assert_eq!(cat.volume_id[d.linear(Voxel::new(2, 1, 1))], NO_OWNER);
    assert_eq!(cat.background.len(), d.len());
}

#[test]
fn test_existing_catalogue_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), 1);
    cfg.keep_intermediates = true;
    let layout = cfg.layout();
    write_channel(&layout, 0, &candidates());

    clean_cells(&cfg, &sequential());
    let first = fs::read(layout.clean_catalogue(0)).unwrap();

    // inputs change, but the existing catalogue wins
    write_channel(&layout, 0, &candidates()[..1]);
    let summary = clean_cells(&cfg, &sequential());

    assert_eq!(summary.channels, vec![(0, ChannelOutcome::Skipped)]);
    assert!(!summary.intermediates_removed);
    assert_eq!(fs::read(layout.clean_catalogue(0)).unwrap(), first);
}

#[test]
fn test_intermediates_survive_until_every_channel_is_clean() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 2);
    let layout = cfg.layout();
    write_channel(&layout, 0, &candidates());
    write_intermediates(&layout);

    // channel 1 has no inputs yet
    let summary = clean_cells(&cfg, &sequential());
    assert!(matches!(summary.channels[0].1, ChannelOutcome::Cleaned(_)));
    assert!(matches!(summary.channels[1].1, ChannelOutcome::Failed(_)));
    assert_eq!(summary.failed(), 1);
    assert!(!summary.intermediates_removed);
    assert!(layout.is_channel_complete(0));
    assert!(!layout.is_channel_complete(1));
    assert!(intermediates_exist(&layout));

    write_channel(&layout, 1, &candidates()[2..]);
    let summary = clean_cells(&cfg, &sequential());
    assert_eq!(summary.channels[0], (0, ChannelOutcome::Skipped));
    assert!(matches!(summary.channels[1].1, ChannelOutcome::Cleaned(_)));
    assert!(summary.intermediates_removed);
    assert!(!intermediates_exist(&layout));
}

#[test]
fn test_failed_write_leaves_no_catalogue_and_keeps_intermediates() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 1);
    let layout = cfg.layout();
    write_channel(&layout, 0, &candidates());
    write_intermediates(&layout);

    // a directory squatting on the catalogue path makes the final rename fail
    let target = layout.clean_catalogue(0);
    fs::create_dir(&target).unwrap();

    let summary = clean_cells(&cfg, &sequential());
    assert!(matches!(summary.channels[0].1, ChannelOutcome::Failed(_)));
    assert!(!layout.is_channel_complete(0));
    assert!(intermediates_exist(&layout));

    let staged: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".tmp"))
        .collect();
    assert!(staged.is_empty());
}

#[test]
fn test_stale_staging_leftover_does_not_block_the_channel() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 1);
    let layout = cfg.layout();
    write_channel(&layout, 0, &candidates());
    write_intermediates(&layout);

    // left behind by an interrupted writer
    let stale = dir.path().join("cells0_clean.bin.tmp");
    fs::create_dir(&stale).unwrap();

    let summary = clean_cells(&cfg, &sequential());
    assert!(matches!(summary.channels[0].1, ChannelOutcome::Cleaned(_)));
    assert!(layout.is_channel_complete(0));
    assert!(summary.intermediates_removed);
    assert!(CleanCellCatalogue::load(&layout.clean_catalogue(0)).is_ok());
}

#[test]
fn test_parallel_run_matches_sequential_run() {
    let seq_dir = tempfile::tempdir().unwrap();
    let par_dir = tempfile::tempdir().unwrap();

    let seq_cfg = config(seq_dir.path(), 1);
    write_channel(&seq_cfg.layout(), 0, &candidates());
    clean_cells(&seq_cfg, &sequential());

    let mut par_cfg = config(par_dir.path(), 1);
    par_cfg.parallel = true;
    write_channel(&par_cfg.layout(), 0, &candidates());
    let executor = Executor::Parallel(ParallelExecutor::new(par_cfg.num_threads).unwrap());
    let summary = clean_cells(&par_cfg, &executor);

    match &summary.channels[0].1 {
        ChannelOutcome::Cleaned(r) => assert_eq!(r.baseline_path, ExecutionPath::Parallel),
        other => panic!("unexpected outcome {:?}", other),
    }

    let a = CleanCellCatalogue::load(&seq_cfg.layout().clean_catalogue(0)).unwrap();
    let b = CleanCellCatalogue::load(&par_cfg.layout().clean_catalogue(0)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_parameters_file_drives_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let json = serde_json::json!({
        "dir_output": dir.path(),
        "n_colors": 1,
        "thr_mask": 0.5,
        "f_volume": 2.0,
        "t_baseline": 1.5,
        "parallel": false,
        "compress": false,
        "ds": 2
    });
    fs::write(dir.path().join(PARAMETER_FILE), json.to_string()).unwrap();

    let cfg = RunConfig::load(dir.path()).unwrap();
    assert_eq!(cfg.detrender().window, 3);

    write_channel(&cfg.layout(), 0, &candidates());
    let executor = Executor::from_settings(cfg.parallel, cfg.num_threads);
    let summary = clean_cells(&cfg, &executor);
    assert!(summary.is_complete());
    assert!(CleanCellCatalogue::load(&cfg.layout().clean_catalogue(0)).is_ok());
}
