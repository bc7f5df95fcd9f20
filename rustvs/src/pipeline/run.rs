use std::fs;
use std::io;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use vscore::algorithm::baseline::Detrend;
use vscore::executor::Executor;

use crate::data::config::RunConfig;
use crate::data::layout::RunLayout;
use crate::error::CleanError;
use crate::pipeline::channel::{clean_channel, ChannelOutcome};

/// What a clean-cells run did to each channel and to the intermediates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CleanSummary {
    pub channels: Vec<(usize, ChannelOutcome)>,
    pub intermediates_removed: bool,
    /// Set when every catalogue exists but removing the intermediates failed.
    pub cleanup_error: Option<String>,
}

impl CleanSummary {
    pub fn failed(&self) -> usize {
        self.channels
            .iter()
            .filter(|(_, o)| matches!(o, ChannelOutcome::Failed(_)))
            .count()
    }

    /// No channel failed and cleanup, if attempted, succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed() == 0 && self.cleanup_error.is_none()
    }
}

/// Clean every channel of a run, then remove the intermediates if all catalogues exist.
///
/// A channel that fails is logged and recorded; later channels still run. A cleanup
/// failure is recorded in the summary next to the channel outcomes.
pub fn clean_cells(config: &RunConfig, executor: &Executor) -> CleanSummary {
    clean_cells_with(config, executor, &config.detrender())
}

/// As [`clean_cells`], with an explicit detrending transform.
pub fn clean_cells_with<D: Detrend>(
    config: &RunConfig,
    executor: &Executor,
    detrender: &D,
) -> CleanSummary {
    let layout = config.layout();
    info!(
        "cleaning {} channel(s) in {} using the {} executor",
        config.n_colors,
        layout.root().display(),
        executor.name()
    );

    let channels = (0..config.n_colors)
        .map(|color| {
            let outcome = clean_channel(
                &layout,
                color,
                config.thr_mask,
                config.compress,
                executor,
                detrender,
            )
            .unwrap_or_else(|e| {
                error!("channel {}: {}", color, e);
                ChannelOutcome::Failed(e.to_string())
            });
            (color, outcome)
        })
        .collect();

    let (intermediates_removed, cleanup_error) = if config.keep_intermediates {
        info!("keeping intermediate directories");
        (false, None)
    } else {
        match cleanup_intermediates(&layout, config.n_colors) {
            Ok(removed) => (removed, None),
            Err(e) => {
                error!("cleanup: {}", e);
                (false, Some(e.to_string()))
            }
        }
    };

    CleanSummary {
        channels,
        intermediates_removed,
        cleanup_error,
    }
}

/// Remove the intermediate directories once every channel in `0..n_colors` has a catalogue.
///
/// Returns `false` without touching anything if a catalogue is missing. Directories
/// that are already gone are not an error.
pub fn cleanup_intermediates(layout: &RunLayout, n_colors: usize) -> Result<bool, CleanError> {
    if !layout.all_channels_complete(n_colors) {
        warn!("not all channels have clean catalogues, keeping intermediate directories");
        return Ok(false);
    }

    for dir in layout.intermediate_dirs() {
        match fs::remove_dir_all(&dir) {
            Ok(()) => info!("removed {}", dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(CleanError::io(&dir, e)),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vscore::executor::SequentialExecutor;

    #[test]
    fn test_cleanup_waits_for_every_channel() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path());
        for d in layout.intermediate_dirs() {
            fs::create_dir_all(d.join("block0")).unwrap();
        }
        fs::write(layout.clean_catalogue(0), b"x").unwrap();

        assert!(!cleanup_intermediates(&layout, 2).unwrap());
        assert!(layout.intermediate_dirs().iter().all(|d| d.is_dir()));

        fs::write(layout.clean_catalogue(1), b"x").unwrap();
        assert!(cleanup_intermediates(&layout, 2).unwrap());
        assert!(layout.intermediate_dirs().iter().all(|d| !d.exists()));

        // second pass is a no-op
        assert!(cleanup_intermediates(&layout, 2).unwrap());
    }

    #[test]
    fn test_summary_counts_failures() {
        let summary = CleanSummary {
            channels: vec![
                (0, ChannelOutcome::Skipped),
                (1, ChannelOutcome::Failed("boom".into())),
            ],
            intermediates_removed: false,
            cleanup_error: None,
        };
        assert_eq!(summary.failed(), 1);
        assert!(!summary.is_complete());
    }

    fn single_channel_config(root: &std::path::Path) -> RunConfig {
        RunConfig {
            dir_output: root.to_path_buf(),
            n_colors: 1,
            thr_mask: 0.5,
            f_volume: 1.0,
            t_baseline: 3.0,
            num_threads: 1,
            parallel: false,
            compress: false,
            keep_intermediates: false,
        }
    }

    #[test]
    fn test_cleanup_failure_keeps_channel_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = single_channel_config(dir.path());
        let layout = cfg.layout();
        fs::write(layout.clean_catalogue(0), b"x").unwrap();
        // a plain file where an intermediate directory is expected
        fs::write(dir.path().join("cells"), b"not a directory").unwrap();

        let summary = clean_cells(&cfg, &Executor::Sequential(SequentialExecutor));

        assert_eq!(summary.channels, vec![(0, ChannelOutcome::Skipped)]);
        assert!(!summary.intermediates_removed);
        assert!(summary.cleanup_error.is_some());
        assert!(!summary.is_complete());
        assert!(dir.path().join("cells").is_file());
    }
}
