use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vscore::algorithm::baseline::QuantileBaseline;

use crate::data::layout::RunLayout;
use crate::error::CleanError;

/// Name of the parameter file inside the output directory.
pub const PARAMETER_FILE: &str = "parameters.json";

fn default_true() -> bool {
    true
}

/// Finalized run parameters, as written by the parameter-processing stage.
///
/// Only the fields this stage reads are declared; other stages' parameters in
/// the same file are ignored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    /// Directory holding the run's intermediate and final artifacts.
    pub dir_output: PathBuf,
    /// Number of color channels.
    pub n_colors: usize,
    /// Minimum mean mask occupancy (exclusive) for a cell to be valid.
    pub thr_mask: f64,
    /// Volume acquisition rate in Hz.
    pub f_volume: f64,
    /// Baseline window length in seconds.
    pub t_baseline: f64,
    /// Worker threads for baseline extraction, 0 for one per core.
    #[serde(default)]
    pub num_threads: usize,
    /// Try the parallel executor before falling back to sequential.
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Wrap written containers in a zstd stream.
    #[serde(default = "default_true")]
    pub compress: bool,
    /// Leave the intermediate directories in place after a complete run.
    #[serde(default)]
    pub keep_intermediates: bool,
}

impl RunConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, CleanError> {
        let f = File::open(path).map_err(|e| CleanError::io(path, e))?;
        serde_json::from_reader(BufReader::new(f)).map_err(|source| CleanError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `parameters.json` from an output directory.
    pub fn load(dir_output: &Path) -> Result<Self, CleanError> {
        Self::from_json_file(&dir_output.join(PARAMETER_FILE))
    }

    pub fn layout(&self) -> RunLayout {
        RunLayout::new(&self.dir_output)
    }

    /// Detrending transform derived from the baseline window and volume rate.
    pub fn detrender(&self) -> QuantileBaseline {
        QuantileBaseline::from_rate(self.t_baseline, self.f_volume)
    }
}
