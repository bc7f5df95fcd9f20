use std::path::{Path, PathBuf};

/// Intermediate directories removed once every channel has a clean catalogue.
pub const INTERMEDIATE_DIRS: [&str; 2] = ["volumes", "cells"];

/// File naming inside a run's output directory.
#[derive(Clone, Debug)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(root: &Path) -> Self {
        RunLayout {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Candidate cells of one channel, merged from all blocks.
    pub fn candidate_cells(&self, color: usize) -> PathBuf {
        self.root.join(format!("cells{}_raw.bin", color))
    }

    /// Occupancy mask and background image of one channel.
    pub fn volume(&self, color: usize) -> PathBuf {
        self.root.join(format!("volume{}.bin", color))
    }

    /// Final cleaned catalogue of one channel.
    pub fn clean_catalogue(&self, color: usize) -> PathBuf {
        self.root.join(format!("cells{}_clean.bin", color))
    }

    pub fn intermediate_dirs(&self) -> Vec<PathBuf> {
        INTERMEDIATE_DIRS.iter().map(|d| self.root.join(d)).collect()
    }

    pub fn is_channel_complete(&self, color: usize) -> bool {
        self.clean_catalogue(color).is_file()
    }

    /// True when every channel in `0..n_colors` has a clean catalogue.
    pub fn all_channels_complete(&self, n_colors: usize) -> bool {
        (0..n_colors).all(|c| self.is_channel_complete(c))
    }
}
