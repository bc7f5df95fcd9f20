use serde::{Deserialize, Serialize};

use crate::algorithm::utility::quantile;
use crate::data::cell::Cell;
use crate::executor::{ExecutionPath, Executor};

/// Output of a detrending transform for one timeseries.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineResult {
    pub corrected: Vec<f64>,
    pub baseline: Vec<f64>,
}

/// A pure per-cell detrending transform.
///
/// The implementor carries its own parameters and is shared read-only with every
/// worker, so it must not hold mutable state.
pub trait Detrend: Sync {
    fn detrend(&self, series: &[f64]) -> BaselineResult;
}

impl<F> Detrend for F
where
    F: Fn(&[f64]) -> BaselineResult + Sync,
{
    fn detrend(&self, series: &[f64]) -> BaselineResult {
        self(series)
    }
}

/// Running low-quantile baseline.
///
/// The baseline at each timepoint is the `quantile` of a window of `window`
/// samples centred on it, truncated at the series ends. The corrected signal is
/// the raw signal minus that baseline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantileBaseline {
    pub window: usize,
    pub quantile: f64,
}

impl Default for QuantileBaseline {
    fn default() -> Self {
        QuantileBaseline {
            window: 300,
            quantile: 0.1,
        }
    }
}

impl QuantileBaseline {
    /// Window spanning `t_baseline` seconds at `f_volume` volumes per second.
    pub fn from_rate(t_baseline: f64, f_volume: f64) -> Self {
        let window = (t_baseline * f_volume).round().max(1.0) as usize;
        QuantileBaseline {
            window,
            ..Default::default()
        }
    }
}

impl Detrend for QuantileBaseline {
    fn detrend(&self, series: &[f64]) -> BaselineResult {
        let n = series.len();
        let window = self.window.max(1);
        let half = window / 2;

        let baseline: Vec<f64> = (0..n)
            .map(|i| {
                let lo = i.saturating_sub(half);
                let hi = (i + window - half).min(n);
                quantile(&series[lo..hi], self.quantile)
            })
            .collect();

        let corrected = series
            .iter()
            .zip(baseline.iter())
            .map(|(x, b)| x - b)
            .collect();

        BaselineResult { corrected, baseline }
    }
}

/// Baselines of all surviving cells plus the path that produced them.
#[derive(Clone, Debug)]
pub struct BaselineExtraction {
    /// One result per input cell, at the same position.
    pub results: Vec<BaselineResult>,
    pub path: ExecutionPath,
}

/// Detrend every cell's raw timeseries through `executor`.
///
/// The detrender is the broadcast payload; results stay positionally paired with `cells`.
pub fn extract_baselines<D: Detrend>(
    executor: &Executor,
    detrender: &D,
    cells: &[Cell],
) -> BaselineExtraction {
    let (results, path) =
        executor.map_or_serial(detrender, cells, |d, cell| d.detrend(&cell.timeseries));
    BaselineExtraction { results, path }
}
