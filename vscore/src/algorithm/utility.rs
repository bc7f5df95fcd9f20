use statrs::statistics::{Data, OrderStatistics, Statistics};

/// Pearson correlation coefficient of two equally long series.
///
/// Returns NaN when either series has zero variance or fewer than two samples,
/// so threshold comparisons against the result are false.
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return f64::NAN;
    }
    let (a, b) = (&a[..n], &b[..n]);

    let mean_a = a.iter().mean();
    let mean_b = b.iter().mean();

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    cov / (var_a * var_b).sqrt()
}

/// Quantile `tau` (0..=1) of `values`, NaN for an empty slice.
pub fn quantile(values: &[f64], tau: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut data = Data::new(values.to_vec());
    data.quantile(tau)
}
