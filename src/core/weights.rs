//! Robust reweighting for iteratively reweighted least squares.
//!
//! One IRLS pass solves the weighted normal equations `JᵀWJ·Δx = −JᵀWr`
//! where `W` is a diagonal matrix derived from the current residuals.
//! The weights implemented here are Huber weights with a MAD scale
//! estimate, so inliers keep full influence while gross outliers are
//! progressively discounted as the fit tightens.

use faer::Mat;

/// Huber tuning constant for 95% asymptotic efficiency on Gaussian noise.
pub const HUBER_FACTOR: f64 = 1.345;

/// Consistency factor relating MAD to the standard deviation of a Gaussian.
const MAD_NORMALIZATION: f64 = 1.4826;

/// Scale floor so that a perfectly fit inlier set cannot collapse the
/// threshold to zero and erase every weight.
const MIN_SCALE: f64 = 1e-12;

/// Compute diagonal IRLS weights (N×1) from the current residual vector.
///
/// `w_i = 1` inside the Huber threshold, `threshold / |r_i|` outside it.
/// The threshold is `HUBER_FACTOR * scale` with `scale` the normalized
/// median absolute residual.
pub fn irls_weights(residual: &Mat<f64>) -> Mat<f64> {
    let n = residual.nrows();
    if n == 0 {
        return Mat::zeros(0, 1);
    }

    let mut abs_residuals: Vec<f64> = (0..n).map(|i| residual[(i, 0)].abs()).collect();
    abs_residuals.sort_by(|a, b| a.total_cmp(b));
    let median = if n % 2 == 1 {
        abs_residuals[n / 2]
    } else {
        0.5 * (abs_residuals[n / 2 - 1] + abs_residuals[n / 2])
    };

    let scale = (MAD_NORMALIZATION * median).max(MIN_SCALE);
    let threshold = HUBER_FACTOR * scale;

    Mat::from_fn(n, 1, |i, _| {
        let magnitude = residual[(i, 0)].abs();
        if magnitude <= threshold {
            1.0
        } else {
            threshold / magnitude
        }
    })
}

/// Weighted squared residual sum `r·(Wr)`.
pub fn weighted_squared_sum(residual: &Mat<f64>, weights: &Mat<f64>) -> f64 {
    let mut sum = 0.0;
    for i in 0..residual.nrows() {
        sum += weights[(i, 0)] * residual[(i, 0)] * residual[(i, 0)];
    }
    sum
}
