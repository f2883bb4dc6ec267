//! Standard normal distribution helpers.
//!
//! The CDF uses the Abramowitz-Stegun 26.2.17 rational approximation
//! (absolute error below 7.5e-8). Good enough for theta estimation,
//! not for certified pricing.

use std::f64::consts::PI;

const A_S_P: f64 = 0.231_641_9;
const A_S_B1: f64 = 0.319_381_53;
const A_S_B2: f64 = -0.356_563_782;
const A_S_B3: f64 = 1.781_477_937;
const A_S_B4: f64 = -1.821_255_978;
const A_S_B5: f64 = 1.330_274_429;

/// Standard normal PDF.
pub fn std_normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Standard normal CDF.
pub fn std_normal_cdf(x: f64) -> f64 {
    if x < 0.0 {
        return 1.0 - std_normal_cdf(-x);
    }

    let k = 1.0 / (1.0 + A_S_P * x);
    let poly = k * (A_S_B1 + k * (A_S_B2 + k * (A_S_B3 + k * (A_S_B4 + A_S_B5 * k))));

    1.0 - std_normal_pdf(x) * poly
}
