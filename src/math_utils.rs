use statrs::function::erf;
use std::f64::consts::{PI, SQRT_2};

pub fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf::erf(x / SQRT_2))
}

pub fn norm_pdf(x: f64) -> f64 {
    (1.0 / (2.0 * PI).sqrt()) * (-0.5 * x * x).exp()
}

/// Inverse standard normal CDF for `u` in (0, 1).
pub fn norm_inv_cdf(u: f64) -> f64 {
    -SQRT_2 * erf::erfc_inv(2.0 * u)
}

/// Continuous-compounding growth factor `exp(rate * t)`.
#[inline]
pub fn growth(rate: f64, t: f64) -> f64 {
    (rate * t).exp()
}

pub struct Timer {
    start_time: std::time::Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Timer {
        Timer {
            start_time: std::time::Instant::now(),
        }
    }

    pub fn start(&mut self) {
        self.start_time = std::time::Instant::now();
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_inverse_cdf_round_trip() {
        for &u in &[1e-6, 0.01, 0.25, 0.5, 0.8, 0.999] {
            assert_relative_eq!(norm_cdf(norm_inv_cdf(u)), u, max_relative = 1e-6);
        }
        assert!(norm_inv_cdf(0.5).abs() < 1e-12);
    }

    #[test]
    fn test_growth() {
        assert_relative_eq!(growth(0.03, 1.0) * growth(-0.03, 1.0), 1.0, epsilon = 1e-15);
    }
}
