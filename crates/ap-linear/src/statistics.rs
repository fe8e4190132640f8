//! Stochastic response statistics through a frequency response.
//!
//! With input power spectral density `psi(w)` applied to every input
//! channel, the output cross-spectral density is
//! `S(w) = psi(w) H(w) H(w)^H`. Integrating its symmetric real part over the
//! frequency grid gives the output covariance.

use std::f64::consts::PI;

use ap_core::trapezoid;
use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

use crate::error::{LinearError, LinearResult};
use crate::statespace::Bode;

#[derive(Debug, Clone)]
pub struct FrequencyResponseStatistics {
    frequency: Vec<f64>,
    input_psd: Vec<f64>,
    response: Vec<DMatrix<Complex64>>,
}

impl FrequencyResponseStatistics {
    /// `response[k]` is the `outputs x inputs` response at `frequency[k]`.
    ///
    /// The grid must be strictly ascending and the input PSD non-negative.
    pub fn new(
        frequency: Vec<f64>,
        input_psd: Vec<f64>,
        response: Vec<DMatrix<Complex64>>,
    ) -> LinearResult<Self> {
        if frequency.is_empty() {
            return Err(LinearError::invalid("empty frequency grid"));
        }
        if frequency.len() != input_psd.len() || frequency.len() != response.len() {
            return Err(LinearError::invalid(format!(
                "grid has {} frequencies, PSD {} values, response {} samples",
                frequency.len(),
                input_psd.len(),
                response.len()
            )));
        }
        if frequency.iter().any(|w| !w.is_finite())
            || frequency.windows(2).any(|w| w[1] <= w[0])
        {
            return Err(LinearError::invalid(
                "frequency grid must be finite and strictly ascending",
            ));
        }
        if input_psd.iter().any(|s| !(s.is_finite() && *s >= 0.0)) {
            return Err(LinearError::invalid(
                "input PSD must be finite and non-negative",
            ));
        }
        let shape = response[0].shape();
        if response.iter().any(|h| h.shape() != shape) {
            return Err(LinearError::invalid(
                "response samples have inconsistent dimensions",
            ));
        }

        Ok(Self {
            frequency,
            input_psd,
            response,
        })
    }

    pub fn from_bode(bode: &Bode, input_psd: Vec<f64>) -> LinearResult<Self> {
        Self::new(bode.wv.clone(), input_psd, bode.yfreq.clone())
    }

    pub fn frequency(&self) -> &[f64] {
        &self.frequency
    }

    pub fn outputs(&self) -> usize {
        self.response[0].nrows()
    }

    /// Output cross-PSD matrix at each frequency.
    pub fn psd(&self) -> Vec<DMatrix<Complex64>> {
        self.response
            .iter()
            .zip(&self.input_psd)
            .map(|(h, &psi)| (h * h.adjoint()) * Complex64::new(psi, 0.0))
            .collect()
    }

    /// Output covariance: half the trapezoidal integral of the symmetrised
    /// real cross-PSD.
    pub fn covariance(&self) -> DMatrix<f64> {
        let spectra = self.psd();
        let n = self.outputs();
        let mut cov = DMatrix::zeros(n, n);
        let mut integrand = vec![0.0; spectra.len()];

        for i in 0..n {
            for j in i..n {
                for (k, s) in spectra.iter().enumerate() {
                    integrand[k] = 0.5 * (s[(i, j)].re + s[(j, i)].re);
                }
                let value = 0.5 * trapezoid(&integrand, &self.frequency);
                cov[(i, j)] = value;
                cov[(j, i)] = value;
            }
        }
        cov
    }

    pub fn rms(&self) -> DVector<f64> {
        rms_from_covariance(&self.covariance())
    }

    /// Covariance normalised by `rms[i] * rms[j]`. Entries involving an
    /// output with zero RMS are 0.
    pub fn correlation_matrix(&self) -> DMatrix<f64> {
        correlation_from_covariance(&self.covariance())
    }

    /// Bivariate density of outputs `i` and `j` on the grid `xs` x `ys`
    /// (rows follow `xs`).
    pub fn joint_probability_grid(
        &self,
        i: usize,
        j: usize,
        xs: &[f64],
        ys: &[f64],
    ) -> LinearResult<DMatrix<f64>> {
        let n = self.outputs();
        if i >= n || j >= n || i == j {
            return Err(LinearError::invalid(format!(
                "output pair ({i}, {j}) invalid for {n} outputs"
            )));
        }
        let cov = self.covariance();
        let rms = rms_from_covariance(&cov);
        let rho = correlation_from_covariance(&cov)[(i, j)];

        let mut grid = DMatrix::zeros(xs.len(), ys.len());
        for (a, &x) in xs.iter().enumerate() {
            for (b, &y) in ys.iter().enumerate() {
                grid[(a, b)] = joint_gaussian_probability(x, y, rms[i], rms[j], rho)?;
            }
        }
        Ok(grid)
    }
}

fn rms_from_covariance(cov: &DMatrix<f64>) -> DVector<f64> {
    cov.diagonal().map(|v| v.max(0.0).sqrt())
}

fn correlation_from_covariance(cov: &DMatrix<f64>) -> DMatrix<f64> {
    let rms = rms_from_covariance(cov);
    DMatrix::from_fn(cov.nrows(), cov.ncols(), |i, j| {
        let denom = if i == j { cov[(i, i)] } else { rms[i] * rms[j] };
        if denom > 0.0 { cov[(i, j)] / denom } else { 0.0 }
    })
}

/// Zero-mean bivariate Gaussian density at `(x, y)`.
///
/// Fails for `|rho| >= 1` (degenerate distribution) and for non-positive
/// RMS values.
pub fn joint_gaussian_probability(
    x: f64,
    y: f64,
    rms_x: f64,
    rms_y: f64,
    rho: f64,
) -> LinearResult<f64> {
    if !(rho.abs() < 1.0) {
        return Err(LinearError::invalid(format!(
            "correlation coefficient must satisfy |rho| < 1, got {rho}"
        )));
    }
    if !(rms_x > 0.0 && rms_y > 0.0) {
        return Err(LinearError::invalid(format!(
            "RMS values must be positive, got ({rms_x}, {rms_y})"
        )));
    }

    let one_minus = 1.0 - rho * rho;
    let (u, v) = (x / rms_x, y / rms_y);
    let quad = (u * u - 2.0 * rho * u * v + v * v) / one_minus;
    Ok((-0.5 * quad).exp() / (2.0 * PI * rms_x * rms_y * one_minus.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ap_core::{Tolerances, nearly_equal};

    fn tol() -> Tolerances {
        Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        }
    }

    /// Two outputs driven by one input with gains 1 and 2 at every frequency.
    fn flat_two_output() -> FrequencyResponseStatistics {
        let h = DMatrix::from_row_slice(2, 1, &[Complex64::new(1.0, 0.0), Complex64::new(0.0, 2.0)]);
        FrequencyResponseStatistics::new(vec![0.0, 1.0, 2.0], vec![1.0; 3], vec![h; 3]).unwrap()
    }

    #[test]
    fn psd_is_outer_product() {
        let stats = flat_two_output();
        let s = &stats.psd()[0];
        assert_eq!(s[(0, 0)], Complex64::new(1.0, 0.0));
        assert_eq!(s[(1, 1)], Complex64::new(4.0, 0.0));
        assert_eq!(s[(0, 1)], Complex64::new(0.0, -2.0));
        assert_eq!(s[(1, 0)], s[(0, 1)].conj());
    }

    #[test]
    fn covariance_integrates_half_trapezoid() {
        let stats = flat_two_output();
        let cov = stats.covariance();
        // 0.5 * integral of 1 over [0, 2]
        assert!(nearly_equal(cov[(0, 0)], 1.0, tol()));
        assert!(nearly_equal(cov[(1, 1)], 4.0, tol()));
        // purely imaginary cross term has no real part
        assert!(nearly_equal(cov[(0, 1)], 0.0, tol()));

        let rms = stats.rms();
        assert!(nearly_equal(rms[0], 1.0, tol()));
        assert!(nearly_equal(rms[1], 2.0, tol()));
    }

    #[test]
    fn correlation_diagonal_is_one() {
        let h = DMatrix::from_row_slice(2, 1, &[Complex64::new(1.0, 0.0), Complex64::new(-3.0, 0.0)]);
        let stats =
            FrequencyResponseStatistics::new(vec![1.0, 2.0], vec![0.5, 2.0], vec![h; 2]).unwrap();
        let corr = stats.correlation_matrix();
        assert_eq!(corr[(0, 0)], 1.0);
        assert_eq!(corr[(1, 1)], 1.0);
        assert!(nearly_equal(corr[(0, 1)], -1.0, tol()));
    }

    #[test]
    fn zero_rms_gives_zero_correlation() {
        let h = DMatrix::from_row_slice(2, 1, &[Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)]);
        let stats = FrequencyResponseStatistics::new(vec![1.0, 2.0], vec![1.0; 2], vec![h; 2]).unwrap();
        let corr = stats.correlation_matrix();
        assert_eq!(corr[(0, 0)], 1.0);
        assert_eq!(corr[(1, 1)], 0.0);
        assert_eq!(corr[(0, 1)], 0.0);
    }

    #[test]
    fn grid_validation() {
        let h = DMatrix::from_element(1, 1, Complex64::new(1.0, 0.0));
        assert!(FrequencyResponseStatistics::new(vec![2.0, 1.0], vec![1.0; 2], vec![h.clone(); 2]).is_err());
        assert!(FrequencyResponseStatistics::new(vec![1.0, 2.0], vec![-1.0, 1.0], vec![h.clone(); 2]).is_err());
        assert!(FrequencyResponseStatistics::new(vec![1.0], vec![1.0; 2], vec![h; 2]).is_err());
    }

    #[test]
    fn joint_density_uncorrelated_is_product() {
        let p = joint_gaussian_probability(0.5, -1.0, 1.0, 2.0, 0.0).unwrap();
        let gx = (-0.125_f64).exp() / (2.0 * PI).sqrt();
        let gy = (-0.125_f64).exp() / (2.0 * (2.0 * PI).sqrt());
        assert!(nearly_equal(p, gx * gy, tol()));
    }

    #[test]
    fn joint_density_rejects_degenerate_correlation() {
        for rho in [1.0, -1.0, 1.5, f64::NAN] {
            let err = joint_gaussian_probability(0.0, 0.0, 1.0, 1.0, rho).unwrap_err();
            assert!(matches!(err, LinearError::InvalidArgument { .. }));
        }
        assert!(joint_gaussian_probability(0.0, 0.0, 0.0, 1.0, 0.1).is_err());
    }

    #[test]
    fn probability_grid_shape() {
        let h = DMatrix::from_row_slice(2, 1, &[Complex64::new(1.0, 0.0), Complex64::new(0.0, 2.0)]);
        let stats = FrequencyResponseStatistics::new(vec![0.0, 1.0], vec![1.0; 2], vec![h; 2]).unwrap();
        let grid = stats
            .joint_probability_grid(0, 1, &[-1.0, 0.0, 1.0], &[0.0, 1.0])
            .unwrap();
        assert_eq!(grid.shape(), (3, 2));
        assert!(grid[(1, 0)] > grid[(0, 0)]);
        assert!(stats.joint_probability_grid(0, 0, &[0.0], &[0.0]).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn stats_strategy() -> impl Strategy<Value = FrequencyResponseStatistics> {
        (1_usize..4, 1_usize..3, 2_usize..8).prop_flat_map(|(p, m, nf)| {
            (
                prop::collection::vec(0.01_f64..1.0, nf),
                prop::collection::vec(0.0_f64..5.0, nf),
                prop::collection::vec(-3.0_f64..3.0, 2 * p * m * nf),
            )
                .prop_map(move |(steps, psd, parts)| {
                    let mut w = 0.0;
                    let frequency: Vec<f64> = steps
                        .iter()
                        .map(|dw| {
                            w += dw;
                            w
                        })
                        .collect();
                    let response = (0..nf)
                        .map(|k| {
                            DMatrix::from_fn(p, m, |i, j| {
                                let flat = 2 * ((k * p + i) * m + j);
                                Complex64::new(parts[flat], parts[flat + 1])
                            })
                        })
                        .collect();
                    FrequencyResponseStatistics::new(frequency, psd, response).unwrap()
                })
        })
    }

    proptest! {
        #[test]
        fn covariance_is_symmetric_psd(stats in stats_strategy()) {
            let cov = stats.covariance();
            prop_assert_eq!(&cov, &cov.transpose());

            let scale = cov.diagonal().iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
            let eig = cov.clone().symmetric_eigen();
            for lambda in eig.eigenvalues.iter() {
                prop_assert!(*lambda >= -1e-9 * scale);
            }

            let rms = stats.rms();
            for i in 0..cov.nrows() {
                prop_assert_eq!(rms[i], cov[(i, i)].max(0.0).sqrt());
            }
        }

        #[test]
        fn correlation_bounded(stats in stats_strategy()) {
            let corr = stats.correlation_matrix();
            for v in corr.iter() {
                prop_assert!(v.abs() <= 1.0 + 1e-9);
            }
        }
    }
}
