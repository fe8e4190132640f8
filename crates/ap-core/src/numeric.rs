/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: f64,
    pub rel: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: f64, b: f64, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

/// Indices that sort `values` ascending (stable, NaN last).
pub fn argsort(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    order
}

/// Trapezoidal integral of samples `y` over the grid `x`.
///
/// Returns 0 for fewer than two samples. Lengths must match.
pub fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
    debug_assert_eq!(y.len(), x.len());
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xw, yw)| 0.5 * (xw[1] - xw[0]) * (yw[0] + yw[1]))
        .sum()
}

/// Linear interpolation of `y(x)` at `x0` between two bracketing samples.
///
/// `xa` and `xb` must differ.
pub fn lerp_at(x0: f64, xa: f64, ya: f64, xb: f64, yb: f64) -> f64 {
    ya + (x0 - xa) * (yb - ya) / (xb - xa)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn argsort_orders_ascending() {
        let order = argsort(&[3.0, 1.0, 2.0]);
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn trapezoid_linear_function() {
        let x = [0.0, 1.0, 2.0];
        let y = [0.0, 1.0, 2.0];
        assert!(nearly_equal(trapezoid(&y, &x), 2.0, Tolerances::default()));
        assert_eq!(trapezoid(&[1.0], &[0.0]), 0.0);
    }

    #[test]
    fn lerp_midpoint() {
        assert_eq!(lerp_at(0.0, -1.0, 10.0, 1.0, 20.0), 15.0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn argsort_is_a_sorting_permutation(values in prop::collection::vec(-1e6_f64..1e6_f64, 0..40)) {
            let order = argsort(&values);
            prop_assert_eq!(order.len(), values.len());
            for w in order.windows(2) {
                prop_assert!(values[w[0]] <= values[w[1]]);
            }
        }
    }
}
