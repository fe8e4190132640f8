//! State-space models and frequency responses.

use ap_io::Container;
use nalgebra::DMatrix;
use num_complex::Complex64;

use crate::error::{LinearError, LinearResult};

/// `x' = A x + B u`, `y = C x + D u`. Discrete when `dt` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSpace {
    pub a: DMatrix<f64>,
    pub b: DMatrix<f64>,
    pub c: DMatrix<f64>,
    pub d: DMatrix<f64>,
    pub dt: Option<f64>,
}

impl StateSpace {
    pub fn new(
        a: DMatrix<f64>,
        b: DMatrix<f64>,
        c: DMatrix<f64>,
        d: DMatrix<f64>,
        dt: Option<f64>,
    ) -> LinearResult<Self> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(LinearError::malformed(format!(
                "A must be square, found {}x{}",
                a.nrows(),
                a.ncols()
            )));
        }
        if b.nrows() != n || c.ncols() != n {
            return Err(LinearError::malformed(format!(
                "B is {}x{} and C is {}x{} for {n} states",
                b.nrows(),
                b.ncols(),
                c.nrows(),
                c.ncols()
            )));
        }
        if d.shape() != (c.nrows(), b.ncols()) {
            return Err(LinearError::malformed(format!(
                "D must be {}x{}, found {}x{}",
                c.nrows(),
                b.ncols(),
                d.nrows(),
                d.ncols()
            )));
        }
        if let Some(step) = dt
            && !(step.is_finite() && step > 0.0)
        {
            return Err(LinearError::malformed(format!("invalid sample time {step}")));
        }
        Ok(Self { a, b, c, d, dt })
    }

    /// Keys `a`, `b`, `c`, `d` and optional scalar `dt`.
    pub fn from_container(container: &Container) -> LinearResult<Self> {
        let dt = if container.contains("dt") {
            Some(container.scalar("dt")?)
        } else {
            None
        };
        Self::new(
            container.matrix("a")?,
            container.matrix("b")?,
            container.matrix("c")?,
            container.matrix("d")?,
            dt,
        )
    }

    pub fn states(&self) -> usize {
        self.a.nrows()
    }

    pub fn inputs(&self) -> usize {
        self.b.ncols()
    }

    pub fn outputs(&self) -> usize {
        self.c.nrows()
    }

    pub fn is_discrete(&self) -> bool {
        self.dt.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodeQuantity {
    /// 20 log10 |H|
    Magnitude,
    Phase,
}

/// Frequency response `H(w)`: one `outputs x inputs` matrix per frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct Bode {
    pub wv: Vec<f64>,
    pub yfreq: Vec<DMatrix<Complex64>>,
}

impl Bode {
    pub fn new(wv: Vec<f64>, yfreq: Vec<DMatrix<Complex64>>) -> LinearResult<Self> {
        if wv.len() != yfreq.len() {
            return Err(LinearError::malformed(format!(
                "{} frequencies for {} response samples",
                wv.len(),
                yfreq.len()
            )));
        }
        if let Some(first) = yfreq.first()
            && yfreq.iter().any(|h| h.shape() != first.shape())
        {
            return Err(LinearError::malformed(
                "response samples have inconsistent dimensions",
            ));
        }
        Ok(Self { wv, yfreq })
    }

    /// Keys `frequency` and `response` (`[outputs, inputs, frequencies]`).
    pub fn from_container(container: &Container) -> LinearResult<Self> {
        let wv = container.vector("frequency")?;
        let yfreq = container.complex_slices("response")?;
        Self::new(wv, yfreq)
    }

    pub fn len(&self) -> usize {
        self.wv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wv.is_empty()
    }

    pub fn outputs(&self) -> usize {
        self.yfreq.first().map_or(0, |h| h.nrows())
    }

    pub fn inputs(&self) -> usize {
        self.yfreq.first().map_or(0, |h| h.ncols())
    }

    /// Response at the first frequency.
    pub fn steady_state_gain(&self) -> Option<&DMatrix<Complex64>> {
        self.yfreq.first()
    }

    /// Frequency grid and the requested quantity for input `m` to output `p`.
    pub fn series(
        &self,
        m: usize,
        p: usize,
        quantity: BodeQuantity,
        deg: bool,
    ) -> LinearResult<(&[f64], Vec<f64>)> {
        if m >= self.inputs() || p >= self.outputs() {
            return Err(LinearError::invalid(format!(
                "channel (input {m}, output {p}) outside {}x{} response",
                self.outputs(),
                self.inputs()
            )));
        }

        let values = self
            .yfreq
            .iter()
            .map(|h| {
                let z = h[(p, m)];
                match quantity {
                    BodeQuantity::Magnitude => 20.0 * z.norm().log10(),
                    BodeQuantity::Phase if deg => z.arg().to_degrees(),
                    BodeQuantity::Phase => z.arg(),
                }
            })
            .collect();
        Ok((self.wv.as_slice(), values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ap_io::ContainerArray;
    use std::collections::BTreeMap;

    fn first_order(w: &[f64]) -> Bode {
        // H = 1 / (1 + j w)
        let yfreq = w
            .iter()
            .map(|&wi| DMatrix::from_element(1, 1, Complex64::new(1.0, 0.0) / Complex64::new(1.0, wi)))
            .collect();
        Bode::new(w.to_vec(), yfreq).unwrap()
    }

    #[test]
    fn magnitude_and_phase() {
        let bode = first_order(&[0.0, 1.0]);
        let (w, mag) = bode.series(0, 0, BodeQuantity::Magnitude, false).unwrap();
        assert_eq!(w, &[0.0, 1.0]);
        assert!(mag[0].abs() < 1e-12);
        assert!((mag[1] + 3.0103).abs() < 1e-3);

        let (_, phase) = bode.series(0, 0, BodeQuantity::Phase, true).unwrap();
        assert!((phase[1] + 45.0).abs() < 1e-9);
        assert_eq!(bode.steady_state_gain().unwrap()[(0, 0)], Complex64::new(1.0, 0.0));
    }

    #[test]
    fn out_of_range_channel() {
        let bode = first_order(&[0.0]);
        assert!(matches!(
            bode.series(1, 0, BodeQuantity::Magnitude, false),
            Err(LinearError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn state_space_dimensions_checked() {
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, -1.0, -0.1]);
        let b = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let c = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);
        let d = DMatrix::zeros(1, 1);
        let ss = StateSpace::new(a.clone(), b.clone(), c.clone(), d, None).unwrap();
        assert_eq!((ss.states(), ss.inputs(), ss.outputs()), (2, 1, 1));
        assert!(!ss.is_discrete());

        let bad_d = DMatrix::zeros(2, 1);
        assert!(StateSpace::new(a, b, c, bad_d, None).is_err());
    }

    #[test]
    fn state_space_from_container() {
        let mut entries = BTreeMap::new();
        entries.insert("a".into(), ContainerArray::real(vec![1, 1], vec![-2.0]));
        entries.insert("b".into(), ContainerArray::real(vec![1, 1], vec![1.0]));
        entries.insert("c".into(), ContainerArray::real(vec![1, 1], vec![3.0]));
        entries.insert("d".into(), ContainerArray::real(vec![1, 1], vec![0.0]));
        entries.insert("dt".into(), ContainerArray::scalar(0.1));
        let ss = StateSpace::from_container(&Container::new("ss.json", entries)).unwrap();
        assert_eq!(ss.dt, Some(0.1));
        assert_eq!(ss.c[(0, 0)], 3.0);
    }

    #[test]
    fn bode_from_container() {
        let mut entries = BTreeMap::new();
        entries.insert("frequency".into(), ContainerArray::real(vec![2], vec![1.0, 2.0]));
        entries.insert(
            "response".into(),
            ContainerArray::complex(vec![1, 1, 2], vec![1.0, 0.5], vec![0.0, -0.5]),
        );
        let bode = Bode::from_container(&Container::new("fr.json", entries)).unwrap();
        assert_eq!(bode.len(), 2);
        assert_eq!(bode.yfreq[1][(0, 0)], Complex64::new(0.5, -0.5));
    }
}
