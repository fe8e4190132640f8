//! Flutter estimation from velocity sweeps of eigenvalues.
//!
//! A sweep file holds one row per velocity: column 0 is the velocity and the
//! remaining columns are interleaved (real, imaginary) eigenvalue pairs. Each
//! pair is treated as an independent sample at that velocity.
//!
//! The damping ratio of a sample is `sigma / |lambda|`, so positive damping
//! means an unstable mode. The flutter speed is where the envelope of the
//! largest damping ratio per velocity crosses zero.

use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use ap_core::{argsort, lerp_at};
use ap_io::{TableSource, discover_in, write_table, write_text};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{LinearError, LinearResult};

/// Eigenvalues with real part at or below this are numerical noise.
pub const NOISE_FLOOR: f64 = -50.0;

/// Window applied to sweep samples before damping is computed.
///
/// Velocity bounds are inclusive, frequency bounds are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeFilter {
    pub vmin: f64,
    pub vmax: f64,
    /// Lower bound on the imaginary part (rad/s)
    pub wdmin: f64,
    /// Upper bound on the imaginary part (rad/s)
    pub wdmax: f64,
    /// Report natural frequency in Hz instead of rad/s
    pub use_hz: bool,
}

impl Default for ModeFilter {
    fn default() -> Self {
        Self {
            vmin: 0.0,
            vmax: 1000.0,
            wdmin: -1.0,
            wdmax: 10000.0,
            use_hz: false,
        }
    }
}

impl ModeFilter {
    fn accepts(&self, v: f64, sigma: f64, omega: f64) -> bool {
        sigma > NOISE_FLOOR
            && omega > self.wdmin
            && omega < self.wdmax
            && v >= self.vmin
            && v <= self.vmax
            && sigma.hypot(omega) > 0.0
    }
}

/// Filtered samples, index-aligned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredModes {
    pub velocity: Vec<f64>,
    pub damping: Vec<f64>,
    /// Natural frequency in rad/s, or Hz when requested
    pub frequency: Vec<f64>,
}

impl FilteredModes {
    pub fn len(&self) -> usize {
        self.velocity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.velocity.is_empty()
    }

    /// `[v, damping, frequency]` columns.
    pub fn to_table(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.len(), 3, |i, j| match j {
            0 => self.velocity[i],
            1 => self.damping[i],
            _ => self.frequency[i],
        })
    }
}

/// Flatten a sweep into one `(v, sigma, omega)` sample per eigenvalue pair.
fn samples(v: &[f64], eigs: &DMatrix<f64>) -> LinearResult<Vec<(f64, f64, f64)>> {
    if v.len() != eigs.nrows() {
        return Err(LinearError::malformed(format!(
            "{} velocities for {} eigenvalue rows",
            v.len(),
            eigs.nrows()
        )));
    }
    if eigs.ncols() == 0 || eigs.ncols() % 2 != 0 {
        return Err(LinearError::malformed(format!(
            "eigenvalue columns must come in (real, imag) pairs, found {}",
            eigs.ncols()
        )));
    }

    let pairs = eigs.ncols() / 2;
    let mut out = Vec::with_capacity(v.len() * pairs);
    for (i, &vel) in v.iter().enumerate() {
        for k in 0..pairs {
            out.push((vel, eigs[(i, 2 * k)], eigs[(i, 2 * k + 1)]));
        }
    }
    Ok(out)
}

/// Samples that survive `filter`, as velocities and an `N x 2` eigenvalue
/// matrix. Applying the same filter to the output returns it unchanged.
pub fn filter_samples(
    v: &[f64],
    eigs: &DMatrix<f64>,
    filter: &ModeFilter,
) -> LinearResult<(Vec<f64>, DMatrix<f64>)> {
    let kept: Vec<(f64, f64, f64)> = samples(v, eigs)?
        .into_iter()
        .filter(|&(vel, sigma, omega)| filter.accepts(vel, sigma, omega))
        .collect();

    let velocity = kept.iter().map(|s| s.0).collect();
    let eigs = DMatrix::from_fn(kept.len(), 2, |i, j| if j == 0 { kept[i].1 } else { kept[i].2 });
    Ok((velocity, eigs))
}

/// Damping ratio and natural frequency of every sample passing `filter`.
pub fn modes(v: &[f64], eigs: &DMatrix<f64>, filter: &ModeFilter) -> LinearResult<FilteredModes> {
    let (velocity, kept) = filter_samples(v, eigs, filter)?;

    let mut damping = Vec::with_capacity(velocity.len());
    let mut frequency = Vec::with_capacity(velocity.len());
    for row in kept.row_iter() {
        let (sigma, omega) = (row[0], row[1]);
        let wn = sigma.hypot(omega);
        damping.push(sigma / wn);
        frequency.push(if filter.use_hz { wn / (2.0 * PI) } else { wn });
    }

    Ok(FilteredModes {
        velocity,
        damping,
        frequency,
    })
}

/// Largest damping ratio at each distinct velocity, velocities ascending.
pub fn max_mode(v: &[f64], damp: &[f64]) -> LinearResult<(Vec<f64>, Vec<f64>)> {
    if v.len() != damp.len() {
        return Err(LinearError::invalid(format!(
            "{} velocities for {} damping ratios",
            v.len(),
            damp.len()
        )));
    }
    let mut velocities: Vec<f64> = Vec::new();
    let mut envelope: Vec<f64> = Vec::new();

    for i in argsort(v) {
        match velocities.last() {
            Some(&last) if last == v[i] => {
                if let Some(top) = envelope.last_mut() {
                    *top = top.max(damp[i]);
                }
            }
            _ => {
                velocities.push(v[i]);
                envelope.push(damp[i]);
            }
        }
    }
    Ok((velocities, envelope))
}

/// Velocities at which the damping envelope crosses zero, in ascending
/// velocity order. Empty when the envelope never changes sign.
pub fn find_flutter_speed(v: &[f64], damp: &[f64]) -> LinearResult<Vec<f64>> {
    let (vu, max_damp) = max_mode(v, damp)?;

    let mut speeds = Vec::new();
    for i in 1..vu.len() {
        let (d0, d1) = (max_damp[i - 1], max_damp[i]);
        if (d0 >= 0.0) == (d1 >= 0.0) {
            continue;
        }
        // interpolate v(d) at d = 0 with the pair ordered by damping
        let ((xa, ya), (xb, yb)) = if d0 <= d1 {
            ((d0, vu[i - 1]), (d1, vu[i]))
        } else {
            ((d1, vu[i]), (d0, vu[i - 1]))
        };
        speeds.push(lerp_at(0.0, xa, ya, xb, yb));
    }
    Ok(speeds)
}

/// Contents of `flutter.txt`: one `Flutter speed = x.xxxx m/s` record per
/// speed, written back to back.
pub fn flutter_report(speeds: &[f64]) -> String {
    speeds
        .iter()
        .map(|s| format!("Flutter speed = {s:.4} m/s"))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct StabilityAnalysis {
    pub filter: ModeFilter,
    pub modes: FilteredModes,
    pub flutter_speeds: Vec<f64>,
}

/// Velocity sweep of eigenvalues for one case.
#[derive(Debug, Clone)]
pub struct Stability {
    source: Option<PathBuf>,
    /// Raw velocities, one per sweep row
    pub v: Vec<f64>,
    /// Raw eigenvalue pairs, row-aligned with `v`
    pub eigs: DMatrix<f64>,
    analysis: Option<StabilityAnalysis>,
}

impl Stability {
    pub fn new(v: Vec<f64>, eigs: DMatrix<f64>) -> LinearResult<Self> {
        // validates alignment and pairing
        samples(&v, &eigs)?;
        Ok(Self {
            source: None,
            v,
            eigs,
            analysis: None,
        })
    }

    /// Split a sweep table into velocity column and eigenvalue pairs.
    pub fn from_table(table: &DMatrix<f64>) -> LinearResult<Self> {
        if table.nrows() == 0 || table.ncols() < 3 {
            return Err(LinearError::malformed(format!(
                "velocity sweep needs at least one row and 3 columns, found {}x{}",
                table.nrows(),
                table.ncols()
            )));
        }
        let v = table.column(0).iter().copied().collect();
        let eigs = table.columns(1, table.ncols() - 1).into_owned();
        Self::new(v, eigs)
    }

    /// Load the last `velocity*.dat` sweep in `dir`.
    pub fn from_dir(dir: &Path, tables: &dyn TableSource) -> LinearResult<Self> {
        let files = discover_in(dir, "velocity*.dat")?;
        let Some(file) = files.last() else {
            return Err(LinearError::NotFound {
                what: format!("velocity sweep data in {}", dir.display()),
            });
        };
        debug!(path = %file.display(), "loading velocity sweep");

        let table = tables.read_table(file)?;
        let mut stability = Self::from_table(&table)?;
        stability.source = Some(file.clone());
        Ok(stability)
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn process(&mut self, filter: &ModeFilter) -> LinearResult<&StabilityAnalysis> {
        let modes = modes(&self.v, &self.eigs, filter)?;
        let flutter_speeds = find_flutter_speed(&modes.velocity, &modes.damping)?;
        info!(
            samples = modes.len(),
            flutter_speeds = ?flutter_speeds,
            "processed velocity sweep"
        );

        Ok(&*self.analysis.insert(StabilityAnalysis {
            filter: *filter,
            modes,
            flutter_speeds,
        }))
    }

    pub fn analysis(&self) -> Option<&StabilityAnalysis> {
        self.analysis.as_ref()
    }

    pub fn flutter_speeds(&self) -> Option<&[f64]> {
        self.analysis.as_ref().map(|a| a.flutter_speeds.as_slice())
    }

    /// `[v, eigs...]` as read.
    pub fn sweep_table(&self) -> DMatrix<f64> {
        let mut table = DMatrix::zeros(self.v.len(), self.eigs.ncols() + 1);
        for (i, &vel) in self.v.iter().enumerate() {
            table[(i, 0)] = vel;
        }
        table.columns_mut(1, self.eigs.ncols()).copy_from(&self.eigs);
        table
    }

    /// Write `stability_analysis.txt`, `flutter.txt` and `vel_eigs.txt`.
    pub fn save_to_file(&self, output_folder: &Path) -> LinearResult<()> {
        let analysis = self.analysis.as_ref().ok_or_else(|| {
            LinearError::invalid("velocity sweep must be processed before saving")
        })?;

        write_table(
            &output_folder.join("stability_analysis.txt"),
            &analysis.modes.to_table(),
        )?;
        write_text(
            &output_folder.join("flutter.txt"),
            &flutter_report(&analysis.flutter_speeds),
        )?;
        write_table(&output_folder.join("vel_eigs.txt"), &self.sweep_table())?;
        Ok(())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn sweep_strategy() -> impl Strategy<Value = (Vec<f64>, DMatrix<f64>)> {
        prop::collection::vec((0.0_f64..1500.0, -100.0_f64..10.0, -5.0_f64..12000.0), 0..60)
            .prop_map(|rows| {
                let v = rows.iter().map(|r| r.0).collect();
                let eigs =
                    DMatrix::from_fn(rows.len(), 2, |i, j| if j == 0 { rows[i].1 } else { rows[i].2 });
                (v, eigs)
            })
    }

    proptest! {
        #[test]
        fn filtering_is_idempotent((v, eigs) in sweep_strategy()) {
            let filter = ModeFilter::default();
            let (v1, e1) = filter_samples(&v, &eigs, &filter).unwrap();
            let (v2, e2) = filter_samples(&v1, &e1, &filter).unwrap();
            prop_assert_eq!(&v1, &v2);
            prop_assert_eq!(&e1, &e2);

            let m1 = modes(&v, &eigs, &filter).unwrap();
            let m2 = modes(&v1, &e1, &filter).unwrap();
            prop_assert_eq!(m1, m2);
        }

        #[test]
        fn flutter_speeds_lie_inside_sweep(
            damp in prop::collection::vec(-1.0_f64..1.0, 2..20)
        ) {
            let v: Vec<f64> = (0..damp.len()).map(|i| 10.0 * i as f64).collect();
            for s in find_flutter_speed(&v, &damp).unwrap() {
                prop_assert!(s >= v[0] && s <= v[v.len() - 1]);
            }
        }
    }
}
