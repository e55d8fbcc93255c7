//! Bounded one-dimensional search for the best-fit waist.
//!
//! The residual energy $r(w) = 1 - \sum c_{mn}(w)^2$ is sampled on a coarse
//! uniform scan of the bracket; the best sample and its two neighbours then
//! seed a golden-section refinement. The scan guards against the shallow
//! secondary minima that appear when the mode orders are truncated.

use crate::decomposition::{DecomposerSettings, DecompositionError};

const INV_PHI: f64 = 0.618_033_988_749_894_9;

/// Search interval for the waist (m).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaistBracket {
    pub lower: f64,
    pub upper: f64,
}

impl WaistBracket {
    /// Bracket around a D4σ estimate.
    ///
    /// The second-moment width of a field expressed in modes up to order
    /// $N$ at waist $w$ lies between $w$ and $w\sqrt{2N + 1}$, so the true
    /// waist can sit well below the estimate for high-order content.
    pub fn around(estimate: f64, max_order: usize) -> Self {
        Self {
            lower: 0.5 * estimate / ((1 + max_order) as f64).sqrt(),
            upper: 1.5 * estimate,
        }
    }
}

/// Outcome of a waist search.
#[derive(Debug, Clone, Copy)]
pub struct WaistSearch {
    pub waist: f64,
    pub residual: f64,
    /// Number of objective evaluations.
    pub evaluations: usize,
}

/// Minimise `objective` over `bracket`.
///
/// Fails with [`DecompositionError::NumericalConvergence`] if the refinement
/// does not reach `settings.waist_tolerance` within `settings.max_iterations`
/// iterations, or if the objective is never finite.
pub fn optimise_waist<F>(
    mut objective: F,
    bracket: WaistBracket,
    settings: &DecomposerSettings,
) -> Result<WaistSearch, DecompositionError>
where
    F: FnMut(f64) -> Result<f64, DecompositionError>,
{
    let WaistBracket { lower, upper } = bracket;
    if !(lower.is_finite() && lower > 0.0 && upper > lower) {
        return Err(DecompositionError::InvalidParameter(format!(
            "invalid waist bracket [{lower:.3e}, {upper:.3e}]"
        )));
    }

    let mut evaluations = 0;
    let mut eval = |w: f64| -> Result<f64, DecompositionError> {
        evaluations += 1;
        let r = objective(w)?;
        Ok(if r.is_finite() { r } else { f64::INFINITY })
    };

    // Coarse scan
    let n = settings.scan_points;
    let step = (upper - lower) / (n - 1) as f64;
    let mut best = (0, f64::INFINITY);
    for i in 0..n {
        let r = eval(lower + i as f64 * step)?;
        if r < best.1 {
            best = (i, r);
        }
    }
    if !best.1.is_finite() {
        return Err(DecompositionError::NumericalConvergence {
            max_iter: 0,
            width: upper - lower,
        });
    }
    let (best_idx, best_residual) = best;
    let best_waist = lower + best_idx as f64 * step;
    log::debug!(
        "waist scan: best sample {:.4e} m (residual {:.3e})",
        best_waist,
        best_residual
    );

    // Golden-section refinement between the neighbouring samples
    let mut a = lower + best_idx.saturating_sub(1) as f64 * step;
    let mut b = lower + (best_idx + 1).min(n - 1) as f64 * step;
    let mut c = b - INV_PHI * (b - a);
    let mut d = a + INV_PHI * (b - a);
    let mut fc = eval(c)?;
    let mut fd = eval(d)?;

    let mut iterations = 0;
    while b - a > settings.waist_tolerance * 0.5 * (a + b) {
        if iterations == settings.max_iterations {
            return Err(DecompositionError::NumericalConvergence {
                max_iter: settings.max_iterations,
                width: b - a,
            });
        }
        iterations += 1;
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - INV_PHI * (b - a);
            fc = eval(c)?;
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + INV_PHI * (b - a);
            fd = eval(d)?;
        }
    }

    let mid = 0.5 * (a + b);
    let f_mid = eval(mid)?;
    log::debug!(
        "waist refinement: {} iterations, bracket [{:.6e}, {:.6e}]",
        iterations,
        a,
        b
    );

    let (waist, residual) = if f_mid <= best_residual {
        (mid, f_mid)
    } else {
        (best_waist, best_residual)
    };
    Ok(WaistSearch {
        waist,
        residual,
        evaluations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parabola_minimum() {
        let settings = DecomposerSettings::default();
        let bracket = WaistBracket { lower: 1.0, upper: 5.0 };
        let s = optimise_waist(|w| Ok((w - 2.345).powi(2)), bracket, &settings).unwrap();
        assert_relative_eq!(s.waist, 2.345, max_relative = 1e-5);
        assert!(s.residual < 1e-9);
        assert!(s.evaluations > settings.scan_points);
    }

    #[test]
    fn test_minimum_on_bracket_edge() {
        let settings = DecomposerSettings::default();
        let bracket = WaistBracket { lower: 1.0, upper: 2.0 };
        let s = optimise_waist(|w| Ok(w), bracket, &settings).unwrap();
        assert_relative_eq!(s.waist, 1.0, max_relative = 1e-5);
    }

    #[test]
    fn test_scan_escapes_shallow_local_minimum() {
        // Local minimum at 1.5 (value 0.2), global at 4.0 (value 0).
        let f = |w: f64| Ok(((w - 1.5).powi(2) + 0.2).min(3.0 * (w - 4.0).powi(2)));
        let bracket = WaistBracket { lower: 1.0, upper: 5.0 };
        let s = optimise_waist(f, bracket, &DecomposerSettings::default()).unwrap();
        assert_relative_eq!(s.waist, 4.0, max_relative = 1e-5);
    }

    #[test]
    fn test_iteration_budget_exhausted() {
        let settings = DecomposerSettings {
            max_iterations: 2,
            ..Default::default()
        };
        let bracket = WaistBracket { lower: 1.0, upper: 5.0 };
        let err = optimise_waist(|w| Ok((w - 2.0).powi(2)), bracket, &settings).unwrap_err();
        assert!(matches!(
            err,
            DecompositionError::NumericalConvergence { max_iter: 2, .. }
        ));
    }

    #[test]
    fn test_non_finite_objective() {
        let bracket = WaistBracket { lower: 1.0, upper: 5.0 };
        let err = optimise_waist(|_| Ok(f64::NAN), bracket, &DecomposerSettings::default())
            .unwrap_err();
        assert!(matches!(err, DecompositionError::NumericalConvergence { .. }));
    }

    #[test]
    fn test_bracket_around_estimate() {
        let b = WaistBracket::around(2.0, 3);
        assert_relative_eq!(b.lower, 0.5);
        assert_relative_eq!(b.upper, 3.0);
    }
}
