//! Orthonormal Hermite-Gauss basis.
//!
//! The 1D Hermite-Gauss mode of order $m$ and waist $w$ is
//!
//! $$
//! u_m(x; w) = \sqrt{\frac{\sqrt{2}}{w}}\, \psi_m\!\left(\frac{\sqrt{2}\,x}{w}\right),
//! \qquad
//! \psi_m(\xi) = \frac{H_m(\xi)\, e^{-\xi^2/2}}{\sqrt{2^m m! \sqrt{\pi}}}
//! $$
//!
//! so that $\int u_m u_k \, dx = \delta_{mk}$ and $u_0 \propto e^{-x^2/w^2}$.
//! The 2D mode is the product $u_m(x; w_x)\, u_n(y; w_y)$.
//!
//! $\psi_m$ is evaluated through its three-term recurrence rather than
//! through $H_m$ and factorials, which overflow long before the modes become
//! numerically uninteresting.

use std::f64::consts::{PI, SQRT_2};

use ndarray::{Array1, Array2};
use num_complex::Complex64;

use crate::decomposition::DecompositionError;
use crate::profile::TransverseProfile;

/// Orthonormal Hermite functions $\psi_0(\xi) \ldots \psi_{\text{max}}(\xi)$.
///
/// Uses
/// $\psi_{k+1} = \sqrt{2/(k+1)}\,\xi\,\psi_k - \sqrt{k/(k+1)}\,\psi_{k-1}$
/// starting from $\psi_0 = \pi^{-1/4} e^{-\xi^2/2}$.
pub fn hermite_functions_upto(max_order: usize, xi: f64) -> Vec<f64> {
    let mut psi = Vec::with_capacity(max_order + 1);
    psi.push(PI.powf(-0.25) * (-0.5 * xi * xi).exp());
    if max_order == 0 {
        return psi;
    }
    psi.push(SQRT_2 * xi * psi[0]);
    for k in 1..max_order {
        let kf = k as f64;
        let next = (2.0 / (kf + 1.0)).sqrt() * xi * psi[k] - (kf / (kf + 1.0)).sqrt() * psi[k - 1];
        psi.push(next);
    }
    psi
}

/// Single orthonormal Hermite function $\psi_n(\xi)$.
pub fn hermite_function(order: usize, xi: f64) -> f64 {
    hermite_functions_upto(order, xi)[order]
}

/// 1D Hermite-Gauss mode $u_m(x; w)$, normalised to unit $L^2$ norm.
pub fn mode_1d(order: usize, x: f64, waist: f64) -> f64 {
    (SQRT_2 / waist).sqrt() * hermite_function(order, SQRT_2 * x / waist)
}

/// Tabulate $u_0 \ldots u_{\text{max}}$ on a 1D axis.
///
/// # Returns
/// Array of shape `(max_order + 1, axis.len())`; row `m` holds $u_m(x_j)$.
pub fn mode_table(max_order: usize, axis: &Array1<f64>, waist: f64) -> Array2<f64> {
    let scale = (SQRT_2 / waist).sqrt();
    let mut table = Array2::<f64>::zeros((max_order + 1, axis.len()));
    for (j, &x) in axis.iter().enumerate() {
        let psi = hermite_functions_upto(max_order, SQRT_2 * x / waist);
        for (m, value) in psi.into_iter().enumerate() {
            table[[m, j]] = scale * value;
        }
    }
    table
}

/// One orthonormal Hermite-Gauss mode $(m, n)$.
///
/// At the focal plane ($z = 0$) the mode is real. [`evaluate_at`](Self::evaluate_at)
/// gives the closed-form paraxial mode at distance $z$ from focus, which
/// stays normalised at every $z$.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HermiteGaussianProfile {
    waist_x: f64,
    waist_y: f64,
    m: usize,
    n: usize,
    wavelength: f64,
}

impl HermiteGaussianProfile {
    /// Create the mode of order `(m, n)`.
    ///
    /// # Arguments
    /// * `waist_x`, `waist_y` - Waists at focus along x and y (m).
    /// * `m`, `n` - Mode orders along x and y.
    /// * `wavelength` - Central wavelength (m), used for the Rayleigh ranges.
    pub fn new(
        waist_x: f64,
        waist_y: f64,
        m: usize,
        n: usize,
        wavelength: f64,
    ) -> Result<Self, DecompositionError> {
        for (name, value) in [("waist_x", waist_x), ("waist_y", waist_y), ("wavelength", wavelength)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(DecompositionError::InvalidParameter(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        Ok(Self {
            waist_x,
            waist_y,
            m,
            n,
            wavelength,
        })
    }

    /// Isotropic mode with a shared waist.
    pub fn isotropic(waist: f64, m: usize, n: usize, wavelength: f64) -> Result<Self, DecompositionError> {
        Self::new(waist, waist, m, n, wavelength)
    }

    pub fn orders(&self) -> (usize, usize) {
        (self.m, self.n)
    }

    pub fn waists(&self) -> (f64, f64) {
        (self.waist_x, self.waist_y)
    }

    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }

    /// Rayleigh range $z_R = \pi w_x^2 / \lambda$ along x.
    pub fn rayleigh_range_x(&self) -> f64 {
        PI * self.waist_x * self.waist_x / self.wavelength
    }

    /// Rayleigh range $z_R = \pi w_y^2 / \lambda$ along y.
    pub fn rayleigh_range_y(&self) -> f64 {
        PI * self.waist_y * self.waist_y / self.wavelength
    }

    /// Paraxial mode at distance `z` from focus.
    ///
    /// Per axis: $u_m(x; w(z))\, e^{-i k x^2 / 2R(z)}\, e^{i(m + 1/2)\zeta(z)}$,
    /// with $w(z) = w_0\sqrt{1 + (z/z_R)^2}$, $1/R = z/(z^2 + z_R^2)$ and
    /// Gouy phase $\zeta = \arctan(z/z_R)$. The carrier $e^{i(\omega t - kz)}$
    /// is omitted.
    pub fn evaluate_at(&self, x: f64, y: f64, z: f64) -> Complex64 {
        let k = 2.0 * PI / self.wavelength;
        let axis = |coord: f64, w0: f64, zr: f64, order: usize| -> Complex64 {
            let w = w0 * (1.0 + (z / zr).powi(2)).sqrt();
            let inv_r = z / (z * z + zr * zr);
            let gouy = (z / zr).atan();
            let phase = -0.5 * k * coord * coord * inv_r + (order as f64 + 0.5) * gouy;
            Complex64::from_polar(mode_1d(order, coord, w), phase)
        };
        axis(x, self.waist_x, self.rayleigh_range_x(), self.m)
            * axis(y, self.waist_y, self.rayleigh_range_y(), self.n)
    }
}

impl TransverseProfile for HermiteGaussianProfile {
    fn evaluate(&self, x: f64, y: f64) -> Complex64 {
        Complex64::from(mode_1d(self.m, x, self.waist_x) * mode_1d(self.n, y, self.waist_y))
    }
}

/// Build the `(m, n)` basis mode. Shorthand for [`HermiteGaussianProfile::new`].
pub fn basis_function(
    m: usize,
    n: usize,
    waist_x: f64,
    waist_y: f64,
    wavelength: f64,
) -> Result<HermiteGaussianProfile, DecompositionError> {
    HermiteGaussianProfile::new(waist_x, waist_y, m, n, wavelength)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Physicists' Hermite polynomials by explicit formula, for cross-checking.
    fn hermite_poly(n: usize, x: f64) -> f64 {
        match n {
            0 => 1.0,
            1 => 2.0 * x,
            2 => 4.0 * x * x - 2.0,
            3 => 8.0 * x.powi(3) - 12.0 * x,
            4 => 16.0 * x.powi(4) - 48.0 * x * x + 12.0,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_recurrence_matches_closed_form() {
        let factorial = [1.0, 1.0, 2.0, 6.0, 24.0];
        for &xi in &[-2.3, -0.5, 0.0, 0.7, 1.9] {
            let psi = hermite_functions_upto(4, xi);
            for n in 0..=4 {
                let norm = (2f64.powi(n as i32) * factorial[n] * PI.sqrt()).sqrt();
                let expected = hermite_poly(n, xi) * (-0.5 * xi * xi).exp() / norm;
                assert_abs_diff_eq!(psi[n], expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_fundamental_mode_shape() {
        // u_0(x) = (2/pi)^(1/4) / sqrt(w) * exp(-x^2/w^2)
        let w: f64 = 3.0;
        let expected = (2.0 / PI).powf(0.25) / w.sqrt() * (-1.0f64).exp();
        assert_abs_diff_eq!(mode_1d(0, w, w), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_mode_1d_normalised() {
        let w = 1.0;
        let dx = 0.005;
        for order in 0..6 {
            let sum: f64 = (-2000..=2000)
                .map(|i| {
                    let u = mode_1d(order, i as f64 * dx, w);
                    u * u * dx
                })
                .sum();
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_parity() {
        for order in 0..5 {
            let sign = if order % 2 == 0 { 1.0 } else { -1.0 };
            assert_abs_diff_eq!(mode_1d(order, -0.4, 1.0), sign * mode_1d(order, 0.4, 1.0), epsilon = 1e-14);
        }
    }

    #[test]
    fn test_mode_table_rows() {
        let axis = Array1::linspace(-2.0, 2.0, 9);
        let table = mode_table(3, &axis, 1.5);
        assert_eq!(table.dim(), (4, 9));
        for m in 0..=3 {
            for (j, &x) in axis.iter().enumerate() {
                assert_abs_diff_eq!(table[[m, j]], mode_1d(m, x, 1.5), epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_profile_is_product_of_axes() {
        let p = HermiteGaussianProfile::new(1.0, 2.0, 2, 1, 800e-9).unwrap();
        let e = p.evaluate(0.3, -0.4);
        assert_abs_diff_eq!(e.re, mode_1d(2, 0.3, 1.0) * mode_1d(1, -0.4, 2.0), epsilon = 1e-14);
        assert_eq!(e.im, 0.0);
    }

    #[test]
    fn test_focal_plane_matches_evaluate() {
        let p = HermiteGaussianProfile::isotropic(50e-6, 1, 2, 800e-9).unwrap();
        let a = p.evaluate(20e-6, -10e-6);
        let b = p.evaluate_at(20e-6, -10e-6, 0.0);
        assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-9 * a.re.abs().max(1.0));
        assert_abs_diff_eq!(b.im, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_gouy_phase_at_rayleigh_range() {
        // On axis at z = z_R the (0, 0) mode carries Gouy phase 2 * pi/8 and
        // its amplitude drops by 1/sqrt(2) (intensity by 1/2).
        let p = HermiteGaussianProfile::isotropic(1e-3, 0, 0, 1e-6).unwrap();
        let zr = p.rayleigh_range_x();
        let e0 = p.evaluate_at(0.0, 0.0, 0.0);
        let e = p.evaluate_at(0.0, 0.0, zr);
        assert_abs_diff_eq!(e.arg(), PI / 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(e.norm() / e0.norm(), 0.5f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(HermiteGaussianProfile::new(0.0, 1.0, 0, 0, 1e-6).is_err());
        assert!(HermiteGaussianProfile::new(1.0, -1.0, 0, 0, 1e-6).is_err());
        assert!(basis_function(0, 0, 1.0, 1.0, f64::NAN).is_err());
        assert!(basis_function(3, 4, 1.0, 1.0, 1e-6).is_ok());
    }
}
