//! Transverse laser profiles.
//!
//! A transverse profile is anything that can report the complex field
//! amplitude $E(x, y)$ at a point of the transverse plane. Measured profiles
//! additionally declare the rectangular domain on which they are defined.
//!
//! Implementations:
//! - [`DataProfile`] — built from a measured intensity image.
//! - [`GaussianProfile`] — fundamental Gaussian of arbitrary amplitude.
//! - [`HermiteGaussianProfile`](crate::basis::HermiteGaussianProfile) — one
//!   orthonormal basis mode.
//! - [`CombinedProfile`](crate::reconstruction::CombinedProfile) — weighted
//!   sum of basis modes.

use ndarray::Array2;
use num_complex::Complex64;

use crate::decomposition::DecompositionError;
use crate::moments;
use crate::types::Bounds;

/// A field that can be sampled anywhere in the transverse plane.
pub trait TransverseProfile: Send + Sync {
    /// Complex field amplitude at `(x, y)` (metres).
    fn evaluate(&self, x: f64, y: f64) -> Complex64;

    /// Spatial domain of the profile, if it has one.
    ///
    /// Analytic profiles extend over the whole plane and return `None`.
    fn bounds(&self) -> Option<Bounds> {
        None
    }

    /// Local intensity $|E(x, y)|^2$.
    fn intensity(&self, x: f64, y: f64) -> f64 {
        self.evaluate(x, y).norm_sqr()
    }

    /// Attach a domain to this profile.
    fn within(self, bounds: Bounds) -> BoundedProfile<Self>
    where
        Self: Sized,
    {
        BoundedProfile {
            inner: self,
            bounds,
        }
    }
}

impl<P: TransverseProfile + ?Sized> TransverseProfile for &P {
    fn evaluate(&self, x: f64, y: f64) -> Complex64 {
        (**self).evaluate(x, y)
    }

    fn bounds(&self) -> Option<Bounds> {
        (**self).bounds()
    }
}

impl<P: TransverseProfile + ?Sized> TransverseProfile for Box<P> {
    fn evaluate(&self, x: f64, y: f64) -> Complex64 {
        (**self).evaluate(x, y)
    }

    fn bounds(&self) -> Option<Bounds> {
        (**self).bounds()
    }
}

/// A profile restricted to (or at least declared on) a rectangular domain.
///
/// The wrapped field is still evaluated outside the bounds; the bounds only
/// tell consumers where to sample.
#[derive(Debug, Clone)]
pub struct BoundedProfile<P> {
    inner: P,
    bounds: Bounds,
}

impl<P: TransverseProfile> TransverseProfile for BoundedProfile<P> {
    fn evaluate(&self, x: f64, y: f64) -> Complex64 {
        self.inner.evaluate(x, y)
    }

    fn bounds(&self) -> Option<Bounds> {
        Some(self.bounds)
    }
}

/// Fundamental Gaussian $E = A \exp(-(x^2 + y^2)/w^2)$.
#[derive(Debug, Clone, Copy)]
pub struct GaussianProfile {
    pub waist: f64,
    pub amplitude: f64,
}

impl GaussianProfile {
    pub fn new(waist: f64, amplitude: f64) -> Result<Self, DecompositionError> {
        if !(waist.is_finite() && waist > 0.0) {
            return Err(DecompositionError::InvalidParameter(format!(
                "Gaussian waist must be positive, got {waist}"
            )));
        }
        Ok(Self { waist, amplitude })
    }
}

impl TransverseProfile for GaussianProfile {
    fn evaluate(&self, x: f64, y: f64) -> Complex64 {
        let r2 = (x * x + y * y) / (self.waist * self.waist);
        Complex64::from(self.amplitude * (-r2).exp())
    }
}

/// A transverse profile built from a measured intensity image.
///
/// The image is a 2D array of shape `(ny, nx)` (row index = y) whose samples
/// sit on a uniform grid spanning `bounds` inclusively. The field amplitude
/// is $\sqrt{\max(I, 0)}$; the phase is zero unless a phase map is supplied.
/// Between samples the amplitude (and phase) are bilinearly interpolated;
/// outside the bounds the field is zero.
#[derive(Debug, Clone)]
pub struct DataProfile {
    amplitude: Array2<f64>,
    phase: Option<Array2<f64>>,
    data_bounds: Bounds,
    offset: [f64; 2],
}

impl DataProfile {
    /// Build a profile from a measured intensity map.
    ///
    /// # Arguments
    /// * `intensity` - Intensity samples, shape `(ny, nx)`, at least 2x2.
    /// * `bounds` - Positions of the first and last sample along each axis (m).
    pub fn from_intensity(intensity: Array2<f64>, bounds: Bounds) -> Result<Self, DecompositionError> {
        bounds.validate()?;
        let (ny, nx) = intensity.dim();
        if nx < 2 || ny < 2 {
            return Err(DecompositionError::InvalidParameter(format!(
                "Intensity map must be at least 2x2, got {}x{}",
                nx, ny
            )));
        }
        if intensity.iter().any(|v| !v.is_finite()) {
            return Err(DecompositionError::InvalidParameter(
                "Intensity map contains non-finite values".into(),
            ));
        }

        Ok(Self {
            amplitude: intensity.mapv(|i| i.max(0.0).sqrt()),
            phase: None,
            data_bounds: bounds,
            offset: [0.0, 0.0],
        })
    }

    /// Build a profile from an intensity map with a known pixel pitch,
    /// centred on the origin.
    pub fn with_pixel_size(intensity: Array2<f64>, pixel_size: [f64; 2]) -> Result<Self, DecompositionError> {
        let (ny, nx) = intensity.dim();
        let half_x = 0.5 * pixel_size[0] * nx.saturating_sub(1) as f64;
        let half_y = 0.5 * pixel_size[1] * ny.saturating_sub(1) as f64;
        Self::from_intensity(intensity, Bounds::new([-half_x, -half_y], [half_x, half_y]))
    }

    /// Attach a measured phase map (radians), same shape as the intensity.
    pub fn with_phase(mut self, phase: Array2<f64>) -> Result<Self, DecompositionError> {
        if phase.dim() != self.amplitude.dim() {
            return Err(DecompositionError::InvalidParameter(format!(
                "Phase map shape {:?} does not match intensity shape {:?}",
                phase.dim(),
                self.amplitude.dim()
            )));
        }
        self.phase = Some(phase);
        Ok(self)
    }

    /// Shift the profile by `[dx, dy]` (m).
    pub fn with_offset(mut self, offset: [f64; 2]) -> Self {
        self.offset = offset;
        self
    }

    /// Shift the profile so that its intensity centroid sits at the origin.
    pub fn centred(self) -> Self {
        let intensity = self.amplitude.mapv(|a| a * a);
        let Some((cx_px, cy_px)) = moments::centroid(&intensity) else {
            return self;
        };
        let [px, py] = self.pixel_size();
        let cx = self.data_bounds.lo[0] + cx_px * px;
        let cy = self.data_bounds.lo[1] + cy_px * py;
        self.with_offset([-cx, -cy])
    }

    pub fn offset(&self) -> [f64; 2] {
        self.offset
    }

    /// Shape of the underlying image `(ny, nx)`.
    pub fn dim(&self) -> (usize, usize) {
        self.amplitude.dim()
    }

    /// Distance between adjacent samples along x and y (m).
    pub fn pixel_size(&self) -> [f64; 2] {
        let (ny, nx) = self.amplitude.dim();
        let [ex, ey] = self.data_bounds.extent();
        [ex / (nx - 1) as f64, ey / (ny - 1) as f64]
    }

    /// Bilinear interpolation of `data` at fractional pixel position `(u, v)`.
    fn interpolate(data: &Array2<f64>, u: f64, v: f64) -> f64 {
        let (ny, nx) = data.dim();
        let i0 = (u.floor() as usize).min(nx - 2);
        let j0 = (v.floor() as usize).min(ny - 2);
        let tu = u - i0 as f64;
        let tv = v - j0 as f64;

        let f00 = data[[j0, i0]];
        let f10 = data[[j0, i0 + 1]];
        let f01 = data[[j0 + 1, i0]];
        let f11 = data[[j0 + 1, i0 + 1]];

        (1.0 - tv) * ((1.0 - tu) * f00 + tu * f10) + tv * ((1.0 - tu) * f01 + tu * f11)
    }
}

impl TransverseProfile for DataProfile {
    fn evaluate(&self, x: f64, y: f64) -> Complex64 {
        let xd = x - self.offset[0];
        let yd = y - self.offset[1];
        if !self.data_bounds.contains(xd, yd) {
            return Complex64::new(0.0, 0.0);
        }

        let [px, py] = self.pixel_size();
        let u = (xd - self.data_bounds.lo[0]) / px;
        let v = (yd - self.data_bounds.lo[1]) / py;

        let amp = Self::interpolate(&self.amplitude, u, v);
        match &self.phase {
            Some(phase) => Complex64::from_polar(amp, Self::interpolate(phase, u, v)),
            None => Complex64::from(amp),
        }
    }

    fn bounds(&self) -> Option<Bounds> {
        Some(self.data_bounds.translated(self.offset))
    }
}
