//! Core types shared across the Beamfit framework.
//!
//! This module defines the data that flows through a decomposition: spatial
//! bounds, mode indices, coefficient maps, and the decomposition result.

use serde::{Deserialize, Serialize};

use crate::decomposition::DecompositionError;

/// Rectangular spatial domain of a transverse profile (metres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Lower corner `[x_min, y_min]`.
    pub lo: [f64; 2],
    /// Upper corner `[x_max, y_max]`.
    pub hi: [f64; 2],
}

impl Bounds {
    pub fn new(lo: [f64; 2], hi: [f64; 2]) -> Self {
        Self { lo, hi }
    }

    /// Square domain `[-half, half]²`.
    pub fn symmetric(half_width: f64) -> Self {
        Self {
            lo: [-half_width, -half_width],
            hi: [half_width, half_width],
        }
    }

    /// Extent along x and y.
    pub fn extent(&self) -> [f64; 2] {
        [self.hi[0] - self.lo[0], self.hi[1] - self.lo[1]]
    }

    pub fn centre(&self) -> [f64; 2] {
        [
            0.5 * (self.lo[0] + self.hi[0]),
            0.5 * (self.lo[1] + self.hi[1]),
        ]
    }

    /// Same extent, moved by `[dx, dy]`.
    pub fn translated(&self, offset: [f64; 2]) -> Self {
        Self {
            lo: [self.lo[0] + offset[0], self.lo[1] + offset[1]],
            hi: [self.hi[0] + offset[0], self.hi[1] + offset[1]],
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.lo[0] && x <= self.hi[0] && y >= self.lo[1] && y <= self.hi[1]
    }

    /// Check that both extents are finite and strictly positive.
    pub fn validate(&self) -> Result<(), DecompositionError> {
        let finite = self.lo.iter().chain(self.hi.iter()).all(|v| v.is_finite());
        let [ex, ey] = self.extent();
        if !finite || ex <= 0.0 || ey <= 0.0 {
            return Err(DecompositionError::InvalidDomain(format!(
                "bounds lo={:?} hi={:?} must have positive, finite extent along x and y",
                self.lo, self.hi
            )));
        }
        Ok(())
    }
}

/// Hermite-Gauss mode orders `(m, n)` along x and y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModeIndex {
    pub m: usize,
    pub n: usize,
}

impl ModeIndex {
    pub fn new(m: usize, n: usize) -> Self {
        Self { m, n }
    }

    /// Combined order `m + n`.
    pub fn order(&self) -> usize {
        self.m + self.n
    }
}

impl From<(usize, usize)> for ModeIndex {
    fn from((m, n): (usize, usize)) -> Self {
        Self { m, n }
    }
}

impl std::fmt::Display for ModeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.m, self.n)
    }
}

/// A single decomposition coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeCoefficient {
    #[serde(flatten)]
    pub index: ModeIndex,
    pub value: f64,
}

/// Ordered mapping from mode index to a real amplitude.
///
/// Keys are unique. Iteration follows insertion order, which for a
/// decomposition is `m` ascending in the outer loop and `n` ascending in the
/// inner loop, so summations are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoefficientMap {
    entries: Vec<ModeCoefficient>,
}

impl CoefficientMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert or replace a coefficient. Returns the previous value, if any.
    /// Replacing keeps the original position.
    pub fn insert(&mut self, index: impl Into<ModeIndex>, value: f64) -> Option<f64> {
        let index = index.into();
        match self.entries.iter_mut().find(|e| e.index == index) {
            Some(entry) => Some(std::mem::replace(&mut entry.value, value)),
            None => {
                self.entries.push(ModeCoefficient { index, value });
                None
            }
        }
    }

    /// Append a coefficient whose index is known to be absent.
    pub(crate) fn push_unique(&mut self, index: ModeIndex, value: f64) {
        debug_assert!(self.entries.last().map_or(true, |e| e.index != index));
        self.entries.push(ModeCoefficient { index, value });
    }

    pub fn get(&self, index: impl Into<ModeIndex>) -> Option<f64> {
        let index = index.into();
        self.entries
            .iter()
            .find(|e| e.index == index)
            .map(|e| e.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModeIndex, f64)> + '_ {
        self.entries.iter().map(|e| (e.index, e.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = ModeIndex> + '_ {
        self.entries.iter().map(|e| e.index)
    }

    /// Sum of squared coefficients: the energy fraction captured by these modes.
    pub fn energy(&self) -> f64 {
        self.entries.iter().map(|e| e.value * e.value).sum()
    }

    /// Highest `m` and `n` present, or `None` if empty.
    pub fn max_orders(&self) -> Option<(usize, usize)> {
        let m = self.entries.iter().map(|e| e.index.m).max()?;
        let n = self.entries.iter().map(|e| e.index.n).max()?;
        Some((m, n))
    }

    /// Keep only modes with `m <= m_max` and `n <= n_max`.
    pub fn truncated(&self, m_max: usize, n_max: usize) -> Self {
        self.filtered(|idx, _| idx.m <= m_max && idx.n <= n_max)
    }

    /// Keep only modes whose combined order `m + n` is at most `max_order`.
    pub fn truncated_to_order(&self, max_order: usize) -> Self {
        self.filtered(|idx, _| idx.order() <= max_order)
    }

    /// Keep the `count` coefficients with the largest magnitude.
    ///
    /// The survivors retain their original relative order.
    pub fn strongest(&self, count: usize) -> Self {
        let mut ranked: Vec<usize> = (0..self.entries.len()).collect();
        ranked.sort_by(|&a, &b| {
            self.entries[b]
                .value
                .abs()
                .total_cmp(&self.entries[a].value.abs())
                .then(a.cmp(&b))
        });
        ranked.truncate(count);
        ranked.sort_unstable();
        Self {
            entries: ranked.into_iter().map(|i| self.entries[i]).collect(),
        }
    }

    /// Drop coefficients with magnitude below `threshold`.
    pub fn above(&self, threshold: f64) -> Self {
        self.filtered(|_, v| v.abs() >= threshold)
    }

    fn filtered(&self, keep: impl Fn(ModeIndex, f64) -> bool) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .copied()
                .filter(|e| keep(e.index, e.value))
                .collect(),
        }
    }
}

impl FromIterator<(ModeIndex, f64)> for CoefficientMap {
    fn from_iter<I: IntoIterator<Item = (ModeIndex, f64)>>(iter: I) -> Self {
        let mut map = CoefficientMap::new();
        for (index, value) in iter {
            map.insert(index, value);
        }
        map
    }
}

/// Result of a Hermite-Gauss decomposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    /// Coefficients of the unit-energy field for every requested mode.
    pub coefficients: CoefficientMap,
    /// Best-fit waist shared by x and y (m).
    pub waist: f64,
    /// Wavelength at which the basis is defined (m).
    pub wavelength: f64,
    /// L2 norm of the sampled field before normalisation. Multiply a
    /// reconstruction by this to recover the measured amplitude scale.
    pub field_norm: f64,
}

impl Decomposition {
    /// Energy fraction captured by all retained modes.
    pub fn energy(&self) -> f64 {
        self.coefficients.energy()
    }

    /// `(coefficients, waist)` pair.
    pub fn into_parts(self) -> (CoefficientMap, f64) {
        (self.coefficients, self.waist)
    }
}
