//! Settings of the H2 matrix construction
use crate::types::{Error, Result};

/// Default admissibility parameter
pub const DEFAULT_ETA: f64 = 1.6;
/// Default number of Chebyshev points per axis
pub const DEFAULT_NP_MAX: usize = 4;

/// Parameters controlling the compression.
///
/// `eta` is the admissibility threshold, `np_max` the number of Chebyshev
/// points per axis of a cluster and `min_bsize` the recursion floor: blocks
/// whose clusters contain at most `4^min_bsize` elements are stored densely
/// when they are not admissible.
#[derive(Debug, Clone, PartialEq)]
pub struct HMatrixSettings {
    eta: f64,
    np_max: usize,
    min_bsize: usize,
}

impl Default for HMatrixSettings {
    fn default() -> Self {
        Self {
            eta: DEFAULT_ETA,
            np_max: DEFAULT_NP_MAX,
            min_bsize: 1,
        }
    }
}

impl HMatrixSettings {
    /// Create settings.
    pub fn new(eta: f64, np_max: usize, min_bsize: usize) -> Result<Self> {
        let settings = Self {
            eta,
            np_max,
            min_bsize,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Settings with `min_bsize` chosen so that a dense floor block is not
    /// smaller than the interpolation rank.
    pub fn for_discretization(np_max: usize, a_bs: usize, rank_multiplicity: usize) -> Self {
        let rank = rank_multiplicity * np_max * np_max;
        let min_bsize = if rank > 1 && a_bs > 0 {
            let ratio = (rank - 1) as f64 / a_bs as f64;
            usize::max(1, (ratio.ln() / 4f64.ln()).floor().max(0.0) as usize)
        } else {
            1
        };
        Self {
            eta: DEFAULT_ETA,
            np_max,
            min_bsize,
        }
    }

    /// Check that the settings can be used.
    pub fn validate(&self) -> Result<()> {
        if !(self.eta.is_finite() && self.eta > 0.0) {
            return Err(Error::InvalidSettings(format!(
                "eta must be positive and finite, found {}",
                self.eta
            )));
        }
        if self.np_max == 0 {
            return Err(Error::InvalidSettings(
                "np_max must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Admissibility parameter
    pub fn eta(&self) -> f64 {
        self.eta
    }
    /// Number of Chebyshev points per axis
    pub fn np_max(&self) -> usize {
        self.np_max
    }
    /// Recursion floor
    pub fn min_bsize(&self) -> usize {
        self.min_bsize
    }

    /// Set the admissibility parameter.
    pub fn set_eta(&mut self, eta: f64) {
        self.eta = eta;
    }
    /// Set the number of Chebyshev points per axis.
    pub fn set_np_max(&mut self, np_max: usize) {
        self.np_max = np_max;
    }
    /// Set the recursion floor.
    pub fn set_min_bsize(&mut self, min_bsize: usize) {
        self.min_bsize = min_bsize;
    }

    /// The deepest level on which clusters carry interpolation coefficients.
    pub fn floor_level(&self, level: usize) -> usize {
        level.saturating_sub(self.min_bsize)
    }

    /// Rank of a low rank block.
    pub fn rank(&self, rank_multiplicity: usize) -> usize {
        rank_multiplicity * self.np_max * self.np_max
    }
}
