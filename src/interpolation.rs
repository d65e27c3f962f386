//! Chebyshev interpolation of the far field
//!
//! The kernel on an admissible block is replaced by its tensor Chebyshev
//! interpolant on both clusters. The interpolation bases of all clusters of
//! a level are related by the same four transfer matrices, and the bases of
//! the floor clusters are tested against the local basis functions once and
//! for all in the moment matrices.
mod chebyshev;
mod kernel;
mod moments;
mod transfer;

pub use chebyshev::{chebyshev_roots, LagrangeBasis};
pub(crate) use kernel::kernel_matrices;
pub use moments::{cluster_element_offsets, MomentMatrix};
pub use transfer::TransferMatrices;

use crate::discretization::Discretization;
use crate::settings::HMatrixSettings;
use crate::traits::{Patch, PdeProblem};
use crate::types::{MomentSide, Result};
use rlst::RlstScalar;

/// Shared far field data of an H2 matrix.
pub struct Interpolation<T: RlstScalar<Real = f64>> {
    multiplicity: usize,
    floor_level: usize,
    lagrange: LagrangeBasis,
    transfer: TransferMatrices<T>,
    /// Left and right moments of every component
    moments: Vec<[MomentMatrix<T>; 2]>,
}

impl<T: RlstScalar<Real = f64>> Interpolation<T> {
    /// Set up the interpolation for a discretization.
    pub fn new<P: Patch, Pde: PdeProblem<T = T>>(
        disc: &Discretization<'_, P>,
        pde: &Pde,
        settings: &HMatrixSettings,
    ) -> Result<Self> {
        let level = disc.mesh().level();
        let floor_level = settings.floor_level(level);
        let multiplicity = pde.rank_multiplicity();
        let lagrange = LagrangeBasis::chebyshev(settings.np_max());
        let transfer = TransferMatrices::new(&lagrange);

        let moments = (0..pde.component_count())
            .map(|component| -> Result<[MomentMatrix<T>; 2]> {
                let kinds = |side| {
                    (0..multiplicity)
                        .map(|f| pde.moment_kind(component, side, f))
                        .collect::<Vec<_>>()
                };
                Ok([
                    MomentMatrix::new(
                        &lagrange,
                        disc.basis(),
                        &kinds(MomentSide::Left),
                        level,
                        level - floor_level,
                    )?,
                    MomentMatrix::new(
                        &lagrange,
                        disc.basis(),
                        &kinds(MomentSide::Right),
                        level,
                        level - floor_level,
                    )?,
                ])
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "Interpolation with {} points per axis, rank {}, floor level {}",
            lagrange.len(),
            multiplicity * lagrange.len() * lagrange.len(),
            floor_level
        );

        Ok(Self {
            multiplicity,
            floor_level,
            lagrange,
            transfer,
            moments,
        })
    }

    /// Number of Chebyshev points per axis
    pub fn np(&self) -> usize {
        self.lagrange.len()
    }

    /// Rank of the low rank blocks
    pub fn rank(&self) -> usize {
        self.multiplicity * self.np() * self.np()
    }

    /// Rank multiplicity
    pub fn multiplicity(&self) -> usize {
        self.multiplicity
    }

    /// Deepest level with interpolation coefficients
    pub fn floor_level(&self) -> usize {
        self.floor_level
    }

    /// Chebyshev nodes on `[0,1]`
    pub fn nodes(&self) -> &[f64] {
        self.lagrange.nodes()
    }

    /// The Lagrange polynomials
    pub fn lagrange(&self) -> &LagrangeBasis {
        &self.lagrange
    }

    /// The transfer matrices
    pub fn transfer(&self) -> &TransferMatrices<T> {
        &self.transfer
    }

    /// Moment matrix of a component
    pub fn moments(&self, component: usize, side: MomentSide) -> &MomentMatrix<T> {
        match side {
            MomentSide::Left => &self.moments[component][0],
            MomentSide::Right => &self.moments[component][1],
        }
    }
}
