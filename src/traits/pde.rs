//! PDE problem traits
use crate::near_field::ElementPair;
use crate::traits::Patch;
use crate::types::{Error, MomentKind, MomentSide, Result, Symmetry};
use rlst::RlstScalar;

/// Arrangement of matrix components into a block operator.
///
/// Entry `(row, col)` is either empty or refers to a component, optionally
/// applied transposed.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockLayout {
    nblocks: usize,
    entries: Vec<Option<(usize, bool)>>,
}

impl BlockLayout {
    /// A single block holding component 0.
    pub fn single() -> Self {
        Self {
            nblocks: 1,
            entries: vec![Some((0, false))],
        }
    }

    /// Create a layout from its entries in row-major order.
    pub fn new(nblocks: usize, entries: Vec<Option<(usize, bool)>>) -> Result<Self> {
        if nblocks == 0 || entries.len() != nblocks * nblocks {
            return Err(Error::DimensionMismatch {
                expected: nblocks * nblocks,
                actual: entries.len(),
            });
        }
        Ok(Self { nblocks, entries })
    }

    /// Number of block rows and columns
    pub fn nblocks(&self) -> usize {
        self.nblocks
    }

    /// Component in block `(row, col)` and whether it is transposed
    pub fn entry(&self, row: usize, col: usize) -> Option<(usize, bool)> {
        self.entries[row * self.nblocks + col]
    }

    /// Iterate over the non-empty blocks as `(row, col, component, transposed)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, usize, bool)> + '_ {
        self.entries.iter().enumerate().filter_map(|(index, entry)| {
            entry.map(|(component, transposed)| {
                (
                    index / self.nblocks,
                    index % self.nblocks,
                    component,
                    transposed,
                )
            })
        })
    }
}

/// A boundary integral operator of some PDE.
///
/// The engine only talks to the problem through this trait: it asks for the
/// kernel at pairs of interpolation points in the far field and for Galerkin
/// entries of element pairs in the near field.
pub trait PdeProblem: Sync {
    /// Scalar type of the matrix entries
    type T: RlstScalar<Real = f64>;

    /// Symmetry of each matrix component. Its length is the number of components.
    fn symmetry(&self) -> &[Symmetry];

    /// Number of components
    fn component_count(&self) -> usize {
        self.symmetry().len()
    }

    /// Factor by which the interpolation rank is multiplied.
    fn rank_multiplicity(&self) -> usize {
        1
    }

    /// Arrangement of the components into the operator
    fn block_layout(&self) -> BlockLayout {
        BlockLayout::single()
    }

    /// Functions tested against the Lagrange polynomials in the `s` and `t`
    /// direction for a moment matrix.
    fn moment_kind(
        &self,
        _component: usize,
        _side: MomentSide,
        _multiplicity: usize,
    ) -> [MomentKind; 2] {
        [MomentKind::Value, MomentKind::Value]
    }

    /// Kernel times surface measures at the parameter points `s` on `test_patch`
    /// and `t` on `trial_patch`.
    ///
    /// `values` has length `component_count * m * m` with `m` the rank
    /// multiplicity; the value for component `c` and multiplicity indices
    /// `(i, j)` is stored at `c * m * m + i * m + j`.
    fn interpolate_kernel<P: Patch>(
        &self,
        test_patch: &P,
        s: [f64; 2],
        trial_patch: &P,
        t: [f64; 2],
        values: &mut [Self::T],
    );

    /// Galerkin entries of a pair of elements.
    ///
    /// `output` has length `component_count * a_bs * a_bs`; the entry of
    /// component `c` for test function `i` and trial function `j` is stored at
    /// `c * a_bs * a_bs + i * a_bs + j`.
    fn integrate_element_pair<P: Patch>(
        &self,
        pair: &ElementPair<'_, P>,
        output: &mut [Self::T],
    ) -> Result<()>;
}
