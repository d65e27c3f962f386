//! Transfer matrices between the interpolation bases of a cluster and its sons.
use crate::element_tree::SON_OFFSETS;
use crate::interpolation::chebyshev::LagrangeBasis;
use rlst::{
    rlst_array_from_slice2, rlst_array_from_slice_mut2, rlst_dynamic_array2, DynamicArray,
    MultInto, RawAccessMut, RlstScalar, TransMode,
};

/// The four matrices mapping the coefficients of a son to those of its father.
///
/// Entry `(r, c)` of the matrix of son `k` is the father's tensor Lagrange
/// polynomial `r` evaluated at the son's interpolation point `c`. The same four
/// matrices serve every level.
pub struct TransferMatrices<T: RlstScalar<Real = f64>> {
    np: usize,
    matrices: [DynamicArray<T, 2>; 4],
}

impl<T: RlstScalar<Real = f64>> TransferMatrices<T> {
    /// Compute the transfer matrices of a Lagrange basis.
    pub fn new(lagrange: &LagrangeBasis) -> Self {
        let np = lagrange.len();
        let np2 = np * np;

        // half[k][i][j]: polynomial j at node i of the half interval k
        let half = [0.0, 0.5].map(|shift| {
            lagrange
                .nodes()
                .iter()
                .map(|x| {
                    (0..np)
                        .map(|j| lagrange.eval(j, 0.5 * x + shift))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>()
        });

        let matrices = SON_OFFSETS.map(|(ds, dt)| {
            let mut matrix = rlst_dynamic_array2!(T, [np2, np2]);
            let data = matrix.data_mut();
            for i in 0..np {
                for ii in 0..np {
                    // column-major: column i·np + ii holds the son point
                    let column = &mut data[(i * np + ii) * np2..(i * np + ii + 1) * np2];
                    for j in 0..np {
                        for jj in 0..np {
                            column[j * np + jj] =
                                T::from_real(half[ds][i][j] * half[dt][ii][jj]);
                        }
                    }
                }
            }
            matrix
        });

        Self { np, matrices }
    }

    /// Number of interpolation points per axis
    pub fn np(&self) -> usize {
        self.np
    }

    /// Matrix of son `son`
    pub fn matrix(&self, son: usize) -> &DynamicArray<T, 2> {
        &self.matrices[son]
    }

    /// `father += T_son · son_coefficients` for every multiplicity block.
    pub fn aggregate(&self, son: usize, coefficients: &[T], father: &mut [T]) {
        let np2 = self.np * self.np;
        let multiplicity = coefficients.len() / np2;
        rlst_array_from_slice_mut2!(father, [np2, multiplicity]).mult_into(
            TransMode::NoTrans,
            TransMode::NoTrans,
            T::one(),
            self.matrices[son].view(),
            rlst_array_from_slice2!(coefficients, [np2, multiplicity]),
            T::one(),
        );
    }

    /// `son_coefficients += T_sonᵀ · father` for every multiplicity block.
    pub fn distribute(&self, son: usize, father: &[T], coefficients: &mut [T]) {
        let np2 = self.np * self.np;
        let multiplicity = father.len() / np2;
        rlst_array_from_slice_mut2!(coefficients, [np2, multiplicity]).mult_into(
            TransMode::Trans,
            TransMode::NoTrans,
            T::one(),
            self.matrices[son].view(),
            rlst_array_from_slice2!(father, [np2, multiplicity]),
            T::one(),
        );
    }
}
