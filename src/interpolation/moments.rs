//! Moment matrices of the floor clusters.
use crate::discretization::LegendreBasis;
use crate::element_tree::SON_OFFSETS;
use crate::interpolation::chebyshev::LagrangeBasis;
use crate::quadrature::gauss_legendre;
use crate::types::{MomentKind, Result};
use rlst::{
    rlst_array_from_slice1, rlst_array_from_slice_mut1, rlst_dynamic_array2, DynamicArray,
    MultInto, RawAccessMut, RlstScalar, Shape, TransMode,
};

/// Offsets of the elements of a cluster `depth` levels above them, in the
/// order of their numbers.
pub fn cluster_element_offsets(depth: usize) -> Vec<(usize, usize)> {
    let mut offsets = vec![(0, 0)];
    for _ in 0..depth {
        offsets = offsets
            .iter()
            .flat_map(|(s, t)| SON_OFFSETS.iter().map(move |(ds, dt)| (2 * s + ds, 2 * t + dt)))
            .collect();
    }
    offsets
}

/// One dimensional moments of a Lagrange basis against the local basis on
/// the `n` sub-intervals of `[0,1]`.
///
/// Entry `[i][j·a_o + m]` is `∫ L_i(u) ψ_{j,m}(u) du` over sub-interval `j`,
/// where `ψ_{j,m}` is the `m`-th local function, or its derivative, scaled to
/// an element of width `h`.
fn interval_moments(
    lagrange: &LagrangeBasis,
    basis: &LegendreBasis,
    n: usize,
    h: f64,
    kind: MomentKind,
) -> Result<Vec<Vec<f64>>> {
    let np = lagrange.len();
    let a_o = basis.dim();
    let rule = gauss_legendre((np + a_o) / 2 + 1)?;
    let scale = match kind {
        MomentKind::Value => h.sqrt(),
        MomentKind::Derivative => 1.0 / h.sqrt(),
    };

    let mut moments = vec![vec![0.0; n * a_o]; np];
    let mut phi = vec![0.0; a_o];
    for (xi, w) in rule.points.iter().zip(rule.weights.iter()) {
        match kind {
            MomentKind::Value => basis.eval(*xi, &mut phi),
            MomentKind::Derivative => basis.eval_derivative(*xi, &mut phi),
        }
        for (i, row) in moments.iter_mut().enumerate() {
            for j in 0..n {
                let l = scale * w * lagrange.eval(i, (j as f64 + xi) / n as f64);
                for (m, value) in phi.iter().enumerate() {
                    row[j * a_o + m] += l * value;
                }
            }
        }
    }
    Ok(moments)
}

/// Map from the coefficients of the elements of a floor cluster to its
/// interpolation coefficients.
///
/// The matrix has `rank` rows, ordered `f·np² + i·np + j` for multiplicity `f`
/// and Chebyshev point `(x_i, x_j)`, and one column per degree of freedom of
/// the cluster.
pub struct MomentMatrix<T: RlstScalar<Real = f64>> {
    matrix: DynamicArray<T, 2>,
}

impl<T: RlstScalar<Real = f64>> MomentMatrix<T> {
    /// Moments for clusters `depth` levels above the elements of a mesh of
    /// refinement level `level`. `kinds[f]` gives the functions used in the
    /// `s` and `t` direction for multiplicity `f`.
    pub fn new(
        lagrange: &LagrangeBasis,
        basis: &LegendreBasis,
        kinds: &[[MomentKind; 2]],
        level: usize,
        depth: usize,
    ) -> Result<Self> {
        let np = lagrange.len();
        let np2 = np * np;
        let a_o = basis.dim();
        let a_bs = a_o * a_o;
        let n = 1 << depth;
        let h = 1.0 / (1usize << level) as f64;
        let offsets = cluster_element_offsets(depth);

        let values = interval_moments(lagrange, basis, n, h, MomentKind::Value)?;
        let derivatives = if kinds.iter().flatten().any(|k| *k == MomentKind::Derivative) {
            interval_moments(lagrange, basis, n, h, MomentKind::Derivative)?
        } else {
            Vec::new()
        };
        let select = |kind: MomentKind| match kind {
            MomentKind::Value => &values,
            MomentKind::Derivative => &derivatives,
        };

        let rank = kinds.len() * np2;
        let ncols = offsets.len() * a_bs;
        let mut matrix = rlst_dynamic_array2!(T, [rank, ncols]);
        let data = matrix.data_mut();
        for (f, [kind_s, kind_t]) in kinds.iter().enumerate() {
            let (ts, tt) = (select(*kind_s), select(*kind_t));
            for (k, (s_k, t_k)) in offsets.iter().enumerate() {
                for m1 in 0..a_o {
                    for m2 in 0..a_o {
                        let column = a_bs * k + m1 * a_o + m2;
                        let column = &mut data[column * rank..(column + 1) * rank];
                        for i in 0..np {
                            for j in 0..np {
                                column[f * np2 + i * np + j] = T::from_real(
                                    ts[i][s_k * a_o + m2] * tt[j][t_k * a_o + m1],
                                );
                            }
                        }
                    }
                }
            }
        }
        Ok(Self { matrix })
    }

    /// Number of rows
    pub fn rank(&self) -> usize {
        self.matrix.shape()[0]
    }

    /// Number of degrees of freedom of a floor cluster
    pub fn cluster_size(&self) -> usize {
        self.matrix.shape()[1]
    }

    /// The matrix
    pub fn matrix(&self) -> &DynamicArray<T, 2> {
        &self.matrix
    }

    /// `coefficients = M · x`
    pub fn project(&self, x: &[T], coefficients: &mut [T]) {
        let [rank, size] = self.matrix.shape();
        rlst_array_from_slice_mut1!(coefficients, [rank]).mult_into(
            TransMode::NoTrans,
            TransMode::NoTrans,
            T::one(),
            self.matrix.view(),
            rlst_array_from_slice1!(x, [size]),
            T::zero(),
        );
    }

    /// `y += Mᵀ · coefficients`
    pub fn expand(&self, coefficients: &[T], y: &mut [T]) {
        let [rank, size] = self.matrix.shape();
        rlst_array_from_slice_mut1!(y, [size]).mult_into(
            TransMode::Trans,
            TransMode::NoTrans,
            T::one(),
            self.matrix.view(),
            rlst_array_from_slice1!(coefficients, [rank]),
            T::one(),
        );
    }
}
