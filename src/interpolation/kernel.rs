//! Interpolated kernel matrices of admissible blocks.
use crate::element_tree::ElementNode;
use crate::traits::{Patch, PdeProblem};
use rlst::{rlst_dynamic_array2, DynamicArray, RawAccessMut};

/// Kernel matrices of the block with row cluster `row` and column cluster
/// `col`, one per component.
///
/// Entry `(f1·np² + a, f2·np² + b)` holds the kernel between Chebyshev point
/// `a` of the row cluster and point `b` of the column cluster for the
/// multiplicity indices `(f1, f2)`.
pub(crate) fn kernel_matrices<P: Patch, Pde: PdeProblem>(
    pde: &Pde,
    patches: &[P],
    nodes: &[f64],
    row: &ElementNode,
    col: &ElementNode,
) -> Vec<DynamicArray<Pde::T, 2>> {
    let np = nodes.len();
    let np2 = np * np;
    let m = pde.rank_multiplicity();
    let rank = m * np2;
    let ncomponents = pde.component_count();

    let points = |node: &ElementNode| -> Vec<[f64; 2]> {
        let [s0, t0] = node.corner();
        let h = node.width();
        (0..np2)
            .map(|a| [s0 + h * nodes[a / np], t0 + h * nodes[a % np]])
            .collect()
    };
    let row_points = points(row);
    let col_points = points(col);
    let (row_patch, col_patch) = (&patches[row.patch()], &patches[col.patch()]);

    let mut matrices = (0..ncomponents)
        .map(|_| rlst_dynamic_array2!(Pde::T, [rank, rank]))
        .collect::<Vec<_>>();
    let mut values = vec![<Pde::T as num::Zero>::zero(); ncomponents * m * m];

    for (b, t) in col_points.iter().enumerate() {
        for (a, s) in row_points.iter().enumerate() {
            pde.interpolate_kernel(row_patch, *s, col_patch, *t, &mut values);
            for (matrix, block) in matrices.iter_mut().zip(values.chunks_exact(m * m)) {
                let data = matrix.data_mut();
                for f1 in 0..m {
                    for f2 in 0..m {
                        data[(f2 * np2 + b) * rank + f1 * np2 + a] = block[f1 * m + f2];
                    }
                }
            }
        }
    }
    matrices
}
