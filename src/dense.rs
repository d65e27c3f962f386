//! Dense assembly
//!
//! Every element pair is integrated with the near field routine of the
//! problem. The cost is quadratic in the number of elements, so this is only
//! meant for small meshes and as a reference for the H2 matrix.
use crate::discretization::Discretization;
use crate::near_field::ElementPair;
use crate::traits::{Patch, PdeProblem};
use crate::types::{Error, Result};
use rayon::prelude::*;
use rlst::{rlst_dynamic_array2, DynamicArray, RawAccess, RawAccessMut, RlstScalar};

/// Entries of all components, one vector per test element.
///
/// For test element `e` the entry of component `c`, test function `i`,
/// trial element `f` and trial function `j` is at
/// `c·a_bs·n + i·n + f·a_bs + j` with `n` the global size.
fn element_rows<P: Patch, Pde: PdeProblem>(
    disc: &Discretization<'_, P>,
    pde: &Pde,
) -> Result<Vec<Vec<Pde::T>>> {
    let nelements = disc.mesh().nelements();
    let a_bs = disc.local_size();
    let n = disc.global_size();
    let ncomponents = pde.component_count();
    let zero = <Pde::T as num::Zero>::zero();

    (0..nelements)
        .into_par_iter()
        .map(|test| {
            let mut row = vec![zero; ncomponents * a_bs * n];
            let mut local = vec![zero; ncomponents * a_bs * a_bs];
            for trial in 0..nelements {
                let pair = ElementPair::new(disc, test, trial)?;
                pde.integrate_element_pair(&pair, &mut local)?;
                for c in 0..ncomponents {
                    for i in 0..a_bs {
                        let start = c * a_bs * n + i * n + trial * a_bs;
                        let source = (c * a_bs + i) * a_bs;
                        row[start..start + a_bs].copy_from_slice(&local[source..source + a_bs]);
                    }
                }
            }
            Ok(row)
        })
        .collect()
}

/// Matrix of component `component` from the element rows.
fn component_matrix<T: RlstScalar>(
    rows: &[Vec<T>],
    component: usize,
    a_bs: usize,
    n: usize,
) -> DynamicArray<T, 2> {
    let mut matrix = rlst_dynamic_array2!(T, [n, n]);
    let data = matrix.data_mut();
    for (e, row) in rows.iter().enumerate() {
        let block = &row[component * a_bs * n..(component + 1) * a_bs * n];
        for (i, values) in block.chunks_exact(n).enumerate() {
            for (col, value) in values.iter().enumerate() {
                data[col * n + e * a_bs + i] = *value;
            }
        }
    }
    matrix
}

/// Dense matrix of a single component.
pub fn assemble_component<P: Patch, Pde: PdeProblem>(
    disc: &Discretization<'_, P>,
    pde: &Pde,
    component: usize,
) -> Result<DynamicArray<Pde::T, 2>> {
    if component >= pde.component_count() {
        return Err(Error::InvalidStructure(format!(
            "component {component} does not exist"
        )));
    }
    let rows = element_rows(disc, pde)?;
    Ok(component_matrix(
        &rows,
        component,
        disc.local_size(),
        disc.global_size(),
    ))
}

/// Dense matrix of the operator with the block layout of the problem.
pub fn assemble<P: Patch, Pde: PdeProblem>(
    disc: &Discretization<'_, P>,
    pde: &Pde,
) -> Result<DynamicArray<Pde::T, 2>> {
    let layout = pde.block_layout();
    let n = disc.global_size();
    let size = layout.nblocks() * n;
    let rows = element_rows(disc, pde)?;
    let components = (0..pde.component_count())
        .map(|c| component_matrix(&rows, c, disc.local_size(), n))
        .collect::<Vec<_>>();
    log::debug!(
        "Dense assembly of {} components, size {}",
        components.len(),
        size
    );

    let mut matrix = rlst_dynamic_array2!(Pde::T, [size, size]);
    let data = matrix.data_mut();
    for (block_row, block_col, component, transposed) in layout.iter() {
        let source = components[component].data();
        for col in 0..n {
            let target = &mut data[(block_col * n + col) * size + block_row * n..][..n];
            if transposed {
                for (row, value) in target.iter_mut().enumerate() {
                    *value = source[row * n + col];
                }
            } else {
                target.copy_from_slice(&source[col * n..(col + 1) * n]);
            }
        }
    }
    Ok(matrix)
}

/// `y = A x` for a column-major dense matrix.
pub fn matvec<T: RlstScalar>(matrix: &DynamicArray<T, 2>, x: &[T]) -> Vec<T> {
    let mut y = vec![T::zero(); x.len()];
    crate::block_tree::multiply_add(matrix, false, x, &mut y);
    y
}
