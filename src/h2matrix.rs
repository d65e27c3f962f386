//! H2 matrix of a boundary integral operator
use crate::block_tree::{
    multiply_add, BlockClusterTree, BlockNode, BlockStatistics, ComponentBlock, NodeKind,
};
use crate::discretization::Discretization;
use crate::interpolation::Interpolation;
use crate::settings::HMatrixSettings;
use crate::traits::{BlockLayout, Patch, PdeProblem};
use crate::transforms::{backward_transform, forward_transform, H2Tree, PatchCoefficients};
use crate::types::{Error, MomentSide, Result, Symmetry, TraversalMode};
use rayon::prelude::*;
use rlst::{rlst_dynamic_array2, DynamicArray, RawAccess, RawAccessMut, RlstScalar, Shape};

/// Which triangle of a stored block is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    /// `A[rows, cols]`
    Lower,
    /// `A[cols, rows]`
    Upper,
}

/// Vectors of a single product restricted to one patch row.
struct RowBuffers<'b, T> {
    /// First degree of freedom of the patch
    offset: usize,
    x: &'b [T],
    x_tree: &'b H2Tree<T>,
    y: &'b mut [T],
    y_tree: &'b mut PatchCoefficients<T>,
}

/// An H2 matrix.
///
/// The matrix borrows the discretization it was built for. Coefficient
/// vectors are laid out element by element, see [`Discretization`]; for
/// operators with several block rows the vectors of the block rows are
/// concatenated.
pub struct H2Matrix<'a, P: Patch, T: RlstScalar<Real = f64>> {
    disc: &'a Discretization<'a, P>,
    settings: HMatrixSettings,
    symmetry: Vec<Symmetry>,
    layout: BlockLayout,
    interpolation: Interpolation<T>,
    tree: BlockClusterTree<T>,
}

impl<'a, P: Patch, T: RlstScalar<Real = f64>> H2Matrix<'a, P, T> {
    /// Assemble the H2 matrix of `pde` on `disc`.
    pub fn new<Pde: PdeProblem<T = T>>(
        disc: &'a Discretization<'a, P>,
        pde: &Pde,
        settings: HMatrixSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let symmetry = pde.symmetry().to_vec();
        if symmetry.is_empty() {
            return Err(Error::InvalidStructure(
                "the problem has no components".to_string(),
            ));
        }
        let layout = pde.block_layout();
        if let Some((_, _, component, _)) = layout.iter().find(|e| e.2 >= symmetry.len()) {
            return Err(Error::InvalidStructure(format!(
                "block layout refers to component {component} of {}",
                symmetry.len()
            )));
        }
        let level = disc.mesh().level();
        if settings.floor_level(level) == 0 {
            log::warn!(
                "Refinement level {} does not exceed min_bsize {}, no block is subdivided",
                level,
                settings.min_bsize()
            );
        }

        let interpolation = Interpolation::new(disc, pde, &settings)?;
        let tree = BlockClusterTree::new(disc, pde, interpolation.nodes(), &settings)?;
        let matrix = Self {
            disc,
            settings,
            symmetry,
            layout,
            interpolation,
            tree,
        };
        log::info!(
            "H2 matrix of size {}: {} stored entries, compression {:.3}",
            matrix.shape()[0],
            matrix.storage_size(),
            matrix.storage_size() as f64
                / (disc.global_size() * disc.global_size() * matrix.symmetry.len()) as f64
        );
        Ok(matrix)
    }

    /// Number of rows and columns
    pub fn shape(&self) -> [usize; 2] {
        let n = self.layout.nblocks() * self.disc.global_size();
        [n, n]
    }

    /// The discretization
    pub fn discretization(&self) -> &'a Discretization<'a, P> {
        self.disc
    }

    /// Settings used for the construction
    pub fn settings(&self) -> &HMatrixSettings {
        &self.settings
    }

    /// Symmetry of the components
    pub fn symmetry(&self) -> &[Symmetry] {
        &self.symmetry
    }

    /// Arrangement of the components
    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    /// The shared interpolation data
    pub fn interpolation(&self) -> &Interpolation<T> {
        &self.interpolation
    }

    /// The block cluster tree
    pub fn tree(&self) -> &BlockClusterTree<T> {
        &self.tree
    }

    /// Leaf counts
    pub fn statistics(&self) -> &BlockStatistics {
        self.tree.statistics()
    }

    /// Number of scalars stored in the blocks, the moment and the transfer matrices
    pub fn storage_size(&self) -> usize {
        let rank = self.interpolation.rank();
        let np2 = self.interpolation.np() * self.interpolation.np();
        let cluster_size = self
            .interpolation
            .moments(0, MomentSide::Left)
            .cluster_size();
        let moments = self.symmetry.len() * 2 * rank * cluster_size;
        self.tree.storage_size() + moments + 4 * np2 * np2
    }

    /// `A x`, `Aᵀ x` or, for symmetric operators, `A x` using the stored lower triangle.
    pub fn matvec(&self, mode: TraversalMode, x: &[T]) -> Result<Vec<T>> {
        let mut y = vec![T::zero(); self.shape()[0]];
        self.matvec_into(mode, x, &mut y)?;
        Ok(y)
    }

    /// `y += A x`, `y += Aᵀ x` or, for symmetric operators, `y += A x`.
    pub fn matvec_into(&self, mode: TraversalMode, x: &[T], y: &mut [T]) -> Result<()> {
        let n = self.shape()[0];
        for len in [x.len(), y.len()] {
            if len != n {
                return Err(Error::DimensionMismatch {
                    expected: n,
                    actual: len,
                });
            }
        }
        if mode == TraversalMode::Symmetric {
            if let Some(component) = self.symmetry.iter().position(|s| !s.is_symmetric()) {
                return Err(Error::UnsupportedMode { mode, component });
            }
        }
        let size = self.disc.global_size();
        for (row, col, component, transposed) in self.layout.iter() {
            let (row, col, transposed) = match mode {
                TraversalMode::Transpose => (col, row, !transposed),
                _ => (row, col, transposed),
            };
            self.apply_component(
                component,
                transposed,
                &x[col * size..(col + 1) * size],
                &mut y[row * size..(row + 1) * size],
            )?;
        }
        Ok(())
    }

    /// `y += A_c x` or `y += A_cᵀ x` for a single component `c`.
    pub fn apply_component(
        &self,
        component: usize,
        transpose: bool,
        x: &[T],
        y: &mut [T],
    ) -> Result<()> {
        let n = self.disc.global_size();
        if component >= self.symmetry.len() {
            return Err(Error::InvalidStructure(format!(
                "component {component} does not exist"
            )));
        }
        for len in [x.len(), y.len()] {
            if len != n {
                return Err(Error::DimensionMismatch {
                    expected: n,
                    actual: len,
                });
            }
        }
        let transpose = transpose && !self.symmetry[component].is_symmetric();
        let (forward_side, backward_side) = if transpose {
            (MomentSide::Left, MomentSide::Right)
        } else {
            (MomentSide::Right, MomentSide::Left)
        };

        let npatches = self.tree.npatches();
        let floor = self.interpolation.floor_level();
        let rank = self.interpolation.rank();
        let transfer = self.interpolation.transfer();

        let mut x_tree = H2Tree::new(npatches, floor, rank);
        forward_transform(
            self.interpolation.moments(component, forward_side),
            transfer,
            x,
            &mut x_tree,
        );
        let mut y_tree = H2Tree::new(npatches, floor, rank);

        let patch_size = self.disc.patch_size();
        y.par_chunks_mut(patch_size)
            .zip(y_tree.patches_mut().par_iter_mut())
            .enumerate()
            .for_each(|(i, (y, y_tree))| {
                let mut buffers = RowBuffers {
                    offset: i * patch_size,
                    x,
                    x_tree: &x_tree,
                    y,
                    y_tree,
                };
                self.apply_patch_row(i, component, transpose, &mut buffers);
            });

        backward_transform(
            self.interpolation.moments(component, backward_side),
            transfer,
            &mut y_tree,
            y,
        );
        Ok(())
    }

    /// Contributions of all blocks to the rows of patch `i`.
    fn apply_patch_row(
        &self,
        i: usize,
        component: usize,
        transpose: bool,
        buffers: &mut RowBuffers<'_, T>,
    ) {
        for j in 0..self.tree.npatches() {
            if j < i {
                if let Some(node) = self.tree.top(i, j) {
                    self.apply_node(node, Side::Lower, component, transpose, buffers);
                }
            } else if j > i {
                if let Some(node) = self.tree.top(j, i) {
                    self.apply_node(node, Side::Upper, component, transpose, buffers);
                }
            } else if let Some(node) = self.tree.top(i, i) {
                self.apply_diagonal(node, component, transpose, buffers);
            }
        }
    }

    /// A block on the diagonal: its lower sons act on both triangles.
    fn apply_diagonal(
        &self,
        index: usize,
        component: usize,
        transpose: bool,
        buffers: &mut RowBuffers<'_, T>,
    ) {
        let node = self.tree.node(index);
        match node.kind() {
            NodeKind::Internal(sons) => {
                for (k, son) in sons.iter().enumerate() {
                    if let Some(son) = son {
                        let (a, b) = (k / 4, k % 4);
                        if a == b {
                            self.apply_diagonal(*son, component, transpose, buffers);
                        } else {
                            self.apply_node(*son, Side::Lower, component, transpose, buffers);
                            self.apply_node(*son, Side::Upper, component, transpose, buffers);
                        }
                    }
                }
            }
            NodeKind::Dense(block) => {
                let dofs = self.local_dofs(node.row(), buffers.offset);
                let x = &buffers.x[buffers.offset + dofs.start..buffers.offset + dofs.end];
                let matrix = block.component(component).matrix();
                multiply_add(matrix, transpose, x, &mut buffers.y[dofs]);
            }
            NodeKind::LowRank(_) => {
                panic!("low rank block on the diagonal at level {}", node.level())
            }
        }
    }

    /// Apply one triangle of a block. `Lower` writes to the row cluster of the
    /// node, `Upper` to its column cluster; both belong to the current patch row.
    fn apply_node(
        &self,
        index: usize,
        side: Side,
        component: usize,
        transpose: bool,
        buffers: &mut RowBuffers<'_, T>,
    ) {
        let node = self.tree.node(index);
        match node.kind() {
            NodeKind::Internal(sons) => {
                for son in sons.iter().flatten() {
                    self.apply_node(*son, side, component, transpose, buffers);
                }
            }
            NodeKind::Dense(block) => {
                let (target, source) = targets(node, side);
                let dofs = self.local_dofs(target, buffers.offset);
                let source = self.disc.node_dofs(source);
                let (matrix, transposed) = select(block.component(component), side, transpose);
                multiply_add(matrix, transposed, &buffers.x[source], &mut buffers.y[dofs]);
            }
            NodeKind::LowRank(block) => {
                let tree = self.disc.element_tree();
                let (target, source) = targets(node, side);
                let (target, source) = (tree.node(target), tree.node(source));
                let x = buffers.x_tree.cluster(source.level(), source.number());
                let y = buffers.y_tree.cluster_mut(target.level(), target.local_number());
                let (matrix, transposed) = select(block.component(component), side, transpose);
                multiply_add(matrix, transposed, x, y);
            }
        }
    }

    /// Degrees of freedom of an element tree node relative to the patch offset.
    fn local_dofs(&self, node: usize, offset: usize) -> std::ops::Range<usize> {
        let dofs = self.disc.node_dofs(node);
        dofs.start - offset..dofs.end - offset
    }

    /// Diagonal of the operator.
    ///
    /// Block rows without a component on the diagonal of the layout are zero.
    pub fn diagonal(&self) -> Result<Vec<T>> {
        let size = self.disc.global_size();
        let mut diagonal = vec![T::zero(); self.shape()[0]];
        for (row, col, component, _) in self.layout.iter() {
            if row != col {
                continue;
            }
            let blocks = self.element_diagonal(component)?;
            let a_bs = self.disc.local_size();
            for (element, block) in blocks.iter().enumerate() {
                let data = block.data();
                for i in 0..a_bs {
                    diagonal[row * size + element * a_bs + i] = data[i * a_bs + i];
                }
            }
        }
        Ok(diagonal)
    }

    /// The `a_bs × a_bs` interaction of every element with itself for one component.
    pub fn element_diagonal(&self, component: usize) -> Result<Vec<DynamicArray<T, 2>>> {
        if component >= self.symmetry.len() {
            return Err(Error::InvalidStructure(format!(
                "component {component} does not exist"
            )));
        }
        let a_bs = self.disc.local_size();
        let mut blocks = (0..self.disc.mesh().nelements())
            .map(|_| rlst_dynamic_array2!(T, [a_bs, a_bs]))
            .collect::<Vec<_>>();
        for patch in 0..self.tree.npatches() {
            if let Some(node) = self.tree.top(patch, patch) {
                self.collect_diagonal(node, component, &mut blocks)?;
            }
        }
        Ok(blocks)
    }

    fn collect_diagonal(
        &self,
        index: usize,
        component: usize,
        blocks: &mut [DynamicArray<T, 2>],
    ) -> Result<()> {
        let node = self.tree.node(index);
        match node.kind() {
            NodeKind::Internal(sons) => {
                for k in [0, 5, 10, 15] {
                    if let Some(son) = sons[k] {
                        self.collect_diagonal(son, component, blocks)?;
                    }
                }
                Ok(())
            }
            NodeKind::Dense(block) => {
                let a_bs = self.disc.local_size();
                let matrix = block.component(component).matrix();
                let nrows = matrix.shape()[0];
                let data = matrix.data();
                let elements = self.disc.element_tree().element_range(node.row());
                for (e, element) in elements.enumerate() {
                    let local = blocks[element].data_mut();
                    for c in 0..a_bs {
                        for r in 0..a_bs {
                            local[c * a_bs + r] = data[(e * a_bs + c) * nrows + e * a_bs + r];
                        }
                    }
                }
                Ok(())
            }
            NodeKind::LowRank(_) => Err(Error::InvalidStructure(format!(
                "low rank block on the diagonal at level {}",
                node.level()
            ))),
        }
    }
}

/// Target and source cluster of a triangle of a block.
fn targets<T: RlstScalar>(node: &BlockNode<T>, side: Side) -> (usize, usize) {
    match side {
        Side::Lower => (node.row(), node.col()),
        Side::Upper => (node.col(), node.row()),
    }
}

/// Matrix applied for a triangle of a block and whether it is used transposed.
///
/// In transpose mode the lower triangle needs `A[cols, rows]ᵀ` and the upper
/// triangle `A[rows, cols]ᵀ`. Without a mirror `A[cols, rows]` is `A[rows, cols]ᵀ`.
fn select<T: RlstScalar>(
    block: &ComponentBlock<T>,
    side: Side,
    transpose: bool,
) -> (&DynamicArray<T, 2>, bool) {
    match (side, transpose, block.mirror()) {
        (Side::Lower, false, _) => (block.matrix(), false),
        (Side::Lower, true, Some(mirror)) => (mirror, true),
        (Side::Lower, true, None) => (block.matrix(), false),
        (Side::Upper, false, Some(mirror)) => (mirror, false),
        (Side::Upper, false, None) => (block.matrix(), true),
        (Side::Upper, true, _) => (block.matrix(), true),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::discretization::Mesh;
    use crate::laplace::{LaplaceDoubleLayer, LaplaceSingleLayer};
    use crate::near_field::NearFieldOptions;
    use crate::shapes::{screen, square_tube};
    use rlst::RandomAccessByRef;

    #[test]
    fn test_dimension_checks() {
        let mesh = Mesh::new(screen(1), 2).unwrap();
        let disc = Discretization::new(&mesh, 0);
        let matrix = H2Matrix::new(&disc, &LaplaceSingleLayer::new(), HMatrixSettings::default())
            .unwrap();
        assert_eq!(matrix.shape(), [16, 16]);
        assert!(matrix.matvec(TraversalMode::Normal, &[0.0; 15]).is_err());
        let mut y = vec![0.0; 17];
        assert!(matrix.matvec_into(TraversalMode::Normal, &[0.0; 16], &mut y).is_err());
    }

    #[test]
    fn test_symmetric_mode_needs_symmetric_components() {
        let mesh = Mesh::new(square_tube(), 2).unwrap();
        let disc = Discretization::new(&mesh, 0);
        let matrix = H2Matrix::new(&disc, &LaplaceDoubleLayer::new(), HMatrixSettings::default())
            .unwrap();
        let x = vec![1.0; matrix.shape()[1]];
        assert!(matches!(
            matrix.matvec(TraversalMode::Symmetric, &x),
            Err(Error::UnsupportedMode { component: 0, .. })
        ));
        assert!(matrix.matvec(TraversalMode::Transpose, &x).is_ok());
    }

    #[test]
    fn test_symmetric_mode_mirrors_lower_triangle() {
        // Only the lower triangle is stored, so the reference is the dense
        // matrix with its upper element blocks replaced by the transposed lower ones.
        let mesh = Mesh::new(square_tube(), 2).unwrap();
        let disc = Discretization::new(&mesh, 1);
        let mut options = NearFieldOptions::default();
        options.set_far_field_points(12);
        let pde = LaplaceSingleLayer::with_options(options);
        let settings = HMatrixSettings::new(1.6, 8, 1).unwrap();
        let matrix = H2Matrix::new(&disc, &pde, settings).unwrap();
        let reference = crate::dense::assemble_component(&disc, &pde, 0).unwrap();
        let n = disc.global_size();
        let a_bs = disc.local_size();

        let x = (0..n).map(|i| (i as f64).sin()).collect::<Vec<_>>();
        let mut mirrored = vec![0.0; n];
        for (i, value) in mirrored.iter_mut().enumerate() {
            for (j, xj) in x.iter().enumerate() {
                let index = if i / a_bs >= j / a_bs { [i, j] } else { [j, i] };
                *value += *reference.get(index).unwrap() * xj;
            }
        }
        let y = matrix.matvec(TraversalMode::Symmetric, &x).unwrap();
        let diff: f64 = y.iter().zip(&mirrored).map(|(a, b)| (a - b).powi(2)).sum();
        let norm: f64 = mirrored.iter().map(|b| b * b).sum();
        assert!((diff / norm).sqrt() < 1e-5);
    }

    #[test]
    fn test_element_diagonal() {
        let mesh = Mesh::new(screen(1), 2).unwrap();
        let disc = Discretization::new(&mesh, 1);
        let matrix = H2Matrix::new(&disc, &LaplaceSingleLayer::new(), HMatrixSettings::default())
            .unwrap();
        let blocks = matrix.element_diagonal(0).unwrap();
        assert_eq!(blocks.len(), 16);
        let diagonal = matrix.diagonal().unwrap();
        for (element, block) in blocks.iter().enumerate() {
            assert_eq!(block.shape(), [4, 4]);
            for i in 0..4 {
                let value = block.data()[i * 4 + i];
                assert!(value > 0.0);
                assert_eq!(diagonal[element * 4 + i], value);
            }
        }
        assert!(matrix.element_diagonal(1).is_err());
    }

    #[test]
    fn test_storage() {
        let mesh = Mesh::new(square_tube(), 3).unwrap();
        let disc = Discretization::new(&mesh, 0);
        let matrix = H2Matrix::new(&disc, &LaplaceSingleLayer::new(), HMatrixSettings::default())
            .unwrap();
        let statistics = matrix.statistics();
        assert!(statistics.low_rank > 0);
        assert!(statistics.dense_diagonal > 0);
        assert!(matrix.storage_size() > matrix.tree().storage_size());
    }
}
