//! Block cluster tree
//!
//! The tree is built over pairs of element tree nodes. Only the lower
//! triangle is stored: on the patch grid the pairs `(i, j)` with `j ≤ i`, and
//! below a diagonal block the sons `(a, b)` with `b ≤ a`. The upper triangle
//! is served by the mirror blocks of non-symmetric components and by
//! transposition for symmetric ones.
use crate::admissibility::{classify, Admissibility};
use crate::discretization::Discretization;
use crate::interpolation::kernel_matrices;
use crate::near_field::ElementPair;
use crate::settings::HMatrixSettings;
use crate::traits::{Patch, PdeProblem};
use crate::types::{Error, Result, Symmetry};
use rayon::prelude::*;
use rlst::{
    rlst_array_from_slice1, rlst_array_from_slice_mut1, rlst_dynamic_array2, DynamicArray,
    MultInto, RawAccessMut, RlstScalar, Shape, TransMode,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Matrix of one component on a block and, for non-symmetric components
/// off the diagonal, the matrix of the mirrored block.
pub struct ComponentBlock<T: RlstScalar> {
    matrix: DynamicArray<T, 2>,
    mirror: Option<DynamicArray<T, 2>>,
}

impl<T: RlstScalar> ComponentBlock<T> {
    /// The block `A[rows, cols]`
    pub fn matrix(&self) -> &DynamicArray<T, 2> {
        &self.matrix
    }

    /// The mirrored block `A[cols, rows]`, `None` if it is the transpose of the block
    pub fn mirror(&self) -> Option<&DynamicArray<T, 2>> {
        self.mirror.as_ref()
    }

    /// Number of stored scalars
    pub fn storage_size(&self) -> usize {
        let size = |m: &DynamicArray<T, 2>| m.shape()[0] * m.shape()[1];
        size(&self.matrix) + self.mirror.as_ref().map_or(0, size)
    }
}

/// Near field entries of a block, one matrix per component.
///
/// Rows are the degrees of freedom of the row cluster, columns those of the
/// column cluster. Blocks on the diagonal store the full square.
pub struct DenseBlock<T: RlstScalar> {
    components: Vec<ComponentBlock<T>>,
}

impl<T: RlstScalar> DenseBlock<T> {
    /// Component block
    pub fn component(&self, index: usize) -> &ComponentBlock<T> {
        &self.components[index]
    }
}

/// Interpolated kernel matrices of an admissible block, one per component.
pub struct LowRankBlock<T: RlstScalar> {
    components: Vec<ComponentBlock<T>>,
}

impl<T: RlstScalar> LowRankBlock<T> {
    /// Component block
    pub fn component(&self, index: usize) -> &ComponentBlock<T> {
        &self.components[index]
    }
}

/// Content of a block tree node.
pub enum NodeKind<T: RlstScalar> {
    /// Sons `(i, j)` at index `4i + j`, `None` above the diagonal of a diagonal block
    Internal([Option<usize>; 16]),
    /// Admissible leaf
    LowRank(LowRankBlock<T>),
    /// Inadmissible leaf
    Dense(DenseBlock<T>),
}

/// A node of the block cluster tree.
pub struct BlockNode<T: RlstScalar> {
    position: (usize, usize),
    level: usize,
    row: usize,
    col: usize,
    father: Option<usize>,
    kind: NodeKind<T>,
}

impl<T: RlstScalar> BlockNode<T> {
    /// Position `(i, j)` in the son grid of the father, or in the patch grid
    pub fn position(&self) -> (usize, usize) {
        self.position
    }
    /// Level of both clusters
    pub fn level(&self) -> usize {
        self.level
    }
    /// Row cluster (element tree node)
    pub fn row(&self) -> usize {
        self.row
    }
    /// Column cluster (element tree node)
    pub fn col(&self) -> usize {
        self.col
    }
    /// Father
    pub fn father(&self) -> Option<usize> {
        self.father
    }
    /// Content
    pub fn kind(&self) -> &NodeKind<T> {
        &self.kind
    }
    /// Is the node on the diagonal of the matrix?
    pub fn is_diagonal(&self) -> bool {
        self.row == self.col
    }
    /// Is the node a leaf?
    pub fn is_leaf(&self) -> bool {
        !matches!(self.kind, NodeKind::Internal(_))
    }
}

/// Leaf counts of a block cluster tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStatistics {
    /// Dense blocks off the diagonal
    pub dense: usize,
    /// Dense blocks on the diagonal
    pub dense_diagonal: usize,
    /// Low rank blocks
    pub low_rank: usize,
    /// Scalars stored in dense blocks
    pub dense_entries: usize,
    /// Scalars stored in low rank blocks
    pub low_rank_entries: usize,
}

#[derive(Default)]
struct StatisticsCounter {
    dense: AtomicUsize,
    dense_diagonal: AtomicUsize,
    low_rank: AtomicUsize,
    dense_entries: AtomicUsize,
    low_rank_entries: AtomicUsize,
}

impl StatisticsCounter {
    fn finish(self) -> BlockStatistics {
        BlockStatistics {
            dense: self.dense.into_inner(),
            dense_diagonal: self.dense_diagonal.into_inner(),
            low_rank: self.low_rank.into_inner(),
            dense_entries: self.dense_entries.into_inner(),
            low_rank_entries: self.low_rank_entries.into_inner(),
        }
    }
}

/// Write the `a_bs × a_bs` entries of an element pair into `matrix` at
/// block `(a, b)`, or transposed at block `(b, a)`.
fn insert_local<T: RlstScalar>(
    matrix: &mut DynamicArray<T, 2>,
    local: &[T],
    a_bs: usize,
    (a, b): (usize, usize),
    transpose: bool,
) {
    let nrows = matrix.shape()[0];
    let data = matrix.data_mut();
    for i in 0..a_bs {
        for j in 0..a_bs {
            let value = local[i * a_bs + j];
            let (r, c) = if transpose {
                (b * a_bs + j, a * a_bs + i)
            } else {
                (a * a_bs + i, b * a_bs + j)
            };
            data[c * nrows + r] = value;
        }
    }
}

struct Builder<'a, P: Patch, Pde: PdeProblem> {
    disc: &'a Discretization<'a, P>,
    pde: &'a Pde,
    settings: &'a HMatrixSettings,
    nodes: &'a [f64],
    symmetry: Vec<Symmetry>,
    parallel_cutoff: usize,
    counter: StatisticsCounter,
}

impl<'a, P: Patch, Pde: PdeProblem> Builder<'a, P, Pde> {
    fn any_nonsymmetric(&self) -> bool {
        self.symmetry.iter().any(|s| !s.is_symmetric())
    }

    fn integrate(&self, test: usize, trial: usize, output: &mut [Pde::T]) -> Result<()> {
        let pair = ElementPair::new(self.disc, test, trial)?;
        self.pde.integrate_element_pair(&pair, output)
    }

    fn dense_block(&self, row: usize, col: usize) -> Result<DenseBlock<Pde::T>> {
        let tree = self.disc.element_tree();
        let a_bs = self.disc.local_size();
        let local = a_bs * a_bs;
        let (rows, cols) = (tree.element_range(row), tree.element_range(col));
        let (n1, n2) = (rows.len() * a_bs, cols.len() * a_bs);
        let diagonal = row == col;
        let with_mirror = !diagonal && self.any_nonsymmetric();

        let mut matrices = (0..self.symmetry.len())
            .map(|_| rlst_dynamic_array2!(Pde::T, [n1, n2]))
            .collect::<Vec<_>>();
        let mut mirrors = self
            .symmetry
            .iter()
            .map(|s| {
                (with_mirror && !s.is_symmetric())
                    .then(|| rlst_dynamic_array2!(Pde::T, [n2, n1]))
            })
            .collect::<Vec<_>>();

        let zero = <Pde::T as num::Zero>::zero();
        let mut values = vec![zero; self.symmetry.len() * local];
        let mut mirrored = vec![zero; self.symmetry.len() * local];
        for (a, e1) in rows.clone().enumerate() {
            for (b, e2) in cols.clone().enumerate() {
                if diagonal && b > a {
                    continue;
                }
                self.integrate(e1, e2, &mut values)?;
                let upper = diagonal && b < a;
                if with_mirror || (upper && self.any_nonsymmetric()) {
                    self.integrate(e2, e1, &mut mirrored)?;
                }
                for (component, symmetry) in self.symmetry.iter().enumerate() {
                    let block = &values[component * local..(component + 1) * local];
                    let mirror_block = &mirrored[component * local..(component + 1) * local];
                    insert_local(&mut matrices[component], block, a_bs, (a, b), false);
                    if upper {
                        if symmetry.is_symmetric() {
                            insert_local(&mut matrices[component], block, a_bs, (a, b), true);
                        } else {
                            insert_local(
                                &mut matrices[component],
                                mirror_block,
                                a_bs,
                                (b, a),
                                false,
                            );
                        }
                    }
                    if let Some(mirror) = mirrors[component].as_mut() {
                        insert_local(mirror, mirror_block, a_bs, (b, a), false);
                    }
                }
            }
        }

        let components = matrices
            .into_iter()
            .zip(mirrors)
            .map(|(matrix, mirror)| ComponentBlock { matrix, mirror })
            .collect::<Vec<_>>();
        let entries: usize = components.iter().map(|c| c.storage_size()).sum();
        self.counter.dense_entries.fetch_add(entries, Ordering::Relaxed);
        if diagonal {
            self.counter.dense_diagonal.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counter.dense.fetch_add(1, Ordering::Relaxed);
        }
        Ok(DenseBlock { components })
    }

    fn low_rank_block(&self, row: usize, col: usize) -> LowRankBlock<Pde::T> {
        let tree = self.disc.element_tree();
        let patches = self.disc.mesh().patches();
        let (c1, c2) = (tree.node(row), tree.node(col));
        let matrices = kernel_matrices(self.pde, patches, self.nodes, c1, c2);
        let mut mirrors = if self.any_nonsymmetric() {
            kernel_matrices(self.pde, patches, self.nodes, c2, c1)
                .into_iter()
                .map(Some)
                .collect::<Vec<_>>()
        } else {
            (0..matrices.len()).map(|_| None).collect()
        };
        for (mirror, symmetry) in mirrors.iter_mut().zip(&self.symmetry) {
            if symmetry.is_symmetric() {
                *mirror = None;
            }
        }
        let components = matrices
            .into_iter()
            .zip(mirrors)
            .map(|(matrix, mirror)| ComponentBlock { matrix, mirror })
            .collect::<Vec<_>>();
        let entries: usize = components.iter().map(|c| c.storage_size()).sum();
        self.counter.low_rank_entries.fetch_add(entries, Ordering::Relaxed);
        self.counter.low_rank.fetch_add(1, Ordering::Relaxed);
        LowRankBlock { components }
    }

    /// Build the subtree of the pair `(row, col)` and append it to `arena`.
    /// Returns the index of its root.
    fn build(
        &self,
        row: usize,
        col: usize,
        position: (usize, usize),
        father: Option<usize>,
        arena: &mut Vec<BlockNode<Pde::T>>,
    ) -> Result<usize> {
        let tree = self.disc.element_tree();
        let (c1, c2) = (tree.node(row), tree.node(col));
        let level = c1.level();
        let kind = match classify(c1, c2, tree.level(), self.settings) {
            Admissibility::LowRank => NodeKind::LowRank(self.low_rank_block(row, col)),
            Admissibility::Dense => NodeKind::Dense(self.dense_block(row, col)?),
            Admissibility::Recurse => NodeKind::Internal([None; 16]),
        };
        let index = arena.len();
        let recurse = matches!(kind, NodeKind::Internal(_));
        arena.push(BlockNode {
            position,
            level,
            row,
            col,
            father,
            kind,
        });
        if !recurse {
            return Ok(index);
        }

        let missing = || {
            Error::InvalidStructure(format!(
                "block ({row}, {col}) on level {level} must be subdivided but has no sons"
            ))
        };
        let sons1 = *c1.sons().ok_or_else(missing)?;
        let sons2 = *c2.sons().ok_or_else(missing)?;
        let diagonal = row == col;
        let pairs = (0..4)
            .flat_map(|i| (0..4).map(move |j| (i, j)))
            .filter(|(i, j)| !diagonal || j <= i)
            .collect::<Vec<_>>();

        let mut sons = [None; 16];
        if tree.element_range(row).len() > self.parallel_cutoff {
            let segments = pairs
                .par_iter()
                .map(|&(i, j)| {
                    let mut segment = Vec::new();
                    self.build(sons1[i], sons2[j], (i, j), None, &mut segment)?;
                    Ok(segment)
                })
                .collect::<Result<Vec<_>>>()?;
            for ((i, j), segment) in pairs.into_iter().zip(segments) {
                sons[4 * i + j] = Some(append_segment(arena, segment, Some(index)));
            }
        } else {
            for (i, j) in pairs {
                sons[4 * i + j] = Some(self.build(sons1[i], sons2[j], (i, j), Some(index), arena)?);
            }
        }
        arena[index].kind = NodeKind::Internal(sons);
        Ok(index)
    }
}

/// Move a separately built subtree into `arena`, relocating its indices.
/// Returns the new index of the subtree root.
fn append_segment<T: RlstScalar>(
    arena: &mut Vec<BlockNode<T>>,
    segment: Vec<BlockNode<T>>,
    father: Option<usize>,
) -> usize {
    let offset = arena.len();
    for mut node in segment {
        node.father = match node.father {
            Some(f) => Some(f + offset),
            None => father,
        };
        if let NodeKind::Internal(sons) = &mut node.kind {
            for son in sons.iter_mut().flatten() {
                *son += offset;
            }
        }
        arena.push(node);
    }
    offset
}

/// Block cluster tree with its leaf blocks.
pub struct BlockClusterTree<T: RlstScalar> {
    npatches: usize,
    nodes: Vec<BlockNode<T>>,
    top: Vec<Option<usize>>,
    statistics: BlockStatistics,
}

impl<T: RlstScalar<Real = f64>> BlockClusterTree<T> {
    /// Build the tree and compute all leaf blocks.
    ///
    /// `nodes` are the Chebyshev nodes on `[0,1]` used for the low rank blocks.
    pub fn new<P: Patch, Pde: PdeProblem<T = T>>(
        disc: &Discretization<'_, P>,
        pde: &Pde,
        nodes: &[f64],
        settings: &HMatrixSettings,
    ) -> Result<Self> {
        let tree = disc.element_tree();
        let npatches = tree.npatches();
        let builder = Builder {
            disc,
            pde,
            settings,
            nodes,
            symmetry: pde.symmetry().to_vec(),
            parallel_cutoff: 4usize.pow(settings.min_bsize() as u32 + 1),
            counter: StatisticsCounter::default(),
        };

        let pairs = (0..npatches)
            .flat_map(|i| (0..=i).map(move |j| (i, j)))
            .collect::<Vec<_>>();
        let segments = pairs
            .par_iter()
            .map(|&(i, j)| {
                let mut segment = Vec::new();
                builder.build(tree.root(i), tree.root(j), (i, j), None, &mut segment)?;
                Ok(segment)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut nodes = Vec::with_capacity(segments.iter().map(|s| s.len()).sum());
        let mut top = vec![None; npatches * npatches];
        for ((i, j), segment) in pairs.into_iter().zip(segments) {
            top[i * npatches + j] = Some(append_segment(&mut nodes, segment, None));
        }
        let statistics = builder.counter.finish();

        log::info!(
            "Block cluster tree: {} nodes, {} dense, {} dense diagonal, {} low rank blocks",
            nodes.len(),
            statistics.dense,
            statistics.dense_diagonal,
            statistics.low_rank
        );
        log::info!(
            "Stored entries: {} dense, {} low rank",
            statistics.dense_entries,
            statistics.low_rank_entries
        );

        Ok(Self {
            npatches,
            nodes,
            top,
            statistics,
        })
    }
}

impl<T: RlstScalar> BlockClusterTree<T> {
    /// Number of patches
    pub fn npatches(&self) -> usize {
        self.npatches
    }

    /// All nodes
    pub fn nodes(&self) -> &[BlockNode<T>] {
        &self.nodes
    }

    /// Node with index `index`
    pub fn node(&self, index: usize) -> &BlockNode<T> {
        &self.nodes[index]
    }

    /// Root of the block of patches `(i, j)`, `None` for `j > i`
    pub fn top(&self, i: usize, j: usize) -> Option<usize> {
        self.top[i * self.npatches + j]
    }

    /// Leaf nodes
    pub fn leaves(&self) -> impl Iterator<Item = &BlockNode<T>> + '_ {
        self.nodes.iter().filter(|node| node.is_leaf())
    }

    /// Leaf counts
    pub fn statistics(&self) -> &BlockStatistics {
        &self.statistics
    }

    /// Number of scalars stored in all leaves
    pub fn storage_size(&self) -> usize {
        self.statistics.dense_entries + self.statistics.low_rank_entries
    }
}

/// `y += A x` or `y += Aᵀ x`.
pub(crate) fn multiply_add<T: RlstScalar>(
    matrix: &DynamicArray<T, 2>,
    transpose: bool,
    x: &[T],
    y: &mut [T],
) {
    let [nrows, ncols] = matrix.shape();
    let (mode, nx, ny) = if transpose {
        (TransMode::Trans, nrows, ncols)
    } else {
        (TransMode::NoTrans, ncols, nrows)
    };
    rlst_array_from_slice_mut1!(y, [ny]).mult_into(
        mode,
        TransMode::NoTrans,
        T::one(),
        matrix.view(),
        rlst_array_from_slice1!(x, [nx]),
        T::one(),
    );
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::discretization::Mesh;
    use crate::interpolation::chebyshev_roots;
    use crate::laplace::{LaplaceDoubleLayer, LaplaceSingleLayer};
    use crate::shapes::{screen, square_tube};
    use approx::*;
    use rlst::{c64, RandomAccessByRef};

    fn covered_pairs<T: RlstScalar>(
        tree: &BlockClusterTree<T>,
        disc: &Discretization<'_, impl Patch>,
    ) -> Vec<usize> {
        let elements = disc.element_tree();
        let n = elements.nelements();
        let mut count = vec![0; n * n];
        for leaf in tree.leaves() {
            for e1 in elements.element_range(leaf.row()) {
                for e2 in elements.element_range(leaf.col()) {
                    count[e1 * n + e2] += 1;
                    if !leaf.is_diagonal() {
                        count[e2 * n + e1] += 1;
                    }
                }
            }
        }
        count
    }

    #[test]
    fn test_leaves_cover_every_pair_once() {
        for (patches, level, min_bsize) in [
            (square_tube(), 3, 1),
            (screen(2), 3, 2),
            (screen(1), 2, 0),
        ] {
            let mesh = Mesh::new(patches, level).unwrap();
            let disc = Discretization::new(&mesh, 0);
            let settings = HMatrixSettings::new(1.6, 2, min_bsize).unwrap();
            let pde = LaplaceSingleLayer::new();
            let tree = BlockClusterTree::new(&disc, &pde, &chebyshev_roots(2), &settings).unwrap();
            assert!(covered_pairs(&tree, &disc).iter().all(|c| *c == 1));
            let statistics = tree.statistics();
            assert_eq!(
                statistics.dense + statistics.dense_diagonal + statistics.low_rank,
                tree.leaves().count()
            );
        }
    }

    #[test]
    fn test_tree_structure() {
        let mesh = Mesh::new(square_tube(), 3).unwrap();
        let disc = Discretization::new(&mesh, 0);
        let settings = HMatrixSettings::default();
        let pde = LaplaceSingleLayer::new();
        let tree = BlockClusterTree::new(&disc, &pde, &chebyshev_roots(4), &settings).unwrap();
        let floor = settings.floor_level(3);
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(tree.top(i, j).is_some(), j <= i);
            }
        }
        for (index, node) in tree.nodes().iter().enumerate() {
            match node.kind() {
                NodeKind::Internal(sons) => {
                    for (k, son) in sons.iter().enumerate() {
                        let (i, j) = (k / 4, k % 4);
                        assert_eq!(son.is_some(), !node.is_diagonal() || j <= i);
                        if let Some(son) = son {
                            let son = tree.node(*son);
                            assert_eq!(son.father(), Some(index));
                            assert_eq!(son.position(), (i, j));
                            assert_eq!(son.level(), node.level() + 1);
                        }
                    }
                }
                NodeKind::LowRank(block) => {
                    assert!(!node.is_diagonal());
                    assert!(node.level() <= floor);
                    assert_eq!(block.component(0).matrix().shape(), [16, 16]);
                    assert!(block.component(0).mirror().is_none());
                }
                NodeKind::Dense(block) => {
                    assert_eq!(node.level(), floor);
                    assert_eq!(block.component(0).matrix().shape(), [4, 4]);
                }
            }
        }
    }

    #[test]
    fn test_diagonal_dense_blocks_are_symmetric() {
        let mesh = Mesh::new(screen(1), 2).unwrap();
        let disc = Discretization::new(&mesh, 1);
        let settings = HMatrixSettings::new(1.6, 2, 1).unwrap();
        let pde = LaplaceSingleLayer::new();
        let tree = BlockClusterTree::new(&disc, &pde, &chebyshev_roots(2), &settings).unwrap();
        let mut found = false;
        for leaf in tree.leaves().filter(|leaf| leaf.is_diagonal()) {
            if let NodeKind::Dense(block) = leaf.kind() {
                let matrix = block.component(0).matrix();
                let n = matrix.shape()[0];
                assert_eq!(n, 16);
                // entries between distinct elements are mirrored exactly
                for r in 0..n {
                    for c in (0..n).filter(|c| c / 4 != r / 4) {
                        assert_relative_eq!(
                            *matrix.get([r, c]).unwrap(),
                            *matrix.get([c, r]).unwrap(),
                            max_relative = 1e-12
                        );
                    }
                }
                found = true;
            }
        }
        assert!(found);
    }

    #[test]
    fn test_mirrors_of_nonsymmetric_components() {
        let mesh = Mesh::new(square_tube(), 2).unwrap();
        let disc = Discretization::new(&mesh, 0);
        let settings = HMatrixSettings::new(1.6, 2, 1).unwrap();
        let pde = LaplaceDoubleLayer::new();
        let tree = BlockClusterTree::new(&disc, &pde, &chebyshev_roots(2), &settings).unwrap();
        for leaf in tree.leaves() {
            let component = match leaf.kind() {
                NodeKind::Dense(block) => block.component(0),
                NodeKind::LowRank(block) => block.component(0),
                NodeKind::Internal(_) => unreachable!(),
            };
            assert_eq!(component.mirror().is_some(), !leaf.is_diagonal());
            if let Some(mirror) = component.mirror() {
                let [n1, n2] = component.matrix().shape();
                assert_eq!(mirror.shape(), [n2, n1]);
            }
        }
    }

    #[test]
    fn test_multiply_add() {
        let mut matrix = rlst_dynamic_array2!(f64, [2, 3]);
        matrix.data_mut().copy_from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let mut y = vec![1.0, 1.0];
        multiply_add(&matrix, false, &[1.0, 0.0, -1.0], &mut y);
        assert_eq!(y, vec![1.0 - 4.0, 1.0 - 4.0]);
        let mut z = vec![0.0; 3];
        multiply_add(&matrix, true, &[1.0, 1.0], &mut z);
        assert_eq!(z, vec![3.0, 7.0, 11.0]);

        // transposition does not conjugate
        let mut matrix = rlst_dynamic_array2!(c64, [1, 2]);
        matrix.data_mut()[1] = c64::new(0.0, 1.0);
        let mut z = vec![c64::new(0.0, 0.0); 2];
        multiply_add(&matrix, true, &[c64::new(2.0, 0.0)], &mut z);
        assert_eq!(z[1], c64::new(0.0, 2.0));
    }
}
