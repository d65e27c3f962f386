//! Forward and backward H2 transforms
//!
//! The forward transform projects a coefficient vector onto the interpolation
//! bases of all clusters, from the floor level up to the patch roots. The
//! backward transform is its adjoint: coefficients are distributed down to
//! the floor clusters and expanded into a coefficient vector.
use crate::interpolation::{MomentMatrix, TransferMatrices};
use itertools::izip;
use rayon::prelude::*;
use rlst::RlstScalar;

/// Interpolation coefficients of the clusters of one patch.
pub struct PatchCoefficients<T> {
    rank: usize,
    levels: Vec<Vec<T>>,
}

impl<T: RlstScalar<Real = f64>> PatchCoefficients<T> {
    fn new(floor_level: usize, rank: usize) -> Self {
        Self {
            rank,
            levels: (0..=floor_level)
                .map(|l| vec![T::zero(); 4usize.pow(l as u32) * rank])
                .collect(),
        }
    }

    /// Deepest level
    pub fn floor_level(&self) -> usize {
        self.levels.len() - 1
    }

    /// Coefficients of the cluster with number `local` within the patch on level `level`
    pub fn cluster(&self, level: usize, local: usize) -> &[T] {
        &self.levels[level][local * self.rank..(local + 1) * self.rank]
    }

    /// Mutable coefficients of a cluster
    pub fn cluster_mut(&mut self, level: usize, local: usize) -> &mut [T] {
        &mut self.levels[level][local * self.rank..(local + 1) * self.rank]
    }

    fn clear(&mut self) {
        for level in self.levels.iter_mut() {
            level.fill(T::zero());
        }
    }

    fn forward(
        &mut self,
        moments: &MomentMatrix<T>,
        transfer: &TransferMatrices<T>,
        x: &[T],
    ) {
        let floor = self.floor_level();
        let size = moments.cluster_size();
        for (coefficients, x) in izip!(
            self.levels[floor].chunks_exact_mut(self.rank),
            x.chunks_exact(size)
        ) {
            moments.project(x, coefficients);
        }
        for level in (0..floor).rev() {
            let (upper, lower) = self.levels.split_at_mut(level + 1);
            let (fathers, sons) = (&mut upper[level], &lower[0]);
            fathers.fill(T::zero());
            for (father, sons) in izip!(
                fathers.chunks_exact_mut(self.rank),
                sons.chunks_exact(4 * self.rank)
            ) {
                for (k, son) in sons.chunks_exact(self.rank).enumerate() {
                    transfer.aggregate(k, son, father);
                }
            }
        }
    }

    fn backward(
        &mut self,
        moments: &MomentMatrix<T>,
        transfer: &TransferMatrices<T>,
        y: &mut [T],
    ) {
        let floor = self.floor_level();
        for level in 0..floor {
            let (upper, lower) = self.levels.split_at_mut(level + 1);
            let (fathers, sons) = (&upper[level], &mut lower[0]);
            for (father, sons) in izip!(
                fathers.chunks_exact(self.rank),
                sons.chunks_exact_mut(4 * self.rank)
            ) {
                for (k, son) in sons.chunks_exact_mut(self.rank).enumerate() {
                    transfer.distribute(k, father, son);
                }
            }
        }
        let size = moments.cluster_size();
        for (coefficients, y) in izip!(
            self.levels[floor].chunks_exact(self.rank),
            y.chunks_exact_mut(size)
        ) {
            moments.expand(coefficients, y);
        }
    }
}

/// Interpolation coefficients of all clusters from the patch roots down to
/// the floor level. Created for a single product.
pub struct H2Tree<T> {
    patches: Vec<PatchCoefficients<T>>,
}

impl<T: RlstScalar<Real = f64>> H2Tree<T> {
    /// A zero tree for `npatches` patches.
    pub fn new(npatches: usize, floor_level: usize, rank: usize) -> Self {
        Self {
            patches: (0..npatches)
                .map(|_| PatchCoefficients::new(floor_level, rank))
                .collect(),
        }
    }

    /// Number of patches
    pub fn npatches(&self) -> usize {
        self.patches.len()
    }

    /// Coefficients of a patch
    pub fn patch(&self, index: usize) -> &PatchCoefficients<T> {
        &self.patches[index]
    }

    /// Mutable coefficients of all patches
    pub fn patches_mut(&mut self) -> &mut [PatchCoefficients<T>] {
        &mut self.patches
    }

    /// Coefficients of the cluster with number `number` on level `level`
    pub fn cluster(&self, level: usize, number: usize) -> &[T] {
        let per_patch = 4usize.pow(level as u32);
        self.patches[number / per_patch].cluster(level, number % per_patch)
    }

    /// Set all coefficients to zero.
    pub fn clear(&mut self) {
        for patch in self.patches.iter_mut() {
            patch.clear();
        }
    }
}

/// Project `x` onto the interpolation bases of all clusters.
///
/// `x` holds the coefficients of all patches, patch by patch.
pub fn forward_transform<T: RlstScalar<Real = f64>>(
    moments: &MomentMatrix<T>,
    transfer: &TransferMatrices<T>,
    x: &[T],
    tree: &mut H2Tree<T>,
) {
    let patch_size = x.len() / tree.npatches();
    tree.patches
        .par_iter_mut()
        .zip(x.par_chunks(patch_size))
        .for_each(|(patch, x)| patch.forward(moments, transfer, x));
}

/// `y += Bᵀ c` for the interpolation bases `B` of all clusters.
///
/// The coefficients of `tree` are overwritten.
pub fn backward_transform<T: RlstScalar<Real = f64>>(
    moments: &MomentMatrix<T>,
    transfer: &TransferMatrices<T>,
    tree: &mut H2Tree<T>,
    y: &mut [T],
) {
    let patch_size = y.len() / tree.npatches();
    tree.patches
        .par_iter_mut()
        .zip(y.par_chunks_mut(patch_size))
        .for_each(|(patch, y)| patch.backward(moments, transfer, y));
}
