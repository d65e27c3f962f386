//! Meshes and discontinuous tensor-product discretizations
mod basis;

pub use basis::LegendreBasis;

use crate::element_tree::ElementTree;
use crate::traits::Patch;
use crate::types::Result;
use std::ops::Range;

/// A uniformly refined patch surface.
#[derive(Debug, Clone)]
pub struct Mesh<P: Patch> {
    patches: Vec<P>,
    element_tree: ElementTree,
}

impl<P: Patch> Mesh<P> {
    /// Refine every patch into `4^level` elements.
    pub fn new(patches: Vec<P>, level: usize) -> Result<Self> {
        let element_tree = ElementTree::new(&patches, level)?;
        Ok(Self {
            patches,
            element_tree,
        })
    }

    /// The patches
    pub fn patches(&self) -> &[P] {
        &self.patches
    }

    /// Patch with index `index`
    pub fn patch(&self, index: usize) -> &P {
        &self.patches[index]
    }

    /// The element tree
    pub fn element_tree(&self) -> &ElementTree {
        &self.element_tree
    }

    /// Refinement level
    pub fn level(&self) -> usize {
        self.element_tree.level()
    }

    /// Number of elements
    pub fn nelements(&self) -> usize {
        self.element_tree.nelements()
    }
}

/// Discontinuous tensor Legendre functions on every element of a mesh.
///
/// Element `e` owns the entries `e·a_bs..(e+1)·a_bs` of a coefficient vector,
/// the function `φ_i(s)·φ_j(t)` has local index `j·a_o + i`.
#[derive(Debug, Clone)]
pub struct Discretization<'a, P: Patch> {
    mesh: &'a Mesh<P>,
    basis: LegendreBasis,
}

impl<'a, P: Patch> Discretization<'a, P> {
    /// Create a discretization of polynomial degree `degree` in each direction.
    pub fn new(mesh: &'a Mesh<P>, degree: usize) -> Self {
        Self {
            mesh,
            basis: LegendreBasis::new(degree),
        }
    }

    /// The mesh
    pub fn mesh(&self) -> &'a Mesh<P> {
        self.mesh
    }

    /// The element tree of the mesh
    pub fn element_tree(&self) -> &'a ElementTree {
        self.mesh.element_tree()
    }

    /// The one dimensional basis
    pub fn basis(&self) -> &LegendreBasis {
        &self.basis
    }

    /// Number of one dimensional basis functions (`a_o`)
    pub fn order(&self) -> usize {
        self.basis.dim()
    }

    /// Number of basis functions per element (`a_bs`)
    pub fn local_size(&self) -> usize {
        self.basis.dim() * self.basis.dim()
    }

    /// Number of basis functions per patch
    pub fn patch_size(&self) -> usize {
        self.element_tree().nelements_per_patch() * self.local_size()
    }

    /// Total number of basis functions
    pub fn global_size(&self) -> usize {
        self.mesh.nelements() * self.local_size()
    }

    /// Degrees of freedom of the elements contained in an element tree node
    pub fn node_dofs(&self, node: usize) -> Range<usize> {
        let elements = self.element_tree().element_range(node);
        elements.start * self.local_size()..elements.end * self.local_size()
    }
}
