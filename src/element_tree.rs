//! Quad-tree of elements over the patches of a surface.
//!
//! Every patch is refined uniformly into `4^level` elements. The nodes of all
//! patches are stored level by level; within a level the nodes are numbered
//! patch by patch and, inside a patch, in the order in which the sons are
//! generated. A cluster on level `l` with number `n` therefore covers the
//! elements `n·4^(M-l)..(n+1)·4^(M-l)` of the finest level `M`.
use crate::traits::Patch;
use crate::types::{Error, Result};
use std::collections::HashMap;
use std::ops::Range;

/// Offsets of the four sons of a node in the refined parameter domain.
///
/// The same order numbers the corners of an element counter-clockwise.
pub const SON_OFFSETS: [(usize, usize); 4] = [(0, 0), (1, 0), (1, 1), (0, 1)];

/// Largest supported refinement level.
pub const MAX_LEVEL: usize = 14;

/// Points closer than this are identified when the vertex list is built.
const POINT_TOLERANCE: f64 = 1e-6;

/// A sphere enclosing a cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Centre
    pub midpoint: [f64; 3],
    /// Radius
    pub radius: f64,
}

impl BoundingSphere {
    /// A sphere of radius zero.
    pub fn point(midpoint: [f64; 3]) -> Self {
        Self {
            midpoint,
            radius: 0.0,
        }
    }

    /// Distance of the midpoints
    pub fn midpoint_distance(&self, other: &Self) -> f64 {
        norm(&sub(&self.midpoint, &other.midpoint))
    }

    /// Distance between the spheres. Negative if they overlap.
    pub fn distance(&self, other: &Self) -> f64 {
        self.midpoint_distance(other) - self.radius - other.radius
    }

    /// The smallest sphere containing both spheres.
    pub fn unify(&self, other: &Self) -> Self {
        let z = sub(&self.midpoint, &other.midpoint);
        let dist = norm(&z);
        if dist + other.radius <= self.radius {
            *self
        } else if dist + self.radius <= other.radius {
            *other
        } else {
            let scale = (self.radius - other.radius) / dist;
            let mut midpoint = [0.0; 3];
            for (d, m) in midpoint.iter_mut().enumerate() {
                *m = 0.5 * (self.midpoint[d] + other.midpoint[d] + scale * z[d]);
            }
            Self {
                midpoint,
                radius: 0.5 * (self.radius + other.radius + dist),
            }
        }
    }
}

fn sub(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn norm(a: &[f64; 3]) -> f64 {
    (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt()
}

/// A node of the element tree.
#[derive(Debug, Clone)]
pub struct ElementNode {
    level: usize,
    patch: usize,
    number: usize,
    index_s: usize,
    index_t: usize,
    sphere: BoundingSphere,
    sons: Option<[usize; 4]>,
    father: Option<usize>,
    vertices: [usize; 4],
}

impl ElementNode {
    /// Refinement level
    pub fn level(&self) -> usize {
        self.level
    }
    /// Patch the node belongs to
    pub fn patch(&self) -> usize {
        self.patch
    }
    /// Index of the node within its level
    pub fn number(&self) -> usize {
        self.number
    }
    /// Index of the node within its level and patch
    pub fn local_number(&self) -> usize {
        self.number - self.patch * 4usize.pow(self.level as u32)
    }
    /// Tensor indices in the parameter domain of the patch
    pub fn indices(&self) -> (usize, usize) {
        (self.index_s, self.index_t)
    }
    /// Lower left corner in the parameter domain
    pub fn corner(&self) -> [f64; 2] {
        let h = self.width();
        [self.index_s as f64 * h, self.index_t as f64 * h]
    }
    /// Side length in the parameter domain
    pub fn width(&self) -> f64 {
        1.0 / (1usize << self.level) as f64
    }
    /// Bounding sphere
    pub fn sphere(&self) -> &BoundingSphere {
        &self.sphere
    }
    /// Sons, `None` for elements
    pub fn sons(&self) -> Option<&[usize; 4]> {
        self.sons.as_ref()
    }
    /// Father, `None` for patch roots
    pub fn father(&self) -> Option<usize> {
        self.father
    }
    /// Indices of the corners into the vertex list, counter-clockwise
    pub fn vertices(&self) -> &[usize; 4] {
        &self.vertices
    }
}

/// Element quad-tree of a set of patches.
#[derive(Debug, Clone)]
pub struct ElementTree {
    npatches: usize,
    level: usize,
    level_offsets: Vec<usize>,
    nodes: Vec<ElementNode>,
    vertices: Vec<[f64; 3]>,
}

/// Identifies points that agree up to `POINT_TOLERANCE`.
struct VertexRegistry {
    cells: HashMap<[i64; 3], Vec<usize>>,
    points: Vec<[f64; 3]>,
}

impl VertexRegistry {
    fn new() -> Self {
        Self {
            cells: HashMap::new(),
            points: Vec::new(),
        }
    }

    fn cell(point: &[f64; 3]) -> [i64; 3] {
        point.map(|x| (x / POINT_TOLERANCE).floor() as i64)
    }

    fn insert(&mut self, point: [f64; 3]) -> usize {
        let cell = Self::cell(&point);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let key = [cell[0] + dx, cell[1] + dy, cell[2] + dz];
                    if let Some(candidates) = self.cells.get(&key) {
                        for &index in candidates {
                            if norm(&sub(&self.points[index], &point)) < POINT_TOLERANCE {
                                return index;
                            }
                        }
                    }
                }
            }
        }
        let index = self.points.len();
        self.points.push(point);
        self.cells.entry(cell).or_default().push(index);
        index
    }
}

impl ElementTree {
    /// Refine every patch `level` times.
    pub fn new<P: Patch>(patches: &[P], level: usize) -> Result<Self> {
        if patches.is_empty() {
            return Err(Error::InvalidGeometry(
                "at least one patch is required".to_string(),
            ));
        }
        if level > MAX_LEVEL {
            return Err(Error::InvalidGeometry(format!(
                "refinement level {level} exceeds the maximum {MAX_LEVEL}"
            )));
        }
        let npatches = patches.len();

        let mut level_offsets = Vec::with_capacity(level + 2);
        level_offsets.push(0);
        for l in 0..=level {
            level_offsets.push(level_offsets[l] + npatches * 4usize.pow(l as u32));
        }

        let mut nodes = Vec::with_capacity(level_offsets[level + 1]);
        for patch in 0..npatches {
            nodes.push(ElementNode {
                level: 0,
                patch,
                number: patch,
                index_s: 0,
                index_t: 0,
                sphere: BoundingSphere::point([0.0; 3]),
                sons: None,
                father: None,
                vertices: [0; 4],
            });
        }
        for l in 0..level {
            for number in 0..npatches * 4usize.pow(l as u32) {
                let id = level_offsets[l] + number;
                let (patch, index_s, index_t) = {
                    let node = &nodes[id];
                    (node.patch, node.index_s, node.index_t)
                };
                let mut sons = [0; 4];
                for (k, (ds, dt)) in SON_OFFSETS.iter().enumerate() {
                    sons[k] = level_offsets[l + 1] + 4 * number + k;
                    nodes.push(ElementNode {
                        level: l + 1,
                        patch,
                        number: 4 * number + k,
                        index_s: 2 * index_s + ds,
                        index_t: 2 * index_t + dt,
                        sphere: BoundingSphere::point([0.0; 3]),
                        sons: None,
                        father: Some(id),
                        vertices: [0; 4],
                    });
                }
                nodes[id].sons = Some(sons);
            }
        }

        // Elements: corners and spheres
        let mut registry = VertexRegistry::new();
        let h = 1.0 / (1usize << level) as f64;
        for node in nodes[level_offsets[level]..].iter_mut() {
            let patch = &patches[node.patch];
            let mut spheres = [BoundingSphere::point([0.0; 3]); 4];
            for (k, (ds, dt)) in SON_OFFSETS.iter().enumerate() {
                let point = patch.eval(
                    (node.index_s + ds) as f64 * h,
                    (node.index_t + dt) as f64 * h,
                );
                node.vertices[k] = registry.insert(point);
                spheres[k] = BoundingSphere::point(point);
            }
            node.sphere = spheres[0]
                .unify(&spheres[2])
                .unify(&spheres[1].unify(&spheres[3]));
        }

        // Clusters: unify the spheres of the sons
        for l in (0..level).rev() {
            for id in level_offsets[l]..level_offsets[l + 1] {
                if let Some(sons) = nodes[id].sons {
                    let s = sons.map(|son| nodes[son].sphere);
                    let sphere = s[0].unify(&s[2]).unify(&s[1].unify(&s[3]));
                    let mut vertices = [0; 4];
                    for (k, v) in vertices.iter_mut().enumerate() {
                        *v = nodes[sons[k]].vertices[k];
                    }
                    nodes[id].sphere = sphere;
                    nodes[id].vertices = vertices;
                }
            }
        }

        log::debug!(
            "Element tree with {} patches, level {}: {} elements, {} vertices",
            npatches,
            level,
            npatches * 4usize.pow(level as u32),
            registry.points.len()
        );

        Ok(Self {
            npatches,
            level,
            level_offsets,
            nodes,
            vertices: registry.points,
        })
    }

    /// Number of patches
    pub fn npatches(&self) -> usize {
        self.npatches
    }

    /// Refinement level of the elements
    pub fn level(&self) -> usize {
        self.level
    }

    /// Number of elements
    pub fn nelements(&self) -> usize {
        self.npatches * 4usize.pow(self.level as u32)
    }

    /// Number of elements of a single patch
    pub fn nelements_per_patch(&self) -> usize {
        4usize.pow(self.level as u32)
    }

    /// All nodes
    pub fn nodes(&self) -> &[ElementNode] {
        &self.nodes
    }

    /// Node with index `id`
    pub fn node(&self, id: usize) -> &ElementNode {
        &self.nodes[id]
    }

    /// Index of the node with number `number` on level `level`
    pub fn node_id(&self, level: usize, number: usize) -> usize {
        debug_assert!(number < self.level_offsets[level + 1] - self.level_offsets[level]);
        self.level_offsets[level] + number
    }

    /// Root of a patch
    pub fn root(&self, patch: usize) -> usize {
        patch
    }

    /// Nodes on a level
    pub fn nodes_on_level(&self, level: usize) -> &[ElementNode] {
        &self.nodes[self.level_offsets[level]..self.level_offsets[level + 1]]
    }

    /// The elements, ordered by number
    pub fn elements(&self) -> &[ElementNode] {
        self.nodes_on_level(self.level)
    }

    /// Element with number `number`
    pub fn element(&self, number: usize) -> &ElementNode {
        &self.nodes[self.level_offsets[self.level] + number]
    }

    /// Numbers of the elements contained in a node
    pub fn element_range(&self, id: usize) -> Range<usize> {
        let node = &self.nodes[id];
        let size = 4usize.pow((self.level - node.level) as u32);
        node.number * size..(node.number + 1) * size
    }

    /// The deduplicated corner points of all elements
    pub fn vertices(&self) -> &[[f64; 3]] {
        &self.vertices
    }
}
