//! Near field integration of element pairs
//!
//! Pairs of elements are classified by their topological relation. Separated
//! and touching pairs are integrated with tensor Gauss rules, pairs with a
//! common vertex, a common edge or identical elements with Duffy rules.
use crate::discretization::{Discretization, LegendreBasis};
use crate::element_tree::ElementNode;
use crate::quadrature::types::TestTrialNumericalQuadratureDefinition;
use crate::quadrature::{
    edge_adjacent_squares, gauss_legendre, identical_squares, vertex_adjacent_squares,
};
use crate::traits::Patch;
use crate::types::{Error, Result};
use rlst::RlstScalar;

/// Elements whose bounding spheres are further apart than this are far.
pub const FAR_FIELD_DISTANCE: f64 = 1e-6;

/// Topological relation of two elements.
///
/// Corner indices refer to the counter-clockwise numbering
/// (0, 0), (1, 0), (1, 1), (0, 1) of an element's parameter square.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementPairCase {
    /// The bounding spheres are separated.
    Far,
    /// The bounding spheres touch but the elements share no vertex.
    Regular,
    /// Both elements are the same.
    Identical,
    /// The elements share an edge; `test[k]` and `trial[k]` are the same point.
    SharedEdge {
        /// Corners of the edge in the test element
        test: [usize; 2],
        /// Corners of the edge in the trial element
        trial: [usize; 2],
    },
    /// The elements share a vertex.
    SharedVertex {
        /// Corner in the test element
        test: usize,
        /// Corner in the trial element
        trial: usize,
    },
}

/// Determine the relation of two elements with bounding sphere distance `distance`.
pub fn classify_pair(
    test: &ElementNode,
    trial: &ElementNode,
    distance: f64,
) -> Result<ElementPairCase> {
    if test.number() == trial.number() {
        return Ok(ElementPairCase::Identical);
    }
    if distance > FAR_FIELD_DISTANCE {
        return Ok(ElementPairCase::Far);
    }
    let mut shared = Vec::with_capacity(2);
    for (i, v) in test.vertices().iter().enumerate() {
        for (j, w) in trial.vertices().iter().enumerate() {
            if v == w {
                shared.push((i, j));
            }
        }
    }
    match shared[..] {
        [] => Ok(ElementPairCase::Regular),
        [(test, trial)] => Ok(ElementPairCase::SharedVertex { test, trial }),
        [(i0, j0), (i1, j1)] => {
            let adjacent = |a: usize, b: usize| (a + 1) % 4 == b || (b + 1) % 4 == a;
            if adjacent(i0, i1) && adjacent(j0, j1) {
                Ok(ElementPairCase::SharedEdge {
                    test: [i0, i1],
                    trial: [j0, j1],
                })
            } else {
                Err(Error::InvalidGeometry(format!(
                    "elements {} and {} share two opposite corners",
                    test.number(),
                    trial.number()
                )))
            }
        }
        _ => Err(Error::InvalidGeometry(format!(
            "distinct elements {} and {} share {} vertices",
            test.number(),
            trial.number(),
            shared.len()
        ))),
    }
}

/// A pair of elements handed to the near field integration of a PDE.
pub struct ElementPair<'a, P: Patch> {
    /// Patch of the test element
    pub test_patch: &'a P,
    /// Patch of the trial element
    pub trial_patch: &'a P,
    /// Lower left corner of the test element in its parameter domain
    pub test_corner: [f64; 2],
    /// Lower left corner of the trial element in its parameter domain
    pub trial_corner: [f64; 2],
    /// Side length of the elements in the parameter domain
    pub width: f64,
    /// Refinement level of the mesh
    pub level: usize,
    /// Distance of the bounding spheres
    pub distance: f64,
    /// Topological relation
    pub case: ElementPairCase,
    /// One dimensional local basis
    pub basis: &'a LegendreBasis,
}

impl<'a, P: Patch> ElementPair<'a, P> {
    /// The pair of elements `test` and `trial` (element numbers).
    pub fn new(disc: &'a Discretization<'a, P>, test: usize, trial: usize) -> Result<Self> {
        let tree = disc.element_tree();
        let (e1, e2) = (tree.element(test), tree.element(trial));
        let distance = e1.sphere().distance(e2.sphere());
        Ok(Self {
            test_patch: disc.mesh().patch(e1.patch()),
            trial_patch: disc.mesh().patch(e2.patch()),
            test_corner: e1.corner(),
            trial_corner: e2.corner(),
            width: e1.width(),
            level: tree.level(),
            distance,
            case: classify_pair(e1, e2, distance)?,
            basis: disc.basis(),
        })
    }
}

/// Quadrature order for a pair of elements at distance `distance` on a mesh
/// of refinement level `level` with `a_o` basis functions per direction.
///
/// The order grows with the level and decays with the distance so that the
/// quadrature error stays below the discretization error.
pub fn quadrature_order(distance: f64, accuracy: f64, level: usize, a_o: usize) -> usize {
    let ln2 = std::f64::consts::LN_2;
    let m = level as f64;
    let dist = if distance * ((1u64 << level) as f64) < 1.0 {
        -m * ln2
    } else {
        distance.ln()
    };
    let g = 0.5 * ((accuracy + a_o as f64 - 1.0) * m * ln2 + (a_o as f64 - 2.0) * dist)
        / ((m + 2.0) * ln2 + dist);
    g.max(0.0) as usize
}

/// Quadrature settings of the near field integration.
#[derive(Debug, Clone, PartialEq)]
pub struct NearFieldOptions {
    /// Accuracy parameter of the order selection, `3 + 2(a_o - 1)` if unset
    accuracy: Option<f64>,
    /// Minimal number of Gauss points per direction, `a_o + 2` if unset
    far_field_points: Option<usize>,
    /// Gauss points per direction of the Duffy rules
    singular_points: usize,
}

impl Default for NearFieldOptions {
    fn default() -> Self {
        Self {
            accuracy: None,
            far_field_points: None,
            singular_points: 4,
        }
    }
}

impl NearFieldOptions {
    /// Set the accuracy parameter.
    pub fn set_accuracy(&mut self, accuracy: f64) {
        self.accuracy = Some(accuracy);
    }
    /// Set the minimal number of Gauss points for regular pairs.
    pub fn set_far_field_points(&mut self, npoints: usize) {
        self.far_field_points = Some(npoints);
    }
    /// Set the number of points of the Duffy rules.
    pub fn set_singular_points(&mut self, npoints: usize) {
        self.singular_points = npoints;
    }

    /// Accuracy parameter for `a_o` functions per direction
    pub fn accuracy(&self, a_o: usize) -> f64 {
        self.accuracy.unwrap_or(3.0 + 2.0 * (a_o as f64 - 1.0))
    }
    /// Minimal number of Gauss points for `a_o` functions per direction
    pub fn far_field_points(&self, a_o: usize) -> usize {
        self.far_field_points.unwrap_or(a_o + 2)
    }
    /// Number of points of the Duffy rules
    pub fn singular_points(&self) -> usize {
        self.singular_points
    }

    /// Gauss points per direction for a pair of elements.
    pub fn npoints<P: Patch>(&self, pair: &ElementPair<'_, P>) -> usize {
        let a_o = pair.basis.dim();
        match pair.case {
            ElementPairCase::Far | ElementPairCase::Regular => {
                let g = quadrature_order(pair.distance, self.accuracy(a_o), pair.level, a_o);
                usize::max(g + 1, self.far_field_points(a_o))
            }
            _ => self.singular_points,
        }
    }
}

/// A point on the surface with its unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    /// Position
    pub point: [f64; 3],
    /// Unit normal
    pub normal: [f64; 3],
}

impl SurfacePoint {
    /// The point with parameters `(s, t)` on a patch and its surface measure.
    pub fn on_patch<P: Patch>(patch: &P, s: f64, t: f64) -> (Self, f64) {
        let n = patch.normal(s, t);
        let measure = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        (
            Self {
                point: patch.eval(s, t),
                normal: n.map(|x| x / measure),
            },
            measure,
        )
    }
}

/// Geometry and basis values at a quadrature point of an element.
struct PointValues {
    surface: SurfacePoint,
    measure: f64,
    basis: Vec<f64>,
}

impl PointValues {
    fn new(a_o: usize) -> Self {
        Self {
            surface: SurfacePoint {
                point: [0.0; 3],
                normal: [0.0; 3],
            },
            measure: 0.0,
            basis: vec![0.0; a_o * a_o],
        }
    }

    fn evaluate<P: Patch>(
        &mut self,
        patch: &P,
        corner: [f64; 2],
        width: f64,
        basis: &LegendreBasis,
        local: [f64; 2],
        scratch: &mut [Vec<f64>; 2],
    ) {
        let (s, t) = (corner[0] + width * local[0], corner[1] + width * local[1]);
        (self.surface, self.measure) = SurfacePoint::on_patch(patch, s, t);
        basis.eval(local[0], &mut scratch[0]);
        basis.eval(local[1], &mut scratch[1]);
        let a_o = basis.dim();
        for m1 in 0..a_o {
            for m2 in 0..a_o {
                self.basis[m1 * a_o + m2] = scratch[0][m2] * scratch[1][m1];
            }
        }
    }
}

fn accumulate<T: RlstScalar<Real = f64>>(
    test: &PointValues,
    trial: &PointValues,
    weight: f64,
    kernel: &impl Fn(&SurfacePoint, &SurfacePoint) -> T,
    output: &mut [T],
) {
    let value = kernel(&test.surface, &trial.surface)
        * T::from_real(weight * test.measure * trial.measure);
    let a_bs = test.basis.len();
    for (i, phi) in test.basis.iter().enumerate() {
        let scaled = value * T::from_real(*phi);
        for (entry, psi) in output[i * a_bs..(i + 1) * a_bs].iter_mut().zip(&trial.basis) {
            *entry += scaled * T::from_real(*psi);
        }
    }
}

/// Galerkin entries of a scalar kernel for a pair of elements.
///
/// The kernel is evaluated at a test and a trial point. `output` receives
/// `a_bs × a_bs` entries, row `i` for test function `i`.
pub fn integrate_pair<P: Patch, T: RlstScalar<Real = f64>>(
    pair: &ElementPair<'_, P>,
    options: &NearFieldOptions,
    kernel: impl Fn(&SurfacePoint, &SurfacePoint) -> T,
    output: &mut [T],
) -> Result<()> {
    let a_o = pair.basis.dim();
    let a_bs = a_o * a_o;
    if output.len() != a_bs * a_bs {
        return Err(Error::DimensionMismatch {
            expected: a_bs * a_bs,
            actual: output.len(),
        });
    }
    output.fill(T::zero());

    let npoints = options.npoints(pair);
    let h2 = pair.width * pair.width;
    let mut scratch = [vec![0.0; a_o], vec![0.0; a_o]];

    let singular_rule: Option<TestTrialNumericalQuadratureDefinition> = match pair.case {
        ElementPairCase::Far | ElementPairCase::Regular => None,
        ElementPairCase::Identical => Some(identical_squares(npoints)?),
        ElementPairCase::SharedEdge { test, trial } => {
            Some(edge_adjacent_squares(npoints, test, trial)?)
        }
        ElementPairCase::SharedVertex { test, trial } => {
            Some(vertex_adjacent_squares(npoints, test, trial)?)
        }
    };

    if let Some(rule) = singular_rule {
        let mut test = PointValues::new(a_o);
        let mut trial = PointValues::new(a_o);
        for index in 0..rule.npoints {
            test.evaluate(
                pair.test_patch,
                pair.test_corner,
                pair.width,
                pair.basis,
                rule.test_point(index),
                &mut scratch,
            );
            trial.evaluate(
                pair.trial_patch,
                pair.trial_corner,
                pair.width,
                pair.basis,
                rule.trial_point(index),
                &mut scratch,
            );
            accumulate(&test, &trial, h2 * rule.weights[index], &kernel, output);
        }
    } else {
        let rule = gauss_legendre(npoints)?;
        let tabulate = |patch: &P, corner: [f64; 2], scratch: &mut [Vec<f64>; 2]| {
            let mut values = Vec::with_capacity(npoints * npoints);
            for (x, wx) in rule.points.iter().zip(&rule.weights) {
                for (y, wy) in rule.points.iter().zip(&rule.weights) {
                    let mut point = PointValues::new(a_o);
                    point.evaluate(patch, corner, pair.width, pair.basis, [*x, *y], scratch);
                    values.push((point, wx * wy));
                }
            }
            values
        };
        let test_points = tabulate(pair.test_patch, pair.test_corner, &mut scratch);
        let trial_points = tabulate(pair.trial_patch, pair.trial_corner, &mut scratch);
        for (test, w1) in &test_points {
            for (trial, w2) in &trial_points {
                accumulate(test, trial, h2 * w1 * w2, &kernel, output);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::discretization::Mesh;
    use crate::shapes::{screen, unit_cube};
    use approx::*;

    #[test]
    fn test_classification() {
        let mesh = Mesh::new(screen(1), 2).unwrap();
        let disc = Discretization::new(&mesh, 0);
        // element 0: (0,0), 1: (1,0), 2: (1,1), 3: (0,1), 4: (2,0)
        let case = |a, b| ElementPair::new(&disc, a, b).unwrap().case;
        assert_eq!(case(0, 0), ElementPairCase::Identical);
        assert_eq!(
            case(0, 1),
            ElementPairCase::SharedEdge {
                test: [1, 2],
                trial: [0, 3]
            }
        );
        assert_eq!(
            case(0, 2),
            ElementPairCase::SharedVertex { test: 2, trial: 0 }
        );
        assert_eq!(case(1, 3), ElementPairCase::SharedVertex { test: 3, trial: 1 });
        // (2, 0) and (2, 2) are separated from (0, 0)
        assert_eq!(case(0, 4), ElementPairCase::Far);
        assert_eq!(case(0, 8), ElementPairCase::Far);
    }

    #[test]
    fn test_edges_across_patches() {
        let mesh = Mesh::new(unit_cube(), 1).unwrap();
        let disc = Discretization::new(&mesh, 0);
        let tree = mesh.element_tree();
        let mut edges = 0;
        for a in 0..tree.nelements() {
            for b in 0..tree.nelements() {
                if let ElementPairCase::SharedEdge { test, trial } =
                    ElementPair::new(&disc, a, b).unwrap().case
                {
                    let (ea, eb) = (tree.element(a), tree.element(b));
                    assert_eq!(ea.vertices()[test[0]], eb.vertices()[trial[0]]);
                    assert_eq!(ea.vertices()[test[1]], eb.vertices()[trial[1]]);
                    edges += 1;
                }
            }
        }
        // every element has four edge neighbours
        assert_eq!(edges, 4 * tree.nelements());
    }

    #[test]
    fn test_quadrature_order() {
        // touching elements on level 2 with constant functions
        assert_eq!(quadrature_order(0.0, 3.0, 2, 1), 2);
        // far apart elements need fewer points
        assert!(quadrature_order(1.0, 3.0, 4, 1) <= quadrature_order(0.01, 3.0, 4, 1));
        // below one element width the distance is clamped
        assert_eq!(
            quadrature_order(0.01, 3.0, 4, 1),
            quadrature_order(0.0, 3.0, 4, 1)
        );
        assert_ne!(
            quadrature_order(0.5, 3.0, 4, 2),
            quadrature_order(0.0, 3.0, 4, 2)
        );
    }

    #[test]
    fn test_integrate_constant_kernel() {
        // A kernel equal to one gives the product of the integrals of the basis
        // functions: h for the constant function and zero otherwise.
        let mesh = Mesh::new(unit_cube(), 2).unwrap();
        let disc = Discretization::new(&mesh, 1);
        let options = NearFieldOptions::default();
        for (a, b) in [(0, 0), (0, 1), (0, 2), (0, 40), (5, 90)] {
            let pair = ElementPair::new(&disc, a, b).unwrap();
            let mut output = vec![0.0; 16];
            integrate_pair(&pair, &options, |_, _| 1.0, &mut output).unwrap();
            for (index, value) in output.iter().enumerate() {
                let expected = if index == 0 { 0.25 * 0.25 } else { 0.0 };
                assert_relative_eq!(*value, expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_output_size_is_checked() {
        let mesh = Mesh::new(screen(1), 1).unwrap();
        let disc = Discretization::new(&mesh, 0);
        let pair = ElementPair::new(&disc, 0, 3).unwrap();
        let mut output = vec![0.0; 2];
        let options = NearFieldOptions::default();
        assert!(integrate_pair(&pair, &options, |_, _| 1.0, &mut output).is_err());
    }
}
