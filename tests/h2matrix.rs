use approx::*;
use h2bem::dense;
use h2bem::discretization::{Discretization, Mesh};
use h2bem::laplace::{LaplaceAdjointDoubleLayer, LaplaceDoubleLayer, LaplaceSingleLayer};
use h2bem::near_field::{ElementPair, NearFieldOptions};
use h2bem::shapes::{screen, square_tube, unit_cube};
use h2bem::traits::{Patch, PdeProblem};
use h2bem::{Error, H2Matrix, HMatrixSettings, Result, Symmetry, TraversalMode};
use rand::prelude::*;
use rlst::{RandomAccessByRef, Shape};

extern crate blas_src;
extern crate lapack_src;

/// Serves a problem with all components flagged non-symmetric, so that the
/// mirror blocks are computed instead of being served by transposition.
struct NonSymmetric<Pde: PdeProblem> {
    pde: Pde,
    flags: Vec<Symmetry>,
}

impl<Pde: PdeProblem> NonSymmetric<Pde> {
    fn new(pde: Pde) -> Self {
        let flags = vec![Symmetry::NonSymmetric; pde.component_count()];
        Self { pde, flags }
    }
}

impl<Pde: PdeProblem> PdeProblem for NonSymmetric<Pde> {
    type T = Pde::T;

    fn symmetry(&self) -> &[Symmetry] {
        &self.flags
    }

    fn interpolate_kernel<P: Patch>(
        &self,
        test_patch: &P,
        s: [f64; 2],
        trial_patch: &P,
        t: [f64; 2],
        values: &mut [Self::T],
    ) {
        self.pde
            .interpolate_kernel(test_patch, s, trial_patch, t, values)
    }

    fn integrate_element_pair<P: Patch>(
        &self,
        pair: &ElementPair<'_, P>,
        output: &mut [Self::T],
    ) -> Result<()> {
        self.pde.integrate_element_pair(pair, output)
    }
}

fn relative_error(a: &[f64], b: &[f64]) -> f64 {
    let diff: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
    let norm: f64 = b.iter().map(|y| y * y).sum();
    (diff / norm).sqrt()
}

fn random_vector(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen::<f64>() - 0.5).collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn test_square_tube_row_sums() {
    let mesh = Mesh::new(square_tube(), 2).unwrap();
    let disc = Discretization::new(&mesh, 0);
    let pde = LaplaceSingleLayer::new();
    let settings = HMatrixSettings::new(1.6, 4, 1).unwrap();
    let matrix = H2Matrix::new(&disc, &pde, settings).unwrap();
    assert_eq!(matrix.shape(), [64, 64]);

    let ones = vec![1.0; 64];
    let y = matrix.matvec(TraversalMode::Symmetric, &ones).unwrap();
    let reference = dense::matvec(&dense::assemble(&disc, &pde).unwrap(), &ones);
    assert!(relative_error(&y, &reference) < 1e-3);
}

#[test]
fn test_convergence_in_number_of_points() {
    let mesh = Mesh::new(square_tube(), 3).unwrap();
    let disc = Discretization::new(&mesh, 0);
    let mut options = NearFieldOptions::default();
    options.set_far_field_points(12);
    let pde = LaplaceSingleLayer::with_options(options);
    let reference = dense::assemble(&disc, &pde).unwrap();
    let x = random_vector(disc.global_size(), 1);
    let y_dense = dense::matvec(&reference, &x);

    let errors = [4, 8, 12]
        .iter()
        .map(|np| {
            let settings = HMatrixSettings::new(1.6, *np, 1).unwrap();
            let matrix = H2Matrix::new(&disc, &pde, settings).unwrap();
            relative_error(&matrix.matvec(TraversalMode::Normal, &x).unwrap(), &y_dense)
        })
        .collect::<Vec<_>>();
    // exponential convergence down to roundoff
    for pair in errors.windows(2) {
        assert!(pair[1] < pair[0] / 10.0, "errors {errors:?}");
    }
    assert!(errors[2] < 1e-10);
}

#[test]
fn test_transpose_against_dense() {
    let mesh = Mesh::new(square_tube(), 3).unwrap();
    let disc = Discretization::new(&mesh, 0);
    let pde = LaplaceDoubleLayer::new();
    let settings = HMatrixSettings::new(1.6, 5, 1).unwrap();
    let matrix = H2Matrix::new(&disc, &pde, settings).unwrap();
    let reference = dense::assemble(&disc, &pde).unwrap();
    let n = disc.global_size();

    let x = random_vector(n, 2);
    let mut y_dense = vec![0.0; n];
    for (i, value) in y_dense.iter_mut().enumerate() {
        *value = (0..n).map(|j| *reference.get([j, i]).unwrap() * x[j]).sum();
    }
    let y = matrix.matvec(TraversalMode::Transpose, &x).unwrap();
    assert!(relative_error(&y, &y_dense) < 2e-3);
}

#[test]
fn test_transpose_is_adjoint() {
    let mesh = Mesh::new(unit_cube(), 2).unwrap();
    let disc = Discretization::new(&mesh, 1);
    let matrix =
        H2Matrix::new(&disc, &LaplaceDoubleLayer::new(), HMatrixSettings::default()).unwrap();
    let n = matrix.shape()[0];
    let x = random_vector(n, 3);
    let y = random_vector(n, 4);
    let ax = matrix.matvec(TraversalMode::Normal, &x).unwrap();
    let aty = matrix.matvec(TraversalMode::Transpose, &y).unwrap();
    assert_relative_eq!(dot(&ax, &y), dot(&x, &aty), max_relative = 1e-11);
}

#[test]
fn test_adjoint_double_layer_is_transposed_double_layer() {
    let mesh = Mesh::new(unit_cube(), 2).unwrap();
    let disc = Discretization::new(&mesh, 0);
    let mut options = NearFieldOptions::default();
    options.set_singular_points(8);
    let settings = HMatrixSettings::new(1.6, 5, 1).unwrap();
    let double = H2Matrix::new(
        &disc,
        &LaplaceDoubleLayer::with_options(options.clone()),
        settings.clone(),
    )
    .unwrap();
    let adjoint = H2Matrix::new(
        &disc,
        &LaplaceAdjointDoubleLayer::with_options(options),
        settings,
    )
    .unwrap();
    let x = random_vector(disc.global_size(), 5);
    let y = double.matvec(TraversalMode::Transpose, &x).unwrap();
    let z = adjoint.matvec(TraversalMode::Normal, &x).unwrap();
    assert!(relative_error(&z, &y) < 1e-4);
}

#[test]
fn test_symmetric_storage_matches_mirrors() {
    let mesh = Mesh::new(square_tube(), 3).unwrap();
    let disc = Discretization::new(&mesh, 0);
    let mut options = NearFieldOptions::default();
    options.set_singular_points(6);
    let symmetric = LaplaceSingleLayer::with_options(options);
    let settings = HMatrixSettings::default();

    let stored = H2Matrix::new(&disc, &symmetric, settings.clone()).unwrap();
    let mirrored = H2Matrix::new(&disc, &NonSymmetric::new(symmetric), settings).unwrap();
    assert!(mirrored.storage_size() > stored.storage_size());
    assert_eq!(
        stored.statistics().low_rank,
        mirrored.statistics().low_rank
    );

    let x = random_vector(disc.global_size(), 6);
    let y = stored.matvec(TraversalMode::Symmetric, &x).unwrap();
    let z = mirrored.matvec(TraversalMode::Normal, &x).unwrap();
    assert!(relative_error(&z, &y) < 1e-5);
    assert!(matches!(
        mirrored.matvec(TraversalMode::Symmetric, &x),
        Err(Error::UnsupportedMode { .. })
    ));
}

#[test]
fn test_diagonal_against_dense() {
    let mesh = Mesh::new(square_tube(), 2).unwrap();
    let disc = Discretization::new(&mesh, 1);
    let pde = LaplaceSingleLayer::new();
    let matrix = H2Matrix::new(&disc, &pde, HMatrixSettings::default()).unwrap();
    let reference = dense::assemble(&disc, &pde).unwrap();
    let diagonal = matrix.diagonal().unwrap();
    for (i, value) in diagonal.iter().enumerate() {
        assert_relative_eq!(*value, *reference.get([i, i]).unwrap(), max_relative = 1e-13);
    }

    let a_bs = disc.local_size();
    for (element, block) in matrix.element_diagonal(0).unwrap().iter().enumerate() {
        for r in 0..a_bs {
            for c in 0..a_bs {
                assert_relative_eq!(
                    *block.get([r, c]).unwrap(),
                    *reference
                        .get([element * a_bs + r, element * a_bs + c])
                        .unwrap(),
                    max_relative = 1e-13
                );
            }
        }
    }
}

#[test]
fn test_results_do_not_depend_on_thread_count() {
    let mesh = Mesh::new(unit_cube(), 3).unwrap();
    let disc = Discretization::new(&mesh, 0);
    let pde = LaplaceDoubleLayer::new();
    let x = random_vector(disc.global_size(), 7);

    let matrix = H2Matrix::new(&disc, &pde, HMatrixSettings::default()).unwrap();
    let y = matrix.matvec(TraversalMode::Normal, &x).unwrap();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap();
    let (serial_matrix_y, serial_y) = pool.install(|| {
        let serial = H2Matrix::new(&disc, &pde, HMatrixSettings::default()).unwrap();
        (
            serial.matvec(TraversalMode::Normal, &x).unwrap(),
            matrix.matvec(TraversalMode::Normal, &x).unwrap(),
        )
    });
    assert!(relative_error(&serial_y, &y) <= 1e-12);
    assert!(relative_error(&serial_matrix_y, &y) <= 1e-12);
}

#[test]
fn test_larger_floor_blocks() {
    // Dense blocks with 16 elements and degree one functions
    let mesh = Mesh::new(screen(2), 3).unwrap();
    let disc = Discretization::new(&mesh, 1);
    let pde = LaplaceSingleLayer::new();
    let mut settings = HMatrixSettings::for_discretization(4, disc.local_size(), 1);
    assert_eq!(settings.min_bsize(), 1);
    settings.set_min_bsize(2);
    let matrix = H2Matrix::new(&disc, &pde, settings).unwrap();
    for leaf in matrix.tree().leaves() {
        if let h2bem::block_tree::NodeKind::Dense(block) = leaf.kind() {
            assert_eq!(block.component(0).matrix().shape(), [64, 64]);
        }
    }
    let reference = dense::assemble(&disc, &pde).unwrap();
    let x = random_vector(disc.global_size(), 8);
    let y = matrix.matvec(TraversalMode::Normal, &x).unwrap();
    let y_dense = dense::matvec(&reference, &x);
    assert!(relative_error(&y, &y_dense) < 1e-3);
}
