use criterion::{black_box, criterion_group, criterion_main, Criterion};
use h2bem::discretization::{Discretization, Mesh};
use h2bem::laplace::LaplaceSingleLayer;
use h2bem::shapes::unit_cube;
use h2bem::{H2Matrix, HMatrixSettings, TraversalMode};

extern crate blas_src;
extern crate lapack_src;

pub fn h2_matrix_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("h2matrix");
    group.sample_size(10);

    for level in 3..5 {
        let mesh = Mesh::new(unit_cube(), level).unwrap();
        let disc = Discretization::new(&mesh, 0);
        let pde = LaplaceSingleLayer::new();
        let settings = HMatrixSettings::new(1.6, 4, 1).unwrap();

        group.bench_function(
            format!(
                "Construction of {}x{} matrix",
                disc.global_size(),
                disc.global_size()
            ),
            |b| b.iter(|| black_box(H2Matrix::new(&disc, &pde, settings.clone()).unwrap())),
        );

        let matrix = H2Matrix::new(&disc, &pde, settings).unwrap();
        let x = vec![1.0; disc.global_size()];
        for mode in [TraversalMode::Normal, TraversalMode::Symmetric] {
            group.bench_function(
                format!(
                    "{:?} product with {}x{} matrix",
                    mode,
                    disc.global_size(),
                    disc.global_size()
                ),
                |b| b.iter(|| black_box(matrix.matvec(mode, &x).unwrap())),
            );
        }
    }
    group.finish();
}

criterion_group!(benches, h2_matrix_benchmark);
criterion_main!(benches);
