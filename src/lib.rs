//! H2-matrix compression of boundary element operators
#![cfg_attr(feature = "strict", deny(warnings))]
#![warn(missing_docs)]

#[macro_use]
extern crate lazy_static;

pub mod admissibility;
pub mod block_tree;
pub mod dense;
pub mod discretization;
pub mod element_tree;
pub mod h2matrix;
pub mod helmholtz;
pub mod interpolation;
pub mod laplace;
pub mod near_field;
pub mod quadrature;
pub mod settings;
pub mod shapes;
pub mod traits;
pub mod transforms;
pub mod types;

pub use h2matrix::H2Matrix;
pub use settings::HMatrixSettings;
pub use types::{Error, Result, Symmetry, TraversalMode};

#[cfg(test)]
mod test {
    extern crate blas_src;
    extern crate lapack_src;
}
