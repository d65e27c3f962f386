//! Quadrature rules
mod duffy;
mod gauss_legendre;
pub mod types;

pub use duffy::{edge_adjacent_squares, identical_squares, vertex_adjacent_squares};
pub use gauss_legendre::{gauss_legendre, MAX_GAUSS_POINTS};
