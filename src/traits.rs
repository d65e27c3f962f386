//! Traits
mod geometry;
mod pde;

pub use geometry::Patch;
pub use pde::{BlockLayout, PdeProblem};
