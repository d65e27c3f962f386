//! Type definitions

/// Errors raised while building or applying an H2 matrix.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The settings cannot be used for the given discretization.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
    /// A quadrature rule with more points than tabulated was requested.
    #[error("Quadrature rule with {requested} points requested, at most {max} are available")]
    QuadratureOrder {
        /// Requested number of points
        requested: usize,
        /// Largest tabulated number of points
        max: usize,
    },
    /// A vector or matrix has the wrong size.
    #[error("Dimension mismatch: expected {expected}, found {actual}")]
    DimensionMismatch {
        /// Expected size
        expected: usize,
        /// Actual size
        actual: usize,
    },
    /// The traversal mode cannot be used with a component.
    #[error("Traversal mode {mode:?} is not supported by component {component}")]
    UnsupportedMode {
        /// Requested mode
        mode: TraversalMode,
        /// Offending component
        component: usize,
    },
    /// The geometry is inconsistent.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    /// The block cluster tree does not have the expected structure.
    #[error("Invalid block structure: {0}")]
    InvalidStructure(String),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Symmetry of a matrix component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symmetry {
    /// General matrix, both triangles are stored
    NonSymmetric,
    /// `A = Aᵀ`, the upper triangle is served by transposition
    Symmetric,
}

impl Symmetry {
    /// Parse a symmetry flag (`'N'` or `'S'`).
    pub fn from_flag(flag: char) -> Result<Self> {
        match flag {
            'N' => Ok(Symmetry::NonSymmetric),
            'S' => Ok(Symmetry::Symmetric),
            _ => Err(Error::InvalidStructure(format!(
                "Unknown symmetry flag '{flag}'"
            ))),
        }
    }

    /// Parse a string of symmetry flags, one character per component.
    pub fn from_flags(flags: &str) -> Result<Vec<Self>> {
        flags.chars().map(Self::from_flag).collect()
    }

    /// Is the mirror block answered by transposition?
    pub fn is_symmetric(&self) -> bool {
        *self == Symmetry::Symmetric
    }
}

/// Traversal mode of a matrix-vector product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraversalMode {
    /// `y += A x`
    Normal,
    /// `y += Aᵀ x`
    Transpose,
    /// `y += A x` using only the lower triangle of a symmetric matrix
    Symmetric,
}

/// Which side of a block a moment matrix belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MomentSide {
    /// Row (test) side
    Left,
    /// Column (trial) side
    Right,
}

/// The function a Lagrange polynomial is tested against in a moment integral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MomentKind {
    /// The local basis function
    Value,
    /// The derivative of the local basis function
    Derivative,
}
