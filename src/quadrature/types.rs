//! Type definitions.

/// Definition of a numerical quadrature rule on `[0,1]^dim`.
#[derive(Debug, Clone)]
pub struct NumericalQuadratureDefinition {
    /// The dimension d of a single point.
    pub dim: usize,

    /// The number of points of the quadrature rule.
    pub npoints: usize,

    /// The weights of the quadrature rule.
    pub weights: Vec<f64>,

    /// The point coordinates of the quadrature rule, `dim` consecutive
    /// values per point.
    pub points: Vec<f64>,
}

/// Definition of a quadrature rule for a double integral over two unit squares.
///
/// Used where the integral cannot be evaluated by tensor application of rules
/// for one square, such as for weakly singular integrands on touching
/// elements.
#[derive(Debug, Clone)]
pub struct TestTrialNumericalQuadratureDefinition {
    /// The number of points of the quadrature rule.
    pub npoints: usize,

    /// The weights of the quadrature rule.
    pub weights: Vec<f64>,

    /// The test point coordinates, two consecutive values per point.
    pub test_points: Vec<f64>,

    /// The trial point coordinates, two consecutive values per point.
    pub trial_points: Vec<f64>,
}

impl TestTrialNumericalQuadratureDefinition {
    pub(crate) fn with_capacity(npoints: usize) -> Self {
        Self {
            npoints: 0,
            weights: Vec::with_capacity(npoints),
            test_points: Vec::with_capacity(2 * npoints),
            trial_points: Vec::with_capacity(2 * npoints),
        }
    }

    pub(crate) fn push(&mut self, test: (f64, f64), trial: (f64, f64), weight: f64) {
        self.test_points.push(test.0);
        self.test_points.push(test.1);
        self.trial_points.push(trial.0);
        self.trial_points.push(trial.1);
        self.weights.push(weight);
        self.npoints += 1;
    }

    /// Test point with index `index`
    pub fn test_point(&self, index: usize) -> [f64; 2] {
        [self.test_points[2 * index], self.test_points[2 * index + 1]]
    }

    /// Trial point with index `index`
    pub fn trial_point(&self, index: usize) -> [f64; 2] {
        [self.trial_points[2 * index], self.trial_points[2 * index + 1]]
    }
}
