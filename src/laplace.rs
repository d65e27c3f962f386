//! Laplace operators
use crate::near_field::{integrate_pair, ElementPair, NearFieldOptions, SurfacePoint};
use crate::traits::{Patch, PdeProblem};
use crate::types::{Result, Symmetry};
use std::f64::consts::PI;

/// Green's function `1 / (4π|x - y|)`.
pub fn green_function(x: &[f64; 3], y: &[f64; 3]) -> f64 {
    let r = distance(x, y);
    1.0 / (4.0 * PI * r)
}

/// Derivative of the Green's function in direction `normal` at `y`.
pub fn green_function_normal_derivative(x: &[f64; 3], y: &[f64; 3], normal: &[f64; 3]) -> f64 {
    let r = distance(x, y);
    let dot: f64 = (0..3).map(|d| (x[d] - y[d]) * normal[d]).sum();
    dot / (4.0 * PI * r * r * r)
}

pub(crate) fn distance(x: &[f64; 3], y: &[f64; 3]) -> f64 {
    ((x[0] - y[0]).powi(2) + (x[1] - y[1]).powi(2) + (x[2] - y[2]).powi(2)).sqrt()
}

/// Kernel times surface measures at a pair of parameter points.
fn interpolate<P: Patch>(
    test_patch: &P,
    s: [f64; 2],
    trial_patch: &P,
    t: [f64; 2],
    kernel: impl Fn(&SurfacePoint, &SurfacePoint) -> f64,
) -> f64 {
    let (x, mx) = SurfacePoint::on_patch(test_patch, s[0], s[1]);
    let (y, my) = SurfacePoint::on_patch(trial_patch, t[0], t[1]);
    kernel(&x, &y) * mx * my
}

/// Laplace single layer operator.
#[derive(Debug, Clone, Default)]
pub struct LaplaceSingleLayer {
    options: NearFieldOptions,
}

impl LaplaceSingleLayer {
    /// Create the operator with default quadrature settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the operator with custom quadrature settings.
    pub fn with_options(options: NearFieldOptions) -> Self {
        Self { options }
    }

    fn kernel(x: &SurfacePoint, y: &SurfacePoint) -> f64 {
        green_function(&x.point, &y.point)
    }
}

impl PdeProblem for LaplaceSingleLayer {
    type T = f64;

    fn symmetry(&self) -> &[Symmetry] {
        &[Symmetry::Symmetric]
    }

    fn interpolate_kernel<P: Patch>(
        &self,
        test_patch: &P,
        s: [f64; 2],
        trial_patch: &P,
        t: [f64; 2],
        values: &mut [f64],
    ) {
        values[0] = interpolate(test_patch, s, trial_patch, t, Self::kernel);
    }

    fn integrate_element_pair<P: Patch>(
        &self,
        pair: &ElementPair<'_, P>,
        output: &mut [f64],
    ) -> Result<()> {
        integrate_pair(pair, &self.options, Self::kernel, output)
    }
}

/// Laplace double layer operator, the normal derivative taken at the trial point.
#[derive(Debug, Clone, Default)]
pub struct LaplaceDoubleLayer {
    options: NearFieldOptions,
}

impl LaplaceDoubleLayer {
    /// Create the operator with default quadrature settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the operator with custom quadrature settings.
    pub fn with_options(options: NearFieldOptions) -> Self {
        Self { options }
    }

    fn kernel(x: &SurfacePoint, y: &SurfacePoint) -> f64 {
        green_function_normal_derivative(&x.point, &y.point, &y.normal)
    }
}

impl PdeProblem for LaplaceDoubleLayer {
    type T = f64;

    fn symmetry(&self) -> &[Symmetry] {
        &[Symmetry::NonSymmetric]
    }

    fn interpolate_kernel<P: Patch>(
        &self,
        test_patch: &P,
        s: [f64; 2],
        trial_patch: &P,
        t: [f64; 2],
        values: &mut [f64],
    ) {
        values[0] = interpolate(test_patch, s, trial_patch, t, Self::kernel);
    }

    fn integrate_element_pair<P: Patch>(
        &self,
        pair: &ElementPair<'_, P>,
        output: &mut [f64],
    ) -> Result<()> {
        integrate_pair(pair, &self.options, Self::kernel, output)
    }
}

/// Laplace adjoint double layer operator, the normal derivative taken at the test point.
#[derive(Debug, Clone, Default)]
pub struct LaplaceAdjointDoubleLayer {
    options: NearFieldOptions,
}

impl LaplaceAdjointDoubleLayer {
    /// Create the operator with default quadrature settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the operator with custom quadrature settings.
    pub fn with_options(options: NearFieldOptions) -> Self {
        Self { options }
    }

    fn kernel(x: &SurfacePoint, y: &SurfacePoint) -> f64 {
        green_function_normal_derivative(&y.point, &x.point, &x.normal)
    }
}

impl PdeProblem for LaplaceAdjointDoubleLayer {
    type T = f64;

    fn symmetry(&self) -> &[Symmetry] {
        &[Symmetry::NonSymmetric]
    }

    fn interpolate_kernel<P: Patch>(
        &self,
        test_patch: &P,
        s: [f64; 2],
        trial_patch: &P,
        t: [f64; 2],
        values: &mut [f64],
    ) {
        values[0] = interpolate(test_patch, s, trial_patch, t, Self::kernel);
    }

    fn integrate_element_pair<P: Patch>(
        &self,
        pair: &ElementPair<'_, P>,
        output: &mut [f64],
    ) -> Result<()> {
        integrate_pair(pair, &self.options, Self::kernel, output)
    }
}
