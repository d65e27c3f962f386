//! Helmholtz operators
use crate::laplace::distance;
use crate::near_field::{integrate_pair, ElementPair, NearFieldOptions, SurfacePoint};
use crate::traits::{Patch, PdeProblem};
use crate::types::{Result, Symmetry};
use rlst::c64;
use std::f64::consts::PI;

/// Green's function `e^{ik|x - y|} / (4π|x - y|)`.
pub fn green_function(wavenumber: f64, x: &[f64; 3], y: &[f64; 3]) -> c64 {
    let r = distance(x, y);
    let scale = 1.0 / (4.0 * PI * r);
    let kr = wavenumber * r;
    c64::new(kr.cos() * scale, kr.sin() * scale)
}

/// Derivative of the Green's function in direction `normal` at `y`.
pub fn green_function_normal_derivative(
    wavenumber: f64,
    x: &[f64; 3],
    y: &[f64; 3],
    normal: &[f64; 3],
) -> c64 {
    let r = distance(x, y);
    let dot: f64 = (0..3).map(|d| (x[d] - y[d]) * normal[d]).sum();
    let kr = wavenumber * r;
    let scale = dot / (4.0 * PI * r * r * r);
    // e^{ikr} (1 - ikr)
    let (cos, sin) = (kr.cos(), kr.sin());
    c64::new(cos + kr * sin, sin - kr * cos) * scale
}

fn interpolate<P: Patch>(
    test_patch: &P,
    s: [f64; 2],
    trial_patch: &P,
    t: [f64; 2],
    kernel: impl Fn(&SurfacePoint, &SurfacePoint) -> c64,
) -> c64 {
    let (x, mx) = SurfacePoint::on_patch(test_patch, s[0], s[1]);
    let (y, my) = SurfacePoint::on_patch(trial_patch, t[0], t[1]);
    kernel(&x, &y) * (mx * my)
}

/// Helmholtz single layer operator.
#[derive(Debug, Clone)]
pub struct HelmholtzSingleLayer {
    wavenumber: f64,
    options: NearFieldOptions,
}

impl HelmholtzSingleLayer {
    /// Create the operator for a wavenumber.
    pub fn new(wavenumber: f64) -> Self {
        Self::with_options(wavenumber, NearFieldOptions::default())
    }

    /// Create the operator with custom quadrature settings.
    pub fn with_options(wavenumber: f64, options: NearFieldOptions) -> Self {
        Self {
            wavenumber,
            options,
        }
    }

    /// The wavenumber
    pub fn wavenumber(&self) -> f64 {
        self.wavenumber
    }
}

impl PdeProblem for HelmholtzSingleLayer {
    type T = c64;

    fn symmetry(&self) -> &[Symmetry] {
        &[Symmetry::Symmetric]
    }

    fn interpolate_kernel<P: Patch>(
        &self,
        test_patch: &P,
        s: [f64; 2],
        trial_patch: &P,
        t: [f64; 2],
        values: &mut [c64],
    ) {
        values[0] = interpolate(test_patch, s, trial_patch, t, |x, y| {
            green_function(self.wavenumber, &x.point, &y.point)
        });
    }

    fn integrate_element_pair<P: Patch>(
        &self,
        pair: &ElementPair<'_, P>,
        output: &mut [c64],
    ) -> Result<()> {
        integrate_pair(
            pair,
            &self.options,
            |x, y| green_function(self.wavenumber, &x.point, &y.point),
            output,
        )
    }
}

/// Helmholtz double layer operator, the normal derivative taken at the trial point.
#[derive(Debug, Clone)]
pub struct HelmholtzDoubleLayer {
    wavenumber: f64,
    options: NearFieldOptions,
}

impl HelmholtzDoubleLayer {
    /// Create the operator for a wavenumber.
    pub fn new(wavenumber: f64) -> Self {
        Self::with_options(wavenumber, NearFieldOptions::default())
    }

    /// Create the operator with custom quadrature settings.
    pub fn with_options(wavenumber: f64, options: NearFieldOptions) -> Self {
        Self {
            wavenumber,
            options,
        }
    }

    /// The wavenumber
    pub fn wavenumber(&self) -> f64 {
        self.wavenumber
    }

    fn kernel(&self, x: &SurfacePoint, y: &SurfacePoint) -> c64 {
        green_function_normal_derivative(self.wavenumber, &x.point, &y.point, &y.normal)
    }
}

impl PdeProblem for HelmholtzDoubleLayer {
    type T = c64;

    fn symmetry(&self) -> &[Symmetry] {
        &[Symmetry::NonSymmetric]
    }

    fn interpolate_kernel<P: Patch>(
        &self,
        test_patch: &P,
        s: [f64; 2],
        trial_patch: &P,
        t: [f64; 2],
        values: &mut [c64],
    ) {
        values[0] = interpolate(test_patch, s, trial_patch, t, |x, y| self.kernel(x, y));
    }

    fn integrate_element_pair<P: Patch>(
        &self,
        pair: &ElementPair<'_, P>,
        output: &mut [c64],
    ) -> Result<()> {
        integrate_pair(pair, &self.options, |x, y| self.kernel(x, y), output)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::*;

    #[test]
    fn test_zero_wavenumber_is_laplace() {
        let x = [0.1, 0.2, 0.3];
        let y = [1.0, -0.5, 0.25];
        let n = [0.0, 0.6, 0.8];
        let g = green_function(0.0, &x, &y);
        assert_relative_eq!(g.re, crate::laplace::green_function(&x, &y), epsilon = 1e-15);
        assert_abs_diff_eq!(g.im, 0.0, epsilon = 1e-15);
        let dg = green_function_normal_derivative(0.0, &x, &y, &n);
        assert_relative_eq!(
            dg.re,
            crate::laplace::green_function_normal_derivative(&x, &y, &n),
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_normal_derivative_by_finite_differences() {
        let k = 2.5;
        let x = [0.0, 0.0, 0.0];
        let y = [0.3, 0.4, 1.2];
        let n = [0.0, 0.0, 1.0];
        let eps = 1e-6;
        let yp = [y[0], y[1], y[2] + eps];
        let ym = [y[0], y[1], y[2] - eps];
        let fd = (green_function(k, &x, &yp) - green_function(k, &x, &ym)) / (2.0 * eps);
        let dg = green_function_normal_derivative(k, &x, &y, &n);
        assert_relative_eq!(dg.re, fd.re, max_relative = 1e-6);
        assert_relative_eq!(dg.im, fd.im, max_relative = 1e-6);
    }
}
