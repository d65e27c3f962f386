//! Gauss-Legendre rules on the unit interval.
use crate::quadrature::types::NumericalQuadratureDefinition;
use crate::types::{Error, Result};
use std::collections::HashMap;

/// Largest number of points for which a rule is tabulated.
pub const MAX_GAUSS_POINTS: usize = 32;

lazy_static! {
    static ref GAUSS_LEGENDRE_RULES: HashMap<usize, (Vec<f64>, Vec<f64>)> =
        (1..=MAX_GAUSS_POINTS)
            .map(|npoints| (npoints, compute_rule(npoints)))
            .collect();
}

/// Legendre polynomial P_n and its derivative at x.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = x;
    if n == 0 {
        return (1.0, 0.0);
    }
    for k in 2..=n {
        let p2 = ((2 * k - 1) as f64 * x * p1 - (k - 1) as f64 * p0) / k as f64;
        p0 = p1;
        p1 = p2;
    }
    let deriv = n as f64 * (x * p1 - p0) / (x * x - 1.0);
    (p1, deriv)
}

/// Points in ascending order and weights of the rule on `[0,1]`.
fn compute_rule(npoints: usize) -> (Vec<f64>, Vec<f64>) {
    let mut points = vec![0.0; npoints];
    let mut weights = vec![0.0; npoints];
    for i in 0..npoints {
        // Newton iteration starting from the asymptotic root location
        let mut x =
            (std::f64::consts::PI * (i as f64 + 0.75) / (npoints as f64 + 0.5)).cos();
        for _ in 0..100 {
            let (p, dp) = legendre(npoints, x);
            let dx = p / dp;
            x -= dx;
            if dx.abs() < 1e-16 {
                break;
            }
        }
        let (_, dp) = legendre(npoints, x);
        points[i] = 0.5 * (1.0 - x);
        weights[i] = 1.0 / ((1.0 - x * x) * dp * dp);
    }
    (points, weights)
}

/// Return the Gauss-Legendre rule with `npoints` points on `[0,1]`.
pub fn gauss_legendre(npoints: usize) -> Result<NumericalQuadratureDefinition> {
    if let Some((points, weights)) = GAUSS_LEGENDRE_RULES.get(&npoints) {
        Ok(NumericalQuadratureDefinition {
            dim: 1,
            npoints,
            weights: weights.clone(),
            points: points.clone(),
        })
    } else {
        Err(Error::QuadratureOrder {
            requested: npoints,
            max: MAX_GAUSS_POINTS,
        })
    }
}
