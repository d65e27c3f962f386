//! Duffy rules for pairs of unit squares.
//!
//! Corners of the unit square are numbered counter-clockwise:
//! 0: (0, 0), 1: (1, 0), 2: (1, 1), 3: (0, 1).
use crate::quadrature::gauss_legendre::gauss_legendre;
use crate::quadrature::types::TestTrialNumericalQuadratureDefinition;
use crate::types::Result;

fn corner(index: usize) -> (f64, f64) {
    match index {
        0 => (0.0, 0.0),
        1 => (1.0, 0.0),
        2 => (1.0, 1.0),
        3 => (0.0, 1.0),
        _ => panic!("Unknown corner {index} of the unit square."),
    }
}

/// Affine map of the unit square onto itself with (0, 0) -> v0 and (1, 0) -> v1.
///
/// `v1` must be adjacent to `v0`; (0, 1) is sent to the other neighbour of `v0`.
fn square_map(v0: usize, v1: usize) -> impl Fn((f64, f64)) -> (f64, f64) {
    assert!(
        (v0 + 1) % 4 == v1 || (v1 + 1) % 4 == v0,
        "({v0}, {v1}) is not an edge of the unit square."
    );
    let v2 = (2 * v0 + 4 - v1) % 4;
    let p0 = corner(v0);
    let p1 = corner(v1);
    let p2 = corner(v2);
    let col0 = (p1.0 - p0.0, p1.1 - p0.1);
    let col1 = (p2.0 - p0.0, p2.1 - p0.1);
    move |point: (f64, f64)| {
        (
            p0.0 + col0.0 * point.0 + col1.0 * point.1,
            p0.1 + col0.1 * point.0 + col1.1 * point.1,
        )
    }
}

fn transform(
    rule: &mut TestTrialNumericalQuadratureDefinition,
    test_map: impl Fn((f64, f64)) -> (f64, f64),
    trial_map: impl Fn((f64, f64)) -> (f64, f64),
) {
    for index in 0..rule.npoints {
        let test = test_map((rule.test_points[2 * index], rule.test_points[2 * index + 1]));
        let trial = trial_map((rule.trial_points[2 * index], rule.trial_points[2 * index + 1]));
        (rule.test_points[2 * index], rule.test_points[2 * index + 1]) = test;
        (rule.trial_points[2 * index], rule.trial_points[2 * index + 1]) = trial;
    }
}

/// Rule for the double integral over one square with itself.
pub fn identical_squares(npoints: usize) -> Result<TestTrialNumericalQuadratureDefinition> {
    let interval = gauss_legendre(npoints)?;
    let x = &interval.points;
    let w = &interval.weights;
    let mut rule = TestTrialNumericalQuadratureDefinition::with_capacity(8 * npoints.pow(4));

    for i1 in 0..npoints {
        for i2 in 0..npoints {
            for i3 in 0..npoints {
                for i4 in 0..npoints {
                    let (eta1, eta2, eta3, xi) = (x[i1], x[i2], x[i3], x[i4]);
                    let weight =
                        w[i1] * w[i2] * w[i3] * w[i4] * xi * (1.0 - xi) * (1.0 - xi * eta1);

                    // (a, c) are paired coordinates in the first direction,
                    // (b, d) in the second one, and the integrand is singular for
                    // a = c and b = d.
                    let a = (1.0 - xi) * eta3;
                    let b = (1.0 - xi * eta1) * eta2;
                    let c = xi + a;
                    let d = xi * eta1 + b;

                    for swap_first in [false, true] {
                        for swap_second in [false, true] {
                            for transpose in [false, true] {
                                let (test_x, trial_x) = if swap_first { (c, a) } else { (a, c) };
                                let (test_y, trial_y) = if swap_second { (d, b) } else { (b, d) };
                                if transpose {
                                    rule.push((test_y, test_x), (trial_y, trial_x), weight);
                                } else {
                                    rule.push((test_x, test_y), (trial_x, trial_y), weight);
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(rule)
}

/// Rule for two squares sharing an edge.
///
/// `test_edge` and `trial_edge` are the corner indices of the shared edge in the
/// two squares, listed so that `test_edge[k]` and `trial_edge[k]` are the same
/// physical point.
pub fn edge_adjacent_squares(
    npoints: usize,
    test_edge: [usize; 2],
    trial_edge: [usize; 2],
) -> Result<TestTrialNumericalQuadratureDefinition> {
    let interval = gauss_legendre(npoints)?;
    let x = &interval.points;
    let w = &interval.weights;
    let mut rule = TestTrialNumericalQuadratureDefinition::with_capacity(6 * npoints.pow(4));

    for i1 in 0..npoints {
        for i2 in 0..npoints {
            for i3 in 0..npoints {
                for i4 in 0..npoints {
                    let (eta1, eta2, eta3, xi) = (x[i1], x[i2], x[i3], x[i4]);
                    let weight = w[i1] * w[i2] * w[i3] * w[i4] * xi * xi;

                    // The shared edge is the first axis of both squares.
                    let a = (1.0 - xi) * eta3;
                    let near = (a + xi, xi * eta2);
                    let far = (a, xi * eta1);
                    rule.push(near, far, weight * (1.0 - xi));
                    rule.push(far, near, weight * (1.0 - xi));

                    let e = (1.0 - xi * eta1) * eta3;
                    let weight = weight * (1.0 - xi * eta1);
                    for (first, second) in [(xi * eta2, xi), (xi, xi * eta2)] {
                        rule.push((e + xi * eta1, first), (e, second), weight);
                        rule.push((e, first), (e + xi * eta1, second), weight);
                    }
                }
            }
        }
    }

    transform(
        &mut rule,
        square_map(test_edge[0], test_edge[1]),
        square_map(trial_edge[0], trial_edge[1]),
    );
    Ok(rule)
}

/// Rule for two squares sharing the corner `test_vertex` of the test square and
/// `trial_vertex` of the trial square.
pub fn vertex_adjacent_squares(
    npoints: usize,
    test_vertex: usize,
    trial_vertex: usize,
) -> Result<TestTrialNumericalQuadratureDefinition> {
    let interval = gauss_legendre(npoints)?;
    let x = &interval.points;
    let w = &interval.weights;
    let mut rule = TestTrialNumericalQuadratureDefinition::with_capacity(4 * npoints.pow(4));

    for i1 in 0..npoints {
        for i2 in 0..npoints {
            for i3 in 0..npoints {
                for i4 in 0..npoints {
                    let (eta1, eta2, eta3, xi) = (x[i1], x[i2], x[i3], x[i4]);
                    let weight = w[i1] * w[i2] * w[i3] * w[i4] * xi * xi * xi;
                    // xi occupies each of the four coordinates in turn.
                    for position in 0..4 {
                        let mut coords = [xi * eta1, xi * eta2, xi * eta3, 0.0];
                        coords.copy_within(position..3, position + 1);
                        coords[position] = xi;
                        rule.push((coords[0], coords[1]), (coords[2], coords[3]), weight);
                    }
                }
            }
        }
    }

    transform(
        &mut rule,
        square_map(test_vertex, (test_vertex + 1) % 4),
        square_map(trial_vertex, (trial_vertex + 1) % 4),
    );
    Ok(rule)
}
