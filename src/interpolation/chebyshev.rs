//! Chebyshev nodes and Lagrange polynomials on the unit interval.

/// Roots of the Chebyshev polynomial of degree `np`, mapped to `[0,1]` and
/// sorted in ascending order.
pub fn chebyshev_roots(np: usize) -> Vec<f64> {
    let mut roots = vec![0.0; np];
    for i in 1..=np {
        roots[np - i] = 0.5
            * ((std::f64::consts::PI * (2 * i - 1) as f64 / (2 * np) as f64).cos() + 1.0);
    }
    roots
}

/// The Lagrange polynomials of a set of nodes in Newton form.
#[derive(Debug, Clone)]
pub struct LagrangeBasis {
    nodes: Vec<f64>,
    /// Newton coefficients, one row per polynomial
    coefficients: Vec<Vec<f64>>,
}

impl LagrangeBasis {
    /// Lagrange polynomials of the given nodes.
    ///
    /// The Newton coefficients of the polynomial that is one at node `i` and
    /// zero at all other nodes are the divided differences of the `i`-th unit
    /// vector.
    pub fn new(nodes: Vec<f64>) -> Self {
        let np = nodes.len();
        let coefficients = (0..np)
            .map(|i| {
                let mut c = vec![0.0; np];
                c[i] = 1.0;
                for j in 1..np {
                    for k in (j..np).rev() {
                        c[k] = (c[k] - c[k - 1]) / (nodes[k] - nodes[k - j]);
                    }
                }
                c
            })
            .collect();
        Self {
            nodes,
            coefficients,
        }
    }

    /// Lagrange polynomials of the Chebyshev roots.
    pub fn chebyshev(np: usize) -> Self {
        Self::new(chebyshev_roots(np))
    }

    /// Number of polynomials
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Is the basis empty?
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Interpolation nodes
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Evaluate polynomial `index` at `x` (Horner scheme for the Newton form).
    pub fn eval(&self, index: usize, x: f64) -> f64 {
        let c = &self.coefficients[index];
        let np = c.len();
        let mut value = c[np - 1];
        for i in (0..np - 1).rev() {
            value = value * (x - self.nodes[i]) + c[i];
        }
        value
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::*;

    #[test]
    fn test_roots() {
        for np in 1..10 {
            let roots = chebyshev_roots(np);
            assert!(roots.iter().all(|x| *x > 0.0 && *x < 1.0));
            for pair in roots.windows(2) {
                assert!(pair[0] < pair[1]);
            }
            // symmetric about one half
            for i in 0..np {
                assert_relative_eq!(roots[i], 1.0 - roots[np - 1 - i], epsilon = 1e-14);
            }
        }
        assert_relative_eq!(chebyshev_roots(1)[0], 0.5, epsilon = 1e-15);
    }

    #[test]
    fn test_cardinal_property() {
        let basis = LagrangeBasis::chebyshev(7);
        for i in 0..7 {
            for (j, x) in basis.nodes().iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(basis.eval(i, *x), expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_polynomial_reproduction() {
        let basis = LagrangeBasis::chebyshev(5);
        let f = |x: f64| 1.0 - 2.0 * x + 0.5 * x * x * x * x;
        for x in [0.0, 0.13, 0.5, 0.77, 1.0] {
            let interpolated: f64 = (0..5).map(|i| f(basis.nodes()[i]) * basis.eval(i, x)).sum();
            assert_relative_eq!(interpolated, f(x), epsilon = 1e-12);
        }
    }
}
