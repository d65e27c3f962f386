//! Orthonormal Legendre polynomials on the unit interval.

/// The shifted Legendre polynomials `φ_m(x) = √(2m+1) P_m(2x-1)` up to a degree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendreBasis {
    degree: usize,
}

impl LegendreBasis {
    /// Create the basis of polynomials of degree at most `degree`.
    pub fn new(degree: usize) -> Self {
        Self { degree }
    }

    /// Polynomial degree
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of functions
    pub fn dim(&self) -> usize {
        self.degree + 1
    }

    /// Evaluate all functions at `x`.
    pub fn eval(&self, x: f64, values: &mut [f64]) {
        debug_assert!(values.len() >= self.dim());
        let y = 2.0 * x - 1.0;
        let (mut p0, mut p1) = (1.0, y);
        for (m, value) in values.iter_mut().take(self.dim()).enumerate() {
            let p = match m {
                0 => 1.0,
                1 => y,
                _ => {
                    let p2 = ((2 * m - 1) as f64 * y * p1 - (m - 1) as f64 * p0) / m as f64;
                    p0 = p1;
                    p1 = p2;
                    p2
                }
            };
            *value = ((2 * m + 1) as f64).sqrt() * p;
        }
    }

    /// Evaluate the derivatives of all functions at `x`.
    pub fn eval_derivative(&self, x: f64, values: &mut [f64]) {
        debug_assert!(values.len() >= self.dim());
        let y = 2.0 * x - 1.0;
        let n = self.dim();
        let mut p = vec![0.0; n + 1];
        let mut dp = vec![0.0; n + 1];
        p[0] = 1.0;
        if n > 1 {
            p[1] = y;
            dp[1] = 1.0;
        }
        for k in 1..n.saturating_sub(1) {
            p[k + 1] = ((2 * k + 1) as f64 * y * p[k] - k as f64 * p[k - 1]) / (k + 1) as f64;
            dp[k + 1] = dp[k - 1] + (2 * k + 1) as f64 * p[k];
        }
        for (m, value) in values.iter_mut().take(n).enumerate() {
            *value = 2.0 * ((2 * m + 1) as f64).sqrt() * dp[m];
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::quadrature::gauss_legendre;
    use approx::*;

    #[test]
    fn test_orthonormal() {
        let basis = LegendreBasis::new(4);
        let rule = gauss_legendre(6).unwrap();
        let mut gram = [[0.0; 5]; 5];
        let mut values = [0.0; 5];
        for (x, w) in rule.points.iter().zip(rule.weights.iter()) {
            basis.eval(*x, &mut values);
            for i in 0..5 {
                for j in 0..5 {
                    gram[i][j] += w * values[i] * values[j];
                }
            }
        }
        for (i, row) in gram.iter().enumerate() {
            for (j, entry) in row.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(*entry, expected, epsilon = 1e-13);
            }
        }
    }

    #[test]
    fn test_derivative() {
        let basis = LegendreBasis::new(5);
        let (x, h) = (0.37, 1e-6);
        let mut upper = [0.0; 6];
        let mut lower = [0.0; 6];
        let mut deriv = [0.0; 6];
        basis.eval(x + h, &mut upper);
        basis.eval(x - h, &mut lower);
        basis.eval_derivative(x, &mut deriv);
        for m in 0..6 {
            assert_relative_eq!(deriv[m], (upper[m] - lower[m]) / (2.0 * h), epsilon = 1e-6);
        }
        assert_eq!(deriv[0], 0.0);
    }
}
