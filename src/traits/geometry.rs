//! Geometry traits

/// A parametric surface patch `[0,1]² → ℝ³`.
pub trait Patch: Sync {
    /// Point on the surface
    fn eval(&self, s: f64, t: f64) -> [f64; 3];

    /// Derivatives with respect to `s` and `t`
    fn jacobian(&self, s: f64, t: f64) -> [[f64; 3]; 2];

    /// Unnormalised normal. Its length is the surface measure.
    fn normal(&self, s: f64, t: f64) -> [f64; 3] {
        let [ds, dt] = self.jacobian(s, t);
        [
            ds[1] * dt[2] - ds[2] * dt[1],
            ds[2] * dt[0] - ds[0] * dt[2],
            ds[0] * dt[1] - ds[1] * dt[0],
        ]
    }

    /// Surface measure
    fn surface_measure(&self, s: f64, t: f64) -> f64 {
        let n = self.normal(s, t);
        (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt()
    }
}
