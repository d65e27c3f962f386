//! Definition of various test shapes.
use crate::traits::Patch;

/// A bilinear quadrilateral patch.
///
/// The corners are the images of (0, 0), (1, 0), (1, 1) and (0, 1).
#[derive(Debug, Clone, PartialEq)]
pub struct BilinearPatch {
    corners: [[f64; 3]; 4],
}

impl BilinearPatch {
    /// Create a patch from its corners.
    pub fn new(corners: [[f64; 3]; 4]) -> Self {
        Self { corners }
    }

    /// The corners of the patch
    pub fn corners(&self) -> &[[f64; 3]; 4] {
        &self.corners
    }
}

impl Patch for BilinearPatch {
    fn eval(&self, s: f64, t: f64) -> [f64; 3] {
        let [p0, p1, p2, p3] = &self.corners;
        let w = [(1.0 - s) * (1.0 - t), s * (1.0 - t), s * t, (1.0 - s) * t];
        let mut out = [0.0; 3];
        for (d, value) in out.iter_mut().enumerate() {
            *value = w[0] * p0[d] + w[1] * p1[d] + w[2] * p2[d] + w[3] * p3[d];
        }
        out
    }

    fn jacobian(&self, s: f64, t: f64) -> [[f64; 3]; 2] {
        let [p0, p1, p2, p3] = &self.corners;
        let mut ds = [0.0; 3];
        let mut dt = [0.0; 3];
        for d in 0..3 {
            ds[d] = (1.0 - t) * (p1[d] - p0[d]) + t * (p2[d] - p3[d]);
            dt[d] = (1.0 - s) * (p3[d] - p0[d]) + s * (p2[d] - p1[d]);
        }
        [ds, dt]
    }
}

/// The six faces of the unit cube `[0,1]³` with outward normals.
pub fn unit_cube() -> Vec<BilinearPatch> {
    let mut faces = square_tube();
    faces.push(BilinearPatch::new([
        [0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
        [1.0, 0.0, 0.0],
    ]));
    faces.push(BilinearPatch::new([
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [1.0, 1.0, 1.0],
        [0.0, 1.0, 1.0],
    ]));
    faces
}

/// The four lateral faces of the unit cube, an open square tube.
pub fn square_tube() -> Vec<BilinearPatch> {
    vec![
        BilinearPatch::new([
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 1.0],
            [0.0, 0.0, 1.0],
        ]),
        BilinearPatch::new([
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [1.0, 1.0, 1.0],
            [1.0, 0.0, 1.0],
        ]),
        BilinearPatch::new([
            [0.0, 1.0, 0.0],
            [0.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
            [1.0, 1.0, 0.0],
        ]),
        BilinearPatch::new([
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 1.0, 1.0],
            [0.0, 1.0, 0.0],
        ]),
    ]
}

/// The square `[0,1]²` in the plane `z = 0`, split into `n × n` patches.
pub fn screen(n: usize) -> Vec<BilinearPatch> {
    let h = 1.0 / n as f64;
    let mut patches = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            let (x0, x1) = (i as f64 * h, (i + 1) as f64 * h);
            let (y0, y1) = (j as f64 * h, (j + 1) as f64 * h);
            patches.push(BilinearPatch::new([
                [x0, y0, 0.0],
                [x1, y0, 0.0],
                [x1, y1, 0.0],
                [x0, y1, 0.0],
            ]));
        }
    }
    patches
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::*;

    #[test]
    fn test_cube_normals_point_outwards() {
        for face in unit_cube() {
            let centre = face.eval(0.5, 0.5);
            let normal = face.normal(0.5, 0.5);
            let outward: f64 = (0..3).map(|d| (centre[d] - 0.5) * normal[d]).sum();
            assert!(outward > 0.0);
            assert_relative_eq!(face.surface_measure(0.3, 0.8), 1.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_screen() {
        let patches = screen(3);
        assert_eq!(patches.len(), 9);
        let area: f64 = patches.iter().map(|p| p.surface_measure(0.5, 0.5)).sum();
        assert_relative_eq!(area, 1.0, epsilon = 1e-14);
        assert_relative_eq!(patches[4].eval(0.5, 0.5)[0], 0.5, epsilon = 1e-14);
    }

    #[test]
    fn test_bilinear_jacobian() {
        let patch = BilinearPatch::new([
            [0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [2.5, 1.0, 0.5],
            [0.0, 1.5, 0.0],
        ]);
        let (s, t, h) = (0.3, 0.6, 1e-6);
        let [ds, dt] = patch.jacobian(s, t);
        let fs = (patch.eval(s + h, t), patch.eval(s - h, t));
        let ft = (patch.eval(s, t + h), patch.eval(s, t - h));
        for d in 0..3 {
            assert_relative_eq!(ds[d], (fs.0[d] - fs.1[d]) / (2.0 * h), epsilon = 1e-8);
            assert_relative_eq!(dt[d], (ft.0[d] - ft.1[d]) / (2.0 * h), epsilon = 1e-8);
        }
    }
}
