//! Clough-Tocher C1 piecewise-cubic interpolation on a Delaunay triangulation
//!
//! Every triangle is split at its centroid into three cubic Bézier patches.
//! Vertex gradients come from a global iteration that minimises the second
//! derivative along triangulation edges. Across every edge the derivative along
//! a direction both adjacent triangles agree on is kept linear, so neighbours
//! join with C1 continuity. That direction is the line between the two
//! triangles' centroids, or the median through the edge midpoint on the hull.

use crate::ml::triangulation::Triangulation;
use tracing::{debug, warn};

pub const GRADIENT_MAX_ITERATIONS: usize = 400;
pub const GRADIENT_TOLERANCE: f64 = 1e-6;

/// Cubic interpolant over a fixed triangulation
#[derive(Debug, Clone)]
pub struct CloughTocher {
    triangulation: Triangulation,
    neighbors: Vec<[Option<usize>; 3]>,
    values: Vec<f64>,
    gradients: Vec<[f64; 2]>,
}

impl CloughTocher {
    /// Fit an interpolant; `values[i]` is the sample at triangulation point `i`
    #[must_use]
    pub fn new(triangulation: Triangulation, values: Vec<f64>) -> Self {
        let gradients = estimate_gradients(&triangulation, &values);
        let neighbors = triangulation.triangle_neighbors();
        Self {
            triangulation,
            neighbors,
            values,
            gradients,
        }
    }

    /// Evaluate at a point, `NaN` outside the convex hull
    #[must_use]
    pub fn evaluate(&self, p: [f64; 2]) -> f64 {
        match self.triangulation.locate(p) {
            Some((idx, b)) => self.evaluate_in(idx, b),
            None => f64::NAN,
        }
    }

    #[allow(clippy::many_single_char_names)]
    fn evaluate_in(&self, idx: usize, b: [f64; 3]) -> f64 {
        let t = self.triangulation.triangles()[idx];
        let pts = t.map(|i| self.triangulation.points()[i]);
        let f = t.map(|i| self.values[i]);
        let g = t.map(|i| self.gradients[i]);
        let centroid = self.centroid(idx);

        // Control point next to vertex i on the way to `target`
        let toward = |i: usize, target: [f64; 2]| f[i] + dot(g[i], sub(target, pts[i])) / 3.0;
        let edge = |i: usize, j: usize| toward(i, pts[j]);
        let to_centre = [toward(0, centroid), toward(1, centroid), toward(2, centroid)];

        // Interior control point of the micro-triangle facing edge (j, k)
        let facing = |i: usize| {
            let (j, k) = ((i + 1) % 3, (i + 2) % 3);
            let across = match self.neighbors[idx][i] {
                Some(other) => sub(self.centroid(other), centroid),
                None => sub(midpoint(pts[j], pts[k]), pts[i]),
            };
            let [dj, dk, dc] = direction_in(pts[j], pts[k], centroid, across);

            let (cjk, ckj) = (edge(j, k), edge(k, j));
            let ends = dj * f[j] + dk * cjk + dc * to_centre[j]
                + dj * ckj
                + dk * f[k]
                + dc * to_centre[k];
            (ends / 2.0 - dj * cjk - dk * ckj) / dc
        };
        let m = [facing(0), facing(1), facing(2)];

        let ring = |i: usize| (to_centre[i] + m[(i + 1) % 3] + m[(i + 2) % 3]) / 3.0;
        let r = [ring(0), ring(1), ring(2)];
        let centre = (r[0] + r[1] + r[2]) / 3.0;

        // The point sits in the micro-triangle opposite its smallest coordinate
        let i = (0..3)
            .min_by(|&a, &c| b[a].total_cmp(&b[c]))
            .unwrap_or(0);
        let (j, k) = ((i + 1) % 3, (i + 2) % 3);
        let (u, v, w) = (b[j] - b[i], b[k] - b[i], 3.0 * b[i]);

        f[j] * u * u * u
            + f[k] * v * v * v
            + centre * w * w * w
            + 3.0 * edge(j, k) * u * u * v
            + 3.0 * edge(k, j) * u * v * v
            + 3.0 * to_centre[j] * u * u * w
            + 3.0 * to_centre[k] * v * v * w
            + 3.0 * r[j] * u * w * w
            + 3.0 * r[k] * v * w * w
            + 6.0 * m[i] * u * v * w
    }

    fn centroid(&self, idx: usize) -> [f64; 2] {
        let [a, b, c] = self.triangulation.triangles()[idx].map(|i| self.triangulation.points()[i]);
        [(a[0] + b[0] + c[0]) / 3.0, (a[1] + b[1] + c[1]) / 3.0]
    }
}

/// Express `d` in barycentric differences of triangle (a, b, c); the three
/// components sum to zero
fn direction_in(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> [f64; 3] {
    let (ac, bc) = (sub(a, c), sub(b, c));
    let det = ac[0] * bc[1] - bc[0] * ac[1];
    let da = (d[0] * bc[1] - bc[0] * d[1]) / det;
    let db = (ac[0] * d[1] - d[0] * ac[1]) / det;
    [da, db, -da - db]
}

/// Per-vertex gradients minimising edge curvature (Gauss-Seidel sweeps)
fn estimate_gradients(triangulation: &Triangulation, values: &[f64]) -> Vec<[f64; 2]> {
    let points = triangulation.points();
    let neighbors = triangulation.vertex_neighbors();
    let mut gradients = vec![[0.0, 0.0]; points.len()];

    for iteration in 0..GRADIENT_MAX_ITERATIONS {
        let mut err = 0.0f64;

        for (i, adjacent) in neighbors.iter().enumerate() {
            let mut q = [[0.0; 2]; 2];
            let mut s = [0.0; 2];

            for &j in adjacent {
                let e = sub(points[j], points[i]);
                let l3 = dot(e, e).sqrt().powi(3);
                let slope_j = -dot(e, gradients[j]);
                let rhs = 6.0 * (values[i] - values[j]) - 2.0 * slope_j;

                q[0][0] += 4.0 * e[0] * e[0] / l3;
                q[0][1] += 4.0 * e[0] * e[1] / l3;
                q[1][1] += 4.0 * e[1] * e[1] / l3;
                s[0] += rhs * e[0] / l3;
                s[1] += rhs * e[1] / l3;
            }
            q[1][0] = q[0][1];

            let det = q[0][0] * q[1][1] - q[0][1] * q[1][0];
            if det.abs() <= f64::EPSILON * (q[0][0] * q[1][1]).abs() {
                continue;
            }
            let r0 = (q[1][1] * s[0] - q[0][1] * s[1]) / det;
            let r1 = (-q[1][0] * s[0] + q[0][0] * s[1]) / det;

            let change = (gradients[i][0] + r0).abs().max((gradients[i][1] + r1).abs())
                / 1.0f64.max(r0.abs()).max(r1.abs());
            gradients[i] = [-r0, -r1];
            err = err.max(change);
        }

        if err < GRADIENT_TOLERANCE {
            debug!(iterations = iteration + 1, "gradient estimation converged");
            return gradients;
        }
    }

    warn!(
        max_iterations = GRADIENT_MAX_ITERATIONS,
        "gradient estimation did not converge"
    );
    gradients
}

fn midpoint(a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
    [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0]
}

fn sub(a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
    [a[0] - b[0], a[1] - b[1]]
}

fn dot(a: [f64; 2], b: [f64; 2]) -> f64 {
    a[0] * b[0] + a[1] * b[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit(points: Vec<[f64; 2]>, f: impl Fn([f64; 2]) -> f64) -> CloughTocher {
        let values = points.iter().map(|&p| f(p)).collect();
        let tri = Triangulation::new(points).expect("triangulate");
        CloughTocher::new(tri, values)
    }

    fn scattered_points() -> Vec<[f64; 2]> {
        vec![
            [0.0, 0.0],
            [3.0, 0.2],
            [1.1, 2.7],
            [4.2, 3.9],
            [0.3, 4.1],
            [2.2, 1.4],
            [3.7, 2.1],
            [1.8, 3.6],
        ]
    }

    #[test]
    fn test_reproduces_linear_field() {
        let linear = |p: [f64; 2]| 2.0 * p[0] - 0.5 * p[1] + 1.0;
        let ct = fit(scattered_points(), linear);

        for p in [[2.0, 2.0], [1.0, 1.0], [3.0, 2.5], [2.2, 1.4]] {
            assert!((ct.evaluate(p) - linear(p)).abs() < 1e-3, "at {p:?}");
        }
    }

    #[test]
    fn test_interpolates_samples() {
        let quadratic = |p: [f64; 2]| p[0] * p[0] + p[0] * p[1];
        let points = scattered_points();
        let ct = fit(points.clone(), quadratic);

        for p in points {
            assert!((ct.evaluate(p) - quadratic(p)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_outside_hull_is_nan() {
        let ct = fit(vec![[0.0, 0.0], [2.0, 0.0], [0.0, 2.0], [0.5, 0.5]], |p| p[0]);

        assert!(ct.evaluate([1.9, 1.9]).is_nan());
        assert!(ct.evaluate([-0.1, 0.5]).is_nan());
        assert!(ct.evaluate([0.4, 0.4]).is_finite());
    }

    #[test]
    fn test_continuous_across_edges() {
        let smooth = |p: [f64; 2]| (p[0] * 0.7).sin() + p[1] * p[1] * 0.1;
        let ct = fit(scattered_points(), smooth);

        // Step across the interior of the hull in small increments
        let mut previous = ct.evaluate([0.5, 1.0]);
        for step in 1..=200 {
            let t = f64::from(step) / 200.0;
            let value = ct.evaluate([0.5 + 2.5 * t, 1.0 + 1.5 * t]);
            assert!(value.is_finite());
            assert!((value - previous).abs() < 0.1);
            previous = value;
        }
    }

    #[test]
    fn test_slope_continuous_across_interior_edges() {
        let smooth = |p: [f64; 2]| (p[0] * 0.7).sin() + p[1] * p[1] * 0.1;
        let ct = fit(scattered_points(), smooth);
        let h = 1e-4;

        let mut checked = 0;
        for (&t, across) in ct.triangulation.triangles().iter().zip(&ct.neighbors) {
            for i in 0..3 {
                if across[i].is_none() {
                    continue;
                }
                let points = ct.triangulation.points();
                let (a, b) = (points[t[(i + 1) % 3]], points[t[(i + 2) % 3]]);
                let q = [a[0] + 0.3 * (b[0] - a[0]), a[1] + 0.3 * (b[1] - a[1])];
                let e = sub(b, a);
                let len = dot(e, e).sqrt();
                let n = [-e[1] / len, e[0] / len];
                let at = |s: f64| ct.evaluate([q[0] + s * n[0], q[1] + s * n[1]]);

                // Second-order one-sided slopes from each side of the edge
                let ahead = (-3.0 * at(0.0) + 4.0 * at(h) - at(2.0 * h)) / (2.0 * h);
                let behind = (3.0 * at(0.0) - 4.0 * at(-h) + at(-2.0 * h)) / (2.0 * h);
                assert!((ahead - behind).abs() < 1e-4, "slope jump across edge {a:?}-{b:?}");
                checked += 1;
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_direction_in_sums_to_zero() {
        let d = direction_in([0.0, 0.0], [1.0, 0.0], [0.3, 0.3], [0.0, 1.0]);
        assert!(d.iter().sum::<f64>().abs() < 1e-12);
        // Reconstruct the vector from the combination
        let x = d[0] * 0.0 + d[1] * 1.0 + d[2] * 0.3;
        let y = d[0] * 0.0 + d[1] * 0.0 + d[2] * 0.3;
        assert!(x.abs() < 1e-12);
        assert!((y - 1.0).abs() < 1e-12);
    }
}
